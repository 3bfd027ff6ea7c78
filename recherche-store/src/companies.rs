//! Company directory access for the dedup engine.
//!
//! Normalized website and phone are persisted alongside the raw fields so
//! every dedup signal stays an indexed equality lookup; the geo signal
//! narrows candidates with a bounding box before the engine applies the
//! exact distance and name checks.

use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

use recherche_core::normalize::{normalize_phone, normalize_website};
use recherche_core::{Company, RechercheError};

use crate::{Store, db_err, fmt_ts, new_id, parse_ts_required};

/// Meters per degree of latitude; close enough for candidate bounding.
const M_PER_DEG_LAT: f64 = 111_320.0;

/// Canonical fields for a company row to be created.
#[derive(Debug, Clone, Default)]
pub struct NewCompany {
    /// Canonical name (firmierung).
    pub name: String,
    /// Street address.
    pub address: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// City.
    pub city: Option<String>,
    /// Phone number, raw form.
    pub phone: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Website URL, raw form.
    pub website: Option<String>,
    /// Latitude.
    pub lat: Option<f64>,
    /// Longitude.
    pub lng: Option<f64>,
    /// Per-source metadata blocks.
    pub metadata: serde_json::Value,
}

const COMPANY_COLUMNS: &str = "id, firmierung, address, postal_code, city, phone, email, \
website, lat, lng, metadaten, created_at, updated_at";

struct CompanyRow {
    id: String,
    name: String,
    address: Option<String>,
    postal_code: Option<String>,
    city: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    website: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl CompanyRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            address: row.get(2)?,
            postal_code: row.get(3)?,
            city: row.get(4)?,
            phone: row.get(5)?,
            email: row.get(6)?,
            website: row.get(7)?,
            lat: row.get(8)?,
            lng: row.get(9)?,
            metadata: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

impl TryFrom<CompanyRow> for Company {
    type Error = RechercheError;

    fn try_from(row: CompanyRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            address: row.address,
            postal_code: row.postal_code,
            city: row.city,
            phone: row.phone,
            email: row.email,
            website: row.website,
            lat: row.lat,
            lng: row.lng,
            metadata: serde_json::from_str(&row.metadata)
                .map_err(|e| RechercheError::data(e))?,
            created_at: parse_ts_required(row.created_at)?,
            updated_at: parse_ts_required(row.updated_at)?,
        })
    }
}

impl Store {
    /// Insert a new company from canonical fields.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn insert_company(&self, new: &NewCompany) -> Result<Company, RechercheError> {
        let id = new_id();
        let now = fmt_ts(Utc::now());
        let metadata =
            serde_json::to_string(&new.metadata).map_err(|e| RechercheError::data(e))?;
        let website_normalized = new.website.as_deref().and_then(normalize_website);
        let phone_normalized = new.phone.as_deref().and_then(normalize_phone);
        self.conn()
            .execute(
                "INSERT INTO com_unternehmen (id, firmierung, address, postal_code, city, \
                 phone, phone_normalized, email, website, website_normalized, lat, lng, \
                 metadaten, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
                params![
                    id,
                    new.name,
                    new.address,
                    new.postal_code,
                    new.city,
                    new.phone,
                    phone_normalized,
                    new.email,
                    new.website,
                    website_normalized,
                    new.lat,
                    new.lng,
                    metadata,
                    now,
                ],
            )
            .map_err(db_err)?;
        self.company_by_id(&id)?
            .ok_or_else(|| RechercheError::not_found(format!("company {id}")))
    }

    /// Rewrite a company's mutable fields after an enrichment pass.
    ///
    /// # Errors
    /// `NotFound` when the company does not exist.
    pub fn update_company(&self, company: &Company) -> Result<(), RechercheError> {
        let now = fmt_ts(Utc::now());
        let metadata =
            serde_json::to_string(&company.metadata).map_err(|e| RechercheError::data(e))?;
        let website_normalized = company.website.as_deref().and_then(normalize_website);
        let phone_normalized = company.phone.as_deref().and_then(normalize_phone);
        let changed = self
            .conn()
            .execute(
                "UPDATE com_unternehmen SET firmierung = ?1, address = ?2, postal_code = ?3, \
                 city = ?4, phone = ?5, phone_normalized = ?6, email = ?7, website = ?8, \
                 website_normalized = ?9, lat = ?10, lng = ?11, metadaten = ?12, \
                 updated_at = ?13 WHERE id = ?14",
                params![
                    company.name,
                    company.address,
                    company.postal_code,
                    company.city,
                    company.phone,
                    phone_normalized,
                    company.email,
                    company.website,
                    website_normalized,
                    company.lat,
                    company.lng,
                    metadata,
                    now,
                    company.id,
                ],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(RechercheError::not_found(format!("company {}", company.id)));
        }
        Ok(())
    }

    /// Fetch a company by id.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn company_by_id(&self, id: &str) -> Result<Option<Company>, RechercheError> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {COMPANY_COLUMNS} FROM com_unternehmen WHERE id = ?1"),
                params![id],
                CompanyRow::from_row,
            )
            .optional()
            .map_err(db_err)?;
        row.map(Company::try_from).transpose()
    }

    /// Dedup signal 1: the company carrying `external_id` in its metadata
    /// block for `source`.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn find_company_by_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Company>, RechercheError> {
        let row = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {COMPANY_COLUMNS} FROM com_unternehmen \
                     WHERE json_extract(metadaten, '$.' || ?1 || '.external_id') = ?2 \
                     ORDER BY created_at LIMIT 1"
                ),
                params![source, external_id],
                CompanyRow::from_row,
            )
            .optional()
            .map_err(db_err)?;
        row.map(Company::try_from).transpose()
    }

    /// Dedup signal 1, cross-source fallback: a company whose metadata
    /// carries `external_id` under any source block. Sources sometimes
    /// report the same underlying identifier for one business; no shape
    /// mapping between identifier kinds is attempted.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn find_company_by_any_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Company>, RechercheError> {
        let row = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {COMPANY_COLUMNS} FROM com_unternehmen c \
                     WHERE EXISTS (SELECT 1 FROM json_each(c.metadaten) \
                                   WHERE json_extract(json_each.value, '$.external_id') = ?1) \
                     ORDER BY created_at LIMIT 1"
                ),
                params![external_id],
                CompanyRow::from_row,
            )
            .optional()
            .map_err(db_err)?;
        row.map(Company::try_from).transpose()
    }

    /// Dedup signal 2: match by normalized website.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn find_company_by_website(
        &self,
        website_normalized: &str,
    ) -> Result<Option<Company>, RechercheError> {
        let row = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {COMPANY_COLUMNS} FROM com_unternehmen \
                     WHERE website_normalized = ?1 ORDER BY created_at LIMIT 1"
                ),
                params![website_normalized],
                CompanyRow::from_row,
            )
            .optional()
            .map_err(db_err)?;
        row.map(Company::try_from).transpose()
    }

    /// Dedup signal 3: match by normalized phone.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn find_company_by_phone(
        &self,
        phone_normalized: &str,
    ) -> Result<Option<Company>, RechercheError> {
        let row = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {COMPANY_COLUMNS} FROM com_unternehmen \
                     WHERE phone_normalized = ?1 ORDER BY created_at LIMIT 1"
                ),
                params![phone_normalized],
                CompanyRow::from_row,
            )
            .optional()
            .map_err(db_err)?;
        row.map(Company::try_from).transpose()
    }

    /// Dedup signal 4 candidates: companies inside a bounding box around
    /// the point. The engine applies the exact haversine and name checks.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn companies_near(
        &self,
        lat: f64,
        lng: f64,
        radius_m: f64,
    ) -> Result<Vec<Company>, RechercheError> {
        let d_lat = radius_m / M_PER_DEG_LAT;
        let d_lng = radius_m / (M_PER_DEG_LAT * lat.to_radians().cos().abs().max(0.01));
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COMPANY_COLUMNS} FROM com_unternehmen \
                 WHERE lat BETWEEN ?1 AND ?2 AND lng BETWEEN ?3 AND ?4 \
                 ORDER BY created_at"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![lat - d_lat, lat + d_lat, lng - d_lng, lng + d_lng],
                CompanyRow::from_row,
            )
            .map_err(db_err)?;
        let mut companies = Vec::new();
        for row in rows {
            companies.push(Company::try_from(row.map_err(db_err)?)?);
        }
        Ok(companies)
    }

    /// Total number of companies in the directory.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn company_count(&self) -> Result<u64, RechercheError> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM com_unternehmen", [], |row| row.get(0))
            .map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> NewCompany {
        NewCompany {
            name: "Bäckerei Schmidt".to_string(),
            website: Some("https://www.schmidt-brot.de/".to_string()),
            phone: Some("+49 231 555 01".to_string()),
            lat: Some(51.514),
            lng: Some(7.466),
            metadata: json!({ "google_places": { "external_id": "gp-1" } }),
            ..NewCompany::default()
        }
    }

    #[test]
    fn lookup_by_each_signal() {
        let store = Store::open_in_memory().unwrap();
        let company = store.insert_company(&sample()).unwrap();

        let by_ext = store
            .find_company_by_external_id("google_places", "gp-1")
            .unwrap()
            .unwrap();
        assert_eq!(by_ext.id, company.id);
        assert!(
            store
                .find_company_by_external_id("dataforseo", "gp-1")
                .unwrap()
                .is_none()
        );

        let by_site = store
            .find_company_by_website("schmidt-brot.de")
            .unwrap()
            .unwrap();
        assert_eq!(by_site.id, company.id);

        let by_phone = store.find_company_by_phone("023155501").unwrap().unwrap();
        assert_eq!(by_phone.id, company.id);

        let near = store.companies_near(51.5142, 7.4662, 150.0).unwrap();
        assert_eq!(near.len(), 1);
        let far = store.companies_near(51.60, 7.466, 150.0).unwrap();
        assert!(far.is_empty());
    }

    #[test]
    fn update_rewrites_normalized_columns() {
        let store = Store::open_in_memory().unwrap();
        let mut company = store.insert_company(&sample()).unwrap();
        company.website = Some("https://neue-seite.de".to_string());
        store.update_company(&company).unwrap();

        assert!(store.find_company_by_website("schmidt-brot.de").unwrap().is_none());
        assert!(
            store
                .find_company_by_website("neue-seite.de")
                .unwrap()
                .is_some()
        );
    }
}
