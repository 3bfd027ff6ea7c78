//! Geographic and category reference data consumed by parameter
//! resolution. Seeded elsewhere; the worker only reads, but small insert
//! helpers exist for seeding scripts and tests.

use rusqlite::{OptionalExtension, Row, params};

use recherche_core::RechercheError;

use crate::{Store, db_err};

/// A place with coordinates, the finest search-area granularity.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoOrt {
    /// Row id.
    pub id: String,
    /// Place name.
    pub name: String,
    /// Postal code.
    pub plz: Option<String>,
    /// Owning district.
    pub kreis_id: Option<String>,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Whether this is the district's main place.
    pub ist_hauptort: bool,
}

/// A district; its population drives the search radius.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoKreis {
    /// Row id.
    pub id: String,
    /// District name.
    pub name: String,
    /// Population, when known.
    pub einwohner: Option<i64>,
}

/// Google category reference row; maps a gcid to a display name.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleCategory {
    /// Stable Google category id.
    pub gcid: String,
    /// English name.
    pub name: Option<String>,
    /// German name, preferred for search terms.
    pub name_de: Option<String>,
}

fn ort_from_row(row: &Row<'_>) -> rusqlite::Result<GeoOrt> {
    Ok(GeoOrt {
        id: row.get(0)?,
        name: row.get(1)?,
        plz: row.get(2)?,
        kreis_id: row.get(3)?,
        lat: row.get(4)?,
        lng: row.get(5)?,
        ist_hauptort: row.get(6)?,
    })
}

const ORT_COLUMNS: &str = "id, name, plz, kreis_id, lat, lng, ist_hauptort";

impl Store {
    /// Fetch a place by id.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn ort_by_id(&self, id: &str) -> Result<Option<GeoOrt>, RechercheError> {
        self.conn()
            .query_row(
                &format!("SELECT {ORT_COLUMNS} FROM geo_ort WHERE id = ?1"),
                params![id],
                ort_from_row,
            )
            .optional()
            .map_err(db_err)
    }

    /// The district's main place, if one is flagged.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn hauptort_for_kreis(&self, kreis_id: &str) -> Result<Option<GeoOrt>, RechercheError> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {ORT_COLUMNS} FROM geo_ort \
                     WHERE kreis_id = ?1 AND ist_hauptort = 1 ORDER BY id LIMIT 1"
                ),
                params![kreis_id],
                ort_from_row,
            )
            .optional()
            .map_err(db_err)
    }

    /// The first place carrying a postal code.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn ort_by_plz(&self, plz: &str) -> Result<Option<GeoOrt>, RechercheError> {
        self.conn()
            .query_row(
                &format!("SELECT {ORT_COLUMNS} FROM geo_ort WHERE plz = ?1 ORDER BY id LIMIT 1"),
                params![plz],
                ort_from_row,
            )
            .optional()
            .map_err(db_err)
    }

    /// Fetch a district by id.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn kreis_by_id(&self, id: &str) -> Result<Option<GeoKreis>, RechercheError> {
        self.conn()
            .query_row(
                "SELECT id, name, einwohner FROM geo_kreis WHERE id = ?1",
                params![id],
                |row| {
                    Ok(GeoKreis {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        einwohner: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)
    }

    /// Fetch a Google category by gcid.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn category_by_gcid(&self, gcid: &str) -> Result<Option<GoogleCategory>, RechercheError> {
        self.conn()
            .query_row(
                "SELECT gcid, name, name_de FROM brn_google_kategorie WHERE gcid = ?1",
                params![gcid],
                |row| {
                    Ok(GoogleCategory {
                        gcid: row.get(0)?,
                        name: row.get(1)?,
                        name_de: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)
    }

    /// Seed a place (seeding scripts and tests).
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn insert_ort(&self, ort: &GeoOrt) -> Result<(), RechercheError> {
        self.conn()
            .execute(
                "INSERT INTO geo_ort (id, name, plz, kreis_id, lat, lng, ist_hauptort) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    ort.id,
                    ort.name,
                    ort.plz,
                    ort.kreis_id,
                    ort.lat,
                    ort.lng,
                    ort.ist_hauptort,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Seed a district (seeding scripts and tests).
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn insert_kreis(&self, kreis: &GeoKreis) -> Result<(), RechercheError> {
        self.conn()
            .execute(
                "INSERT INTO geo_kreis (id, name, einwohner) VALUES (?1, ?2, ?3)",
                params![kreis.id, kreis.name, kreis.einwohner],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Seed a Google category (seeding scripts and tests).
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn insert_category(&self, category: &GoogleCategory) -> Result<(), RechercheError> {
        self.conn()
            .execute(
                "INSERT INTO brn_google_kategorie (gcid, name, name_de) VALUES (?1, ?2, ?3)",
                params![category.gcid, category.name, category.name_de],
            )
            .map_err(db_err)?;
        Ok(())
    }
}
