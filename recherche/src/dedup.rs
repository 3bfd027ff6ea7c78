//! The dedup engine: matches raw provider records against the company
//! directory through a priority chain of signals and folds matches into
//! the existing rows.
//!
//! Signal order is fixed: external id, normalized website, normalized
//! phone, then geo proximity with a name-set match. Records are processed
//! in provider-returned order, so the sweep is deterministic; within one
//! order the first record to touch a company wins and every later match
//! against the same company counts as a duplicate.

use std::collections::{HashMap, HashSet};

use serde_json::{Value, json};

use recherche_core::normalize::{
    haversine_m, normalize_phone, normalize_website, token_set_ratio,
};
use recherche_core::{Company, RawRecord, RechercheError};
use recherche_store::{NewCompany, Store};

/// Geo signal: candidate companies farther than this never match.
/// Hypothesized starting point, pending calibration against production data.
pub const GEO_MAX_DISTANCE_M: f64 = 150.0;

/// Geo signal: minimum token-set ratio between the record and candidate
/// names. Same calibration caveat as the distance threshold.
pub const NAME_MATCH_THRESHOLD: f64 = 0.85;

/// Counters produced by one dedup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// Companies newly created.
    pub new: u32,
    /// Records that matched without enriching anything.
    pub duplicate: u32,
    /// Records that filled at least one empty core field.
    pub updated: u32,
}

/// Matches an order's raw results against the company directory.
pub struct DedupEngine {
    store: Store,
}

impl DedupEngine {
    /// Engine over the given store.
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Run the sweep over every raw result of `order_id`, in insertion
    /// order. Re-running over the same set creates nothing new: the first
    /// pass wrote the external-id blocks the second pass matches on.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn run(&self, order_id: &str) -> Result<DedupStats, RechercheError> {
        let raw_results = self.store.raw_results_for_order(order_id)?;

        let mut stats = DedupStats::default();
        // Companies already matched or created by this order.
        let mut touched: HashSet<String> = HashSet::new();
        // (source, external_id) pairs resolved so far; repeats are
        // duplicates by definition, and an insert race on the pair is
        // impossible because the sweep is single-threaded per order.
        let mut seen_external: HashMap<(String, String), String> = HashMap::new();

        for raw in &raw_results {
            let record = &raw.record;
            let external_key = record
                .external_id
                .as_ref()
                .map(|eid| (record.source.clone(), eid.clone()));

            if let Some(key) = &external_key {
                if seen_external.contains_key(key) {
                    stats.duplicate += 1;
                    continue;
                }
            }

            let company_id = match self.find_match(record)? {
                Some(mut company) => {
                    let first_touch = touched.insert(company.id.clone());
                    let core_filled = merge_record(&mut company, record);
                    self.store.update_company(&company)?;
                    if first_touch && core_filled {
                        stats.updated += 1;
                    } else {
                        stats.duplicate += 1;
                    }
                    company.id
                }
                None => {
                    let company = self.store.insert_company(&new_company(record))?;
                    touched.insert(company.id.clone());
                    stats.new += 1;
                    company.id
                }
            };

            if let Some(key) = external_key {
                seen_external.insert(key, company_id);
            }
        }

        tracing::info!(
            order_id,
            new = stats.new,
            duplicate = stats.duplicate,
            updated = stats.updated,
            "dedup sweep finished"
        );
        Ok(stats)
    }

    fn find_match(&self, record: &RawRecord) -> Result<Option<Company>, RechercheError> {
        if let Some(external_id) = record.external_id.as_deref() {
            if let Some(company) = self
                .store
                .find_company_by_external_id(&record.source, external_id)?
            {
                return Ok(Some(company));
            }
            if let Some(company) = self.store.find_company_by_any_external_id(external_id)? {
                return Ok(Some(company));
            }
        }

        if let Some(website) = record.website.as_deref().and_then(normalize_website) {
            if let Some(company) = self.store.find_company_by_website(&website)? {
                return Ok(Some(company));
            }
        }

        if let Some(phone) = record.phone.as_deref().and_then(normalize_phone) {
            if let Some(company) = self.store.find_company_by_phone(&phone)? {
                return Ok(Some(company));
            }
        }

        if let (Some(lat), Some(lng)) = (record.lat, record.lng) {
            for candidate in self.store.companies_near(lat, lng, GEO_MAX_DISTANCE_M)? {
                let (Some(c_lat), Some(c_lng)) = (candidate.lat, candidate.lng) else {
                    continue;
                };
                if haversine_m(lat, lng, c_lat, c_lng) <= GEO_MAX_DISTANCE_M
                    && token_set_ratio(&record.name, &candidate.name) >= NAME_MATCH_THRESHOLD
                {
                    return Ok(Some(candidate));
                }
            }
        }

        Ok(None)
    }
}

/// Fold a record into an existing company: overwrite the record's source
/// block in the metadata map and fill empty core fields. Returns whether
/// any core field was filled.
fn merge_record(company: &mut Company, record: &RawRecord) -> bool {
    if !company.metadata.is_object() {
        company.metadata = json!({});
    }
    if let Value::Object(map) = &mut company.metadata {
        map.insert(record.source.clone(), source_block(record));
    }

    let mut core_filled = false;
    core_filled |= fill_if_empty(&mut company.address, record.address.as_deref());
    core_filled |= fill_if_empty(&mut company.postal_code, record.postal_code.as_deref());
    core_filled |= fill_if_empty(&mut company.city, record.city.as_deref());
    core_filled |= fill_if_empty(&mut company.phone, record.phone.as_deref());
    core_filled |= fill_if_empty(&mut company.email, record.email.as_deref());
    core_filled |= fill_if_empty(&mut company.website, record.website.as_deref());
    if company.lat.is_none() && record.lat.is_some() {
        company.lat = record.lat;
        company.lng = record.lng;
        core_filled = true;
    }
    core_filled
}

/// The `if_empty` update rule: existing non-empty values are never
/// overwritten.
fn fill_if_empty(target: &mut Option<String>, value: Option<&str>) -> bool {
    let target_empty = target.as_deref().is_none_or(str::is_empty);
    match value {
        Some(v) if target_empty && !v.is_empty() => {
            *target = Some(v.to_string());
            true
        }
        _ => false,
    }
}

/// Per-source metadata block: the record's opaque payload plus the
/// external id under a stable key.
fn source_block(record: &RawRecord) -> Value {
    let mut block = match &record.payload {
        Value::Object(map) => Value::Object(map.clone()),
        _ => json!({}),
    };
    if let Some(external_id) = &record.external_id {
        block["external_id"] = json!(external_id);
    }
    block
}

fn new_company(record: &RawRecord) -> NewCompany {
    let mut metadata = serde_json::Map::new();
    metadata.insert(record.source.clone(), source_block(record));
    NewCompany {
        name: record.name.clone(),
        address: record.address.clone(),
        postal_code: record.postal_code.clone(),
        city: record.city.clone(),
        phone: record.phone.clone(),
        email: record.email.clone(),
        website: record.website.clone(),
        lat: record.lat,
        lng: record.lng,
        metadata: Value::Object(metadata),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_if_empty_never_overwrites() {
        let mut target = Some("kept".to_string());
        assert!(!fill_if_empty(&mut target, Some("new")));
        assert_eq!(target.as_deref(), Some("kept"));

        let mut empty = Some(String::new());
        assert!(fill_if_empty(&mut empty, Some("filled")));
        assert_eq!(empty.as_deref(), Some("filled"));

        let mut none = None;
        assert!(fill_if_empty(&mut none, Some("filled")));
        assert!(!fill_if_empty(&mut none, Some("other")));
        assert_eq!(none.as_deref(), Some("filled"));
    }

    #[test]
    fn source_block_carries_payload_and_external_id() {
        let mut record = RawRecord::new("google_places", "Alpha");
        record.external_id = Some("gp-1".to_string());
        record.payload = json!({ "rating": 4.4 });
        let block = source_block(&record);
        assert_eq!(block["rating"], json!(4.4));
        assert_eq!(block["external_id"], json!("gp-1"));
    }
}
