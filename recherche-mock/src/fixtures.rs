//! Canned records for tests: plausible German businesses around one
//! Dortmund block. Phone numbers and coordinates are derived from the
//! external id so distinct fixtures never collide on a dedup signal by
//! accident.

use recherche_core::RawRecord;
use serde_json::json;

fn id_salt(external_id: &str) -> u32 {
    external_id
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)))
        % 900
}

/// A fully populated record as the premium driver would emit it.
#[must_use]
pub fn place(source: &str, external_id: &str, name: &str) -> RawRecord {
    let salt = id_salt(external_id);
    let mut record = RawRecord::new(source, name);
    record.external_id = Some(external_id.to_string());
    record.address = Some(format!("Hansastraße {}, 44137 Dortmund", salt % 90 + 1));
    record.phone = Some(format!("+49 231 555 {salt:03}"));
    record.website = Some(format!(
        "https://www.{}.example",
        name.to_lowercase().replace(' ', "-")
    ));
    record.category = Some("restaurant".to_string());
    record.lat = Some(51.5136 + f64::from(salt) * 1e-5);
    record.lng = Some(7.4653);
    record.payload = json!({ "rating": 4.4, "user_rating_count": 31 });
    record
}

/// A sparse record: name and external id only, as cheap bulk sources
/// often deliver.
#[must_use]
pub fn sparse(source: &str, external_id: &str, name: &str) -> RawRecord {
    let mut record = RawRecord::new(source, name);
    record.external_id = Some(external_id.to_string());
    record
}

/// A record without any external id, forcing the later dedup signals.
#[must_use]
pub fn anonymous(source: &str, name: &str) -> RawRecord {
    RawRecord::new(source, name)
}
