//! Raw provider results: written once per order, immutable, kept for audit.

use chrono::Utc;
use rusqlite::{Row, params};

use recherche_core::{RawRecord, RawResult, RechercheError};

use crate::{Store, db_err, fmt_ts, new_id};

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, RawRecord, String)> {
    let id: String = row.get(0)?;
    let order_id: String = row.get(1)?;
    let payload: String = row.get(14)?;
    let record = RawRecord {
        source: row.get(2)?,
        external_id: row.get(3)?,
        name: row.get(4)?,
        address: row.get(5)?,
        postal_code: row.get(6)?,
        city: row.get(7)?,
        phone: row.get(8)?,
        email: row.get(9)?,
        website: row.get(10)?,
        category: row.get(11)?,
        lat: row.get(12)?,
        lng: row.get(13)?,
        payload: serde_json::Value::Null,
    };
    Ok((id, order_id, record, payload))
}

impl Store {
    /// Append a batch of normalized records for an order, preserving the
    /// provider-returned order via an insertion sequence.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn insert_raw_results(
        &self,
        order_id: &str,
        records: &[RawRecord],
    ) -> Result<(), RechercheError> {
        let now = fmt_ts(Utc::now());
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO rch_roh_ergebnis (id, auftrag_id, seq, source, external_id, \
                     name, address, postal_code, city, phone, email, website, category, lat, \
                     lng, payload, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                     ?16, ?17)",
                )
                .map_err(db_err)?;
            for (seq, record) in records.iter().enumerate() {
                let payload = serde_json::to_string(&record.payload)
                    .map_err(|e| RechercheError::data(e))?;
                stmt.execute(params![
                    new_id(),
                    order_id,
                    seq as i64,
                    record.source,
                    record.external_id,
                    record.name,
                    record.address,
                    record.postal_code,
                    record.city,
                    record.phone,
                    record.email,
                    record.website,
                    record.category,
                    record.lat,
                    record.lng,
                    payload,
                    now,
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)
    }

    /// All raw results of an order, in insertion (provider-returned) order.
    ///
    /// # Errors
    /// `Database` on persistence failure; `Data` when a payload is corrupt.
    pub fn raw_results_for_order(&self, order_id: &str) -> Result<Vec<RawResult>, RechercheError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, auftrag_id, source, external_id, name, address, postal_code, city, \
                 phone, email, website, category, lat, lng, payload \
                 FROM rch_roh_ergebnis WHERE auftrag_id = ?1 ORDER BY seq",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![order_id], record_from_row)
            .map_err(db_err)?;

        let mut results = Vec::new();
        for row in rows {
            let (id, order_id, mut record, payload) = row.map_err(db_err)?;
            record.payload =
                serde_json::from_str(&payload).map_err(|e| RechercheError::data(e))?;
            results.push(RawResult {
                id,
                order_id,
                record,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::NewOrder;
    use crate::partners::NewPartner;
    use recherche_core::QualityTier;
    use serde_json::json;

    #[test]
    fn raw_results_keep_provider_order_and_payload() {
        let store = Store::open_in_memory().unwrap();
        let partner = store.create_partner(&NewPartner::new("P")).unwrap();
        let order = store
            .create_order(&NewOrder::new(&partner.id, QualityTier::Premium))
            .unwrap();

        let mut a = RawRecord::new("google_places", "Alpha");
        a.payload = json!({ "rating": 4.5 });
        let b = RawRecord::new("google_places", "Beta");
        store.insert_raw_results(&order.id, &[a, b]).unwrap();

        let results = store.raw_results_for_order(&order.id).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.name, "Alpha");
        assert_eq!(results[1].record.name, "Beta");
        assert_eq!(results[0].record.payload["rating"], json!(4.5));
        assert_eq!(results[0].order_id, order.id);
    }
}
