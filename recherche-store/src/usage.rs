//! API usage accounting: an append-only call log plus a per-day rollup.

use chrono::Utc;
use rusqlite::params;

use recherche_core::RechercheError;

use crate::{Store, db_err, fmt_ts, new_id};

/// One upstream call family to be recorded.
#[derive(Debug, Clone)]
pub struct NewUsage {
    /// Partner the usage is attributed to.
    pub partner_id: String,
    /// Logical endpoint, e.g. "recherche/google_places".
    pub endpoint: String,
    /// HTTP method of the upstream call.
    pub method: String,
    /// Call parameters, for audit.
    pub parameters: serde_json::Value,
    /// Upstream status code.
    pub status_code: u16,
    /// Records the call family yielded.
    pub result_count: u32,
    /// Actual API cost in USD.
    pub cost_usd: f64,
    /// Wall-clock duration of the call family.
    pub response_time_ms: Option<i64>,
}

impl Store {
    /// Append a usage record and fold it into the daily rollup for
    /// (partner, day, endpoint).
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn record_usage(&self, usage: &NewUsage) -> Result<(), RechercheError> {
        let now = Utc::now();
        let parameters =
            serde_json::to_string(&usage.parameters).map_err(|e| RechercheError::data(e))?;
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute(
            "INSERT INTO api_usage (id, partner_id, endpoint, methode, parameter, status_code, \
             anzahl_ergebnisse, kosten, antwortzeit_ms, erstellt_am) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                new_id(),
                usage.partner_id,
                usage.endpoint,
                usage.method,
                parameters,
                usage.status_code,
                usage.result_count,
                usage.cost_usd,
                usage.response_time_ms,
                fmt_ts(now),
            ],
        )
        .map_err(db_err)?;
        tx.execute(
            "INSERT INTO api_usage_daily (id, partner_id, datum, endpoint, anzahl_abrufe, \
             anzahl_ergebnisse_gesamt, kosten_gesamt, erstellt_am) \
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7) \
             ON CONFLICT (partner_id, datum, endpoint) DO UPDATE SET \
             anzahl_abrufe = anzahl_abrufe + 1, \
             anzahl_ergebnisse_gesamt = anzahl_ergebnisse_gesamt + \
             excluded.anzahl_ergebnisse_gesamt, \
             kosten_gesamt = kosten_gesamt + excluded.kosten_gesamt",
            params![
                new_id(),
                usage.partner_id,
                now.format("%Y-%m-%d").to_string(),
                usage.endpoint,
                usage.result_count,
                usage.cost_usd,
                fmt_ts(now),
            ],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)
    }

    /// Daily rollup for one (partner, day, endpoint), as
    /// (calls, total_results, total_cost_usd).
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn usage_daily(
        &self,
        partner_id: &str,
        datum: &str,
        endpoint: &str,
    ) -> Result<Option<(u32, u32, f64)>, RechercheError> {
        use rusqlite::OptionalExtension;
        self.conn()
            .query_row(
                "SELECT anzahl_abrufe, anzahl_ergebnisse_gesamt, kosten_gesamt \
                 FROM api_usage_daily \
                 WHERE partner_id = ?1 AND datum = ?2 AND endpoint = ?3",
                params![partner_id, datum, endpoint],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(db_err)
    }

    /// Number of raw usage rows for a partner (tests/ops).
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn usage_count(&self, partner_id: &str) -> Result<u64, RechercheError> {
        self.conn()
            .query_row(
                "SELECT COUNT(*) FROM api_usage WHERE partner_id = ?1",
                params![partner_id],
                |row| row.get(0),
            )
            .map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partners::NewPartner;
    use serde_json::json;

    #[test]
    fn usage_rows_accumulate_into_the_daily_rollup() {
        let store = Store::open_in_memory().unwrap();
        let partner = store.create_partner(&NewPartner::new("P")).unwrap();

        for i in 0..3u32 {
            store
                .record_usage(&NewUsage {
                    partner_id: partner.id.clone(),
                    endpoint: "recherche/google_places".to_string(),
                    method: "POST".to_string(),
                    parameters: json!({ "term": "Restaurant" }),
                    status_code: 200,
                    result_count: 10 + i,
                    cost_usd: 0.032,
                    response_time_ms: Some(120),
                })
                .unwrap();
        }

        assert_eq!(store.usage_count(&partner.id).unwrap(), 3);
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let (calls, results, cost) = store
            .usage_daily(&partner.id, &today, "recherche/google_places")
            .unwrap()
            .unwrap();
        assert_eq!(calls, 3);
        assert_eq!(results, 33);
        assert!((cost - 0.096).abs() < 1e-9);
    }
}
