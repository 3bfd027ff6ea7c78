//! Key-value settings: the admin credential surface the dispatch loop
//! re-reads at the start of every iteration.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use recherche_core::RechercheError;

use crate::{Store, db_err, fmt_ts};

impl Store {
    /// Read a setting.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn setting(&self, key: &str) -> Result<Option<String>, RechercheError> {
        self.conn()
            .query_row(
                "SELECT value FROM app_setting WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
    }

    /// Read a setting, falling back to `default` when unset.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn setting_or(&self, key: &str, default: &str) -> Result<String, RechercheError> {
        Ok(self.setting(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// Write (or overwrite) a setting.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), RechercheError> {
        self.conn()
            .execute(
                "INSERT INTO app_setting (key, value, updated_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT (key) DO UPDATE SET value = excluded.value, \
                 updated_at = excluded.updated_at",
                params![key, value, fmt_ts(Utc::now())],
            )
            .map_err(db_err)?;
        Ok(())
    }
}
