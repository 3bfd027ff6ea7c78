//! recherche-store
//!
//! SQLite persistence for the recherche pipeline. One [`Store`] handle wraps
//! a mutex-guarded connection and exposes focused repository methods per
//! concern (orders, companies, billing, usage, settings, geo reference
//! data). The database is the sole cross-worker coordination point; the
//! order lease is a single atomic `UPDATE ... RETURNING`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

use recherche_core::RechercheError;

mod billing;
mod companies;
mod geo;
mod orders;
mod partners;
mod raw_results;
mod schema;
mod settings;
mod usage;

pub use crate::billing::LedgerEntry;
pub use crate::companies::NewCompany;
pub use crate::geo::{GeoKreis, GeoOrt, GoogleCategory};
pub use crate::orders::NewOrder;
pub use crate::partners::NewPartner;
pub use crate::usage::NewUsage;

/// Handle to the recherche database. Cheap to clone; all clones share one
/// connection guarded by a mutex, so statement sequences stay serialized
/// within the process while separate worker processes coordinate through
/// SQLite's own locking.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (and if necessary create) the database at `path`, switch it to
    /// WAL mode, and apply the schema.
    ///
    /// # Errors
    /// `Database` when the file cannot be opened or the schema fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RechercheError> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database (tests).
    ///
    /// # Errors
    /// `Database` when the schema fails to apply.
    pub fn open_in_memory() -> Result<Self, RechercheError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, RechercheError> {
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(db_err)?;
        conn.execute_batch(schema::SCHEMA_SQL).map_err(db_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

/// Map a rusqlite error onto the workspace error type.
pub(crate) fn db_err(err: rusqlite::Error) -> RechercheError {
    RechercheError::database(err)
}

/// Fresh UUID string for a new row.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Fixed-width UTC timestamp; lexicographic order equals chronological.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back; `None` passes through.
pub(crate) fn parse_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>, RechercheError> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RechercheError::data(format!("bad timestamp '{s}': {e}")))
    })
    .transpose()
}

/// Parse a stored timestamp that must be present.
pub(crate) fn parse_ts_required(raw: String) -> Result<DateTime<Utc>, RechercheError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RechercheError::data(format!("bad timestamp '{raw}': {e}")))
}
