//! Order lifecycle: creation, confirmation, the atomic lease, and the two
//! terminal transitions.

use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

use recherche_core::{Order, OrderCounts, OrderStatus, QualityTier, RechercheError};

use crate::{Store, db_err, fmt_ts, new_id, parse_ts, parse_ts_required};

const ORDER_COLUMNS: &str = "id, partner_id, quality_tier, geo_ort_id, geo_kreis_id, plz, \
category_gcid, freitext, status, attempts, max_attempts, estimated_cost_cents, \
actual_cost_cents, raw_count, new_count, duplicate_count, updated_count, error_message, \
created_at, started_at, completed_at";

/// Failure details are capped so a deep provider stack trace cannot blow up
/// the row.
const ERROR_MESSAGE_MAX_CHARS: usize = 1000;

/// Parameters for a new recherche order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Owning partner.
    pub partner_id: String,
    /// Requested quality tier.
    pub quality_tier: QualityTier,
    /// Search area: a single place.
    pub geo_ort_id: Option<String>,
    /// Search area: a district.
    pub geo_kreis_id: Option<String>,
    /// Search area: a postal code.
    pub plz: Option<String>,
    /// Google category id used to derive the search term.
    pub category_gcid: Option<String>,
    /// Free-text search term.
    pub freitext: Option<String>,
    /// Cost estimate shown to the partner at creation.
    pub estimated_cost_cents: i64,
    /// Lease attempt ceiling.
    pub max_attempts: u32,
}

impl NewOrder {
    /// New order with the default attempt ceiling and no search parameters.
    #[must_use]
    pub fn new(partner_id: impl Into<String>, quality_tier: QualityTier) -> Self {
        Self {
            partner_id: partner_id.into(),
            quality_tier,
            geo_ort_id: None,
            geo_kreis_id: None,
            plz: None,
            category_gcid: None,
            freitext: None,
            estimated_cost_cents: 0,
            max_attempts: 3,
        }
    }
}

struct OrderRow {
    id: String,
    partner_id: String,
    quality_tier: String,
    geo_ort_id: Option<String>,
    geo_kreis_id: Option<String>,
    plz: Option<String>,
    category_gcid: Option<String>,
    freitext: Option<String>,
    status: String,
    attempts: u32,
    max_attempts: u32,
    estimated_cost_cents: i64,
    actual_cost_cents: Option<i64>,
    raw_count: u32,
    new_count: u32,
    duplicate_count: u32,
    updated_count: u32,
    error_message: Option<String>,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl OrderRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            partner_id: row.get(1)?,
            quality_tier: row.get(2)?,
            geo_ort_id: row.get(3)?,
            geo_kreis_id: row.get(4)?,
            plz: row.get(5)?,
            category_gcid: row.get(6)?,
            freitext: row.get(7)?,
            status: row.get(8)?,
            attempts: row.get(9)?,
            max_attempts: row.get(10)?,
            estimated_cost_cents: row.get(11)?,
            actual_cost_cents: row.get(12)?,
            raw_count: row.get(13)?,
            new_count: row.get(14)?,
            duplicate_count: row.get(15)?,
            updated_count: row.get(16)?,
            error_message: row.get(17)?,
            created_at: row.get(18)?,
            started_at: row.get(19)?,
            completed_at: row.get(20)?,
        })
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = RechercheError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            partner_id: row.partner_id,
            quality_tier: row.quality_tier,
            geo_ort_id: row.geo_ort_id,
            geo_kreis_id: row.geo_kreis_id,
            plz: row.plz,
            category_gcid: row.category_gcid,
            freitext: row.freitext,
            status: row.status.parse()?,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            estimated_cost_cents: row.estimated_cost_cents,
            actual_cost_cents: row.actual_cost_cents,
            counts: OrderCounts {
                raw: row.raw_count,
                new: row.new_count,
                duplicate: row.duplicate_count,
                updated: row.updated_count,
            },
            error_message: row.error_message,
            created_at: parse_ts_required(row.created_at)?,
            started_at: parse_ts(row.started_at)?,
            completed_at: parse_ts(row.completed_at)?,
        })
    }
}

impl Store {
    /// Insert a new order in status `draft`.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn create_order(&self, new: &NewOrder) -> Result<Order, RechercheError> {
        let id = new_id();
        let now = fmt_ts(Utc::now());
        self.conn()
            .execute(
                "INSERT INTO rch_auftrag (id, partner_id, quality_tier, geo_ort_id, \
                 geo_kreis_id, plz, category_gcid, freitext, status, max_attempts, \
                 estimated_cost_cents, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'draft', ?9, ?10, ?11)",
                params![
                    id,
                    new.partner_id,
                    new.quality_tier.as_str(),
                    new.geo_ort_id,
                    new.geo_kreis_id,
                    new.plz,
                    new.category_gcid,
                    new.freitext,
                    new.max_attempts,
                    new.estimated_cost_cents,
                    now,
                ],
            )
            .map_err(db_err)?;
        self.order_by_id(&id)?
            .ok_or_else(|| RechercheError::not_found(format!("order {id}")))
    }

    /// Move a draft order to `confirmed`, making it lease-eligible.
    ///
    /// # Errors
    /// `NotFound` when the order does not exist or is not a draft.
    pub fn confirm_order(&self, id: &str) -> Result<(), RechercheError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE rch_auftrag SET status = 'confirmed' WHERE id = ?1 AND status = 'draft'",
                params![id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(RechercheError::not_found(format!("draft order {id}")));
        }
        Ok(())
    }

    /// Fetch an order by id.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn order_by_id(&self, id: &str) -> Result<Option<Order>, RechercheError> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM rch_auftrag WHERE id = ?1"),
                params![id],
                OrderRow::from_row,
            )
            .optional()
            .map_err(db_err)?;
        row.map(Order::try_from).transpose()
    }

    /// Atomically claim the oldest confirmed order with remaining attempts:
    /// status becomes `processing`, `attempts` is incremented, and
    /// `started_at` is stamped, all in one statement. Exactly one caller
    /// wins under contention; everyone else sees `None` or the next order.
    ///
    /// # Errors
    /// `Database` on persistence failure.
    pub fn lease_next_order(&self) -> Result<Option<Order>, RechercheError> {
        let now = fmt_ts(Utc::now());
        let row = self
            .conn()
            .query_row(
                &format!(
                    "UPDATE rch_auftrag \
                     SET status = 'processing', attempts = attempts + 1, started_at = ?1 \
                     WHERE id = (SELECT id FROM rch_auftrag \
                                 WHERE status = 'confirmed' AND attempts < max_attempts \
                                 ORDER BY created_at, id LIMIT 1) \
                     RETURNING {ORDER_COLUMNS}"
                ),
                params![now],
                OrderRow::from_row,
            )
            .optional()
            .map_err(db_err)?;
        row.map(Order::try_from).transpose()
    }

    /// Terminal transition: the pipeline finished and settled.
    ///
    /// # Errors
    /// `NotFound` when the order does not exist.
    pub fn complete_order(
        &self,
        id: &str,
        counts: OrderCounts,
        actual_cost_cents: i64,
    ) -> Result<(), RechercheError> {
        let now = fmt_ts(Utc::now());
        let changed = self
            .conn()
            .execute(
                "UPDATE rch_auftrag SET status = ?1, raw_count = ?2, new_count = ?3, \
                 duplicate_count = ?4, updated_count = ?5, actual_cost_cents = ?6, \
                 completed_at = ?7 WHERE id = ?8",
                params![
                    OrderStatus::Completed.as_str(),
                    counts.raw,
                    counts.new,
                    counts.duplicate,
                    counts.updated,
                    actual_cost_cents,
                    now,
                    id,
                ],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(RechercheError::not_found(format!("order {id}")));
        }
        Ok(())
    }

    /// Terminal transition: the lease failed. The message is truncated to
    /// 1000 characters.
    ///
    /// # Errors
    /// `NotFound` when the order does not exist.
    pub fn fail_order(&self, id: &str, error: &str) -> Result<(), RechercheError> {
        let message: String = error.chars().take(ERROR_MESSAGE_MAX_CHARS).collect();
        let now = fmt_ts(Utc::now());
        let changed = self
            .conn()
            .execute(
                "UPDATE rch_auftrag SET status = ?1, error_message = ?2, completed_at = ?3 \
                 WHERE id = ?4",
                params![OrderStatus::Failed.as_str(), message, now, id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(RechercheError::not_found(format!("order {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partners::NewPartner;

    fn store_with_partner() -> (Store, String) {
        let store = Store::open_in_memory().unwrap();
        let partner = store.create_partner(&NewPartner::new("Testpartner")).unwrap();
        (store, partner.id)
    }

    fn confirmed_order(store: &Store, partner_id: &str) -> Order {
        let order = store
            .create_order(&NewOrder::new(partner_id, QualityTier::Premium))
            .unwrap();
        store.confirm_order(&order.id).unwrap();
        store.order_by_id(&order.id).unwrap().unwrap()
    }

    #[test]
    fn lease_claims_oldest_confirmed_order_once() {
        let (store, partner_id) = store_with_partner();
        let first = confirmed_order(&store, &partner_id);
        let second = confirmed_order(&store, &partner_id);

        let leased = store.lease_next_order().unwrap().unwrap();
        assert_eq!(leased.id, first.id);
        assert_eq!(leased.status, OrderStatus::Processing);
        assert_eq!(leased.attempts, 1);
        assert!(leased.started_at.is_some());

        let leased = store.lease_next_order().unwrap().unwrap();
        assert_eq!(leased.id, second.id);
        assert!(store.lease_next_order().unwrap().is_none());
    }

    #[test]
    fn drafts_are_never_leased() {
        let (store, partner_id) = store_with_partner();
        store
            .create_order(&NewOrder::new(&partner_id, QualityTier::Standard))
            .unwrap();
        assert!(store.lease_next_order().unwrap().is_none());
    }

    #[test]
    fn exhausted_attempts_block_further_leases() {
        let (store, partner_id) = store_with_partner();
        let mut new = NewOrder::new(&partner_id, QualityTier::Standard);
        new.max_attempts = 1;
        let order = store.create_order(&new).unwrap();
        store.confirm_order(&order.id).unwrap();

        let leased = store.lease_next_order().unwrap().unwrap();
        assert_eq!(leased.attempts, 1);
        store.fail_order(&leased.id, "provider exploded").unwrap();

        // Even if an operator were to flip the status back, attempts are
        // exhausted and the lease predicate skips the order.
        store
            .conn()
            .execute(
                "UPDATE rch_auftrag SET status = 'confirmed' WHERE id = ?1",
                params![leased.id],
            )
            .unwrap();
        assert!(store.lease_next_order().unwrap().is_none());
    }

    #[test]
    fn fail_order_truncates_long_messages() {
        let (store, partner_id) = store_with_partner();
        let order = confirmed_order(&store, &partner_id);
        store.lease_next_order().unwrap().unwrap();

        let long = "x".repeat(5000);
        store.fail_order(&order.id, &long).unwrap();
        let failed = store.order_by_id(&order.id).unwrap().unwrap();
        assert_eq!(failed.status, OrderStatus::Failed);
        assert_eq!(failed.error_message.unwrap().chars().count(), 1000);
        assert!(failed.completed_at.is_some());
    }

    #[test]
    fn complete_order_records_counts_and_cost() {
        let (store, partner_id) = store_with_partner();
        let order = confirmed_order(&store, &partner_id);
        store.lease_next_order().unwrap().unwrap();

        let counts = OrderCounts {
            raw: 5,
            new: 2,
            duplicate: 3,
            updated: 1,
        };
        store.complete_order(&order.id, counts, 74).unwrap();
        let done = store.order_by_id(&order.id).unwrap().unwrap();
        assert_eq!(done.status, OrderStatus::Completed);
        assert_eq!(done.counts, counts);
        assert_eq!(done.actual_cost_cents, Some(74));
    }
}
