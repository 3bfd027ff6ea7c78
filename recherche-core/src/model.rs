//! Persisted domain entities.
//!
//! These mirror the storage schema one to one; the store crate maps rows
//! onto them and the engine mutates them only through store operations.
//! Money is integer cents throughout, timestamps are UTC, ids are UUID
//! strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RechercheError;
use crate::provider::RawRecord;
use crate::types::{OrderStatus, QualityTier, RateCard, RateLimits};

/// An API partner: the customer a recherche order bills against.
#[derive(Debug, Clone, PartialEq)]
pub struct Partner {
    /// UUID string.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Per-partner pricing.
    pub rate_card: RateCard,
    /// Per-partner fixed-window limits.
    pub rate_limits: RateLimits,
    /// Suspended partners are rejected at the HTTP surface.
    pub suspended: bool,
}

/// Result counters accumulated while processing one order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCounts {
    /// Raw results persisted across all providers.
    pub raw: u32,
    /// Companies newly created by dedup.
    pub new: u32,
    /// Records matched to a company already touched (or already complete).
    pub duplicate: u32,
    /// Records that enriched an existing company.
    pub updated: u32,
}

/// One recherche job: a partner's unit of billing and scheduling.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// UUID string.
    pub id: String,
    /// Owning partner.
    pub partner_id: String,
    /// Tier string as submitted; parsed inside the pipeline so an unknown
    /// tier fails the order instead of poisoning the lease.
    pub quality_tier: String,
    /// Search area: a single place.
    pub geo_ort_id: Option<String>,
    /// Search area: a district.
    pub geo_kreis_id: Option<String>,
    /// Search area: a postal code.
    pub plz: Option<String>,
    /// Google category id used to derive the search term.
    pub category_gcid: Option<String>,
    /// Free-text search term; takes precedence over the category.
    pub freitext: Option<String>,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Lease attempts so far; incremented when a worker claims the order.
    pub attempts: u32,
    /// Attempt ceiling; reached means no further leases.
    pub max_attempts: u32,
    /// Cost estimate shown at order creation.
    pub estimated_cost_cents: i64,
    /// Settled cost; set on completion.
    pub actual_cost_cents: Option<i64>,
    /// Result counters; set on completion.
    pub counts: OrderCounts,
    /// Failure detail, truncated to 1000 characters.
    pub error_message: Option<String>,
    /// Creation time; lease ordering key.
    pub created_at: DateTime<Utc>,
    /// When the current (or last) lease started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the order reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Parse the stored tier string.
    ///
    /// # Errors
    /// `UnknownTier` when the stored string is not a known tier.
    pub fn tier(&self) -> Result<QualityTier, RechercheError> {
        self.quality_tier.parse()
    }
}

/// A provider record persisted for one order. Immutable once written;
/// retained for audit.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    /// UUID string.
    pub id: String,
    /// Owning order.
    pub order_id: String,
    /// The normalized record as collected.
    pub record: RawRecord,
}

/// The deduplicated canonical entity in the company directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    /// UUID string.
    pub id: String,
    /// Canonical name (firmierung).
    pub name: String,
    /// Street address.
    pub address: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// City.
    pub city: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Website URL.
    pub website: Option<String>,
    /// Latitude.
    pub lat: Option<f64>,
    /// Longitude.
    pub lng: Option<f64>,
    /// Per-source blocks: `{ "<source>": { "external_id": ..., ... } }`.
    pub metadata: serde_json::Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last enrichment time.
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// The external id recorded for a source, if any.
    #[must_use]
    pub fn external_id_for(&self, source: &str) -> Option<&str> {
        self.metadata.get(source)?.get("external_id")?.as_str()
    }
}

/// Prepaid credit account, 1:1 with a partner. Created on first debit.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingAccount {
    /// UUID string.
    pub id: String,
    /// Owning partner (unique).
    pub partner_id: String,
    /// Current balance; may be negative down to the credit limit.
    pub balance_cents: i64,
    /// How far below zero the balance may go.
    pub credit_limit_cents: i64,
    /// Balance under which a low-balance warning is emitted.
    pub warning_threshold_cents: i64,
    /// When the last low-balance warning went out; at most one per 24 h.
    pub warning_sent_at: Option<DateTime<Utc>>,
    /// Suspended accounts reject debits.
    pub suspended: bool,
    /// Why the account was suspended.
    pub suspension_reason: Option<String>,
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Charge against the balance.
    Debit,
    /// Top-up.
    Credit,
    /// Reversal of an earlier debit.
    Refund,
}

impl TransactionKind {
    /// Stable string form as stored in the ledger.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Refund => "refund",
        }
    }

    /// Sign applied to `amount_cents` when summing the ledger.
    #[must_use]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Debit => -1,
            Self::Credit | Self::Refund => 1,
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = RechercheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            "refund" => Ok(Self::Refund),
            other => Err(RechercheError::InvalidArg(format!(
                "unknown transaction kind: {other}"
            ))),
        }
    }
}

/// What a ledger entry settles ("rch_auftrag" + order id, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRef {
    /// Referenced entity kind.
    pub kind: String,
    /// Referenced entity id.
    pub id: String,
}

impl TransactionRef {
    /// Reference to a recherche order.
    #[must_use]
    pub fn order(id: impl Into<String>) -> Self {
        Self {
            kind: "rch_auftrag".to_string(),
            id: id.into(),
        }
    }
}

/// One row of the append-only credit ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditTransaction {
    /// UUID string.
    pub id: String,
    /// Owning account.
    pub billing_account_id: String,
    /// Direction.
    pub kind: TransactionKind,
    /// Unsigned amount in cents; the sign comes from `kind`.
    pub amount_cents: i64,
    /// Balance after applying this entry.
    pub balance_after_cents: i64,
    /// Human-readable description.
    pub description: Option<String>,
    /// What this entry settles.
    pub reference: Option<TransactionRef>,
    /// Who booked the entry ("system", an admin login, ...).
    pub actor: String,
    /// Booking time.
    pub created_at: DateTime<Utc>,
}

