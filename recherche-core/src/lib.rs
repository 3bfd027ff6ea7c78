//! recherche-core
//!
//! Core types, traits, and utilities shared across the recherche workspace.
//!
//! - `types`: quality tiers, order statuses, rate cards, money helpers.
//! - `provider`: the `RechercheProvider` contract and normalized records.
//! - `registry`: tier-to-provider mapping and the provider registry.
//! - `model`: persisted domain entities (orders, companies, billing).
#![warn(missing_docs)]

/// Unified error type shared by the engine, store, and providers.
pub mod error;
/// Persisted domain entities and their building blocks.
pub mod model;
/// Normalization helpers backing the dedup signal chain.
pub mod normalize;
/// The provider contract and the normalized raw-record shape.
pub mod provider;
/// Provider registry and the static tier-to-provider table.
pub mod registry;
pub mod types;

pub use error::RechercheError;
pub use model::{
    BillingAccount, Company, CreditTransaction, Order, OrderCounts, Partner, RawResult,
    TransactionKind, TransactionRef,
};
pub use provider::{RawRecord, RechercheProvider, SearchOutcome, SearchQuery};
pub use registry::ProviderRegistry;
pub use types::{OrderStatus, QualityTier, RateCard, RateLimits, euros_to_cents};
