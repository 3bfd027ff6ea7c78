//! recherche
//!
//! The orchestration core of the business-data enrichment service: a
//! polling dispatch engine that leases confirmed orders, fans out to the
//! tier's providers, deduplicates the haul against the company directory,
//! and settles the cost against the partner's prepaid credit.
//!
//! - `dispatch`: the worker loop and the per-order pipeline.
//! - `dedup`: the multi-signal matching engine.
//! - `cost`: tier-based order pricing.
//! - `limiter`: per-partner fixed-window rate limiting.
//! - `params`: search-parameter resolution from geo reference data.

pub mod cost;
pub mod dedup;
pub mod dispatch;
pub mod limiter;
pub mod params;

pub use crate::cost::cost_cents;
pub use crate::dedup::{DedupEngine, DedupStats};
pub use crate::dispatch::{Worker, WorkerConfig};
pub use crate::limiter::{RateLimiter, WindowStatus};
pub use crate::params::{SearchParams, resolve_search_params};
