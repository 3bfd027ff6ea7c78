//! The provider contract and the normalized raw-record shape.
//!
//! Every external business-listing API is wrapped in one driver that owns
//! authentication, pagination, and normalization into [`RawRecord`]. The
//! dispatch engine only ever talks to [`RechercheProvider`] trait objects.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RechercheError;

/// A geographic search request handed to a provider driver.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Center latitude.
    pub lat: f64,
    /// Center longitude.
    pub lng: f64,
    /// Search radius in meters; drivers cap this at their API's maximum.
    pub radius_m: u32,
    /// Search term, e.g. "Restaurant".
    pub term: String,
    /// Optional category filter understood by the provider.
    pub category: Option<String>,
    /// Maximum number of records to collect across all pages.
    pub max_results: usize,
}

impl SearchQuery {
    /// Build a query with no category filter.
    #[must_use]
    pub fn new(lat: f64, lng: f64, radius_m: u32, term: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            radius_m,
            term: term.into(),
            category: None,
            max_results: 60,
        }
    }

    /// Override the page-spanning result cap.
    #[must_use]
    pub const fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }
}

/// A provider result normalized to the common shape.
///
/// Providers map each foreign field onto this record and drop entries
/// lacking a non-empty `name`. Anything outside the common shape (ratings,
/// opening hours, source-specific ids) goes into `payload` verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Provider name that produced this record ("google_places", ...).
    pub source: String,
    /// Stable identifier within the source (place id, cid, ...).
    pub external_id: Option<String>,
    /// Business name; never empty.
    pub name: String,
    /// Street address as reported by the source.
    pub address: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// City.
    pub city: Option<String>,
    /// Phone number as reported, unnormalized.
    pub phone: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Website URL as reported, unnormalized.
    pub website: Option<String>,
    /// Primary category as reported by the source.
    pub category: Option<String>,
    /// Latitude, if the source reports coordinates.
    pub lat: Option<f64>,
    /// Longitude, if the source reports coordinates.
    pub lng: Option<f64>,
    /// Source-specific fields outside the common shape.
    pub payload: serde_json::Value,
}

impl RawRecord {
    /// Minimal record with only source and name set.
    #[must_use]
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            external_id: None,
            name: name.into(),
            address: None,
            postal_code: None,
            city: None,
            phone: None,
            email: None,
            website: None,
            category: None,
            lat: None,
            lng: None,
            payload: serde_json::Value::Null,
        }
    }
}

/// Records collected by one provider invocation plus the actual API cost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// Normalized records in provider-returned order.
    pub records: Vec<RawRecord>,
    /// Actual cost reported by (or estimated for) the API, in USD.
    pub api_cost_usd: Decimal,
}

impl SearchOutcome {
    /// Outcome with records and a cost figure.
    #[must_use]
    pub const fn new(records: Vec<RawRecord>, api_cost_usd: Decimal) -> Self {
        Self {
            records,
            api_cost_usd,
        }
    }
}

/// Contract implemented by every external business-listing driver.
///
/// Drivers own their native pagination and stop when the result cap is
/// reached, the server reports no next page, or a page comes back short.
/// HTTP failures are recovered inside the driver by returning whatever was
/// collected so far; retries are an order-level concern, never a driver one.
#[async_trait]
pub trait RechercheProvider: Send + Sync {
    /// Stable identifier used by the registry and the tier table.
    fn name(&self) -> &'static str;

    /// Whether the driver has usable credentials. Unconfigured drivers are
    /// filtered out when the registry is rebuilt.
    fn configured(&self) -> bool {
        true
    }

    /// External API cost per request (USD). Informational; used for usage
    /// accounting, never for customer billing.
    fn cost_per_request(&self) -> Decimal;

    /// Execute a paginated search and return normalized records with the
    /// actual API cost incurred.
    async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, RechercheError>;
}

impl std::fmt::Debug for dyn RechercheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RechercheProvider")
            .field("name", &self.name())
            .finish()
    }
}
