//! recherche-mock
//!
//! Deterministic mock provider for engine and dispatch tests. Scripted
//! records come back on every search; switches force failures or latency
//! so orchestration paths (skip-on-failure, timeouts) can be exercised
//! without a network.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use recherche_core::{RawRecord, RechercheError, RechercheProvider, SearchOutcome, SearchQuery};

pub mod fixtures;

/// Scripted provider: returns the configured records on every search.
pub struct MockProvider {
    name: &'static str,
    records: Vec<RawRecord>,
    cost_per_request: Decimal,
    fail: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<SearchQuery>>,
}

impl MockProvider {
    /// Mock registered under `name`; use a real driver name ("dataforseo",
    /// "google_places") to satisfy the tier table.
    #[must_use]
    pub const fn named(name: &'static str) -> Self {
        Self {
            name,
            records: Vec::new(),
            cost_per_request: Decimal::ZERO,
            fail: false,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Records every search returns.
    #[must_use]
    pub fn with_records(mut self, records: Vec<RawRecord>) -> Self {
        self.records = records;
        self
    }

    /// Per-invocation cost the mock reports.
    #[must_use]
    pub const fn with_cost(mut self, cost_per_request: Decimal) -> Self {
        self.cost_per_request = cost_per_request;
        self
    }

    /// Every search fails with a provider error.
    #[must_use]
    pub const fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Every search sleeps first; combine with a short caller timeout.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queries received so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<SearchQuery> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RechercheProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn cost_per_request(&self) -> Decimal {
        self.cost_per_request
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome, RechercheError> {
        self.calls.lock().push(query.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RechercheError::provider(self.name, "forced failure (HTTP 503)"));
        }
        let records: Vec<RawRecord> = self
            .records
            .iter()
            .take(query.max_results)
            .cloned()
            .collect();
        Ok(SearchOutcome::new(records, self.cost_per_request))
    }
}
