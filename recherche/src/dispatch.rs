//! The dispatch engine: polls for confirmed orders, leases one at a time,
//! and drives the pipeline from provider fan-out to credit settlement.
//!
//! Several identical workers may run against the same database; the
//! atomic lease in the store is the only coordination between them.
//! Within a worker everything is sequential: providers are invoked in
//! tier order, and no lock is held across an external HTTP call.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use serde_json::json;
use tokio::sync::watch;
use tokio::time::Instant;

use recherche_core::{
    Order, OrderCounts, ProviderRegistry, RechercheError, SearchQuery, TransactionRef,
};
use recherche_providers::{DataForSeoProvider, GooglePlacesProvider};
use recherche_store::{NewUsage, Store};

use crate::cost::cost_cents;
use crate::dedup::DedupEngine;
use crate::params::resolve_search_params;

/// A provider call that has not answered after this long counts as a
/// provider failure, not an order failure.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Result cap per provider when the setting is absent or unparseable.
const DEFAULT_MAX_RESULTS: usize = 60;

const GOOGLE_API_KEY_SETTING: &str = "recherche.google_places_api_key";
const DATAFORSEO_LOGIN_SETTING: &str = "recherche.dataforseo_login";
const DATAFORSEO_PASSWORD_SETTING: &str = "recherche.dataforseo_password";
const MAX_RESULTS_SETTING: &str = "bulk_action_max_results";

type RegistryBuilder = Box<dyn Fn(&Store) -> Result<ProviderRegistry, RechercheError> + Send + Sync>;

/// Worker knobs, mirrored by the binary's CLI flags.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between empty polls; the empty-registry sleep is six times
    /// this.
    pub poll_interval: Duration,
    /// Process at most one order, then exit.
    pub once: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            once: false,
        }
    }
}

/// A single polling worker.
pub struct Worker {
    store: Store,
    config: WorkerConfig,
    registry_builder: RegistryBuilder,
}

impl Worker {
    /// Worker that builds its provider registry from the stored admin
    /// credentials on every iteration, so key rotations take effect
    /// without a restart.
    #[must_use]
    pub fn new(store: Store, config: WorkerConfig) -> Self {
        Self {
            store,
            config,
            registry_builder: Box::new(registry_from_settings),
        }
    }

    /// Swap the registry source (tests inject mock providers here).
    #[must_use]
    pub fn with_registry_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(&Store) -> Result<ProviderRegistry, RechercheError> + Send + Sync + 'static,
    {
        self.registry_builder = Box::new(builder);
        self
    }

    /// Run the polling loop until the shutdown flag flips (or, in `once`
    /// mode, after at most one order). An in-flight order always finishes;
    /// no new lease is attempted after the flag.
    ///
    /// # Errors
    /// `Database` when the store fails irrecoverably while leasing.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), RechercheError> {
        tracing::info!(
            poll_interval_s = self.config.poll_interval.as_secs(),
            once = self.config.once,
            "recherche worker started"
        );

        while !*shutdown.borrow() {
            let registry = match (self.registry_builder)(&self.store) {
                Ok(registry) => registry,
                Err(e) => {
                    tracing::error!(error = %e, "failed to build provider registry");
                    if self.config.once {
                        return Err(e);
                    }
                    if sleep_or_shutdown(&mut shutdown, self.config.poll_interval).await {
                        break;
                    }
                    continue;
                }
            };

            if registry.is_empty() {
                tracing::warn!(
                    "no providers configured; set credentials via the admin settings \
                     (recherche.google_places_api_key, recherche.dataforseo_login, \
                     recherche.dataforseo_password)"
                );
                if self.config.once {
                    return Ok(());
                }
                if sleep_or_shutdown(&mut shutdown, self.config.poll_interval * 6).await {
                    break;
                }
                continue;
            }

            match self.store.lease_next_order() {
                Ok(Some(order)) => {
                    tracing::info!(
                        order_id = %order.id,
                        attempt = order.attempts,
                        max_attempts = order.max_attempts,
                        tier = %order.quality_tier,
                        "processing order"
                    );
                    self.process_order(&order, &registry).await;
                    if self.config.once {
                        return Ok(());
                    }
                }
                Ok(None) => {
                    if self.config.once {
                        tracing::info!("no orders to process");
                        return Ok(());
                    }
                    if sleep_or_shutdown(&mut shutdown, self.config.poll_interval).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "order lease failed");
                    if self.config.once {
                        return Err(e);
                    }
                    if sleep_or_shutdown(&mut shutdown, self.config.poll_interval).await {
                        break;
                    }
                }
            }
        }

        tracing::info!("recherche worker stopped");
        Ok(())
    }

    /// Drive one leased order to a terminal status. Pipeline errors are
    /// terminal for this lease: the order goes to FAILED with a truncated
    /// message, and a retry takes an operator action.
    async fn process_order(&self, order: &Order, registry: &ProviderRegistry) {
        match self.run_pipeline(order, registry).await {
            Ok((counts, cost_cents)) => {
                tracing::info!(
                    order_id = %order.id,
                    raw = counts.raw,
                    new = counts.new,
                    duplicate = counts.duplicate,
                    updated = counts.updated,
                    cost_cents,
                    "order completed"
                );
            }
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "order failed");
                if let Err(inner) = self.store.fail_order(&order.id, &e.to_string()) {
                    tracing::error!(
                        order_id = %order.id,
                        error = %inner,
                        "failed to mark order as failed"
                    );
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        order: &Order,
        registry: &ProviderRegistry,
    ) -> Result<(OrderCounts, i64), RechercheError> {
        let tier = order.tier()?;
        let partner = self
            .store
            .partner_by_id(&order.partner_id)?
            .ok_or_else(|| RechercheError::not_found(format!("partner {}", order.partner_id)))?;

        let params = resolve_search_params(&self.store, order)?;
        tracing::info!(
            order_id = %order.id,
            lat = params.lat,
            lng = params.lng,
            radius_m = params.radius_m,
            term = %params.term,
            "search parameters resolved"
        );

        let max_results = self
            .store
            .setting_or(MAX_RESULTS_SETTING, "")?
            .parse()
            .unwrap_or(DEFAULT_MAX_RESULTS);
        let query = SearchQuery {
            lat: params.lat,
            lng: params.lng,
            radius_m: params.radius_m,
            term: params.term,
            category: None,
            max_results,
        };

        let providers = registry.providers_for(tier)?;
        tracing::info!(
            order_id = %order.id,
            providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "providers selected"
        );

        let mut records = Vec::new();
        let mut total_api_cost_usd = 0.0f64;
        for provider in providers {
            let started = Instant::now();
            let outcome =
                tokio::time::timeout(PROVIDER_TIMEOUT, provider.search(&query)).await;
            let elapsed_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

            let (status_code, result_count, cost_usd) = match outcome {
                Ok(Ok(outcome)) => {
                    let count = u32::try_from(outcome.records.len()).unwrap_or(u32::MAX);
                    let cost = outcome.api_cost_usd.to_f64().unwrap_or(0.0);
                    tracing::info!(
                        provider = provider.name(),
                        results = count,
                        cost_usd = cost,
                        "provider search finished"
                    );
                    total_api_cost_usd += cost;
                    records.extend(outcome.records);
                    (200, count, cost)
                }
                Ok(Err(e)) => {
                    // Recovered locally: the order continues on partial data.
                    tracing::error!(provider = provider.name(), error = %e, "provider failed");
                    (502, 0, 0.0)
                }
                Err(_) => {
                    tracing::error!(
                        provider = provider.name(),
                        timeout_s = PROVIDER_TIMEOUT.as_secs(),
                        "provider timed out"
                    );
                    (504, 0, 0.0)
                }
            };

            self.store.record_usage(&NewUsage {
                partner_id: order.partner_id.clone(),
                endpoint: format!("recherche/{}", provider.name()),
                method: "POST".to_string(),
                parameters: json!({
                    "order_id": order.id,
                    "term": query.term,
                    "lat": query.lat,
                    "lng": query.lng,
                    "radius_m": query.radius_m,
                    "max_results": query.max_results,
                }),
                status_code,
                result_count,
                cost_usd,
                response_time_ms: Some(elapsed_ms),
            })?;
        }

        if records.is_empty() {
            tracing::warn!(order_id = %order.id, "no results from any provider");
        }

        self.store.insert_raw_results(&order.id, &records)?;

        let stats = DedupEngine::new(self.store.clone()).run(&order.id)?;
        let counts = OrderCounts {
            raw: u32::try_from(records.len()).unwrap_or(u32::MAX),
            new: stats.new,
            duplicate: stats.duplicate,
            updated: stats.updated,
        };

        let cost = cost_cents(tier, stats.new, &partner.rate_card)?;
        self.store.debit(
            &order.partner_id,
            cost,
            Some(&TransactionRef::order(&order.id)),
            "system",
            &format!("Recherche {} ({} neue Unternehmen)", tier, stats.new),
        )?;

        self.store.complete_order(&order.id, counts, cost)?;
        tracing::debug!(
            order_id = %order.id,
            api_cost_usd = total_api_cost_usd,
            "external api costs accumulated"
        );
        Ok((counts, cost))
    }
}

/// Default registry source: read the admin credentials and register every
/// driver that is actually configured.
fn registry_from_settings(store: &Store) -> Result<ProviderRegistry, RechercheError> {
    let mut registry = ProviderRegistry::new();

    let api_key = store.setting_or(GOOGLE_API_KEY_SETTING, "")?;
    if api_key.is_empty() {
        tracing::warn!("google places api key not configured");
    } else {
        registry.register(Arc::new(GooglePlacesProvider::new(api_key)?));
        tracing::info!("google places provider registered");
    }

    let login = store.setting_or(DATAFORSEO_LOGIN_SETTING, "")?;
    let password = store.setting_or(DATAFORSEO_PASSWORD_SETTING, "")?;
    if login.is_empty() || password.is_empty() {
        tracing::warn!("dataforseo credentials not configured");
    } else {
        registry.register(Arc::new(DataForSeoProvider::new(login, password)?));
        tracing::info!("dataforseo provider registered");
    }

    Ok(registry)
}

/// Sleep for `duration`, waking early on shutdown. Returns whether the
/// worker should stop.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        () = tokio::time::sleep(duration) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
