//! Shared fixtures for the engine integration tests.

use std::sync::Arc;
use std::time::Duration;

use recherche::{Worker, WorkerConfig};
use recherche_core::{Order, ProviderRegistry, QualityTier, RechercheError};
use recherche_mock::MockProvider;
use recherche_store::{NewOrder, NewPartner, Store};

/// In-memory store with one partner topped up to `balance_cents`.
pub fn store_with_partner(balance_cents: i64) -> (Store, String) {
    let store = Store::open_in_memory().unwrap();
    let partner = store
        .create_partner(&NewPartner::new("Testpartner GmbH"))
        .unwrap();
    if balance_cents > 0 {
        store
            .credit(&partner.id, balance_cents, None, "test", "seed balance")
            .unwrap();
    }
    (store, partner.id)
}

/// Registry builder that re-registers the given mocks on every iteration.
pub fn registry_of(
    providers: Vec<Arc<MockProvider>>,
) -> impl Fn(&Store) -> Result<ProviderRegistry, RechercheError> + Send + Sync + 'static {
    move |_| {
        let mut registry = ProviderRegistry::new();
        for provider in &providers {
            let provider: Arc<dyn recherche_core::RechercheProvider> =
                Arc::clone(provider) as Arc<dyn recherche_core::RechercheProvider>;
            registry.register(provider);
        }
        Ok(registry)
    }
}

/// A confirmed order ready for leasing.
pub fn confirmed_order(store: &Store, partner_id: &str, tier: QualityTier) -> Order {
    let order = store
        .create_order(&NewOrder::new(partner_id, tier))
        .unwrap();
    store.confirm_order(&order.id).unwrap();
    store.order_by_id(&order.id).unwrap().unwrap()
}

/// Single-shot worker over mock providers.
pub fn once_worker(
    store: &Store,
    providers: Vec<Arc<MockProvider>>,
) -> Worker {
    Worker::new(
        store.clone(),
        WorkerConfig {
            poll_interval: Duration::from_millis(10),
            once: true,
        },
    )
    .with_registry_builder(registry_of(providers))
}

/// Run a worker to completion with a shutdown channel nobody pulls.
pub async fn run_worker(worker: &Worker) {
    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    worker.run(shutdown_rx).await.unwrap();
}
