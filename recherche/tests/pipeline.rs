//! End-to-end pipeline scenarios: lease, provider fan-out, dedup, cost,
//! settlement, and the failure dispositions.

mod helpers;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;

use helpers::{confirmed_order, once_worker, run_worker, store_with_partner};
use recherche_core::{OrderStatus, QualityTier, TransactionKind, TransactionRef};
use recherche_mock::{MockProvider, fixtures};
use recherche_store::{NewCompany, Store};

/// An existing company with every core field filled, carrying the given
/// external id for `source`. Matches by signal 1 and takes no updates.
fn seed_known_company(store: &Store, source: &str, external_id: &str, name: &str, i: u32) {
    store
        .insert_company(&NewCompany {
            name: name.to_string(),
            address: Some(format!("Altbestandstraße {i}, 44137 Dortmund")),
            postal_code: Some("44137".to_string()),
            city: Some("Dortmund".to_string()),
            phone: Some(format!("+49 231 999 {i:03}")),
            email: Some(format!("info-{i}@bestand.example")),
            website: Some(format!("https://bestand-{i}.example")),
            lat: Some(51.60),
            lng: Some(7.60),
            metadata: json!({ source: { "external_id": external_id } }),
        })
        .unwrap();
}

#[tokio::test]
async fn premium_order_settles_against_known_companies() {
    // E1: 5 raw results, 3 already known; cost 50 + 2 x 12 = 74 cents.
    let (store, partner_id) = store_with_partner(10_000);
    for i in 1..=3u32 {
        seed_known_company(&store, "google_places", &format!("gp-{i}"), &format!("Lokal {i}"), i);
    }
    let order = confirmed_order(&store, &partner_id, QualityTier::Premium);

    let records = (1..=5u32)
        .map(|i| fixtures::place("google_places", &format!("gp-{i}"), &format!("Lokal {i}")))
        .collect();
    let premium = Arc::new(
        MockProvider::named("google_places")
            .with_records(records)
            .with_cost(Decimal::new(32, 3)),
    );
    run_worker(&once_worker(&store, vec![premium])).await;

    let done = store.order_by_id(&order.id).unwrap().unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert_eq!(done.counts.raw, 5);
    assert_eq!(done.counts.new, 2);
    assert_eq!(done.counts.duplicate, 3);
    assert_eq!(done.counts.updated, 0);
    assert_eq!(done.actual_cost_cents, Some(74));

    let account = store.account_for_partner(&partner_id).unwrap();
    assert_eq!(account.balance_cents, 9926);

    // Exactly one debit references the order, and its amount is the cost.
    let transactions = store
        .transactions_for_reference(&TransactionRef::order(&order.id))
        .unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].kind, TransactionKind::Debit);
    assert_eq!(transactions[0].amount_cents, 74);
}

#[tokio::test]
async fn insufficient_funds_fail_the_order_but_keep_raw_results() {
    // E2: balance 20, credit limit 0, intended cost 100.
    let (store, partner_id) = store_with_partner(20);
    let order = confirmed_order(&store, &partner_id, QualityTier::Standard);

    let records = (1..=10u32)
        .map(|i| fixtures::sparse("dataforseo", &format!("cid-{i}"), &format!("Betrieb {i}")))
        .collect();
    let standard = Arc::new(MockProvider::named("dataforseo").with_records(records));
    run_worker(&once_worker(&store, vec![standard])).await;

    let failed = store.order_by_id(&order.id).unwrap().unwrap();
    assert_eq!(failed.status, OrderStatus::Failed);
    assert!(
        failed
            .error_message
            .as_deref()
            .unwrap()
            .contains("insufficient funds")
    );

    // Raw results survive the failure for audit; no debit was booked.
    assert_eq!(store.raw_results_for_order(&order.id).unwrap().len(), 10);
    assert!(
        store
            .transactions_for_reference(&TransactionRef::order(&order.id))
            .unwrap()
            .is_empty()
    );
    assert_eq!(store.account_for_partner(&partner_id).unwrap().balance_cents, 20);
}

#[tokio::test]
async fn komplett_merges_the_same_business_across_drivers() {
    // E4: premium returns [A, B], standard returns [A, C]; A carries the
    // same underlying id in both sources.
    let (store, partner_id) = store_with_partner(10_000);
    let order = confirmed_order(&store, &partner_id, QualityTier::Komplett);

    let premium = Arc::new(MockProvider::named("google_places").with_records(vec![
        fixtures::place("google_places", "shared-a", "Gasthaus Adler"),
        fixtures::place("google_places", "only-b", "Brauhaus Bellevue"),
    ]));
    let standard = Arc::new(MockProvider::named("dataforseo").with_records(vec![
        fixtures::sparse("dataforseo", "shared-a", "Gasthaus Adler"),
        fixtures::sparse("dataforseo", "only-c", "Café Central"),
    ]));
    run_worker(&once_worker(&store, vec![premium, standard])).await;

    let done = store.order_by_id(&order.id).unwrap().unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert_eq!(done.counts.raw, 4);
    assert_eq!(done.counts.new, 3);
    assert_eq!(done.counts.duplicate, 1);
    assert_eq!(store.company_count().unwrap(), 3);

    // The merged company carries both source blocks.
    let merged = store
        .find_company_by_external_id("google_places", "shared-a")
        .unwrap()
        .unwrap();
    assert_eq!(merged.external_id_for("dataforseo"), Some("shared-a"));
}

#[tokio::test]
async fn provider_failure_is_skipped_and_the_order_still_completes() {
    // E5: the premium driver 503s, the standard driver delivers.
    let (store, partner_id) = store_with_partner(10_000);
    let order = confirmed_order(&store, &partner_id, QualityTier::Komplett);

    let failing = Arc::new(MockProvider::named("google_places").failing());
    let records = (1..=4u32)
        .map(|i| fixtures::sparse("dataforseo", &format!("cid-{i}"), &format!("Betrieb {i}")))
        .collect();
    let standard = Arc::new(MockProvider::named("dataforseo").with_records(records));
    run_worker(&once_worker(&store, vec![failing, standard])).await;

    let done = store.order_by_id(&order.id).unwrap().unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert!(done.error_message.is_none());
    assert_eq!(done.counts.raw, 4);
    assert_eq!(done.counts.new, 4);

    // Both provider invocations are in the usage log: one failure, one
    // success.
    assert_eq!(store.usage_count(&partner_id).unwrap(), 2);
}

#[tokio::test]
async fn zero_results_cost_the_base_fee_only() {
    // Boundary: no provider results at all.
    let (store, partner_id) = store_with_partner(1_000);
    let order = confirmed_order(&store, &partner_id, QualityTier::Standard);

    let empty = Arc::new(MockProvider::named("dataforseo"));
    run_worker(&once_worker(&store, vec![empty])).await;

    let done = store.order_by_id(&order.id).unwrap().unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert_eq!(done.counts.raw, 0);
    assert_eq!(done.counts.new, 0);
    assert_eq!(done.actual_cost_cents, Some(50));
    assert_eq!(store.account_for_partner(&partner_id).unwrap().balance_cents, 950);
}

#[tokio::test]
async fn all_known_results_cost_the_base_fee_only() {
    // Boundary: every raw result matches an existing company.
    let (store, partner_id) = store_with_partner(1_000);
    for i in 1..=3u32 {
        seed_known_company(&store, "dataforseo", &format!("cid-{i}"), &format!("Betrieb {i}"), i);
    }
    let order = confirmed_order(&store, &partner_id, QualityTier::Standard);

    let records = (1..=3u32)
        .map(|i| fixtures::sparse("dataforseo", &format!("cid-{i}"), &format!("Betrieb {i}")))
        .collect();
    let standard = Arc::new(MockProvider::named("dataforseo").with_records(records));
    run_worker(&once_worker(&store, vec![standard])).await;

    let done = store.order_by_id(&order.id).unwrap().unwrap();
    assert_eq!(done.counts.new, 0);
    assert_eq!(done.counts.duplicate, 3);
    assert_eq!(done.actual_cost_cents, Some(50));
}

#[tokio::test]
async fn unknown_tier_fails_the_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recherche.db");
    let store = Store::open(&path).unwrap();
    let partner = store
        .create_partner(&recherche_store::NewPartner::new("P"))
        .unwrap();
    store.credit(&partner.id, 1_000, None, "test", "seed").unwrap();
    let order = confirmed_order(&store, &partner.id, QualityTier::Standard);

    // Another component wrote a tier this build does not know.
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE rch_auftrag SET quality_tier = 'gold' WHERE id = ?1",
        rusqlite::params![order.id],
    )
    .unwrap();
    drop(conn);

    let provider = Arc::new(MockProvider::named("dataforseo"));
    run_worker(&once_worker(&store, vec![provider])).await;

    let failed = store.order_by_id(&order.id).unwrap().unwrap();
    assert_eq!(failed.status, OrderStatus::Failed);
    assert!(
        failed
            .error_message
            .as_deref()
            .unwrap()
            .contains("unknown quality tier")
    );
}

#[tokio::test]
async fn worker_without_providers_leases_nothing() {
    let (store, partner_id) = store_with_partner(1_000);
    let order = confirmed_order(&store, &partner_id, QualityTier::Standard);

    run_worker(&once_worker(&store, vec![])).await;

    let untouched = store.order_by_id(&order.id).unwrap().unwrap();
    assert_eq!(untouched.status, OrderStatus::Confirmed);
    assert_eq!(untouched.attempts, 0);
}
