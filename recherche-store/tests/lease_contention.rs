//! The order lease must hand any order to exactly one claimant, even when
//! several connections poll the same database file.

use recherche_core::QualityTier;
use recherche_store::{NewOrder, NewPartner, Store};

#[test]
fn two_connections_never_lease_the_same_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recherche.db");

    let store_a = Store::open(&path).unwrap();
    let store_b = Store::open(&path).unwrap();

    let partner = store_a.create_partner(&NewPartner::new("P")).unwrap();
    for _ in 0..5 {
        let order = store_a
            .create_order(&NewOrder::new(&partner.id, QualityTier::Standard))
            .unwrap();
        store_a.confirm_order(&order.id).unwrap();
    }

    let mut leased = Vec::new();
    loop {
        let from_a = store_a.lease_next_order().unwrap();
        let from_b = store_b.lease_next_order().unwrap();
        let got_any = from_a.is_some() || from_b.is_some();
        leased.extend(from_a.into_iter().map(|o| o.id));
        leased.extend(from_b.into_iter().map(|o| o.id));
        if !got_any {
            break;
        }
    }

    assert_eq!(leased.len(), 5);
    let unique: std::collections::HashSet<_> = leased.iter().collect();
    assert_eq!(unique.len(), 5, "an order was leased twice: {leased:?}");
}

#[test]
fn threads_hammering_the_lease_split_the_work() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recherche.db");

    let store = Store::open(&path).unwrap();
    let partner = store.create_partner(&NewPartner::new("P")).unwrap();
    for _ in 0..20 {
        let order = store
            .create_order(&NewOrder::new(&partner.id, QualityTier::Standard))
            .unwrap();
        store.confirm_order(&order.id).unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let path = path.clone();
        handles.push(std::thread::spawn(move || {
            let store = Store::open(&path).unwrap();
            let mut ids = Vec::new();
            while let Some(order) = store.lease_next_order().unwrap() {
                ids.push(order.id);
            }
            ids
        }));
    }

    let mut all: Vec<String> = Vec::new();
    for handle in handles {
        all.extend(handle.join().unwrap());
    }
    assert_eq!(all.len(), 20);
    let unique: std::collections::HashSet<_> = all.iter().collect();
    assert_eq!(unique.len(), 20);
}
