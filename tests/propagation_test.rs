mod common;

use billing_bridge::domain::outcome::{Outcome, ResponseCode};
use billing_bridge::domain::product::ProductType;
use billing_bridge::domain::purchase::Purchase;
use common::{catalog, harness};
use std::sync::{Arc, Mutex};
use std::thread;

#[test]
fn test_push_from_store_thread_keeps_absent_and_empty_apart() {
    let h = harness(catalog());
    let service = h.service.clone();

    thread::spawn(move || {
        service.push_purchases_update(Outcome::from(ResponseCode::UserCanceled), None);
        service.push_purchases_update(Outcome::ok(), Some(vec![]));
    })
    .join()
    .unwrap();

    let updates = h.updates.lock().unwrap();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].0.code, ResponseCode::UserCanceled);
    assert_eq!(updates[0].1, None);
    assert_eq!(updates[1].1, Some(vec![]));
}

#[test]
fn test_resubscribing_redirects_pushes() {
    let h = harness(catalog());
    let late: Arc<Mutex<Vec<Option<Vec<Purchase>>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = late.clone();
    h.propagator.subscribe_fn(move |_, purchases| {
        sink.lock().unwrap().push(purchases);
    });

    let purchase = Purchase::new("coin_100", ProductType::OneTime, "t-1");
    h.service
        .push_purchases_update(Outcome::ok(), Some(vec![purchase.clone()]));

    assert!(h.updates.lock().unwrap().is_empty());
    assert_eq!(*late.lock().unwrap(), vec![Some(vec![purchase])]);

    h.propagator.unsubscribe();
    h.service.push_purchases_update(Outcome::ok(), None);
    assert_eq!(late.lock().unwrap().len(), 1);
}
