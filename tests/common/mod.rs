#![allow(dead_code)]

use billing_bridge::application::dispatcher::BillingClient;
use billing_bridge::application::propagator::ResultPropagator;
use billing_bridge::config::StoreConfig;
use billing_bridge::domain::outcome::Outcome;
use billing_bridge::domain::ports::SurfaceRef;
use billing_bridge::domain::product::{
    OneTimeOffer, PricingPhase, ProductDetails, ProductType, SubscriptionOffer,
};
use billing_bridge::domain::purchase::Purchase;
use billing_bridge::infrastructure::executor::{SerialWorker, UiThread};
use billing_bridge::infrastructure::in_memory::{HeadlessSurface, InMemoryBillingService};
use std::sync::{Arc, Mutex};

pub type Updates = Arc<Mutex<Vec<(Outcome, Option<Vec<Purchase>>)>>>;

pub struct Harness {
    pub service: Arc<InMemoryBillingService>,
    pub propagator: Arc<ResultPropagator>,
    pub client: BillingClient,
    pub updates: Updates,
}

pub fn catalog() -> StoreConfig {
    let mut coins = ProductDetails::new("coin_100", ProductType::OneTime);
    coins.title = "100 coins".to_string();
    coins.one_time_offer = Some(OneTimeOffer {
        price_amount_micros: 990_000,
        formatted_price: "$0.99".to_string(),
        price_currency_code: "USD".to_string(),
    });

    let monthly = SubscriptionOffer {
        offer_token: "pro-monthly".to_string(),
        base_plan_id: "monthly".to_string(),
        offer_id: None,
        offer_tags: vec![],
        pricing_phases: vec![PricingPhase {
            billing_period: "P1M".to_string(),
            formatted_price: "$4.99".to_string(),
            price_amount_micros: 4_990_000,
            price_currency_code: "USD".to_string(),
            billing_cycle_count: 0,
            recurrence_mode: 1,
        }],
    };

    StoreConfig {
        products: vec![
            coins,
            ProductDetails::new("sub_pro", ProductType::Subscription).with_offer(monthly),
            ProductDetails::new("sub_empty", ProductType::Subscription),
        ],
        purchases: vec![
            Purchase::new("coin_100", ProductType::OneTime, "coin-token"),
            Purchase::new("sub_basic", ProductType::Subscription, "old_token_123"),
        ],
        ..Default::default()
    }
}

pub fn harness(config: StoreConfig) -> Harness {
    let updates: Updates = Arc::new(Mutex::new(Vec::new()));
    let propagator = Arc::new(ResultPropagator::new());
    let sink = updates.clone();
    propagator.subscribe_fn(move |outcome, purchases| {
        sink.lock().unwrap().push((outcome, purchases));
    });

    let service = Arc::new(InMemoryBillingService::new(config, propagator.clone()));
    let client = BillingClient::new(
        service.clone(),
        Arc::new(SerialWorker::start().unwrap()),
        Arc::new(UiThread::start().unwrap()),
    );

    Harness {
        service,
        propagator,
        client,
        updates,
    }
}

pub fn surface() -> SurfaceRef {
    Arc::new(HeadlessSurface::new("main-activity"))
}
