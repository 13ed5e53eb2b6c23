use crate::config::{StoreConfig, StoreOperation};
use crate::domain::flow::{BillingFeature, FlowParameters};
use crate::domain::outcome::{Outcome, ResponseCode};
use crate::domain::ports::{BillingService, ConnectionListener, PurchasesUpdatedListener, UiSurface};
use crate::domain::product::{ProductDetails, ProductQuery, ProductType};
use crate::domain::purchase::Purchase;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// A UI surface with nothing behind it, for headless hosts and tests.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    id: String,
}

impl HeadlessSurface {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl UiSurface for HeadlessSurface {
    fn surface_id(&self) -> &str {
        &self.id
    }
}

/// One call to `launch_purchase_flow`, as the store saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRecord {
    pub surface_id: String,
    pub thread_name: Option<String>,
    pub params: FlowParameters,
}

struct StoreState {
    config: StoreConfig,
    owned: Vec<Purchase>,
    connected: bool,
    connection_attempts: usize,
    hold_connections: bool,
    held: Vec<Arc<dyn ConnectionListener>>,
    listener: Option<Arc<dyn ConnectionListener>>,
    launches: Vec<LaunchRecord>,
    next_order: u64,
}

/// A scriptable billing store kept entirely in memory.
///
/// Connection attempts resolve on a freshly spawned thread, like a remote
/// store calling back from its own binder thread, unless connections are held
/// for manual resolution.
pub struct InMemoryBillingService {
    state: Mutex<StoreState>,
    purchases_listener: Arc<dyn PurchasesUpdatedListener>,
}

impl InMemoryBillingService {
    pub fn new(config: StoreConfig, purchases_listener: Arc<dyn PurchasesUpdatedListener>) -> Self {
        let owned = config.purchases.clone();
        Self {
            state: Mutex::new(StoreState {
                config,
                owned,
                connected: false,
                connection_attempts: 0,
                hold_connections: false,
                held: Vec::new(),
                listener: None,
                launches: Vec::new(),
                next_order: 0,
            }),
            purchases_listener,
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// While held, connection attempts stay pending until
    /// [`resolve_held_connections`](Self::resolve_held_connections).
    pub fn set_hold_connections(&self, hold: bool) {
        self.state().hold_connections = hold;
    }

    /// Resolves every held attempt with `outcome` on the calling thread.
    pub fn resolve_held_connections(&self, outcome: Outcome) -> usize {
        let held = {
            let mut state = self.state();
            if !state.held.is_empty() {
                state.connected = outcome.is_ok();
            }
            std::mem::take(&mut state.held)
        };
        for listener in &held {
            listener.on_setup_finished(outcome.clone());
        }
        held.len()
    }

    /// Drops the connection and tells the connection listener about it.
    pub fn simulate_disconnect(&self) {
        let listener = {
            let mut state = self.state();
            state.connected = false;
            state.listener.clone()
        };
        if let Some(listener) = listener {
            listener.on_service_disconnected();
        }
    }

    /// Emits an unsolicited purchase update.
    pub fn push_purchases_update(&self, outcome: Outcome, purchases: Option<Vec<Purchase>>) {
        self.purchases_listener.on_purchases_updated(outcome, purchases);
    }

    pub fn set_response(&self, operation: StoreOperation, code: ResponseCode) {
        self.state().config.responses.insert(operation, code);
    }

    pub fn add_product(&self, product: ProductDetails) {
        self.state().config.products.push(product);
    }

    pub fn connection_attempts(&self) -> usize {
        self.state().connection_attempts
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.state().launches.clone()
    }

    pub fn owned_purchases(&self) -> Vec<Purchase> {
        self.state().owned.clone()
    }

    fn guard(&self, state: &StoreState, operation: StoreOperation) -> Option<Outcome> {
        if !state.connected {
            return Some(Outcome::new(
                ResponseCode::ServiceDisconnected,
                "store is not connected",
            ));
        }
        let code = state.config.response(operation);
        if code != ResponseCode::Ok {
            return Some(Outcome::new(code, format!("{:?} rejected by store", operation)));
        }
        None
    }

    fn find_products(&self, query: &ProductQuery) -> (Outcome, Vec<ProductDetails>) {
        let state = self.state();
        if let Some(outcome) = self.guard(&state, StoreOperation::QueryProductDetails) {
            return (outcome, Vec::new());
        }
        let found = state
            .config
            .products
            .iter()
            .filter(|p| p.product_type == query.product_type && query.contains(&p.product_id))
            .cloned()
            .collect();
        (Outcome::ok(), found)
    }

    fn find_purchases(&self, product_type: ProductType) -> (Outcome, Vec<Purchase>) {
        let state = self.state();
        if let Some(outcome) = self.guard(&state, StoreOperation::QueryPurchases) {
            return (outcome, Vec::new());
        }
        let found = state
            .owned
            .iter()
            .filter(|p| p.product_type == product_type)
            .cloned()
            .collect();
        (Outcome::ok(), found)
    }

    fn remove_consumable(&self, purchase_token: &str) -> Outcome {
        let mut state = self.state();
        if let Some(outcome) = self.guard(&state, StoreOperation::Consume) {
            return outcome;
        }
        let position = state.owned.iter().position(|p| {
            p.purchase_token == purchase_token && p.product_type == ProductType::OneTime
        });
        match position {
            Some(index) => {
                state.owned.remove(index);
                Outcome::ok()
            }
            None => Outcome::new(ResponseCode::ItemNotOwned, "no consumable purchase for token"),
        }
    }

    fn mark_acknowledged(&self, purchase_token: &str) -> Outcome {
        let mut state = self.state();
        if let Some(outcome) = self.guard(&state, StoreOperation::Acknowledge) {
            return outcome;
        }
        match state
            .owned
            .iter_mut()
            .find(|p| p.purchase_token == purchase_token)
        {
            Some(purchase) => {
                purchase.acknowledged = true;
                Outcome::ok()
            }
            None => Outcome::new(ResponseCode::ItemNotOwned, "no purchase for token"),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[async_trait]
impl BillingService for InMemoryBillingService {
    fn start_connection(&self, listener: Arc<dyn ConnectionListener>) {
        let mut state = self.state();
        state.connection_attempts += 1;
        state.listener = Some(listener.clone());
        if state.hold_connections {
            debug!(attempt = state.connection_attempts, "holding connection attempt");
            state.held.push(listener);
            return;
        }

        let code = state.config.response(StoreOperation::Connect);
        state.connected = code == ResponseCode::Ok;
        let delay = Duration::from_millis(state.config.connect_delay_ms);
        debug!(attempt = state.connection_attempts, ?code, "resolving connection attempt");
        drop(state);

        thread::spawn(move || {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            listener.on_setup_finished(Outcome::from(code));
        });
    }

    fn is_ready(&self) -> bool {
        self.state().connected
    }

    fn end_connection(&self) {
        let mut state = self.state();
        state.connected = false;
        state.listener = None;
    }

    fn is_feature_supported(&self, feature: BillingFeature) -> Outcome {
        if self.state().config.unsupported_features.contains(&feature) {
            Outcome::new(ResponseCode::FeatureNotSupported, format!("{:?}", feature))
        } else {
            Outcome::ok()
        }
    }

    async fn query_product_details(&self, query: &ProductQuery) -> (Outcome, Vec<ProductDetails>) {
        self.find_products(query)
    }

    async fn query_purchases(&self, product_type: ProductType) -> (Outcome, Vec<Purchase>) {
        self.find_purchases(product_type)
    }

    fn launch_purchase_flow(&self, surface: &dyn UiSurface, params: &FlowParameters) -> Outcome {
        let mut state = self.state();
        if let Some(outcome) = self.guard(&state, StoreOperation::Launch) {
            return outcome;
        }

        state.launches.push(LaunchRecord {
            surface_id: surface.surface_id().to_string(),
            thread_name: thread::current().name().map(str::to_string),
            params: params.clone(),
        });

        let purchase_code = state.config.response(StoreOperation::Purchase);
        let (outcome, purchases) = if purchase_code == ResponseCode::Ok {
            state.next_order += 1;
            let order = state.next_order;
            let product = &params.product;
            let mut purchase = Purchase::new(
                product.product_id.clone(),
                product.product_type,
                format!("token-{}-{}", product.product_id, order),
            );
            purchase.order_id = Some(format!("GPA.0000-{:04}", order));
            purchase.purchase_time = now_millis();
            purchase.obfuscated_account_id = params.obfuscated_account_id.clone();
            purchase.obfuscated_profile_id = params.obfuscated_profile_id.clone();

            if let Some(upgrade) = &params.upgrade {
                state
                    .owned
                    .retain(|p| p.purchase_token != upgrade.old_purchase_token);
            }
            state.owned.push(purchase.clone());
            (Outcome::ok(), Some(vec![purchase]))
        } else {
            (Outcome::from(purchase_code), None)
        };
        drop(state);

        self.purchases_listener.on_purchases_updated(outcome, purchases);
        Outcome::ok()
    }

    async fn consume(&self, purchase_token: String) -> (Outcome, String) {
        let outcome = self.remove_consumable(&purchase_token);
        (outcome, purchase_token)
    }

    async fn acknowledge(&self, purchase_token: String) -> Outcome {
        self.mark_acknowledged(&purchase_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::SubscriptionOffer;

    #[derive(Default)]
    struct Recorder {
        updates: Mutex<Vec<(Outcome, Option<Vec<Purchase>>)>>,
        setups: Mutex<Vec<Outcome>>,
    }

    impl PurchasesUpdatedListener for Recorder {
        fn on_purchases_updated(&self, outcome: Outcome, purchases: Option<Vec<Purchase>>) {
            self.updates.lock().unwrap().push((outcome, purchases));
        }
    }

    impl ConnectionListener for Recorder {
        fn on_setup_finished(&self, outcome: Outcome) {
            self.setups.lock().unwrap().push(outcome);
        }

        fn on_service_disconnected(&self) {}
    }

    fn store(recorder: Arc<Recorder>) -> InMemoryBillingService {
        let config = StoreConfig {
            products: vec![
                ProductDetails::new("coin_100", ProductType::OneTime),
                ProductDetails::new("sub_pro", ProductType::Subscription).with_offer(
                    SubscriptionOffer {
                        offer_token: "offer-1".to_string(),
                        base_plan_id: "monthly".to_string(),
                        offer_id: None,
                        offer_tags: vec![],
                        pricing_phases: vec![],
                    },
                ),
            ],
            purchases: vec![Purchase::new("coin_100", ProductType::OneTime, "owned-1")],
            ..Default::default()
        };
        let service = InMemoryBillingService::new(config, recorder.clone());
        service.set_hold_connections(true);
        service.start_connection(recorder);
        service.resolve_held_connections(Outcome::ok());
        service
    }

    #[tokio::test]
    async fn test_query_filters_by_type_and_id() {
        let service = store(Arc::new(Recorder::default()));

        let query = ProductQuery::new(ProductType::OneTime, ["coin_100", "sub_pro"]);
        let (outcome, found) = service.query_product_details(&query).await;

        assert!(outcome.is_ok());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].product_id, "coin_100");
    }

    #[tokio::test]
    async fn test_operations_fail_when_disconnected() {
        let recorder = Arc::new(Recorder::default());
        let service = InMemoryBillingService::new(StoreConfig::default(), recorder);

        let (outcome, token) = service.consume("owned-1".to_string()).await;
        assert_eq!(outcome.code, ResponseCode::ServiceDisconnected);
        assert_eq!(token, "owned-1");
    }

    #[tokio::test]
    async fn test_consume_removes_one_time_purchase() {
        let service = store(Arc::new(Recorder::default()));

        let (outcome, _) = service.consume("owned-1".to_string()).await;
        assert!(outcome.is_ok());
        assert!(service.owned_purchases().is_empty());

        let (again, _) = service.consume("owned-1".to_string()).await;
        assert_eq!(again.code, ResponseCode::ItemNotOwned);
    }

    #[tokio::test]
    async fn test_acknowledge_marks_purchase() {
        let service = store(Arc::new(Recorder::default()));

        assert!(service.acknowledge("owned-1".to_string()).await.is_ok());
        assert!(service.owned_purchases()[0].acknowledged);
        assert_eq!(
            service.acknowledge("missing".to_string()).await.code,
            ResponseCode::ItemNotOwned
        );
    }

    #[test]
    fn test_launch_pushes_purchase_update() {
        let recorder = Arc::new(Recorder::default());
        let service = store(recorder.clone());
        let params = FlowParameters::new(ProductDetails::new("coin_100", ProductType::OneTime));

        let outcome = service.launch_purchase_flow(&HeadlessSurface::new("main"), &params);

        assert!(outcome.is_ok());
        let updates = recorder.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        let purchases = updates[0].1.as_ref().unwrap();
        assert_eq!(purchases[0].product_ids, vec!["coin_100".to_string()]);
        assert_eq!(service.launches()[0].surface_id, "main");
    }

    #[test]
    fn test_cancelled_purchase_pushes_absent_list() {
        let recorder = Arc::new(Recorder::default());
        let service = store(recorder.clone());
        service.set_response(StoreOperation::Purchase, ResponseCode::UserCanceled);
        let params = FlowParameters::new(ProductDetails::new("coin_100", ProductType::OneTime));

        service.launch_purchase_flow(&HeadlessSurface::new("main"), &params);

        let updates = recorder.updates.lock().unwrap();
        assert_eq!(updates[0].0.code, ResponseCode::UserCanceled);
        assert!(updates[0].1.is_none());
    }

    #[test]
    fn test_held_connection_resolves_manually() {
        let recorder = Arc::new(Recorder::default());
        let service = InMemoryBillingService::new(StoreConfig::default(), recorder.clone());
        service.set_hold_connections(true);

        service.start_connection(recorder.clone());
        assert!(!service.is_ready());
        assert!(recorder.setups.lock().unwrap().is_empty());

        assert_eq!(service.resolve_held_connections(Outcome::ok()), 1);
        assert!(service.is_ready());
        assert_eq!(*recorder.setups.lock().unwrap(), vec![Outcome::ok()]);
        assert_eq!(service.connection_attempts(), 1);
    }

    #[test]
    fn test_unsupported_feature() {
        let config = StoreConfig {
            unsupported_features: vec![BillingFeature::SubscriptionsUpdate],
            ..Default::default()
        };
        let service = InMemoryBillingService::new(config, Arc::new(Recorder::default()));

        assert_eq!(
            service
                .is_feature_supported(BillingFeature::SubscriptionsUpdate)
                .code,
            ResponseCode::FeatureNotSupported
        );
        assert!(service.is_feature_supported(BillingFeature::Subscriptions).is_ok());
    }
}
