use super::coordinator::ConnectionCoordinator;
use super::purchase_flow::PurchaseFlowOrchestrator;
use crate::domain::flow::{BillingFeature, PurchaseOptions, UpgradeParameters};
use crate::domain::outcome::{Outcome, ResponseCode};
use crate::domain::ports::{BackgroundRef, BillingServiceRef, SurfaceRef, UiRef};
use crate::domain::product::{ProductDetails, ProductQuery, ProductType};
use crate::domain::purchase::Purchase;
use std::future::Future;
use tracing::{debug, info};

/// The public entry point for billing operations.
///
/// Every operation is marshalled onto the background context, gated on the
/// connection where the store requires one, and answers through its callback
/// exactly once. Purchase-flow launches are the only work handed to the UI
/// context.
#[derive(Clone)]
pub struct BillingClient {
    service: BillingServiceRef,
    background: BackgroundRef,
    coordinator: ConnectionCoordinator,
    flows: PurchaseFlowOrchestrator,
}

impl BillingClient {
    pub fn new(service: BillingServiceRef, background: BackgroundRef, ui: UiRef) -> Self {
        let coordinator = ConnectionCoordinator::new(service.clone(), background.clone());
        let flows = PurchaseFlowOrchestrator::new(coordinator.clone(), service.clone(), ui);
        Self {
            service,
            background,
            coordinator,
            flows,
        }
    }

    pub fn coordinator(&self) -> &ConnectionCoordinator {
        &self.coordinator
    }

    pub fn is_product_details_supported<F>(&self, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.probe(BillingFeature::ProductDetails, callback);
    }

    pub fn is_subscriptions_supported<F>(&self, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.probe(BillingFeature::Subscriptions, callback);
    }

    pub fn is_subscriptions_update_supported<F>(&self, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.probe(BillingFeature::SubscriptionsUpdate, callback);
    }

    pub fn query_product_details<I, S, F>(&self, product_type: ProductType, product_ids: I, callback: F)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(Outcome, Vec<ProductDetails>) + Send + 'static,
    {
        let query = ProductQuery::new(product_type, product_ids);
        let service = self.service.clone();
        self.gated(
            |outcome| (outcome, Vec::new()),
            async move { service.query_product_details(&query).await },
            move |(outcome, products)| callback(outcome, products),
        );
    }

    pub fn query_purchases<F>(&self, product_type: ProductType, callback: F)
    where
        F: FnOnce(Outcome, Vec<Purchase>) + Send + 'static,
    {
        let service = self.service.clone();
        self.gated(
            |outcome| (outcome, Vec::new()),
            async move { service.query_purchases(product_type).await },
            move |(outcome, purchases)| callback(outcome, purchases),
        );
    }

    pub fn buy_new<F>(
        &self,
        surface: SurfaceRef,
        product_id: impl Into<String>,
        options: PurchaseOptions,
        callback: F,
    ) where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let flows = self.flows.clone();
        let product_id = product_id.into();
        self.run(
            async move { flows.buy_new(surface, &product_id, &options).await },
            callback,
        );
    }

    pub fn buy_subscription<F>(
        &self,
        surface: SurfaceRef,
        product_id: impl Into<String>,
        options: PurchaseOptions,
        callback: F,
    ) where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let flows = self.flows.clone();
        let product_id = product_id.into();
        self.run(
            async move { flows.buy_subscription(surface, &product_id, &options).await },
            callback,
        );
    }

    pub fn upgrade_subscription<F>(
        &self,
        surface: SurfaceRef,
        product_id: impl Into<String>,
        upgrade: UpgradeParameters,
        options: PurchaseOptions,
        callback: F,
    ) where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let flows = self.flows.clone();
        let product_id = product_id.into();
        self.run(
            async move {
                flows
                    .upgrade_subscription(surface, &product_id, upgrade, &options)
                    .await
            },
            callback,
        );
    }

    /// The callback receives the token back, whatever the outcome.
    pub fn consume<F>(&self, purchase_token: impl Into<String>, callback: F)
    where
        F: FnOnce(Outcome, String) + Send + 'static,
    {
        let purchase_token = purchase_token.into();
        let echoed = purchase_token.clone();
        let service = self.service.clone();
        self.gated(
            move |outcome| (outcome, echoed),
            async move { service.consume(purchase_token).await },
            move |(outcome, token)| callback(outcome, token),
        );
    }

    pub fn acknowledge<F>(&self, purchase_token: impl Into<String>, callback: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let purchase_token = purchase_token.into();
        let service = self.service.clone();
        self.gated(
            |outcome| outcome,
            async move { service.acknowledge(purchase_token).await },
            callback,
        );
    }

    /// Disconnects from the store if connected. Callers still waiting for a
    /// connection get `ServiceDisconnected`; the next gated call opens a new
    /// connection.
    pub fn end_connection(&self) {
        let service = self.service.clone();
        let coordinator = self.coordinator.clone();
        self.background.spawn(Box::pin(async move {
            if service.is_ready() {
                info!("ending billing service connection");
                service.end_connection();
            }
            coordinator.reset().await;
        }));
    }

    fn probe<F>(&self, feature: BillingFeature, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let service = self.service.clone();
        self.run(
            async move {
                let outcome = service.is_feature_supported(feature);
                debug!(?feature, code = ?outcome.code, "feature probe");
                outcome.code != ResponseCode::FeatureNotSupported
            },
            callback,
        );
    }

    /// Runs `work` once the connection is ready; otherwise answers with
    /// `on_failure` built from the connection outcome.
    fn gated<T, W, G, F>(&self, on_failure: G, work: W, callback: F)
    where
        T: Send + 'static,
        W: Future<Output = T> + Send + 'static,
        G: FnOnce(Outcome) -> T + Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let coordinator = self.coordinator.clone();
        self.run(
            async move {
                let outcome = coordinator.ready().await;
                if outcome.is_ok() {
                    work.await
                } else {
                    debug!(%outcome, "request rejected by connection gate");
                    on_failure(outcome)
                }
            },
            callback,
        );
    }

    fn run<T, W, F>(&self, work: W, callback: F)
    where
        T: Send + 'static,
        W: Future<Output = T> + Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        self.background.spawn(Box::pin(async move {
            callback(work.await);
        }));
    }
}
