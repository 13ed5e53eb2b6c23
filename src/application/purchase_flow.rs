use super::coordinator::ConnectionCoordinator;
use crate::domain::flow::{FlowParameters, PurchaseOptions, UpgradeParameters};
use crate::domain::outcome::{Outcome, ResponseCode};
use crate::domain::ports::{BillingServiceRef, SurfaceRef, UiRef};
use crate::domain::product::{ProductDetails, ProductQuery, ProductType};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// The three purchase pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseFlow {
    NewPurchase,
    NewSubscription,
    Upgrade(UpgradeParameters),
}

impl PurchaseFlow {
    fn product_type(&self) -> ProductType {
        match self {
            PurchaseFlow::NewPurchase => ProductType::OneTime,
            PurchaseFlow::NewSubscription | PurchaseFlow::Upgrade(_) => ProductType::Subscription,
        }
    }
}

/// Chains connect, lookup, validation, parameter building and launch.
///
/// Each step yields `Result<_, Outcome>` and the first failing step's outcome
/// is the flow's result; later steps never run. Only the launch leaves the
/// background context.
#[derive(Clone)]
pub struct PurchaseFlowOrchestrator {
    coordinator: ConnectionCoordinator,
    service: BillingServiceRef,
    ui: UiRef,
}

impl PurchaseFlowOrchestrator {
    pub fn new(coordinator: ConnectionCoordinator, service: BillingServiceRef, ui: UiRef) -> Self {
        Self {
            coordinator,
            service,
            ui,
        }
    }

    pub async fn buy_new(
        &self,
        surface: SurfaceRef,
        product_id: &str,
        options: &PurchaseOptions,
    ) -> Outcome {
        self.run(surface, PurchaseFlow::NewPurchase, product_id, options)
            .await
    }

    pub async fn buy_subscription(
        &self,
        surface: SurfaceRef,
        product_id: &str,
        options: &PurchaseOptions,
    ) -> Outcome {
        self.run(surface, PurchaseFlow::NewSubscription, product_id, options)
            .await
    }

    pub async fn upgrade_subscription(
        &self,
        surface: SurfaceRef,
        product_id: &str,
        upgrade: UpgradeParameters,
        options: &PurchaseOptions,
    ) -> Outcome {
        self.run(surface, PurchaseFlow::Upgrade(upgrade), product_id, options)
            .await
    }

    pub async fn run(
        &self,
        surface: SurfaceRef,
        flow: PurchaseFlow,
        product_id: &str,
        options: &PurchaseOptions,
    ) -> Outcome {
        match self.prepare(flow, product_id, options).await {
            Ok(params) => self.launch(surface, params).await,
            Err(outcome) => {
                warn!(product_id, %outcome, "purchase flow stopped before launch");
                outcome
            }
        }
    }

    async fn prepare(
        &self,
        flow: PurchaseFlow,
        product_id: &str,
        options: &PurchaseOptions,
    ) -> Result<FlowParameters, Outcome> {
        self.connect().await?;
        let product = self.lookup(flow.product_type(), product_id).await?;

        let params = match flow {
            PurchaseFlow::NewPurchase => FlowParameters::new(product),
            PurchaseFlow::NewSubscription => {
                let offer_token = first_offer_token(&product)?;
                FlowParameters::new(product).with_offer_token(offer_token)
            }
            PurchaseFlow::Upgrade(upgrade) => {
                let offer_token = first_offer_token(&product)?;
                FlowParameters::new(product)
                    .with_offer_token(offer_token)
                    .with_upgrade(upgrade)
            }
        };
        Ok(params.with_options(options))
    }

    async fn connect(&self) -> Result<(), Outcome> {
        let outcome = self.coordinator.ready().await;
        if outcome.is_ok() { Ok(()) } else { Err(outcome) }
    }

    async fn lookup(&self, product_type: ProductType, product_id: &str) -> Result<ProductDetails, Outcome> {
        let query = ProductQuery::single(product_type, product_id);
        let (outcome, products) = self.service.query_product_details(&query).await;
        if !outcome.is_ok() {
            return Err(outcome);
        }
        products.into_iter().next().ok_or_else(|| {
            Outcome::item_unavailable(format!("product '{}' not found", product_id))
        })
    }

    async fn launch(&self, surface: SurfaceRef, params: FlowParameters) -> Outcome {
        debug!(
            product_id = %params.product.product_id,
            offer = ?params.offer_token,
            upgrade = params.upgrade.is_some(),
            "launching purchase flow"
        );

        let (tx, rx) = oneshot::channel();
        let service = self.service.clone();
        self.ui.post(Box::new(move || {
            let outcome = service.launch_purchase_flow(surface.as_ref(), &params);
            let _ = tx.send(outcome);
        }));

        rx.await.unwrap_or_else(|_| {
            Outcome::new(ResponseCode::Error, "ui context dropped the purchase flow launch")
        })
    }
}

fn first_offer_token(product: &ProductDetails) -> Result<String, Outcome> {
    product
        .first_offer()
        .map(|offer| offer.offer_token.clone())
        .ok_or_else(|| {
            Outcome::item_unavailable(format!(
                "subscription '{}' has no offers",
                product.product_id
            ))
        })
}
