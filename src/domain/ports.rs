use super::flow::{BillingFeature, FlowParameters};
use super::outcome::Outcome;
use super::product::{ProductDetails, ProductQuery, ProductType};
use super::purchase::Purchase;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Receives the resolution of a connection attempt and later disconnects.
/// Called on whatever thread the store chooses.
pub trait ConnectionListener: Send + Sync {
    fn on_setup_finished(&self, outcome: Outcome);
    fn on_service_disconnected(&self);
}

/// Receives unsolicited purchase updates. `None` and `Some(vec![])` are
/// different signals and must not be conflated.
pub trait PurchasesUpdatedListener: Send + Sync {
    fn on_purchases_updated(&self, outcome: Outcome, purchases: Option<Vec<Purchase>>);
}

/// The caller-owned UI surface a purchase flow is launched from.
pub trait UiSurface: Send + Sync {
    fn surface_id(&self) -> &str;
}

/// The vendor billing service.
///
/// `start_connection` returns immediately; the attempt resolves later through
/// the listener. `launch_purchase_flow` must only be called on the UI-affine
/// context.
#[async_trait]
pub trait BillingService: Send + Sync {
    fn start_connection(&self, listener: Arc<dyn ConnectionListener>);
    fn is_ready(&self) -> bool;
    fn end_connection(&self);
    fn is_feature_supported(&self, feature: BillingFeature) -> Outcome;
    async fn query_product_details(&self, query: &ProductQuery) -> (Outcome, Vec<ProductDetails>);
    async fn query_purchases(&self, product_type: ProductType) -> (Outcome, Vec<Purchase>);
    fn launch_purchase_flow(&self, surface: &dyn UiSurface, params: &FlowParameters) -> Outcome;
    async fn consume(&self, purchase_token: String) -> (Outcome, String);
    async fn acknowledge(&self, purchase_token: String) -> Outcome;
}

pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single-threaded serial context. Owns coordinator state and runs every
/// operation except the purchase-flow launch.
pub trait BackgroundContext: Send + Sync {
    fn spawn(&self, task: Task);
}

/// Context bound to the thread that owns the caller's UI surface.
pub trait UiContext: Send + Sync {
    fn post(&self, job: Job);
}

pub type BillingServiceRef = Arc<dyn BillingService>;
pub type BackgroundRef = Arc<dyn BackgroundContext>;
pub type UiRef = Arc<dyn UiContext>;
pub type SurfaceRef = Arc<dyn UiSurface>;
