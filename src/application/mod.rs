//! Application layer coordinating connection state and request execution.
//!
//! `BillingClient` is the entry point. It gates requests on the
//! `ConnectionCoordinator`, which serializes its state on a single background
//! context, and delegates purchase flows to the `PurchaseFlowOrchestrator`.
//! `ResultPropagator` relays unsolicited purchase updates to one subscriber.

pub mod coordinator;
pub mod dispatcher;
pub mod propagator;
pub mod purchase_flow;
