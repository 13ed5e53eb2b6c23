use crate::domain::outcome::Outcome;
use crate::domain::ports::PurchasesUpdatedListener;
use crate::domain::purchase::Purchase;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

/// Forwards the store's purchase pushes to a single subscriber, untouched.
///
/// Registering a new subscriber replaces the previous one. Events arriving
/// with nobody subscribed are dropped.
#[derive(Default)]
pub struct ResultPropagator {
    subscriber: RwLock<Option<Arc<dyn PurchasesUpdatedListener>>>,
}

impl ResultPropagator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn PurchasesUpdatedListener>) {
        *self
            .subscriber
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscriber);
    }

    /// Registers a closure as the subscriber.
    pub fn subscribe_fn<F>(&self, f: F)
    where
        F: Fn(Outcome, Option<Vec<Purchase>>) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnSubscriber(f)));
    }

    pub fn unsubscribe(&self) {
        *self
            .subscriber
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn has_subscriber(&self) -> bool {
        self.subscriber
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl PurchasesUpdatedListener for ResultPropagator {
    fn on_purchases_updated(&self, outcome: Outcome, purchases: Option<Vec<Purchase>>) {
        // Clone out so the subscriber runs without the lock held.
        let subscriber = self
            .subscriber
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match subscriber {
            Some(subscriber) => {
                trace!(
                    code = ?outcome.code,
                    purchases = ?purchases.as_ref().map(Vec::len),
                    "forwarding purchase update"
                );
                subscriber.on_purchases_updated(outcome, purchases);
            }
            None => debug!(code = ?outcome.code, "purchase update dropped, no subscriber"),
        }
    }
}

struct FnSubscriber<F>(F);

impl<F> PurchasesUpdatedListener for FnSubscriber<F>
where
    F: Fn(Outcome, Option<Vec<Purchase>>) + Send + Sync,
{
    fn on_purchases_updated(&self, outcome: Outcome, purchases: Option<Vec<Purchase>>) {
        (self.0)(outcome, purchases)
    }
}
