use crate::domain::outcome::{Outcome, ResponseCode};
use crate::domain::ports::{BackgroundRef, BillingServiceRef, ConnectionListener};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

pub type ReadyCallback = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// `pending` is non-empty only while `state` is `Connecting`. `attempt`
/// identifies the connection attempt whose callbacks are still honoured.
#[derive(Default)]
struct CoordinatorState {
    state: ConnectionState,
    pending: VecDeque<ReadyCallback>,
    attempt: u64,
}

/// Owns the connection state of one service handle.
///
/// Every read and write of the state happens in a task on the background
/// context, including the handling of the store's own callbacks, which may
/// arrive on any thread. At most one connection attempt is in flight and all
/// callers waiting on it receive its outcome, in the order they asked.
#[derive(Clone)]
pub struct ConnectionCoordinator {
    service: BillingServiceRef,
    background: BackgroundRef,
    inner: Arc<Mutex<CoordinatorState>>,
}

impl ConnectionCoordinator {
    pub fn new(service: BillingServiceRef, background: BackgroundRef) -> Self {
        Self {
            service,
            background,
            inner: Arc::new(Mutex::new(CoordinatorState::default())),
        }
    }

    /// Calls `on_ready` exactly once with the connection outcome, starting a
    /// connection attempt only if none is connected or in flight.
    pub fn ensure_connection<F>(&self, on_ready: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let this = self.clone();
        self.background.spawn(Box::pin(async move {
            this.enqueue(Box::new(on_ready)).await;
        }));
    }

    /// Awaitable form of [`ensure_connection`](Self::ensure_connection).
    pub async fn ready(&self) -> Outcome {
        let (tx, rx) = oneshot::channel();
        self.ensure_connection(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await.unwrap_or_else(|_| {
            Outcome::new(
                ResponseCode::ServiceDisconnected,
                "background context stopped before the connection resolved",
            )
        })
    }

    /// Snapshot of the state, read on the background context.
    pub async fn state(&self) -> ConnectionState {
        let (tx, rx) = oneshot::channel();
        let inner = self.inner.clone();
        self.background.spawn(Box::pin(async move {
            let _ = tx.send(inner.lock().await.state);
        }));
        rx.await.unwrap_or_default()
    }

    /// Forgets the connection so that the next caller reconnects. Callers
    /// waiting on an attempt in flight get `ServiceDisconnected`, and that
    /// attempt's late resolution is ignored.
    ///
    /// Must run in a task on the background context.
    pub async fn reset(&self) {
        let waiters = {
            let mut guard = self.inner.lock().await;
            guard.attempt += 1;
            let waiters = std::mem::take(&mut guard.pending);
            if guard.state != ConnectionState::Disconnected {
                debug!(state = ?guard.state, waiters = waiters.len(), "connection reset");
                guard.state = ConnectionState::Disconnected;
            }
            waiters
        };

        for on_ready in waiters {
            on_ready(Outcome::new(
                ResponseCode::ServiceDisconnected,
                "connection ended before it was established",
            ));
        }
    }

    async fn enqueue(&self, on_ready: ReadyCallback) {
        let mut guard = self.inner.lock().await;
        match guard.state {
            ConnectionState::Connected => {
                drop(guard);
                on_ready(Outcome::ok());
            }
            ConnectionState::Connecting => {
                guard.pending.push_back(on_ready);
                debug!(waiting = guard.pending.len(), "joined in-flight connection attempt");
            }
            ConnectionState::Disconnected => {
                guard.pending.push_back(on_ready);
                guard.state = ConnectionState::Connecting;
                guard.attempt += 1;
                let attempt = guard.attempt;
                drop(guard);

                info!(attempt, "starting billing service connection");
                let listener = Arc::new(StateListener {
                    inner: self.inner.clone(),
                    background: self.background.clone(),
                    attempt,
                });
                self.service.start_connection(listener);
            }
        }
    }
}

/// Bridges the store's connection callbacks back onto the background context.
/// Callbacks for an attempt that has since been reset are dropped.
struct StateListener {
    inner: Arc<Mutex<CoordinatorState>>,
    background: BackgroundRef,
    attempt: u64,
}

impl ConnectionListener for StateListener {
    fn on_setup_finished(&self, outcome: Outcome) {
        let inner = self.inner.clone();
        let attempt = self.attempt;
        self.background.spawn(Box::pin(async move {
            let waiters = {
                let mut guard = inner.lock().await;
                if guard.attempt != attempt {
                    debug!(attempt, %outcome, "stale connection attempt resolved, ignored");
                    return;
                }
                guard.state = if outcome.is_ok() {
                    ConnectionState::Connected
                } else {
                    ConnectionState::Disconnected
                };
                std::mem::take(&mut guard.pending)
            };

            if outcome.is_ok() {
                info!(waiters = waiters.len(), "billing service connected");
            } else {
                warn!(%outcome, waiters = waiters.len(), "billing service connection failed");
            }

            for on_ready in waiters {
                on_ready(outcome.clone());
            }
        }));
    }

    fn on_service_disconnected(&self) {
        let inner = self.inner.clone();
        let attempt = self.attempt;
        self.background.spawn(Box::pin(async move {
            let mut guard = inner.lock().await;
            if guard.attempt != attempt {
                return;
            }
            match guard.state {
                ConnectionState::Connected => {
                    warn!("billing service disconnected, next request reconnects");
                    guard.state = ConnectionState::Disconnected;
                }
                // The pending attempt still owns its waiters.
                ConnectionState::Connecting => {
                    debug!("disconnect notification while connecting ignored");
                }
                ConnectionState::Disconnected => {}
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::domain::ports::PurchasesUpdatedListener;
    use crate::domain::purchase::Purchase;
    use crate::infrastructure::executor::SerialWorker;
    use crate::infrastructure::in_memory::InMemoryBillingService;

    struct Ignore;

    impl PurchasesUpdatedListener for Ignore {
        fn on_purchases_updated(&self, _: Outcome, _: Option<Vec<Purchase>>) {}
    }

    fn setup() -> (Arc<InMemoryBillingService>, ConnectionCoordinator) {
        let service = Arc::new(InMemoryBillingService::new(
            StoreConfig::default(),
            Arc::new(Ignore),
        ));
        service.set_hold_connections(true);
        let background = Arc::new(SerialWorker::start().unwrap());
        let coordinator = ConnectionCoordinator::new(service.clone(), background);
        (service, coordinator)
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_attempt() {
        let (service, coordinator) = setup();
        let mut receivers = Vec::new();

        for i in 0..8 {
            let (tx, rx) = oneshot::channel();
            coordinator.ensure_connection(move |outcome| {
                let _ = tx.send((i, outcome));
            });
            receivers.push(rx);
        }

        assert_eq!(coordinator.state().await, ConnectionState::Connecting);
        assert_eq!(service.connection_attempts(), 1);

        let failure = Outcome::new(ResponseCode::BillingUnavailable, "no account");
        service.resolve_held_connections(failure.clone());

        for (expected, rx) in receivers.into_iter().enumerate() {
            let (i, outcome) = rx.await.unwrap();
            assert_eq!(i, expected);
            assert_eq!(outcome, failure);
        }
        assert_eq!(coordinator.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connected_resolves_without_new_attempt() {
        let (service, coordinator) = setup();

        let first = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.ready().await }
        });
        while coordinator.state().await != ConnectionState::Connecting {
            tokio::task::yield_now().await;
        }
        service.resolve_held_connections(Outcome::ok());
        assert!(first.await.unwrap().is_ok());

        assert!(coordinator.ready().await.is_ok());
        assert!(coordinator.ready().await.is_ok());
        assert_eq!(service.connection_attempts(), 1);
    }

    #[tokio::test]
    async fn test_failed_attempt_retries_on_next_call() {
        let (service, coordinator) = setup();

        coordinator.ensure_connection(|_| {});
        while coordinator.state().await != ConnectionState::Connecting {
            tokio::task::yield_now().await;
        }
        service.resolve_held_connections(Outcome::from(ResponseCode::ServiceUnavailable));
        while coordinator.state().await != ConnectionState::Disconnected {
            tokio::task::yield_now().await;
        }

        coordinator.ensure_connection(|_| {});
        assert_eq!(coordinator.state().await, ConnectionState::Connecting);
        assert_eq!(service.connection_attempts(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_triggers_fresh_attempt() {
        let (service, coordinator) = setup();
        service.set_hold_connections(false);

        assert!(coordinator.ready().await.is_ok());
        assert_eq!(coordinator.state().await, ConnectionState::Connected);

        service.simulate_disconnect();
        while coordinator.state().await != ConnectionState::Disconnected {
            tokio::task::yield_now().await;
        }

        assert!(coordinator.ready().await.is_ok());
        assert_eq!(service.connection_attempts(), 2);
    }

    async fn reset_on_background(coordinator: &ConnectionCoordinator) {
        let (tx, rx) = oneshot::channel();
        let this = coordinator.clone();
        coordinator.background.spawn(Box::pin(async move {
            this.reset().await;
            let _ = tx.send(());
        }));
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_forgets_connection() {
        let (service, coordinator) = setup();
        service.set_hold_connections(false);

        assert!(coordinator.ready().await.is_ok());
        reset_on_background(&coordinator).await;
        assert_eq!(coordinator.state().await, ConnectionState::Disconnected);

        assert!(coordinator.ready().await.is_ok());
        assert_eq!(service.connection_attempts(), 2);
    }

    #[tokio::test]
    async fn test_reset_mid_attempt_ignores_late_resolution() {
        let (service, coordinator) = setup();

        let (tx, waiter) = oneshot::channel();
        coordinator.ensure_connection(move |outcome| {
            let _ = tx.send(outcome);
        });
        while coordinator.state().await != ConnectionState::Connecting {
            tokio::task::yield_now().await;
        }

        reset_on_background(&coordinator).await;
        assert_eq!(waiter.await.unwrap().code, ResponseCode::ServiceDisconnected);

        assert_eq!(service.resolve_held_connections(Outcome::ok()), 1);
        assert_eq!(coordinator.state().await, ConnectionState::Disconnected);

        let second = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.ready().await }
        });
        while service.connection_attempts() < 2 {
            tokio::task::yield_now().await;
        }
        service.resolve_held_connections(Outcome::ok());

        assert!(second.await.unwrap().is_ok());
        assert_eq!(coordinator.state().await, ConnectionState::Connected);
    }
}
