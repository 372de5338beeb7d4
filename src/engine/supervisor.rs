//! Generic worker supervision
//!
//! A supervisor owns the only cancellation handle for its worker and
//! guarantees at most one live worker per concern: a start intent while a
//! worker is already running cancels it and forks a fresh one, a stop intent
//! cancels it and returns to idle. The supervisor itself loops for the
//! process lifetime so repeated start/stop cycles keep working.

use crate::events::{EventBus, SwapEvent};

use futures::future::BoxFuture;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Builds a fresh worker future each time the supervisor forks one. The
/// worker must exit promptly once the token it was given is cancelled.
pub type WorkerFactory = Box<dyn FnMut(CancellationToken) -> BoxFuture<'static, ()> + Send>;

type EventPredicate = Box<dyn Fn(&SwapEvent) -> bool + Send>;

pub struct Supervisor {
    name: &'static str,
    bus: EventBus,
    is_start: EventPredicate,
    is_stop: EventPredicate,
    factory: WorkerFactory,
}

impl Supervisor {
    pub fn new(
        name: &'static str,
        bus: EventBus,
        is_start: impl Fn(&SwapEvent) -> bool + Send + 'static,
        is_stop: impl Fn(&SwapEvent) -> bool + Send + 'static,
        factory: WorkerFactory,
    ) -> Self {
        Self {
            name,
            bus,
            is_start: Box::new(is_start),
            is_stop: Box::new(is_stop),
            factory,
        }
    }

    /// Supervision loop. Runs until `shutdown` is cancelled or the bus closes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut rx = self.bus.subscribe();
        let mut active: Option<(CancellationToken, JoinHandle<()>)> = None;

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                recv = rx.recv() => match recv {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(supervisor = self.name, skipped, "supervisor lagged behind the bus");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            if (self.is_start)(&event) {
                if active.is_some() {
                    debug!(supervisor = self.name, "start while running, restarting worker");
                }
                cancel_active(&mut active).await;

                let token = CancellationToken::new();
                let worker = (self.factory)(token.clone());
                debug!(supervisor = self.name, "forking worker");
                active = Some((token, tokio::spawn(worker)));
            } else if (self.is_stop)(&event) {
                if active.is_some() {
                    debug!(supervisor = self.name, "stopping worker");
                }
                cancel_active(&mut active).await;
            }
        }

        cancel_active(&mut active).await;
        debug!(supervisor = self.name, "supervisor exited");
    }
}

/// Cancel the live worker, if any, and wait for it to finish its cleanup.
/// Cancelling an already-exited worker is a no-op.
async fn cancel_active(active: &mut Option<(CancellationToken, JoinHandle<()>)>) {
    if let Some((token, handle)) = active.take() {
        token.cancel();
        let _ = handle.await;
    }
}
