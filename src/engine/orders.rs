//! Order lifecycle: one-shot submission and status polling
//!
//! The submitter is fire-and-forget per request and never retries; a failed
//! submission requires a fresh user-initiated request. The status poller
//! cycles until its supervisor cancels it, with one exception: the
//! provider's "cancelled" terminal status makes it exit on its own.

use crate::events::{EventBus, Notification, OrderParams, Provider, SwapEvent};
use crate::exchange::ExchangeApi;
use crate::state::SwapStore;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub const TEN_SECONDS: Duration = Duration::from_secs(10);
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Connection error. Please try again later or contact support.";

/// The step shown once an order is accepted and awaiting payment.
pub const PROCESSING_STEP: u8 = 3;

pub struct OrderSubmitter {
    api: Arc<dyn ExchangeApi>,
    store: Arc<SwapStore>,
    bus: EventBus,
}

impl OrderSubmitter {
    pub fn new(api: Arc<dyn ExchangeApi>, store: Arc<SwapStore>, bus: EventBus) -> Self {
        Self { api, store, bus }
    }

    /// Submit one order creation request and kick off the downstream flow.
    pub async fn submit(&self, params: OrderParams) {
        let provider = params.provider();

        // The rate poller competes with the order call; stop it first.
        self.bus.publish(SwapEvent::StopLoadRates { provider });

        match self.api.create_order(&params).await {
            Ok(data) => {
                crate::metrics::record_order_created(provider, true);
                self.store.apply_order(provider, &data).await;
                self.store.set_step(PROCESSING_STEP).await;

                self.bus.publish(SwapEvent::OrderCreateSucceeded { provider });
                self.bus.publish(SwapEvent::StepChanged { step: PROCESSING_STEP });
                self.bus.publish(SwapEvent::StartOrderTimer);
                self.bus.publish(SwapEvent::StartPollOrderStatus { provider });
            }
            Err(err) => {
                crate::metrics::record_order_created(provider, false);
                let message = if err.is_structured() {
                    err.to_string()
                } else {
                    error!(%provider, %err, "order creation failed");
                    CONNECTION_ERROR_MESSAGE.to_string()
                };
                self.bus.notify(Notification::danger_timed(message, TEN_SECONDS));
                self.bus.publish(SwapEvent::OrderCreateFailed { provider });
            }
        }
    }
}

pub struct StatusPoller {
    provider: Provider,
    api: Arc<dyn ExchangeApi>,
    store: Arc<SwapStore>,
    bus: EventBus,
    poll_interval: Duration,
}

impl StatusPoller {
    pub fn new(
        api: Arc<dyn ExchangeApi>,
        store: Arc<SwapStore>,
        bus: EventBus,
        poll_interval: Duration,
    ) -> Self {
        Self {
            provider: api.provider(),
            api,
            store,
            bus,
            poll_interval,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = self.poll_loop() => {}
        }
        if token.is_cancelled() {
            // TODO: send an upstream cancel to the exchange once either API
            // grows a cancellation endpoint.
            debug!(provider = %self.provider, "status poller cancelled");
        }
    }

    async fn poll_loop(&self) {
        loop {
            let Some(order) = self.store.active_order().await else {
                warn!(provider = %self.provider, "status poll without an active order");
                return;
            };
            // Bity keys status lookups on the order id, ShapeShift on the
            // payment address.
            let reference = match self.provider {
                Provider::Bity => order.order_id,
                Provider::Shapeshift => order.payment_address,
            };

            self.bus.publish(SwapEvent::OrderStatusRequested {
                provider: self.provider,
            });

            match self.api.fetch_order_status(&reference).await {
                Ok(update) => {
                    crate::metrics::record_status_poll(self.provider, true);
                    self.store.apply_order_update(&update).await;
                    self.bus.publish(SwapEvent::OrderStatusSucceeded {
                        provider: self.provider,
                    });
                    if update.status.is_cancelled_for(self.provider) {
                        debug!(provider = %self.provider, "order cancelled, poller exiting");
                        return;
                    }
                }
                Err(err) => {
                    crate::metrics::record_status_poll(self.provider, false);
                    let message = if err.is_structured() {
                        err.to_string()
                    } else {
                        error!(provider = %self.provider, %err, "status poll failed");
                        CONNECTION_ERROR_MESSAGE.to_string()
                    };
                    self.bus.notify(Notification::danger_timed(message, TEN_SECONDS));
                }
            }

            sleep(self.poll_interval).await;
        }
    }
}

/// Full reset of the swap subsystem when the user starts over.
pub struct RestartController {
    store: Arc<SwapStore>,
    bus: EventBus,
}

impl RestartController {
    pub fn new(store: Arc<SwapStore>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// Idempotent: every step is either a state reset or a stop/start intent
    /// that the supervisors treat idempotently.
    pub async fn restart(&self) {
        self.store.reset_wallet().await;
        self.bus.publish(SwapEvent::WalletReset);
        self.bus.publish(SwapEvent::StopPollOrderStatus {
            provider: Provider::Shapeshift,
        });
        self.bus.publish(SwapEvent::StopPollOrderStatus {
            provider: Provider::Bity,
        });
        self.bus.publish(SwapEvent::LoadRatesRequested {
            provider: Provider::Shapeshift,
        });
    }
}
