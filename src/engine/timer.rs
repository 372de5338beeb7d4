//! Order expiry countdown
//!
//! A single table-driven timer covers both providers: the tick loop is
//! identical, only the status vocabulary and the action rows differ. The two
//! providers model "in-flight" differently — Bity orders have a hard cutoff,
//! ShapeShift orders stay valid once funds are received — so the rows are
//! authoritative per status value and must not be "simplified".

use crate::events::{EventBus, Notification, Provider, Severity, SwapEvent};
use crate::exchange::OrderStatus;
use crate::state::SwapStore;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const ORDER_TIMEOUT_MESSAGE: &str = "Time has run out. If you have already sent, please wait \
     1 hour. If your order has not been processed after 1 hour, please press the orange \
     'Issue with your Swap?' button.";

pub const ORDER_RECEIVED_MESSAGE: &str = "The order was received. It may take some time to \
     process the transaction. Please wait 1 hour. If your order has not been processed by then, \
     please press the orange 'Issue with your Swap?' button.";

/// What a tick does for a given (provider, status, expired) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    StopStatusPolling,
    StopRateLoading,
    /// Stop the countdown itself; the timer exits after executing the row.
    StopTimer,
    /// Force the displayed remaining time to zero.
    ZeroRemaining,
    /// Emitted at most once per timer run.
    NotifyOnce(Severity, &'static str),
}

/// The authoritative status -> action tables.
pub fn transition(provider: Provider, status: OrderStatus, expired: bool) -> &'static [TimerAction] {
    use OrderStatus::*;
    use Provider::*;
    use Severity::*;
    use TimerAction::*;

    match (provider, expired, status) {
        // Bity, countdown still running
        (Bity, false, Cancelled) => &[
            StopStatusPolling,
            StopRateLoading,
            StopTimer,
            NotifyOnce(Danger, ORDER_TIMEOUT_MESSAGE),
        ],
        (Bity, false, Filled) => &[StopStatusPolling, StopRateLoading, StopTimer],

        // Bity, past expiry
        (Bity, true, Open) => &[
            ZeroRemaining,
            StopStatusPolling,
            StopRateLoading,
            NotifyOnce(Danger, ORDER_TIMEOUT_MESSAGE),
        ],
        (Bity, true, Cancelled) => &[
            StopStatusPolling,
            StopRateLoading,
            NotifyOnce(Danger, ORDER_TIMEOUT_MESSAGE),
        ],
        // still awaiting fill, nothing to stop
        (Bity, true, Received) => &[NotifyOnce(Warning, ORDER_TIMEOUT_MESSAGE)],
        (Bity, true, Filled) => &[StopStatusPolling, StopRateLoading, StopTimer],

        // ShapeShift, countdown still running
        (Shapeshift, false, Failed) => &[
            StopStatusPolling,
            StopRateLoading,
            StopTimer,
            NotifyOnce(Danger, ORDER_TIMEOUT_MESSAGE),
        ],
        // countdown no longer relevant once funds are received
        (Shapeshift, false, Received) => &[StopTimer],
        (Shapeshift, false, Complete) => &[StopStatusPolling, StopRateLoading, StopTimer],

        // ShapeShift, past expiry
        (Shapeshift, true, NoDeposits) => &[
            ZeroRemaining,
            StopStatusPolling,
            StopRateLoading,
            NotifyOnce(Danger, ORDER_TIMEOUT_MESSAGE),
        ],
        (Shapeshift, true, Failed) => &[
            StopStatusPolling,
            StopRateLoading,
            NotifyOnce(Danger, ORDER_TIMEOUT_MESSAGE),
        ],
        // order still valid, warn rather than alarm
        (Shapeshift, true, Received) => &[NotifyOnce(Warning, ORDER_RECEIVED_MESSAGE)],
        (Shapeshift, true, Complete) => &[StopStatusPolling, StopRateLoading, StopTimer],

        _ => &[],
    }
}

pub struct ExpiryTimer {
    provider: Provider,
    store: Arc<SwapStore>,
    bus: EventBus,
    tick: Duration,
}

impl ExpiryTimer {
    pub fn new(provider: Provider, store: Arc<SwapStore>, bus: EventBus, tick: Duration) -> Self {
        Self {
            provider,
            store,
            bus,
            tick,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(provider = %self.provider, "expiry timer cancelled");
            }
            _ = self.tick_loop() => {}
        }
    }

    async fn tick_loop(&self) {
        let mut has_notified = false;
        loop {
            sleep(self.tick).await;

            let Some(order) = self.store.active_order().await else {
                continue;
            };

            let expired = order.is_expired();
            if !expired {
                // Recomputed from the deadline every tick, never decremented,
                // so missed ticks and clock drift cannot skew the countdown.
                let remaining = order.remaining_secs();
                self.store.set_remaining_seconds(remaining).await;
                crate::metrics::record_seconds_remaining(remaining);
                self.bus
                    .publish(SwapEvent::OrderTimeRemaining { seconds: remaining });
            }

            let mut stop_self = false;
            for action in transition(self.provider, order.status, expired) {
                match action {
                    TimerAction::StopStatusPolling => {
                        self.bus.publish(SwapEvent::StopPollOrderStatus {
                            provider: self.provider,
                        });
                    }
                    TimerAction::StopRateLoading => {
                        self.bus.publish(SwapEvent::StopLoadRates {
                            provider: self.provider,
                        });
                    }
                    TimerAction::StopTimer => {
                        self.bus.publish(SwapEvent::StopOrderTimer);
                        stop_self = true;
                    }
                    TimerAction::ZeroRemaining => {
                        self.store.set_remaining_seconds(0).await;
                        crate::metrics::record_seconds_remaining(0);
                        self.bus.publish(SwapEvent::OrderTimeRemaining { seconds: 0 });
                    }
                    TimerAction::NotifyOnce(severity, message) => {
                        if !has_notified {
                            has_notified = true;
                            self.bus
                                .notify(Notification::new(*severity, *message, None));
                        }
                    }
                }
            }
            if stop_self {
                debug!(provider = %self.provider, "expiry timer stopping itself");
                return;
            }
        }
    }
}
