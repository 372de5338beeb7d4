//! Rate polling
//!
//! One poller per provider, forked and cancelled by its supervisor. The
//! poller never terminates itself; failures degrade to a notification (once
//! per unacknowledged streak) and the loop keeps cycling.

use crate::error::ExchangeError;
use crate::events::{EventBus, Notification, Provider, SwapEvent};
use crate::exchange::{ExchangeApi, RateTable};
use crate::state::SwapStore;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub const SHAPESHIFT_RATES_FAILURE_MESSAGE: &str =
    "Failed to load swap rates from ShapeShift, please try again later";

pub struct RatePoller {
    provider: Provider,
    api: Arc<dyn ExchangeApi>,
    store: Arc<SwapStore>,
    bus: EventBus,
    poll_interval: Duration,
    /// ShapeShift races the fetch against a hard timeout; Bity does not.
    fetch_timeout: Option<Duration>,
}

impl RatePoller {
    pub fn new(
        api: Arc<dyn ExchangeApi>,
        store: Arc<SwapStore>,
        bus: EventBus,
        poll_interval: Duration,
        fetch_timeout: Option<Duration>,
    ) -> Self {
        Self {
            provider: api.provider(),
            api,
            store,
            bus,
            poll_interval,
            fetch_timeout,
        }
    }

    /// Poll until cancelled. No cleanup is needed on cancellation: nothing is
    /// held across the sleep besides the token.
    pub async fn run(self, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(provider = %self.provider, "rate poller cancelled");
            }
            _ = self.poll_loop() => {}
        }
    }

    async fn poll_loop(&self) {
        loop {
            match self.fetch().await {
                Ok(table) => {
                    crate::metrics::record_rate_poll(self.provider, true);
                    self.store.replace_rates(self.provider, table).await;
                    self.bus.publish(SwapEvent::RatesLoadSucceeded {
                        provider: self.provider,
                    });
                }
                Err(err) => {
                    crate::metrics::record_rate_poll(self.provider, false);
                    if !self.store.has_notified_rates_failure().await {
                        error!(provider = %self.provider, %err, "failed to load rates");
                        self.bus.notify(self.failure_notification(&err));
                    }
                    self.store.record_rates_failure().await;
                    self.bus.publish(SwapEvent::RatesLoadFailed {
                        provider: self.provider,
                    });
                }
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn fetch(&self) -> Result<RateTable, ExchangeError> {
        match self.fetch_timeout {
            // Race the fetch against the timeout; the loser is discarded.
            Some(limit) => match tokio::time::timeout(limit, self.api.fetch_rates()).await {
                Ok(result) => result,
                Err(_) => Err(ExchangeError::Timeout {
                    provider: self.provider,
                    secs: limit.as_secs(),
                }),
            },
            None => self.api.fetch_rates().await,
        }
    }

    fn failure_notification(&self, err: &ExchangeError) -> Notification {
        match self.provider {
            Provider::Bity => Notification::danger(err.to_string()),
            Provider::Shapeshift => Notification::danger(SHAPESHIFT_RATES_FAILURE_MESSAGE),
        }
    }
}
