//! Lite-send auto-configuration
//!
//! When a swap is in flight the user can pay straight from an unlocked
//! wallet; this flow pre-fills the simplified transaction form from the swap
//! parameters. Each configuration attempt is raced against the events that
//! invalidate it (transaction reset, wallet reset, polling finished) and is
//! re-forked or abandoned accordingly.

use crate::config::AssetConfig;
use crate::events::{EventBus, Notification, SwapEvent, TransactionField};
use crate::state::SwapStore;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const PAYMENT_ADDRESS_NOT_FOUND_MESSAGE: &str = "Payment address not found";

enum RaceOutcome {
    PollingFinished,
    WalletReset,
    TransactionReset,
    Shutdown,
}

#[derive(Clone)]
pub struct LiteSendConfigurer {
    store: Arc<SwapStore>,
    bus: EventBus,
    assets: AssetConfig,
    retries: u32,
    retry_delay: Duration,
}

impl LiteSendConfigurer {
    pub fn new(
        store: Arc<SwapStore>,
        bus: EventBus,
        assets: AssetConfig,
        retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            store,
            bus,
            assets,
            retries,
            retry_delay,
        }
    }

    /// Top-level loop: every configure request enters the supervising race.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut rx = self.bus.subscribe();
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => return,
                recv = rx.recv() => match recv {
                    Ok(event) => event,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return,
                },
            };
            if matches!(event, SwapEvent::ConfigureLiteSend) {
                self.supervise(&shutdown).await;
            }
        }
    }

    /// Fork an attempt and race it against the events that invalidate it.
    async fn supervise(&self, shutdown: &CancellationToken) {
        loop {
            let mut rx = self.bus.subscribe();
            let token = CancellationToken::new();
            let attempt = tokio::spawn(self.clone().attempt(token.clone()));

            let outcome = loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break RaceOutcome::Shutdown,
                    recv = rx.recv() => match recv {
                        Ok(SwapEvent::StopPollOrderStatus { .. }) => break RaceOutcome::PollingFinished,
                        Ok(SwapEvent::WalletReset) => break RaceOutcome::WalletReset,
                        Ok(SwapEvent::TransactionResetRequested) => break RaceOutcome::TransactionReset,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break RaceOutcome::Shutdown,
                    },
                }
            };

            token.cancel();
            let _ = attempt.await;

            match outcome {
                // the swap finished: clear the form and hide the panel
                RaceOutcome::PollingFinished => {
                    self.bus.publish(SwapEvent::ShowLiteSend { visible: false });
                    self.bus.publish(SwapEvent::ResetTransactionFields);
                    return;
                }
                // user navigated away or switched wallets: hide and re-apply
                // the swap parameters once a wallet is back
                RaceOutcome::WalletReset => {
                    self.bus.publish(SwapEvent::ShowLiteSend { visible: false });
                    self.bus.publish(SwapEvent::ConfigureLiteSend);
                    return;
                }
                // form was cleared: re-fork without hiding the panel
                RaceOutcome::TransactionReset => continue,
                RaceOutcome::Shutdown => return,
            }
        }
    }

    async fn attempt(self, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("lite-send attempt cancelled");
            }
            _ = self.configure() => {}
        }
    }

    async fn configure(&self) {
        let origin = self.store.origin().await;

        let Some(address) = self.resolve_payment_address().await else {
            self.bus
                .notify(Notification::danger(PAYMENT_ADDRESS_NOT_FOUND_MESSAGE));
            self.bus.publish(SwapEvent::ShowLiteSend { visible: false });
            return;
        };

        if !self.assets.is_supported_unit(&origin.unit) {
            self.bus.publish(SwapEvent::ShowLiteSend { visible: false });
            return;
        }

        // Subscribe before reading readiness so a wallet-set landing between
        // the check and the wait cannot be missed.
        let mut rx = self.bus.subscribe();
        self.bus.publish(SwapEvent::ShowLiteSend { visible: true });

        if !self.store.is_wallet_unlocked().await {
            wait_for(&mut rx, |e| matches!(e, SwapEvent::WalletSet)).await;
        }

        if !self.assets.is_network_unit(&origin.unit) {
            // a token: request a balance scan and wait for it to settle
            self.store.set_token_balance_pending(true).await;
            self.bus.publish(SwapEvent::TokenBalanceLookupRequested {
                symbol: origin.unit.clone(),
            });
            wait_for(&mut rx, |e| matches!(e, SwapEvent::TokenBalanceSet { .. })).await;
        } else if self.store.is_balance_pending().await {
            wait_for(&mut rx, |e| matches!(e, SwapEvent::BalanceSet { .. })).await;
        }

        self.bus.publish(SwapEvent::SetTransactionField {
            field: TransactionField::Unit(origin.unit.clone()),
        });
        self.bus.publish(SwapEvent::SetTransactionField {
            field: TransactionField::Value(origin.amount.to_string()),
        });
        self.bus.publish(SwapEvent::SetTransactionField {
            field: TransactionField::Recipient(address),
        });
    }

    /// Poll the store for the payment address with a fixed retry budget.
    async fn resolve_payment_address(&self) -> Option<String> {
        let mut tries = 0;
        while tries <= self.retries {
            sleep(self.retry_delay).await;
            if let Some(address) = self.store.payment_address().await {
                return Some(address);
            }
            tries += 1;
        }
        None
    }
}

async fn wait_for(
    rx: &mut broadcast::Receiver<SwapEvent>,
    pred: impl Fn(&SwapEvent) -> bool,
) {
    loop {
        match rx.recv().await {
            Ok(event) if pred(&event) => return,
            Ok(_) => continue,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testutil::{count, drain, order_data};
    use crate::events::Provider;
    use crate::state::OriginInfo;

    const RETRY_DELAY: Duration = Duration::from_millis(500);

    struct Setup {
        store: Arc<SwapStore>,
        bus: EventBus,
        shutdown: CancellationToken,
    }

    async fn spawn_configurer(origin_unit: &str, with_order: bool, unlocked: bool) -> Setup {
        let store = Arc::new(SwapStore::new());
        store
            .set_origin(OriginInfo {
                amount: 1.5,
                unit: origin_unit.to_string(),
            })
            .await;
        if with_order {
            store.apply_order(Provider::Bity, &order_data(600)).await;
        }
        store.set_wallet_unlocked(unlocked).await;

        let bus = EventBus::new(1024);
        let shutdown = CancellationToken::new();
        let configurer = LiteSendConfigurer::new(
            store.clone(),
            bus.clone(),
            AssetConfig::default(),
            5,
            RETRY_DELAY,
        );
        tokio::spawn(configurer.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        Setup { store, bus, shutdown }
    }

    fn fields(events: &[SwapEvent]) -> Vec<TransactionField> {
        events
            .iter()
            .filter_map(|e| match e {
                SwapEvent::SetTransactionField { field } => Some(field.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn configures_the_transaction_when_wallet_is_ready() {
        let setup = spawn_configurer("ETH", true, true).await;
        let mut rx = setup.bus.subscribe();

        setup.bus.publish(SwapEvent::ConfigureLiteSend);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let events = drain(&mut rx);
        assert_eq!(
            count(&events, |e| matches!(e, SwapEvent::ShowLiteSend { visible: true })),
            1
        );
        assert_eq!(
            fields(&events),
            vec![
                TransactionField::Unit("ETH".into()),
                TransactionField::Value("1.5".into()),
                TransactionField::Recipient("3PayMe".into()),
            ]
        );
        setup.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_address_retries_notify_and_hide() {
        let setup = spawn_configurer("ETH", false, true).await;
        let mut rx = setup.bus.subscribe();

        setup.bus.publish(SwapEvent::ConfigureLiteSend);
        // 6 polls at 500ms spacing
        tokio::time::sleep(Duration::from_secs(4)).await;

        let events = drain(&mut rx);
        let notifications: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SwapEvent::Notify { notification } => Some(notification.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message, PAYMENT_ADDRESS_NOT_FOUND_MESSAGE);
        assert_eq!(
            count(&events, |e| matches!(e, SwapEvent::ShowLiteSend { visible: false })),
            1
        );
        assert!(fields(&events).is_empty());
        setup.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn address_appearing_on_a_later_retry_is_used() {
        let setup = spawn_configurer("ETH", false, true).await;
        let mut rx = setup.bus.subscribe();

        setup.bus.publish(SwapEvent::ConfigureLiteSend);
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        setup
            .store
            .apply_order(Provider::Bity, &order_data(600))
            .await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let events = drain(&mut rx);
        assert_eq!(count(&events, |e| matches!(e, SwapEvent::Notify { .. })), 0);
        assert!(fields(&events).contains(&TransactionField::Recipient("3PayMe".into())));
        setup.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn token_unit_waits_for_the_balance_scan() {
        let setup = spawn_configurer("REP", true, true).await;
        let mut rx = setup.bus.subscribe();

        setup.bus.publish(SwapEvent::ConfigureLiteSend);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let events = drain(&mut rx);
        assert_eq!(
            count(&events, |e| matches!(
                e,
                SwapEvent::TokenBalanceLookupRequested { .. }
            )),
            1
        );
        assert!(fields(&events).is_empty());
        assert!(setup.store.is_token_balance_pending().await);

        setup.bus.publish(SwapEvent::TokenBalanceSet { ok: true });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fields(&drain(&mut rx)).len(), 3);
        setup.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn locked_wallet_defers_until_wallet_set() {
        let setup = spawn_configurer("ETH", true, false).await;
        let mut rx = setup.bus.subscribe();

        setup.bus.publish(SwapEvent::ConfigureLiteSend);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let events = drain(&mut rx);
        assert_eq!(
            count(&events, |e| matches!(e, SwapEvent::ShowLiteSend { visible: true })),
            1
        );
        assert!(fields(&events).is_empty());

        setup.store.set_wallet_unlocked(true).await;
        setup.bus.publish(SwapEvent::WalletSet);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fields(&drain(&mut rx)).len(), 3);
        setup.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn wallet_reset_hides_the_panel_and_retriggers() {
        let setup = spawn_configurer("ETH", true, false).await;
        let mut rx = setup.bus.subscribe();

        setup.bus.publish(SwapEvent::ConfigureLiteSend);
        tokio::time::sleep(Duration::from_secs(1)).await;
        drain(&mut rx);

        setup.bus.publish(SwapEvent::WalletReset);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let events = drain(&mut rx);
        assert!(count(&events, |e| matches!(e, SwapEvent::ShowLiteSend { visible: false })) >= 1);
        // configuration is re-requested so a new wallet re-applies the swap
        assert!(count(&events, |e| matches!(e, SwapEvent::ConfigureLiteSend)) >= 1);
        setup.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn polling_finished_hides_and_clears_the_form() {
        let setup = spawn_configurer("ETH", true, false).await;
        let mut rx = setup.bus.subscribe();

        setup.bus.publish(SwapEvent::ConfigureLiteSend);
        tokio::time::sleep(Duration::from_secs(1)).await;
        drain(&mut rx);

        setup.bus.publish(SwapEvent::StopPollOrderStatus {
            provider: Provider::Bity,
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let events = drain(&mut rx);
        assert_eq!(
            count(&events, |e| matches!(e, SwapEvent::ShowLiteSend { visible: false })),
            1
        );
        assert_eq!(
            count(&events, |e| matches!(e, SwapEvent::ResetTransactionFields)),
            1
        );
        setup.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn transaction_reset_reforks_without_hiding() {
        let setup = spawn_configurer("ETH", true, false).await;
        let mut rx = setup.bus.subscribe();

        setup.bus.publish(SwapEvent::ConfigureLiteSend);
        tokio::time::sleep(Duration::from_secs(1)).await;

        setup.bus.publish(SwapEvent::TransactionResetRequested);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let events = drain(&mut rx);
        // the attempt restarted: the panel was shown twice, never hidden
        assert_eq!(
            count(&events, |e| matches!(e, SwapEvent::ShowLiteSend { visible: true })),
            2
        );
        assert_eq!(
            count(&events, |e| matches!(e, SwapEvent::ShowLiteSend { visible: false })),
            0
        );
        setup.shutdown.cancel();
    }
}
