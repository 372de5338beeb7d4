//! The swap orchestration engine
//!
//! Wires every supervisor and worker to the shared bus and store. Workers
//! are independently cancellable tasks; supervisors own their cancellation
//! tokens; the dispatcher applies inbound wallet/provider intents to the
//! store and spawns one-shot order submissions.

pub mod lite_send;
pub mod orders;
pub mod rates;
pub mod supervisor;
pub mod timer;

#[cfg(test)]
pub(crate) mod testutil;

use crate::config::Settings;
use crate::events::{EventBus, Provider, SwapEvent};
use crate::exchange::ExchangeApi;
use crate::state::SwapStore;

use lite_send::LiteSendConfigurer;
use orders::{OrderSubmitter, RestartController, StatusPoller};
use rates::RatePoller;
use supervisor::{Supervisor, WorkerFactory};
use timer::ExpiryTimer;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct SwapEngine {
    settings: Settings,
    store: Arc<SwapStore>,
    bus: EventBus,
    apis: HashMap<Provider, Arc<dyn ExchangeApi>>,
    shutdown: CancellationToken,
}

impl SwapEngine {
    pub fn new(
        settings: Settings,
        bity: Arc<dyn ExchangeApi>,
        shapeshift: Arc<dyn ExchangeApi>,
    ) -> Self {
        let bus = EventBus::new(settings.engine.bus_capacity);
        let mut apis: HashMap<Provider, Arc<dyn ExchangeApi>> = HashMap::new();
        apis.insert(Provider::Bity, bity);
        apis.insert(Provider::Shapeshift, shapeshift);

        Self {
            settings,
            store: Arc::new(SwapStore::new()),
            bus,
            apis,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &Arc<SwapStore> {
        &self.store
    }

    fn api(&self, provider: Provider) -> Arc<dyn ExchangeApi> {
        // both providers are registered in new()
        self.apis[&provider].clone()
    }

    /// Spawn every supervisor and the dispatcher. The engine runs until
    /// [`shutdown`](Self::shutdown).
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        for provider in [Provider::Bity, Provider::Shapeshift] {
            handles.push(tokio::spawn(
                self.rates_supervisor(provider).run(self.shutdown.child_token()),
            ));
            handles.push(tokio::spawn(
                self.status_supervisor(provider).run(self.shutdown.child_token()),
            ));
        }
        handles.push(tokio::spawn(
            self.expiry_supervisor().run(self.shutdown.child_token()),
        ));

        let configurer = LiteSendConfigurer::new(
            self.store.clone(),
            self.bus.clone(),
            self.settings.assets.clone(),
            self.settings.engine.payment_address_retries,
            self.settings.engine.payment_address_retry_delay(),
        );
        handles.push(tokio::spawn(configurer.run(self.shutdown.child_token())));

        handles.push(tokio::spawn(dispatch_loop(
            self.store.clone(),
            self.bus.clone(),
            self.apis.clone(),
            self.shutdown.child_token(),
        )));

        info!("swap engine started");
        handles
    }

    /// Cooperative shutdown of every supervisor and live worker.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        info!("swap engine shutdown initiated");
    }

    fn rates_supervisor(&self, provider: Provider) -> Supervisor {
        let api = self.api(provider);
        let store = self.store.clone();
        let bus = self.bus.clone();
        let interval = self.settings.engine.rates_poll_interval();
        let fetch_timeout = match provider {
            Provider::Bity => None,
            Provider::Shapeshift => Some(self.settings.engine.shapeshift_rates_timeout()),
        };
        let factory: WorkerFactory = Box::new(move |token| {
            let poller = RatePoller::new(
                api.clone(),
                store.clone(),
                bus.clone(),
                interval,
                fetch_timeout,
            );
            Box::pin(poller.run(token))
        });
        Supervisor::new(
            match provider {
                Provider::Bity => "bity-rates",
                Provider::Shapeshift => "shapeshift-rates",
            },
            self.bus.clone(),
            move |e| matches!(e, SwapEvent::LoadRatesRequested { provider: p } if *p == provider),
            move |e| matches!(e, SwapEvent::StopLoadRates { provider: p } if *p == provider),
            factory,
        )
    }

    fn status_supervisor(&self, provider: Provider) -> Supervisor {
        let api = self.api(provider);
        let store = self.store.clone();
        let bus = self.bus.clone();
        let interval = self.settings.engine.status_poll_interval();
        let factory: WorkerFactory = Box::new(move |token| {
            let poller = StatusPoller::new(api.clone(), store.clone(), bus.clone(), interval);
            Box::pin(poller.run(token))
        });
        Supervisor::new(
            match provider {
                Provider::Bity => "bity-status",
                Provider::Shapeshift => "shapeshift-status",
            },
            self.bus.clone(),
            move |e| matches!(e, SwapEvent::StartPollOrderStatus { provider: p } if *p == provider),
            move |e| matches!(e, SwapEvent::StopPollOrderStatus { provider: p } if *p == provider),
            factory,
        )
    }

    /// The expiry supervisor picks the provider at fork time, so one
    /// supervisor serves whichever provider the current swap uses.
    fn expiry_supervisor(&self) -> Supervisor {
        let store = self.store.clone();
        let bus = self.bus.clone();
        let tick = self.settings.engine.timer_tick();
        let factory: WorkerFactory = Box::new(move |token| {
            let store = store.clone();
            let bus = bus.clone();
            Box::pin(async move {
                let provider = store.provider().await;
                ExpiryTimer::new(provider, store, bus, tick).run(token).await;
            })
        });
        Supervisor::new(
            "order-timer",
            self.bus.clone(),
            |e| matches!(e, SwapEvent::StartOrderTimer),
            |e| matches!(e, SwapEvent::StopOrderTimer),
            factory,
        )
    }
}

/// Applies inbound intents to the store and fans out one-shot work.
async fn dispatch_loop(
    store: Arc<SwapStore>,
    bus: EventBus,
    apis: HashMap<Provider, Arc<dyn ExchangeApi>>,
    shutdown: CancellationToken,
) {
    let mut rx = bus.subscribe();
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => return,
            recv = rx.recv() => match recv {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return,
            },
        };

        match event {
            SwapEvent::OrderCreateRequested { params } => {
                let submitter = OrderSubmitter::new(
                    apis[&params.provider()].clone(),
                    store.clone(),
                    bus.clone(),
                );
                // one-shot per request; failures never retry on their own
                tokio::spawn(async move { submitter.submit(params).await });
            }
            SwapEvent::Restart => {
                RestartController::new(store.clone(), bus.clone())
                    .restart()
                    .await;
            }
            SwapEvent::ChangeProvider { provider } => {
                if store.provider().await != provider {
                    store.set_provider(provider).await;
                    bus.publish(SwapEvent::ProviderChanged { provider });
                }
            }
            SwapEvent::WalletSet => store.set_wallet_unlocked(true).await,
            SwapEvent::WalletReset => store.reset_wallet().await,
            SwapEvent::BalanceSet { .. } => store.set_balance_pending(false).await,
            SwapEvent::TokenBalanceSet { .. } => store.set_token_balance_pending(false).await,
            _ => {}
        }
    }
}
