//! Shared test doubles for the engine modules.

use crate::error::ExchangeError;
use crate::events::{OrderParams, Provider, SwapEvent};
use crate::exchange::{ExchangeApi, OrderData, OrderStatus, OrderUpdate, RateTable};

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Scripted exchange backend: each call pops the next scripted response;
/// an exhausted script parks the caller forever, which is how tests model
/// an in-flight request that never resolves.
pub struct StubExchange {
    provider: Provider,
    rates: Mutex<VecDeque<Result<RateTable, ExchangeError>>>,
    orders: Mutex<VecDeque<Result<OrderData, ExchangeError>>>,
    statuses: Mutex<VecDeque<Result<OrderUpdate, ExchangeError>>>,
}

impl StubExchange {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            rates: Mutex::new(VecDeque::new()),
            orders: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_rates(&self, response: Result<RateTable, ExchangeError>) {
        self.rates.lock().unwrap().push_back(response);
    }

    pub fn push_order(&self, response: Result<OrderData, ExchangeError>) {
        self.orders.lock().unwrap().push_back(response);
    }

    pub fn push_status(&self, response: Result<OrderUpdate, ExchangeError>) {
        self.statuses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl ExchangeApi for StubExchange {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch_rates(&self) -> Result<RateTable, ExchangeError> {
        let next = self.rates.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => futures::future::pending().await,
        }
    }

    async fn create_order(&self, _params: &OrderParams) -> Result<OrderData, ExchangeError> {
        let next = self.orders.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => futures::future::pending().await,
        }
    }

    async fn fetch_order_status(&self, _reference: &str) -> Result<OrderUpdate, ExchangeError> {
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => futures::future::pending().await,
        }
    }
}

pub fn order_data(valid_for_secs: u64) -> OrderData {
    OrderData {
        order_id: "ord-42".into(),
        payment_address: "3PayMe".into(),
        origin_amount: 1.0,
        destination_amount: 0.05,
        created_at: Utc::now(),
        valid_for_secs,
    }
}

pub fn status_update(status: OrderStatus) -> OrderUpdate {
    OrderUpdate {
        status,
        origin_amount: None,
        destination_amount: None,
    }
}

pub fn bity_params() -> OrderParams {
    OrderParams::Bity {
        amount: 1.0,
        destination_address: "0xdead".into(),
        mode: 0,
        pair: "ETH_BTC".into(),
    }
}

/// Drain everything currently buffered on a subscription.
pub fn drain(rx: &mut broadcast::Receiver<SwapEvent>) -> Vec<SwapEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

/// Count drained events matching a predicate.
pub fn count(events: &[SwapEvent], pred: impl Fn(&SwapEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}
