//! The swap state store

use crate::events::Provider;
use crate::exchange::{OrderData, OrderStatus, OrderUpdate, RateTable};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// The in-flight exchange order.
#[derive(Debug, Clone)]
pub struct ActiveOrder {
    pub order_id: String,
    pub payment_address: String,
    pub origin_amount: f64,
    pub destination_amount: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub valid_for_secs: u64,
    /// `created_at + valid_for`, fixed once when the order is applied.
    /// Monotonic so remaining time survives wall-clock adjustments.
    pub deadline: Instant,
}

impl ActiveOrder {
    /// Seconds until expiry, recomputed from the deadline (never decremented).
    pub fn remaining_secs(&self) -> u64 {
        self.deadline.saturating_duration_since(Instant::now()).as_secs()
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Origin side of the swap as chosen by the user, consumed by lite-send.
#[derive(Debug, Clone, Default)]
pub struct OriginInfo {
    pub amount: f64,
    pub unit: String,
}

#[derive(Debug)]
struct SwapState {
    provider: Provider,
    step: u8,
    order: Option<ActiveOrder>,
    rates: HashMap<Provider, RateTable>,
    has_notified_rates_failure: bool,
    remaining_seconds: Option<u64>,
    origin: OriginInfo,
    wallet_unlocked: bool,
    balance_pending: bool,
    token_balance_pending: bool,
}

impl Default for SwapState {
    fn default() -> Self {
        Self {
            provider: Provider::Shapeshift,
            step: 1,
            order: None,
            rates: HashMap::new(),
            has_notified_rates_failure: false,
            remaining_seconds: None,
            origin: OriginInfo::default(),
            wallet_unlocked: false,
            balance_pending: false,
            token_balance_pending: false,
        }
    }
}

/// Shared state store for one swap flow.
///
/// All workers may read any field; by convention only the worker responsible
/// for producing a piece of state writes it. The update surface below is the
/// whole write interface.
pub struct SwapStore {
    inner: RwLock<SwapState>,
}

impl SwapStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SwapState::default()),
        }
    }

    // Selectors

    pub async fn provider(&self) -> Provider {
        self.inner.read().await.provider
    }

    pub async fn step(&self) -> u8 {
        self.inner.read().await.step
    }

    pub async fn active_order(&self) -> Option<ActiveOrder> {
        self.inner.read().await.order.clone()
    }

    pub async fn order_status(&self) -> Option<OrderStatus> {
        self.inner.read().await.order.as_ref().map(|o| o.status)
    }

    pub async fn payment_address(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .order
            .as_ref()
            .map(|o| o.payment_address.clone())
    }

    pub async fn rates(&self, provider: Provider) -> Option<RateTable> {
        self.inner.read().await.rates.get(&provider).cloned()
    }

    pub async fn has_notified_rates_failure(&self) -> bool {
        self.inner.read().await.has_notified_rates_failure
    }

    pub async fn remaining_seconds(&self) -> Option<u64> {
        self.inner.read().await.remaining_seconds
    }

    pub async fn origin(&self) -> OriginInfo {
        self.inner.read().await.origin.clone()
    }

    pub async fn is_wallet_unlocked(&self) -> bool {
        self.inner.read().await.wallet_unlocked
    }

    pub async fn is_balance_pending(&self) -> bool {
        self.inner.read().await.balance_pending
    }

    pub async fn is_token_balance_pending(&self) -> bool {
        self.inner.read().await.token_balance_pending
    }

    // Updates — provider / flow (owned by the dispatcher)

    pub async fn set_provider(&self, provider: Provider) {
        self.inner.write().await.provider = provider;
    }

    pub async fn set_origin(&self, origin: OriginInfo) {
        self.inner.write().await.origin = origin;
    }

    pub async fn set_step(&self, step: u8) {
        self.inner.write().await.step = step;
    }

    // Updates — rates (owned by the rate pollers)

    /// Full replacement; a successful poll also ends any failure streak.
    pub async fn replace_rates(&self, provider: Provider, table: RateTable) {
        let mut state = self.inner.write().await;
        state.rates.insert(provider, table);
        state.has_notified_rates_failure = false;
    }

    pub async fn record_rates_failure(&self) {
        self.inner.write().await.has_notified_rates_failure = true;
    }

    // Updates — order (owned by the submitter, status poller and timer)

    /// Install a freshly created order. The expiry deadline is fixed here,
    /// once, from the creation data; the timer only ever reads it.
    pub async fn apply_order(&self, provider: Provider, data: &OrderData) {
        let initial_status = match provider {
            Provider::Bity => OrderStatus::Open,
            Provider::Shapeshift => OrderStatus::NoDeposits,
        };
        let order = ActiveOrder {
            order_id: data.order_id.clone(),
            payment_address: data.payment_address.clone(),
            origin_amount: data.origin_amount,
            destination_amount: data.destination_amount,
            status: initial_status,
            created_at: data.created_at,
            valid_for_secs: data.valid_for_secs,
            deadline: Instant::now() + std::time::Duration::from_secs(data.valid_for_secs),
        };
        let mut state = self.inner.write().await;
        state.provider = provider;
        state.order = Some(order);
        state.remaining_seconds = Some(data.valid_for_secs);
    }

    pub async fn apply_order_update(&self, update: &OrderUpdate) {
        let mut state = self.inner.write().await;
        if let Some(order) = state.order.as_mut() {
            order.status = update.status;
            if let Some(amount) = update.origin_amount {
                order.origin_amount = amount;
            }
            if let Some(amount) = update.destination_amount {
                order.destination_amount = amount;
            }
        }
    }

    pub async fn set_remaining_seconds(&self, seconds: u64) {
        self.inner.write().await.remaining_seconds = Some(seconds);
    }

    // Updates — wallet readiness (owned by the dispatcher)

    pub async fn set_wallet_unlocked(&self, unlocked: bool) {
        self.inner.write().await.wallet_unlocked = unlocked;
    }

    pub async fn set_balance_pending(&self, pending: bool) {
        self.inner.write().await.balance_pending = pending;
    }

    pub async fn set_token_balance_pending(&self, pending: bool) {
        self.inner.write().await.token_balance_pending = pending;
    }

    /// Wallet-scoped reset, used by restart and wallet-reset handling.
    pub async fn reset_wallet(&self) {
        let mut state = self.inner.write().await;
        state.wallet_unlocked = false;
        state.balance_pending = false;
        state.token_balance_pending = false;
    }
}

impl Default for SwapStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_data(valid_for_secs: u64) -> OrderData {
        OrderData {
            order_id: "ord-1".into(),
            payment_address: "3AbCd".into(),
            origin_amount: 1.0,
            destination_amount: 0.05,
            created_at: Utc::now(),
            valid_for_secs,
        }
    }

    #[tokio::test]
    async fn successful_rates_poll_clears_failure_streak() {
        let store = SwapStore::new();
        store.record_rates_failure().await;
        assert!(store.has_notified_rates_failure().await);

        store
            .replace_rates(Provider::Bity, RateTable::from([("ETH_BTC".to_string(), 0.05)]))
            .await;
        assert!(!store.has_notified_rates_failure().await);
    }

    #[tokio::test]
    async fn rate_tables_are_replaced_not_merged() {
        let store = SwapStore::new();
        store
            .replace_rates(Provider::Bity, RateTable::from([("ETH_BTC".to_string(), 0.05)]))
            .await;
        store
            .replace_rates(Provider::Bity, RateTable::from([("ETH_REP".to_string(), 12.0)]))
            .await;

        let table = store.rates(Provider::Bity).await.unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.contains_key("ETH_REP"));
    }

    #[tokio::test]
    async fn apply_order_sets_provider_and_initial_status() {
        let store = SwapStore::new();
        store.apply_order(Provider::Bity, &order_data(600)).await;

        assert_eq!(store.provider().await, Provider::Bity);
        assert_eq!(store.order_status().await, Some(OrderStatus::Open));
        assert_eq!(store.payment_address().await.as_deref(), Some("3AbCd"));
        assert_eq!(store.remaining_seconds().await, Some(600));
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_is_recomputed_from_the_deadline() {
        let store = SwapStore::new();
        store.apply_order(Provider::Bity, &order_data(60)).await;

        tokio::time::advance(std::time::Duration::from_secs(45)).await;
        let order = store.active_order().await.unwrap();
        assert_eq!(order.remaining_secs(), 15);
        assert!(!order.is_expired());

        tokio::time::advance(std::time::Duration::from_secs(30)).await;
        let order = store.active_order().await.unwrap();
        assert_eq!(order.remaining_secs(), 0);
        assert!(order.is_expired());
    }

    #[tokio::test]
    async fn order_update_overwrites_status_and_amounts() {
        let store = SwapStore::new();
        store.apply_order(Provider::Shapeshift, &order_data(600)).await;

        store
            .apply_order_update(&OrderUpdate {
                status: OrderStatus::Received,
                origin_amount: Some(1.1),
                destination_amount: None,
            })
            .await;

        let order = store.active_order().await.unwrap();
        assert_eq!(order.status, OrderStatus::Received);
        assert_eq!(order.origin_amount, 1.1);
        assert_eq!(order.destination_amount, 0.05);
    }

    #[tokio::test]
    async fn wallet_reset_clears_readiness_flags() {
        let store = SwapStore::new();
        store.set_wallet_unlocked(true).await;
        store.set_balance_pending(true).await;
        store.set_token_balance_pending(true).await;

        store.reset_wallet().await;

        assert!(!store.is_wallet_unlocked().await);
        assert!(!store.is_balance_pending().await);
        assert!(!store.is_token_balance_pending().await);
    }
}
