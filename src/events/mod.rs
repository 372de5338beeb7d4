//! Swap intent vocabulary and the shared event bus
//!
//! Every worker communicates exclusively by publishing `SwapEvent`s onto the
//! bus and reading shared state from the store; there are no direct
//! task-to-task calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Exchange backends the engine can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Bity,
    Shapeshift,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Bity => write!(f, "Bity"),
            Provider::Shapeshift => write!(f, "ShapeShift"),
        }
    }
}

/// Notification severity shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Danger,
    Warning,
}

/// User-facing notification emitted over the bus.
///
/// `dismiss_after = None` means the notification persists until dismissed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub severity: Severity,
    pub message: String,
    pub dismiss_after: Option<Duration>,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>, dismiss_after: Option<Duration>) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            message: message.into(),
            dismiss_after,
        }
    }

    /// Persistent danger notification.
    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(Severity::Danger, message, None)
    }

    /// Danger notification that auto-dismisses.
    pub fn danger_timed(message: impl Into<String>, dismiss_after: Duration) -> Self {
        Self::new(Severity::Danger, message, Some(dismiss_after))
    }

    /// Persistent warning notification.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message, None)
    }
}

/// Parameters for a one-shot order creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderParams {
    Bity {
        amount: f64,
        destination_address: String,
        mode: u8,
        pair: String,
    },
    Shapeshift {
        withdrawal: String,
        origin_kind: String,
        destination_kind: String,
        destination_amount: f64,
    },
}

impl OrderParams {
    pub fn provider(&self) -> Provider {
        match self {
            OrderParams::Bity { .. } => Provider::Bity,
            OrderParams::Shapeshift { .. } => Provider::Shapeshift,
        }
    }
}

/// Transaction form fields populated by the lite-send flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionField {
    Unit(String),
    Value(String),
    Recipient(String),
}

/// Every intent the engine consumes or emits.
///
/// Control intents drive the supervisors; result intents feed the UI layer
/// and the shared store. Pollers and timers never call each other, they
/// publish and observe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SwapEvent {
    // Control intents (consumed by supervisors and the dispatcher)
    LoadRatesRequested { provider: Provider },
    StopLoadRates { provider: Provider },
    StartPollOrderStatus { provider: Provider },
    StopPollOrderStatus { provider: Provider },
    StartOrderTimer,
    StopOrderTimer,
    ChangeProvider { provider: Provider },
    OrderCreateRequested { params: OrderParams },
    ConfigureLiteSend,
    Restart,

    // Wallet and transaction lifecycle (produced by the wallet layer)
    WalletSet,
    WalletReset,
    BalanceSet { ok: bool },
    TokenBalanceSet { ok: bool },
    TransactionResetRequested,

    // Result intents (produced by workers)
    RatesLoadSucceeded { provider: Provider },
    RatesLoadFailed { provider: Provider },
    OrderCreateSucceeded { provider: Provider },
    OrderCreateFailed { provider: Provider },
    OrderStatusRequested { provider: Provider },
    OrderStatusSucceeded { provider: Provider },
    OrderTimeRemaining { seconds: u64 },
    StepChanged { step: u8 },
    ProviderChanged { provider: Provider },
    Notify { notification: Notification },
    ShowLiteSend { visible: bool },
    SetTransactionField { field: TransactionField },
    ResetTransactionFields,
    TokenBalanceLookupRequested { symbol: String },
}

impl SwapEvent {
    /// Event name for logging and metrics
    pub fn name(&self) -> &'static str {
        match self {
            SwapEvent::LoadRatesRequested { .. } => "load_rates_requested",
            SwapEvent::StopLoadRates { .. } => "stop_load_rates",
            SwapEvent::StartPollOrderStatus { .. } => "start_poll_order_status",
            SwapEvent::StopPollOrderStatus { .. } => "stop_poll_order_status",
            SwapEvent::StartOrderTimer => "start_order_timer",
            SwapEvent::StopOrderTimer => "stop_order_timer",
            SwapEvent::ChangeProvider { .. } => "change_provider",
            SwapEvent::OrderCreateRequested { .. } => "order_create_requested",
            SwapEvent::ConfigureLiteSend => "configure_lite_send",
            SwapEvent::Restart => "restart",
            SwapEvent::WalletSet => "wallet_set",
            SwapEvent::WalletReset => "wallet_reset",
            SwapEvent::BalanceSet { .. } => "balance_set",
            SwapEvent::TokenBalanceSet { .. } => "token_balance_set",
            SwapEvent::TransactionResetRequested => "transaction_reset_requested",
            SwapEvent::RatesLoadSucceeded { .. } => "rates_load_succeeded",
            SwapEvent::RatesLoadFailed { .. } => "rates_load_failed",
            SwapEvent::OrderCreateSucceeded { .. } => "order_create_succeeded",
            SwapEvent::OrderCreateFailed { .. } => "order_create_failed",
            SwapEvent::OrderStatusRequested { .. } => "order_status_requested",
            SwapEvent::OrderStatusSucceeded { .. } => "order_status_succeeded",
            SwapEvent::OrderTimeRemaining { .. } => "order_time_remaining",
            SwapEvent::StepChanged { .. } => "step_changed",
            SwapEvent::ProviderChanged { .. } => "provider_changed",
            SwapEvent::Notify { .. } => "notify",
            SwapEvent::ShowLiteSend { .. } => "show_lite_send",
            SwapEvent::SetTransactionField { .. } => "set_transaction_field",
            SwapEvent::ResetTransactionFields => "reset_transaction_fields",
            SwapEvent::TokenBalanceLookupRequested { .. } => "token_balance_lookup_requested",
        }
    }

    /// Provider this event is scoped to, if any
    pub fn provider(&self) -> Option<Provider> {
        match self {
            SwapEvent::LoadRatesRequested { provider }
            | SwapEvent::StopLoadRates { provider }
            | SwapEvent::StartPollOrderStatus { provider }
            | SwapEvent::StopPollOrderStatus { provider }
            | SwapEvent::ChangeProvider { provider }
            | SwapEvent::RatesLoadSucceeded { provider }
            | SwapEvent::RatesLoadFailed { provider }
            | SwapEvent::OrderCreateSucceeded { provider }
            | SwapEvent::OrderCreateFailed { provider }
            | SwapEvent::OrderStatusRequested { provider }
            | SwapEvent::OrderStatusSucceeded { provider }
            | SwapEvent::ProviderChanged { provider } => Some(*provider),
            SwapEvent::OrderCreateRequested { params } => Some(params.provider()),
            _ => None,
        }
    }
}

/// Broadcast bus shared by every worker and supervisor.
///
/// Cheap to clone; each clone publishes into the same channel. Receivers that
/// fall behind see `Lagged` and skip ahead, which is acceptable for control
/// events because every control intent is idempotent at its supervisor.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SwapEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: SwapEvent) {
        debug!(event = event.name(), "publishing event");
        crate::metrics::record_event(&event);
        // No receivers is fine: nothing has subscribed yet, or the UI is gone.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
        self.tx.subscribe()
    }

    /// Shorthand for publishing a notification.
    pub fn notify(&self, notification: Notification) {
        crate::metrics::record_notification(notification.severity);
        self.publish(SwapEvent::Notify { notification });
    }
}
