//! Exchange backend interface
//!
//! The engine treats the two exchange HTTP clients as opaque collaborators
//! behind [`ExchangeApi`]; transport, authentication and rate/fee semantics
//! live entirely in the implementations supplied by the embedder.

use crate::error::ExchangeError;
use crate::events::{OrderParams, Provider};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Quoted rates keyed by currency pair (e.g. `"ETH_BTC"`).
///
/// Fully replaced on every successful poll, never merged.
pub type RateTable = HashMap<String, f64>;

/// Order status, unified over both providers' vocabularies.
///
/// Bity reports `OPEN`/`RCVE`/`FILL`/`CANC`; ShapeShift reports
/// `no_deposits`/`received`/`complete`/`failed`. Which variants a given
/// provider can produce is enforced only by parsing, not by the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Received,
    Filled,
    Cancelled,
    NoDeposits,
    Complete,
    Failed,
}

impl OrderStatus {
    /// Parse a provider wire code into a status.
    pub fn from_wire(provider: Provider, code: &str) -> Option<Self> {
        match provider {
            Provider::Bity => match code {
                "OPEN" => Some(OrderStatus::Open),
                "RCVE" => Some(OrderStatus::Received),
                "FILL" => Some(OrderStatus::Filled),
                "CANC" => Some(OrderStatus::Cancelled),
                _ => None,
            },
            Provider::Shapeshift => match code {
                "no_deposits" => Some(OrderStatus::NoDeposits),
                "received" => Some(OrderStatus::Received),
                "complete" => Some(OrderStatus::Complete),
                "failed" => Some(OrderStatus::Failed),
                _ => None,
            },
        }
    }

    /// Terminal statuses: once reached, no further polling or timing occurs.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Complete
                | OrderStatus::Failed
        )
    }

    /// The provider's "cancelled" terminal value, the one case where the
    /// status poller terminates itself instead of waiting to be cancelled.
    pub fn is_cancelled_for(&self, provider: Provider) -> bool {
        match provider {
            Provider::Bity => *self == OrderStatus::Cancelled,
            Provider::Shapeshift => *self == OrderStatus::Failed,
        }
    }
}

/// Payload of a successful order creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderData {
    pub order_id: String,
    /// Address the user must pay into. ShapeShift keys status lookups on it.
    pub payment_address: String,
    pub origin_amount: f64,
    pub destination_amount: f64,
    pub created_at: DateTime<Utc>,
    /// Validity window in seconds from `created_at`.
    pub valid_for_secs: u64,
}

/// Payload of a successful order status fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub status: OrderStatus,
    pub origin_amount: Option<f64>,
    pub destination_amount: Option<f64>,
}

/// Opaque exchange backend.
///
/// `reference` for [`fetch_order_status`](Self::fetch_order_status) is the
/// order id for Bity and the payment address for ShapeShift; the status
/// poller picks the right one from the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    fn provider(&self) -> Provider;

    async fn fetch_rates(&self) -> Result<RateTable, ExchangeError>;

    async fn create_order(&self, params: &OrderParams) -> Result<OrderData, ExchangeError>;

    async fn fetch_order_status(&self, reference: &str) -> Result<OrderUpdate, ExchangeError>;
}
