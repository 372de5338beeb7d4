//! Error types for the swap engine

use crate::events::Provider;

use thiserror::Error;

/// Errors returned by exchange backends.
///
/// A `Provider` error is a well-formed error response from the exchange; a
/// `Transport` error is anything below that (connection refused, bad gateway,
/// deserialization failure). The two are surfaced to the user differently, so
/// callers match on the variant rather than the message.
#[derive(Error, Debug, Clone)]
pub enum ExchangeError {
    #[error("{provider} error: {message}")]
    Provider { provider: Provider, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{provider} request timed out after {secs}s")]
    Timeout { provider: Provider, secs: u64 },
}

impl ExchangeError {
    /// Well-formed error response from the exchange, safe to show verbatim.
    pub fn is_structured(&self) -> bool {
        matches!(self, ExchangeError::Provider { .. })
    }

    /// Transport failures and timeouts get the generic connectivity message.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ExchangeError::Transport(_) | ExchangeError::Timeout { .. }
        )
    }
}

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("event bus closed")]
    BusClosed,

    #[error("no active order for {provider}")]
    NoActiveOrder { provider: Provider },

    #[error("payment address not resolved after {attempts} attempts")]
    PaymentAddressUnresolved { attempts: u32 },
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
