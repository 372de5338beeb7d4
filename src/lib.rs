//! Swap Engine - event-driven orchestration for cross-provider swaps
//!
//! This crate coordinates the lifetime of a swap against the Bity and
//! ShapeShift exchange APIs: background rate polling, order submission,
//! order status polling, the expiry countdown, and the lite-send
//! transaction prefill flow. All coordination happens over a broadcast
//! event bus; supervisors guarantee at most one live worker per concern.
//!
//! Embedders provide [`ExchangeApi`] implementations for both providers,
//! build a [`SwapEngine`], and drive it by publishing intents on its bus:
//!
//! ```ignore
//! let engine = SwapEngine::new(Settings::load()?, bity, shapeshift);
//! let handles = engine.start();
//! engine.bus().publish(SwapEvent::LoadRatesRequested {
//!     provider: Provider::Shapeshift,
//! });
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod exchange;
pub mod metrics;
pub mod state;

pub use config::{AssetConfig, EngineConfig, Settings};
pub use engine::SwapEngine;
pub use error::{EngineError, EngineResult, ExchangeError};
pub use events::{
    EventBus, Notification, OrderParams, Provider, Severity, SwapEvent, TransactionField,
};
pub use exchange::{ExchangeApi, OrderData, OrderStatus, OrderUpdate, RateTable};
pub use state::{ActiveOrder, OriginInfo, SwapStore};

/// Initialize logging for binaries embedding the engine. Library consumers
/// with their own subscriber should skip this.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swap_engine=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}
