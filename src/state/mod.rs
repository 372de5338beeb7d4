//! Shared in-memory swap state
//!
//! One store per engine instance. Workers read through narrow selectors and
//! write through owner-scoped update functions; nothing else touches the
//! guarded state.

mod store;

pub use store::{ActiveOrder, OriginInfo, SwapStore};
