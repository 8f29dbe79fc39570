//! Core types and traits for the replay simulator.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Tick, Bar, MarketEvent)
//! - Order, fill and bracket order types
//! - Core traits for the order gateway, strategies and event handlers

pub mod types;
pub mod traits;
pub mod error;

pub use error::{ReplayError, ReplayResult};
pub use types::*;
pub use traits::*;
