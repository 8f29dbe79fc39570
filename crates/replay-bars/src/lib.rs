//! Incremental OHLCV bar aggregation.
//!
//! This crate turns a stream of trade ticks into fixed-interval bars:
//! - [`SlidingWindowAggregator`] keeps one symbol's window with monotonic
//!   max/min deques, so every update and every bar read is amortized O(1)
//! - [`BarAggregator`] fans ticks out to one window per symbol

pub mod aggregator;
pub mod window;

pub use aggregator::BarAggregator;
pub use window::SlidingWindowAggregator;
