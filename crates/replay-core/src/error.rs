//! Error types for the replay simulator.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{BracketId, OrderId};

/// Top-level replay error.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Barrier error: {0}")]
    Barrier(#[from] BarrierError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Historical data loading errors.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Data file for {symbol} not found: {}", path.display())]
    FileNotFound { symbol: String, path: PathBuf },

    #[error("Parse error in {} (record {record}): {message}", path.display())]
    Parse {
        path: PathBuf,
        record: u64,
        message: String,
    },

    #[error("Invalid record for {symbol} at {timestamp}: {reason}")]
    InvalidRecord {
        symbol: String,
        timestamp: i64,
        reason: String,
    },

    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: i64, end: i64 },

    #[error("No data available for the requested symbols and range")]
    NoDataAvailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Simulated exchange errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("No bar observed yet for {0}; cannot stamp submission time")]
    UnknownReferenceTime(String),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Bracket order not found: {0}")]
    BracketNotFound(BracketId),

    #[error("Invalid bracket order: {0}")]
    InvalidBracket(String),

    #[error("Invalid amendment for {order_id}: {reason}")]
    InvalidAmendment { order_id: OrderId, reason: String },

    #[error("Exchange is shut down")]
    Closed,
}

/// Replay barrier errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BarrierError {
    #[error("Barrier for {symbol}/{kind} is closed")]
    Closed { symbol: String, kind: String },

    #[error("Replay driver is already running")]
    AlreadyRunning,
}

/// Strategy-specific errors.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Strategy not found: {0}")]
    NotFound(String),

    #[error("Order gateway error: {0}")]
    Gateway(#[from] ExchangeError),

    #[error("Strategy error: {0}")]
    Internal(String),
}

/// Result type alias for replay operations.
pub type ReplayResult<T> = Result<T, ReplayError>;
