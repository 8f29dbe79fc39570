//! Market data types: trade ticks, OHLCV bars and the replayed event.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Side, Timeframe};
use crate::error::DataError;

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Symbol traded
    pub symbol: String,
    /// Trade price
    pub price: Decimal,
    /// Traded amount
    pub amount: Decimal,
    /// Aggressor side, when the source records it
    pub side: Option<Side>,
    /// Source trade id, when the source records it
    pub id: Option<String>,
}

impl Tick {
    /// Create a new tick.
    pub fn new(symbol: impl Into<String>, timestamp: i64, price: Decimal, amount: Decimal) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            price,
            amount,
            side: None,
            id: None,
        }
    }

    /// Set the aggressor side.
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    /// Check the fields a tick must satisfy to enter a series.
    pub fn validate(&self) -> Result<(), DataError> {
        let reason = if self.price <= Decimal::ZERO {
            "price must be positive"
        } else if self.amount < Decimal::ZERO {
            "amount must not be negative"
        } else {
            return Ok(());
        };
        Err(DataError::InvalidRecord {
            symbol: self.symbol.clone(),
            timestamp: self.timestamp,
            reason: reason.to_string(),
        })
    }
}

/// OHLCV bar with exact decimal prices.
///
/// `timestamp` is the time at which the bar is processed (its close).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Symbol
    pub symbol: String,
    /// Opening price
    pub open: Decimal,
    /// Highest price
    pub high: Decimal,
    /// Lowest price
    pub low: Decimal,
    /// Closing price
    pub close: Decimal,
    /// Traded volume
    pub volume: Decimal,
    /// Number of trades in the bar
    pub trade_count: Option<u64>,
    /// Interval the bar covers
    pub timeframe: Option<Timeframe>,
}

impl Bar {
    /// Create a new bar. Use [`Bar::validate`] at trust boundaries.
    pub fn new(
        symbol: impl Into<String>,
        timestamp: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            open,
            high,
            low,
            close,
            volume,
            trade_count: None,
            timeframe: None,
        }
    }

    /// Degenerate bar holding a single trade, used to match orders tick by tick.
    pub fn from_tick(tick: &Tick) -> Self {
        Self::new(
            tick.symbol.clone(),
            tick.timestamp,
            tick.price,
            tick.price,
            tick.price,
            tick.price,
            tick.amount,
        )
        .with_trade_count(1)
    }

    /// Set the trade count.
    pub fn with_trade_count(mut self, trade_count: u64) -> Self {
        self.trade_count = Some(trade_count);
        self
    }

    /// Set the timeframe.
    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = Some(timeframe);
        self
    }

    /// Check the OHLC invariants.
    pub fn validate(&self) -> Result<(), DataError> {
        let reason = if self.high < self.open.max(self.close) {
            "high is below open or close"
        } else if self.low > self.open.min(self.close) {
            "low is above open or close"
        } else if self.low <= Decimal::ZERO {
            "prices must be positive"
        } else if self.volume < Decimal::ZERO {
            "volume must not be negative"
        } else {
            return Ok(());
        };
        Err(DataError::InvalidRecord {
            symbol: self.symbol.clone(),
            timestamp: self.timestamp,
            reason: reason.to_string(),
        })
    }

    /// Get the timestamp as a DateTime.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Kind of replayed data; half of a barrier key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// OHLCV bars (ordered before ticks at equal timestamps)
    Bar,
    /// Trade ticks
    Tick,
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Bar => write!(f, "bar"),
            DataKind::Tick => write!(f, "tick"),
        }
    }
}

/// One replayed historical data point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MarketEvent {
    Bar(Bar),
    Tick(Tick),
}

impl MarketEvent {
    /// Timestamp in milliseconds.
    pub fn timestamp(&self) -> i64 {
        match self {
            MarketEvent::Bar(bar) => bar.timestamp,
            MarketEvent::Tick(tick) => tick.timestamp,
        }
    }

    /// Symbol the event belongs to.
    pub fn symbol(&self) -> &str {
        match self {
            MarketEvent::Bar(bar) => &bar.symbol,
            MarketEvent::Tick(tick) => &tick.symbol,
        }
    }

    /// Kind discriminant.
    pub fn kind(&self) -> DataKind {
        match self {
            MarketEvent::Bar(_) => DataKind::Bar,
            MarketEvent::Tick(_) => DataKind::Tick,
        }
    }
}

impl From<Bar> for MarketEvent {
    fn from(bar: Bar) -> Self {
        MarketEvent::Bar(bar)
    }
}

impl From<Tick> for MarketEvent {
    fn from(tick: Tick) -> Self {
        MarketEvent::Tick(tick)
    }
}
