//! Sliding-window candle aggregation for a single symbol.

use replay_core::{Bar, Tick, Timeframe};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct Entry {
    seq: u64,
    timestamp: i64,
    price: Decimal,
    amount: Decimal,
}

/// Sliding-window OHLCV aggregator.
///
/// Retains the ticks of the current bar (oldest at the front) together with
/// two monotonic deques: `maxima` holds strictly decreasing prices and
/// `minima` strictly increasing ones, so their fronts are the window's high
/// and low. Each tick enters and leaves each deque at most once.
#[derive(Debug, Clone)]
pub struct SlidingWindowAggregator {
    symbol: String,
    timeframe: Timeframe,
    window: VecDeque<Entry>,
    maxima: VecDeque<Entry>,
    minima: VecDeque<Entry>,
    volume: Decimal,
    opening: Option<i64>,
    last_timestamp: Option<i64>,
    next_seq: u64,
}

impl SlidingWindowAggregator {
    /// Create an empty aggregator for `symbol`.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            window: VecDeque::new(),
            maxima: VecDeque::new(),
            minima: VecDeque::new(),
            volume: Decimal::ZERO,
            opening: None,
            last_timestamp: None,
            next_seq: 0,
        }
    }

    /// Symbol this window aggregates.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Bar interval.
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Opening timestamp of the current bar.
    pub fn opening(&self) -> Option<i64> {
        self.opening
    }

    /// Running volume of the retained ticks.
    pub fn volume(&self) -> Decimal {
        self.volume
    }

    /// Number of retained ticks.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Check if no tick is retained.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Retained ticks as `(timestamp, price, amount)`, oldest first.
    pub fn retained(&self) -> impl Iterator<Item = (i64, Decimal, Decimal)> + '_ {
        self.window.iter().map(|e| (e.timestamp, e.price, e.amount))
    }

    /// Add a tick to the window.
    ///
    /// Starts a new bar at the tick's timestamp when the tick falls past the
    /// current bar's interval. Returns `false` (and keeps the window intact)
    /// for ticks of another symbol or older than the newest accepted tick.
    pub fn put(&mut self, tick: &Tick) -> bool {
        if tick.symbol != self.symbol {
            return false;
        }
        if self.last_timestamp.is_some_and(|last| tick.timestamp < last) {
            trace!(
                symbol = %self.symbol,
                timestamp = tick.timestamp,
                "Ignoring out-of-order tick"
            );
            return false;
        }

        let interval = self.timeframe.as_millis();
        let opening = match self.opening {
            Some(opening) if tick.timestamp < opening + interval => opening,
            _ => tick.timestamp,
        };
        self.opening = Some(opening);
        self.last_timestamp = Some(tick.timestamp);

        let entry = Entry {
            seq: self.next_seq,
            timestamp: tick.timestamp,
            price: tick.price,
            amount: tick.amount,
        };
        self.next_seq += 1;

        self.window.push_back(entry);
        self.volume += entry.amount;

        while self.maxima.back().is_some_and(|e| e.price <= entry.price) {
            self.maxima.pop_back();
        }
        self.maxima.push_back(entry);

        while self.minima.back().is_some_and(|e| e.price >= entry.price) {
            self.minima.pop_back();
        }
        self.minima.push_back(entry);

        self.evict_before(opening);
        true
    }

    /// Bar of the retained ticks, stamped with the current bar's closing
    /// boundary. `None` when the window is empty.
    pub fn get_bar(&self) -> Option<Bar> {
        let opening = self.opening?;
        self.bar_at(opening + self.timeframe.as_millis())
    }

    /// Check if the current bar's interval has elapsed at `now`.
    pub fn is_due(&self, now: i64) -> bool {
        self.opening
            .is_some_and(|opening| now >= opening + self.timeframe.as_millis())
    }

    /// Close the current bar if its interval has elapsed at `now`.
    ///
    /// The window advances by exactly one interval whether or not it held
    /// ticks; only a non-empty window produces a bar.
    pub fn poll(&mut self, now: i64) -> Option<Bar> {
        if !self.is_due(now) {
            return None;
        }
        let opening = self.opening?;
        let closing = opening + self.timeframe.as_millis();
        let bar = self.bar_at(closing);

        self.opening = Some(closing);
        self.evict_before(closing);
        bar
    }

    /// Close every interval that has elapsed at `now`.
    pub fn drain(&mut self, now: i64) -> Vec<Bar> {
        let interval = self.timeframe.as_millis();
        let mut bars = Vec::new();
        while self.is_due(now) {
            if self.is_empty() {
                // Skip whole empty intervals in one step.
                if let Some(opening) = self.opening {
                    let skipped = (now - opening) / interval;
                    self.opening = Some(opening + skipped * interval);
                }
                break;
            }
            bars.extend(self.poll(now));
        }
        bars
    }

    /// Emit the final partial bar and empty the window.
    pub fn flush(&mut self) -> Option<Bar> {
        let bar = self.get_bar();
        self.window.clear();
        self.maxima.clear();
        self.minima.clear();
        self.volume = Decimal::ZERO;
        self.opening = None;
        bar
    }

    fn bar_at(&self, timestamp: i64) -> Option<Bar> {
        let first = self.window.front()?;
        let last = self.window.back()?;
        let high = self.maxima.front()?.price;
        let low = self.minima.front()?.price;

        Some(
            Bar::new(
                self.symbol.clone(),
                timestamp,
                first.price,
                high,
                low,
                last.price,
                self.volume,
            )
            .with_trade_count(self.window.len() as u64)
            .with_timeframe(self.timeframe),
        )
    }

    fn evict_before(&mut self, cutoff: i64) {
        while let Some(oldest) = self.window.front().copied() {
            if oldest.timestamp >= cutoff {
                break;
            }
            self.window.pop_front();
            if self.maxima.front().is_some_and(|e| e.seq == oldest.seq) {
                self.maxima.pop_front();
            }
            if self.minima.front().is_some_and(|e| e.seq == oldest.seq) {
                self.minima.pop_front();
            }
            self.volume -= oldest.amount;
        }
    }
}
