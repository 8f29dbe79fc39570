//! Per-symbol fan-in over sliding windows.

use std::collections::BTreeMap;

use replay_core::{Bar, Tick, Timeframe};

use crate::window::SlidingWindowAggregator;

/// One [`SlidingWindowAggregator`] per symbol, created on first tick.
#[derive(Debug, Clone)]
pub struct BarAggregator {
    timeframe: Timeframe,
    windows: BTreeMap<String, SlidingWindowAggregator>,
}

impl BarAggregator {
    /// Create an aggregator producing bars of `timeframe`.
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            windows: BTreeMap::new(),
        }
    }

    /// Bar interval.
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Route a tick to its symbol's window.
    pub fn put(&mut self, tick: &Tick) -> bool {
        let timeframe = self.timeframe;
        self.windows
            .entry(tick.symbol.clone())
            .or_insert_with(|| SlidingWindowAggregator::new(tick.symbol.clone(), timeframe))
            .put(tick)
    }

    /// Current partial bar of a symbol.
    pub fn get_bar(&self, symbol: &str) -> Option<Bar> {
        self.windows.get(symbol).and_then(|w| w.get_bar())
    }

    /// Close every elapsed interval of every symbol at `now`.
    ///
    /// Bars are ordered by timestamp, then symbol.
    pub fn poll_all(&mut self, now: i64) -> Vec<Bar> {
        let mut bars: Vec<Bar> = self
            .windows
            .values_mut()
            .flat_map(|window| window.drain(now))
            .collect();
        bars.sort_by(|a, b| (a.timestamp, &a.symbol).cmp(&(b.timestamp, &b.symbol)));
        bars
    }

    /// Emit the final partial bar of every symbol.
    pub fn flush(&mut self) -> Vec<Bar> {
        let mut bars: Vec<Bar> = self.windows.values_mut().filter_map(|w| w.flush()).collect();
        bars.sort_by(|a, b| (a.timestamp, &a.symbol).cmp(&(b.timestamp, &b.symbol)));
        bars
    }

    /// Symbols seen so far.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.windows.keys().map(String::as_str)
    }
}
