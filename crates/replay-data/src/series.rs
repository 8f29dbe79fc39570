//! Time-ordered merge of every symbol's bars and trades.

use std::collections::BTreeSet;

use replay_core::error::DataError;
use replay_core::types::{Bar, DataKind, MarketEvent, Tick, Timeframe};
use tracing::{debug, info};

use crate::csv_source::{read_bars, read_trades};
use crate::directory::DataDirectory;

/// What to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    /// Symbols to load
    pub symbols: Vec<String>,
    /// Bar file timeframe
    pub timeframe: Timeframe,
    /// First timestamp to keep, inclusive (ms)
    pub start: Option<i64>,
    /// Last timestamp to keep, inclusive (ms)
    pub end: Option<i64>,
    /// Also load trade files
    pub include_trades: bool,
}

impl SeriesRequest {
    /// Request bars and trades for `symbols` over the whole file range.
    pub fn new(symbols: Vec<String>, timeframe: Timeframe) -> Self {
        Self {
            symbols,
            timeframe,
            start: None,
            end: None,
            include_trades: true,
        }
    }

    /// Restrict to an inclusive time range.
    pub fn with_range(mut self, start: Option<i64>, end: Option<i64>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Skip trade files.
    pub fn without_trades(mut self) -> Self {
        self.include_trades = false;
        self
    }
}

/// Immutable, time-ordered sequence of market events.
///
/// Ordered by timestamp, then symbol, then bars before ticks; events with
/// equal keys keep their file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoricalSeries {
    events: Vec<MarketEvent>,
}

impl HistoricalSeries {
    /// Merge bars and ticks of any symbols into one series.
    pub fn merge(bars: Vec<Bar>, ticks: Vec<Tick>) -> Self {
        let mut events: Vec<MarketEvent> = bars
            .into_iter()
            .map(MarketEvent::Bar)
            .chain(ticks.into_iter().map(MarketEvent::Tick))
            .collect();
        events.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        Self { events }
    }

    /// Keep only events with `start <= timestamp <= end`.
    pub fn filter_range(self, start: Option<i64>, end: Option<i64>) -> Result<Self, DataError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(DataError::InvalidRange { start, end });
            }
        }
        let events = self
            .events
            .into_iter()
            .filter(|e| start.map_or(true, |s| e.timestamp() >= s))
            .filter(|e| end.map_or(true, |t| e.timestamp() <= t))
            .collect();
        Ok(Self { events })
    }

    /// Load and merge every file a request names.
    ///
    /// A missing file for any requested symbol is an error, as is an empty
    /// result.
    pub fn load(directory: &DataDirectory, request: &SeriesRequest) -> Result<Self, DataError> {
        let mut bars = Vec::new();
        let mut ticks = Vec::new();

        for symbol in &request.symbols {
            let path = directory.require_bars(symbol, request.timeframe)?;
            let symbol_bars = read_bars(&path, symbol, request.timeframe)?;
            debug!(symbol = %symbol, path = %path.display(), bars = symbol_bars.len(), "Loaded bars");
            bars.extend(symbol_bars);

            if request.include_trades {
                let path = directory.require_trades(symbol)?;
                let symbol_ticks = read_trades(&path, symbol)?;
                debug!(symbol = %symbol, path = %path.display(), ticks = symbol_ticks.len(), "Loaded trades");
                ticks.extend(symbol_ticks);
            }
        }

        let series = Self::merge(bars, ticks).filter_range(request.start, request.end)?;
        if series.is_empty() {
            return Err(DataError::NoDataAvailable);
        }

        info!(
            symbols = request.symbols.len(),
            events = series.len(),
            bars = series.bar_count(),
            ticks = series.tick_count(),
            "Historical series ready"
        );
        Ok(series)
    }

    /// All events in replay order.
    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    /// Iterate events in replay order.
    pub fn iter(&self) -> impl Iterator<Item = &MarketEvent> {
        self.events.iter()
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of bar events.
    pub fn bar_count(&self) -> usize {
        self.events.iter().filter(|e| e.kind() == DataKind::Bar).count()
    }

    /// Number of tick events.
    pub fn tick_count(&self) -> usize {
        self.events.iter().filter(|e| e.kind() == DataKind::Tick).count()
    }

    /// Distinct symbols present.
    pub fn symbols(&self) -> BTreeSet<String> {
        self.events.iter().map(|e| e.symbol().to_string()).collect()
    }

    /// Distinct (symbol, kind) streams present.
    pub fn streams(&self) -> BTreeSet<(String, DataKind)> {
        self.events
            .iter()
            .map(|e| (e.symbol().to_string(), e.kind()))
            .collect()
    }

    /// Timestamp of the first event.
    pub fn first_timestamp(&self) -> Option<i64> {
        self.events.first().map(MarketEvent::timestamp)
    }

    /// Timestamp of the last event.
    pub fn last_timestamp(&self) -> Option<i64> {
        self.events.last().map(MarketEvent::timestamp)
    }
}

impl IntoIterator for HistoricalSeries {
    type Item = MarketEvent;
    type IntoIter = std::vec::IntoIter<MarketEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

fn sort_key(event: &MarketEvent) -> (i64, &str, DataKind) {
    (event.timestamp(), event.symbol(), event.kind())
}
