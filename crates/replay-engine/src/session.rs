//! End-to-end replay session.
//!
//! A session owns one replay run: it spawns the simulated exchange, subscribes
//! a single consumer to the barriers of the streams it matches against, runs
//! the driver, and assembles the report once the driver has closed every
//! barrier.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::select_all;
use replay_bars::BarAggregator;
use replay_core::error::ReplayError;
use replay_core::traits::{EventHandler, Strategy};
use replay_core::types::{Bar, DataKind, MarketEvent, OrderEvent, Timeframe};
use replay_data::HistoricalSeries;
use replay_exchange::{ExchangeClient, SimulatedExchange};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::barrier::{BarrierPolicy, BarrierRegistry, Subscription};
use crate::driver::{ReplayDriver, ReplaySpeed, StopHandle};
use crate::report::ReplayReport;
use crate::stats::ReplayStats;

/// Which stream the exchange matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    /// Recorded bars
    #[default]
    Bars,
    /// Bars built from recorded ticks
    Aggregated,
    /// Every tick as a single-trade bar
    Ticks,
}

impl MatchSource {
    /// Check if this source consumes a stream of `kind`.
    pub fn consumes(&self, kind: DataKind) -> bool {
        matches!(
            (self, kind),
            (MatchSource::Bars, DataKind::Bar)
                | (MatchSource::Aggregated | MatchSource::Ticks, DataKind::Tick)
        )
    }
}

impl fmt::Display for MatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchSource::Bars => write!(f, "bars"),
            MatchSource::Aggregated => write!(f, "aggregated"),
            MatchSource::Ticks => write!(f, "ticks"),
        }
    }
}

impl FromStr for MatchSource {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bars" => Ok(MatchSource::Bars),
            "aggregated" => Ok(MatchSource::Aggregated),
            "ticks" => Ok(MatchSource::Ticks),
            other => Err(ReplayError::Config(format!("unknown match source: {other}"))),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Replay speed
    pub speed: ReplaySpeed,
    /// Barrier stall policy
    pub barrier_policy: BarrierPolicy,
    /// Stream the exchange matches against
    pub match_source: MatchSource,
    /// Interval of aggregated bars
    pub aggregation: Timeframe,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            speed: ReplaySpeed::Unbounded,
            barrier_policy: BarrierPolicy::Strict,
            match_source: MatchSource::Bars,
            aggregation: Timeframe::MINUTE_1,
        }
    }
}

/// One replay run.
pub struct ReplaySession {
    config: SessionConfig,
    series: HistoricalSeries,
    strategies: Vec<Box<dyn Strategy>>,
    handlers: Vec<Box<dyn EventHandler<OrderEvent>>>,
    stop: StopHandle,
}

impl ReplaySession {
    /// Create a session over `series`.
    pub fn new(series: HistoricalSeries, config: SessionConfig) -> Self {
        Self {
            config,
            series,
            strategies: Vec::new(),
            handlers: Vec::new(),
            stop: StopHandle::new(),
        }
    }

    /// Add a strategy. Strategies receive each bar in the order they were
    /// added.
    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Add a downstream order event handler. Handlers run inside the
    /// exchange task.
    pub fn with_event_handler(mut self, handler: impl EventHandler<OrderEvent> + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Handle that halts the run after the current data point.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run the replay to completion (or until stopped).
    pub async fn run(self) -> Result<ReplayReport, ReplayError> {
        let started = std::time::Instant::now();
        let run_id = Uuid::new_v4();
        let ReplaySession {
            config,
            series,
            strategies,
            handlers,
            stop,
        } = self;
        let names: Vec<String> = strategies.iter().map(|s| s.name().to_string()).collect();

        info!(
            %run_id,
            points = series.len(),
            source = %config.match_source,
            strategies = ?names,
            "Replay session starting"
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel::<OrderEvent>();
        let mut exchange = SimulatedExchange::new().with_handler(events_tx);
        for mut handler in handlers {
            exchange = exchange.with_handler(move |event: &OrderEvent| handler.handle(event));
        }
        let (client, exchange_task) = exchange.spawn();

        let registry = Arc::new(BarrierRegistry::new(config.barrier_policy));
        let subscriptions = series
            .streams()
            .into_iter()
            .filter(|(_, kind)| config.match_source.consumes(*kind))
            .map(|(symbol, kind)| registry.subscribe(&symbol, kind))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(streams = subscriptions.len(), "Consumer subscribed");

        let driver = ReplayDriver::new(series, Arc::clone(&registry))
            .with_speed(config.speed)
            .with_stop_handle(stop.clone());
        let driver_task = tokio::spawn(async move { driver.run().await });

        let cadence = config.aggregation.poll_cadence_millis();
        if config.match_source == MatchSource::Aggregated {
            debug!(interval = %config.aggregation, cadence_ms = cadence, "Aggregating ticks into bars");
        }
        let mut consumer = Consumer {
            client,
            strategies,
            events: events_rx,
            aggregator: BarAggregator::new(config.aggregation),
            cadence,
            source: config.match_source,
            stop: stop.clone(),
            stats: ReplayStats::new(),
        };
        let consumed = consumer.run(subscriptions).await;
        if consumed.is_err() {
            stop.stop();
        }

        let summary = driver_task
            .await
            .map_err(|e| ReplayError::Internal(format!("replay driver task failed: {e}")))??;
        consumed?;

        let snapshot = consumer.client.snapshot().await?;
        let mut stats = std::mem::take(&mut consumer.stats);
        // The exchange task ends once its last client is gone.
        drop(consumer);
        exchange_task
            .await
            .map_err(|e| ReplayError::Internal(format!("exchange task failed: {e}")))?;

        stats.record_driver(&summary);
        stats.record_exchange(&snapshot);
        stats.finalize(started.elapsed());

        info!(
            %run_id,
            points = stats.points_replayed,
            orders = stats.orders,
            fills = stats.fills,
            wall_time_ms = stats.wall_time_ms,
            "Replay session finished"
        );
        Ok(ReplayReport::new(run_id, names, config, stats, snapshot))
    }
}

/// Single consumer of every subscribed stream. Owns the strategies, so bars
/// reach them sequentially in replay order.
struct Consumer {
    client: ExchangeClient,
    strategies: Vec<Box<dyn Strategy>>,
    events: mpsc::UnboundedReceiver<OrderEvent>,
    aggregator: BarAggregator,
    /// Replay-time poll step of the aggregator, in ms
    cadence: i64,
    source: MatchSource,
    stop: StopHandle,
    stats: ReplayStats,
}

impl Consumer {
    async fn run(&mut self, mut subscriptions: Vec<Subscription>) -> Result<(), ReplayError> {
        while !subscriptions.is_empty() {
            let (delivery, index, pending) =
                select_all(subscriptions.iter_mut().map(|s| Box::pin(s.recv()))).await;
            drop(pending);

            let Some(delivery) = delivery else {
                let closed = subscriptions.swap_remove(index);
                debug!(barrier = %closed.key(), "Stream closed");
                continue;
            };
            for event in delivery.events() {
                self.consume(event).await?;
            }
            delivery.complete();
        }

        if self.source == MatchSource::Aggregated && !self.stop.is_stopped() {
            for bar in self.aggregator.flush() {
                self.stats.aggregated_bars += 1;
                self.dispatch(bar).await?;
            }
        }
        Ok(())
    }

    async fn consume(&mut self, event: &MarketEvent) -> Result<(), ReplayError> {
        match (event, self.source) {
            (MarketEvent::Bar(bar), _) => self.dispatch(bar.clone()).await,
            (MarketEvent::Tick(tick), MatchSource::Ticks) => self.dispatch(Bar::from_tick(tick)).await,
            (MarketEvent::Tick(tick), _) => {
                let due = poll_point(tick.timestamp, self.cadence);
                for bar in self.aggregator.poll_all(due) {
                    self.stats.aggregated_bars += 1;
                    self.dispatch(bar).await?;
                }
                if !self.aggregator.put(tick) {
                    trace!(symbol = %tick.symbol, timestamp = tick.timestamp, "Tick not aggregated");
                }
                Ok(())
            }
        }
    }

    /// Match a bar, then hand it to the strategies.
    async fn dispatch(&mut self, bar: Bar) -> Result<(), ReplayError> {
        let fills = self.client.match_bar(bar.clone()).await?;
        self.stats.bars_matched += 1;
        if !fills.is_empty() {
            trace!(symbol = %bar.symbol, timestamp = bar.timestamp, fills = fills.len(), "Bar matched");
        }
        forward_events(&mut self.events, &mut self.strategies);

        for index in 0..self.strategies.len() {
            if !self.strategies[index].trades(&bar.symbol) {
                continue;
            }
            let result = self.strategies[index].on_bar(&bar, &self.client).await;
            if let Err(error) = result {
                self.stats.strategy_errors += 1;
                warn!(
                    strategy = self.strategies[index].name(),
                    symbol = %bar.symbol,
                    timestamp = bar.timestamp,
                    %error,
                    "Strategy failed on bar"
                );
            }
            forward_events(&mut self.events, &mut self.strategies);
        }
        Ok(())
    }
}

/// Latest poll instant of a `cadence`-spaced replay clock at or before `now`.
fn poll_point(now: i64, cadence: i64) -> i64 {
    now - now.rem_euclid(cadence.max(1))
}

/// Hand queued order events to the strategies trading their symbol.
fn forward_events(events: &mut mpsc::UnboundedReceiver<OrderEvent>, strategies: &mut [Box<dyn Strategy>]) {
    while let Ok(event) = events.try_recv() {
        for strategy in strategies.iter_mut().filter(|s| s.trades(event.symbol())) {
            match &event {
                OrderEvent::Updated(order) => strategy.on_order(order),
                OrderEvent::Filled(fill) => strategy.on_fill(fill),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_source_streams() {
        assert!(MatchSource::Bars.consumes(DataKind::Bar));
        assert!(!MatchSource::Bars.consumes(DataKind::Tick));
        assert!(MatchSource::Aggregated.consumes(DataKind::Tick));
        assert!(!MatchSource::Ticks.consumes(DataKind::Bar));
    }

    #[test]
    fn test_poll_point_follows_cadence() {
        let cadence = Timeframe::from_millis(1_000).unwrap().poll_cadence_millis();
        assert_eq!(cadence, 33);
        assert_eq!(poll_point(1_200, cadence), 1_188);
        assert_eq!(poll_point(990, cadence), 990);
        assert_eq!(poll_point(-5, cadence), -33);
        assert_eq!(poll_point(61_234, Timeframe::MINUTE_1.poll_cadence_millis()), 61_000);
    }

    #[test]
    fn test_match_source_parse() {
        assert_eq!("Aggregated".parse::<MatchSource>().unwrap(), MatchSource::Aggregated);
        assert!("book".parse::<MatchSource>().is_err());
        assert_eq!(MatchSource::Ticks.to_string(), "ticks");
    }

    #[test]
    fn test_session_config_serde() {
        let json = r#"{
            "speed": {"multiplier": 60.0},
            "barrier_policy": {"timeout": {"after": {"secs": 1, "nanos": 0}}},
            "match_source": "aggregated",
            "aggregation": "15m"
        }"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.speed, ReplaySpeed::Multiplier(60.0));
        assert_eq!(config.match_source, MatchSource::Aggregated);
        assert_eq!(config.aggregation, Timeframe::MINUTE_15);
    }
}
