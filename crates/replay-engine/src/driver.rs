//! Time-scaled replay of a historical series through the barriers.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use replay_core::error::{BarrierError, ReplayError};
use replay_core::types::{DataKind, MarketEvent};
use replay_data::HistoricalSeries;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::barrier::{BarrierRegistry, ReplayBarrier};

/// Replay speed relative to recorded time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaySpeed {
    /// Replay as fast as consumers allow
    #[default]
    Unbounded,
    /// Compress recorded gaps by this factor (1.0 = real time)
    Multiplier(f64),
}

impl ReplaySpeed {
    /// Create a multiplier speed. The factor must be finite and positive.
    pub fn multiplier(factor: f64) -> Result<Self, ReplayError> {
        if factor.is_finite() && factor > 0.0 {
            Ok(ReplaySpeed::Multiplier(factor))
        } else {
            Err(ReplayError::Config(format!(
                "replay speed must be a positive number, got {factor}"
            )))
        }
    }

    /// `None` means unbounded.
    pub fn from_factor(factor: Option<f64>) -> Result<Self, ReplayError> {
        factor.map_or(Ok(ReplaySpeed::Unbounded), Self::multiplier)
    }

    /// Wall-clock duration of a recorded gap.
    pub fn scale(&self, gap_ms: i64) -> Duration {
        match *self {
            ReplaySpeed::Unbounded => Duration::ZERO,
            ReplaySpeed::Multiplier(factor) if gap_ms > 0 => {
                Duration::try_from_secs_f64(gap_ms as f64 / 1000.0 / factor).unwrap_or(Duration::ZERO)
            }
            ReplaySpeed::Multiplier(_) => Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

/// Cloneable handle that halts a running replay.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    signal: Arc<StopSignal>,
}

impl StopHandle {
    /// Create an untriggered handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Halt after the current data point. Wakes a pacing sleep immediately.
    pub fn stop(&self) {
        if !self.signal.stopped.swap(true, Ordering::SeqCst) {
            info!("Replay stop requested");
        }
        self.signal.notify.notify_waiters();
    }

    /// Check if a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.signal.stopped.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless stopped first. Returns `false` when
    /// interrupted.
    async fn sleep(&self, duration: Duration) -> bool {
        let notified = self.signal.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_stopped() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = notified => false,
        }
    }
}

/// What a replay run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSummary {
    /// Data points published
    pub points: u64,
    /// Bars among them
    pub bars: u64,
    /// Ticks among them
    pub ticks: u64,
    /// Completed subscriber deliveries
    pub deliveries: u64,
    /// Points published to a barrier without subscribers
    pub unobserved: u64,
    /// Subscribers evicted by the timeout policy
    pub evicted: u64,
    /// Run halted by a stop request
    pub stopped: bool,
    /// Timestamp of the first published point
    pub first_timestamp: Option<i64>,
    /// Timestamp of the last published point
    pub last_timestamp: Option<i64>,
}

impl DriverSummary {
    fn record(&mut self, event: &MarketEvent, delivered: usize, evicted: usize) {
        self.points += 1;
        match event.kind() {
            DataKind::Bar => self.bars += 1,
            DataKind::Tick => self.ticks += 1,
        }
        if delivered == 0 && evicted == 0 {
            self.unobserved += 1;
        }
        self.deliveries += delivered as u64;
        self.evicted += evicted as u64;
        self.first_timestamp.get_or_insert(event.timestamp());
        self.last_timestamp = Some(event.timestamp());
    }
}

/// Driver-side barrier lookup that avoids the registry lock per point.
#[derive(Default)]
struct BarrierCache {
    barriers: BTreeMap<DataKind, HashMap<String, Arc<ReplayBarrier>>>,
}

impl BarrierCache {
    fn get(&mut self, registry: &BarrierRegistry, event: &MarketEvent) -> Arc<ReplayBarrier> {
        let by_symbol = self.barriers.entry(event.kind()).or_default();
        if let Some(barrier) = by_symbol.get(event.symbol()) {
            return Arc::clone(barrier);
        }
        let barrier = registry.barrier(event.symbol(), event.kind());
        by_symbol.insert(event.symbol().to_string(), Arc::clone(&barrier));
        barrier
    }
}

/// Replay driver.
///
/// Publishes every point of a [`HistoricalSeries`] through the barrier of
/// its stream, sleeping between points according to the [`ReplaySpeed`].
/// All barriers are closed when the run ends, however it ends.
#[derive(Debug)]
pub struct ReplayDriver {
    series: HistoricalSeries,
    registry: Arc<BarrierRegistry>,
    speed: ReplaySpeed,
    stop: StopHandle,
    running: AtomicBool,
}

impl ReplayDriver {
    /// Create a driver over `series`.
    pub fn new(series: HistoricalSeries, registry: Arc<BarrierRegistry>) -> Self {
        Self {
            series,
            registry,
            speed: ReplaySpeed::default(),
            stop: StopHandle::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Set the replay speed.
    pub fn with_speed(mut self, speed: ReplaySpeed) -> Self {
        self.speed = speed;
        self
    }

    /// Use an existing stop handle.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Replay speed.
    pub fn speed(&self) -> ReplaySpeed {
        self.speed
    }

    /// Handle that halts this driver.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Barriers this driver publishes through.
    pub fn registry(&self) -> &Arc<BarrierRegistry> {
        &self.registry
    }

    /// Replay the series once.
    pub async fn run(&self) -> Result<DriverSummary, BarrierError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(BarrierError::AlreadyRunning);
        }
        info!(points = self.series.len(), speed = ?self.speed, "Replay started");

        let result = self.replay().await;
        self.registry.close_all();

        if let Ok(summary) = &result {
            info!(
                points = summary.points,
                deliveries = summary.deliveries,
                evicted = summary.evicted,
                stopped = summary.stopped,
                "Replay finished"
            );
        }
        result
    }

    async fn replay(&self) -> Result<DriverSummary, BarrierError> {
        let mut summary = DriverSummary::default();
        let mut cache = BarrierCache::default();
        let events = self.series.events();

        for (index, event) in events.iter().enumerate() {
            if self.stop.is_stopped() {
                summary.stopped = true;
                break;
            }
            let started = Instant::now();

            let barrier = cache.get(&self.registry, event);
            let outcome = barrier.publish(event.clone()).await?;
            summary.record(event, outcome.delivered, outcome.evicted);

            let Some(next) = events.get(index + 1) else {
                break;
            };
            let pause = self
                .speed
                .scale(next.timestamp() - event.timestamp())
                .saturating_sub(started.elapsed());
            if !pause.is_zero() {
                debug!(?pause, next = next.timestamp(), "Pacing");
                if !self.stop.sleep(pause).await {
                    summary.stopped = true;
                    break;
                }
            }
        }

        Ok(summary)
    }
}
