//! Configuration structures.

use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use replay_core::types::Timeframe;
use replay_data::{parse_timestamp, DataDirectory, SeriesRequest};
use replay_engine::{BarrierPolicy, MatchSource, ReplaySpeed, SessionConfig};
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub replay: ReplaySettings,
    #[serde(default)]
    pub strategy: StrategySettings,
}

impl AppConfig {
    /// Reject inconsistent settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.symbols.is_empty() {
            return Err(invalid("data.symbols must name at least one symbol"));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(invalid(format!(
                "logging.format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            )));
        }
        self.session_config()?;
        self.series_request()?;
        if self.replay.match_source != MatchSource::Bars && self.data.exclude_trades {
            return Err(invalid(format!(
                "replay.match_source '{}' needs trades, but data.exclude_trades is set",
                self.replay.match_source
            )));
        }
        if self.strategy.name.trim().is_empty() {
            return Err(invalid("strategy.name must not be empty"));
        }
        Ok(())
    }

    /// Where the historical files live.
    pub fn data_directory(&self) -> DataDirectory {
        DataDirectory::new(&self.data.ohlcvt_dir, &self.data.trades_dir)
    }

    /// What to load.
    pub fn series_request(&self) -> Result<SeriesRequest, ConfigError> {
        let start = parse_bound("data.start", self.data.start.as_deref())?;
        let end = parse_bound("data.end", self.data.end.as_deref())?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(invalid("data.start must not be after data.end"));
            }
        }

        let request = SeriesRequest::new(self.data.symbols.clone(), self.data.timeframe)
            .with_range(start, end);
        Ok(if self.data.exclude_trades {
            request.without_trades()
        } else {
            request
        })
    }

    /// Session settings.
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let speed = ReplaySpeed::from_factor(self.replay.speed)
            .map_err(|e| invalid(format!("replay.speed: {e}")))?;
        Ok(SessionConfig {
            speed,
            barrier_policy: self.replay.barrier_policy()?,
            match_source: self.replay.match_source,
            aggregation: self.replay.aggregation_interval,
        })
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Message(message.into())
}

fn parse_bound(field: &str, value: Option<&str>) -> Result<Option<i64>, ConfigError> {
    value
        .map(|raw| {
            parse_timestamp(raw)
                .ok_or_else(|| invalid(format!("{field}: cannot parse timestamp '{raw}'")))
        })
        .transpose()
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "replay".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Check if JSON output is configured.
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

/// Historical data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Directory of `<SYMBOL>_<minutes>.csv` bar files
    pub ohlcvt_dir: PathBuf,
    /// Directory of `<SYMBOL>.csv` trade files
    pub trades_dir: PathBuf,
    pub symbols: Vec<String>,
    /// Bar file timeframe
    pub timeframe: Timeframe,
    /// RFC 3339, `YYYY-MM-DD` or epoch seconds
    pub start: Option<String>,
    pub end: Option<String>,
    pub exclude_trades: bool,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            ohlcvt_dir: PathBuf::from("data/ohlcvt"),
            trades_dir: PathBuf::from("data/trades"),
            symbols: Vec::new(),
            timeframe: Timeframe::MINUTE_1,
            start: None,
            end: None,
            exclude_trades: false,
        }
    }
}

/// Barrier stall policy as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarrierPolicyKind {
    #[default]
    Strict,
    Timeout,
}

/// Replay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Speed multiplier; absent means unbounded
    pub speed: Option<f64>,
    pub barrier_policy: BarrierPolicyKind,
    pub barrier_timeout_ms: Option<u64>,
    /// Interval of bars built from ticks
    pub aggregation_interval: Timeframe,
    pub match_source: MatchSource,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            speed: None,
            barrier_policy: BarrierPolicyKind::Strict,
            barrier_timeout_ms: None,
            aggregation_interval: Timeframe::MINUTE_1,
            match_source: MatchSource::Bars,
        }
    }
}

impl ReplaySettings {
    /// Resolve the barrier policy.
    pub fn barrier_policy(&self) -> Result<BarrierPolicy, ConfigError> {
        match (self.barrier_policy, self.barrier_timeout_ms) {
            (BarrierPolicyKind::Strict, _) => Ok(BarrierPolicy::Strict),
            (BarrierPolicyKind::Timeout, Some(ms)) if ms > 0 => Ok(BarrierPolicy::Timeout {
                after: Duration::from_millis(ms),
            }),
            (BarrierPolicyKind::Timeout, _) => Err(invalid(
                "replay.barrier_policy 'timeout' needs a positive replay.barrier_timeout_ms",
            )),
        }
    }
}

/// Strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Registry key
    pub name: String,
    /// Overrides of the strategy's default configuration
    pub params: serde_json::Value,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            name: "dip_buyer".to_string(),
            params: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}
