//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use replay_engine::MatchSource;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "replay")]
#[command(author, version, about = "Deterministic market-data replay and order-matching simulator")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level; defaults to `logging.level` from the configuration
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Level to log at: the flag if given, else the configured level, else info.
pub fn resolve_log_level(flag: Option<&LogLevel>, configured: Option<&str>) -> String {
    match (flag, configured) {
        (Some(level), _) => level.as_str().to_string(),
        (None, Some(level)) if !level.trim().is_empty() => level.to_string(),
        (None, _) => "info".to_string(),
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay historical data through a strategy
    Run(RunArgs),
    /// List available strategies
    Strategies,
    /// Validate configuration
    ValidateConfig,
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Strategy to run, overriding the configured one
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Symbols to replay (comma-separated), overriding the configured ones
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Speed multiplier; 60 plays one recorded minute per second
    #[arg(long)]
    pub speed: Option<f64>,

    /// Stream the exchange matches against (bars, aggregated, ticks)
    #[arg(long)]
    pub match_source: Option<MatchSource>,

    /// Output format
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,

    /// Save the JSON report to file
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Save every fill as CSV
    #[arg(long)]
    pub fills_csv: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_falls_back_to_config() {
        assert_eq!(resolve_log_level(Some(&LogLevel::Warn), Some("debug")), "warn");
        assert_eq!(resolve_log_level(None, Some("debug")), "debug");
        assert_eq!(resolve_log_level(None, None), "info");
    }

    #[test]
    fn test_log_level_flag_is_optional() {
        let cli = Cli::try_parse_from(["replay", "strategies"]).unwrap();
        assert!(cli.log_level.is_none());

        let cli = Cli::try_parse_from(["replay", "--log-level", "trace", "strategies"]).unwrap();
        assert!(matches!(cli.log_level, Some(LogLevel::Trace)));
    }
}
