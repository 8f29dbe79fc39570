//! Configuration management.

mod settings;

pub use settings::{
    AppConfig, AppSettings, BarrierPolicyKind, DataSettings, LoggingConfig, ReplaySettings,
    StrategySettings,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from file and environment.
///
/// Environment variables prefixed `REPLAY` override the file, with `__`
/// separating sections (`REPLAY__REPLAY__SPEED=60`). `data.symbols` may be
/// given as a comma-separated list.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("REPLAY")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("data.symbols"),
        )
        .build()?;

    config.try_deserialize()
}

/// Parse configuration from a TOML string, without environment overrides.
pub fn parse_config(source: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(source).map_err(|e| ConfigError::Message(e.to_string()))
}
