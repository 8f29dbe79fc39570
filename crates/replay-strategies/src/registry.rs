//! Strategy registry for loading strategies by name.

use std::collections::BTreeMap;

use replay_core::error::StrategyError;
use replay_core::traits::{Strategy, StrategyConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{BracketBreakoutConfig, BracketBreakoutStrategy, DipBuyerConfig, DipBuyerStrategy};

/// Information about a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Registry key
    pub key: String,
    /// Display name
    pub name: String,
    /// Strategy description
    pub description: String,
    /// Default configuration as JSON
    pub default_config: serde_json::Value,
}

/// Registry of the built-in strategies.
pub struct StrategyRegistry {
    strategies: BTreeMap<String, StrategyInfo>,
}

impl StrategyRegistry {
    /// Create a registry with all built-in strategies.
    pub fn new() -> Self {
        let mut registry = Self {
            strategies: BTreeMap::new(),
        };
        registry.register(
            "dip_buyer",
            "Dip Buyer",
            "Rests a limit bid at each bar's low, replacing the unfilled one",
            &DipBuyerConfig::default(),
        );
        registry.register(
            "bracket_breakout",
            "Bracket Breakout",
            "Opens a take-profit/stop-loss bracket when a close breaks the prior high",
            &BracketBreakoutConfig::default(),
        );
        registry
    }

    fn register(&mut self, key: &str, name: &str, description: &str, defaults: &impl Serialize) {
        self.strategies.insert(
            key.to_string(),
            StrategyInfo {
                key: key.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                default_config: serde_json::to_value(defaults).unwrap_or(serde_json::Value::Null),
            },
        );
    }

    /// List all available strategies, by key.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        self.strategies.values().collect()
    }

    /// Get strategy info by key.
    pub fn get(&self, key: &str) -> Option<&StrategyInfo> {
        self.strategies.get(key)
    }

    /// Check if a strategy exists.
    pub fn exists(&self, key: &str) -> bool {
        self.strategies.contains_key(key)
    }

    /// Get all strategy keys.
    pub fn names(&self) -> Vec<&String> {
        self.strategies.keys().collect()
    }

    /// Create a strategy instance from configuration.
    ///
    /// Fields missing from `config` take their default values; `symbols`
    /// replaces any symbols given in `config`.
    pub fn create(
        &self,
        key: &str,
        config: serde_json::Value,
        symbols: Vec<String>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        let info = self
            .get(key)
            .ok_or_else(|| StrategyError::NotFound(key.to_string()))?;
        let config = merge(info.default_config.clone(), config);

        match key {
            "dip_buyer" => {
                let mut config: DipBuyerConfig = parse(config)?;
                config.symbols = symbols;
                config.validate()?;
                Ok(Box::new(DipBuyerStrategy::new(config)))
            }
            "bracket_breakout" => {
                let mut config: BracketBreakoutConfig = parse(config)?;
                config.symbols = symbols;
                config.validate()?;
                Ok(Box::new(BracketBreakoutStrategy::new(config)))
            }
            _ => Err(StrategyError::NotFound(key.to_string())),
        }
    }

    /// Create a strategy with default configuration.
    pub fn create_default(
        &self,
        key: &str,
        symbols: Vec<String>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        self.create(key, serde_json::Value::Null, symbols)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse<T: DeserializeOwned>(config: serde_json::Value) -> Result<T, StrategyError> {
    serde_json::from_value(config).map_err(|e| StrategyError::InvalidConfig(e.to_string()))
}

/// Overlay `overrides` onto `defaults`, key by key.
fn merge(defaults: serde_json::Value, overrides: serde_json::Value) -> serde_json::Value {
    match (defaults, overrides) {
        (serde_json::Value::Object(mut base), serde_json::Value::Object(overrides)) => {
            base.extend(overrides);
            serde_json::Value::Object(base)
        }
        (defaults, serde_json::Value::Null) => defaults,
        (_, overrides) => overrides,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_list() {
        let registry = StrategyRegistry::new();
        let keys: Vec<_> = registry.list().iter().map(|info| info.key.as_str()).collect();
        assert_eq!(keys, vec!["bracket_breakout", "dip_buyer"]);
    }

    #[test]
    fn test_registry_get() {
        let registry = StrategyRegistry::new();
        assert!(registry.get("dip_buyer").is_some());
        assert!(registry.exists("bracket_breakout"));
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_create_default() {
        let registry = StrategyRegistry::new();
        let strategy = registry
            .create_default("dip_buyer", vec!["XBTUSD".to_string()])
            .unwrap();

        assert_eq!(strategy.name(), "Dip Buyer");
        assert_eq!(strategy.symbols(), &["XBTUSD".to_string()]);
    }

    #[test]
    fn test_create_with_partial_config() {
        let registry = StrategyRegistry::new();
        let config = serde_json::json!({ "take_profit_pct": "5" });

        let strategy = registry.create("bracket_breakout", config, vec!["XBTUSD".to_string()]);
        assert!(strategy.is_ok());
    }

    #[test]
    fn test_create_rejects_invalid_config() {
        let registry = StrategyRegistry::new();
        let config = serde_json::json!({ "amount": "0" });

        let result = registry.create("dip_buyer", config, vec!["XBTUSD".to_string()]);
        assert!(matches!(result, Err(StrategyError::InvalidConfig(_))));

        let result = registry.create_default("dip_buyer", Vec::new());
        assert!(matches!(result, Err(StrategyError::InvalidConfig(_))));
    }

    #[test]
    fn test_create_unknown_strategy() {
        let registry = StrategyRegistry::new();
        let result = registry.create_default("unknown", vec!["XBTUSD".to_string()]);
        assert!(matches!(result, Err(StrategyError::NotFound(_))));
    }
}
