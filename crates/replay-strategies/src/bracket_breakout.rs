//! Bracket breakout.
//!
//! When a bar closes above the previous bar's high, enters long at the close
//! with a take-profit and a stop-loss a fixed percentage away. At most one
//! bracket per symbol is live at a time.

use std::collections::HashMap;

use async_trait::async_trait;
use replay_core::error::StrategyError;
use replay_core::traits::{OrderGateway, Strategy, StrategyConfig};
use replay_core::types::{Bar, BracketId, BracketRequest, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration for the bracket breakout strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketBreakoutConfig {
    /// Symbols to trade
    pub symbols: Vec<String>,
    /// Amount of each entry
    pub amount: Decimal,
    /// Take-profit distance above the entry, in percent
    pub take_profit_pct: Decimal,
    /// Stop-loss distance below the entry, in percent
    pub stop_loss_pct: Decimal,
}

impl Default for BracketBreakoutConfig {
    fn default() -> Self {
        Self {
            symbols: vec![],
            amount: dec!(1),
            take_profit_pct: dec!(2),
            stop_loss_pct: dec!(1),
        }
    }
}

impl StrategyConfig for BracketBreakoutConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.amount <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Entry amount must be positive".into(),
            ));
        }
        if self.take_profit_pct <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Take-profit distance must be positive".into(),
            ));
        }
        if self.stop_loss_pct <= Decimal::ZERO || self.stop_loss_pct >= dec!(100) {
            return Err(StrategyError::InvalidConfig(
                "Stop-loss distance must be in (0, 100)".into(),
            ));
        }
        if self.symbols.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "At least one symbol required".into(),
            ));
        }
        Ok(())
    }
}

/// Bracket breakout strategy.
pub struct BracketBreakoutStrategy {
    config: BracketBreakoutConfig,
    previous_high: HashMap<String, Decimal>,
    live: HashMap<String, BracketId>,
    brackets_opened: usize,
}

impl BracketBreakoutStrategy {
    /// Create a new bracket breakout strategy.
    pub fn new(config: BracketBreakoutConfig) -> Self {
        Self {
            config,
            previous_high: HashMap::new(),
            live: HashMap::new(),
            brackets_opened: 0,
        }
    }

    /// Brackets opened so far.
    pub fn brackets_opened(&self) -> usize {
        self.brackets_opened
    }

    fn request(&self, bar: &Bar) -> BracketRequest {
        let entry = bar.close;
        BracketRequest::new(
            bar.symbol.as_str(),
            Side::Buy,
            self.config.amount,
            entry,
            entry * (Decimal::ONE + self.config.take_profit_pct / dec!(100)),
            entry * (Decimal::ONE - self.config.stop_loss_pct / dec!(100)),
        )
    }

    async fn has_live_bracket(
        &mut self,
        symbol: &str,
        gateway: &dyn OrderGateway,
    ) -> Result<bool, StrategyError> {
        let Some(&id) = self.live.get(symbol) else {
            return Ok(false);
        };
        let active = gateway
            .bracket(id)
            .await?
            .is_some_and(|bracket| bracket.status.is_active());
        if !active {
            debug!(bracket = %id, symbol, "Bracket finished");
            self.live.remove(symbol);
        }
        Ok(active)
    }
}

#[async_trait]
impl Strategy for BracketBreakoutStrategy {
    fn name(&self) -> &str {
        "Bracket Breakout"
    }

    fn symbols(&self) -> &[String] {
        &self.config.symbols
    }

    fn description(&self) -> &str {
        "Opens a take-profit/stop-loss bracket when a close breaks the prior high"
    }

    async fn on_bar(&mut self, bar: &Bar, gateway: &dyn OrderGateway) -> Result<(), StrategyError> {
        let previous = self.previous_high.insert(bar.symbol.clone(), bar.high);
        let Some(previous_high) = previous else {
            return Ok(());
        };
        if bar.close <= previous_high || self.has_live_bracket(&bar.symbol, gateway).await? {
            return Ok(());
        }

        let bracket = gateway.create_bracket(self.request(bar)).await?;
        info!(
            bracket = %bracket.id,
            symbol = %bar.symbol,
            entry = %bracket.entry_price,
            take_profit = %bracket.take_profit_price,
            stop_loss = %bracket.stop_loss_price,
            "Breakout bracket opened"
        );
        self.live.insert(bar.symbol.clone(), bracket.id);
        self.brackets_opened += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::types::{BracketLeg, BracketStatus};
    use replay_exchange::SimulatedExchange;

    fn strategy() -> BracketBreakoutStrategy {
        BracketBreakoutStrategy::new(BracketBreakoutConfig {
            symbols: vec!["XBTUSD".to_string()],
            ..Default::default()
        })
    }

    fn bar(ts: i64, high: Decimal, close: Decimal) -> Bar {
        Bar::new("XBTUSD", ts, dec!(100), high, dec!(99), close, dec!(5))
    }

    #[test]
    fn test_bracket_prices() {
        let request = strategy().request(&bar(0, dec!(101), dec!(100)));
        assert_eq!(request.entry_price, dec!(100));
        assert_eq!(request.take_profit_price, dec!(102));
        assert_eq!(request.stop_loss_price, dec!(99));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = BracketBreakoutConfig {
            symbols: vec!["XBTUSD".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        config.stop_loss_pct = dec!(100);
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_one_live_bracket_per_symbol() {
        let (client, _handle) = SimulatedExchange::new().spawn();
        let mut strategy = strategy();

        let bars = [
            bar(1_000, dec!(101), dec!(100.5)),
            bar(2_000, dec!(102), dec!(101.5)),
            bar(3_000, dec!(103), dec!(102.5)),
        ];
        for bar in &bars {
            client.match_bar(bar.clone()).await.unwrap();
            strategy.on_bar(bar, &client).await.unwrap();
        }

        // Both later bars broke out, but the first bracket is still live.
        assert_eq!(strategy.brackets_opened(), 1);
        let bracket = client.bracket(BracketId(1)).await.unwrap().unwrap();
        assert_eq!(bracket.entry_price, dec!(101.5));
        assert!(bracket.status.is_active());
    }

    #[tokio::test]
    async fn test_new_bracket_after_previous_finishes() {
        let (client, _handle) = SimulatedExchange::new().spawn();
        let mut strategy = strategy();

        for bar in [bar(1_000, dec!(101), dec!(100.5)), bar(2_000, dec!(102), dec!(101.5))] {
            client.match_bar(bar.clone()).await.unwrap();
            strategy.on_bar(&bar, &client).await.unwrap();
        }
        client.cancel_bracket_leg(BracketId(1), BracketLeg::Entry).await.unwrap();
        assert_eq!(
            client.bracket(BracketId(1)).await.unwrap().unwrap().status,
            BracketStatus::Inactive
        );

        let breakout = bar(3_000, dec!(103), dec!(102.5));
        client.match_bar(breakout.clone()).await.unwrap();
        strategy.on_bar(&breakout, &client).await.unwrap();
        assert_eq!(strategy.brackets_opened(), 2);
    }
}
