//! Dip buyer.
//!
//! Rests one limit bid per symbol at the low of the latest bar, replacing
//! the previous bid if it has not filled.

use std::collections::HashMap;

use async_trait::async_trait;
use replay_core::error::StrategyError;
use replay_core::traits::{OrderGateway, Strategy, StrategyConfig};
use replay_core::types::{Bar, Fill, Order, OrderId, OrderRequest, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the dip buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DipBuyerConfig {
    /// Symbols to trade
    pub symbols: Vec<String>,
    /// Amount of each bid
    pub amount: Decimal,
    /// Distance below the bar low, in percent
    pub offset_pct: Decimal,
}

impl Default for DipBuyerConfig {
    fn default() -> Self {
        Self {
            symbols: vec![],
            amount: dec!(1),
            offset_pct: Decimal::ZERO,
        }
    }
}

impl StrategyConfig for DipBuyerConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.amount <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Bid amount must be positive".into(),
            ));
        }
        if self.offset_pct < Decimal::ZERO || self.offset_pct >= dec!(100) {
            return Err(StrategyError::InvalidConfig(
                "Offset must be in [0, 100)".into(),
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

/// Dip buyer strategy.
pub struct DipBuyerStrategy {
    config: DipBuyerConfig,
    bids: HashMap<String, OrderId>,
    bids_placed: usize,
    fills: usize,
}

impl DipBuyerStrategy {
    /// Create a new dip buyer.
    pub fn new(config: DipBuyerConfig) -> Self {
        Self {
            config,
            bids: HashMap::new(),
            bids_placed: 0,
            fills: 0,
        }
    }

    /// Bids placed so far.
    pub fn bids_placed(&self) -> usize {
        self.bids_placed
    }

    /// Bids filled so far.
    pub fn fills(&self) -> usize {
        self.fills
    }

    fn bid_price(&self, bar: &Bar) -> Decimal {
        bar.low * (Decimal::ONE - self.config.offset_pct / dec!(100))
    }
}

#[async_trait]
impl Strategy for DipBuyerStrategy {
    fn name(&self) -> &str {
        "Dip Buyer"
    }

    fn symbols(&self) -> &[String] {
        &self.config.symbols
    }

    fn description(&self) -> &str {
        "Rests a limit bid at each bar's low, replacing the unfilled one"
    }

    async fn on_bar(&mut self, bar: &Bar, gateway: &dyn OrderGateway) -> Result<(), StrategyError> {
        if let Some(previous) = self.bids.remove(&bar.symbol) {
            let canceled = gateway.cancel(previous).await?;
            debug!(order = %previous, status = %canceled.status, "Replaced bid");
        }

        let price = self.bid_price(bar);
        let request = OrderRequest::limit(bar.symbol.as_str(), Side::Buy, self.config.amount, price);
        let order = gateway.submit(request).await?;
        if order.is_open() {
            self.bids.insert(bar.symbol.clone(), order.id);
        }
        self.bids_placed += 1;
        Ok(())
    }

    fn on_order(&mut self, order: &Order) {
        if order.status.is_terminal() && self.bids.get(&order.symbol) == Some(&order.id) {
            self.bids.remove(&order.symbol);
        }
    }

    fn on_fill(&mut self, _fill: &Fill) {
        self.fills += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::types::OrderStatus;
    use replay_exchange::SimulatedExchange;

    fn strategy() -> DipBuyerStrategy {
        DipBuyerStrategy::new(DipBuyerConfig {
            symbols: vec!["XBTUSD".to_string()],
            ..Default::default()
        })
    }

    fn bar(ts: i64, low: Decimal) -> Bar {
        Bar::new("XBTUSD", ts, dec!(10), dec!(12), low, dec!(11), dec!(5))
    }

    #[test]
    fn test_config_validation() {
        assert!(DipBuyerConfig::default().validate().is_err());

        let config = DipBuyerConfig {
            symbols: vec!["XBTUSD".to_string()],
            amount: Decimal::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DipBuyerConfig {
            symbols: vec!["XBTUSD".to_string()],
            offset_pct: dec!(1),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(DipBuyerStrategy::new(config).bid_price(&bar(0, dec!(9))), dec!(8.91));
    }

    #[tokio::test]
    async fn test_replaces_unfilled_bid() {
        let (client, _handle) = SimulatedExchange::new().spawn();
        let mut strategy = strategy();

        let first = bar(1_000, dec!(9));
        client.match_bar(first.clone()).await.unwrap();
        strategy.on_bar(&first, &client).await.unwrap();

        // Low stays above the resting bid, so it does not fill.
        let second = bar(2_000, dec!(9.5));
        assert!(client.match_bar(second.clone()).await.unwrap().is_empty());
        strategy.on_bar(&second, &client).await.unwrap();

        let open = client.open_orders(None).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].price, dec!(9.5));
        let replaced = client.order(OrderId(1)).await.unwrap().unwrap();
        assert_eq!(replaced.status, OrderStatus::Canceled);
        assert_eq!(strategy.bids_placed(), 2);
    }

    #[tokio::test]
    async fn test_filled_bid_is_forgotten() {
        let (client, _handle) = SimulatedExchange::new().spawn();
        let mut strategy = strategy();

        let first = bar(1_000, dec!(9));
        client.match_bar(first.clone()).await.unwrap();
        strategy.on_bar(&first, &client).await.unwrap();

        let fills = client.match_bar(bar(2_000, dec!(8))).await.unwrap();
        assert_eq!(fills.len(), 1);
        let filled = client.order(fills[0].order_id).await.unwrap().unwrap();
        strategy.on_order(&filled);
        strategy.on_fill(&fills[0]);

        assert!(strategy.bids.is_empty());
        assert_eq!(strategy.fills(), 1);
    }
}
