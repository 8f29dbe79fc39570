//! Strategy trait definitions.

use crate::error::StrategyError;
use crate::traits::OrderGateway;
use crate::types::{Bar, Fill, Order};
use async_trait::async_trait;

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    /// Validate the configuration.
    fn validate(&self) -> Result<(), StrategyError>;
}

/// Core strategy trait.
///
/// Strategies receive each replayed bar after the exchange has matched it,
/// so orders they submit are stamped with that bar's time and can first
/// fill on the following bar.
#[async_trait]
pub trait Strategy: Send {
    /// Get the unique name of this strategy.
    fn name(&self) -> &str;

    /// Symbols this strategy trades. Empty means every symbol.
    fn symbols(&self) -> &[String];

    /// Process a new bar.
    ///
    /// # Arguments
    /// * `bar` - The bar just replayed
    /// * `gateway` - Order control surface of the exchange
    async fn on_bar(&mut self, bar: &Bar, gateway: &dyn OrderGateway) -> Result<(), StrategyError>;

    /// Called on every order update, before the next bar.
    fn on_order(&mut self, _order: &Order) {}

    /// Called when an order is filled, before the next bar.
    fn on_fill(&mut self, _fill: &Fill) {}

    /// Check if the strategy trades `symbol`.
    fn trades(&self, symbol: &str) -> bool {
        let symbols = self.symbols();
        symbols.is_empty() || symbols.iter().any(|s| s == symbol)
    }

    /// Get a description of the strategy.
    fn description(&self) -> &str {
        ""
    }
}
