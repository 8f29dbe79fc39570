//! Order gateway trait definition.

use crate::error::ExchangeError;
use crate::types::{
    BracketAmendment, BracketId, BracketLeg, BracketOrder, BracketRequest, Fill, Order,
    OrderAmendment, OrderId, OrderRequest,
};
use async_trait::async_trait;

/// Order control surface of the simulated exchange.
///
/// Commands return once the exchange has accepted them. Their effects
/// (fills, bracket reactions) are observed through the order event stream.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit a new order.
    ///
    /// # Arguments
    /// * `request` - The order request to submit
    ///
    /// # Returns
    /// The created order, `open` if accepted or `rejected` if invalid
    async fn submit(&self, request: OrderRequest) -> Result<Order, ExchangeError>;

    /// Replace the price and/or amount of a working order.
    ///
    /// # Arguments
    /// * `order_id` - The order to change
    /// * `amendment` - The fields to replace
    ///
    /// # Returns
    /// The current order value; unchanged if the order is terminal
    async fn modify(&self, order_id: OrderId, amendment: OrderAmendment) -> Result<Order, ExchangeError>;

    /// Cancel an order. No-op on terminal orders.
    ///
    /// # Arguments
    /// * `order_id` - The ID of the order to cancel
    async fn cancel(&self, order_id: OrderId) -> Result<Order, ExchangeError>;

    /// Get an order by id.
    async fn order(&self, order_id: OrderId) -> Result<Option<Order>, ExchangeError>;

    /// Get open orders, optionally for a single symbol.
    async fn open_orders(&self, symbol: Option<String>) -> Result<Vec<Order>, ExchangeError>;

    /// Get the fills of an order.
    async fn fills(&self, order_id: OrderId) -> Result<Vec<Fill>, ExchangeError>;

    /// Open a bracket order. Only the entry leg is submitted now.
    ///
    /// # Arguments
    /// * `request` - Entry, take-profit and stop-loss prices
    async fn create_bracket(&self, request: BracketRequest) -> Result<BracketOrder, ExchangeError>;

    /// Push changed bracket prices or amount to whichever legs are live.
    async fn modify_bracket(
        &self,
        bracket_id: BracketId,
        amendment: BracketAmendment,
    ) -> Result<BracketOrder, ExchangeError>;

    /// Cancel one leg of a bracket if it is open.
    async fn cancel_bracket_leg(
        &self,
        bracket_id: BracketId,
        leg: BracketLeg,
    ) -> Result<BracketOrder, ExchangeError>;

    /// Get a bracket by id.
    async fn bracket(&self, bracket_id: BracketId) -> Result<Option<BracketOrder>, ExchangeError>;

    /// Get the gateway name.
    fn name(&self) -> &str;
}
