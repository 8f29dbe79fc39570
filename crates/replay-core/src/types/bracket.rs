//! Bracket (one-triggers-one-cancels-other) order types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{BracketId, OrderId, Side};

/// Leg of a bracket order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketLeg {
    Entry,
    TakeProfit,
    StopLoss,
}

impl fmt::Display for BracketLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BracketLeg::Entry => write!(f, "entry"),
            BracketLeg::TakeProfit => write!(f, "take_profit"),
            BracketLeg::StopLoss => write!(f, "stop_loss"),
        }
    }
}

/// Where a bracket is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketStatus {
    /// Entry order is working
    AwaitingEntry,
    /// Entry filled, exit legs are working
    Protected,
    /// Take-profit leg filled
    TakenProfit,
    /// Stop-loss leg filled
    StoppedOut,
    /// Entry or exit ended without a fill; nothing further will happen
    Inactive,
}

impl BracketStatus {
    /// Check if the bracket can still react to fills.
    pub fn is_active(&self) -> bool {
        matches!(self, BracketStatus::AwaitingEntry | BracketStatus::Protected)
    }
}

/// Request to open a bracket order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketRequest {
    /// Symbol to trade
    pub symbol: String,
    /// Side of the entry
    pub side: Side,
    /// Amount of every leg
    pub amount: Decimal,
    /// Limit price of the entry
    pub entry_price: Decimal,
    /// Limit price of the take-profit exit
    pub take_profit_price: Decimal,
    /// Stop price of the stop-loss exit
    pub stop_loss_price: Decimal,
}

impl BracketRequest {
    /// Create a bracket request.
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        amount: Decimal,
        entry_price: Decimal,
        take_profit_price: Decimal,
        stop_loss_price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            amount,
            entry_price,
            take_profit_price,
            stop_loss_price,
        }
    }

    /// Check the leg prices bracket the entry on the correct sides.
    pub fn validate(&self) -> Result<(), String> {
        if self.amount <= Decimal::ZERO {
            return Err("amount must be positive".to_string());
        }
        let prices = [self.entry_price, self.take_profit_price, self.stop_loss_price];
        if prices.iter().any(|p| *p <= Decimal::ZERO) {
            return Err("prices must be positive".to_string());
        }
        let ordered = match self.side {
            Side::Buy => {
                self.stop_loss_price < self.entry_price && self.entry_price < self.take_profit_price
            }
            Side::Sell => {
                self.take_profit_price < self.entry_price && self.entry_price < self.stop_loss_price
            }
        };
        if !ordered {
            return Err(format!(
                "{} bracket needs stop loss {} and take profit {} on opposite sides of entry {}",
                self.side, self.stop_loss_price, self.take_profit_price, self.entry_price
            ));
        }
        Ok(())
    }
}

/// Requested changes to a bracket's prices or amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketAmendment {
    pub entry_price: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub take_profit_price: Option<Decimal>,
    pub stop_loss_price: Option<Decimal>,
}

/// Tracked bracket order.
///
/// Only the entry leg exists at creation; the exit legs are submitted once
/// the entry closes, and at most one of them is ever filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketOrder {
    pub id: BracketId,
    pub symbol: String,
    pub side: Side,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub take_profit_price: Decimal,
    pub stop_loss_price: Decimal,
    pub entry_order_id: OrderId,
    pub take_profit_order_id: Option<OrderId>,
    pub stop_loss_order_id: Option<OrderId>,
    pub status: BracketStatus,
}

impl BracketOrder {
    /// Create a bracket tracking an already submitted entry order.
    pub fn new(id: BracketId, request: &BracketRequest, entry_order_id: OrderId) -> Self {
        Self {
            id,
            symbol: request.symbol.clone(),
            side: request.side,
            amount: request.amount,
            entry_price: request.entry_price,
            take_profit_price: request.take_profit_price,
            stop_loss_price: request.stop_loss_price,
            entry_order_id,
            take_profit_order_id: None,
            stop_loss_order_id: None,
            status: BracketStatus::AwaitingEntry,
        }
    }

    /// Request with this bracket's current amount and prices.
    pub fn as_request(&self) -> BracketRequest {
        BracketRequest::new(
            self.symbol.clone(),
            self.side,
            self.amount,
            self.entry_price,
            self.take_profit_price,
            self.stop_loss_price,
        )
    }

    /// Order id of a leg, if that leg has been submitted.
    pub fn leg_order_id(&self, leg: BracketLeg) -> Option<OrderId> {
        match leg {
            BracketLeg::Entry => Some(self.entry_order_id),
            BracketLeg::TakeProfit => self.take_profit_order_id,
            BracketLeg::StopLoss => self.stop_loss_order_id,
        }
    }

    /// Which leg an order id belongs to.
    pub fn leg_of(&self, order_id: OrderId) -> Option<BracketLeg> {
        [BracketLeg::Entry, BracketLeg::TakeProfit, BracketLeg::StopLoss]
            .into_iter()
            .find(|leg| self.leg_order_id(*leg) == Some(order_id))
    }
}
