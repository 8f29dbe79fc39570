//! Bracket (OTOCO) order management.

use std::collections::BTreeMap;

use replay_core::error::ExchangeError;
use replay_core::types::{
    BracketAmendment, BracketId, BracketLeg, BracketOrder, BracketStatus, Order, OrderAmendment,
    OrderId, OrderRequest, OrderStatus,
};
use rust_decimal::Decimal;
use tracing::debug;

use crate::ledger::OrderLedger;

/// Follow-up work a leg transition requires from the matching engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BracketAction {
    /// Submit an exit leg and attach it to the bracket
    Submit {
        bracket_id: BracketId,
        leg: BracketLeg,
        request: OrderRequest,
    },
    /// Cancel a leg if it is still open
    Cancel(OrderId),
}

/// A validated bracket amendment: the bracket as it will read afterwards
/// and the leg changes that get it there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketPlan {
    pub bracket: BracketOrder,
    pub pushes: Vec<(OrderId, OrderAmendment)>,
}

/// Tracks bracket groups and decides how they react to leg updates.
///
/// Exit leg ids are never cleared once set, so a repeated entry close
/// cannot spawn a second pair of legs.
#[derive(Debug, Clone, Default)]
pub struct BracketOrderManager {
    brackets: BTreeMap<BracketId, BracketOrder>,
}

impl BracketOrderManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a bracket whose entry order id is already allocated.
    pub fn insert(&mut self, bracket: BracketOrder) {
        self.brackets.insert(bracket.id, bracket);
    }

    /// Get a bracket.
    pub fn get(&self, id: BracketId) -> Option<&BracketOrder> {
        self.brackets.get(&id)
    }

    /// All brackets, by id.
    pub fn brackets(&self) -> impl Iterator<Item = &BracketOrder> {
        self.brackets.values()
    }

    /// Number of tracked brackets.
    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    /// Check if no bracket is tracked.
    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }

    /// Record the order id of a freshly submitted exit leg.
    pub fn attach_leg(&mut self, id: BracketId, leg: BracketLeg, order_id: OrderId) {
        if let Some(bracket) = self.brackets.get_mut(&id) {
            match leg {
                BracketLeg::Entry => bracket.entry_order_id = order_id,
                BracketLeg::TakeProfit => bracket.take_profit_order_id = Some(order_id),
                BracketLeg::StopLoss => bracket.stop_loss_order_id = Some(order_id),
            }
        }
    }

    /// React to a new value of any order.
    ///
    /// On entry close the stop loss is requested before the take profit;
    /// on either exit closing the other one is canceled.
    pub fn on_order_update(&mut self, order: &Order, ledger: &OrderLedger) -> Vec<BracketAction> {
        let Some(bracket_id) = order.bracket_id else {
            return Vec::new();
        };
        let Some(bracket) = self.brackets.get_mut(&bracket_id) else {
            return Vec::new();
        };
        let Some(leg) = bracket.leg_of(order.id) else {
            return Vec::new();
        };
        if !bracket.status.is_active() {
            return Vec::new();
        }

        let mut actions = Vec::new();
        match (leg, order.status) {
            (BracketLeg::Entry, OrderStatus::Open) => {
                bracket.entry_price = order.price;
                bracket.amount = order.amount;
            }
            (BracketLeg::Entry, OrderStatus::Close) => {
                bracket.status = BracketStatus::Protected;
                let exit_side = bracket.side.opposite();
                if bracket.stop_loss_order_id.is_none() {
                    actions.push(BracketAction::Submit {
                        bracket_id,
                        leg: BracketLeg::StopLoss,
                        request: OrderRequest::stop(
                            bracket.symbol.clone(),
                            exit_side,
                            order.filled,
                            bracket.stop_loss_price,
                        ),
                    });
                }
                if bracket.take_profit_order_id.is_none() {
                    actions.push(BracketAction::Submit {
                        bracket_id,
                        leg: BracketLeg::TakeProfit,
                        request: OrderRequest::limit(
                            bracket.symbol.clone(),
                            exit_side,
                            order.filled,
                            bracket.take_profit_price,
                        ),
                    });
                }
            }
            (BracketLeg::Entry, OrderStatus::Canceled | OrderStatus::Expired | OrderStatus::Rejected) => {
                bracket.status = BracketStatus::Inactive;
            }
            (BracketLeg::TakeProfit, OrderStatus::Open) => {
                bracket.take_profit_price = order.price;
            }
            (BracketLeg::StopLoss, OrderStatus::Open) => {
                bracket.stop_loss_price = order.price;
            }
            (BracketLeg::TakeProfit, OrderStatus::Close) => {
                bracket.status = BracketStatus::TakenProfit;
                actions.extend(bracket.stop_loss_order_id.map(BracketAction::Cancel));
            }
            (BracketLeg::StopLoss, OrderStatus::Close) => {
                bracket.status = BracketStatus::StoppedOut;
                actions.extend(bracket.take_profit_order_id.map(BracketAction::Cancel));
            }
            (BracketLeg::TakeProfit | BracketLeg::StopLoss, status) if status.is_terminal() => {
                let exits = [bracket.take_profit_order_id, bracket.stop_loss_order_id];
                let any_open = exits
                    .into_iter()
                    .flatten()
                    .any(|id| ledger.is_open(&bracket.symbol, id));
                if !any_open {
                    bracket.status = BracketStatus::Inactive;
                }
            }
            _ => {}
        }

        if !actions.is_empty() {
            debug!(bracket = %bracket_id, leg = %leg, status = %order.status, actions = actions.len(), "Bracket reaction");
        }
        actions
    }

    /// Work out an amendment without applying it.
    ///
    /// While the entry is open its price and amount are amended; otherwise
    /// changed exit prices go to whichever exit legs are open. Prices of
    /// legs not yet submitted are kept for when they are. The amended
    /// bracket must still order its prices like a new one.
    pub fn plan_modify(
        &self,
        id: BracketId,
        amendment: &BracketAmendment,
        ledger: &OrderLedger,
    ) -> Result<BracketPlan, ExchangeError> {
        let current = self.get(id).ok_or(ExchangeError::BracketNotFound(id))?;
        let mut bracket = current.clone();
        let changed = |new: Option<Decimal>, current: Decimal| new.filter(|v| *v != current);

        let entry_open = ledger.is_open(&bracket.symbol, bracket.entry_order_id);
        let mut pushes = Vec::new();
        if entry_open {
            let entry = OrderAmendment {
                price: changed(amendment.entry_price, current.entry_price),
                amount: changed(amendment.amount, current.amount),
            };
            bracket.entry_price = entry.price.unwrap_or(current.entry_price);
            bracket.amount = entry.amount.unwrap_or(current.amount);
            if !entry.is_empty() {
                pushes.push((bracket.entry_order_id, entry));
            }
        }

        let take_profit = changed(amendment.take_profit_price, current.take_profit_price);
        let stop_loss = changed(amendment.stop_loss_price, current.stop_loss_price);
        bracket.take_profit_price = take_profit.unwrap_or(current.take_profit_price);
        bracket.stop_loss_price = stop_loss.unwrap_or(current.stop_loss_price);
        bracket
            .as_request()
            .validate()
            .map_err(ExchangeError::InvalidBracket)?;

        if !entry_open {
            for (leg_id, price) in [
                (bracket.take_profit_order_id, take_profit),
                (bracket.stop_loss_order_id, stop_loss),
            ] {
                if let (Some(leg_id), Some(price)) = (leg_id, price) {
                    if ledger.is_open(&bracket.symbol, leg_id) {
                        pushes.push((leg_id, OrderAmendment::price(price)));
                    }
                }
            }
        }
        Ok(BracketPlan { bracket, pushes })
    }

    /// Store the amount and prices of a planned amendment once its leg
    /// changes went through.
    pub fn commit(&mut self, plan: &BracketPlan) {
        if let Some(bracket) = self.brackets.get_mut(&plan.bracket.id) {
            bracket.amount = plan.bracket.amount;
            bracket.entry_price = plan.bracket.entry_price;
            bracket.take_profit_price = plan.bracket.take_profit_price;
            bracket.stop_loss_price = plan.bracket.stop_loss_price;
        }
    }

    /// Order id to cancel for a leg, if that leg is open.
    pub fn leg_to_cancel(
        &self,
        id: BracketId,
        leg: BracketLeg,
        ledger: &OrderLedger,
    ) -> Result<Option<OrderId>, ExchangeError> {
        let bracket = self.get(id).ok_or(ExchangeError::BracketNotFound(id))?;
        Ok(bracket
            .leg_order_id(leg)
            .filter(|order_id| ledger.is_open(&bracket.symbol, *order_id)))
    }
}
