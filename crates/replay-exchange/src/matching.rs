//! Deterministic bar-by-bar order matching.

use std::collections::HashMap;

use replay_core::error::ExchangeError;
use replay_core::traits::{EventHandler, Publisher};
use replay_core::types::{
    Bar, BracketAmendment, BracketId, BracketLeg, BracketOrder, BracketRequest, Fill, FillId,
    Order, OrderAmendment, OrderEvent, OrderId, OrderRequest, OrderStatus, OrderType, Role, Side,
};
use rust_decimal::Decimal;
use tracing::{debug, trace, warn};

use crate::bracket::{BracketAction, BracketOrderManager};
use crate::ledger::OrderLedger;

/// Price and liquidity role of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillDecision {
    pub price: Decimal,
    pub role: Role,
}

/// Decide whether an order fills against a bar, ignoring eligibility.
///
/// - Market: always; buy at `max(low, price)`, sell at `min(high, price)`; taker
/// - Limit: when the bar trades through `price`; same price rule; maker
/// - Stop: when the bar reaches `price`; `price` clamped into the bar; taker
pub fn fill_decision(order: &Order, bar: &Bar) -> Option<FillDecision> {
    let bounded = match order.side {
        Side::Buy => bar.low.max(order.price),
        Side::Sell => bar.high.min(order.price),
    };

    match (order.order_type, order.side) {
        (OrderType::Market, _) => Some(FillDecision {
            price: bounded,
            role: Role::Taker,
        }),
        (OrderType::Limit, Side::Buy) if bar.low <= order.price => Some(FillDecision {
            price: bounded,
            role: Role::Maker,
        }),
        (OrderType::Limit, Side::Sell) if bar.high >= order.price => Some(FillDecision {
            price: bounded,
            role: Role::Maker,
        }),
        (OrderType::Stop, Side::Buy) if bar.high >= order.price => Some(FillDecision {
            price: order.price.clamp(bar.low, bar.high),
            role: Role::Taker,
        }),
        (OrderType::Stop, Side::Sell) if bar.low <= order.price => Some(FillDecision {
            price: order.price.clamp(bar.low, bar.high),
            role: Role::Taker,
        }),
        _ => None,
    }
}

/// Single-writer matching core.
///
/// Owns the ledger, the bracket manager and the order event publisher.
/// Every order value goes through [`MatchingEngine::publish_order`], which
/// stores it, notifies handlers, then runs bracket reactions, so the
/// consequences of one fill are in place before the next order is matched.
#[derive(Debug, Default)]
pub struct MatchingEngine {
    ledger: OrderLedger,
    brackets: BracketOrderManager,
    publisher: Publisher<OrderEvent>,
    reference_times: HashMap<String, i64>,
    next_order_id: u64,
    next_fill_id: u64,
    next_bracket_id: u64,
}

impl MatchingEngine {
    /// Create an engine with no orders and no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an order event handler.
    pub fn subscribe(&mut self, handler: impl EventHandler<OrderEvent> + 'static) {
        self.publisher.subscribe(handler);
    }

    /// The order ledger.
    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    /// The bracket manager.
    pub fn brackets(&self) -> &BracketOrderManager {
        &self.brackets
    }

    /// Timestamp of the last bar observed for a symbol.
    pub fn reference_time(&self, symbol: &str) -> Option<i64> {
        self.reference_times.get(symbol).copied()
    }

    /// Match a completed bar.
    ///
    /// The bar becomes the symbol's reference time, so orders placed while
    /// it is processed cannot fill before the next bar. Expired orders are
    /// retired first; open orders submitted strictly before the bar are
    /// then evaluated in id order. Returns the fills produced.
    pub fn on_bar(&mut self, bar: &Bar) -> Vec<Fill> {
        self.reference_times.insert(bar.symbol.clone(), bar.timestamp);

        for id in self.ledger.open_ids_for(&bar.symbol) {
            let Some(order) = self.ledger.get(id) else { continue };
            if order
                .time_in_force
                .expires_at()
                .is_some_and(|at| at <= bar.timestamp)
            {
                let expired = order.transitioned(OrderStatus::Expired, bar.timestamp);
                debug!(order = %id, symbol = %bar.symbol, "Order expired");
                self.publish_order(expired);
            }
        }

        let mut fills = Vec::new();
        for id in self.ledger.open_ids_for(&bar.symbol) {
            // An earlier fill in this bar may have canceled this order.
            let Some(order) = self.ledger.open_order(&bar.symbol, id) else {
                continue;
            };
            if order.submitted_at >= bar.timestamp {
                continue;
            }
            let Some(decision) = fill_decision(order, bar) else {
                continue;
            };

            let closed = order.filled_at(decision.price, bar.timestamp);
            self.next_fill_id += 1;
            let fill = Fill {
                id: FillId(self.next_fill_id),
                order_id: id,
                symbol: closed.symbol.clone(),
                side: closed.side,
                timestamp: bar.timestamp,
                price: decision.price,
                amount: closed.amount,
                cost: closed.cost,
                role: decision.role,
            };
            debug!(
                order = %id,
                symbol = %fill.symbol,
                side = %fill.side,
                price = %fill.price,
                amount = %fill.amount,
                role = ?fill.role,
                "Order filled"
            );

            self.ledger.record_fill(fill.clone());
            self.publisher.publish(&OrderEvent::Filled(fill.clone()));
            self.publish_order(closed);
            fills.push(fill);
        }

        trace!(symbol = %bar.symbol, timestamp = bar.timestamp, fills = fills.len(), "Bar matched");
        fills
    }

    /// Submit a new order stamped with the symbol's reference time.
    ///
    /// Invalid requests are recorded and returned as `rejected`.
    pub fn submit(&mut self, request: OrderRequest) -> Result<Order, ExchangeError> {
        self.require_reference_time(&request.symbol)?;
        let id = self.allocate_order_id();
        Ok(self.place(id, &request, None))
    }

    /// Replace fields of a working order. No-op on terminal orders.
    pub fn modify(&mut self, id: OrderId, amendment: &OrderAmendment) -> Result<Order, ExchangeError> {
        let order = self.ledger.get(id).ok_or(ExchangeError::OrderNotFound(id))?;
        if order.status.is_terminal() {
            return Ok(order.clone());
        }

        let invalid = amendment.price.is_some_and(|p| p <= Decimal::ZERO)
            || amendment.amount.is_some_and(|a| a <= Decimal::ZERO);
        if invalid {
            return Err(ExchangeError::InvalidAmendment {
                order_id: id,
                reason: "price and amount must be positive".to_string(),
            });
        }

        let at = self.now_for(order);
        match order.amended(amendment, at) {
            Some(amended) => {
                debug!(order = %id, price = %amended.price, amount = %amended.amount, "Order modified");
                self.publish_order(amended.clone());
                Ok(self.current(id, amended))
            }
            None => Ok(order.clone()),
        }
    }

    /// Cancel an order. No-op on terminal orders.
    pub fn cancel(&mut self, id: OrderId) -> Result<Order, ExchangeError> {
        let order = self.ledger.get(id).ok_or(ExchangeError::OrderNotFound(id))?;
        if order.status.is_terminal() {
            return Ok(order.clone());
        }
        let canceled = order.transitioned(OrderStatus::Canceled, self.now_for(order));
        debug!(order = %id, symbol = %canceled.symbol, "Order canceled");
        self.publish_order(canceled.clone());
        Ok(self.current(id, canceled))
    }

    /// Open a bracket: only the entry limit order is submitted now.
    pub fn create_bracket(&mut self, request: BracketRequest) -> Result<BracketOrder, ExchangeError> {
        request.validate().map_err(ExchangeError::InvalidBracket)?;
        self.require_reference_time(&request.symbol)?;

        self.next_bracket_id += 1;
        let bracket_id = BracketId(self.next_bracket_id);
        let entry_id = self.allocate_order_id();
        self.brackets
            .insert(BracketOrder::new(bracket_id, &request, entry_id));

        let entry = OrderRequest::limit(
            request.symbol.clone(),
            request.side,
            request.amount,
            request.entry_price,
        );
        self.place(entry_id, &entry, Some(bracket_id));
        debug!(bracket = %bracket_id, entry = %entry_id, symbol = %request.symbol, "Bracket created");

        self.bracket_snapshot(bracket_id)
    }

    /// Push changed bracket fields to its live legs.
    pub fn modify_bracket(
        &mut self,
        id: BracketId,
        amendment: &BracketAmendment,
    ) -> Result<BracketOrder, ExchangeError> {
        let plan = self.brackets.plan_modify(id, amendment, &self.ledger)?;
        for (order_id, leg_amendment) in &plan.pushes {
            self.modify(*order_id, leg_amendment)?;
        }
        self.brackets.commit(&plan);
        debug!(bracket = %id, legs = plan.pushes.len(), "Bracket modified");
        self.bracket_snapshot(id)
    }

    /// Cancel one bracket leg if it is open.
    pub fn cancel_bracket_leg(&mut self, id: BracketId, leg: BracketLeg) -> Result<BracketOrder, ExchangeError> {
        if let Some(order_id) = self.brackets.leg_to_cancel(id, leg, &self.ledger)? {
            self.cancel(order_id)?;
        }
        self.bracket_snapshot(id)
    }

    /// Store an order value; if it changed the ledger, notify handlers and
    /// run bracket reactions.
    pub fn publish_order(&mut self, order: Order) {
        if !self.ledger.apply(order.clone()).is_applied() {
            trace!(order = %order.id, status = %order.status, "Order update absorbed");
            return;
        }
        self.publisher.publish(&OrderEvent::Updated(order.clone()));

        let actions = self.brackets.on_order_update(&order, &self.ledger);
        for action in actions {
            match action {
                BracketAction::Submit {
                    bracket_id,
                    leg,
                    request,
                } => {
                    let id = self.allocate_order_id();
                    self.brackets.attach_leg(bracket_id, leg, id);
                    self.place(id, &request, Some(bracket_id));
                }
                BracketAction::Cancel(id) => {
                    if let Some(order) = self.ledger.get(id) {
                        if !order.status.is_terminal() {
                            let at = self.now_for(order);
                            let canceled = order.transitioned(OrderStatus::Canceled, at);
                            self.publish_order(canceled);
                        }
                    }
                }
            }
        }
    }

    fn place(&mut self, id: OrderId, request: &OrderRequest, bracket: Option<BracketId>) -> Order {
        let submitted_at = self.reference_time(&request.symbol).unwrap_or_default();
        let mut pending = Order::from_request(id, request, submitted_at);
        pending.bracket_id = bracket;
        self.publish_order(pending.clone());

        let next = match request.rejection_reason() {
            Some(reason) => {
                warn!(order = %id, symbol = %request.symbol, reason, "Order rejected");
                pending.transitioned(OrderStatus::Rejected, submitted_at)
            }
            None => pending.transitioned(OrderStatus::Open, submitted_at),
        };
        self.publish_order(next.clone());
        self.current(id, next)
    }

    fn require_reference_time(&self, symbol: &str) -> Result<i64, ExchangeError> {
        self.reference_time(symbol)
            .ok_or_else(|| ExchangeError::UnknownReferenceTime(symbol.to_string()))
    }

    fn allocate_order_id(&mut self) -> OrderId {
        self.next_order_id += 1;
        OrderId(self.next_order_id)
    }

    fn now_for(&self, order: &Order) -> i64 {
        self.reference_time(&order.symbol)
            .unwrap_or(order.updated_at)
    }

    fn current(&self, id: OrderId, fallback: Order) -> Order {
        self.ledger.get(id).cloned().unwrap_or(fallback)
    }

    fn bracket_snapshot(&self, id: BracketId) -> Result<BracketOrder, ExchangeError> {
        self.brackets
            .get(id)
            .cloned()
            .ok_or(ExchangeError::BracketNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::types::{BracketStatus, TimeInForce};
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    fn bar(ts: i64, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Bar {
        Bar::new("XBTUSD", ts, o, h, l, c, dec!(5))
    }

    fn reference_bar() -> Bar {
        bar(1000, dec!(10), dec!(12), dec!(9), dec!(11))
    }

    /// Engine whose reference time for XBTUSD is `ts`.
    fn engine_at(ts: i64) -> MatchingEngine {
        let mut engine = MatchingEngine::new();
        engine.on_bar(&bar(ts, dec!(10), dec!(10), dec!(10), dec!(10)));
        engine
    }

    #[test]
    fn test_limit_buy_fills_as_maker() {
        let mut engine = engine_at(999);
        let order = engine
            .submit(OrderRequest::limit("XBTUSD", Side::Buy, dec!(2), dec!(9.5)))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.submitted_at, 999);

        let fills = engine.on_bar(&reference_bar());
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, dec!(9.5));
        assert_eq!(fills[0].role, Role::Maker);
        assert_eq!(fills[0].timestamp, 1000);

        let closed = engine.ledger().get(order.id).unwrap();
        assert_eq!(closed.status, OrderStatus::Close);
        assert_eq!(closed.filled, dec!(2));
        assert_eq!(closed.remaining, dec!(0));
        assert_eq!(closed.cost, dec!(19));
    }

    #[test]
    fn test_limit_sell_above_high_stays_open() {
        let mut engine = engine_at(999);
        let order = engine
            .submit(OrderRequest::limit("XBTUSD", Side::Sell, dec!(1), dec!(13)))
            .unwrap();
        assert!(engine.on_bar(&reference_bar()).is_empty());
        assert!(engine.ledger().is_open("XBTUSD", order.id));
    }

    #[test]
    fn test_market_orders_fill_at_bounded_price() {
        let mut engine = engine_at(999);
        let buy = engine
            .submit(OrderRequest::market("XBTUSD", Side::Buy, dec!(1), dec!(8)))
            .unwrap();
        let sell = engine
            .submit(OrderRequest::market("XBTUSD", Side::Sell, dec!(1), dec!(11.5)))
            .unwrap();

        let fills = engine.on_bar(&reference_bar());
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].order_id, buy.id);
        assert_eq!(fills[0].price, dec!(9));
        assert_eq!(fills[0].role, Role::Taker);
        assert_eq!(fills[1].order_id, sell.id);
        assert_eq!(fills[1].price, dec!(11.5));
    }

    #[test]
    fn test_stop_triggers_inside_bar() {
        let mut engine = engine_at(999);
        let stop_sell = engine
            .submit(OrderRequest::stop("XBTUSD", Side::Sell, dec!(1), dec!(9.2)))
            .unwrap();
        let stop_buy = engine
            .submit(OrderRequest::stop("XBTUSD", Side::Buy, dec!(1), dec!(12.5)))
            .unwrap();

        let fills = engine.on_bar(&reference_bar());
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].order_id, stop_sell.id);
        assert_eq!(fills[0].price, dec!(9.2));
        assert_eq!(fills[0].role, Role::Taker);
        assert!(engine.ledger().is_open("XBTUSD", stop_buy.id));
    }

    #[test]
    fn test_no_fill_on_submission_bar() {
        let mut engine = engine_at(1000);
        let order = engine
            .submit(OrderRequest::market("XBTUSD", Side::Buy, dec!(1), dec!(100)))
            .unwrap();
        assert!(engine.on_bar(&reference_bar()).is_empty());
        assert!(engine.ledger().is_open("XBTUSD", order.id));

        let fills = engine.on_bar(&bar(2000, dec!(10), dec!(12), dec!(9), dec!(11)));
        assert_eq!(fills.len(), 1);
    }

    #[test]
    fn test_submit_without_reference_time() {
        let mut engine = MatchingEngine::new();
        let err = engine
            .submit(OrderRequest::limit("XBTUSD", Side::Buy, dec!(1), dec!(1)))
            .unwrap_err();
        assert_eq!(err, ExchangeError::UnknownReferenceTime("XBTUSD".to_string()));
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_invalid_submission_is_rejected() {
        let mut engine = engine_at(999);
        let order = engine
            .submit(OrderRequest::limit("XBTUSD", Side::Buy, dec!(0), dec!(9)))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Rejected);
        assert!(engine.ledger().canceled_order("XBTUSD", order.id).is_some());
    }

    #[test]
    fn test_expired_order_does_not_fill() {
        let mut engine = engine_at(500);
        let order = engine
            .submit(
                OrderRequest::limit("XBTUSD", Side::Buy, dec!(1), dec!(9.5))
                    .with_time_in_force(TimeInForce::GoodTillTime(1000)),
            )
            .unwrap();
        assert!(engine.on_bar(&reference_bar()).is_empty());
        assert_eq!(engine.ledger().get(order.id).unwrap().status, OrderStatus::Expired);
    }

    #[test]
    fn test_modify_and_cancel() {
        let mut engine = engine_at(999);
        let order = engine
            .submit(OrderRequest::limit("XBTUSD", Side::Sell, dec!(1), dec!(13)))
            .unwrap();

        let amended = engine.modify(order.id, &OrderAmendment::price(dec!(11.5))).unwrap();
        assert_eq!(amended.price, dec!(11.5));
        assert_eq!(amended.status, OrderStatus::Open);

        assert!(matches!(
            engine.modify(order.id, &OrderAmendment::amount(dec!(-1))),
            Err(ExchangeError::InvalidAmendment { .. })
        ));

        let canceled = engine.cancel(order.id).unwrap();
        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert_eq!(engine.cancel(order.id).unwrap().status, OrderStatus::Canceled);
        assert_eq!(
            engine.modify(order.id, &OrderAmendment::price(dec!(1))).unwrap().price,
            dec!(11.5)
        );
        assert!(engine.on_bar(&reference_bar()).is_empty());
        assert!(matches!(engine.cancel(OrderId(99)), Err(ExchangeError::OrderNotFound(_))));
    }

    #[test]
    fn test_events_are_published_in_order() {
        let mut engine = engine_at(999);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.subscribe(move |event: &OrderEvent| {
            let label = match event {
                OrderEvent::Updated(o) => format!("{}:{}", o.id, o.status),
                OrderEvent::Filled(f) => format!("fill:{}", f.order_id),
            };
            sink.lock().unwrap().push(label);
        });

        engine
            .submit(OrderRequest::limit("XBTUSD", Side::Buy, dec!(1), dec!(9.5)))
            .unwrap();
        engine.on_bar(&reference_bar());

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["O-1:pending", "O-1:open", "fill:O-1", "O-1:close"]
        );
    }

    #[test]
    fn test_bracket_lifecycle_with_oco() {
        let mut engine = engine_at(999);
        let bracket = engine
            .create_bracket(BracketRequest::new(
                "XBTUSD",
                Side::Buy,
                dec!(1),
                dec!(9.5),
                dec!(11.5),
                dec!(8.5),
            ))
            .unwrap();
        assert_eq!(bracket.status, BracketStatus::AwaitingEntry);
        assert!(bracket.take_profit_order_id.is_none());

        // Entry fills; legs spawn but cannot fill on the same bar.
        engine.on_bar(&reference_bar());
        let bracket = engine.brackets().get(bracket.id).unwrap().clone();
        assert_eq!(bracket.status, BracketStatus::Protected);
        let sl = bracket.stop_loss_order_id.unwrap();
        let tp = bracket.take_profit_order_id.unwrap();
        assert!(sl < tp);
        assert!(engine.ledger().is_open("XBTUSD", sl));
        assert!(engine.ledger().is_open("XBTUSD", tp));

        // Bar reaches both exits: the stop loss, submitted first, wins.
        let fills = engine.on_bar(&bar(2000, dec!(10), dec!(12), dec!(8), dec!(11)));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].order_id, sl);
        assert_eq!(engine.ledger().get(tp).unwrap().status, OrderStatus::Canceled);
        assert_eq!(
            engine.brackets().get(bracket.id).unwrap().status,
            BracketStatus::StoppedOut
        );
    }

    #[test]
    fn test_bracket_take_profit_cancels_stop_loss() {
        let mut engine = engine_at(999);
        let bracket = engine
            .create_bracket(BracketRequest::new(
                "XBTUSD",
                Side::Buy,
                dec!(1),
                dec!(9.5),
                dec!(11.5),
                dec!(8.5),
            ))
            .unwrap();
        engine.on_bar(&reference_bar());

        let fills = engine.on_bar(&bar(2000, dec!(11), dec!(12), dec!(10.5), dec!(11.8)));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, dec!(11.5));

        let bracket = engine.brackets().get(bracket.id).unwrap();
        assert_eq!(bracket.status, BracketStatus::TakenProfit);
        let sl = engine.ledger().get(bracket.stop_loss_order_id.unwrap()).unwrap();
        assert_eq!(sl.status, OrderStatus::Canceled);
        assert!(engine.on_bar(&bar(3000, dec!(8), dec!(8), dec!(7), dec!(7))).is_empty());
    }

    #[test]
    fn test_modify_bracket_and_cancel_leg() {
        let mut engine = engine_at(999);
        let bracket = engine
            .create_bracket(BracketRequest::new(
                "XBTUSD",
                Side::Buy,
                dec!(1),
                dec!(9.5),
                dec!(11.5),
                dec!(8.5),
            ))
            .unwrap();

        let amended = engine
            .modify_bracket(
                bracket.id,
                &BracketAmendment {
                    entry_price: Some(dec!(9.2)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(amended.entry_price, dec!(9.2));
        assert_eq!(engine.ledger().get(bracket.entry_order_id).unwrap().price, dec!(9.2));

        let after = engine.cancel_bracket_leg(bracket.id, BracketLeg::Entry).unwrap();
        assert_eq!(after.status, BracketStatus::Inactive);
        assert!(engine.on_bar(&reference_bar()).is_empty());
        assert_eq!(engine.ledger().len(), 1);
    }

    #[test]
    fn test_rejected_bracket_amendment_changes_nothing() {
        let mut engine = engine_at(999);
        let bracket = engine
            .create_bracket(BracketRequest::new(
                "XBTUSD",
                Side::Buy,
                dec!(1),
                dec!(9.5),
                dec!(11.5),
                dec!(8.5),
            ))
            .unwrap();

        let bad_entry = BracketAmendment {
            entry_price: Some(dec!(-1)),
            take_profit_price: Some(dec!(5)),
            ..Default::default()
        };
        assert!(engine.modify_bracket(bracket.id, &bad_entry).is_err());
        let stop_above_entry = BracketAmendment {
            stop_loss_price: Some(dec!(20)),
            ..Default::default()
        };
        assert!(matches!(
            engine.modify_bracket(bracket.id, &stop_above_entry),
            Err(ExchangeError::InvalidBracket(_))
        ));
        assert_eq!(engine.brackets().get(bracket.id).unwrap(), &bracket);

        // Legs spawn at the original exit prices and stay out of a quiet bar.
        engine.on_bar(&reference_bar());
        let protected = engine.brackets().get(bracket.id).unwrap().clone();
        let tp = engine.ledger().get(protected.take_profit_order_id.unwrap()).unwrap();
        let sl = engine.ledger().get(protected.stop_loss_order_id.unwrap()).unwrap();
        assert_eq!(tp.price, dec!(11.5));
        assert_eq!(sl.price, dec!(8.5));
        assert!(engine.on_bar(&bar(2000, dec!(10), dec!(10.2), dec!(9.8), dec!(10))).is_empty());
    }

    #[test]
    fn test_modify_bracket_moves_open_exit_legs() {
        let mut engine = engine_at(999);
        let bracket = engine
            .create_bracket(BracketRequest::new(
                "XBTUSD",
                Side::Buy,
                dec!(1),
                dec!(9.5),
                dec!(11.5),
                dec!(8.5),
            ))
            .unwrap();
        engine.on_bar(&reference_bar());

        let amended = engine
            .modify_bracket(
                bracket.id,
                &BracketAmendment {
                    stop_loss_price: Some(dec!(9)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(amended.stop_loss_price, dec!(9));
        let sl = engine.ledger().get(amended.stop_loss_order_id.unwrap()).unwrap();
        assert_eq!(sl.price, dec!(9));
    }

    #[test]
    fn test_invalid_bracket_rejected() {
        let mut engine = engine_at(999);
        let err = engine
            .create_bracket(BracketRequest::new(
                "XBTUSD",
                Side::Buy,
                dec!(1),
                dec!(9.5),
                dec!(8.5),
                dec!(11.5),
            ))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidBracket(_)));
        assert!(engine.brackets().is_empty());
    }
}
