//! Replay run statistics.

use std::collections::BTreeMap;
use std::time::Duration;

use replay_core::types::{BracketStatus, Role};
use replay_exchange::ExchangeSnapshot;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::driver::DriverSummary;

/// Counters collected over one replay run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayStats {
    /// Data points published by the driver
    pub points_replayed: u64,
    /// Bars among the published points
    pub bars: u64,
    /// Ticks among the published points
    pub ticks: u64,
    /// Completed barrier deliveries
    pub deliveries: u64,
    /// Subscribers evicted by the barrier timeout policy
    pub evicted_subscribers: u64,
    /// Bars sent to the matching engine
    pub bars_matched: u64,
    /// Bars built from ticks by the aggregator
    pub aggregated_bars: u64,
    /// Strategy callbacks that returned an error
    pub strategy_errors: u64,
    /// Orders created
    pub orders: u64,
    /// Orders by final status
    pub orders_by_status: BTreeMap<String, u64>,
    /// Fills
    pub fills: u64,
    /// Maker fills
    pub maker_fills: u64,
    /// Taker fills
    pub taker_fills: u64,
    /// Traded notional per symbol
    pub notional_by_symbol: BTreeMap<String, Decimal>,
    /// Bracket orders created
    pub brackets: u64,
    /// Brackets closed at the take-profit leg
    pub brackets_taken_profit: u64,
    /// Brackets closed at the stop-loss leg
    pub brackets_stopped_out: u64,
    /// Run halted by a stop request
    pub stopped_early: bool,
    /// First replayed timestamp (ms)
    pub first_timestamp: Option<i64>,
    /// Last replayed timestamp (ms)
    pub last_timestamp: Option<i64>,
    /// Wall-clock run time in milliseconds
    pub wall_time_ms: u64,
}

impl ReplayStats {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record what the driver published.
    pub fn record_driver(&mut self, summary: &DriverSummary) {
        self.points_replayed = summary.points;
        self.bars = summary.bars;
        self.ticks = summary.ticks;
        self.deliveries = summary.deliveries;
        self.evicted_subscribers = summary.evicted;
        self.stopped_early = summary.stopped;
        self.first_timestamp = summary.first_timestamp;
        self.last_timestamp = summary.last_timestamp;
    }

    /// Record the final exchange state.
    pub fn record_exchange(&mut self, snapshot: &ExchangeSnapshot) {
        self.orders = snapshot.orders.len() as u64;
        self.orders_by_status.clear();
        for order in &snapshot.orders {
            *self.orders_by_status.entry(order.status.to_string()).or_insert(0) += 1;
        }

        self.fills = snapshot.fills.len() as u64;
        self.maker_fills = 0;
        self.taker_fills = 0;
        self.notional_by_symbol.clear();
        for fill in &snapshot.fills {
            match fill.role {
                Role::Maker => self.maker_fills += 1,
                Role::Taker => self.taker_fills += 1,
            }
            *self
                .notional_by_symbol
                .entry(fill.symbol.clone())
                .or_insert(Decimal::ZERO) += fill.cost;
        }

        self.brackets = snapshot.brackets.len() as u64;
        self.brackets_taken_profit = count_status(snapshot, BracketStatus::TakenProfit);
        self.brackets_stopped_out = count_status(snapshot, BracketStatus::StoppedOut);
    }

    /// Stamp the wall-clock duration.
    pub fn finalize(&mut self, wall_time: Duration) {
        self.wall_time_ms = wall_time.as_millis().try_into().unwrap_or(u64::MAX);
    }

    /// Total traded notional.
    pub fn total_notional(&self) -> Decimal {
        self.notional_by_symbol.values().copied().sum()
    }

    /// Share of fills that rested on the book, in percent.
    pub fn maker_pct(&self) -> Decimal {
        if self.fills == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.maker_fills) * Decimal::ONE_HUNDRED / Decimal::from(self.fills)
    }

    /// Number of orders that ended in `status`.
    pub fn orders_with_status(&self, status: &str) -> u64 {
        self.orders_by_status.get(status).copied().unwrap_or(0)
    }
}

fn count_status(snapshot: &ExchangeSnapshot, status: BracketStatus) -> u64 {
    snapshot.brackets.iter().filter(|b| b.status == status).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::types::{Fill, FillId, Order, OrderId, OrderRequest, OrderStatus, Side};
    use rust_decimal_macros::dec;

    fn fill(id: u64, symbol: &str, cost: Decimal, role: Role) -> Fill {
        Fill {
            id: FillId(id),
            order_id: OrderId(id),
            symbol: symbol.to_string(),
            side: Side::Buy,
            timestamp: 1_000,
            price: cost,
            amount: dec!(1),
            cost,
            role,
        }
    }

    #[test]
    fn test_record_exchange() {
        let request = OrderRequest::limit("XBTUSD", Side::Buy, dec!(1), dec!(10));
        let open = Order::from_request(OrderId(1), &request, 0).transitioned(OrderStatus::Open, 0);
        let canceled = Order::from_request(OrderId(2), &request, 0).transitioned(OrderStatus::Canceled, 0);

        let snapshot = ExchangeSnapshot {
            orders: vec![open, canceled],
            fills: vec![
                fill(1, "XBTUSD", dec!(9.5), Role::Maker),
                fill(2, "XBTUSD", dec!(10), Role::Taker),
                fill(3, "ETHUSD", dec!(2), Role::Maker),
            ],
            brackets: Vec::new(),
        };

        let mut stats = ReplayStats::new();
        stats.record_exchange(&snapshot);

        assert_eq!(stats.orders, 2);
        assert_eq!(stats.orders_with_status("open"), 1);
        assert_eq!(stats.orders_with_status("canceled"), 1);
        assert_eq!(stats.orders_with_status("close"), 0);
        assert_eq!(stats.maker_fills, 2);
        assert_eq!(stats.taker_fills, 1);
        assert_eq!(stats.notional_by_symbol["XBTUSD"], dec!(19.5));
        assert_eq!(stats.total_notional(), dec!(21.5));
    }

    #[test]
    fn test_maker_pct_without_fills() {
        assert_eq!(ReplayStats::new().maker_pct(), Decimal::ZERO);
    }

    #[test]
    fn test_record_driver() {
        let mut stats = ReplayStats::new();
        stats.record_driver(&DriverSummary {
            points: 4,
            bars: 3,
            ticks: 1,
            stopped: true,
            ..Default::default()
        });
        stats.finalize(Duration::from_millis(1_500));

        assert_eq!(stats.points_replayed, 4);
        assert!(stats.stopped_early);
        assert_eq!(stats.wall_time_ms, 1_500);
    }
}
