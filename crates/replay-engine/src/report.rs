//! Replay report generation.

use replay_core::types::{BracketOrder, Fill, Order};
use replay_exchange::ExchangeSnapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionConfig;
use crate::stats::ReplayStats;

/// Complete replay report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Identifies this run
    pub run_id: Uuid,
    /// Strategies that took part, in dispatch order
    pub strategies: Vec<String>,
    /// Session configuration used
    pub config: SessionConfig,
    /// Statistics
    pub stats: ReplayStats,
    /// Every order, by id
    pub orders: Vec<Order>,
    /// Every fill, by order then fill id
    pub fills: Vec<Fill>,
    /// Every bracket order, by id
    pub brackets: Vec<BracketOrder>,
}

impl ReplayReport {
    /// Assemble a report from the final exchange state.
    pub fn new(
        run_id: Uuid,
        strategies: Vec<String>,
        config: SessionConfig,
        stats: ReplayStats,
        snapshot: ExchangeSnapshot,
    ) -> Self {
        Self {
            run_id,
            strategies,
            config,
            stats,
            orders: snapshot.orders,
            fills: snapshot.fills,
            brackets: snapshot.brackets,
        }
    }

    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let stats = &self.stats;
        let mut s = String::new();

        s.push_str("═══════════════════════════════════════════════════════════\n");
        s.push_str("                       REPLAY REPORT                        \n");
        s.push_str("═══════════════════════════════════════════════════════════\n\n");

        s.push_str("RUN\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Run ID:              {}\n", self.run_id));
        s.push_str(&format!("  Strategies:          {}\n", self.strategies.join(", ")));
        s.push_str(&format!("  Match Source:        {}\n", self.config.match_source));
        s.push_str(&format!("  Speed:               {:?}\n", self.config.speed));
        s.push_str(&format!("  Wall Time:           {} ms\n", stats.wall_time_ms));
        if stats.stopped_early {
            s.push_str("  Stopped Early:       yes\n");
        }
        s.push('\n');

        s.push_str("REPLAY\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Points Replayed:     {}\n", stats.points_replayed));
        s.push_str(&format!("  Bars / Ticks:        {} / {}\n", stats.bars, stats.ticks));
        s.push_str(&format!("  Aggregated Bars:     {}\n", stats.aggregated_bars));
        s.push_str(&format!("  Bars Matched:        {}\n", stats.bars_matched));
        s.push_str(&format!("  Deliveries:          {}\n", stats.deliveries));
        s.push_str(&format!("  Evicted Subscribers: {}\n", stats.evicted_subscribers));
        s.push('\n');

        s.push_str("ORDERS\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Total Orders:        {}\n", stats.orders));
        for (status, count) in &stats.orders_by_status {
            s.push_str(&format!("    {:<18} {}\n", format!("{status}:"), count));
        }
        s.push_str(&format!("  Brackets:            {}\n", stats.brackets));
        s.push_str(&format!(
            "    take profit / stop: {} / {}\n",
            stats.brackets_taken_profit, stats.brackets_stopped_out
        ));
        s.push_str(&format!("  Strategy Errors:     {}\n", stats.strategy_errors));
        s.push('\n');

        s.push_str("FILLS\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Total Fills:         {}\n", stats.fills));
        s.push_str(&format!(
            "  Maker / Taker:       {} / {} ({:.2}% maker)\n",
            stats.maker_fills,
            stats.taker_fills,
            stats.maker_pct()
        ));
        for (symbol, notional) in &stats.notional_by_symbol {
            s.push_str(&format!("  Notional {:<11} {:.2}\n", format!("{symbol}:"), notional));
        }
        s.push('\n');

        s.push_str("═══════════════════════════════════════════════════════════\n");

        s
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export fills as CSV.
    pub fn fills_to_csv(&self) -> String {
        let mut csv = String::from("timestamp,order_id,symbol,side,price,amount,cost,role\n");
        for fill in &self.fills {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{:?}\n",
                fill.timestamp,
                fill.order_id.0,
                fill.symbol,
                fill.side,
                fill.price,
                fill.amount,
                fill.cost,
                fill.role
            ));
        }
        csv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::types::{FillId, OrderId, Role, Side};
    use rust_decimal_macros::dec;

    fn report() -> ReplayReport {
        let mut stats = ReplayStats::new();
        stats.points_replayed = 10;
        stats.fills = 1;
        stats.maker_fills = 1;
        stats.notional_by_symbol.insert("XBTUSD".to_string(), dec!(9.5));

        let snapshot = ExchangeSnapshot {
            fills: vec![Fill {
                id: FillId(1),
                order_id: OrderId(1),
                symbol: "XBTUSD".to_string(),
                side: Side::Buy,
                timestamp: 1_000,
                price: dec!(9.5),
                amount: dec!(1),
                cost: dec!(9.5),
                role: Role::Maker,
            }],
            ..Default::default()
        };

        ReplayReport::new(
            Uuid::new_v4(),
            vec!["dip_buyer".to_string()],
            SessionConfig::default(),
            stats,
            snapshot,
        )
    }

    #[test]
    fn test_report_summary() {
        let summary = report().summary();
        assert!(summary.contains("REPLAY REPORT"));
        assert!(summary.contains("dip_buyer"));
        assert!(summary.contains("Points Replayed:     10"));
        assert!(summary.contains("100.00% maker"));
    }

    #[test]
    fn test_report_json() {
        let report = report();
        let json = report.to_json().unwrap();
        let parsed: ReplayReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
        assert_eq!(parsed.fills, report.fills);
    }

    #[test]
    fn test_fills_csv() {
        let csv = report().fills_to_csv();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "1000,1,XBTUSD,BUY,9.5,1,9.5,Maker");
    }
}
