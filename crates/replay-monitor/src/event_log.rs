//! Structured log of order events.

use replay_core::traits::EventHandler;
use replay_core::types::OrderEvent;
use tracing::{debug, info};

/// Downstream order event subscriber that writes every order update and
/// fill as structured tracing fields under the `replay::orders` target.
#[derive(Debug, Default)]
pub struct EventLog {
    updates: u64,
    fills: u64,
}

impl EventLog {
    /// Create an empty event log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Order updates logged so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Fills logged so far.
    pub fn fills(&self) -> u64 {
        self.fills
    }
}

impl EventHandler<OrderEvent> for EventLog {
    fn handle(&mut self, event: &OrderEvent) {
        match event {
            OrderEvent::Updated(order) => {
                self.updates += 1;
                debug!(
                    target: "replay::orders",
                    order = %order.id,
                    symbol = %order.symbol,
                    side = %order.side,
                    order_type = ?order.order_type,
                    status = %order.status,
                    price = %order.price,
                    amount = %order.amount,
                    filled = %order.filled,
                    bracket = ?order.bracket_id,
                    at = order.updated_at,
                    "Order update"
                );
            }
            OrderEvent::Filled(fill) => {
                self.fills += 1;
                info!(
                    target: "replay::orders",
                    fill = %fill.id,
                    order = %fill.order_id,
                    symbol = %fill.symbol,
                    side = %fill.side,
                    price = %fill.price,
                    amount = %fill.amount,
                    cost = %fill.cost,
                    role = ?fill.role,
                    at = fill.timestamp,
                    "Fill"
                );
            }
        }
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        debug!(
            target: "replay::orders",
            updates = self.updates,
            fills = self.fills,
            "Event log closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::traits::Publisher;
    use replay_core::types::{Fill, FillId, Order, OrderId, OrderRequest, OrderStatus, Role, Side};
    use rust_decimal_macros::dec;

    #[test]
    fn test_counts_events() {
        let request = OrderRequest::limit("XBTUSD", Side::Buy, dec!(1), dec!(9.5));
        let order = Order::from_request(OrderId(1), &request, 999);
        let fill = Fill {
            id: FillId(1),
            order_id: OrderId(1),
            symbol: "XBTUSD".to_string(),
            side: Side::Buy,
            timestamp: 1_000,
            price: dec!(9.5),
            amount: dec!(1),
            cost: dec!(9.5),
            role: Role::Maker,
        };

        let mut log = EventLog::new();
        log.handle(&OrderEvent::Updated(order.clone()));
        log.handle(&OrderEvent::Filled(fill));
        log.handle(&OrderEvent::Updated(order.filled_at(dec!(9.5), 1_000)));
        assert_eq!(log.updates(), 2);
        assert_eq!(log.fills(), 1);

        let mut publisher: Publisher<OrderEvent> = Publisher::new();
        publisher.subscribe(EventLog::new());
        publisher.publish(&OrderEvent::Updated(order.transitioned(OrderStatus::Open, 999)));
        assert_eq!(publisher.len(), 1);
    }
}
