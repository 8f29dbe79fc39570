//! Order and fill bookkeeping.

use std::collections::BTreeMap;

use replay_core::types::{Fill, FillId, Order, OrderId, OrderStatus};

/// Result of applying an order value to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// The value was stored; `previous` is the status it replaced
    Applied { previous: Option<OrderStatus> },
    /// Identical to the stored value
    Unchanged,
    /// Would regress the lifecycle or mutate a terminal order
    Ignored,
}

impl LedgerOutcome {
    /// Check if the ledger changed.
    pub fn is_applied(&self) -> bool {
        matches!(self, LedgerOutcome::Applied { .. })
    }
}

type Key = (String, OrderId);

/// Order ledger.
///
/// Every order value lands in the catch-all index; the working indexes hold
/// each order in at most one of open, closed (`close`) and canceled
/// (`canceled`, `expired`, `rejected`). `pending` orders live only in the
/// catch-all index. Working indexes are keyed by `(symbol, id)`.
#[derive(Debug, Clone, Default)]
pub struct OrderLedger {
    orders: BTreeMap<OrderId, Order>,
    open: BTreeMap<Key, Order>,
    closed: BTreeMap<Key, Order>,
    canceled: BTreeMap<Key, Order>,
    fills: BTreeMap<(OrderId, FillId), Fill>,
}

impl OrderLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an order value.
    ///
    /// Replaying a stored value is a no-op. Values that would move the
    /// order backwards in its lifecycle, or change a terminal order, are
    /// ignored.
    pub fn apply(&mut self, order: Order) -> LedgerOutcome {
        let previous = match self.orders.get(&order.id) {
            Some(existing) if *existing == order => return LedgerOutcome::Unchanged,
            Some(existing)
                if existing.status.is_terminal()
                    || order.status.rank() < existing.status.rank() =>
            {
                return LedgerOutcome::Ignored
            }
            Some(existing) => Some(existing.status),
            None => None,
        };

        let key = (order.symbol.clone(), order.id);
        self.open.remove(&key);
        match order.status {
            OrderStatus::Pending => {}
            OrderStatus::Open => {
                self.open.insert(key, order.clone());
            }
            OrderStatus::Close => {
                self.closed.insert(key, order.clone());
            }
            OrderStatus::Canceled | OrderStatus::Expired | OrderStatus::Rejected => {
                self.canceled.insert(key, order.clone());
            }
        }
        self.orders.insert(order.id, order);

        LedgerOutcome::Applied { previous }
    }

    /// Record a fill. Returns `false` for an already recorded fill.
    pub fn record_fill(&mut self, fill: Fill) -> bool {
        let key = (fill.order_id, fill.id);
        if self.fills.contains_key(&key) {
            return false;
        }
        self.fills.insert(key, fill);
        true
    }

    /// Get any order by id.
    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Get an open order.
    pub fn open_order(&self, symbol: &str, id: OrderId) -> Option<&Order> {
        self.open.get(&(symbol.to_string(), id))
    }

    /// Get a closed (filled) order.
    pub fn closed_order(&self, symbol: &str, id: OrderId) -> Option<&Order> {
        self.closed.get(&(symbol.to_string(), id))
    }

    /// Get a canceled, expired or rejected order.
    pub fn canceled_order(&self, symbol: &str, id: OrderId) -> Option<&Order> {
        self.canceled.get(&(symbol.to_string(), id))
    }

    /// Check if an order is open.
    pub fn is_open(&self, symbol: &str, id: OrderId) -> bool {
        self.open_order(symbol, id).is_some()
    }

    /// Open orders of one symbol, oldest first.
    pub fn open_orders_for(&self, symbol: &str) -> impl Iterator<Item = &Order> {
        symbol_range(&self.open, symbol)
    }

    /// Ids of the open orders of one symbol, oldest first.
    pub fn open_ids_for(&self, symbol: &str) -> Vec<OrderId> {
        self.open_orders_for(symbol).map(|o| o.id).collect()
    }

    /// All open orders, by symbol then id.
    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.open.values()
    }

    /// All closed orders, by symbol then id.
    pub fn closed_orders(&self) -> impl Iterator<Item = &Order> {
        self.closed.values()
    }

    /// All canceled, expired and rejected orders, by symbol then id.
    pub fn canceled_orders(&self) -> impl Iterator<Item = &Order> {
        self.canceled.values()
    }

    /// Every order ever seen, by id.
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    /// Fills of one order.
    pub fn fills_for(&self, order_id: OrderId) -> impl Iterator<Item = &Fill> {
        self.fills
            .range((order_id, FillId(0))..=(order_id, FillId(u64::MAX)))
            .map(|(_, fill)| fill)
    }

    /// Every fill, by order then fill id.
    pub fn fills(&self) -> impl Iterator<Item = &Fill> {
        self.fills.values()
    }

    /// Number of orders ever seen.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Check if no order was ever seen.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

fn symbol_range<'a>(
    index: &'a BTreeMap<Key, Order>,
    symbol: &str,
) -> impl Iterator<Item = &'a Order> {
    let from = (symbol.to_string(), OrderId(0));
    let to = (symbol.to_string(), OrderId(u64::MAX));
    index.range(from..=to).map(|(_, order)| order)
}
