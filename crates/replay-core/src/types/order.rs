//! Order types and structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! sequential_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

sequential_id!(
    /// Exchange-assigned order id, allocated in submission order.
    OrderId,
    "O"
);
sequential_id!(
    /// Exchange-assigned fill id.
    FillId,
    "F"
);
sequential_id!(
    /// Bracket (OTOCO) group id.
    BracketId,
    "B"
);

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Market order - fills on the next bar, `price` bounds the fill
    Market,
    /// Limit order - fills when the bar trades through `price`
    Limit,
    /// Stop order - triggers when the bar reaches `price`, then fills as a taker
    Stop,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Stop => write!(f, "STOP"),
        }
    }
}

/// Time in force for orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Good til canceled
    #[default]
    GoodTillCancel,
    /// Expires at the first bar whose timestamp reaches the given time (ms)
    GoodTillTime(i64),
}

impl TimeInForce {
    /// Expiry time in milliseconds, if any.
    pub fn expires_at(&self) -> Option<i64> {
        match self {
            TimeInForce::GoodTillCancel => None,
            TimeInForce::GoodTillTime(at) => Some(*at),
        }
    }
}

/// Order status.
///
/// `pending -> open -> {close | canceled | expired | rejected}`; the last
/// four are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, not yet accepted
    Pending,
    /// Accepted and working
    Open,
    /// Completely filled
    Close,
    /// Canceled by the client or by a bracket reaction
    Canceled,
    /// Time in force elapsed
    Expired,
    /// Refused on submission
    Rejected,
}

impl OrderStatus {
    /// Check if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Close | OrderStatus::Canceled | OrderStatus::Expired | OrderStatus::Rejected
        )
    }

    /// Position in the lifecycle. Transitions never decrease the rank.
    pub fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Open => 1,
            OrderStatus::Close
            | OrderStatus::Canceled
            | OrderStatus::Expired
            | OrderStatus::Rejected => 2,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Open => "open",
            OrderStatus::Close => "close",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Expired => "expired",
            OrderStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

/// Liquidity role of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Resting order (limit)
    Maker,
    /// Crossing order (market, stop)
    Taker,
}

/// Order request for submitting new orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Symbol to trade
    pub symbol: String,
    /// Buy or sell
    pub side: Side,
    /// Type of order
    pub order_type: OrderType,
    /// Amount to trade
    pub amount: Decimal,
    /// Limit/stop price, or the worst acceptable price for market orders
    pub price: Decimal,
    /// Time in force
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    /// Create a market order request bounded by `price_bound`.
    pub fn market(symbol: impl Into<String>, side: Side, amount: Decimal, price_bound: Decimal) -> Self {
        Self::new(symbol, side, OrderType::Market, amount, price_bound)
    }

    /// Create a limit order request.
    pub fn limit(symbol: impl Into<String>, side: Side, amount: Decimal, price: Decimal) -> Self {
        Self::new(symbol, side, OrderType::Limit, amount, price)
    }

    /// Create a stop order request.
    pub fn stop(symbol: impl Into<String>, side: Side, amount: Decimal, stop_price: Decimal) -> Self {
        Self::new(symbol, side, OrderType::Stop, amount, stop_price)
    }

    fn new(
        symbol: impl Into<String>,
        side: Side,
        order_type: OrderType,
        amount: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type,
            amount,
            price,
            time_in_force: TimeInForce::GoodTillCancel,
        }
    }

    /// Set the time in force.
    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    /// Reason the request cannot be accepted, if any.
    pub fn rejection_reason(&self) -> Option<&'static str> {
        if self.amount <= Decimal::ZERO {
            Some("amount must be positive")
        } else if self.price <= Decimal::ZERO {
            Some("price must be positive")
        } else {
            None
        }
    }
}

/// Fields of a live order that may be changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAmendment {
    /// New price
    pub price: Option<Decimal>,
    /// New amount
    pub amount: Option<Decimal>,
}

impl OrderAmendment {
    /// Change the price.
    pub fn price(price: Decimal) -> Self {
        Self {
            price: Some(price),
            amount: None,
        }
    }

    /// Change the amount.
    pub fn amount(amount: Decimal) -> Self {
        Self {
            price: None,
            amount: Some(amount),
        }
    }

    /// Also change the amount.
    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.amount.is_none()
    }
}

/// A fill represents the complete execution of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Fill ID
    pub id: FillId,
    /// Order ID this fill belongs to
    pub order_id: OrderId,
    /// Symbol traded
    pub symbol: String,
    /// Side of the filled order
    pub side: Side,
    /// Bar timestamp at which the fill occurred (ms)
    pub timestamp: i64,
    /// Fill price
    pub price: Decimal,
    /// Amount filled
    pub amount: Decimal,
    /// price * amount
    pub cost: Decimal,
    /// Maker or taker
    pub role: Role,
}

/// Order with status and fill information.
///
/// Orders are values: every transition produces a new `Order` that is
/// republished to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID
    pub id: OrderId,
    /// Symbol traded
    pub symbol: String,
    /// Buy or sell
    pub side: Side,
    /// Type of order
    pub order_type: OrderType,
    /// Limit/stop price or market bound
    pub price: Decimal,
    /// Original amount
    pub amount: Decimal,
    /// Amount filled so far
    pub filled: Decimal,
    /// amount - filled
    pub remaining: Decimal,
    /// Sum of fill price * fill amount
    pub cost: Decimal,
    /// Current status
    pub status: OrderStatus,
    /// Time in force
    pub time_in_force: TimeInForce,
    /// Timestamp of the last bar seen before submission (ms)
    pub submitted_at: i64,
    /// Timestamp of the latest transition (ms)
    pub updated_at: i64,
    /// Bracket this order is a leg of
    pub bracket_id: Option<BracketId>,
}

impl Order {
    /// Create a pending order from a request.
    pub fn from_request(id: OrderId, request: &OrderRequest, submitted_at: i64) -> Self {
        Self {
            id,
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            price: request.price,
            amount: request.amount,
            filled: Decimal::ZERO,
            remaining: request.amount,
            cost: Decimal::ZERO,
            status: OrderStatus::Pending,
            time_in_force: request.time_in_force,
            submitted_at,
            updated_at: submitted_at,
            bracket_id: None,
        }
    }

    /// Tag the order as a bracket leg.
    pub fn with_bracket(mut self, bracket_id: BracketId) -> Self {
        self.bracket_id = Some(bracket_id);
        self
    }

    /// Check if the order is working.
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// Copy of the order in a new status.
    pub fn transitioned(&self, status: OrderStatus, at: i64) -> Self {
        Self {
            status,
            updated_at: at,
            ..self.clone()
        }
    }

    /// Copy of the order completely filled at `price`.
    pub fn filled_at(&self, price: Decimal, at: i64) -> Self {
        Self {
            filled: self.amount,
            remaining: Decimal::ZERO,
            cost: self.amount * price,
            status: OrderStatus::Close,
            updated_at: at,
            ..self.clone()
        }
    }

    /// Copy of the order with the amendment applied, or `None` when the
    /// amendment changes nothing.
    pub fn amended(&self, amendment: &OrderAmendment, at: i64) -> Option<Self> {
        let price = amendment.price.unwrap_or(self.price);
        let amount = amendment.amount.unwrap_or(self.amount);
        if price == self.price && amount == self.amount {
            return None;
        }
        Some(Self {
            price,
            amount,
            remaining: amount - self.filled,
            updated_at: at,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_request_constructors() {
        let market = OrderRequest::market("XBTUSD", Side::Buy, dec!(1), dec!(100));
        assert_eq!(market.order_type, OrderType::Market);
        assert_eq!(market.price, dec!(100));

        let stop = OrderRequest::stop("XBTUSD", Side::Sell, dec!(1), dec!(90))
            .with_time_in_force(TimeInForce::GoodTillTime(5_000));
        assert_eq!(stop.order_type, OrderType::Stop);
        assert_eq!(stop.time_in_force.expires_at(), Some(5_000));
    }

    #[test]
    fn test_rejection_reason() {
        assert!(OrderRequest::limit("X", Side::Buy, dec!(1), dec!(1)).rejection_reason().is_none());
        assert!(OrderRequest::limit("X", Side::Buy, dec!(0), dec!(1)).rejection_reason().is_some());
        assert!(OrderRequest::limit("X", Side::Buy, dec!(1), dec!(-1)).rejection_reason().is_some());
    }

    #[test]
    fn test_order_fill_updates_amounts() {
        let request = OrderRequest::limit("XBTUSD", Side::Buy, dec!(2), dec!(9.5));
        let order = Order::from_request(OrderId(1), &request, 999);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.remaining, dec!(2));

        let filled = order.filled_at(dec!(9.5), 1000);
        assert_eq!(filled.status, OrderStatus::Close);
        assert_eq!(filled.filled, dec!(2));
        assert_eq!(filled.remaining, dec!(0));
        assert_eq!(filled.cost, dec!(19.0));
        assert_eq!(filled.updated_at, 1000);
        assert_eq!(filled.submitted_at, 999);
    }

    #[test]
    fn test_order_amended() {
        let request = OrderRequest::limit("XBTUSD", Side::Buy, dec!(2), dec!(9.5));
        let order = Order::from_request(OrderId(1), &request, 0).transitioned(OrderStatus::Open, 0);

        assert!(order.amended(&OrderAmendment::price(dec!(9.5)), 1).is_none());
        assert!(order.amended(&OrderAmendment::default(), 1).is_none());

        let amended = order
            .amended(&OrderAmendment::price(dec!(9)).with_amount(dec!(3)), 1)
            .unwrap();
        assert_eq!(amended.price, dec!(9));
        assert_eq!(amended.amount, dec!(3));
        assert_eq!(amended.remaining, dec!(3));
        assert_eq!(amended.status, OrderStatus::Open);
    }

    #[test]
    fn test_status_rank_is_monotone_over_lifecycle() {
        assert!(OrderStatus::Pending.rank() < OrderStatus::Open.rank());
        assert!(OrderStatus::Open.rank() < OrderStatus::Close.rank());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::Open.is_terminal());
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(OrderId(7).to_string(), "O-7");
        assert_eq!(BracketId(2).to_string(), "B-2");
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }
}
