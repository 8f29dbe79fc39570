//! Events published by the simulated exchange.

use serde::{Deserialize, Serialize};

use super::{Fill, Order};

/// Order lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    /// A new order value (creation, transition or amendment)
    Updated(Order),
    /// An order was executed
    Filled(Fill),
}

impl OrderEvent {
    /// Symbol the event belongs to.
    pub fn symbol(&self) -> &str {
        match self {
            OrderEvent::Updated(order) => &order.symbol,
            OrderEvent::Filled(fill) => &fill.symbol,
        }
    }
}
