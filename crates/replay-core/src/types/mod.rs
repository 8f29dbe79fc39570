//! Core data types for the replay simulator.

mod bracket;
mod event;
mod market;
mod order;
mod timeframe;

pub use bracket::{BracketAmendment, BracketLeg, BracketOrder, BracketRequest, BracketStatus};
pub use event::OrderEvent;
pub use market::{Bar, DataKind, MarketEvent, Tick};
pub use order::{
    BracketId, Fill, FillId, Order, OrderAmendment, OrderId, OrderRequest, OrderStatus, OrderType,
    Role, Side, TimeInForce,
};
pub use timeframe::Timeframe;
