//! Sample strategies for replay runs.
//!
//! - Dip buyer: rests a limit bid at each bar's low
//! - Bracket breakout: opens a bracket order when a close breaks the prior high

mod bracket_breakout;
mod dip_buyer;
mod registry;

pub use bracket_breakout::{BracketBreakoutConfig, BracketBreakoutStrategy};
pub use dip_buyer::{DipBuyerConfig, DipBuyerStrategy};
pub use registry::{StrategyInfo, StrategyRegistry};
