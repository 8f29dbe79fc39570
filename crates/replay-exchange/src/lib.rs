//! Simulated exchange.
//!
//! - [`OrderLedger`] records every order value and routes it into the
//!   open, closed and canceled indexes
//! - [`MatchingEngine`] fills open orders against each completed bar and
//!   drives the order lifecycle
//! - [`BracketOrderManager`] reacts to leg transitions of OTOCO groups
//! - [`SimulatedExchange`] runs the engine as a single-writer task behind
//!   an [`ExchangeClient`]

mod bracket;
mod ledger;
mod matching;
mod service;

pub use bracket::{BracketAction, BracketOrderManager, BracketPlan};
pub use ledger::{LedgerOutcome, OrderLedger};
pub use matching::{fill_decision, FillDecision, MatchingEngine};
pub use service::{ExchangeClient, ExchangeSnapshot, SimulatedExchange};
