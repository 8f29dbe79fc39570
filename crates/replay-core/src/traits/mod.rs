//! Core traits for the replay simulator.

mod gateway;
mod handler;
mod strategy;

pub use gateway::OrderGateway;
pub use handler::{EventHandler, Publisher};
pub use strategy::{Strategy, StrategyConfig};
