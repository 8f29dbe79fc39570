//! Logging setup and the order event log.

mod event_log;
mod logging;

pub use event_log::EventLog;
pub use logging::setup_logging;
