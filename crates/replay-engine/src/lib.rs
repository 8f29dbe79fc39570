//! Replay driver, rendezvous barriers and the end-to-end session.

mod barrier;
mod driver;
mod report;
mod session;
mod stats;

pub use barrier::{
    BarrierKey, BarrierPolicy, BarrierRegistry, CycleOutcome, Delivery, ReplayBarrier, Subscription,
};
pub use driver::{DriverSummary, ReplayDriver, ReplaySpeed, StopHandle};
pub use report::ReplayReport;
pub use session::{MatchSource, ReplaySession, SessionConfig};
pub use stats::ReplayStats;
