//! Compensation engine: tree placement, level fan-out, recycling, and the
//! bonus-program trackers.

pub mod distributor;
pub mod missed_profit;
pub mod placement;
pub mod recycle;
pub mod trackers;

pub use distributor::{distribute_payment, DistributionOutcome};
pub use missed_profit::{accumulate_missed, distribute_accumulated, AccumulateReport, DistributeReport};
pub use placement::place;
pub use recycle::{process_completions, RecycleAction, RecycleEvent};
