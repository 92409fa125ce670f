//! Operation-level flows composing the engine pieces: the join/upgrade
//! pipeline and the daily calculation batch.

pub mod batch;
pub mod join;

pub use batch::{run_daily, DailyReport};
pub use join::{process_join, JoinOutcome, JoinRequest};
