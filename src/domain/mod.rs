//! Core domain types for the compensation engine.

pub mod amount;
pub mod catalog;
pub mod commission;
pub mod fund;
pub mod placement;
pub mod primitives;
pub mod tracker;
pub mod user;

pub use amount::{Amount, MONEY_SCALE};
pub use commission::{Commission, CommissionKind, CommissionStatus, MissedReason};
pub use fund::{BonusFund, BonusKind};
pub use placement::{PlacementResult, TreePlacement};
pub use primitives::{Program, Role, TimeMs, TxHash, UserId, Wallet};
pub use tracker::{EligibilityReport, TrackerRecord};
pub use user::User;
