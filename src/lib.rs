pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Amount, BonusFund, BonusKind, Commission, CommissionKind, CommissionStatus, MissedReason,
    Program, Role, TimeMs, TxHash, UserId, Wallet,
};
pub use error::{AppError, EngineError};
