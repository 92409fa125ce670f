//! Commission allocations produced by the level distributor.

use serde::{Deserialize, Serialize};

use super::{Amount, Program, TimeMs, TxHash, UserId};

/// How an allocation was derived from the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionKind {
    /// Fixed fraction paid to the level-1 upline.
    Direct,
    /// Per-level share of the distribution pool.
    Level,
}

impl CommissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionKind::Direct => "direct",
            CommissionKind::Level => "level",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(CommissionKind::Direct),
            "level" => Some(CommissionKind::Level),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Paid,
    Missed,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Paid => "paid",
            CommissionStatus::Missed => "missed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CommissionStatus::Pending),
            "paid" => Some(CommissionStatus::Paid),
            "missed" => Some(CommissionStatus::Missed),
            _ => None,
        }
    }
}

/// Why a commission could not be delivered to its intended recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedReason {
    /// Recipient's placement is inactive.
    AccountInactivity,
    /// Recipient has not reached the paid slot level.
    LevelAdvancement,
    /// No ancestor exists at the level (tree not deep enough / payer is root).
    NoUpline,
}

impl MissedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissedReason::AccountInactivity => "account_inactivity",
            MissedReason::LevelAdvancement => "level_advancement",
            MissedReason::NoUpline => "no_upline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "account_inactivity" => Some(MissedReason::AccountInactivity),
            "level_advancement" => Some(MissedReason::LevelAdvancement),
            "no_upline" => Some(MissedReason::NoUpline),
            _ => None,
        }
    }
}

/// One allocation of money from a paying user to a receiving upline user.
///
/// A missed commission keeps its intended amount and reason; it is routed to
/// the missed-profit fund and later accumulated, never discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub id: i64,
    pub tx_hash: TxHash,
    pub program: Program,
    pub slot_no: i64,
    pub payer: UserId,
    /// None when no ancestor existed at the level.
    pub recipient: Option<UserId>,
    pub amount: Amount,
    pub currency: String,
    pub kind: CommissionKind,
    /// Upline level this allocation targets (1-based; 0 for direct pool).
    pub level: i64,
    pub status: CommissionStatus,
    pub missed_reason: Option<MissedReason>,
    /// Set once a missed commission has been swept by the recovery router.
    pub is_accumulated: bool,
    pub created_at: TimeMs,
}
