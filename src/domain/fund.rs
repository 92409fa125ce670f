//! Bonus fund ledger entries.

use serde::{Deserialize, Serialize};

use super::{Amount, Program};

/// Bonus program a fund or tracker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusKind {
    Spark,
    LeadershipStipend,
    DreamMatrix,
    Mentorship,
    NewcomerSupport,
    MissedProfit,
}

impl BonusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BonusKind::Spark => "spark",
            BonusKind::LeadershipStipend => "leadership_stipend",
            BonusKind::DreamMatrix => "dream_matrix",
            BonusKind::Mentorship => "mentorship",
            BonusKind::NewcomerSupport => "newcomer_support",
            BonusKind::MissedProfit => "missed_profit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "spark" => Some(BonusKind::Spark),
            "leadership_stipend" => Some(BonusKind::LeadershipStipend),
            "dream_matrix" => Some(BonusKind::DreamMatrix),
            "mentorship" => Some(BonusKind::Mentorship),
            "newcomer_support" => Some(BonusKind::NewcomerSupport),
            "missed_profit" => Some(BonusKind::MissedProfit),
            _ => None,
        }
    }

    pub fn all() -> &'static [BonusKind] {
        &[
            BonusKind::Spark,
            BonusKind::LeadershipStipend,
            BonusKind::DreamMatrix,
            BonusKind::Mentorship,
            BonusKind::NewcomerSupport,
            BonusKind::MissedProfit,
        ]
    }
}

impl std::fmt::Display for BonusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Running (collected, distributed) pair for one (bonus, program) fund.
///
/// `available = collected - distributed` and is never negative; a
/// distribution that would drive it negative is rejected at update time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusFund {
    pub kind: BonusKind,
    pub program: Program,
    pub total_collected: Amount,
    pub total_distributed: Amount,
}

impl BonusFund {
    pub fn empty(kind: BonusKind, program: Program) -> Self {
        BonusFund {
            kind,
            program,
            total_collected: Amount::zero(),
            total_distributed: Amount::zero(),
        }
    }

    pub fn available(&self) -> Amount {
        self.total_collected - self.total_distributed
    }

    pub fn can_cover(&self, amount: Amount) -> bool {
        self.available() >= amount
    }
}
