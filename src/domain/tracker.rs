//! Per-user eligibility and accumulation state for the bonus programs.

use serde::{Deserialize, Serialize};

use super::{Amount, BonusKind, TimeMs, UserId};

/// One user's ledger for one bonus program. Historical; never deleted.
///
/// `pending = total_earned - total_paid` at all times. `earned_today` is the
/// accrual bucket the daily cap applies to; the daily batch rolls it over by
/// comparing `last_calc_day` with the current UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerRecord {
    pub user_id: UserId,
    pub kind: BonusKind,
    pub is_eligible: bool,
    pub tier_name: Option<String>,
    pub tier_slot: Option<i64>,
    pub total_earned: Amount,
    pub total_paid: Amount,
    pub earned_today: Amount,
    pub last_calc_day: Option<String>,
    pub qualified_at: Option<TimeMs>,
}

impl TrackerRecord {
    pub fn empty(user_id: UserId, kind: BonusKind) -> Self {
        TrackerRecord {
            user_id,
            kind,
            is_eligible: false,
            tier_name: None,
            tier_slot: None,
            total_earned: Amount::zero(),
            total_paid: Amount::zero(),
            earned_today: Amount::zero(),
            last_calc_day: None,
            qualified_at: None,
        }
    }

    pub fn pending(&self) -> Amount {
        self.total_earned - self.total_paid
    }
}

/// Result of `check_eligibility`: the refreshed flags plus the facts that
/// produced them, for the adapter layer to surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub kind: BonusKind,
    pub is_eligible: bool,
    pub reasons: Vec<String>,
    pub current_tier: Option<String>,
    pub pending_amount: Amount,
}
