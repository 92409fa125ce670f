//! Mentorship tracker: sponsors earn a cut of their direct partners' level
//! commissions once they hold two direct binary partners.

use crate::db::Repository;
use crate::domain::{catalog, Amount, BonusKind, EligibilityReport, Program, TimeMs, UserId};
use crate::error::EngineError;

pub const KIND: BonusKind = BonusKind::Mentorship;

pub const FUND_PROGRAM: Program = Program::Binary;

pub async fn check_eligibility(
    repo: &Repository,
    user: &UserId,
    now: TimeMs,
) -> Result<EligibilityReport, EngineError> {
    let rec = repo.get_tracker_or_empty(user, KIND).await?;
    let directs = repo.count_direct_partners(user, Program::Binary).await?;

    let eligible = directs >= catalog::MENTORSHIP_DIRECTS;
    let reasons = if eligible {
        vec![format!("{} direct binary partners", directs)]
    } else {
        vec![format!(
            "{} of {} required direct binary partners",
            directs,
            catalog::MENTORSHIP_DIRECTS
        )]
    };

    super::persist_report(repo, rec, eligible, reasons, None, now).await
}

/// A direct partner earned a level commission; accrue the mentor's cut.
/// No-op when the mentor has not reached eligibility.
pub async fn on_partner_commission(
    repo: &Repository,
    mentor: &UserId,
    commission_amount: Amount,
    today: &str,
) -> Result<(), EngineError> {
    let mut rec = repo.get_tracker_or_empty(mentor, KIND).await?;
    if !rec.is_eligible {
        return Ok(());
    }

    let cut = commission_amount.percent(catalog::MENTORSHIP_PCT);
    if cut.is_zero() {
        return Ok(());
    }

    super::accrue(repo, &mut rec, cut, None, today).await
}
