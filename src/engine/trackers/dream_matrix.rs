//! Dream Matrix tracker: rewards users whose matrix trees complete.
//!
//! Eligibility requires three direct matrix partners. On each completed
//! tree the user accrues a fixed percentage of the slot price.

use crate::db::Repository;
use crate::domain::{catalog, BonusKind, EligibilityReport, Program, TimeMs, UserId};
use crate::error::EngineError;

pub const KIND: BonusKind = BonusKind::DreamMatrix;

pub const FUND_PROGRAM: Program = Program::Matrix;

pub async fn check_eligibility(
    repo: &Repository,
    user: &UserId,
    now: TimeMs,
) -> Result<EligibilityReport, EngineError> {
    let rec = repo.get_tracker_or_empty(user, KIND).await?;
    let directs = repo.count_direct_partners(user, Program::Matrix).await?;

    let eligible = directs >= catalog::DREAM_MATRIX_DIRECTS;
    let reasons = if eligible {
        vec![format!("{} direct matrix partners", directs)]
    } else {
        vec![format!(
            "{} of {} required direct matrix partners",
            directs,
            catalog::DREAM_MATRIX_DIRECTS
        )]
    };

    super::persist_report(repo, rec, eligible, reasons, None, now).await
}

/// Accrue the completion reward when one of the user's matrix trees fills.
/// No-op for users who have not reached eligibility.
pub async fn on_tree_complete(
    repo: &Repository,
    user: &UserId,
    slot_no: i64,
    today: &str,
) -> Result<(), EngineError> {
    let mut rec = repo.get_tracker_or_empty(user, KIND).await?;
    if !rec.is_eligible {
        return Ok(());
    }

    let price = match catalog::slot_price(Program::Matrix, slot_no) {
        Some(p) => p,
        None => return Ok(()),
    };
    let reward = price.percent(catalog::DREAM_MATRIX_COMPLETION_PCT);

    super::accrue(repo, &mut rec, reward, None, today).await
}
