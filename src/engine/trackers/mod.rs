//! Eligibility & accumulation trackers, one per bonus program.
//!
//! All variants share the same contract:
//! - `check_eligibility` recomputes the flags from current facts and
//!   persists the refreshed record; repeatable with no other side effects.
//! - `accrue` adds to earned/pending and *rejects* accrual past the daily
//!   cap so callers can detect and route overflow.
//! - `pay_out` atomically moves money from the bonus fund into the
//!   tracker's paid total.

pub mod dream_matrix;
pub mod leadership_stipend;
pub mod mentorship;
pub mod newcomer_support;
pub mod spark;

use crate::config::Config;
use crate::db::repo::FundWriteOutcome;
use crate::db::Repository;
use crate::domain::{Amount, BonusKind, EligibilityReport, Program, TimeMs, TrackerRecord, UserId};
use crate::error::EngineError;

/// Reset the daily accrual bucket when the calendar day has moved on.
fn rollover_day(rec: &mut TrackerRecord, today: &str) {
    if rec.last_calc_day.as_deref() != Some(today) {
        rec.earned_today = Amount::zero();
        rec.last_calc_day = Some(today.to_string());
    }
}

/// Add `amount` to a tracker's earned/pending totals.
///
/// With a cap, the accrual is rejected outright (not clamped) when it would
/// push the day's earnings past the cap; the caller decides where the
/// overflow goes.
pub async fn accrue(
    repo: &Repository,
    rec: &mut TrackerRecord,
    amount: Amount,
    daily_cap: Option<Amount>,
    today: &str,
) -> Result<(), EngineError> {
    rollover_day(rec, today);

    if let Some(cap) = daily_cap {
        if rec.earned_today + amount > cap {
            return Err(EngineError::CapExceeded(rec.kind));
        }
    }

    rec.earned_today = rec.earned_today + amount;
    rec.total_earned = rec.total_earned + amount;
    repo.upsert_tracker(rec).await?;

    Ok(())
}

/// Move `amount` from the bonus fund into the tracker's paid total.
///
/// Fails atomically: on an insufficient fund (or an amount beyond the
/// pending balance) nothing is transferred.
pub async fn pay_out(
    repo: &Repository,
    config: &Config,
    rec: &mut TrackerRecord,
    program: Program,
    amount: Amount,
) -> Result<(), EngineError> {
    if amount > rec.pending() {
        return Err(EngineError::InsufficientFund {
            kind: rec.kind,
            program,
        });
    }

    match repo
        .fund_try_distribute(rec.kind, program, amount, config.write_retry_limit)
        .await?
    {
        FundWriteOutcome::Applied => {}
        FundWriteOutcome::Insufficient => {
            return Err(EngineError::InsufficientFund {
                kind: rec.kind,
                program,
            })
        }
        FundWriteOutcome::Conflict => return Err(EngineError::WriteConflict),
    }

    rec.total_paid = rec.total_paid + amount;
    repo.upsert_tracker(rec).await?;

    Ok(())
}

/// Recompute eligibility for one (user, bonus) pair.
pub async fn check_eligibility(
    repo: &Repository,
    config: &Config,
    user: &UserId,
    kind: BonusKind,
    now: TimeMs,
) -> Result<EligibilityReport, EngineError> {
    match kind {
        BonusKind::LeadershipStipend => leadership_stipend::check_eligibility(repo, user, now).await,
        BonusKind::DreamMatrix => dream_matrix::check_eligibility(repo, user, now).await,
        BonusKind::Mentorship => mentorship::check_eligibility(repo, user, now).await,
        BonusKind::NewcomerSupport => newcomer_support::check_eligibility(repo, user, now).await,
        BonusKind::Spark => spark::check_eligibility(repo, user, now).await,
        BonusKind::MissedProfit => {
            // Missed profit has no per-user eligibility; it is a routing fund.
            let _ = config;
            let rec = repo.get_tracker_or_empty(user, kind).await?;
            Ok(EligibilityReport {
                kind,
                is_eligible: false,
                reasons: vec!["missed profit is routed, not opted into".to_string()],
                current_tier: None,
                pending_amount: rec.pending(),
            })
        }
    }
}

/// Persist refreshed flags and build the caller-facing report.
async fn persist_report(
    repo: &Repository,
    mut rec: TrackerRecord,
    is_eligible: bool,
    reasons: Vec<String>,
    tier: Option<(String, i64)>,
    now: TimeMs,
) -> Result<EligibilityReport, EngineError> {
    if is_eligible && !rec.is_eligible {
        rec.qualified_at = Some(now);
    }
    rec.is_eligible = is_eligible;
    match tier {
        Some((name, slot)) => {
            rec.tier_name = Some(name);
            rec.tier_slot = Some(slot);
        }
        None => {
            rec.tier_name = None;
            rec.tier_slot = None;
        }
    }
    repo.upsert_tracker(&rec).await?;

    Ok(EligibilityReport {
        kind: rec.kind,
        is_eligible,
        reasons,
        current_tier: rec.tier_name.clone(),
        pending_amount: rec.pending(),
    })
}
