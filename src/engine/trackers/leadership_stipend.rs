//! Leadership Stipend tracker.
//!
//! Eligibility starts at binary slot 10 (LEADER) and the tier follows the
//! highest active binary slot. The daily return cap is exactly double the
//! tier slot's value; accrual past the cap is rejected so the overflow can
//! be routed, never silently clamped.

use crate::db::Repository;
use crate::domain::{catalog, Amount, BonusKind, EligibilityReport, Program, TimeMs, UserId};
use crate::error::EngineError;

pub const KIND: BonusKind = BonusKind::LeadershipStipend;

/// Fund program the stipend draws from: stipend tiers are binary slots.
pub const FUND_PROGRAM: Program = Program::Binary;

pub async fn check_eligibility(
    repo: &Repository,
    user: &UserId,
    now: TimeMs,
) -> Result<EligibilityReport, EngineError> {
    let rec = repo.get_tracker_or_empty(user, KIND).await?;
    let max_slot = repo.max_active_slot(user, Program::Binary).await?;

    let (eligible, reasons, tier) = match max_slot.map(|s| (s, catalog::stipend_tier(s))) {
        Some((slot, Some((name, cap)))) => (
            true,
            vec![
                format!("binary slot {} reached", slot),
                format!("tier {} daily return {}", name, cap),
            ],
            Some((name.to_string(), slot)),
        ),
        Some((slot, None)) => (
            false,
            vec![format!(
                "binary slot {} below stipend threshold {}",
                slot,
                catalog::STIPEND_MIN_SLOT
            )],
            None,
        ),
        None => (false, vec!["no active binary placement".to_string()], None),
    };

    super::persist_report(repo, rec, eligible, reasons, tier, now).await
}

/// Daily cap for the user's current tier, if they hold one.
pub async fn daily_cap(repo: &Repository, user: &UserId) -> Result<Option<Amount>, EngineError> {
    let rec = repo.get_tracker_or_empty(user, KIND).await?;
    Ok(rec
        .tier_slot
        .and_then(catalog::stipend_tier)
        .map(|(_, cap)| cap))
}

/// Accrue one day's stipend return (the full cap) for an eligible user.
///
/// Returns the accrued amount; a second accrual on the same day fails with
/// `CapExceeded` until the next calculation cycle.
pub async fn accrue_daily(
    repo: &Repository,
    user: &UserId,
    today: &str,
) -> Result<Amount, EngineError> {
    let mut rec = repo.get_tracker_or_empty(user, KIND).await?;
    if !rec.is_eligible {
        return Ok(Amount::zero());
    }

    let cap = match rec.tier_slot.and_then(catalog::stipend_tier) {
        Some((_, cap)) => cap,
        None => return Ok(Amount::zero()),
    };

    super::accrue(repo, &mut rec, cap, Some(cap), today).await?;
    Ok(cap)
}

/// Accrue an arbitrary stipend amount against the daily cap (used by the
/// missed-profit redistribution path).
pub async fn accrue_amount(
    repo: &Repository,
    user: &UserId,
    amount: Amount,
    today: &str,
) -> Result<(), EngineError> {
    let mut rec = repo.get_tracker_or_empty(user, KIND).await?;
    let cap = rec.tier_slot.and_then(catalog::stipend_tier).map(|(_, c)| c);
    super::accrue(repo, &mut rec, amount, cap, today).await
}
