//! Daily calculation batch.
//!
//! Runs once per UTC day: refreshes every tracker's eligibility from current
//! facts, accrues the leadership stipend daily return, pays pending
//! mentorship and dream-matrix balances from their funds, and spreads the
//! newcomer support fund equally and the spark fund by global tier across
//! their eligible holders. The (day, job) claim row makes re-triggering a
//! day a no-op that replays the recorded tallies.

use rust_decimal::Decimal as RustDecimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{catalog, Amount, BonusKind, Program, TimeMs, UserId};
use crate::engine::trackers::{self, dream_matrix, leadership_stipend, mentorship, newcomer_support, spark};
use crate::error::EngineError;

const DAILY_JOB: &str = "daily";

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub day: String,
    /// True when this day already ran and the tallies are replayed.
    pub replayed: bool,
    pub users_processed: i64,
    pub stipend_accrued: Amount,
    pub total_paid: Amount,
    pub skipped: Vec<String>,
}

/// Run the daily cycle for the day `as_of` falls on.
pub async fn run_daily(
    repo: &Repository,
    config: &Config,
    as_of: TimeMs,
) -> Result<DailyReport, EngineError> {
    let day = as_of.utc_day();

    if !repo.claim_batch_run(&day, DAILY_JOB, as_of).await? {
        let (users_processed, total_paid) = repo
            .get_batch_run(&day, DAILY_JOB)
            .await?
            .unwrap_or((0, Amount::zero()));
        return Ok(DailyReport {
            day,
            replayed: true,
            users_processed,
            stipend_accrued: Amount::zero(),
            total_paid,
            skipped: Vec::new(),
        });
    }

    let mut report = DailyReport {
        day: day.clone(),
        replayed: false,
        users_processed: 0,
        stipend_accrued: Amount::zero(),
        total_paid: Amount::zero(),
        skipped: Vec::new(),
    };

    // Eligibility first, so today's facts drive today's distribution.
    let users = repo.list_user_ids().await?;
    report.users_processed = users.len() as i64;
    for user in &users {
        for kind in [
            BonusKind::LeadershipStipend,
            BonusKind::DreamMatrix,
            BonusKind::Mentorship,
            BonusKind::NewcomerSupport,
            BonusKind::Spark,
        ] {
            trackers::check_eligibility(repo, config, user, kind, as_of).await?;
        }
    }

    accrue_and_pay_stipend(repo, config, &day, &mut report).await?;

    pay_pending(
        repo,
        config,
        BonusKind::Mentorship,
        mentorship::FUND_PROGRAM,
        &day,
        as_of,
        &mut report,
    )
    .await?;
    pay_pending(
        repo,
        config,
        BonusKind::DreamMatrix,
        dream_matrix::FUND_PROGRAM,
        &day,
        as_of,
        &mut report,
    )
    .await?;

    split_fund(
        repo,
        config,
        BonusKind::NewcomerSupport,
        newcomer_support::FUND_PROGRAM,
        &day,
        as_of,
        &mut report,
    )
    .await?;
    split_spark_fund(repo, config, &day, as_of, &mut report).await?;

    repo.finish_batch_run(&day, DAILY_JOB, report.users_processed, report.total_paid)
        .await?;

    info!(
        day = %report.day,
        users = report.users_processed,
        stipend = %report.stipend_accrued,
        paid = %report.total_paid,
        "daily batch complete"
    );

    Ok(report)
}

/// Accrue the daily stipend return per eligible holder, then pay out as much
/// pending balance as the stipend fund covers.
async fn accrue_and_pay_stipend(
    repo: &Repository,
    config: &Config,
    day: &str,
    report: &mut DailyReport,
) -> Result<(), EngineError> {
    let holders = repo
        .list_eligible_trackers(BonusKind::LeadershipStipend)
        .await?;

    for holder in holders {
        match leadership_stipend::accrue_daily(repo, &holder.user_id, day).await {
            Ok(accrued) => report.stipend_accrued = report.stipend_accrued + accrued,
            // Already accrued today; a rerun inside the same day is a no-op.
            Err(EngineError::CapExceeded(_)) => {}
            Err(e) => return Err(e),
        }

        let mut rec = repo
            .get_tracker_or_empty(&holder.user_id, BonusKind::LeadershipStipend)
            .await?;
        let pending = rec.pending();
        if !pending.is_positive() {
            continue;
        }

        match trackers::pay_out(
            repo,
            config,
            &mut rec,
            leadership_stipend::FUND_PROGRAM,
            pending,
        )
        .await
        {
            Ok(()) => {
                repo.insert_fund_payout(
                    BonusKind::LeadershipStipend,
                    leadership_stipend::FUND_PROGRAM,
                    &holder.user_id,
                    pending,
                    day,
                    TimeMs::now(),
                )
                .await?;
                report.total_paid = report.total_paid + pending;
            }
            Err(EngineError::InsufficientFund { .. }) => {
                // Pending balance outlives the fund; it stays owed.
                report.skipped.push(format!(
                    "stipend for {}: fund cannot cover pending {}",
                    holder.user_id, pending
                ));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Pay each eligible holder's pending balance out of the kind's fund.
#[allow(clippy::too_many_arguments)]
async fn pay_pending(
    repo: &Repository,
    config: &Config,
    kind: BonusKind,
    program: Program,
    day: &str,
    as_of: TimeMs,
    report: &mut DailyReport,
) -> Result<(), EngineError> {
    for holder in repo.list_eligible_trackers(kind).await? {
        let mut rec = repo.get_tracker_or_empty(&holder.user_id, kind).await?;
        let pending = rec.pending();
        if !pending.is_positive() {
            continue;
        }

        match trackers::pay_out(repo, config, &mut rec, program, pending).await {
            Ok(()) => {
                repo.insert_fund_payout(kind, program, &holder.user_id, pending, day, as_of)
                    .await?;
                report.total_paid = report.total_paid + pending;
            }
            Err(EngineError::InsufficientFund { .. }) => {
                // Pending balance outlives the fund; it stays owed.
                report.skipped.push(format!(
                    "{} for {}: fund cannot cover pending {}",
                    kind, holder.user_id, pending
                ));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Spread a fund's full available balance equally across its eligible
/// holders, truncating shares and giving the residual to the last holder.
async fn split_fund(
    repo: &Repository,
    config: &Config,
    kind: BonusKind,
    program: Program,
    day: &str,
    as_of: TimeMs,
    report: &mut DailyReport,
) -> Result<(), EngineError> {
    let holders = repo.list_eligible_trackers(kind).await?;
    let available = repo.get_fund(kind, program).await?.available();

    if holders.is_empty() || !available.is_positive() {
        return Ok(());
    }

    let count = holders.len();
    let divisor = Amount::new(RustDecimal::from(count as i64));
    let base_share = (available / divisor).truncate_money();

    for (i, holder) in holders.iter().enumerate() {
        let share = if i + 1 == count {
            available - base_share * Amount::new(RustDecimal::from((count - 1) as i64))
        } else {
            base_share
        };
        if share.is_zero() {
            continue;
        }

        let mut rec = repo.get_tracker_or_empty(&holder.user_id, kind).await?;
        trackers::accrue(repo, &mut rec, share, None, day).await?;

        match trackers::pay_out(repo, config, &mut rec, program, share).await {
            Ok(()) => {
                repo.insert_fund_payout(kind, program, &holder.user_id, share, day, as_of)
                    .await?;
                report.total_paid = report.total_paid + share;
            }
            Err(EngineError::InsufficientFund { .. }) => {
                // Another writer drained the fund between the read and the
                // payout; the accrual stays pending for a later day.
                warn!(kind = %kind, user = %holder.user_id, "fund drained mid-split");
                report
                    .skipped
                    .push(format!("{} for {}: fund drained mid-split", kind, holder.user_id));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Spread the spark fund across triple-entry holders, weighted by the value
/// of each holder's global slot tier; the truncation residual goes to the
/// last holder.
async fn split_spark_fund(
    repo: &Repository,
    config: &Config,
    day: &str,
    as_of: TimeMs,
    report: &mut DailyReport,
) -> Result<(), EngineError> {
    let kind = BonusKind::Spark;
    let program = spark::FUND_PROGRAM;

    let holders = repo.list_eligible_trackers(kind).await?;
    let available = repo.get_fund(kind, program).await?.available();

    let mut weighted: Vec<(UserId, Amount)> = Vec::new();
    let mut total_weight = Amount::zero();
    for holder in &holders {
        let weight = holder
            .tier_slot
            .and_then(|slot| catalog::slot_price(Program::Global, slot));
        if let Some(weight) = weight {
            total_weight = total_weight + weight;
            weighted.push((holder.user_id.clone(), weight));
        }
    }

    if weighted.is_empty() || !available.is_positive() || !total_weight.is_positive() {
        return Ok(());
    }

    let count = weighted.len();
    let mut allocated = Amount::zero();
    for (i, (user, weight)) in weighted.iter().enumerate() {
        let share = if i + 1 == count {
            available - allocated
        } else {
            let s = (available * *weight / total_weight).truncate_money();
            allocated = allocated + s;
            s
        };
        if share.is_zero() {
            continue;
        }

        let mut rec = repo.get_tracker_or_empty(user, kind).await?;
        trackers::accrue(repo, &mut rec, share, None, day).await?;

        match trackers::pay_out(repo, config, &mut rec, program, share).await {
            Ok(()) => {
                repo.insert_fund_payout(kind, program, user, share, day, as_of)
                    .await?;
                report.total_paid = report.total_paid + share;
            }
            Err(EngineError::InsufficientFund { .. }) => {
                warn!(kind = %kind, user = %user, "fund drained mid-split");
                report
                    .skipped
                    .push(format!("{} for {}: fund drained mid-split", kind, user));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}
