//! Missed-profit recovery router.
//!
//! Missed commission rows collect in the missed-profit fund as they happen;
//! this module runs the two batch legs that recover them. Accumulation
//! sweeps unswept missed rows in a time window, writes one summary per
//! (program, reason) group and moves the money into the leadership stipend
//! fund. Distribution spreads claimed summaries equally across eligible
//! stipend holders, truncating each share and giving the residual to the
//! last recipient so no fraction is lost.

use std::collections::BTreeMap;

use rust_decimal::Decimal as RustDecimal;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::repo::{AccumulationRow, FundWriteOutcome};
use crate::db::Repository;
use crate::domain::{Amount, BonusKind, MissedReason, Program, TimeMs};
use crate::engine::trackers::leadership_stipend;
use crate::error::EngineError;

/// Outcome of one accumulation sweep.
#[derive(Debug, Clone)]
pub struct AccumulateReport {
    pub period_start: TimeMs,
    pub period_end: TimeMs,
    /// Number of missed commission rows swept.
    pub swept: usize,
    /// Number of (program, reason) summary rows written.
    pub groups: usize,
    /// Total amount moved into the stipend fund.
    pub total: Amount,
}

/// Outcome of one distribution run.
#[derive(Debug, Clone)]
pub struct DistributeReport {
    pub period: String,
    /// Number of accumulation pools paid out.
    pub pools: usize,
    pub recipients: usize,
    pub total_distributed: Amount,
    /// Pools or shares that could not be delivered this run, with reasons.
    pub skipped: Vec<String>,
}

/// Sweep missed commissions in `[period_start, period_end)` into
/// accumulation summaries, moving the swept money from the missed-profit
/// fund into the leadership stipend fund.
pub async fn accumulate_missed(
    repo: &Repository,
    config: &Config,
    period_start: TimeMs,
    period_end: TimeMs,
    now: TimeMs,
) -> Result<AccumulateReport, EngineError> {
    let missed = repo
        .query_missed_unaccumulated(period_start, period_end)
        .await?;

    // Group by (program, reason); BTreeMap keeps summary order stable.
    let mut groups: BTreeMap<(&str, &str), (Program, MissedReason, Amount, Vec<i64>)> =
        BTreeMap::new();
    for c in &missed {
        let reason = match c.missed_reason {
            Some(r) => r,
            None => {
                warn!(id = c.id, "missed commission without a reason, skipping");
                continue;
            }
        };
        let entry = groups
            .entry((c.program.as_str(), reason.as_str()))
            .or_insert((c.program, reason, Amount::zero(), Vec::new()));
        entry.2 = entry.2 + c.amount;
        entry.3.push(c.id);
    }

    let mut total = Amount::zero();
    let group_count = groups.len();
    let mut swept = 0usize;

    for (program, reason, group_total, ids) in groups.into_values() {
        repo.insert_missed_accumulation(
            program,
            reason,
            period_start,
            period_end,
            group_total,
            ids.len() as i64,
            now,
        )
        .await?;
        repo.mark_commissions_accumulated(&ids).await?;
        swept += ids.len();

        // Move the swept money between funds. An insufficient source means
        // an earlier partial run already moved part of this window; the
        // summary row still records the full group for distribution.
        match repo
            .fund_try_distribute(
                BonusKind::MissedProfit,
                program,
                group_total,
                config.write_retry_limit,
            )
            .await?
        {
            FundWriteOutcome::Applied => {
                match repo
                    .fund_contribute(
                        BonusKind::LeadershipStipend,
                        program,
                        group_total,
                        config.write_retry_limit,
                    )
                    .await?
                {
                    FundWriteOutcome::Conflict => return Err(EngineError::WriteConflict),
                    _ => {}
                }
                total = total + group_total;
            }
            FundWriteOutcome::Insufficient => {
                warn!(
                    program = %program,
                    reason = %reason.as_str(),
                    amount = %group_total,
                    "missed-profit fund cannot cover group, leaving in place"
                );
            }
            FundWriteOutcome::Conflict => return Err(EngineError::WriteConflict),
        }
    }

    info!(
        swept,
        groups = group_count,
        total = %total,
        "missed-profit accumulation complete"
    );

    Ok(AccumulateReport {
        period_start,
        period_end,
        swept,
        groups: group_count,
        total,
    })
}

/// Spread claimed accumulation pools equally across eligible leadership
/// stipend holders.
pub async fn distribute_accumulated(
    repo: &Repository,
    config: &Config,
    period: &str,
    now: TimeMs,
) -> Result<DistributeReport, EngineError> {
    let eligible = repo
        .list_eligible_trackers(BonusKind::LeadershipStipend)
        .await?;

    let mut report = DistributeReport {
        period: period.to_string(),
        pools: 0,
        recipients: eligible.len(),
        total_distributed: Amount::zero(),
        skipped: Vec::new(),
    };

    if eligible.is_empty() {
        report
            .skipped
            .push("no eligible stipend holders, pools left undistributed".to_string());
        return Ok(report);
    }

    let pending = repo.query_undistributed_accumulations().await?;

    for pool in pending {
        // Verify coverage before claiming so a claim never strands money.
        let fund = repo
            .get_fund(BonusKind::LeadershipStipend, pool.program)
            .await?;
        if !fund.can_cover(pool.total) {
            report.skipped.push(format!(
                "pool {} ({}, {}): stipend fund cannot cover {}",
                pool.id,
                pool.program,
                pool.reason.as_str(),
                pool.total
            ));
            continue;
        }

        if !repo.try_claim_accumulation(pool.id).await? {
            continue;
        }

        let paid = pay_pool(repo, config, &pool, &eligible, period, now, &mut report).await?;
        report.pools += 1;
        report.total_distributed = report.total_distributed + paid;
    }

    info!(
        period,
        pools = report.pools,
        recipients = report.recipients,
        total = %report.total_distributed,
        "missed-profit distribution complete"
    );

    Ok(report)
}

/// Pay one claimed pool out in equal shares. Shares a recipient's daily cap
/// rejects stay in the stipend fund.
async fn pay_pool(
    repo: &Repository,
    config: &Config,
    pool: &AccumulationRow,
    eligible: &[crate::domain::TrackerRecord],
    period: &str,
    now: TimeMs,
    report: &mut DistributeReport,
) -> Result<Amount, EngineError> {
    let count = eligible.len();
    let divisor = Amount::new(RustDecimal::from(count as i64));
    let base_share = (pool.total / divisor).truncate_money();

    let mut paid_total = Amount::zero();

    for (i, rec) in eligible.iter().enumerate() {
        let share = if i + 1 == count {
            pool.total - base_share * Amount::new(RustDecimal::from((count - 1) as i64))
        } else {
            base_share
        };
        if share.is_zero() {
            continue;
        }

        match leadership_stipend::accrue_amount(repo, &rec.user_id, share, &now.utc_day()).await {
            Ok(()) => {}
            Err(EngineError::CapExceeded(_)) => {
                report.skipped.push(format!(
                    "pool {}: {} at daily cap, share {} retained",
                    pool.id, rec.user_id, share
                ));
                continue;
            }
            Err(e) => return Err(e),
        }

        let mut fresh = repo
            .get_tracker_or_empty(&rec.user_id, BonusKind::LeadershipStipend)
            .await?;
        super::trackers::pay_out(repo, config, &mut fresh, pool.program, share).await?;
        repo.insert_fund_payout(
            BonusKind::LeadershipStipend,
            pool.program,
            &rec.user_id,
            share,
            period,
            now,
        )
        .await?;

        paid_total = paid_total + share;
    }

    Ok(paid_total)
}
