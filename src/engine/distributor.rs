//! Level Commission Distributor.
//!
//! Turns one payment event into a set of commission rows across the payer's
//! upline chain. The payment splits into a direct pool (level-1 upline) and
//! a level pool spread over the program's fixed percentage table; shares
//! that cannot be delivered become `missed` rows routed to the missed-profit
//! fund, never dropped. All arithmetic is fixed-point; the truncation
//! residual lands on the last level so the rows reconcile exactly to the
//! payment amount. Each payment also feeds the program's bonus funds by a
//! fixed collection percentage, collected alongside the fan-out rather than
//! carved out of it.

use tracing::debug;

use crate::config::Config;
use crate::db::repo::FundWriteOutcome;
use crate::db::Repository;
use crate::domain::{
    catalog, Amount, BonusKind, Commission, CommissionKind, CommissionStatus, MissedReason,
    Program, TimeMs, TreePlacement, TxHash, UserId,
};
use crate::engine::trackers::mentorship;
use crate::error::EngineError;

/// Everything one payment event produced.
#[derive(Debug, Clone)]
pub struct DistributionOutcome {
    pub commissions: Vec<Commission>,
    pub total_paid: Amount,
    pub total_missed: Amount,
}

/// Fan a payment out across the payer's upline chain.
///
/// The chain is resolved from the payer's base (slot 1) placement in the
/// program; delivering a share for `slot_no` additionally requires the
/// recipient to hold that slot actively.
pub async fn distribute_payment(
    repo: &Repository,
    config: &Config,
    tx_hash: &TxHash,
    payer: &UserId,
    program: Program,
    slot_no: i64,
    amount: Amount,
    now: TimeMs,
) -> Result<DistributionOutcome, EngineError> {
    let base_placement = repo.get_active_placement(payer, program, 1).await?;

    let upline = match &base_placement {
        Some(p) => repo.upline_chain(p.id, catalog::max_levels(program)).await?,
        // Program root: the whole fan-out is missed and accumulated.
        None => Vec::new(),
    };

    let direct_pool = amount.percent(catalog::direct_pct(program));
    let level_pool = amount - direct_pool;

    let mut commissions = Vec::new();

    // Direct pool goes to the nearest upline. A tie for the target level
    // cannot arise (one parent per level); nearest wins by construction.
    commissions.push(
        build_allocation(
            repo, tx_hash, payer, program, slot_no, CommissionKind::Direct, 0, direct_pool,
            upline.first(),
            now,
        )
        .await?,
    );

    let percents = catalog::level_percents(program);
    let mut allocated = Amount::zero();
    for (i, pct) in percents.iter().enumerate() {
        let is_last = i + 1 == percents.len();
        let share = if is_last {
            level_pool - allocated
        } else {
            let s = level_pool.percent(*pct);
            allocated = allocated + s;
            s
        };

        commissions.push(
            build_allocation(
                repo,
                tx_hash,
                payer,
                program,
                slot_no,
                CommissionKind::Level,
                (i + 1) as i64,
                share,
                upline.get(i),
                now,
            )
            .await?,
        );
    }

    let mut total_paid = Amount::zero();
    let mut total_missed = Amount::zero();

    for commission in &mut commissions {
        let id = repo.insert_commission(commission).await?;
        commission.id = id;

        match commission.status {
            CommissionStatus::Paid => {
                total_paid = total_paid + commission.amount;

                // Level earnings feed the recipient's mentor.
                if commission.kind == CommissionKind::Level {
                    if let Some(recipient) = &commission.recipient {
                        if let Some(mentor) = repo
                            .get_user(recipient)
                            .await?
                            .and_then(|u| u.sponsor_id)
                        {
                            mentorship::on_partner_commission(
                                repo,
                                &mentor,
                                commission.amount,
                                &now.utc_day(),
                            )
                            .await?;
                        }
                    }
                }
            }
            CommissionStatus::Missed => {
                total_missed = total_missed + commission.amount;
            }
            CommissionStatus::Pending => {}
        }
    }

    if total_missed.is_positive() {
        let outcome = repo
            .fund_contribute(
                BonusKind::MissedProfit,
                program,
                total_missed,
                config.write_retry_limit,
            )
            .await?;
        if outcome == FundWriteOutcome::Conflict {
            return Err(EngineError::WriteConflict);
        }
    }

    // Program-tied bonus funds collect their share of the payment.
    for (kind, pct) in catalog::fund_collections(program) {
        let collected = amount.percent(*pct);
        if !collected.is_positive() {
            continue;
        }
        let outcome = repo
            .fund_contribute(*kind, program, collected, config.write_retry_limit)
            .await?;
        if outcome == FundWriteOutcome::Conflict {
            return Err(EngineError::WriteConflict);
        }
    }

    debug!(
        tx = %tx_hash,
        program = %program,
        slot = slot_no,
        paid = %total_paid,
        missed = %total_missed,
        "payment fanned out"
    );

    Ok(DistributionOutcome {
        commissions,
        total_paid,
        total_missed,
    })
}

/// Decide recipient and status for one share of the payment.
#[allow(clippy::too_many_arguments)]
async fn build_allocation(
    repo: &Repository,
    tx_hash: &TxHash,
    payer: &UserId,
    program: Program,
    slot_no: i64,
    kind: CommissionKind,
    level: i64,
    share: Amount,
    ancestor: Option<&TreePlacement>,
    now: TimeMs,
) -> Result<Commission, EngineError> {
    let (recipient, status, reason) = match ancestor {
        None => (None, CommissionStatus::Missed, Some(MissedReason::NoUpline)),
        Some(node) if !node.active => (
            Some(node.user_id.clone()),
            CommissionStatus::Missed,
            Some(MissedReason::AccountInactivity),
        ),
        Some(node) => {
            // Upgrades only pay uplines who already own the slot.
            let owns_slot = slot_no == 1
                || repo
                    .get_active_placement(&node.user_id, program, slot_no)
                    .await?
                    .is_some();
            if owns_slot {
                (Some(node.user_id.clone()), CommissionStatus::Paid, None)
            } else {
                (
                    Some(node.user_id.clone()),
                    CommissionStatus::Missed,
                    Some(MissedReason::LevelAdvancement),
                )
            }
        }
    };

    Ok(Commission {
        id: 0,
        tx_hash: tx_hash.clone(),
        program,
        slot_no,
        payer: payer.clone(),
        recipient,
        amount: share,
        currency: catalog::CURRENCY.to_string(),
        kind,
        level,
        status,
        missed_reason: reason,
        is_accumulated: false,
        created_at: now,
    })
}
