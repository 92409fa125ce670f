//! The join/upgrade pipeline.
//!
//! One verified payment drives the whole sequence: sequencing and price
//! checks, tree placement, commission fan-out, completion processing, and
//! eligibility refreshes for the trackers the join can affect. The
//! transaction hash is the idempotency key; a replayed hash returns the
//! recorded outcome without re-running any side effect.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::db::repo::JoinEventRow;
use crate::db::Repository;
use crate::domain::{
    catalog, Amount, BonusFund, BonusKind, Commission, Program, TimeMs, TxHash, UserId,
};
use crate::engine::{self, RecycleEvent};
use crate::error::EngineError;

/// A verified payment event requesting a join or slot upgrade.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRequest {
    pub tx_hash: TxHash,
    pub user_id: UserId,
    /// Overrides the user's stored sponsor for this placement when given.
    pub sponsor_id: Option<UserId>,
    pub program: Program,
    pub slot_no: i64,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinOutcome {
    /// True when the tx hash was seen before and this is the recorded result.
    pub replayed: bool,
    pub placement_id: i64,
    pub level: i64,
    pub position: i64,
    pub commissions: Vec<Commission>,
    pub total_paid: Amount,
    pub total_missed: Amount,
    pub fund_balances: Vec<BonusFund>,
    pub recycles: Vec<RecycleEvent>,
}

/// Process one join/upgrade payment end to end.
pub async fn process_join(
    repo: &Repository,
    config: &Config,
    req: &JoinRequest,
    now: TimeMs,
) -> Result<JoinOutcome, EngineError> {
    if let Some(prior) = repo.get_join_event(&req.tx_hash).await? {
        return replay(repo, prior).await;
    }

    let user = repo
        .get_user(&req.user_id)
        .await?
        .ok_or_else(|| EngineError::UnknownUser(req.user_id.clone()))?;

    if req.slot_no == 1 {
        if !user.may_join(req.program) {
            // may_join only fails when a prerequisite exists and is unmet.
            let required = req
                .program
                .prerequisite()
                .unwrap_or(req.program);
            return Err(EngineError::SequencingViolation {
                required,
                requested: req.program,
            });
        }
    } else if !user.has_joined(req.program) {
        // Upgrades presuppose membership; the base slot comes first.
        return Err(EngineError::SequencingViolation {
            required: req.program,
            requested: req.program,
        });
    }

    let expected = catalog::slot_price(req.program, req.slot_no).ok_or(
        EngineError::UnknownSlot {
            program: req.program,
            slot_no: req.slot_no,
        },
    )?;
    if req.amount != expected {
        return Err(EngineError::PriceMismatch {
            program: req.program,
            slot_no: req.slot_no,
            expected: expected.to_canonical_string(),
            got: req.amount.to_canonical_string(),
        });
    }

    let sponsor = req.sponsor_id.clone().or_else(|| user.sponsor_id.clone());

    let placed = engine::place(
        repo,
        config,
        &req.user_id,
        sponsor.as_ref(),
        req.program,
        req.slot_no,
        now,
    )
    .await?;

    if req.slot_no == 1 {
        repo.mark_program_joined(&req.user_id, req.program, now)
            .await?;
        refresh_after_first_join(repo, config, &req.user_id, sponsor.as_ref(), req.program, now)
            .await?;
    }

    // A binary slot purchase can cross the stipend threshold.
    if req.program == Program::Binary {
        engine::trackers::check_eligibility(
            repo,
            config,
            &req.user_id,
            BonusKind::LeadershipStipend,
            now,
        )
        .await?;
    }

    let distribution = engine::distribute_payment(
        repo,
        config,
        &req.tx_hash,
        &req.user_id,
        req.program,
        req.slot_no,
        req.amount,
        now,
    )
    .await?;

    let recycles = engine::process_completions(
        repo,
        config,
        req.program,
        placed.completed_subtrees.clone(),
        now,
    )
    .await?;

    let recorded = repo
        .record_join_event(
            &req.tx_hash,
            &req.user_id,
            req.program,
            req.slot_no,
            req.amount,
            placed.placement.id,
            now,
        )
        .await?;
    if !recorded {
        // Lost the idempotency race after doing the work; the recorded
        // outcome belongs to the winner.
        if let Some(prior) = repo.get_join_event(&req.tx_hash).await? {
            return replay(repo, prior).await;
        }
    }

    info!(
        tx = %req.tx_hash,
        user = %req.user_id,
        program = %req.program,
        slot = req.slot_no,
        placement = placed.placement.id,
        recycles = recycles.len(),
        "join processed"
    );

    Ok(JoinOutcome {
        replayed: false,
        placement_id: placed.placement.id,
        level: placed.placement.level,
        position: placed.placement.position,
        commissions: distribution.commissions,
        total_paid: distribution.total_paid,
        total_missed: distribution.total_missed,
        fund_balances: repo.list_funds(req.program).await?,
        recycles,
    })
}

/// Rebuild the outcome of an already processed payment from its records.
async fn replay(repo: &Repository, prior: JoinEventRow) -> Result<JoinOutcome, EngineError> {
    let commissions = repo.query_commissions_by_tx(&prior.tx_hash).await?;
    let mut total_paid = Amount::zero();
    let mut total_missed = Amount::zero();
    for c in &commissions {
        match c.status {
            crate::domain::CommissionStatus::Paid => total_paid = total_paid + c.amount,
            crate::domain::CommissionStatus::Missed => total_missed = total_missed + c.amount,
            crate::domain::CommissionStatus::Pending => {}
        }
    }

    let placement = repo.get_placement(prior.placement_id).await?;
    let (level, position) = placement
        .map(|p| (p.level, p.position))
        .unwrap_or((0, 0));

    Ok(JoinOutcome {
        replayed: true,
        placement_id: prior.placement_id,
        level,
        position,
        commissions,
        total_paid,
        total_missed,
        fund_balances: repo.list_funds(prior.program).await?,
        recycles: Vec::new(),
    })
}

/// Refresh the trackers a first join into a program can flip.
async fn refresh_after_first_join(
    repo: &Repository,
    config: &Config,
    user: &UserId,
    sponsor: Option<&UserId>,
    program: Program,
    now: TimeMs,
) -> Result<(), EngineError> {
    // The joiner may have become triple entry.
    engine::trackers::check_eligibility(repo, config, user, BonusKind::Spark, now).await?;

    // The sponsor's direct-partner counts moved.
    if let Some(sponsor) = sponsor {
        match program {
            Program::Binary => {
                engine::trackers::check_eligibility(
                    repo,
                    config,
                    sponsor,
                    BonusKind::Mentorship,
                    now,
                )
                .await?;
                engine::trackers::check_eligibility(
                    repo,
                    config,
                    sponsor,
                    BonusKind::NewcomerSupport,
                    now,
                )
                .await?;
            }
            Program::Matrix => {
                engine::trackers::check_eligibility(
                    repo,
                    config,
                    sponsor,
                    BonusKind::DreamMatrix,
                    now,
                )
                .await?;
            }
            Program::Global => {}
        }
    }

    Ok(())
}
