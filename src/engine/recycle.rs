//! Recycle and phase manager.
//!
//! Consumes subtree-completion signals produced by placement and turns them
//! into the next structure for the owner: matrix trees recycle into a fresh
//! instance of the same slot, global placements advance through phases and
//! slots. Advancement can itself fill another rotation head, so completions
//! are processed through an explicit worklist rather than recursion.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::db::repo::NewPlacement;
use crate::db::Repository;
use crate::domain::{catalog, Program, TimeMs, UserId};
use crate::engine::trackers::{dream_matrix, spark};
use crate::error::EngineError;

/// What happened to the owner of a completed subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RecycleAction {
    /// Matrix: a fresh tree instance of the same slot was opened.
    Recycled { instance: i64 },
    /// Global: the owner moved to this (slot, phase).
    Advanced { slot_no: i64, phase: i64 },
    /// Global: the last phase of the last slot completed; nothing follows.
    Terminal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecycleEvent {
    pub user_id: UserId,
    pub program: Program,
    pub slot_no: i64,
    pub action: RecycleAction,
}

/// Process completion claims for the given placement ids, following any
/// completions that advancement itself triggers. Claims that lose the race
/// (already completed by another writer) are skipped silently.
pub async fn process_completions(
    repo: &Repository,
    config: &Config,
    program: Program,
    completed_ids: Vec<i64>,
    now: TimeMs,
) -> Result<Vec<RecycleEvent>, EngineError> {
    let mut worklist: VecDeque<i64> = completed_ids.into();
    let mut events = Vec::new();

    while let Some(id) = worklist.pop_front() {
        let placement = match repo.get_placement(id).await? {
            Some(p) => p,
            None => continue,
        };

        let event = match program {
            Program::Matrix => recycle_matrix(repo, id, now).await?,
            Program::Global => {
                advance_global(repo, config, id, now, &mut worklist).await?
            }
            Program::Binary => None,
        };

        if let Some(event) = event {
            info!(
                user = %event.user_id,
                program = %event.program,
                slot = event.slot_no,
                action = ?event.action,
                "subtree completed"
            );
            // Advancement can raise the spark tier. The mother id has no
            // participant record, so its synthetic roots are skipped.
            if program == Program::Global
                && repo.get_user(&placement.user_id).await?.is_some()
            {
                spark::check_eligibility(repo, &placement.user_id, now).await?;
            }
            events.push(event);
        }
    }

    Ok(events)
}

/// Claim a matrix completion and open the owner's next tree instance.
async fn recycle_matrix(
    repo: &Repository,
    placement_id: i64,
    now: TimeMs,
) -> Result<Option<RecycleEvent>, EngineError> {
    let claimed = repo
        .try_claim_completion(placement_id, catalog::MATRIX_COMPLETE_COUNT)
        .await?;
    if !claimed {
        return Ok(None);
    }

    let done = match repo.get_placement(placement_id).await? {
        Some(p) => p,
        None => return Ok(None),
    };

    let instance = repo
        .latest_instance(&done.user_id, Program::Matrix, done.slot_no)
        .await?
        + 1;

    repo.insert_placement(&NewPlacement {
        user_id: &done.user_id,
        program: Program::Matrix,
        slot_no: done.slot_no,
        parent_id: None,
        instance,
        phase: None,
        level: 0,
        position: 0,
        created_at: now,
    })
    .await?;

    dream_matrix::on_tree_complete(repo, &done.user_id, done.slot_no, &now.utc_day()).await?;

    Ok(Some(RecycleEvent {
        user_id: done.user_id,
        program: Program::Matrix,
        slot_no: done.slot_no,
        action: RecycleAction::Recycled { instance },
    }))
}

/// Claim a global phase completion and move the owner onward: phase 1 rolls
/// into phase 2 of the same slot, phase 2 into phase 1 of the next slot.
async fn advance_global(
    repo: &Repository,
    config: &Config,
    placement_id: i64,
    now: TimeMs,
    worklist: &mut VecDeque<i64>,
) -> Result<Option<RecycleEvent>, EngineError> {
    let placement = match repo.get_placement(placement_id).await? {
        Some(p) => p,
        None => return Ok(None),
    };
    let phase = placement.phase.unwrap_or(1);
    let quota = catalog::phase_quota(phase);

    let claimed = repo.try_claim_phase_completion(placement_id, quota).await?;
    if !claimed {
        return Ok(None);
    }

    let (next_slot, next_phase) = if phase == 1 {
        (placement.slot_no, 2)
    } else {
        (placement.slot_no + 1, 1)
    };

    if catalog::slot_def(Program::Global, next_slot).is_none() {
        return Ok(Some(RecycleEvent {
            user_id: placement.user_id,
            program: Program::Global,
            slot_no: placement.slot_no,
            action: RecycleAction::Terminal,
        }));
    }

    let result = super::placement::place_global(
        repo,
        config,
        &placement.user_id,
        next_slot,
        next_phase,
        now,
    )
    .await?;
    worklist.extend(result.completed_subtrees);

    Ok(Some(RecycleEvent {
        user_id: placement.user_id,
        program: Program::Global,
        slot_no: placement.slot_no,
        action: RecycleAction::Advanced {
            slot_no: next_slot,
            phase: next_phase,
        },
    }))
}
