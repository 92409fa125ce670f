//! Tree Placement Engine.
//!
//! Decides where a joining (or upgrading) participant is inserted in a
//! program's tree and persists that placement, maintaining the denormalized
//! ancestor team-size counters along the way.
//!
//! - Binary: breadth-first "sweepover" search under the sponsor subtree,
//!   2 children per node, bounded depth.
//! - Matrix: 3-ary, fills left to right level by level; 39 descendants
//!   complete a subtree.
//! - Global: FIFO rotation per (slot, phase) with a mother-id fallback root
//!   so every join succeeds.

use std::collections::VecDeque;

use tracing::debug;

use crate::config::Config;
use crate::db::repo::NewPlacement;
use crate::db::Repository;
use crate::domain::{catalog, PlacementResult, Program, TimeMs, TreePlacement, UserId};
use crate::error::EngineError;

/// Ancestor-walk bound when bumping team counters; deeper chains than this
/// do not occur within the bounded sweepover depth.
const TEAM_WALK_BOUND: usize = 64;

/// Place `user_id` into `program` at `slot_no` under the sponsor's subtree.
pub async fn place(
    repo: &Repository,
    config: &Config,
    user_id: &UserId,
    sponsor_id: Option<&UserId>,
    program: Program,
    slot_no: i64,
    now: TimeMs,
) -> Result<PlacementResult, EngineError> {
    if catalog::slot_def(program, slot_no).is_none() {
        return Err(EngineError::UnknownSlot { program, slot_no });
    }

    if repo
        .get_active_placement(user_id, program, slot_no)
        .await?
        .is_some()
    {
        return Err(EngineError::AlreadyJoined {
            user: user_id.clone(),
            program,
            slot_no,
        });
    }

    match program {
        Program::Global => place_global(repo, config, user_id, slot_no, 1, now).await,
        Program::Binary | Program::Matrix => {
            place_sweepover(repo, user_id, sponsor_id, program, slot_no, now).await
        }
    }
}

/// Binary/Matrix insertion: anchor on the nearest sponsor holding the slot,
/// then breadth-first search for the first node with a free child position.
async fn place_sweepover(
    repo: &Repository,
    user_id: &UserId,
    sponsor_id: Option<&UserId>,
    program: Program,
    slot_no: i64,
    now: TimeMs,
) -> Result<PlacementResult, EngineError> {
    let anchor = resolve_anchor(repo, sponsor_id, program, slot_no).await?;

    let anchor = match anchor {
        Some(a) => a,
        None => {
            // A base join naming a sponsor requires that sponsor's chain to
            // already sit in the tree. Fresh roots are for sponsorless joins
            // and first-buyer upgrades of higher slots.
            if slot_no == 1 {
                if let Some(sponsor) = sponsor_id {
                    return Err(EngineError::SponsorNotPlaced {
                        sponsor: sponsor.clone(),
                        program,
                    });
                }
            }
            let id = repo
                .insert_placement(&NewPlacement {
                    user_id,
                    program,
                    slot_no,
                    parent_id: None,
                    instance: 1,
                    phase: None,
                    level: 0,
                    position: 0,
                    created_at: now,
                })
                .await?;
            let placement = expect_placement(repo, id).await?;
            return Ok(PlacementResult {
                placement,
                completed_subtrees: Vec::new(),
            });
        }
    };

    let arity = catalog::tree_arity(program);
    let depth_bound = match program {
        // A matrix subtree is exactly 3 levels deep (3 + 9 + 27 = 39).
        Program::Matrix => 3,
        _ => catalog::SWEEPOVER_MAX_DEPTH,
    };

    let (parent, position) = sweepover_search(repo, &anchor, arity, depth_bound).await?;

    let id = repo
        .insert_placement(&NewPlacement {
            user_id,
            program,
            slot_no,
            parent_id: Some(parent.id),
            instance: 1,
            phase: None,
            level: parent.level + 1,
            position,
            created_at: now,
        })
        .await?;

    let completed = bump_ancestors(repo, id, program).await?;
    let placement = expect_placement(repo, id).await?;

    debug!(
        user = %user_id,
        program = %program,
        slot = slot_no,
        parent = parent.id,
        position,
        "placed under sweepover parent"
    );

    Ok(PlacementResult {
        placement,
        completed_subtrees: completed,
    })
}

/// Walk the sponsor chain (bounded) to the nearest upline holding an active
/// placement at (program, slot). None when no upline holds the slot.
async fn resolve_anchor(
    repo: &Repository,
    sponsor_id: Option<&UserId>,
    program: Program,
    slot_no: i64,
) -> Result<Option<TreePlacement>, EngineError> {
    let mut current = sponsor_id.cloned();
    let mut hops = 0i64;

    while let Some(candidate) = current {
        if hops >= catalog::SWEEPOVER_MAX_DEPTH {
            break;
        }
        hops += 1;

        if let Some(placement) = repo
            .get_active_placement(&candidate, program, slot_no)
            .await?
        {
            return Ok(Some(placement));
        }

        current = match repo.get_user(&candidate).await? {
            Some(user) => user.sponsor_id,
            None => None,
        };
    }

    Ok(None)
}

/// Breadth-first search below `anchor` for the first node with a free child
/// position. Explicit bounded iteration, never recursion; exhaustion is a
/// hard `NoCapacity` error rather than a silent drop.
async fn sweepover_search(
    repo: &Repository,
    anchor: &TreePlacement,
    arity: i64,
    depth_bound: i64,
) -> Result<(TreePlacement, i64), EngineError> {
    let mut queue: VecDeque<TreePlacement> = VecDeque::new();
    queue.push_back(anchor.clone());

    while let Some(node) = queue.pop_front() {
        let relative_depth = node.level - anchor.level;
        if relative_depth >= depth_bound {
            continue;
        }

        if node.child_count < arity {
            // Conditional attach; None means the node filled concurrently,
            // in which case the search continues through its children.
            if let Some(position) = repo.try_attach_child(node.id, arity).await? {
                return Ok((node, position));
            }
        }

        for child in repo.children_of(node.id).await? {
            queue.push_back(child);
        }
    }

    Err(EngineError::NoCapacity(anchor.program))
}

/// Global insertion: the joiner attaches to the oldest open placement in the
/// (slot, phase) rotation; when the rotation is empty a fresh mother-rooted
/// tree is opened so the join always succeeds.
pub async fn place_global(
    repo: &Repository,
    config: &Config,
    user_id: &UserId,
    slot_no: i64,
    phase: i64,
    now: TimeMs,
) -> Result<PlacementResult, EngineError> {
    if catalog::slot_def(Program::Global, slot_no).is_none() {
        return Err(EngineError::UnknownSlot {
            program: Program::Global,
            slot_no,
        });
    }

    let quota = catalog::phase_quota(phase);

    for _ in 0..=config.write_retry_limit {
        let parent = match repo.find_rotation_open(slot_no, phase, quota).await? {
            Some(p) => p,
            None => open_mother_root(repo, config, slot_no, phase, now).await?,
        };

        let position = match repo.try_attach_child(parent.id, quota).await? {
            Some(pos) => pos,
            // Lost the race to the rotation head; re-resolve and try again.
            None => continue,
        };

        let instance = repo
            .latest_instance(user_id, Program::Global, slot_no)
            .await?
            + 1;

        let id = repo
            .insert_placement(&NewPlacement {
                user_id,
                program: Program::Global,
                slot_no,
                parent_id: Some(parent.id),
                instance,
                phase: Some(phase),
                level: parent.level + 1,
                position,
                created_at: now,
            })
            .await?;

        let mut completed = bump_ancestors(repo, id, Program::Global).await?;

        // Phase completion is counted on direct members of the phase root.
        let parent_after = expect_placement(repo, parent.id).await?;
        if parent_after.child_count >= quota && !completed.contains(&parent.id) {
            completed.push(parent.id);
        }

        let placement = expect_placement(repo, id).await?;
        return Ok(PlacementResult {
            placement,
            completed_subtrees: completed,
        });
    }

    Err(EngineError::WriteConflict)
}

/// Open a fresh rotation tree rooted at the configured mother id.
async fn open_mother_root(
    repo: &Repository,
    config: &Config,
    slot_no: i64,
    phase: i64,
    now: TimeMs,
) -> Result<TreePlacement, EngineError> {
    let instance = repo
        .latest_instance(&config.mother_id, Program::Global, slot_no)
        .await?
        + 1;

    let id = repo
        .insert_placement(&NewPlacement {
            user_id: &config.mother_id,
            program: Program::Global,
            slot_no,
            parent_id: None,
            instance,
            phase: Some(phase),
            level: 0,
            position: 0,
            created_at: now,
        })
        .await?;

    debug!(slot = slot_no, phase, "opened mother-rooted rotation tree");
    expect_placement(repo, id).await
}

/// Bump team counters on every ancestor of a fresh placement and report
/// matrix subtrees that reached their completion quota.
async fn bump_ancestors(
    repo: &Repository,
    placement_id: i64,
    program: Program,
) -> Result<Vec<i64>, EngineError> {
    let ancestors = repo.upline_chain(placement_id, TEAM_WALK_BOUND).await?;
    let ids: Vec<i64> = ancestors.iter().map(|a| a.id).collect();
    repo.increment_team_sizes(&ids).await?;

    let mut completed = Vec::new();
    if program == Program::Matrix {
        // Only ancestors within matrix depth can reach the 39 quota.
        for ancestor in ancestors.iter().take(3) {
            let after = expect_placement(repo, ancestor.id).await?;
            if after.team_size >= catalog::MATRIX_COMPLETE_COUNT && !after.completed {
                completed.push(after.id);
            }
        }
    }

    Ok(completed)
}

async fn expect_placement(repo: &Repository, id: i64) -> Result<TreePlacement, EngineError> {
    repo.get_placement(id)
        .await?
        .ok_or_else(|| EngineError::Db(sqlx::Error::RowNotFound))
}
