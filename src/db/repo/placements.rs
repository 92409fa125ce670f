//! Tree placements and the denormalized capacity/team counters.
//!
//! Sibling attachment and completion claims are conditional updates so two
//! concurrent joins cannot both take the last free position; callers retry a
//! bounded number of times on conflict.

use sqlx::Row;

use super::Repository;
use crate::domain::{Program, TimeMs, TreePlacement, UserId};

fn row_to_placement(row: &sqlx::sqlite::SqliteRow) -> TreePlacement {
    let program: String = row.get("program");
    TreePlacement {
        id: row.get("id"),
        user_id: UserId::new(row.get("user_id")),
        program: Repository::parse_program(&program, "placements.program"),
        slot_no: row.get("slot_no"),
        parent_id: row.get("parent_id"),
        instance: row.get("instance"),
        phase: row.get("phase"),
        level: row.get("level"),
        position: row.get("position"),
        child_count: row.get("child_count"),
        team_size: row.get("team_size"),
        active: row.get::<i64, _>("active") != 0,
        completed: row.get::<i64, _>("completed") != 0,
        created_at: TimeMs::new(row.get("created_at")),
    }
}

/// Fields for a new placement row; counters start at zero.
pub struct NewPlacement<'a> {
    pub user_id: &'a UserId,
    pub program: Program,
    pub slot_no: i64,
    pub parent_id: Option<i64>,
    pub instance: i64,
    pub phase: Option<i64>,
    pub level: i64,
    pub position: i64,
    pub created_at: TimeMs,
}

impl Repository {
    /// Insert a placement and return its generated id.
    pub async fn insert_placement(&self, new: &NewPlacement<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO placements
            (user_id, program, slot_no, parent_id, instance, phase, level, position, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.user_id.as_str())
        .bind(new.program.as_str())
        .bind(new.slot_no)
        .bind(new.parent_id)
        .bind(new.instance)
        .bind(new.phase)
        .bind(new.level)
        .bind(new.position)
        .bind(new.created_at.as_i64())
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_placement(&self, id: i64) -> Result<Option<TreePlacement>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM placements WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.as_ref().map(row_to_placement))
    }

    /// The user's current active placement at (program, slot), latest
    /// recycle instance first.
    pub async fn get_active_placement(
        &self,
        user: &UserId,
        program: Program,
        slot_no: i64,
    ) -> Result<Option<TreePlacement>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM placements
            WHERE user_id = ? AND program = ? AND slot_no = ? AND active = 1
            ORDER BY instance DESC
            LIMIT 1
            "#,
        )
        .bind(user.as_str())
        .bind(program.as_str())
        .bind(slot_no)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(row_to_placement))
    }

    /// Highest slot the user actively holds in a program, if any.
    pub async fn max_active_slot(
        &self,
        user: &UserId,
        program: Program,
    ) -> Result<Option<i64>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT MAX(slot_no) as max_slot FROM placements
            WHERE user_id = ? AND program = ? AND active = 1
            "#,
        )
        .bind(user.as_str())
        .bind(program.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(row.get::<Option<i64>, _>("max_slot"))
    }

    /// Latest recycle instance for (user, program, slot); 0 when unplaced.
    pub async fn latest_instance(
        &self,
        user: &UserId,
        program: Program,
        slot_no: i64,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(MAX(instance), 0) as latest FROM placements
            WHERE user_id = ? AND program = ? AND slot_no = ?
            "#,
        )
        .bind(user.as_str())
        .bind(program.as_str())
        .bind(slot_no)
        .fetch_one(self.pool())
        .await?;

        Ok(row.get("latest"))
    }

    /// Children of a node, left to right.
    pub async fn children_of(&self, parent_id: i64) -> Result<Vec<TreePlacement>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM placements WHERE parent_id = ? ORDER BY position ASC, id ASC",
        )
        .bind(parent_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_placement).collect())
    }

    /// Conditionally take a child position under `parent_id`.
    ///
    /// The update only lands while `child_count < cap`, so two concurrent
    /// joins cannot both take the last free position. Returns the position
    /// index granted, or None when the node is full (or lost the race to the
    /// last slot, which is the same outcome).
    pub async fn try_attach_child(
        &self,
        parent_id: i64,
        cap: i64,
    ) -> Result<Option<i64>, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE placements
            SET child_count = child_count + 1
            WHERE id = ? AND child_count < ?
            "#,
        )
        .bind(parent_id)
        .bind(cap)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query("SELECT child_count FROM placements WHERE id = ?")
            .bind(parent_id)
            .fetch_one(self.pool())
            .await?;
        let count: i64 = row.get("child_count");

        Ok(Some(count - 1))
    }

    /// Bump the descendant counter on every ancestor of a fresh placement.
    pub async fn increment_team_sizes(&self, ancestor_ids: &[i64]) -> Result<(), sqlx::Error> {
        if ancestor_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;
        for id in ancestor_ids {
            sqlx::query("UPDATE placements SET team_size = team_size + 1 WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Claim completion of a matrix subtree once its team size reaches the
    /// quota. The `completed = 0` guard makes reprocessing a no-op, so a
    /// completion is recycled exactly once.
    pub async fn try_claim_completion(
        &self,
        placement_id: i64,
        quota: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE placements
            SET completed = 1, active = 0
            WHERE id = ? AND completed = 0 AND team_size >= ?
            "#,
        )
        .bind(placement_id)
        .bind(quota)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Claim completion of a global phase placement once its direct member
    /// quota is filled. Same idempotency guard as matrix completion.
    pub async fn try_claim_phase_completion(
        &self,
        placement_id: i64,
        quota: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE placements
            SET completed = 1, active = 0
            WHERE id = ? AND completed = 0 AND child_count >= ?
            "#,
        )
        .bind(placement_id)
        .bind(quota)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Walk parent references up from a placement, nearest ancestor first,
    /// up to `max_levels` entries.
    pub async fn upline_chain(
        &self,
        placement_id: i64,
        max_levels: usize,
    ) -> Result<Vec<TreePlacement>, sqlx::Error> {
        let mut chain = Vec::new();
        let mut current = self.get_placement(placement_id).await?;

        while chain.len() < max_levels {
            let parent_id = match current.as_ref().and_then(|p| p.parent_id) {
                Some(id) => id,
                None => break,
            };
            match self.get_placement(parent_id).await? {
                Some(parent) => {
                    chain.push(parent.clone());
                    current = Some(parent);
                }
                None => break,
            }
        }

        Ok(chain)
    }

    /// Oldest open placement in the global rotation for (slot, phase):
    /// first in, first filled.
    pub async fn find_rotation_open(
        &self,
        slot_no: i64,
        phase: i64,
        quota: i64,
    ) -> Result<Option<TreePlacement>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM placements
            WHERE program = 'global' AND slot_no = ? AND phase = ?
              AND completed = 0 AND active = 1 AND child_count < ?
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(slot_no)
        .bind(phase)
        .bind(quota)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(row_to_placement))
    }
}
