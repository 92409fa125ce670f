//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `users.rs` - participant records and join flags
//! - `placements.rs` - tree placements and denormalized counters
//! - `commissions.rs` - commission rows and missed-profit accumulation
//! - `funds.rs` - bonus fund balances and payouts
//! - `trackers.rs` - per-user eligibility/accumulation records

mod commissions;
mod funds;
mod placements;
mod trackers;
mod users;

pub use commissions::AccumulationRow;
pub use funds::FundWriteOutcome;
pub use placements::NewPlacement;

use crate::domain::{Amount, Program, TimeMs, TxHash, UserId};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// Stored outcome of a processed join/upgrade, keyed by transaction hash.
///
/// A retried request replays this instead of re-running side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinEventRow {
    pub tx_hash: TxHash,
    pub user_id: UserId,
    pub program: Program,
    pub slot_no: i64,
    pub amount: Amount,
    pub placement_id: i64,
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Connectivity probe for readiness checks.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Parse a stored decimal column, logging and defaulting on corruption.
    pub(crate) fn parse_amount(raw: &str, context: &str) -> Amount {
        Amount::from_str(raw).unwrap_or_else(|e| {
            warn!(
                value = %raw,
                context = %context,
                error = %e,
                "Failed to parse stored decimal, using default"
            );
            Amount::default()
        })
    }

    /// Parse a stored program column. Stored values come from `Program::as_str`.
    pub(crate) fn parse_program(raw: &str, context: &str) -> Program {
        Program::parse(raw).unwrap_or_else(|| {
            warn!(value = %raw, context = %context, "Unknown stored program, defaulting to binary");
            Program::Binary
        })
    }

    // =========================================================================
    // Join event operations (payment idempotency)
    // =========================================================================

    /// Record a processed join event. Returns false when the tx hash was
    /// already recorded (duplicate request).
    pub async fn record_join_event(
        &self,
        tx_hash: &TxHash,
        user_id: &UserId,
        program: Program,
        slot_no: i64,
        amount: Amount,
        placement_id: i64,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO join_events (tx_hash, user_id, program, slot_no, amount, placement_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tx_hash) DO NOTHING
            "#,
        )
        .bind(tx_hash.as_str())
        .bind(user_id.as_str())
        .bind(program.as_str())
        .bind(slot_no)
        .bind(amount.to_canonical_string())
        .bind(placement_id)
        .bind(now.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Look up a previously processed join event by transaction hash.
    pub async fn get_join_event(
        &self,
        tx_hash: &TxHash,
    ) -> Result<Option<JoinEventRow>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT tx_hash, user_id, program, slot_no, amount, placement_id
            FROM join_events
            WHERE tx_hash = ?
            "#,
        )
        .bind(tx_hash.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let program: String = r.get("program");
            let amount: String = r.get("amount");
            JoinEventRow {
                tx_hash: TxHash::new(r.get("tx_hash")),
                user_id: UserId::new(r.get("user_id")),
                program: Self::parse_program(&program, "join_events.program"),
                slot_no: r.get("slot_no"),
                amount: Self::parse_amount(&amount, "join_events.amount"),
                placement_id: r.get("placement_id"),
            }
        }))
    }

    // =========================================================================
    // Batch run bookkeeping (daily idempotency)
    // =========================================================================

    /// Claim a batch run for (day, job). Returns false when the run already
    /// happened, so re-triggering a day is a no-op.
    pub async fn claim_batch_run(
        &self,
        day: &str,
        job: &str,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO batch_runs (day, job, users_processed, amount_calculated, created_at)
            VALUES (?, ?, 0, '0', ?)
            ON CONFLICT(day, job) DO NOTHING
            "#,
        )
        .bind(day)
        .bind(job)
        .bind(now.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the final tallies for a claimed batch run.
    pub async fn finish_batch_run(
        &self,
        day: &str,
        job: &str,
        users_processed: i64,
        amount_calculated: Amount,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE batch_runs
            SET users_processed = ?, amount_calculated = ?
            WHERE day = ? AND job = ?
            "#,
        )
        .bind(users_processed)
        .bind(amount_calculated.to_canonical_string())
        .bind(day)
        .bind(job)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch the recorded tallies for a prior batch run.
    pub async fn get_batch_run(
        &self,
        day: &str,
        job: &str,
    ) -> Result<Option<(i64, Amount)>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT users_processed, amount_calculated FROM batch_runs WHERE day = ? AND job = ?",
        )
        .bind(day)
        .bind(job)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let amount: String = r.get("amount_calculated");
            (
                r.get("users_processed"),
                Self::parse_amount(&amount, "batch_runs.amount_calculated"),
            )
        }))
    }
}
