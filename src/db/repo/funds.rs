//! Bonus fund balances and payout records.
//!
//! Balances are stored as canonical decimal text, so arithmetic happens in
//! Rust and updates land through optimistic compare-and-swap on the previous
//! totals. This is the single write path for fund money; no other component
//! mutates these rows.

use sqlx::Row;

use super::Repository;
use crate::domain::{Amount, BonusFund, BonusKind, Program, TimeMs, UserId};

/// Result of a conditional fund write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundWriteOutcome {
    Applied,
    /// Distribution would drive the available balance negative.
    Insufficient,
    /// Lost the optimistic race more times than the retry budget allows.
    Conflict,
}

impl Repository {
    /// Current balance for (kind, program); zero totals when no row exists.
    pub async fn get_fund(
        &self,
        kind: BonusKind,
        program: Program,
    ) -> Result<BonusFund, sqlx::Error> {
        let row = sqlx::query(
            "SELECT total_collected, total_distributed FROM funds WHERE kind = ? AND program = ?",
        )
        .bind(kind.as_str())
        .bind(program.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(match row {
            Some(r) => {
                let collected: String = r.get("total_collected");
                let distributed: String = r.get("total_distributed");
                BonusFund {
                    kind,
                    program,
                    total_collected: Self::parse_amount(&collected, "funds.total_collected"),
                    total_distributed: Self::parse_amount(&distributed, "funds.total_distributed"),
                }
            }
            None => BonusFund::empty(kind, program),
        })
    }

    /// All fund rows for a program, in kind order.
    pub async fn list_funds(&self, program: Program) -> Result<Vec<BonusFund>, sqlx::Error> {
        let mut out = Vec::new();
        for kind in BonusKind::all() {
            out.push(self.get_fund(*kind, program).await?);
        }
        Ok(out)
    }

    /// Add to a fund's collected total.
    pub async fn fund_contribute(
        &self,
        kind: BonusKind,
        program: Program,
        amount: Amount,
        retry_limit: u32,
    ) -> Result<FundWriteOutcome, sqlx::Error> {
        if amount.is_zero() {
            return Ok(FundWriteOutcome::Applied);
        }

        for _ in 0..=retry_limit {
            let current = self.get_fund(kind, program).await?;
            let updated = current.total_collected + amount;
            if self
                .swap_fund_totals(&current, updated, current.total_distributed)
                .await?
            {
                return Ok(FundWriteOutcome::Applied);
            }
        }

        Ok(FundWriteOutcome::Conflict)
    }

    /// Move money out of a fund's available balance.
    ///
    /// Rejects (does not clamp) a distribution that the available balance
    /// cannot cover, so `available >= 0` holds after every operation.
    pub async fn fund_try_distribute(
        &self,
        kind: BonusKind,
        program: Program,
        amount: Amount,
        retry_limit: u32,
    ) -> Result<FundWriteOutcome, sqlx::Error> {
        if amount.is_zero() {
            return Ok(FundWriteOutcome::Applied);
        }

        for _ in 0..=retry_limit {
            let current = self.get_fund(kind, program).await?;
            if !current.can_cover(amount) {
                return Ok(FundWriteOutcome::Insufficient);
            }
            let updated = current.total_distributed + amount;
            if self
                .swap_fund_totals(&current, current.total_collected, updated)
                .await?
            {
                return Ok(FundWriteOutcome::Applied);
            }
        }

        Ok(FundWriteOutcome::Conflict)
    }

    /// Compare-and-swap both totals against the previously read values.
    /// Inserts the row on first touch.
    async fn swap_fund_totals(
        &self,
        previous: &BonusFund,
        collected: Amount,
        distributed: Amount,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO funds (kind, program, total_collected, total_distributed)
            VALUES (?, ?, '0', '0')
            ON CONFLICT(kind, program) DO NOTHING
            "#,
        )
        .bind(previous.kind.as_str())
        .bind(previous.program.as_str())
        .execute(self.pool())
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE funds
            SET total_collected = ?, total_distributed = ?
            WHERE kind = ? AND program = ?
              AND total_collected = ? AND total_distributed = ?
            "#,
        )
        .bind(collected.to_canonical_string())
        .bind(distributed.to_canonical_string())
        .bind(previous.kind.as_str())
        .bind(previous.program.as_str())
        .bind(previous.total_collected.to_canonical_string())
        .bind(previous.total_distributed.to_canonical_string())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Payout records
    // =========================================================================

    /// Record one fund payout to a recipient for a period.
    pub async fn insert_fund_payout(
        &self,
        kind: BonusKind,
        program: Program,
        user: &UserId,
        amount: Amount,
        period: &str,
        now: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO fund_payouts (kind, program, user_id, amount, period, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(kind.as_str())
        .bind(program.as_str())
        .bind(user.as_str())
        .bind(amount.to_canonical_string())
        .bind(period)
        .bind(now.as_i64())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Payouts recorded for (kind, period), insertion order.
    pub async fn query_fund_payouts(
        &self,
        kind: BonusKind,
        period: &str,
    ) -> Result<Vec<(UserId, Amount)>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT user_id, amount FROM fund_payouts WHERE kind = ? AND period = ? ORDER BY id ASC",
        )
        .bind(kind.as_str())
        .bind(period)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let amount: String = r.get("amount");
                (
                    UserId::new(r.get("user_id")),
                    Self::parse_amount(&amount, "fund_payouts.amount"),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::setup_test_db;
    use super::*;

    fn amt(s: &str) -> Amount {
        Amount::from_str_canonical(s).unwrap()
    }

    #[tokio::test]
    async fn test_contribute_then_distribute() {
        let (repo, _temp) = setup_test_db().await;
        let kind = BonusKind::LeadershipStipend;

        let outcome = repo
            .fund_contribute(kind, Program::Binary, amt("10"), 3)
            .await
            .unwrap();
        assert_eq!(outcome, FundWriteOutcome::Applied);

        let outcome = repo
            .fund_try_distribute(kind, Program::Binary, amt("4"), 3)
            .await
            .unwrap();
        assert_eq!(outcome, FundWriteOutcome::Applied);

        let fund = repo.get_fund(kind, Program::Binary).await.unwrap();
        assert_eq!(fund.available().to_canonical_string(), "6");
    }

    #[tokio::test]
    async fn test_distribute_rejects_overdraw() {
        let (repo, _temp) = setup_test_db().await;
        let kind = BonusKind::Spark;

        repo.fund_contribute(kind, Program::Global, amt("1"), 3)
            .await
            .unwrap();

        let outcome = repo
            .fund_try_distribute(kind, Program::Global, amt("1.00000001"), 3)
            .await
            .unwrap();
        assert_eq!(outcome, FundWriteOutcome::Insufficient);

        // Balance untouched by the rejected distribution.
        let fund = repo.get_fund(kind, Program::Global).await.unwrap();
        assert_eq!(fund.available().to_canonical_string(), "1");
    }

    #[tokio::test]
    async fn test_distribute_from_empty_fund() {
        let (repo, _temp) = setup_test_db().await;

        let outcome = repo
            .fund_try_distribute(BonusKind::Mentorship, Program::Binary, amt("0.1"), 3)
            .await
            .unwrap();
        assert_eq!(outcome, FundWriteOutcome::Insufficient);
    }

    #[tokio::test]
    async fn test_zero_amount_is_noop() {
        let (repo, _temp) = setup_test_db().await;

        let outcome = repo
            .fund_contribute(BonusKind::Spark, Program::Global, Amount::zero(), 0)
            .await
            .unwrap();
        assert_eq!(outcome, FundWriteOutcome::Applied);
    }

    #[tokio::test]
    async fn test_payout_records_roundtrip() {
        let (repo, _temp) = setup_test_db().await;
        let user = UserId::new("u1".to_string());

        repo.insert_fund_payout(
            BonusKind::NewcomerSupport,
            Program::Binary,
            &user,
            amt("0.5"),
            "2024-01-15",
            TimeMs::new(1000),
        )
        .await
        .unwrap();

        let payouts = repo
            .query_fund_payouts(BonusKind::NewcomerSupport, "2024-01-15")
            .await
            .unwrap();
        assert_eq!(payouts, vec![(user, amt("0.5"))]);
    }
}
