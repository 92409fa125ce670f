//! Commission rows and missed-profit accumulation records.

use sqlx::Row;

use super::Repository;
use crate::domain::{
    Amount, Commission, CommissionKind, CommissionStatus, MissedReason, Program, TimeMs, TxHash,
    UserId,
};

fn row_to_commission(row: &sqlx::sqlite::SqliteRow) -> Commission {
    let program: String = row.get("program");
    let amount: String = row.get("amount");
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let reason: Option<String> = row.get("missed_reason");
    let recipient: Option<String> = row.get("recipient");

    Commission {
        id: row.get("id"),
        tx_hash: TxHash::new(row.get("tx_hash")),
        program: Repository::parse_program(&program, "commissions.program"),
        slot_no: row.get("slot_no"),
        payer: UserId::new(row.get("payer")),
        recipient: recipient.map(UserId::new),
        amount: Repository::parse_amount(&amount, "commissions.amount"),
        currency: row.get("currency"),
        kind: CommissionKind::parse(&kind).unwrap_or(CommissionKind::Level),
        level: row.get("level"),
        status: CommissionStatus::parse(&status).unwrap_or(CommissionStatus::Pending),
        missed_reason: reason.as_deref().and_then(MissedReason::parse),
        is_accumulated: row.get::<i64, _>("is_accumulated") != 0,
        created_at: TimeMs::new(row.get("created_at")),
    }
}

/// One accumulated (program, reason) group written by the recovery router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulationRow {
    pub id: i64,
    pub program: Program,
    pub reason: MissedReason,
    pub period_start: TimeMs,
    pub period_end: TimeMs,
    pub total: Amount,
    pub record_count: i64,
}

impl Repository {
    /// Persist one commission allocation; returns the generated id.
    pub async fn insert_commission(&self, c: &Commission) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO commissions
            (tx_hash, program, slot_no, payer, recipient, amount, currency,
             kind, level, status, missed_reason, is_accumulated, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(c.tx_hash.as_str())
        .bind(c.program.as_str())
        .bind(c.slot_no)
        .bind(c.payer.as_str())
        .bind(c.recipient.as_ref().map(|r| r.as_str().to_string()))
        .bind(c.amount.to_canonical_string())
        .bind(&c.currency)
        .bind(c.kind.as_str())
        .bind(c.level)
        .bind(c.status.as_str())
        .bind(c.missed_reason.map(|r| r.as_str()))
        .bind(c.is_accumulated as i64)
        .bind(c.created_at.as_i64())
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// All commissions created by one payment event, in insertion order.
    pub async fn query_commissions_by_tx(
        &self,
        tx_hash: &TxHash,
    ) -> Result<Vec<Commission>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM commissions WHERE tx_hash = ? ORDER BY id ASC")
            .bind(tx_hash.as_str())
            .fetch_all(self.pool())
            .await?;

        Ok(rows.iter().map(row_to_commission).collect())
    }

    /// Commissions paid to a recipient, newest first.
    pub async fn query_commissions_for_recipient(
        &self,
        recipient: &UserId,
    ) -> Result<Vec<Commission>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM commissions WHERE recipient = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(recipient.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_commission).collect())
    }

    /// Missed commissions in a time window that no accumulation batch has
    /// swept yet.
    pub async fn query_missed_unaccumulated(
        &self,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Commission>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM commissions
            WHERE status = 'missed' AND is_accumulated = 0
              AND created_at >= ? AND created_at < ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(from.as_i64())
        .bind(to.as_i64())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_commission).collect())
    }

    /// Flag missed commissions as swept so a re-run of the same window
    /// cannot double count them.
    pub async fn mark_commissions_accumulated(&self, ids: &[i64]) -> Result<(), sqlx::Error> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;
        for id in ids {
            sqlx::query("UPDATE commissions SET is_accumulated = 1 WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Write one accumulation summary row for a (program, reason) group.
    pub async fn insert_missed_accumulation(
        &self,
        program: Program,
        reason: MissedReason,
        period_start: TimeMs,
        period_end: TimeMs,
        total: Amount,
        record_count: i64,
        now: TimeMs,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO missed_accumulations
            (program, reason, period_start, period_end, total, record_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(program.as_str())
        .bind(reason.as_str())
        .bind(period_start.as_i64())
        .bind(period_end.as_i64())
        .bind(total.to_canonical_string())
        .bind(record_count)
        .bind(now.as_i64())
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Accumulation summaries not yet spread across eligible recipients.
    pub async fn query_undistributed_accumulations(
        &self,
    ) -> Result<Vec<AccumulationRow>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM missed_accumulations WHERE distributed = 0 ORDER BY id ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let program: String = r.get("program");
                let reason: String = r.get("reason");
                let total: String = r.get("total");
                AccumulationRow {
                    id: r.get("id"),
                    program: Repository::parse_program(&program, "missed_accumulations.program"),
                    reason: MissedReason::parse(&reason).unwrap_or(MissedReason::NoUpline),
                    period_start: TimeMs::new(r.get("period_start")),
                    period_end: TimeMs::new(r.get("period_end")),
                    total: Repository::parse_amount(&total, "missed_accumulations.total"),
                    record_count: r.get("record_count"),
                }
            })
            .collect())
    }

    /// Claim an accumulation for distribution. The `distributed = 0` guard
    /// makes redistribution of the same pool a no-op.
    pub async fn try_claim_accumulation(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE missed_accumulations SET distributed = 1 WHERE id = ? AND distributed = 0")
                .bind(id)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::setup_test_db;
    use super::*;

    fn missed(tx: &str, amount: &str, at: i64) -> Commission {
        Commission {
            id: 0,
            tx_hash: TxHash::new(tx.to_string()),
            program: Program::Binary,
            slot_no: 3,
            payer: UserId::new("payer".to_string()),
            recipient: Some(UserId::new("upline".to_string())),
            amount: Amount::from_str_canonical(amount).unwrap(),
            currency: "BNB".to_string(),
            kind: CommissionKind::Level,
            level: 5,
            status: CommissionStatus::Missed,
            missed_reason: Some(MissedReason::AccountInactivity),
            is_accumulated: false,
            created_at: TimeMs::new(at),
        }
    }

    #[tokio::test]
    async fn test_insert_and_query_by_tx() {
        let (repo, _temp) = setup_test_db().await;

        let c = missed("0xaaa", "0.0022", 1000);
        repo.insert_commission(&c).await.unwrap();
        repo.insert_commission(&missed("0xbbb", "0.0044", 2000))
            .await
            .unwrap();

        let rows = repo
            .query_commissions_by_tx(&TxHash::new("0xaaa".to_string()))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount.to_canonical_string(), "0.0022");
        assert_eq!(rows[0].missed_reason, Some(MissedReason::AccountInactivity));
    }

    #[tokio::test]
    async fn test_missed_window_excludes_accumulated() {
        let (repo, _temp) = setup_test_db().await;

        let id1 = repo.insert_commission(&missed("0x1", "1", 1000)).await.unwrap();
        repo.insert_commission(&missed("0x2", "2", 2000)).await.unwrap();
        repo.insert_commission(&missed("0x3", "4", 9000)).await.unwrap();

        let window = repo
            .query_missed_unaccumulated(TimeMs::new(0), TimeMs::new(5000))
            .await
            .unwrap();
        assert_eq!(window.len(), 2);

        repo.mark_commissions_accumulated(&[id1]).await.unwrap();

        let window = repo
            .query_missed_unaccumulated(TimeMs::new(0), TimeMs::new(5000))
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].tx_hash.as_str(), "0x2");
    }

    #[tokio::test]
    async fn test_accumulation_claim_once() {
        let (repo, _temp) = setup_test_db().await;

        let id = repo
            .insert_missed_accumulation(
                Program::Binary,
                MissedReason::AccountInactivity,
                TimeMs::new(0),
                TimeMs::new(5000),
                Amount::from_str_canonical("3").unwrap(),
                2,
                TimeMs::new(6000),
            )
            .await
            .unwrap();

        let pending = repo.query_undistributed_accumulations().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].total.to_canonical_string(), "3");

        assert!(repo.try_claim_accumulation(id).await.unwrap());
        assert!(!repo.try_claim_accumulation(id).await.unwrap());
        assert!(repo
            .query_undistributed_accumulations()
            .await
            .unwrap()
            .is_empty());
    }
}
