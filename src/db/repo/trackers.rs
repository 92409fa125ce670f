//! Per-user eligibility/accumulation records for the bonus programs.

use sqlx::Row;

use super::Repository;
use crate::domain::{BonusKind, TimeMs, TrackerRecord, UserId};

fn row_to_tracker(row: &sqlx::sqlite::SqliteRow) -> TrackerRecord {
    let kind: String = row.get("kind");
    let earned: String = row.get("total_earned");
    let paid: String = row.get("total_paid");
    let today: String = row.get("earned_today");

    TrackerRecord {
        user_id: UserId::new(row.get("user_id")),
        kind: BonusKind::parse(&kind).unwrap_or(BonusKind::MissedProfit),
        is_eligible: row.get::<i64, _>("is_eligible") != 0,
        tier_name: row.get("tier_name"),
        tier_slot: row.get("tier_slot"),
        total_earned: Repository::parse_amount(&earned, "trackers.total_earned"),
        total_paid: Repository::parse_amount(&paid, "trackers.total_paid"),
        earned_today: Repository::parse_amount(&today, "trackers.earned_today"),
        last_calc_day: row.get("last_calc_day"),
        qualified_at: row.get::<Option<i64>, _>("qualified_at").map(TimeMs::new),
    }
}

impl Repository {
    pub async fn get_tracker(
        &self,
        user: &UserId,
        kind: BonusKind,
    ) -> Result<Option<TrackerRecord>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM trackers WHERE user_id = ? AND kind = ?")
            .bind(user.as_str())
            .bind(kind.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.as_ref().map(row_to_tracker))
    }

    /// Stored record or a zeroed one when the user has no history yet.
    pub async fn get_tracker_or_empty(
        &self,
        user: &UserId,
        kind: BonusKind,
    ) -> Result<TrackerRecord, sqlx::Error> {
        Ok(self
            .get_tracker(user, kind)
            .await?
            .unwrap_or_else(|| TrackerRecord::empty(user.clone(), kind)))
    }

    /// Write a tracker record wholesale. Tracker rows are only mutated by
    /// their owning tracker, which is the single write path.
    pub async fn upsert_tracker(&self, rec: &TrackerRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO trackers
            (user_id, kind, is_eligible, tier_name, tier_slot,
             total_earned, total_paid, earned_today, last_calc_day, qualified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, kind) DO UPDATE SET
                is_eligible = excluded.is_eligible,
                tier_name = excluded.tier_name,
                tier_slot = excluded.tier_slot,
                total_earned = excluded.total_earned,
                total_paid = excluded.total_paid,
                earned_today = excluded.earned_today,
                last_calc_day = excluded.last_calc_day,
                qualified_at = excluded.qualified_at
            "#,
        )
        .bind(rec.user_id.as_str())
        .bind(rec.kind.as_str())
        .bind(rec.is_eligible as i64)
        .bind(rec.tier_name.as_deref())
        .bind(rec.tier_slot)
        .bind(rec.total_earned.to_canonical_string())
        .bind(rec.total_paid.to_canonical_string())
        .bind(rec.earned_today.to_canonical_string())
        .bind(rec.last_calc_day.as_deref())
        .bind(rec.qualified_at.map(|t| t.as_i64()))
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Currently eligible users for a bonus kind, in user-id order for
    /// deterministic distribution.
    pub async fn list_eligible_trackers(
        &self,
        kind: BonusKind,
    ) -> Result<Vec<TrackerRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM trackers WHERE kind = ? AND is_eligible = 1 ORDER BY user_id ASC",
        )
        .bind(kind.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(row_to_tracker).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::setup_test_db;
    use crate::domain::{Amount, BonusKind, TrackerRecord, UserId};

    #[tokio::test]
    async fn test_upsert_and_get_tracker() {
        let (repo, _temp) = setup_test_db().await;
        let user = UserId::new("u1".to_string());

        let mut rec = TrackerRecord::empty(user.clone(), BonusKind::LeadershipStipend);
        rec.is_eligible = true;
        rec.tier_name = Some("LEADER".to_string());
        rec.tier_slot = Some(10);
        rec.total_earned = Amount::from_str_canonical("2.2528").unwrap();
        repo.upsert_tracker(&rec).await.unwrap();

        let stored = repo
            .get_tracker(&user, BonusKind::LeadershipStipend)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.tier_name.as_deref(), Some("LEADER"));
        assert_eq!(stored.pending().to_canonical_string(), "2.2528");

        // Second upsert replaces, not duplicates.
        rec.total_paid = Amount::from_str_canonical("1").unwrap();
        repo.upsert_tracker(&rec).await.unwrap();
        let stored = repo
            .get_tracker(&user, BonusKind::LeadershipStipend)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_paid.to_canonical_string(), "1");
    }

    #[tokio::test]
    async fn test_get_tracker_or_empty() {
        let (repo, _temp) = setup_test_db().await;
        let user = UserId::new("ghost".to_string());

        let rec = repo
            .get_tracker_or_empty(&user, BonusKind::Spark)
            .await
            .unwrap();
        assert!(!rec.is_eligible);
        assert!(rec.total_earned.is_zero());
    }

    #[tokio::test]
    async fn test_list_eligible_is_sorted_and_filtered() {
        let (repo, _temp) = setup_test_db().await;

        for (id, eligible) in [("b", true), ("a", true), ("c", false)] {
            let mut rec =
                TrackerRecord::empty(UserId::new(id.to_string()), BonusKind::NewcomerSupport);
            rec.is_eligible = eligible;
            repo.upsert_tracker(&rec).await.unwrap();
        }

        let eligible = repo
            .list_eligible_trackers(BonusKind::NewcomerSupport)
            .await
            .unwrap();
        let ids: Vec<&str> = eligible.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
