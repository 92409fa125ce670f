//! Participant records and program-join flags.

use sqlx::Row;

use super::Repository;
use crate::domain::{Program, Role, TimeMs, User, UserId, Wallet};

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
    let sponsor: Option<String> = row.get("sponsor_id");
    let role: String = row.get("role");
    User {
        id: UserId::new(row.get("id")),
        sponsor_id: sponsor.map(UserId::new),
        wallet: Wallet::new(row.get("wallet")),
        role: Role::parse(&role).unwrap_or(Role::Normal),
        binary_joined: row.get::<i64, _>("binary_joined") != 0,
        matrix_joined: row.get::<i64, _>("matrix_joined") != 0,
        global_joined: row.get::<i64, _>("global_joined") != 0,
        binary_joined_at: row.get::<Option<i64>, _>("binary_joined_at").map(TimeMs::new),
        matrix_joined_at: row.get::<Option<i64>, _>("matrix_joined_at").map(TimeMs::new),
        global_joined_at: row.get::<Option<i64>, _>("global_joined_at").map(TimeMs::new),
        created_at: TimeMs::new(row.get("created_at")),
    }
}

fn joined_columns(program: Program) -> (&'static str, &'static str) {
    match program {
        Program::Binary => ("binary_joined", "binary_joined_at"),
        Program::Matrix => ("matrix_joined", "matrix_joined_at"),
        Program::Global => ("global_joined", "global_joined_at"),
    }
}

impl Repository {
    /// Insert a participant. Returns false when the id already exists.
    pub async fn insert_user(&self, user: &User) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, sponsor_id, wallet, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(user.id.as_str())
        .bind(user.sponsor_id.as_ref().map(|s| s.as_str().to_string()))
        .bind(user.wallet.as_str())
        .bind(user.role.as_str())
        .bind(user.created_at.as_i64())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_user(&self, id: &UserId) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.as_ref().map(row_to_user))
    }

    /// Flip a program-join flag exactly once.
    ///
    /// Returns false when the flag was already set, which callers surface as
    /// "already joined" instead of re-running side effects.
    pub async fn mark_program_joined(
        &self,
        id: &UserId,
        program: Program,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let (flag_col, at_col) = joined_columns(program);
        let sql = format!(
            "UPDATE users SET {flag} = 1, {at} = ? WHERE id = ? AND {flag} = 0",
            flag = flag_col,
            at = at_col
        );

        let result = sqlx::query(&sql)
            .bind(now.as_i64())
            .bind(id.as_str())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of directly sponsored users who joined `program`.
    pub async fn count_direct_partners(
        &self,
        sponsor: &UserId,
        program: Program,
    ) -> Result<i64, sqlx::Error> {
        let (flag_col, _) = joined_columns(program);
        let sql = format!(
            "SELECT COUNT(*) as cnt FROM users WHERE sponsor_id = ? AND {flag} = 1",
            flag = flag_col
        );

        let row = sqlx::query(&sql)
            .bind(sponsor.as_str())
            .fetch_one(self.pool())
            .await?;

        Ok(row.get("cnt"))
    }

    /// All participant ids, oldest first. Used by the daily batch to refresh
    /// eligibility before distribution.
    pub async fn list_user_ids(&self) -> Result<Vec<UserId>, sqlx::Error> {
        let rows = sqlx::query("SELECT id FROM users ORDER BY created_at ASC, id ASC")
            .fetch_all(self.pool())
            .await?;

        Ok(rows
            .iter()
            .map(|r| UserId::new(r.get("id")))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::setup_test_db;
    use crate::domain::{Program, Role, TimeMs, User, UserId, Wallet};

    fn new_user(id: &str, sponsor: Option<&str>) -> User {
        User {
            id: UserId::new(id.to_string()),
            sponsor_id: sponsor.map(|s| UserId::new(s.to_string())),
            wallet: Wallet::new(format!("0x{}", id)),
            role: Role::Normal,
            binary_joined: false,
            matrix_joined: false,
            global_joined: false,
            binary_joined_at: None,
            matrix_joined_at: None,
            global_joined_at: None,
            created_at: TimeMs::new(1000),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_user() {
        let (repo, _temp) = setup_test_db().await;

        let user = new_user("u1", Some("root"));
        assert!(repo.insert_user(&user).await.unwrap());
        assert!(!repo.insert_user(&user).await.unwrap());

        let stored = repo.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.sponsor_id, user.sponsor_id);
        assert!(!stored.binary_joined);
    }

    #[tokio::test]
    async fn test_mark_program_joined_once() {
        let (repo, _temp) = setup_test_db().await;

        let user = new_user("u1", None);
        repo.insert_user(&user).await.unwrap();

        assert!(repo
            .mark_program_joined(&user.id, Program::Binary, TimeMs::new(2000))
            .await
            .unwrap());
        assert!(!repo
            .mark_program_joined(&user.id, Program::Binary, TimeMs::new(3000))
            .await
            .unwrap());

        let stored = repo.get_user(&user.id).await.unwrap().unwrap();
        assert!(stored.binary_joined);
        assert_eq!(stored.binary_joined_at, Some(TimeMs::new(2000)));
    }

    #[tokio::test]
    async fn test_count_direct_partners_per_program() {
        let (repo, _temp) = setup_test_db().await;

        let root = new_user("root", None);
        repo.insert_user(&root).await.unwrap();

        for id in ["a", "b", "c"] {
            let u = new_user(id, Some("root"));
            repo.insert_user(&u).await.unwrap();
            repo.mark_program_joined(&u.id, Program::Binary, TimeMs::new(1))
                .await
                .unwrap();
        }
        repo.mark_program_joined(&UserId::new("a".to_string()), Program::Matrix, TimeMs::new(2))
            .await
            .unwrap();

        assert_eq!(
            repo.count_direct_partners(&root.id, Program::Binary)
                .await
                .unwrap(),
            3
        );
        assert_eq!(
            repo.count_direct_partners(&root.id, Program::Matrix)
                .await
                .unwrap(),
            1
        );
    }
}
