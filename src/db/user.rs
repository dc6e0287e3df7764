use color_eyre::Result;
use ulid::Ulid;

use super::models::{AuthUser, XpAward};
use super::Db;

impl Db {
    pub async fn create_user(&self, display_name: &str) -> Result<AuthUser> {
        let user = sqlx::query_as::<_, AuthUser>(
            "INSERT INTO users (display_name) VALUES (?) RETURNING id, display_name, total_exp",
        )
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("new user created: id={}, display_name={display_name}", user.id);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<AuthUser>> {
        let user = sqlx::query_as::<_, AuthUser>(
            "SELECT id, display_name, total_exp FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn create_user_session(&self, user_id: i64) -> Result<String> {
        let session = Ulid::new().to_string();

        sqlx::query("INSERT INTO user_sessions (id, user_id) VALUES (?, ?)")
            .bind(&session)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::info!("new user session created for user_id={user_id}");
        Ok(session)
    }

    pub async fn get_user_by_session(&self, session_id: &str) -> Result<Option<AuthUser>> {
        let user = sqlx::query_as::<_, AuthUser>(
            r#"
            SELECT u.id, u.display_name, u.total_exp
            FROM user_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Every XP award ever granted to the user, oldest first.
    pub async fn xp_awards(&self, user_id: i64) -> Result<Vec<XpAward>> {
        let awards = sqlx::query_as::<_, XpAward>(
            r#"
            SELECT user_id, level_id, amount, awarded_at
            FROM xp_awards
            WHERE user_id = ?
            ORDER BY awarded_at, level_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(awards)
    }
}
