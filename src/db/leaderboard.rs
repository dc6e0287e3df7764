use color_eyre::Result;

use super::models::{ProgressCounts, RankedUser};
use super::Db;

impl Db {
    /// 1-based rank by XP descending, ties going to the lower user id.
    /// Counted in one statement over `idx_users_rank`; the user table is
    /// never loaded into memory.
    pub async fn rank_of(&self, user_id: i64) -> Result<Option<i64>> {
        let rank: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1
                + (SELECT COUNT(*) FROM users u WHERE u.total_exp > me.total_exp)
                + (SELECT COUNT(*) FROM users u WHERE u.total_exp = me.total_exp AND u.id < me.id)
            FROM users me
            WHERE me.id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rank)
    }

    /// The `limit` highest ranked users, in rank order.
    pub async fn top_users(&self, limit: i64) -> Result<Vec<RankedUser>> {
        let users = sqlx::query_as::<_, RankedUser>(
            r#"
            SELECT id, display_name, total_exp
            FROM users
            ORDER BY total_exp DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn progress_counts(&self, user_id: i64) -> Result<ProgressCounts> {
        let counts = sqlx::query_as::<_, ProgressCounts>(
            r#"
            SELECT
                COUNT(l.id) AS levels_total,
                COALESCE(SUM(l.state = 'completed'), 0) AS levels_completed,
                (SELECT COUNT(*) FROM goals WHERE user_id = ? AND completed_at IS NOT NULL)
                    AS goals_completed
            FROM goals g
            JOIN roadmaps r ON r.goal_id = g.id
            JOIN levels l ON l.roadmap_id = r.id
            WHERE g.user_id = ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }
}
