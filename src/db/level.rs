use color_eyre::Result;

use super::models::{Level, LevelState, OwnedLevel, Topic};
use super::Db;

impl Db {
    /// Resolve a level through roadmap and goal to its owner. `None` both when
    /// the level is missing and when it belongs to another user.
    pub async fn owned_level(&self, owner_id: i64, level_id: i64) -> Result<Option<OwnedLevel>> {
        let level = sqlx::query_as::<_, OwnedLevel>(
            r#"
            SELECT
                l.id,
                l.roadmap_id,
                g.id AS goal_id,
                g.user_id,
                l.position,
                l.title,
                l.xp_reward,
                l.state,
                g.status AS goal_status,
                (SELECT COUNT(*) FROM topics t WHERE t.level_id = l.id) AS topics_total
            FROM levels l
            JOIN roadmaps r ON r.id = l.roadmap_id
            JOIN goals g ON g.id = r.goal_id
            WHERE l.id = ? AND g.user_id = ?
            "#,
        )
        .bind(level_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(level)
    }

    pub async fn level_detail(&self, owner_id: i64, level_id: i64) -> Result<Option<Level>> {
        let row = sqlx::query_as::<_, (i64, i64, String, Option<String>, i64, LevelState)>(
            r#"
            SELECT l.id, l.position, l.title, l.description, l.xp_reward, l.state
            FROM levels l
            JOIN roadmaps r ON r.id = l.roadmap_id
            JOIN goals g ON g.id = r.goal_id
            WHERE l.id = ? AND g.user_id = ?
            "#,
        )
        .bind(level_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, position, title, description, xp_reward, state)) = row else {
            return Ok(None);
        };

        let topics = self.topics(id).await?;

        Ok(Some(Level {
            id,
            position,
            title,
            description,
            xp_reward,
            state,
            topics,
        }))
    }

    pub async fn topics(&self, level_id: i64) -> Result<Vec<Topic>> {
        let topics = sqlx::query_as::<_, Topic>(
            "SELECT position, name, completed FROM topics WHERE level_id = ? ORDER BY position",
        )
        .bind(level_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(topics)
    }

    pub async fn level_state(&self, level_id: i64) -> Result<LevelState> {
        let state: LevelState = sqlx::query_scalar("SELECT state FROM levels WHERE id = ?")
            .bind(level_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(state)
    }
}
