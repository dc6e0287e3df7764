use std::collections::HashMap;

use color_eyre::Result;
use sqlx::{FromRow, SqliteConnection};

use super::helpers::retry_transient;
use super::models::{GoalStatus, GoalSummary, GoalTree, Level, LevelState, Roadmap, Topic};
use super::Db;
use crate::models::{Difficulty, LevelSpec, RoadmapSpec};

const GOAL_SUMMARY_SELECT: &str = r#"
    SELECT
        g.id,
        g.title,
        g.category,
        g.difficulty,
        g.status,
        g.created_at,
        g.completed_at,
        (SELECT COUNT(*) FROM levels l WHERE l.roadmap_id = r.id) AS levels_total,
        (SELECT COUNT(*) FROM levels l WHERE l.roadmap_id = r.id AND l.state = 'completed') AS levels_completed
    FROM goals g
    JOIN roadmaps r ON r.goal_id = g.id
"#;

#[derive(FromRow)]
struct GoalRow {
    id: i64,
    title: String,
    description: String,
    category: String,
    difficulty: Difficulty,
    status: GoalStatus,
    created_at: String,
    completed_at: Option<String>,
    roadmap_id: i64,
    roadmap_name: String,
}

#[derive(FromRow)]
struct LevelRow {
    id: i64,
    position: i64,
    title: String,
    description: Option<String>,
    xp_reward: i64,
    state: LevelState,
}

#[derive(FromRow)]
struct TopicRow {
    level_id: i64,
    position: i64,
    name: String,
    completed: bool,
}

impl Db {
    /// Persist a generated roadmap as a new goal in one transaction: goal,
    /// roadmap, levels numbered 1..N, topics and quiz. Level 1 starts
    /// unlocked, every other level locked. Returns the goal id.
    pub async fn create_goal_tree(
        &self,
        user_id: i64,
        description: &str,
        spec: &RoadmapSpec,
        default_xp_reward: i64,
    ) -> Result<i64> {
        let goal_id = retry_transient("create_goal_tree", move || {
            self.create_goal_tree_tx(user_id, description, spec, default_xp_reward)
        })
        .await?;

        tracing::info!(
            "new goal created: id={goal_id}, user_id={user_id}, levels={}",
            spec.levels.len()
        );
        Ok(goal_id)
    }

    async fn create_goal_tree_tx(
        &self,
        user_id: i64,
        description: &str,
        spec: &RoadmapSpec,
        default_xp_reward: i64,
    ) -> sqlx::Result<i64> {
        let mut tx = self.pool.begin().await?;

        let goal_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO goals (user_id, title, description, category, difficulty, status)
            VALUES (?, ?, ?, ?, ?, 'active')
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(&spec.title)
        .bind(description)
        .bind(&spec.category)
        .bind(spec.difficulty)
        .fetch_one(&mut *tx)
        .await?;

        let roadmap_id: i64 =
            sqlx::query_scalar("INSERT INTO roadmaps (goal_id, name) VALUES (?, ?) RETURNING id")
                .bind(goal_id)
                .bind(&spec.name)
                .fetch_one(&mut *tx)
                .await?;

        for (idx, level) in spec.levels.iter().enumerate() {
            let position = idx as i64 + 1;
            let state = if position == 1 {
                LevelState::Unlocked
            } else {
                LevelState::Locked
            };
            let xp_reward = level.xp_reward.unwrap_or(default_xp_reward);
            insert_level(&mut tx, roadmap_id, position, state, xp_reward, level).await?;
        }

        tx.commit().await?;
        Ok(goal_id)
    }

    /// Full goal tree, or `None` when the goal does not exist for this owner.
    pub async fn goal_tree(&self, owner_id: i64, goal_id: i64) -> Result<Option<GoalTree>> {
        let goal = sqlx::query_as::<_, GoalRow>(
            r#"
            SELECT
                g.id, g.title, g.description, g.category, g.difficulty, g.status,
                g.created_at, g.completed_at,
                r.id AS roadmap_id, r.name AS roadmap_name
            FROM goals g
            JOIN roadmaps r ON r.goal_id = g.id
            WHERE g.id = ? AND g.user_id = ?
            "#,
        )
        .bind(goal_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(goal) = goal else {
            return Ok(None);
        };

        let level_rows = sqlx::query_as::<_, LevelRow>(
            r#"
            SELECT id, position, title, description, xp_reward, state
            FROM levels
            WHERE roadmap_id = ?
            ORDER BY position
            "#,
        )
        .bind(goal.roadmap_id)
        .fetch_all(&self.pool)
        .await?;

        let topic_rows = sqlx::query_as::<_, TopicRow>(
            r#"
            SELECT t.level_id, t.position, t.name, t.completed
            FROM topics t
            JOIN levels l ON l.id = t.level_id
            WHERE l.roadmap_id = ?
            ORDER BY t.level_id, t.position
            "#,
        )
        .bind(goal.roadmap_id)
        .fetch_all(&self.pool)
        .await?;

        let mut topics_by_level: HashMap<i64, Vec<Topic>> = HashMap::new();
        for t in topic_rows {
            topics_by_level.entry(t.level_id).or_default().push(Topic {
                position: t.position,
                name: t.name,
                completed: t.completed,
            });
        }

        let levels = level_rows
            .into_iter()
            .map(|l| Level {
                topics: topics_by_level.remove(&l.id).unwrap_or_default(),
                id: l.id,
                position: l.position,
                title: l.title,
                description: l.description,
                xp_reward: l.xp_reward,
                state: l.state,
            })
            .collect();

        Ok(Some(GoalTree {
            id: goal.id,
            title: goal.title,
            description: goal.description,
            category: goal.category,
            difficulty: goal.difficulty,
            status: goal.status,
            created_at: goal.created_at,
            completed_at: goal.completed_at,
            roadmap: Roadmap {
                id: goal.roadmap_id,
                name: goal.roadmap_name,
                levels,
            },
        }))
    }

    /// Owner's goals, newest first, without roadmap payload.
    pub async fn goal_summaries(&self, owner_id: i64) -> Result<Vec<GoalSummary>> {
        let sql = format!("{GOAL_SUMMARY_SELECT} WHERE g.user_id = ? ORDER BY g.id DESC");
        let goals = sqlx::query_as::<_, GoalSummary>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(goals)
    }

    /// Archive a goal. Returns `false` when the owner has no such goal;
    /// archiving twice is fine.
    pub async fn archive_goal(&self, owner_id: i64, goal_id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE goals SET status = 'archived' WHERE id = ? AND user_id = ?")
            .bind(goal_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        let found = result.rows_affected() > 0;
        if found {
            tracing::info!("goal archived: id={goal_id}, user_id={owner_id}");
        }
        Ok(found)
    }
}

async fn insert_level(
    conn: &mut SqliteConnection,
    roadmap_id: i64,
    position: i64,
    state: LevelState,
    xp_reward: i64,
    level: &LevelSpec,
) -> sqlx::Result<()> {
    let level_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO levels (roadmap_id, position, title, description, xp_reward, state)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(roadmap_id)
    .bind(position)
    .bind(&level.title)
    .bind(&level.description)
    .bind(xp_reward)
    .bind(state)
    .fetch_one(&mut *conn)
    .await?;

    for (idx, topic) in level.topics.iter().enumerate() {
        sqlx::query("INSERT INTO topics (level_id, position, name) VALUES (?, ?, ?)")
            .bind(level_id)
            .bind(idx as i64)
            .bind(topic)
            .execute(&mut *conn)
            .await?;
    }

    for (q_idx, question) in level.quiz.questions.iter().enumerate() {
        let question_id: i64 = sqlx::query_scalar(
            "INSERT INTO quiz_questions (level_id, position, question) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(level_id)
        .bind(q_idx as i64)
        .bind(&question.question)
        .fetch_one(&mut *conn)
        .await?;

        for (o_idx, option) in question.options.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO quiz_options (question_id, position, value, text, is_answer)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(question_id)
            .bind(o_idx as i64)
            .bind(&option.value)
            .bind(&option.text)
            .bind(option.value == question.correct_answer)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}
