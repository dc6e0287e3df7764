use color_eyre::Result;
use serde::Serialize;
use sqlx::SqliteConnection;

use super::helpers::{is_unique_violation, retry_transient};
use super::models::{LevelState, OwnedLevel, QuizResult};
use super::Db;

/// Result of ticking off one topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicOutcome {
    pub level_id: i64,
    pub topic_index: i64,
    /// `false` when the topic was already complete (or the level closed
    /// underneath us); nothing was written in that case.
    pub newly_completed: bool,
    pub topics_completed: i64,
    pub topics_total: i64,
    pub state: LevelState,
}

/// A scored submission ready to be stored.
#[derive(Debug, Clone)]
pub struct AttemptInsert {
    pub user_id: i64,
    pub level: OwnedLevel,
    pub submission_id: String,
    pub correct: i64,
    pub total: i64,
    pub score: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Recorded(QuizResult),
    /// Another request already stored this submission id.
    Duplicate,
    /// The level was no longer awaiting its quiz when the attempt was stored.
    LevelNotPending,
    /// The goal was archived before the attempt was stored.
    GoalArchived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnlockOutcome {
    Unlocked,
    AlreadyOpen,
    LastLevel,
}

impl Db {
    /// Mark topic `topic_index` of a level complete and, once every topic is
    /// done, move the level from `unlocked` to `pending_quiz`. Both writes are
    /// conditional so concurrent calls converge on the same state.
    pub async fn complete_topic(&self, level: &OwnedLevel, topic_index: i64) -> Result<TopicOutcome> {
        let outcome = retry_transient("complete_topic", move || {
            self.complete_topic_tx(level.id, topic_index)
        })
        .await?;

        if outcome.newly_completed {
            tracing::info!(
                "topic completed: level_id={}, topic={topic_index}, progress={}/{}, state={:?}",
                level.id,
                outcome.topics_completed,
                outcome.topics_total,
                outcome.state
            );
        }
        Ok(outcome)
    }

    async fn complete_topic_tx(&self, level_id: i64, topic_index: i64) -> sqlx::Result<TopicOutcome> {
        let mut tx = self.pool.begin().await?;

        let marked = sqlx::query(
            r#"
            UPDATE topics
            SET completed = 1, completed_at = CURRENT_TIMESTAMP
            WHERE level_id = ? AND position = ? AND completed = 0
              AND EXISTS (
                SELECT 1 FROM levels l
                JOIN roadmaps r ON r.id = l.roadmap_id
                JOIN goals g ON g.id = r.goal_id
                WHERE l.id = ? AND l.state IN ('unlocked', 'pending_quiz') AND g.status = 'active'
              )
            "#,
        )
        .bind(level_id)
        .bind(topic_index)
        .bind(level_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            r#"
            UPDATE levels SET state = 'pending_quiz'
            WHERE id = ? AND state = 'unlocked'
              AND NOT EXISTS (SELECT 1 FROM topics WHERE level_id = ? AND completed = 0)
            "#,
        )
        .bind(level_id)
        .bind(level_id)
        .execute(&mut *tx)
        .await?;

        let (state, topics_completed, topics_total): (LevelState, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                l.state,
                (SELECT COUNT(*) FROM topics t WHERE t.level_id = l.id AND t.completed = 1),
                (SELECT COUNT(*) FROM topics t WHERE t.level_id = l.id)
            FROM levels l
            WHERE l.id = ?
            "#,
        )
        .bind(level_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(TopicOutcome {
            level_id,
            topic_index,
            newly_completed: marked > 0,
            topics_completed,
            topics_total,
            state,
        })
    }

    /// Store a scored quiz submission. A passing attempt also completes the
    /// level, awards its XP at most once, unlocks the next level and closes
    /// the goal after its last level, all in the same transaction.
    pub async fn record_attempt(&self, attempt: &AttemptInsert) -> Result<SubmissionOutcome> {
        let outcome = retry_transient("record_attempt", move || async move {
            if attempt.passed {
                self.record_pass_tx(attempt).await
            } else {
                self.record_fail_tx(attempt).await
            }
        })
        .await?;

        match &outcome {
            SubmissionOutcome::Recorded(result) => tracing::info!(
                "quiz attempt recorded: user_id={}, level_id={}, submission={}, score={}/{}, passed={}, xp={}",
                attempt.user_id,
                result.level_id,
                result.submission_id,
                result.correct,
                result.total,
                result.passed,
                result.xp_awarded
            ),
            SubmissionOutcome::Duplicate => tracing::info!(
                "quiz submission {} for level_id={} already stored",
                attempt.submission_id,
                attempt.level.id
            ),
            SubmissionOutcome::LevelNotPending => tracing::warn!(
                "submission {} found level_id={} no longer pending its quiz",
                attempt.submission_id,
                attempt.level.id
            ),
            SubmissionOutcome::GoalArchived => tracing::warn!(
                "submission {} for level_id={} arrived after goal_id={} was archived",
                attempt.submission_id,
                attempt.level.id,
                attempt.level.goal_id
            ),
        }
        Ok(outcome)
    }

    async fn record_fail_tx(&self, attempt: &AttemptInsert) -> sqlx::Result<SubmissionOutcome> {
        let mut tx = self.pool.begin().await?;

        // No-op write that takes the write lock and re-checks the level and
        // goal under it, so a failure cannot land on a level that completed
        // or a goal that was archived after the caller loaded them.
        let open = sqlx::query(
            r#"
            UPDATE levels SET state = state
            WHERE id = ? AND state = 'pending_quiz'
              AND EXISTS (
                SELECT 1 FROM roadmaps r JOIN goals g ON g.id = r.goal_id
                WHERE r.id = levels.roadmap_id AND g.status = 'active'
              )
            "#,
        )
        .bind(attempt.level.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if open == 0 {
            let outcome = closed_outcome(&mut tx, attempt.level.goal_id).await?;
            tx.rollback().await?;
            return Ok(outcome);
        }

        let stored = insert_attempt(
            &mut tx,
            attempt,
            AttemptEffects {
                xp_awarded: 0,
                next_level_unlocked: false,
                goal_completed: false,
                level_state: attempt.level.state,
            },
        )
        .await;

        let result = match stored {
            Ok(result) => result,
            Err(e) if is_unique_violation(&e) => return Ok(SubmissionOutcome::Duplicate),
            Err(e) => return Err(e),
        };

        tx.commit().await?;
        Ok(SubmissionOutcome::Recorded(result))
    }

    async fn record_pass_tx(&self, attempt: &AttemptInsert) -> sqlx::Result<SubmissionOutcome> {
        let level = &attempt.level;
        let mut tx = self.pool.begin().await?;

        // Compare-and-set on the level: only one passing attempt can move it
        // out of pending_quiz.
        let moved = sqlx::query(
            r#"
            UPDATE levels SET state = 'completed'
            WHERE id = ? AND state = 'pending_quiz'
              AND EXISTS (
                SELECT 1 FROM roadmaps r JOIN goals g ON g.id = r.goal_id
                WHERE r.id = levels.roadmap_id AND g.status = 'active'
              )
            "#,
        )
        .bind(level.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if moved == 0 {
            let outcome = closed_outcome(&mut tx, level.goal_id).await?;
            tx.rollback().await?;
            return Ok(outcome);
        }

        let awarded = award_xp_tx(&mut tx, attempt.user_id, level.id, level.xp_reward).await?;
        let unlock = unlock_next_tx(&mut tx, level.roadmap_id, level.position).await?;

        let goal_completed = unlock == UnlockOutcome::LastLevel;
        if goal_completed {
            sqlx::query(
                "UPDATE goals SET completed_at = CURRENT_TIMESTAMP WHERE id = ? AND completed_at IS NULL",
            )
            .bind(level.goal_id)
            .execute(&mut *tx)
            .await?;
        }

        let stored = insert_attempt(
            &mut tx,
            attempt,
            AttemptEffects {
                xp_awarded: if awarded { level.xp_reward } else { 0 },
                next_level_unlocked: unlock == UnlockOutcome::Unlocked,
                goal_completed,
                level_state: LevelState::Completed,
            },
        )
        .await;

        let result = match stored {
            Ok(result) => result,
            Err(e) if is_unique_violation(&e) => return Ok(SubmissionOutcome::Duplicate),
            Err(e) => return Err(e),
        };

        tx.commit().await?;

        if awarded {
            tracing::info!(
                "xp awarded: user_id={}, level_id={}, amount={}",
                attempt.user_id,
                level.id,
                level.xp_reward
            );
        }
        if unlock == UnlockOutcome::Unlocked {
            tracing::info!(
                "level unlocked: roadmap_id={}, position={}",
                level.roadmap_id,
                level.position + 1
            );
        }
        if goal_completed {
            tracing::info!("goal completed: goal_id={}", level.goal_id);
        }

        Ok(SubmissionOutcome::Recorded(result))
    }
}

/// Why a level refused an attempt: its goal was archived, or it had left
/// `pending_quiz`.
async fn closed_outcome(conn: &mut SqliteConnection, goal_id: i64) -> sqlx::Result<SubmissionOutcome> {
    let archived: bool =
        sqlx::query_scalar("SELECT status = 'archived' FROM goals WHERE id = ?")
            .bind(goal_id)
            .fetch_one(&mut *conn)
            .await?;

    Ok(if archived {
        SubmissionOutcome::GoalArchived
    } else {
        SubmissionOutcome::LevelNotPending
    })
}

struct AttemptEffects {
    xp_awarded: i64,
    next_level_unlocked: bool,
    goal_completed: bool,
    level_state: LevelState,
}

async fn insert_attempt(
    conn: &mut SqliteConnection,
    attempt: &AttemptInsert,
    effects: AttemptEffects,
) -> sqlx::Result<QuizResult> {
    sqlx::query_as::<_, QuizResult>(
        r#"
        INSERT INTO quiz_attempts (
            user_id, level_id, submission_id, correct, total, score, passed,
            xp_awarded, next_level_unlocked, goal_completed, level_state
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING
            id AS attempt_id, level_id, submission_id, correct, total, score, passed,
            xp_awarded, next_level_unlocked, goal_completed, level_state,
            created_at AS submitted_at
        "#,
    )
    .bind(attempt.user_id)
    .bind(attempt.level.id)
    .bind(&attempt.submission_id)
    .bind(attempt.correct)
    .bind(attempt.total)
    .bind(attempt.score)
    .bind(attempt.passed)
    .bind(effects.xp_awarded)
    .bind(effects.next_level_unlocked)
    .bind(effects.goal_completed)
    .bind(effects.level_state)
    .fetch_one(&mut *conn)
    .await
}

/// Check-and-set against the (user, level) ledger key; the XP total only
/// moves when the ledger row is new.
async fn award_xp_tx(
    conn: &mut SqliteConnection,
    user_id: i64,
    level_id: i64,
    amount: i64,
) -> sqlx::Result<bool> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO xp_awards (user_id, level_id, amount) VALUES (?, ?, ?)
        ON CONFLICT (user_id, level_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(level_id)
    .bind(amount)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 0 {
        return Ok(false);
    }

    sqlx::query("UPDATE users SET total_exp = total_exp + ? WHERE id = ?")
        .bind(amount)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(true)
}

async fn unlock_next_tx(
    conn: &mut SqliteConnection,
    roadmap_id: i64,
    position: i64,
) -> sqlx::Result<UnlockOutcome> {
    let next: Option<(i64, LevelState)> =
        sqlx::query_as("SELECT id, state FROM levels WHERE roadmap_id = ? AND position = ?")
            .bind(roadmap_id)
            .bind(position + 1)
            .fetch_optional(&mut *conn)
            .await?;

    match next {
        None => Ok(UnlockOutcome::LastLevel),
        Some((next_id, LevelState::Locked)) => {
            sqlx::query("UPDATE levels SET state = 'unlocked' WHERE id = ? AND state = 'locked'")
                .bind(next_id)
                .execute(&mut *conn)
                .await?;
            Ok(UnlockOutcome::Unlocked)
        }
        Some(_) => Ok(UnlockOutcome::AlreadyOpen),
    }
}
