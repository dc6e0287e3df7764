use color_eyre::Result;
use serde::Serialize;

use crate::db::models::{AuthUser, GoalStatus, LevelState, OwnedLevel, ProgressCounts};
use crate::db::{Db, TopicOutcome};
use crate::names::EXP_PER_LEVEL_UNIT;
use crate::rejections::{AppError, ResultExt};

// ---------------------------------------------------------------------------
// ProgressionRepository trait (DIP: service defines the abstraction it needs)
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait ProgressionRepository: Send + Sync {
    fn owned_level(
        &self,
        owner_id: i64,
        level_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<OwnedLevel>>> + Send;

    fn complete_topic(
        &self,
        level: &OwnedLevel,
        topic_index: i64,
    ) -> impl std::future::Future<Output = Result<TopicOutcome>> + Send;

    fn get_user(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<AuthUser>>> + Send;

    fn progress_counts(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<ProgressCounts>> + Send;

    fn rank_of(&self, user_id: i64) -> impl std::future::Future<Output = Result<Option<i64>>> + Send;
}

impl ProgressionRepository for Db {
    fn owned_level(
        &self,
        owner_id: i64,
        level_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<OwnedLevel>>> + Send {
        Db::owned_level(self, owner_id, level_id)
    }

    fn complete_topic(
        &self,
        level: &OwnedLevel,
        topic_index: i64,
    ) -> impl std::future::Future<Output = Result<TopicOutcome>> + Send {
        Db::complete_topic(self, level, topic_index)
    }

    fn get_user(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<AuthUser>>> + Send {
        Db::get_user(self, user_id)
    }

    fn progress_counts(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<ProgressCounts>> + Send {
        Db::progress_counts(self, user_id)
    }

    fn rank_of(&self, user_id: i64) -> impl std::future::Future<Output = Result<Option<i64>>> + Send {
        Db::rank_of(self, user_id)
    }
}

/// Experience level derived from total XP: `1 + floor(sqrt(total / 100))`.
/// Level 2 starts at 100 XP, level 3 at 400, level 4 at 900.
pub fn experience_level(total_exp: i64) -> i64 {
    let units = total_exp.max(0) / EXP_PER_LEVEL_UNIT;
    let mut root = (units as f64).sqrt() as i64;
    // Correct float rounding at perfect squares.
    while root * root > units {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= units {
        root += 1;
    }
    1 + root
}

/// Total XP at which `level` is reached.
pub fn experience_for_level(level: i64) -> i64 {
    let steps = (level - 1).max(0);
    steps * steps * EXP_PER_LEVEL_UNIT
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub user_id: i64,
    pub display_name: String,
    pub total_exp: i64,
    pub level: i64,
    pub next_level_exp: i64,
    pub levels_completed: i64,
    pub levels_total: i64,
    pub goals_completed: i64,
    pub completion_percent: i64,
    pub rank: i64,
}

// ---------------------------------------------------------------------------
// ProgressionService
// ---------------------------------------------------------------------------

pub struct ProgressionService<R: ProgressionRepository = Db> {
    repo: R,
}

impl<R: ProgressionRepository + Clone> Clone for ProgressionService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<R: ProgressionRepository> ProgressionService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Tick off a topic. Repeating it is a no-op; finishing the last topic
    /// moves the level to `PendingQuiz`.
    pub async fn complete_topic(
        &self,
        owner_id: i64,
        level_id: i64,
        topic_index: i64,
    ) -> Result<TopicOutcome, AppError> {
        let level = self
            .repo
            .owned_level(owner_id, level_id)
            .await
            .reject("could not load level")?
            .ok_or(AppError::NotFound)?;

        if level.goal_status == GoalStatus::Archived {
            tracing::warn!("topic completion on archived goal: level_id={level_id}");
            return Err(AppError::Conflict("goal is archived"));
        }

        match level.state {
            LevelState::Locked => {
                tracing::warn!("topic completion on locked level: level_id={level_id}");
                return Err(AppError::Conflict("level is locked"));
            }
            LevelState::Completed => {
                tracing::warn!("topic completion on completed level: level_id={level_id}");
                return Err(AppError::Conflict("level is already completed"));
            }
            LevelState::Unlocked | LevelState::PendingQuiz => {}
        }

        if !(0..level.topics_total).contains(&topic_index) {
            return Err(AppError::Validation(format!(
                "topic index {topic_index} is out of range, level has {} topics",
                level.topics_total
            )));
        }

        self.repo
            .complete_topic(&level, topic_index)
            .await
            .reject("could not complete topic")
    }

    pub async fn stats(&self, user_id: i64) -> Result<Stats, AppError> {
        let user = self
            .repo
            .get_user(user_id)
            .await
            .reject("could not load user")?
            .ok_or(AppError::NotFound)?;

        let counts = self
            .repo
            .progress_counts(user_id)
            .await
            .reject("could not count progress")?;

        let rank = self
            .repo
            .rank_of(user_id)
            .await
            .reject("could not compute rank")?
            .ok_or(AppError::NotFound)?;

        let level = experience_level(user.total_exp);
        let completion_percent = if counts.levels_total == 0 {
            0
        } else {
            counts.levels_completed * 100 / counts.levels_total
        };

        Ok(Stats {
            user_id: user.id,
            display_name: user.display_name,
            total_exp: user.total_exp,
            level,
            next_level_exp: experience_for_level(level + 1),
            levels_completed: counts.levels_completed,
            levels_total: counts.levels_total,
            goals_completed: counts.goals_completed,
            completion_percent,
            rank,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
