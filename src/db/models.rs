// Database model structs

use serde::{Deserialize, Serialize};

use crate::models::Difficulty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Archived,
}

/// Level lifecycle: `Locked -> Unlocked -> PendingQuiz -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LevelState {
    Locked,
    Unlocked,
    PendingQuiz,
    Completed,
}

impl LevelState {
    /// Topics may only be ticked off while the level is open.
    pub fn accepts_topic_progress(self) -> bool {
        matches!(self, LevelState::Unlocked | LevelState::PendingQuiz)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct AuthUser {
    pub id: i64,
    pub display_name: String,
    pub total_exp: i64,
}

/// Lightweight goal projection for list views; carries no roadmap payload.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct GoalSummary {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub status: GoalStatus,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub levels_total: i64,
    pub levels_completed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalTree {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub status: GoalStatus,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub roadmap: Roadmap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Roadmap {
    pub id: i64,
    pub name: String,
    pub levels: Vec<Level>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Level {
    pub id: i64,
    pub position: i64,
    pub title: String,
    pub description: Option<String>,
    pub xp_reward: i64,
    pub state: LevelState,
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Topic {
    pub position: i64,
    pub name: String,
    pub completed: bool,
}

/// A level row resolved through its owning goal. Every progression write
/// starts from one of these, so ownership has already been checked.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OwnedLevel {
    pub id: i64,
    pub roadmap_id: i64,
    pub goal_id: i64,
    pub user_id: i64,
    pub position: i64,
    pub title: String,
    pub xp_reward: i64,
    pub state: LevelState,
    pub goal_status: GoalStatus,
    pub topics_total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub value: String,
    pub text: String,
}

/// Quiz question including its answer key. Never leaves the engine as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizQuestion {
    pub position: i64,
    pub question: String,
    pub options: Vec<QuizOption>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizQuestionView {
    pub position: i64,
    pub question: String,
    pub options: Vec<QuizOption>,
}

impl From<QuizQuestion> for QuizQuestionView {
    fn from(q: QuizQuestion) -> Self {
        Self {
            position: q.position,
            question: q.question,
            options: q.options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizView {
    pub level_id: i64,
    pub level_title: String,
    pub time_limit_secs: i64,
    pub questions: Vec<QuizQuestionView>,
}

/// Stored result of one quiz submission. Replays of the same submission id
/// return this row unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct QuizResult {
    pub attempt_id: i64,
    pub level_id: i64,
    pub submission_id: String,
    pub correct: i64,
    pub total: i64,
    pub score: f64,
    pub passed: bool,
    pub xp_awarded: i64,
    pub next_level_unlocked: bool,
    pub goal_completed: bool,
    pub level_state: LevelState,
    pub submitted_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct XpAward {
    pub user_id: i64,
    pub level_id: i64,
    pub amount: i64,
    pub awarded_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: i64,
    pub display_name: String,
    pub total_exp: i64,
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RankedUser {
    pub id: i64,
    pub display_name: String,
    pub total_exp: i64,
}

#[derive(Debug, Clone, PartialEq, Default, sqlx::FromRow)]
pub struct ProgressCounts {
    pub levels_total: i64,
    pub levels_completed: i64,
    pub goals_completed: i64,
}
