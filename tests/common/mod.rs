#![allow(dead_code)]

use color_eyre::Result;
use questline::{
    config::Policy,
    db::{models::AuthUser, Db},
    models::{Difficulty, LevelSpec, OptionSpec, QuestionSpec, QuizSpec, RoadmapSpec},
    services::goals::RoadmapGenerator,
    AppState,
};

pub const LEVELS: usize = 3;
pub const TOPICS_PER_LEVEL: usize = 3;
pub const QUESTIONS_PER_QUIZ: usize = 10;
pub const LEVEL_ONE_XP: i64 = 150;
pub const LEVEL_THREE_XP: i64 = 300;
pub const GOAL_DESCRIPTION: &str = "I want to learn Rust for systems programming";

const OPTION_VALUES: [&str; 4] = ["A", "B", "C", "D"];

/// Fresh on-disk SQLite database, unique per call. Returns the handle and
/// its URL for tests that need a second raw connection.
pub async fn create_test_db_with_url() -> (Db, String) {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path =
        std::env::temp_dir().join(format!("questline_test_{}_{}.db", std::process::id(), id));
    // Clean up leftover files from previous runs
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
    let url = format!("sqlite://{}", path.display());
    let db = Db::new(&url).await.expect("failed to create test database");
    (db, url)
}

pub async fn create_test_db() -> Db {
    create_test_db_with_url().await.0
}

/// Correct option for question `i` of every fixture quiz.
pub fn correct_option(i: usize) -> &'static str {
    OPTION_VALUES[i % OPTION_VALUES.len()]
}

/// Answer sheet with the first `correct` answers right and the rest wrong.
pub fn answers(correct: usize) -> Vec<String> {
    (0..QUESTIONS_PER_QUIZ)
        .map(|i| {
            let value = if i < correct {
                correct_option(i)
            } else {
                correct_option(i + 1)
            };
            value.to_string()
        })
        .collect()
}

pub fn fixture_spec() -> RoadmapSpec {
    RoadmapSpec {
        title: "Rust for systems programming".to_string(),
        category: "Programming".to_string(),
        difficulty: Difficulty::Intermediate,
        name: "From ownership to async".to_string(),
        levels: (0..LEVELS)
            .map(|l| LevelSpec {
                title: format!("Level {}", l + 1),
                description: Some(format!("Stage {} of the roadmap", l + 1)),
                topics: (0..TOPICS_PER_LEVEL)
                    .map(|t| format!("topic {}.{}", l + 1, t + 1))
                    .collect(),
                // Level 2 takes the policy default.
                xp_reward: match l {
                    0 => Some(LEVEL_ONE_XP),
                    2 => Some(LEVEL_THREE_XP),
                    _ => None,
                },
                quiz: QuizSpec {
                    questions: (0..QUESTIONS_PER_QUIZ)
                        .map(|q| QuestionSpec {
                            question: format!("Question {}.{}?", l + 1, q + 1),
                            options: OPTION_VALUES
                                .iter()
                                .map(|v| OptionSpec {
                                    value: v.to_string(),
                                    text: format!("answer {v}"),
                                })
                                .collect(),
                            correct_answer: correct_option(q).to_string(),
                        })
                        .collect(),
                },
            })
            .collect(),
    }
}

/// Deterministic stand-in for the OpenAI generator.
#[derive(Clone, Default)]
pub struct FixtureGenerator {
    pub fail: bool,
    pub empty: bool,
}

impl RoadmapGenerator for FixtureGenerator {
    async fn generate(&self, _description: &str) -> Result<RoadmapSpec> {
        if self.fail {
            color_eyre::eyre::bail!("generator unavailable");
        }
        let mut spec = fixture_spec();
        if self.empty {
            spec.levels.clear();
        }
        Ok(spec)
    }
}

pub fn app_state(db: Db) -> AppState<FixtureGenerator> {
    AppState::new(db, FixtureGenerator::default(), Policy::default())
}

pub fn app_state_with(db: Db, generator: FixtureGenerator, policy: Policy) -> AppState<FixtureGenerator> {
    AppState::new(db, generator, policy)
}

pub async fn register(db: &Db, name: &str) -> AuthUser {
    db.create_user(name).await.expect("create user")
}

/// Level ids of a goal in roadmap order.
pub async fn level_ids(state: &AppState<FixtureGenerator>, user_id: i64, goal_id: i64) -> Vec<i64> {
    let goal = state.goals.get_goal(user_id, goal_id).await.expect("load goal");
    goal.roadmap.levels.iter().map(|l| l.id).collect()
}

/// New goal for `user_id`; returns its level ids in order.
pub async fn new_goal(state: &AppState<FixtureGenerator>, user_id: i64) -> (i64, Vec<i64>) {
    let goal = state
        .goals
        .create_goal(user_id, GOAL_DESCRIPTION)
        .await
        .expect("create goal");
    let levels = goal.roadmap.levels.iter().map(|l| l.id).collect();
    (goal.id, levels)
}

pub async fn complete_all_topics(state: &AppState<FixtureGenerator>, user_id: i64, level_id: i64) {
    for topic in 0..TOPICS_PER_LEVEL as i64 {
        state
            .progression
            .complete_topic(user_id, level_id, topic)
            .await
            .expect("complete topic");
    }
}

/// Drive a level from unlocked to completed with a perfect score.
pub async fn pass_level(state: &AppState<FixtureGenerator>, user_id: i64, level_id: i64) {
    complete_all_topics(state, user_id, level_id).await;
    let result = state
        .quizzes
        .submit_quiz(user_id, level_id, &format!("pass-{level_id}"), &answers(QUESTIONS_PER_QUIZ))
        .await
        .expect("submit quiz");
    assert!(result.passed);
}
