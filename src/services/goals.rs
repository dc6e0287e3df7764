use color_eyre::Result;

use crate::config::Policy;
use crate::db::models::{GoalSummary, GoalTree, Level};
use crate::db::Db;
use crate::generator::OpenAiGenerator;
use crate::models::RoadmapSpec;
use crate::names::{MAX_GOAL_DESCRIPTION_LEN, MIN_GOAL_DESCRIPTION_LEN};
use crate::rejections::{AppError, ResultExt};

// ---------------------------------------------------------------------------
// GoalRepository trait (DIP: service defines the abstraction it needs)
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait GoalRepository: Send + Sync {
    fn create_goal_tree(
        &self,
        user_id: i64,
        description: &str,
        spec: &RoadmapSpec,
        default_xp_reward: i64,
    ) -> impl std::future::Future<Output = Result<i64>> + Send;

    fn goal_tree(
        &self,
        owner_id: i64,
        goal_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<GoalTree>>> + Send;

    fn goal_summaries(
        &self,
        owner_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<GoalSummary>>> + Send;

    fn archive_goal(
        &self,
        owner_id: i64,
        goal_id: i64,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn level_detail(
        &self,
        owner_id: i64,
        level_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Level>>> + Send;
}

impl GoalRepository for Db {
    fn create_goal_tree(
        &self,
        user_id: i64,
        description: &str,
        spec: &RoadmapSpec,
        default_xp_reward: i64,
    ) -> impl std::future::Future<Output = Result<i64>> + Send {
        Db::create_goal_tree(self, user_id, description, spec, default_xp_reward)
    }

    fn goal_tree(
        &self,
        owner_id: i64,
        goal_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<GoalTree>>> + Send {
        Db::goal_tree(self, owner_id, goal_id)
    }

    fn goal_summaries(
        &self,
        owner_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<GoalSummary>>> + Send {
        Db::goal_summaries(self, owner_id)
    }

    fn archive_goal(
        &self,
        owner_id: i64,
        goal_id: i64,
    ) -> impl std::future::Future<Output = Result<bool>> + Send {
        Db::archive_goal(self, owner_id, goal_id)
    }

    fn level_detail(
        &self,
        owner_id: i64,
        level_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Level>>> + Send {
        Db::level_detail(self, owner_id, level_id)
    }
}

// ---------------------------------------------------------------------------
// RoadmapGenerator trait
// ---------------------------------------------------------------------------

/// Produces the initial roadmap for a goal. Called once per goal creation;
/// nothing is persisted when it fails.
#[cfg_attr(test, mockall::automock)]
pub trait RoadmapGenerator: Send + Sync {
    fn generate(
        &self,
        description: &str,
    ) -> impl std::future::Future<Output = Result<RoadmapSpec>> + Send;
}

// ---------------------------------------------------------------------------
// GoalService
// ---------------------------------------------------------------------------

pub struct GoalService<R: GoalRepository = Db, G: RoadmapGenerator = OpenAiGenerator> {
    repo: R,
    generator: G,
    policy: Policy,
}

impl<R: GoalRepository + Clone, G: RoadmapGenerator + Clone> Clone for GoalService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            generator: self.generator.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<R: GoalRepository, G: RoadmapGenerator> GoalService<R, G> {
    pub fn new(repo: R, generator: G, policy: Policy) -> Self {
        Self {
            repo,
            generator,
            policy,
        }
    }

    /// Generate a roadmap for `description` and persist the whole goal tree.
    pub async fn create_goal(&self, owner_id: i64, description: &str) -> Result<GoalTree, AppError> {
        let description = description.trim();
        let len = description.chars().count();
        if !(MIN_GOAL_DESCRIPTION_LEN..=MAX_GOAL_DESCRIPTION_LEN).contains(&len) {
            return Err(AppError::Validation(format!(
                "goal description must be {MIN_GOAL_DESCRIPTION_LEN} to {MAX_GOAL_DESCRIPTION_LEN} characters, got {len}"
            )));
        }

        let spec = self.generator.generate(description).await.map_err(|e| {
            tracing::warn!("roadmap generation failed for user_id={owner_id}: {e}");
            AppError::Upstream("roadmap generation failed".to_string())
        })?;

        if let Err(problem) = spec.validate() {
            tracing::warn!("generated roadmap rejected for user_id={owner_id}: {problem}");
            return Err(AppError::Upstream(format!("generated roadmap is invalid: {problem}")));
        }

        let goal_id = self
            .repo
            .create_goal_tree(owner_id, description, &spec, self.policy.default_xp_reward)
            .await
            .reject("could not persist goal")?;

        self.get_goal(owner_id, goal_id).await
    }

    pub async fn get_goal(&self, owner_id: i64, goal_id: i64) -> Result<GoalTree, AppError> {
        self.repo
            .goal_tree(owner_id, goal_id)
            .await
            .reject("could not load goal")?
            .ok_or(AppError::NotFound)
    }

    pub async fn list_goals(&self, owner_id: i64) -> Result<Vec<GoalSummary>, AppError> {
        self.repo
            .goal_summaries(owner_id)
            .await
            .reject("could not list goals")
    }

    /// Archive a goal, freezing its progression. Archiving twice is a no-op.
    pub async fn archive_goal(&self, owner_id: i64, goal_id: i64) -> Result<GoalTree, AppError> {
        let found = self
            .repo
            .archive_goal(owner_id, goal_id)
            .await
            .reject("could not archive goal")?;

        if !found {
            return Err(AppError::NotFound);
        }

        self.get_goal(owner_id, goal_id).await
    }

    pub async fn get_level(&self, owner_id: i64, level_id: i64) -> Result<Level, AppError> {
        self.repo
            .level_detail(owner_id, level_id)
            .await
            .reject("could not load level")?
            .ok_or(AppError::NotFound)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::models::{GoalStatus, LevelState, Roadmap};
    use crate::models::{Difficulty, LevelSpec, OptionSpec, QuestionSpec, QuizSpec};

    fn spec(levels: usize) -> RoadmapSpec {
        RoadmapSpec {
            title: "Learn Rust".to_string(),
            category: "Programming".to_string(),
            difficulty: Difficulty::Beginner,
            name: "Rust roadmap".to_string(),
            levels: (0..levels)
                .map(|i| LevelSpec {
                    title: format!("Level {}", i + 1),
                    description: None,
                    topics: vec!["a".to_string(), "b".to_string()],
                    xp_reward: None,
                    quiz: QuizSpec {
                        questions: vec![QuestionSpec {
                            question: "?".to_string(),
                            options: vec![
                                OptionSpec {
                                    value: "A".to_string(),
                                    text: "yes".to_string(),
                                },
                                OptionSpec {
                                    value: "B".to_string(),
                                    text: "no".to_string(),
                                },
                            ],
                            correct_answer: "A".to_string(),
                        }],
                    },
                })
                .collect(),
        }
    }

    fn tree(goal_id: i64, status: GoalStatus) -> GoalTree {
        GoalTree {
            id: goal_id,
            title: "Learn Rust".to_string(),
            description: "I want to learn Rust".to_string(),
            category: "Programming".to_string(),
            difficulty: Difficulty::Beginner,
            status,
            created_at: "2026-01-01 00:00:00".to_string(),
            completed_at: None,
            roadmap: Roadmap {
                id: 1,
                name: "Rust roadmap".to_string(),
                levels: vec![Level {
                    id: 1,
                    position: 1,
                    title: "Level 1".to_string(),
                    description: None,
                    xp_reward: 100,
                    state: LevelState::Unlocked,
                    topics: vec![],
                }],
            },
        }
    }

    fn generator_returning(levels: usize) -> MockRoadmapGenerator {
        let mut generator = MockRoadmapGenerator::new();
        generator
            .expect_generate()
            .returning(move |_| Box::pin(async move { Ok(spec(levels)) }));
        generator
    }

    fn service(
        repo: MockGoalRepository,
        generator: MockRoadmapGenerator,
    ) -> GoalService<MockGoalRepository, MockRoadmapGenerator> {
        GoalService::new(repo, generator, Policy::default())
    }

    // ----- create_goal tests -----

    #[tokio::test]
    async fn create_goal_persists_generated_tree() {
        let mut repo = MockGoalRepository::new();
        repo.expect_create_goal_tree()
            .withf(|user, desc, spec, xp| {
                *user == 7 && desc == "I want to learn Rust" && spec.levels.len() == 3 && *xp == 100
            })
            .times(1)
            .returning(|_, _, _, _| Box::pin(async { Ok(42) }));
        repo.expect_goal_tree()
            .withf(|owner, goal| *owner == 7 && *goal == 42)
            .returning(|_, id| Box::pin(async move { Ok(Some(tree(id, GoalStatus::Active))) }));

        let svc = service(repo, generator_returning(3));
        let goal = svc.create_goal(7, "  I want to learn Rust  ").await.unwrap();

        assert_eq!(goal.id, 42);
    }

    #[tokio::test]
    async fn create_goal_rejects_short_description_without_calling_generator() {
        let repo = MockGoalRepository::new();
        let generator = MockRoadmapGenerator::new();

        let svc = service(repo, generator);
        let err = svc.create_goal(7, "rust").await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_goal_generator_failure_is_upstream_and_persists_nothing() {
        let repo = MockGoalRepository::new();
        let mut generator = MockRoadmapGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Box::pin(async { Err(color_eyre::eyre::eyre!("timeout")) }));

        let svc = service(repo, generator);
        let err = svc.create_goal(7, "I want to learn Rust").await.unwrap_err();

        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[tokio::test]
    async fn create_goal_invalid_roadmap_is_upstream_and_persists_nothing() {
        let repo = MockGoalRepository::new();

        let svc = service(repo, generator_returning(0));
        let err = svc.create_goal(7, "I want to learn Rust").await.unwrap_err();

        assert!(matches!(err, AppError::Upstream(ref m) if m.contains("at least one level")));
    }

    // ----- read tests -----

    #[tokio::test]
    async fn get_goal_missing_is_not_found() {
        let mut repo = MockGoalRepository::new();
        repo.expect_goal_tree()
            .returning(|_, _| Box::pin(async { Ok(None) }));

        let svc = service(repo, MockRoadmapGenerator::new());
        let err = svc.get_goal(1, 99).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn get_level_missing_is_not_found() {
        let mut repo = MockGoalRepository::new();
        repo.expect_level_detail()
            .returning(|_, _| Box::pin(async { Ok(None) }));

        let svc = service(repo, MockRoadmapGenerator::new());
        let err = svc.get_level(1, 5).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn repository_failure_is_internal() {
        let mut repo = MockGoalRepository::new();
        repo.expect_goal_summaries()
            .returning(|_| Box::pin(async { Err(color_eyre::eyre::eyre!("disk")) }));

        let svc = service(repo, MockRoadmapGenerator::new());
        let err = svc.list_goals(1).await.unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
    }

    // ----- archive tests -----

    #[tokio::test]
    async fn archive_unknown_goal_is_not_found() {
        let mut repo = MockGoalRepository::new();
        repo.expect_archive_goal()
            .returning(|_, _| Box::pin(async { Ok(false) }));

        let svc = service(repo, MockRoadmapGenerator::new());
        let err = svc.archive_goal(1, 3).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn archive_returns_archived_goal() {
        let mut repo = MockGoalRepository::new();
        repo.expect_archive_goal()
            .returning(|_, _| Box::pin(async { Ok(true) }));
        repo.expect_goal_tree()
            .returning(|_, id| Box::pin(async move { Ok(Some(tree(id, GoalStatus::Archived))) }));

        let svc = service(repo, MockRoadmapGenerator::new());
        let goal = svc.archive_goal(1, 3).await.unwrap();

        assert_eq!(goal.status, GoalStatus::Archived);
    }
}
