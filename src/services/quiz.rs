use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};

use crate::cache::LeaderboardCache;
use crate::config::Policy;
use crate::db::models::{GoalStatus, LevelState, OwnedLevel, QuizQuestion, QuizResult, QuizView};
use crate::db::{AttemptInsert, Db, SubmissionOutcome};
use crate::rejections::{AppError, ResultExt};

const MAX_SUBMISSION_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// QuizRepository trait (DIP: service defines the abstraction it needs)
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait QuizRepository: Send + Sync {
    fn owned_level(
        &self,
        owner_id: i64,
        level_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<OwnedLevel>>> + Send;

    fn quiz_questions(
        &self,
        level_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<QuizQuestion>>> + Send;

    fn attempt_by_submission(
        &self,
        user_id: i64,
        level_id: i64,
        submission_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<QuizResult>>> + Send;

    fn record_attempt(
        &self,
        attempt: &AttemptInsert,
    ) -> impl std::future::Future<Output = Result<SubmissionOutcome>> + Send;
}

impl QuizRepository for Db {
    fn owned_level(
        &self,
        owner_id: i64,
        level_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<OwnedLevel>>> + Send {
        Db::owned_level(self, owner_id, level_id)
    }

    fn quiz_questions(
        &self,
        level_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<QuizQuestion>>> + Send {
        Db::quiz_questions(self, level_id)
    }

    fn attempt_by_submission(
        &self,
        user_id: i64,
        level_id: i64,
        submission_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<QuizResult>>> + Send {
        Db::attempt_by_submission(self, user_id, level_id, submission_id)
    }

    fn record_attempt(
        &self,
        attempt: &AttemptInsert,
    ) -> impl std::future::Future<Output = Result<SubmissionOutcome>> + Send {
        Db::record_attempt(self, attempt)
    }
}

/// `correct / total` against `threshold`, tolerant of float noise so that
/// 7/10 passes a 0.7 threshold.
pub fn passes(correct: i64, total: i64, threshold: f64) -> bool {
    if total <= 0 {
        return false;
    }
    let score = correct as f64 / total as f64;
    score + f64::EPSILON >= threshold
}

// ---------------------------------------------------------------------------
// QuizService
// ---------------------------------------------------------------------------

pub struct QuizService<R: QuizRepository = Db> {
    repo: R,
    policy: Policy,
    leaderboard_cache: Option<Arc<LeaderboardCache>>,
}

impl<R: QuizRepository + Clone> Clone for QuizService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            policy: self.policy.clone(),
            leaderboard_cache: self.leaderboard_cache.clone(),
        }
    }
}

impl<R: QuizRepository> QuizService<R> {
    pub fn new(repo: R, policy: Policy, leaderboard_cache: Option<Arc<LeaderboardCache>>) -> Self {
        Self {
            repo,
            policy,
            leaderboard_cache,
        }
    }

    async fn load_level(&self, owner_id: i64, level_id: i64) -> Result<OwnedLevel, AppError> {
        self.repo
            .owned_level(owner_id, level_id)
            .await
            .reject("could not load level")?
            .ok_or(AppError::NotFound)
    }

    async fn load_questions(&self, level_id: i64) -> Result<Vec<QuizQuestion>, AppError> {
        let questions = self
            .repo
            .quiz_questions(level_id)
            .await
            .reject("could not load quiz")?;

        if questions.is_empty() {
            return Err(AppError::Internal(eyre!("level {level_id} has no quiz")));
        }
        Ok(questions)
    }

    /// The level's quiz without its answer key. Available while the level is
    /// open, whether or not every topic is done.
    pub async fn get_quiz(&self, owner_id: i64, level_id: i64) -> Result<QuizView, AppError> {
        let level = self.load_level(owner_id, level_id).await?;

        match level.state {
            LevelState::Locked => return Err(AppError::Conflict("level is locked")),
            LevelState::Completed => return Err(AppError::Conflict("level is already completed")),
            LevelState::Unlocked | LevelState::PendingQuiz => {}
        }

        let questions = self.load_questions(level.id).await?;

        Ok(QuizView {
            level_id: level.id,
            level_title: level.title,
            time_limit_secs: self.policy.quiz_time_limit_secs,
            questions: questions.into_iter().map(Into::into).collect(),
        })
    }

    /// Score a submission. A replayed `submission_id` returns the stored
    /// result untouched; a first pass completes the level and awards XP.
    pub async fn submit_quiz(
        &self,
        owner_id: i64,
        level_id: i64,
        submission_id: &str,
        answers: &[String],
    ) -> Result<QuizResult, AppError> {
        let submission_id = submission_id.trim();
        if submission_id.is_empty() || submission_id.len() > MAX_SUBMISSION_ID_LEN {
            return Err(AppError::Validation(format!(
                "submission id must be 1 to {MAX_SUBMISSION_ID_LEN} characters"
            )));
        }

        let level = self.load_level(owner_id, level_id).await?;

        if let Some(prior) = self.stored_result(owner_id, level.id, submission_id).await? {
            tracing::info!("replaying quiz submission {submission_id} for level_id={level_id}");
            return Ok(prior);
        }

        if level.goal_status == GoalStatus::Archived {
            return Err(AppError::Conflict("goal is archived"));
        }

        match level.state {
            LevelState::PendingQuiz => {}
            LevelState::Locked => return Err(AppError::Conflict("level is locked")),
            LevelState::Unlocked => return Err(AppError::Conflict("level topics are not all completed")),
            LevelState::Completed => return Err(AppError::Conflict("level is already completed")),
        }

        let questions = self.load_questions(level.id).await?;
        let correct = score_answers(&questions, answers)?;
        let total = questions.len() as i64;
        let passed = passes(correct, total, self.policy.pass_threshold);

        let attempt = AttemptInsert {
            user_id: owner_id,
            level,
            submission_id: submission_id.to_string(),
            correct,
            total,
            score: correct as f64 / total as f64,
            passed,
        };

        let outcome = self
            .repo
            .record_attempt(&attempt)
            .await
            .reject("could not record quiz attempt")?;

        match outcome {
            SubmissionOutcome::Recorded(result) => {
                if result.xp_awarded > 0 {
                    if let Some(cache) = &self.leaderboard_cache {
                        cache.invalidate();
                    }
                }
                Ok(result)
            }
            SubmissionOutcome::Duplicate => self
                .stored_result(owner_id, level_id, submission_id)
                .await?
                .ok_or(AppError::Conflict("submission is already being processed")),
            // Lost the race to another passing submission; ours may still be
            // the one that won if the ids match.
            SubmissionOutcome::LevelNotPending => self
                .stored_result(owner_id, level_id, submission_id)
                .await?
                .ok_or(AppError::Conflict("level is already completed")),
            SubmissionOutcome::GoalArchived => self
                .stored_result(owner_id, level_id, submission_id)
                .await?
                .ok_or(AppError::Conflict("goal is archived")),
        }
    }

    async fn stored_result(
        &self,
        owner_id: i64,
        level_id: i64,
        submission_id: &str,
    ) -> Result<Option<QuizResult>, AppError> {
        self.repo
            .attempt_by_submission(owner_id, level_id, submission_id)
            .await
            .reject("could not look up submission")
    }
}

/// Count correct answers. One answer per question, each one of that
/// question's option values.
fn score_answers(questions: &[QuizQuestion], answers: &[String]) -> Result<i64, AppError> {
    if answers.len() != questions.len() {
        return Err(AppError::Validation(format!(
            "expected {} answers, got {}",
            questions.len(),
            answers.len()
        )));
    }

    let mut correct = 0;
    for (i, (question, answer)) in questions.iter().zip(answers).enumerate() {
        let answer = answer.trim();
        if !question.options.iter().any(|o| o.value == answer) {
            return Err(AppError::Validation(format!(
                "answer {} ('{answer}') is not one of the question's options",
                i + 1
            )));
        }
        if question.correct_answer == answer {
            correct += 1;
        }
    }
    Ok(correct)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::models::QuizOption;

    fn level(state: LevelState) -> OwnedLevel {
        OwnedLevel {
            id: 10,
            roadmap_id: 1,
            goal_id: 1,
            user_id: 1,
            position: 1,
            title: "Basics".to_string(),
            xp_reward: 150,
            state,
            goal_status: GoalStatus::Active,
            topics_total: 2,
        }
    }

    fn questions(n: usize) -> Vec<QuizQuestion> {
        (0..n)
            .map(|i| QuizQuestion {
                position: i as i64,
                question: format!("q{i}"),
                options: ["A", "B", "C", "D"]
                    .iter()
                    .map(|v| QuizOption {
                        value: v.to_string(),
                        text: format!("option {v}"),
                    })
                    .collect(),
                correct_answer: "A".to_string(),
            })
            .collect()
    }

    /// `correct` right answers followed by wrong ones.
    fn answers(correct: usize, total: usize) -> Vec<String> {
        (0..total)
            .map(|i| if i < correct { "A" } else { "B" }.to_string())
            .collect()
    }

    fn result(submission_id: &str, correct: i64, passed: bool, xp: i64) -> QuizResult {
        QuizResult {
            attempt_id: 1,
            level_id: 10,
            submission_id: submission_id.to_string(),
            correct,
            total: 10,
            score: correct as f64 / 10.0,
            passed,
            xp_awarded: xp,
            next_level_unlocked: passed,
            goal_completed: false,
            level_state: if passed {
                LevelState::Completed
            } else {
                LevelState::PendingQuiz
            },
            submitted_at: "2026-01-01 00:00:00".to_string(),
        }
    }

    fn repo_for(state: LevelState) -> MockQuizRepository {
        let mut repo = MockQuizRepository::new();
        repo.expect_owned_level()
            .returning(move |_, _| Box::pin(async move { Ok(Some(level(state))) }));
        repo.expect_quiz_questions()
            .returning(|_| Box::pin(async { Ok(questions(10)) }));
        repo
    }

    fn service(repo: MockQuizRepository) -> QuizService<MockQuizRepository> {
        QuizService::new(repo, Policy::default(), None)
    }

    // ----- scoring -----

    #[test]
    fn threshold_is_inclusive() {
        assert!(passes(7, 10, 0.7));
        assert!(passes(8, 10, 0.7));
        assert!(!passes(6, 10, 0.7));
        assert!(passes(2, 3, 0.66));
        assert!(!passes(0, 0, 0.7));
    }

    #[test]
    fn thresholds_parameterize_pass_boundary() {
        for (threshold, boundary) in [(0.5, 5), (0.7, 7), (0.8, 8), (1.0, 10)] {
            assert!(passes(boundary, 10, threshold), "{threshold}");
            assert!(!passes(boundary - 1, 10, threshold), "{threshold}");
        }
    }

    #[test]
    fn score_rejects_wrong_answer_count_and_unknown_values() {
        let qs = questions(3);
        assert!(matches!(
            score_answers(&qs, &answers(2, 2)),
            Err(AppError::Validation(_))
        ));

        let bad = vec!["A".to_string(), "Z".to_string(), "A".to_string()];
        assert!(matches!(score_answers(&qs, &bad), Err(AppError::Validation(_))));

        assert_eq!(score_answers(&qs, &answers(2, 3)).unwrap(), 2);
    }

    // ----- get_quiz tests -----

    #[tokio::test]
    async fn get_quiz_strips_answers_and_is_open_before_topics_done() {
        let svc = service(repo_for(LevelState::Unlocked));
        let quiz = svc.get_quiz(1, 10).await.unwrap();

        assert_eq!(quiz.questions.len(), 10);
        let json = serde_json::to_string(&quiz).unwrap();
        assert!(!json.contains("correct_answer"));
    }

    #[tokio::test]
    async fn get_quiz_locked_or_completed_is_conflict() {
        for state in [LevelState::Locked, LevelState::Completed] {
            let svc = service(repo_for(state));
            assert!(matches!(svc.get_quiz(1, 10).await.unwrap_err(), AppError::Conflict(_)));
        }
    }

    // ----- submit_quiz tests -----

    #[tokio::test]
    async fn submit_replay_returns_stored_result_without_rescoring() {
        let mut repo = MockQuizRepository::new();
        repo.expect_owned_level()
            .returning(|_, _| Box::pin(async { Ok(Some(level(LevelState::Completed))) }));
        repo.expect_attempt_by_submission()
            .returning(|_, _, id| {
                let stored = result(id, 8, true, 150);
                Box::pin(async move { Ok(Some(stored)) })
            });
        repo.expect_record_attempt().never();

        let svc = service(repo);
        let out = svc.submit_quiz(1, 10, "sub-1", &answers(0, 10)).await.unwrap();

        assert_eq!(out.correct, 8);
        assert_eq!(out.xp_awarded, 150);
    }

    #[tokio::test]
    async fn submit_requires_pending_quiz() {
        for state in [LevelState::Locked, LevelState::Unlocked, LevelState::Completed] {
            let mut repo = repo_for(state);
            repo.expect_attempt_by_submission()
                .returning(|_, _, _| Box::pin(async { Ok(None) }));
            repo.expect_record_attempt().never();

            let svc = service(repo);
            let err = svc.submit_quiz(1, 10, "sub-1", &answers(10, 10)).await.unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)), "{state:?}");
        }
    }

    #[tokio::test]
    async fn submit_scores_and_records_pass() {
        let mut repo = repo_for(LevelState::PendingQuiz);
        repo.expect_attempt_by_submission()
            .returning(|_, _, _| Box::pin(async { Ok(None) }));
        repo.expect_record_attempt()
            .withf(|a| a.correct == 8 && a.total == 10 && a.passed && a.submission_id == "sub-1")
            .times(1)
            .returning(|a| {
                let stored = result(&a.submission_id, a.correct, a.passed, 150);
                Box::pin(async move { Ok(SubmissionOutcome::Recorded(stored)) })
            });

        let svc = service(repo);
        let out = svc.submit_quiz(1, 10, "sub-1", &answers(8, 10)).await.unwrap();

        assert!(out.passed);
        assert_eq!(out.level_state, LevelState::Completed);
    }

    #[tokio::test]
    async fn submit_records_fail_below_threshold() {
        let mut repo = repo_for(LevelState::PendingQuiz);
        repo.expect_attempt_by_submission()
            .returning(|_, _, _| Box::pin(async { Ok(None) }));
        repo.expect_record_attempt()
            .withf(|a| a.correct == 4 && !a.passed)
            .times(1)
            .returning(|a| {
                let stored = result(&a.submission_id, a.correct, a.passed, 0);
                Box::pin(async move { Ok(SubmissionOutcome::Recorded(stored)) })
            });

        let svc = service(repo);
        let out = svc.submit_quiz(1, 10, "sub-2", &answers(4, 10)).await.unwrap();

        assert!(!out.passed);
        assert_eq!(out.xp_awarded, 0);
    }

    #[tokio::test]
    async fn submit_losing_the_level_race_is_conflict() {
        let mut repo = repo_for(LevelState::PendingQuiz);
        repo.expect_attempt_by_submission()
            .returning(|_, _, _| Box::pin(async { Ok(None) }));
        repo.expect_record_attempt()
            .returning(|_| Box::pin(async { Ok(SubmissionOutcome::LevelNotPending) }));

        let svc = service(repo);
        let err = svc.submit_quiz(1, 10, "sub-3", &answers(9, 10)).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict("level is already completed")));
    }

    #[tokio::test]
    async fn submit_racing_an_archive_is_conflict() {
        let mut repo = repo_for(LevelState::PendingQuiz);
        repo.expect_attempt_by_submission()
            .returning(|_, _, _| Box::pin(async { Ok(None) }));
        repo.expect_record_attempt()
            .returning(|_| Box::pin(async { Ok(SubmissionOutcome::GoalArchived) }));

        let svc = service(repo);
        let err = svc.submit_quiz(1, 10, "sub-5", &answers(2, 10)).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict("goal is archived")));
    }

    #[tokio::test]
    async fn submit_empty_submission_id_is_validation() {
        let svc = service(MockQuizRepository::new());
        let err = svc.submit_quiz(1, 10, "  ", &answers(9, 10)).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn award_invalidates_leaderboard_cache() {
        let cache = Arc::new(LeaderboardCache::new(Duration::from_secs(60)));
        cache.store_rank(1, 5, cache.generation());

        let mut repo = repo_for(LevelState::PendingQuiz);
        repo.expect_attempt_by_submission()
            .returning(|_, _, _| Box::pin(async { Ok(None) }));
        repo.expect_record_attempt().returning(|a| {
            let stored = result(&a.submission_id, a.correct, a.passed, 150);
            Box::pin(async move { Ok(SubmissionOutcome::Recorded(stored)) })
        });

        let svc = QuizService::new(repo, Policy::default(), Some(cache.clone()));
        svc.submit_quiz(1, 10, "sub-4", &answers(10, 10)).await.unwrap();

        assert_eq!(cache.rank(1), None);
    }
}
