use color_eyre::Result;
use sqlx::FromRow;

use super::models::{QuizOption, QuizQuestion, QuizResult};
use super::Db;

pub(super) const QUIZ_RESULT_SELECT: &str = r#"
    SELECT
        id AS attempt_id,
        level_id,
        submission_id,
        correct,
        total,
        score,
        passed,
        xp_awarded,
        next_level_unlocked,
        goal_completed,
        level_state,
        created_at AS submitted_at
    FROM quiz_attempts
"#;

#[derive(FromRow)]
struct OptionRow {
    question_id: i64,
    value: String,
    text: String,
    is_answer: bool,
}

impl Db {
    /// Questions of a level's quiz in order, answer key included.
    pub async fn quiz_questions(&self, level_id: i64) -> Result<Vec<QuizQuestion>> {
        let questions = sqlx::query_as::<_, (i64, i64, String)>(
            "SELECT id, position, question FROM quiz_questions WHERE level_id = ? ORDER BY position",
        )
        .bind(level_id)
        .fetch_all(&self.pool)
        .await?;

        let options = sqlx::query_as::<_, OptionRow>(
            r#"
            SELECT o.question_id, o.value, o.text, o.is_answer
            FROM quiz_options o
            JOIN quiz_questions q ON q.id = o.question_id
            WHERE q.level_id = ?
            ORDER BY q.position, o.position
            "#,
        )
        .bind(level_id)
        .fetch_all(&self.pool)
        .await?;

        let quiz = questions
            .into_iter()
            .map(|(id, position, question)| {
                let own: Vec<&OptionRow> = options.iter().filter(|o| o.question_id == id).collect();
                QuizQuestion {
                    position,
                    question,
                    correct_answer: own
                        .iter()
                        .find(|o| o.is_answer)
                        .map(|o| o.value.clone())
                        .unwrap_or_default(),
                    options: own
                        .into_iter()
                        .map(|o| QuizOption {
                            value: o.value.clone(),
                            text: o.text.clone(),
                        })
                        .collect(),
                }
            })
            .collect();

        Ok(quiz)
    }

    pub async fn attempt_by_submission(
        &self,
        user_id: i64,
        level_id: i64,
        submission_id: &str,
    ) -> Result<Option<QuizResult>> {
        let sql = format!(
            "{QUIZ_RESULT_SELECT} WHERE user_id = ? AND level_id = ? AND submission_id = ?"
        );
        let result = sqlx::query_as::<_, QuizResult>(&sql)
            .bind(user_id)
            .bind(level_id)
            .bind(submission_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(result)
    }

    /// All attempts a user made on a level, oldest first.
    pub async fn attempts(&self, user_id: i64, level_id: i64) -> Result<Vec<QuizResult>> {
        let sql = format!("{QUIZ_RESULT_SELECT} WHERE user_id = ? AND level_id = ? ORDER BY id");
        let results = sqlx::query_as::<_, QuizResult>(&sql)
            .bind(user_id)
            .bind(level_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(results)
    }
}
