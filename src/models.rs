use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Content produced by a roadmap generator for a single goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapSpec {
    pub title: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub name: String,
    pub levels: Vec<LevelSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub topics: Vec<String>,
    #[serde(default)]
    pub xp_reward: Option<i64>,
    pub quiz: QuizSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSpec {
    pub questions: Vec<QuestionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub question: String,
    pub options: Vec<OptionSpec>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub value: String,
    pub text: String,
}

impl RoadmapSpec {
    /// Structural checks on generator output. Returns a description of the
    /// first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("roadmap title is empty".to_string());
        }
        if self.levels.is_empty() {
            return Err("roadmap must have at least one level".to_string());
        }

        for (i, level) in self.levels.iter().enumerate() {
            let n = i + 1;
            if level.title.trim().is_empty() {
                return Err(format!("level {n} has no title"));
            }
            if level.topics.is_empty() {
                return Err(format!("level {n} has no topics"));
            }
            if level.xp_reward.is_some_and(|xp| xp <= 0) {
                return Err(format!("level {n} has a non-positive XP reward"));
            }
            level
                .quiz
                .validate()
                .map_err(|e| format!("level {n} quiz: {e}"))?;
        }

        Ok(())
    }
}

impl QuizSpec {
    fn validate(&self) -> Result<(), String> {
        if self.questions.is_empty() {
            return Err("no questions".to_string());
        }

        for (i, q) in self.questions.iter().enumerate() {
            let n = i + 1;
            if q.options.len() < 2 {
                return Err(format!("question {n} needs at least two options"));
            }
            let mut seen = HashSet::new();
            if !q.options.iter().all(|o| seen.insert(o.value.as_str())) {
                return Err(format!("question {n} has duplicate option values"));
            }
            if !seen.contains(q.correct_answer.as_str()) {
                return Err(format!(
                    "question {n} answer '{}' is not one of its options",
                    q.correct_answer
                ));
            }
        }

        Ok(())
    }
}
