use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};

use crate::models::RoadmapSpec;
use crate::services::goals::RoadmapGenerator;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TOKENS: u32 = 4000;
const TEMPERATURE: f32 = 0.7;

const SYSTEM_PROMPT: &str =
    "You are a learning path expert. Always respond with a single valid JSON object only.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Roadmap generator backed by the OpenAI chat completions API.
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    fn prompt(description: &str) -> String {
        format!(
            r#"A user wants to achieve this learning goal:

"{description}"

Design a structured learning roadmap. Rules:
1. A clear, concise title for the goal.
2. A category such as Programming, Language, Business, Health or Art.
3. A difficulty: "beginner", "intermediate" or "advanced".
4. Between 3 and 8 levels, in learning order.
5. Each level has 3 to 7 topics.
6. Each level has an XP reward between 100 and 300 based on difficulty.
7. Each level has a quiz of 5 multiple choice questions covering its topics,
   each with exactly 4 options labelled "A" to "D" and exactly one correct answer.

Return ONLY this JSON structure:
{{
  "title": "Goal title",
  "category": "Category",
  "difficulty": "beginner",
  "name": "Roadmap name",
  "levels": [
    {{
      "title": "Level title",
      "description": "What the learner will cover",
      "topics": ["Topic 1", "Topic 2", "Topic 3"],
      "xp_reward": 100,
      "quiz": {{
        "questions": [
          {{
            "question": "Question text?",
            "options": [
              {{"value": "A", "text": "First option"}},
              {{"value": "B", "text": "Second option"}},
              {{"value": "C", "text": "Third option"}},
              {{"value": "D", "text": "Fourth option"}}
            ],
            "correct_answer": "A"
          }}
        ]
      }}
    }}
  ]
}}"#
        )
    }
}

impl RoadmapGenerator for OpenAiGenerator {
    async fn generate(&self, description: &str) -> Result<RoadmapSpec> {
        let prompt = Self::prompt(description);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            tracing::error!("OpenAI API error: {status} - {text}");
            color_eyre::eyre::bail!("OpenAI API returned {status}");
        }

        let reply: ChatResponse = resp.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| eyre!("OpenAI returned no message content"))?;

        let spec: RoadmapSpec = serde_json::from_str(&content)
            .map_err(|e| eyre!("OpenAI returned an unusable roadmap: {e}"))?;

        tracing::info!(
            "roadmap generated: title={}, levels={}",
            spec.title,
            spec.levels.len()
        );
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_description() {
        let prompt = OpenAiGenerator::prompt("learn to bake sourdough");
        assert!(prompt.contains("\"learn to bake sourdough\""));
        assert!(prompt.contains("\"correct_answer\""));
    }

    #[test]
    fn request_uses_json_response_format() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
