//! Google Gemini API client implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::prompts;
use super::{Answer, Generator, GeneratorError};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Request timeout; synthesis of a 2000+ word report can take a while.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Google Gemini API client.
///
/// Makes exactly one upstream call per stage invocation - retry policy is
/// the workflow controller's concern, and the controller does not retry.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a new Gemini client for the given model.
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }

    /// Make a single text-generation call.
    async fn call(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: Option<u64>,
    ) -> Result<String, GeneratorError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: max_tokens,
            },
        };

        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);

        tracing::debug!("Sending request to Gemini: model={}", self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Network(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    GeneratorError::Network(format!("Connection failed: {}", e))
                } else {
                    GeneratorError::Network(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(GeneratorError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            GeneratorError::Parse(format!("Failed to parse response: {}, body: {}", e, body))
        })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(GeneratorError::Empty);
        }

        Ok(text)
    }

    /// Make a call expecting a JSON payload, tolerating markdown fences.
    async fn call_json(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: Option<u64>,
    ) -> Result<serde_json::Value, GeneratorError> {
        let text = self.call(prompt, temperature, max_tokens).await?;
        let json_text = extract_json(&text);
        serde_json::from_str(&json_text).map_err(|e| {
            GeneratorError::Parse(format!(
                "Invalid JSON from generator: {} (payload starts: {:.120})",
                e, json_text
            ))
        })
    }
}

/// Extract a JSON payload from markdown code fences when present.
///
/// Models frequently wrap JSON output in ```json blocks despite being told
/// not to; accept fenced, generically fenced, and bare payloads.
fn extract_json(text: &str) -> String {
    if let Some(start) = text.find("```json") {
        let start = start + 7;
        let end = text[start..]
            .find("```")
            .map(|pos| pos + start)
            .unwrap_or(text.len());
        return text[start..end].trim().to_string();
    }
    if let Some(start) = text.find("```") {
        let start = start + 3;
        let end = text[start..]
            .find("```")
            .map(|pos| pos + start)
            .unwrap_or(text.len());
        return text[start..end].trim().to_string();
    }
    text.trim().to_string()
}

#[async_trait]
impl Generator for GeminiClient {
    async fn plan_query(&self, query: &str) -> Result<Vec<String>, GeneratorError> {
        let response = self
            .call_json(&prompts::planner_prompt(query), 0.8, None)
            .await?;

        let questions = response
            .get("sub_questions")
            .and_then(|v| v.as_array())
            .ok_or(GeneratorError::MissingField("sub_questions"))?;

        Ok(questions
            .iter()
            .filter_map(|q| q.as_str())
            .map(|q| q.to_string())
            .collect())
    }

    async fn answer_question(&self, question: &str) -> Result<Answer, GeneratorError> {
        let response = self
            .call_json(&prompts::executor_prompt(question), 0.7, Some(2000))
            .await?;

        serde_json::from_value(response)
            .map_err(|e| GeneratorError::Parse(format!("Malformed answer payload: {}", e)))
    }

    async fn synthesize(&self, query: &str, summaries: &str) -> Result<String, GeneratorError> {
        self.call(&prompts::publisher_prompt(query, summaries), 0.7, Some(8000))
            .await
    }
}

/// Gemini generateContent request format.
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u64>,
}

/// Gemini generateContent response format.
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    /// Absent when generation was blocked; surfaces as an empty response.
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}
