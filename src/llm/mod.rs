//! Generator client module - the content-generation collaborator.
//!
//! This module provides a trait-based abstraction over the external
//! generator the pipeline stages call, with Google Gemini as the primary
//! implementation. The orchestration engine only ever sees the
//! [`Generator`] trait; whether the backend is an LLM, a search index, or a
//! test stub is irrelevant to the workflow contract.

mod gemini;
pub mod prompts;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the generator collaborator.
///
/// Any of these bubbles up to the calling stage as a stage-level failure
/// with the raw message attached; retry policy lives with the caller (here:
/// none).
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Network-level failure: connect, timeout, transport.
    #[error("request failed: {0}")]
    Network(String),

    /// Non-success HTTP status from the upstream API.
    #[error("generator API returned {status}: {body}")]
    Http { status: u16, body: String },

    /// Upstream returned a body we could not parse.
    #[error("failed to parse generator response: {0}")]
    Parse(String),

    /// Structured response was missing a required field.
    #[error("generator response missing '{0}' field")]
    MissingField(&'static str),

    /// Upstream returned no usable text at all.
    #[error("empty response from generator")]
    Empty,
}

/// A source record returned by the generator for one sub-question.
///
/// Fields mirror what the research prompt asks for; everything but the
/// snippet/url/title is optional in practice, so the parser defaults rather
/// than failing on sparse sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(default = "SourceRecord::unknown_title")]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub snippet: String,
}

impl SourceRecord {
    fn unknown_title() -> String {
        "Unknown Title".to_string()
    }
}

/// The generator's answer to a single sub-question.
#[derive(Debug, Clone, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub sources: Vec<SourceRecord>,
}

/// Trait for the external content-generation collaborator.
///
/// One method per pipeline stage. Implementations make exactly one upstream
/// call per invocation - no internal retries.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Break a research query into independent sub-questions.
    async fn plan_query(&self, query: &str) -> Result<Vec<String>, GeneratorError>;

    /// Research one sub-question: summary plus source records.
    async fn answer_question(&self, question: &str) -> Result<Answer, GeneratorError>;

    /// Synthesize the formatted per-question summaries into the long-form
    /// report text.
    async fn synthesize(&self, query: &str, summaries: &str) -> Result<String, GeneratorError>;
}
