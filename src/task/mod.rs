//! Task model - research tasks, sub-questions, citations, and reports.
//!
//! A [`Task`] is one end-to-end research request. The workflow controller
//! holds a working copy while the pipeline runs and writes it back to the
//! registry after every stage transition; everything observers see comes
//! from those snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a research task.
///
/// `Planning → Executing → Publishing → Done`, with `Failed` reachable from
/// any of the three active states. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Planning,
    Executing,
    Publishing,
    Done,
    Failed,
}

impl TaskStatus {
    /// Whether this status ends the task's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

/// Per-unit status of a sub-question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubQuestionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A single source citation attached to a sub-question.
///
/// The `id` is derived from the owning unit's index plus the source ordinal
/// (`S<unit+1>.<ordinal+1>`), so ids never collide across units of the same
/// task without any cross-unit coordination. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub snippet: String,
}

/// One independently researchable piece of a task's query.
///
/// Created by the plan stage with `status: pending`, settled by the execute
/// stage to `completed` or `failed`, read-only afterwards. The position
/// `index` is stable from plan time and namespaces citation ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQuestion {
    pub index: usize,
    pub question: String,
    pub status: SubQuestionStatus,
    /// Research summary once completed; the error text when failed, so
    /// downstream consumers always have a displayable string.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub sources: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubQuestion {
    /// Create a pending unit at the given plan-time position.
    pub fn new(index: usize, question: impl Into<String>) -> Self {
        Self {
            index,
            question: question.into(),
            status: SubQuestionStatus::Pending,
            summary: String::new(),
            sources: Vec::new(),
            error: None,
        }
    }
}

/// The final synthesized research report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub content: String,
    pub word_count: usize,
    /// Deduplicated by citation id across all units, first occurrence wins.
    pub citations: Vec<Citation>,
    pub generated_at: DateTime<Utc>,
}

/// An immutable view of a task's status fields at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub current_step: String,
    pub progress_percentage: u8,
    pub sub_questions_count: usize,
    pub completed_questions: usize,
}

/// One end-to-end research request and its evolving state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub query: String,
    pub status: TaskStatus,
    pub current_step: String,
    pub progress_percentage: u8,
    pub sub_questions: Vec<SubQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a fresh task in the `Planning` state.
    pub fn new(id: Uuid, query: impl Into<String>) -> Self {
        Self {
            id,
            query: query.into(),
            status: TaskStatus::Planning,
            current_step: "Initializing research workflow...".to_string(),
            progress_percentage: 0,
            sub_questions: Vec::new(),
            report: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Update the human-readable step and progress percentage.
    ///
    /// Progress is clamped to 100. The controller only passes non-decreasing
    /// values on the success path; failures report a distinct stalled value
    /// via [`Task::fail`].
    pub fn update_progress(&mut self, step: impl Into<String>, progress: u8) {
        self.current_step = step.into();
        self.progress_percentage = progress.min(100);
    }

    /// Move the task into the absorbing `Failed` state.
    ///
    /// `stalled_at` is the progress value the failure is reported at - the
    /// one deliberate exception to monotonic progress.
    pub fn fail(&mut self, error: impl Into<String>, stalled_at: u8) {
        let error = error.into();
        self.status = TaskStatus::Failed;
        self.current_step = format!("Failed: {}", error);
        self.progress_percentage = stalled_at.min(100);
        self.error = Some(error);
    }

    /// Number of sub-questions that completed successfully.
    pub fn completed_questions(&self) -> usize {
        self.sub_questions
            .iter()
            .filter(|q| q.status == SubQuestionStatus::Completed)
            .count()
    }

    /// Capture the status fields observers care about.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            task_id: self.id,
            status: self.status,
            current_step: self.current_step.clone(),
            progress_percentage: self.progress_percentage,
            sub_questions_count: self.sub_questions.len(),
            completed_questions: self.completed_questions(),
        }
    }
}
