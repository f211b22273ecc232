//! Request/response types for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::{Task, TaskStatus};

/// Body for `POST /api/report`.
#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub query: String,
}

/// Response for `POST /api/report`.
#[derive(Debug, Serialize)]
pub struct CreateReportResponse {
    pub task_id: Uuid,
    pub status: String,
    pub message: String,
}

/// One entry in the `GET /api/reports` listing.
#[derive(Debug, Serialize)]
pub struct TaskSummary {
    pub task_id: Uuid,
    pub query: String,
    pub status: TaskStatus,
    pub progress_percentage: u8,
    pub created_at: DateTime<Utc>,
    pub has_report: bool,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id,
            query: task.query.clone(),
            status: task.status,
            progress_percentage: task.progress_percentage,
            created_at: task.created_at,
            has_report: task.report.is_some(),
        }
    }
}

/// Response for `GET /api/reports`.
#[derive(Debug, Serialize)]
pub struct ListReportsResponse {
    pub tasks: Vec<TaskSummary>,
    pub count: usize,
}

/// Response for `DELETE /api/report/:id`.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// Response for `GET /api/health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}
