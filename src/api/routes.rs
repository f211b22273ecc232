//! HTTP route handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use chrono::Utc;
use futures::stream::Stream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::llm::{GeminiClient, Generator};
use crate::registry::TaskRegistry;
use crate::task::{StatusSnapshot, Task};
use crate::workflow::run_research_workflow;

use super::types::*;

/// Interval between registry polls while streaming progress.
const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Single source of truth for task status and streaming.
    pub registry: TaskRegistry,
    /// The external content-generation collaborator.
    pub generator: Arc<dyn Generator>,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let generator: Arc<dyn Generator> = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        registry: TaskRegistry::new(),
        generator,
    });

    let app = router(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = if state.config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/api/health", get(health))
        .route("/api/report", post(create_report))
        .route("/api/report/:id", get(get_report).delete(delete_report))
        .route("/api/report/:id/status", get(get_report_status))
        .route("/api/report/:id/stream", get(stream_report))
        .route("/api/reports", get(list_reports))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wait for SIGINT/SIGTERM. Tasks are volatile, so there is nothing to
/// flush - in-flight workflows simply die with the process.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online".to_string(),
        service: "ScholarSynth".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Create a new research report task and start its workflow.
async fn create_report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReportRequest>,
) -> Json<CreateReportResponse> {
    let task = Task::new(Uuid::new_v4(), req.query);
    let task_id = task.id;

    state.registry.create(task.clone()).await;

    // Run the workflow in the background; observers follow along through
    // the registry.
    tokio::spawn(run_research_workflow(
        state.registry.clone(),
        Arc::clone(&state.generator),
        task,
    ));

    Json(CreateReportResponse {
        task_id,
        status: "started".to_string(),
        message: "Research workflow initiated".to_string(),
    })
}

/// Get the latest status snapshot for a task.
///
/// Always returns immediately with the registry's current view.
async fn get_report_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusSnapshot>, (StatusCode, String)> {
    state
        .registry
        .get_snapshot(id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// Get the full task record, including the report once published.
async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, (StatusCode, String)> {
    state
        .registry
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// Stream status snapshots via SSE until the task reaches a terminal state.
///
/// A `progress` event is emitted whenever the progress percentage changes;
/// a final `done` event always closes the stream, even on failure.
async fn stream_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>, (StatusCode, String)>
{
    if state.registry.get_snapshot(id).await.is_none() {
        return Err(not_found(id));
    }

    let registry = state.registry.clone();
    let stream = async_stream::stream! {
        let mut last_progress: Option<u8> = None;

        loop {
            let snapshot = match registry.get_snapshot(id).await {
                Some(s) => s,
                None => {
                    // Deleted mid-stream.
                    let event = Event::default()
                        .event("error")
                        .json_data(serde_json::json!({"error": "Task not found"}))
                        .unwrap();
                    yield Ok(event);
                    break;
                }
            };

            if last_progress != Some(snapshot.progress_percentage) {
                last_progress = Some(snapshot.progress_percentage);
                let event = Event::default()
                    .event("progress")
                    .json_data(&snapshot)
                    .unwrap();
                yield Ok(event);
            }

            if snapshot.status.is_terminal() {
                let event = Event::default()
                    .event("done")
                    .json_data(serde_json::json!({
                        "status": snapshot.status,
                        "done": true
                    }))
                    .unwrap();
                yield Ok(event);
                break;
            }

            tokio::time::sleep(STREAM_POLL_INTERVAL).await;
        }
    };

    Ok(Sse::new(stream))
}

/// Delete a task from the registry.
///
/// Does not interrupt in-flight work; the workflow notices on its next
/// registry write and abandons itself.
async fn delete_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, (StatusCode, String)> {
    if state.registry.delete(id).await {
        Ok(Json(DeleteResponse {
            message: "Task deleted successfully".to_string(),
        }))
    } else {
        Err(not_found(id))
    }
}

/// List all tasks, most recent first.
async fn list_reports(State(state): State<Arc<AppState>>) -> Json<ListReportsResponse> {
    let mut tasks = state.registry.list_all().await;
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let summaries: Vec<TaskSummary> = tasks.iter().map(TaskSummary::from).collect();
    let count = summaries.len();

    Json(ListReportsResponse {
        tasks: summaries,
        count,
    })
}

fn not_found(id: Uuid) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Task {} not found", id))
}
