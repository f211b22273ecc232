//! Workflow orchestration - the plan → execute → publish state machine.
//!
//! [`run_research_workflow`] is the single canonical pipeline driver. It
//! sequences the three stages, short-circuits to `Failed` when a stage
//! fails or yields nothing usable, and writes the full task snapshot to the
//! registry after every transition. It is the only writer; status queries
//! and the progress stream are both plain reads of the registry.

pub mod executor;
pub mod planner;
pub mod publisher;

use std::sync::Arc;

use thiserror::Error;

use crate::llm::Generator;
use crate::registry::TaskRegistry;
use crate::task::{Task, TaskStatus};

/// A stage-level pipeline failure. Terminal for the task - no stage is
/// retried.
///
/// Per-unit research failures are not represented here: they are recorded
/// on the unit itself and never abort the batch.
#[derive(Debug, Error)]
pub enum StageError {
    /// Generator error during planning, or zero sub-questions produced.
    #[error("Planner failed: {0}")]
    Plan(String),

    /// The batch could not run, or every unit in it failed.
    #[error("Executor failed: {0}")]
    Execute(String),

    /// Nothing to synthesize, or generator error during synthesis.
    #[error("Publisher failed: {0}")]
    Publish(String),
}

impl StageError {
    /// Progress value a failure of this stage is reported at.
    fn stalled_progress(&self) -> u8 {
        match self {
            StageError::Plan(_) => 0,
            StageError::Execute(_) => 40,
            StageError::Publish(_) => 80,
        }
    }
}

/// Drive one task through the full pipeline to a terminal state.
///
/// The task must already exist in the registry. Runs until `Done` or
/// `Failed`; if the task is deleted mid-run the workflow abandons itself
/// without resurrecting the entry (registry updates never insert).
pub async fn run_research_workflow(
    registry: TaskRegistry,
    generator: Arc<dyn Generator>,
    mut task: Task,
) {
    tracing::info!(task_id = %task.id, "Starting research workflow: {}", task.query);

    // Stage 1: plan.
    task.status = TaskStatus::Planning;
    task.update_progress("Planning research questions...", 5);
    if !write_snapshot(&registry, &task).await {
        return;
    }

    let units = match planner::plan(generator.as_ref(), &task.query).await {
        Ok(units) => units,
        Err(e) => {
            fail_task(&registry, &mut task, e).await;
            return;
        }
    };
    let total = units.len();
    task.sub_questions = units;
    task.update_progress(
        format!(
            "Planning complete - {} research questions generated",
            total
        ),
        20,
    );
    if !write_snapshot(&registry, &task).await {
        return;
    }

    // Stage 2: execute all units in parallel.
    task.status = TaskStatus::Executing;
    task.update_progress(format!("Researching {} sub-questions...", total), 25);
    if !write_snapshot(&registry, &task).await {
        return;
    }

    let pending = std::mem::take(&mut task.sub_questions);
    let settled = match executor::execute(generator.as_ref(), pending).await {
        Ok(settled) => settled,
        Err(e) => {
            fail_task(&registry, &mut task, e).await;
            return;
        }
    };
    task.sub_questions = settled;

    let completed = task.completed_questions();
    if completed == 0 {
        // All units failing is a terminal failure, not a partial success.
        fail_task(
            &registry,
            &mut task,
            StageError::Execute(format!("all {} sub-questions failed", total)),
        )
        .await;
        return;
    }
    task.update_progress(
        format!(
            "Research complete - {}/{} questions answered",
            completed, total
        ),
        70,
    );
    if !write_snapshot(&registry, &task).await {
        return;
    }

    // Stage 3: publish.
    task.status = TaskStatus::Publishing;
    task.update_progress("Synthesizing final report...", 75);
    if !write_snapshot(&registry, &task).await {
        return;
    }

    match publisher::publish(generator.as_ref(), &task.query, &task.sub_questions).await {
        Ok(report) => {
            task.report = Some(report);
            task.status = TaskStatus::Done;
            task.update_progress("Research complete!", 100);
            write_snapshot(&registry, &task).await;
            tracing::info!(task_id = %task.id, "Workflow complete");
        }
        Err(e) => {
            fail_task(&registry, &mut task, e).await;
        }
    }
}

/// Write the working copy back to the registry.
///
/// Returns false when the task has been deleted, in which case the caller
/// abandons the workflow.
async fn write_snapshot(registry: &TaskRegistry, task: &Task) -> bool {
    if registry.update(task).await {
        true
    } else {
        tracing::warn!(task_id = %task.id, "Task deleted mid-run; abandoning workflow");
        false
    }
}

/// Move the task to `Failed` with the stage's stalled progress value.
async fn fail_task(registry: &TaskRegistry, task: &mut Task, error: StageError) {
    tracing::error!(task_id = %task.id, "{}", error);
    let stalled = error.stalled_progress();
    task.fail(error.to_string(), stalled);
    write_snapshot(registry, task).await;
}

#[cfg(test)]
pub(crate) mod testing {
    //! A configurable stub generator for orchestration tests.

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::llm::{Answer, Generator, GeneratorError, SourceRecord};

    /// Stub [`Generator`] with scriptable behavior and call counters.
    #[derive(Default)]
    pub struct StubGenerator {
        /// Sub-questions returned by `plan_query`.
        pub questions: Vec<String>,
        /// When set, `plan_query` fails with this message.
        pub plan_error: Option<String>,
        /// Sources attached to each successful answer.
        pub sources_per_question: usize,
        /// Questions whose `answer_question` call fails.
        pub failing: HashSet<String>,
        /// Questions answered only after an extra delay.
        pub slow: HashSet<String>,
        /// Uniform delay applied to every answer.
        pub answer_delay_ms: u64,
        /// Result of `synthesize`; `None` makes it fail.
        pub synthesis: Option<String>,

        pub plan_calls: AtomicUsize,
        pub answer_calls: AtomicUsize,
        pub synthesize_calls: AtomicUsize,
    }

    impl StubGenerator {
        pub fn with_questions<S: Into<String>>(questions: Vec<S>) -> Self {
            Self {
                questions: questions.into_iter().map(Into::into).collect(),
                sources_per_question: 2,
                synthesis: Some(
                    "# Synthesized Report\n\nFindings across all sections. [S1.1]".to_string(),
                ),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Generator for StubGenerator {
        async fn plan_query(&self, _query: &str) -> Result<Vec<String>, GeneratorError> {
            self.plan_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.plan_error {
                return Err(GeneratorError::Network(message.clone()));
            }
            Ok(self.questions.clone())
        }

        async fn answer_question(&self, question: &str) -> Result<Answer, GeneratorError> {
            self.answer_calls.fetch_add(1, Ordering::SeqCst);
            if self.answer_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.answer_delay_ms)).await;
            }
            if self.slow.contains(question) {
                tokio::time::sleep(Duration::from_millis(30)).await;
            }
            if self.failing.contains(question) {
                return Err(GeneratorError::Network(format!(
                    "no answer for '{}'",
                    question
                )));
            }
            Ok(Answer {
                summary: format!("Summary for {}", question),
                sources: (0..self.sources_per_question)
                    .map(|i| SourceRecord {
                        title: format!("Source {} for {}", i + 1, question),
                        url: format!("https://example.com/{}/{}", question, i + 1),
                        authors: None,
                        date: None,
                        snippet: format!("Snippet {} about {}", i + 1, question),
                    })
                    .collect(),
            })
        }

        async fn synthesize(
            &self,
            _query: &str,
            _summaries: &str,
        ) -> Result<String, GeneratorError> {
            self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
            self.synthesis
                .clone()
                .ok_or_else(|| GeneratorError::Empty)
        }
    }
}
