//! Plan stage - break the query into independent sub-questions.

use crate::llm::Generator;
use crate::task::SubQuestion;

use super::StageError;

/// Generate 6-10 pending sub-questions for the query.
///
/// Single generator attempt, no internal retry. A malformed or empty result
/// is a stage failure; retry policy belongs to the controller (which does
/// not retry).
pub async fn plan(generator: &dyn Generator, query: &str) -> Result<Vec<SubQuestion>, StageError> {
    tracing::info!("Planner: analyzing query: {}", query);

    let questions = generator
        .plan_query(query)
        .await
        .map_err(|e| StageError::Plan(e.to_string()))?;

    if questions.is_empty() {
        return Err(StageError::Plan(
            "generator returned no sub-questions".to_string(),
        ));
    }

    tracing::info!("Planner: generated {} sub-questions", questions.len());

    Ok(questions
        .into_iter()
        .enumerate()
        .map(|(index, question)| SubQuestion::new(index, question))
        .collect())
}
