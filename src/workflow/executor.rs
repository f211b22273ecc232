//! Execute stage - parallel research across all sub-questions.
//!
//! One concurrent operation per unit; each operation owns its unit
//! exclusively until it settles. The batch join waits for every unit and
//! never short-circuits: a single unit's failure is recorded on that unit
//! and cannot abort or cancel its siblings.

use futures::future::join_all;

use crate::llm::Generator;
use crate::task::{Citation, SubQuestion, SubQuestionStatus};

use super::StageError;

/// Derive the citation id for a source within a unit.
///
/// Compound key: unit position plus source ordinal, both 1-based. Unique
/// across units for any per-unit source count, with no cross-unit
/// coordination.
pub fn citation_id(unit_index: usize, ordinal: usize) -> String {
    format!("S{}.{}", unit_index + 1, ordinal + 1)
}

/// Research all sub-questions concurrently.
///
/// Returns the same-length list in the original index order, every unit
/// settled to `completed` or `failed`. The stage itself only fails when it
/// cannot be invoked at all (empty input); individual unit failures are
/// data, not errors.
pub async fn execute(
    generator: &dyn Generator,
    units: Vec<SubQuestion>,
) -> Result<Vec<SubQuestion>, StageError> {
    if units.is_empty() {
        return Err(StageError::Execute(
            "no sub-questions to execute".to_string(),
        ));
    }

    let total = units.len();
    tracing::info!("Executor: processing {} questions in parallel", total);

    // join_all waits for every future and yields results in input order,
    // independent of completion order.
    let settled = join_all(
        units
            .into_iter()
            .map(|unit| execute_unit(generator, unit)),
    )
    .await;

    let completed = settled
        .iter()
        .filter(|u| u.status == SubQuestionStatus::Completed)
        .count();
    tracing::info!("Executor: completed {}/{} questions", completed, total);

    Ok(settled)
}

/// Research a single sub-question, settling it to a terminal unit status.
async fn execute_unit(generator: &dyn Generator, mut unit: SubQuestion) -> SubQuestion {
    tracing::debug!("Executor [{}]: researching: {}", unit.index, unit.question);
    unit.status = SubQuestionStatus::Processing;

    match generator.answer_question(&unit.question).await {
        Ok(answer) => {
            unit.sources = answer
                .sources
                .into_iter()
                .enumerate()
                .map(|(ordinal, source)| Citation {
                    id: citation_id(unit.index, ordinal),
                    title: source.title,
                    url: source.url,
                    authors: source.authors,
                    date: source.date,
                    snippet: source.snippet,
                })
                .collect();
            unit.summary = answer.summary;
            unit.status = SubQuestionStatus::Completed;
            tracing::debug!(
                "Executor [{}]: completed with {} sources",
                unit.index,
                unit.sources.len()
            );
        }
        Err(e) => {
            tracing::warn!("Executor [{}] error: {}", unit.index, e);
            unit.status = SubQuestionStatus::Failed;
            // The summary carries the error so downstream always has a
            // displayable string.
            unit.summary = format!("Failed to research: {}", e);
            unit.error = Some(e.to_string());
        }
    }

    unit
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::super::testing::StubGenerator;
    use super::*;
    use crate::task::SubQuestion;

    fn pending_units(questions: &[&str]) -> Vec<SubQuestion> {
        questions
            .iter()
            .enumerate()
            .map(|(i, q)| SubQuestion::new(i, *q))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_input_is_a_stage_failure() {
        let generator = StubGenerator::with_questions(Vec::<&str>::new());
        let err = execute(&generator, Vec::new()).await.unwrap_err();
        assert!(matches!(err, StageError::Execute(_)));
    }

    #[tokio::test]
    async fn test_output_preserves_input_order() {
        let mut generator = StubGenerator::with_questions(vec!["slow", "fast-1", "fast-2"]);
        generator.sources_per_question = 1;
        // The first unit settles last; output order must not change.
        generator.slow.insert("slow".to_string());

        let input = pending_units(&["slow", "fast-1", "fast-2"]);
        let output = execute(&generator, input).await.unwrap();

        assert_eq!(output.len(), 3);
        for (i, unit) in output.iter().enumerate() {
            assert_eq!(unit.index, i);
        }
        assert_eq!(output[0].question, "slow");
        assert_eq!(output[1].question, "fast-1");
        assert_eq!(output[2].question, "fast-2");
    }

    #[tokio::test]
    async fn test_all_units_settle_terminal() {
        let mut generator = StubGenerator::with_questions(vec!["a", "b", "c"]);
        generator.failing.insert("b".to_string());

        let output = execute(&generator, pending_units(&["a", "b", "c"]))
            .await
            .unwrap();

        for unit in &output {
            assert!(matches!(
                unit.status,
                SubQuestionStatus::Completed | SubQuestionStatus::Failed
            ));
            assert!(!unit.summary.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unit_failure_does_not_abort_siblings() {
        let mut generator = StubGenerator::with_questions(vec!["a", "b", "c", "d"]);
        generator.failing.insert("a".to_string());
        generator.failing.insert("c".to_string());

        let output = execute(&generator, pending_units(&["a", "b", "c", "d"]))
            .await
            .unwrap();

        assert_eq!(output[0].status, SubQuestionStatus::Failed);
        assert_eq!(output[1].status, SubQuestionStatus::Completed);
        assert_eq!(output[2].status, SubQuestionStatus::Failed);
        assert_eq!(output[3].status, SubQuestionStatus::Completed);

        // Failed units carry the error as their summary and no citations.
        assert!(output[0].summary.starts_with("Failed to research:"));
        assert!(output[0].error.is_some());
        assert!(output[0].sources.is_empty());
    }

    #[tokio::test]
    async fn test_citation_ids_unique_across_units() {
        // Five sources per unit would collide under a fixed-multiplier
        // scheme; the compound key must stay collision-free.
        let mut generator = StubGenerator::with_questions(vec!["a", "b", "c", "d"]);
        generator.sources_per_question = 5;

        let output = execute(&generator, pending_units(&["a", "b", "c", "d"]))
            .await
            .unwrap();

        let mut seen = HashSet::new();
        for unit in &output {
            assert_eq!(unit.sources.len(), 5);
            for citation in &unit.sources {
                assert!(
                    seen.insert(citation.id.clone()),
                    "duplicate citation id {}",
                    citation.id
                );
            }
        }
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_citation_id_format() {
        assert_eq!(citation_id(0, 0), "S1.1");
        assert_eq!(citation_id(0, 1), "S1.2");
        assert_eq!(citation_id(5, 1), "S6.2");
        // Beyond three sources per unit, still unique.
        assert_eq!(citation_id(0, 3), "S1.4");
        assert_ne!(citation_id(0, 3), citation_id(1, 0));
    }
}
