//! Publish stage - synthesize settled research into the final report.

use std::collections::HashSet;

use chrono::Utc;

use crate::llm::Generator;
use crate::task::{Citation, Report, SubQuestion, SubQuestionStatus};

use super::StageError;

/// Synthesize all completed research into a report.
///
/// Requires at least one completed unit. One generator call, no retry; a
/// generator failure is a hard stage failure.
pub async fn publish(
    generator: &dyn Generator,
    query: &str,
    units: &[SubQuestion],
) -> Result<Report, StageError> {
    let summaries = format_summaries(units);
    if summaries.is_empty() {
        return Err(StageError::Publish(
            "no completed research to synthesize".to_string(),
        ));
    }

    tracing::info!(
        "Publisher: synthesizing {} research sections",
        units
            .iter()
            .filter(|u| u.status == SubQuestionStatus::Completed)
            .count()
    );

    let content = generator
        .synthesize(query, &summaries)
        .await
        .map_err(|e| StageError::Publish(e.to_string()))?;

    let word_count = content.split_whitespace().count();
    let title = extract_title(&content).unwrap_or_else(|| query.to_string());
    let citations = collect_citations(units);

    tracing::info!(
        "Publisher: generated {} word report with {} citations",
        word_count,
        citations.len()
    );

    Ok(Report {
        title,
        content,
        word_count,
        citations,
        generated_at: Utc::now(),
    })
}

/// Deterministically format completed units into the synthesis input.
///
/// Sections follow the original unit index order. Units that did not
/// complete (or completed with nothing to say) are skipped.
fn format_summaries(units: &[SubQuestion]) -> String {
    let mut formatted = Vec::new();

    for unit in units {
        if unit.status != SubQuestionStatus::Completed || unit.summary.is_empty() {
            continue;
        }

        let mut section = format!("\n--- Sub-Question {} ---\n", unit.index + 1);
        section.push_str(&format!("Q: {}\n\n", unit.question));
        section.push_str(&format!("Summary:\n{}\n\n", unit.summary));

        if !unit.sources.is_empty() {
            section.push_str("Sources:\n");
            for source in &unit.sources {
                section.push_str(&format!("- [{}] {}\n", source.id, source.title));
                section.push_str(&format!("  URL: {}\n", source.url));
                if let Some(authors) = &source.authors {
                    section.push_str(&format!("  Authors: {}\n", authors));
                }
                if let Some(date) = &source.date {
                    section.push_str(&format!("  Date: {}\n", date));
                }
                section.push_str(&format!("  Snippet: {}\n\n", source.snippet));
            }
        }

        formatted.push(section);
    }

    formatted.join("\n")
}

/// Title from the first top-level heading line, if any.
fn extract_title(content: &str) -> Option<String> {
    content
        .lines()
        .find(|line| line.starts_with("# "))
        .map(|line| line.trim_start_matches("# ").trim().to_string())
}

/// Aggregate citations across all units, deduplicated by id.
///
/// First occurrence wins; order follows unit index then source ordinal.
/// Failed units carry no sources, so only completed work contributes.
fn collect_citations(units: &[SubQuestion]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    let mut citations = Vec::new();

    for unit in units {
        for citation in &unit.sources {
            if seen.insert(citation.id.clone()) {
                citations.push(citation.clone());
            }
        }
    }

    citations
}

#[cfg(test)]
mod tests {
    use super::super::testing::StubGenerator;
    use super::*;

    fn completed_unit(index: usize, question: &str, citations: Vec<Citation>) -> SubQuestion {
        let mut unit = SubQuestion::new(index, question);
        unit.status = SubQuestionStatus::Completed;
        unit.summary = format!("Summary for {}", question);
        unit.sources = citations;
        unit
    }

    fn failed_unit(index: usize, question: &str) -> SubQuestion {
        let mut unit = SubQuestion::new(index, question);
        unit.status = SubQuestionStatus::Failed;
        unit.summary = "Failed to research: boom".to_string();
        unit.error = Some("boom".to_string());
        unit
    }

    fn citation(id: &str) -> Citation {
        Citation {
            id: id.to_string(),
            title: format!("Title {}", id),
            url: format!("https://example.com/{}", id),
            authors: None,
            date: None,
            snippet: "snippet".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_requires_a_completed_unit() {
        let generator = StubGenerator::with_questions(vec!["a"]);
        let units = vec![failed_unit(0, "a"), failed_unit(1, "b")];

        let err = publish(&generator, "query", &units).await.unwrap_err();
        assert!(matches!(err, StageError::Publish(_)));
        assert!(err.to_string().contains("no completed research"));
    }

    #[tokio::test]
    async fn test_publish_builds_report() {
        let mut generator = StubGenerator::with_questions(vec!["a"]);
        generator.synthesis =
            Some("# Grand Unified Answer\n\nOne two three four five.".to_string());

        let units = vec![
            completed_unit(0, "a", vec![citation("S1.1"), citation("S1.2")]),
            completed_unit(1, "b", vec![citation("S2.1")]),
        ];

        let report = publish(&generator, "query", &units).await.unwrap();
        assert_eq!(report.title, "Grand Unified Answer");
        assert_eq!(report.word_count, report.content.split_whitespace().count());
        assert_eq!(report.citations.len(), 3);
    }

    #[tokio::test]
    async fn test_title_falls_back_to_query() {
        let mut generator = StubGenerator::with_questions(vec!["a"]);
        generator.synthesis = Some("No heading here, just prose.".to_string());

        let units = vec![completed_unit(0, "a", vec![])];
        let report = publish(&generator, "the original query", &units)
            .await
            .unwrap();
        assert_eq!(report.title, "the original query");
    }

    #[tokio::test]
    async fn test_generator_failure_is_a_stage_failure() {
        let mut generator = StubGenerator::with_questions(vec!["a"]);
        generator.synthesis = None;

        let units = vec![completed_unit(0, "a", vec![])];
        let err = publish(&generator, "query", &units).await.unwrap_err();
        assert!(matches!(err, StageError::Publish(_)));
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let mut first = citation("S1.1");
        first.title = "First Title".to_string();
        let mut duplicate = citation("S1.1");
        duplicate.title = "Second Title".to_string();

        let units = vec![
            completed_unit(0, "a", vec![first, citation("S1.2")]),
            completed_unit(1, "b", vec![duplicate, citation("S2.2")]),
        ];

        let citations = collect_citations(&units);
        assert_eq!(citations.len(), 3);
        assert_eq!(citations[0].id, "S1.1");
        assert_eq!(citations[0].title, "First Title");
    }

    #[test]
    fn test_failed_units_contribute_no_citations() {
        let units = vec![
            completed_unit(0, "a", vec![citation("S1.1")]),
            failed_unit(1, "b"),
            completed_unit(2, "c", vec![citation("S3.1")]),
        ];

        let citations = collect_citations(&units);
        let ids: Vec<&str> = citations.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["S1.1", "S3.1"]);
    }

    #[test]
    fn test_format_summaries_skips_unfinished_units() {
        let units = vec![
            completed_unit(0, "first question", vec![citation("S1.1")]),
            failed_unit(1, "second question"),
        ];

        let formatted = format_summaries(&units);
        assert!(formatted.contains("Q: first question"));
        assert!(formatted.contains("[S1.1]"));
        assert!(!formatted.contains("second question"));
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("# A Title\n\nbody").as_deref(),
            Some("A Title")
        );
        assert_eq!(
            extract_title("intro\n# Later Title\nbody").as_deref(),
            Some("Later Title")
        );
        assert!(extract_title("## only a subheading").is_none());
    }
}
