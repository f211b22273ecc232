//! Prompt templates for the three pipeline stages.

/// Prompt for the plan stage: break a query into 6-10 sub-questions.
pub fn planner_prompt(query: &str) -> String {
    format!(
        r#"You are a research planning expert. Break down a complex research query into 6-10 focused sub-questions that, answered together, give a comprehensive understanding of the topic.

Guidelines:
- Generate 6-10 sub-questions covering different aspects
- Include questions about: background/fundamentals, current state, key findings, methodologies, controversies/debates, limitations, and future directions
- Each sub-question should be specific and answerable through web research
- Questions should be independent yet complementary
- Avoid yes/no questions; prefer open-ended analytical questions

User Query: {query}

Respond ONLY with valid JSON in this exact format:
{{
  "sub_questions": [
    "What are the fundamental principles and historical development of the topic?",
    "What are the current state-of-the-art approaches?",
    "..."
  ]
}}

Generate the sub-questions now:"#
    )
}

/// Prompt for the execute stage: answer one sub-question with sources.
pub fn executor_prompt(question: &str) -> String {
    format!(
        r#"You are a research agent tasked with answering a specific sub-question through research and analysis.

Sub-question to answer: {question}

Your task:
1. Retrieve information from authoritative sources (academic papers, reputable websites, expert analyses)
2. Extract key facts, findings, and quotes
3. Provide proper citations with metadata
4. Write a concise 200-300 word summary

Respond ONLY with valid JSON in this exact format:
{{
  "summary": "A comprehensive 200-300 word summary answering the sub-question with specific findings and analysis...",
  "sources": [
    {{
      "title": "Paper or Article Title",
      "url": "https://example.com/source1",
      "authors": "Author Name(s)",
      "date": "2024-01-15",
      "snippet": "Relevant quote or excerpt from the source that supports the findings"
    }}
  ]
}}

Generate the research response now:"#
    )
}

/// Prompt for the publish stage: synthesize summaries into a full report.
///
/// `summaries` is the deterministic concatenation built by the publish
/// stage; source ids are already embedded there in `[S<n>.<m>]` form, and
/// the report must reuse them verbatim for inline citations.
pub fn publisher_prompt(query: &str, summaries: &str) -> String {
    format!(
        r#"You are a scientific synthesis engine. Combine multiple research summaries into a comprehensive, well-structured 2000+ word research report.

Original Research Query: {query}

Research Summaries and Sources:
{summaries}

Your task:
1. Synthesize all summaries into a cohesive narrative
2. Structure the report with these sections: Introduction, Background & Fundamentals, Current Evidence & Findings, Methodologies & Approaches, Controversies & Limitations, Future Directions & Implications, Conclusion
3. Cite sources inline using their bracketed ids exactly as given above, e.g. [S1.1], [S2.3]
4. Ensure the report is at least 2000 words
5. Write in an academic yet accessible style
6. End with a "References" section listing all sources by id

Format your response as:
# <Generated Title Based On Query>

## Introduction
...

## References
[S1.1] Author(s). "Title." URL. Date.
...

Generate the comprehensive research report now:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_embed_inputs() {
        assert!(planner_prompt("warp drives").contains("User Query: warp drives"));
        assert!(executor_prompt("what is a warp drive?")
            .contains("Sub-question to answer: what is a warp drive?"));
        let p = publisher_prompt("warp drives", "--- Sub-Question 1 ---");
        assert!(p.contains("warp drives"));
        assert!(p.contains("--- Sub-Question 1 ---"));
    }
}
