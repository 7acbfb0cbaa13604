//! Sub-question composition for cross-year questions.
//!
//! A compound question is decomposed into per-tool sub-questions by the
//! model, each sub-question runs against its named per-year engine, and a
//! final synthesis call combines the sub-answers. The composer accepts only
//! single-year tools; it is itself wrapped as one more tool so the agent can
//! treat "answer across all years" as just another selectable capability.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::llm::{LLMError, LLM};
use crate::query::QueryError;
use crate::tools::{QueryTool, ToolTarget};

/// System prompt for the decomposition call.
const DECOMPOSE_SYSTEM_PROMPT: &str = r#"You split a question about a company's SEC 10-K filings into independent sub-questions, each answerable by exactly one of the available tools.

Rules:
- Route each sub-question to the single tool whose scope matches it.
- Emit as few sub-questions as the question needs; one is fine.
- Never invent tool names; use only the names listed.

IMPORTANT: Output valid JSON matching this exact structure:
{
  "sub_questions": [
    {
      "tool": "tool_name",
      "question": "the sub-question for that tool"
    }
  ]
}

Only output the JSON, no additional text."#;

/// System prompt for the synthesis call.
const SYNTHESIZE_SYSTEM_PROMPT: &str = r#"You combine answers to sub-questions into one final answer to the original question about a company's SEC 10-K filings.

Base the final answer only on the sub-answers provided. Keep figures exactly as they appear. If the sub-answers conflict or are incomplete, say so."#;

/// Errors that can occur during composition.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("LLM error: {0}")]
    LLM(#[from] LLMError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Failed to parse decomposition: {0}")]
    Decomposition(String),

    #[error("Decomposition routed to unknown tool: {0}")]
    UnknownTool(String),

    #[error("Composer accepts only single-year tools, got: {0}")]
    NotAFilingTool(String),
}

/// Decomposes cross-year questions over a set of single-year tools.
#[derive(Clone)]
pub struct SubQuestionEngine {
    llm: Arc<dyn LLM>,
    tools: Vec<QueryTool>,
}

impl SubQuestionEngine {
    /// Create a composer over the given tools.
    ///
    /// Every tool must target a single year's filing.
    pub fn new(llm: Arc<dyn LLM>, tools: Vec<QueryTool>) -> Result<Self, ComposeError> {
        for tool in &tools {
            if !matches!(tool.target(), ToolTarget::Filing { .. }) {
                return Err(ComposeError::NotAFilingTool(tool.name().to_string()));
            }
        }
        Ok(Self { llm, tools })
    }

    /// Answer a question by decomposition, routing, and synthesis.
    pub async fn answer(&self, question: &str) -> Result<String, ComposeError> {
        let mut subs = self.decompose(question).await?;

        // No benefit found in decomposition: fan the original question out to
        // every year and aggregate.
        if subs.is_empty() {
            subs = self
                .tools
                .iter()
                .map(|t| SubQuestion {
                    tool: t.name().to_string(),
                    question: question.to_string(),
                })
                .collect();
        }

        let mut findings = Vec::with_capacity(subs.len());
        for sub in subs {
            let tool = self
                .tools
                .iter()
                .find(|t| t.name() == sub.tool)
                .ok_or_else(|| ComposeError::UnknownTool(sub.tool.clone()))?;

            let answer = match tool.target() {
                ToolTarget::Filing { engine, .. } => engine.answer(&sub.question).await?,
                // Ruled out at construction.
                ToolTarget::CrossYear { .. } => {
                    return Err(ComposeError::NotAFilingTool(sub.tool))
                }
            };

            findings.push(SubAnswer {
                tool: sub.tool,
                question: sub.question,
                answer,
            });
        }

        // A single sub-answer is the answer; no synthesis round-trip.
        if findings.len() == 1 {
            return Ok(findings.remove(0).answer);
        }

        self.synthesize(question, &findings).await
    }

    async fn decompose(&self, question: &str) -> Result<Vec<SubQuestion>, ComposeError> {
        let prompt = format!(
            r#"## Available tools

{}

## Question

{question}"#,
            describe_tools(&self.tools)
        );

        let response = self
            .llm
            .complete_with_system(DECOMPOSE_SYSTEM_PROMPT, &prompt)
            .await?;

        let json_str = extract_json(&response);
        let parsed: DecompositionResponse = serde_json::from_str(json_str).map_err(|e| {
            ComposeError::Decomposition(format!(
                "Failed to parse LLM response as JSON: {}. Response: {}",
                e,
                truncate_chars(json_str, 500)
            ))
        })?;

        Ok(parsed.sub_questions)
    }

    async fn synthesize(
        &self,
        question: &str,
        findings: &[SubAnswer],
    ) -> Result<String, ComposeError> {
        let answers = findings
            .iter()
            .map(|f| {
                format!("## {} ({})\n{}", f.tool, f.question, f.answer)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            r#"## Original question

{question}

## Sub-answers

{answers}"#
        );

        let answer = self
            .llm
            .complete_with_system(SYNTHESIZE_SYSTEM_PROMPT, &prompt)
            .await?;

        Ok(answer.trim().to_string())
    }
}

fn describe_tools(tools: &[QueryTool]) -> String {
    tools
        .iter()
        .map(|t| format!("- {}: {}", t.name(), t.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One routed sub-question from the decomposition response.
#[derive(Debug, Deserialize)]
struct SubQuestion {
    tool: String,
    question: String,
}

#[derive(Debug, Deserialize)]
struct DecompositionResponse {
    sub_questions: Vec<SubQuestion>,
}

/// A sub-question together with its answer.
#[derive(Debug)]
struct SubAnswer {
    tool: String,
    question: String,
    answer: String,
}

/// Truncate to at most `max_chars` characters, never splitting a character.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Extracts JSON from a response that might be wrapped in markdown code blocks.
pub(crate) fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // Check for ```json ... ``` or ``` ... ```
    if trimmed.starts_with("```") {
        // Find the end of the first line (after ```json or ```)
        if let Some(start) = trimmed.find('\n') {
            let rest = &trimmed[start + 1..];
            // Find the closing ```
            if let Some(end) = rest.rfind("```") {
                return rest[..end].trim();
            }
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexError, Retriever, RetrievedChunk};
    use crate::query::QueryEngine;
    use crate::tools::filing_tool;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a queue of canned responses.
    struct ScriptedLLM {
        responses: Mutex<VecDeque<String>>,
    }

    impl ScriptedLLM {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl LLM for ScriptedLLM {
        async fn complete(&self, _prompt: &str) -> Result<String, LLMError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LLMError::ParseError("script exhausted".to_string()))
        }

        async fn complete_with_system(
            &self,
            _system: &str,
            prompt: &str,
        ) -> Result<String, LLMError> {
            self.complete(prompt).await
        }
    }

    struct YearStubRetriever {
        content: &'static str,
    }

    #[async_trait]
    impl Retriever for YearStubRetriever {
        async fn retrieve(
            &self,
            _query: &str,
            _top_k: usize,
        ) -> Result<Vec<RetrievedChunk>, IndexError> {
            Ok(vec![RetrievedChunk {
                content: self.content.to_string(),
                score: 0.9,
                ordinal: 0,
            }])
        }
    }

    fn filing_tools(llm: Arc<dyn LLM>) -> Vec<QueryTool> {
        let mk = |year: u16, content: &'static str| {
            let retriever: Arc<dyn Retriever> = Arc::new(YearStubRetriever { content });
            filing_tool("UBER", year, QueryEngine::new(retriever, Arc::clone(&llm), 3))
        };
        vec![
            mk(2019, "Revenue was $14.1 billion."),
            mk(2022, "Revenue was $31.9 billion."),
        ]
    }

    #[test]
    fn test_extract_json_strips_code_fences() {
        let fenced = "```json\n{\"sub_questions\": []}\n```";
        assert_eq!(extract_json(fenced), "{\"sub_questions\": []}");
        assert_eq!(extract_json("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn test_single_sub_question_skips_synthesis() {
        // Script: decomposition, then the 2022 engine's answer. No synthesis
        // response is queued, so a third call would fail the test.
        let llm: Arc<dyn LLM> = ScriptedLLM::new(&[
            r#"{"sub_questions": [{"tool": "uber_2022_filing", "question": "What was revenue in 2022?"}]}"#,
            "Revenue in fiscal 2022 was $31.9 billion.",
        ]);

        let engine = SubQuestionEngine::new(Arc::clone(&llm), filing_tools(Arc::clone(&llm))).unwrap();
        let answer = engine
            .answer("What is the revenue for Uber in 2022?")
            .await
            .unwrap();

        assert!(answer.contains("31.9"));
    }

    #[tokio::test]
    async fn test_multiple_sub_questions_are_synthesized() {
        let llm: Arc<dyn LLM> = ScriptedLLM::new(&[
            r#"{"sub_questions": [
                {"tool": "uber_2019_filing", "question": "What was revenue in 2019?"},
                {"tool": "uber_2022_filing", "question": "What was revenue in 2022?"}
            ]}"#,
            "Revenue in 2019 was $14.1 billion.",
            "Revenue in 2022 was $31.9 billion.",
            "Revenue grew from $14.1 billion in 2019 to $31.9 billion in 2022.",
        ]);

        let engine = SubQuestionEngine::new(Arc::clone(&llm), filing_tools(Arc::clone(&llm))).unwrap();
        let answer = engine
            .answer("How did revenue change between 2019 and 2022?")
            .await
            .unwrap();

        assert!(answer.contains("14.1"));
        assert!(answer.contains("31.9"));
    }

    #[tokio::test]
    async fn test_empty_decomposition_fans_out_to_every_year() {
        let llm: Arc<dyn LLM> = ScriptedLLM::new(&[
            r#"{"sub_questions": []}"#,
            "2019 answer.",
            "2022 answer.",
            "Combined answer.",
        ]);

        let engine = SubQuestionEngine::new(Arc::clone(&llm), filing_tools(Arc::clone(&llm))).unwrap();
        let answer = engine.answer("Summarize the filings.").await.unwrap();

        assert_eq!(answer, "Combined answer.");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_error() {
        let llm: Arc<dyn LLM> = ScriptedLLM::new(&[
            r#"{"sub_questions": [{"tool": "uber_2030_filing", "question": "?"}]}"#,
        ]);

        let engine = SubQuestionEngine::new(Arc::clone(&llm), filing_tools(Arc::clone(&llm))).unwrap();
        let err = engine.answer("Anything").await.unwrap_err();

        assert!(matches!(err, ComposeError::UnknownTool(name) if name == "uber_2030_filing"));
    }

    #[tokio::test]
    async fn test_malformed_decomposition_is_an_error() {
        let llm: Arc<dyn LLM> = ScriptedLLM::new(&["not json at all"]);

        let engine = SubQuestionEngine::new(Arc::clone(&llm), filing_tools(Arc::clone(&llm))).unwrap();
        let err = engine.answer("Anything").await.unwrap_err();

        assert!(matches!(err, ComposeError::Decomposition(_)));
    }

    #[tokio::test]
    async fn test_long_multibyte_garbage_response_reports_without_panicking() {
        // Byte 500 of this response falls inside a two-byte character.
        let garbage = "é".repeat(600);
        let llm: Arc<dyn LLM> = ScriptedLLM::new(&[garbage.as_str()]);

        let engine = SubQuestionEngine::new(Arc::clone(&llm), filing_tools(Arc::clone(&llm))).unwrap();
        let err = engine.answer("Anything").await.unwrap_err();

        assert!(matches!(err, ComposeError::Decomposition(_)));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 5), "ab");
        assert_eq!(truncate_chars("ééé", 2), "éé");
    }
}
