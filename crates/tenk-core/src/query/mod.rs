//! Single-scope query engine: retrieve, then answer from the retrieved text.

use std::sync::Arc;

use thiserror::Error;

use crate::index::{IndexError, Retriever};
use crate::llm::{LLMError, LLM};

/// System prompt for answering from retrieved excerpts.
const ANSWER_SYSTEM_PROMPT: &str = r#"You are a financial analyst assistant answering questions about a company's SEC 10-K annual report.

Answer using only the provided excerpts. Quote figures exactly as they appear. If the excerpts do not contain the answer, say so instead of guessing."#;

/// Errors that can occur while answering a query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("LLM error: {0}")]
    LLM(#[from] LLMError),
}

/// Answers questions against one retrieval scope.
///
/// Retrieves the `top_k` most similar chunks and makes a single completion
/// call to answer from them.
#[derive(Clone)]
pub struct QueryEngine {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LLM>,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(retriever: Arc<dyn Retriever>, llm: Arc<dyn LLM>, top_k: usize) -> Self {
        Self {
            retriever,
            llm,
            top_k,
        }
    }

    /// Answer a question from the retrieval scope.
    pub async fn answer(&self, question: &str) -> Result<String, QueryError> {
        let chunks = self.retriever.retrieve(question, self.top_k).await?;

        let context = if chunks.is_empty() {
            "(no relevant excerpts were retrieved)".to_string()
        } else {
            chunks
                .iter()
                .map(|c| format!("## Excerpt {} (score: {:.2})\n{}", c.ordinal, c.score, c.content))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let prompt = build_answer_prompt(question, &context);
        let answer = self
            .llm
            .complete_with_system(ANSWER_SYSTEM_PROMPT, &prompt)
            .await?;

        Ok(answer.trim().to_string())
    }
}

/// Builds the user prompt for answering from excerpts.
fn build_answer_prompt(question: &str, context: &str) -> String {
    format!(
        r#"## Filing excerpts

{context}

## Question

{question}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::RetrievedChunk;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubRetriever {
        chunks: Vec<RetrievedChunk>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Retriever for StubRetriever {
        async fn retrieve(
            &self,
            query: &str,
            _top_k: usize,
        ) -> Result<Vec<RetrievedChunk>, IndexError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.chunks.clone())
        }
    }

    struct EchoLLM;

    #[async_trait]
    impl LLM for EchoLLM {
        async fn complete(&self, prompt: &str) -> Result<String, LLMError> {
            Ok(prompt.to_string())
        }

        async fn complete_with_system(
            &self,
            _system: &str,
            prompt: &str,
        ) -> Result<String, LLMError> {
            Ok(prompt.to_string())
        }
    }

    #[tokio::test]
    async fn test_retrieved_text_reaches_the_model() {
        let retriever = Arc::new(StubRetriever {
            chunks: vec![RetrievedChunk {
                content: "Revenue was $31.9 billion.".to_string(),
                score: 0.92,
                ordinal: 0,
            }],
            queries: Mutex::new(Vec::new()),
        });

        let engine = QueryEngine::new(retriever.clone(), Arc::new(EchoLLM), 5);
        let answer = engine
            .answer("What is the revenue for Uber in 2022?")
            .await
            .unwrap();

        assert!(answer.contains("31.9"));
        assert_eq!(
            retriever.queries.lock().unwrap().as_slice(),
            ["What is the revenue for Uber in 2022?"]
        );
    }

    #[tokio::test]
    async fn test_empty_retrieval_still_answers() {
        let retriever = Arc::new(StubRetriever {
            chunks: Vec::new(),
            queries: Mutex::new(Vec::new()),
        });

        let engine = QueryEngine::new(retriever, Arc::new(EchoLLM), 5);
        let answer = engine.answer("Anything?").await.unwrap();

        assert!(answer.contains("no relevant excerpts"));
    }
}
