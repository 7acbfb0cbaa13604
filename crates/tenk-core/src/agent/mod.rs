//! Conversational agent over the registered tool set.
//!
//! The agent is configured once with the full tool list and a model backend.
//! Each turn it selects tools by name from their descriptions, with a
//! bounded number of tool-call steps, then produces a final answer that is
//! appended to the conversation context. [`run_session`] drives turns from a
//! line-oriented input until the reserved exit token.

use std::io::{BufRead, Write};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::compose::extract_json;
use crate::llm::{LLMError, LLM};
use crate::tools::{ToolError, ToolSet};

/// Reserved input that ends an interactive session.
pub const EXIT_TOKEN: &str = "exit";

/// Maximum tool-call steps per turn before giving up.
const DEFAULT_MAX_STEPS: usize = 4;

/// System prompt for the per-turn action loop.
const AGENT_SYSTEM_PROMPT: &str = r#"You are a financial research assistant answering questions about a company's SEC 10-K filings using the tools provided.

Each turn, either call one tool or give the final answer. Prefer a single-year tool when the question is scoped to one fiscal year; use the cross-year tool only when the question spans multiple years. Use prior conversation turns to resolve references like "it" or "that year".

IMPORTANT: Output valid JSON matching exactly one of these structures:
{"action": "tool", "name": "tool_name", "input": "the question to send to the tool"}
{"action": "final", "answer": "the final answer to the user"}

Only output the JSON, no additional text."#;

/// Errors that can occur during an agent turn or session.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LLM(#[from] LLMError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Agent selected unknown tool: {0}")]
    UnknownTool(String),

    #[error("No final answer after {0} tool calls")]
    StepLimit(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One prior exchange in the conversation.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Prior turns threaded through repeated agent invocations so follow-up
/// questions can reference earlier answers. Lives for one session.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    turns: Vec<Turn>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::User,
            content: content.into(),
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::Assistant,
            content: content.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Render prior turns for embedding in a prompt.
    fn to_transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role.as_str(), t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The per-turn action requested by the model.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum AgentAction {
    Tool { name: String, input: String },
    Final { answer: String },
}

/// Parse the model's action response.
///
/// A response that is not valid action JSON is treated as the final answer
/// for the turn; fail-fast is reserved for transport errors.
fn parse_action(response: &str) -> AgentAction {
    serde_json::from_str(extract_json(response)).unwrap_or_else(|_| AgentAction::Final {
        answer: response.trim().to_string(),
    })
}

/// Reasoning agent over the full tool set.
pub struct Agent {
    llm: Arc<dyn LLM>,
    tools: ToolSet,
    max_steps: usize,
}

impl Agent {
    pub fn new(llm: Arc<dyn LLM>, tools: ToolSet) -> Self {
        Self {
            llm,
            tools,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Run one conversational turn.
    ///
    /// On success the question and answer are appended to the context.
    pub async fn run(
        &self,
        question: &str,
        ctx: &mut ConversationContext,
    ) -> Result<String, AgentError> {
        let mut observations: Vec<(String, String, String)> = Vec::new();

        for _ in 0..self.max_steps {
            let prompt = self.build_turn_prompt(question, ctx, &observations);
            let response = self
                .llm
                .complete_with_system(AGENT_SYSTEM_PROMPT, &prompt)
                .await?;

            match parse_action(&response) {
                AgentAction::Tool { name, input } => {
                    let tool = self
                        .tools
                        .get(&name)
                        .ok_or_else(|| AgentError::UnknownTool(name.clone()))?;
                    let output = tool.call(&input).await?;
                    observations.push((name, input, output));
                }
                AgentAction::Final { answer } => {
                    ctx.push_user(question);
                    ctx.push_assistant(&answer);
                    return Ok(answer);
                }
            }
        }

        Err(AgentError::StepLimit(self.max_steps))
    }

    fn build_turn_prompt(
        &self,
        question: &str,
        ctx: &ConversationContext,
        observations: &[(String, String, String)],
    ) -> String {
        let mut prompt = format!("## Available tools\n\n{}\n", self.tools.describe());

        if !ctx.is_empty() {
            prompt.push_str(&format!("\n## Conversation so far\n\n{}\n", ctx.to_transcript()));
        }

        if !observations.is_empty() {
            prompt.push_str("\n## Tool results this turn\n\n");
            for (name, input, output) in observations {
                prompt.push_str(&format!("### {name}(\"{input}\")\n{output}\n\n"));
            }
        }

        prompt.push_str(&format!("\n## Question\n\n{question}"));
        prompt
    }
}

/// Drive an interactive session over line-oriented input.
///
/// Each iteration prompts, reads one line, and either stops (exit token or
/// end of input), skips blank lines, or runs one agent turn and prints the
/// answer. Supplying the exit token first ends the session without any
/// backend call. Errors propagate and end the session.
pub async fn run_session<R: BufRead, W: Write>(
    agent: &Agent,
    ctx: &mut ConversationContext,
    input: &mut R,
    output: &mut W,
) -> Result<(), AgentError> {
    loop {
        write!(output, "User: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == EXIT_TOKEN {
            break;
        }

        let answer = agent.run(line, ctx).await?;
        writeln!(output, "{answer}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct NullRetriever;

    #[async_trait]
    impl crate::index::Retriever for NullRetriever {
        async fn retrieve(
            &self,
            _query: &str,
            _top_k: usize,
        ) -> Result<Vec<crate::index::RetrievedChunk>, crate::index::IndexError> {
            Ok(Vec::new())
        }
    }

    struct NullLLM;

    #[async_trait]
    impl LLM for NullLLM {
        async fn complete(&self, _prompt: &str) -> Result<String, LLMError> {
            Ok(String::new())
        }

        async fn complete_with_system(
            &self,
            _system: &str,
            _prompt: &str,
        ) -> Result<String, LLMError> {
            Ok(String::new())
        }
    }

    struct ScriptedLLM {
        responses: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedLLM {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LLM for ScriptedLLM {
        async fn complete(&self, _prompt: &str) -> Result<String, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
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

    #[test]
    fn test_parse_tool_action() {
        let action = parse_action(r#"{"action": "tool", "name": "uber_2022_filing", "input": "revenue?"}"#);
        assert!(matches!(action, AgentAction::Tool { name, .. } if name == "uber_2022_filing"));
    }

    #[test]
    fn test_parse_final_action() {
        let action = parse_action(r#"{"action": "final", "answer": "Revenue was $31.9 billion."}"#);
        assert!(matches!(action, AgentAction::Final { answer } if answer.contains("31.9")));
    }

    #[test]
    fn test_plain_text_is_a_final_answer() {
        let action = parse_action("Revenue was $31.9 billion.");
        assert!(matches!(action, AgentAction::Final { answer } if answer.contains("31.9")));
    }

    #[tokio::test]
    async fn test_final_answer_updates_context() {
        let llm = ScriptedLLM::new(&[r#"{"action": "final", "answer": "Done."}"#]);
        let agent = Agent::new(llm.clone(), ToolSet::new());
        let mut ctx = ConversationContext::new();

        let answer = agent.run("Question?", &mut ctx).await.unwrap();

        assert_eq!(answer, "Done.");
        assert_eq!(ctx.turns().len(), 2);
        assert_eq!(ctx.turns()[0].role, Role::User);
        assert_eq!(ctx.turns()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_the_turn() {
        let llm = ScriptedLLM::new(&[r#"{"action": "tool", "name": "missing_tool", "input": "?"}"#]);
        let agent = Agent::new(llm, ToolSet::new());
        let mut ctx = ConversationContext::new();

        let err = agent.run("Question?", &mut ctx).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "missing_tool"));
    }

    #[tokio::test]
    async fn test_step_limit_is_enforced() {
        // The model asks for the same tool every step and never finishes.
        let tool_call = r#"{"action": "tool", "name": "uber_2022_filing", "input": "?"}"#;
        let llm = ScriptedLLM::new(&[tool_call, tool_call]);

        // The tool's engine gets its own backend so the agent script is
        // consumed only by the action loop.
        let retriever: Arc<dyn crate::index::Retriever> = Arc::new(NullRetriever);
        let engine = crate::query::QueryEngine::new(retriever, Arc::new(NullLLM), 5);
        let mut tools = ToolSet::new();
        tools
            .insert(crate::tools::filing_tool("UBER", 2022, engine))
            .unwrap();

        let agent = Agent::new(llm.clone(), tools).with_max_steps(2);
        let mut ctx = ConversationContext::new();

        let err = agent.run("Q", &mut ctx).await.unwrap_err();
        assert!(matches!(err, AgentError::StepLimit(2)));
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_exit_token_first_makes_no_backend_call() {
        let llm = ScriptedLLM::new(&[]);
        let agent = Agent::new(llm.clone(), ToolSet::new());
        let mut ctx = ConversationContext::new();

        let mut input = std::io::Cursor::new(b"exit\n".to_vec());
        let mut output = Vec::new();

        run_session(&agent, &mut ctx, &mut input, &mut output)
            .await
            .unwrap();

        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
        assert!(ctx.is_empty());
        assert_eq!(String::from_utf8(output).unwrap(), "User: ");
    }

    #[tokio::test]
    async fn test_session_answers_then_exits() {
        let llm = ScriptedLLM::new(&[r#"{"action": "final", "answer": "Revenue was $31.9 billion."}"#]);
        let agent = Agent::new(llm, ToolSet::new());
        let mut ctx = ConversationContext::new();

        let mut input = std::io::Cursor::new(b"What was revenue?\nexit\n".to_vec());
        let mut output = Vec::new();

        run_session(&agent, &mut ctx, &mut input, &mut output)
            .await
            .unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("31.9"));
        assert_eq!(ctx.turns().len(), 2);
    }

    #[tokio::test]
    async fn test_end_of_input_ends_the_session() {
        let llm = ScriptedLLM::new(&[]);
        let agent = Agent::new(llm, ToolSet::new());
        let mut ctx = ConversationContext::new();

        let mut input = std::io::Cursor::new(Vec::new());
        let mut output = Vec::new();

        assert!(run_session(&agent, &mut ctx, &mut input, &mut output)
            .await
            .is_ok());
    }
}
