//! Named query tools exposed to the agent.
//!
//! Tool selection downstream is name-addressed and guided only by the
//! description strings, so names must be pairwise unique and descriptions
//! must state their scope (one year vs. cross-year aggregation)
//! unambiguously.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::compose::{ComposeError, SubQuestionEngine};
use crate::config::Config;
use crate::index::{Retriever, YearIndex};
use crate::llm::LLM;
use crate::query::{QueryEngine, QueryError};

/// Errors that can occur registering or invoking tools.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Duplicate tool name: {0}")]
    DuplicateName(String),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),
}

/// What a tool routes questions to.
///
/// A closed set: either one year's filing or the cross-year composer.
#[derive(Clone)]
pub enum ToolTarget {
    /// Direct queries against a single fiscal year's filing.
    Filing { year: u16, engine: QueryEngine },
    /// Cross-year questions decomposed over the per-year engines.
    CrossYear { engine: SubQuestionEngine },
}

/// A named, described capability the agent can select.
///
/// Created once at startup and read-only afterwards.
#[derive(Clone)]
pub struct QueryTool {
    name: String,
    description: String,
    target: ToolTarget,
}

impl QueryTool {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn target(&self) -> &ToolTarget {
        &self.target
    }

    /// Route a question to the tool's target.
    pub async fn call(&self, question: &str) -> Result<String, ToolError> {
        match &self.target {
            ToolTarget::Filing { engine, .. } => Ok(engine.answer(question).await?),
            ToolTarget::CrossYear { engine } => Ok(engine.answer(question).await?),
        }
    }
}

/// Tool over one fiscal year's filing. Name: `{company}_{year}_filing`.
pub fn filing_tool(company: &str, year: u16, engine: QueryEngine) -> QueryTool {
    QueryTool {
        name: format!("{}_{}_filing", company.to_lowercase(), year),
        description: format!(
            "Answers questions about the {company} SEC 10-K annual report for fiscal year \
             {year}. Use only for questions scoped to {year} alone."
        ),
        target: ToolTarget::Filing { year, engine },
    }
}

/// Tool over the cross-year composer. Name: `{company}_filings_all_years`.
pub fn cross_year_tool(company: &str, years: &[u16], engine: SubQuestionEngine) -> QueryTool {
    let year_list = years
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    QueryTool {
        name: format!("{}_filings_all_years", company.to_lowercase()),
        description: format!(
            "Answers questions that require comparing or aggregating across multiple \
             {company} SEC 10-K annual reports (fiscal years {year_list}). Use when a \
             question spans more than one year."
        ),
        target: ToolTarget::CrossYear { engine },
    }
}

/// The registered tool set, addressed by name.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<QueryTool>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique across the set.
    pub fn insert(&mut self, tool: QueryTool) -> Result<(), ToolError> {
        if self.get(tool.name()).is_some() {
            return Err(ToolError::DuplicateName(tool.name().to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&QueryTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryTool> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(QueryTool::name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// One line per tool, for embedding in prompts.
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Wire the full tool set: one tool per year index, plus the cross-year
/// composer wrapped as one more tool.
///
/// The two-level hierarchy lets the agent pick a cheap single-year query
/// when one suffices instead of always paying for decomposition.
pub fn build_tool_set(
    config: &Config,
    indexes: &BTreeMap<u16, YearIndex>,
    llm: Arc<dyn LLM>,
) -> Result<ToolSet, ToolError> {
    let company = &config.corpus.company;
    let mut tools = ToolSet::new();
    let mut filing_tools = Vec::new();

    for (&year, index) in indexes {
        let retriever: Arc<dyn Retriever> = Arc::new(index.clone());
        let engine = QueryEngine::new(retriever, Arc::clone(&llm), config.retrieval.top_k);
        filing_tools.push(filing_tool(company, year, engine));
    }

    let composer = SubQuestionEngine::new(Arc::clone(&llm), filing_tools.clone())?;
    let years: Vec<u16> = indexes.keys().copied().collect();
    let composite = cross_year_tool(company, &years, composer);

    for tool in filing_tools {
        tools.insert(tool)?;
    }
    tools.insert(composite)?;

    Ok(tools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexError, RetrievedChunk};
    use crate::llm::LLMError;
    use async_trait::async_trait;

    struct NullRetriever;

    #[async_trait]
    impl Retriever for NullRetriever {
        async fn retrieve(
            &self,
            _query: &str,
            _top_k: usize,
        ) -> Result<Vec<RetrievedChunk>, IndexError> {
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

    fn test_engine() -> QueryEngine {
        QueryEngine::new(Arc::new(NullRetriever), Arc::new(NullLLM), 5)
    }

    #[test]
    fn test_filing_tool_name_derivation() {
        let tool = filing_tool("UBER", 2022, test_engine());
        assert_eq!(tool.name(), "uber_2022_filing");
        assert!(tool.description().contains("2022"));
    }

    #[test]
    fn test_tool_names_unique_per_year() {
        let mut set = ToolSet::new();
        for year in [2019u16, 2020, 2021, 2022] {
            set.insert(filing_tool("UBER", year, test_engine())).unwrap();
        }

        let mut names = set.names();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut set = ToolSet::new();
        set.insert(filing_tool("UBER", 2022, test_engine())).unwrap();

        let err = set
            .insert(filing_tool("UBER", 2022, test_engine()))
            .unwrap_err();
        assert!(matches!(err, ToolError::DuplicateName(name) if name == "uber_2022_filing"));
    }

    #[test]
    fn test_lookup_by_name() {
        let mut set = ToolSet::new();
        set.insert(filing_tool("UBER", 2021, test_engine())).unwrap();

        assert!(set.get("uber_2021_filing").is_some());
        assert!(set.get("uber_2022_filing").is_none());
    }

    #[test]
    fn test_describe_lists_every_tool() {
        let mut set = ToolSet::new();
        set.insert(filing_tool("UBER", 2021, test_engine())).unwrap();
        set.insert(filing_tool("UBER", 2022, test_engine())).unwrap();

        let block = set.describe();
        assert!(block.contains("uber_2021_filing"));
        assert!(block.contains("uber_2022_filing"));
    }
}
