pub mod agent;
pub mod compose;
pub mod config;
pub mod corpus;
pub mod index;
pub mod llm;
pub mod query;
pub mod tools;

pub use agent::{Agent, ConversationContext};
pub use config::Config;
pub use corpus::{Filing, FilingLoader};
pub use index::{IndexSet, YearIndex};
pub use tools::{QueryTool, ToolSet};
