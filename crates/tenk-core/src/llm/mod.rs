//! Chat completion backend for decomposition, synthesis, and the agent loop.

mod error;
mod openai;

pub use error::LLMError;
pub use openai::OpenAIClient;

use async_trait::async_trait;

use crate::config::LLMConfig;

/// Trait for chat completion backends.
///
/// Everything above this trait (query engines, the sub-question composer,
/// the agent) talks to the model through it, which keeps those components
/// testable with scripted fakes.
#[async_trait]
pub trait LLM: Send + Sync {
    /// Complete a prompt and return the response.
    async fn complete(&self, prompt: &str) -> Result<String, LLMError>;

    /// Complete a prompt with a system message.
    async fn complete_with_system(&self, system: &str, prompt: &str) -> Result<String, LLMError>;
}

/// Blanket implementation for boxed trait objects.
#[async_trait]
impl LLM for Box<dyn LLM> {
    async fn complete(&self, prompt: &str) -> Result<String, LLMError> {
        (**self).complete(prompt).await
    }

    async fn complete_with_system(&self, system: &str, prompt: &str) -> Result<String, LLMError> {
        (**self).complete_with_system(system, prompt).await
    }
}

/// Build the configured client.
///
/// An API key is required when talking to the default hosted endpoint; a
/// custom `base_url` (a local OpenAI-compatible server) may run keyless.
pub fn client_from_config(config: &LLMConfig) -> Result<OpenAIClient, LLMError> {
    let key = match config.api_key_or_env() {
        Some(key) => key,
        None if config.base_url.is_some() => String::new(),
        None => return Err(LLMError::MissingApiKey),
    };

    Ok(
        OpenAIClient::new(config.base_url_or_default(), key, config.model_or_default())
            .with_max_tokens(config.max_tokens),
    )
}
