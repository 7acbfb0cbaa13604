//! Configuration management for tenk.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `tenk.toml` file
//! 3. User config `~/.config/tenk/config.toml`
//! 4. Built-in defaults (lowest priority)
//!
//! One resolved [`Config`] is passed explicitly into every component
//! constructor; nothing reads ambient configuration after startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM backend configuration.
    pub llm: LLMConfig,

    /// Filing corpus configuration.
    pub corpus: CorpusConfig,

    /// Persisted index storage configuration.
    pub storage: StorageConfig,

    /// Retrieval tuning.
    pub retrieval: RetrievalConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./tenk.toml` (project local)
    /// 2. `~/.config/tenk/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new("tenk.toml").exists() {
            return Self::from_file("tenk.toml");
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tenk").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("TENK_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Ok(url) = std::env::var("TENK_LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("TENK_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(tokens) = std::env::var("TENK_LLM_MAX_TOKENS") {
            if let Ok(n) = tokens.parse() {
                self.llm.max_tokens = n;
            }
        }

        if let Ok(dir) = std::env::var("TENK_DATA_DIR") {
            self.corpus.data_dir = dir;
        }
        if let Ok(company) = std::env::var("TENK_COMPANY") {
            self.corpus.company = company;
        }
        if let Ok(dir) = std::env::var("TENK_INDEX_DIR") {
            self.storage.index_dir = dir;
        }
    }

    /// Validate cross-field invariants.
    ///
    /// Every configured year gets exactly one index, so the year list must be
    /// non-empty and free of duplicates.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.corpus.years.is_empty() {
            return Err(ConfigError::Invalid(
                "corpus.years must list at least one fiscal year".to_string(),
            ));
        }

        let mut seen = self.corpus.years.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.corpus.years.len() {
            return Err(ConfigError::Invalid(
                "corpus.years contains a duplicate year".to_string(),
            ));
        }

        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::Invalid(
                "retrieval.chunk_overlap must be below retrieval.chunk_size".to_string(),
            ));
        }

        Ok(())
    }
}

/// LLM backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    /// Base URL for the chat completions API.
    pub base_url: Option<String>,

    /// Model name.
    pub model: Option<String>,

    /// API key (can also be set via environment variable).
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Maximum tokens for response.
    pub max_tokens: u32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            api_key: None, // Load from env
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl LLMConfig {
    /// Get the model name, falling back to the default.
    pub fn model_or_default(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string())
    }

    /// Get the base URL, falling back to the default.
    pub fn base_url_or_default(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_LLM_URL.to_string())
    }

    /// Get API key from config or environment.
    pub fn api_key_or_env(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("TENK_LLM_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

/// Filing corpus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Directory holding the downloaded filings.
    pub data_dir: String,

    /// Company ticker, as used in the filing file names.
    pub company: String,

    /// Fiscal years to index.
    pub years: Vec<u16>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            company: DEFAULT_COMPANY.to_string(),
            years: DEFAULT_YEARS.to_vec(),
        }
    }
}

impl CorpusConfig {
    /// Path to the filing for one fiscal year:
    /// `{data_dir}/{COMPANY}/{COMPANY}_{year}.html`.
    pub fn filing_path(&self, year: u16) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.company).join(format!(
            "{}_{}.{}",
            self.company, year, FILING_EXTENSION
        ))
    }
}

/// Persisted index storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for persisted per-year indexes.
    pub index_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_dir: DEFAULT_INDEX_DIR.to_string(),
        }
    }
}

impl StorageConfig {
    /// Path to the persisted index directory for one fiscal year.
    pub fn year_dir(&self, year: u16) -> PathBuf {
        PathBuf::from(&self.index_dir).join(format!("{YEAR_DIR_PREFIX}{year}"))
    }
}

/// Retrieval tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per query.
    pub top_k: usize,

    /// Maximum chunk size in characters.
    pub chunk_size: usize,

    /// Chunk overlap in characters.
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}
