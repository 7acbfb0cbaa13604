//! Default values for tenk configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// LLM Defaults
// ============================================================================

/// Default chat completions API URL.
pub const DEFAULT_LLM_URL: &str = "https://api.openai.com/v1";

/// Default model for decomposition, synthesis, and the agent loop.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Default max tokens for LLM responses.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

// ============================================================================
// Corpus Defaults
// ============================================================================

/// Default directory holding the downloaded filings.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default company ticker, as used in the filing file names.
pub const DEFAULT_COMPANY: &str = "UBER";

/// Default fiscal years to index.
pub const DEFAULT_YEARS: &[u16] = &[2022, 2021, 2020, 2019];

/// File extension of the downloaded filings.
pub const FILING_EXTENSION: &str = "html";

// ============================================================================
// Storage Defaults
// ============================================================================

/// Default directory for persisted per-year indexes.
pub const DEFAULT_INDEX_DIR: &str = "./storage";

/// Prefix of each per-year index directory, e.g. `storage/year_2022`.
pub const YEAR_DIR_PREFIX: &str = "year_";

// ============================================================================
// Retrieval Defaults
// ============================================================================

/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Maximum chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Chunk overlap in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
