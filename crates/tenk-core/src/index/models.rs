//! Records stored in a per-year index.

use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

/// A chunk of filing text with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingChunk {
    /// Unique identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    /// Fiscal year of the filing this chunk came from.
    pub year: u16,
    /// Position of the chunk within the filing, starting at zero.
    pub ordinal: usize,
    /// The chunk text.
    pub content: String,
    /// Byte offset of the chunk start in the extracted filing text.
    pub start_offset: usize,
    /// Byte offset one past the chunk end.
    pub end_offset: usize,
    /// Embedding vector (384 dimensions for BGESmallENV15).
    pub embedding: Vec<f32>,
}

impl FilingChunk {
    /// Create a new chunk without an embedding.
    pub fn new(
        year: u16,
        ordinal: usize,
        content: impl Into<String>,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Self {
            id: None,
            year,
            ordinal,
            content: content.into(),
            start_offset,
            end_offset,
            embedding: Vec::new(),
        }
    }
}

/// Result from a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// The chunk text.
    pub content: String,
    /// Cosine similarity score (0.0 to 1.0).
    pub score: f32,
    /// Position of the chunk within the filing.
    pub ordinal: usize,
}

/// Build metadata persisted alongside the chunks.
///
/// Presence of a manifest marks the directory as loadable. The source hash
/// is recorded but never checked, so a directory built from outdated
/// documents loads without complaint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Company ticker.
    pub company: String,
    /// Fiscal year this index covers.
    pub year: u16,
    /// SHA-256 of the raw source document at build time.
    pub source_hash: String,
    /// Number of chunks written.
    pub chunk_count: usize,
    /// Embedding model used at build time.
    pub embedding_model: String,
    /// Build timestamp.
    pub built_at: chrono::DateTime<chrono::Utc>,
}
