//! Embedding generation for similarity search.

use std::path::PathBuf;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::error::IndexError;

/// Trait for embedding generation.
pub trait Embedder: Send + Sync {
    /// Generate embeddings for a batch of text.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Get the model name.
    fn model_name(&self) -> &str;
}

/// FastEmbed-based embedder using the BGE-Small model.
pub struct FastEmbedder {
    model: TextEmbedding,
    dimension: usize,
    model_name: String,
}

impl FastEmbedder {
    /// Create a new FastEmbed embedder with the default model.
    /// Uses `~/.tenk/cache/` as the model cache directory.
    pub fn new() -> Result<Self, IndexError> {
        Self::with_cache(Self::default_cache_dir())
    }

    /// Create a new FastEmbed embedder with a specific cache directory.
    pub fn with_cache(cache_dir: PathBuf) -> Result<Self, IndexError> {
        let model = EmbeddingModel::BGESmallENV15;
        let model_name = format!("{:?}", model);

        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            IndexError::Embedding(format!("Failed to create cache directory: {}", e))
        })?;

        let text_embedding = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(true),
        )
        .map_err(|e| IndexError::Embedding(e.to_string()))?;

        // Get dimension from a test embedding
        let test_result = text_embedding
            .embed(vec!["test"], None)
            .map_err(|e| IndexError::Embedding(e.to_string()))?;

        let dimension = test_result.first().map(|v| v.len()).unwrap_or(384);

        Ok(Self {
            model: text_embedding,
            dimension,
            model_name,
        })
    }

    /// Get the default cache directory: `~/.tenk/cache/`
    fn default_cache_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tenk")
            .join("cache")
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let texts_vec: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();

        self.model
            .embed(texts_vec, None)
            .map_err(|e| IndexError::Embedding(e.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
