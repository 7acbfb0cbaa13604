//! Index error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::corpus::CorpusError;

/// Errors that can occur while building, loading, or querying an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// Embedding generation error.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// IO error.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No persisted index exists for the year and the rebuild flag is unset.
    #[error("No persisted index at {}. Run 'tenk index' first.", path.display())]
    NotBuilt { path: PathBuf },

    /// Corpus loading error surfaced during a build pass.
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),
}

impl From<surrealdb::Error> for IndexError {
    fn from(err: surrealdb::Error) -> Self {
        IndexError::Database(err.to_string())
    }
}

impl IndexError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            source,
        }
    }
}
