//! Per-year vector indexes over the filing corpus.
//!
//! Each configured fiscal year owns exactly one index, persisted as an
//! embedded SurrealDB database (RocksDB engine) under
//! `{index_dir}/year_{year}` with an HNSW cosine index over chunk
//! embeddings.
//!
//! [`IndexSet::ensure`] implements the build-vs-load decision: a build pass
//! ingests the year's filing, constructs a fresh database, and overwrites
//! any existing directory; a load pass opens the persisted directory and
//! fails if it is absent or was never fully built. The flag is
//! all-or-nothing across years, and years are processed sequentially.

mod chunker;
mod db;
mod embedder;
mod error;
pub mod models;

pub use chunker::chunk_text;
pub use db::{FilingIndexDb, EMBEDDING_DIM};
pub use embedder::{Embedder, FastEmbedder};
pub use error::IndexError;
pub use models::{FilingChunk, IndexManifest, RetrievedChunk};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::corpus::{Filing, FilingLoader};

/// Similarity retrieval over one scope of the corpus.
///
/// Query engines depend on this trait rather than on [`YearIndex`] directly
/// so retrieval can be faked in tests.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve the `top_k` chunks most similar to the query.
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, IndexError>;
}

/// A searchable index over one fiscal year's filing.
#[derive(Clone)]
pub struct YearIndex {
    year: u16,
    db: Arc<FilingIndexDb>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for YearIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YearIndex")
            .field("year", &self.year)
            .finish_non_exhaustive()
    }
}

impl YearIndex {
    /// Fiscal year this index covers.
    pub fn year(&self) -> u16 {
        self.year
    }

    /// Similarity search over the year's chunks.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        let query_embedding = self.embedder.embed(&[query.to_string()])?;
        self.db.search_by_embedding(&query_embedding[0], top_k).await
    }
}

#[async_trait]
impl Retriever for YearIndex {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>, IndexError> {
        self.search(query, top_k).await
    }
}

/// Builds or loads the full set of per-year indexes.
pub struct IndexSet;

impl IndexSet {
    /// Build or load an index for every configured year.
    ///
    /// With `rebuild` set, every year's filing is ingested and persisted,
    /// overwriting existing directories. Otherwise every year is loaded from
    /// disk; a missing or never-built directory surfaces as
    /// [`IndexError::NotBuilt`] with no fallback to building.
    pub async fn ensure(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        rebuild: bool,
    ) -> Result<BTreeMap<u16, YearIndex>, IndexError> {
        let mut indexes = BTreeMap::new();

        if rebuild {
            let loader = FilingLoader::new(config.corpus.clone());
            for &year in &config.corpus.years {
                let filing = loader.load_year(year)?;
                let index = Self::build_year(config, Arc::clone(&embedder), &filing).await?;
                indexes.insert(year, index);
            }
        } else {
            for &year in &config.corpus.years {
                let index = Self::load_year(config, Arc::clone(&embedder), year).await?;
                indexes.insert(year, index);
            }
        }

        Ok(indexes)
    }

    /// Build a fresh index for one filing and persist it.
    pub async fn build_year(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        filing: &Filing,
    ) -> Result<YearIndex, IndexError> {
        let dir = config.storage.year_dir(filing.year);

        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|e| IndexError::io(&dir, e))?;
        }
        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
        }

        let db = FilingIndexDb::open(&dir).await?;
        db.initialize_schema().await?;

        let mut chunks = chunk_text(
            &filing.text,
            filing.year,
            config.retrieval.chunk_size,
            config.retrieval.chunk_overlap,
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = embedder.embed(&texts)?;

        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
            db.insert_chunk(chunk).await?;
        }

        db.write_manifest(&IndexManifest {
            company: filing.company.clone(),
            year: filing.year,
            source_hash: filing.source_hash.clone(),
            chunk_count: chunks.len(),
            embedding_model: embedder.model_name().to_string(),
            built_at: chrono::Utc::now(),
        })
        .await?;

        Ok(YearIndex {
            year: filing.year,
            db: Arc::new(db),
            embedder,
        })
    }

    /// Load a persisted index for one year.
    pub async fn load_year(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        year: u16,
    ) -> Result<YearIndex, IndexError> {
        let dir = config.storage.year_dir(year);

        if !dir.exists() {
            return Err(IndexError::NotBuilt { path: dir });
        }

        let db = FilingIndexDb::open(&dir).await?;

        if db.read_manifest().await?.is_none() {
            return Err(IndexError::NotBuilt { path: dir });
        }

        Ok(YearIndex {
            year,
            db: Arc::new(db),
            embedder,
        })
    }
}
