//! SurrealDB embedded database backing one per-year index.

use std::path::Path;
use surrealdb::engine::local::{Db, RocksDb};
use surrealdb::Surreal;

use super::error::IndexError;
use super::models::{FilingChunk, IndexManifest, RetrievedChunk};

/// Embedding dimension the chunk table is defined with (BGE-Small).
pub const EMBEDDING_DIM: usize = 384;

/// Database connection for one year's persisted index.
pub struct FilingIndexDb {
    db: Surreal<Db>,
}

impl FilingIndexDb {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self, IndexError> {
        let db = Surreal::new::<RocksDb>(path).await?;
        db.use_ns("tenk").use_db("filings").await?;

        Ok(Self { db })
    }

    /// Initialize the schema for a fresh build.
    pub async fn initialize_schema(&self) -> Result<(), IndexError> {
        self.db
            .query(
                r#"
                DEFINE TABLE chunk SCHEMAFULL;
                DEFINE FIELD year ON chunk TYPE int;
                DEFINE FIELD ordinal ON chunk TYPE int;
                DEFINE FIELD content ON chunk TYPE string;
                DEFINE FIELD start_offset ON chunk TYPE int;
                DEFINE FIELD end_offset ON chunk TYPE int;
                DEFINE FIELD embedding ON chunk TYPE array<float>;
                DEFINE INDEX chunk_embedding ON chunk FIELDS embedding HNSW DIMENSION 384 DIST COSINE;
                DEFINE INDEX chunk_ordinal ON chunk FIELDS ordinal;
                "#,
            )
            .await?;

        self.db
            .query(
                r#"
                DEFINE TABLE manifest SCHEMAFULL;
                DEFINE FIELD company ON manifest TYPE string;
                DEFINE FIELD year ON manifest TYPE int;
                DEFINE FIELD source_hash ON manifest TYPE string;
                DEFINE FIELD chunk_count ON manifest TYPE int;
                DEFINE FIELD embedding_model ON manifest TYPE string;
                DEFINE FIELD built_at ON manifest TYPE datetime;
                "#,
            )
            .await?;

        Ok(())
    }

    /// Write the build manifest, replacing any previous one.
    pub async fn write_manifest(&self, manifest: &IndexManifest) -> Result<(), IndexError> {
        self.db.query("DELETE manifest").await?;
        let _: Option<IndexManifest> = self.db.create("manifest").content(manifest.clone()).await?;
        Ok(())
    }

    /// Read the build manifest, if one exists.
    ///
    /// A missing manifest means the directory was never fully built.
    pub async fn read_manifest(&self) -> Result<Option<IndexManifest>, IndexError> {
        let manifest: Option<IndexManifest> = self
            .db
            .query("SELECT * FROM manifest LIMIT 1")
            .await?
            .take(0)?;
        Ok(manifest)
    }

    /// Insert a chunk.
    pub async fn insert_chunk(&self, chunk: &FilingChunk) -> Result<(), IndexError> {
        let _: Option<FilingChunk> = self.db.create("chunk").content(chunk.clone()).await?;
        Ok(())
    }

    /// Count stored chunks.
    pub async fn count_chunks(&self) -> Result<usize, IndexError> {
        #[derive(serde::Deserialize)]
        struct CountResult {
            count: i64,
        }

        let result: Option<CountResult> = self
            .db
            .query("SELECT count() FROM chunk GROUP ALL")
            .await?
            .take(0)?;

        Ok(result.map(|r| r.count as usize).unwrap_or(0))
    }

    /// Search for chunks by embedding similarity.
    pub async fn search_by_embedding(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        // K must be a literal in HNSW query, format it directly
        let query = format!(
            r#"
            SELECT
                content,
                ordinal,
                vector::similarity::cosine(embedding, $embedding) as score
            FROM chunk
            WHERE embedding <|{},COSINE|> $embedding
            ORDER BY score DESC
            "#,
            limit
        );

        let results: Vec<RetrievedChunk> = self
            .db
            .query(&query)
            .bind(("embedding", embedding.to_vec()))
            .await?
            .take(0)?;

        Ok(results)
    }
}
