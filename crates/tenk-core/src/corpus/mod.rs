//! Filing corpus loading.
//!
//! Each fiscal year's 10-K is a single HTML document on disk at a path
//! derived from the company ticker and the year. Loading reads the file,
//! extracts readable text, and attaches the year as metadata. Filings are
//! immutable once loaded.

use std::collections::BTreeMap;
use std::path::PathBuf;

use dom_smoothie::{Article, Readability, TextMode};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::CorpusConfig;

/// Errors that can occur while loading filings.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Filing not found: {}", path.display())]
    MissingFiling { path: PathBuf },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to extract filing text: {0}")]
    Extract(String),
}

/// The extracted text of one fiscal year's annual report.
#[derive(Debug, Clone)]
pub struct Filing {
    /// Company ticker.
    pub company: String,
    /// Fiscal year the report covers. The only metadata key a filing carries.
    pub year: u16,
    /// Readable text extracted from the HTML document.
    pub text: String,
    /// Path the filing was loaded from.
    pub source_path: PathBuf,
    /// SHA-256 of the raw document, recorded in the index manifest at build
    /// time. Nothing validates it on load; a stale persisted index is
    /// silently trusted.
    pub source_hash: String,
}

/// Loads filings from the configured data directory.
pub struct FilingLoader {
    config: CorpusConfig,
}

impl FilingLoader {
    pub fn new(config: CorpusConfig) -> Self {
        Self { config }
    }

    /// Load the filing for one fiscal year.
    pub fn load_year(&self, year: u16) -> Result<Filing, CorpusError> {
        let path = self.config.filing_path(year);

        if !path.exists() {
            return Err(CorpusError::MissingFiling { path });
        }

        let raw = std::fs::read_to_string(&path).map_err(|e| CorpusError::Io {
            path: path.clone(),
            source: e,
        })?;

        let text = extract_text(&raw)?;
        let hash = compute_hash(&raw);

        Ok(Filing {
            company: self.config.company.clone(),
            year,
            text,
            source_path: path,
            source_hash: hash,
        })
    }

    /// Load filings for every configured year, keyed by year.
    pub fn load_all(&self) -> Result<BTreeMap<u16, Filing>, CorpusError> {
        let mut filings = BTreeMap::new();
        for &year in &self.config.years {
            filings.insert(year, self.load_year(year)?);
        }
        Ok(filings)
    }
}

/// Extract readable text from a raw HTML filing.
fn extract_text(html: &str) -> Result<String, CorpusError> {
    let config = dom_smoothie::Config {
        text_mode: TextMode::Markdown,
        ..Default::default()
    };

    let mut readability = Readability::new(html, None, Some(config))
        .map_err(|e| CorpusError::Extract(e.to_string()))?;
    let article: Article = readability
        .parse()
        .map_err(|e| CorpusError::Extract(e.to_string()))?;

    Ok(article.text_content.to_string())
}

/// SHA-256 of the raw document.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
