//! Error taxonomy (§7). Internal failures are values, not exceptions — `CoreError`
//! models the five non-fatal-vs-fatal categories the spec distinguishes so callers can
//! match on them instead of inspecting message strings. The CLI and MCP surface wrap
//! these in `anyhow` at their own boundary for display.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing/invalid project config or compiler config. Fatal — the process exits.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Parser/AST failure on a single file. Non-fatal — the file is skipped.
    #[error("extraction error in {file}: {message}")]
    Extraction { file: String, message: String },

    /// Embedding provider failure on a content hash. Non-fatal — the node stays
    /// searchable via BM25 and cosine backfill retries on the next query hit.
    #[error("embedding error for hash {hash}: {message}")]
    Embedding { hash: String, message: String },

    /// Symbol not found while resolving a query endpoint.
    #[error("no such symbol: {0}")]
    Resolution(String),

    /// Multiple candidates matched an ambiguous symbol lookup.
    #[error("ambiguous symbol '{symbol}': {candidates:?}")]
    Disambiguation { symbol: String, candidates: Vec<String> },
}

impl CoreError {
    /// Configuration errors are the only fatal category (§7).
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Configuration(_))
    }
}
