//! Embedding provider and content-hash-keyed cache (§4.6).
//!
//! Grounded on the teacher's optional-feature pattern for heavyweight native
//! dependencies (`fastembed` gated behind the `embed` cargo feature, same as
//! upstream code-graph-ai does for its vector backend) and on suatkocar's
//! `src/cache/envelope.rs` content-hash cache-key shape, adapted to a
//! dedicated per-model sqlite file instead of a JSON envelope.

use std::path::Path;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::config::EmbeddingConfig;
use crate::error::CoreError;

/// A provider turns document/query text into a fixed-size embedding vector.
/// The no-op stub satisfies this trait without the `embed` feature so the
/// rest of the pipeline (cache, hybrid search) never special-cases absence
/// of a real model — BM25-only scoring degrades gracefully instead (§7).
pub trait EmbeddingProvider: Send + Sync {
    fn embed_document(&self, text: &str) -> Result<Vec<f32>, CoreError>;
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, CoreError>;
    fn dimensions(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Always fails with a non-fatal `CoreError::Embedding` — used when the `embed`
/// feature isn't compiled in, or no preset is configured. Nodes stay
/// BM25-searchable; vector backfill simply never succeeds for them.
pub struct NoopProvider;

impl EmbeddingProvider for NoopProvider {
    fn embed_document(&self, _text: &str) -> Result<Vec<f32>, CoreError> {
        Err(CoreError::Embedding { hash: String::new(), message: "no embedding provider configured".into() })
    }
    fn embed_query(&self, _text: &str) -> Result<Vec<f32>, CoreError> {
        Err(CoreError::Embedding { hash: String::new(), message: "no embedding provider configured".into() })
    }
    fn dimensions(&self) -> usize {
        0
    }
    fn model_name(&self) -> &str {
        "noop"
    }
}

#[cfg(feature = "embed")]
pub struct FastEmbedProvider {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    name: String,
    dims: usize,
    query_prefix: String,
    document_prefix: String,
}

#[cfg(feature = "embed")]
impl FastEmbedProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, CoreError> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model_name = config.preset.clone().unwrap_or_else(|| "BGESmallENV15".to_string());
        let model_enum = match model_name.as_str() {
            "BGESmallENV15" => EmbeddingModel::BGESmallENV15,
            "AllMiniLML6V2" => EmbeddingModel::AllMiniLML6V2,
            other => return Err(CoreError::Configuration(format!("unknown embedding preset: {other}"))),
        };
        let model = TextEmbedding::try_new(InitOptions::new(model_enum))
            .map_err(|e| CoreError::Configuration(format!("failed to initialise embedding model: {e}")))?;
        Ok(Self {
            model: std::sync::Mutex::new(model),
            name: model_name,
            dims: 384,
            query_prefix: config.query_prefix.clone().unwrap_or_default(),
            document_prefix: config.document_prefix.clone().unwrap_or_default(),
        })
    }
}

#[cfg(feature = "embed")]
impl EmbeddingProvider for FastEmbedProvider {
    fn embed_document(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        let prompt = format!("{}{}", self.document_prefix, text);
        let mut model = self.model.lock().expect("embedding model mutex poisoned");
        model
            .embed(vec![prompt], None)
            .map_err(|e| CoreError::Embedding { hash: String::new(), message: e.to_string() })?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Embedding { hash: String::new(), message: "empty embedding batch".into() })
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>, CoreError> {
        let prompt = format!("{}{}", self.query_prefix, text);
        let mut model = self.model.lock().expect("embedding model mutex poisoned");
        model
            .embed(vec![prompt], None)
            .map_err(|e| CoreError::Embedding { hash: String::new(), message: e.to_string() })?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Embedding { hash: String::new(), message: "empty embedding batch".into() })
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// Build the configured provider, falling back to the no-op stub when the
/// `embed` feature isn't compiled in or no preset was configured.
pub fn build_provider(_config: &EmbeddingConfig) -> Box<dyn EmbeddingProvider> {
    #[cfg(feature = "embed")]
    {
        if _config.preset.is_some() {
            match FastEmbedProvider::new(_config) {
                Ok(provider) => return Box::new(provider),
                Err(err) => tracing::warn!("falling back to no-op embedding provider: {err}"),
            }
        }
    }
    Box::new(NoopProvider)
}

/// Content-hash-keyed embedding cache, one sqlite file per model name
/// (`embeddings/<model-name>.db`) so switching models never serves stale vectors.
pub struct EmbeddingCache {
    conn: Connection,
}

const CREATE_CACHE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS embeddings (
  content_hash TEXT PRIMARY KEY,
  vector BLOB NOT NULL
)";

impl EmbeddingCache {
    pub fn open(cache_dir: &Path, model_name: &str) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)?;
        let path = cache_dir.join(format!("{model_name}.db"));
        let conn = Connection::open(path)?;
        conn.execute(CREATE_CACHE_TABLE, [])?;
        Ok(Self { conn })
    }

    pub fn get(&self, content_hash: &str) -> Result<Option<Vec<f32>>> {
        let bytes: Option<Vec<u8>> = self
            .conn
            .query_row("SELECT vector FROM embeddings WHERE content_hash = ?1", params![content_hash], |row| row.get(0))
            .optional()?;
        Ok(bytes.map(|b| decode_vector(&b)))
    }

    pub fn put(&self, content_hash: &str, vector: &[f32]) -> Result<()> {
        self.conn.execute(
            "INSERT INTO embeddings (content_hash, vector) VALUES (?1, ?2)
             ON CONFLICT(content_hash) DO UPDATE SET vector = excluded.vector",
            params![content_hash, encode_vector(vector)],
        )?;
        Ok(())
    }

    pub fn contains(&self, content_hash: &str) -> Result<bool> {
        Ok(self.get(content_hash)?.is_some())
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_provider_errors_without_crashing() {
        let provider = NoopProvider;
        assert!(provider.embed_document("hello").is_err());
        assert_eq!(provider.dimensions(), 0);
    }

    #[test]
    fn cache_roundtrips_a_vector() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path(), "test-model").unwrap();
        let vector = vec![0.1_f32, 0.2, 0.3];
        cache.put("abc123", &vector).unwrap();
        let fetched = cache.get("abc123").unwrap().unwrap();
        assert_eq!(fetched, vector);
    }

    #[test]
    fn cache_miss_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path(), "test-model").unwrap();
        assert!(cache.get("missing").unwrap().is_none());
        assert!(!cache.contains("missing").unwrap());
    }

    #[test]
    fn cache_put_overwrites_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path(), "test-model").unwrap();
        cache.put("k", &[1.0, 2.0]).unwrap();
        cache.put("k", &[3.0, 4.0]).unwrap();
        assert_eq!(cache.get("k").unwrap().unwrap(), vec![3.0, 4.0]);
    }
}
