//! Project configuration (§6 "Compiler configuration"): `code-graph.toml` at the
//! project root names one or more packages, each pointing at a compiler config
//! (`tsconfig.json`), plus optional `[watch]` and `[embedding]` blocks.
//!
//! Grounded on the teacher's `src/config.rs` load-with-fallback-to-default pattern:
//! a missing or malformed file is never fatal — only used directly as a `CoreError`
//! when something that *requires* a package definition later fails to find one.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// One configured package: a root directory plus the compiler config that governs it.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageConfig {
    pub name: String,
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_tsconfig")]
    pub tsconfig: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_tsconfig() -> PathBuf {
    PathBuf::from("tsconfig.json")
}

/// Filesystem watcher tuning (§4.8).
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_debounce")]
    pub debounce: u64,
    #[serde(default)]
    pub use_polling: bool,
    #[serde(default = "default_polling_interval")]
    pub polling_interval: u64,
    #[serde(default)]
    pub silent: bool,
}

fn default_debounce() -> u64 {
    300
}

fn default_polling_interval() -> u64 {
    1000
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
            use_polling: false,
            polling_interval: default_polling_interval(),
            silent: false,
        }
    }
}

/// Embedding provider selection and prompt framing (§4.6, §6).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EmbeddingConfig {
    pub preset: Option<String>,
    pub repo: Option<String>,
    pub filename: Option<String>,
    pub query_prefix: Option<String>,
    pub document_prefix: Option<String>,
    /// Hybrid merge weight on the normalised BM25 score (§4.7, §9 open question resolved).
    #[serde(default = "default_bm25_weight")]
    pub bm25_weight: f32,
    /// Hybrid merge weight on cosine similarity.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    /// Minimum cosine similarity for a document to be admitted by vector search.
    #[serde(default = "default_vector_floor")]
    pub vector_floor: f32,
}

fn default_bm25_weight() -> f32 {
    0.5
}

fn default_vector_weight() -> f32 {
    0.5
}

fn default_vector_floor() -> f32 {
    0.6
}

/// Top-level `code-graph.toml` contents.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CodeGraphConfig {
    #[serde(default)]
    pub package: Vec<PackageConfig>,
    pub port: Option<u16>,
    #[serde(default)]
    pub watch: Option<WatchConfig>,
    #[serde(default)]
    pub embedding: Option<EmbeddingConfig>,
    /// Additional path patterns to exclude from indexing (beyond .gitignore and
    /// node_modules) — inherited from the teacher's original single-field config.
    pub exclude: Option<Vec<String>>,
}

impl CodeGraphConfig {
    /// Load configuration from `code-graph.toml` in the given root directory.
    ///
    /// Returns a default (empty) configuration if the file does not exist or cannot
    /// be parsed — a malformed config is reported but never aborts the process by
    /// itself; only a later step that genuinely needs a package definition raises
    /// `CoreError::Configuration`.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join("code-graph.toml");

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!("failed to parse code-graph.toml: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!("failed to read code-graph.toml: {err}. Using defaults.");
                Self::default()
            }
        }
    }

    pub fn watch_config(&self) -> WatchConfig {
        self.watch.clone().unwrap_or_default()
    }

    pub fn embedding_config(&self) -> EmbeddingConfig {
        self.embedding.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = CodeGraphConfig::load(dir.path());
        assert!(config.package.is_empty());
        assert_eq!(config.watch_config().debounce, 300);
    }

    #[test]
    fn load_malformed_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("code-graph.toml"), "not valid toml [[[").unwrap();
        let config = CodeGraphConfig::load(dir.path());
        assert!(config.package.is_empty());
    }

    #[test]
    fn load_well_formed_file_overrides_watch_debounce() {
        let dir = tempfile::tempdir().unwrap();
        let toml = r#"
[[package]]
name = "app"
root = "."
tsconfig = "tsconfig.json"

[watch]
debounce = 500
"#;
        fs::write(dir.path().join("code-graph.toml"), toml).unwrap();
        let config = CodeGraphConfig::load(dir.path());
        assert_eq!(config.package.len(), 1);
        assert_eq!(config.watch_config().debounce, 500);
    }

    #[test]
    fn embedding_defaults_match_spec_constants() {
        let config = CodeGraphConfig::default();
        let embedding = config.embedding_config();
        assert_eq!(embedding.bm25_weight, 0.5);
        assert_eq!(embedding.vector_weight, 0.5);
        assert_eq!(embedding.vector_floor, 0.6);
    }
}
