//! Sync Engine (§4.8): reconciles the manifest, the graph store, the embedding cache
//! and the search index against the current filesystem, on startup and on every
//! watcher event.
//!
//! Grounded on the teacher's `src/watcher/incremental.rs`
//! (`handle_file_event`/`handle_modified`/`handle_deleted`) for the per-file
//! add/stale/delete pipeline shape, generalised from the in-memory `CodeGraph` to the
//! store-backed two-phase (nodes, then edges) ingestion `crate::ingest` implements.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use rusqlite::Connection;

use crate::config::CodeGraphConfig;
use crate::embed::{EmbeddingCache, EmbeddingProvider, build_provider};
use crate::error::CoreError;
use crate::graph::store;
use crate::id::relative_to;
use crate::ingest::{FileExtraction, build_file_symbol_map, extract_file, resolve_file_edges};
use crate::registry::ProjectRegistry;
use crate::resolver::ExportIndex;
use crate::search::HybridIndex;
use crate::walker::walk_project;

/// Aggregated outcome of one sync pass (§4.8 "Sync result", §7 non-fatal per-file
/// errors). Never aborts the caller — every failure is accumulated here.
#[derive(Debug, Default)]
pub struct SyncResult {
    pub added: usize,
    pub stale: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub errors: Vec<CoreError>,
}

impl SyncResult {
    fn merge(&mut self, other: SyncResult) {
        self.added += other.added;
        self.stale += other.stale;
        self.unchanged += other.unchanged;
        self.deleted += other.deleted;
        self.errors.extend(other.errors);
    }
}

/// Owns every piece of process-wide state the spec's single-writer discipline (§5)
/// requires live behind one handle: the store connection, the embedding cache and
/// provider, and the ephemeral search index.
pub struct SyncEngine {
    pub workspace_root: PathBuf,
    pub cache_dir: PathBuf,
    pub config: CodeGraphConfig,
    pub registry: ProjectRegistry,
    pub conn: Connection,
    pub embedding_provider: Box<dyn EmbeddingProvider>,
    pub embedding_cache: EmbeddingCache,
    pub search_index: HybridIndex,
}

fn manifest_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("manifest.json")
}

fn db_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("sqlite/graph.db")
}

impl SyncEngine {
    pub fn open(workspace_root: PathBuf, config: CodeGraphConfig) -> Result<Self, CoreError> {
        let cache_dir = workspace_root.join(".code-graph");
        let conn = store::open(&db_path(&cache_dir)).map_err(|e| CoreError::Configuration(e.to_string()))?;

        let workspace_map = crate::resolver::discover_workspace_packages(&workspace_root);
        let registry = ProjectRegistry::build(&workspace_root, &config.package, &workspace_map);

        let embedding_config = config.embedding_config();
        let embedding_provider = build_provider(&embedding_config);
        let model_name = embedding_provider.model_name().to_owned();
        let embedding_cache = EmbeddingCache::open(&cache_dir.join("embeddings"), &model_name)
            .map_err(|e| CoreError::Configuration(e.to_string()))?;

        let search_index = HybridIndex::new(&embedding_config);

        Ok(Self { workspace_root, cache_dir, config, registry, conn, embedding_provider, embedding_cache, search_index })
    }

    /// §4.8 startup sync: walk the project, diff against the manifest, re-extract
    /// everything added/stale, drop everything deleted, then rebuild the ephemeral
    /// search index from the store (item 6 — unchanged files' documents are rebuilt,
    /// not skipped, since the index itself holds no state across restarts).
    pub fn full_sync(&mut self) -> Result<SyncResult> {
        let discovered = walk_project(&self.workspace_root, &self.config, false)
            .with_context(|| "walking project for full sync")?;
        let manifest_path = manifest_path(&self.cache_dir);
        let manifest = super::manifest::Manifest::load(&manifest_path);
        let diff = super::manifest::diff_manifest(&self.workspace_root, &manifest, &discovered)?;

        let mut result = SyncResult {
            unchanged: diff.unchanged.len(),
            deleted: diff.deleted.len(),
            ..Default::default()
        };

        for relative in &diff.deleted {
            store::delete_edges_from_file(&self.conn, relative).ok();
            store::delete_nodes_for_file(&self.conn, relative).ok();
            self.search_index.remove_by_file(relative);
        }

        let changed: Vec<PathBuf> = diff.added.iter().chain(diff.stale.iter()).cloned().collect();
        result.added = diff.added.len();
        result.stale = diff.stale.len();
        result.merge(self.reindex_files(&changed, &diff.unchanged)?);

        let mut new_manifest = super::manifest::Manifest::default();
        for path in discovered.iter() {
            let relative = relative_to(&self.workspace_root, path);
            if let Ok(meta) = super::manifest::file_meta(path) {
                new_manifest.files.insert(relative, meta);
            }
        }
        new_manifest.save(&manifest_path).with_context(|| "writing manifest")?;

        self.rebuild_search_index()?;

        Ok(result)
    }

    /// Incremental sync for a watcher-classified batch of changed/removed paths.
    /// Every existing path is treated as added-or-stale; every path that no longer
    /// exists on disk is treated as deleted.
    pub fn sync_paths(&mut self, paths: &[PathBuf]) -> Result<SyncResult> {
        let mut existing = Vec::new();
        let mut deleted = Vec::new();
        for path in paths {
            if path.exists() {
                existing.push(path.clone());
            } else {
                deleted.push(relative_to(&self.workspace_root, path));
            }
        }

        let mut result = SyncResult { deleted: deleted.len(), ..Default::default() };
        for relative in &deleted {
            store::delete_edges_from_file(&self.conn, relative).ok();
            store::delete_nodes_for_file(&self.conn, relative).ok();
            self.search_index.remove_by_file(relative);
        }

        result.stale = existing.len();
        result.merge(self.reindex_files(&existing, &[])?);

        let manifest_path = manifest_path(&self.cache_dir);
        let mut manifest = super::manifest::Manifest::load(&manifest_path);
        for relative in &deleted {
            manifest.files.remove(relative);
        }
        for path in &existing {
            let relative = relative_to(&self.workspace_root, path);
            if let Ok(meta) = super::manifest::file_meta(path) {
                manifest.files.insert(relative, meta);
            }
        }
        manifest.save(&manifest_path).ok();

        for path in &existing {
            self.reindex_single_search_document(path);
        }

        Ok(result)
    }

    /// Re-extract `changed` files (node pass, then a second edge pass once every
    /// changed file's nodes are upserted), while also recording `unchanged`'s
    /// import/export shape into the project-wide `ExportIndex` the edge pass and
    /// re-export chain walker depend on. Unchanged files keep their existing nodes
    /// and edges untouched — they're parsed here only for that export shape, not
    /// re-upserted into the store.
    fn reindex_files(&mut self, changed: &[PathBuf], unchanged: &[PathBuf]) -> Result<SyncResult> {
        let mut result = SyncResult::default();
        if changed.is_empty() {
            return Ok(result);
        }

        let mut export_index = ExportIndex::default();

        let changed_extractions: Vec<(PathBuf, std::result::Result<FileExtraction, CoreError>)> = changed
            .par_iter()
            .map(|path| (path.clone(), extract_file(&self.workspace_root, path, &self.package_name_for(path))))
            .collect();

        for (path, extraction) in &changed_extractions {
            match extraction {
                Ok(extraction) => {
                    store::delete_edges_from_file(&self.conn, &extraction.relative_path).ok();
                    store::delete_nodes_for_file(&self.conn, &extraction.relative_path).ok();
                    export_index.insert_file(
                        extraction.relative_path.clone(),
                        extraction.declared_top_level_names.clone(),
                        extraction.parse.imports.clone(),
                        extraction.parse.exports.clone(),
                    );
                }
                Err(err) => {
                    tracing::warn!("extraction error in {}: {err}", path.display());
                    result.errors.push(clone_core_error(err));
                }
            }
        }

        for path in unchanged {
            if let Ok(extraction) = extract_file(&self.workspace_root, path, &self.package_name_for(path)) {
                export_index.insert_file(
                    extraction.relative_path,
                    extraction.declared_top_level_names,
                    extraction.parse.imports,
                    extraction.parse.exports,
                );
            }
        }

        let hashes_needing_embedding: HashSet<String> = changed_extractions
            .iter()
            .filter_map(|(_, e)| e.as_ref().ok())
            .flat_map(|e| e.nodes.iter().map(|n| n.content_hash.clone()))
            .filter(|hash| !self.embedding_cache.contains(hash).unwrap_or(false))
            .collect();

        let embedded: Vec<(String, Vec<f32>)> = hashes_needing_embedding
            .par_iter()
            .filter_map(|hash| {
                changed_extractions
                    .iter()
                    .filter_map(|(_, e)| e.as_ref().ok())
                    .flat_map(|e| e.nodes.iter())
                    .find(|n| &n.content_hash == hash)
                    .and_then(|n| self.embedding_provider.embed_document(&n.snippet).ok().map(|v| (hash.clone(), v)))
            })
            .collect();
        for (hash, vector) in embedded {
            self.embedding_cache.put(&hash, &vector).ok();
        }

        for (path, extraction) in &changed_extractions {
            let Ok(extraction) = extraction else { continue };
            for node in &extraction.nodes {
                store::upsert_node(&self.conn, node).ok();
            }
            let symbol_map = build_file_symbol_map(&self.workspace_root, path, extraction, &self.registry);
            match resolve_file_edges(&self.conn, &self.workspace_root, extraction, &symbol_map, &export_index, &self.registry) {
                Ok(edges) => {
                    for edge in edges {
                        store::insert_edge(&self.conn, &edge).ok();
                    }
                }
                Err(err) => {
                    tracing::warn!("edge resolution error in {}: {err}", path.display());
                    result.errors.push(CoreError::Extraction { file: extraction.relative_path.clone(), message: err.to_string() });
                }
            }
        }

        Ok(result)
    }

    /// The configured package that owns `path`, via the same longest-prefix-match
    /// the registry uses for path-alias resolution (§3 Node "owning package";
    /// §4.1). Falls back to `"root"` for a path outside every configured package,
    /// matching `ProjectRegistry`'s implicit single-package fallback.
    fn package_name_for(&self, path: &Path) -> String {
        self.registry.project_for_file(path).map(|p| p.name.clone()).unwrap_or_else(|| "root".to_owned())
    }

    fn reindex_single_search_document(&mut self, path: &Path) {
        let relative = relative_to(&self.workspace_root, path);
        if let Ok(nodes) = store::nodes_by_file(&self.conn, &relative) {
            self.search_index.remove_by_file(&relative);
            for node in nodes {
                let text = format!("{} {}", HybridIndex::expand_identifier_tokens(&node.name), node.snippet);
                self.search_index.add(node.id, node.file_path, text, node.content_hash);
            }
        }
    }

    /// Rebuild the ephemeral search index wholesale from the store (§4.8 item 6).
    fn rebuild_search_index(&mut self) -> Result<()> {
        let nodes = store::all_nodes(&self.conn)?;
        self.search_index = HybridIndex::new(&self.config.embedding_config());
        for node in nodes {
            let text = format!("{} {}", HybridIndex::expand_identifier_tokens(&node.name), node.snippet);
            self.search_index.add(node.id, node.file_path, text, node.content_hash);
        }
        Ok(())
    }
}

fn clone_core_error(err: &CoreError) -> CoreError {
    match err {
        CoreError::Configuration(m) => CoreError::Configuration(m.clone()),
        CoreError::Extraction { file, message } => CoreError::Extraction { file: file.clone(), message: message.clone() },
        CoreError::Embedding { hash, message } => CoreError::Embedding { hash: hash.clone(), message: message.clone() },
        CoreError::Resolution(m) => CoreError::Resolution(m.clone()),
        CoreError::Disambiguation { symbol, candidates } => {
            CoreError::Disambiguation { symbol: symbol.clone(), candidates: candidates.clone() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_project(dir: &Path) {
        fs::write(dir.join("a.ts"), "export function add(a: number, b: number): number { return a + b; }").unwrap();
        fs::write(dir.join("b.ts"), "import { add } from './a';\nexport function sum() { return add(1, 2); }").unwrap();
    }

    #[test]
    fn full_sync_populates_store_and_search_index() {
        let dir = tempfile::tempdir().unwrap();
        sample_project(dir.path());
        let mut engine = SyncEngine::open(dir.path().to_path_buf(), CodeGraphConfig::default()).unwrap();
        let result = engine.full_sync().unwrap();
        assert_eq!(result.added, 2);
        assert_eq!(result.deleted, 0);
        assert!(store::node_count(&engine.conn).unwrap() >= 2);
        assert!(engine.search_index.count() >= 2);
    }

    #[test]
    fn second_full_sync_sees_everything_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        sample_project(dir.path());
        let mut engine = SyncEngine::open(dir.path().to_path_buf(), CodeGraphConfig::default()).unwrap();
        engine.full_sync().unwrap();
        let result = engine.full_sync().unwrap();
        assert_eq!(result.added, 0);
        assert_eq!(result.stale, 0);
        assert_eq!(result.unchanged, 2);
    }

    #[test]
    fn multi_package_nodes_carry_their_own_owning_package() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("packages/toolkit")).unwrap();
        fs::write(dir.path().join("a.ts"), "export function rootFn() {}").unwrap();
        fs::write(dir.path().join("packages/toolkit/lib.ts"), "export function toolkitFn() {}").unwrap();

        let config = CodeGraphConfig {
            package: vec![
                crate::config::PackageConfig { name: "root".into(), root: ".".into(), tsconfig: "tsconfig.json".into() },
                crate::config::PackageConfig {
                    name: "toolkit".into(),
                    root: "packages/toolkit".into(),
                    tsconfig: "tsconfig.json".into(),
                },
            ],
            ..Default::default()
        };
        let mut engine = SyncEngine::open(dir.path().to_path_buf(), config).unwrap();
        engine.full_sync().unwrap();

        let root_node = store::nodes_by_file(&engine.conn, "a.ts").unwrap().into_iter().next().unwrap();
        assert_eq!(root_node.package, "root");
        let toolkit_node =
            store::nodes_by_file(&engine.conn, "packages/toolkit/lib.ts").unwrap().into_iter().next().unwrap();
        assert_eq!(toolkit_node.package, "toolkit");
    }

    #[test]
    fn interface_extending_interface_emits_extends_edge() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "export interface Base { id: string; }\nexport interface Derived extends Base { name: string; }").unwrap();
        let mut engine = SyncEngine::open(dir.path().to_path_buf(), CodeGraphConfig::default()).unwrap();
        engine.full_sync().unwrap();

        let derived = store::nodes_by_name(&engine.conn, "Derived").unwrap().into_iter().next().unwrap();
        let edges = store::outgoing_edges(&engine.conn, &derived.id).unwrap();
        assert!(edges.iter().any(|e| e.kind == crate::graph::EdgeKind::Extends));
        assert!(!edges.iter().any(|e| e.kind == crate::graph::EdgeKind::DerivesFrom));
    }

    #[test]
    fn type_alias_union_emits_derives_from_edges() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.ts"),
            "export interface Foo { a: string; }\nexport interface Bar { b: string; }\nexport type Combo = Foo | Bar;",
        )
        .unwrap();
        let mut engine = SyncEngine::open(dir.path().to_path_buf(), CodeGraphConfig::default()).unwrap();
        engine.full_sync().unwrap();

        let combo = store::nodes_by_name(&engine.conn, "Combo").unwrap().into_iter().next().unwrap();
        let edges = store::outgoing_edges(&engine.conn, &combo.id).unwrap();
        let targets: Vec<_> = edges.iter().filter(|e| e.kind == crate::graph::EdgeKind::DerivesFrom).map(|e| e.target.clone()).collect();
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn type_alias_direct_emits_alias_for_edge() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "export interface Foo { a: string; }\nexport type FooAlias = Foo;").unwrap();
        let mut engine = SyncEngine::open(dir.path().to_path_buf(), CodeGraphConfig::default()).unwrap();
        engine.full_sync().unwrap();

        let alias = store::nodes_by_name(&engine.conn, "FooAlias").unwrap().into_iter().next().unwrap();
        let edges = store::outgoing_edges(&engine.conn, &alias.id).unwrap();
        assert!(edges.iter().any(|e| e.kind == crate::graph::EdgeKind::AliasFor));
    }

    #[test]
    fn deleting_a_file_removes_its_nodes() {
        let dir = tempfile::tempdir().unwrap();
        sample_project(dir.path());
        let mut engine = SyncEngine::open(dir.path().to_path_buf(), CodeGraphConfig::default()).unwrap();
        engine.full_sync().unwrap();
        fs::remove_file(dir.path().join("b.ts")).unwrap();
        let result = engine.full_sync().unwrap();
        assert_eq!(result.deleted, 1);
        assert!(store::nodes_by_file(&engine.conn, "b.ts").unwrap().is_empty());
    }
}
