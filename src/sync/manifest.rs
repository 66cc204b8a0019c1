//! Manifest (§4.8, §6): the persisted `relative-path -> {mtime, size}` fingerprint
//! used to classify every discovered file as added/stale/unchanged/deleted.
//!
//! Grounded on the teacher's `src/cache/envelope.rs` (`CacheEnvelope`/`FileMeta`
//! versioned-cache pattern), generalised from a whole-graph bincode blob down to just
//! the fingerprint map since nodes/edges now live in the sqlite store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::id::relative_to;

const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub mtime: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub files: HashMap<String, FileMeta>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self { version: MANIFEST_VERSION, files: HashMap::new() }
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Self {
        let Ok(contents) = std::fs::read_to_string(path) else { return Self::default() };
        serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!("failed to parse manifest at {}: {err}. Starting fresh.", path.display());
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).with_context(|| format!("writing manifest to {}", path.display()))
    }
}

/// How a discovered/tracked file compares to the manifest (§4.8 step 1-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Stale,
    Unchanged,
}

/// Classify every file the filesystem walk discovered against the manifest, and
/// separately report manifest entries whose file no longer exists.
pub struct ManifestDiff {
    pub added: Vec<PathBuf>,
    pub stale: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub deleted: Vec<String>,
}

pub fn diff_manifest(workspace_root: &Path, manifest: &Manifest, discovered: &[PathBuf]) -> Result<ManifestDiff> {
    let mut added = Vec::new();
    let mut stale = Vec::new();
    let mut unchanged = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for path in discovered {
        let relative = relative_to(workspace_root, path);
        seen.insert(relative.clone());
        let meta = std::fs::metadata(path).with_context(|| format!("reading metadata for {}", path.display()))?;
        let current = FileMeta {
            mtime: meta.modified().ok().and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok()).map(|d| d.as_secs()).unwrap_or(0),
            size: meta.len(),
        };
        match manifest.files.get(&relative) {
            None => added.push(path.clone()),
            Some(prior) if *prior != current => stale.push(path.clone()),
            Some(_) => unchanged.push(path.clone()),
        }
    }

    let deleted = manifest.files.keys().filter(|path| !seen.contains(*path)).cloned().collect();

    Ok(ManifestDiff { added, stale, unchanged, deleted })
}

pub fn file_meta(path: &Path) -> Result<FileMeta> {
    let meta = std::fs::metadata(path).with_context(|| format!("reading metadata for {}", path.display()))?;
    Ok(FileMeta {
        mtime: meta.modified().ok().and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok()).map(|d| d.as_secs()).unwrap_or(0),
        size: meta.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn diff_classifies_added_stale_unchanged_deleted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "export const a = 1;").unwrap();
        fs::write(dir.path().join("b.ts"), "export const b = 1;").unwrap();

        let mut manifest = Manifest::default();
        manifest.files.insert("b.ts".into(), FileMeta { mtime: 0, size: 0 });
        manifest.files.insert("gone.ts".into(), FileMeta { mtime: 0, size: 5 });

        let discovered = vec![dir.path().join("a.ts"), dir.path().join("b.ts")];
        let diff = diff_manifest(dir.path(), &manifest, &discovered).unwrap();

        assert_eq!(diff.added.len(), 1);
        assert!(diff.added[0].ends_with("a.ts"));
        assert_eq!(diff.stale.len(), 1);
        assert!(diff.stale[0].ends_with("b.ts"));
        assert_eq!(diff.deleted, vec!["gone.ts".to_string()]);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let mut manifest = Manifest::default();
        manifest.files.insert("a.ts".into(), FileMeta { mtime: 10, size: 20 });
        manifest.save(&path).unwrap();

        let loaded = Manifest::load(&path);
        assert_eq!(loaded.files.get("a.ts"), Some(&FileMeta { mtime: 10, size: 20 }));
    }

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::load(&dir.path().join("nope.json"));
        assert!(manifest.files.is_empty());
    }
}
