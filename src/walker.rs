//! File discovery: gitignore-aware directory walk, `node_modules` always excluded,
//! plus any additional `config.exclude` patterns. Grounded on the teacher's
//! `src/walker.rs`, trimmed of Rust-workspace detection (no longer relevant once the
//! walker only looks for TS/JS source).

use std::path::{Path, PathBuf};

use crate::config::CodeGraphConfig;
use crate::language::SOURCE_EXTENSIONS;

/// Walk a project directory and collect TypeScript/JavaScript source files.
///
/// Respects `.gitignore` rules, always excludes `node_modules`, and applies any
/// additional exclusions from `config.exclude`. When `verbose` is true, each
/// discovered file path is printed to stderr.
pub fn walk_project(root: &Path, config: &CodeGraphConfig, verbose: bool) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(root, config, verbose, &mut files);
    Ok(files)
}

fn collect_files(root: &Path, config: &CodeGraphConfig, verbose: bool, out: &mut Vec<PathBuf>) {
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        .require_git(false)
        .build();

    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!("walk error: {err}");
                continue;
            }
        };

        let path = entry.path();

        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }

        if path_contains_node_modules(path) {
            continue;
        }

        if is_excluded_by_config(path, config) {
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !SOURCE_EXTENSIONS.contains(&ext) {
            continue;
        }

        if verbose {
            eprintln!("{}", path.display());
        }

        out.push(path.to_path_buf());
    }
}

fn path_contains_node_modules(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str().to_str().map(|s| s == "node_modules").unwrap_or(false))
}

fn is_excluded_by_config(path: &Path, config: &CodeGraphConfig) -> bool {
    let patterns = match &config.exclude {
        Some(p) => p,
        None => return false,
    };

    let path_str = path.to_string_lossy();

    for pattern in patterns {
        if let Ok(matched) = glob::Pattern::new(pattern)
            && matched.matches(&path_str)
        {
            return true;
        }
        for component in path.components() {
            if let Some(s) = component.as_os_str().to_str()
                && let Ok(matched) = glob::Pattern::new(pattern)
                && matched.matches(s)
            {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walk_excludes_node_modules_and_respects_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.ts"), "export {}").unwrap();
        fs::write(dir.path().join("a.ts"), "export const a = 1;").unwrap();
        fs::write(dir.path().join("readme.md"), "hi").unwrap();

        let config = CodeGraphConfig::default();
        let files = walk_project(dir.path(), &config, false).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.ts"));
    }

    #[test]
    fn walk_applies_config_exclude_patterns() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("generated")).unwrap();
        fs::write(dir.path().join("generated/schema.ts"), "export {}").unwrap();
        fs::write(dir.path().join("a.ts"), "export const a = 1;").unwrap();

        let config = CodeGraphConfig {
            exclude: Some(vec!["generated".to_string()]),
            ..Default::default()
        };
        let files = walk_project(dir.path(), &config, false).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.ts"));
    }
}
