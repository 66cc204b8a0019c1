//! Project Registry (§4.1): owns a parsed-project instance per configured package and
//! answers "which project owns this absolute path?" via longest-prefix match.
//!
//! Grounded on the teacher's `src/resolver/file_resolver.rs::build_resolver` (resolver
//! construction from a tsconfig) generalised from a single project to a registry of
//! packages sorted by root-path specificity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use oxc_resolver::Resolver;

use crate::config::PackageConfig;
use crate::resolver::file_resolver::build_resolver;

/// A single configured package: its root, its resolver (built from its tsconfig's
/// path-alias table), and the absolute tsconfig path that governs it.
pub struct Project {
    pub name: String,
    pub root: PathBuf,
    pub tsconfig_path: PathBuf,
    resolver: Resolver,
}

impl Project {
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}

/// Read-mostly collection of `Project`s, sorted by root length descending so the most
/// specific (deepest) package wins a `project_for_file` lookup.
pub struct ProjectRegistry {
    projects: Vec<Project>,
}

impl ProjectRegistry {
    /// Build a registry from a list of package configs, each resolved relative to
    /// `workspace_root`. A package whose tsconfig cannot be found still gets an entry
    /// with an unconfigured resolver — path-alias resolution simply finds nothing for
    /// it, matching the spec's "packages whose source entry cannot be located are
    /// simply omitted" failure mode for the narrower alias case.
    pub fn build(
        workspace_root: &Path,
        packages: &[PackageConfig],
        workspace_map: &HashMap<String, PathBuf>,
    ) -> Self {
        let aliases = crate::resolver::file_resolver::workspace_map_to_aliases(workspace_map);

        let mut projects: Vec<Project> = packages
            .iter()
            .map(|pkg| {
                let root = workspace_root.join(&pkg.root);
                let tsconfig_path = root.join(&pkg.tsconfig);
                let resolver = build_resolver(&root, aliases.clone());
                Project { name: pkg.name.clone(), root, tsconfig_path, resolver }
            })
            .collect();

        // Fallback: if no packages were configured, register the workspace root itself
        // as a single implicit package so single-package repos (no code-graph.toml)
        // still resolve imports.
        if projects.is_empty() {
            projects.push(Project {
                name: "root".to_string(),
                root: workspace_root.to_path_buf(),
                tsconfig_path: workspace_root.join("tsconfig.json"),
                resolver: build_resolver(workspace_root, aliases),
            });
        }

        projects.sort_by_key(|p| std::cmp::Reverse(p.root.as_os_str().len()));
        Self { projects }
    }

    /// Return the project whose root is the longest prefix of `absolute_path`.
    pub fn project_for_file(&self, absolute_path: &Path) -> Option<&Project> {
        self.projects.iter().find(|p| absolute_path.starts_with(&p.root))
    }

    /// Return the project whose tsconfig is exactly `absolute_path`.
    pub fn project_for_tsconfig(&self, absolute_path: &Path) -> Option<&Project> {
        self.projects.iter().find(|p| p.tsconfig_path == absolute_path)
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }
}
