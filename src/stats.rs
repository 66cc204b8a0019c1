//! Project Statistics (§6): node/edge counts by kind plus search index size, computed
//! from the graph store at query time rather than cached alongside it.
//!
//! Grounded on the teacher's `src/query/stats.rs` (`ProjectStats` aggregate struct
//! plus a `project_stats` function computed from the whole graph), generalised from
//! petgraph node/edge iteration to the store's own count queries.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use rusqlite::Connection;

use crate::cli::OutputFormat;
use crate::graph::store;

#[derive(Debug, Clone, Default)]
pub struct ProjectStats {
    pub file_count: usize,
    pub node_count: u64,
    pub edge_count: u64,
    pub nodes_by_kind: HashMap<&'static str, usize>,
    pub search_documents: usize,
}

pub fn compute(conn: &Connection, search_documents: usize) -> Result<ProjectStats> {
    let nodes = store::all_nodes(conn)?;
    let mut nodes_by_kind: HashMap<&'static str, usize> = HashMap::new();
    let mut files: HashSet<String> = HashSet::new();
    for node in &nodes {
        *nodes_by_kind.entry(node.kind.as_str()).or_insert(0) += 1;
        files.insert(node.file_path.clone());
    }
    Ok(ProjectStats {
        file_count: files.len(),
        node_count: store::node_count(conn)?,
        edge_count: store::edge_count(conn)?,
        nodes_by_kind,
        search_documents,
    })
}

pub fn print_stats(stats: &ProjectStats, format: &OutputFormat) {
    println!("{}", format_to_string(stats, format));
}

pub fn format_to_string(stats: &ProjectStats, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::json!({
            "file_count": stats.file_count,
            "node_count": stats.node_count,
            "edge_count": stats.edge_count,
            "nodes_by_kind": stats.nodes_by_kind,
            "search_documents": stats.search_documents,
        })
        .to_string(),
        OutputFormat::Table | OutputFormat::Compact => {
            let mut lines = vec![
                format!("files: {}", stats.file_count),
                format!("nodes: {}", stats.node_count),
                format!("edges: {}", stats.edge_count),
                format!("search documents: {}", stats.search_documents),
            ];
            let mut kinds: Vec<(&&str, &usize)> = stats.nodes_by_kind.iter().collect();
            kinds.sort_by_key(|(k, _)| **k);
            for (kind, count) in kinds {
                lines.push(format!("  {kind}: {count}"));
            }
            lines.join("\n")
        }
    }
}
