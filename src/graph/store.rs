//! Graph Store (§4, §6): an embedded relational store holding `nodes` and `edges`,
//! with no foreign keys — edges may dangle, and queries join on id to hide them.
//!
//! Schema grounded on suatkocar-codegraph's `db/schema.rs`, trimmed to the two tables
//! the spec actually names (no FTS/vec virtual tables here — those concerns live in
//! `crate::search`, which rebuilds its index from this store at startup per §4.8 item 6).

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use super::edge::{CallSite, Edge, EdgeKind, ReferenceContext};
use super::node::{Node, NodeKind, NodeMetadata};

const CREATE_NODES: &str = "\
CREATE TABLE IF NOT EXISTS nodes (
  id TEXT PRIMARY KEY,
  type TEXT NOT NULL,
  name TEXT NOT NULL,
  package TEXT NOT NULL,
  file_path TEXT NOT NULL,
  start_line INTEGER NOT NULL,
  end_line INTEGER NOT NULL,
  exported INTEGER NOT NULL,
  content_hash TEXT NOT NULL,
  snippet TEXT NOT NULL,
  metadata TEXT NOT NULL
)";

const CREATE_EDGES: &str = "\
CREATE TABLE IF NOT EXISTS edges (
  source TEXT NOT NULL,
  target TEXT NOT NULL,
  type TEXT NOT NULL,
  call_sites TEXT NOT NULL,
  call_count INTEGER NOT NULL,
  context TEXT
)";

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_nodes_file ON nodes(file_path)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name)",
    "CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source)",
    "CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target)",
    "CREATE INDEX IF NOT EXISTS idx_edges_type ON edges(type)",
];

/// Current schema generation, recorded via `PRAGMA user_version` so a future migration
/// can detect and upgrade an older store (§9 "schema-version column").
const SCHEMA_VERSION: i64 = 1;

/// Open (or create) the graph store at `sqlite/graph.db` under the cache directory.
pub fn open(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating cache directory {}", parent.display()))?;
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("opening graph store at {}", db_path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Import/type-reference edges routinely target ids that have no corresponding row
    // (third-party or out-of-project declarations) — this is the spec's own dangling-edge
    // invariant, not an oversight, so foreign keys stay off.
    conn.pragma_update(None, "foreign_keys", "OFF")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    conn.execute_batch(CREATE_NODES)?;
    conn.execute_batch(CREATE_EDGES)?;
    for ddl in CREATE_INDEXES {
        conn.execute_batch(ddl)?;
    }
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    Ok(conn)
}

/// Insert or replace a single node. Replacement preserves the node's identity (its id)
/// across re-extraction per §3's lifecycle rule.
pub fn upsert_node(conn: &Connection, node: &Node) -> Result<()> {
    let metadata_json = serde_json::to_string(&node.metadata)?;
    conn.execute(
        "INSERT INTO nodes (id, type, name, package, file_path, start_line, end_line, exported, content_hash, snippet, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
           type = excluded.type, name = excluded.name, package = excluded.package,
           file_path = excluded.file_path, start_line = excluded.start_line,
           end_line = excluded.end_line, exported = excluded.exported,
           content_hash = excluded.content_hash, snippet = excluded.snippet,
           metadata = excluded.metadata",
        params![
            node.id,
            node.kind.as_str(),
            node.name,
            node.package,
            node.file_path,
            node.start_line,
            node.end_line,
            node.exported as i64,
            node.content_hash,
            node.snippet,
            metadata_json,
        ],
    )?;
    Ok(())
}

pub fn insert_edge(conn: &Connection, edge: &Edge) -> Result<()> {
    let call_sites_json = serde_json::to_string(&edge.call_sites)?;
    conn.execute(
        "INSERT INTO edges (source, target, type, call_sites, call_count, context)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            edge.source,
            edge.target,
            edge.kind.as_str(),
            call_sites_json,
            edge.call_count,
            edge.context.map(|c| c.as_str()),
        ],
    )?;
    Ok(())
}

/// Delete every node belonging to `file_path` (used when a file is re-extracted or
/// removed — §4.8 steps 3 and 4).
pub fn delete_nodes_for_file(conn: &Connection, file_path: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM nodes WHERE file_path = ?1", params![file_path])?)
}

/// Delete every edge whose source node belongs to `file_path`.
pub fn delete_edges_from_file(conn: &Connection, file_path: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM edges WHERE source IN (SELECT id FROM nodes WHERE file_path = ?1)
         OR source LIKE ?2",
        params![file_path, format!("{file_path}:%")],
    )?)
}

pub fn node_by_id(conn: &Connection, id: &str) -> Result<Option<Node>> {
    let mut stmt = conn.prepare(
        "SELECT id, type, name, package, file_path, start_line, end_line, exported, content_hash, snippet, metadata
         FROM nodes WHERE id = ?1",
    )?;
    let node = stmt
        .query_row(params![id], row_to_node)
        .optional()
        .context("querying node by id")?;
    Ok(node)
}

pub fn nodes_by_name(conn: &Connection, name: &str) -> Result<Vec<Node>> {
    let mut stmt = conn.prepare(
        "SELECT id, type, name, package, file_path, start_line, end_line, exported, content_hash, snippet, metadata
         FROM nodes WHERE name = ?1",
    )?;
    let rows = stmt.query_map(params![name], row_to_node)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

pub fn nodes_by_file(conn: &Connection, file_path: &str) -> Result<Vec<Node>> {
    let mut stmt = conn.prepare(
        "SELECT id, type, name, package, file_path, start_line, end_line, exported, content_hash, snippet, metadata
         FROM nodes WHERE file_path = ?1",
    )?;
    let rows = stmt.query_map(params![file_path], row_to_node)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// All nodes in the store. Used to rebuild the ephemeral search index at startup.
pub fn all_nodes(conn: &Connection) -> Result<Vec<Node>> {
    let mut stmt = conn.prepare(
        "SELECT id, type, name, package, file_path, start_line, end_line, exported, content_hash, snippet, metadata
         FROM nodes",
    )?;
    let rows = stmt.query_map(params![], row_to_node)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// All edges whose target actually exists (dangling edges hidden, §8). Used by
/// the whole-graph export path, which has no single seed to BFS from.
pub fn all_edges(conn: &Connection) -> Result<Vec<Edge>> {
    let mut stmt = conn.prepare(
        "SELECT e.source, e.target, e.type, e.call_sites, e.call_count, e.context
         FROM edges e JOIN nodes n ON e.target = n.id",
    )?;
    let rows = stmt.query_map(params![], row_to_edge)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

pub fn node_count(conn: &Connection) -> Result<u64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM nodes", params![], |row| row.get(0))?)
}

pub fn edge_count(conn: &Connection) -> Result<u64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM edges", params![], |row| row.get(0))?)
}

/// Outgoing edges from `id` whose target actually exists (dangling edges hidden, §8).
pub fn outgoing_edges(conn: &Connection, id: &str) -> Result<Vec<Edge>> {
    let mut stmt = conn.prepare(
        "SELECT e.source, e.target, e.type, e.call_sites, e.call_count, e.context
         FROM edges e JOIN nodes n ON e.target = n.id
         WHERE e.source = ?1",
    )?;
    let rows = stmt.query_map(params![id], row_to_edge)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// Incoming edges to `id` whose source actually exists.
pub fn incoming_edges(conn: &Connection, id: &str) -> Result<Vec<Edge>> {
    let mut stmt = conn.prepare(
        "SELECT e.source, e.target, e.type, e.call_sites, e.call_count, e.context
         FROM edges e JOIN nodes n ON e.source = n.id
         WHERE e.target = ?1",
    )?;
    let rows = stmt.query_map(params![id], row_to_edge)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<Node> {
    let kind_str: String = row.get(1)?;
    let metadata_json: String = row.get(10)?;
    let metadata: NodeMetadata = serde_json::from_str(&metadata_json).unwrap_or_default();
    Ok(Node {
        id: row.get(0)?,
        kind: NodeKind::from_str(&kind_str).unwrap_or(NodeKind::Variable),
        name: row.get(2)?,
        package: row.get(3)?,
        file_path: row.get(4)?,
        start_line: row.get(5)?,
        end_line: row.get(6)?,
        exported: row.get::<_, i64>(7)? != 0,
        content_hash: row.get(8)?,
        snippet: row.get(9)?,
        metadata,
    })
}

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<Edge> {
    let kind_str: String = row.get(2)?;
    let call_sites_json: String = row.get(3)?;
    let call_sites: Vec<CallSite> = serde_json::from_str(&call_sites_json).unwrap_or_default();
    let context_str: Option<String> = row.get(5)?;
    Ok(Edge {
        source: row.get(0)?,
        target: row.get(1)?,
        kind: EdgeKind::from_str(&kind_str).unwrap_or(EdgeKind::References),
        call_sites,
        call_count: row.get(4)?,
        context: context_str.and_then(|s| match s.as_str() {
            "callback" => Some(ReferenceContext::Callback),
            "property" => Some(ReferenceContext::Property),
            "array" => Some(ReferenceContext::Array),
            "return" => Some(ReferenceContext::Return),
            "assignment" => Some(ReferenceContext::Assignment),
            "access" => Some(ReferenceContext::Access),
            _ => None,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NodeMetadata;

    fn sample_node(id: &str, file: &str, name: &str) -> Node {
        Node {
            id: id.into(),
            kind: NodeKind::Function,
            name: name.into(),
            package: "root".into(),
            file_path: file.into(),
            start_line: 1,
            end_line: 2,
            exported: true,
            content_hash: "hash".into(),
            snippet: "fn".into(),
            metadata: NodeMetadata::default(),
        }
    }

    #[test]
    fn upsert_then_lookup_round_trips() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_NODES).unwrap();
        let node = sample_node("a.ts:Function:show", "a.ts", "show");
        upsert_node(&conn, &node).unwrap();
        let found = node_by_id(&conn, "a.ts:Function:show").unwrap().unwrap();
        assert_eq!(found.name, "show");
    }

    #[test]
    fn upsert_replaces_existing_node_by_id() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_NODES).unwrap();
        let mut node = sample_node("a.ts:Function:show", "a.ts", "show");
        upsert_node(&conn, &node).unwrap();
        node.end_line = 10;
        upsert_node(&conn, &node).unwrap();
        assert_eq!(node_count(&conn).unwrap(), 1);
        let found = node_by_id(&conn, "a.ts:Function:show").unwrap().unwrap();
        assert_eq!(found.end_line, 10);
    }

    #[test]
    fn dangling_edge_is_hidden_by_join() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_NODES).unwrap();
        conn.execute_batch(CREATE_EDGES).unwrap();
        let source = sample_node("a.ts:Function:show", "a.ts", "show");
        upsert_node(&conn, &source).unwrap();
        let edge = Edge::new("a.ts:Function:show", "missing.ts:Function:ghost", EdgeKind::Calls);
        insert_edge(&conn, &edge).unwrap();
        let edges = outgoing_edges(&conn, "a.ts:Function:show").unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn delete_nodes_for_file_removes_only_that_file() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_NODES).unwrap();
        upsert_node(&conn, &sample_node("a.ts:Function:show", "a.ts", "show")).unwrap();
        upsert_node(&conn, &sample_node("b.ts:Function:other", "b.ts", "other")).unwrap();
        delete_nodes_for_file(&conn, "a.ts").unwrap();
        assert_eq!(node_count(&conn).unwrap(), 1);
        assert!(node_by_id(&conn, "b.ts:Function:other").unwrap().is_some());
    }
}
