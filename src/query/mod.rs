//! Unified Query Resolver (§4.9): the single entry point the `query` CLI subcommand
//! and the `query` MCP tool both call into. Resolves `from`/`to`/`topic` endpoints
//! (exact lookup or fuzzy search), auto-routes bare symbol names to a class's sole
//! method, then runs one of four traversal modes bounded by depth and node count.
//!
//! Grounded on the teacher's `src/query/impact.rs` (queue-plus-visited-set BFS shape,
//! generalised here from petgraph's `NodeIndex` to the store's string node ids) and
//! `src/query/find.rs` (name/regex matching idiom, carried over for the auto-resolution
//! name search).

pub mod output;

use std::collections::{HashSet, VecDeque};

use rusqlite::Connection;

use crate::embed::{EmbeddingCache, EmbeddingProvider};
use crate::error::CoreError;
use crate::graph::{Edge, EdgeKind, Node, NodeKind, store};
use crate::search::HybridIndex;

/// How far a BFS traversal may walk from a seed node (§4.9).
const MAX_DEPTH: usize = 8;

/// Node count used when the caller gives no `max_nodes` cap.
const DEFAULT_MAX_NODES: usize = 50;

/// Snippets are only attached to the result when the kept node count stays at or
/// below this threshold (§4.9 "Truncation").
const SNIPPET_NODE_THRESHOLD: usize = 30;

/// Fuzzy endpoint lookups return at most this many candidates.
const FUZZY_CANDIDATE_LIMIT: usize = 10;

/// An endpoint as the caller specified it — either an exact symbol lookup (optionally
/// scoped to a file) or a fuzzy query resolved through the search index.
#[derive(Debug, Clone)]
pub enum EndpointSpec {
    Exact { symbol: String, file_path: Option<String> },
    Query { query: String },
}

/// Input to [`resolve`] (§4.9 "Input").
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub from: Option<EndpointSpec>,
    pub to: Option<EndpointSpec>,
    pub topic: Option<String>,
    pub max_nodes: Option<usize>,
}

/// An endpoint once resolved: one or more candidate nodes (plural when the lookup
/// itself was ambiguous or fuzzy), plus any human-readable auto-resolution notes.
struct ResolvedEndpoint {
    candidates: Vec<Node>,
    messages: Vec<String>,
}

/// The result of one [`resolve`] call: the kept nodes/edges after traversal and
/// truncation, plus auto-resolution/truncation messages for display.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub messages: Vec<String>,
    pub truncated: bool,
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Resolve one query request end to end: endpoint/symbol resolution, traversal,
/// truncation. This is the single entry point both the CLI `query` subcommand and
/// the MCP `query` tool call into (§6 "Query surface").
pub fn resolve(
    conn: &Connection,
    search_index: &mut HybridIndex,
    provider: Option<&dyn EmbeddingProvider>,
    cache: Option<&EmbeddingCache>,
    request: &QueryRequest,
) -> Result<QueryResult, CoreError> {
    let max_nodes = request.max_nodes.unwrap_or(DEFAULT_MAX_NODES);
    let mut messages = Vec::new();

    let from_resolved = match &request.from {
        Some(spec) => Some(resolve_endpoint(conn, search_index, provider, cache, spec)?),
        None => None,
    };
    let to_resolved = match &request.to {
        Some(spec) => Some(resolve_endpoint(conn, search_index, provider, cache, spec)?),
        None => None,
    };
    if let Some(r) = &from_resolved {
        messages.extend(r.messages.iter().cloned());
    }
    if let Some(r) = &to_resolved {
        messages.extend(r.messages.iter().cloned());
    }

    let (order, edges) = match (&from_resolved, &to_resolved, &request.topic) {
        (Some(from), Some(to), _) => {
            let from_ids: Vec<String> = from.candidates.iter().map(|n| n.id.clone()).collect();
            let to_ids: Vec<String> = to.candidates.iter().map(|n| n.id.clone()).collect();
            path_mode(conn, &from_ids, &to_ids)?
        }
        (Some(from), None, _) => {
            let ids: Vec<String> = from.candidates.iter().map(|n| n.id.clone()).collect();
            traverse(conn, &ids, Direction::Forward)?
        }
        (None, Some(to), _) => {
            let ids: Vec<String> = to.candidates.iter().map(|n| n.id.clone()).collect();
            traverse(conn, &ids, Direction::Backward)?
        }
        (None, None, Some(topic)) => topic_mode(conn, search_index, provider, cache, topic, max_nodes)?,
        (None, None, None) => {
            return Err(CoreError::Resolution("query requires at least one of from, to or topic".into()));
        }
    };

    let (kept_ids, kept_edges, truncated) = truncate(order, edges, max_nodes);
    if truncated {
        messages.push(format!("truncated to {max_nodes} nodes"));
    }

    let mut nodes = Vec::with_capacity(kept_ids.len());
    for id in &kept_ids {
        if let Ok(Some(node)) = store::node_by_id(conn, id) {
            nodes.push(node);
        }
    }

    if nodes.len() > SNIPPET_NODE_THRESHOLD {
        for node in &mut nodes {
            node.snippet.clear();
        }
    }

    Ok(QueryResult { nodes, edges: kept_edges, messages, truncated })
}

/// Export the whole graph (§6 "export the whole graph ... as structured JSON,
/// suitable for feeding an external diagram renderer") — the `export` CLI
/// subcommand's no-`--from` path, with no seed to traverse from. Reuses the same
/// `max_nodes` truncation rule and snippet-suppression threshold as [`resolve`].
pub fn export_whole_graph(conn: &Connection, max_nodes: Option<usize>) -> Result<QueryResult, CoreError> {
    let nodes = store::all_nodes(conn).map_err(store_err)?;
    let edges = store::all_edges(conn).map_err(store_err)?;
    let order: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();

    let (kept_ids, kept_edges, truncated) = match max_nodes {
        Some(cap) => truncate(order, edges, cap),
        None => (order, edges, false),
    };

    let kept: HashSet<&String> = kept_ids.iter().collect();
    let mut kept_nodes: Vec<Node> = nodes.into_iter().filter(|n| kept.contains(&n.id)).collect();
    if kept_nodes.len() > SNIPPET_NODE_THRESHOLD {
        for node in &mut kept_nodes {
            node.snippet.clear();
        }
    }

    let mut messages = Vec::new();
    if truncated {
        messages.push(format!("truncated to {} nodes", max_nodes.expect("truncated implies a cap was given")));
    }

    Ok(QueryResult { nodes: kept_nodes, edges: kept_edges, messages, truncated })
}

fn resolve_endpoint(
    conn: &Connection,
    search_index: &mut HybridIndex,
    provider: Option<&dyn EmbeddingProvider>,
    cache: Option<&EmbeddingCache>,
    spec: &EndpointSpec,
) -> Result<ResolvedEndpoint, CoreError> {
    match spec {
        EndpointSpec::Exact { symbol, file_path } => resolve_exact_endpoint(conn, symbol, file_path.as_deref()),
        EndpointSpec::Query { query } => resolve_fuzzy_endpoint(conn, search_index, provider, cache, query),
    }
}

/// Exact endpoint lookup (§4.9 "Symbol resolution"). A `file_path` narrows the first
/// attempt to a direct name match within that file; when that comes up empty (or no
/// file was given at all) resolution falls through to [`auto_resolve_symbol`].
fn resolve_exact_endpoint(conn: &Connection, symbol: &str, file_path: Option<&str>) -> Result<ResolvedEndpoint, CoreError> {
    if let Some(file) = file_path {
        let in_file = store::nodes_by_file(conn, file).map_err(store_err)?;
        let matches: Vec<Node> = in_file.into_iter().filter(|n| n.name == symbol).collect();
        if !matches.is_empty() {
            return Ok(ResolvedEndpoint { candidates: matches, messages: Vec::new() });
        }
    }
    auto_resolve_symbol(conn, symbol)
}

/// (a) name match, (b) single-method-class auto-route, (c) multi-method disambiguation
/// list — §4.9's symbol auto-resolution algorithm.
fn auto_resolve_symbol(conn: &Connection, symbol: &str) -> Result<ResolvedEndpoint, CoreError> {
    let named = store::nodes_by_name(conn, symbol).map_err(store_err)?;

    let direct: Vec<Node> = named.iter().filter(|n| n.kind != NodeKind::Class).cloned().collect();
    if !direct.is_empty() {
        return Ok(ResolvedEndpoint { candidates: direct, messages: Vec::new() });
    }

    let class_candidates: Vec<Node> = named.into_iter().filter(|n| n.kind == NodeKind::Class).collect();
    if class_candidates.is_empty() {
        return Err(CoreError::Resolution(symbol.to_owned()));
    }

    let mut resolved = Vec::new();
    let mut messages = Vec::new();
    for class in &class_candidates {
        let methods: Vec<Node> = store::nodes_by_file(conn, &class.file_path)
            .map_err(store_err)?
            .into_iter()
            .filter(|n| n.kind == NodeKind::Method && n.owning_class() == Some(class.name.as_str()))
            .collect();
        match methods.len() {
            0 => continue,
            1 => {
                let method = methods.into_iter().next().expect("checked len == 1");
                messages.push(format!("Resolved '{symbol}' to {}", qualified_name(&method)));
                resolved.push(method);
            }
            _ => {
                let candidates = methods.iter().map(qualified_name).collect();
                return Err(CoreError::Disambiguation { symbol: symbol.to_owned(), candidates });
            }
        }
    }

    if resolved.is_empty() {
        return Err(CoreError::Resolution(symbol.to_owned()));
    }
    Ok(ResolvedEndpoint { candidates: resolved, messages })
}

fn resolve_fuzzy_endpoint(
    conn: &Connection,
    search_index: &mut HybridIndex,
    provider: Option<&dyn EmbeddingProvider>,
    cache: Option<&EmbeddingCache>,
    query: &str,
) -> Result<ResolvedEndpoint, CoreError> {
    let hits = search_index.search(query, provider, cache, FUZZY_CANDIDATE_LIMIT);
    let mut candidates = Vec::new();
    for hit in &hits {
        if let Ok(Some(node)) = store::node_by_id(conn, &hit.id) {
            candidates.push(node);
        }
    }
    if candidates.is_empty() {
        return Err(CoreError::Resolution(query.to_owned()));
    }
    Ok(ResolvedEndpoint { candidates, messages: Vec::new() })
}

fn qualified_name(node: &Node) -> String {
    match node.owning_class() {
        Some(class) => format!("{class}.{}", node.name),
        None => node.name.clone(),
    }
}

fn store_err(err: anyhow::Error) -> CoreError {
    CoreError::Resolution(err.to_string())
}

/// Breadth-first edge walk from `seeds`, restricted to [`EdgeKind::default_traversal_set`]
/// and bounded by [`MAX_DEPTH`]. Multiple seeds are unioned into one queue, which also
/// implements §4.9's "when an endpoint resolves to more than one candidate, union the
/// edges across all candidates" rule for free.
fn traverse(conn: &Connection, seeds: &[String], direction: Direction) -> Result<(Vec<String>, Vec<Edge>), CoreError> {
    let allowed: HashSet<EdgeKind> = EdgeKind::default_traversal_set().iter().copied().collect();
    let mut visited: HashSet<String> = HashSet::new();
    let mut order: Vec<String> = Vec::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut edge_seen: HashSet<(String, String, &'static str)> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();

    for seed in seeds {
        if visited.insert(seed.clone()) {
            order.push(seed.clone());
            queue.push_back((seed.clone(), 0));
        }
    }

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= MAX_DEPTH {
            continue;
        }
        let neighbours = match direction {
            Direction::Forward => store::outgoing_edges(conn, &current),
            Direction::Backward => store::incoming_edges(conn, &current),
        }
        .map_err(store_err)?;

        for edge in neighbours {
            if !allowed.contains(&edge.kind) {
                continue;
            }
            if edge_seen.insert(edge.triple()) {
                edges.push(edge.clone());
            }
            let next = match direction {
                Direction::Forward => edge.target.clone(),
                Direction::Backward => edge.source.clone(),
            };
            if visited.insert(next.clone()) {
                order.push(next.clone());
                queue.push_back((next, depth + 1));
            }
        }
    }

    Ok((order, edges))
}

/// Path-finding mode: forward reachability from `from` intersected with backward
/// reachability from `to`, kept in forward BFS order so truncation still starts at
/// `from` (§4.9 scenario 5 — a straight chain truncates to its first `max_nodes` hops).
fn path_mode(conn: &Connection, from_ids: &[String], to_ids: &[String]) -> Result<(Vec<String>, Vec<Edge>), CoreError> {
    let (forward_order, forward_edges) = traverse(conn, from_ids, Direction::Forward)?;
    let (backward_order, _backward_edges) = traverse(conn, to_ids, Direction::Backward)?;
    let reachable_from_to: HashSet<String> = backward_order.into_iter().collect();

    let on_path: Vec<String> = forward_order.into_iter().filter(|id| reachable_from_to.contains(id)).collect();
    let kept: HashSet<String> = on_path.iter().cloned().collect();
    let path_edges: Vec<Edge> = forward_edges.into_iter().filter(|e| kept.contains(&e.source) && kept.contains(&e.target)).collect();

    Ok((on_path, path_edges))
}

/// Topic-only mode: hybrid search seeds the node set, then edges already present
/// between those seeds connect them — no BFS expansion beyond the search hits
/// themselves (§4.9 "topic only").
fn topic_mode(
    conn: &Connection,
    search_index: &mut HybridIndex,
    provider: Option<&dyn EmbeddingProvider>,
    cache: Option<&EmbeddingCache>,
    topic: &str,
    limit: usize,
) -> Result<(Vec<String>, Vec<Edge>), CoreError> {
    let hits = search_index.search(topic, provider, cache, limit);
    let mut seeds = Vec::new();
    for hit in &hits {
        if let Ok(Some(node)) = store::node_by_id(conn, &hit.id) {
            seeds.push(node);
        }
    }
    if seeds.is_empty() {
        return Err(CoreError::Resolution(topic.to_owned()));
    }

    let ids: HashSet<String> = seeds.iter().map(|n| n.id.clone()).collect();
    let order: Vec<String> = seeds.iter().map(|n| n.id.clone()).collect();
    let mut edges = Vec::new();
    let mut seen = HashSet::new();
    for seed in &seeds {
        for edge in store::outgoing_edges(conn, &seed.id).map_err(store_err)? {
            if ids.contains(&edge.target) && seen.insert(edge.triple()) {
                edges.push(edge);
            }
        }
    }

    Ok((order, edges))
}

/// Keep the first `max_nodes` of `order` (already in BFS/rank order), and restrict
/// `edges` to only those whose endpoints both survived (§4.9 "Truncation").
fn truncate(order: Vec<String>, edges: Vec<Edge>, max_nodes: usize) -> (Vec<String>, Vec<Edge>, bool) {
    if order.len() <= max_nodes {
        return (order, edges, false);
    }
    let kept: Vec<String> = order.into_iter().take(max_nodes).collect();
    let kept_set: HashSet<&String> = kept.iter().collect();
    let trimmed: Vec<Edge> = edges.into_iter().filter(|e| kept_set.contains(&e.source) && kept_set.contains(&e.target)).collect();
    (kept, trimmed, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use crate::graph::{NodeMetadata, store};

    fn node(id: &str, file: &str, name: &str, kind: NodeKind) -> Node {
        Node {
            id: id.into(),
            kind,
            name: name.into(),
            package: "root".into(),
            file_path: file.into(),
            start_line: 1,
            end_line: 2,
            exported: true,
            content_hash: format!("hash-{id}"),
            snippet: format!("snippet for {name}"),
            metadata: NodeMetadata::default(),
        }
    }

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE nodes (id TEXT PRIMARY KEY, type TEXT, name TEXT, package TEXT, file_path TEXT,
             start_line INTEGER, end_line INTEGER, exported INTEGER, content_hash TEXT, snippet TEXT, metadata TEXT);
             CREATE TABLE edges (source TEXT, target TEXT, type TEXT, call_sites TEXT, call_count INTEGER, context TEXT);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn forward_only_traverses_calls_edges() {
        let conn = setup_conn();
        store::upsert_node(&conn, &node("a.ts:Function:a", "a.ts", "a", NodeKind::Function)).unwrap();
        store::upsert_node(&conn, &node("b.ts:Function:b", "b.ts", "b", NodeKind::Function)).unwrap();
        store::insert_edge(&conn, &Edge::new("a.ts:Function:a", "b.ts:Function:b", EdgeKind::Calls)).unwrap();

        let mut index = HybridIndex::new(&EmbeddingConfig::default());
        let request = QueryRequest {
            from: Some(EndpointSpec::Exact { symbol: "a".into(), file_path: None }),
            ..Default::default()
        };
        let result = resolve(&conn, &mut index, None, None, &request).unwrap();
        assert_eq!(result.nodes.len(), 2);
        assert_eq!(result.edges.len(), 1);
    }

    #[test]
    fn backward_only_traverses_incoming_edges() {
        let conn = setup_conn();
        store::upsert_node(&conn, &node("a.ts:Function:a", "a.ts", "a", NodeKind::Function)).unwrap();
        store::upsert_node(&conn, &node("b.ts:Function:b", "b.ts", "b", NodeKind::Function)).unwrap();
        store::insert_edge(&conn, &Edge::new("a.ts:Function:a", "b.ts:Function:b", EdgeKind::Calls)).unwrap();

        let mut index = HybridIndex::new(&EmbeddingConfig::default());
        let request = QueryRequest {
            to: Some(EndpointSpec::Exact { symbol: "b".into(), file_path: None }),
            ..Default::default()
        };
        let result = resolve(&conn, &mut index, None, None, &request).unwrap();
        let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        assert!(ids.contains(&"a.ts:Function:a"));
    }

    #[test]
    fn path_finding_with_truncation_keeps_first_max_nodes_on_the_chain() {
        let conn = setup_conn();
        let names = ["a", "b", "c", "d", "e", "f"];
        for n in names {
            store::upsert_node(&conn, &node(&format!("x.ts:Function:{n}"), "x.ts", n, NodeKind::Function)).unwrap();
        }
        for pair in names.windows(2) {
            store::insert_edge(
                &conn,
                &Edge::new(format!("x.ts:Function:{}", pair[0]), format!("x.ts:Function:{}", pair[1]), EdgeKind::Calls),
            )
            .unwrap();
        }

        let mut index = HybridIndex::new(&EmbeddingConfig::default());
        let request = QueryRequest {
            from: Some(EndpointSpec::Exact { symbol: "a".into(), file_path: None }),
            to: Some(EndpointSpec::Exact { symbol: "f".into(), file_path: None }),
            max_nodes: Some(3),
            ..Default::default()
        };
        let result = resolve(&conn, &mut index, None, None, &request).unwrap();
        assert_eq!(result.nodes.len(), 3);
        assert!(result.truncated);
        assert_eq!(result.edges.len(), 2);
        let names: Vec<&str> = result.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn single_method_class_auto_routes_to_its_method() {
        let conn = setup_conn();
        store::upsert_node(&conn, &node("svc.ts:Class:UserService", "svc.ts", "UserService", NodeKind::Class)).unwrap();
        store::upsert_node(&conn, &node("svc.ts:Method:UserService.save", "svc.ts", "save", NodeKind::Method)).unwrap();
        store::upsert_node(&conn, &node("caller.ts:Function:handler", "caller.ts", "handler", NodeKind::Function)).unwrap();
        store::insert_edge(&conn, &Edge::new("caller.ts:Function:handler", "svc.ts:Method:UserService.save", EdgeKind::Calls)).unwrap();

        let mut index = HybridIndex::new(&EmbeddingConfig::default());
        let request = QueryRequest {
            to: Some(EndpointSpec::Exact { symbol: "UserService".into(), file_path: None }),
            ..Default::default()
        };
        let result = resolve(&conn, &mut index, None, None, &request).unwrap();
        assert!(result.messages.iter().any(|m| m == "Resolved 'UserService' to UserService.save"));
        let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        assert!(ids.contains(&"caller.ts:Function:handler"));
    }

    #[test]
    fn multi_method_class_returns_disambiguation_error() {
        let conn = setup_conn();
        store::upsert_node(&conn, &node("svc.ts:Class:UserService", "svc.ts", "UserService", NodeKind::Class)).unwrap();
        store::upsert_node(&conn, &node("svc.ts:Method:UserService.save", "svc.ts", "save", NodeKind::Method)).unwrap();
        store::upsert_node(&conn, &node("svc.ts:Method:UserService.load", "svc.ts", "load", NodeKind::Method)).unwrap();

        let mut index = HybridIndex::new(&EmbeddingConfig::default());
        let request = QueryRequest {
            to: Some(EndpointSpec::Exact { symbol: "UserService".into(), file_path: None }),
            ..Default::default()
        };
        let err = resolve(&conn, &mut index, None, None, &request).unwrap_err();
        match err {
            CoreError::Disambiguation { symbol, candidates } => {
                assert_eq!(symbol, "UserService");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected Disambiguation, got {other:?}"),
        }
    }

    #[test]
    fn unknown_symbol_is_a_resolution_error() {
        let conn = setup_conn();
        let mut index = HybridIndex::new(&EmbeddingConfig::default());
        let request = QueryRequest {
            from: Some(EndpointSpec::Exact { symbol: "Nope".into(), file_path: None }),
            ..Default::default()
        };
        assert!(resolve(&conn, &mut index, None, None, &request).is_err());
    }

    #[test]
    fn missing_every_endpoint_is_a_resolution_error() {
        let conn = setup_conn();
        let mut index = HybridIndex::new(&EmbeddingConfig::default());
        let request = QueryRequest::default();
        assert!(resolve(&conn, &mut index, None, None, &request).is_err());
    }

    #[test]
    fn export_whole_graph_returns_every_node_with_no_seed() {
        let conn = setup_conn();
        store::upsert_node(&conn, &node("a.ts:Function:a", "a.ts", "a", NodeKind::Function)).unwrap();
        store::upsert_node(&conn, &node("b.ts:Function:b", "b.ts", "b", NodeKind::Function)).unwrap();
        store::insert_edge(&conn, &Edge::new("a.ts:Function:a", "b.ts:Function:b", EdgeKind::Calls)).unwrap();

        let result = export_whole_graph(&conn, None).unwrap();
        assert_eq!(result.nodes.len(), 2);
        assert_eq!(result.edges.len(), 1);
        assert!(!result.truncated);
    }

    #[test]
    fn export_whole_graph_honours_max_nodes() {
        let conn = setup_conn();
        for (id, file, name) in [("a.ts:Function:a", "a.ts", "a"), ("b.ts:Function:b", "b.ts", "b"), ("c.ts:Function:c", "c.ts", "c")] {
            store::upsert_node(&conn, &node(id, file, name, NodeKind::Function)).unwrap();
        }

        let result = export_whole_graph(&conn, Some(2)).unwrap();
        assert_eq!(result.nodes.len(), 2);
        assert!(result.truncated);
    }
}
