//! Query result rendering (§6 "Query surface"): a formatted graph section for
//! `compact`/`table` output, or a structured JSON document carrying edges, nodes
//! and the auto-resolution/truncation messages for the `export` subcommand and
//! other downstream renderers.
//!
//! Grounded on the teacher's `src/query/output.rs` dual `format_*`/`format_*_to_string`
//! split — CLI subcommands print directly, the MCP tools need the same text back as a
//! `String` to hand to the client.

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::graph::{Edge, Node};

use super::QueryResult;

#[derive(Debug, Serialize)]
struct JsonNode<'a> {
    id: &'a str,
    kind: &'static str,
    name: &'a str,
    file_path: &'a str,
    start_line: u32,
    end_line: u32,
    exported: bool,
    snippet: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct JsonEdge<'a> {
    source: &'a str,
    target: &'a str,
    kind: &'static str,
    call_count: u32,
}

#[derive(Debug, Serialize)]
struct JsonResult<'a> {
    nodes: Vec<JsonNode<'a>>,
    edges: Vec<JsonEdge<'a>>,
    messages: &'a [String],
    truncated: bool,
}

/// Render a [`QueryResult`] per `format` and print it to stdout.
pub fn print_result(result: &QueryResult, format: &OutputFormat) {
    println!("{}", format_result_to_string(result, format));
}

/// Same rendering as [`print_result`], returned as a string — used by the MCP `query`
/// tool, which must hand text back to the client rather than print it.
pub fn format_result_to_string(result: &QueryResult, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json_string(result),
        OutputFormat::Table => format_table(result),
        OutputFormat::Compact => format_compact(result),
    }
}

fn to_json_string(result: &QueryResult) -> String {
    let json = JsonResult {
        nodes: result.nodes.iter().map(json_node).collect(),
        edges: result.edges.iter().map(json_edge).collect(),
        messages: &result.messages,
        truncated: result.truncated,
    };
    serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
}

fn json_node(node: &Node) -> JsonNode<'_> {
    JsonNode {
        id: &node.id,
        kind: node.kind.as_str(),
        name: &node.name,
        file_path: &node.file_path,
        start_line: node.start_line,
        end_line: node.end_line,
        exported: node.exported,
        snippet: if node.snippet.is_empty() { None } else { Some(&node.snippet) },
    }
}

fn json_edge(edge: &Edge) -> JsonEdge<'_> {
    JsonEdge { source: &edge.source, target: &edge.target, kind: edge.kind.as_str(), call_count: edge.call_count }
}

/// One line per node (`kind name @ file:line`), then one line per edge
/// (`source -KIND-> target`), with messages prefixed on their own lines.
fn format_compact(result: &QueryResult) -> String {
    let mut lines = Vec::new();
    for message in &result.messages {
        lines.push(format!("# {message}"));
    }
    for node in &result.nodes {
        lines.push(format!("{} {} @ {}:{}-{}", node.kind.as_str(), node.name, node.file_path, node.start_line, node.end_line));
    }
    for edge in &result.edges {
        lines.push(format!("{} -{}-> {}", edge.source, edge.kind.as_str(), edge.target));
    }
    if lines.is_empty() {
        lines.push("(no results)".to_string());
    }
    lines.join("\n")
}

/// Columnar rendering: a node table followed by an edge table.
fn format_table(result: &QueryResult) -> String {
    let mut out = String::new();
    for message in &result.messages {
        out.push_str(&format!("{message}\n"));
    }
    if !result.messages.is_empty() {
        out.push('\n');
    }

    out.push_str(&format!("{:<10} {:<30} {:<40} {:>5} {:>5}\n", "KIND", "NAME", "FILE", "START", "END"));
    for node in &result.nodes {
        out.push_str(&format!(
            "{:<10} {:<30} {:<40} {:>5} {:>5}\n",
            node.kind.as_str(),
            node.name,
            node.file_path,
            node.start_line,
            node.end_line
        ));
    }

    if !result.edges.is_empty() {
        out.push('\n');
        out.push_str(&format!("{:<45} {:<14} {:<45}\n", "SOURCE", "KIND", "TARGET"));
        for edge in &result.edges {
            out.push_str(&format!("{:<45} {:<14} {:<45}\n", edge.source, edge.kind.as_str(), edge.target));
        }
    }

    if result.truncated {
        out.push_str("\n(results truncated)\n");
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeKind, NodeKind, NodeMetadata};

    fn sample_result() -> QueryResult {
        let node = Node {
            id: "a.ts:Function:show".into(),
            kind: NodeKind::Function,
            name: "show".into(),
            package: "root".into(),
            file_path: "a.ts".into(),
            start_line: 1,
            end_line: 3,
            exported: true,
            content_hash: "hash".into(),
            snippet: "function show() {}".into(),
            metadata: NodeMetadata::default(),
        };
        let edge = Edge::new("a.ts:Function:show", "a.ts:Function:show", EdgeKind::Calls);
        QueryResult { nodes: vec![node], edges: vec![edge], messages: vec!["hello".into()], truncated: false }
    }

    #[test]
    fn compact_includes_node_and_edge_lines() {
        let text = format_compact(&sample_result());
        assert!(text.contains("Function show @ a.ts:1-3"));
        assert!(text.contains("-CALLS->"));
        assert!(text.contains("# hello"));
    }

    #[test]
    fn json_round_trips_node_fields() {
        let text = to_json_string(&sample_result());
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["nodes"][0]["name"], "show");
        assert_eq!(value["edges"][0]["kind"], "CALLS");
    }

    #[test]
    fn table_lists_header_and_truncation_notice() {
        let mut result = sample_result();
        result.truncated = true;
        let text = format_table(&result);
        assert!(text.contains("KIND"));
        assert!(text.contains("truncated"));
    }

    #[test]
    fn empty_result_compact_is_not_blank() {
        let result = QueryResult::default();
        assert_eq!(format_compact(&result), "(no results)");
    }
}
