use schemars::JsonSchema;
use serde::Deserialize;

/// Parameters for the unified `query` tool, mirroring §4.9's `QueryRequest` shape.
/// `from`/`to` are exact-lookup symbol names by default; give `from_query`/`to_query`
/// instead to resolve that endpoint through fuzzy search rather than an exact name.
#[derive(Deserialize, JsonSchema)]
pub struct QueryParams {
    /// Forward-reachability or path-finding start: an exact symbol name.
    pub from: Option<String>,
    /// File path narrowing `from` to a specific declaration.
    pub from_file: Option<String>,
    /// Forward-reachability or path-finding start, resolved via fuzzy search instead
    /// of an exact symbol name.
    pub from_query: Option<String>,

    /// Backward-reachability or path-finding end: an exact symbol name.
    pub to: Option<String>,
    /// File path narrowing `to` to a specific declaration.
    pub to_file: Option<String>,
    /// Backward-reachability or path-finding end, resolved via fuzzy search.
    pub to_query: Option<String>,

    /// Topic search: hybrid BM25 + vector search seeding the result.
    pub topic: Option<String>,

    /// Cap on the number of nodes returned (default 50).
    pub max_nodes: Option<usize>,

    /// Output rendering: "compact" (default), "table" or "json".
    pub format: Option<String>,

    /// Project root path override.
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GetStatsParams {
    /// Project root path override.
    pub project_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct ExportParams {
    /// Restrict the export to one symbol's forward reachability, instead of the
    /// whole graph.
    pub from: Option<String>,
    /// Cap on the number of nodes exported.
    pub max_nodes: Option<usize>,
    /// Project root path override.
    pub project_path: Option<String>,
}
