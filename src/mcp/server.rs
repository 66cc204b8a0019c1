use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{ServerHandler, tool, tool_handler, tool_router};
use tokio::sync::Mutex as AsyncMutex;

use super::params::{ExportParams, GetStatsParams, QueryParams};
use crate::cli::OutputFormat;
use crate::config::CodeGraphConfig;
use crate::query::{self, EndpointSpec, QueryRequest};
use crate::stats;
use crate::sync::SyncEngine;

// ---------------------------------------------------------------------------
// CodeGraphServer
// ---------------------------------------------------------------------------

/// One `SyncEngine` per project root, shared across tool calls and serialized by
/// the spec's single-writer discipline (§5) via the inner async mutex.
type EngineHandle = Arc<AsyncMutex<SyncEngine>>;

#[derive(Clone)]
pub struct CodeGraphServer {
    default_project_root: Arc<PathBuf>,
    engines: Arc<AsyncMutex<HashMap<PathBuf, EngineHandle>>>,
    tool_router: ToolRouter<Self>,
}

impl CodeGraphServer {
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            default_project_root: Arc::new(project_root),
            engines: Arc::new(AsyncMutex::new(HashMap::new())),
            tool_router: Self::tool_router(),
        }
    }

    /// Resolve the effective project root (override > default), returning a cached
    /// engine handle or building + fully syncing a fresh one.
    async fn resolve_engine(&self, project_path_override: Option<&str>) -> Result<(EngineHandle, PathBuf), String> {
        let path: PathBuf = match project_path_override {
            Some(p) => PathBuf::from(p),
            None => (*self.default_project_root).clone(),
        };

        let mut engines = self.engines.lock().await;
        if let Some(engine) = engines.get(&path) {
            return Ok((Arc::clone(engine), path));
        }

        let path_clone = path.clone();
        let engine = tokio::task::spawn_blocking(move || {
            let config = CodeGraphConfig::load(&path_clone);
            let mut engine = SyncEngine::open(path_clone, config).map_err(|e| e.to_string())?;
            engine.full_sync().map_err(|e| e.to_string())?;
            Ok::<SyncEngine, String>(engine)
        })
        .await
        .map_err(|e| format!("task join error: {e}"))??;

        let handle: EngineHandle = Arc::new(AsyncMutex::new(engine));
        engines.insert(path.clone(), Arc::clone(&handle));
        Ok((handle, path))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_format(format: Option<&str>) -> OutputFormat {
    match format {
        Some("table") => OutputFormat::Table,
        Some("json") => OutputFormat::Json,
        _ => OutputFormat::Compact,
    }
}

fn build_endpoint(symbol: Option<String>, file: Option<String>, query: Option<String>) -> Option<EndpointSpec> {
    if let Some(query) = query {
        return Some(EndpointSpec::Query { query });
    }
    symbol.map(|symbol| EndpointSpec::Exact { symbol, file_path: file })
}

// ---------------------------------------------------------------------------
// Tool implementations
// ---------------------------------------------------------------------------

#[tool_router]
impl CodeGraphServer {
    #[tool(
        description = "Resolve a graph query: forward reachability from --from, backward reachability into \
         --to, a path between both, or a topic search over --topic. Give either an exact symbol name (from/to) \
         or a fuzzy query (from_query/to_query) per endpoint."
    )]
    async fn query(&self, Parameters(p): Parameters<QueryParams>) -> Result<String, String> {
        let (engine, _root) = self.resolve_engine(p.project_path.as_deref()).await?;
        let mut engine = engine.lock().await;

        let request = QueryRequest {
            from: build_endpoint(p.from, p.from_file, p.from_query),
            to: build_endpoint(p.to, p.to_file, p.to_query),
            topic: p.topic,
            max_nodes: p.max_nodes,
        };

        let result = query::resolve(
            &engine.conn,
            &mut engine.search_index,
            Some(engine.embedding_provider.as_ref()),
            Some(&engine.embedding_cache),
            &request,
        )
        .map_err(|e| e.to_string())?;

        Ok(query::output::format_result_to_string(&result, &parse_format(p.format.as_deref())))
    }

    #[tool(description = "Project overview: node counts by kind, edge count, file count, search index size.")]
    async fn get_stats(&self, Parameters(p): Parameters<GetStatsParams>) -> Result<String, String> {
        let (engine, _root) = self.resolve_engine(p.project_path.as_deref()).await?;
        let engine = engine.lock().await;

        let computed = stats::compute(&engine.conn, engine.search_index.count()).map_err(|e| e.to_string())?;
        Ok(stats::format_to_string(&computed, &OutputFormat::Compact))
    }

    #[tool(
        description = "Export the whole graph, or one symbol's forward reachability, as structured JSON \
         suitable for external diagram rendering."
    )]
    async fn export(&self, Parameters(p): Parameters<ExportParams>) -> Result<String, String> {
        let (engine, _root) = self.resolve_engine(p.project_path.as_deref()).await?;
        let mut engine = engine.lock().await;

        let result = match p.from {
            Some(symbol) => {
                let request = QueryRequest {
                    from: Some(EndpointSpec::Exact { symbol, file_path: None }),
                    to: None,
                    topic: None,
                    max_nodes: p.max_nodes,
                };
                query::resolve(
                    &engine.conn,
                    &mut engine.search_index,
                    Some(engine.embedding_provider.as_ref()),
                    Some(&engine.embedding_cache),
                    &request,
                )
                .map_err(|e| e.to_string())?
            }
            None => query::export_whole_graph(&engine.conn, p.max_nodes).map_err(|e| e.to_string())?,
        };

        Ok(query::output::format_result_to_string(&result, &OutputFormat::Json))
    }
}

// ---------------------------------------------------------------------------
// ServerHandler
// ---------------------------------------------------------------------------

#[tool_handler]
impl ServerHandler for CodeGraphServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "code-graph: query TypeScript/JavaScript codebase structure via forward/backward \
                 reachability, path-finding and topic search. Each project root is indexed and kept \
                 in sync on first use."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
