mod cli;
mod config;
mod embed;
mod error;
mod graph;
mod id;
mod ingest;
mod language;
mod logging;
mod mcp;
mod parser;
mod query;
mod registry;
mod resolver;
mod search;
mod stats;
mod sync;
mod walker;
mod watcher;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands, OutputFormat};
use config::CodeGraphConfig;
use query::output::print_result;
use query::{EndpointSpec, QueryRequest};
use sync::SyncEngine;

/// Open (and fully sync) a `SyncEngine` rooted at `path`, for one-shot CLI commands
/// that need the store up to date before they read it.
fn open_synced(path: &Path, verbose: bool) -> Result<SyncEngine> {
    let config = CodeGraphConfig::load(path);
    let mut engine = SyncEngine::open(path.to_path_buf(), config).map_err(|e| anyhow::anyhow!(e))?;
    let result = engine.full_sync()?;
    if verbose {
        eprintln!(
            "indexed: {} added, {} stale, {} unchanged, {} deleted ({} errors)",
            result.added,
            result.stale,
            result.unchanged,
            result.deleted,
            result.errors.len()
        );
        for err in &result.errors {
            eprintln!("  {err}");
        }
    }
    Ok(engine)
}

fn build_endpoint(symbol: Option<String>, file_path: Option<PathBuf>) -> Option<EndpointSpec> {
    symbol.map(|symbol| EndpointSpec::Exact { symbol, file_path: file_path.map(|p| p.display().to_string()) })
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Index { path, verbose } => {
            let engine = open_synced(&path, verbose)?;
            let computed = stats::compute(&engine.conn, engine.search_index.count())?;
            stats::print_stats(&computed, &OutputFormat::Compact);
        }

        Commands::Query { path, from, from_file, to, to_file, topic, max_nodes, format } => {
            let mut engine = open_synced(&path, false)?;

            let request = QueryRequest {
                from: build_endpoint(from, from_file),
                to: build_endpoint(to, to_file),
                topic,
                max_nodes,
            };

            let result = query::resolve(
                &engine.conn,
                &mut engine.search_index,
                Some(engine.embedding_provider.as_ref()),
                Some(&engine.embedding_cache),
                &request,
            )
            .map_err(|e| anyhow::anyhow!(e))?;

            print_result(&result, &format);
        }

        Commands::Stats { path, format } => {
            let engine = open_synced(&path, false)?;
            let computed = stats::compute(&engine.conn, engine.search_index.count())?;
            stats::print_stats(&computed, &format);
        }

        Commands::Export { path, from, max_nodes, output } => {
            let mut engine = open_synced(&path, false)?;

            let result = match from {
                Some(symbol) => {
                    let request = QueryRequest {
                        from: build_endpoint(Some(symbol), None),
                        to: None,
                        topic: None,
                        max_nodes,
                    };
                    query::resolve(
                        &engine.conn,
                        &mut engine.search_index,
                        Some(engine.embedding_provider.as_ref()),
                        Some(&engine.embedding_cache),
                        &request,
                    )
                    .map_err(|e| anyhow::anyhow!(e))?
                }
                None => query::export_whole_graph(&engine.conn, max_nodes).map_err(|e| anyhow::anyhow!(e))?,
            };

            let json = query::output::format_result_to_string(&result, &OutputFormat::Json);
            match output {
                Some(out_path) => std::fs::write(&out_path, &json).with_context(|| format!("writing {}", out_path.display()))?,
                None => println!("{json}"),
            }
        }

        Commands::Watch { path } => {
            let mut engine = open_synced(&path, true)?;
            eprintln!("watching {} for changes...", path.display());

            let watch_config = engine.config.watch_config();
            let (handle, mut rx) = watcher::start_watcher(&path, &watch_config)?;
            let _handle = handle;

            let mut batch: Vec<PathBuf> = Vec::new();
            while let Some(event) = rx.recv().await {
                batch.clear();
                batch.push(event.path().clone());
                match engine.sync_paths(&batch) {
                    Ok(result) => {
                        eprintln!(
                            "[watch] {} ({} stale, {} deleted, {} errors)",
                            batch[0].strip_prefix(&path).unwrap_or(&batch[0]).display(),
                            result.stale,
                            result.deleted,
                            result.errors.len()
                        );
                    }
                    Err(err) => eprintln!("[watch] sync failed: {err}"),
                }
            }
        }

        Commands::Mcp { path } => {
            mcp::run(path).await?;
        }
    }

    Ok(())
}
