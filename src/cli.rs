use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// A code intelligence engine for TypeScript/JavaScript codebases.
///
/// code-graph extracts your codebase's static structure into a queryable,
/// incrementally-synced graph, with hybrid (BM25 + vector) search over it.
#[derive(Parser, Debug)]
#[command(
    name = "code-graph",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for query results.
#[derive(Clone, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    /// Compact one-line-per-result format, token-optimized for AI agent use (default).
    #[default]
    Compact,
    /// Human-readable columnar table.
    Table,
    /// Structured JSON suitable for programmatic consumption or export.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a project directory: full sync of the graph store, embedding cache and
    /// search index against the current filesystem.
    Index {
        /// Path to the project root to index (defaults to the current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print a summary line per discovered file during indexing.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run the unified query resolver: forward/backward reachability, path-finding,
    /// or topic search, depending on which of --from/--to/--topic are given.
    Query {
        /// Project root to query (must already be indexed).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Forward-reachability or path-finding start: a symbol name, optionally
        /// scoped with --from-file, or a free-text query for fuzzy resolution.
        #[arg(long)]
        from: Option<String>,

        /// File path narrowing --from to an exact lookup.
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// Backward-reachability or path-finding end: a symbol name, optionally
        /// scoped with --to-file, or a free-text query for fuzzy resolution.
        #[arg(long)]
        to: Option<String>,

        /// File path narrowing --to to an exact lookup.
        #[arg(long)]
        to_file: Option<PathBuf>,

        /// Topic search: hybrid BM25 + vector search seeding the result, connected
        /// by whatever edges already exist between the hits.
        #[arg(long)]
        topic: Option<String>,

        /// Cap on the number of nodes returned (default 50).
        #[arg(long)]
        max_nodes: Option<usize>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Watch the project for changes, incrementally re-syncing the graph, embedding
    /// cache and search index as files are added, modified or removed.
    Watch {
        /// Path to the project root to watch.
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Serve the graph over the Model Context Protocol (stdio transport), so an
    /// MCP-aware client can call the same query resolver as the CLI.
    Mcp {
        /// Path to the project root to serve.
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Project statistics overview: node/edge counts by kind, file count, search
    /// index size.
    Stats {
        /// Path to the project root to index and query.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Export the whole graph (or a query's subgraph) as structured JSON, suitable
    /// for feeding an external diagram renderer.
    Export {
        /// Path to the project root to index and query.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Restrict the export to one symbol's forward reachability, instead of the
        /// whole graph.
        #[arg(long)]
        from: Option<String>,

        /// Cap on the number of nodes exported.
        #[arg(long)]
        max_nodes: Option<usize>,

        /// Output file. Prints to stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}
