pub mod imports;
pub mod languages;
pub mod symbols;
pub mod walk;

use std::cell::RefCell;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tree_sitter::Parser;

use imports::{ExportInfo, ImportInfo, extract_exports, extract_imports};
use languages::{is_jsx_extension, language_for_extension};
use symbols::{Declaration, extract_symbols};
use walk::{WalkResult, walk_file};

// Thread-local Parser instances — one per rayon worker thread, zero lock contention.
// Each Parser is initialised once per thread with the appropriate grammar.
thread_local! {
    static PARSER_TS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()).unwrap();
        p
    });
    static PARSER_TSX: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_typescript::LANGUAGE_TSX.into()).unwrap();
        p
    });
    static PARSER_JS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_javascript::LANGUAGE.into()).unwrap();
        p
    });
}

/// The result of parsing a single source file: declarations plus the raw,
/// unresolved mentions the ingestion pipeline turns into edges once the
/// import resolver has built this file's symbol map (§4.3, §4.5).
///
/// The tree-sitter `Tree` is not retained — it's dropped once extraction
/// finishes so large codebases don't keep every AST resident at once.
pub struct ParseResult {
    /// Each entry is `(declaration, children)` — children are class/interface members.
    pub declarations: Vec<(Declaration, Vec<Declaration>)>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    pub mentions: WalkResult,
}

/// Parse a source file and extract declarations, imports, exports and the raw
/// call/type/reference mentions.
///
/// Allocates a fresh `Parser` on every call — suitable for single-file incremental
/// watcher updates where the overhead is negligible. For bulk parsing use
/// [`parse_file_parallel`] instead.
///
/// # Errors
/// Returns an error if the file extension isn't `.ts`/`.tsx`/`.js`/`.jsx`, or if
/// tree-sitter returns `None` for malformed/truncated source.
pub fn parse_file(path: &Path, source: &[u8]) -> Result<ParseResult> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let language = language_for_extension(ext).ok_or_else(|| anyhow!("unsupported file extension: {:?}", ext))?;
    let is_tsx = is_jsx_extension(ext);

    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .with_context(|| format!("failed to set tree-sitter language for extension {:?}", ext))?;

    let tree = parser.parse(source, None).ok_or_else(|| anyhow!("tree-sitter returned None for {:?}", path))?;

    let declarations = extract_symbols(&tree, source, &language, is_tsx);
    let imports = extract_imports(&tree, source, &language);
    let exports = extract_exports(&tree, source, &language);
    let mentions = walk_file(&tree, source);

    Ok(ParseResult { declarations, imports, exports, mentions })
}

/// Parse a source file using thread-local Parser instances (for rayon parallel use).
///
/// Same as [`parse_file`] but reuses a per-thread Parser instead of allocating a new
/// one, avoiding lock contention across rayon worker threads.
pub fn parse_file_parallel(path: &Path, source: &[u8]) -> Result<ParseResult> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let is_tsx = is_jsx_extension(ext);

    let tree = match ext {
        "ts" | "mts" => PARSER_TS.with(|p| p.borrow_mut().parse(source, None)),
        "tsx" => PARSER_TSX.with(|p| p.borrow_mut().parse(source, None)),
        "js" | "jsx" | "mjs" | "cjs" => PARSER_JS.with(|p| p.borrow_mut().parse(source, None)),
        _ => return Err(anyhow!("unsupported file extension: {:?}", ext)),
    };
    let tree = tree.ok_or_else(|| anyhow!("tree-sitter returned None for {:?}", path))?;

    let language = language_for_extension(ext).ok_or_else(|| anyhow!("unsupported file extension: {:?}", ext))?;

    let declarations = extract_symbols(&tree, source, &language, is_tsx);
    let imports = extract_imports(&tree, source, &language);
    let exports = extract_exports(&tree, source, &language);
    let mentions = walk_file(&tree, source);

    Ok(ParseResult { declarations, imports, exports, mentions })
}
