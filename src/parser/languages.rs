//! Grammar lookup by file extension. TypeScript/JSX only, per the spec's non-goal
//! "language support beyond TypeScript/JSX source" — the teacher's Rust/Python/Go
//! grammars are dropped here.

use tree_sitter::Language;

pub fn language_for_extension(ext: &str) -> Option<Language> {
    match ext {
        "ts" | "mts" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "js" | "jsx" | "mjs" | "cjs" => Some(tree_sitter_javascript::LANGUAGE.into()),
        _ => None,
    }
}

/// Whether a file extension uses the TSX grammar variant (affects query selection
/// for JSX-bearing constructs in both `.tsx` and `.jsx` files).
pub fn is_jsx_extension(ext: &str) -> bool {
    matches!(ext, "tsx" | "jsx")
}
