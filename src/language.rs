//! TypeScript/JavaScript file-extension classification.
//!
//! Trimmed from the teacher's `LanguageKind` (which also carried `Rust`) per the
//! spec's Non-goal "language support beyond TypeScript/JSX source".

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageKind {
    TypeScript,
    JavaScript,
}

impl LanguageKind {
    pub fn matches_extension(&self, ext: &str) -> bool {
        match self {
            LanguageKind::TypeScript => matches!(ext, "ts" | "tsx"),
            LanguageKind::JavaScript => matches!(ext, "js" | "jsx"),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageKind::TypeScript => "TypeScript",
            LanguageKind::JavaScript => "JavaScript",
        }
    }
}

/// Source file extensions that code-graph discovers and parses.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_extension_is_exclusive_per_language() {
        assert!(LanguageKind::TypeScript.matches_extension("tsx"));
        assert!(!LanguageKind::TypeScript.matches_extension("js"));
        assert!(LanguageKind::JavaScript.matches_extension("jsx"));
        assert!(!LanguageKind::JavaScript.matches_extension("ts"));
    }
}
