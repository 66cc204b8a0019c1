use sha2::{Digest, Sha256};

/// Maximum number of lines captured in a node's snippet window (§4.6): enough to show
/// a signature plus a short body without ballooning row size.
const SNIPPET_MAX_LINES: usize = 12;

/// Compute the bounded source-window snippet for a declaration starting at `start_line`
/// (1-based) and ending at `end_line` (inclusive), given the full file `source`.
pub fn extract_snippet(source: &str, start_line: u32, end_line: u32) -> String {
    let start = start_line.max(1) as usize - 1;
    let last_line = end_line.max(start_line) as usize - 1;
    let window_end = last_line.min(start + SNIPPET_MAX_LINES - 1);

    source
        .lines()
        .enumerate()
        .filter(|(i, _)| *i >= start && *i <= window_end)
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hash a node's snippet so unchanged declarations keep a stable cache key across
/// re-extractions (§4.6, §8 cache-hit property).
pub fn content_hash(snippet: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(snippet.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_snippet_bounds_window_length() {
        let source = (1..=30)
            .map(|i| format!("line{i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let snippet = extract_snippet(&source, 1, 30);
        assert_eq!(snippet.lines().count(), SNIPPET_MAX_LINES);
        assert!(snippet.starts_with("line1"));
    }

    #[test]
    fn extract_snippet_short_declaration_is_not_padded() {
        let source = "a\nb\nc\nd\n";
        let snippet = extract_snippet(source, 2, 3);
        assert_eq!(snippet, "b\nc");
    }

    #[test]
    fn content_hash_is_stable_and_sensitive_to_input() {
        let h1 = content_hash("const x = 1;");
        let h2 = content_hash("const x = 1;");
        let h3 = content_hash("const x = 2;");
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert_eq!(h1.len(), 64);
    }
}
