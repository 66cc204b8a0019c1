//! Shared plumbing: node-id generation and path normalisation (§3, §6).

use std::path::{Path, PathBuf};

use crate::graph::NodeKind;

/// Build the stable node id `{relative-file-path}:{kind}:{symbol-path}`.
pub fn node_id(relative_path: &str, kind: NodeKind, symbol_path: &str) -> String {
    format!("{relative_path}:{}:{symbol_path}", kind.as_str())
}

/// Build the dotted symbol-path for a class member, with an optional accessor suffix.
pub fn member_symbol_path(class_name: &str, member_name: &str, accessor: Option<&str>) -> String {
    match accessor {
        Some(kind) => format!("{class_name}.{member_name}:{kind}"),
        None => format!("{class_name}.{member_name}"),
    }
}

/// Normalise a path to a forward-slash relative path against `root`, for stable,
/// platform-independent node ids and manifest keys.
pub fn relative_to(root: &Path, path: &Path) -> String {
    let rel: PathBuf = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_has_three_colon_separated_parts() {
        let id = node_id("src/a.ts", NodeKind::Function, "show");
        assert_eq!(id, "src/a.ts:Function:show");
    }

    #[test]
    fn member_symbol_path_without_accessor() {
        assert_eq!(member_symbol_path("UserService", "save", None), "UserService.save");
    }

    #[test]
    fn member_symbol_path_with_accessor() {
        assert_eq!(member_symbol_path("Point", "x", Some("get")), "Point.x:get");
    }

    #[test]
    fn relative_to_normalises_separators() {
        let root = Path::new("/proj");
        let path = Path::new("/proj/src/a.ts");
        assert_eq!(relative_to(root, path), "src/a.ts");
    }
}
