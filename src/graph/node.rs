use serde::{Deserialize, Serialize};

/// The kind of a declared code symbol, per the node-id grammar `{file}:{kind}:{path}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Function,
    Class,
    Method,
    Interface,
    TypeAlias,
    Variable,
    Property,
    File,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Function => "Function",
            NodeKind::Class => "Class",
            NodeKind::Method => "Method",
            NodeKind::Interface => "Interface",
            NodeKind::TypeAlias => "TypeAlias",
            NodeKind::Variable => "Variable",
            NodeKind::Property => "Property",
            NodeKind::File => "File",
        }
    }

    pub fn from_str(s: &str) -> Option<NodeKind> {
        Some(match s {
            "Function" => NodeKind::Function,
            "Class" => NodeKind::Class,
            "Method" => NodeKind::Method,
            "Interface" => NodeKind::Interface,
            "TypeAlias" => NodeKind::TypeAlias,
            "Variable" => NodeKind::Variable,
            "Property" => NodeKind::Property,
            "File" => NodeKind::File,
            _ => return None,
        })
    }
}

/// A single function/method parameter: name plus the type text as written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_text: Option<String>,
    pub optional: bool,
}

/// Kind-specific metadata. Only the fields relevant to a node's `kind` are populated;
/// the rest stay at their default. Kept as a single struct (rather than an enum per
/// kind) so the store's column layout matches §6 directly: one row, several nullable
/// kind-specific columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub extends: Vec<String>,
    pub implements: Vec<String>,
    pub property_type: Option<String>,
    pub optional: bool,
    pub readonly: bool,
    pub is_const: bool,
    pub aliased_type: Option<String>,
}

/// One declared code symbol.
///
/// `id` is the stable identifier `{relative-file-path}:{kind}:{symbol-path}`; see
/// `crate::id::node_id`. Two nodes are the "same" declaration iff their ids match —
/// re-extracting a file replaces its nodes wholesale rather than patching fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub package: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub exported: bool,
    pub content_hash: String,
    pub snippet: String,
    pub metadata: NodeMetadata,
}

impl Node {
    /// Split the node's symbol-path into (class, member) when it describes a class
    /// member (`Class.member`, optionally with a `:get`/`:set` accessor suffix).
    pub fn owning_class(&self) -> Option<&str> {
        let symbol_path = self.id.rsplit(':').next().unwrap_or(&self.name);
        symbol_path.split_once('.').map(|(class, _)| class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_kind_round_trips_through_str() {
        for kind in [
            NodeKind::Function,
            NodeKind::Class,
            NodeKind::Method,
            NodeKind::Interface,
            NodeKind::TypeAlias,
            NodeKind::Variable,
            NodeKind::Property,
            NodeKind::File,
        ] {
            assert_eq!(NodeKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unknown_kind_string_is_none() {
        assert_eq!(NodeKind::from_str("Bogus"), None);
    }

    #[test]
    fn owning_class_splits_dotted_symbol_path() {
        let node = Node {
            id: "src/a.ts:Method:UserService.save".into(),
            kind: NodeKind::Method,
            name: "save".into(),
            package: "root".into(),
            file_path: "src/a.ts".into(),
            start_line: 1,
            end_line: 3,
            exported: true,
            content_hash: "abc".into(),
            snippet: "save() {}".into(),
            metadata: NodeMetadata::default(),
        };
        assert_eq!(node.owning_class(), Some("UserService"));
    }
}
