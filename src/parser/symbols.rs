//! Declaration extraction: turns a parsed tree into the symbol-shaped
//! intermediate the ingestion pipeline later promotes into `graph::Node`s.
//!
//! Grounded on the teacher's `src/parser/symbols.rs` query/capture shapes
//! (`SYMBOL_QUERY_*`, `detect_export`, `contains_jsx`, class/interface child
//! walking); generalised to carry the richer metadata (parameters, return
//! types, heritage clauses, accessors) that `graph::NodeMetadata` models.

use std::sync::OnceLock;

use tree_sitter::{Language, Node as TsNode, Query, QueryCursor, StreamingIterator, Tree};

use crate::graph::{NodeKind, NodeMetadata, Parameter};

/// One declared symbol before it has an id, package, snippet or content hash.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: NodeKind,
    pub name: String,
    /// Dotted symbol-path component used in the node id (`Class.member[:accessor]`
    /// for members, otherwise just `name`).
    pub symbol_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub exported: bool,
    pub metadata: NodeMetadata,
}

const SYMBOL_QUERY: &str = r#"
    (function_declaration
      name: (identifier) @name) @function

    (class_declaration
      name: (type_identifier) @name) @class

    (interface_declaration
      name: (type_identifier) @name) @interface

    (type_alias_declaration
      name: (type_identifier) @name) @type_alias

    (lexical_declaration
      (variable_declarator
        name: (identifier) @name) @declarator) @variable_decl
"#;

static SYMBOL_QUERY_CACHE: OnceLock<Query> = OnceLock::new();

fn symbol_query(language: &Language) -> &'static Query {
    SYMBOL_QUERY_CACHE.get_or_init(|| Query::new(language, SYMBOL_QUERY).expect("invalid symbol query"))
}

fn node_text<'a>(node: TsNode<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn line_range(node: TsNode) -> (u32, u32) {
    (node.start_position().row as u32 + 1, node.end_position().row as u32 + 1)
}

/// Walk upward from a declaration node looking for an enclosing `export_statement`,
/// reporting whether it's exported and whether it's the `export default` form.
fn detect_export(node: TsNode) -> (bool, bool) {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == "export_statement" {
            let mut cursor = n.walk();
            let is_default = n.children(&mut cursor).any(|c| c.kind() == "default");
            return (true, is_default);
        }
        if !matches!(n.kind(), "lexical_declaration" | "variable_declaration") {
            break;
        }
        current = n.parent();
    }
    (false, false)
}

fn contains_jsx(node: TsNode) -> bool {
    if matches!(node.kind(), "jsx_element" | "jsx_fragment" | "jsx_self_closing_element") {
        return true;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if contains_jsx(child) {
            return true;
        }
    }
    false
}

fn extract_type_text(node: TsNode, source: &[u8]) -> Option<String> {
    let text = node_text(node, source).trim();
    Some(text.trim_start_matches(':').trim().to_owned())
}

fn extract_parameters(params_node: TsNode, source: &[u8]) -> Vec<Parameter> {
    let mut params = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        let (pattern_node, type_node, optional_marker, has_default) = match child.kind() {
            "required_parameter" | "optional_parameter" => {
                let pattern = child.child_by_field_name("pattern");
                let ty = child.child_by_field_name("type");
                let optional = child.kind() == "optional_parameter";
                let default = child.child_by_field_name("value").is_some();
                (pattern, ty, optional, default)
            }
            "identifier" => (Some(child), None, false, false),
            "assignment_pattern" => {
                let left = child.child_by_field_name("left");
                (left, None, false, true)
            }
            _ => continue,
        };
        let Some(pattern) = pattern_node else { continue };
        let name = node_text(pattern, source).to_owned();
        if name.is_empty() {
            continue;
        }
        let type_text = type_node.and_then(|t| extract_type_text(t, source));
        params.push(Parameter { name, type_text, optional: optional_marker || has_default });
    }
    params
}

fn extract_return_type(decl_node: TsNode, source: &[u8]) -> Option<String> {
    decl_node.child_by_field_name("return_type").and_then(|n| extract_type_text(n, source))
}

fn extract_heritage(class_node: TsNode, source: &[u8]) -> (Vec<String>, Vec<String>) {
    let mut extends = Vec::new();
    let mut implements = Vec::new();
    let Some(heritage) = class_node.child_by_field_name("heritage").or_else(|| {
        let mut cursor = class_node.walk();
        class_node.children(&mut cursor).find(|c| c.kind() == "class_heritage")
    }) else {
        return (extends, implements);
    };

    let mut cursor = heritage.walk();
    for clause in heritage.children(&mut cursor) {
        match clause.kind() {
            "extends_clause" => {
                let mut c2 = clause.walk();
                for value in clause.children(&mut c2) {
                    if matches!(value.kind(), "identifier" | "member_expression" | "generic_type" | "type_identifier") {
                        extends.push(node_text(value, source).to_owned());
                    }
                }
            }
            "implements_clause" => {
                let mut c2 = clause.walk();
                for value in clause.children(&mut c2) {
                    if matches!(value.kind(), "type_identifier" | "generic_type") {
                        implements.push(node_text(value, source).to_owned());
                    }
                }
            }
            // plain JS `class_heritage` has no wrapper clause, just an identifier child.
            "identifier" => extends.push(node_text(clause, source).to_owned()),
            _ => {}
        }
    }
    (extends, implements)
}

fn extract_interface_extends(iface_node: TsNode, source: &[u8]) -> Vec<String> {
    let mut extends = Vec::new();
    let mut cursor = iface_node.walk();
    for child in iface_node.children(&mut cursor) {
        if child.kind() == "extends_type_clause" {
            let mut c2 = child.walk();
            for value in child.children(&mut c2) {
                if matches!(value.kind(), "type_identifier" | "generic_type") {
                    extends.push(node_text(value, source).to_owned());
                }
            }
        }
    }
    extends
}

/// Walk a `class_body`, emitting one `Declaration` per method/property/accessor.
fn extract_class_children(class_body: TsNode, source: &[u8], class_name: &str) -> Vec<Declaration> {
    let mut out = Vec::new();
    let mut cursor = class_body.walk();
    for member in class_body.children(&mut cursor) {
        match member.kind() {
            "method_definition" => {
                let Some(name_node) = member.child_by_field_name("name") else { continue };
                let name = node_text(name_node, source).to_owned();
                let accessor = {
                    let mut c2 = member.walk();
                    member
                        .children(&mut c2)
                        .find(|c| matches!(node_text(*c, source), "get" | "set"))
                        .map(|c| node_text(c, source).to_owned())
                };
                let symbol_path = crate::id::member_symbol_path(class_name, &name, accessor.as_deref());
                let params = member
                    .child_by_field_name("parameters")
                    .map(|p| extract_parameters(p, source))
                    .unwrap_or_default();
                let (start, end) = line_range(member);
                out.push(Declaration {
                    kind: NodeKind::Method,
                    name,
                    symbol_path,
                    start_line: start,
                    end_line: end,
                    exported: false,
                    metadata: NodeMetadata {
                        parameters: params,
                        return_type: extract_return_type(member, source),
                        ..Default::default()
                    },
                });
            }
            "public_field_definition" | "property_declaration" => {
                let Some(name_node) = member.child_by_field_name("name") else { continue };
                let name = node_text(name_node, source).to_owned();
                let symbol_path = crate::id::member_symbol_path(class_name, &name, None);
                let readonly = {
                    let mut c2 = member.walk();
                    member.children(&mut c2).any(|c| node_text(c, source) == "readonly")
                };
                let optional = {
                    let mut c2 = member.walk();
                    member.children(&mut c2).any(|c| c.kind() == "?")
                };
                let property_type = member.child_by_field_name("type").and_then(|t| extract_type_text(t, source));
                let (start, end) = line_range(member);
                out.push(Declaration {
                    kind: NodeKind::Property,
                    name,
                    symbol_path,
                    start_line: start,
                    end_line: end,
                    exported: false,
                    metadata: NodeMetadata { property_type, optional, readonly, ..Default::default() },
                });
            }
            _ => {}
        }
    }
    out
}

fn extract_interface_children(iface_body: TsNode, source: &[u8], iface_name: &str) -> Vec<Declaration> {
    let mut out = Vec::new();
    let mut cursor = iface_body.walk();
    for member in iface_body.children(&mut cursor) {
        match member.kind() {
            "property_signature" => {
                let Some(name_node) = member.child_by_field_name("name") else { continue };
                let name = node_text(name_node, source).to_owned();
                let symbol_path = crate::id::member_symbol_path(iface_name, &name, None);
                let optional = {
                    let mut c2 = member.walk();
                    member.children(&mut c2).any(|c| c.kind() == "?")
                };
                let readonly = {
                    let mut c2 = member.walk();
                    member.children(&mut c2).any(|c| node_text(c, source) == "readonly")
                };
                let property_type = member.child_by_field_name("type").and_then(|t| extract_type_text(t, source));
                let (start, end) = line_range(member);
                out.push(Declaration {
                    kind: NodeKind::Property,
                    name,
                    symbol_path,
                    start_line: start,
                    end_line: end,
                    exported: false,
                    metadata: NodeMetadata { property_type, optional, readonly, ..Default::default() },
                });
            }
            "method_signature" => {
                let Some(name_node) = member.child_by_field_name("name") else { continue };
                let name = node_text(name_node, source).to_owned();
                let symbol_path = crate::id::member_symbol_path(iface_name, &name, None);
                let params = member
                    .child_by_field_name("parameters")
                    .map(|p| extract_parameters(p, source))
                    .unwrap_or_default();
                let (start, end) = line_range(member);
                out.push(Declaration {
                    kind: NodeKind::Method,
                    name,
                    symbol_path,
                    start_line: start,
                    end_line: end,
                    exported: false,
                    metadata: NodeMetadata {
                        parameters: params,
                        return_type: member.child_by_field_name("return_type").and_then(|t| extract_type_text(t, source)),
                        ..Default::default()
                    },
                });
            }
            _ => {}
        }
    }
    out
}

/// Extract every top-level-or-class-member declaration from a parsed tree.
/// Returns `(declaration, children)` pairs — children are class/interface members,
/// emitted alongside (not nested inside) their parent in the final node list.
pub fn extract_symbols(
    tree: &Tree,
    source: &[u8],
    language: &Language,
    is_tsx: bool,
) -> Vec<(Declaration, Vec<Declaration>)> {
    let query = symbol_query(language);
    let name_idx = query.capture_index_for_name("name").unwrap();

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);
    while let Some(m) = matches.next() {
        let mut name: Option<String> = None;
        let mut decl_node: Option<TsNode> = None;
        let mut declarator_node: Option<TsNode> = None;
        let mut tag: Option<&str> = None;
        for capture in m.captures {
            let capture_name = &query.capture_names()[capture.index as usize];
            if capture.index == name_idx {
                name = Some(node_text(capture.node, source).to_owned());
            } else if *capture_name == "declarator" {
                declarator_node = Some(capture.node);
            } else {
                decl_node = Some(capture.node);
                tag = Some(capture_name);
            }
        }
        let (Some(name), Some(decl_node), Some(tag)) = (name, decl_node, tag) else { continue };
        let (start, end) = line_range(decl_node);
        if !seen.insert((name.clone(), start)) {
            continue;
        }
        let (exported, is_default) = detect_export(decl_node);
        let effective_name = if is_default && name.is_empty() { "default".to_owned() } else { name };

        match tag {
            "function" => {
                let params = decl_node
                    .child_by_field_name("parameters")
                    .map(|p| extract_parameters(p, source))
                    .unwrap_or_default();
                out.push((
                    Declaration {
                        kind: NodeKind::Function,
                        name: effective_name.clone(),
                        symbol_path: effective_name,
                        start_line: start,
                        end_line: end,
                        exported,
                        metadata: NodeMetadata {
                            parameters: params,
                            return_type: extract_return_type(decl_node, source),
                            ..Default::default()
                        },
                    },
                    Vec::new(),
                ));
            }
            "class" => {
                let (extends, implements) = extract_heritage(decl_node, source);
                let children = decl_node
                    .child_by_field_name("body")
                    .map(|b| extract_class_children(b, source, &effective_name))
                    .unwrap_or_default();
                out.push((
                    Declaration {
                        kind: NodeKind::Class,
                        name: effective_name.clone(),
                        symbol_path: effective_name,
                        start_line: start,
                        end_line: end,
                        exported,
                        metadata: NodeMetadata { extends, implements, ..Default::default() },
                    },
                    children,
                ));
            }
            "interface" => {
                let extends = extract_interface_extends(decl_node, source);
                let children = decl_node
                    .child_by_field_name("body")
                    .map(|b| extract_interface_children(b, source, &effective_name))
                    .unwrap_or_default();
                out.push((
                    Declaration {
                        kind: NodeKind::Interface,
                        name: effective_name.clone(),
                        symbol_path: effective_name,
                        start_line: start,
                        end_line: end,
                        exported,
                        metadata: NodeMetadata { extends, ..Default::default() },
                    },
                    children,
                ));
            }
            "type_alias" => {
                let aliased_type = decl_node.child_by_field_name("value").map(|v| node_text(v, source).to_owned());
                out.push((
                    Declaration {
                        kind: NodeKind::TypeAlias,
                        name: effective_name.clone(),
                        symbol_path: effective_name,
                        start_line: start,
                        end_line: end,
                        exported,
                        metadata: NodeMetadata { aliased_type, ..Default::default() },
                    },
                    Vec::new(),
                ));
            }
            "variable_decl" => {
                let Some(declarator) = declarator_node else { continue };
                let value = declarator.child_by_field_name("value");
                let is_function_like = value.is_some_and(|v| matches!(v.kind(), "arrow_function" | "function_expression"));

                if is_function_like {
                    // is_tsx is accepted for symmetry with the caller's per-file grammar
                    // selection; JSX detection only matters once components get their own
                    // node kind, which the data model does not currently distinguish.
                    let _ = is_tsx && value.is_some_and(contains_jsx);
                    out.push((
                        Declaration {
                            kind: NodeKind::Function,
                            name: effective_name.clone(),
                            symbol_path: effective_name,
                            start_line: start,
                            end_line: end,
                            exported,
                            metadata: NodeMetadata::default(),
                        },
                        Vec::new(),
                    ));
                    continue;
                }

                if !exported {
                    continue;
                }
                let is_const = node_text(decl_node, source).trim_start().starts_with("const");
                out.push((
                    Declaration {
                        kind: NodeKind::Variable,
                        name: effective_name.clone(),
                        symbol_path: effective_name,
                        start_line: start,
                        end_line: end,
                        exported,
                        metadata: NodeMetadata { is_const, ..Default::default() },
                    },
                    Vec::new(),
                ));
            }
            _ => {}
        }
    }

    out
}
