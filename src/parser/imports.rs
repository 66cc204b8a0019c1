//! Import/export statement extraction (feeds §4.3 Import Resolver).
//!
//! Grounded on the teacher's `src/parser/imports.rs` tree-sitter query shapes,
//! extended so every export form the spec names (`named`, `default`, `star`,
//! `default-as-named`, `named-as-default`, `namespace re-export`) carries the
//! alias information the re-export chain walker needs.

use std::sync::OnceLock;

use tree_sitter::{Language, Node, Query, QueryCursor, StreamingIterator, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Esm,
    Cjs,
    DynamicImport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    /// Local binding name used in this file.
    pub local: String,
    /// Name as declared in the source module (`None` for default/namespace imports).
    pub imported: Option<String>,
    pub is_default: bool,
    pub is_namespace: bool,
    /// `import type { X }` or `import { type X }` — excluded from value-reference
    /// maps by default, included when resolving type-reference edges (§4.3).
    pub type_only: bool,
}

#[derive(Debug, Clone)]
pub struct ImportInfo {
    pub kind: ImportKind,
    pub module_path: String,
    pub specifiers: Vec<ImportSpecifier>,
    /// `import type ... from '...'` — the whole statement is type-only.
    pub type_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// `export { x }`, `export { x as y }`.
    Named,
    /// `export default <expr>`.
    Default,
    /// `export { x } from './m'`, `export { x as y } from './m'`.
    ReExport,
    /// `export * from './m'` (no binding — barrel passthrough).
    ReExportAll,
    /// `export * as N from './m'` (namespace re-export).
    ReExportNamespace,
    /// `export { default } from './m'` / `export { default as y } from './m'`.
    ReExportDefault,
}

/// One exported name, with its local/original pairing for alias resolution.
#[derive(Debug, Clone)]
pub struct ExportSpecifier {
    /// Name as it exists in the source scope (or in the re-exported module).
    pub local: String,
    /// Name visible to importers (`export { x as y }` → `y`).
    pub exported: String,
}

#[derive(Debug, Clone)]
pub struct ExportInfo {
    pub kind: ExportKind,
    pub specifiers: Vec<ExportSpecifier>,
    /// Source module for re-export kinds.
    pub source: Option<String>,
    /// Namespace binding name for `export * as N from '...'`.
    pub namespace_name: Option<String>,
}

const IMPORT_QUERY: &str = r#"
    (import_statement
      source: (string (string_fragment) @module_path)) @import
"#;

const REQUIRE_QUERY: &str = r#"
    (call_expression
      function: (identifier) @fn
      arguments: (arguments (string (string_fragment) @module_path)))
"#;

const DYNAMIC_IMPORT_QUERY: &str = r#"
    (call_expression
      function: (import)
      arguments: (arguments (string (string_fragment) @module_path))) @dynamic_import
"#;

const EXPORT_QUERY: &str = r#"
    (export_statement) @export_stmt
"#;

static IMPORT_QUERY_CACHE: OnceLock<Query> = OnceLock::new();
static REQUIRE_QUERY_CACHE: OnceLock<Query> = OnceLock::new();
static DYNAMIC_IMPORT_QUERY_CACHE: OnceLock<Query> = OnceLock::new();
static EXPORT_QUERY_CACHE: OnceLock<Query> = OnceLock::new();

fn import_query(language: &Language) -> &'static Query {
    IMPORT_QUERY_CACHE.get_or_init(|| Query::new(language, IMPORT_QUERY).expect("invalid import query"))
}
fn require_query(language: &Language) -> &'static Query {
    REQUIRE_QUERY_CACHE.get_or_init(|| Query::new(language, REQUIRE_QUERY).expect("invalid require query"))
}
fn dynamic_import_query(language: &Language) -> &'static Query {
    DYNAMIC_IMPORT_QUERY_CACHE
        .get_or_init(|| Query::new(language, DYNAMIC_IMPORT_QUERY).expect("invalid dynamic import query"))
}
fn export_query(language: &Language) -> &'static Query {
    EXPORT_QUERY_CACHE.get_or_init(|| Query::new(language, EXPORT_QUERY).expect("invalid export query"))
}

fn node_text<'a>(node: Node<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn is_type_only_clause(node: Node, source: &[u8]) -> bool {
    // `import type ... from '...'`: the `type` keyword sits as a direct child
    // between `import` and the clause.
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .any(|c| c.kind() == "type" && node_text(c, source) == "type")
}

fn extract_import_clause(clause_node: Node, source: &[u8], specifiers: &mut Vec<ImportSpecifier>) {
    let mut cursor = clause_node.walk();
    for child in clause_node.children(&mut cursor) {
        match child.kind() {
            "identifier" => specifiers.push(ImportSpecifier {
                local: node_text(child, source).to_owned(),
                imported: None,
                is_default: true,
                is_namespace: false,
                type_only: false,
            }),
            "named_imports" => extract_named_imports(child, source, specifiers),
            "namespace_import" => {
                if let Some(name) = extract_namespace_import_name(child, source) {
                    specifiers.push(ImportSpecifier {
                        local: name,
                        imported: None,
                        is_default: false,
                        is_namespace: true,
                        type_only: false,
                    });
                }
            }
            _ => {}
        }
    }
}

fn extract_namespace_import_name(ns_node: Node, source: &[u8]) -> Option<String> {
    let mut cursor = ns_node.walk();
    ns_node
        .children(&mut cursor)
        .find(|c| c.kind() == "identifier")
        .map(|c| node_text(c, source).to_owned())
}

fn extract_named_imports(named_imports_node: Node, source: &[u8], specifiers: &mut Vec<ImportSpecifier>) {
    let mut cursor = named_imports_node.walk();
    for child in named_imports_node.children(&mut cursor) {
        if child.kind() != "import_specifier" {
            continue;
        }
        let type_only = is_type_only_clause(child, source);
        let name_node = child.child_by_field_name("name");
        let alias_node = child.child_by_field_name("alias");
        match (name_node, alias_node) {
            (Some(n), Some(a)) => specifiers.push(ImportSpecifier {
                local: node_text(a, source).to_owned(),
                imported: Some(node_text(n, source).to_owned()),
                is_default: false,
                is_namespace: false,
                type_only,
            }),
            (Some(n), None) => specifiers.push(ImportSpecifier {
                local: node_text(n, source).to_owned(),
                imported: Some(node_text(n, source).to_owned()),
                is_default: false,
                is_namespace: false,
                type_only,
            }),
            _ => {}
        }
    }
}

fn find_require_binding(call_node: Node, source: &[u8]) -> Option<String> {
    let mut current = call_node.parent();
    while let Some(n) = current {
        if n.kind() == "variable_declarator" {
            return n
                .child_by_field_name("name")
                .map(|name_node| node_text(name_node, source).to_owned());
        }
        current = n.parent();
    }
    None
}

pub fn extract_imports(tree: &Tree, source: &[u8], language: &Language) -> Vec<ImportInfo> {
    let mut imports = Vec::new();

    {
        let query = import_query(language);
        let module_path_idx = query.capture_index_for_name("module_path").unwrap();
        let import_idx = query.capture_index_for_name("import").unwrap();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);
        while let Some(m) = matches.next() {
            let mut import_node: Option<Node> = None;
            let mut module_path: Option<String> = None;
            for capture in m.captures {
                if capture.index == import_idx {
                    import_node = Some(capture.node);
                } else if capture.index == module_path_idx {
                    module_path = Some(node_text(capture.node, source).to_owned());
                }
            }
            if let (Some(imp_node), Some(path)) = (import_node, module_path) {
                let type_only = is_type_only_clause(imp_node, source);
                let mut specifiers = Vec::new();
                extract_import_clause_from_statement(imp_node, source, &mut specifiers);
                if type_only {
                    for s in &mut specifiers {
                        s.type_only = true;
                    }
                }
                imports.push(ImportInfo { kind: ImportKind::Esm, module_path: path, specifiers, type_only });
            }
        }
    }

    {
        let query = require_query(language);
        let module_path_idx = match query.capture_index_for_name("module_path") {
            Some(idx) => idx,
            None => return imports,
        };
        let fn_idx = query.capture_index_for_name("fn");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);
        while let Some(m) = matches.next() {
            let mut module_path: Option<String> = None;
            let mut call_node: Option<Node> = None;
            let mut fn_name: Option<String> = None;
            for capture in m.captures {
                if capture.index == module_path_idx {
                    module_path = Some(node_text(capture.node, source).to_owned());
                    call_node = Some(capture.node);
                } else if fn_idx == Some(capture.index) {
                    fn_name = Some(node_text(capture.node, source).to_owned());
                }
            }
            if fn_name.as_deref() != Some("require") {
                continue;
            }
            if let Some(path) = module_path {
                let call_expr = call_node.and_then(|n| {
                    let mut c = Some(n);
                    while let Some(node) = c {
                        if node.kind() == "call_expression" {
                            return Some(node);
                        }
                        c = node.parent();
                    }
                    None
                });
                let mut specifiers = Vec::new();
                if let Some(call) = call_expr
                    && let Some(binding) = find_require_binding(call, source)
                {
                    specifiers.push(ImportSpecifier {
                        local: binding,
                        imported: None,
                        is_default: false,
                        is_namespace: false,
                        type_only: false,
                    });
                }
                imports.push(ImportInfo { kind: ImportKind::Cjs, module_path: path, specifiers, type_only: false });
            }
        }
    }

    {
        let query = dynamic_import_query(language);
        let module_path_idx = query.capture_index_for_name("module_path").unwrap();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source);
        while let Some(m) = matches.next() {
            for capture in m.captures {
                if capture.index == module_path_idx {
                    imports.push(ImportInfo {
                        kind: ImportKind::DynamicImport,
                        module_path: node_text(capture.node, source).to_owned(),
                        specifiers: Vec::new(),
                        type_only: false,
                    });
                }
            }
        }
    }

    imports
}

fn extract_import_clause_from_statement(import_node: Node, source: &[u8], specifiers: &mut Vec<ImportSpecifier>) {
    let mut cursor = import_node.walk();
    for child in import_node.children(&mut cursor) {
        match child.kind() {
            "import_clause" => extract_import_clause(child, source, specifiers),
            "namespace_import" => {
                if let Some(name) = extract_namespace_import_name(child, source) {
                    specifiers.push(ImportSpecifier {
                        local: name,
                        imported: None,
                        is_default: false,
                        is_namespace: true,
                        type_only: false,
                    });
                }
            }
            _ => {}
        }
    }
}

pub fn extract_exports(tree: &Tree, source: &[u8], language: &Language) -> Vec<ExportInfo> {
    let mut exports = Vec::new();
    let query = export_query(language);
    let export_stmt_idx = query.capture_index_for_name("export_stmt").unwrap();

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);
    while let Some(m) = matches.next() {
        for capture in m.captures {
            if capture.index == export_stmt_idx
                && let Some(info) = classify_export(capture.node, source)
            {
                exports.push(info);
            }
        }
    }
    exports
}

fn find_export_source(export_node: Node, source: &[u8]) -> Option<String> {
    let mut cursor = export_node.walk();
    for child in export_node.children(&mut cursor) {
        if child.kind() == "string"
            && let Some(frag) = child.named_child(0)
        {
            return Some(node_text(frag, source).to_owned());
        }
    }
    None
}

fn find_child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

fn extract_export_clause_specifiers(clause_node: Node, source: &[u8]) -> Vec<ExportSpecifier> {
    let mut specs = Vec::new();
    let mut cursor = clause_node.walk();
    for child in clause_node.children(&mut cursor) {
        if child.kind() != "export_specifier" {
            continue;
        }
        let name_node = child.child_by_field_name("name");
        let alias_node = child.child_by_field_name("alias");
        match (name_node, alias_node) {
            (Some(n), Some(a)) => specs.push(ExportSpecifier {
                local: node_text(n, source).to_owned(),
                exported: node_text(a, source).to_owned(),
            }),
            (Some(n), None) => {
                let local = node_text(n, source).to_owned();
                specs.push(ExportSpecifier { local: local.clone(), exported: local });
            }
            _ => {}
        }
    }
    specs
}

fn classify_export(node: Node, source: &[u8]) -> Option<ExportInfo> {
    let source_str = find_export_source(node, source);

    let has_star = (0..node.child_count()).any(|i| node.child(i as u32).map(|c| c.kind() == "*").unwrap_or(false));

    if has_star {
        // `export * from './m'` or `export * as N from './m'`.
        let namespace_name = find_child_of_kind(node, "namespace_export")
            .and_then(|ns| ns.named_child(0))
            .map(|n| node_text(n, source).to_owned());
        return Some(ExportInfo {
            kind: if namespace_name.is_some() { ExportKind::ReExportNamespace } else { ExportKind::ReExportAll },
            specifiers: Vec::new(),
            source: source_str,
            namespace_name,
        });
    }

    if let Some(clause) = find_child_of_kind(node, "export_clause") {
        let specifiers = extract_export_clause_specifiers(clause, source);
        if source_str.is_some() {
            let kind = if specifiers.iter().any(|s| s.local == "default") {
                ExportKind::ReExportDefault
            } else {
                ExportKind::ReExport
            };
            return Some(ExportInfo { kind, specifiers, source: source_str, namespace_name: None });
        }
        return Some(ExportInfo { kind: ExportKind::Named, specifiers, source: None, namespace_name: None });
    }

    let has_default = (0..node.child_count())
        .any(|i| node.child(i as u32).map(|c| node_text(c, source) == "default").unwrap_or(false));
    if has_default {
        return Some(ExportInfo { kind: ExportKind::Default, specifiers: Vec::new(), source: None, namespace_name: None });
    }

    // Inline export (`export function foo() {}`) — symbols.rs captures the declaration itself.
    None
}
