//! Context-aware call-site, type-reference and JSX-inclusion walker (§4.5).
//!
//! The teacher's `parser/relationships.rs` found these with flat, context-free
//! tree-sitter queries. The query resolver needs the *enclosing declaration*
//! for every call/reference, so this is a manual recursive descent instead:
//! it tracks a symbol-path stack as it enters function/method/class bodies and
//! a small per-scope local-alias table for `const f = target; f();` patterns.

use std::collections::HashMap;

use tree_sitter::Node as TsNode;

use crate::graph::ReferenceContext;

#[derive(Debug, Clone)]
pub struct CallMention {
    pub caller_symbol_path: Option<String>,
    /// The base identifier being called (`obj` in `obj.method()`, or the bare
    /// function name for a direct call). Resolution decides whether this
    /// mention targets a local symbol, an imported one, or an external one.
    pub callee_name: String,
    pub member_name: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone)]
pub struct JsxMention {
    pub enclosing_symbol_path: Option<String>,
    pub tag_name: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRole {
    Takes,
    Returns,
    HasType,
    HasProperty,
}

#[derive(Debug, Clone)]
pub struct TypeRefMention {
    pub enclosing_symbol_path: Option<String>,
    pub type_name: String,
    pub role: TypeRole,
}

#[derive(Debug, Clone)]
pub struct ReferenceMention {
    pub enclosing_symbol_path: Option<String>,
    pub name: String,
    pub context: ReferenceContext,
}

/// One named type referenced from a `type` declaration's right-hand side (§4.5
/// "Inheritance edges" sibling — type-alias composition). `is_composition` is
/// true when the RHS is a union/intersection of two or more members (→
/// `DERIVES_FROM`); false for a single named type (→ `ALIAS_FOR`).
#[derive(Debug, Clone)]
pub struct AliasRefMention {
    pub alias_name: String,
    pub type_name: String,
    pub is_composition: bool,
}

#[derive(Debug, Default)]
pub struct WalkResult {
    pub calls: Vec<CallMention>,
    pub jsx: Vec<JsxMention>,
    pub type_refs: Vec<TypeRefMention>,
    pub references: Vec<ReferenceMention>,
    pub alias_refs: Vec<AliasRefMention>,
}

/// Type names that never resolve to a declared node — skipped outright.
const PRIMITIVE_TYPES: &[&str] = &[
    "string", "number", "boolean", "void", "any", "unknown", "never", "object", "null", "undefined", "bigint",
    "symbol", "this",
];

/// Generic wrapper types whose type argument is the interesting part —
/// recurse into the argument instead of emitting an edge to the wrapper itself.
const GENERIC_WRAPPERS: &[&str] = &["Promise", "Array", "ReadonlyArray", "Map", "Set", "WeakMap", "WeakSet"];

struct Walker<'a> {
    source: &'a [u8],
    result: WalkResult,
    /// local name -> aliased target name, one HashMap per lexical scope.
    alias_scopes: Vec<HashMap<String, String>>,
    symbol_stack: Vec<String>,
}

fn node_text<'a>(node: TsNode<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn line_range(node: TsNode) -> (u32, u32) {
    (node.start_position().row as u32 + 1, node.end_position().row as u32 + 1)
}

impl<'a> Walker<'a> {
    fn new(source: &'a [u8]) -> Self {
        Self { source, result: WalkResult::default(), alias_scopes: vec![HashMap::new()], symbol_stack: Vec::new() }
    }

    fn current_symbol(&self) -> Option<String> {
        self.symbol_stack.last().cloned()
    }

    fn resolve_alias(&self, name: &str) -> String {
        for scope in self.alias_scopes.iter().rev() {
            if let Some(target) = scope.get(name) {
                return target.clone();
            }
        }
        name.to_owned()
    }

    fn push_scope(&mut self) {
        self.alias_scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.alias_scopes.pop();
    }

    fn record_alias(&mut self, local: String, target: String) {
        if let Some(scope) = self.alias_scopes.last_mut() {
            scope.insert(local, target);
        }
    }

    fn walk(&mut self, node: TsNode<'a>) {
        match node.kind() {
            "function_declaration" | "method_definition" | "function_expression" | "arrow_function" => {
                self.walk_callable(node);
                return;
            }
            "class_declaration" | "class" => {
                self.walk_class(node);
                return;
            }
            "type_alias_declaration" => {
                self.record_type_alias(node);
                return;
            }
            "call_expression" => self.record_call(node),
            "jsx_element" | "jsx_self_closing_element" => self.record_jsx(node),
            "lexical_declaration" | "variable_declaration" => self.record_local_aliases(node),
            "type_annotation" => self.record_type_annotation(node),
            "identifier" | "shorthand_property_identifier" => self.record_reference(node),
            "statement_block" => {
                self.push_scope();
                self.walk_children(node);
                self.pop_scope();
                return;
            }
            _ => {}
        }
        self.walk_children(node);
    }

    fn walk_children(&mut self, node: TsNode<'a>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child);
        }
    }

    fn walk_callable(&mut self, node: TsNode<'a>) {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, self.source).to_owned())
            .or_else(|| self.symbol_stack.last().cloned())
            .unwrap_or_else(|| "<anonymous>".to_owned());
        let path = match self.symbol_stack.last() {
            Some(parent) if node.kind() == "method_definition" => format!("{parent}.{name}"),
            _ => name,
        };
        self.symbol_stack.push(path);
        self.push_scope();

        if let Some(params) = node.child_by_field_name("parameters") {
            self.record_parameter_types(params);
        }
        if let Some(ret) = node.child_by_field_name("return_type") {
            self.record_return_type(ret);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.walk_children(body);
        }

        self.pop_scope();
        self.symbol_stack.pop();
    }

    fn walk_class(&mut self, node: TsNode<'a>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            self.walk_children(node);
            return;
        };
        let class_name = node_text(name_node, self.source).to_owned();
        self.symbol_stack.push(class_name);
        self.push_scope();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.children(&mut cursor) {
                match member.kind() {
                    "method_definition" => self.walk_callable(member),
                    "public_field_definition" | "property_declaration" => {
                        if let Some(value) = member.child_by_field_name("value") {
                            self.walk(value);
                        }
                        if let Some(ty) = member.child_by_field_name("type") {
                            self.record_type_annotation_with_role(ty, TypeRole::HasProperty);
                        }
                    }
                    "class_static_block" => self.walk_children(member),
                    _ => {}
                }
            }
        }
        self.pop_scope();
        self.symbol_stack.pop();
    }

    fn record_local_aliases(&mut self, node: TsNode<'a>) {
        let mut cursor = node.walk();
        for declarator in node.children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else { continue };
            if name_node.kind() != "identifier" {
                continue;
            }
            let local = node_text(name_node, self.source).to_owned();
            if let Some(value) = declarator.child_by_field_name("value")
                && value.kind() == "identifier"
            {
                let target = node_text(value, self.source).to_owned();
                self.record_alias(local, target);
            }
        }
    }

    fn record_call(&mut self, node: TsNode<'a>) {
        let (start, end) = line_range(node);
        let Some(function_node) = node.child_by_field_name("function") else { return };
        let (callee_name, member_name) = match function_node.kind() {
            "identifier" => (self.resolve_alias(node_text(function_node, self.source)), None),
            "member_expression" => {
                let object = function_node.child_by_field_name("object");
                let property = function_node.child_by_field_name("property");
                let base = object.map(|o| node_text(o, self.source).to_owned()).unwrap_or_default();
                let member = property.map(|p| node_text(p, self.source).to_owned());
                (self.resolve_alias(&base), member)
            }
            _ => return,
        };
        if callee_name.is_empty() {
            return;
        }
        self.result.calls.push(CallMention {
            caller_symbol_path: self.current_symbol(),
            callee_name,
            member_name,
            start_line: start,
            end_line: end,
        });
    }

    fn record_jsx(&mut self, node: TsNode<'a>) {
        let (start, end) = line_range(node);
        let opening = if node.kind() == "jsx_self_closing_element" {
            Some(node)
        } else {
            node.child_by_field_name("open_tag")
        };
        let Some(opening) = opening else { return };
        let Some(name_node) = opening.child_by_field_name("name") else { return };
        let tag_name = node_text(name_node, self.source).to_owned();
        // Lowercase leading char means a DOM intrinsic (`div`, `span`), not a
        // component reference — suppress per §4.5.
        if tag_name.chars().next().is_some_and(|c| c.is_lowercase()) {
            return;
        }
        self.result.jsx.push(JsxMention {
            enclosing_symbol_path: self.current_symbol(),
            tag_name,
            start_line: start,
            end_line: end,
        });
    }

    fn record_parameter_types(&mut self, params_node: TsNode<'a>) {
        let mut cursor = params_node.walk();
        for param in params_node.children(&mut cursor) {
            if let Some(ty) = param.child_by_field_name("type") {
                self.record_type_annotation_with_role(ty, TypeRole::Takes);
            }
        }
    }

    fn record_return_type(&mut self, ret_node: TsNode<'a>) {
        self.record_type_annotation_with_role(ret_node, TypeRole::Returns);
    }

    fn record_type_annotation(&mut self, node: TsNode<'a>) {
        self.record_type_annotation_with_role(node, TypeRole::HasType);
    }

    fn record_type_annotation_with_role(&mut self, node: TsNode<'a>, role: TypeRole) {
        let text = node_text(node, self.source).to_owned();
        for part in split_top_level_union(&text) {
            self.emit_type_names(part, role);
        }
    }

    fn emit_type_names(&mut self, type_text: &str, role: TypeRole) {
        let trimmed = type_text.trim().trim_start_matches(':').trim();
        if trimmed.is_empty() {
            return;
        }
        let base = trimmed.split('<').next().unwrap_or(trimmed).trim();
        let base = base.trim_end_matches("[]").trim();
        if base.is_empty() || PRIMITIVE_TYPES.contains(&base) {
            return;
        }
        if GENERIC_WRAPPERS.contains(&base) {
            if let Some(inner) = trimmed.split_once('<').and_then(|(_, rest)| rest.strip_suffix('>')) {
                for part in split_top_level_union(inner) {
                    self.emit_type_names(part, role);
                }
            }
            return;
        }
        self.result.type_refs.push(TypeRefMention { enclosing_symbol_path: self.current_symbol(), type_name: base.to_owned(), role });
    }

    /// `type T = A & B` / `type T = A | B` / `type T = Foo` — scan the alias's
    /// right-hand side for named-type members. A composed RHS (more than one
    /// union/intersection member) produces `DERIVES_FROM` candidates downstream;
    /// a single named type produces an `ALIAS_FOR` candidate (§3, §4.5).
    fn record_type_alias(&mut self, node: TsNode<'a>) {
        let Some(name_node) = node.child_by_field_name("name") else { return };
        let alias_name = node_text(name_node, self.source).to_owned();
        let Some(value_node) = node.child_by_field_name("value") else { return };
        let text = node_text(value_node, self.source).to_owned();
        let parts = split_top_level_union(&text);
        let is_composition = parts.len() > 1;
        for part in &parts {
            self.emit_alias_member(&alias_name, part, is_composition);
        }
    }

    fn emit_alias_member(&mut self, alias_name: &str, type_text: &str, is_composition: bool) {
        let trimmed = type_text.trim();
        if trimmed.is_empty() {
            return;
        }
        let base = trimmed.split('<').next().unwrap_or(trimmed).trim();
        let base = base.trim_end_matches("[]").trim();
        if base.is_empty() || PRIMITIVE_TYPES.contains(&base) || !is_named_type(base) {
            return;
        }
        self.result.alias_refs.push(AliasRefMention {
            alias_name: alias_name.to_owned(),
            type_name: base.to_owned(),
            is_composition,
        });
    }

    fn record_reference(&mut self, node: TsNode<'a>) {
        let Some(parent) = node.parent() else { return };
        // Declarations and call/member targets are handled by their own visitors;
        // avoid double counting the identifiers that name a declaration itself.
        if matches!(
            parent.kind(),
            "function_declaration" | "class_declaration" | "interface_declaration" | "type_alias_declaration" | "method_definition"
        ) && parent.child_by_field_name("name") == Some(node)
        {
            return;
        }
        let context = match parent.kind() {
            "arguments" => ReferenceContext::Callback,
            "pair" => ReferenceContext::Property,
            "array" => ReferenceContext::Array,
            "return_statement" => ReferenceContext::Return,
            "assignment_expression" | "variable_declarator" => ReferenceContext::Assignment,
            "member_expression" if parent.child_by_field_name("object") == Some(node) => ReferenceContext::Access,
            _ => return,
        };
        let name = node_text(node, self.source).to_owned();
        if name.is_empty() {
            return;
        }
        self.result.references.push(ReferenceMention { enclosing_symbol_path: self.current_symbol(), name, context });
    }
}

/// Whether `s` looks like a single named type (identifier, optionally dotted) rather
/// than an object/tuple/function type literal that happens to fall out of a naive split.
fn is_named_type(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.')
}

/// Split `A | B | C` or `A & B & C` at the top nesting level, dropping
/// `null`/`undefined` union members per §4.5.
fn split_top_level_union(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let bytes = text.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'<' | b'(' | b'[' | b'{' => depth += 1,
            b'>' | b')' | b']' | b'}' => depth -= 1,
            b'|' | b'&' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(text[start..].trim());
    parts
        .into_iter()
        .filter(|p| !p.is_empty() && *p != "null" && *p != "undefined")
        .collect()
}

/// Public entry point: walk a parsed file, collecting call/JSX/type/reference
/// mentions keyed by raw identifier text (resolution happens downstream).
pub fn walk_file(tree: &tree_sitter::Tree, source: &[u8]) -> WalkResult {
    let mut walker = Walker::new(source);
    walker.walk(tree.root_node());
    walker.result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::languages::language_for_extension;

    fn parse(source: &str, ext: &str) -> tree_sitter::Tree {
        let lang = language_for_extension(ext).unwrap();
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&lang).unwrap();
        parser.parse(source.as_bytes(), None).unwrap()
    }

    #[test]
    fn direct_call_inside_function_has_caller_symbol() {
        let src = "function outer() { inner(); }";
        let tree = parse(src, "ts");
        let result = walk_file(&tree, src.as_bytes());
        assert_eq!(result.calls.len(), 1);
        assert_eq!(result.calls[0].caller_symbol_path.as_deref(), Some("outer"));
        assert_eq!(result.calls[0].callee_name, "inner");
    }

    #[test]
    fn method_call_records_object_and_member() {
        let src = "function outer() { service.save(); }";
        let tree = parse(src, "ts");
        let result = walk_file(&tree, src.as_bytes());
        assert_eq!(result.calls[0].callee_name, "service");
        assert_eq!(result.calls[0].member_name.as_deref(), Some("save"));
    }

    #[test]
    fn aliased_local_call_resolves_through_alias_table() {
        let src = "function outer() { const f = target; f(); }";
        let tree = parse(src, "ts");
        let result = walk_file(&tree, src.as_bytes());
        assert!(result.calls.iter().any(|c| c.callee_name == "target"));
    }

    #[test]
    fn lowercase_jsx_tag_is_suppressed() {
        let src = "function Comp() { return <div><Widget /></div>; }";
        let tree = parse(src, "tsx");
        let result = walk_file(&tree, src.as_bytes());
        assert!(result.jsx.iter().any(|j| j.tag_name == "Widget"));
        assert!(!result.jsx.iter().any(|j| j.tag_name == "div"));
    }

    #[test]
    fn parameter_type_reference_recorded() {
        let src = "function save(user: User): Promise<Result> {}";
        let tree = parse(src, "ts");
        let result = walk_file(&tree, src.as_bytes());
        assert!(result.type_refs.iter().any(|t| t.type_name == "User" && t.role == TypeRole::Takes));
        assert!(result.type_refs.iter().any(|t| t.type_name == "Result" && t.role == TypeRole::Returns));
    }

    #[test]
    fn primitive_return_type_is_skipped() {
        let src = "function isValid(): boolean { return true; }";
        let tree = parse(src, "ts");
        let result = walk_file(&tree, src.as_bytes());
        assert!(result.type_refs.is_empty());
    }

    #[test]
    fn union_type_splits_into_member_edges() {
        let src = "function pick(): Foo | Bar { return null; }";
        let tree = parse(src, "ts");
        let result = walk_file(&tree, src.as_bytes());
        let names: Vec<_> = result.type_refs.iter().map(|t| t.type_name.as_str()).collect();
        assert!(names.contains(&"Foo"));
        assert!(names.contains(&"Bar"));
    }

    #[test]
    fn direct_type_alias_is_not_a_composition() {
        let src = "type FooAlias = Foo;";
        let tree = parse(src, "ts");
        let result = walk_file(&tree, src.as_bytes());
        assert_eq!(result.alias_refs.len(), 1);
        assert_eq!(result.alias_refs[0].type_name, "Foo");
        assert!(!result.alias_refs[0].is_composition);
    }

    #[test]
    fn union_type_alias_emits_one_member_per_composition() {
        let src = "type Combo = Foo | Bar;";
        let tree = parse(src, "ts");
        let result = walk_file(&tree, src.as_bytes());
        assert_eq!(result.alias_refs.len(), 2);
        assert!(result.alias_refs.iter().all(|r| r.is_composition));
        let names: Vec<_> = result.alias_refs.iter().map(|r| r.type_name.as_str()).collect();
        assert!(names.contains(&"Foo"));
        assert!(names.contains(&"Bar"));
    }

    #[test]
    fn intersection_type_alias_is_a_composition() {
        let src = "type Combo = Foo & Bar;";
        let tree = parse(src, "ts");
        let result = walk_file(&tree, src.as_bytes());
        assert_eq!(result.alias_refs.len(), 2);
        assert!(result.alias_refs.iter().all(|r| r.is_composition));
    }

    #[test]
    fn object_literal_type_alias_emits_no_alias_refs() {
        let src = "type Point = { x: number; y: number };";
        let tree = parse(src, "ts");
        let result = walk_file(&tree, src.as_bytes());
        assert!(result.alias_refs.is_empty());
    }
}
