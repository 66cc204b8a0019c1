use serde::{Deserialize, Serialize};

/// The syntactic role a `REFERENCES` edge was found in (§4.5 second pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceContext {
    Callback,
    Property,
    Array,
    Return,
    Assignment,
    Access,
}

impl ReferenceContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceContext::Callback => "callback",
            ReferenceContext::Property => "property",
            ReferenceContext::Array => "array",
            ReferenceContext::Return => "return",
            ReferenceContext::Assignment => "assignment",
            ReferenceContext::Access => "access",
        }
    }
}

/// Directed, typed relation between two node ids (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Calls,
    Includes,
    Extends,
    Implements,
    Takes,
    Returns,
    HasType,
    HasProperty,
    DerivesFrom,
    AliasFor,
    References,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Calls => "CALLS",
            EdgeKind::Includes => "INCLUDES",
            EdgeKind::Extends => "EXTENDS",
            EdgeKind::Implements => "IMPLEMENTS",
            EdgeKind::Takes => "TAKES",
            EdgeKind::Returns => "RETURNS",
            EdgeKind::HasType => "HAS_TYPE",
            EdgeKind::HasProperty => "HAS_PROPERTY",
            EdgeKind::DerivesFrom => "DERIVES_FROM",
            EdgeKind::AliasFor => "ALIAS_FOR",
            EdgeKind::References => "REFERENCES",
        }
    }

    pub fn from_str(s: &str) -> Option<EdgeKind> {
        Some(match s {
            "CALLS" => EdgeKind::Calls,
            "INCLUDES" => EdgeKind::Includes,
            "EXTENDS" => EdgeKind::Extends,
            "IMPLEMENTS" => EdgeKind::Implements,
            "TAKES" => EdgeKind::Takes,
            "RETURNS" => EdgeKind::Returns,
            "HAS_TYPE" => EdgeKind::HasType,
            "HAS_PROPERTY" => EdgeKind::HasProperty,
            "DERIVES_FROM" => EdgeKind::DerivesFrom,
            "ALIAS_FOR" => EdgeKind::AliasFor,
            "REFERENCES" => EdgeKind::References,
            _ => return None,
        })
    }

    /// Default traversal set for the unified query resolver (§4.9).
    pub fn default_traversal_set() -> &'static [EdgeKind] {
        &[
            EdgeKind::Calls,
            EdgeKind::Includes,
            EdgeKind::Extends,
            EdgeKind::Implements,
            EdgeKind::Takes,
            EdgeKind::Returns,
            EdgeKind::HasType,
            EdgeKind::HasProperty,
            EdgeKind::DerivesFrom,
            EdgeKind::AliasFor,
            EdgeKind::References,
        ]
    }

    /// `CALLS`/`INCLUDES` are the only kinds that aggregate call-site ranges and counts.
    pub fn carries_call_sites(&self) -> bool {
        matches!(self, EdgeKind::Calls | EdgeKind::Includes)
    }
}

/// A 1-based inclusive source line range where a call/JSX-inclusion occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub call_sites: Vec<CallSite>,
    pub call_count: u32,
    pub context: Option<ReferenceContext>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            call_sites: Vec::new(),
            call_count: 0,
            context: None,
        }
    }

    pub fn with_call_site(mut self, start: u32, end: u32) -> Self {
        self.call_sites.push(CallSite { start, end });
        self.call_count += 1;
        self
    }

    pub fn with_context(mut self, context: ReferenceContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Merge `other` into `self`, aggregating call-site ranges/count (same triple).
    pub fn merge(&mut self, other: &Edge) {
        self.call_sites.extend(other.call_sites.iter().copied());
        self.call_count += other.call_count;
    }

    pub fn triple(&self) -> (String, String, &'static str) {
        (self.source.clone(), self.target.clone(), self.kind.as_str())
    }
}
