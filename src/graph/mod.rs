//! Data model (§3) and Graph Store (§6): `Node`/`Edge` types plus the SQLite-backed
//! persistence layer. Replaces the teacher's in-memory `petgraph::StableGraph` with a
//! relational store, since the spec requires on-disk, join-queryable, per-file
//! transactional nodes/edges rather than a single in-process graph object.

pub mod edge;
pub mod node;
pub mod snippet;
pub mod store;

pub use edge::{CallSite, Edge, EdgeKind, ReferenceContext};
pub use node::{Node, NodeKind, NodeMetadata, Parameter};
