//! Cypher query engine over an in-process property graph.
//!
//! Provides a Cypher query parser, planner, and executor that runs against any
//! store implementing [`model::GraphSnapshot`] / [`model::GraphStore`], plus an
//! in-memory reference store in [`model::memory`].
//!
//! # Quick Start
//!
//! ```ignore
//! use cypher_graph::{prepare, Params};
//!
//! let query = prepare("MATCH (n)-[:1]->(m) RETURN n, m LIMIT 10").unwrap();
//! let rows: Vec<_> = query
//!     .execute_streaming(&snapshot, &Params::new())
//!     .collect::<Result<_>>()
//!     .unwrap();
//! ```
//!
//! # Supported Cypher
//!
//! - `RETURN` / `WITH` / `UNWIND` / `FOREACH`
//! - `MATCH` / `OPTIONAL MATCH` over node, relationship, and variable-length patterns
//! - `CREATE` / `MERGE ... ON CREATE SET ... ON MATCH SET ...`
//! - `SET` / `REMOVE` / `DELETE` / `DETACH DELETE`
//! - `CALL ... YIELD` procedure invocation
//! - `UNION` / `UNION ALL`
//! - `EXPLAIN <query>` - show the compiled plan without executing it
//!
//! # Architecture
//!
//! - `parser::Parser` - parses Cypher syntax into an AST
//! - `query_api::prepare` - compiles the AST into an operator tree
//! - `executor::run` - evaluates the operator tree over materialized rows
//! - `evaluator` - evaluates expressions (WHERE, RETURN, function calls)
//! - `model` - the storage-facing traits and the in-memory reference store

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod facade;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod query_api;

pub use error::{Error, Result};
pub use executor::{
    NodeValue, PathValue, ReifiedPathValue, RelationshipValue, Row, Value, WriteStats,
    WriteableGraph,
};
pub use facade::{
    EdgeKey, ExternalId, GraphSnapshot, GraphStore, InternalNodeId, LabelId, PropertyValue,
    QueryExt, RelTypeId, query_collect,
};
pub use query_api::{Params, PreparedQuery, prepare};

/// Parses a Cypher query string into an AST.
///
/// This is a low-level API. Most users should use [`prepare()`] instead,
/// which handles both parsing and planning.
pub fn parse(cypher: &str) -> Result<ast::Query> {
    parser::Parser::parse(cypher)
}
