//! Query execution: a small operator algebra evaluated over materialized
//! row vectors.
//!
//! The compiler (in [`crate::query_api`]) lowers a parsed statement into a
//! tree of [`Op`] nodes. [`run`] walks that tree recursively: every operator
//! consumes its input rows and produces a new row vector. Read and write
//! operators share one executor — an [`ExecCtx`] carries the snapshot, the
//! optional write transaction, per-statement statistics, and an overlay of
//! entities created or deleted earlier in the same statement, which is what
//! makes a CREATE visible to a later MATCH of the same query.

mod aggregate;
mod core_types;
mod expand;
mod merge;
mod mutate;
mod procedures;
mod scan;
mod shape;

use crate::ast::{AggregateFunction, Expression, Pattern, RemoveClause, SetClause};
use crate::error::{Error, Result};
use crate::query_api::Params;
use std::collections::{HashMap, HashSet};

pub use crate::model::LabelId;
use crate::model::{EdgeKey, ExternalId, GraphSnapshot, InternalNodeId, RelTypeId};
pub use crate::model::{PropertyValue, WriteableGraph};
pub(crate) use core_types::is_internal_property;
pub use core_types::{
    NodeValue, PathValue, ReifiedPathValue, RelationshipValue, Row, Value, WriteStats,
};
pub use procedures::{
    ErasedSnapshot, Procedure, ProcedureRegistry, TestProcedureField, TestProcedureFixture,
    TestProcedureType, clear_test_procedure_fixtures, get_procedure_registry,
    get_test_procedure_fixture, register_test_procedure_fixture,
};

/// Labels are optional on created nodes; storage treats this sentinel as
/// "no label yet".
pub(crate) const UNLABELED: LabelId = LabelId::MAX;

/// Names the compiler invents for anonymous pattern parts. They never
/// surface in results: `RETURN *` and star projections skip them.
pub(crate) const HIDDEN_NAME_PREFIX: &str = "__cg_";

pub(crate) fn is_hidden_name(name: &str) -> bool {
    name.starts_with(HIDDEN_NAME_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandDirection {
    Out,
    In,
    Any,
}

/// One node of the executable operator tree.
#[derive(Debug, Clone)]
pub enum Op {
    /// A single empty row — the seed under a statement's first clause.
    Unit,
    /// Literal rows, used by tests and staged execution.
    Rows(Vec<Row>),
    /// The rows supplied by the enclosing operator (OPTIONAL branch,
    /// subquery body, FOREACH body).
    Argument,
    AllNodes {
        input: Box<Op>,
        alias: String,
    },
    LabelScan {
        input: Box<Op>,
        alias: String,
        label: String,
    },
    /// Label + property-equality lookup. Falls back to a filtered label
    /// scan when the snapshot has no index for the pair.
    IndexProbe {
        input: Box<Op>,
        alias: String,
        label: String,
        property: String,
        value: Expression,
    },
    Expand {
        input: Box<Op>,
        from: String,
        edge: String,
        to: String,
        to_bound: bool,
        types: Vec<String>,
        direction: ExpandDirection,
        path: Option<String>,
    },
    VarExpand {
        input: Box<Op>,
        from: String,
        edge: Option<String>,
        to: String,
        to_bound: bool,
        types: Vec<String>,
        direction: ExpandDirection,
        min_hops: u32,
        max_hops: Option<u32>,
        path: Option<String>,
    },
    /// `p = (n)` — a path consisting of a single node.
    BindPath {
        input: Box<Op>,
        alias: String,
        node: String,
    },
    Filter {
        input: Box<Op>,
        predicate: Expression,
    },
    /// OPTIONAL MATCH: run `branch` once per input row (seeded through
    /// [`Op::Argument`]); a row with no branch results survives with the
    /// introduced names bound to Null.
    Optional {
        input: Box<Op>,
        branch: Box<Op>,
        introduced: Vec<String>,
    },
    Project {
        input: Box<Op>,
        items: Vec<(String, Expression)>,
        /// `RETURN *` / `WITH *`: keep the existing visible columns, then
        /// append `items`.
        star: bool,
    },
    Aggregate {
        input: Box<Op>,
        keys: Vec<(String, Expression)>,
        folds: Vec<(String, AggregateFunction)>,
    },
    Sort {
        input: Box<Op>,
        keys: Vec<(Expression, bool)>,
    },
    Dedup {
        input: Box<Op>,
    },
    Paginate {
        input: Box<Op>,
        skip: Option<Expression>,
        limit: Option<Expression>,
    },
    Unwind {
        input: Box<Op>,
        list: Expression,
        alias: String,
    },
    CallProcedure {
        input: Box<Op>,
        name: String,
        args: Vec<Expression>,
        yields: Option<Vec<(String, Option<String>)>>,
    },
    /// CALL { ... }: the body reads the outer row through [`Op::Argument`]
    /// and its results join back onto it.
    Subquery {
        input: Box<Op>,
        body: Box<Op>,
    },
    Union {
        left: Box<Op>,
        right: Box<Op>,
        distinct: bool,
    },
    Create {
        input: Box<Op>,
        patterns: Vec<Pattern>,
    },
    Merge {
        input: Box<Op>,
        pattern: Pattern,
        on_create: Vec<SetClause>,
        on_match: Vec<SetClause>,
    },
    SetValues {
        input: Box<Op>,
        clause: SetClause,
    },
    RemoveValues {
        input: Box<Op>,
        clause: RemoveClause,
    },
    Delete {
        input: Box<Op>,
        detach: bool,
        targets: Vec<Expression>,
    },
    Foreach {
        input: Box<Op>,
        variable: String,
        list: Expression,
        body: Box<Op>,
    },
}

/// A node created earlier in the statement, kept visible to later scans.
#[derive(Debug, Clone)]
pub(crate) struct CreatedNode {
    pub id: InternalNodeId,
    pub labels: Vec<String>,
    pub properties: std::collections::BTreeMap<String, Value>,
}

/// An edge created earlier in the statement.
#[derive(Debug, Clone)]
pub(crate) struct CreatedEdge {
    pub key: EdgeKey,
    pub rel_type: String,
    pub properties: std::collections::BTreeMap<String, Value>,
}

pub struct ExecCtx<'e, S: GraphSnapshot> {
    pub snapshot: &'e S,
    txn: Option<&'e mut dyn WriteableGraph>,
    pub params: &'e Params,
    pub stats: WriteStats,
    pub(crate) created_nodes: Vec<CreatedNode>,
    pub(crate) created_edges: Vec<CreatedEdge>,
    pub(crate) deleted_nodes: HashSet<InternalNodeId>,
    pub(crate) deleted_edges: HashSet<EdgeKey>,
    argument: Vec<Vec<Row>>,
    external_seed: u64,
}

impl<'e, S: GraphSnapshot> ExecCtx<'e, S> {
    pub fn read_only(snapshot: &'e S, params: &'e Params) -> Self {
        Self::build(snapshot, None, params)
    }

    pub fn writable(
        snapshot: &'e S,
        txn: &'e mut dyn WriteableGraph,
        params: &'e Params,
    ) -> Self {
        Self::build(snapshot, Some(txn), params)
    }

    fn build(
        snapshot: &'e S,
        txn: Option<&'e mut dyn WriteableGraph>,
        params: &'e Params,
    ) -> Self {
        Self {
            snapshot,
            txn,
            params,
            stats: WriteStats::default(),
            created_nodes: Vec::new(),
            created_edges: Vec::new(),
            deleted_nodes: HashSet::new(),
            deleted_edges: HashSet::new(),
            argument: Vec::new(),
            external_seed: chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0) as u64,
        }
    }

    pub(crate) fn txn(&mut self) -> Result<&mut dyn WriteableGraph> {
        match self.txn.as_mut() {
            Some(t) => Ok(&mut **t),
            None => Err(Error::Other(
                "write clause requires a write transaction".into(),
            )),
        }
    }

    pub(crate) fn next_external_id(&mut self) -> ExternalId {
        self.external_seed = self.external_seed.wrapping_add(1);
        self.external_seed
    }

    pub(crate) fn argument_rows(&self) -> Vec<Row> {
        self.argument
            .last()
            .cloned()
            .unwrap_or_else(|| vec![Row::default()])
    }

    pub(crate) fn with_argument<T>(
        &mut self,
        rows: Vec<Row>,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.argument.push(rows);
        let out = body(self);
        self.argument.pop();
        out
    }

    pub(crate) fn created_node(&self, id: InternalNodeId) -> Option<&CreatedNode> {
        self.created_nodes.iter().find(|n| n.id == id)
    }

    pub(crate) fn resolve_rel_type_ids(&self, types: &[String]) -> Vec<Option<RelTypeId>> {
        if types.is_empty() {
            vec![None]
        } else {
            types
                .iter()
                .map(|t| self.snapshot.resolve_rel_type_id(t))
                .collect()
        }
    }
}

/// Executes an operator tree, producing its full result row vector.
pub fn run<S: GraphSnapshot>(op: &Op, ctx: &mut ExecCtx<'_, S>) -> Result<Vec<Row>> {
    match op {
        Op::Unit => Ok(vec![Row::default()]),
        Op::Rows(rows) => Ok(rows.clone()),
        Op::Argument => Ok(ctx.argument_rows()),
        Op::AllNodes { input, alias } => scan::all_nodes(input, alias, ctx),
        Op::LabelScan {
            input,
            alias,
            label,
        } => scan::label_scan(input, alias, label, ctx),
        Op::IndexProbe {
            input,
            alias,
            label,
            property,
            value,
        } => scan::index_probe(input, alias, label, property, value, ctx),
        Op::Expand {
            input,
            from,
            edge,
            to,
            to_bound,
            types,
            direction,
            path,
        } => expand::expand(
            input,
            from,
            edge,
            to,
            *to_bound,
            types,
            *direction,
            path.as_deref(),
            ctx,
        ),
        Op::VarExpand {
            input,
            from,
            edge,
            to,
            to_bound,
            types,
            direction,
            min_hops,
            max_hops,
            path,
        } => expand::var_expand(
            input,
            from,
            edge.as_deref(),
            to,
            *to_bound,
            types,
            *direction,
            *min_hops,
            *max_hops,
            path.as_deref(),
            ctx,
        ),
        Op::BindPath { input, alias, node } => expand::bind_single_node_path(input, alias, node, ctx),
        Op::Filter { input, predicate } => shape::filter(input, predicate, ctx),
        Op::Optional {
            input,
            branch,
            introduced,
        } => shape::optional(input, branch, introduced, ctx),
        Op::Project { input, items, star } => shape::project(input, items, *star, ctx),
        Op::Aggregate { input, keys, folds } => aggregate::aggregate(input, keys, folds, ctx),
        Op::Sort { input, keys } => shape::sort(input, keys, ctx),
        Op::Dedup { input } => shape::dedup(input, ctx),
        Op::Paginate { input, skip, limit } => shape::paginate(input, skip, limit, ctx),
        Op::Unwind { input, list, alias } => shape::unwind(input, list, alias, ctx),
        Op::CallProcedure {
            input,
            name,
            args,
            yields,
        } => procedures::call(input, name, args, yields.as_deref(), ctx),
        Op::Subquery { input, body } => shape::subquery(input, body, ctx),
        Op::Union {
            left,
            right,
            distinct,
        } => shape::union(left, right, *distinct, ctx),
        Op::Create { input, patterns } => mutate::create(input, patterns, ctx),
        Op::Merge {
            input,
            pattern,
            on_create,
            on_match,
        } => merge::merge(input, pattern, on_create, on_match, ctx),
        Op::SetValues { input, clause } => mutate::set_values(input, clause, ctx),
        Op::RemoveValues { input, clause } => mutate::remove_values(input, clause, ctx),
        Op::Delete {
            input,
            detach,
            targets,
        } => mutate::delete(input, *detach, targets, ctx),
        Op::Foreach {
            input,
            variable,
            list,
            body,
        } => mutate::foreach(input, variable, list, body, ctx),
    }
}

/// Runs a read-only tree. Write operators fail with a "requires a write
/// transaction" error.
pub fn run_read<S: GraphSnapshot>(op: &Op, snapshot: &S, params: &Params) -> Result<Vec<Row>> {
    let mut ctx = ExecCtx::read_only(snapshot, params);
    run(op, &mut ctx)
}

/// Runs a read-only tree whose [`Op::Argument`] leaves read the given seed
/// rows — how EXISTS subqueries see their outer bindings.
pub fn run_seeded_read<S: GraphSnapshot>(
    op: &Op,
    snapshot: &S,
    params: &Params,
    seed: Vec<Row>,
) -> Result<Vec<Row>> {
    let mut ctx = ExecCtx::read_only(snapshot, params);
    ctx.with_argument(seed, |ctx| run(op, ctx))
}

/// Runs a tree that may mutate the graph, returning its result rows and the
/// per-kind write statistics.
pub fn run_write<S: GraphSnapshot>(
    op: &Op,
    snapshot: &S,
    txn: &mut dyn WriteableGraph,
    params: &Params,
) -> Result<(Vec<Row>, WriteStats)> {
    let mut ctx = ExecCtx::writable(snapshot, txn, params);
    let rows = run(op, &mut ctx)?;
    Ok((rows, ctx.stats))
}

/// Converts a stored property into the evaluator's value domain.
pub fn convert_api_property_to_value(api_value: &PropertyValue) -> Value {
    match api_value {
        PropertyValue::Null => Value::Null,
        PropertyValue::Bool(b) => Value::Bool(*b),
        PropertyValue::Int(i) => Value::Int(*i),
        PropertyValue::Float(f) => Value::Float(*f),
        PropertyValue::String(s) => Value::String(s.clone()),
        PropertyValue::List(items) => {
            Value::List(items.iter().map(convert_api_property_to_value).collect())
        }
        PropertyValue::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), convert_api_property_to_value(v)))
                .collect(),
        ),
    }
}

/// Narrows an evaluated value to the storage-facing domain. Entities and
/// paths cannot be stored as properties.
pub fn convert_executor_value_to_property(value: &Value) -> Result<PropertyValue> {
    match value {
        Value::Null => Ok(PropertyValue::Null),
        Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
        Value::Int(i) => Ok(PropertyValue::Int(*i)),
        Value::Float(f) => Ok(PropertyValue::Float(*f)),
        Value::String(s) => Ok(PropertyValue::String(s.clone())),
        Value::List(items) => Ok(PropertyValue::List(
            items
                .iter()
                .map(convert_executor_value_to_property)
                .collect::<Result<_>>()?,
        )),
        Value::Map(map) => Ok(PropertyValue::Map(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), convert_executor_value_to_property(v)?)))
                .collect::<Result<_>>()?,
        )),
        other => Err(Error::Other(format!(
            "cannot store value as a property: {other:?}"
        ))),
    }
}

/// Converts result rows to name → value maps, the shape `execute_mixed`
/// hands back to embedders.
pub fn rows_to_maps(rows: Vec<Row>) -> Vec<HashMap<String, Value>> {
    rows.into_iter()
        .map(|row| {
            row.columns()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GraphStore;
    use crate::model::memory::MemoryGraph;

    #[test]
    fn unit_produces_one_empty_row() {
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        let params = Params::new();
        let rows = run_read(&Op::Unit, &snap, &params).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].columns().is_empty());
    }

    #[test]
    fn write_ops_fail_without_a_transaction() {
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        let params = Params::new();
        let op = Op::Create {
            input: Box::new(Op::Unit),
            patterns: vec![crate::ast::Pattern {
                variable: None,
                elements: vec![crate::ast::PathElement::Node(crate::ast::NodePattern {
                    variable: Some("n".into()),
                    labels: vec!["Person".into()],
                    properties: None,
                })],
            }],
        };
        let err = run_read(&op, &snap, &params).expect_err("create without txn should fail");
        assert!(err.to_string().contains("write transaction"), "{err}");
    }

    #[test]
    fn property_conversion_round_trips_scalars() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Int(7),
            Value::Float(2.5),
            Value::String("x".into()),
        ] {
            let stored = convert_executor_value_to_property(&value).unwrap();
            assert_eq!(convert_api_property_to_value(&stored), value);
        }
    }

    #[test]
    fn entity_values_are_rejected_as_properties() {
        let value = Value::NodeId(3);
        assert!(convert_executor_value_to_property(&value).is_err());
    }
}
