//! MERGE: find-or-create for a node or a path. Per the composed semantics,
//! a path MERGE resolves each node (bound variable, probe hit, or fresh
//! create) and then each relationship between the resolved endpoints; the
//! ON CREATE actions fire when anything was created for the row, ON MATCH
//! otherwise. Pattern property maps evaluate once per input row, before the
//! probe.

use super::mutate::{apply_set_clause, create_edge_entity, create_node_entity, materialize_edge};
use super::{ExecCtx, NodeValue, Op, RelationshipValue, Row, Value, run};
use crate::ast::{PathElement, Pattern, RelationshipDirection, SetClause};
use crate::error::{Error, Result};
use crate::evaluator::evaluate_expression_value;
use crate::model::{EdgeKey, GraphSnapshot, InternalNodeId};
use std::collections::BTreeMap;

pub(super) fn merge<S: GraphSnapshot>(
    input: &Op,
    pattern: &Pattern,
    on_create: &[SetClause],
    on_match: &[SetClause],
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let mut out = Vec::with_capacity(rows.len());
    for mut row in rows {
        let created_any = merge_pattern(ctx, &mut row, pattern)?;
        let actions = if created_any { on_create } else { on_match };
        for clause in actions {
            apply_set_clause(ctx, &mut row, clause)?;
        }
        out.push(row);
    }
    Ok(out)
}

fn eval_props<S: GraphSnapshot>(
    ctx: &ExecCtx<'_, S>,
    row: &Row,
    props: &Option<crate::ast::PropertyMap>,
) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    if let Some(map) = props {
        for pair in &map.properties {
            out.insert(
                pair.key.clone(),
                evaluate_expression_value(&pair.value, row, ctx.snapshot, ctx.params),
            );
        }
    }
    out
}

/// Resolves every node and relationship of the pattern, creating what the
/// probe cannot find. Returns whether anything was created.
fn merge_pattern<S: GraphSnapshot>(
    ctx: &mut ExecCtx<'_, S>,
    row: &mut Row,
    pattern: &Pattern,
) -> Result<bool> {
    let mut created_any = false;
    let mut node_ids: Vec<Option<InternalNodeId>> = vec![None; pattern.elements.len()];

    for (idx, element) in pattern.elements.iter().enumerate() {
        let PathElement::Node(node) = element else {
            continue;
        };
        if let Some(var) = &node.variable
            && let Some(existing) = row.get_node(var)
        {
            node_ids[idx] = Some(existing);
            continue;
        }

        let wanted = eval_props(ctx, row, &node.properties);
        let id = match probe_node(ctx, &node.labels, &wanted) {
            Some(found) => found,
            None => {
                created_any = true;
                create_node_entity(ctx, &node.labels, wanted.clone())?
            }
        };
        node_ids[idx] = Some(id);
        if let Some(var) = &node.variable {
            *row = row.clone().with(
                var.clone(),
                Value::Node(super::mutate::materialize_node(ctx, id)),
            );
        }
    }

    for (idx, element) in pattern.elements.iter().enumerate() {
        let PathElement::Relationship(rel) = element else {
            continue;
        };
        if rel.variable_length.is_some() {
            return Err(Error::Other(
                "syntax error: MERGE does not accept variable-length relationships".into(),
            ));
        }
        let left = node_ids
            .get(idx.wrapping_sub(1))
            .copied()
            .flatten()
            .ok_or_else(|| Error::Other("MERGE pattern must start with a node".into()))?;
        let right = node_ids
            .get(idx + 1)
            .copied()
            .flatten()
            .ok_or_else(|| Error::Other("MERGE pattern must end with a node".into()))?;
        let (src, dst) = match rel.direction {
            RelationshipDirection::RightToLeft => (right, left),
            _ => (left, right),
        };
        let rel_type = rel
            .types
            .first()
            .cloned()
            .unwrap_or_else(|| "RELATED_TO".to_string());
        let wanted = eval_props(ctx, row, &rel.properties);

        let undirected = rel.direction == RelationshipDirection::Undirected;
        let key = match probe_edge(ctx, src, dst, &rel_type, &wanted, undirected) {
            Some(found) => found,
            None => {
                created_any = true;
                create_edge_entity(ctx, src, &rel_type, dst, wanted)?
            }
        };
        if let Some(var) = &rel.variable {
            *row = row.clone().with(
                var.clone(),
                Value::Relationship(materialize_edge(ctx, key)),
            );
        }
    }

    Ok(created_any)
}

/// Finds an existing node carrying every requested label and property.
fn probe_node<S: GraphSnapshot>(
    ctx: &ExecCtx<'_, S>,
    labels: &[String],
    wanted: &BTreeMap<String, Value>,
) -> Option<InternalNodeId> {
    let candidates: Vec<InternalNodeId> = match labels.first() {
        Some(label) => match ctx.snapshot.resolve_label_id(label) {
            Some(label_id) => ctx.snapshot.nodes_by_label(label_id),
            None => Vec::new(),
        },
        None => ctx.snapshot.nodes().collect(),
    };

    let node_matches = |node: &NodeValue| {
        labels.iter().all(|l| node.labels.contains(l))
            && wanted
                .iter()
                .all(|(k, v)| node.properties.get(k) == Some(v))
    };

    for id in candidates {
        if ctx.deleted_nodes.contains(&id) {
            continue;
        }
        let node = super::mutate::materialize_node(ctx, id);
        if node_matches(&node) {
            return Some(id);
        }
    }
    for created in &ctx.created_nodes {
        if ctx.deleted_nodes.contains(&created.id) {
            continue;
        }
        let node = NodeValue {
            id: created.id,
            labels: created.labels.clone(),
            properties: created.properties.clone(),
        };
        if node_matches(&node) {
            return Some(created.id);
        }
    }
    None
}

/// Finds an existing edge of the requested type (and properties) between
/// the endpoints, in either direction when the pattern is undirected.
fn probe_edge<S: GraphSnapshot>(
    ctx: &ExecCtx<'_, S>,
    src: InternalNodeId,
    dst: InternalNodeId,
    rel_type: &str,
    wanted: &BTreeMap<String, Value>,
    undirected: bool,
) -> Option<EdgeKey> {
    let edge_matches = |edge: &RelationshipValue| {
        edge.rel_type == rel_type
            && wanted
                .iter()
                .all(|(k, v)| edge.properties.get(k) == Some(v))
    };

    let rel = ctx.snapshot.resolve_rel_type_id(rel_type);
    let mut candidates: Vec<EdgeKey> = Vec::new();
    if let Some(rel) = rel {
        candidates.extend(ctx.snapshot.neighbors(src, Some(rel)).filter(|k| k.dst == dst));
        if undirected {
            candidates.extend(ctx.snapshot.neighbors(dst, Some(rel)).filter(|k| k.dst == src));
        }
    }
    candidates.extend(
        ctx.created_edges
            .iter()
            .filter(|e| {
                (e.key.src == src && e.key.dst == dst)
                    || (undirected && e.key.src == dst && e.key.dst == src)
            })
            .map(|e| e.key),
    );

    for key in candidates {
        if ctx.deleted_edges.contains(&key) {
            continue;
        }
        let edge = materialize_edge(ctx, key);
        if edge_matches(&edge) {
            return Some(key);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::super::{ExecCtx, Op, run};
    use crate::ast::{NodePattern, PathElement, Pattern, PropertyMap, PropertyPair};
    use crate::ast::{Expression, Literal};
    use crate::model::{GraphSnapshot, GraphStore};
    use crate::model::memory::{MemoryGraph, MemoryWriteTxn};
    use crate::query_api::Params;

    fn person_pattern(name: &str) -> Pattern {
        Pattern {
            variable: None,
            elements: vec![PathElement::Node(NodePattern {
                variable: Some("n".into()),
                labels: vec!["Person".into()],
                properties: Some(PropertyMap {
                    properties: vec![PropertyPair {
                        key: "name".into(),
                        value: Expression::Literal(Literal::String(name.into())),
                    }],
                }),
            })],
        }
    }

    #[test]
    fn merge_creates_on_miss_and_matches_on_hit() {
        let graph = MemoryGraph::new();
        let params = Params::new();

        {
            let snap = graph.snapshot();
            let mut txn = MemoryWriteTxn::new(&graph);
            let mut ctx = ExecCtx::writable(&snap, &mut txn, &params);
            let op = Op::Merge {
                input: Box::new(Op::Unit),
                pattern: person_pattern("Ada"),
                on_create: vec![],
                on_match: vec![],
            };
            run(&op, &mut ctx).unwrap();
            assert_eq!(ctx.stats.nodes_created, 1);
        }

        {
            let snap = graph.snapshot();
            let mut txn = MemoryWriteTxn::new(&graph);
            let mut ctx = ExecCtx::writable(&snap, &mut txn, &params);
            let op = Op::Merge {
                input: Box::new(Op::Unit),
                pattern: person_pattern("Ada"),
                on_create: vec![],
                on_match: vec![],
            };
            run(&op, &mut ctx).unwrap();
            assert_eq!(ctx.stats.nodes_created, 0);
        }
        assert_eq!(graph.snapshot().node_count(None), 1);
    }

    #[test]
    fn merge_twice_in_one_statement_reuses_the_overlay_node() {
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        let params = Params::new();
        let mut txn = MemoryWriteTxn::new(&graph);
        let mut ctx = ExecCtx::writable(&snap, &mut txn, &params);

        for _ in 0..2 {
            let op = Op::Merge {
                input: Box::new(Op::Unit),
                pattern: person_pattern("Ada"),
                on_create: vec![],
                on_match: vec![],
            };
            run(&op, &mut ctx).unwrap();
        }
        assert_eq!(ctx.stats.nodes_created, 1);
    }
}
