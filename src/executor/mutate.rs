//! Write operators: CREATE, SET, REMOVE, DELETE/DETACH DELETE, FOREACH.
//!
//! Every write goes through the transaction in the [`ExecCtx`]; the context
//! also records created and deleted entities so the rest of the statement
//! observes them. After a property or label write, the row binding upgrades
//! to a materialized entity value so later expressions in the same pipeline
//! read the written state instead of the (older) snapshot.

use super::{
    CreatedEdge, CreatedNode, ExecCtx, NodeValue, Op, RelationshipValue, Row, UNLABELED, Value,
    convert_api_property_to_value, convert_executor_value_to_property, run,
};
use crate::ast::{
    Expression, PathElement, Pattern, RelationshipDirection, RemoveClause, SetClause,
};
use crate::error::{Error, Result};
use crate::evaluator::evaluate_expression_value;
use crate::model::{EdgeKey, GraphSnapshot, InternalNodeId};
use std::collections::BTreeMap;

/// The binding error a write clause raises when its target variable was
/// never produced by a preceding MATCH/CREATE, listing what is in scope.
pub(super) fn unbound_variable_error(var: &str, row: &Row) -> Error {
    let have: Vec<&str> = row.columns().iter().map(|(k, _)| k.as_str()).collect();
    Error::Other(format!(
        "variable '{var}' not found in MATCH results (have: [{}])",
        have.join(", ")
    ))
}

#[derive(Debug, Clone, Copy)]
pub(super) enum WriteTarget {
    Node(InternalNodeId),
    Edge(EdgeKey),
}

/// Resolves a SET/REMOVE/DELETE target variable. `Ok(None)` means the
/// variable is bound to Null (an empty OPTIONAL MATCH) and the write is
/// skipped for this row.
pub(super) fn write_target(row: &Row, var: &str) -> Result<Option<WriteTarget>> {
    match row.get(var) {
        None => Err(unbound_variable_error(var, row)),
        Some(Value::Null) => Ok(None),
        Some(Value::NodeId(id)) => Ok(Some(WriteTarget::Node(*id))),
        Some(Value::Node(node)) => Ok(Some(WriteTarget::Node(node.id))),
        Some(Value::EdgeKey(key)) => Ok(Some(WriteTarget::Edge(*key))),
        Some(Value::Relationship(rel)) => Ok(Some(WriteTarget::Edge(rel.key))),
        Some(_) => Err(Error::Other(format!(
            "SET/DELETE target '{var}' is not a node or relationship"
        ))),
    }
}

/// Materializes the current state of a node, preferring the statement's
/// created-overlay over the snapshot.
pub(super) fn materialize_node<S: GraphSnapshot>(
    ctx: &ExecCtx<'_, S>,
    id: InternalNodeId,
) -> NodeValue {
    if let Some(created) = ctx.created_node(id) {
        return NodeValue {
            id,
            labels: created.labels.clone(),
            properties: created.properties.clone(),
        };
    }
    let labels = ctx
        .snapshot
        .resolve_node_labels(id)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|l| ctx.snapshot.resolve_label_name(l))
        .collect();
    let properties = ctx
        .snapshot
        .node_properties(id)
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| (k.clone(), convert_api_property_to_value(v)))
        .collect();
    NodeValue {
        id,
        labels,
        properties,
    }
}

pub(super) fn materialize_edge<S: GraphSnapshot>(
    ctx: &ExecCtx<'_, S>,
    key: EdgeKey,
) -> RelationshipValue {
    if let Some(created) = ctx.created_edges.iter().find(|e| e.key == key) {
        return RelationshipValue {
            key,
            rel_type: created.rel_type.clone(),
            properties: created.properties.clone(),
        };
    }
    let rel_type = ctx
        .snapshot
        .resolve_rel_type_name(key.rel)
        .unwrap_or_else(|| format!("<{}>", key.rel));
    let properties = ctx
        .snapshot
        .edge_properties(key)
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| (k.clone(), convert_api_property_to_value(v)))
        .collect();
    RelationshipValue {
        key,
        rel_type,
        properties,
    }
}

// ---- CREATE ----

pub(super) fn create<S: GraphSnapshot>(
    input: &Op,
    patterns: &[Pattern],
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let mut out = Vec::with_capacity(rows.len());
    for mut row in rows {
        for pattern in patterns {
            create_pattern(ctx, &mut row, pattern)?;
        }
        out.push(row);
    }
    Ok(out)
}

fn eval_property_map<S: GraphSnapshot>(
    ctx: &ExecCtx<'_, S>,
    row: &Row,
    props: &Option<crate::ast::PropertyMap>,
) -> Result<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    if let Some(map) = props {
        for pair in &map.properties {
            let value = evaluate_expression_value(&pair.value, row, ctx.snapshot, ctx.params);
            out.insert(pair.key.clone(), value);
        }
    }
    Ok(out)
}

pub(super) fn create_node_entity<S: GraphSnapshot>(
    ctx: &mut ExecCtx<'_, S>,
    labels: &[String],
    properties: BTreeMap<String, Value>,
) -> Result<InternalNodeId> {
    let external = ctx.next_external_id();
    let first_label = match labels.first() {
        Some(name) => Some(ctx.txn()?.get_or_create_label_id(name)?),
        None => None,
    };
    let txn = ctx.txn()?;
    let id = txn.create_node(external, first_label.unwrap_or(UNLABELED))?;
    for extra in labels.iter().skip(1) {
        let label_id = txn.get_or_create_label_id(extra)?;
        txn.add_node_label(id, label_id)?;
    }
    for (key, value) in &properties {
        let stored = convert_executor_value_to_property(value)?;
        if !matches!(stored, super::PropertyValue::Null) {
            txn.set_node_property(id, key.clone(), stored)?;
        }
    }
    ctx.stats.nodes_created += 1;
    ctx.created_nodes.push(CreatedNode {
        id,
        labels: labels.to_vec(),
        properties,
    });
    Ok(id)
}

pub(super) fn create_edge_entity<S: GraphSnapshot>(
    ctx: &mut ExecCtx<'_, S>,
    src: InternalNodeId,
    rel_type: &str,
    dst: InternalNodeId,
    properties: BTreeMap<String, Value>,
) -> Result<EdgeKey> {
    let txn = ctx.txn()?;
    let rel = txn.get_or_create_rel_type_id(rel_type)?;
    txn.create_edge(src, rel, dst)?;
    let key = EdgeKey { src, rel, dst };
    for (prop_key, value) in &properties {
        let stored = convert_executor_value_to_property(value)?;
        if !matches!(stored, super::PropertyValue::Null) {
            txn.set_edge_property(src, rel, dst, prop_key.clone(), stored)?;
        }
    }
    ctx.stats.rels_created += 1;
    ctx.created_edges.push(CreatedEdge {
        key,
        rel_type: rel_type.to_string(),
        properties,
    });
    Ok(key)
}

fn create_pattern<S: GraphSnapshot>(
    ctx: &mut ExecCtx<'_, S>,
    row: &mut Row,
    pattern: &Pattern,
) -> Result<()> {
    // Nodes first, so relationship endpoints always resolve.
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
        let properties = eval_property_map(ctx, row, &node.properties)?;
        let id = create_node_entity(ctx, &node.labels, properties.clone())?;
        node_ids[idx] = Some(id);
        if let Some(var) = &node.variable {
            *row = row.clone().with(
                var.clone(),
                Value::Node(NodeValue {
                    id,
                    labels: node.labels.clone(),
                    properties,
                }),
            );
        }
    }

    for (idx, element) in pattern.elements.iter().enumerate() {
        let PathElement::Relationship(rel) = element else {
            continue;
        };
        let left = node_ids
            .get(idx.wrapping_sub(1))
            .copied()
            .flatten()
            .ok_or_else(|| Error::Other("failed to create relationship: no source node".into()))?;
        let right = node_ids
            .get(idx + 1)
            .copied()
            .flatten()
            .ok_or_else(|| Error::Other("failed to create relationship: no target node".into()))?;
        let (src, dst) = match rel.direction {
            RelationshipDirection::RightToLeft => (right, left),
            _ => (left, right),
        };
        let rel_type = rel
            .types
            .first()
            .cloned()
            .unwrap_or_else(|| "RELATED_TO".to_string());
        let properties = eval_property_map(ctx, row, &rel.properties)?;
        let key = create_edge_entity(ctx, src, &rel_type, dst, properties.clone())?;
        if let Some(var) = &rel.variable {
            *row = row.clone().with(
                var.clone(),
                Value::Relationship(RelationshipValue {
                    key,
                    rel_type,
                    properties,
                }),
            );
        }
    }
    Ok(())
}

// ---- SET / REMOVE ----

pub(super) fn set_values<S: GraphSnapshot>(
    input: &Op,
    clause: &SetClause,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let mut out = Vec::with_capacity(rows.len());
    for mut row in rows {
        apply_set_clause(ctx, &mut row, clause)?;
        out.push(row);
    }
    Ok(out)
}

/// Applies one SET clause to one row; shared with MERGE's ON CREATE / ON
/// MATCH actions.
pub(super) fn apply_set_clause<S: GraphSnapshot>(
    ctx: &mut ExecCtx<'_, S>,
    row: &mut Row,
    clause: &SetClause,
) -> Result<()> {
    for item in &clause.items {
        let mut value =
            evaluate_expression_value(&item.value, row, ctx.snapshot, ctx.params);
        let Some(target) = write_target(row, &item.property.variable)? else {
            continue;
        };
        if item.merge {
            // += on a property merges map values; anything else replaces.
            let current = match target {
                WriteTarget::Node(id) => materialize_node(ctx, id)
                    .properties
                    .get(&item.property.property)
                    .cloned(),
                WriteTarget::Edge(key) => materialize_edge(ctx, key)
                    .properties
                    .get(&item.property.property)
                    .cloned(),
            };
            if let (Some(Value::Map(mut base)), Value::Map(additions)) = (current, value.clone())
            {
                base.extend(additions);
                value = Value::Map(base);
            }
        }
        write_property(ctx, row, &item.property.variable, target, &item.property.property, value)?;
    }

    for item in &clause.map_items {
        let Some(target) = write_target(row, &item.variable)? else {
            continue;
        };
        let source = evaluate_expression_value(&item.value, row, ctx.snapshot, ctx.params);
        let entries: BTreeMap<String, Value> = match source {
            Value::Map(map) => map,
            Value::Node(node) => node.properties,
            Value::Relationship(rel) => rel.properties,
            Value::Null => continue,
            other => {
                return Err(Error::Other(format!(
                    "SET {} = ... requires a map, got {other:?}",
                    item.variable
                )));
            }
        };

        if !item.append {
            // Replacement first clears every property not in the new map.
            let existing: Vec<String> = match target {
                WriteTarget::Node(id) => {
                    materialize_node(ctx, id).properties.keys().cloned().collect()
                }
                WriteTarget::Edge(key) => {
                    materialize_edge(ctx, key).properties.keys().cloned().collect()
                }
            };
            for key in existing {
                if !entries.contains_key(&key) {
                    write_property(ctx, row, &item.variable, target, &key, Value::Null)?;
                }
            }
        }
        for (key, value) in entries {
            write_property(ctx, row, &item.variable, target, &key, value)?;
        }
    }

    for item in &clause.labels {
        let Some(target) = write_target(row, &item.variable)? else {
            continue;
        };
        let WriteTarget::Node(id) = target else {
            return Err(Error::Other(format!(
                "cannot set labels on a relationship: {}",
                item.variable
            )));
        };
        let mut current = materialize_node(ctx, id);
        for label in &item.labels {
            if current.labels.iter().any(|l| l == label) {
                continue;
            }
            let label_id = ctx.txn()?.get_or_create_label_id(label)?;
            ctx.txn()?.add_node_label(id, label_id)?;
            ctx.stats.labels_added += 1;
            current.labels.push(label.clone());
        }
        refresh_overlay_node(ctx, &current);
        *row = row.clone().with(item.variable.clone(), Value::Node(current));
    }

    Ok(())
}

/// Writes (or, for Null, removes) one property, refreshing the row binding
/// and the created-overlay so later reads see the new state.
fn write_property<S: GraphSnapshot>(
    ctx: &mut ExecCtx<'_, S>,
    row: &mut Row,
    var: &str,
    target: WriteTarget,
    key: &str,
    value: Value,
) -> Result<()> {
    let stored = convert_executor_value_to_property(&value)?;
    let removing = matches!(stored, super::PropertyValue::Null);
    match target {
        WriteTarget::Node(id) => {
            if removing {
                ctx.txn()?.remove_node_property(id, key)?;
            } else {
                ctx.txn()?.set_node_property(id, key.to_string(), stored)?;
            }
            ctx.stats.properties_set += 1;
            let mut current = materialize_node(ctx, id);
            if removing {
                current.properties.remove(key);
            } else {
                current.properties.insert(key.to_string(), value);
            }
            refresh_overlay_node(ctx, &current);
            *row = row.clone().with(var.to_string(), Value::Node(current));
        }
        WriteTarget::Edge(edge) => {
            if removing {
                ctx.txn()?
                    .remove_edge_property(edge.src, edge.rel, edge.dst, key)?;
            } else {
                ctx.txn()?
                    .set_edge_property(edge.src, edge.rel, edge.dst, key.to_string(), stored)?;
            }
            ctx.stats.properties_set += 1;
            let mut current = materialize_edge(ctx, edge);
            if removing {
                current.properties.remove(key);
            } else {
                current.properties.insert(key.to_string(), value);
            }
            refresh_overlay_edge(ctx, &current);
            *row = row
                .clone()
                .with(var.to_string(), Value::Relationship(current));
        }
    }
    Ok(())
}

fn refresh_overlay_node<S: GraphSnapshot>(ctx: &mut ExecCtx<'_, S>, node: &NodeValue) {
    if let Some(entry) = ctx.created_nodes.iter_mut().find(|n| n.id == node.id) {
        entry.labels = node.labels.clone();
        entry.properties = node.properties.clone();
    }
}

fn refresh_overlay_edge<S: GraphSnapshot>(ctx: &mut ExecCtx<'_, S>, edge: &RelationshipValue) {
    if let Some(entry) = ctx.created_edges.iter_mut().find(|e| e.key == edge.key) {
        entry.properties = edge.properties.clone();
    }
}

pub(super) fn remove_values<S: GraphSnapshot>(
    input: &Op,
    clause: &RemoveClause,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let mut out = Vec::with_capacity(rows.len());
    for mut row in rows {
        for access in &clause.properties {
            let Some(target) = write_target(&row, &access.variable)? else {
                continue;
            };
            write_property(
                ctx,
                &mut row,
                &access.variable,
                target,
                &access.property,
                Value::Null,
            )?;
        }
        for item in &clause.labels {
            let Some(target) = write_target(&row, &item.variable)? else {
                continue;
            };
            let WriteTarget::Node(id) = target else {
                return Err(Error::Other(format!(
                    "cannot remove labels from a relationship: {}",
                    item.variable
                )));
            };
            let mut current = materialize_node(ctx, id);
            for label in &item.labels {
                if !current.labels.iter().any(|l| l == label) {
                    continue;
                }
                if let Some(label_id) = ctx.snapshot.resolve_label_id(label) {
                    ctx.txn()?.remove_node_label(id, label_id)?;
                }
                ctx.stats.labels_removed += 1;
                current.labels.retain(|l| l != label);
            }
            refresh_overlay_node(ctx, &current);
            row = row.clone().with(item.variable.clone(), Value::Node(current));
        }
        out.push(row);
    }
    Ok(out)
}

// ---- DELETE ----

pub(super) fn delete<S: GraphSnapshot>(
    input: &Op,
    detach: bool,
    targets: &[Expression],
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    for row in &rows {
        for target in targets {
            // A bare variable must exist as a binding even when Null.
            if let Expression::Variable(name) = target
                && row.get(name).is_none()
            {
                return Err(unbound_variable_error(name, row));
            }
            let value = evaluate_expression_value(target, row, ctx.snapshot, ctx.params);
            delete_value(ctx, &value, detach)?;
        }
    }
    Ok(rows)
}

fn delete_value<S: GraphSnapshot>(
    ctx: &mut ExecCtx<'_, S>,
    value: &Value,
    detach: bool,
) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::NodeId(id) => delete_node(ctx, *id, detach),
        Value::Node(node) => delete_node(ctx, node.id, detach),
        Value::EdgeKey(key) => delete_edge(ctx, *key),
        Value::Relationship(rel) => delete_edge(ctx, rel.key),
        Value::List(items) => {
            for item in items {
                delete_value(ctx, item, detach)?;
            }
            Ok(())
        }
        other => Err(Error::Other(format!(
            "DELETE failed: cannot delete {other:?}"
        ))),
    }
}

fn delete_edge<S: GraphSnapshot>(ctx: &mut ExecCtx<'_, S>, key: EdgeKey) -> Result<()> {
    if !ctx.deleted_edges.insert(key) {
        return Ok(()); // another row already deleted it
    }
    ctx.txn()?.tombstone_edge(key.src, key.rel, key.dst)?;
    ctx.stats.rels_deleted += 1;
    Ok(())
}

fn delete_node<S: GraphSnapshot>(
    ctx: &mut ExecCtx<'_, S>,
    id: InternalNodeId,
    detach: bool,
) -> Result<()> {
    if ctx.deleted_nodes.contains(&id) {
        return Ok(());
    }
    if detach {
        let mut incident: Vec<EdgeKey> = ctx
            .snapshot
            .neighbors(id, None)
            .chain(ctx.snapshot.incoming_neighbors(id, None))
            .collect();
        incident.extend(
            ctx.created_edges
                .iter()
                .filter(|e| e.key.src == id || e.key.dst == id)
                .map(|e| e.key),
        );
        incident.sort();
        incident.dedup();
        for key in incident {
            delete_edge(ctx, key)?;
        }
    }
    ctx.txn()?.tombstone_node(id)?;
    ctx.deleted_nodes.insert(id);
    ctx.stats.nodes_deleted += 1;
    Ok(())
}

// ---- FOREACH ----

pub(super) fn foreach<S: GraphSnapshot>(
    input: &Op,
    variable: &str,
    list: &Expression,
    body: &Op,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    for row in &rows {
        let items = match evaluate_expression_value(list, row, ctx.snapshot, ctx.params) {
            Value::List(items) => items,
            Value::Null => continue,
            other => {
                return Err(Error::Other(format!(
                    "FOREACH requires a list, got {other:?}"
                )));
            }
        };
        for item in items {
            let seeded = row.clone().with(variable, item);
            ctx.with_argument(vec![seeded], |ctx| run(body, ctx))?;
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::super::{ExecCtx, Op, run};
    use crate::ast::{NodePattern, PathElement, Pattern};
    use crate::model::{GraphSnapshot, GraphStore};
    use crate::model::memory::{MemoryGraph, MemoryWriteTxn};
    use crate::query_api::Params;
    use std::collections::BTreeMap;

    #[test]
    fn create_counts_nodes_and_records_the_overlay() {
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        let params = Params::new();
        let mut txn = MemoryWriteTxn::new(&graph);
        let mut ctx = ExecCtx::writable(&snap, &mut txn, &params);

        let op = Op::Create {
            input: Box::new(Op::Unit),
            patterns: vec![Pattern {
                variable: None,
                elements: vec![PathElement::Node(NodePattern {
                    variable: Some("n".into()),
                    labels: vec!["Person".into()],
                    properties: None,
                })],
            }],
        };
        run(&op, &mut ctx).unwrap();
        assert_eq!(ctx.stats.nodes_created, 1);
        assert_eq!(ctx.created_nodes.len(), 1);
        assert_eq!(graph.snapshot().node_count(None), 1);
    }

    #[test]
    fn deleting_the_same_node_twice_counts_once() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["A"], BTreeMap::new());
        let snap = graph.snapshot();
        let params = Params::new();
        let mut txn = MemoryWriteTxn::new(&graph);
        let mut ctx = ExecCtx::writable(&snap, &mut txn, &params);

        super::delete_node(&mut ctx, 0, false).unwrap();
        super::delete_node(&mut ctx, 0, false).unwrap();
        assert_eq!(ctx.stats.nodes_deleted, 1);
    }
}
