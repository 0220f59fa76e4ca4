//! Node scans: full scan, label scan, and the label + property-equality
//! probe that prefers the snapshot's property index. Every scan also sees
//! nodes created earlier in the same statement.

use super::{CreatedNode, ExecCtx, NodeValue, Op, Row, Value, run};
use crate::ast::Expression;
use crate::error::Result;
use crate::evaluator::evaluate_expression_value;
use crate::model::GraphSnapshot;

/// Binds a created-overlay node as a full value so later property reads see
/// the written properties without consulting the (older) snapshot.
fn overlay_value(node: &CreatedNode) -> Value {
    Value::Node(NodeValue {
        id: node.id,
        labels: node.labels.clone(),
        properties: node.properties.clone(),
    })
}

pub(super) fn all_nodes<S: GraphSnapshot>(
    input: &Op,
    alias: &str,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let stored: Vec<_> = ctx
        .snapshot
        .nodes()
        .filter(|id| !ctx.deleted_nodes.contains(id))
        .collect();

    let mut out = Vec::new();
    for row in rows {
        for id in &stored {
            out.push(row.clone().with(alias, Value::NodeId(*id)));
        }
        for node in &ctx.created_nodes {
            if !ctx.deleted_nodes.contains(&node.id) {
                out.push(row.clone().with(alias, overlay_value(node)));
            }
        }
    }
    Ok(out)
}

pub(super) fn label_scan<S: GraphSnapshot>(
    input: &Op,
    alias: &str,
    label: &str,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let stored: Vec<_> = match ctx.snapshot.resolve_label_id(label) {
        Some(label_id) => ctx
            .snapshot
            .nodes_by_label(label_id)
            .into_iter()
            .filter(|id| !ctx.deleted_nodes.contains(id))
            .collect(),
        None => Vec::new(),
    };

    let mut out = Vec::new();
    for row in rows {
        for id in &stored {
            out.push(row.clone().with(alias, Value::NodeId(*id)));
        }
        for node in &ctx.created_nodes {
            if node.labels.iter().any(|l| l == label) && !ctx.deleted_nodes.contains(&node.id) {
                out.push(row.clone().with(alias, overlay_value(node)));
            }
        }
    }
    Ok(out)
}

pub(super) fn index_probe<S: GraphSnapshot>(
    input: &Op,
    alias: &str,
    label: &str,
    property: &str,
    value: &Expression,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;

    let mut out = Vec::new();
    for row in rows {
        let wanted = evaluate_expression_value(value, &row, ctx.snapshot, ctx.params);
        let stored_prop = super::convert_executor_value_to_property(&wanted).ok();

        let stored: Vec<_> = match stored_prop
            .as_ref()
            .and_then(|p| ctx.snapshot.lookup_index(label, property, p))
        {
            Some(ids) => ids,
            None => {
                // No index for this label/property pair: fall back to a
                // label scan filtered on the stored value.
                match ctx.snapshot.resolve_label_id(label) {
                    Some(label_id) => ctx
                        .snapshot
                        .nodes_by_label(label_id)
                        .into_iter()
                        .filter(|id| {
                            ctx.snapshot.node_property(*id, property).as_ref() == stored_prop.as_ref()
                        })
                        .collect(),
                    None => Vec::new(),
                }
            }
        };

        for id in stored {
            if !ctx.deleted_nodes.contains(&id) {
                out.push(row.clone().with(alias, Value::NodeId(id)));
            }
        }
        for node in &ctx.created_nodes {
            if node.labels.iter().any(|l| l == label)
                && node.properties.get(property) == Some(&wanted)
                && !ctx.deleted_nodes.contains(&node.id)
            {
                out.push(row.clone().with(alias, overlay_value(node)));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::super::{ExecCtx, Op, run};
    use crate::model::GraphStore;
    use crate::model::memory::MemoryGraph;
    use crate::query_api::Params;
    use std::collections::BTreeMap;

    #[test]
    fn label_scan_only_sees_matching_nodes() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["Person"], BTreeMap::new());
        graph.insert_node(&["Movie"], BTreeMap::new());
        let snap = graph.snapshot();
        let params = Params::new();
        let mut ctx = ExecCtx::read_only(&snap, &params);

        let op = Op::LabelScan {
            input: Box::new(Op::Unit),
            alias: "n".into(),
            label: "Person".into(),
        };
        let rows = run(&op, &mut ctx).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn all_nodes_cross_joins_each_input_row() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["A"], BTreeMap::new());
        graph.insert_node(&["B"], BTreeMap::new());
        let snap = graph.snapshot();
        let params = Params::new();
        let mut ctx = ExecCtx::read_only(&snap, &params);

        let op = Op::AllNodes {
            input: Box::new(Op::AllNodes {
                input: Box::new(Op::Unit),
                alias: "a".into(),
            }),
            alias: "b".into(),
        };
        let rows = run(&op, &mut ctx).unwrap();
        assert_eq!(rows.len(), 4);
    }
}
