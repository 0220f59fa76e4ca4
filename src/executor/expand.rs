//! Relationship traversal: single-hop expansion, bounded variable-length
//! expansion, and path binding. Edges created earlier in the statement are
//! visible; edges already used by the current row are not reused, and a
//! variable-length walk never revisits a node within one path.

use super::{
    CreatedEdge, ExecCtx, ExpandDirection, Op, PathValue, RelationshipValue, Row, Value, run,
};
use crate::error::Result;
use crate::model::{EdgeKey, GraphSnapshot, InternalNodeId};

/// A traversal step: the edge plus the node it leads to, with the edge's
/// binding value (overlay edges carry their properties inline).
struct Hop {
    key: EdgeKey,
    next: InternalNodeId,
    binding: Value,
}

fn snapshot_hops<S: GraphSnapshot>(
    ctx: &ExecCtx<'_, S>,
    from: InternalNodeId,
    types: &[String],
    direction: ExpandDirection,
) -> Vec<Hop> {
    let mut hops = Vec::new();
    let mut push = |key: EdgeKey, next: InternalNodeId| {
        if !ctx.deleted_edges.contains(&key) && !ctx.deleted_nodes.contains(&next) {
            hops.push(Hop {
                key,
                next,
                binding: Value::EdgeKey(key),
            });
        }
    };

    for rel in ctx.resolve_rel_type_ids(types) {
        if rel.is_none() && !types.is_empty() {
            continue;
        }
        if matches!(direction, ExpandDirection::Out | ExpandDirection::Any) {
            for key in ctx.snapshot.neighbors(from, rel) {
                push(key, key.dst);
            }
        }
        if matches!(direction, ExpandDirection::In | ExpandDirection::Any) {
            for key in ctx.snapshot.incoming_neighbors(from, rel) {
                push(key, key.src);
            }
        }
    }

    // A self-loop shows up on both adjacency sides; keep it once.
    if direction == ExpandDirection::Any {
        let mut seen = std::collections::HashSet::new();
        hops.retain(|h| seen.insert((h.key, h.next)));
    }
    hops
}

fn overlay_hops<S: GraphSnapshot>(
    ctx: &ExecCtx<'_, S>,
    from: InternalNodeId,
    types: &[String],
    direction: ExpandDirection,
) -> Vec<Hop> {
    let type_ok = |edge: &CreatedEdge| types.is_empty() || types.iter().any(|t| *t == edge.rel_type);
    let mut hops = Vec::new();
    for edge in &ctx.created_edges {
        if !type_ok(edge) || ctx.deleted_edges.contains(&edge.key) {
            continue;
        }
        let binding = Value::Relationship(RelationshipValue {
            key: edge.key,
            rel_type: edge.rel_type.clone(),
            properties: edge.properties.clone(),
        });
        let outgoing = edge.key.src == from
            && matches!(direction, ExpandDirection::Out | ExpandDirection::Any);
        let incoming = edge.key.dst == from
            && matches!(direction, ExpandDirection::In | ExpandDirection::Any);
        if outgoing {
            hops.push(Hop {
                key: edge.key,
                next: edge.key.dst,
                binding: binding.clone(),
            });
        }
        if incoming && !(outgoing && edge.key.src == edge.key.dst) {
            hops.push(Hop {
                key: edge.key,
                next: edge.key.src,
                binding,
            });
        }
    }
    hops
}

fn hops_from<S: GraphSnapshot>(
    ctx: &ExecCtx<'_, S>,
    from: InternalNodeId,
    types: &[String],
    direction: ExpandDirection,
) -> Vec<Hop> {
    let mut hops = snapshot_hops(ctx, from, types, direction);
    hops.extend(overlay_hops(ctx, from, types, direction));
    hops
}

/// True when the row already binds this edge, directly or inside a path —
/// one MATCH never uses the same relationship twice.
fn row_uses_edge(row: &Row, key: EdgeKey) -> bool {
    row.columns().iter().any(|(_, v)| match v {
        Value::EdgeKey(bound) => *bound == key,
        Value::Relationship(rel) => rel.key == key,
        Value::Path(path) => path.edges.contains(&key),
        _ => false,
    })
}

fn node_binding<S: GraphSnapshot>(ctx: &ExecCtx<'_, S>, id: InternalNodeId) -> Value {
    match ctx.created_node(id) {
        Some(node) => Value::Node(super::NodeValue {
            id,
            labels: node.labels.clone(),
            properties: node.properties.clone(),
        }),
        None => Value::NodeId(id),
    }
}

#[allow(clippy::too_many_arguments)]
pub(super) fn expand<S: GraphSnapshot>(
    input: &Op,
    from: &str,
    edge_alias: &str,
    to: &str,
    to_bound: bool,
    types: &[String],
    direction: ExpandDirection,
    path: Option<&str>,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let mut out = Vec::new();

    for row in rows {
        let Some(src) = row.get_node(from) else {
            continue; // unbound or Null source: nothing to walk from
        };
        let bound_target = if to_bound { row.get_node(to) } else { None };

        for hop in hops_from(ctx, src, types, direction) {
            if row_uses_edge(&row, hop.key) {
                continue;
            }
            if to_bound {
                if bound_target != Some(hop.next) {
                    continue;
                }
            }
            let mut next = row
                .clone()
                .with(edge_alias, hop.binding.clone());
            if !to_bound {
                next = next.with(to, node_binding(ctx, hop.next));
            }
            if let Some(path_alias) = path {
                next.join_path(path_alias, src, hop.key, hop.next);
            }
            out.push(next);
        }
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
pub(super) fn var_expand<S: GraphSnapshot>(
    input: &Op,
    from: &str,
    edge_alias: Option<&str>,
    to: &str,
    to_bound: bool,
    types: &[String],
    direction: ExpandDirection,
    min_hops: u32,
    max_hops: Option<u32>,
    path: Option<&str>,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let mut out = Vec::new();

    for row in rows {
        let Some(src) = row.get_node(from) else {
            continue;
        };
        let bound_target = if to_bound { row.get_node(to) } else { None };

        // Depth-first over simple paths: a node appears at most once per
        // path, which also bounds an unlimited `*`.
        let mut walk: Vec<(EdgeKey, Value, InternalNodeId)> = Vec::new();
        let mut visited = vec![src];
        descend(
            ctx,
            &row,
            src,
            types,
            direction,
            min_hops,
            max_hops,
            bound_target,
            &mut walk,
            &mut visited,
            &mut |walk, terminal, ctx| {
                let mut next = row.clone();
                if let Some(alias) = edge_alias {
                    next = next.with(
                        alias,
                        Value::List(walk.iter().map(|(_, binding, _)| binding.clone()).collect()),
                    );
                }
                if !to_bound {
                    next = next.with(to, node_binding(ctx, terminal));
                }
                if let Some(path_alias) = path {
                    let mut nodes = vec![src];
                    let mut edges = Vec::new();
                    for (key, _, stop) in walk {
                        edges.push(*key);
                        nodes.push(*stop);
                    }
                    next = next.with(path_alias, Value::Path(PathValue { nodes, edges }));
                }
                out.push(next);
            },
        );
    }
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn descend<S: GraphSnapshot>(
    ctx: &ExecCtx<'_, S>,
    row: &Row,
    here: InternalNodeId,
    types: &[String],
    direction: ExpandDirection,
    min_hops: u32,
    max_hops: Option<u32>,
    bound_target: Option<InternalNodeId>,
    walk: &mut Vec<(EdgeKey, Value, InternalNodeId)>,
    visited: &mut Vec<InternalNodeId>,
    emit: &mut impl FnMut(&[(EdgeKey, Value, InternalNodeId)], InternalNodeId, &ExecCtx<'_, S>),
) {
    let depth = walk.len() as u32;
    if depth >= min_hops && depth > 0 {
        match bound_target {
            Some(target) if target != here => {}
            _ => emit(walk, here, ctx),
        }
    }
    if let Some(max) = max_hops
        && depth >= max
    {
        return;
    }

    for hop in hops_from(ctx, here, types, direction) {
        if visited.contains(&hop.next) || row_uses_edge(row, hop.key) {
            continue;
        }
        if walk.iter().any(|(key, _, _)| *key == hop.key) {
            continue;
        }
        walk.push((hop.key, hop.binding, hop.next));
        visited.push(hop.next);
        descend(
            ctx,
            row,
            hop.next,
            types,
            direction,
            min_hops,
            max_hops,
            bound_target,
            walk,
            visited,
            emit,
        );
        visited.pop();
        walk.pop();
    }
}

pub(super) fn bind_single_node_path<S: GraphSnapshot>(
    input: &Op,
    alias: &str,
    node: &str,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let value = match row.get_node(node) {
                Some(id) => Value::Path(PathValue {
                    nodes: vec![id],
                    edges: vec![],
                }),
                None => Value::Null,
            };
            row.with(alias, value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::super::{ExecCtx, ExpandDirection, Op, Value, run};
    use crate::model::GraphStore;
    use crate::model::memory::MemoryGraph;
    use crate::query_api::Params;
    use std::collections::BTreeMap;

    fn chain_graph() -> MemoryGraph {
        // 0 -> 1 -> 2
        let graph = MemoryGraph::new();
        graph.insert_node(&["N"], BTreeMap::new());
        graph.insert_node(&["N"], BTreeMap::new());
        graph.insert_node(&["N"], BTreeMap::new());
        graph.insert_edge(0, "LINKS", 1, BTreeMap::new());
        graph.insert_edge(1, "LINKS", 2, BTreeMap::new());
        graph
    }

    fn scan_then(op: impl FnOnce(Box<Op>) -> Op) -> Op {
        op(Box::new(Op::Rows(vec![
            super::super::Row::default().with("a", Value::NodeId(0)),
        ])))
    }

    #[test]
    fn expand_follows_outgoing_edges() {
        let graph = chain_graph();
        let snap = graph.snapshot();
        let params = Params::new();
        let mut ctx = ExecCtx::read_only(&snap, &params);

        let op = scan_then(|input| Op::Expand {
            input,
            from: "a".into(),
            edge: "r".into(),
            to: "b".into(),
            to_bound: false,
            types: vec!["LINKS".into()],
            direction: ExpandDirection::Out,
            path: None,
        });
        let rows = run(&op, &mut ctx).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_node("b"), Some(1));
    }

    #[test]
    fn var_expand_collects_paths_between_bounds() {
        let graph = chain_graph();
        let snap = graph.snapshot();
        let params = Params::new();
        let mut ctx = ExecCtx::read_only(&snap, &params);

        let op = scan_then(|input| Op::VarExpand {
            input,
            from: "a".into(),
            edge: None,
            to: "b".into(),
            to_bound: false,
            types: vec![],
            direction: ExpandDirection::Out,
            min_hops: 1,
            max_hops: Some(2),
            path: None,
        });
        let rows = run(&op, &mut ctx).unwrap();
        // One hop reaches node 1, two hops reach node 2.
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn unknown_type_matches_nothing() {
        let graph = chain_graph();
        let snap = graph.snapshot();
        let params = Params::new();
        let mut ctx = ExecCtx::read_only(&snap, &params);

        let op = scan_then(|input| Op::Expand {
            input,
            from: "a".into(),
            edge: "r".into(),
            to: "b".into(),
            to_bound: false,
            types: vec!["NOPE".into()],
            direction: ExpandDirection::Out,
            path: None,
        });
        assert!(run(&op, &mut ctx).unwrap().is_empty());
    }
}
