use super::{Row, Value};
use crate::executor::{NodeValue, convert_api_property_to_value};
use crate::model::GraphSnapshot;
use std::collections::BTreeMap;

/// startNode()/endNode() answer with whatever the row already holds for
/// the node; otherwise they materialize a fresh value from storage.
fn materialize_node_from_row_or_snapshot<S: GraphSnapshot>(
    row: &Row,
    snapshot: &S,
    node_id: crate::model::InternalNodeId,
) -> Value {
    for (_, bound) in row.columns() {
        match bound {
            Value::Node(node) if node.id == node_id => return Value::Node(node.clone()),
            Value::NodeId(id) if *id == node_id => return Value::NodeId(*id),
            _ => {}
        }
    }

    let labels: Vec<String> = snapshot
        .resolve_node_labels(node_id)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|label| snapshot.resolve_label_name(label))
        .collect();
    let properties: BTreeMap<String, Value> = snapshot
        .node_properties(node_id)
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| (k.clone(), convert_api_property_to_value(v)))
        .collect();

    if labels.is_empty() && properties.is_empty() {
        Value::NodeId(node_id)
    } else {
        Value::Node(NodeValue {
            id: node_id,
            labels,
            properties,
        })
    }
}

pub(super) fn evaluate_graph_function<S: GraphSnapshot>(
    name: &str,
    args: &[Value],
    row: &Row,
    snapshot: &S,
) -> Option<Value> {
    match name {
        "startnode" => Some(evaluate_start_node(args, row, snapshot)),
        "endnode" => Some(evaluate_end_node(args, row, snapshot)),
        "labels" => Some(evaluate_labels(args, snapshot)),
        "haslabels" => Some(evaluate_has_labels(args, snapshot)),
        "type" => Some(evaluate_type(args, snapshot)),
        "id" => Some(evaluate_id(args)),
        "elementid" => Some(evaluate_element_id(args)),
        "degree" => Some(evaluate_degree(args, snapshot, Direction::Both)),
        "indegree" => Some(evaluate_degree(args, snapshot, Direction::Incoming)),
        "outdegree" => Some(evaluate_degree(args, snapshot, Direction::Outgoing)),
        _ => None,
    }
}

enum Direction {
    Incoming,
    Outgoing,
    Both,
}

fn evaluate_start_node<S: GraphSnapshot>(args: &[Value], row: &Row, snapshot: &S) -> Value {
    match args.first() {
        Some(Value::EdgeKey(edge_key)) => {
            materialize_node_from_row_or_snapshot(row, snapshot, edge_key.src)
        }
        Some(Value::Relationship(rel)) => {
            materialize_node_from_row_or_snapshot(row, snapshot, rel.key.src)
        }
        _ => Value::Null,
    }
}

fn evaluate_end_node<S: GraphSnapshot>(args: &[Value], row: &Row, snapshot: &S) -> Value {
    match args.first() {
        Some(Value::EdgeKey(edge_key)) => {
            materialize_node_from_row_or_snapshot(row, snapshot, edge_key.dst)
        }
        Some(Value::Relationship(rel)) => {
            materialize_node_from_row_or_snapshot(row, snapshot, rel.key.dst)
        }
        _ => Value::Null,
    }
}

fn evaluate_labels<S: GraphSnapshot>(args: &[Value], snapshot: &S) -> Value {
    match args.first() {
        Some(Value::NodeId(id)) => snapshot
            .resolve_node_labels(*id)
            .map(|labels| {
                Value::List(
                    labels
                        .into_iter()
                        .filter_map(|label_id| snapshot.resolve_label_name(label_id))
                        .map(Value::String)
                        .collect(),
                )
            })
            .unwrap_or(Value::Null),
        Some(Value::Node(node)) => {
            Value::List(node.labels.iter().cloned().map(Value::String).collect())
        }
        Some(Value::Null) => Value::Null,
        _ => Value::Null,
    }
}

fn evaluate_type<S: GraphSnapshot>(args: &[Value], snapshot: &S) -> Value {
    match args.first() {
        Some(Value::EdgeKey(edge_key)) => {
            if let Some(name) = snapshot.resolve_rel_type_name(edge_key.rel) {
                Value::String(name)
            } else {
                Value::String(format!("<{}>", edge_key.rel))
            }
        }
        Some(Value::Relationship(rel)) => Value::String(rel.rel_type.clone()),
        _ => Value::Null,
    }
}

fn evaluate_id(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::NodeId(id)) => Value::Int(*id as i64),
        Some(Value::Node(node)) => Value::Int(node.id as i64),
        Some(Value::EdgeKey(edge_key)) => Value::Int(edge_key.src as i64),
        Some(Value::Relationship(rel)) => Value::Int(rel.key.src as i64),
        _ => Value::Null,
    }
}

fn evaluate_element_id(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::NodeId(id)) => Value::String(id.to_string()),
        Some(Value::Node(node)) => Value::String(node.id.to_string()),
        Some(Value::EdgeKey(key)) => {
            Value::String(format!("{}-{}-{}", key.src, key.rel, key.dst))
        }
        Some(Value::Relationship(rel)) => Value::String(format!(
            "{}-{}-{}",
            rel.key.src, rel.key.rel, rel.key.dst
        )),
        _ => Value::Null,
    }
}

fn evaluate_has_labels<S: GraphSnapshot>(args: &[Value], snapshot: &S) -> Value {
    let wanted = match args.get(1) {
        Some(Value::List(items)) => items,
        _ => return Value::Null,
    };
    let Value::List(labels) = evaluate_labels(args, snapshot) else {
        return Value::Null;
    };
    let all_present = wanted.iter().all(|w| match w {
        Value::String(name) => labels
            .iter()
            .any(|l| matches!(l, Value::String(have) if have == name)),
        _ => false,
    });
    Value::Bool(all_present)
}

fn node_id_argument(arg: Option<&Value>) -> Option<crate::model::InternalNodeId> {
    match arg {
        Some(Value::NodeId(id)) => Some(*id),
        Some(Value::Node(node)) => Some(node.id),
        _ => None,
    }
}

fn evaluate_degree<S: GraphSnapshot>(args: &[Value], snapshot: &S, direction: Direction) -> Value {
    let Some(iid) = node_id_argument(args.first()) else {
        return Value::Null;
    };
    let count = match direction {
        Direction::Incoming => snapshot.in_degree(iid, None),
        Direction::Outgoing => snapshot.out_degree(iid, None),
        Direction::Both => snapshot.in_degree(iid, None) + snapshot.out_degree(iid, None),
    };
    Value::Int(count as i64)
}
