//! Core list/map/path functions, plus the internal `__index`/`__slice`/
//! `__getprop` forms the parser desugars subscripts and computed property
//! access into. `keys()` and `properties()` apply the internal-property
//! filter — embedding-shaped columns never leak through them.

use super::Value;
use crate::executor::{convert_api_property_to_value, is_internal_property};
use crate::model::GraphSnapshot;
use std::collections::BTreeMap;

pub(super) fn evaluate_collection_function<S: GraphSnapshot>(
    name: &str,
    args: &[Value],
    snapshot: &S,
) -> Option<Value> {
    let value = match name {
        "size" => size_of(args.first()),
        "length" => path_length(args.first()),
        "head" => nth_of_list(args.first(), |items| items.first().cloned()),
        "last" => nth_of_list(args.first(), |items| items.last().cloned()),
        "tail" => tail_of(args.first()),
        "range" => range_of(args),
        "nodes" => path_nodes(args.first()),
        "relationships" => path_edges(args.first()),
        "keys" => keys_of(args.first(), snapshot),
        "properties" => properties_of(args.first(), snapshot),
        "indexof" => index_of(args),
        "slice" => {
            // The callable spelling of list[start..end].
            let (Some(target), Some(start)) = (args.first(), args.get(1)) else {
                return Some(Value::Null);
            };
            let end = args.get(2).cloned().unwrap_or(Value::Null);
            subscript_slice(&[target.clone(), start.clone(), end])
        }
        "__index" => subscript(args, snapshot),
        "__slice" => subscript_slice(args),
        "__getprop" => computed_property(args, snapshot),
        _ => return None,
    };
    Some(value)
}

fn size_of(arg: Option<&Value>) -> Value {
    match arg {
        Some(Value::List(items)) => Value::Int(items.len() as i64),
        Some(Value::String(text)) => Value::Int(text.chars().count() as i64),
        Some(Value::Map(map)) => Value::Int(map.len() as i64),
        _ => Value::Null,
    }
}

fn path_length(arg: Option<&Value>) -> Value {
    match arg {
        Some(Value::Path(path)) => Value::Int(path.edges.len() as i64),
        Some(Value::ReifiedPath(path)) => Value::Int(path.relationships.len() as i64),
        _ => Value::Null,
    }
}

fn nth_of_list(arg: Option<&Value>, pick: impl Fn(&[Value]) -> Option<Value>) -> Value {
    match arg {
        Some(Value::List(items)) => pick(items).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn tail_of(arg: Option<&Value>) -> Value {
    match arg {
        Some(Value::List(items)) if items.len() > 1 => Value::List(items[1..].to_vec()),
        Some(Value::List(_)) => Value::List(Vec::new()),
        _ => Value::Null,
    }
}

fn path_nodes(arg: Option<&Value>) -> Value {
    match arg {
        Some(Value::Path(path)) => {
            Value::List(path.nodes.iter().map(|id| Value::NodeId(*id)).collect())
        }
        Some(Value::ReifiedPath(path)) => Value::List(
            path.nodes
                .iter()
                .map(|node| Value::Node(node.clone()))
                .collect(),
        ),
        _ => Value::Null,
    }
}

fn path_edges(arg: Option<&Value>) -> Value {
    match arg {
        Some(Value::Path(path)) => {
            Value::List(path.edges.iter().map(|key| Value::EdgeKey(*key)).collect())
        }
        Some(Value::ReifiedPath(path)) => Value::List(
            path.relationships
                .iter()
                .map(|rel| Value::Relationship(rel.clone()))
                .collect(),
        ),
        _ => Value::Null,
    }
}

/// `range(start, end[, step])`, both bounds inclusive. A zero step is
/// undefined; overflow stops the walk rather than wrapping.
fn range_of(args: &[Value]) -> Value {
    let int_at = |at: usize| match args.get(at) {
        Some(Value::Int(v)) => Some(*v),
        _ => None,
    };
    let (Some(start), Some(end)) = (int_at(0), int_at(1)) else {
        return Value::Null;
    };
    let step = match args.len() {
        2 => 1,
        3 => match int_at(2) {
            Some(0) | None => return Value::Null,
            Some(step) => step,
        },
        _ => return Value::Null,
    };

    let mut out = Vec::new();
    let mut at = start;
    while (step > 0 && at <= end) || (step < 0 && at >= end) {
        out.push(Value::Int(at));
        match at.checked_add(step) {
            Some(next) => at = next,
            None => break,
        }
    }
    Value::List(out)
}

/// The non-hidden property names of a map or graph entity.
fn keys_of<S: GraphSnapshot>(arg: Option<&Value>, snapshot: &S) -> Value {
    match arg {
        Some(Value::Map(map)) => {
            Value::List(map.keys().map(|k| Value::String(k.clone())).collect())
        }
        _ => match properties_of(arg, snapshot) {
            Value::Map(props) => {
                Value::List(props.keys().map(|k| Value::String(k.clone())).collect())
            }
            other => other,
        },
    }
}

fn filtered<'a>(
    entries: impl Iterator<Item = (&'a String, &'a Value)>,
) -> BTreeMap<String, Value> {
    entries
        .filter(|(key, _)| !is_internal_property(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn properties_of<S: GraphSnapshot>(arg: Option<&Value>, snapshot: &S) -> Value {
    match arg {
        Some(Value::Map(map)) => Value::Map(map.clone()),
        Some(Value::Node(node)) => Value::Map(filtered(node.properties.iter())),
        Some(Value::Relationship(rel)) => Value::Map(filtered(rel.properties.iter())),
        Some(Value::NodeId(id)) => match snapshot.node_properties(*id) {
            Some(props) => Value::Map(stored_filtered(props)),
            None => Value::Null,
        },
        Some(Value::EdgeKey(key)) => match snapshot.edge_properties(*key) {
            Some(props) => Value::Map(stored_filtered(props)),
            None => Value::Null,
        },
        _ => Value::Null,
    }
}

fn stored_filtered(
    props: BTreeMap<String, crate::model::PropertyValue>,
) -> BTreeMap<String, Value> {
    props
        .into_iter()
        .filter(|(key, _)| !is_internal_property(key))
        .map(|(key, value)| {
            let converted = convert_api_property_to_value(&value);
            (key, converted)
        })
        .collect()
}

fn index_of(args: &[Value]) -> Value {
    match (args.first(), args.get(1)) {
        (Some(Value::List(items)), Some(needle)) => items
            .iter()
            .position(|item| item == needle)
            .map(|at| Value::Int(at as i64))
            .unwrap_or(Value::Int(-1)),
        (Some(Value::String(text)), Some(Value::String(needle))) => text
            .find(needle.as_str())
            .map(|byte_at| Value::Int(text[..byte_at].chars().count() as i64))
            .unwrap_or(Value::Int(-1)),
        _ => Value::Null,
    }
}

/// Negative subscripts count from the end; out of range is Null.
fn wrap_index(index: i64, len: i64) -> Option<usize> {
    let at = if index < 0 { len + index } else { index };
    (0..len).contains(&at).then_some(at as usize)
}

/// `base[subscript]`: list/string positions, or key lookup on maps and
/// entities.
fn subscript<S: GraphSnapshot>(args: &[Value], snapshot: &S) -> Value {
    let (Some(base), Some(index)) = (args.first(), args.get(1)) else {
        return Value::Null;
    };
    match (base, index) {
        (Value::List(items), Value::Int(at)) => wrap_index(*at, items.len() as i64)
            .map(|at| items[at].clone())
            .unwrap_or(Value::Null),
        (Value::String(text), Value::Int(at)) => {
            let chars: Vec<char> = text.chars().collect();
            wrap_index(*at, chars.len() as i64)
                .map(|at| Value::String(chars[at].to_string()))
                .unwrap_or(Value::Null)
        }
        (base, Value::String(key)) => read_keyed(base, key, snapshot),
        _ => Value::Null,
    }
}

fn computed_property<S: GraphSnapshot>(args: &[Value], snapshot: &S) -> Value {
    let (Some(base), Some(Value::String(key))) = (args.first(), args.get(1)) else {
        return Value::Null;
    };
    read_keyed(base, key, snapshot)
}

fn read_keyed<S: GraphSnapshot>(base: &Value, key: &str, snapshot: &S) -> Value {
    match base {
        Value::Map(map) => map.get(key).cloned().unwrap_or(Value::Null),
        Value::Node(node) => node.properties.get(key).cloned().unwrap_or(Value::Null),
        Value::Relationship(rel) => rel.properties.get(key).cloned().unwrap_or(Value::Null),
        Value::NodeId(id) => snapshot
            .node_property(*id, key)
            .as_ref()
            .map(convert_api_property_to_value)
            .unwrap_or(Value::Null),
        Value::EdgeKey(edge) => snapshot
            .edge_property(*edge, key)
            .as_ref()
            .map(convert_api_property_to_value)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// `base[start..end]`. Two encodings arrive from the parser: the five-arg
/// form carries explicit has-bound flags (an *explicit* Null bound is an
/// error, an omitted one defaults); the three-arg form treats Null as
/// omitted.
fn subscript_slice(args: &[Value]) -> Value {
    let (start_raw, end_raw, has_start, has_end) = match args.len() {
        5 => {
            let (Value::Bool(has_start), Value::Bool(has_end)) = (&args[3], &args[4]) else {
                return Value::Null;
            };
            (&args[1], &args[2], *has_start, *has_end)
        }
        3 => (
            &args[1],
            &args[2],
            !matches!(args[1], Value::Null),
            !matches!(args[2], Value::Null),
        ),
        _ => return Value::Null,
    };

    let bound = |raw: &Value, present: bool| -> Result<Option<i64>, ()> {
        if !present {
            return Ok(None);
        }
        match raw {
            Value::Int(v) => Ok(Some(*v)),
            _ => Err(()),
        }
    };
    let (Ok(start), Ok(end)) = (bound(start_raw, has_start), bound(end_raw, has_end)) else {
        return Value::Null;
    };

    let clamp = |at: Option<i64>, len: i64, default: i64| match at {
        Some(v) if v < 0 => (len + v).clamp(0, len),
        Some(v) => v.clamp(0, len),
        None => default,
    };

    match args.first() {
        Some(Value::List(items)) => {
            let len = items.len() as i64;
            let from = clamp(start, len, 0);
            let to = clamp(end, len, len);
            if to < from {
                Value::List(Vec::new())
            } else {
                Value::List(items[from as usize..to as usize].to_vec())
            }
        }
        Some(Value::String(text)) => {
            let chars: Vec<char> = text.chars().collect();
            let len = chars.len() as i64;
            let from = clamp(start, len, 0);
            let to = clamp(end, len, len);
            if to < from {
                Value::String(String::new())
            } else {
                Value::String(chars[from as usize..to as usize].iter().collect())
            }
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::NodeValue;
    use crate::model::GraphStore;
    use crate::model::memory::MemoryGraph;

    #[test]
    fn explicit_null_slice_bounds_are_errors_but_omitted_ones_default() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let explicit = subscript_slice(&[
            list.clone(),
            Value::Null,
            Value::Int(2),
            Value::Bool(true),
            Value::Bool(true),
        ]);
        assert_eq!(explicit, Value::Null);

        let omitted = subscript_slice(&[
            list.clone(),
            Value::Null,
            Value::Null,
            Value::Bool(false),
            Value::Bool(false),
        ]);
        assert_eq!(omitted, list);
    }

    #[test]
    fn negative_subscripts_count_from_the_end() {
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(subscript(&[list.clone(), Value::Int(-1)], &snap), Value::Int(3));
        assert_eq!(subscript(&[list, Value::Int(9)], &snap), Value::Null);
    }

    #[test]
    fn range_walks_in_both_directions() {
        assert_eq!(
            range_of(&[Value::Int(-1), Value::Int(1)]),
            Value::List(vec![Value::Int(-1), Value::Int(0), Value::Int(1)])
        );
        assert_eq!(range_of(&[Value::Int(0), Value::Int(-2)]), Value::List(vec![]));
        assert_eq!(
            range_of(&[Value::Int(3), Value::Int(1), Value::Int(-1)]),
            Value::List(vec![Value::Int(3), Value::Int(2), Value::Int(1)])
        );
    }

    fn node_with_embedding() -> Value {
        let mut properties = std::collections::BTreeMap::new();
        properties.insert("name".to_string(), Value::String("alice".to_string()));
        properties.insert(
            "embedding".to_string(),
            Value::List(vec![Value::Float(0.1), Value::Float(0.2)]),
        );
        Value::Node(NodeValue {
            id: 0,
            labels: vec!["Person".to_string()],
            properties,
        })
    }

    #[test]
    fn keys_and_properties_hide_embedding_columns() {
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        assert_eq!(
            keys_of(Some(&node_with_embedding()), &snap),
            Value::List(vec![Value::String("name".to_string())])
        );
        let Value::Map(props) = properties_of(Some(&node_with_embedding()), &snap) else {
            panic!("expected a map");
        };
        assert!(props.contains_key("name"));
        assert!(!props.contains_key("embedding"));
    }
}
