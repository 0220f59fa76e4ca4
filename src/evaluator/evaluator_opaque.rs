//! `apoc.*` collection/map/convert/meta helpers, vector similarity, and the
//! opaque `kalman.*` callable family. These sit apart from the core
//! collection functions (`evaluator_collections`) because they are
//! namespaced, optional extensions rather than core Cypher builtins.

use super::Value;
use std::collections::BTreeMap;

pub(super) fn evaluate_opaque_function(name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "apoc.coll.sum" => Some(coll_sum(args)),
        "apoc.coll.avg" => Some(coll_avg(args)),
        "apoc.coll.min" => Some(coll_extremum(args, true)),
        "apoc.coll.max" => Some(coll_extremum(args, false)),
        "apoc.coll.sort" | "apoc.coll.sortnodes" => Some(coll_sort(args)),
        "apoc.coll.reverse" => Some(coll_reverse(args)),
        "apoc.coll.union" => Some(coll_union(args)),
        "apoc.coll.unionall" => Some(coll_union_all(args)),
        "apoc.coll.intersection" => Some(coll_intersection(args)),
        "apoc.coll.subtract" => Some(coll_subtract(args)),
        "apoc.coll.contains" => Some(coll_contains(args)),
        "apoc.coll.containsall" => Some(coll_contains_all(args)),
        "apoc.coll.containsany" => Some(coll_contains_any(args)),
        "apoc.coll.indexof" => Some(coll_index_of(args)),
        "apoc.coll.split" => Some(coll_split(args)),
        "apoc.coll.partition" => Some(coll_partition(args)),
        "apoc.coll.pairs" => Some(coll_pairs(args)),
        "apoc.coll.zip" => Some(coll_zip(args)),
        "apoc.coll.frequencies" => Some(coll_frequencies(args)),
        "apoc.coll.occurrences" => Some(coll_occurrences(args)),
        "apoc.coll.flatten" => Some(coll_flatten(args)),
        "apoc.coll.toset" => Some(coll_to_set(args)),
        "apoc.map.frompairs" => Some(map_from_pairs(args)),
        "apoc.map.fromlists" => Some(map_from_lists(args)),
        "apoc.map.merge" => Some(map_merge(args)),
        "apoc.map.removekey" => Some(map_remove_key(args)),
        "apoc.map.setkey" => Some(map_set_key(args)),
        "apoc.map.clean" => Some(map_clean(args)),
        "apoc.convert.tojson" => Some(convert_to_json(args)),
        "apoc.convert.fromjsonmap" => Some(convert_from_json_map(args)),
        "apoc.convert.fromjsonlist" => Some(convert_from_json_list(args)),
        "apoc.text.join" => Some(text_join(args)),
        "apoc.meta.type" => Some(meta_type(args)),
        "apoc.meta.istype" => Some(meta_is_type(args)),
        "valuetype" => Some(meta_type(args)),
        "vector.similarity.cosine" => Some(vector_cosine(args)),
        "vector.similarity.euclidean" => Some(vector_euclidean(args)),
        _ if name.starts_with("kalman.") => Some(kalman_opaque(name, args)),
        _ => None,
    }
}

fn numeric_list(args: &[Value]) -> Option<Vec<f64>> {
    match args.first() {
        Some(Value::List(items)) => items
            .iter()
            .map(|v| match v {
                Value::Int(i) => Some(*i as f64),
                Value::Float(f) => Some(*f),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn coll_sum(args: &[Value]) -> Value {
    numeric_list(args)
        .map(|vs| Value::Float(vs.iter().sum()))
        .unwrap_or(Value::Null)
}

fn coll_avg(args: &[Value]) -> Value {
    match numeric_list(args) {
        Some(vs) if !vs.is_empty() => Value::Float(vs.iter().sum::<f64>() / vs.len() as f64),
        Some(_) => Value::Null,
        None => Value::Null,
    }
}

fn coll_extremum(args: &[Value], want_min: bool) -> Value {
    if let Some(Value::List(items)) = args.first() {
        let mut sorted = items.clone();
        sorted.sort_by(super::order_compare);
        if want_min {
            sorted.into_iter().next().unwrap_or(Value::Null)
        } else {
            sorted.into_iter().next_back().unwrap_or(Value::Null)
        }
    } else {
        Value::Null
    }
}

fn coll_sort(args: &[Value]) -> Value {
    if let Some(Value::List(items)) = args.first() {
        let mut sorted = items.clone();
        sorted.sort_by(super::order_compare);
        Value::List(sorted)
    } else {
        Value::Null
    }
}

fn coll_reverse(args: &[Value]) -> Value {
    if let Some(Value::List(items)) = args.first() {
        let mut reversed = items.clone();
        reversed.reverse();
        Value::List(reversed)
    } else {
        Value::Null
    }
}

fn as_list(value: &Value) -> Option<&[Value]> {
    match value {
        Value::List(items) => Some(items),
        _ => None,
    }
}

fn coll_union(args: &[Value]) -> Value {
    let (Some(a), Some(b)) = (args.first().and_then(as_list), args.get(1).and_then(as_list)) else {
        return Value::Null;
    };
    let mut out: Vec<Value> = a.to_vec();
    for v in b {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    Value::List(out)
}

fn coll_union_all(args: &[Value]) -> Value {
    let (Some(a), Some(b)) = (args.first().and_then(as_list), args.get(1).and_then(as_list)) else {
        return Value::Null;
    };
    let mut out: Vec<Value> = a.to_vec();
    out.extend_from_slice(b);
    Value::List(out)
}

fn coll_intersection(args: &[Value]) -> Value {
    let (Some(a), Some(b)) = (args.first().and_then(as_list), args.get(1).and_then(as_list)) else {
        return Value::Null;
    };
    let mut out = Vec::new();
    for v in a {
        if b.contains(v) && !out.contains(v) {
            out.push(v.clone());
        }
    }
    Value::List(out)
}

fn coll_subtract(args: &[Value]) -> Value {
    let (Some(a), Some(b)) = (args.first().and_then(as_list), args.get(1).and_then(as_list)) else {
        return Value::Null;
    };
    Value::List(a.iter().filter(|v| !b.contains(v)).cloned().collect())
}

fn coll_contains(args: &[Value]) -> Value {
    match (args.first().and_then(as_list), args.get(1)) {
        (Some(list), Some(needle)) => Value::Bool(list.contains(needle)),
        _ => Value::Bool(false),
    }
}

fn coll_contains_all(args: &[Value]) -> Value {
    let (Some(a), Some(b)) = (args.first().and_then(as_list), args.get(1).and_then(as_list)) else {
        return Value::Bool(false);
    };
    Value::Bool(b.iter().all(|v| a.contains(v)))
}

fn coll_contains_any(args: &[Value]) -> Value {
    let (Some(a), Some(b)) = (args.first().and_then(as_list), args.get(1).and_then(as_list)) else {
        return Value::Bool(false);
    };
    Value::Bool(b.iter().any(|v| a.contains(v)))
}

fn coll_index_of(args: &[Value]) -> Value {
    match (args.first().and_then(as_list), args.get(1)) {
        (Some(list), Some(needle)) => list
            .iter()
            .position(|v| v == needle)
            .map(|i| Value::Int(i as i64))
            .unwrap_or(Value::Int(-1)),
        _ => Value::Int(-1),
    }
}

/// Splits a list on each occurrence of the separator value, dropping the
/// separators themselves.
fn coll_split(args: &[Value]) -> Value {
    let (Some(list), Some(separator)) = (args.first().and_then(as_list), args.get(1)) else {
        return Value::Null;
    };
    let mut out = Vec::new();
    let mut current = Vec::new();
    for item in list {
        if item == separator {
            if !current.is_empty() {
                out.push(Value::List(std::mem::take(&mut current)));
            }
        } else {
            current.push(item.clone());
        }
    }
    if !current.is_empty() {
        out.push(Value::List(current));
    }
    Value::List(out)
}

fn coll_partition(args: &[Value]) -> Value {
    let (Some(list), Some(Value::Int(size))) = (args.first().and_then(as_list), args.get(1))
    else {
        return Value::Null;
    };
    if *size <= 0 {
        return Value::List(vec![]);
    }
    Value::List(
        list.chunks(*size as usize)
            .map(|chunk| Value::List(chunk.to_vec()))
            .collect(),
    )
}

fn coll_pairs(args: &[Value]) -> Value {
    if let Some(items) = args.first().and_then(as_list) {
        Value::List(
            items
                .windows(2)
                .map(|w| Value::List(vec![w[0].clone(), w[1].clone()]))
                .collect(),
        )
    } else {
        Value::Null
    }
}

fn coll_zip(args: &[Value]) -> Value {
    let (Some(a), Some(b)) = (args.first().and_then(as_list), args.get(1).and_then(as_list)) else {
        return Value::Null;
    };
    Value::List(
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| Value::List(vec![x.clone(), y.clone()]))
            .collect(),
    )
}

fn value_key(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => format!("{other:?}"),
    }
}

fn coll_frequencies(args: &[Value]) -> Value {
    if let Some(items) = args.first().and_then(as_list) {
        let mut counts: BTreeMap<String, (Value, i64)> = BTreeMap::new();
        for item in items {
            let entry = counts
                .entry(value_key(item))
                .or_insert_with(|| (item.clone(), 0));
            entry.1 += 1;
        }
        Value::List(
            counts
                .into_values()
                .map(|(item, count)| {
                    let mut m = BTreeMap::new();
                    m.insert("item".to_string(), item);
                    m.insert("count".to_string(), Value::Int(count));
                    Value::Map(m)
                })
                .collect(),
        )
    } else {
        Value::Null
    }
}

fn coll_occurrences(args: &[Value]) -> Value {
    match (args.first().and_then(as_list), args.get(1)) {
        (Some(list), Some(needle)) => {
            Value::Int(list.iter().filter(|v| *v == needle).count() as i64)
        }
        _ => Value::Int(0),
    }
}

fn coll_flatten(args: &[Value]) -> Value {
    if let Some(items) = args.first().and_then(as_list) {
        let mut out = Vec::new();
        for item in items {
            match item {
                Value::List(inner) => out.extend(inner.iter().cloned()),
                other => out.push(other.clone()),
            }
        }
        Value::List(out)
    } else {
        Value::Null
    }
}

fn coll_to_set(args: &[Value]) -> Value {
    if let Some(items) = args.first().and_then(as_list) {
        let mut out: Vec<Value> = Vec::new();
        for item in items {
            if !out.contains(item) {
                out.push(item.clone());
            }
        }
        Value::List(out)
    } else {
        Value::Null
    }
}

fn map_from_pairs(args: &[Value]) -> Value {
    if let Some(pairs) = args.first().and_then(as_list) {
        let mut map = BTreeMap::new();
        for pair in pairs {
            if let Value::List(kv) = pair
                && kv.len() == 2
                && let Value::String(k) = &kv[0]
            {
                map.insert(k.clone(), kv[1].clone());
            }
        }
        Value::Map(map)
    } else {
        Value::Null
    }
}

fn map_from_lists(args: &[Value]) -> Value {
    let (Some(keys), Some(values)) =
        (args.first().and_then(as_list), args.get(1).and_then(as_list))
    else {
        return Value::Null;
    };
    let mut map = BTreeMap::new();
    for (k, v) in keys.iter().zip(values.iter()) {
        if let Value::String(key) = k {
            map.insert(key.clone(), v.clone());
        }
    }
    Value::Map(map)
}

fn as_map(value: &Value) -> Option<&BTreeMap<String, Value>> {
    match value {
        Value::Map(m) => Some(m),
        _ => None,
    }
}

fn map_merge(args: &[Value]) -> Value {
    let (Some(a), Some(b)) = (args.first().and_then(as_map), args.get(1).and_then(as_map)) else {
        return Value::Null;
    };
    let mut out = a.clone();
    for (k, v) in b {
        out.insert(k.clone(), v.clone());
    }
    Value::Map(out)
}

fn map_remove_key(args: &[Value]) -> Value {
    let (Some(m), Some(Value::String(key))) = (args.first().and_then(as_map), args.get(1)) else {
        return Value::Null;
    };
    let mut out = m.clone();
    out.remove(key);
    Value::Map(out)
}

fn map_set_key(args: &[Value]) -> Value {
    let (Some(m), Some(Value::String(key)), Some(value)) =
        (args.first().and_then(as_map), args.get(1), args.get(2))
    else {
        return Value::Null;
    };
    let mut out = m.clone();
    out.insert(key.clone(), value.clone());
    Value::Map(out)
}

fn map_clean(args: &[Value]) -> Value {
    let Some(m) = args.first().and_then(as_map) else {
        return Value::Null;
    };
    let remove_keys: Vec<String> = args
        .get(1)
        .and_then(as_list)
        .map(|l| {
            l.iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    let remove_values: Vec<Value> = args
        .get(2)
        .and_then(as_list)
        .map(|l| l.to_vec())
        .unwrap_or_default();

    let mut out = BTreeMap::new();
    for (k, v) in m {
        if remove_keys.contains(k) || remove_values.contains(v) {
            continue;
        }
        out.insert(k.clone(), v.clone());
    }
    Value::Map(out)
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
        _ => serde_json::Value::Null,
    }
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => {
            Value::Map(map.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect())
        }
    }
}

fn convert_to_json(args: &[Value]) -> Value {
    match args.first() {
        Some(v) => serde_json::to_string(&value_to_json(v))
            .map(Value::String)
            .unwrap_or(Value::Null),
        None => Value::Null,
    }
}

fn convert_from_json_map(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => serde_json::from_str::<serde_json::Value>(s)
            .ok()
            .filter(|v| v.is_object())
            .map(|v| json_to_value(&v))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn convert_from_json_list(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => serde_json::from_str::<serde_json::Value>(s)
            .ok()
            .filter(|v| v.is_array())
            .map(|v| json_to_value(&v))
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn text_join(args: &[Value]) -> Value {
    let Some(items) = args.first().and_then(as_list) else {
        return Value::Null;
    };
    let sep = match args.get(1) {
        Some(Value::String(s)) => s.as_str(),
        _ => "",
    };
    let parts: Vec<String> = items
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => format!("{other:?}"),
        })
        .collect();
    Value::String(parts.join(sep))
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOLEAN",
        Value::Int(_) => "INTEGER",
        Value::Float(_) => "FLOAT",
        Value::String(_) => "STRING",
        Value::List(_) => "LIST",
        Value::Map(_) => "MAP",
        Value::Node(_) | Value::NodeId(_) | Value::ExternalId(_) => "NODE",
        Value::Relationship(_) | Value::EdgeKey(_) => "RELATIONSHIP",
        Value::Path(_) | Value::ReifiedPath(_) => "PATH",
        Value::DateTime(_) => "DATE_TIME",
        Value::Blob(_) => "BYTE_ARRAY",
    }
}

fn meta_type(args: &[Value]) -> Value {
    match args.first() {
        Some(v) => Value::String(type_name(v).to_string()),
        None => Value::Null,
    }
}

fn meta_is_type(args: &[Value]) -> Value {
    match (args.first(), args.get(1)) {
        (Some(v), Some(Value::String(name))) => {
            Value::Bool(type_name(v).eq_ignore_ascii_case(name))
        }
        _ => Value::Bool(false),
    }
}

fn vector_cosine(args: &[Value]) -> Value {
    let Some(a) = numeric_list(args) else {
        return Value::Null;
    };
    let Some(b) = numeric_list(&args[1..]) else {
        return Value::Null;
    };
    if a.len() != b.len() || a.is_empty() {
        return Value::Null;
    }
    let dot: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Value::Null;
    }
    Value::Float(dot / (norm_a * norm_b))
}

fn vector_euclidean(args: &[Value]) -> Value {
    let Some(a) = numeric_list(args) else {
        return Value::Null;
    };
    let Some(b) = numeric_list(&args[1..]) else {
        return Value::Null;
    };
    if a.len() != b.len() || a.is_empty() {
        return Value::Null;
    }
    let sum_sq: f64 = a.iter().zip(&b).map(|(x, y)| (x - y).powi(2)).sum();
    Value::Float(sum_sq.sqrt())
}

/// `kalman.*` calls are opaque numeric callables: the core never runs real
/// filter math (that lives in the host's signal-processing collaborator),
/// it only needs a deterministic, JSON-shaped placeholder so pipelines that
/// thread a `kalman.*` call through a query don't break at evaluation time.
fn kalman_opaque(name: &str, args: &[Value]) -> Value {
    let mut state = BTreeMap::new();
    state.insert("call".to_string(), Value::String(name.to_string()));
    state.insert("args".to_string(), Value::List(args.to_vec()));
    Value::Map(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coll_sum_adds_mixed_numbers() {
        let args = vec![Value::List(vec![Value::Int(1), Value::Float(2.5)])];
        assert_eq!(evaluate_opaque_function("apoc.coll.sum", &args), Some(Value::Float(3.5)));
    }

    #[test]
    fn coll_intersection_keeps_shared_elements() {
        let args = vec![
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            Value::List(vec![Value::Int(2), Value::Int(3), Value::Int(4)]),
        ];
        assert_eq!(
            evaluate_opaque_function("apoc.coll.intersection", &args),
            Some(Value::List(vec![Value::Int(2), Value::Int(3)]))
        );
    }

    #[test]
    fn map_merge_is_right_biased() {
        let mut a = BTreeMap::new();
        a.insert("x".to_string(), Value::Int(1));
        let mut b = BTreeMap::new();
        b.insert("x".to_string(), Value::Int(2));
        b.insert("y".to_string(), Value::Int(3));
        let args = vec![Value::Map(a), Value::Map(b)];
        let Some(Value::Map(merged)) = evaluate_opaque_function("apoc.map.merge", &args) else {
            panic!("expected a map");
        };
        assert_eq!(merged.get("x"), Some(&Value::Int(2)));
        assert_eq!(merged.get("y"), Some(&Value::Int(3)));
    }

    #[test]
    fn convert_to_json_round_trips_through_from_json_map() {
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), Value::Int(1));
        let json = evaluate_opaque_function("apoc.convert.tojson", &[Value::Map(m.clone())]);
        let Some(Value::String(json_text)) = json else {
            panic!("expected a json string");
        };
        let round_tripped =
            evaluate_opaque_function("apoc.convert.fromjsonmap", &[Value::String(json_text)]);
        assert_eq!(round_tripped, Some(Value::Map(m)));
    }

    #[test]
    fn vector_cosine_of_identical_vectors_is_one() {
        let args = vec![
            Value::List(vec![Value::Float(1.0), Value::Float(0.0)]),
            Value::List(vec![Value::Float(1.0), Value::Float(0.0)]),
        ];
        assert_eq!(evaluate_opaque_function("vector.similarity.cosine", &args), Some(Value::Float(1.0)));
    }

    #[test]
    fn vector_euclidean_mismatched_lengths_is_null() {
        let args = vec![
            Value::List(vec![Value::Float(1.0)]),
            Value::List(vec![Value::Float(1.0), Value::Float(2.0)]),
        ];
        assert_eq!(evaluate_opaque_function("vector.similarity.euclidean", &args), Some(Value::Null));
    }

    #[test]
    fn meta_type_names_core_kinds() {
        assert_eq!(meta_type(&[Value::Int(1)]), Value::String("INTEGER".to_string()));
        assert_eq!(meta_type(&[Value::String("x".to_string())]), Value::String("STRING".to_string()));
    }

    #[test]
    fn unknown_name_returns_none() {
        assert_eq!(evaluate_opaque_function("not.a.function", &[]), None);
    }
}
