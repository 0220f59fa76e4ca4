//! Value equality and ordering.
//!
//! Two relations live here: Cypher equality (`=`/`<>`, three-valued, with
//! cross-type numeric comparison) and the total order used by ORDER BY and
//! `min`/`max`, where values of different kinds sort by a fixed kind rank
//! and Null lands last. Strings that parse as temporal values compare on
//! the calendar, not the text.

use super::temporal_build::{compare_time_of_day, compare_time_with_offset};
use super::temporal_text::parse_temporal_string;
use super::{TemporalValue, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// ---- equality ----

pub(super) fn cypher_equals(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        (Value::Int(l), Value::Int(r)) => Value::Bool(l == r),
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
            Value::Bool(f.is_finite() && *f == *i as f64)
        }
        (Value::Float(l), Value::Float(r)) => {
            Value::Bool(!l.is_nan() && !r.is_nan() && l == r)
        }
        (Value::List(l), Value::List(r)) => elementwise_equals(l, r),
        (Value::Map(l), Value::Map(r)) => entrywise_equals(l, r),
        _ => Value::Bool(left == right),
    }
}

/// Lists are equal when same-length and pairwise equal; an incomparable
/// (Null) pair makes the whole comparison Null unless a definite mismatch
/// decides it first.
fn elementwise_equals(left: &[Value], right: &[Value]) -> Value {
    if left.len() != right.len() {
        return Value::Bool(false);
    }
    let mut undecided = false;
    for (l, r) in left.iter().zip(right) {
        match cypher_equals(l, r) {
            Value::Bool(true) => {}
            Value::Bool(false) => return Value::Bool(false),
            _ => undecided = true,
        }
    }
    if undecided {
        Value::Null
    } else {
        Value::Bool(true)
    }
}

fn entrywise_equals(left: &BTreeMap<String, Value>, right: &BTreeMap<String, Value>) -> Value {
    if left.len() != right.len() {
        return Value::Bool(false);
    }
    let mut undecided = false;
    for (key, l) in left {
        let Some(r) = right.get(key) else {
            return Value::Bool(false);
        };
        match cypher_equals(l, r) {
            Value::Bool(true) => {}
            Value::Bool(false) => return Value::Bool(false),
            _ => undecided = true,
        }
    }
    if undecided {
        Value::Null
    } else {
        Value::Bool(true)
    }
}

// ---- comparison operators (<, <=, >, >=) ----

pub(super) fn compare_values<F>(left: &Value, right: &Value, accept: F) -> Value
where
    F: Fn(Ordering) -> bool,
{
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let l = numeric(left);
            let r = numeric(right);
            if l.is_nan() || r.is_nan() {
                return Value::Bool(false);
            }
            match l.partial_cmp(&r) {
                Some(ord) => Value::Bool(accept(ord)),
                None => Value::Null,
            }
        }
        (Value::Bool(l), Value::Bool(r)) => Value::Bool(accept(l.cmp(r))),
        (Value::String(l), Value::String(r)) => Value::Bool(accept(string_order(l, r))),
        (Value::List(l), Value::List(r)) => {
            for (a, b) in l.iter().zip(r) {
                match nullable_order(a, b) {
                    Some(Ordering::Equal) => {}
                    Some(ord) => return Value::Bool(accept(ord)),
                    None => return Value::Null,
                }
            }
            Value::Bool(accept(l.len().cmp(&r.len())))
        }
        _ => Value::Null,
    }
}

fn numeric(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

// ---- total order (ORDER BY, min/max, sorting) ----

/// Sort position of each value kind; values of different kinds never
/// interleave. Null is handled by the caller and sorts after everything.
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Map(_) => 0,
        Value::NodeId(_) | Value::ExternalId(_) | Value::Node(_) => 1,
        Value::EdgeKey(_) | Value::Relationship(_) => 2,
        Value::List(_) => 3,
        Value::Path(_) | Value::ReifiedPath(_) => 4,
        Value::String(_) => 5,
        Value::Bool(_) => 6,
        Value::Int(_) | Value::Float(_) => 7,
        Value::DateTime(_) => 8,
        Value::Blob(_) => 9,
        Value::Null => 10,
    }
}

/// NaN sorts after every other number, so an ascending sort puts it just
/// before Null.
fn float_order(l: f64, r: f64) -> Ordering {
    match (l.is_nan(), r.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
    }
}

/// Null-aware element order inside lists: Null compares highest.
fn nullable_order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Greater),
        (_, Value::Null) => Some(Ordering::Less),
        _ => order_compare_non_null(left, right),
    }
}

pub(super) fn order_compare_non_null(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        (Value::Float(l), Value::Float(r)) => Some(float_order(*l, *r)),
        (Value::Int(l), Value::Float(r)) => Some(float_order(*l as f64, *r)),
        (Value::Float(l), Value::Int(r)) => Some(float_order(*l, *r as f64)),
        (Value::String(l), Value::String(r)) => Some(string_order(l, r)),
        _ => {
            let by_kind = kind_rank(left).cmp(&kind_rank(right));
            if by_kind != Ordering::Equal {
                return Some(by_kind);
            }
            same_kind_order(left, right)
        }
    }
}

fn same_kind_order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Map(l), Value::Map(r)) => l.partial_cmp(r),
        (Value::List(l), Value::List(r)) => {
            for (a, b) in l.iter().zip(r) {
                match nullable_order(a, b) {
                    Some(Ordering::Equal) => {}
                    decided => return decided,
                }
            }
            Some(l.len().cmp(&r.len()))
        }
        (Value::DateTime(l), Value::DateTime(r)) => Some(l.cmp(r)),
        (Value::Blob(l), Value::Blob(r)) => Some(l.cmp(r)),
        _ => {
            if let (Some(l), Some(r)) = (node_identity(left), node_identity(right)) {
                return Some(l.cmp(&r));
            }
            if let (Some(l), Some(r)) = (edge_identity(left), edge_identity(right)) {
                return Some(l.cmp(&r));
            }
            if let (Some(l), Some(r)) = (path_identity(left), path_identity(right)) {
                return Some(l.cmp(&r));
            }
            left.partial_cmp(right)
        }
    }
}

fn node_identity(value: &Value) -> Option<u64> {
    match value {
        Value::NodeId(id) => Some(u64::from(*id)),
        Value::ExternalId(id) => Some(*id),
        Value::Node(node) => Some(u64::from(node.id)),
        _ => None,
    }
}

fn edge_identity(value: &Value) -> Option<crate::model::EdgeKey> {
    match value {
        Value::EdgeKey(key) => Some(*key),
        Value::Relationship(rel) => Some(rel.key),
        _ => None,
    }
}

fn path_identity(value: &Value) -> Option<(Vec<u64>, Vec<crate::model::EdgeKey>)> {
    match value {
        Value::Path(path) => Some((
            path.nodes.iter().map(|id| u64::from(*id)).collect(),
            path.edges.clone(),
        )),
        Value::ReifiedPath(path) => Some((
            path.nodes.iter().map(|node| u64::from(node.id)).collect(),
            path.relationships.iter().map(|rel| rel.key).collect(),
        )),
        _ => None,
    }
}

/// Strings that both parse as the same temporal kind compare on the parsed
/// value; everything else is lexicographic.
fn string_order(left: &str, right: &str) -> Ordering {
    match (parse_temporal_string(left), parse_temporal_string(right)) {
        (Some(TemporalValue::Date(l)), Some(TemporalValue::Date(r))) => l.cmp(&r),
        (Some(TemporalValue::LocalTime(l)), Some(TemporalValue::LocalTime(r))) => {
            compare_time_of_day(l, r)
        }
        (
            Some(TemporalValue::Time {
                time: lt,
                offset: lo,
            }),
            Some(TemporalValue::Time {
                time: rt,
                offset: ro,
            }),
        ) => compare_time_with_offset(lt, lo, rt, ro),
        (Some(TemporalValue::LocalDateTime(l)), Some(TemporalValue::LocalDateTime(r))) => l.cmp(&r),
        (Some(TemporalValue::DateTime(l)), Some(TemporalValue::DateTime(r))) => l.cmp(&r),
        _ => left.cmp(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_type_numeric_equality() {
        assert_eq!(
            cypher_equals(&Value::Int(2), &Value::Float(2.0)),
            Value::Bool(true)
        );
        assert_eq!(
            cypher_equals(&Value::Float(f64::NAN), &Value::Float(f64::NAN)),
            Value::Bool(false)
        );
        assert_eq!(cypher_equals(&Value::Null, &Value::Int(1)), Value::Null);
    }

    #[test]
    fn list_equality_is_three_valued() {
        let with_null = Value::List(vec![Value::Int(1), Value::Null]);
        let other = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(cypher_equals(&with_null, &other), Value::Null);

        let mismatch = Value::List(vec![Value::Int(9), Value::Null]);
        assert_eq!(cypher_equals(&mismatch, &other), Value::Bool(false));
    }

    #[test]
    fn kind_rank_keeps_maps_before_nodes_before_numbers() {
        let mut values = vec![
            Value::Int(1),
            Value::NodeId(0),
            Value::Map(Default::default()),
            Value::Null,
            Value::String("s".into()),
        ];
        values.sort_by(super::super::order_compare);
        assert!(matches!(values[0], Value::Map(_)));
        assert!(matches!(values[1], Value::NodeId(_)));
        assert!(matches!(values[2], Value::String(_)));
        assert!(matches!(values[3], Value::Int(_)));
        assert!(matches!(values[4], Value::Null));
    }

    #[test]
    fn nan_sorts_after_numbers_but_before_null() {
        let mut values = vec![Value::Null, Value::Float(f64::NAN), Value::Float(1.0)];
        values.sort_by(super::super::order_compare);
        assert!(matches!(values[0], Value::Float(f) if !f.is_nan()));
        assert!(matches!(values[1], Value::Float(f) if f.is_nan()));
        assert!(matches!(values[2], Value::Null));
    }

    #[test]
    fn comparison_on_mismatched_kinds_is_null() {
        assert_eq!(
            compare_values(&Value::Int(1), &Value::String("1".into()), |o| o.is_lt()),
            Value::Null
        );
    }
}
