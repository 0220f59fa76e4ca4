//! Arithmetic over runtime values.
//!
//! `+` doubles as numeric addition, string/list concatenation, duration
//! addition, and temporal-string shifting; the other operators stay
//! numeric except where a duration scales. Integer arithmetic stays
//! integer until it would overflow, then widens to float rather than
//! panicking. Division always checks for zero and yields Null.

use super::duration_value::{
    combine_durations, duration_from_value, duration_value, scale_duration,
};
use super::temporal_build::{shift_temporal_string, ShiftDirection};
use super::temporal_text::parse_temporal_string;
use super::Value;

pub(super) fn add_values(left: &Value, right: &Value) -> Value {
    if matches!(left, Value::Null) || matches!(right, Value::Null) {
        return Value::Null;
    }

    // date/datetime string + duration, in either operand order
    if let Value::String(text) = left
        && duration_from_value(right).is_some()
        && parse_temporal_string(text).is_some()
    {
        return shift_temporal_string(text, right, ShiftDirection::Forward)
            .map(Value::String)
            .unwrap_or(Value::Null);
    }
    if let Value::String(text) = right
        && duration_from_value(left).is_some()
        && parse_temporal_string(text).is_some()
    {
        return shift_temporal_string(text, left, ShiftDirection::Forward)
            .map(Value::String)
            .unwrap_or(Value::Null);
    }

    if let (Some(l), Some(r)) = (duration_from_value(left), duration_from_value(right)) {
        return duration_value(combine_durations(&l, &r, 1));
    }

    match (left, right) {
        (Value::String(l), Value::String(r)) => Value::String(format!("{l}{r}")),
        (Value::List(l), Value::List(r)) => {
            let mut out = l.clone();
            out.extend(r.iter().cloned());
            Value::List(out)
        }
        (Value::List(l), single) => {
            let mut out = l.clone();
            out.push(single.clone());
            Value::List(out)
        }
        (single, Value::List(r)) => {
            let mut out = Vec::with_capacity(r.len() + 1);
            out.push(single.clone());
            out.extend(r.iter().cloned());
            Value::List(out)
        }
        _ => int_preserving(left, right, i64::checked_add, |l, r| l + r),
    }
}

pub(super) fn subtract_values(left: &Value, right: &Value) -> Value {
    if matches!(left, Value::Null) || matches!(right, Value::Null) {
        return Value::Null;
    }

    if let Value::String(text) = left
        && duration_from_value(right).is_some()
        && parse_temporal_string(text).is_some()
    {
        return shift_temporal_string(text, right, ShiftDirection::Backward)
            .map(Value::String)
            .unwrap_or(Value::Null);
    }

    if let (Some(l), Some(r)) = (duration_from_value(left), duration_from_value(right)) {
        return duration_value(combine_durations(&l, &r, -1));
    }

    int_preserving(left, right, i64::checked_sub, |l, r| l - r)
}

pub(super) fn multiply_values(left: &Value, right: &Value) -> Value {
    if matches!(left, Value::Null) || matches!(right, Value::Null) {
        return Value::Null;
    }

    if let (Some(parts), Some(factor)) = (duration_from_value(left), plain_number(right)) {
        return scale_duration(parts, factor)
            .map(duration_value)
            .unwrap_or(Value::Null);
    }
    if let (Some(factor), Some(parts)) = (plain_number(left), duration_from_value(right)) {
        return scale_duration(parts, factor)
            .map(duration_value)
            .unwrap_or(Value::Null);
    }

    int_preserving(left, right, i64::checked_mul, |l, r| l * r)
}

pub(super) fn divide_values(left: &Value, right: &Value) -> Value {
    if matches!(left, Value::Null) || matches!(right, Value::Null) {
        return Value::Null;
    }

    if let (Some(parts), Some(divisor)) = (duration_from_value(left), plain_number(right)) {
        if divisor == 0.0 {
            return Value::Null;
        }
        return scale_duration(parts, 1.0 / divisor)
            .map(duration_value)
            .unwrap_or(Value::Null);
    }

    // Division always widens to float; only dividing by an exact zero
    // integer is undefined (Null).
    match (left, right) {
        (Value::Int(_), Value::Int(0)) => Value::Null,
        (Value::Int(l), Value::Int(r)) => Value::Float(*l as f64 / *r as f64),
        (Value::Int(l), Value::Float(r)) => Value::Float(*l as f64 / r),
        (Value::Float(l), Value::Int(r)) => Value::Float(l / *r as f64),
        (Value::Float(l), Value::Float(r)) => Value::Float(l / r),
        _ => Value::Null,
    }
}

pub(super) fn modulo_values(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        (_, Value::Int(0)) => Value::Null,
        (_, Value::Float(r)) if *r == 0.0 => Value::Null,
        (Value::Int(l), Value::Int(r)) => l
            .checked_rem(*r)
            .map(Value::Int)
            .unwrap_or(Value::Int(0)),
        (Value::Int(l), Value::Float(r)) => Value::Float((*l as f64) % r),
        (Value::Float(l), Value::Int(r)) => Value::Float(l % *r as f64),
        (Value::Float(l), Value::Float(r)) => Value::Float(l % r),
        _ => Value::Null,
    }
}

pub(super) fn power_values(left: &Value, right: &Value) -> Value {
    match (plain_number(left), plain_number(right)) {
        (Some(base), Some(exponent)) => Value::Float(base.powf(exponent)),
        _ => Value::Null,
    }
}

fn plain_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Both ints: stay integer, falling back to float on overflow. Any float:
/// float. Anything else: Null.
fn int_preserving(
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Value {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => int_op(*l, *r)
            .map(Value::Int)
            .unwrap_or_else(|| Value::Float(float_op(*l as f64, *r as f64))),
        (Value::Int(l), Value::Float(r)) => Value::Float(float_op(*l as f64, *r)),
        (Value::Float(l), Value::Int(r)) => Value::Float(float_op(*l, *r as f64)),
        (Value::Float(l), Value::Float(r)) => Value::Float(float_op(*l, *r)),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_stays_integer() {
        assert_eq!(add_values(&Value::Int(1), &Value::Int(2)), Value::Int(3));
        assert_eq!(
            add_values(&Value::Int(1), &Value::Float(0.5)),
            Value::Float(1.5)
        );
    }

    #[test]
    fn integer_overflow_widens_to_float() {
        for out in [
            add_values(&Value::Int(i64::MAX), &Value::Int(1)),
            subtract_values(&Value::Int(i64::MIN), &Value::Int(1)),
            multiply_values(&Value::Int(i64::MAX), &Value::Int(2)),
        ] {
            assert!(matches!(out, Value::Float(f) if f.is_finite()), "{out:?}");
        }
    }

    #[test]
    fn division_by_zero_is_null() {
        assert_eq!(divide_values(&Value::Int(1), &Value::Int(0)), Value::Null);
        assert_eq!(modulo_values(&Value::Int(1), &Value::Int(0)), Value::Null);
    }

    #[test]
    fn division_always_yields_float() {
        assert_eq!(divide_values(&Value::Int(7), &Value::Int(2)), Value::Float(3.5));
    }

    #[test]
    fn plus_concatenates_strings_and_lists() {
        assert_eq!(
            add_values(&Value::String("ab".into()), &Value::String("cd".into())),
            Value::String("abcd".into())
        );
        assert_eq!(
            add_values(&Value::List(vec![Value::Int(1)]), &Value::Int(2)),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }
}
