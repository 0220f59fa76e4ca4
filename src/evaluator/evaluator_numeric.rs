use super::Value;

pub(super) fn cast_to_integer(value: Option<&Value>) -> Value {
    let Some(value) = value else {
        return Value::Null;
    };
    match value {
        Value::Null => Value::Null,
        Value::Int(i) => Value::Int(*i),
        Value::Float(f) => {
            if !f.is_finite() {
                return Value::Null;
            }
            let truncated = f.trunc();
            if truncated < i64::MIN as f64 || truncated > i64::MAX as f64 {
                Value::Null
            } else {
                Value::Int(truncated as i64)
            }
        }
        Value::String(s) => {
            if let Ok(i) = s.parse::<i64>() {
                return Value::Int(i);
            }
            if let Ok(f) = s.parse::<f64>() {
                return cast_to_integer(Some(&Value::Float(f)));
            }
            Value::Null
        }
        _ => Value::Null,
    }
}

pub(super) fn cast_to_float(value: Option<&Value>) -> Value {
    let Some(value) = value else {
        return Value::Null;
    };
    match value {
        Value::Null => Value::Null,
        Value::Int(i) => Value::Float(*i as f64),
        Value::Float(f) => {
            if f.is_finite() {
                Value::Float(*f)
            } else {
                Value::Null
            }
        }
        Value::String(s) => s
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

pub(super) fn cast_to_boolean(value: Option<&Value>) -> Value {
    let Some(value) = value else {
        return Value::Null;
    };
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(*b),
        Value::String(s) => {
            if s.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if s.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                Value::Null
            }
        }
        _ => Value::Null,
    }
}

/// Conversion casts, including the `...OrNull` and `...List` variants. The
/// plain casts already coerce failures to `Null` (the evaluator never raises),
/// so the `OrNull` spellings share their implementation.
pub(super) fn evaluate_conversion_function(name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "tointeger" | "tointegerornull" => Some(cast_to_integer(args.first())),
        "tofloat" | "tofloatornull" => Some(cast_to_float(args.first())),
        "toboolean" | "tobooleanornull" => Some(cast_to_boolean(args.first())),
        "tostringornull" => Some(cast_to_scalar_string(args.first())),
        "tointegerlist" => Some(cast_list(args.first(), |v| cast_to_integer(Some(v)))),
        "tofloatlist" => Some(cast_list(args.first(), |v| cast_to_float(Some(v)))),
        "tobooleanlist" => Some(cast_list(args.first(), |v| cast_to_boolean(Some(v)))),
        "tostringlist" => Some(cast_list(args.first(), |v| cast_to_scalar_string(Some(v)))),
        _ => None,
    }
}

fn cast_to_scalar_string(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(Value::Int(i)) => Value::String(i.to_string()),
        Some(Value::Float(f)) => Value::String(f.to_string()),
        Some(Value::Bool(b)) => Value::String(b.to_string()),
        _ => Value::Null,
    }
}

fn cast_list(value: Option<&Value>, cast: impl Fn(&Value) -> Value) -> Value {
    match value {
        Some(Value::List(items)) => Value::List(items.iter().map(cast).collect()),
        Some(Value::Null) | None => Value::Null,
        _ => Value::Null,
    }
}
