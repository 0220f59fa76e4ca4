//! Expression evaluation over the parsed tree.
//!
//! [`evaluate_expression_value`] recurses over an [`Expression`] with the
//! current row's bindings; it never returns a Rust error — type mismatches
//! and unknown identifiers coerce to `Null`, which is what lets OPTIONAL
//! MATCH rows flow through later expressions unharmed. Function calls
//! dispatch through a chain of per-family catalogs; the first family that
//! recognizes the (lowercased) name answers.

mod arith;
mod cmp;
mod duration_value;
mod evaluator_collections;
mod evaluator_graph_functions;
mod evaluator_membership;
mod evaluator_numeric;
mod evaluator_opaque;
mod evaluator_scalars;
mod evaluator_spatial;
mod loops;
mod pattern_match;
mod temporal_build;
mod temporal_text;

use crate::ast::{BinaryOperator, Expression, Literal, UnaryOperator};
use crate::executor::{Row, Value, convert_api_property_to_value};
use crate::model::GraphSnapshot;
use crate::query_api::Params;
use arith::{
    add_values, divide_values, modulo_values, multiply_values, power_values, subtract_values,
};
use chrono::{Datelike, Timelike};
use cmp::{compare_values, cypher_equals, order_compare_non_null};
use evaluator_collections::evaluate_collection_function;
use evaluator_graph_functions::evaluate_graph_function;
use evaluator_membership::{in_list, regex_match, string_predicate};
use evaluator_numeric::evaluate_conversion_function;
use evaluator_opaque::evaluate_opaque_function;
use evaluator_scalars::evaluate_scalar_function;
use evaluator_spatial::evaluate_spatial_function;
use loops::{evaluate_list_comprehension, evaluate_quantifier, evaluate_reduce};
use pattern_match::{evaluate_has_label, evaluate_pattern_comprehension, evaluate_pattern_exists};
use std::cmp::Ordering;
use temporal_build::evaluate_temporal_function;
use temporal_text::{TemporalValue, extract_timezone_name, format_offset, parse_temporal_string};

/// Evaluates a WHERE-style predicate: only a strict `true` passes.
pub fn evaluate_expression_bool<S: GraphSnapshot>(
    expr: &Expression,
    row: &Row,
    snapshot: &S,
    params: &Params,
) -> bool {
    matches!(
        evaluate_expression_value(expr, row, snapshot, params),
        Value::Bool(true)
    )
}

/// The total order used by ORDER BY and min/max: Null sorts after
/// everything, otherwise values compare within (then across) their kinds.
pub fn order_compare(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => order_compare_non_null(left, right).unwrap_or(Ordering::Equal),
    }
}

pub fn evaluate_expression_value<S: GraphSnapshot>(
    expr: &Expression,
    row: &Row,
    snapshot: &S,
    params: &Params,
) -> Value {
    match expr {
        Expression::Literal(literal) => literal_value(literal),
        Expression::Parameter(name) => params.get(name).cloned().unwrap_or(Value::Null),
        Expression::Variable(name) => row
            .get(name)
            .cloned()
            .or_else(|| params.get(name).cloned())
            .unwrap_or(Value::Null),
        Expression::PropertyAccess(access) => {
            property_of(&access.variable, &access.property, row, snapshot)
        }
        Expression::List(items) => Value::List(
            items
                .iter()
                .map(|item| evaluate_expression_value(item, row, snapshot, params))
                .collect(),
        ),
        Expression::Map(map) => Value::Map(
            map.properties
                .iter()
                .map(|pair| {
                    (
                        pair.key.clone(),
                        evaluate_expression_value(&pair.value, row, snapshot, params),
                    )
                })
                .collect(),
        ),
        Expression::Unary(unary) => {
            let operand = evaluate_expression_value(&unary.operand, row, snapshot, params);
            match unary.operator {
                UnaryOperator::Not => match operand {
                    Value::Bool(b) => Value::Bool(!b),
                    _ => Value::Null,
                },
                UnaryOperator::Negate => match operand {
                    Value::Int(i) => i
                        .checked_neg()
                        .map(Value::Int)
                        .unwrap_or_else(|| Value::Float(-(i as f64))),
                    Value::Float(f) => Value::Float(-f),
                    _ => Value::Null,
                },
            }
        }
        Expression::Binary(binary) => {
            let left = evaluate_expression_value(&binary.left, row, snapshot, params);
            let right = evaluate_expression_value(&binary.right, row, snapshot, params);
            binary_op(binary.operator, left, right, snapshot)
        }
        Expression::Case(case) => {
            for (condition, result) in &case.when_clauses {
                if matches!(
                    evaluate_expression_value(condition, row, snapshot, params),
                    Value::Bool(true)
                ) {
                    return evaluate_expression_value(result, row, snapshot, params);
                }
            }
            case.else_expression
                .as_ref()
                .map(|fallback| evaluate_expression_value(fallback, row, snapshot, params))
                .unwrap_or(Value::Null)
        }
        Expression::ListComprehension(comp) => {
            evaluate_list_comprehension(comp, row, snapshot, params)
        }
        Expression::PatternComprehension(comp) => {
            evaluate_pattern_comprehension(comp, row, snapshot, params)
        }
        Expression::Exists(exists) => match exists.as_ref() {
            crate::ast::ExistsExpression::Pattern(pattern) => {
                evaluate_pattern_exists(pattern, row, snapshot, params)
            }
            crate::ast::ExistsExpression::Subquery(query) => {
                match crate::query_api::exists_subquery_has_rows(query, row, snapshot, params) {
                    Ok(found) => Value::Bool(found),
                    Err(_) => Value::Null,
                }
            }
        },
        Expression::FunctionCall(call) => {
            if call.name.starts_with("__quant_") {
                evaluate_quantifier(call, row, snapshot, params)
            } else if call.name == "__reduce" {
                evaluate_reduce(call, row, snapshot, params)
            } else {
                dispatch_function(call, row, snapshot, params)
            }
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Integer(v) => Value::Int(*v),
        Literal::Float(v) => Value::Float(*v),
        Literal::Boolean(v) => Value::Bool(*v),
        Literal::Null => Value::Null,
    }
}

fn binary_op<S: GraphSnapshot>(
    operator: BinaryOperator,
    left: Value,
    right: Value,
    snapshot: &S,
) -> Value {
    use BinaryOperator::*;
    match operator {
        Equals => cypher_equals(&left, &right),
        NotEquals => match cypher_equals(&left, &right) {
            Value::Bool(v) => Value::Bool(!v),
            other => other,
        },
        RegexMatch => regex_match(&left, &right),
        And => three_valued_and(left, right),
        Or => three_valued_or(left, right),
        Xor => match (left, right) {
            (Value::Bool(l), Value::Bool(r)) => Value::Bool(l ^ r),
            _ => Value::Null,
        },
        LessThan => compare_values(&left, &right, Ordering::is_lt),
        LessEqual => compare_values(&left, &right, Ordering::is_le),
        GreaterThan => compare_values(&left, &right, Ordering::is_gt),
        GreaterEqual => compare_values(&left, &right, Ordering::is_ge),
        Add => add_values(&left, &right),
        Subtract => subtract_values(&left, &right),
        Multiply => multiply_values(&left, &right),
        Divide => divide_values(&left, &right),
        Modulo => modulo_values(&left, &right),
        Power => power_values(&left, &right),
        In => in_list(&left, &right),
        StartsWith => string_predicate(&left, &right, |l, r| l.starts_with(r)),
        EndsWith => string_predicate(&left, &right, |l, r| l.ends_with(r)),
        Contains => string_predicate(&left, &right, |l, r| l.contains(r)),
        HasLabel => evaluate_has_label(&left, &right, snapshot),
        IsNull => Value::Bool(matches!(left, Value::Null)),
        IsNotNull => Value::Bool(!matches!(left, Value::Null)),
    }
}

fn three_valued_and(left: Value, right: Value) -> Value {
    match (truth(&left), truth(&right)) {
        (Some(false), _) | (_, Some(false)) => Value::Bool(false),
        (Some(true), Some(true)) => Value::Bool(true),
        _ => Value::Null,
    }
}

fn three_valued_or(left: Value, right: Value) -> Value {
    match (truth(&left), truth(&right)) {
        (Some(true), _) | (_, Some(true)) => Value::Bool(true),
        (Some(false), Some(false)) => Value::Bool(false),
        _ => Value::Null,
    }
}

fn truth(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        _ => None,
    }
}

/// `var.key`: entity bindings answer from their property snapshot, id
/// bindings from storage, temporal strings and duration maps from their
/// component accessors, plain maps by key.
fn property_of<S: GraphSnapshot>(
    variable: &str,
    property: &str,
    row: &Row,
    snapshot: &S,
) -> Value {
    match row.get(variable) {
        Some(Value::Node(node)) => node.properties.get(property).cloned().unwrap_or(Value::Null),
        Some(Value::Relationship(rel)) => {
            rel.properties.get(property).cloned().unwrap_or(Value::Null)
        }
        Some(Value::String(raw)) => parse_temporal_string(raw)
            .and_then(|temporal| temporal_component(raw, temporal, property))
            .unwrap_or(Value::Null),
        Some(Value::NodeId(id)) => snapshot
            .node_property(*id, property)
            .as_ref()
            .map(convert_api_property_to_value)
            .unwrap_or(Value::Null),
        Some(Value::EdgeKey(key)) => snapshot
            .edge_property(*key, property)
            .as_ref()
            .map(convert_api_property_to_value)
            .unwrap_or(Value::Null),
        Some(Value::Map(map)) => {
            if matches!(map.get("__kind"), Some(Value::String(kind)) if kind == "duration") {
                if let Some(v) = duration_value::duration_component(map, property) {
                    return v;
                }
            }
            map.get(property).cloned().unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn dispatch_function<S: GraphSnapshot>(
    call: &crate::ast::FunctionCall,
    row: &Row,
    snapshot: &S,
    params: &Params,
) -> Value {
    let name = call.name.to_lowercase();
    let args: Vec<Value> = call
        .args
        .iter()
        .map(|arg| evaluate_expression_value(arg, row, snapshot, params))
        .collect();

    evaluate_collection_function(&name, &args, snapshot)
        .or_else(|| evaluate_scalar_function(&name, &args))
        .or_else(|| evaluate_graph_function(&name, &args, row, snapshot))
        .or_else(|| evaluate_temporal_function(&name, &args))
        .or_else(|| evaluate_spatial_function(&name, &args))
        .or_else(|| evaluate_opaque_function(&name, &args))
        .or_else(|| evaluate_conversion_function(&name, &args))
        .unwrap_or(Value::Null)
}

// ---- component access on temporal strings (n.prop style) ----

fn temporal_component(raw: &str, temporal: TemporalValue, property: &str) -> Option<Value> {
    match temporal {
        TemporalValue::Date(date) => date_component(date, property),
        TemporalValue::LocalTime(time) => clock_component(time, property).or(match property {
            "timezone" | "offset" | "offsetMinutes" | "offsetSeconds" => Some(Value::Null),
            _ => None,
        }),
        TemporalValue::Time { time, offset } => {
            clock_component(time, property).or_else(|| match property {
                "timezone" | "offset" => Some(Value::String(format_offset(offset))),
                "offsetMinutes" => Some(Value::Int(i64::from(offset.local_minus_utc() / 60))),
                "offsetSeconds" => Some(Value::Int(i64::from(offset.local_minus_utc()))),
                _ => None,
            })
        }
        TemporalValue::LocalDateTime(dt) => date_component(dt.date(), property)
            .or_else(|| clock_component(dt.time(), property))
            .or(match property {
                "timezone" | "offset" | "offsetMinutes" | "offsetSeconds" | "epochSeconds"
                | "epochMillis" => Some(Value::Null),
                _ => None,
            }),
        TemporalValue::DateTime(dt) => {
            let local = dt.naive_local();
            date_component(local.date(), property)
                .or_else(|| clock_component(local.time(), property))
                .or_else(|| {
                    let offset = *dt.offset();
                    match property {
                        "timezone" => Some(Value::String(
                            extract_timezone_name(raw).unwrap_or_else(|| format_offset(offset)),
                        )),
                        "offset" => Some(Value::String(format_offset(offset))),
                        "offsetMinutes" => {
                            Some(Value::Int(i64::from(offset.local_minus_utc() / 60)))
                        }
                        "offsetSeconds" => Some(Value::Int(i64::from(offset.local_minus_utc()))),
                        "epochSeconds" => Some(Value::Int(dt.timestamp())),
                        "epochMillis" => Some(Value::Int(dt.timestamp_millis())),
                        _ => None,
                    }
                })
        }
    }
}

fn date_component(date: chrono::NaiveDate, property: &str) -> Option<Value> {
    let value = match property {
        "year" => i64::from(date.year()),
        "quarter" => i64::from(date.month0() / 3 + 1),
        "month" => i64::from(date.month()),
        "week" => i64::from(date.iso_week().week()),
        "weekYear" => i64::from(date.iso_week().year()),
        "day" => i64::from(date.day()),
        "ordinalDay" => i64::from(date.ordinal()),
        "weekDay" => i64::from(date.weekday().number_from_monday()),
        "dayOfQuarter" => {
            let quarter_start =
                chrono::NaiveDate::from_ymd_opt(date.year(), (date.month0() / 3) * 3 + 1, 1)?;
            date.signed_duration_since(quarter_start).num_days() + 1
        }
        _ => return None,
    };
    Some(Value::Int(value))
}

fn clock_component(time: chrono::NaiveTime, property: &str) -> Option<Value> {
    let nanos = i64::from(time.nanosecond());
    let value = match property {
        "hour" => i64::from(time.hour()),
        "minute" => i64::from(time.minute()),
        "second" => i64::from(time.second()),
        "millisecond" => nanos / 1_000_000,
        "microsecond" => nanos / 1_000,
        "nanosecond" => nanos,
        _ => return None,
    };
    Some(Value::Int(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GraphStore;
    use crate::model::memory::MemoryGraph;
    use crate::parser::Parser;

    fn eval(cypher_expr: &str) -> Value {
        let query = Parser::parse(&format!("RETURN {cypher_expr} AS out")).unwrap();
        let crate::ast::Clause::Return(ret) = &query.clauses[0] else {
            panic!("expected RETURN");
        };
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        let params = Params::new();
        evaluate_expression_value(&ret.items[0].expression, &Row::default(), &snap, &params)
    }

    #[test]
    fn three_valued_logic_tables() {
        assert_eq!(eval("null AND false"), Value::Bool(false));
        assert_eq!(eval("null AND true"), Value::Null);
        assert_eq!(eval("null OR true"), Value::Bool(true));
        assert_eq!(eval("null OR false"), Value::Null);
        assert_eq!(eval("NOT null"), Value::Null);
    }

    #[test]
    fn division_always_widens_and_modulo_stays_integer() {
        assert_eq!(eval("7 / 2"), Value::Float(3.5));
        assert_eq!(eval("7 / 0"), Value::Null);
        assert_eq!(eval("7 % 2"), Value::Int(1));
    }

    #[test]
    fn unknown_identifiers_and_functions_are_null() {
        assert_eq!(eval("nosuchvariable"), Value::Null);
        assert_eq!(eval("noSuchFunction(1)"), Value::Null);
    }

    #[test]
    fn temporal_string_components_read_like_properties() {
        let query = Parser::parse("RETURN d.year AS out").unwrap();
        let crate::ast::Clause::Return(ret) = &query.clauses[0] else {
            panic!("expected RETURN");
        };
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        let params = Params::new();
        let row = Row::default().with("d", Value::String("2024-07-19".into()));
        assert_eq!(
            evaluate_expression_value(&ret.items[0].expression, &row, &snap, &params),
            Value::Int(2024)
        );
    }

    #[test]
    fn duration_round_trips_through_tostring() {
        assert_eq!(
            eval("toString(duration('P1Y2M3DT4H'))"),
            Value::String("P1Y2M3DT4H".into())
        );
    }

    #[test]
    fn case_expression_falls_through_to_else() {
        assert_eq!(
            eval("CASE WHEN false THEN 1 ELSE 2 END"),
            Value::Int(2)
        );
        assert_eq!(eval("CASE 1 WHEN 2 THEN 'a' END"), Value::Null);
    }
}
