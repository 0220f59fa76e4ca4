//! The aggregation engine: rows group by the evaluated non-aggregate keys,
//! then each aggregate folds over its group. With no grouping keys and no
//! input, a single row of "empty" results comes back (count 0, sum 0, the
//! rest Null).

use super::{ExecCtx, Op, Row, Value, run};
use crate::ast::{AggregateFunction, Expression};
use crate::error::Result;
use crate::evaluator::{evaluate_expression_value, order_compare};
use crate::model::GraphSnapshot;
use crate::query_api::Params;
use std::collections::HashMap;

pub(super) fn aggregate<S: GraphSnapshot>(
    input: &Op,
    keys: &[(String, Expression)],
    folds: &[(String, AggregateFunction)],
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let snapshot = ctx.snapshot;
    let params = ctx.params;

    // Group while preserving first-seen order.
    let mut order: Vec<Vec<Value>> = Vec::new();
    let mut groups: HashMap<Vec<Value>, Vec<Row>> = HashMap::new();
    for row in rows {
        let key: Vec<Value> = keys
            .iter()
            .map(|(_, expr)| evaluate_expression_value(expr, &row, snapshot, params))
            .collect();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(row);
    }

    if order.is_empty() && keys.is_empty() {
        order.push(Vec::new());
        groups.insert(Vec::new(), Vec::new());
    }

    let mut out = Vec::with_capacity(order.len());
    for key in order {
        let members = groups.remove(&key).unwrap_or_default();
        let mut result = Row::default();
        for ((alias, _), value) in keys.iter().zip(key) {
            result = result.with(alias.clone(), value);
        }
        for (alias, fold) in folds {
            result = result.with(alias.clone(), fold_group(fold, &members, snapshot, params));
        }
        out.push(result);
    }
    Ok(out)
}

fn eval_all<S: GraphSnapshot>(
    expr: &Expression,
    rows: &[Row],
    snapshot: &S,
    params: &Params,
) -> Vec<Value> {
    rows.iter()
        .map(|row| evaluate_expression_value(expr, row, snapshot, params))
        .filter(|v| !matches!(v, Value::Null))
        .collect()
}

fn distinct(values: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

fn numeric(values: &[Value]) -> Vec<f64> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        })
        .collect()
}

fn fold_group<S: GraphSnapshot>(
    fold: &AggregateFunction,
    rows: &[Row],
    snapshot: &S,
    params: &Params,
) -> Value {
    use AggregateFunction::*;
    match fold {
        Count(None) => Value::Int(rows.len() as i64),
        Count(Some(expr)) => Value::Int(eval_all(expr, rows, snapshot, params).len() as i64),
        CountDistinct(expr) => {
            Value::Int(distinct(eval_all(expr, rows, snapshot, params)).len() as i64)
        }
        Sum(expr) => sum_values(eval_all(expr, rows, snapshot, params)),
        SumDistinct(expr) => sum_values(distinct(eval_all(expr, rows, snapshot, params))),
        Avg(expr) => avg_values(eval_all(expr, rows, snapshot, params)),
        AvgDistinct(expr) => avg_values(distinct(eval_all(expr, rows, snapshot, params))),
        Min(expr) => extremum(eval_all(expr, rows, snapshot, params), true),
        MinDistinct(expr) => extremum(distinct(eval_all(expr, rows, snapshot, params)), true),
        Max(expr) => extremum(eval_all(expr, rows, snapshot, params), false),
        MaxDistinct(expr) => extremum(distinct(eval_all(expr, rows, snapshot, params)), false),
        Collect(expr) => Value::List(eval_all(expr, rows, snapshot, params)),
        CollectDistinct(expr) => Value::List(distinct(eval_all(expr, rows, snapshot, params))),
        PercentileDisc(expr, pct) => {
            percentile(expr, pct, rows, snapshot, params, false)
        }
        PercentileCont(expr, pct) => {
            percentile(expr, pct, rows, snapshot, params, true)
        }
        StDev(expr) => deviation(eval_all(expr, rows, snapshot, params), true),
        StDevP(expr) => deviation(eval_all(expr, rows, snapshot, params), false),
    }
}

fn sum_values(values: Vec<Value>) -> Value {
    let mut int_total: i128 = 0;
    let mut float_total = 0.0f64;
    let mut saw_float = false;
    for value in values {
        match value {
            Value::Int(i) => {
                int_total += i as i128;
                float_total += i as f64;
            }
            Value::Float(f) => {
                saw_float = true;
                float_total += f;
            }
            _ => {}
        }
    }
    if saw_float {
        Value::Float(float_total)
    } else {
        Value::Int(int_total as i64)
    }
}

fn avg_values(values: Vec<Value>) -> Value {
    let samples = numeric(&values);
    if samples.is_empty() {
        return Value::Null;
    }
    Value::Float(samples.iter().sum::<f64>() / samples.len() as f64)
}

fn extremum(mut values: Vec<Value>, want_min: bool) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    values.sort_by(order_compare);
    if want_min {
        values.remove(0)
    } else {
        values.pop().unwrap_or(Value::Null)
    }
}

fn percentile<S: GraphSnapshot>(
    expr: &Expression,
    pct_expr: &Expression,
    rows: &[Row],
    snapshot: &S,
    params: &Params,
    interpolate: bool,
) -> Value {
    let pct = rows
        .first()
        .map(|row| evaluate_expression_value(pct_expr, row, snapshot, params));
    let pct = match pct {
        Some(Value::Int(i)) => i as f64,
        Some(Value::Float(f)) => f,
        _ => return Value::Null,
    };
    if !(0.0..=1.0).contains(&pct) {
        return Value::Null;
    }

    let mut samples = numeric(&eval_all(expr, rows, snapshot, params));
    if samples.is_empty() {
        return Value::Null;
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    if interpolate {
        let position = pct * (samples.len() - 1) as f64;
        let below = position.floor() as usize;
        let above = position.ceil() as usize;
        if below == above {
            Value::Float(samples[below])
        } else {
            let weight = position - below as f64;
            Value::Float(samples[below] * (1.0 - weight) + samples[above] * weight)
        }
    } else {
        // Nearest-rank: the smallest sample at or above the requested rank.
        let rank = ((pct * samples.len() as f64).ceil() as usize).max(1);
        Value::Float(samples[rank - 1])
    }
}

fn deviation(values: Vec<Value>, sample: bool) -> Value {
    let samples = numeric(&values);
    if samples.is_empty() {
        return Value::Null;
    }
    let divisor = if sample {
        samples.len().saturating_sub(1)
    } else {
        samples.len()
    };
    if divisor == 0 {
        return Value::Float(0.0);
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / divisor as f64;
    Value::Float(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_preserves_integers_until_a_float_appears() {
        assert_eq!(sum_values(vec![Value::Int(1), Value::Int(2)]), Value::Int(3));
        assert_eq!(
            sum_values(vec![Value::Int(1), Value::Float(0.5)]),
            Value::Float(1.5)
        );
        assert_eq!(sum_values(vec![]), Value::Int(0));
    }

    #[test]
    fn extremum_orders_mixed_numerics() {
        let values = vec![Value::Int(3), Value::Float(1.5), Value::Int(2)];
        assert_eq!(extremum(values.clone(), true), Value::Float(1.5));
        assert_eq!(extremum(values, false), Value::Int(3));
    }

    #[test]
    fn deviation_of_single_sample_is_zero() {
        assert_eq!(deviation(vec![Value::Int(5)], true), Value::Float(0.0));
        assert_eq!(deviation(vec![], true), Value::Null);
    }

    #[test]
    fn sample_and_population_deviation_differ() {
        let values = vec![Value::Int(2), Value::Int(4), Value::Int(4), Value::Int(6)];
        let Value::Float(sample) = deviation(values.clone(), true) else {
            panic!("expected float");
        };
        let Value::Float(population) = deviation(values, false) else {
            panic!("expected float");
        };
        assert!(sample > population);
    }
}
