//! Row-shaping operators: filtering, optional-match fallback, projection,
//! ordering, deduplication, paging, UNWIND, CALL subqueries, and UNION.

use super::{ExecCtx, Op, Row, Value, is_hidden_name, run};
use crate::ast::Expression;
use crate::error::{Error, Result};
use crate::evaluator::{evaluate_expression_bool, evaluate_expression_value, order_compare};
use crate::model::GraphSnapshot;
use std::cmp::Ordering;

pub(super) fn filter<S: GraphSnapshot>(
    input: &Op,
    predicate: &Expression,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    // Split borrows: evaluation only needs the snapshot and params.
    let snapshot = ctx.snapshot;
    let params = ctx.params;
    Ok(rows
        .into_iter()
        .filter(|row| evaluate_expression_bool(predicate, row, snapshot, params))
        .collect())
}

pub(super) fn optional<S: GraphSnapshot>(
    input: &Op,
    branch: &Op,
    introduced: &[String],
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let mut out = Vec::new();
    for row in rows {
        let matched = ctx.with_argument(vec![row.clone()], |ctx| run(branch, ctx))?;
        if matched.is_empty() {
            let mut fallback = row;
            for name in introduced {
                fallback = fallback.with(name.clone(), Value::Null);
            }
            out.push(fallback);
        } else {
            out.extend(matched);
        }
    }
    Ok(out)
}

pub(super) fn project<S: GraphSnapshot>(
    input: &Op,
    items: &[(String, Expression)],
    star: bool,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let snapshot = ctx.snapshot;
    let params = ctx.params;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let mut projected = if star {
            let kept: Vec<(String, Value)> = row
                .columns()
                .iter()
                .filter(|(name, _)| !is_hidden_name(name))
                .cloned()
                .collect();
            Row::new(kept)
        } else {
            Row::default()
        };
        for (alias, expr) in items {
            let value = evaluate_expression_value(expr, &row, snapshot, params);
            projected = projected.with(alias.clone(), value);
        }
        out.push(projected);
    }
    Ok(out)
}

pub(super) fn sort<S: GraphSnapshot>(
    input: &Op,
    keys: &[(Expression, bool)],
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let snapshot = ctx.snapshot;
    let params = ctx.params;

    let mut keyed: Vec<(Vec<Value>, Row)> = rows
        .into_iter()
        .map(|row| {
            let key = keys
                .iter()
                .map(|(expr, _)| evaluate_expression_value(expr, &row, snapshot, params))
                .collect();
            (key, row)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        for (idx, (_, ascending)) in keys.iter().enumerate() {
            let ord = order_compare(&a[idx], &b[idx]);
            let ord = if *ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}

pub(super) fn dedup<S: GraphSnapshot>(input: &Op, ctx: &mut ExecCtx<'_, S>) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        let shape: Vec<Value> = row.columns().iter().map(|(_, v)| v.clone()).collect();
        if seen.insert(shape) {
            out.push(row);
        }
    }
    Ok(out)
}

fn row_count(expr: &Expression, what: &str, ctx: &ExecCtx<'_, impl GraphSnapshot>) -> Result<usize> {
    let value = evaluate_expression_value(expr, &Row::default(), ctx.snapshot, ctx.params);
    match value {
        Value::Int(n) if n >= 0 => Ok(n as usize),
        other => Err(Error::Other(format!(
            "syntax error: {what} requires a non-negative integer, got {other:?}"
        ))),
    }
}

pub(super) fn paginate<S: GraphSnapshot>(
    input: &Op,
    skip: &Option<Expression>,
    limit: &Option<Expression>,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let start = match skip {
        Some(expr) => row_count(expr, "SKIP", ctx)?.min(rows.len()),
        None => 0,
    };
    let mut rows: Vec<Row> = rows.into_iter().skip(start).collect();
    if let Some(expr) = limit {
        rows.truncate(row_count(expr, "LIMIT", ctx)?);
    }
    Ok(rows)
}

pub(super) fn unwind<S: GraphSnapshot>(
    input: &Op,
    list: &Expression,
    alias: &str,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let snapshot = ctx.snapshot;
    let params = ctx.params;

    let mut out = Vec::new();
    for row in rows {
        match evaluate_expression_value(list, &row, snapshot, params) {
            Value::List(items) => {
                for item in items {
                    out.push(row.clone().with(alias, item));
                }
            }
            Value::Null => {}
            single => out.push(row.clone().with(alias, single)),
        }
    }
    Ok(out)
}

pub(super) fn subquery<S: GraphSnapshot>(
    input: &Op,
    body: &Op,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let rows = run(input, ctx)?;
    let mut out = Vec::new();
    for row in rows {
        let inner = ctx.with_argument(vec![row.clone()], |ctx| run(body, ctx))?;
        for produced in inner {
            out.push(row.join(&produced));
        }
    }
    Ok(out)
}

pub(super) fn union<S: GraphSnapshot>(
    left: &Op,
    right: &Op,
    distinct: bool,
    ctx: &mut ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let mut rows = run(left, ctx)?;
    rows.extend(run(right, ctx)?);
    if distinct {
        let combined = Op::Rows(rows);
        return dedup(&combined, ctx);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::super::{ExecCtx, Op, Row, Value, run};
    use crate::ast::{Expression, Literal};
    use crate::model::GraphStore;
    use crate::model::memory::MemoryGraph;
    use crate::query_api::Params;

    fn int_rows(values: &[i64]) -> Op {
        Op::Rows(
            values
                .iter()
                .map(|v| Row::default().with("x", Value::Int(*v)))
                .collect(),
        )
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        let params = Params::new();
        let mut ctx = ExecCtx::read_only(&snap, &params);

        let op = Op::Dedup {
            input: Box::new(int_rows(&[1, 2, 1, 3, 2])),
        };
        let rows = run(&op, &mut ctx).unwrap();
        let got: Vec<_> = rows.iter().map(|r| r.get("x").cloned()).collect();
        assert_eq!(
            got,
            vec![
                Some(Value::Int(1)),
                Some(Value::Int(2)),
                Some(Value::Int(3))
            ]
        );
    }

    #[test]
    fn sort_descending_puts_nulls_first() {
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        let params = Params::new();
        let mut ctx = ExecCtx::read_only(&snap, &params);

        let mut rows = vec![Row::default().with("x", Value::Null)];
        rows.extend(match int_rows(&[2, 1]) {
            Op::Rows(r) => r,
            _ => unreachable!(),
        });
        let op = Op::Sort {
            input: Box::new(Op::Rows(rows)),
            keys: vec![(Expression::Variable("x".into()), false)],
        };
        let sorted = run(&op, &mut ctx).unwrap();
        assert_eq!(sorted[0].get("x"), Some(&Value::Null));
        assert_eq!(sorted[1].get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn paginate_applies_skip_then_limit() {
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        let params = Params::new();
        let mut ctx = ExecCtx::read_only(&snap, &params);

        let op = Op::Paginate {
            input: Box::new(int_rows(&[1, 2, 3, 4])),
            skip: Some(Expression::Literal(Literal::Integer(1))),
            limit: Some(Expression::Literal(Literal::Integer(2))),
        };
        let rows = run(&op, &mut ctx).unwrap();
        let got: Vec<_> = rows.iter().map(|r| r.get("x").cloned()).collect();
        assert_eq!(got, vec![Some(Value::Int(2)), Some(Value::Int(3))]);
    }

    #[test]
    fn unwind_null_produces_no_rows() {
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        let params = Params::new();
        let mut ctx = ExecCtx::read_only(&snap, &params);

        let op = Op::Unwind {
            input: Box::new(Op::Unit),
            list: Expression::Literal(Literal::Null),
            alias: "x".into(),
        };
        assert!(run(&op, &mut ctx).unwrap().is_empty());
    }
}
