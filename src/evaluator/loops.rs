//! List iteration constructs: comprehensions, the all/any/none/single
//! quantifiers, and reduce. Each introduces its loop variable as an extra
//! row binding layered over the outer environment.

use super::{Params, Row, Value, evaluate_expression_value};
use crate::ast::{Expression, FunctionCall, ListComprehension};
use crate::model::GraphSnapshot;

pub(super) fn evaluate_list_comprehension<S: GraphSnapshot>(
    comp: &ListComprehension,
    row: &Row,
    snapshot: &S,
    params: &Params,
) -> Value {
    let Value::List(items) = evaluate_expression_value(&comp.list, row, snapshot, params) else {
        return Value::Null;
    };

    let mut out = Vec::new();
    for item in items {
        let scoped = row.clone().with(comp.variable.clone(), item.clone());
        if let Some(predicate) = &comp.where_expression {
            let keep = matches!(
                evaluate_expression_value(predicate, &scoped, snapshot, params),
                Value::Bool(true)
            );
            if !keep {
                continue;
            }
        }
        out.push(match &comp.map_expression {
            Some(projection) => evaluate_expression_value(projection, &scoped, snapshot, params),
            None => item,
        });
    }
    Value::List(out)
}

/// `reduce(acc = init, x IN list | expr)`, folded left to right.
pub(super) fn evaluate_reduce<S: GraphSnapshot>(
    call: &FunctionCall,
    row: &Row,
    snapshot: &S,
    params: &Params,
) -> Value {
    let [acc_expr, init, var_expr, list, body] = call.args.as_slice() else {
        return Value::Null;
    };
    let (Expression::Variable(acc_name), Expression::Variable(var_name)) = (acc_expr, var_expr)
    else {
        return Value::Null;
    };

    let Value::List(items) = evaluate_expression_value(list, row, snapshot, params) else {
        return Value::Null;
    };

    let mut acc = evaluate_expression_value(init, row, snapshot, params);
    for item in items {
        let scoped = row
            .clone()
            .with(acc_name.clone(), acc)
            .with(var_name.clone(), item);
        acc = evaluate_expression_value(body, &scoped, snapshot, params);
    }
    acc
}

/// Outcome tally for a quantifier run over a list.
struct Tally {
    hits: usize,
    misses: usize,
    unknown: usize,
}

fn tally<S: GraphSnapshot>(
    call: &FunctionCall,
    row: &Row,
    snapshot: &S,
    params: &Params,
) -> Option<Tally> {
    let [var_expr, list, predicate] = call.args.as_slice() else {
        return None;
    };
    let Expression::Variable(var_name) = var_expr else {
        return None;
    };
    let Value::List(items) = evaluate_expression_value(list, row, snapshot, params) else {
        return None;
    };

    let mut out = Tally {
        hits: 0,
        misses: 0,
        unknown: 0,
    };
    for item in items {
        let scoped = row.clone().with(var_name.clone(), item);
        match evaluate_expression_value(predicate, &scoped, snapshot, params) {
            Value::Bool(true) => out.hits += 1,
            Value::Bool(false) => out.misses += 1,
            _ => out.unknown += 1,
        }
    }
    Some(out)
}

pub(super) fn evaluate_quantifier<S: GraphSnapshot>(
    call: &FunctionCall,
    row: &Row,
    snapshot: &S,
    params: &Params,
) -> Value {
    let Some(t) = tally(call, row, snapshot, params) else {
        return Value::Null;
    };

    match call.name.as_str() {
        "__quant_any" => {
            if t.hits > 0 {
                Value::Bool(true)
            } else if t.unknown > 0 {
                Value::Null
            } else {
                Value::Bool(false)
            }
        }
        "__quant_all" => {
            if t.misses > 0 {
                Value::Bool(false)
            } else if t.unknown > 0 {
                Value::Null
            } else {
                Value::Bool(true)
            }
        }
        "__quant_none" => {
            if t.hits > 0 {
                Value::Bool(false)
            } else if t.unknown > 0 {
                Value::Null
            } else {
                Value::Bool(true)
            }
        }
        "__quant_single" => {
            if t.hits > 1 {
                Value::Bool(false)
            } else if t.unknown > 0 {
                Value::Null
            } else {
                Value::Bool(t.hits == 1)
            }
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GraphStore;
    use crate::model::memory::MemoryGraph;

    fn quant(which: &str, items: Vec<Value>, predicate: Expression) -> Value {
        let graph = MemoryGraph::new();
        let snap = graph.snapshot();
        let params = Params::new();
        let call = FunctionCall {
            name: format!("__quant_{which}"),
            args: vec![
                Expression::Variable("x".into()),
                Expression::Literal(crate::ast::Literal::Null),
                predicate,
            ],
        };
        // Splice the list in as a pre-evaluated binding-free literal.
        let call = FunctionCall {
            args: vec![
                call.args[0].clone(),
                Expression::List(
                    items
                        .iter()
                        .map(|v| match v {
                            Value::Int(i) => {
                                Expression::Literal(crate::ast::Literal::Integer(*i))
                            }
                            _ => Expression::Literal(crate::ast::Literal::Null),
                        })
                        .collect(),
                ),
                call.args[2].clone(),
            ],
            ..call
        };
        evaluate_quantifier(&call, &Row::default(), &snap, &params)
    }

    fn positive() -> Expression {
        Expression::Binary(Box::new(crate::ast::BinaryExpression {
            left: Expression::Variable("x".into()),
            operator: crate::ast::BinaryOperator::GreaterThan,
            right: Expression::Literal(crate::ast::Literal::Integer(0)),
        }))
    }

    #[test]
    fn quantifiers_follow_three_valued_logic() {
        let all_pos = vec![Value::Int(1), Value::Int(2)];
        assert_eq!(quant("all", all_pos.clone(), positive()), Value::Bool(true));
        assert_eq!(quant("none", all_pos.clone(), positive()), Value::Bool(false));
        assert_eq!(quant("any", all_pos, positive()), Value::Bool(true));

        let with_null = vec![Value::Int(1), Value::Null];
        // x > 0 on Null is Null, so `all` cannot be decided.
        assert_eq!(quant("all", with_null, positive()), Value::Null);
    }

    #[test]
    fn single_counts_exact_hits() {
        let one_hit = vec![Value::Int(1), Value::Int(-2)];
        assert_eq!(quant("single", one_hit, positive()), Value::Bool(true));
        let two_hits = vec![Value::Int(1), Value::Int(2)];
        assert_eq!(quant("single", two_hits, positive()), Value::Bool(false));
    }
}
