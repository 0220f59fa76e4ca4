//! Aggregate recognition for projection items, plus default aliases for
//! items written without `AS`.

use crate::ast::{AggregateFunction, Expression, FunctionCall, Literal};
use crate::error::{Error, Result};

/// If the expression is a call to one of the aggregate functions, returns
/// its recognized form. Only a top-level call counts; aggregates nested in
/// arithmetic are rejected by [`forbid_in_predicate`] at the call site.
pub(super) fn recognize(expr: &Expression) -> Result<Option<AggregateFunction>> {
    let Expression::FunctionCall(call) = expr else {
        return Ok(None);
    };
    recognize_call(call)
}

fn recognize_call(call: &FunctionCall) -> Result<Option<AggregateFunction>> {
    use AggregateFunction::*;

    let name = call.name.to_lowercase();
    let (arg, distinct) = match call.args.first() {
        Some(Expression::FunctionCall(inner)) if inner.name == "__distinct" => {
            (inner.args.first(), true)
        }
        first => (first, false),
    };

    let single = |what: &str| -> Result<Expression> {
        if call.args.len() != 1 {
            return Err(Error::Other(format!(
                "syntax error: {what} takes exactly one argument"
            )));
        }
        Ok(arg.cloned().expect("arity checked"))
    };

    let fold = match name.as_str() {
        "count" => {
            let is_star =
                matches!(arg, Some(Expression::Literal(Literal::String(s))) if s == "*");
            match (is_star, distinct) {
                (true, _) => Count(None),
                (false, true) => CountDistinct(single("count")?),
                (false, false) => Count(Some(single("count")?)),
            }
        }
        "sum" if distinct => SumDistinct(single("sum")?),
        "sum" => Sum(single("sum")?),
        "avg" if distinct => AvgDistinct(single("avg")?),
        "avg" => Avg(single("avg")?),
        "min" if distinct => MinDistinct(single("min")?),
        "min" => Min(single("min")?),
        "max" if distinct => MaxDistinct(single("max")?),
        "max" => Max(single("max")?),
        "collect" if distinct => CollectDistinct(single("collect")?),
        "collect" => Collect(single("collect")?),
        "percentiledisc" | "percentilecont" => {
            if call.args.len() != 2 {
                return Err(Error::Other(format!(
                    "syntax error: {name} takes a value and a percentile"
                )));
            }
            let value = call.args[0].clone();
            let pct = call.args[1].clone();
            if name == "percentiledisc" {
                PercentileDisc(value, pct)
            } else {
                PercentileCont(value, pct)
            }
        }
        "stdev" => StDev(single("stdev")?),
        "stdevp" => StDevP(single("stdevp")?),
        _ => return Ok(None),
    };
    Ok(Some(fold))
}

/// Rejects aggregate calls anywhere inside an expression — used for WHERE
/// predicates and for the non-aggregate side of a projection.
pub(super) fn forbid_in_predicate(expr: &Expression) -> Result<()> {
    if recognize(expr)?.is_some() {
        return Err(Error::Other("syntax error: InvalidAggregation".into()));
    }
    walk_children(expr, &mut |child| forbid_in_predicate(child))
}

fn walk_children(
    expr: &Expression,
    visit: &mut impl FnMut(&Expression) -> Result<()>,
) -> Result<()> {
    match expr {
        Expression::Binary(b) => {
            visit(&b.left)?;
            visit(&b.right)
        }
        Expression::Unary(u) => visit(&u.operand),
        Expression::FunctionCall(call) => {
            for arg in &call.args {
                visit(arg)?;
            }
            Ok(())
        }
        Expression::List(items) => {
            for item in items {
                visit(item)?;
            }
            Ok(())
        }
        Expression::Map(map) => {
            for pair in &map.properties {
                visit(&pair.value)?;
            }
            Ok(())
        }
        Expression::Case(case) => {
            if let Some(operand) = &case.expression {
                visit(operand)?;
            }
            for (condition, result) in &case.when_clauses {
                visit(condition)?;
                visit(result)?;
            }
            if let Some(fallback) = &case.else_expression {
                visit(fallback)?;
            }
            Ok(())
        }
        Expression::ListComprehension(comp) => {
            visit(&comp.list)?;
            if let Some(filter) = &comp.where_expression {
                visit(filter)?;
            }
            if let Some(map) = &comp.map_expression {
                visit(map)?;
            }
            Ok(())
        }
        Expression::PatternComprehension(comp) => {
            if let Some(filter) = &comp.where_expression {
                visit(filter)?;
            }
            visit(&comp.projection)
        }
        Expression::Literal(_)
        | Expression::Variable(_)
        | Expression::PropertyAccess(_)
        | Expression::Parameter(_)
        | Expression::Exists(_) => Ok(()),
    }
}

/// The column name for a projection item without an `AS`: the variable
/// name, a property access's trailing property name, or a compact rendering
/// of the expression.
pub(super) fn default_alias(expr: &Expression, index: usize) -> String {
    match expr {
        Expression::Variable(name) => name.clone(),
        Expression::PropertyAccess(access) => access.property.clone(),
        Expression::FunctionCall(call) if call.name.starts_with("__") => format!("column_{index}"),
        Expression::FunctionCall(call) => {
            let args: Vec<String> = call.args.iter().map(|a| default_alias(a, index)).collect();
            format!("{}({})", call.name.to_lowercase(), args.join(", "))
        }
        Expression::Literal(Literal::Integer(v)) => v.to_string(),
        Expression::Literal(Literal::Float(v)) => v.to_string(),
        Expression::Literal(Literal::Boolean(v)) => v.to_string(),
        Expression::Literal(Literal::String(s)) => s.clone(),
        Expression::Literal(Literal::Null) => "null".to_string(),
        Expression::Parameter(name) => format!("${name}"),
        _ => format!("column_{index}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::PropertyAccess;

    fn call(name: &str, args: Vec<Expression>) -> Expression {
        Expression::FunctionCall(FunctionCall {
            name: name.to_string(),
            args,
        })
    }

    #[test]
    fn count_star_has_no_argument() {
        let expr = call(
            "count",
            vec![Expression::Literal(Literal::String("*".into()))],
        );
        assert!(matches!(
            recognize(&expr).unwrap(),
            Some(AggregateFunction::Count(None))
        ));
    }

    #[test]
    fn distinct_wrapper_selects_the_distinct_variant() {
        let inner = call("__distinct", vec![Expression::Variable("x".into())]);
        let expr = call("collect", vec![inner]);
        assert!(matches!(
            recognize(&expr).unwrap(),
            Some(AggregateFunction::CollectDistinct(_))
        ));
    }

    #[test]
    fn scalar_calls_are_not_aggregates() {
        let expr = call("toupper", vec![Expression::Variable("x".into())]);
        assert!(recognize(&expr).unwrap().is_none());
    }

    #[test]
    fn default_alias_uses_the_trailing_property_name() {
        let expr = Expression::PropertyAccess(PropertyAccess {
            variable: "n".into(),
            property: "name".into(),
        });
        assert_eq!(default_alias(&expr, 0), "name");
    }

    #[test]
    fn nested_aggregate_is_forbidden_in_predicates() {
        let expr = Expression::Binary(Box::new(crate::ast::BinaryExpression {
            left: call("count", vec![Expression::Variable("n".into())]),
            operator: crate::ast::BinaryOperator::GreaterThan,
            right: Expression::Literal(Literal::Integer(1)),
        }));
        assert!(forbid_in_predicate(&expr).is_err());
    }
}
