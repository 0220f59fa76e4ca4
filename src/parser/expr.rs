//! Expression productions: precedence climbing over the infix operators,
//! prefix/postfix handling, and the literal/function/comprehension forms.
//!
//! A few constructs parse into internal function names the evaluator knows:
//! `expr[i]` becomes `__index`, `expr[a..b]` becomes `__slice`,
//! `other.key` on a non-variable base becomes `__getprop`, quantifiers
//! become `__quant_*`, and `reduce(...)` becomes `__reduce`.

use super::{Cursor, keyword_text};
use crate::ast::*;
use crate::error::Error;
use crate::lexer::TokenType;

type Prec = u8;
const P_LOWEST: Prec = 0;
const P_OR: Prec = 1;
const P_XOR: Prec = 2;
const P_AND: Prec = 3;
const P_CMP: Prec = 4;
const P_PRED: Prec = 5;
const P_SUM: Prec = 6;
const P_PROD: Prec = 7;
const P_POW: Prec = 8;

fn infix_table(tt: &TokenType) -> Option<(Prec, BinaryOperator)> {
    use BinaryOperator::*;
    let entry = match tt {
        TokenType::Or => (P_OR, Or),
        TokenType::Xor => (P_XOR, Xor),
        TokenType::And => (P_AND, And),
        TokenType::Equals => (P_CMP, Equals),
        TokenType::NotEquals => (P_CMP, NotEquals),
        TokenType::RegexMatch => (P_CMP, RegexMatch),
        TokenType::LessThan => (P_CMP, LessThan),
        TokenType::LessEqual => (P_CMP, LessEqual),
        TokenType::GreaterThan => (P_CMP, GreaterThan),
        TokenType::GreaterEqual => (P_CMP, GreaterEqual),
        TokenType::In => (P_PRED, In),
        TokenType::Contains => (P_PRED, Contains),
        TokenType::Plus => (P_SUM, Add),
        TokenType::Dash => (P_SUM, Subtract),
        TokenType::Asterisk => (P_PROD, Multiply),
        TokenType::Divide => (P_PROD, Divide),
        TokenType::Modulo => (P_PROD, Modulo),
        TokenType::Power => (P_POW, Power),
        _ => return None,
    };
    Some(entry)
}

fn binary(left: Expression, operator: BinaryOperator, right: Expression) -> Expression {
    Expression::Binary(Box::new(BinaryExpression {
        left,
        operator,
        right,
    }))
}

impl Cursor {
    pub(crate) fn expression(&mut self) -> Result<Expression, Error> {
        self.expr_prec(P_LOWEST)
    }

    fn expr_prec(&mut self, min: Prec) -> Result<Expression, Error> {
        self.burn()?;
        let mut lhs = self.prefix_expr()?;

        loop {
            // IS [NOT] NULL, at comparison strength.
            if self.at(&TokenType::Is) && min <= P_CMP {
                self.bump();
                let operator = if self.eat(&TokenType::Not) {
                    BinaryOperator::IsNotNull
                } else {
                    BinaryOperator::IsNull
                };
                self.expect(&TokenType::Null, "NULL after IS")?;
                lhs = binary(lhs, operator, Expression::Literal(Literal::Null));
                continue;
            }

            // BETWEEN low AND high desugars to low <= lhs <= high. The bound
            // expressions parse above AND strength so the separator stays ours.
            if self.at(&TokenType::Between) && min <= P_PRED {
                self.bump();
                let low = self.expr_prec(P_PRED + 1)?;
                self.expect(&TokenType::And, "AND in BETWEEN expression")?;
                let high = self.expr_prec(P_PRED + 1)?;
                lhs = binary(
                    binary(lhs.clone(), BinaryOperator::GreaterEqual, low),
                    BinaryOperator::And,
                    binary(lhs, BinaryOperator::LessEqual, high),
                );
                continue;
            }

            // STARTS WITH / ENDS WITH are two-token operators.
            if min <= P_PRED
                && matches!(self.kind(), TokenType::Starts | TokenType::Ends)
                && self.kind_ahead(1) == &TokenType::With
            {
                let operator = if self.at(&TokenType::Starts) {
                    BinaryOperator::StartsWith
                } else {
                    BinaryOperator::EndsWith
                };
                self.bump();
                self.bump();
                let rhs = self.expr_prec(P_PRED + 1)?;
                lhs = binary(lhs, operator, rhs);
                continue;
            }

            let Some((prec, operator)) = infix_table(self.kind()) else {
                break;
            };
            if prec < min {
                break;
            }
            self.bump();
            let rhs = self.expr_prec(prec + 1)?;
            lhs = binary(lhs, operator, rhs);
        }
        Ok(lhs)
    }

    fn prefix_expr(&mut self) -> Result<Expression, Error> {
        if self.eat(&TokenType::Not) {
            // NOT binds looser than comparisons: NOT a = b is NOT (a = b).
            let operand = self.expr_prec(P_CMP)?;
            return Ok(Expression::Unary(Box::new(UnaryExpression {
                operator: UnaryOperator::Not,
                operand,
            })));
        }
        if self.eat(&TokenType::Dash) {
            // i64::MIN has no positive counterpart, so catch it whole.
            if let TokenType::Number(n) = self.kind()
                && n.is_integer()
                && n.raw == "9223372036854775808"
            {
                self.bump();
                return Ok(Expression::Literal(Literal::Integer(i64::MIN)));
            }
            let operand = self.postfixed_primary()?;
            return Ok(Expression::Unary(Box::new(UnaryExpression {
                operator: UnaryOperator::Negate,
                operand,
            })));
        }
        if self.eat(&TokenType::Plus) {
            return self.postfixed_primary();
        }
        self.postfixed_primary()
    }

    fn postfixed_primary(&mut self) -> Result<Expression, Error> {
        let mut expr = self.primary()?;
        loop {
            self.burn()?;
            if self.at(&TokenType::Dot) && keyed_name(self.kind_ahead(1)) {
                self.bump();
                let key = self.name_like("property name after '.'")?;
                expr = match expr {
                    Expression::Variable(variable) => Expression::PropertyAccess(PropertyAccess {
                        variable,
                        property: key,
                    }),
                    base => Expression::FunctionCall(FunctionCall {
                        name: "__getprop".to_string(),
                        args: vec![base, Expression::Literal(Literal::String(key))],
                    }),
                };
                continue;
            }

            if self.eat(&TokenType::LeftBracket) {
                expr = self.index_or_slice(expr)?;
                continue;
            }

            // expr:Label[:Label...] — a label predicate on the value.
            if self.at(&TokenType::Colon) && keyed_name(self.kind_ahead(1)) {
                let mut combined: Option<Expression> = None;
                while self.at(&TokenType::Colon) && keyed_name(self.kind_ahead(1)) {
                    self.bump();
                    let label = self.name_like("label after ':'")?;
                    let check = binary(
                        expr.clone(),
                        BinaryOperator::HasLabel,
                        Expression::Literal(Literal::String(label)),
                    );
                    combined = Some(match combined {
                        None => check,
                        Some(prev) => binary(prev, BinaryOperator::And, check),
                    });
                }
                expr = combined.expect("at least one label parsed");
                continue;
            }

            break;
        }
        Ok(expr)
    }

    fn index_or_slice(&mut self, base: Expression) -> Result<Expression, Error> {
        let start = if self.at(&TokenType::RangeDots) || self.at(&TokenType::RightBracket) {
            None
        } else {
            Some(self.expression()?)
        };

        if self.eat(&TokenType::RangeDots) {
            let end = if self.at(&TokenType::RightBracket) {
                None
            } else {
                Some(self.expression()?)
            };
            self.expect(&TokenType::RightBracket, "']' closing slice")?;
            let has_start = start.is_some();
            let has_end = end.is_some();
            return Ok(Expression::FunctionCall(FunctionCall {
                name: "__slice".to_string(),
                args: vec![
                    base,
                    start.unwrap_or(Expression::Literal(Literal::Null)),
                    end.unwrap_or(Expression::Literal(Literal::Null)),
                    Expression::Literal(Literal::Boolean(has_start)),
                    Expression::Literal(Literal::Boolean(has_end)),
                ],
            }));
        }

        let Some(index) = start else {
            return Err(self.unexpected("an index expression inside '[...]'"));
        };
        self.expect(&TokenType::RightBracket, "']' closing index")?;
        Ok(Expression::FunctionCall(FunctionCall {
            name: "__index".to_string(),
            args: vec![base, index],
        }))
    }

    fn primary(&mut self) -> Result<Expression, Error> {
        self.burn()?;
        match self.kind().clone() {
            TokenType::String(s) => {
                self.bump();
                Ok(Expression::Literal(Literal::String(s)))
            }
            TokenType::Number(n) => {
                self.bump();
                if n.is_integer() {
                    match n.raw.parse::<i64>() {
                        Ok(v) => Ok(Expression::Literal(Literal::Integer(v))),
                        Err(_) => Err(Error::Other(format!(
                            "syntax error: integer literal out of range: {}",
                            n.raw
                        ))),
                    }
                } else {
                    Ok(Expression::Literal(Literal::Float(n.value)))
                }
            }
            TokenType::Boolean(b) => {
                self.bump();
                Ok(Expression::Literal(Literal::Boolean(b)))
            }
            TokenType::Null => {
                self.bump();
                Ok(Expression::Literal(Literal::Null))
            }
            TokenType::Variable(name) => {
                self.bump();
                Ok(Expression::Parameter(name))
            }
            TokenType::Asterisk => {
                // count(*): the star travels as a string literal the
                // aggregate recognizer understands.
                self.bump();
                Ok(Expression::Literal(Literal::String("*".to_string())))
            }
            TokenType::Case => {
                self.bump();
                self.case_expression()
            }
            TokenType::Exists => {
                self.bump();
                self.exists_expression()
            }
            TokenType::All => {
                // The ALL keyword doubles as the all(...) quantifier.
                if self.kind_ahead(1) == &TokenType::LeftParen {
                    self.bump();
                    self.bump();
                    self.quantifier("all")
                } else {
                    Err(self.unexpected("'(' after ALL in expression position"))
                }
            }
            TokenType::LeftParen => {
                // A parenthesized relationship pattern is a predicate:
                // WHERE (a)-[:KNOWS]->(b). Anything else is grouping.
                if let Some(pattern) = self.relationship_pattern_predicate() {
                    return Ok(Expression::Exists(Box::new(ExistsExpression::Pattern(
                        pattern,
                    ))));
                }
                self.bump();
                let inner = self.expression()?;
                self.expect(&TokenType::RightParen, "')' closing group")?;
                Ok(inner)
            }
            TokenType::LeftBracket => {
                self.bump();
                self.bracketed_expression()
            }
            TokenType::LeftBrace => Ok(Expression::Map(self.property_map()?)),
            TokenType::Identifier(name) => {
                self.bump();
                self.identifier_expression(name)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn identifier_expression(&mut self, name: String) -> Result<Expression, Error> {
        let lowered = name.to_lowercase();

        // Direct or namespaced call? foo(...) / ns.sub.fn(...)
        let is_call = if self.at(&TokenType::LeftParen) {
            true
        } else if self.at(&TokenType::Dot) {
            let mut ahead = 0;
            while self.kind_ahead(ahead) == &TokenType::Dot && keyed_name(self.kind_ahead(ahead + 1))
            {
                ahead += 2;
            }
            ahead > 0 && self.kind_ahead(ahead) == &TokenType::LeftParen
        } else {
            false
        };

        if !is_call {
            return Ok(Expression::Variable(name));
        }

        let mut full_name = name;
        while self.eat(&TokenType::Dot) {
            full_name.push('.');
            full_name.push_str(&self.name_like("function name segment")?);
        }
        self.expect(&TokenType::LeftParen, "'(' opening call arguments")?;

        let namespaced = full_name.contains('.');
        match lowered.as_str() {
            "any" | "none" | "single" if !namespaced => self.quantifier(&lowered),
            "filter" | "extract" if !namespaced => self.legacy_comprehension(&lowered),
            "reduce" if !namespaced => self.reduce_call(),
            _ => self.finish_call(full_name),
        }
    }

    fn finish_call(&mut self, name: String) -> Result<Expression, Error> {
        let distinct = self.eat(&TokenType::Distinct);
        let mut args = Vec::new();
        if !self.at(&TokenType::RightParen) {
            loop {
                args.push(self.expression()?);
                if !self.eat(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenType::RightParen, "')' closing call arguments")?;

        if distinct {
            if args.len() != 1 {
                return Err(Error::Other(
                    "syntax error: DISTINCT inside a call takes exactly one argument".into(),
                ));
            }
            let inner = args.remove(0);
            args = vec![Expression::FunctionCall(FunctionCall {
                name: "__distinct".to_string(),
                args: vec![inner],
            })];
        }
        Ok(Expression::FunctionCall(FunctionCall { name, args }))
    }

    /// any/all/none/single(x IN list [WHERE pred]) — the '(' is consumed.
    fn quantifier(&mut self, which: &str) -> Result<Expression, Error> {
        let variable = self.identifier("quantifier variable")?;
        self.expect(&TokenType::In, "IN in quantifier")?;
        let list = self.expression()?;
        let predicate = if self.eat(&TokenType::Where) {
            self.expression()?
        } else {
            Expression::Literal(Literal::Boolean(true))
        };
        self.expect(&TokenType::RightParen, "')' closing quantifier")?;
        Ok(Expression::FunctionCall(FunctionCall {
            name: format!("__quant_{which}"),
            args: vec![Expression::Variable(variable), list, predicate],
        }))
    }

    /// filter(x IN list WHERE pred) / extract(x IN list | expr) — legacy
    /// spellings of list comprehensions; the '(' is consumed.
    fn legacy_comprehension(&mut self, which: &str) -> Result<Expression, Error> {
        let variable = self.identifier("comprehension variable")?;
        self.expect(&TokenType::In, "IN in list function")?;
        let list = self.expression()?;
        let (where_expression, map_expression) = if which == "filter" {
            self.expect(&TokenType::Where, "WHERE in filter()")?;
            (Some(self.expression()?), None)
        } else {
            self.expect(&TokenType::Pipe, "'|' in extract()")?;
            (None, Some(self.expression()?))
        };
        self.expect(&TokenType::RightParen, "')' closing list function")?;
        Ok(Expression::ListComprehension(Box::new(ListComprehension {
            variable,
            list,
            where_expression,
            map_expression,
        })))
    }

    /// reduce(acc = init, x IN list | expr) — the '(' is consumed.
    fn reduce_call(&mut self) -> Result<Expression, Error> {
        let accumulator = self.identifier("reduce accumulator")?;
        self.expect(&TokenType::Equals, "'=' after reduce accumulator")?;
        let init = self.expression()?;
        self.expect(&TokenType::Comma, "',' in reduce()")?;
        let variable = self.identifier("reduce variable")?;
        self.expect(&TokenType::In, "IN in reduce()")?;
        let list = self.expression()?;
        self.expect(&TokenType::Pipe, "'|' in reduce()")?;
        let body = self.expression()?;
        self.expect(&TokenType::RightParen, "')' closing reduce()")?;
        Ok(Expression::FunctionCall(FunctionCall {
            name: "__reduce".to_string(),
            args: vec![
                Expression::Variable(accumulator),
                init,
                Expression::Variable(variable),
                list,
                body,
            ],
        }))
    }

    /// After '[': a list literal, a list comprehension, or a pattern
    /// comprehension.
    fn bracketed_expression(&mut self) -> Result<Expression, Error> {
        // [ (a)-[:R]->(b) | expr ]
        if self.at(&TokenType::LeftParen) {
            let mark = self.mark();
            if let Ok(pattern) = self.pattern()
                && pattern.elements.len() >= 3
                && matches!(self.kind(), TokenType::Pipe | TokenType::Where)
            {
                let where_expression = if self.eat(&TokenType::Where) {
                    Some(self.expression()?)
                } else {
                    None
                };
                self.expect(&TokenType::Pipe, "'|' in pattern comprehension")?;
                let projection = self.expression()?;
                self.expect(&TokenType::RightBracket, "']' closing pattern comprehension")?;
                return Ok(Expression::PatternComprehension(Box::new(
                    PatternComprehension {
                        pattern,
                        where_expression,
                        projection,
                    },
                )));
            }
            self.rewind(mark);
        }

        // [ x IN list ... ]
        if matches!(self.kind(), TokenType::Identifier(_)) && self.kind_ahead(1) == &TokenType::In {
            let variable = self.identifier("comprehension variable")?;
            self.bump(); // IN
            let list = self.expression()?;
            let where_expression = if self.eat(&TokenType::Where) {
                Some(self.expression()?)
            } else {
                None
            };
            let map_expression = if self.eat(&TokenType::Pipe) {
                Some(self.expression()?)
            } else {
                None
            };
            self.expect(&TokenType::RightBracket, "']' closing comprehension")?;
            return Ok(Expression::ListComprehension(Box::new(ListComprehension {
                variable,
                list,
                where_expression,
                map_expression,
            })));
        }

        // [ expr, ... ]
        let mut items = Vec::new();
        if !self.at(&TokenType::RightBracket) {
            loop {
                items.push(self.expression()?);
                if !self.eat(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenType::RightBracket, "']' closing list")?;
        Ok(Expression::List(items))
    }

    fn case_expression(&mut self) -> Result<Expression, Error> {
        let operand = if self.at(&TokenType::When) {
            None
        } else {
            Some(self.expression()?)
        };

        let mut when_clauses = Vec::new();
        while self.eat(&TokenType::When) {
            let test = self.expression()?;
            self.expect(&TokenType::Then, "THEN after WHEN")?;
            let result = self.expression()?;
            // The simple form compares the operand against each WHEN value.
            let condition = match &operand {
                Some(subject) => binary(subject.clone(), BinaryOperator::Equals, test),
                None => test,
            };
            when_clauses.push((condition, result));
        }
        if when_clauses.is_empty() {
            return Err(Error::Other(
                "syntax error: CASE requires at least one WHEN".into(),
            ));
        }

        let else_expression = if self.eat(&TokenType::Else) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(&TokenType::End, "END closing CASE")?;
        Ok(Expression::Case(Box::new(CaseExpression {
            expression: operand,
            when_clauses,
            else_expression,
        })))
    }

    fn exists_expression(&mut self) -> Result<Expression, Error> {
        if self.eat(&TokenType::LeftBrace) {
            // EXISTS { MATCH ... } or EXISTS { (pattern) [WHERE ...] }
            if matches!(
                self.kind(),
                TokenType::Match
                    | TokenType::With
                    | TokenType::Return
                    | TokenType::Unwind
                    | TokenType::Call
            ) {
                let query = self.statement_for_exists()?;
                self.expect(&TokenType::RightBrace, "'}' closing EXISTS subquery")?;
                return Ok(Expression::Exists(Box::new(ExistsExpression::Subquery(
                    query,
                ))));
            }

            let pattern = self.pattern()?;
            let predicate = if self.eat(&TokenType::Where) {
                Some(self.expression()?)
            } else {
                None
            };
            self.expect(&TokenType::RightBrace, "'}' closing EXISTS pattern")?;
            return Ok(Expression::Exists(Box::new(match predicate {
                None => ExistsExpression::Pattern(pattern),
                Some(predicate) => {
                    ExistsExpression::Subquery(pattern_probe_query(pattern, predicate))
                }
            })));
        }

        if self.at(&TokenType::LeftParen) {
            // exists((a)-[:R]->(b)) is a pattern predicate; exists(n.prop)
            // is the legacy property-presence function.
            if let Some(pattern) = self.relationship_pattern_predicate() {
                return Ok(Expression::Exists(Box::new(ExistsExpression::Pattern(
                    pattern,
                ))));
            }
            self.bump();
            let inner = self.expression()?;
            self.expect(&TokenType::RightParen, "')' closing exists()")?;
            return Ok(Expression::FunctionCall(FunctionCall {
                name: "exists".to_string(),
                args: vec![inner],
            }));
        }

        Err(self.unexpected("'{' or '(' after EXISTS"))
    }

    fn statement_for_exists(&mut self) -> Result<Query, Error> {
        let query = self.statement()?;
        for clause in &query.clauses {
            if matches!(
                clause,
                Clause::Create(_)
                    | Clause::Merge(_)
                    | Clause::Set(_)
                    | Clause::Remove(_)
                    | Clause::Delete(_)
                    | Clause::Foreach(_)
            ) {
                return Err(Error::Other(
                    "syntax error: InvalidClauseComposition".into(),
                ));
            }
        }
        Ok(query)
    }

    /// A full pattern in parenthesized expression position counts as a
    /// predicate only when it actually describes a relationship (three or
    /// more elements); a bare `(n)` stays an ordinary group.
    pub(crate) fn relationship_pattern_predicate(&mut self) -> Option<Pattern> {
        if !self.at(&TokenType::LeftParen) {
            return None;
        }
        let mark = self.mark();
        match self.pattern() {
            Ok(pattern) if pattern.elements.len() >= 3 => Some(pattern),
            _ => {
                self.rewind(mark);
                None
            }
        }
    }
}

/// `EXISTS { (pattern) WHERE pred }` runs as a one-row-probe subquery.
fn pattern_probe_query(pattern: Pattern, predicate: Expression) -> Query {
    Query {
        clauses: vec![
            Clause::Match(MatchClause {
                optional: false,
                patterns: vec![pattern],
            }),
            Clause::Where(WhereClause {
                expression: predicate,
            }),
            Clause::Return(ReturnClause {
                distinct: false,
                items: vec![ReturnItem {
                    expression: Expression::Literal(Literal::Boolean(true)),
                    alias: None,
                }],
                order_by: None,
                limit: None,
                skip: None,
            }),
        ],
    }
}

/// Tokens acceptable where a property/label/segment name is expected.
fn keyed_name(tt: &TokenType) -> bool {
    matches!(tt, TokenType::Identifier(_))
        || keyword_text(tt).is_some()
        || matches!(tt, TokenType::Number(n) if n.is_integer())
}

#[cfg(test)]
mod tests {
    use crate::ast::{BinaryOperator, Clause, Expression, Literal};
    use crate::parser::Parser;

    fn return_expression(cypher: &str) -> Expression {
        let query = Parser::parse(cypher).expect("query should parse");
        let Some(Clause::Return(ret)) = query.clauses.last() else {
            panic!("expected a RETURN clause");
        };
        ret.items[0].expression.clone()
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let Expression::Binary(add) = return_expression("RETURN 1 + 2 * 3") else {
            panic!("expected a binary expression");
        };
        assert_eq!(add.operator, BinaryOperator::Add);
        let Expression::Binary(mul) = &add.right else {
            panic!("expected the product on the right");
        };
        assert_eq!(mul.operator, BinaryOperator::Multiply);
    }

    #[test]
    fn between_desugars_to_a_range_conjunction() {
        let Expression::Binary(and) = return_expression("RETURN 5 BETWEEN 1 AND 10") else {
            panic!("expected a conjunction");
        };
        assert_eq!(and.operator, BinaryOperator::And);
        let Expression::Binary(ge) = &and.left else {
            panic!("expected the lower bound check");
        };
        assert_eq!(ge.operator, BinaryOperator::GreaterEqual);
    }

    #[test]
    fn slice_and_index_use_internal_calls() {
        let Expression::FunctionCall(call) = return_expression("RETURN [1,2,3][0]") else {
            panic!("expected an internal call");
        };
        assert_eq!(call.name, "__index");

        let Expression::FunctionCall(call) = return_expression("RETURN [1,2,3][1..2]") else {
            panic!("expected an internal call");
        };
        assert_eq!(call.name, "__slice");
        assert_eq!(call.args.len(), 5);
    }

    #[test]
    fn simple_case_folds_operand_into_conditions() {
        let Expression::Case(case) = return_expression("RETURN CASE 1 WHEN 1 THEN 'a' END") else {
            panic!("expected a CASE expression");
        };
        let (condition, _) = &case.when_clauses[0];
        let Expression::Binary(eq) = condition else {
            panic!("expected an equality condition");
        };
        assert_eq!(eq.operator, BinaryOperator::Equals);
    }

    #[test]
    fn reduce_parses_to_the_internal_fold() {
        let Expression::FunctionCall(call) =
            return_expression("RETURN reduce(acc = 0, x IN [1,2] | acc + x)")
        else {
            panic!("expected a call");
        };
        assert_eq!(call.name, "__reduce");
        assert_eq!(call.args.len(), 5);
    }

    #[test]
    fn negative_i64_min_parses_whole() {
        let expr = return_expression("RETURN -9223372036854775808");
        assert_eq!(expr, Expression::Literal(Literal::Integer(i64::MIN)));
    }

    #[test]
    fn namespaced_calls_keep_their_dots() {
        let Expression::FunctionCall(call) = return_expression("RETURN apoc.coll.sum([1])") else {
            panic!("expected a call");
        };
        assert_eq!(call.name, "apoc.coll.sum");
    }
}
