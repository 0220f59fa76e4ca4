//! Recursive-descent parser for the Cypher subset this crate executes.
//!
//! The grammar is split across three files: clause productions live here,
//! expression parsing in [`expr`], and node/relationship/path patterns in
//! [`pattern`]. All of them walk one shared [`Cursor`] over the token stream
//! produced by [`crate::lexer::Lexer`].
//!
//! Parsing is bounded by a fuel counter scaled to the input length, so a
//! pathological query fails with a syntax error instead of spinning.

mod expr;
mod pattern;

use crate::ast::*;
use crate::error::Error;
use crate::lexer::{Lexer, Token, TokenType};

pub struct Parser;

impl Parser {
    pub fn parse(input: &str) -> Result<Query, Error> {
        let tokens = Lexer::new(input).tokenize().map_err(Error::Other)?;
        let mut cursor = Cursor::new(tokens);
        let query = cursor.statement()?;
        cursor.eat(&TokenType::Semicolon);
        if !cursor.at(&TokenType::Eof) {
            return Err(cursor.unexpected("end of query"));
        }
        Ok(query)
    }
}

/// How many parse steps a query may burn per input token. Generous enough
/// for real queries; small enough to stop runaway nesting quickly.
const FUEL_PER_TOKEN: u32 = 64;

pub(crate) struct Cursor {
    toks: Vec<Token>,
    here: usize,
    fuel: u32,
}

impl Cursor {
    fn new(toks: Vec<Token>) -> Self {
        let fuel = (toks.len() as u32).saturating_mul(FUEL_PER_TOKEN).max(256);
        Self {
            toks,
            here: 0,
            fuel,
        }
    }

    pub(crate) fn burn(&mut self) -> Result<(), Error> {
        if self.fuel == 0 {
            return Err(Error::Other("syntax error: query too complex".into()));
        }
        self.fuel -= 1;
        Ok(())
    }

    pub(crate) fn kind(&self) -> &TokenType {
        self.toks
            .get(self.here)
            .map(|t| &t.token_type)
            .unwrap_or(&TokenType::Eof)
    }

    pub(crate) fn kind_ahead(&self, n: usize) -> &TokenType {
        self.toks
            .get(self.here + n)
            .map(|t| &t.token_type)
            .unwrap_or(&TokenType::Eof)
    }

    pub(crate) fn at(&self, tt: &TokenType) -> bool {
        self.kind() == tt
    }

    pub(crate) fn bump(&mut self) {
        if self.here < self.toks.len() {
            self.here += 1;
        }
    }

    pub(crate) fn eat(&mut self, tt: &TokenType) -> bool {
        if self.at(tt) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, tt: &TokenType, what: &str) -> Result<(), Error> {
        if self.eat(tt) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    pub(crate) fn unexpected(&self, wanted: &str) -> Error {
        Error::Other(format!(
            "syntax error: expected {wanted}, found {:?}",
            self.kind()
        ))
    }

    pub(crate) fn mark(&self) -> usize {
        self.here
    }

    pub(crate) fn rewind(&mut self, mark: usize) {
        self.here = mark;
    }

    /// A plain identifier in a position where keywords are not acceptable
    /// (variable names, aliases).
    pub(crate) fn identifier(&mut self, what: &str) -> Result<String, Error> {
        match self.kind() {
            TokenType::Identifier(name) => {
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// A name in label/type/property-key position, where reserved words and
    /// bare integers are legal (`n.end`, `(n:1)`, `[:1]`).
    pub(crate) fn name_like(&mut self, what: &str) -> Result<String, Error> {
        let name = match self.kind() {
            TokenType::Identifier(name) => name.clone(),
            TokenType::Number(n) if n.is_integer() => n.raw.clone(),
            other => match keyword_text(other) {
                Some(word) => word.to_string(),
                None => return Err(self.unexpected(what)),
            },
        };
        self.bump();
        Ok(name)
    }

    /// True when the identifier under the cursor matches `word`
    /// case-insensitively (for soft keywords like USING).
    pub(crate) fn at_word(&self, word: &str) -> bool {
        matches!(self.kind(), TokenType::Identifier(name) if name.eq_ignore_ascii_case(word))
    }

    // ---- statement & clause productions ----

    fn statement(&mut self) -> Result<Query, Error> {
        let mut clauses = Vec::new();
        loop {
            self.burn()?;
            match self.kind() {
                TokenType::Match => {
                    self.bump();
                    clauses.push(Clause::Match(self.match_clause(false)?));
                }
                TokenType::Optional => {
                    self.bump();
                    self.expect(&TokenType::Match, "MATCH after OPTIONAL")?;
                    clauses.push(Clause::Match(self.match_clause(true)?));
                }
                TokenType::Where => {
                    self.bump();
                    let expression = self.expression()?;
                    clauses.push(Clause::Where(WhereClause { expression }));
                }
                TokenType::Create => {
                    self.bump();
                    clauses.push(Clause::Create(CreateClause {
                        patterns: self.pattern_list()?,
                    }));
                }
                TokenType::Merge => {
                    self.bump();
                    clauses.push(Clause::Merge(self.merge_clause()?));
                }
                TokenType::Set => {
                    self.bump();
                    clauses.push(Clause::Set(self.set_clause()?));
                }
                TokenType::Remove => {
                    self.bump();
                    clauses.push(Clause::Remove(self.remove_clause()?));
                }
                TokenType::Delete => {
                    self.bump();
                    clauses.push(Clause::Delete(self.delete_clause(false)?));
                }
                TokenType::Detach => {
                    self.bump();
                    self.expect(&TokenType::Delete, "DELETE after DETACH")?;
                    clauses.push(Clause::Delete(self.delete_clause(true)?));
                }
                TokenType::With => {
                    self.bump();
                    clauses.push(Clause::With(self.with_clause()?));
                }
                TokenType::Return => {
                    self.bump();
                    clauses.push(Clause::Return(self.return_clause()?));
                }
                TokenType::Unwind => {
                    self.bump();
                    let expression = self.expression()?;
                    self.expect(&TokenType::As, "AS after UNWIND expression")?;
                    let alias = self.identifier("UNWIND alias")?;
                    clauses.push(Clause::Unwind(UnwindClause { expression, alias }));
                }
                TokenType::Foreach => {
                    self.bump();
                    clauses.push(Clause::Foreach(self.foreach_clause()?));
                }
                TokenType::Call => {
                    self.bump();
                    clauses.push(Clause::Call(self.call_clause()?));
                }
                TokenType::Union => {
                    self.bump();
                    let all = self.eat(&TokenType::All);
                    let query = self.statement()?;
                    clauses.push(Clause::Union(UnionClause { all, query }));
                    break;
                }
                _ => break,
            }
        }

        if clauses.is_empty() {
            return Err(self.unexpected("a clause keyword (MATCH, CREATE, RETURN, ...)"));
        }
        Ok(Query { clauses })
    }

    fn match_clause(&mut self, optional: bool) -> Result<MatchClause, Error> {
        let patterns = self.pattern_list()?;
        let clause = MatchClause { optional, patterns };
        self.index_hints(&clause)?;
        Ok(clause)
    }

    /// `USING INDEX var:Label(prop)` hints. The compiler already probes the
    /// property index whenever a label plus equality predicate allows it, so
    /// a hint is checked against the pattern and otherwise inert.
    fn index_hints(&mut self, clause: &MatchClause) -> Result<(), Error> {
        while self.at_word("using") {
            self.bump();
            let kind = self.identifier("hint kind after USING")?;
            if !kind.eq_ignore_ascii_case("index") {
                return Err(Error::Other(format!(
                    "syntax error: unsupported USING {} hint",
                    kind.to_uppercase()
                )));
            }
            let variable = self.identifier("index hint variable")?;
            self.expect(&TokenType::Colon, "':' in index hint")?;
            let _label = self.name_like("index hint label")?;
            self.expect(&TokenType::LeftParen, "'(' in index hint")?;
            let _property = self.name_like("index hint property")?;
            self.expect(&TokenType::RightParen, "')' after index hint")?;

            let bound = clause.patterns.iter().any(|pattern| {
                pattern.elements.iter().any(|element| match element {
                    PathElement::Node(node) => node.variable.as_deref() == Some(variable.as_str()),
                    PathElement::Relationship(rel) => {
                        rel.variable.as_deref() == Some(variable.as_str())
                    }
                })
            });
            if !bound {
                return Err(Error::Other(format!(
                    "syntax error: index hint references unbound variable '{variable}'"
                )));
            }
        }
        Ok(())
    }

    fn merge_clause(&mut self) -> Result<MergeClause, Error> {
        let pattern = self.pattern()?;
        let mut on_create = Vec::new();
        let mut on_match = Vec::new();
        while self.eat(&TokenType::On) {
            if self.eat(&TokenType::Create) {
                self.expect(&TokenType::Set, "SET after ON CREATE")?;
                on_create.push(self.set_clause()?);
            } else if self.eat(&TokenType::Match) {
                self.expect(&TokenType::Set, "SET after ON MATCH")?;
                on_match.push(self.set_clause()?);
            } else {
                return Err(self.unexpected("CREATE or MATCH after ON"));
            }
        }
        Ok(MergeClause {
            pattern,
            on_create,
            on_match,
        })
    }

    fn set_clause(&mut self) -> Result<SetClause, Error> {
        let mut items = Vec::new();
        let mut map_items = Vec::new();
        let mut labels = Vec::new();
        loop {
            let variable = self.identifier("SET target variable")?;
            match self.kind() {
                TokenType::Dot => {
                    self.bump();
                    let property = self.name_like("property name after '.'")?;
                    let merge = self.eat(&TokenType::Plus);
                    self.expect(&TokenType::Equals, "'=' in SET item")?;
                    let value = self.expression()?;
                    items.push(SetItem {
                        property: PropertyAccess { variable, property },
                        value,
                        merge,
                    });
                }
                TokenType::Colon => {
                    let mut set = Vec::new();
                    while self.eat(&TokenType::Colon) {
                        set.push(self.name_like("label after ':'")?);
                    }
                    labels.push(LabelSetItem {
                        variable,
                        labels: set,
                    });
                }
                TokenType::Equals => {
                    self.bump();
                    let value = self.expression()?;
                    map_items.push(MapSetItem {
                        variable,
                        value,
                        append: false,
                    });
                }
                TokenType::Plus => {
                    self.bump();
                    self.expect(&TokenType::Equals, "'=' after '+' in SET")?;
                    let value = self.expression()?;
                    map_items.push(MapSetItem {
                        variable,
                        value,
                        append: true,
                    });
                }
                _ => return Err(self.unexpected("'.', ':', '=' or '+=' in SET item")),
            }
            if !self.eat(&TokenType::Comma) {
                break;
            }
        }
        Ok(SetClause {
            items,
            map_items,
            labels,
        })
    }

    fn remove_clause(&mut self) -> Result<RemoveClause, Error> {
        let mut properties = Vec::new();
        let mut labels = Vec::new();
        loop {
            let variable = self.identifier("REMOVE target variable")?;
            match self.kind() {
                TokenType::Dot => {
                    self.bump();
                    let property = self.name_like("property name after '.'")?;
                    properties.push(PropertyAccess { variable, property });
                }
                TokenType::Colon => {
                    let mut set = Vec::new();
                    while self.eat(&TokenType::Colon) {
                        set.push(self.name_like("label after ':'")?);
                    }
                    labels.push(LabelRemoveItem {
                        variable,
                        labels: set,
                    });
                }
                _ => return Err(self.unexpected("'.' or ':' in REMOVE item")),
            }
            if !self.eat(&TokenType::Comma) {
                break;
            }
        }
        Ok(RemoveClause { properties, labels })
    }

    fn delete_clause(&mut self, detach: bool) -> Result<DeleteClause, Error> {
        let mut expressions = vec![self.expression()?];
        while self.eat(&TokenType::Comma) {
            expressions.push(self.expression()?);
        }
        Ok(DeleteClause {
            detach,
            expressions,
        })
    }

    fn with_clause(&mut self) -> Result<WithClause, Error> {
        let distinct = self.eat(&TokenType::Distinct);
        let items = self.projection_items()?;
        let order_by = self.order_by()?;
        let skip = self.skip_expr()?;
        let limit = self.limit_expr()?;
        let where_clause = if self.eat(&TokenType::Where) {
            Some(WhereClause {
                expression: self.expression()?,
            })
        } else {
            None
        };
        Ok(WithClause {
            distinct,
            items,
            where_clause,
            order_by,
            limit,
            skip,
        })
    }

    fn return_clause(&mut self) -> Result<ReturnClause, Error> {
        let distinct = self.eat(&TokenType::Distinct);
        let items = self.projection_items()?;
        let order_by = self.order_by()?;
        let skip = self.skip_expr()?;
        let limit = self.limit_expr()?;
        Ok(ReturnClause {
            distinct,
            items,
            order_by,
            limit,
            skip,
        })
    }

    fn projection_items(&mut self) -> Result<Vec<ReturnItem>, Error> {
        let mut items = Vec::new();
        loop {
            if self.at(&TokenType::Asterisk) {
                self.bump();
                items.push(ReturnItem {
                    expression: Expression::Literal(Literal::String("*".to_string())),
                    alias: None,
                });
            } else {
                let expression = self.expression()?;
                let alias = if self.eat(&TokenType::As) {
                    Some(self.identifier("projection alias")?)
                } else {
                    None
                };
                items.push(ReturnItem { expression, alias });
            }
            if !self.eat(&TokenType::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn order_by(&mut self) -> Result<Option<OrderByClause>, Error> {
        if !self.eat(&TokenType::Order) {
            return Ok(None);
        }
        self.expect(&TokenType::By, "BY after ORDER")?;
        let mut items = Vec::new();
        loop {
            let expression = self.expression()?;
            let direction = if self.eat(&TokenType::Desc) {
                Direction::Descending
            } else {
                self.eat(&TokenType::Asc);
                Direction::Ascending
            };
            items.push(OrderByItem {
                expression,
                direction,
            });
            if !self.eat(&TokenType::Comma) {
                break;
            }
        }
        Ok(Some(OrderByClause { items }))
    }

    fn skip_expr(&mut self) -> Result<Option<Expression>, Error> {
        if self.eat(&TokenType::Skip) {
            Ok(Some(self.expression()?))
        } else {
            Ok(None)
        }
    }

    fn limit_expr(&mut self) -> Result<Option<Expression>, Error> {
        if self.eat(&TokenType::Limit) {
            Ok(Some(self.expression()?))
        } else {
            Ok(None)
        }
    }

    fn foreach_clause(&mut self) -> Result<ForeachClause, Error> {
        self.expect(&TokenType::LeftParen, "'(' after FOREACH")?;
        let variable = self.identifier("FOREACH variable")?;
        self.expect(&TokenType::In, "IN after FOREACH variable")?;
        let list = self.expression()?;
        self.expect(&TokenType::Pipe, "'|' before FOREACH updates")?;

        let mut updates = Vec::new();
        loop {
            self.burn()?;
            match self.kind() {
                TokenType::Set => {
                    self.bump();
                    updates.push(Clause::Set(self.set_clause()?));
                }
                TokenType::Remove => {
                    self.bump();
                    updates.push(Clause::Remove(self.remove_clause()?));
                }
                TokenType::Create => {
                    self.bump();
                    updates.push(Clause::Create(CreateClause {
                        patterns: self.pattern_list()?,
                    }));
                }
                TokenType::Merge => {
                    self.bump();
                    updates.push(Clause::Merge(self.merge_clause()?));
                }
                TokenType::Delete => {
                    self.bump();
                    updates.push(Clause::Delete(self.delete_clause(false)?));
                }
                TokenType::Detach => {
                    self.bump();
                    self.expect(&TokenType::Delete, "DELETE after DETACH")?;
                    updates.push(Clause::Delete(self.delete_clause(true)?));
                }
                TokenType::Foreach => {
                    self.bump();
                    updates.push(Clause::Foreach(self.foreach_clause()?));
                }
                TokenType::RightParen => break,
                _ => return Err(self.unexpected("an update clause or ')' in FOREACH")),
            }
        }
        self.expect(&TokenType::RightParen, "')' closing FOREACH")?;

        if updates.is_empty() {
            return Err(Error::Other(
                "syntax error: FOREACH requires at least one update clause".into(),
            ));
        }
        Ok(ForeachClause {
            variable,
            list,
            updates,
        })
    }

    fn call_clause(&mut self) -> Result<CallClause, Error> {
        if self.at(&TokenType::LeftBrace) {
            self.bump();
            let query = self.statement()?;
            self.expect(&TokenType::RightBrace, "'}' closing CALL subquery")?;
            return Ok(CallClause::Subquery(query));
        }

        let mut name = vec![self.identifier("procedure name")?];
        while self.eat(&TokenType::Dot) {
            name.push(self.name_like("procedure name segment")?);
        }

        let mut arguments = Vec::new();
        if self.eat(&TokenType::LeftParen) {
            if !self.at(&TokenType::RightParen) {
                loop {
                    arguments.push(self.expression()?);
                    if !self.eat(&TokenType::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenType::RightParen, "')' closing procedure arguments")?;
        }

        let yields = if self.eat(&TokenType::Yield) {
            if self.eat(&TokenType::Asterisk) {
                // YIELD * keeps every output column, same as no YIELD list.
                None
            } else {
                let mut list = Vec::new();
                loop {
                    let field = self.identifier("YIELD column")?;
                    let alias = if self.eat(&TokenType::As) {
                        Some(self.identifier("YIELD alias")?)
                    } else {
                        None
                    };
                    list.push(YieldItem { name: field, alias });
                    if !self.eat(&TokenType::Comma) {
                        break;
                    }
                }
                Some(list)
            }
        } else {
            None
        };

        Ok(CallClause::Procedure(ProcedureCall {
            name,
            arguments,
            yields,
        }))
    }
}

/// Reserved words that are still legal as label/type/property names.
pub(crate) fn keyword_text(tt: &TokenType) -> Option<&'static str> {
    match tt {
        TokenType::Match => Some("MATCH"),
        TokenType::Create => Some("CREATE"),
        TokenType::Return => Some("RETURN"),
        TokenType::Where => Some("WHERE"),
        TokenType::With => Some("WITH"),
        TokenType::Optional => Some("OPTIONAL"),
        TokenType::Order => Some("ORDER"),
        TokenType::By => Some("BY"),
        TokenType::Asc => Some("ASC"),
        TokenType::Desc => Some("DESC"),
        TokenType::Limit => Some("LIMIT"),
        TokenType::Skip => Some("SKIP"),
        TokenType::Distinct => Some("DISTINCT"),
        TokenType::And => Some("AND"),
        TokenType::Or => Some("OR"),
        TokenType::Not => Some("NOT"),
        TokenType::Xor => Some("XOR"),
        TokenType::Is => Some("IS"),
        TokenType::In => Some("IN"),
        TokenType::Starts => Some("STARTS"),
        TokenType::Ends => Some("ENDS"),
        TokenType::Contains => Some("CONTAINS"),
        TokenType::Set => Some("SET"),
        TokenType::Delete => Some("DELETE"),
        TokenType::Detach => Some("DETACH"),
        TokenType::Remove => Some("REMOVE"),
        TokenType::Merge => Some("MERGE"),
        TokenType::Union => Some("UNION"),
        TokenType::All => Some("ALL"),
        TokenType::Unwind => Some("UNWIND"),
        TokenType::As => Some("AS"),
        TokenType::Case => Some("CASE"),
        TokenType::When => Some("WHEN"),
        TokenType::Then => Some("THEN"),
        TokenType::Else => Some("ELSE"),
        TokenType::End => Some("END"),
        TokenType::Call => Some("CALL"),
        TokenType::Yield => Some("YIELD"),
        TokenType::Foreach => Some("FOREACH"),
        TokenType::On => Some("ON"),
        TokenType::Exists => Some("EXISTS"),
        TokenType::Between => Some("BETWEEN"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::Parser;
    use crate::ast::{Clause, Expression, Literal};

    #[test]
    fn parses_match_where_return() {
        let query = Parser::parse("MATCH (n:Person) WHERE n.age > 30 RETURN n.name AS name")
            .expect("query should parse");
        assert_eq!(query.clauses.len(), 3);
        assert!(matches!(query.clauses[0], Clause::Match(_)));
        assert!(matches!(query.clauses[1], Clause::Where(_)));
        assert!(matches!(query.clauses[2], Clause::Return(_)));
    }

    #[test]
    fn merge_subclauses_land_on_the_merge_clause() {
        let query = Parser::parse(
            "MERGE (n:Person {name: 'Ada'}) ON CREATE SET n.created = true ON MATCH SET n.seen = true",
        )
        .expect("query should parse");
        let Clause::Merge(merge) = &query.clauses[0] else {
            panic!("expected MERGE clause");
        };
        assert_eq!(merge.on_create.len(), 1);
        assert_eq!(merge.on_match.len(), 1);
    }

    #[test]
    fn return_star_is_a_star_item() {
        let query = Parser::parse("MATCH (n) RETURN *").unwrap();
        let Clause::Return(ret) = &query.clauses[1] else {
            panic!("expected RETURN clause");
        };
        assert!(matches!(
            &ret.items[0].expression,
            Expression::Literal(Literal::String(s)) if s == "*"
        ));
    }

    #[test]
    fn union_wraps_the_remainder() {
        let query = Parser::parse("RETURN 1 AS x UNION ALL RETURN 2 AS x").unwrap();
        let Clause::Union(union) = query.clauses.last().unwrap() else {
            panic!("expected UNION clause");
        };
        assert!(union.all);
        assert_eq!(union.query.clauses.len(), 1);
    }

    #[test]
    fn rejects_leading_garbage() {
        assert!(Parser::parse("FLY (n) RETURN n").is_err());
    }

    #[test]
    fn index_hint_must_reference_a_pattern_variable() {
        let err = Parser::parse("MATCH (n:Person) USING INDEX m:Person(name) RETURN n")
            .expect_err("hint on unbound variable should fail");
        assert!(err.to_string().contains("unbound variable 'm'"), "{err}");
    }

    #[test]
    fn foreach_requires_updates() {
        assert!(Parser::parse("FOREACH (x IN [1,2] | )").is_err());
        assert!(Parser::parse("MATCH (n) FOREACH (x IN [1] | SET n.seen = true)").is_ok());
    }
}
