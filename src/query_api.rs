//! The public query surface: [`prepare`] compiles a Cypher statement into a
//! [`PreparedQuery`] holding an executable operator tree, which can then run
//! against any snapshot (and, for writes, any write transaction) with a
//! [`Params`] map.

mod aggregates;
mod compiler;
mod describe;

use crate::ast;
use crate::error::{Error, Result};
use crate::executor::{Op, Row, Value, WriteStats, run_read, run_seeded_read, run_write};
use crate::model::{GraphSnapshot, WriteableGraph};
use std::collections::{BTreeSet, HashMap};

/// Named query parameters, referenced as `$name` in the statement text.
#[derive(Debug, Clone, Default)]
pub struct Params {
    inner: std::collections::BTreeMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.inner.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get(name)
    }
}

/// A parsed and compiled statement, reusable across executions.
#[derive(Debug)]
pub struct PreparedQuery {
    op: Op,
    columns: Vec<String>,
    writes: bool,
    explain: Option<String>,
}

impl PreparedQuery {
    /// The projection column names of the final RETURN, in statement order.
    /// Empty for statements without a RETURN (or with only `RETURN *`).
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Streams result rows for a read statement. A write statement yields a
    /// single error directing the caller to [`Self::execute_write`].
    pub fn execute_streaming<'a, S: GraphSnapshot + 'a>(
        &'a self,
        snapshot: &'a S,
        params: &'a Params,
    ) -> Box<dyn Iterator<Item = Result<Row>> + 'a> {
        if let Some(plan) = &self.explain {
            return Box::new(std::iter::once(Ok(
                Row::default().with("plan", Value::String(plan.clone()))
            )));
        }
        if self.writes {
            return Box::new(std::iter::once(Err(Error::Other(
                "write query requires execute_write".into(),
            ))));
        }
        match run_read(&self.op, snapshot, params) {
            Ok(rows) => Box::new(rows.into_iter().map(Ok)),
            Err(err) => Box::new(std::iter::once(Err(err))),
        }
    }

    /// Runs a write statement, returning the per-kind counters.
    pub fn execute_write<S: GraphSnapshot>(
        &self,
        snapshot: &S,
        txn: &mut impl WriteableGraph,
        params: &Params,
    ) -> Result<WriteStats> {
        if self.explain.is_some() {
            return Err(Error::Other(
                "EXPLAIN cannot be executed as a write query".into(),
            ));
        }
        let (_rows, stats) = run_write(&self.op, snapshot, txn, params)?;
        Ok(stats)
    }

    /// Runs a statement that both writes and returns rows.
    pub fn execute_mixed<S: GraphSnapshot>(
        &self,
        snapshot: &S,
        txn: &mut impl WriteableGraph,
        params: &Params,
    ) -> Result<(Vec<HashMap<String, Value>>, WriteStats)> {
        if self.explain.is_some() {
            return Err(Error::Other(
                "EXPLAIN cannot be executed as a mixed query".into(),
            ));
        }
        let (rows, stats) = run_write(&self.op, snapshot, txn, params)?;
        Ok((crate::executor::rows_to_maps(rows), stats))
    }
}

/// Parses and compiles one Cypher statement. `EXPLAIN <query>` compiles the
/// inner statement and renders its operator tree instead of executing.
pub fn prepare(cypher: &str) -> Result<PreparedQuery> {
    validate_surface(cypher)?;

    let (text, explain) = match strip_explain(cypher) {
        Some(inner) if inner.trim().is_empty() => {
            return Err(Error::Other("EXPLAIN requires a query".into()));
        }
        Some(inner) => (inner, true),
        None => (cypher, false),
    };

    let query = crate::parser::Parser::parse(text)?;
    let compiled = compiler::compile_statement(&query)?;
    Ok(PreparedQuery {
        explain: explain.then(|| describe::render(&compiled.op)),
        op: compiled.op,
        columns: compiled.columns,
        writes: compiled.writes,
    })
}

fn strip_explain(cypher: &str) -> Option<&str> {
    let trimmed = cypher.trim_start();
    if trimmed.len() >= 7 && trimmed[..7].eq_ignore_ascii_case("explain") {
        let rest = &trimmed[7..];
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Some(rest);
        }
    }
    None
}

/// Cheap surface checks ahead of tokenization, so the caller sees a stable
/// validation message instead of whatever mid-parse error the imbalance
/// would eventually cause.
fn validate_surface(cypher: &str) -> Result<()> {
    if cypher.trim().is_empty() {
        return Err(Error::Other("empty query".into()));
    }

    let mut stack = Vec::new();
    let mut in_quote: Option<char> = None;
    let mut chars = cypher.chars();
    while let Some(c) = chars.next() {
        match in_quote {
            Some(quote) => {
                if c == '\\' {
                    chars.next();
                } else if c == quote {
                    in_quote = None;
                }
            }
            None => match c {
                '\'' | '"' => in_quote = Some(c),
                '(' | '[' | '{' => stack.push(c),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    if stack.pop() != Some(expected) {
                        return Err(Error::Other("unbalanced brackets".into()));
                    }
                }
                _ => {}
            },
        }
    }
    if in_quote.is_some() {
        return Err(Error::Other("unbalanced quotes".into()));
    }
    if !stack.is_empty() {
        return Err(Error::Other("unbalanced brackets".into()));
    }
    Ok(())
}

/// Runs an `EXISTS { ... }` subquery seeded with the outer row, reporting
/// whether it produced anything. The subquery sees the outer bindings.
pub(crate) fn exists_subquery_has_rows<S: GraphSnapshot>(
    query: &ast::Query,
    row: &Row,
    snapshot: &S,
    params: &Params,
) -> Result<bool> {
    let bound: BTreeSet<String> = row
        .columns()
        .iter()
        .map(|(name, _)| name.clone())
        .collect();
    let compiled = compiler::compile_seeded(query, &bound)?;
    let rows = run_seeded_read(&compiled.op, snapshot, params, vec![row.clone()])?;
    Ok(!rows.is_empty())
}

#[cfg(test)]
mod tests {
    use super::prepare;

    #[test]
    fn empty_query_is_rejected_up_front() {
        let err = prepare("   ").expect_err("blank input should fail validation");
        assert_eq!(err.to_string(), "empty query");
    }

    #[test]
    fn unbalanced_brackets_are_rejected_up_front() {
        let err = prepare("MATCH (n RETURN n").expect_err("missing ')' should fail");
        assert_eq!(err.to_string(), "unbalanced brackets");
    }

    #[test]
    fn unbalanced_quotes_are_rejected_up_front() {
        let err = prepare("RETURN 'oops").expect_err("unterminated string should fail");
        assert_eq!(err.to_string(), "unbalanced quotes");
    }

    #[test]
    fn brackets_inside_strings_do_not_count() {
        assert!(prepare("RETURN '(['").is_ok());
    }

    #[test]
    fn explain_renders_instead_of_executing() {
        let query = prepare("EXPLAIN MATCH (n) RETURN n").unwrap();
        assert!(query.explain.is_some());
    }

    #[test]
    fn return_columns_follow_statement_order() {
        let query = prepare("MATCH (n) RETURN n.a AS first, n.b AS second").unwrap();
        assert_eq!(query.columns(), ["first", "second"]);
    }

    #[test]
    fn union_with_different_columns_is_rejected() {
        let err = prepare("RETURN 1 AS a UNION RETURN 2 AS b")
            .expect_err("UNION with different columns should fail");
        assert_eq!(err.to_string(), "syntax error: DifferentColumnsInUnion");
    }
}
