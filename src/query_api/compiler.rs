//! Lowers a parsed statement into the executor's operator tree.
//!
//! Clauses translate in order, each one wrapping the tree built so far:
//! MATCH patterns become scans plus expansions with equality filters, WITH
//! and RETURN become projection (or aggregation) pipelines, and the write
//! clauses become their corresponding write operators. Variable scope is
//! tracked by name so anonymous pattern parts get hidden aliases and
//! OPTIONAL MATCH knows which names to null out on a miss.

use super::aggregates::{self, default_alias};
use crate::ast::{
    CallClause, Clause, Expression, Literal, MatchClause, NodePattern, OrderByClause, PathElement,
    Pattern, PropertyMap, Query, RelationshipDirection, RelationshipPattern, ReturnItem,
};
use crate::error::{Error, Result};
use crate::executor::{ExpandDirection, HIDDEN_NAME_PREFIX, Op};
use std::collections::BTreeSet;

#[derive(Debug)]
pub(super) struct Compiled {
    pub op: Op,
    pub columns: Vec<String>,
    pub writes: bool,
}

pub(super) fn compile_statement(query: &Query) -> Result<Compiled> {
    Compiler::default().compile(query, Op::Unit, &BTreeSet::new())
}

/// Compiles a subquery whose [`Op::Argument`] leaf supplies rows carrying
/// the given outer bindings.
pub(super) fn compile_seeded(query: &Query, outer: &BTreeSet<String>) -> Result<Compiled> {
    Compiler::default().compile(query, Op::Argument, outer)
}

#[derive(Default)]
struct Compiler {
    next_hidden: u32,
}

impl Compiler {
    fn hidden(&mut self, kind: char) -> String {
        let name = format!("{HIDDEN_NAME_PREFIX}{kind}{}", self.next_hidden);
        self.next_hidden += 1;
        name
    }

    fn compile(&mut self, query: &Query, seed: Op, outer: &BTreeSet<String>) -> Result<Compiled> {
        let mut op = seed;
        let mut scope = outer.clone();
        let mut writes = false;
        let mut columns = Vec::new();

        let mut clauses = query.clauses.iter().peekable();
        while let Some(clause) = clauses.next() {
            match clause {
                Clause::Match(m) if !m.optional => {
                    for pattern in &m.patterns {
                        op = self.pattern_ops(op, pattern, &mut scope, &mut Vec::new())?;
                    }
                    if let Some(Clause::Where(w)) = clauses.peek() {
                        aggregates::forbid_in_predicate(&w.expression)?;
                        op = Op::Filter {
                            input: Box::new(op),
                            predicate: w.expression.clone(),
                        };
                        clauses.next();
                    }
                }
                Clause::Match(m) => {
                    op = self.optional_match(op, m, &mut scope, &mut clauses)?;
                }
                Clause::Where(w) => {
                    aggregates::forbid_in_predicate(&w.expression)?;
                    op = Op::Filter {
                        input: Box::new(op),
                        predicate: w.expression.clone(),
                    };
                }
                Clause::Create(c) => {
                    writes = true;
                    validate_create(c, &scope)?;
                    for pattern in &c.patterns {
                        bind_pattern_names(pattern, &mut scope);
                    }
                    op = Op::Create {
                        input: Box::new(op),
                        patterns: c.patterns.clone(),
                    };
                }
                Clause::Merge(m) => {
                    writes = true;
                    bind_pattern_names(&m.pattern, &mut scope);
                    op = Op::Merge {
                        input: Box::new(op),
                        pattern: m.pattern.clone(),
                        on_create: m.on_create.clone(),
                        on_match: m.on_match.clone(),
                    };
                }
                Clause::Set(s) => {
                    writes = true;
                    op = Op::SetValues {
                        input: Box::new(op),
                        clause: s.clone(),
                    };
                }
                Clause::Remove(r) => {
                    writes = true;
                    op = Op::RemoveValues {
                        input: Box::new(op),
                        clause: r.clone(),
                    };
                }
                Clause::Delete(d) => {
                    writes = true;
                    op = Op::Delete {
                        input: Box::new(op),
                        detach: d.detach,
                        targets: d.expressions.clone(),
                    };
                }
                Clause::Unwind(u) => {
                    op = Op::Unwind {
                        input: Box::new(op),
                        list: u.expression.clone(),
                        alias: u.alias.clone(),
                    };
                    scope.insert(u.alias.clone());
                }
                Clause::Foreach(f) => {
                    writes = true;
                    let mut body_scope = scope.clone();
                    body_scope.insert(f.variable.clone());
                    let body = self.compile(
                        &Query {
                            clauses: f.updates.clone(),
                        },
                        Op::Argument,
                        &body_scope,
                    )?;
                    op = Op::Foreach {
                        input: Box::new(op),
                        variable: f.variable.clone(),
                        list: f.list.clone(),
                        body: Box::new(body.op),
                    };
                }
                Clause::With(w) => {
                    let (new_op, new_scope, _) = self.projection(
                        op,
                        &w.items,
                        w.distinct,
                        w.order_by.as_ref(),
                        w.skip.as_ref(),
                        w.limit.as_ref(),
                        &scope,
                    )?;
                    op = new_op;
                    scope = new_scope;
                    if let Some(filter) = &w.where_clause {
                        aggregates::forbid_in_predicate(&filter.expression)?;
                        op = Op::Filter {
                            input: Box::new(op),
                            predicate: filter.expression.clone(),
                        };
                    }
                }
                Clause::Return(r) => {
                    let (new_op, new_scope, cols) = self.projection(
                        op,
                        &r.items,
                        r.distinct,
                        r.order_by.as_ref(),
                        r.skip.as_ref(),
                        r.limit.as_ref(),
                        &scope,
                    )?;
                    op = new_op;
                    scope = new_scope;
                    columns = cols;
                }
                Clause::Call(CallClause::Procedure(p)) => {
                    let yields = p.yields.as_ref().map(|items| {
                        items
                            .iter()
                            .map(|y| (y.name.clone(), y.alias.clone()))
                            .collect::<Vec<_>>()
                    });
                    if let Some(items) = &p.yields {
                        for item in items {
                            scope.insert(item.alias.clone().unwrap_or_else(|| item.name.clone()));
                        }
                    }
                    op = Op::CallProcedure {
                        input: Box::new(op),
                        name: p.name.join("."),
                        args: p.arguments.clone(),
                        yields,
                    };
                }
                Clause::Call(CallClause::Subquery(sub)) => {
                    let body = self.compile(sub, Op::Argument, &scope)?;
                    writes |= body.writes;
                    scope.extend(body.columns.iter().cloned());
                    op = Op::Subquery {
                        input: Box::new(op),
                        body: Box::new(body.op),
                    };
                }
                Clause::Union(u) => {
                    let other = Compiler::default().compile(&u.query, Op::Unit, &BTreeSet::new())?;
                    if other.columns != columns {
                        return Err(Error::Other(
                            "syntax error: DifferentColumnsInUnion".into(),
                        ));
                    }
                    writes |= other.writes;
                    op = Op::Union {
                        left: Box::new(op),
                        right: Box::new(other.op),
                        distinct: !u.all,
                    };
                }
            }
        }

        Ok(Compiled {
            op,
            columns,
            writes,
        })
    }

    fn optional_match(
        &mut self,
        input: Op,
        m: &MatchClause,
        scope: &mut BTreeSet<String>,
        clauses: &mut std::iter::Peekable<std::slice::Iter<'_, Clause>>,
    ) -> Result<Op> {
        let mut branch_scope = scope.clone();
        let mut introduced = Vec::new();
        let mut branch = Op::Argument;
        for pattern in &m.patterns {
            branch = self.pattern_ops(branch, pattern, &mut branch_scope, &mut introduced)?;
        }
        // A WHERE directly after an OPTIONAL MATCH filters the branch, not
        // the surviving null rows.
        if let Some(Clause::Where(w)) = clauses.peek() {
            aggregates::forbid_in_predicate(&w.expression)?;
            branch = Op::Filter {
                input: Box::new(branch),
                predicate: w.expression.clone(),
            };
            clauses.next();
        }
        scope.extend(introduced.iter().cloned());
        Ok(Op::Optional {
            input: Box::new(input),
            branch: Box::new(branch),
            introduced,
        })
    }

    // ---- patterns ----

    fn pattern_ops(
        &mut self,
        input: Op,
        pattern: &Pattern,
        scope: &mut BTreeSet<String>,
        introduced: &mut Vec<String>,
    ) -> Result<Op> {
        let Some(PathElement::Node(first)) = pattern.elements.first() else {
            return Err(Error::Other("syntax error: empty pattern".into()));
        };

        let mut bind = |name: &str, scope: &mut BTreeSet<String>, introduced: &mut Vec<String>| {
            if scope.insert(name.to_string()) && !name.starts_with(HIDDEN_NAME_PREFIX) {
                introduced.push(name.to_string());
            }
        };

        let first_alias = match &first.variable {
            Some(name) => name.clone(),
            None => self.hidden('n'),
        };

        let mut op = if scope.contains(&first_alias) {
            // Already bound: keep the rows, just constrain them.
            self.node_constraints(input, &first_alias, first)
        } else {
            let scanned = self.node_scan(input, &first_alias, first);
            bind(&first_alias, scope, introduced);
            scanned
        };

        let path_alias = pattern.variable.clone();
        if let Some(path) = &path_alias {
            bind(path, scope, introduced);
        }

        if pattern.elements.len() == 1 {
            if let Some(path) = path_alias {
                op = Op::BindPath {
                    input: Box::new(op),
                    alias: path,
                    node: first_alias,
                };
            }
            return Ok(op);
        }

        let mut from_alias = first_alias;
        let mut rest = pattern.elements[1..].chunks_exact(2);
        for pair in &mut rest {
            let (PathElement::Relationship(rel), PathElement::Node(node)) = (&pair[0], &pair[1])
            else {
                return Err(Error::Other(
                    "syntax error: malformed path pattern".into(),
                ));
            };

            let edge_alias = match &rel.variable {
                Some(name) => name.clone(),
                None => self.hidden('r'),
            };
            let to_alias = match &node.variable {
                Some(name) => name.clone(),
                None => self.hidden('n'),
            };
            let to_bound = scope.contains(&to_alias);
            let direction = match rel.direction {
                RelationshipDirection::LeftToRight => ExpandDirection::Out,
                RelationshipDirection::RightToLeft => ExpandDirection::In,
                RelationshipDirection::Undirected => ExpandDirection::Any,
            };

            op = match &rel.variable_length {
                Some(bounds) => {
                    if rel.properties.is_some() {
                        return Err(Error::NotImplemented(
                            "property maps on variable-length relationships",
                        ));
                    }
                    Op::VarExpand {
                        input: Box::new(op),
                        from: from_alias.clone(),
                        edge: rel.variable.clone(),
                        to: to_alias.clone(),
                        to_bound,
                        types: rel.types.clone(),
                        direction,
                        min_hops: bounds.min.unwrap_or(1),
                        max_hops: bounds.max,
                        path: path_alias.clone(),
                    }
                }
                None => Op::Expand {
                    input: Box::new(op),
                    from: from_alias.clone(),
                    edge: edge_alias.clone(),
                    to: to_alias.clone(),
                    to_bound,
                    types: rel.types.clone(),
                    direction,
                    path: path_alias.clone(),
                },
            };
            if rel.variable.is_some() {
                bind(&edge_alias, scope, introduced);
            }
            if rel.variable_length.is_none() {
                op = self.edge_property_filters(op, &edge_alias, &rel.properties);
            }
            if !to_bound {
                bind(&to_alias, scope, introduced);
            }
            op = self.node_constraints(op, &to_alias, node);

            from_alias = to_alias;
        }

        if !rest.remainder().is_empty() {
            return Err(Error::Other(
                "syntax error: malformed path pattern".into(),
            ));
        }
        Ok(op)
    }

    /// Picks the cheapest entry point for an unbound pattern node: a
    /// property-index probe when a label plus property equality allows it,
    /// else a label scan, else the full scan. Residual labels and
    /// properties become filters.
    fn node_scan(&mut self, input: Op, alias: &str, node: &NodePattern) -> Op {
        let input = Box::new(input);
        if let (Some(label), Some(props)) = (node.labels.first(), &node.properties)
            && let Some(first_pair) = props.properties.first()
        {
            let probe = Op::IndexProbe {
                input,
                alias: alias.to_string(),
                label: label.clone(),
                property: first_pair.key.clone(),
                value: first_pair.value.clone(),
            };
            let residual = PropertyMap {
                properties: props.properties[1..].to_vec(),
            };
            let with_props = self.property_filters(probe, alias, &Some(residual));
            return label_filters(with_props, alias, &node.labels[1..]);
        }

        if let Some(label) = node.labels.first() {
            let scanned = Op::LabelScan {
                input,
                alias: alias.to_string(),
                label: label.clone(),
            };
            let with_labels = label_filters(scanned, alias, &node.labels[1..]);
            return self.property_filters(with_labels, alias, &node.properties);
        }

        let scanned = Op::AllNodes {
            input,
            alias: alias.to_string(),
        };
        self.property_filters(scanned, alias, &node.properties)
    }

    /// Filters an already-bound variable against the pattern's labels and
    /// properties.
    fn node_constraints(&mut self, input: Op, alias: &str, node: &NodePattern) -> Op {
        let with_labels = label_filters(input, alias, &node.labels);
        self.property_filters(with_labels, alias, &node.properties)
    }

    fn property_filters(&mut self, input: Op, alias: &str, props: &Option<PropertyMap>) -> Op {
        let Some(map) = props else {
            return input;
        };
        let mut op = input;
        for pair in &map.properties {
            op = Op::Filter {
                input: Box::new(op),
                predicate: property_equals(alias, &pair.key, pair.value.clone()),
            };
        }
        op
    }

    fn edge_property_filters(&mut self, input: Op, alias: &str, props: &Option<PropertyMap>) -> Op {
        self.property_filters(input, alias, props)
    }

    // ---- projections ----

    #[allow(clippy::too_many_arguments)]
    fn projection(
        &mut self,
        input: Op,
        items: &[ReturnItem],
        distinct: bool,
        order_by: Option<&OrderByClause>,
        skip: Option<&Expression>,
        limit: Option<&Expression>,
        scope: &BTreeSet<String>,
    ) -> Result<(Op, BTreeSet<String>, Vec<String>)> {
        let mut star = false;
        let mut plain: Vec<(String, Expression)> = Vec::new();
        let mut folds: Vec<(String, crate::ast::AggregateFunction)> = Vec::new();
        let mut columns = Vec::new();

        for (idx, item) in items.iter().enumerate() {
            if matches!(&item.expression, Expression::Literal(Literal::String(s)) if s == "*") {
                star = true;
                continue;
            }
            let alias = item
                .alias
                .clone()
                .unwrap_or_else(|| default_alias(&item.expression, idx));
            columns.push(alias.clone());
            match aggregates::recognize(&item.expression)? {
                Some(fold) => folds.push((alias, fold)),
                None => {
                    aggregates::forbid_in_predicate(&item.expression)?;
                    plain.push((alias, item.expression.clone()));
                }
            }
        }

        let mut op = if folds.is_empty() {
            Op::Project {
                input: Box::new(input),
                items: plain.clone(),
                star,
            }
        } else {
            if star {
                return Err(Error::Other(
                    "syntax error: cannot combine * with aggregation".into(),
                ));
            }
            Op::Aggregate {
                input: Box::new(input),
                keys: plain.clone(),
                folds,
            }
        };

        if distinct {
            op = Op::Dedup {
                input: Box::new(op),
            };
        }

        if let Some(order) = order_by {
            let keys = order
                .items
                .iter()
                .map(|item| {
                    // A sort key that repeats a projected expression reads
                    // the projected column instead of re-evaluating it.
                    let expr = items
                        .iter()
                        .find(|candidate| candidate.expression == item.expression)
                        .and_then(|candidate| candidate.alias.clone())
                        .map(Expression::Variable)
                        .unwrap_or_else(|| item.expression.clone());
                    let ascending = matches!(item.direction, crate::ast::Direction::Ascending);
                    (expr, ascending)
                })
                .collect();
            op = Op::Sort {
                input: Box::new(op),
                keys,
            };
        }

        if skip.is_some() || limit.is_some() {
            op = Op::Paginate {
                input: Box::new(op),
                skip: skip.cloned(),
                limit: limit.cloned(),
            };
        }

        let mut new_scope: BTreeSet<String> = columns.iter().cloned().collect();
        if star {
            new_scope.extend(scope.iter().cloned());
        }
        Ok((op, new_scope, columns))
    }
}

fn property_equals(alias: &str, key: &str, value: Expression) -> Expression {
    Expression::Binary(Box::new(crate::ast::BinaryExpression {
        left: Expression::PropertyAccess(crate::ast::PropertyAccess {
            variable: alias.to_string(),
            property: key.to_string(),
        }),
        operator: crate::ast::BinaryOperator::Equals,
        right: value,
    }))
}

fn label_filters(input: Op, alias: &str, labels: &[String]) -> Op {
    let mut op = input;
    for label in labels {
        op = Op::Filter {
            input: Box::new(op),
            predicate: Expression::Binary(Box::new(crate::ast::BinaryExpression {
                left: Expression::Variable(alias.to_string()),
                operator: crate::ast::BinaryOperator::HasLabel,
                right: Expression::Literal(Literal::String(label.clone())),
            })),
        };
    }
    op
}

fn bind_pattern_names(pattern: &Pattern, scope: &mut BTreeSet<String>) {
    if let Some(path) = &pattern.variable {
        scope.insert(path.clone());
    }
    for element in &pattern.elements {
        let name = match element {
            PathElement::Node(node) => node.variable.as_ref(),
            PathElement::Relationship(rel) => rel.variable.as_ref(),
        };
        if let Some(name) = name {
            scope.insert(name.clone());
        }
    }
}

fn validate_create(clause: &crate::ast::CreateClause, scope: &BTreeSet<String>) -> Result<()> {
    for pattern in &clause.patterns {
        for element in &pattern.elements {
            match element {
                PathElement::Node(node) => {
                    let rebinding = node
                        .variable
                        .as_ref()
                        .is_some_and(|var| scope.contains(var));
                    if rebinding && (!node.labels.is_empty() || node.properties.is_some()) {
                        return Err(Error::Other(format!(
                            "syntax error: VariableAlreadyBound ({})",
                            node.variable.as_deref().unwrap_or_default()
                        )));
                    }
                }
                PathElement::Relationship(rel) => {
                    validate_create_relationship(rel, scope)?;
                }
            }
        }
    }
    Ok(())
}

fn validate_create_relationship(
    rel: &RelationshipPattern,
    scope: &BTreeSet<String>,
) -> Result<()> {
    if rel.variable_length.is_some() {
        return Err(Error::Other("syntax error: CreatingVarLength".into()));
    }
    if rel.direction == RelationshipDirection::Undirected {
        return Err(Error::Other(
            "syntax error: RequiresDirectedRelationship".into(),
        ));
    }
    if rel.types.len() > 1 {
        return Err(Error::Other(
            "syntax error: NoSingleRelationshipType".into(),
        ));
    }
    if let Some(var) = &rel.variable
        && scope.contains(var)
    {
        return Err(Error::Other(format!(
            "syntax error: VariableAlreadyBound ({var})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::compile_statement;
    use crate::executor::Op;
    use crate::parser::Parser;

    fn compile(cypher: &str) -> super::Compiled {
        compile_statement(&Parser::parse(cypher).expect("parse should succeed"))
            .expect("compile should succeed")
    }

    #[test]
    fn label_and_property_pattern_compiles_to_an_index_probe() {
        let compiled = compile("MATCH (n:Person {name: 'Ada'}) RETURN n");
        fn contains_probe(op: &Op) -> bool {
            match op {
                Op::IndexProbe { .. } => true,
                Op::Project { input, .. }
                | Op::Filter { input, .. }
                | Op::LabelScan { input, .. } => contains_probe(input),
                _ => false,
            }
        }
        assert!(contains_probe(&compiled.op));
    }

    #[test]
    fn write_clauses_mark_the_statement_as_writing() {
        assert!(compile("CREATE (n:Person)").writes);
        assert!(compile("MATCH (n) DELETE n").writes);
        assert!(!compile("MATCH (n) RETURN n").writes);
    }

    #[test]
    fn create_rejects_undirected_relationships() {
        let query = Parser::parse("CREATE (a)-[:R]-(b)").unwrap();
        let err = compile_statement(&query).expect_err("undirected CREATE should fail");
        assert_eq!(
            err.to_string(),
            "syntax error: RequiresDirectedRelationship"
        );
    }

    #[test]
    fn create_rejects_rebinding_with_labels() {
        let query = Parser::parse("MATCH (n:Person) CREATE (n:Movie)").unwrap();
        let err = compile_statement(&query).expect_err("rebinding CREATE should fail");
        assert!(err.to_string().contains("VariableAlreadyBound"), "{err}");
    }

    #[test]
    fn aggregates_partition_projection_items() {
        let compiled = compile("MATCH (n:Item) RETURN n.name AS name, sum(n.val) AS total");
        fn find_aggregate(op: &Op) -> Option<(usize, usize)> {
            match op {
                Op::Aggregate { keys, folds, .. } => Some((keys.len(), folds.len())),
                Op::Project { input, .. }
                | Op::Sort { input, .. }
                | Op::Dedup { input }
                | Op::Paginate { input, .. } => find_aggregate(input),
                _ => None,
            }
        }
        assert_eq!(find_aggregate(&compiled.op), Some((1, 1)));
    }

    #[test]
    fn where_with_aggregate_is_rejected() {
        let query = Parser::parse("MATCH (n) WHERE count(n) > 1 RETURN n").unwrap();
        let err = compile_statement(&query).expect_err("aggregate in WHERE should fail");
        assert_eq!(err.to_string(), "syntax error: InvalidAggregation");
    }
}
