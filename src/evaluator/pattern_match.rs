//! Pattern predicates inside expressions: `(a)-[:R]->(b)` in a WHERE,
//! `exists(...)` over a pattern, and pattern comprehensions. A single
//! depth-first matcher drives all three; it walks the graph directly off
//! the snapshot, binding pattern variables over the outer row for each
//! complete match.

use super::cmp::cypher_equals;
use super::{Params, Row, Value, evaluate_expression_value};
use crate::ast::{
    NodePattern, PathElement, Pattern, PatternComprehension, RelationshipDirection,
    RelationshipPattern,
};
use crate::executor::PathValue;
use crate::model::{EdgeKey, GraphSnapshot, InternalNodeId};

/// Bound on variable-length hops inside a predicate, where an explicit
/// upper bound is missing. Predicates run per row, so runaway expansion
/// hurts quadratically.
const MAX_PREDICATE_HOPS: u32 = 16;

pub(super) fn evaluate_has_label<S: GraphSnapshot>(
    left: &Value,
    right: &Value,
    snapshot: &S,
) -> Value {
    let Value::String(label) = right else {
        return if matches!(left, Value::Null) || matches!(right, Value::Null) {
            Value::Null
        } else {
            Value::Bool(false)
        };
    };

    match left {
        Value::Null => Value::Null,
        Value::NodeId(id) => Value::Bool(node_has_label(snapshot, *id, label)),
        Value::Node(node) => Value::Bool(node.labels.iter().any(|have| have == label)),
        Value::EdgeKey(key) => {
            Value::Bool(snapshot.resolve_rel_type_name(key.rel).as_deref() == Some(label))
        }
        Value::Relationship(rel) => Value::Bool(rel.rel_type == *label),
        _ => Value::Bool(false),
    }
}

fn node_has_label<S: GraphSnapshot>(snapshot: &S, id: InternalNodeId, label: &str) -> bool {
    let Some(label_id) = snapshot.resolve_label_id(label) else {
        return false;
    };
    snapshot
        .resolve_node_labels(id)
        .unwrap_or_default()
        .contains(&label_id)
}

/// A pattern used as a boolean predicate. The first node must already be
/// bound in the row; an unbound start is Null (an OPTIONAL MATCH may have
/// produced nothing).
pub(super) fn evaluate_pattern_exists<S: GraphSnapshot>(
    pattern: &Pattern,
    row: &Row,
    snapshot: &S,
    params: &Params,
) -> Value {
    let Some((first, steps)) = split_pattern(pattern) else {
        return Value::Null;
    };
    let Some(start) = bound_node(first, row) else {
        return Value::Null;
    };
    if !node_satisfies(first, start, row, snapshot, params) {
        return Value::Bool(false);
    }

    let mut found = false;
    walk(
        snapshot,
        row,
        params,
        &steps,
        0,
        start,
        &mut vec![start],
        &mut Vec::new(),
        &mut |_, _| {
            found = true;
            false // one match settles the predicate
        },
    );
    Value::Bool(found)
}

/// `[ (a)-[:R]->(b) WHERE ... | expr ]`: one projected value per match,
/// with the pattern's variables bound for the filter and the projection.
pub(super) fn evaluate_pattern_comprehension<S: GraphSnapshot>(
    comp: &PatternComprehension,
    row: &Row,
    snapshot: &S,
    params: &Params,
) -> Value {
    let Some((first, steps)) = split_pattern(&comp.pattern) else {
        return Value::Null;
    };

    let starts: Vec<InternalNodeId> = match bound_node(first, row) {
        Some(id) => vec![id],
        None => snapshot.nodes().collect(),
    };

    let mut out = Vec::new();
    for start in starts {
        if !node_satisfies(first, start, row, snapshot, params) {
            continue;
        }
        walk(
            snapshot,
            row,
            params,
            &steps,
            0,
            start,
            &mut vec![start],
            &mut Vec::new(),
            &mut |nodes, edges| {
                let scoped = bind_match(&comp.pattern, row, nodes, edges);
                let keep = match &comp.where_expression {
                    None => true,
                    Some(filter) => matches!(
                        evaluate_expression_value(filter, &scoped, snapshot, params),
                        Value::Bool(true)
                    ),
                };
                if keep {
                    out.push(evaluate_expression_value(
                        &comp.projection,
                        &scoped,
                        snapshot,
                        params,
                    ));
                }
                true
            },
        );
    }
    Value::List(out)
}

struct Step<'p> {
    rel: &'p RelationshipPattern,
    node: &'p NodePattern,
}

fn split_pattern(pattern: &Pattern) -> Option<(&NodePattern, Vec<Step<'_>>)> {
    let PathElement::Node(first) = pattern.elements.first()? else {
        return None;
    };
    let mut steps = Vec::new();
    let mut rest = pattern.elements[1..].chunks_exact(2);
    for pair in &mut rest {
        let (PathElement::Relationship(rel), PathElement::Node(node)) = (&pair[0], &pair[1]) else {
            return None;
        };
        steps.push(Step { rel, node });
    }
    if !rest.remainder().is_empty() {
        return None;
    }
    Some((first, steps))
}

fn bound_node(node: &NodePattern, row: &Row) -> Option<InternalNodeId> {
    node.variable.as_ref().and_then(|var| row.get_node(var))
}

/// Labels and property-map equality for one candidate node.
fn node_satisfies<S: GraphSnapshot>(
    node: &NodePattern,
    id: InternalNodeId,
    row: &Row,
    snapshot: &S,
    params: &Params,
) -> bool {
    for label in &node.labels {
        if !node_has_label(snapshot, id, label) {
            return false;
        }
    }
    let Some(props) = &node.properties else {
        return true;
    };
    for pair in &props.properties {
        let wanted = evaluate_expression_value(&pair.value, row, snapshot, params);
        let have = snapshot
            .node_property(id, &pair.key)
            .as_ref()
            .map(crate::executor::convert_api_property_to_value)
            .unwrap_or(Value::Null);
        if !matches!(cypher_equals(&have, &wanted), Value::Bool(true)) {
            return false;
        }
    }
    true
}

fn edge_satisfies<S: GraphSnapshot>(
    rel: &RelationshipPattern,
    key: EdgeKey,
    row: &Row,
    snapshot: &S,
    params: &Params,
) -> bool {
    let Some(props) = &rel.properties else {
        return true;
    };
    for pair in &props.properties {
        let wanted = evaluate_expression_value(&pair.value, row, snapshot, params);
        let have = snapshot
            .edge_property(key, &pair.key)
            .as_ref()
            .map(crate::executor::convert_api_property_to_value)
            .unwrap_or(Value::Null);
        if !matches!(cypher_equals(&have, &wanted), Value::Bool(true)) {
            return false;
        }
    }
    true
}

fn hops<S: GraphSnapshot>(
    snapshot: &S,
    from: InternalNodeId,
    rel: &RelationshipPattern,
) -> Vec<(EdgeKey, InternalNodeId)> {
    let rel_ids: Vec<Option<crate::model::RelTypeId>> = if rel.types.is_empty() {
        vec![None]
    } else {
        rel.types
            .iter()
            .map(|t| snapshot.resolve_rel_type_id(t))
            .collect()
    };

    let mut out = Vec::new();
    for id in rel_ids {
        if id.is_none() && !rel.types.is_empty() {
            continue;
        }
        if !matches!(rel.direction, RelationshipDirection::RightToLeft) {
            out.extend(snapshot.neighbors(from, id).map(|k| (k, k.dst)));
        }
        if !matches!(rel.direction, RelationshipDirection::LeftToRight) {
            out.extend(snapshot.incoming_neighbors(from, id).map(|k| (k, k.src)));
        }
    }
    if matches!(rel.direction, RelationshipDirection::Undirected) {
        let mut seen = std::collections::HashSet::new();
        out.retain(|entry| seen.insert(*entry));
    }
    out
}

/// Depth-first match of the remaining steps. `emit` receives the node and
/// edge trail of each complete match and returns whether to keep searching.
#[allow(clippy::too_many_arguments)]
fn walk<S: GraphSnapshot>(
    snapshot: &S,
    row: &Row,
    params: &Params,
    steps: &[Step<'_>],
    at: usize,
    here: InternalNodeId,
    nodes: &mut Vec<InternalNodeId>,
    edges: &mut Vec<EdgeKey>,
    emit: &mut impl FnMut(&[InternalNodeId], &[EdgeKey]) -> bool,
) -> bool {
    let Some(step) = steps.get(at) else {
        return emit(nodes, edges);
    };

    let (min_hops, max_hops) = match &step.rel.variable_length {
        None => (1, 1),
        Some(bounds) => (
            bounds.min.unwrap_or(1),
            bounds.max.unwrap_or(MAX_PREDICATE_HOPS),
        ),
    };

    stretch(
        snapshot, row, params, steps, at, here, 0, min_hops, max_hops, nodes, edges, emit,
    )
}

/// Expands one (possibly variable-length) step, then recurses into the
/// next. Returns false when the search should stop entirely.
#[allow(clippy::too_many_arguments)]
fn stretch<S: GraphSnapshot>(
    snapshot: &S,
    row: &Row,
    params: &Params,
    steps: &[Step<'_>],
    at: usize,
    here: InternalNodeId,
    depth: u32,
    min_hops: u32,
    max_hops: u32,
    nodes: &mut Vec<InternalNodeId>,
    edges: &mut Vec<EdgeKey>,
    emit: &mut impl FnMut(&[InternalNodeId], &[EdgeKey]) -> bool,
) -> bool {
    let step = &steps[at];

    if depth >= min_hops
        && node_satisfies(step.node, here, row, snapshot, params)
        && target_matches(step.node, here, row)
        && !walk(snapshot, row, params, steps, at + 1, here, nodes, edges, emit)
    {
        return false;
    }
    if depth >= max_hops {
        return true;
    }

    for (key, next) in hops(snapshot, here, step.rel) {
        if edges.contains(&key) {
            continue;
        }
        if step.rel.variable_length.is_some() && nodes.contains(&next) {
            continue; // variable-length paths never revisit a node
        }
        if !edge_satisfies(step.rel, key, row, snapshot, params) {
            continue;
        }
        edges.push(key);
        nodes.push(next);
        let keep_going = stretch(
            snapshot,
            row,
            params,
            steps,
            at,
            next,
            depth + 1,
            min_hops,
            max_hops,
            nodes,
            edges,
            emit,
        );
        nodes.pop();
        edges.pop();
        if !keep_going {
            return false;
        }
    }
    true
}

/// When the step's node variable is already bound in the outer row, the
/// walk must land on that exact node.
fn target_matches(node: &NodePattern, here: InternalNodeId, row: &Row) -> bool {
    match bound_node(node, row) {
        Some(required) => required == here,
        None => true,
    }
}

/// Binds the pattern's variables over the outer row for one match. With a
/// variable-length step in the pattern, the node/edge trail no longer maps
/// 1:1 onto the elements: the start and terminal nodes still bind, the
/// stretchy relationship binds the whole edge list, and intermediate
/// positions stay unbound.
fn bind_match(
    pattern: &Pattern,
    row: &Row,
    nodes: &[InternalNodeId],
    edges: &[EdgeKey],
) -> Row {
    let mut scoped = row.clone();
    let stretchy = pattern.elements.iter().any(|el| {
        matches!(el, PathElement::Relationship(rel) if rel.variable_length.is_some())
    });

    let node_elements: Vec<&NodePattern> = pattern
        .elements
        .iter()
        .filter_map(|el| match el {
            PathElement::Node(node) => Some(node),
            _ => None,
        })
        .collect();

    if stretchy {
        if let Some(var) = node_elements.first().and_then(|n| n.variable.as_ref())
            && let Some(id) = nodes.first()
        {
            scoped = scoped.with(var.clone(), Value::NodeId(*id));
        }
        if node_elements.len() > 1
            && let Some(var) = node_elements.last().and_then(|n| n.variable.as_ref())
            && let Some(id) = nodes.last()
        {
            scoped = scoped.with(var.clone(), Value::NodeId(*id));
        }
        for element in &pattern.elements {
            if let PathElement::Relationship(rel) = element
                && let Some(var) = &rel.variable
            {
                scoped = scoped.with(
                    var.clone(),
                    Value::List(edges.iter().map(|k| Value::EdgeKey(*k)).collect()),
                );
            }
        }
    } else {
        for (at, node) in node_elements.iter().enumerate() {
            if let Some(var) = &node.variable
                && let Some(id) = nodes.get(at)
            {
                scoped = scoped.with(var.clone(), Value::NodeId(*id));
            }
        }
        let mut edge_at = 0;
        for element in &pattern.elements {
            if let PathElement::Relationship(rel) = element {
                if let Some(var) = &rel.variable {
                    let value = edges
                        .get(edge_at)
                        .map(|key| Value::EdgeKey(*key))
                        .unwrap_or(Value::Null);
                    scoped = scoped.with(var.clone(), value);
                }
                edge_at += 1;
            }
        }
    }

    if let Some(path_var) = &pattern.variable {
        scoped = scoped.with(
            path_var.clone(),
            Value::Path(PathValue {
                nodes: nodes.to_vec(),
                edges: edges.to_vec(),
            }),
        );
    }
    scoped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GraphStore;
    use crate::model::memory::MemoryGraph;
    use crate::parser::Parser;

    fn pattern_of(cypher: &str) -> Pattern {
        let query = Parser::parse(cypher).unwrap();
        let crate::ast::Clause::Match(m) = &query.clauses[0] else {
            panic!("expected MATCH");
        };
        m.patterns[0].clone()
    }

    #[test]
    fn exists_requires_a_bound_start() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["A"], Default::default());
        graph.insert_node(&["B"], Default::default());
        graph.insert_edge(0, "R", 1, Default::default());
        let snap = graph.snapshot();
        let params = Params::new();
        let pattern = pattern_of("MATCH (a)-[:R]->(b:B) RETURN a");

        let bound = Row::default().with("a", Value::NodeId(0));
        assert_eq!(
            evaluate_pattern_exists(&pattern, &bound, &snap, &params),
            Value::Bool(true)
        );
        assert_eq!(
            evaluate_pattern_exists(&pattern, &Row::default(), &snap, &params),
            Value::Null
        );
    }

    #[test]
    fn exists_is_false_when_no_edge_matches() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["A"], Default::default());
        graph.insert_node(&["B"], Default::default());
        let snap = graph.snapshot();
        let params = Params::new();
        let pattern = pattern_of("MATCH (a)-[:R]->(b) RETURN a");
        let bound = Row::default().with("a", Value::NodeId(0));
        assert_eq!(
            evaluate_pattern_exists(&pattern, &bound, &snap, &params),
            Value::Bool(false)
        );
    }

    #[test]
    fn comprehension_projects_each_match() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["A"], Default::default());
        graph.insert_node(&["B"], Default::default());
        graph.insert_node(&["B"], Default::default());
        graph.insert_edge(0, "R", 1, Default::default());
        graph.insert_edge(0, "R", 2, Default::default());
        let snap = graph.snapshot();
        let params = Params::new();

        let comp = PatternComprehension {
            pattern: pattern_of("MATCH (a)-[:R]->(b) RETURN a"),
            where_expression: None,
            projection: crate::ast::Expression::Variable("b".into()),
        };
        let bound = Row::default().with("a", Value::NodeId(0));
        let Value::List(items) =
            evaluate_pattern_comprehension(&comp, &bound, &snap, &params)
        else {
            panic!("expected a list");
        };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn has_label_checks_nodes_and_relationship_types() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["Person"], Default::default());
        let snap = graph.snapshot();
        assert_eq!(
            evaluate_has_label(
                &Value::NodeId(0),
                &Value::String("Person".into()),
                &snap
            ),
            Value::Bool(true)
        );
        assert_eq!(
            evaluate_has_label(&Value::Null, &Value::String("Person".into()), &snap),
            Value::Null
        );
    }
}
