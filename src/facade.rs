//! Query Facade - convenient methods for querying the graph.
//!
//! Provides a "SQLite-like" experience by adding convenient query methods
//! to any type that implements [`crate::model::GraphSnapshot`].
//!
//! # Example
//!
//! ```rust,ignore
//! use cypher_graph::{prepare, QueryExt};
//!
//! fn query_example(snapshot: &impl GraphSnapshot) {
//!     let rows = cypher_graph::query_collect(
//!         snapshot,
//!         "MATCH (n)-[:1]->(m) RETURN n, m LIMIT 10",
//!         &Default::default(),
//!     ).unwrap();
//! }
//! ```
//!
//! # Re-export for convenience
//!
//! This module re-exports the following types from [`crate::model`]:
//! - [`GraphSnapshot`] - The trait for snapshot access
//! - [`GraphStore`] - The trait for creating snapshots
//! - [`ExternalId`], [`InternalNodeId`], [`LabelId`], [`RelTypeId`] - ID types
//! - [`PropertyValue`] - Property value type
//! - [`EdgeKey`] - Edge key type

pub use crate::model::{
    EdgeKey, ExternalId, GraphSnapshot, GraphStore, InternalNodeId, LabelId, PropertyValue,
    RelTypeId,
};

use crate::{Error, Params, Result, Row};

/// Executes a Cypher query and collects all results into a Vec.
///
/// This is a convenience function that combines parsing, planning, and execution
/// in a single call, similar to how SQLite works.
///
/// # Errors
///
/// Returns an error if the query is invalid or execution fails.
///
/// # Example
///
/// ```rust,ignore
/// use cypher_graph::query_collect;
///
/// let rows = query_collect(
///     &snapshot,
///     "MATCH (n)-[:1]->(m) RETURN n, m LIMIT 10",
///     &Default::default(),
/// ).unwrap();
/// ```
pub fn query_collect<S: GraphSnapshot>(
    snapshot: &S,
    cypher: &str,
    params: &Params,
) -> Result<Vec<Row>> {
    let query = crate::query_api::prepare(cypher).map_err(|e| Error::Other(e.to_string()))?;
    let results: Vec<Result<Row>> = query.execute_streaming(snapshot, params).collect();
    results.into_iter().collect()
}

/// Extension trait providing convenient query methods.
///
/// This trait is automatically implemented for all types implementing
/// [`GraphSnapshot`], allowing a "SQLite-like" query experience.
///
/// # Example
///
/// ```rust,ignore
/// use cypher_graph::QueryExt;
///
/// fn query_example(snapshot: &impl GraphSnapshot) {
///     let rows = snapshot.query(
///         "MATCH (n)-[:1]->(m) RETURN n, m LIMIT 10",
///         &Default::default(),
///     ).unwrap();
/// }
/// ```
pub trait QueryExt {
    /// Executes a Cypher query and collects all results into a Vec.
    ///
    /// This is equivalent to calling [`query_collect()`] directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the query is invalid or execution fails.
    fn query(&self, cypher: &str, params: &Params) -> Result<Vec<Row>>;
}

impl<T: GraphSnapshot> QueryExt for T {
    fn query(&self, cypher: &str, params: &Params) -> Result<Vec<Row>> {
        query_collect(self, cypher, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::memory::{MemoryGraph, MemoryWriteTxn};
    use crate::{Params, Value, prepare};
    use std::collections::BTreeMap;

    fn run_write(graph: &MemoryGraph, cypher: &str) -> crate::executor::WriteStats {
        let query = prepare(cypher).unwrap();
        let snapshot = graph.snapshot();
        let mut txn = MemoryWriteTxn::new(graph);
        query.execute_write(&snapshot, &mut txn, &Params::new()).unwrap()
    }

    #[test]
    fn create_relationship_with_properties() {
        let graph = MemoryGraph::new();
        let stats = run_write(
            &graph,
            "CREATE (a:Person {name: 'Keanu'})-[:ACTED_IN {roles: ['Neo']}]->(m:Movie {title: 'The Matrix'})",
        );
        assert_eq!(stats.nodes_created, 2);
        assert_eq!(stats.rels_created, 1);

        let rows = query_collect(
            &graph.snapshot(),
            "MATCH (p)-[r:ACTED_IN]->(m) RETURN r.roles AS roles",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("roles"),
            Some(&Value::List(vec![Value::String("Neo".to_string())]))
        );
    }

    #[test]
    fn multiple_match_create_blocks_share_bindings() {
        let graph = MemoryGraph::new();
        graph.insert_node(
            &["Category"],
            BTreeMap::from([("categoryID".to_string(), PropertyValue::Int(1))]),
        );
        graph.insert_node(
            &["Category"],
            BTreeMap::from([("categoryID".to_string(), PropertyValue::Int(2))]),
        );
        graph.insert_node(
            &["Supplier"],
            BTreeMap::from([("supplierID".to_string(), PropertyValue::Int(1))]),
        );
        graph.insert_node(
            &["Supplier"],
            BTreeMap::from([("supplierID".to_string(), PropertyValue::Int(2))]),
        );

        let stats = run_write(
            &graph,
            "MATCH (s1:Supplier {supplierID:1}),(c1:Category {categoryID:1}) \
             CREATE (p1:Product {productID:1}) \
             CREATE (p1)-[:PART_OF]->(c1) \
             CREATE (s1)-[:SUPPLIES]->(p1) \
             MATCH (s2:Supplier {supplierID:2}),(c2:Category {categoryID:2}) \
             CREATE (p2:Product {productID:2}) \
             CREATE (p2)-[:PART_OF]->(c2) \
             CREATE (s2)-[:SUPPLIES]->(p2)",
        );
        assert_eq!(stats.nodes_created, 2);
        assert_eq!(stats.rels_created, 4);

        let rows = query_collect(
            &graph.snapshot(),
            "MATCH (s:Supplier)-[:SUPPLIES]->(p:Product)-[:PART_OF]->(c:Category) \
             RETURN s.supplierID AS sid, p.productID AS pid, c.categoryID AS cid \
             ORDER BY pid",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.get("sid"), row.get("pid"));
            assert_eq!(row.get("cid"), row.get("pid"));
        }
    }

    #[test]
    fn aggregation_groups_by_non_aggregate_items() {
        let graph = MemoryGraph::new();
        for (name, val) in [("A", 0), ("B", 10), ("C", 20)] {
            graph.insert_node(
                &["Item"],
                BTreeMap::from([
                    ("name".to_string(), PropertyValue::String(name.to_string())),
                    ("val".to_string(), PropertyValue::Int(val)),
                ]),
            );
        }

        let rows = query_collect(
            &graph.snapshot(),
            "MATCH (n:Item) RETURN n.name AS name, sum(n.val) AS total ORDER BY name",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(rows.len(), 3);
        let totals: Vec<_> = rows.iter().map(|r| r.get("total").cloned()).collect();
        assert_eq!(
            totals,
            vec![Some(Value::Int(0)), Some(Value::Int(10)), Some(Value::Int(20))]
        );
    }

    #[test]
    fn create_with_delete_return_count_pipeline() {
        let graph = MemoryGraph::new();
        let query = prepare("CREATE (t:TestNode {name:'temp'}) WITH t DELETE t RETURN count(t) AS c")
            .unwrap();
        let snapshot = graph.snapshot();
        let mut txn = MemoryWriteTxn::new(&graph);
        let (rows, stats) = query.execute_mixed(&snapshot, &mut txn, &Params::new()).unwrap();
        assert_eq!(stats.nodes_created, 1);
        assert_eq!(stats.nodes_deleted, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("c"), Some(&Value::Int(1)));
    }

    #[test]
    fn string_parameter_with_embedded_quote() {
        let graph = MemoryGraph::new();
        graph.insert_node(
            &["User"],
            BTreeMap::from([(
                "name".to_string(),
                PropertyValue::String("O'Connor".to_string()),
            )]),
        );
        graph.insert_node(
            &["User"],
            BTreeMap::from([(
                "name".to_string(),
                PropertyValue::String("Smith".to_string()),
            )]),
        );

        let mut params = Params::new();
        params.insert("name", Value::String("O'Connor".to_string()));
        let rows = query_collect(
            &graph.snapshot(),
            "MATCH (n:User {name: $name}) RETURN n.name AS name",
            &params,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("name"),
            Some(&Value::String("O'Connor".to_string()))
        );
    }

    #[test]
    fn predicate_quantifiers_over_literal_lists() {
        let graph = MemoryGraph::new();
        let rows = query_collect(
            &graph.snapshot(),
            "RETURN all(x IN [1,2,3] WHERE x > 0) AS r1, \
                    any(x IN [1,-2,3] WHERE x < 0) AS r2, \
                    none(x IN [1,2,3] WHERE x = 0) AS r3, \
                    single(x IN [1,2,3] WHERE x = 2) AS r4",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        for col in ["r1", "r2", "r3", "r4"] {
            assert_eq!(rows[0].get(col), Some(&Value::Bool(true)), "column {col}");
        }
    }

    #[test]
    fn count_matches_graph_cardinality() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["A"], BTreeMap::new());
        graph.insert_node(&["A"], BTreeMap::new());
        graph.insert_node(&["B"], BTreeMap::new());
        graph.insert_edge(0, "LINKS", 1, BTreeMap::new());
        graph.insert_edge(1, "LINKS", 2, BTreeMap::new());

        let snap = graph.snapshot();
        let nodes = query_collect(&snap, "MATCH (n) RETURN count(n) AS c", &Params::new()).unwrap();
        assert_eq!(nodes[0].get("c"), Some(&Value::Int(3)));

        let rels =
            query_collect(&snap, "MATCH ()-[r]->() RETURN count(r) AS c", &Params::new()).unwrap();
        assert_eq!(rels[0].get("c"), Some(&Value::Int(2)));
    }

    #[test]
    fn keys_hides_embedding_properties() {
        let graph = MemoryGraph::new();
        graph.insert_node(
            &["Doc"],
            BTreeMap::from([
                ("title".to_string(), PropertyValue::String("x".to_string())),
                (
                    "embedding".to_string(),
                    PropertyValue::List(vec![PropertyValue::Float(0.1)]),
                ),
            ]),
        );
        let rows = query_collect(
            &graph.snapshot(),
            "MATCH (n:Doc) RETURN keys(n) AS ks",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(
            rows[0].get("ks"),
            Some(&Value::List(vec![Value::String("title".to_string())]))
        );
    }

    #[test]
    fn reduce_and_legacy_comprehensions() {
        let graph = MemoryGraph::new();
        let rows = query_collect(
            &graph.snapshot(),
            "RETURN reduce(acc = 0, x IN [1,2,3] | acc + x) AS total, \
                    filter(x IN [1,2,3,4] WHERE x % 2 = 0) AS evens, \
                    extract(x IN [1,2,3] | x * 10) AS scaled",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(rows[0].get("total"), Some(&Value::Int(6)));
        assert_eq!(
            rows[0].get("evens"),
            Some(&Value::List(vec![Value::Int(2), Value::Int(4)]))
        );
        assert_eq!(
            rows[0].get("scaled"),
            Some(&Value::List(vec![
                Value::Int(10),
                Value::Int(20),
                Value::Int(30)
            ]))
        );
    }

    #[test]
    fn regex_and_between_predicates() {
        let graph = MemoryGraph::new();
        let rows = query_collect(
            &graph.snapshot(),
            "RETURN 'Keanu' =~ 'K.*' AS matched, \
                    'Keanu' =~ 'ean' AS partial, \
                    5 BETWEEN 1 AND 10 AS inside, \
                    11 BETWEEN 1 AND 10 AS outside",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(rows[0].get("matched"), Some(&Value::Bool(true)));
        assert_eq!(rows[0].get("partial"), Some(&Value::Bool(false)));
        assert_eq!(rows[0].get("inside"), Some(&Value::Bool(true)));
        assert_eq!(rows[0].get("outside"), Some(&Value::Bool(false)));
    }

    #[test]
    fn spatial_point_distance_round_trip() {
        let graph = MemoryGraph::new();
        let rows = query_collect(
            &graph.snapshot(),
            "RETURN point.distance(point({x: 0, y: 0}), point({x: 3, y: 4})) AS d, \
                    point.srid(point({latitude: 55.6, longitude: 12.5})) AS srid",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(rows[0].get("d"), Some(&Value::Float(5.0)));
        assert_eq!(rows[0].get("srid"), Some(&Value::Int(4326)));
    }

    #[test]
    fn delete_node_with_relationships_fails_without_detach() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["A"], BTreeMap::new());
        graph.insert_node(&["A"], BTreeMap::new());
        graph.insert_edge(0, "LINKS", 1, BTreeMap::new());

        let query = prepare("MATCH (n:A) DELETE n").unwrap();
        let snapshot = graph.snapshot();
        let mut txn = MemoryWriteTxn::new(&graph);
        let err = query
            .execute_write(&snapshot, &mut txn, &Params::new())
            .expect_err("plain DELETE on connected node should fail");
        assert!(err.to_string().contains("still has relationships"), "{err}");
    }

    #[test]
    fn call_yield_pipeline_selects_and_filters_columns() {
        use crate::executor::{
            TestProcedureField, TestProcedureFixture, TestProcedureType,
            register_test_procedure_fixture,
        };

        register_test_procedure_fixture(
            "test.labels",
            TestProcedureFixture {
                inputs: Vec::new(),
                outputs: vec![TestProcedureField {
                    name: "label".to_string(),
                    field_type: TestProcedureType::String,
                    nullable: false,
                }],
                rows: vec![
                    BTreeMap::from([(
                        "label".to_string(),
                        Value::String("Person".to_string()),
                    )]),
                    BTreeMap::from([(
                        "label".to_string(),
                        Value::String("Movie".to_string()),
                    )]),
                ],
            },
        );

        let graph = MemoryGraph::new();
        let rows = query_collect(
            &graph.snapshot(),
            "CALL test.labels() YIELD label WHERE label STARTS WITH 'P' RETURN label",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("label"),
            Some(&Value::String("Person".to_string()))
        );
    }

    #[test]
    fn unknown_procedure_reports_stable_prefix() {
        let graph = MemoryGraph::new();
        let err = query_collect(
            &graph.snapshot(),
            "CALL db.doesNotExist() YIELD x RETURN x",
            &Params::new(),
        )
        .expect_err("unknown procedure should fail");
        assert!(err.to_string().contains("unknown procedure"), "{err}");
    }
}
