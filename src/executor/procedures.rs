use super::{
    EdgeKey, Error, GraphSnapshot, InternalNodeId, LabelId, RelTypeId, Result, Row, Value,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock, RwLock};

pub trait Procedure: Send + Sync {
    fn execute(&self, snapshot: &dyn ErasedSnapshot, args: Vec<Value>) -> Result<Vec<Row>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestProcedureType {
    Any,
    Integer,
    Float,
    Number,
    String,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestProcedureField {
    pub name: String,
    pub field_type: TestProcedureType,
    pub nullable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TestProcedureFixture {
    pub inputs: Vec<TestProcedureField>,
    pub outputs: Vec<TestProcedureField>,
    pub rows: Vec<BTreeMap<String, Value>>,
}

pub trait ErasedSnapshot {
    fn neighbors_erased(
        &self,
        src: InternalNodeId,
        rel: Option<RelTypeId>,
    ) -> Box<dyn Iterator<Item = EdgeKey> + '_>;
    fn incoming_neighbors_erased(
        &self,
        dst: InternalNodeId,
        rel: Option<RelTypeId>,
    ) -> Box<dyn Iterator<Item = EdgeKey> + '_>;
    fn node_property_erased(
        &self,
        iid: InternalNodeId,
        key: &str,
    ) -> Option<crate::model::PropertyValue>;
    fn resolve_label_name_erased(&self, id: LabelId) -> Option<String>;
    fn resolve_rel_type_name_erased(&self, id: RelTypeId) -> Option<String>;
    fn resolve_node_labels_erased(&self, iid: InternalNodeId) -> Option<Vec<LabelId>>;
    fn node_properties_erased(
        &self,
        iid: InternalNodeId,
    ) -> Option<std::collections::BTreeMap<String, crate::model::PropertyValue>>;
    fn edge_properties_erased(
        &self,
        key: EdgeKey,
    ) -> Option<std::collections::BTreeMap<String, crate::model::PropertyValue>>;
    fn nodes_erased(&self) -> Box<dyn Iterator<Item = InternalNodeId> + '_>;
}

impl<S: GraphSnapshot> ErasedSnapshot for S {
    fn neighbors_erased(
        &self,
        src: InternalNodeId,
        rel: Option<RelTypeId>,
    ) -> Box<dyn Iterator<Item = EdgeKey> + '_> {
        Box::new(self.neighbors(src, rel))
    }

    fn incoming_neighbors_erased(
        &self,
        dst: InternalNodeId,
        rel: Option<RelTypeId>,
    ) -> Box<dyn Iterator<Item = EdgeKey> + '_> {
        Box::new(self.incoming_neighbors(dst, rel))
    }

    fn node_property_erased(
        &self,
        iid: InternalNodeId,
        key: &str,
    ) -> Option<crate::model::PropertyValue> {
        self.node_property(iid, key)
    }

    fn resolve_label_name_erased(&self, id: LabelId) -> Option<String> {
        self.resolve_label_name(id)
    }

    fn resolve_rel_type_name_erased(&self, id: RelTypeId) -> Option<String> {
        self.resolve_rel_type_name(id)
    }

    fn resolve_node_labels_erased(&self, iid: InternalNodeId) -> Option<Vec<LabelId>> {
        self.resolve_node_labels(iid)
    }

    fn node_properties_erased(
        &self,
        iid: InternalNodeId,
    ) -> Option<std::collections::BTreeMap<String, crate::model::PropertyValue>> {
        self.node_properties(iid)
    }

    fn edge_properties_erased(
        &self,
        key: EdgeKey,
    ) -> Option<std::collections::BTreeMap<String, crate::model::PropertyValue>> {
        self.edge_properties(key)
    }

    fn nodes_erased(&self) -> Box<dyn Iterator<Item = InternalNodeId> + '_> {
        self.nodes()
    }
}

pub struct ProcedureRegistry {
    handlers: HashMap<String, Arc<dyn Procedure>>,
}

impl Default for ProcedureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcedureRegistry {
    pub fn new() -> Self {
        let mut handlers: HashMap<String, Arc<dyn Procedure>> = HashMap::new();
        handlers.insert("db.labels".to_string(), Arc::new(DbLabelsProcedure));
        handlers.insert(
            "db.relationshipTypes".to_string(),
            Arc::new(DbRelationshipTypesProcedure),
        );
        handlers.insert(
            "db.propertyKeys".to_string(),
            Arc::new(DbPropertyKeysProcedure),
        );
        handlers.insert(
            "dbms.components".to_string(),
            Arc::new(DbmsComponentsProcedure),
        );
        handlers.insert("dbms.procedures".to_string(), Arc::new(DbmsProceduresProcedure));
        handlers.insert("dbms.functions".to_string(), Arc::new(DbmsFunctionsProcedure));
        handlers.insert("db.indexes".to_string(), Arc::new(DbIndexesProcedure));
        handlers.insert("db.constraints".to_string(), Arc::new(DbConstraintsProcedure));
        handlers.insert(
            "db.schema.visualization".to_string(),
            Arc::new(DbSchemaVisualizationProcedure),
        );
        handlers.insert(
            "db.schema.nodeProperties".to_string(),
            Arc::new(DbSchemaNodePropertiesProcedure),
        );
        handlers.insert(
            "db.schema.relProperties".to_string(),
            Arc::new(DbSchemaRelPropertiesProcedure),
        );
        handlers.insert(
            "nornicdb.version".to_string(),
            Arc::new(EngineVersionProcedure),
        );
        handlers.insert("nornicdb.stats".to_string(), Arc::new(EngineStatsProcedure));
        handlers.insert(
            "nornicdb.decay.info".to_string(),
            Arc::new(DecayInfoProcedure),
        );
        handlers.insert(
            "db.index.vector.queryNodes".to_string(),
            Arc::new(VectorQueryNodesProcedure),
        );
        handlers.insert(
            "db.index.fulltext.queryNodes".to_string(),
            Arc::new(FulltextQueryNodesProcedure),
        );
        handlers.insert(
            "test.doNothing".to_string(),
            Arc::new(TestFixtureProcedure {
                name: "test.doNothing".to_string(),
            }),
        );
        handlers.insert(
            "test.labels".to_string(),
            Arc::new(TestFixtureProcedure {
                name: "test.labels".to_string(),
            }),
        );
        handlers.insert(
            "test.my.proc".to_string(),
            Arc::new(TestFixtureProcedure {
                name: "test.my.proc".to_string(),
            }),
        );
        Self { handlers }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Procedure>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

pub static GLOBAL_PROCEDURE_REGISTRY: OnceLock<ProcedureRegistry> = OnceLock::new();

pub fn get_procedure_registry() -> &'static ProcedureRegistry {
    GLOBAL_PROCEDURE_REGISTRY.get_or_init(ProcedureRegistry::new)
}

static TEST_PROCEDURE_FIXTURES: OnceLock<RwLock<HashMap<String, TestProcedureFixture>>> =
    OnceLock::new();

fn get_test_procedure_fixture_map() -> &'static RwLock<HashMap<String, TestProcedureFixture>> {
    TEST_PROCEDURE_FIXTURES.get_or_init(|| RwLock::new(HashMap::new()))
}

pub fn clear_test_procedure_fixtures() {
    if let Ok(mut guard) = get_test_procedure_fixture_map().write() {
        guard.clear();
    }
}

pub fn register_test_procedure_fixture(name: impl Into<String>, fixture: TestProcedureFixture) {
    if let Ok(mut guard) = get_test_procedure_fixture_map().write() {
        guard.insert(name.into(), fixture);
    }
}

pub fn get_test_procedure_fixture(name: &str) -> Option<TestProcedureFixture> {
    get_test_procedure_fixture_map()
        .read()
        .ok()
        .and_then(|guard| guard.get(name).cloned())
}

fn assert_assignable(field: &TestProcedureField, value: &Value) -> Result<()> {
    if matches!(value, Value::Null) {
        return if field.nullable {
            Ok(())
        } else {
            Err(Error::Other(
                "syntax error: InvalidArgumentType".to_string(),
            ))
        };
    }

    let ok = match field.field_type {
        TestProcedureType::Any => true,
        TestProcedureType::Integer => matches!(value, Value::Int(_)),
        TestProcedureType::Float => matches!(value, Value::Float(_) | Value::Int(_)),
        TestProcedureType::Number => matches!(value, Value::Float(_) | Value::Int(_)),
        TestProcedureType::String => matches!(value, Value::String(_)),
        TestProcedureType::Boolean => matches!(value, Value::Bool(_)),
    };

    if ok {
        Ok(())
    } else {
        Err(Error::Other(
            "syntax error: InvalidArgumentType".to_string(),
        ))
    }
}

fn values_match(field: &TestProcedureField, expected: &Value, actual: &Value) -> bool {
    if matches!(expected, Value::Null) || matches!(actual, Value::Null) {
        return expected == actual;
    }

    match field.field_type {
        TestProcedureType::Float | TestProcedureType::Number => {
            let left = match expected {
                Value::Int(i) => *i as f64,
                Value::Float(f) => *f,
                _ => return false,
            };
            let right = match actual {
                Value::Int(i) => *i as f64,
                Value::Float(f) => *f,
                _ => return false,
            };
            (left - right).abs() < 1e-9
        }
        _ => expected == actual,
    }
}

struct TestFixtureProcedure {
    name: String,
}

impl Procedure for TestFixtureProcedure {
    fn execute(&self, _snapshot: &dyn ErasedSnapshot, args: Vec<Value>) -> Result<Vec<Row>> {
        let Some(fixture) = get_test_procedure_fixture(&self.name) else {
            return Err(Error::Other("syntax error: ProcedureNotFound".to_string()));
        };

        if args.len() != fixture.inputs.len() {
            return Err(Error::Other(
                "syntax error: InvalidNumberOfArguments".to_string(),
            ));
        }

        for (field, value) in fixture.inputs.iter().zip(args.iter()) {
            assert_assignable(field, value)?;
        }

        if fixture.outputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for row in &fixture.rows {
            let mut matched = true;
            for (idx, field) in fixture.inputs.iter().enumerate() {
                let expected = row.get(&field.name);
                let actual = args.get(idx);
                match (expected, actual) {
                    (Some(expected), Some(actual)) if values_match(field, expected, actual) => {}
                    _ => {
                        matched = false;
                        break;
                    }
                }
            }

            if !matched {
                continue;
            }

            let mut cols = Vec::with_capacity(fixture.outputs.len());
            for field in &fixture.outputs {
                cols.push((
                    field.name.clone(),
                    row.get(&field.name).cloned().unwrap_or(Value::Null),
                ));
            }
            out.push(Row::new(cols));
        }

        Ok(out)
    }
}

struct DbLabelsProcedure;

impl Procedure for DbLabelsProcedure {
    fn execute(&self, snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        let mut seen = std::collections::BTreeSet::new();
        for iid in snapshot.nodes_erased() {
            if let Some(labels) = snapshot.resolve_node_labels_erased(iid) {
                for label in labels {
                    if let Some(name) = snapshot.resolve_label_name_erased(label) {
                        seen.insert(name);
                    }
                }
            }
        }
        Ok(seen
            .into_iter()
            .map(|name| Row::new(vec![("label".to_string(), Value::String(name))]))
            .collect())
    }
}

struct DbRelationshipTypesProcedure;

impl Procedure for DbRelationshipTypesProcedure {
    fn execute(&self, snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        let mut seen = std::collections::BTreeSet::new();
        for iid in snapshot.nodes_erased() {
            for edge in snapshot.neighbors_erased(iid, None) {
                if let Some(name) = snapshot.resolve_rel_type_name_erased(edge.rel) {
                    seen.insert(name);
                }
            }
        }
        Ok(seen
            .into_iter()
            .map(|name| Row::new(vec![("relationshipType".to_string(), Value::String(name))]))
            .collect())
    }
}

struct DbPropertyKeysProcedure;

impl Procedure for DbPropertyKeysProcedure {
    fn execute(&self, snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        let mut seen = std::collections::BTreeSet::new();
        for iid in snapshot.nodes_erased() {
            if let Some(props) = snapshot.node_properties_erased(iid) {
                seen.extend(props.into_keys());
            }
            for edge in snapshot.neighbors_erased(iid, None) {
                if let Some(props) = snapshot.edge_properties_erased(edge) {
                    seen.extend(props.into_keys());
                }
            }
        }
        Ok(seen
            .into_iter()
            .map(|name| Row::new(vec![("propertyKey".to_string(), Value::String(name))]))
            .collect())
    }
}

struct DbmsComponentsProcedure;

impl Procedure for DbmsComponentsProcedure {
    fn execute(&self, _snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        Ok(vec![Row::new(vec![
            ("name".to_string(), Value::String("cypher-graph".to_string())),
            (
                "versions".to_string(),
                Value::List(vec![Value::String("2.0.0".to_string())]),
            ),
            ("edition".to_string(), Value::String("embedded".to_string())),
        ])])
    }
}

struct DbmsProceduresProcedure;

impl Procedure for DbmsProceduresProcedure {
    fn execute(&self, _snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        Ok(get_procedure_registry()
            .names()
            .into_iter()
            .map(|name| {
                Row::new(vec![
                    ("name".to_string(), Value::String(name)),
                    ("mode".to_string(), Value::String("READ".to_string())),
                    ("worksOnSystem".to_string(), Value::Bool(false)),
                ])
            })
            .collect())
    }
}

/// The registered scalar/aggregate function families, one row per namespace.
/// Individual names live in the evaluator's dispatch tables; enumerating every
/// spelling here would drift, so this reports the families a driver can probe.
const FUNCTION_NAMESPACES: &[(&str, &str)] = &[
    ("", "scalar, string, math, list, and temporal builtins"),
    ("apoc.coll", "collection helpers"),
    ("apoc.convert", "JSON interchange"),
    ("apoc.map", "map helpers"),
    ("apoc.meta", "runtime type inspection"),
    ("apoc.text", "text helpers"),
    ("point", "spatial constructors and predicates"),
    ("vector.similarity", "vector similarity kernels"),
    ("kalman", "opaque numeric callables"),
];

struct DbmsFunctionsProcedure;

impl Procedure for DbmsFunctionsProcedure {
    fn execute(&self, _snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        Ok(FUNCTION_NAMESPACES
            .iter()
            .map(|(namespace, description)| {
                Row::new(vec![
                    ("name".to_string(), Value::String(namespace.to_string())),
                    (
                        "description".to_string(),
                        Value::String(description.to_string()),
                    ),
                ])
            })
            .collect())
    }
}

struct DbIndexesProcedure;

impl Procedure for DbIndexesProcedure {
    // Index management lives in the host storage engine; an engine-level
    // listing has nothing to report, so the procedure yields no rows.
    fn execute(&self, _snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }
}

struct DbConstraintsProcedure;

impl Procedure for DbConstraintsProcedure {
    fn execute(&self, _snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }
}

fn collect_label_names(snapshot: &dyn ErasedSnapshot) -> std::collections::BTreeSet<String> {
    let mut out = std::collections::BTreeSet::new();
    for iid in snapshot.nodes_erased() {
        if let Some(labels) = snapshot.resolve_node_labels_erased(iid) {
            for label in labels {
                if let Some(name) = snapshot.resolve_label_name_erased(label) {
                    out.insert(name);
                }
            }
        }
    }
    out
}

fn collect_rel_type_names(snapshot: &dyn ErasedSnapshot) -> std::collections::BTreeSet<String> {
    let mut out = std::collections::BTreeSet::new();
    for iid in snapshot.nodes_erased() {
        for edge in snapshot.neighbors_erased(iid, None) {
            if let Some(name) = snapshot.resolve_rel_type_name_erased(edge.rel) {
                out.insert(name);
            }
        }
    }
    out
}

fn property_type_name(value: &crate::model::PropertyValue) -> &'static str {
    match value {
        crate::model::PropertyValue::Null => "Null",
        crate::model::PropertyValue::Bool(_) => "Boolean",
        crate::model::PropertyValue::Int(_) => "Integer",
        crate::model::PropertyValue::Float(_) => "Float",
        crate::model::PropertyValue::String(_) => "String",
        crate::model::PropertyValue::List(_) => "List",
        crate::model::PropertyValue::Map(_) => "Map",
    }
}

struct DbSchemaVisualizationProcedure;

impl Procedure for DbSchemaVisualizationProcedure {
    fn execute(&self, snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        let nodes: Vec<Value> = collect_label_names(snapshot)
            .into_iter()
            .map(|name| {
                let mut m = BTreeMap::new();
                m.insert("name".to_string(), Value::String(name));
                Value::Map(m)
            })
            .collect();
        let relationships: Vec<Value> = collect_rel_type_names(snapshot)
            .into_iter()
            .map(|name| {
                let mut m = BTreeMap::new();
                m.insert("name".to_string(), Value::String(name));
                Value::Map(m)
            })
            .collect();
        Ok(vec![Row::new(vec![
            ("nodes".to_string(), Value::List(nodes)),
            ("relationships".to_string(), Value::List(relationships)),
        ])])
    }
}

struct DbSchemaNodePropertiesProcedure;

impl Procedure for DbSchemaNodePropertiesProcedure {
    fn execute(&self, snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        // (label, property) -> set of observed type names
        let mut seen: BTreeMap<(String, String), std::collections::BTreeSet<&'static str>> =
            BTreeMap::new();
        for iid in snapshot.nodes_erased() {
            let labels: Vec<String> = snapshot
                .resolve_node_labels_erased(iid)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|l| snapshot.resolve_label_name_erased(l))
                .collect();
            let Some(props) = snapshot.node_properties_erased(iid) else {
                continue;
            };
            for (key, value) in &props {
                for label in &labels {
                    seen.entry((label.clone(), key.clone()))
                        .or_default()
                        .insert(property_type_name(value));
                }
            }
        }
        Ok(seen
            .into_iter()
            .map(|((label, property), types)| {
                Row::new(vec![
                    (
                        "nodeLabels".to_string(),
                        Value::List(vec![Value::String(label)]),
                    ),
                    ("propertyName".to_string(), Value::String(property)),
                    (
                        "propertyTypes".to_string(),
                        Value::List(
                            types
                                .into_iter()
                                .map(|t| Value::String(t.to_string()))
                                .collect(),
                        ),
                    ),
                ])
            })
            .collect())
    }
}

struct DbSchemaRelPropertiesProcedure;

impl Procedure for DbSchemaRelPropertiesProcedure {
    fn execute(&self, snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        let mut seen: BTreeMap<(String, String), std::collections::BTreeSet<&'static str>> =
            BTreeMap::new();
        for iid in snapshot.nodes_erased() {
            for edge in snapshot.neighbors_erased(iid, None) {
                let Some(rel_type) = snapshot.resolve_rel_type_name_erased(edge.rel) else {
                    continue;
                };
                let Some(props) = snapshot.edge_properties_erased(edge) else {
                    continue;
                };
                for (key, value) in &props {
                    seen.entry((rel_type.clone(), key.clone()))
                        .or_default()
                        .insert(property_type_name(value));
                }
            }
        }
        Ok(seen
            .into_iter()
            .map(|((rel_type, property), types)| {
                Row::new(vec![
                    ("relType".to_string(), Value::String(rel_type)),
                    ("propertyName".to_string(), Value::String(property)),
                    (
                        "propertyTypes".to_string(),
                        Value::List(
                            types
                                .into_iter()
                                .map(|t| Value::String(t.to_string()))
                                .collect(),
                        ),
                    ),
                ])
            })
            .collect())
    }
}

struct EngineVersionProcedure;

impl Procedure for EngineVersionProcedure {
    fn execute(&self, _snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        Ok(vec![Row::new(vec![
            (
                "version".to_string(),
                Value::String(env!("CARGO_PKG_VERSION").to_string()),
            ),
            (
                "name".to_string(),
                Value::String(env!("CARGO_PKG_NAME").to_string()),
            ),
        ])])
    }
}

struct EngineStatsProcedure;

impl Procedure for EngineStatsProcedure {
    fn execute(&self, snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        let node_count = snapshot.nodes_erased().count() as i64;
        let mut rel_count = 0i64;
        for iid in snapshot.nodes_erased() {
            rel_count += snapshot.neighbors_erased(iid, None).count() as i64;
        }
        Ok(vec![Row::new(vec![
            ("nodes".to_string(), Value::Int(node_count)),
            ("relationships".to_string(), Value::Int(rel_count)),
            (
                "labels".to_string(),
                Value::Int(collect_label_names(snapshot).len() as i64),
            ),
        ])])
    }
}

/// Relevance-decay scoring is a host-side concern; the procedure exists so
/// introspection pipelines can probe for it without special-casing engines.
struct DecayInfoProcedure;

impl Procedure for DecayInfoProcedure {
    fn execute(&self, _snapshot: &dyn ErasedSnapshot, _args: Vec<Value>) -> Result<Vec<Row>> {
        Ok(vec![Row::new(vec![
            ("enabled".to_string(), Value::Bool(false)),
            (
                "description".to_string(),
                Value::String("relevance decay is not managed by this engine".to_string()),
            ),
        ])])
    }
}

fn numeric_vector(value: &Value) -> Option<Vec<f64>> {
    match value {
        Value::List(items) => items
            .iter()
            .map(|v| match v {
                Value::Int(i) => Some(*i as f64),
                Value::Float(f) => Some(*f),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn property_vector(value: &crate::model::PropertyValue) -> Option<Vec<f64>> {
    match value {
        crate::model::PropertyValue::List(items) => items
            .iter()
            .map(|v| match v {
                crate::model::PropertyValue::Int(i) => Some(*i as f64),
                crate::model::PropertyValue::Float(f) => Some(*f),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

/// `db.index.vector.queryNodes(indexName, k, queryVector)`: brute-force cosine
/// scan over node `embedding` properties. The index name is accepted for call
/// compatibility; nearest-neighbor acceleration is the host's concern.
struct VectorQueryNodesProcedure;

impl Procedure for VectorQueryNodesProcedure {
    fn execute(&self, snapshot: &dyn ErasedSnapshot, args: Vec<Value>) -> Result<Vec<Row>> {
        let k = match args.get(1) {
            Some(Value::Int(k)) if *k > 0 => *k as usize,
            _ => {
                return Err(Error::Other(
                    "db.index.vector.queryNodes requires a positive row count".to_string(),
                ));
            }
        };
        let Some(query) = args.get(2).and_then(numeric_vector) else {
            return Err(Error::Other(
                "db.index.vector.queryNodes requires a numeric query vector".to_string(),
            ));
        };

        let mut scored: Vec<(f64, InternalNodeId)> = Vec::new();
        for iid in snapshot.nodes_erased() {
            let Some(prop) = snapshot.node_property_erased(iid, "embedding") else {
                continue;
            };
            let Some(vector) = property_vector(&prop) else {
                continue;
            };
            if let Some(score) = cosine_similarity(&query, &vector) {
                scored.push((score, iid));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, iid)| {
                Row::new(vec![
                    ("node".to_string(), Value::NodeId(iid)),
                    ("score".to_string(), Value::Float(score)),
                ])
            })
            .collect())
    }
}

/// `db.index.fulltext.queryNodes(indexName, query)`: case-insensitive substring
/// scan over string properties, scored by the number of matching properties.
struct FulltextQueryNodesProcedure;

impl Procedure for FulltextQueryNodesProcedure {
    fn execute(&self, snapshot: &dyn ErasedSnapshot, args: Vec<Value>) -> Result<Vec<Row>> {
        let Some(Value::String(query)) = args.get(1) else {
            return Err(Error::Other(
                "db.index.fulltext.queryNodes requires a query string".to_string(),
            ));
        };
        let needle = query.to_lowercase();

        let mut scored: Vec<(f64, InternalNodeId)> = Vec::new();
        for iid in snapshot.nodes_erased() {
            let Some(props) = snapshot.node_properties_erased(iid) else {
                continue;
            };
            let hits = props
                .values()
                .filter(|v| {
                    matches!(v, crate::model::PropertyValue::String(s)
                        if s.to_lowercase().contains(&needle))
                })
                .count();
            if hits > 0 {
                scored.push((hits as f64, iid));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .map(|(score, iid)| {
                Row::new(vec![
                    ("node".to_string(), Value::NodeId(iid)),
                    ("score".to_string(), Value::Float(score)),
                ])
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GraphStore;
    use crate::model::memory::MemoryGraph;

    #[test]
    fn db_labels_lists_distinct_labels() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["Person"], BTreeMap::new());
        graph.insert_node(&["Person", "Admin"], BTreeMap::new());
        let snap = graph.snapshot();
        let rows = DbLabelsProcedure.execute(&snap, Vec::new()).unwrap();
        let labels: Vec<_> = rows
            .iter()
            .filter_map(|r| r.get("label").and_then(|v| v.as_string()))
            .collect();
        assert_eq!(labels, vec!["Admin", "Person"]);
    }

    #[test]
    fn unknown_procedure_is_absent_from_registry() {
        assert!(get_procedure_registry().get("db.nope").is_none());
    }

    #[test]
    fn schema_node_properties_reports_types_per_label() {
        let graph = MemoryGraph::new();
        graph.insert_node(
            &["Item"],
            BTreeMap::from([("val".to_string(), crate::model::PropertyValue::Int(1))]),
        );
        let snap = graph.snapshot();
        let rows = DbSchemaNodePropertiesProcedure
            .execute(&snap, Vec::new())
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("propertyName"),
            Some(&Value::String("val".to_string()))
        );
        assert_eq!(
            rows[0].get("propertyTypes"),
            Some(&Value::List(vec![Value::String("Integer".to_string())]))
        );
    }

    #[test]
    fn vector_query_ranks_by_cosine_similarity() {
        let graph = MemoryGraph::new();
        let aligned = crate::model::PropertyValue::List(vec![
            crate::model::PropertyValue::Float(1.0),
            crate::model::PropertyValue::Float(0.0),
        ]);
        let orthogonal = crate::model::PropertyValue::List(vec![
            crate::model::PropertyValue::Float(0.0),
            crate::model::PropertyValue::Float(1.0),
        ]);
        graph.insert_node(&["Doc"], BTreeMap::from([("embedding".to_string(), aligned)]));
        graph.insert_node(
            &["Doc"],
            BTreeMap::from([("embedding".to_string(), orthogonal)]),
        );
        let snap = graph.snapshot();
        let query = Value::List(vec![Value::Float(1.0), Value::Float(0.0)]);
        let rows = VectorQueryNodesProcedure
            .execute(
                &snap,
                vec![Value::String("embeddings".to_string()), Value::Int(1), query],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("node"), Some(&Value::NodeId(0)));
    }

    #[test]
    fn fulltext_query_matches_substrings_case_insensitively() {
        let graph = MemoryGraph::new();
        graph.insert_node(
            &["Doc"],
            BTreeMap::from([(
                "title".to_string(),
                crate::model::PropertyValue::String("Graph Databases".to_string()),
            )]),
        );
        graph.insert_node(
            &["Doc"],
            BTreeMap::from([(
                "title".to_string(),
                crate::model::PropertyValue::String("Unrelated".to_string()),
            )]),
        );
        let snap = graph.snapshot();
        let rows = FulltextQueryNodesProcedure
            .execute(
                &snap,
                vec![
                    Value::String("titles".to_string()),
                    Value::String("graph".to_string()),
                ],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("node"), Some(&Value::NodeId(0)));
    }
}

/// Executes `CALL name(args) [YIELD ...]` once per input row. Without a
/// YIELD list every output column joins onto the row; with one, only the
/// selected (possibly aliased) columns do.
pub(super) fn call<S: GraphSnapshot>(
    input: &super::Op,
    name: &str,
    args: &[crate::ast::Expression],
    yields: Option<&[(String, Option<String>)]>,
    ctx: &mut super::ExecCtx<'_, S>,
) -> Result<Vec<Row>> {
    let Some(procedure) = get_procedure_registry().get(name) else {
        return Err(Error::Other(format!("unknown procedure '{name}'")));
    };

    let rows = super::run(input, ctx)?;
    let mut out = Vec::new();
    for row in rows {
        let mut eval_args: Vec<Value> = args
            .iter()
            .map(|arg| {
                crate::evaluator::evaluate_expression_value(arg, &row, ctx.snapshot, ctx.params)
            })
            .collect();

        // Registered test fixtures may declare inputs that arrive as
        // named parameters instead of call arguments.
        if eval_args.is_empty()
            && let Some(fixture) = get_test_procedure_fixture(name)
            && !fixture.inputs.is_empty()
        {
            for field in &fixture.inputs {
                let Some(value) = ctx.params.get(&field.name) else {
                    return Err(Error::Other("syntax error: MissingParameter".to_string()));
                };
                eval_args.push(value.clone());
            }
        }

        let mut produced = procedure.execute(ctx.snapshot as &dyn ErasedSnapshot, eval_args)?;

        // A procedure with no output columns keeps the row cardinality in
        // an in-query pipeline.
        if produced.is_empty()
            && yields.is_none()
            && !row.columns().is_empty()
            && get_test_procedure_fixture(name).is_some_and(|fixture| fixture.outputs.is_empty())
        {
            produced.push(Row::default());
        }

        for proc_row in produced {
            let mut joined = row.clone();
            match yields {
                None => {
                    for (column, value) in proc_row.columns() {
                        joined = joined.with(column.clone(), value.clone());
                    }
                }
                Some(selection) => {
                    for (field, alias) in selection {
                        if let Some(value) = proc_row.get(field) {
                            joined =
                                joined.with(alias.as_ref().unwrap_or(field).clone(), value.clone());
                        }
                    }
                }
            }
            out.push(joined);
        }
    }
    Ok(out)
}
