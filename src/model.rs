//! The storage capability consumed by the query engine.
//!
//! Everything in this module is an interface, not an implementation: node and
//! edge persistence, indexes, and degree counters live in whatever storage
//! engine is plugged in by the host application. The query engine only ever
//! reaches the graph through [`GraphSnapshot`] (reads) and [`WriteableGraph`]
//! (writes against an open write transaction). [`memory`] provides a minimal
//! in-process implementation used by this crate's own test suite; production
//! callers bring their own.

use std::collections::BTreeMap;

/// External identifier for a node, assigned by the caller (e.g. a user-facing
/// primary key). Distinct from [`InternalNodeId`], which is storage-internal.
pub type ExternalId = u64;

/// Storage-internal node identifier.
pub type InternalNodeId = u32;

/// Interned label identifier.
pub type LabelId = u32;

/// Interned relationship-type identifier.
pub type RelTypeId = u32;

/// A property value as stored by the graph, independent of the richer
/// runtime [`crate::executor::Value`] the evaluator works with. Conversions
/// between the two live at the executor boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

/// A directed edge identified by its endpoints and relationship type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct EdgeKey {
    pub src: InternalNodeId,
    pub rel: RelTypeId,
    pub dst: InternalNodeId,
}

/// Produces read-only snapshots of the graph.
///
/// A query executes against exactly one snapshot for its whole lifetime, so
/// all reads within a statement observe a single consistent point in time
/// even if writes from other queries land concurrently.
pub trait GraphStore {
    type Snapshot: GraphSnapshot;

    /// Takes a snapshot of the current graph state, independent of writes
    /// that happen after this call returns.
    fn snapshot(&self) -> Self::Snapshot;
}

/// A read-only, point-in-time view of the graph.
///
/// This is the read half of the storage capability: node/edge lookup,
/// iteration, and index probing. All methods default to "nothing here" so a
/// minimal implementation only needs to override what it can actually serve.
pub trait GraphSnapshot {
    type Neighbors<'a>: Iterator<Item = EdgeKey> + 'a
    where
        Self: 'a;

    /// Outgoing edges from `src`, optionally filtered by relationship type.
    fn neighbors(&self, src: InternalNodeId, rel: Option<RelTypeId>) -> Self::Neighbors<'_>;

    /// Incoming edges into `dst`, optionally filtered by relationship type.
    fn incoming_neighbors(
        &self,
        dst: InternalNodeId,
        rel: Option<RelTypeId>,
    ) -> Self::Neighbors<'_>;

    /// All live (non-tombstoned) node ids.
    fn nodes(&self) -> Box<dyn Iterator<Item = InternalNodeId> + '_> {
        Box::new(std::iter::empty())
    }

    /// Probes a property index, returning `None` when no such index exists
    /// (the caller should then fall back to a label or full scan).
    fn lookup_index(
        &self,
        _label: &str,
        _field: &str,
        _value: &PropertyValue,
    ) -> Option<Vec<InternalNodeId>> {
        None
    }

    fn resolve_external(&self, _iid: InternalNodeId) -> Option<ExternalId> {
        None
    }

    fn node_label(&self, _iid: InternalNodeId) -> Option<LabelId> {
        None
    }

    fn resolve_node_labels(&self, iid: InternalNodeId) -> Option<Vec<LabelId>> {
        self.node_label(iid).map(|l| vec![l])
    }

    fn is_tombstoned_node(&self, _iid: InternalNodeId) -> bool {
        false
    }

    fn node_property(&self, _iid: InternalNodeId, _key: &str) -> Option<PropertyValue> {
        None
    }

    fn edge_property(&self, _edge: EdgeKey, _key: &str) -> Option<PropertyValue> {
        None
    }

    fn node_properties(&self, _iid: InternalNodeId) -> Option<BTreeMap<String, PropertyValue>> {
        None
    }

    fn edge_properties(&self, _edge: EdgeKey) -> Option<BTreeMap<String, PropertyValue>> {
        None
    }

    fn resolve_label_id(&self, _name: &str) -> Option<LabelId> {
        None
    }

    fn resolve_rel_type_id(&self, _name: &str) -> Option<RelTypeId> {
        None
    }

    fn resolve_label_name(&self, _id: LabelId) -> Option<String> {
        None
    }

    fn resolve_rel_type_name(&self, _id: RelTypeId) -> Option<String> {
        None
    }

    fn node_count(&self, _label: Option<LabelId>) -> u64 {
        0
    }

    fn edge_count(&self, _rel: Option<RelTypeId>) -> u64 {
        0
    }

    fn in_degree(&self, iid: InternalNodeId, rel: Option<RelTypeId>) -> u64 {
        self.incoming_neighbors(iid, rel).count() as u64
    }

    fn out_degree(&self, iid: InternalNodeId, rel: Option<RelTypeId>) -> u64 {
        self.neighbors(iid, rel).count() as u64
    }

    /// All node ids carrying `label`, preferring a resolved label id over a
    /// full scan when the snapshot can answer it directly.
    fn nodes_by_label(&self, label: LabelId) -> Vec<InternalNodeId> {
        self.nodes()
            .filter(|&iid| {
                self.resolve_node_labels(iid)
                    .is_some_and(|labels| labels.contains(&label))
            })
            .collect()
    }
}

/// The write half of the Storage capability: mutations staged against an
/// open transaction. Implementors decide how (and whether) these survive a
/// crash; the query engine only requires program-order visibility within the
/// statement that issued them.
pub trait WriteableGraph {
    fn create_node(&mut self, external_id: ExternalId, label_id: LabelId)
    -> crate::error::Result<InternalNodeId>;
    fn add_node_label(&mut self, node: InternalNodeId, label_id: LabelId) -> crate::error::Result<()>;
    fn remove_node_label(&mut self, node: InternalNodeId, label_id: LabelId) -> crate::error::Result<()>;
    fn create_edge(
        &mut self,
        src: InternalNodeId,
        rel: RelTypeId,
        dst: InternalNodeId,
    ) -> crate::error::Result<()>;
    fn set_node_property(
        &mut self,
        node: InternalNodeId,
        key: String,
        value: PropertyValue,
    ) -> crate::error::Result<()>;
    fn set_edge_property(
        &mut self,
        src: InternalNodeId,
        rel: RelTypeId,
        dst: InternalNodeId,
        key: String,
        value: PropertyValue,
    ) -> crate::error::Result<()>;
    fn remove_node_property(&mut self, node: InternalNodeId, key: &str) -> crate::error::Result<()>;
    fn remove_edge_property(
        &mut self,
        src: InternalNodeId,
        rel: RelTypeId,
        dst: InternalNodeId,
        key: &str,
    ) -> crate::error::Result<()>;
    /// Deletes `node`. Must fail while incident edges remain; DETACH DELETE
    /// tombstones those edges first.
    fn tombstone_node(&mut self, node: InternalNodeId) -> crate::error::Result<()>;
    fn tombstone_edge(
        &mut self,
        src: InternalNodeId,
        rel: RelTypeId,
        dst: InternalNodeId,
    ) -> crate::error::Result<()>;

    fn get_or_create_label_id(&mut self, name: &str) -> crate::error::Result<LabelId>;
    fn get_or_create_rel_type_id(&mut self, name: &str) -> crate::error::Result<RelTypeId>;
}

pub mod memory;
