//! A minimal in-process graph store, used by this crate's own tests and
//! doctests. It is not meant to be a production storage engine — no
//! indexes beyond a single property index helper, no persistence, no
//! concurrency control beyond a `RwLock`. Grounded in the same
//! id-indirection shape (external id / internal id / label id) the real
//! storage engine uses, but with plain `Vec`/`HashMap` backing instead of a
//! paged store.

use super::{EdgeKey, ExternalId, GraphSnapshot, GraphStore, InternalNodeId, LabelId, PropertyValue, RelTypeId, WriteableGraph};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

#[derive(Debug, Default, Clone)]
struct NodeRecord {
    external_id: ExternalId,
    labels: Vec<LabelId>,
    properties: BTreeMap<String, PropertyValue>,
    tombstoned: bool,
}

#[derive(Debug, Default, Clone)]
struct EdgeRecord {
    properties: BTreeMap<String, PropertyValue>,
    tombstoned: bool,
}

#[derive(Debug, Default)]
struct GraphData {
    nodes: Vec<NodeRecord>,
    edges: HashMap<EdgeKey, EdgeRecord>,
    out_adj: HashMap<InternalNodeId, Vec<EdgeKey>>,
    in_adj: HashMap<InternalNodeId, Vec<EdgeKey>>,
    labels: Vec<String>,
    label_ids: HashMap<String, LabelId>,
    rel_types: Vec<String>,
    rel_type_ids: HashMap<String, RelTypeId>,
    next_external_id: ExternalId,
}

/// An in-memory graph that can both snapshot and be written through
/// [`WriteableGraph`]. Cheap to clone a snapshot of (it copies the whole
/// graph); fine for tests, not for production-sized graphs.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    data: RwLock<GraphData>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for tests: create a node with labels/properties and
    /// return its external id in one call, without going through Cypher.
    pub fn insert_node(&self, labels: &[&str], properties: BTreeMap<String, PropertyValue>) -> ExternalId {
        let mut guard = self.data.write().unwrap();
        let data = &mut *guard;
        let external_id = data.next_external_id;
        data.next_external_id += 1;
        let label_ids = labels
            .iter()
            .map(|l| intern(&mut data.labels, &mut data.label_ids, l))
            .collect();
        data.nodes.push(NodeRecord {
            external_id,
            labels: label_ids,
            properties,
            tombstoned: false,
        });
        external_id
    }

    pub fn insert_edge(
        &self,
        src: InternalNodeId,
        rel_type: &str,
        dst: InternalNodeId,
        properties: BTreeMap<String, PropertyValue>,
    ) {
        let mut guard = self.data.write().unwrap();
        let data = &mut *guard;
        let rel = intern(&mut data.rel_types, &mut data.rel_type_ids, rel_type);
        let key = EdgeKey { src, rel, dst };
        data.out_adj.entry(src).or_default().push(key);
        data.in_adj.entry(dst).or_default().push(key);
        data.edges.insert(
            key,
            EdgeRecord {
                properties,
                tombstoned: false,
            },
        );
    }
}

fn intern(names: &mut Vec<String>, ids: &mut HashMap<String, u32>, name: &str) -> u32 {
    if let Some(&id) = ids.get(name) {
        return id;
    }
    let id = names.len() as u32;
    names.push(name.to_string());
    ids.insert(name.to_string(), id);
    id
}

impl GraphStore for MemoryGraph {
    type Snapshot = MemorySnapshot;

    fn snapshot(&self) -> Self::Snapshot {
        let data = self.data.read().unwrap();
        MemorySnapshot {
            nodes: data.nodes.clone(),
            edges: data.edges.clone(),
            out_adj: data.out_adj.clone(),
            in_adj: data.in_adj.clone(),
            labels: data.labels.clone(),
            label_ids: data.label_ids.clone(),
            rel_types: data.rel_types.clone(),
            rel_type_ids: data.rel_type_ids.clone(),
        }
    }
}

/// A frozen copy of [`MemoryGraph`] at a point in time.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    nodes: Vec<NodeRecord>,
    edges: HashMap<EdgeKey, EdgeRecord>,
    out_adj: HashMap<InternalNodeId, Vec<EdgeKey>>,
    in_adj: HashMap<InternalNodeId, Vec<EdgeKey>>,
    labels: Vec<String>,
    label_ids: HashMap<String, LabelId>,
    rel_types: Vec<String>,
    rel_type_ids: HashMap<String, RelTypeId>,
}

impl GraphSnapshot for MemorySnapshot {
    type Neighbors<'a> = std::vec::IntoIter<EdgeKey>;

    fn neighbors(&self, src: InternalNodeId, rel: Option<RelTypeId>) -> Self::Neighbors<'_> {
        let mut out: Vec<EdgeKey> = self.out_adj.get(&src).cloned().unwrap_or_default();
        if let Some(rel) = rel {
            out.retain(|e| e.rel == rel);
        }
        out.retain(|e| !self.edges.get(e).is_some_and(|r| r.tombstoned));
        out.into_iter()
    }

    fn incoming_neighbors(&self, dst: InternalNodeId, rel: Option<RelTypeId>) -> Self::Neighbors<'_> {
        let mut inn: Vec<EdgeKey> = self.in_adj.get(&dst).cloned().unwrap_or_default();
        if let Some(rel) = rel {
            inn.retain(|e| e.rel == rel);
        }
        inn.retain(|e| !self.edges.get(e).is_some_and(|r| r.tombstoned));
        inn.into_iter()
    }

    fn nodes(&self) -> Box<dyn Iterator<Item = InternalNodeId> + '_> {
        Box::new(
            self.nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| !n.tombstoned)
                .map(|(i, _)| i as InternalNodeId),
        )
    }

    fn lookup_index(&self, label: &str, field: &str, value: &PropertyValue) -> Option<Vec<InternalNodeId>> {
        let label_id = *self.label_ids.get(label)?;
        Some(
            self.nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| {
                    !n.tombstoned
                        && n.labels.contains(&label_id)
                        && n.properties.get(field) == Some(value)
                })
                .map(|(i, _)| i as InternalNodeId)
                .collect(),
        )
    }

    fn resolve_external(&self, iid: InternalNodeId) -> Option<ExternalId> {
        self.nodes.get(iid as usize).map(|n| n.external_id)
    }

    fn node_label(&self, iid: InternalNodeId) -> Option<LabelId> {
        self.nodes.get(iid as usize).and_then(|n| n.labels.first().copied())
    }

    fn resolve_node_labels(&self, iid: InternalNodeId) -> Option<Vec<LabelId>> {
        self.nodes.get(iid as usize).map(|n| n.labels.clone())
    }

    fn is_tombstoned_node(&self, iid: InternalNodeId) -> bool {
        self.nodes.get(iid as usize).map(|n| n.tombstoned).unwrap_or(true)
    }

    fn node_property(&self, iid: InternalNodeId, key: &str) -> Option<PropertyValue> {
        self.nodes.get(iid as usize).and_then(|n| n.properties.get(key).cloned())
    }

    fn edge_property(&self, edge: EdgeKey, key: &str) -> Option<PropertyValue> {
        self.edges.get(&edge).and_then(|e| e.properties.get(key).cloned())
    }

    fn node_properties(&self, iid: InternalNodeId) -> Option<BTreeMap<String, PropertyValue>> {
        self.nodes.get(iid as usize).map(|n| n.properties.clone())
    }

    fn edge_properties(&self, edge: EdgeKey) -> Option<BTreeMap<String, PropertyValue>> {
        self.edges.get(&edge).map(|e| e.properties.clone())
    }

    fn resolve_label_id(&self, name: &str) -> Option<LabelId> {
        self.label_ids.get(name).copied()
    }

    fn resolve_rel_type_id(&self, name: &str) -> Option<RelTypeId> {
        self.rel_type_ids.get(name).copied()
    }

    fn resolve_label_name(&self, id: LabelId) -> Option<String> {
        self.labels.get(id as usize).cloned()
    }

    fn resolve_rel_type_name(&self, id: RelTypeId) -> Option<String> {
        self.rel_types.get(id as usize).cloned()
    }

    fn node_count(&self, label: Option<LabelId>) -> u64 {
        match label {
            Some(label) => self
                .nodes
                .iter()
                .filter(|n| !n.tombstoned && n.labels.contains(&label))
                .count() as u64,
            None => self.nodes.iter().filter(|n| !n.tombstoned).count() as u64,
        }
    }

    fn edge_count(&self, rel: Option<RelTypeId>) -> u64 {
        self.edges
            .iter()
            .filter(|(k, v)| !v.tombstoned && rel.is_none_or(|r| k.rel == r))
            .count() as u64
    }
}

/// A single-writer handle used to stage mutations against a [`MemoryGraph`].
/// Writes are applied immediately (there is no rollback): the core never
/// asks for atomicity guarantees beyond what the plugged-in storage gives
/// it, so the reference double keeps things simple.
pub struct MemoryWriteTxn<'a> {
    graph: &'a MemoryGraph,
}

impl<'a> MemoryWriteTxn<'a> {
    pub fn new(graph: &'a MemoryGraph) -> Self {
        Self { graph }
    }
}

impl<'a> WriteableGraph for MemoryWriteTxn<'a> {
    fn create_node(&mut self, external_id: ExternalId, label_id: LabelId) -> Result<InternalNodeId> {
        let mut data = self.graph.data.write().unwrap();
        let iid = data.nodes.len() as InternalNodeId;
        let labels = if label_id == LabelId::MAX { Vec::new() } else { vec![label_id] };
        data.nodes.push(NodeRecord {
            external_id,
            labels,
            properties: BTreeMap::new(),
            tombstoned: false,
        });
        Ok(iid)
    }

    fn add_node_label(&mut self, node: InternalNodeId, label_id: LabelId) -> Result<()> {
        let mut data = self.graph.data.write().unwrap();
        let n = data
            .nodes
            .get_mut(node as usize)
            .ok_or_else(|| Error::Storage("node not found".into()))?;
        if !n.labels.contains(&label_id) {
            n.labels.push(label_id);
        }
        Ok(())
    }

    fn remove_node_label(&mut self, node: InternalNodeId, label_id: LabelId) -> Result<()> {
        let mut data = self.graph.data.write().unwrap();
        let n = data
            .nodes
            .get_mut(node as usize)
            .ok_or_else(|| Error::Storage("node not found".into()))?;
        n.labels.retain(|&l| l != label_id);
        Ok(())
    }

    fn create_edge(&mut self, src: InternalNodeId, rel: RelTypeId, dst: InternalNodeId) -> Result<()> {
        let mut data = self.graph.data.write().unwrap();
        let key = EdgeKey { src, rel, dst };
        data.out_adj.entry(src).or_default().push(key);
        data.in_adj.entry(dst).or_default().push(key);
        data.edges.insert(key, EdgeRecord::default());
        Ok(())
    }

    fn set_node_property(&mut self, node: InternalNodeId, key: String, value: PropertyValue) -> Result<()> {
        let mut data = self.graph.data.write().unwrap();
        let n = data
            .nodes
            .get_mut(node as usize)
            .ok_or_else(|| Error::Storage("node not found".into()))?;
        n.properties.insert(key, value);
        Ok(())
    }

    fn set_edge_property(
        &mut self,
        src: InternalNodeId,
        rel: RelTypeId,
        dst: InternalNodeId,
        key: String,
        value: PropertyValue,
    ) -> Result<()> {
        let mut data = self.graph.data.write().unwrap();
        let e = data
            .edges
            .get_mut(&EdgeKey { src, rel, dst })
            .ok_or_else(|| Error::Storage("edge not found".into()))?;
        e.properties.insert(key, value);
        Ok(())
    }

    fn remove_node_property(&mut self, node: InternalNodeId, key: &str) -> Result<()> {
        let mut data = self.graph.data.write().unwrap();
        if let Some(n) = data.nodes.get_mut(node as usize) {
            n.properties.remove(key);
        }
        Ok(())
    }

    fn remove_edge_property(
        &mut self,
        src: InternalNodeId,
        rel: RelTypeId,
        dst: InternalNodeId,
        key: &str,
    ) -> Result<()> {
        let mut data = self.graph.data.write().unwrap();
        if let Some(e) = data.edges.get_mut(&EdgeKey { src, rel, dst }) {
            e.properties.remove(key);
        }
        Ok(())
    }

    fn tombstone_node(&mut self, node: InternalNodeId) -> Result<()> {
        let mut data = self.graph.data.write().unwrap();
        let has_edges = data
            .out_adj
            .get(&node)
            .is_some_and(|v| v.iter().any(|e| !data.edges.get(e).is_some_and(|r| r.tombstoned)))
            || data
                .in_adj
                .get(&node)
                .is_some_and(|v| v.iter().any(|e| !data.edges.get(e).is_some_and(|r| r.tombstoned)));
        if has_edges {
            return Err(Error::Storage(
                "cannot delete node: still has relationships".into(),
            ));
        }
        if let Some(n) = data.nodes.get_mut(node as usize) {
            n.tombstoned = true;
        }
        Ok(())
    }

    fn tombstone_edge(&mut self, src: InternalNodeId, rel: RelTypeId, dst: InternalNodeId) -> Result<()> {
        let mut data = self.graph.data.write().unwrap();
        if let Some(e) = data.edges.get_mut(&EdgeKey { src, rel, dst }) {
            e.tombstoned = true;
        }
        Ok(())
    }

    fn get_or_create_label_id(&mut self, name: &str) -> Result<LabelId> {
        let mut guard = self.graph.data.write().unwrap();
        let data = &mut *guard;
        Ok(intern(&mut data.labels, &mut data.label_ids, name))
    }

    fn get_or_create_rel_type_id(&mut self, name: &str) -> Result<RelTypeId> {
        let mut guard = self.graph.data.write().unwrap();
        let data = &mut *guard;
        Ok(intern(&mut data.rel_types, &mut data.rel_type_ids, name))
    }

}

/// DETACH DELETE support: tombstones every incident edge first, then the
/// node itself.
pub fn detach_delete_node(txn: &mut MemoryWriteTxn<'_>, node: InternalNodeId) -> Result<()> {
    let incident: Vec<EdgeKey> = {
        let data = txn.graph.data.read().unwrap();
        data.out_adj
            .get(&node)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .chain(data.in_adj.get(&node).cloned().unwrap_or_default())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect()
    };
    for edge in incident {
        txn.tombstone_edge(edge.src, edge.rel, edge.dst)?;
    }
    txn.tombstone_node(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_scan_nodes() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["Person"], BTreeMap::from([("name".to_string(), PropertyValue::String("Ada".into()))]));
        let snap = graph.snapshot();
        assert_eq!(snap.node_count(None), 1);
        let label = snap.resolve_label_id("Person").unwrap();
        assert_eq!(snap.node_count(Some(label)), 1);
    }

    #[test]
    fn tombstone_node_with_edges_fails() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["Person"], BTreeMap::new());
        graph.insert_node(&["Person"], BTreeMap::new());
        graph.insert_edge(0, "KNOWS", 1, BTreeMap::new());
        let mut txn = MemoryWriteTxn::new(&graph);
        assert!(txn.tombstone_node(0).is_err());
    }

    #[test]
    fn detach_delete_removes_edges_then_node() {
        let graph = MemoryGraph::new();
        graph.insert_node(&["Person"], BTreeMap::new());
        graph.insert_node(&["Person"], BTreeMap::new());
        graph.insert_edge(0, "KNOWS", 1, BTreeMap::new());
        let mut txn = MemoryWriteTxn::new(&graph);
        detach_delete_node(&mut txn, 0).unwrap();
        let snap = graph.snapshot();
        assert!(snap.is_tombstoned_node(0));
        assert_eq!(snap.neighbors(0, None).count(), 0);
    }
}
