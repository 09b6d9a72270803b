//! In-memory transactional graph store.
//!
//! A write transaction holds the store's write lock for its whole lifetime
//! and records an undo log. Rolling back (explicitly or by dropping the
//! transaction) replays the log in reverse, so readers never observe a
//! partially applied transaction.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock, RwLockWriteGuard};

use neo4rs::BoltType as Value;
use tracing::{debug, trace};

use super::{
    Direction, FailPoint, GraphReader, GraphStore, GraphTransaction, IndexConfig, NodeId,
    Relationship, RelationshipId, StoreError,
};

const ROOT: NodeId = NodeId(0);

#[derive(Debug, Clone, Default)]
struct NodeRecord {
    properties: BTreeMap<String, Value>,
    relationships: Vec<RelationshipId>,
}

#[derive(Debug, Clone)]
struct IndexRecord {
    config: IndexConfig,
    postings: HashMap<String, Vec<NodeId>>,
}

#[derive(Debug)]
struct GraphState {
    nodes: HashMap<NodeId, NodeRecord>,
    relationships: HashMap<RelationshipId, Relationship>,
    indexes: HashMap<String, IndexRecord>,
    next_node: u64,
    next_relationship: u64,
}

impl GraphState {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT, NodeRecord::default());
        GraphState {
            nodes,
            relationships: HashMap::new(),
            indexes: HashMap::new(),
            next_node: ROOT.0 + 1,
            next_relationship: 0,
        }
    }

    fn node(&self, node: NodeId) -> Result<&NodeRecord, StoreError> {
        self.nodes.get(&node).ok_or(StoreError::NodeNotFound(node))
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut NodeRecord, StoreError> {
        self.nodes.get_mut(&node).ok_or(StoreError::NodeNotFound(node))
    }

    fn property(&self, node: NodeId, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.node(node)?.properties.get(key).cloned())
    }

    fn property_keys(&self, node: NodeId) -> Result<Vec<String>, StoreError> {
        Ok(self.node(node)?.properties.keys().cloned().collect())
    }

    fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<Relationship>, StoreError> {
        let record = self.node(node)?;
        let mut out = Vec::new();
        for id in &record.relationships {
            let rel = self
                .relationships
                .get(id)
                .ok_or(StoreError::RelationshipNotFound(*id))?;
            if rel_type.is_some_and(|t| t != rel.rel_type) {
                continue;
            }
            if direction.accepts(rel, node) {
                out.push(rel.clone());
            }
        }
        Ok(out)
    }

    fn index_get(&self, index: &str, term: &str) -> Vec<NodeId> {
        self.indexes
            .get(index)
            .and_then(|idx| idx.postings.get(term))
            .cloned()
            .unwrap_or_default()
    }

    fn detach_relationship(&mut self, rel: &Relationship) -> (Option<usize>, Option<usize>) {
        let mut unlink = |node: NodeId| {
            self.nodes.get_mut(&node).and_then(|record| {
                let pos = record.relationships.iter().position(|id| *id == rel.id)?;
                record.relationships.remove(pos);
                Some(pos)
            })
        };
        let start = unlink(rel.start);
        let end = if rel.start == rel.end { None } else { unlink(rel.end) };
        (start, end)
    }
}

/// One reversible change recorded by a [`MemoryTransaction`].
#[derive(Debug)]
enum Undo {
    CreateNode(NodeId),
    DeleteNode(NodeId, NodeRecord),
    SetProperty {
        node: NodeId,
        key: String,
        previous: Option<Value>,
    },
    CreateRelationship(Relationship),
    DeleteRelationship {
        rel: Relationship,
        start_pos: Option<usize>,
        end_pos: Option<usize>,
    },
    CreateIndex(String),
    IndexAdd {
        index: String,
        term: String,
    },
    IndexRemove {
        index: String,
        term: String,
        node: NodeId,
        position: usize,
    },
}

/// In-memory [`GraphStore`].
///
/// Node `#0` is the root node. Node and relationship ids are never reused,
/// not even after a rollback.
#[derive(Debug)]
pub struct MemoryGraph {
    state: RwLock<GraphState>,
    fault: Mutex<Option<FailPoint>>,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraph {
    pub fn new() -> Self {
        MemoryGraph {
            state: RwLock::new(GraphState::new()),
            fault: Mutex::new(None),
        }
    }

    /// Make the next operation matching `point` fail with
    /// [`StoreError::Injected`]. The fault fires once.
    pub fn fail_next(&self, point: FailPoint) {
        if let Ok(mut fault) = self.fault.lock() {
            *fault = Some(point);
        }
    }

    /// Number of committed nodes, root included.
    pub fn node_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.nodes.len())
    }

    /// Number of committed relationships.
    pub fn relationship_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.relationships.len())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, GraphState>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        let mut fault = self.fault.lock().map_err(|_| StoreError::Poisoned)?;
        if *fault == Some(point) {
            *fault = None;
            debug!(?point, "injecting store failure");
            return Err(StoreError::Injected(point));
        }
        Ok(())
    }
}

impl GraphReader for MemoryGraph {
    fn node_exists(&self, node: NodeId) -> Result<bool, StoreError> {
        Ok(self.read()?.nodes.contains_key(&node))
    }

    fn property(&self, node: NodeId, key: &str) -> Result<Option<Value>, StoreError> {
        self.read()?.property(node, key)
    }

    fn property_keys(&self, node: NodeId) -> Result<Vec<String>, StoreError> {
        self.read()?.property_keys(node)
    }

    fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<Relationship>, StoreError> {
        self.read()?.relationships(node, rel_type, direction)
    }

    fn index_get(&self, index: &str, term: &str) -> Result<Vec<NodeId>, StoreError> {
        Ok(self.read()?.index_get(index, term))
    }

    fn index_config(&self, index: &str) -> Result<Option<IndexConfig>, StoreError> {
        Ok(self.read()?.indexes.get(index).map(|idx| idx.config))
    }
}

impl GraphStore for MemoryGraph {
    fn root(&self) -> NodeId {
        ROOT
    }

    fn begin(&self) -> Result<Box<dyn GraphTransaction + '_>, StoreError> {
        let state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        trace!("begin transaction");
        Ok(Box::new(MemoryTransaction {
            graph: self,
            state,
            undo: Vec::new(),
            finished: false,
        }))
    }
}

/// Write transaction over a [`MemoryGraph`].
pub struct MemoryTransaction<'a> {
    graph: &'a MemoryGraph,
    state: RwLockWriteGuard<'a, GraphState>,
    undo: Vec<Undo>,
    finished: bool,
}

impl MemoryTransaction<'_> {
    fn undo_all(&mut self) {
        let state = &mut *self.state;
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::CreateNode(node) => {
                    state.nodes.remove(&node);
                }
                Undo::DeleteNode(node, record) => {
                    state.nodes.insert(node, record);
                }
                Undo::SetProperty { node, key, previous } => {
                    if let Some(record) = state.nodes.get_mut(&node) {
                        match previous {
                            Some(value) => {
                                record.properties.insert(key, value);
                            }
                            None => {
                                record.properties.remove(&key);
                            }
                        }
                    }
                }
                Undo::CreateRelationship(rel) => {
                    state.detach_relationship(&rel);
                    state.relationships.remove(&rel.id);
                }
                Undo::DeleteRelationship { rel, start_pos, end_pos } => {
                    if let (Some(pos), Some(record)) = (start_pos, state.nodes.get_mut(&rel.start)) {
                        record.relationships.insert(pos, rel.id);
                    }
                    if let (Some(pos), Some(record)) = (end_pos, state.nodes.get_mut(&rel.end)) {
                        record.relationships.insert(pos, rel.id);
                    }
                    state.relationships.insert(rel.id, rel);
                }
                Undo::CreateIndex(index) => {
                    state.indexes.remove(&index);
                }
                Undo::IndexAdd { index, term } => {
                    if let Some(nodes) = state
                        .indexes
                        .get_mut(&index)
                        .and_then(|idx| idx.postings.get_mut(&term))
                    {
                        nodes.pop();
                    }
                }
                Undo::IndexRemove { index, term, node, position } => {
                    if let Some(idx) = state.indexes.get_mut(&index) {
                        idx.postings.entry(term).or_default().insert(position, node);
                    }
                }
            }
        }
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(steps = self.undo.len(), "rolling back unfinished transaction");
            self.undo_all();
        }
    }
}

impl GraphReader for MemoryTransaction<'_> {
    fn node_exists(&self, node: NodeId) -> Result<bool, StoreError> {
        Ok(self.state.nodes.contains_key(&node))
    }

    fn property(&self, node: NodeId, key: &str) -> Result<Option<Value>, StoreError> {
        self.state.property(node, key)
    }

    fn property_keys(&self, node: NodeId) -> Result<Vec<String>, StoreError> {
        self.state.property_keys(node)
    }

    fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<Relationship>, StoreError> {
        self.state.relationships(node, rel_type, direction)
    }

    fn index_get(&self, index: &str, term: &str) -> Result<Vec<NodeId>, StoreError> {
        Ok(self.state.index_get(index, term))
    }

    fn index_config(&self, index: &str) -> Result<Option<IndexConfig>, StoreError> {
        Ok(self.state.indexes.get(index).map(|idx| idx.config))
    }
}

impl GraphTransaction for MemoryTransaction<'_> {
    fn create_node(&mut self) -> Result<NodeId, StoreError> {
        self.graph.check(FailPoint::CreateNode)?;
        let node = NodeId(self.state.next_node);
        self.state.next_node += 1;
        self.state.nodes.insert(node, NodeRecord::default());
        self.undo.push(Undo::CreateNode(node));
        trace!(%node, "created node");
        Ok(node)
    }

    fn delete_node(&mut self, node: NodeId) -> Result<(), StoreError> {
        self.graph.check(FailPoint::DeleteNode)?;
        if node == ROOT {
            return Err(StoreError::Backend("the root node cannot be deleted".into()));
        }
        let count = self.state.node(node)?.relationships.len();
        if count > 0 {
            return Err(StoreError::NodeInUse { node, count });
        }
        let record = self.state.nodes.remove(&node).ok_or(StoreError::NodeNotFound(node))?;
        self.undo.push(Undo::DeleteNode(node, record));
        trace!(%node, "deleted node");
        Ok(())
    }

    fn set_property(&mut self, node: NodeId, key: &str, value: Value) -> Result<(), StoreError> {
        self.graph.check(FailPoint::SetProperty)?;
        let previous = self.state.node_mut(node)?.properties.insert(key.to_owned(), value);
        self.undo.push(Undo::SetProperty { node, key: key.to_owned(), previous });
        Ok(())
    }

    fn remove_property(&mut self, node: NodeId, key: &str) -> Result<Option<Value>, StoreError> {
        self.graph.check(FailPoint::RemoveProperty)?;
        let previous = self.state.node_mut(node)?.properties.remove(key);
        if previous.is_some() {
            self.undo.push(Undo::SetProperty {
                node,
                key: key.to_owned(),
                previous: previous.clone(),
            });
        }
        Ok(previous)
    }

    fn create_relationship(
        &mut self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
    ) -> Result<RelationshipId, StoreError> {
        self.graph.check(FailPoint::CreateRelationship)?;
        self.state.node(start)?;
        self.state.node(end)?;
        let id = RelationshipId(self.state.next_relationship);
        self.state.next_relationship += 1;
        let rel = Relationship { id, rel_type: rel_type.to_owned(), start, end };
        self.state.node_mut(start)?.relationships.push(id);
        if start != end {
            self.state.node_mut(end)?.relationships.push(id);
        }
        self.state.relationships.insert(id, rel.clone());
        self.undo.push(Undo::CreateRelationship(rel));
        trace!(%id, %start, %end, rel_type, "created relationship");
        Ok(id)
    }

    fn delete_relationship(&mut self, rel: RelationshipId) -> Result<(), StoreError> {
        self.graph.check(FailPoint::DeleteRelationship)?;
        let removed = self
            .state
            .relationships
            .remove(&rel)
            .ok_or(StoreError::RelationshipNotFound(rel))?;
        let (start_pos, end_pos) = self.state.detach_relationship(&removed);
        self.undo.push(Undo::DeleteRelationship { rel: removed, start_pos, end_pos });
        trace!(%rel, "deleted relationship");
        Ok(())
    }

    fn create_index(&mut self, index: &str, config: IndexConfig) -> Result<(), StoreError> {
        if self.state.indexes.contains_key(index) {
            return Ok(());
        }
        self.state.indexes.insert(
            index.to_owned(),
            IndexRecord { config, postings: HashMap::new() },
        );
        self.undo.push(Undo::CreateIndex(index.to_owned()));
        debug!(index, ?config, "created index");
        Ok(())
    }

    fn index_add(&mut self, index: &str, term: &str, node: NodeId) -> Result<(), StoreError> {
        self.graph.check(FailPoint::IndexAdd)?;
        let idx = self
            .state
            .indexes
            .get_mut(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_owned()))?;
        let nodes = idx.postings.entry(term.to_owned()).or_default();
        if nodes.contains(&node) {
            return Ok(());
        }
        nodes.push(node);
        self.undo.push(Undo::IndexAdd { index: index.to_owned(), term: term.to_owned() });
        Ok(())
    }

    fn index_remove(&mut self, index: &str, term: &str, node: NodeId) -> Result<bool, StoreError> {
        self.graph.check(FailPoint::IndexRemove)?;
        let Some(nodes) = self
            .state
            .indexes
            .get_mut(index)
            .and_then(|idx| idx.postings.get_mut(term))
        else {
            return Ok(false);
        };
        let Some(position) = nodes.iter().position(|n| *n == node) else {
            return Ok(false);
        };
        nodes.remove(position);
        self.undo.push(Undo::IndexRemove {
            index: index.to_owned(),
            term: term.to_owned(),
            node,
            position,
        });
        Ok(true)
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Finished);
        }
        // a failed commit falls through to Drop, which rolls back
        self.graph.check(FailPoint::Commit)?;
        self.finished = true;
        trace!(steps = self.undo.len(), "commit");
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::Finished);
        }
        self.undo_all();
        self.finished = true;
        Ok(())
    }
}
