//! The graph store adapter contract.
//!
//! The mapper never touches a storage engine directly. Everything it needs
//! (nodes, properties, typed relationships, term indexes and transactions)
//! goes through the traits in this module. [`MemoryGraph`] is the bundled
//! in-memory implementation.

pub mod error;
pub mod memory;

use std::collections::{HashSet, VecDeque};
use std::fmt;

use neo4rs::BoltType as Value;
use tracing::warn;

pub use error::StoreError;
pub use memory::MemoryGraph;

/// Opaque node identifier handed out by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque relationship identifier handed out by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipId(pub u64);

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A typed, directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: RelationshipId,
    pub rel_type: String,
    pub start: NodeId,
    pub end: NodeId,
}

impl Relationship {
    /// The endpoint opposite to `node`.
    pub fn other_node(&self, node: NodeId) -> NodeId {
        if self.start == node {
            self.end
        } else {
            self.start
        }
    }
}

/// Which relationships of a node to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

impl Direction {
    #[inline]
    pub const fn includes_outgoing(self) -> bool {
        matches!(self, Direction::Outgoing | Direction::Both)
    }

    #[inline]
    pub const fn includes_incoming(self) -> bool {
        matches!(self, Direction::Incoming | Direction::Both)
    }

    /// Whether `rel`, seen from `node`, points the way this direction asks for.
    pub fn accepts(self, rel: &Relationship, node: NodeId) -> bool {
        (self.includes_outgoing() && rel.start == node)
            || (self.includes_incoming() && rel.end == node)
    }
}

/// Matching behaviour of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Whole-value keyword match, case sensitive.
    Exact,
    /// Whitespace-tokenized match, optionally case folded.
    Fulltext,
}

/// Configuration an index is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexConfig {
    pub kind: IndexKind,
    pub lower_case: bool,
}

/// Operations a [`MemoryGraph`] can be told to fail on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateNode,
    DeleteNode,
    SetProperty,
    RemoveProperty,
    CreateRelationship,
    DeleteRelationship,
    IndexAdd,
    IndexRemove,
    Commit,
}

/// Read access shared by stores (committed state) and transactions (their
/// own uncommitted view).
pub trait GraphReader {
    fn node_exists(&self, node: NodeId) -> Result<bool, StoreError>;

    fn property(&self, node: NodeId, key: &str) -> Result<Option<Value>, StoreError>;

    fn property_keys(&self, node: NodeId) -> Result<Vec<String>, StoreError>;

    /// Relationships of `node`, optionally filtered by type, in creation order.
    fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<Relationship>, StoreError>;

    /// Nodes stored under `term` in `index`, in insertion order. Unknown
    /// indexes yield nothing.
    fn index_get(&self, index: &str, term: &str) -> Result<Vec<NodeId>, StoreError>;

    fn index_config(&self, index: &str) -> Result<Option<IndexConfig>, StoreError>;

    /// Breadth-first walk from `start`, excluding `start` itself. Each node is
    /// returned once.
    fn traverse(
        &self,
        start: NodeId,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<NodeId>, StoreError> {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();
        while let Some(current) = queue.pop_front() {
            for rel in self.relationships(current, rel_type, direction)? {
                let next = rel.other_node(current);
                if seen.insert(next) {
                    out.push(next);
                    queue.push_back(next);
                }
            }
        }
        Ok(out)
    }
}

/// A write transaction. Dropping it without calling [`commit`](Self::commit)
/// rolls every change back.
pub trait GraphTransaction: GraphReader {
    fn create_node(&mut self) -> Result<NodeId, StoreError>;

    /// Fails with [`StoreError::NodeInUse`] while relationships remain.
    fn delete_node(&mut self, node: NodeId) -> Result<(), StoreError>;

    fn set_property(&mut self, node: NodeId, key: &str, value: Value) -> Result<(), StoreError>;

    /// Returns the removed value, if any.
    fn remove_property(&mut self, node: NodeId, key: &str) -> Result<Option<Value>, StoreError>;

    fn create_relationship(
        &mut self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
    ) -> Result<RelationshipId, StoreError>;

    fn delete_relationship(&mut self, rel: RelationshipId) -> Result<(), StoreError>;

    /// Creates the index if it does not exist yet.
    fn create_index(&mut self, index: &str, config: IndexConfig) -> Result<(), StoreError>;

    fn index_add(&mut self, index: &str, term: &str, node: NodeId) -> Result<(), StoreError>;

    /// Returns whether an entry was removed.
    fn index_remove(&mut self, index: &str, term: &str, node: NodeId) -> Result<bool, StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;

    fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// A transactional graph store.
pub trait GraphStore: GraphReader + Send + Sync {
    /// The store-wide anchor node every type reference node hangs off.
    fn root(&self) -> NodeId;

    fn begin(&self) -> Result<Box<dyn GraphTransaction + '_>, StoreError>;
}

/// Run `work` inside one store transaction.
///
/// Commits when `work` returns `Ok`, rolls back when it returns `Err`. A panic
/// inside `work` drops the transaction, which rolls it back as well.
pub fn in_transaction<R, E>(
    store: &dyn GraphStore,
    work: impl FnOnce(&mut dyn GraphTransaction) -> Result<R, E>,
) -> Result<R, E>
where
    E: From<StoreError>,
{
    let mut tx = store.begin()?;
    match work(tx.as_mut()) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            warn!("rolling back graph transaction");
            if let Err(rollback) = tx.rollback() {
                warn!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}
