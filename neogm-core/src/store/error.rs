//! Errors raised by graph store adapters.

use thiserror::Error;

use super::{FailPoint, NodeId, RelationshipId};

/// Failure reported by a [`GraphStore`](super::GraphStore) or one of its
/// transactions.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The node does not exist (or was deleted in this transaction).
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// The relationship does not exist.
    #[error("relationship {0} not found")]
    RelationshipNotFound(RelationshipId),

    /// Nodes can only be deleted once every relationship touching them is gone.
    #[error("node {node} still has {count} relationship(s)")]
    NodeInUse { node: NodeId, count: usize },

    /// An index write referenced an index that was never created.
    #[error("index '{0}' does not exist")]
    IndexNotFound(String),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,

    /// The transaction was already committed or rolled back.
    #[error("transaction already finished")]
    Finished,

    /// A failure scheduled with [`MemoryGraph::fail_next`](super::MemoryGraph::fail_next).
    #[error("injected failure at {0:?}")]
    Injected(FailPoint),

    /// Any other backend-specific failure.
    #[error("store error: {0}")]
    Backend(String),
}
