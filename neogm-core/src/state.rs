//! Per-entity persistence state.

use std::collections::BTreeSet;

use crate::error::GraphError;
use crate::graph::NodeRef;
use crate::naming::KEY_FIELD;

/// Persistence bookkeeping embedded in every model struct.
///
/// A fresh state is dirty and has no node: every field value lives in
/// memory. `save` attaches a node and clears the dirty flag, after which
/// reads come from the node. Setters stage single properties, which are read
/// from memory again until the next `save`. `delete` detaches the entity
/// for good.
#[derive(Debug, Clone)]
pub struct EntityState {
    key: Option<i64>,
    node: Option<NodeRef>,
    dirty: bool,
    detached: bool,
    staged: BTreeSet<&'static str>,
}

impl Default for EntityState {
    fn default() -> Self {
        EntityState {
            key: None,
            node: None,
            dirty: true,
            detached: false,
            staged: BTreeSet::new(),
        }
    }
}

impl EntityState {
    /// State of an entity wrapping an existing node: clean, nothing staged.
    pub fn attached(node: NodeRef) -> Self {
        EntityState {
            key: None,
            node: Some(node),
            dirty: false,
            detached: false,
            staged: BTreeSet::new(),
        }
    }

    pub fn node(&self) -> Option<&NodeRef> {
        self.node.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Whether `property` must be read from memory rather than the node.
    pub fn is_staged(&self, property: &str) -> bool {
        self.node.is_none() || self.staged.contains(property)
    }

    /// Record a setter call for `property`.
    pub fn stage(&mut self, property: &'static str) {
        self.staged.insert(property);
        self.dirty = true;
    }

    /// The model key: the node's `key` property once persisted.
    pub fn key(&self, type_name: &str) -> Result<Option<i64>, GraphError> {
        if self.detached {
            return Err(GraphError::detached(type_name));
        }
        match &self.node {
            Some(node) => node.get(KEY_FIELD),
            None => Ok(self.key),
        }
    }

    pub(crate) fn mark_saved(&mut self, node: NodeRef, key: i64) {
        self.node = Some(node);
        self.key = Some(key);
        self.dirty = false;
        self.staged.clear();
    }

    pub(crate) fn detach(&mut self) {
        self.node = None;
        self.detached = true;
        self.staged.clear();
    }
}
