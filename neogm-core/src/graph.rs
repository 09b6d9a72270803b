//! The [`Graph`] handle and the [`NodeRef`] node wrapper.

use std::fmt;
use std::sync::Arc;

use neo4rs::BoltType as Value;

use crate::config::GraphConfig;
use crate::entity::EntityFactory;
use crate::error::GraphError;
use crate::registry;
use crate::store::{Direction, GraphReader, GraphStore, NodeId, Relationship};
use crate::traits::{FromPropertyValue, GraphModel};

/// Cheaply clonable handle to a graph store plus the mapper configuration.
///
/// ```rust
/// # use neogm_core::{Graph, MemoryGraph};
/// let graph = Graph::new(MemoryGraph::new());
/// assert_eq!(graph.config().type_property, "_type");
/// ```
#[derive(Clone)]
pub struct Graph {
    store: Arc<dyn GraphStore>,
    config: Arc<GraphConfig>,
}

impl Graph {
    pub fn new(store: impl GraphStore + 'static) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// Wrap a store the caller keeps a handle to (e.g. to inject faults).
    pub fn from_arc(store: Arc<dyn GraphStore>) -> Self {
        Graph {
            store,
            config: Arc::new(GraphConfig::default()),
        }
    }

    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn store(&self) -> &dyn GraphStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Wrap a node id of this graph.
    pub fn node(&self, id: NodeId) -> NodeRef {
        NodeRef { id, graph: self.clone() }
    }

    /// The entity factory bound to this graph.
    pub fn entities(&self) -> EntityFactory<'_> {
        EntityFactory::new(self)
    }

    /// Register `T` in the process-wide model registry. Idempotent.
    pub fn register<T: GraphModel>(&self) -> &Self {
        registry::register::<T>();
        self
    }

    pub fn same_store(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph").field("config", &self.config).finish_non_exhaustive()
    }
}

/// A node handle: opaque id plus the graph it lives in.
///
/// Reads go straight to the store's committed state.
#[derive(Clone)]
pub struct NodeRef {
    id: NodeId,
    graph: Graph,
}

impl NodeRef {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn property(&self, key: &str) -> Result<Option<Value>, GraphError> {
        Ok(self.graph.store().property(self.id, key)?)
    }

    /// Read and convert a property, failing if it is absent (unless `T` is an
    /// `Option`).
    pub fn get<T: FromPropertyValue>(&self, key: &str) -> Result<T, GraphError> {
        match self.property(key)? {
            Some(v) => T::from_value(v),
            None => T::from_missing(key, &format!("node {}", self.id)),
        }
    }

    pub fn property_keys(&self) -> Result<Vec<String>, GraphError> {
        Ok(self.graph.store().property_keys(self.id)?)
    }

    pub fn relationships(
        &self,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<Relationship>, GraphError> {
        Ok(self.graph.store().relationships(self.id, rel_type, direction)?)
    }

    /// The type discriminator, if the node carries one.
    pub fn type_name(&self) -> Result<Option<String>, GraphError> {
        self.get(&self.graph.config().type_property)
    }

    pub fn exists(&self) -> Result<bool, GraphError> {
        Ok(self.graph.store().node_exists(self.id)?)
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.graph.same_store(&other.graph)
    }
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.id).finish()
    }
}
