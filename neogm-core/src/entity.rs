//! Persisting, loading and deleting model entities.
//!
//! Every mutating operation runs in exactly one store transaction. Values a
//! write depends on are snapshotted before the transaction starts; inside it,
//! reads go through the transaction so they see its own uncommitted changes.

use std::collections::BTreeSet;

use neo4rs::BoltType as Value;
use tracing::{debug, info};

use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::graph::{Graph, NodeRef};
use crate::index::IndexManager;
use crate::meta::{IndexSpec, ModelMeta, TraversalKind};
use crate::naming::{self, KEY_FIELD};
use crate::registry;
use crate::relationship::Traversal;
use crate::store::{
    in_transaction, Direction, GraphReader, GraphTransaction, IndexKind, NodeId, Relationship,
};
use crate::traits::{AnyModel, FromPropertyValue, GraphModel, IntoPropertyValue};
use crate::value::is_null;

/// Entity operations bound to one [`Graph`]. Obtain with [`Graph::entities`].
pub struct EntityFactory<'g> {
    graph: &'g Graph,
}

impl<'g> EntityFactory<'g> {
    pub(crate) fn new(graph: &'g Graph) -> Self {
        EntityFactory { graph }
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// Persist `entity` and return its key.
    ///
    /// A new entity gets a node, a fresh key and an instance link. Only
    /// staged fields are written; a `None`/`Null` value removes the property.
    /// Index entries follow the written values.
    pub fn create_or_update<T: GraphModel>(&self, entity: &mut T) -> Result<i64, GraphError> {
        let meta = T::meta();
        let state = entity.state();
        if state.is_detached() {
            return Err(GraphError::detached(T::TYPE_NAME));
        }
        let config = self.graph.config();
        if let Some(field) = meta.fields.iter().find(|f| f.property == config.type_property) {
            return Err(GraphError::configuration(format!(
                "{}::{} is stored as '{}', which this graph uses as the type discriminator",
                T::TYPE_NAME,
                field.name,
                field.property
            )));
        }
        let existing = match state.node() {
            Some(node) => {
                self.check_graph(node, T::TYPE_NAME)?;
                Some(node.id())
            }
            None => None,
        };
        if existing.is_some() && !state.is_dirty() {
            if let Some(key) = state.key(T::TYPE_NAME)? {
                return Ok(key);
            }
        }
        let staged: Vec<(&'static str, Value)> = entity
            .properties()?
            .into_iter()
            .filter(|(property, _)| state.is_staged(property))
            .collect();

        let root = self.graph.store().root();
        let (node, key) = in_transaction(self.graph.store(), |tx| {
            IndexManager::ensure_model(tx, meta)?;
            let (node, key) = match existing {
                Some(node) => (node, stored_key(&*tx, node)?),
                None => create_instance(tx, root, meta, config)?,
            };
            for (property, value) in staged {
                write_property(tx, meta, node, property, value)?;
            }
            Ok::<_, GraphError>((node, key))
        })?;

        entity.state_mut().mark_saved(self.graph.node(node), key);
        debug!(type_name = T::TYPE_NAME, %node, key, created = existing.is_none(), "saved entity");
        Ok(key)
    }

    /// Delete the entity's node, its index entries and its instance link.
    ///
    /// Refused with [`GraphError::Constraint`] while the node takes part in
    /// any other relationship; the store is left untouched in that case.
    pub fn delete<T: GraphModel>(&self, entity: &mut T) -> Result<(), GraphError> {
        let state = entity.state();
        if state.is_detached() {
            return Err(GraphError::detached(T::TYPE_NAME));
        }
        let node = state.node().ok_or_else(|| GraphError::unsaved(T::TYPE_NAME))?;
        self.check_graph(node, T::TYPE_NAME)?;
        let node = node.id();

        let instance = naming::instance_type(T::TYPE_NAME);
        let config = self.graph.config();
        in_transaction(self.graph.store(), |tx| {
            // guard and delete share one transaction
            let blocking = tx
                .relationships(node, None, Direction::Both)?
                .iter()
                .filter(|rel| !is_instance_link(rel, &instance, node))
                .count();
            if blocking > 0 {
                return Err(GraphError::Constraint { node, relationships: blocking });
            }
            remove_node(tx, config, T::meta(), node)?;
            Ok::<_, GraphError>(())
        })?;
        entity.state_mut().detach();
        debug!(type_name = T::TYPE_NAME, %node, "deleted entity");
        Ok(())
    }

    /// Load the entity stored under `key`.
    pub fn get_by_key<T: GraphModel>(&self, key: i64) -> Result<T, GraphError> {
        let index = T::meta().key_index();
        let node = IndexManager::lookup_exact(self.graph.store(), &index, &key.into_value()?)?
            .ok_or_else(|| GraphError::not_found(&index, key))?;
        Ok(T::from_node(self.graph.node(node)))
    }

    /// Every saved instance of `T`, in creation order. Empty if none was
    /// ever saved.
    pub fn find_all<T: GraphModel>(&self) -> Result<Traversal<T>, GraphError> {
        let reference = reference_node(self.graph.store(), self.graph.store().root(), T::TYPE_NAME)?;
        Ok(Traversal::new(
            reference.map(|id| self.graph.node(id)),
            naming::instance_type(T::TYPE_NAME),
            Direction::Outgoing,
            TraversalKind::OneHop,
            T::from_node,
        ))
    }

    /// Entities whose exact-indexed `field` equals `value`.
    ///
    /// `field` may be the Rust field name or the property name.
    pub fn find_by<T: GraphModel>(
        &self,
        field: &str,
        value: impl IntoPropertyValue,
    ) -> Result<Vec<T>, GraphError> {
        let (index, spec) = field_index(T::meta(), field)?;
        if spec.kind != IndexKind::Exact {
            return Err(GraphError::configuration(format!(
                "{}.{field} has a fulltext index; use search",
                T::TYPE_NAME
            )));
        }
        let nodes = IndexManager::lookup_exact_all(self.graph.store(), &index, &value.into_value()?)?;
        Ok(nodes.into_iter().map(|id| T::from_node(self.graph.node(id))).collect())
    }

    /// Entities whose fulltext-indexed `field` contains every word of `query`.
    pub fn search<T: GraphModel>(&self, field: &str, query: &str) -> Result<Vec<T>, GraphError> {
        let (index, spec) = field_index(T::meta(), field)?;
        if spec.kind != IndexKind::Fulltext {
            return Err(GraphError::configuration(format!(
                "{}.{field} has no fulltext index",
                T::TYPE_NAME
            )));
        }
        let hits = IndexManager::lookup_fulltext(self.graph.store(), &index, query)?;
        Ok(hits.map(|id| T::from_node(self.graph.node(id))).collect())
    }

    /// Wrap `node` in the model type named by its discriminator. No other
    /// property is read.
    pub fn get_by_node(&self, node: &NodeRef) -> Result<Box<dyn AnyModel>, GraphError> {
        self.check_graph(node, "node")?;
        let type_property = &self.graph.config().type_property;
        let type_name: String = node
            .property(type_property)?
            .map(String::from_value)
            .transpose()?
            .ok_or_else(|| GraphError::missing_property(type_property, &format!("node {}", node.id())))?;
        let entry = registry::lookup(&type_name)?;
        Ok((entry.wrap)(node.clone()))
    }

    /// [`get_by_node`](Self::get_by_node) for a statically known type.
    pub fn get_by_node_as<T: GraphModel>(&self, node: &NodeRef) -> Result<T, GraphError> {
        let model = self.get_by_node(node)?;
        if model.type_name() != T::TYPE_NAME {
            return Err(GraphError::type_mismatch(
                T::TYPE_NAME,
                model.type_name(),
                &format!("node {}", node.id()),
            ));
        }
        model
            .into_any()
            .downcast::<T>()
            .map(|model| *model)
            .map_err(|_| GraphError::Mapping(format!("{} is registered twice", T::TYPE_NAME)))
    }

    /// Delete the reference node of `T`, everything reachable from it along
    /// outgoing relationships, every relationship touching those nodes and
    /// their index entries. Returns the number of deleted nodes.
    ///
    /// Meant for resetting fixtures between tests.
    pub fn clean_up<T: GraphModel>(&self) -> Result<usize, GraphError> {
        let root = self.graph.store().root();
        let config = self.graph.config();
        let deleted = in_transaction(self.graph.store(), |tx| {
            let Some(reference) = reference_node(&*tx, root, T::TYPE_NAME)? else {
                return Ok::<_, GraphError>(0);
            };
            let mut nodes = vec![reference];
            nodes.extend(
                tx.traverse(reference, None, Direction::Outgoing)?
                    .into_iter()
                    .filter(|node| *node != root),
            );
            let mut rels = BTreeSet::new();
            for node in &nodes {
                rels.extend(tx.relationships(*node, None, Direction::Both)?.into_iter().map(|r| r.id));
            }
            for node in &nodes {
                unindex_node(tx, config, T::meta(), *node)?;
            }
            for rel in rels {
                tx.delete_relationship(rel)?;
            }
            for node in &nodes {
                tx.delete_node(*node)?;
            }
            Ok(nodes.len())
        })?;
        info!(type_name = T::TYPE_NAME, nodes = deleted, "cleaned up model subgraph");
        Ok(deleted)
    }

    /// Delete every instance of `T` that takes part in no relationship other
    /// than its instance link. Returns how many were deleted.
    ///
    /// In-memory entities still pointing at purged nodes are not detached;
    /// their reads fail with a store error.
    pub fn purge_orphans<T: GraphModel>(&self) -> Result<usize, GraphError> {
        let candidates = self.find_all::<T>()?.node_ids()?;
        let instance = naming::instance_type(T::TYPE_NAME);
        let config = self.graph.config();
        let purged = in_transaction(self.graph.store(), |tx| {
            let mut purged = 0;
            for node in candidates {
                let rels = tx.relationships(node, None, Direction::Both)?;
                if rels.iter().all(|rel| is_instance_link(rel, &instance, node)) {
                    remove_node(tx, config, T::meta(), node)?;
                    purged += 1;
                }
            }
            Ok::<_, GraphError>(purged)
        })?;
        info!(type_name = T::TYPE_NAME, purged, "purged orphaned entities");
        Ok(purged)
    }

    fn check_graph(&self, node: &NodeRef, type_name: &str) -> Result<(), GraphError> {
        if node.graph().same_store(self.graph) {
            Ok(())
        } else {
            Err(GraphError::configuration(format!(
                "{type_name} node {} belongs to another graph",
                node.id()
            )))
        }
    }
}

/// Persistence operations available on every model.
pub trait ModelOps: GraphModel {
    /// Persist through `graph` and return the key. See
    /// [`EntityFactory::create_or_update`].
    fn save(&mut self, graph: &Graph) -> Result<i64, GraphError> {
        graph.entities().create_or_update(self)
    }

    /// Delete from the graph this entity was saved to.
    fn delete(&mut self) -> Result<(), GraphError> {
        if self.state().is_detached() {
            return Err(GraphError::detached(Self::TYPE_NAME));
        }
        let graph = match self.state().node() {
            Some(node) => node.graph().clone(),
            None => return Err(GraphError::unsaved(Self::TYPE_NAME)),
        };
        graph.entities().delete(self)
    }

    fn key(&self) -> Result<Option<i64>, GraphError> {
        self.state().key(Self::TYPE_NAME)
    }

    fn is_dirty(&self) -> bool {
        self.state().is_dirty()
    }

    fn node(&self) -> Option<&NodeRef> {
        self.state().node()
    }

    fn get_by_key(graph: &Graph, key: i64) -> Result<Self, GraphError> {
        graph.entities().get_by_key(key)
    }

    fn find_all(graph: &Graph) -> Result<Traversal<Self>, GraphError> {
        graph.entities().find_all()
    }

    fn clean_up(graph: &Graph) -> Result<usize, GraphError> {
        graph.entities().clean_up::<Self>()
    }
}

impl<T: GraphModel> ModelOps for T {}

fn is_instance_link(rel: &Relationship, instance: &str, node: NodeId) -> bool {
    rel.rel_type == instance && rel.end == node
}

fn field_index(meta: &ModelMeta, field: &str) -> Result<(String, IndexSpec), GraphError> {
    let found = meta
        .fields
        .iter()
        .find(|f| f.name == field || f.property == field)
        .ok_or_else(|| GraphError::configuration(format!("{} has no field '{field}'", meta.type_name)))?;
    let spec = found.index.ok_or_else(|| {
        GraphError::configuration(format!("{}.{field} is not indexed", meta.type_name))
    })?;
    Ok((spec.index_name(meta.type_name, found.property), spec))
}

/// The reference node of `type_name`, if the type was ever saved.
fn reference_node<R: GraphReader + ?Sized>(
    reader: &R,
    root: NodeId,
    type_name: &str,
) -> Result<Option<NodeId>, GraphError> {
    let rels = reader.relationships(root, Some(&naming::reference_type(type_name)), Direction::Outgoing)?;
    Ok(rels.first().map(|rel| rel.end))
}

fn stored_key<R: GraphReader + ?Sized>(reader: &R, node: NodeId) -> Result<i64, GraphError> {
    match reader.property(node, KEY_FIELD)? {
        Some(value) => i64::from_value(value),
        None => Err(GraphError::missing_property(KEY_FIELD, &format!("node {node}"))),
    }
}

/// Create a node for a new entity: discriminator, fresh key, key index
/// entry and instance link.
fn create_instance<T: GraphTransaction + ?Sized>(
    tx: &mut T,
    root: NodeId,
    meta: &ModelMeta,
    config: &GraphConfig,
) -> Result<(NodeId, i64), GraphError> {
    let reference = match reference_node(&*tx, root, meta.type_name)? {
        Some(reference) => reference,
        None => {
            let reference = tx.create_node()?;
            tx.create_relationship(root, reference, &naming::reference_type(meta.type_name))?;
            debug!(type_name = meta.type_name, %reference, "created reference node");
            reference
        }
    };
    let key = next_key(tx, reference, meta, config)?;
    let node = tx.create_node()?;
    tx.set_property(node, &config.type_property, meta.type_name.into_value()?)?;
    tx.set_property(node, KEY_FIELD, key.into_value()?)?;
    IndexManager::put(tx, &meta.key_index(), IndexSpec::EXACT.config(), &key.into_value()?, node)?;
    tx.create_relationship(reference, node, &naming::instance_type(meta.type_name))?;
    Ok((node, key))
}

/// Take the next key from the reference node counter, skipping keys that
/// are already indexed.
fn next_key<T: GraphTransaction + ?Sized>(
    tx: &mut T,
    reference: NodeId,
    meta: &ModelMeta,
    config: &GraphConfig,
) -> Result<i64, GraphError> {
    let mut key = match tx.property(reference, &config.counter_property)? {
        Some(value) => i64::from_value(value)?,
        None => 1,
    };
    let index = meta.key_index();
    while IndexManager::lookup_exact(&*tx, &index, &key.into_value()?)?.is_some() {
        key += 1;
    }
    tx.set_property(reference, &config.counter_property, (key + 1).into_value()?)?;
    Ok(key)
}

fn write_property<T: GraphTransaction + ?Sized>(
    tx: &mut T,
    meta: &ModelMeta,
    node: NodeId,
    property: &str,
    value: Value,
) -> Result<(), GraphError> {
    let old = tx.property(node, property)?;
    let index = meta
        .fields
        .iter()
        .find(|f| f.property == property)
        .and_then(|f| f.index.map(|spec| (spec.index_name(meta.type_name, property), spec.config())));
    if let Some((index, config)) = &index {
        IndexManager::update(tx, index, *config, old.as_ref(), &value, node)?;
    }
    if is_null(&value) {
        tx.remove_property(node, property)?;
    } else {
        tx.set_property(node, property, value)?;
    }
    Ok(())
}

/// Remove every index entry of `node`. Field indexes are taken from `known`
/// when the discriminator names it, else from the registry; nodes of
/// unregistered types lose their key entry only.
fn unindex_node<T: GraphTransaction + ?Sized>(
    tx: &mut T,
    config: &GraphConfig,
    known: &'static ModelMeta,
    node: NodeId,
) -> Result<(), GraphError> {
    let type_name = match tx.property(node, &config.type_property)? {
        Some(value) => String::from_value(value)?,
        None => return Ok(()),
    };
    if let Some(key) = tx.property(node, KEY_FIELD)? {
        IndexManager::remove(tx, &naming::key_index(&type_name), IndexSpec::EXACT.config(), &key, node)?;
    }
    let meta = if type_name == known.type_name {
        known
    } else if let Ok(entry) = registry::lookup(&type_name) {
        entry.meta
    } else {
        debug!(type_name = %type_name, %node, "unregistered type, field index entries kept");
        return Ok(());
    };
    for (field, spec) in meta.indexed_fields() {
        if let Some(value) = tx.property(node, field.property)? {
            IndexManager::remove(tx, &spec.index_name(&type_name, field.property), spec.config(), &value, node)?;
        }
    }
    Ok(())
}

/// Unindex `node`, drop its instance links and delete it. The store refuses
/// the delete if any other relationship remains.
fn remove_node<T: GraphTransaction + ?Sized>(
    tx: &mut T,
    config: &GraphConfig,
    meta: &'static ModelMeta,
    node: NodeId,
) -> Result<(), GraphError> {
    unindex_node(tx, config, meta, node)?;
    let instance = naming::instance_type(meta.type_name);
    for rel in tx.relationships(node, Some(&instance), Direction::Incoming)? {
        tx.delete_relationship(rel.id)?;
    }
    tx.delete_node(node)?;
    Ok(())
}
