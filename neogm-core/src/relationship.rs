//! Relationship fields and their lazy resolution into typed models.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::sync::OnceLock;

use tracing::debug;

use crate::error::GraphError;
use crate::graph::{Graph, NodeRef};
use crate::meta::{RelationshipDecl, TraversalKind};
use crate::registry;
use crate::state::EntityState;
use crate::store::{
    in_transaction, Direction, GraphReader, GraphTransaction, NodeId, Relationship, RelationshipId,
};
use crate::traits::GraphModel;

/// Node constructor of a related type, looked up once per field.
pub struct NodeConstructor<T> {
    cell: OnceLock<fn(NodeRef) -> T>,
}

impl<T: GraphModel> NodeConstructor<T> {
    /// Fails with a configuration error if `T` was never registered.
    pub fn get(&self) -> Result<fn(NodeRef) -> T, GraphError> {
        if let Some(ctor) = self.cell.get() {
            return Ok(*ctor);
        }
        let ctor = registry::constructor::<T>()?;
        Ok(*self.cell.get_or_init(|| ctor))
    }
}

impl<T> Default for NodeConstructor<T> {
    fn default() -> Self {
        NodeConstructor { cell: OnceLock::new() }
    }
}

/// A relationship field holding many related entities.
///
/// The generated accessor returns a [`Traversal`] that walks the store each
/// time it is iterated.
pub struct RelatedMany<T> {
    ctor: NodeConstructor<T>,
}

impl<T: GraphModel> RelatedMany<T> {
    pub fn resolve(
        &self,
        owner_type: &str,
        decl: &RelationshipDecl,
        owner: &EntityState,
    ) -> Result<Traversal<T>, GraphError> {
        RelationshipFactory::resolve(&self.ctor, owner_type, decl, owner)
    }
}

/// A relationship field holding a single related entity, resolved on access.
pub struct Related<T> {
    ctor: NodeConstructor<T>,
}

impl<T: GraphModel> Related<T> {
    /// The first related entity, if any.
    pub fn resolve(
        &self,
        owner_type: &str,
        decl: &RelationshipDecl,
        owner: &EntityState,
    ) -> Result<Option<T>, GraphError> {
        RelationshipFactory::resolve(&self.ctor, owner_type, decl, owner)?.first()
    }
}

macro_rules! relation_field_impls {
    ($($ty:ident),*) => {$(
        impl<T> Default for $ty<T> {
            fn default() -> Self {
                $ty { ctor: NodeConstructor::default() }
            }
        }

        impl<T> Clone for $ty<T> {
            fn clone(&self) -> Self {
                Self::default()
            }
        }

        impl<T> fmt::Debug for $ty<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($ty), "(..)"))
            }
        }
    )*};
}

relation_field_impls!(Related, RelatedMany);

/// Resolves relationship declarations against the graph.
pub struct RelationshipFactory;

impl RelationshipFactory {
    /// Build the lazy sequence of entities related to `owner` through `decl`.
    ///
    /// An unsaved owner yields an empty sequence.
    pub fn resolve<T: GraphModel>(
        ctor: &NodeConstructor<T>,
        owner_type: &str,
        decl: &RelationshipDecl,
        owner: &EntityState,
    ) -> Result<Traversal<T>, GraphError> {
        if owner.is_detached() {
            return Err(GraphError::detached(owner_type));
        }
        let construct = ctor.get()?;
        Ok(Traversal {
            origin: owner.node().cloned(),
            rel_type: decl.relationship_type(owner_type),
            direction: decl.direction,
            kind: decl.traversal,
            construct,
        })
    }

    /// Create one relationship between `owner` and `target` as declared by
    /// `decl`. `incoming` declarations store the edge as `target -> owner`.
    pub fn relate(
        owner_type: &str,
        decl: &RelationshipDecl,
        owner: &EntityState,
        target_type: &str,
        target: &EntityState,
    ) -> Result<RelationshipId, GraphError> {
        let (from, to) = endpoints(owner_type, owner, target_type, target)?;
        let rel_type = decl.relationship_type(owner_type);
        let (start, end) = match decl.direction {
            Direction::Incoming => (to.id(), from.id()),
            Direction::Outgoing | Direction::Both => (from.id(), to.id()),
        };
        let id = in_transaction(from.graph().store(), |tx| {
            Ok::<_, GraphError>(tx.create_relationship(start, end, &rel_type)?)
        })?;
        debug!(%id, %start, %end, rel_type = %rel_type, field = decl.field, "related");
        Ok(id)
    }

    /// Delete every relationship of the declared type and direction between
    /// `owner` and `target`. Returns how many were removed.
    pub fn unrelate(
        owner_type: &str,
        decl: &RelationshipDecl,
        owner: &EntityState,
        target_type: &str,
        target: &EntityState,
    ) -> Result<usize, GraphError> {
        let (from, to) = endpoints(owner_type, owner, target_type, target)?;
        let rel_type = decl.relationship_type(owner_type);
        let removed = in_transaction(from.graph().store(), |tx| {
            let rels = tx.relationships(from.id(), Some(&rel_type), decl.direction)?;
            let mut removed = 0;
            for rel in rels.iter().filter(|r| r.other_node(from.id()) == to.id()) {
                tx.delete_relationship(rel.id)?;
                removed += 1;
            }
            Ok::<_, GraphError>(removed)
        })?;
        debug!(removed, rel_type = %rel_type, field = decl.field, "unrelated");
        Ok(removed)
    }
}

fn endpoints<'a>(
    owner_type: &str,
    owner: &'a EntityState,
    target_type: &str,
    target: &'a EntityState,
) -> Result<(&'a NodeRef, &'a NodeRef), GraphError> {
    let node_of = |type_name: &str, state: &'a EntityState| {
        if state.is_detached() {
            return Err(GraphError::detached(type_name));
        }
        state.node().ok_or_else(|| GraphError::unsaved(type_name))
    };
    let from = node_of(owner_type, owner)?;
    let to = node_of(target_type, target)?;
    if !from.graph().same_store(to.graph()) {
        return Err(GraphError::configuration(format!(
            "{owner_type} and {target_type} entities live in different graphs"
        )));
    }
    Ok((from, to))
}

/// A lazy, restartable sequence of related entities.
///
/// Nothing is read until iteration starts, and every call to
/// [`iter`](Self::iter) walks the store again. Concurrent changes to the
/// walked relationships during iteration have unspecified effects.
pub struct Traversal<T> {
    origin: Option<NodeRef>,
    rel_type: String,
    direction: Direction,
    kind: TraversalKind,
    construct: fn(NodeRef) -> T,
}

impl<T> Traversal<T> {
    pub(crate) fn new(
        origin: Option<NodeRef>,
        rel_type: String,
        direction: Direction,
        kind: TraversalKind,
        construct: fn(NodeRef) -> T,
    ) -> Self {
        Traversal { origin, rel_type, direction, kind, construct }
    }

    /// The relationship type this sequence follows.
    pub fn rel_type(&self) -> &str {
        &self.rel_type
    }

    pub fn iter(&self) -> TraversalIter<T> {
        TraversalIter {
            walk: NodeWalk::new(self.origin.as_ref(), &self.rel_type, self.direction, self.kind),
            construct: self.construct,
            _marker: PhantomData,
        }
    }

    /// Ids of the reached nodes, in traversal order.
    pub fn node_ids(&self) -> Result<Vec<NodeId>, GraphError> {
        NodeWalk::new(self.origin.as_ref(), &self.rel_type, self.direction, self.kind)
            .map(|r| r.map(|node| node.id()))
            .collect()
    }

    pub fn to_vec(&self) -> Result<Vec<T>, GraphError> {
        self.iter().collect()
    }

    pub fn first(&self) -> Result<Option<T>, GraphError> {
        self.iter().next().transpose()
    }

    pub fn count(&self) -> Result<usize, GraphError> {
        Ok(self.node_ids()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, GraphError> {
        Ok(NodeWalk::new(self.origin.as_ref(), &self.rel_type, self.direction, self.kind)
            .next()
            .transpose()?
            .is_none())
    }
}

impl<'a, T> IntoIterator for &'a Traversal<T> {
    type Item = Result<T, GraphError>;
    type IntoIter = TraversalIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> fmt::Debug for Traversal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("origin", &self.origin)
            .field("rel_type", &self.rel_type)
            .field("direction", &self.direction)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Iterator over one walk of a [`Traversal`].
pub struct TraversalIter<T> {
    walk: NodeWalk,
    construct: fn(NodeRef) -> T,
    _marker: PhantomData<T>,
}

impl<T> Iterator for TraversalIter<T> {
    type Item = Result<T, GraphError>;

    fn next(&mut self) -> Option<Self::Item> {
        let construct = self.construct;
        self.walk.next().map(|r| r.map(construct))
    }
}

enum WalkState {
    Start(NodeId),
    OneHop {
        origin: NodeId,
        pending: VecDeque<Relationship>,
    },
    BreadthFirst {
        queue: VecDeque<NodeId>,
        seen: HashSet<NodeId>,
        ready: VecDeque<NodeId>,
    },
    Done,
}

/// Lazy node-level walk shared by both traversal kinds.
struct NodeWalk {
    graph: Option<Graph>,
    rel_type: String,
    direction: Direction,
    kind: TraversalKind,
    state: WalkState,
}

impl NodeWalk {
    fn new(origin: Option<&NodeRef>, rel_type: &str, direction: Direction, kind: TraversalKind) -> Self {
        let (graph, state) = match origin {
            Some(node) => (Some(node.graph().clone()), WalkState::Start(node.id())),
            None => (None, WalkState::Done),
        };
        NodeWalk { graph, rel_type: rel_type.to_owned(), direction, kind, state }
    }

    fn expand(&self, graph: &Graph, node: NodeId) -> Result<Vec<Relationship>, GraphError> {
        Ok(graph.store().relationships(node, Some(&self.rel_type), self.direction)?)
    }

    fn step(&mut self, graph: &Graph) -> Result<Option<NodeId>, GraphError> {
        loop {
            match &mut self.state {
                WalkState::Done => return Ok(None),
                WalkState::Start(origin) => {
                    let origin = *origin;
                    self.state = match self.kind {
                        TraversalKind::OneHop => WalkState::OneHop {
                            origin,
                            pending: self.expand(graph, origin)?.into(),
                        },
                        TraversalKind::BreadthFirst => WalkState::BreadthFirst {
                            queue: VecDeque::from([origin]),
                            seen: HashSet::from([origin]),
                            ready: VecDeque::new(),
                        },
                    };
                }
                WalkState::OneHop { origin, pending } => {
                    return Ok(match pending.pop_front() {
                        Some(rel) => Some(rel.other_node(*origin)),
                        None => {
                            self.state = WalkState::Done;
                            None
                        }
                    });
                }
                WalkState::BreadthFirst { ready, .. } if !ready.is_empty() => {
                    return Ok(ready.pop_front());
                }
                WalkState::BreadthFirst { queue, .. } => {
                    let Some(current) = queue.pop_front() else {
                        self.state = WalkState::Done;
                        return Ok(None);
                    };
                    let rels = self.expand(graph, current)?;
                    if let WalkState::BreadthFirst { queue, seen, ready } = &mut self.state {
                        for rel in rels {
                            let next = rel.other_node(current);
                            if seen.insert(next) {
                                queue.push_back(next);
                                ready.push_back(next);
                            }
                        }
                    }
                }
            }
        }
    }
}

impl Iterator for NodeWalk {
    type Item = Result<NodeRef, GraphError>;

    fn next(&mut self) -> Option<Self::Item> {
        let graph = self.graph.clone()?;
        match self.step(&graph) {
            Ok(Some(id)) => Some(Ok(graph.node(id))),
            Ok(None) => None,
            Err(err) => {
                self.state = WalkState::Done;
                Some(Err(err))
            }
        }
    }
}
