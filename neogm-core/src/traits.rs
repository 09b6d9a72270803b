//! Core traits for mapping between graph nodes and Rust structs.

use std::any::Any;

use neo4rs::BoltType as Value;

use crate::error::GraphError;
use crate::graph::NodeRef;
use crate::meta::ModelMeta;
use crate::state::EntityState;

/// Maps a graph node to a Rust struct.
///
/// Automatically implemented by `#[derive(GraphModel)]`, which also
/// generates the per-field accessors.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Debug, Default, GraphModel)]
/// #[graph(type_name = "Person")]
/// struct Person {
///     state: EntityState,
///     #[graph(index)]
///     name: String,
/// }
///
/// assert_eq!(Person::TYPE_NAME, "Person");
/// ```
pub trait GraphModel: Sized + Send + 'static {
    /// The type discriminator stored on every node of this type.
    const TYPE_NAME: &'static str;

    /// Static description of the persisted fields, indexes and relationships.
    fn meta() -> &'static ModelMeta;

    /// The node constructor: wraps an existing node without reading any of
    /// its properties.
    fn from_node(node: NodeRef) -> Self;

    fn state(&self) -> &EntityState;

    fn state_mut(&mut self) -> &mut EntityState;

    /// In-memory values of every persisted scalar field, keyed by property
    /// name. Relationship fields are never included.
    fn properties(&self) -> Result<Vec<(&'static str, Value)>, GraphError>;
}

/// Object-safe view of any [`GraphModel`], returned when the concrete type is
/// only known at runtime (see `EntityFactory::get_by_node`).
pub trait AnyModel: Any + Send {
    fn type_name(&self) -> &'static str;

    fn entity_state(&self) -> &EntityState;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl std::fmt::Debug for dyn AnyModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyModel").field("type_name", &self.type_name()).finish_non_exhaustive()
    }
}

impl<T: GraphModel> AnyModel for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn entity_state(&self) -> &EntityState {
        GraphModel::state(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Converts a single node property value into a Rust type.
///
/// This is the core conversion primitive. Implementations exist for
/// primitives, collections, temporal types and [`PropertyBytes`].
///
/// [`PropertyBytes`]: crate::PropertyBytes
pub trait FromPropertyValue: Sized {
    /// Convert a [`BoltType`](neo4rs::BoltType) into `Self`.
    fn from_value(value: Value) -> Result<Self, GraphError>;

    /// Called when the node has no such property. Only `Option<T>` tolerates it.
    fn from_missing(property: &str, label: &str) -> Result<Self, GraphError> {
        Err(GraphError::missing_property(property, label))
    }
}

/// Converts a Rust value into a node property value.
///
/// `None` becomes `Null`, which `save` turns into "remove the property".
/// Fails with [`GraphError::Mapping`] when the value has no property
/// representation (an unsigned integer above `i64::MAX`).
pub trait IntoPropertyValue {
    /// Convert `self` into a [`BoltType`](neo4rs::BoltType).
    fn into_value(self) -> Result<Value, GraphError>;
}
