//! Error types for mapping and persistence.

use thiserror::Error;

use crate::store::{NodeId, StoreError};

/// Unified error type for all neogm operations.
///
/// Generated accessors wrap conversion errors with [`Context`](GraphError::Context)
/// via [`with_context`](GraphError::with_context), producing chained messages like:
///
/// ```text
/// Person::age (prop 'age'): type mismatch: expected Integer, got String (i64)
/// ```
#[derive(Error, Debug)]
pub enum GraphError {
    /// An index lookup found no node.
    #[error("nothing indexed under '{value}' in index '{index}'")]
    NotFound { index: String, value: String },

    /// The graph store failed; the transaction was rolled back.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A model type is used in a way its declaration does not support
    /// (unregistered type, unindexed field, conflicting index definition).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Delete was refused because the node still takes part in relationships.
    #[error("node {node} still has {relationships} relationship(s)")]
    Constraint { node: NodeId, relationships: usize },

    /// The entity was deleted; its fields can no longer be read or saved.
    #[error("{type_name} entity was deleted and is detached from the graph")]
    Detached { type_name: String },

    /// The operation needs a persisted entity.
    #[error("{type_name} entity has not been saved")]
    Unsaved { type_name: String },

    /// A general mapping error with a freeform message.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// A required property was not found on a node.
    #[error("missing property '{property}' on {label}")]
    MissingProperty { property: String, label: String },

    /// A property value did not match the expected Rust type.
    #[error("type mismatch: expected {expected}, got {got} ({context})")]
    TypeMismatch {
        expected: String,
        got: String,
        context: String,
    },

    /// Wraps an inner error with additional context (type, field, property).
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Create a [`TypeMismatch`](GraphError::TypeMismatch) error.
    pub fn type_mismatch(expected: &str, got: &str, context: &str) -> Self {
        GraphError::TypeMismatch {
            expected: expected.to_owned(),
            got: got.to_owned(),
            context: context.to_owned(),
        }
    }

    /// Create a [`MissingProperty`](GraphError::MissingProperty) error.
    pub fn missing_property(property: &str, label: &str) -> Self {
        GraphError::MissingProperty {
            property: property.to_owned(),
            label: label.to_owned(),
        }
    }

    /// Create a [`NotFound`](GraphError::NotFound) error.
    pub fn not_found(index: &str, value: impl ToString) -> Self {
        GraphError::NotFound {
            index: index.to_owned(),
            value: value.to_string(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        GraphError::Configuration(msg.into())
    }

    pub fn detached(type_name: &str) -> Self {
        GraphError::Detached { type_name: type_name.to_owned() }
    }

    pub fn unsaved(type_name: &str) -> Self {
        GraphError::Unsaved { type_name: type_name.to_owned() }
    }

    /// Wrap this error with additional context, producing a [`Context`](GraphError::Context) variant.
    ///
    /// ```rust
    /// # use neogm_core::GraphError;
    /// let err = GraphError::type_mismatch("Integer", "String", "i64");
    /// let wrapped = err.with_context("Person::age (prop 'age')");
    /// assert!(wrapped.to_string().contains("Person::age"));
    /// ```
    pub fn with_context(self, ctx: impl Into<String>) -> Self {
        GraphError::Context {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with every [`Context`](GraphError::Context) layer removed.
    pub fn root_cause(&self) -> &GraphError {
        match self {
            GraphError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
