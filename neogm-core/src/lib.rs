//! Core traits, stores, factories and error types for neogm.
//!
//! This crate is not meant to be used directly — use the [`neogm`] facade
//! crate instead, which re-exports everything you need together with the
//! `GraphModel` derive.
//!
//! [`neogm`]: https://docs.rs/neogm

pub mod config;
pub mod entity;
pub mod error;
pub mod graph;
pub mod index;
pub mod meta;
pub mod naming;
pub mod props;
pub mod registry;
pub mod relationship;
pub mod state;
pub mod store;
pub mod traits;
pub mod value;

pub use neo4rs::BoltType;

pub use config::GraphConfig;
pub use entity::{EntityFactory, ModelOps};
pub use error::GraphError;
pub use graph::{Graph, NodeRef};
pub use index::IndexManager;
pub use meta::{Cardinality, FieldMeta, IndexSpec, ModelMeta, RelationshipDecl, TraversalKind};
pub use registry::register;
pub use relationship::{Related, RelatedMany, RelationshipFactory, Traversal};
pub use state::EntityState;
pub use store::{
    in_transaction, Direction, FailPoint, GraphReader, GraphStore, GraphTransaction, IndexConfig,
    IndexKind, MemoryGraph, NodeId, Relationship, RelationshipId, StoreError,
};
pub use traits::{AnyModel, FromPropertyValue, GraphModel, IntoPropertyValue};
pub use value::PropertyBytes;
