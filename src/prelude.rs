//! Convenience re-exports for common neogm usage.
//!
//! ```rust
//! use neogm::prelude::*;
//! ```
//!
//! This imports the `GraphModel` derive together with the trait of the same
//! name, the persistence extension trait [`ModelOps`], the graph handle and
//! the in-memory store, the relationship field types, the value conversion
//! traits and the error type.

pub use crate::GraphModel;
pub use neogm_core::{
    EntityState, FromPropertyValue, Graph, GraphError, IntoPropertyValue, MemoryGraph, ModelOps,
    NodeRef, PropertyBytes, Related, RelatedMany, Traversal,
};
