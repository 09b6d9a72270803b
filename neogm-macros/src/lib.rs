//! Procedural macros for neogm.
//!
//! This crate is not meant to be used directly — use the [`neogm`] facade
//! crate which re-exports the derive.
//!
//! [`neogm`]: https://docs.rs/neogm

extern crate proc_macro;

use proc_macro::TokenStream;

mod attrs;
mod model;

/// Derive [`GraphModel`](neogm_core::traits::GraphModel) and the field
/// accessors for a struct.
///
/// The struct needs exactly one field of type `EntityState`. Every other
/// field is a persisted scalar unless it is a relationship field
/// (`Related<T>` / `RelatedMany<T>`) or marked `#[graph(skip)]`. All fields
/// must implement `Default`; scalar fields also need `Clone`,
/// `FromPropertyValue` and `IntoPropertyValue`.
///
/// # Generated methods
///
/// - `fn field(&self) -> Result<F, GraphError>` and `fn set_field(&mut self, F)`
///   for each scalar field.
/// - `fn field(&self) -> Result<Traversal<T>, GraphError>` for `RelatedMany<T>`,
///   `fn field(&self) -> Result<Option<T>, GraphError>` for `Related<T>`.
/// - `fn relate_field(&self, &T)` and `fn unrelate_field(&self, &T)` for each
///   relationship field.
///
/// # Attributes
///
/// **Struct-level:**
/// - `#[graph(type_name = "...")]` — the type discriminator. Defaults to the struct name.
///
/// **Field-level:**
/// - `#[graph(prop = "...")]` — override the node property name (default: field name).
/// - `#[graph(index)]` — exact index named `<TypeName>_<property>`.
/// - `#[graph(index(name = "...", kind = "fulltext", lower_case = false))]` — index options.
/// - `#[graph(related_to(rel_type = "...", direction = "incoming"))]` — one-hop relationship.
/// - `#[graph(related_via(...))]` — breadth-first traversal, same options.
/// - `#[graph(skip)]` — not persisted.
///
/// # Example
///
/// ```rust,ignore
/// use neogm::prelude::*;
///
/// #[derive(Debug, Default, GraphModel)]
/// #[graph(type_name = "Person")]
/// struct Person {
///     state: EntityState,
///     #[graph(index)]
///     name: String,
///     #[graph(index(kind = "fulltext"))]
///     bio: String,
///     #[graph(related_to(rel_type = "KNOWS"))]
///     friends: RelatedMany<Person>,
/// }
/// ```
#[proc_macro_derive(GraphModel, attributes(graph))]
pub fn graph_model(input: TokenStream) -> TokenStream {
    model::expand(input)
}
