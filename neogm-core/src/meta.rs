//! Static model descriptions generated by `#[derive(GraphModel)]`.
//!
//! These replace field introspection: the factories read indexes and
//! relationship declarations from here instead of discovering them at runtime.

use crate::naming;
use crate::store::{Direction, IndexConfig, IndexKind};

/// Index declaration attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    /// Explicit index name; defaults to `<TypeName>_<property>`.
    pub name: Option<&'static str>,
    pub kind: IndexKind,
    /// Fulltext only: fold terms and queries to lower case.
    pub lower_case: bool,
}

impl IndexSpec {
    pub const EXACT: IndexSpec = IndexSpec { name: None, kind: IndexKind::Exact, lower_case: false };

    pub fn index_name(&self, type_name: &str, property: &str) -> String {
        match self.name {
            Some(name) => name.to_owned(),
            None => naming::index_name(type_name, property),
        }
    }

    pub fn config(&self) -> IndexConfig {
        IndexConfig {
            kind: self.kind,
            lower_case: self.kind == IndexKind::Fulltext && self.lower_case,
        }
    }
}

/// A persisted scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    /// Rust field name.
    pub name: &'static str,
    /// Node property the field is stored under.
    pub property: &'static str,
    pub index: Option<IndexSpec>,
}

/// How a relationship field reaches related nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalKind {
    /// Endpoints of the owner's own relationships.
    OneHop,
    /// Every node reachable breadth-first, start node excluded.
    BreadthFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// A declared relationship field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipDecl {
    pub field: &'static str,
    /// Type name of the related model.
    pub related: &'static str,
    /// Explicit relationship type; derived from the type pair when absent.
    pub rel_type: Option<&'static str>,
    pub direction: Direction,
    pub traversal: TraversalKind,
    pub cardinality: Cardinality,
}

impl RelationshipDecl {
    /// The relationship type name as stored in the graph.
    pub fn relationship_type(&self, owner: &str) -> String {
        match self.rel_type {
            Some(t) => t.to_owned(),
            None => naming::relationship_type(owner, self.related, self.direction),
        }
    }
}

/// Everything the factories need to know about one model type.
#[derive(Debug)]
pub struct ModelMeta {
    pub type_name: &'static str,
    pub fields: &'static [FieldMeta],
    pub relationships: &'static [RelationshipDecl],
}

impl ModelMeta {
    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relationship(&self, field: &str) -> Option<&RelationshipDecl> {
        self.relationships.iter().find(|r| r.field == field)
    }

    /// Indexed fields, the implicit key excluded.
    pub fn indexed_fields(&self) -> impl Iterator<Item = (&FieldMeta, &IndexSpec)> + '_ {
        self.fields.iter().filter_map(|f| f.index.as_ref().map(|spec| (f, spec)))
    }

    pub fn key_index(&self) -> String {
        naming::key_index(self.type_name)
    }
}
