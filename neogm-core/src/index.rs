//! Index maintenance for indexed model fields.
//!
//! One index exists per indexed field per model type. Every write goes
//! through the caller's transaction, so a property change and its index
//! update commit or roll back together.

use std::collections::HashSet;

use neo4rs::BoltType as Value;
use tracing::debug;

use crate::error::GraphError;
use crate::meta::{IndexSpec, ModelMeta};
use crate::store::{GraphReader, GraphTransaction, IndexConfig, IndexKind, NodeId};
use crate::value::type_name;

/// Stateless index operations over a store reader or transaction.
pub struct IndexManager;

impl IndexManager {
    /// Create the index for `property` of `type_name` if missing and return
    /// its name. Fails if an index of that name exists with another
    /// configuration.
    pub fn ensure<T: GraphTransaction + ?Sized>(
        tx: &mut T,
        type_name: &str,
        property: &str,
        spec: &IndexSpec,
    ) -> Result<String, GraphError> {
        let name = spec.index_name(type_name, property);
        let wanted = spec.config();
        match tx.index_config(&name)? {
            Some(existing) if existing != wanted => Err(GraphError::configuration(format!(
                "index '{name}' already exists as {existing:?}, {type_name}.{property} declares {wanted:?}"
            ))),
            Some(_) => Ok(name),
            None => {
                tx.create_index(&name, wanted)?;
                debug!(index = %name, "ensured index");
                Ok(name)
            }
        }
    }

    /// Ensure the key index and every declared field index of a model.
    pub fn ensure_model<T: GraphTransaction + ?Sized>(
        tx: &mut T,
        meta: &ModelMeta,
    ) -> Result<(), GraphError> {
        Self::ensure(tx, meta.type_name, crate::naming::KEY_FIELD, &IndexSpec::EXACT)?;
        for (field, spec) in meta.indexed_fields() {
            Self::ensure(tx, meta.type_name, field.property, spec)?;
        }
        Ok(())
    }

    /// The index terms a value is stored under. `Null` has none.
    pub fn terms(config: IndexConfig, value: &Value) -> Result<Vec<String>, GraphError> {
        let Some(text) = canonical(value)? else {
            return Ok(Vec::new());
        };
        match config.kind {
            IndexKind::Exact => Ok(vec![text]),
            IndexKind::Fulltext => Ok(tokenize(&text, config.lower_case)),
        }
    }

    pub fn put<T: GraphTransaction + ?Sized>(
        tx: &mut T,
        index: &str,
        config: IndexConfig,
        value: &Value,
        node: NodeId,
    ) -> Result<(), GraphError> {
        for term in Self::terms(config, value)? {
            tx.index_add(index, &term, node)?;
        }
        Ok(())
    }

    pub fn remove<T: GraphTransaction + ?Sized>(
        tx: &mut T,
        index: &str,
        config: IndexConfig,
        value: &Value,
        node: NodeId,
    ) -> Result<(), GraphError> {
        for term in Self::terms(config, value)? {
            tx.index_remove(index, &term, node)?;
        }
        Ok(())
    }

    /// Move `node`'s entries from the terms of `old` to the terms of `new`.
    pub fn update<T: GraphTransaction + ?Sized>(
        tx: &mut T,
        index: &str,
        config: IndexConfig,
        old: Option<&Value>,
        new: &Value,
        node: NodeId,
    ) -> Result<(), GraphError> {
        let new_terms = Self::terms(config, new)?;
        if let Some(old) = old {
            for term in Self::terms(config, old)? {
                if !new_terms.contains(&term) {
                    tx.index_remove(index, &term, node)?;
                }
            }
        }
        for term in &new_terms {
            tx.index_add(index, term, node)?;
        }
        Ok(())
    }

    /// First node stored under exactly `value`.
    pub fn lookup_exact<R: GraphReader + ?Sized>(
        reader: &R,
        index: &str,
        value: &Value,
    ) -> Result<Option<NodeId>, GraphError> {
        Ok(Self::lookup_exact_all(reader, index, value)?.into_iter().next())
    }

    /// Every node stored under exactly `value`, in insertion order.
    pub fn lookup_exact_all<R: GraphReader + ?Sized>(
        reader: &R,
        index: &str,
        value: &Value,
    ) -> Result<Vec<NodeId>, GraphError> {
        match canonical(value)? {
            Some(term) => Ok(reader.index_get(index, &term)?),
            None => Ok(Vec::new()),
        }
    }

    /// Nodes whose indexed text contains every token of `query`.
    pub fn lookup_fulltext<R: GraphReader + ?Sized>(
        reader: &R,
        index: &str,
        query: &str,
    ) -> Result<FulltextHits, GraphError> {
        let lower_case = reader.index_config(index)?.is_some_and(|c| c.lower_case);
        let tokens = tokenize(query, lower_case);
        let Some((first, rest)) = tokens.split_first() else {
            return Ok(FulltextHits::empty());
        };
        let candidates = reader.index_get(index, first)?;
        let mut required = Vec::with_capacity(rest.len());
        for token in rest {
            required.push(reader.index_get(index, token)?.into_iter().collect());
        }
        Ok(FulltextHits { candidates: candidates.into_iter(), required })
    }
}

/// Lazily filtered result of a fulltext lookup.
#[derive(Debug)]
pub struct FulltextHits {
    candidates: std::vec::IntoIter<NodeId>,
    required: Vec<HashSet<NodeId>>,
}

impl FulltextHits {
    fn empty() -> Self {
        FulltextHits { candidates: Vec::new().into_iter(), required: Vec::new() }
    }
}

impl Iterator for FulltextHits {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let required = &self.required;
        self.candidates
            .by_ref()
            .find(|node| required.iter().all(|set| set.contains(node)))
    }
}

fn canonical(value: &Value) -> Result<Option<String>, GraphError> {
    match value {
        Value::Null(_) => Ok(None),
        Value::String(s) => Ok(Some(s.value.clone())),
        Value::Integer(i) => Ok(Some(i.value.to_string())),
        Value::Float(f) => Ok(Some(f.value.to_string())),
        Value::Boolean(b) => Ok(Some(b.value.to_string())),
        other => Err(GraphError::configuration(format!(
            "{} values cannot be indexed",
            type_name(other)
        ))),
    }
}

fn tokenize(text: &str, lower_case: bool) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split_whitespace()
        .map(|t| if lower_case { t.to_lowercase() } else { t.to_owned() })
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
