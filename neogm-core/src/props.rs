//! Centralized field access for generated accessors.
//!
//! These functions isolate the read/write rules for model fields in a single
//! location so that derive-macro generated code only depends on this module.

use crate::error::GraphError;
use crate::state::EntityState;
use neo4rs::BoltType as Value;

use crate::traits::{FromPropertyValue, IntoPropertyValue};

/// Read a scalar field.
///
/// Detached entities fail. Attached entities serve unstaged fields from the
/// live node; everything else comes from the in-memory value.
pub fn read<T>(
    state: &EntityState,
    label: &str,
    field: &str,
    property: &str,
    staged: &T,
) -> Result<T, GraphError>
where
    T: FromPropertyValue + Clone,
{
    if state.is_detached() {
        return Err(GraphError::detached(label));
    }
    match state.node() {
        Some(node) if !state.is_staged(property) => {
            let value = match node.property(property)? {
                Some(v) => T::from_value(v),
                None => T::from_missing(property, label),
            };
            value.map_err(|e| e.with_context(format!("{label}::{field} (prop '{property}')")))
        }
        _ => Ok(staged.clone()),
    }
}

/// Record a write to a scalar field. Nothing reaches the store until `save`.
pub fn write(state: &mut EntityState, property: &'static str) {
    state.stage(property);
}

/// Convert a field's in-memory value for `properties()`.
pub fn value<T>(
    label: &str,
    field: &str,
    property: &'static str,
    staged: &T,
) -> Result<(&'static str, Value), GraphError>
where
    T: IntoPropertyValue + Clone,
{
    let value = staged
        .clone()
        .into_value()
        .map_err(|e| e.with_context(format!("{label}::{field} (prop '{property}')")))?;
    Ok((property, value))
}
