//! Naming conventions shared with graphs written by other implementations.
//! Changing any of these makes existing graphs unreadable.

use crate::store::Direction;

/// Property name of the implicit model key.
pub const KEY_FIELD: &str = "key";

/// Default index name: `<TypeName>_<fieldName>`.
pub fn index_name(type_name: &str, field: &str) -> String {
    format!("{type_name}_{field}")
}

pub fn key_index(type_name: &str) -> String {
    index_name(type_name, KEY_FIELD)
}

/// Relationship type derived from the owner/related pair.
///
/// The name always lists the start node's type first, so both ends of one
/// edge (an `outgoing` declaration on one type, an `incoming` one on the
/// other) derive the same name.
pub fn relationship_type(owner: &str, related: &str, direction: Direction) -> String {
    let (start, end) = match direction {
        Direction::Incoming => (related, owner),
        Direction::Outgoing | Direction::Both => (owner, related),
    };
    format!("{}_{}", start.to_uppercase(), end.to_uppercase())
}

/// Link from the store root to a type's reference node.
pub fn reference_type(type_name: &str) -> String {
    format!("{}_REFERENCE", type_name.to_uppercase())
}

/// Link from a type's reference node to each of its instances.
pub fn instance_type(type_name: &str) -> String {
    format!("{}_INSTANCE", type_name.to_uppercase())
}
