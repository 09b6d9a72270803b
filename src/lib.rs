#![doc = r#"
An object-graph mapper that persists plain Rust structs as nodes of a
transactional property graph.

`neogm` keeps the graph layout simple and predictable: every entity is one
node carrying its scalar fields as properties, a type discriminator and a
numeric key. Entities are read back lazily from their node, indexed fields
are kept in step with their values, and relationship fields resolve into
lazy, restartable traversals. Property values use the [`neo4rs`] value
model.

# Quick start

## Define models

```rust
use neogm::prelude::*;

#[derive(Debug, Default, GraphModel)]
#[graph(type_name = "Person")]
struct Person {
    state: EntityState,
    #[graph(index)]
    name: String,
    age: i64,
    #[graph(related_to(rel_type = "KNOWS"))]
    friends: RelatedMany<Person>,
}
```

The derive implements [`GraphModel`](neogm_core::GraphModel) and generates
a getter and a `set_*` setter per scalar field, plus a getter and
`relate_*`/`unrelate_*` per relationship field.

## Save, load, relate

```rust
use neogm::prelude::*;

# #[derive(Debug, Default, GraphModel)]
# #[graph(type_name = "Person")]
# struct Person {
#     state: EntityState,
#     #[graph(index)]
#     name: String,
#     age: i64,
#     #[graph(related_to(rel_type = "KNOWS"))]
#     friends: RelatedMany<Person>,
# }
# fn main() -> Result<(), GraphError> {
let graph = Graph::new(MemoryGraph::new());
graph.register::<Person>();

let mut alice = Person::default();
alice.set_name("Alice".to_owned());
alice.set_age(34);
let key = alice.save(&graph)?;

let mut bob = Person::default();
bob.set_name("Bob".to_owned());
bob.save(&graph)?;
alice.relate_friends(&bob)?;

// Loaded entities read their properties from the node on access.
let loaded = Person::get_by_key(&graph, key)?;
assert_eq!(loaded.name()?, "Alice");

// Relationship fields walk the graph every time they are iterated.
for friend in &loaded.friends()? {
    assert_eq!(friend?.name()?, "Bob");
}

// Indexed fields can be queried directly.
let found: Vec<Person> = graph.entities().find_by("name", "Bob")?;
assert_eq!(found.len(), 1);
# Ok(())
# }
```

## Delete

A node that still takes part in relationships cannot be deleted; the call
fails with [`GraphError::Constraint`] and leaves the graph untouched. A
deleted entity is detached: reading its fields or saving it again fails with
[`GraphError::Detached`].

# Supported value types

`FromPropertyValue` / `IntoPropertyValue` conversions are provided for:

| Property value | Rust type |
|----------------|-----------|
| Integer | `i64`, `i32`, `u64`, `u32`, `i16`, `u16`, `i8`, `u8` |
| Float | `f64`, `f32` |
| String | `String` (`&str` when writing) |
| Boolean | `bool` |
| List | `Vec<T>` |
| Map | `HashMap<String, V>` |
| Null / missing | `Option<T>` |
| Bytes | [`PropertyBytes`](neogm_core::PropertyBytes) |
| Date | `chrono::NaiveDate` |
| LocalDateTime | `chrono::NaiveDateTime` |
| DateTime | `chrono::DateTime<chrono::FixedOffset>` |

Integers are stored as 64-bit signed values: saving a `u64` above
`i64::MAX` fails with [`GraphError::Mapping`] and leaves the store
unchanged. Only strings, integers, floats and booleans can be indexed.

# Error handling

Everything returns [`GraphError`]. Generated getters wrap conversion errors
with `.with_context()` so messages include the type, field and property:

```text
Person::age (prop 'age'): type mismatch: expected Integer, got String (i64)
```

[`neo4rs`]: https://docs.rs/neo4rs
"#]

pub mod prelude;

pub use neo4rs;
pub use neogm_core as core;
pub use neogm_macros::GraphModel;

pub use neogm_core::GraphModel;
pub use neogm_core::{EntityFactory, EntityState, Graph, GraphConfig, GraphError, MemoryGraph, ModelOps, NodeRef};
