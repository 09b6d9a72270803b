use neogm_core::meta::ModelMeta;
use neogm_core::registry;
use neogm_core::traits::GraphModel;
use neogm_core::{BoltType, EntityState, GraphError, NodeRef};
use neogm_macros::GraphModel;

#[derive(Debug, Default, GraphModel)]
struct Gadget {
    state: EntityState,
    label: String,
}

/// Its metadata cannot be built, so registration panics under the lock.
struct Broken {
    state: EntityState,
}

impl GraphModel for Broken {
    const TYPE_NAME: &'static str = "Broken";

    fn meta() -> &'static ModelMeta {
        panic!("Broken has no metadata")
    }

    fn from_node(node: NodeRef) -> Self {
        Broken { state: EntityState::attached(node) }
    }

    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }

    fn properties(&self) -> Result<Vec<(&'static str, BoltType)>, GraphError> {
        Ok(Vec::new())
    }
}

#[test]
fn test_lookup_unknown_type() {
    match registry::lookup("Nowhere") {
        Err(GraphError::Configuration(msg)) => assert!(msg.contains("Nowhere"), "got: {msg}"),
        Err(other) => panic!("expected Configuration, got: {other}"),
        Ok(_) => panic!("expected Configuration, got an entry"),
    }
}

#[test]
fn test_register_is_idempotent() {
    registry::register::<Gadget>();
    registry::register::<Gadget>();
    let entry = registry::lookup("Gadget").unwrap();
    assert!(std::ptr::eq(entry.meta, Gadget::meta()));
}

#[test]
fn test_registry_recovers_after_panicking_registration() {
    let result = std::panic::catch_unwind(registry::register::<Broken>);
    assert!(result.is_err());

    registry::register::<Gadget>();
    assert_eq!(registry::lookup("Gadget").unwrap().meta.type_name, "Gadget");
    assert!(matches!(registry::lookup("Broken"), Err(GraphError::Configuration(_))));
    assert!(registry::constructor::<Gadget>().is_ok());
}
