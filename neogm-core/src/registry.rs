//! Process-wide map from type discriminator to model constructor.
//!
//! Populated explicitly with [`register`] at start-up; entries are never
//! removed.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use tracing::{debug, warn};

use crate::error::GraphError;
use crate::graph::NodeRef;
use crate::meta::ModelMeta;
use crate::traits::{AnyModel, GraphModel};

/// Registered model type.
#[derive(Clone, Copy)]
pub struct ModelEntry {
    pub meta: &'static ModelMeta,
    pub wrap: fn(NodeRef) -> Box<dyn AnyModel>,
}

static REGISTRY: OnceLock<RwLock<HashMap<&'static str, ModelEntry>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<&'static str, ModelEntry>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn wrap<T: GraphModel>(node: NodeRef) -> Box<dyn AnyModel> {
    Box::new(T::from_node(node))
}

/// Register `T` under its type name. Registering twice is a no-op.
pub fn register<T: GraphModel>() {
    let mut map = registry().write().unwrap_or_else(|poisoned| {
        warn!(type_name = T::TYPE_NAME, "model registry lock poisoned; recovering");
        poisoned.into_inner()
    });
    map.entry(T::TYPE_NAME).or_insert_with(|| {
        debug!(type_name = T::TYPE_NAME, "registered model");
        ModelEntry { meta: T::meta(), wrap: wrap::<T> }
    });
}

/// Look up a registered type by discriminator.
pub fn lookup(type_name: &str) -> Result<ModelEntry, GraphError> {
    // entries are inserted whole, so a poisoned map is still consistent
    let map = registry().read().unwrap_or_else(|poisoned| poisoned.into_inner());
    map.get(type_name).copied().ok_or_else(|| {
        GraphError::configuration(format!(
            "model type '{type_name}' is not registered; call register::<{type_name}>() at start-up"
        ))
    })
}

/// The node constructor of `T`, provided `T` has been registered.
pub fn constructor<T: GraphModel>() -> Result<fn(NodeRef) -> T, GraphError> {
    lookup(T::TYPE_NAME)?;
    Ok(T::from_node)
}
