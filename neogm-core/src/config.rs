//! Runtime configuration of a [`Graph`](crate::Graph) handle.

/// Property names the mapper reserves on the nodes it writes, besides the
/// model key (always [`KEY_FIELD`](crate::naming::KEY_FIELD)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// Type discriminator used by `get_by_node` to pick the constructor.
    pub type_property: String,
    /// Key counter kept on each type's reference node.
    pub counter_property: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            type_property: "_type".to_owned(),
            counter_property: "_next_key".to_owned(),
        }
    }
}

impl GraphConfig {
    pub fn with_type_property(mut self, name: impl Into<String>) -> Self {
        self.type_property = name.into();
        self
    }

    pub fn with_counter_property(mut self, name: impl Into<String>) -> Self {
        self.counter_property = name.into();
        self
    }
}
