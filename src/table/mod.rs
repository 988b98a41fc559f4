//! Table Module
//!
//! Validation and lazy resolution of the table that backs the cache.

mod resolver;
mod validator;

pub use resolver::{ResolverPhase, TableResolver};
pub use validator::{validate, SchemaViolation};

// == Table Descriptor ==
/// A validated binding to the backing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Table name
    pub name: String,
    /// Attribute items are addressed by
    pub partition_key_attribute: String,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, partition_key_attribute: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key_attribute: partition_key_attribute.into(),
        }
    }
}
