//! Table Schema Validator
//!
//! Decides whether a described table can back the cache.

use std::fmt;

use crate::store::{AttributeType, KeyRole, TableMetadata};
use crate::table::TableDescriptor;

// == Schema Violation ==
/// Why a described table was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    /// Key schema is not exactly one partition key
    InvalidKeySchema { elements: usize },
    /// Partition key has a different attribute name
    InvalidKeyName { expected: String, found: String },
    /// Partition key is not declared as a string
    InvalidKeyType { found: AttributeType },
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaViolation::InvalidKeySchema { elements } => write!(
                f,
                "InvalidKeySchema: expected a single partition key, found {} key element(s)",
                elements
            ),
            SchemaViolation::InvalidKeyName { expected, found } => write!(
                f,
                "InvalidKeyName: expected partition key '{}', found '{}'",
                expected, found
            ),
            SchemaViolation::InvalidKeyType { found } => write!(
                f,
                "InvalidKeyType: partition key must be of type S, found {}",
                found
            ),
        }
    }
}

// == Validate ==
/// Checks, in order, key arity and role, key name and key type.
///
/// The first failing rule determines the verdict.
pub fn validate(
    described: &TableMetadata,
    expected_partition_key: &str,
) -> Result<TableDescriptor, SchemaViolation> {
    let key = match described.key_schema.as_slice() {
        [only] if only.role == KeyRole::Partition => only,
        elements => {
            return Err(SchemaViolation::InvalidKeySchema {
                elements: elements.len(),
            })
        }
    };

    if key.attribute_name != expected_partition_key {
        return Err(SchemaViolation::InvalidKeyName {
            expected: expected_partition_key.to_string(),
            found: key.attribute_name.clone(),
        });
    }

    if key.attribute_type != AttributeType::String {
        return Err(SchemaViolation::InvalidKeyType {
            found: key.attribute_type,
        });
    }

    Ok(TableDescriptor::new(&described.name, &key.attribute_name))
}
