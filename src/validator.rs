//! Structural validation of serialized values against schema fragments.

use serde_json::Value;

use crate::error::{ClientError, SchemaError};

/// Validate a value against a schema fragment.
///
/// Self references (`$ref: "#"`) inside a fragment resolve against the
/// fragment itself, not against the owning resource schema.
///
/// # Errors
///
/// Returns `ClientError::InvalidSchema` if the fragment does not compile, or
/// `ClientError::SchemaValidation` with every violation found.
pub fn validate(schema: &Value, value: &Value) -> Result<(), ClientError> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| ClientError::InvalidSchema {
            message: e.to_string(),
        })?;

    let errors: Vec<SchemaError> = validator
        .iter_errors(value)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ClientError::SchemaValidation { errors })
    }
}
