//! Error types for schema interpretation, link execution and transport.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the client core and its default collaborators.
#[derive(Debug, Error)]
pub enum ClientError {
    // Schema errors (exit code 2)
    #[error("schema validation failed with {} error(s)", errors.len())]
    SchemaValidation { errors: Vec<SchemaError> },

    #[error("no oneOf variant matched ({} tried)", causes.len())]
    OneOfVariant { causes: Vec<ClientError> },

    #[error("expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("malformed route '{path}': {message}")]
    MalformedRoute { path: String, message: String },

    // Call errors (exit code 1)
    #[error("expected at most {expected} positional argument(s), got {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("resource '{resource}' has no link '{rel}'")]
    UnknownLink { resource: String, rel: String },

    #[error("resource '{resource}' has no property '{name}'")]
    UnknownProperty { resource: String, name: String },

    #[error("property '{name}' is read-only")]
    ReadOnlyProperty { name: String },

    #[error("link '{method} {path}' returns an object and must be bound to an instance")]
    UnboundObjectLink { method: String, path: String },

    #[error("link returns {actual}, not {expected}")]
    WrongShape {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("no resource type registered for '{uri}'")]
    UnknownResource { uri: String },

    // Transport errors (exit code 3)
    #[error("request failed with status {status}: {body}")]
    Transport { status: u16, body: String },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ClientError::Transport { .. }
            | ClientError::InvalidUrl { .. }
            | ClientError::FileNotFound { .. }
            | ClientError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            ClientError::Network { .. } => 3,
            ClientError::Arity { .. }
            | ClientError::UnknownLink { .. }
            | ClientError::UnknownProperty { .. }
            | ClientError::ReadOnlyProperty { .. }
            | ClientError::UnboundObjectLink { .. }
            | ClientError::WrongShape { .. }
            | ClientError::UnknownResource { .. } => 1,
            _ => 2,
        }
    }

    /// HTTP status carried by a transport error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn type_mismatch(expected: impl Into<String>, actual: &serde_json::Value) -> Self {
        ClientError::TypeMismatch {
            expected: expected.into(),
            actual: crate::types::json_type_name(actual).to_string(),
        }
    }
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exit_codes() {
        let err = ClientError::Transport {
            status: 404,
            body: "{}".into(),
        };
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.status(), Some(404));

        let err = ClientError::Arity {
            expected: 1,
            actual: 2,
        };
        assert_eq!(err.exit_code(), 1);

        let err = ClientError::OneOfVariant { causes: vec![] };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn one_of_display_counts_causes() {
        let err = ClientError::OneOfVariant {
            causes: vec![
                ClientError::type_mismatch("string", &json!([1])),
                ClientError::type_mismatch("integer", &json!([1])),
            ],
        };
        assert_eq!(err.to_string(), "no oneOf variant matched (2 tried)");
    }

    #[test]
    fn schema_error_display() {
        let err = SchemaError {
            path: "/name".into(),
            message: "123 is not of type \"string\"".into(),
        };
        assert_eq!(err.to_string(), "/name: 123 is not of type \"string\"");
    }
}
