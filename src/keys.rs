//! Resolvers for reserved `$`-prefixed keys.
//!
//! Object attributes hand any property whose name starts with `$` to the
//! resolver registered for that name. Keys without a resolver pass through
//! unchanged.
//!
//! | Key | Wire form | Resolved form |
//! |-----|-----------|---------------|
//! | `$date` | `{"$date": 1577836800000}` | `"2020-01-01T00:00:00.000Z"` |
//! | `$ref` | `{"$ref": "/user/1"}` | `{"$ref": "/user/1"}`, fragment refs made absolute |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::client::Client;
use crate::error::ClientError;
use crate::types::URI_KEY;

/// Handler for one reserved key.
pub trait KeyResolver: Send + Sync {
    /// Produce the wire value for this key from the object being serialized.
    ///
    /// `Ok(None)` omits the key.
    fn serialize(&self, container: &Map<String, Value>) -> Result<Option<Value>, ClientError>;

    /// Turn a wire value (the whole object carrying the key) into its
    /// client-side form.
    fn resolve(&self, value: &Value, client: &Client) -> Result<Value, ClientError>;
}

/// Registry of key resolvers, shared by a client and its resource types.
#[derive(Clone, Default)]
pub struct KeyResolvers {
    resolvers: HashMap<String, Arc<dyn KeyResolver>>,
}

impl KeyResolvers {
    /// An empty registry: every key passes through.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The registry with the `$date` and `$ref` resolvers installed.
    pub fn with_defaults() -> Self {
        let mut resolvers = Self::empty();
        resolvers.register("$date", DateResolver);
        resolvers.register("$ref", RefResolver);
        resolvers
    }

    pub fn register(&mut self, key: impl Into<String>, resolver: impl KeyResolver + 'static) {
        self.resolvers.insert(key.into(), Arc::new(resolver));
    }

    pub fn for_key(&self, key: &str) -> Option<&dyn KeyResolver> {
        self.resolvers.get(key).map(|r| r.as_ref())
    }

    /// Serialize `key` out of `container`, falling back to the raw value.
    pub fn serialize_key(
        &self,
        key: &str,
        container: &Map<String, Value>,
    ) -> Result<Option<Value>, ClientError> {
        match self.for_key(key) {
            Some(resolver) => resolver.serialize(container),
            None => Ok(container.get(key).cloned()),
        }
    }
}

impl fmt::Debug for KeyResolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.resolvers.keys().collect();
        keys.sort();
        f.debug_struct("KeyResolvers").field("keys", &keys).finish()
    }
}

/// `$date`: epoch milliseconds on the wire, RFC 3339 on the client.
#[derive(Debug, Clone, Copy)]
pub struct DateResolver;

impl KeyResolver for DateResolver {
    fn serialize(&self, container: &Map<String, Value>) -> Result<Option<Value>, ClientError> {
        match container.get("$date") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => {
                let millis = n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .ok_or_else(|| ClientError::type_mismatch("epoch milliseconds", &json!(n)))?;
                Ok(Some(json!(millis)))
            }
            Some(Value::String(s)) => {
                let parsed = DateTime::parse_from_rfc3339(s).map_err(|e| {
                    ClientError::TypeMismatch {
                        expected: "RFC 3339 timestamp".to_string(),
                        actual: format!("'{}' ({})", s, e),
                    }
                })?;
                Ok(Some(json!(parsed.timestamp_millis())))
            }
            Some(other) => Err(ClientError::type_mismatch("$date", other)),
        }
    }

    fn resolve(&self, value: &Value, _client: &Client) -> Result<Value, ClientError> {
        let Some(millis) = value.get("$date") else {
            return Ok(value.clone());
        };
        let millis = millis
            .as_i64()
            .ok_or_else(|| ClientError::type_mismatch("epoch milliseconds", millis))?;
        let date = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
            ClientError::TypeMismatch {
                expected: "timestamp in range".to_string(),
                actual: millis.to_string(),
            }
        })?;
        Ok(Value::String(
            date.to_rfc3339_opts(SecondsFormat::Millis, true),
        ))
    }
}

/// `$ref`: references to other resources.
#[derive(Debug, Clone, Copy)]
pub struct RefResolver;

impl KeyResolver for RefResolver {
    fn serialize(&self, container: &Map<String, Value>) -> Result<Option<Value>, ClientError> {
        match container.get("$ref") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(uri)) => Ok(Some(Value::String(uri.clone()))),
            // an embedded instance stands in for its own reference
            Some(Value::Object(instance)) => match instance.get(URI_KEY) {
                Some(Value::String(uri)) => Ok(Some(Value::String(uri.clone()))),
                _ => Err(ClientError::TypeMismatch {
                    expected: "reference URI".to_string(),
                    actual: "object without $uri".to_string(),
                }),
            },
            Some(other) => Err(ClientError::type_mismatch("reference URI", other)),
        }
    }

    fn resolve(&self, value: &Value, client: &Client) -> Result<Value, ClientError> {
        match value.get("$ref").and_then(Value::as_str) {
            Some(reference) if reference.starts_with('#') => {
                let base = url::Url::parse(client.base_url()).map_err(|source| {
                    ClientError::InvalidUrl {
                        url: client.base_url().to_string(),
                        source,
                    }
                })?;
                let joined = base
                    .join(reference)
                    .map_err(|source| ClientError::InvalidUrl {
                        url: reference.to_string(),
                        source,
                    })?;
                Ok(json!({ "$ref": joined.as_str() }))
            }
            _ => Ok(value.clone()),
        }
    }
}
