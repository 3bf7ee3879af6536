//! URI templates with named path parameters.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ClientError;
use crate::resource::Resource;

/// A URI template such as `/user/{id}/posts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    path: String,
    keys: Vec<String>,
}

impl Route {
    /// Parse a template, collecting `{name}` parameters in order.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::MalformedRoute` for unbalanced braces or an empty
    /// parameter name.
    pub fn parse(path: &str) -> Result<Self, ClientError> {
        let malformed = |message: &str| ClientError::MalformedRoute {
            path: path.to_string(),
            message: message.to_string(),
        };

        let mut keys: Vec<String> = Vec::new();
        let mut current: Option<String> = None;
        for c in path.chars() {
            match (c, current.as_mut()) {
                ('{', None) => current = Some(String::new()),
                ('{', Some(_)) => return Err(malformed("nested '{'")),
                ('}', None) => return Err(malformed("unmatched '}'")),
                ('}', Some(_)) => {
                    let name = current.take().unwrap_or_default();
                    if name.is_empty() {
                        return Err(malformed("empty parameter name"));
                    }
                    if !keys.contains(&name) {
                        keys.push(name);
                    }
                }
                (c, Some(name)) => name.push(c),
                (_, None) => {}
            }
        }
        if current.is_some() {
            return Err(malformed("unclosed '{'"));
        }

        Ok(Self {
            path: path.to_string(),
            keys,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// A route with path parameters addresses a single entity.
    pub fn is_instance(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Current value of every path parameter on `resource`; unset is `""`.
    ///
    /// `id` reads the resource identity. Other keys read the cached raw field
    /// and never trigger a fetch.
    pub fn extract_keys(&self, resource: &Resource) -> BTreeMap<String, String> {
        self.keys
            .iter()
            .map(|key| {
                let value = if key == "id" {
                    resource.id()
                } else {
                    resource.raw(key).and_then(|v| path_value(&v))
                };
                (key.clone(), value.unwrap_or_default())
            })
            .collect()
    }

    /// Fill the template with the current values on `resource`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::MalformedRoute` if a parameter has no value.
    pub fn expand_for(&self, resource: &Resource) -> Result<String, ClientError> {
        let values = self.extract_keys(resource);
        if let Some((key, _)) = values.iter().find(|(_, value)| value.is_empty()) {
            return Err(ClientError::MalformedRoute {
                path: self.path.clone(),
                message: format!("no value for parameter '{}'", key),
            });
        }
        Ok(self.expand(&values))
    }

    /// Fill the template. Parameters missing from `values` expand to `""`.
    pub fn expand(&self, values: &BTreeMap<String, String>) -> String {
        let mut out = String::with_capacity(self.path.len());
        let mut current: Option<String> = None;
        for c in self.path.chars() {
            match (c, current.as_mut()) {
                ('{', None) => current = Some(String::new()),
                ('}', Some(_)) => {
                    let name = current.take().unwrap_or_default();
                    if let Some(value) = values.get(&name) {
                        out.push_str(value);
                    }
                }
                (c, Some(name)) => name.push(c),
                (c, None) => out.push(c),
            }
        }
        out
    }
}

fn path_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
