//! Schema attributes: typed views over JSON Schema fragments.
//!
//! A fragment is classified once, when the attribute is built:
//!
//! | Fragment has | Kind |
//! |--------------|------|
//! | `properties` | [`AttributeKind::Object`] |
//! | `items` | [`AttributeKind::List`] |
//! | `oneOf` | [`AttributeKind::OneOf`] |
//! | otherwise | [`AttributeKind::Scalar`] from `type` (default `object`) |
//!
//! Attributes convert in two directions: [`SchemaAttribute::serialize`] turns
//! client values into wire values, [`SchemaAttribute::resolve`] turns wire
//! values back into client values.

use std::borrow::Cow;

use serde_json::{json, Map, Value};

use crate::client::Client;
use crate::error::ClientError;
use crate::keys::KeyResolvers;
use crate::types::{types_for, JsonType, SENTINEL};
use crate::validator;

/// The shape an attribute was classified into.
#[derive(Debug, Clone)]
pub enum AttributeKind {
    Scalar {
        types: Vec<JsonType>,
        /// Whether `type` was spelled out; only then is it checked on resolve.
        explicit: bool,
    },
    Object {
        /// Declared properties in declaration order.
        properties: Vec<(String, SchemaAttribute)>,
        additional_properties: bool,
        types: Vec<JsonType>,
    },
    List {
        element: Box<SchemaAttribute>,
        nullable: bool,
    },
    OneOf {
        variants: Vec<SchemaAttribute>,
    },
}

/// A classified schema fragment.
#[derive(Debug, Clone)]
pub struct SchemaAttribute {
    kind: AttributeKind,
    read_only: bool,
    doc: Option<String>,
    fragment: Value,
}

impl SchemaAttribute {
    /// Classify a schema fragment.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidSchema` if the fragment (or a nested one)
    /// is not an object, or if `items`/`oneOf` have the wrong shape.
    pub fn from_fragment(fragment: &Value) -> Result<Self, ClientError> {
        let Some(map) = fragment.as_object() else {
            return Err(ClientError::InvalidSchema {
                message: format!("expected schema object, got {}", fragment),
            });
        };

        let kind = if let Some(props) = map.get("properties") {
            let props = props.as_object().ok_or_else(|| ClientError::InvalidSchema {
                message: "properties must be an object".to_string(),
            })?;
            let properties = props
                .iter()
                .map(|(name, prop)| Ok((name.clone(), SchemaAttribute::from_fragment(prop)?)))
                .collect::<Result<Vec<_>, ClientError>>()?;
            AttributeKind::Object {
                properties,
                additional_properties: match map.get("additionalProperties") {
                    Some(Value::Bool(b)) => *b,
                    Some(Value::Object(_)) => true,
                    _ => false,
                },
                types: types_for(fragment),
            }
        } else if let Some(items) = map.get("items") {
            AttributeKind::List {
                element: Box::new(SchemaAttribute::from_fragment(items)?),
                nullable: types_for(fragment).contains(&JsonType::Null),
            }
        } else if let Some(one_of) = map.get("oneOf") {
            let alternatives = one_of.as_array().ok_or_else(|| ClientError::InvalidSchema {
                message: "oneOf must be an array".to_string(),
            })?;
            AttributeKind::OneOf {
                variants: alternatives
                    .iter()
                    .map(SchemaAttribute::from_fragment)
                    .collect::<Result<_, _>>()?,
            }
        } else {
            AttributeKind::Scalar {
                types: types_for(fragment),
                explicit: map.contains_key("type"),
            }
        };

        Ok(Self {
            kind,
            read_only: map.get("readOnly").and_then(Value::as_bool).unwrap_or(false),
            doc: map
                .get("description")
                .or_else(|| map.get("title"))
                .and_then(Value::as_str)
                .map(String::from),
            fragment: fragment.clone(),
        })
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// The fragment this attribute was built from.
    pub fn fragment(&self) -> &Value {
        &self.fragment
    }

    /// Declared property attribute, for object attributes.
    pub fn property(&self, name: &str) -> Option<&SchemaAttribute> {
        match &self.kind {
            AttributeKind::Object { properties, .. } => properties
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, attr)| attr),
            _ => None,
        }
    }

    /// The declared type set. A union reports the ordered union of its variants.
    pub fn types(&self) -> Vec<JsonType> {
        match &self.kind {
            AttributeKind::Scalar { types, .. } | AttributeKind::Object { types, .. } => {
                types.clone()
            }
            AttributeKind::List { nullable, .. } => {
                let mut types = vec![JsonType::Array];
                if *nullable {
                    types.push(JsonType::Null);
                }
                types
            }
            AttributeKind::OneOf { variants } => {
                let mut seen = Vec::new();
                for t in variants.iter().flat_map(SchemaAttribute::types) {
                    if !seen.contains(&t) {
                        seen.push(t);
                    }
                }
                seen
            }
        }
    }

    /// Whether the type set admits `null`.
    pub fn nullable(&self) -> bool {
        self.types().contains(&JsonType::Null)
    }

    /// Value used when a field is unset.
    pub fn empty_value(&self) -> Value {
        if self.read_only || self.nullable() {
            return Value::Null;
        }
        match &self.kind {
            AttributeKind::List { .. } => json!([]),
            _ if self.types().contains(&JsonType::Object) => json!({}),
            _ => Value::Null,
        }
    }

    /// Convert a client value into its wire form and validate it.
    ///
    /// `null` becomes [`SchemaAttribute::empty_value`] without validation.
    pub fn serialize(&self, value: &Value, keys: &KeyResolvers) -> Result<Value, ClientError> {
        self.serialize_with(value, keys, true)
    }

    /// Like [`SchemaAttribute::serialize`], without structural validation.
    pub fn serialize_unchecked(
        &self,
        value: &Value,
        keys: &KeyResolvers,
    ) -> Result<Value, ClientError> {
        self.serialize_with(value, keys, false)
    }

    fn serialize_with(
        &self,
        value: &Value,
        keys: &KeyResolvers,
        validate: bool,
    ) -> Result<Value, ClientError> {
        if value.is_null() {
            return Ok(self.empty_value());
        }

        let out = match &self.kind {
            AttributeKind::Scalar { types, .. } => coerce(types, value)?,
            AttributeKind::Object {
                properties,
                additional_properties,
                ..
            } => serialize_object(properties, *additional_properties, value, keys, validate)?,
            AttributeKind::List { element, .. } => {
                let items = value
                    .as_array()
                    .ok_or_else(|| ClientError::type_mismatch("array", value))?;
                let out = items
                    .iter()
                    .map(|item| element.serialize_with(item, keys, validate))
                    .collect::<Result<Vec<_>, _>>()?;
                // elements were validated individually
                return Ok(Value::Array(out));
            }
            AttributeKind::OneOf { variants } => {
                let mut causes = Vec::with_capacity(variants.len());
                for variant in variants {
                    match variant.serialize_with(value, keys, validate) {
                        Ok(out) => return Ok(out),
                        Err(e) => causes.push(e),
                    }
                }
                if self.nullable() {
                    return Ok(Value::Null);
                }
                return Err(ClientError::OneOfVariant { causes });
            }
        };

        if validate {
            validator::validate(&self.fragment, &out)?;
        }
        Ok(out)
    }

    /// Convert a wire value into its client form.
    ///
    /// `null` becomes [`SchemaAttribute::empty_value`].
    pub fn resolve(&self, value: &Value, client: &Client) -> Result<Value, ClientError> {
        if value.is_null() {
            return Ok(self.empty_value());
        }

        match &self.kind {
            AttributeKind::Scalar { types, explicit } => {
                if !*explicit || types.iter().any(|t| t.matches(value)) {
                    Ok(value.clone())
                } else {
                    Err(ClientError::type_mismatch(type_names(types), value))
                }
            }
            AttributeKind::Object { properties, .. } => {
                if let Some((key, _)) = properties.first().filter(|(k, _)| k.starts_with(SENTINEL))
                {
                    return match client.key_resolvers().for_key(key) {
                        Some(resolver) => resolver.resolve(value, client),
                        None => Ok(value.clone()),
                    };
                }
                let map = value
                    .as_object()
                    .ok_or_else(|| ClientError::type_mismatch("object", value))?;
                let mut out = map.clone();
                for (name, attr) in properties {
                    if let Some(raw) = map.get(name) {
                        out.insert(name.clone(), attr.resolve(raw, client)?);
                    }
                }
                Ok(Value::Object(out))
            }
            AttributeKind::List { element, .. } => {
                let items = value
                    .as_array()
                    .ok_or_else(|| ClientError::type_mismatch("array", value))?;
                items
                    .iter()
                    .map(|item| element.resolve(item, client))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            AttributeKind::OneOf { variants } => {
                let mut causes = Vec::with_capacity(variants.len());
                for variant in variants {
                    match variant.resolve(value, client) {
                        Ok(out) => return Ok(out),
                        Err(e) => causes.push(e),
                    }
                }
                Err(ClientError::OneOfVariant { causes })
            }
        }
    }
}

fn serialize_object(
    properties: &[(String, SchemaAttribute)],
    additional_properties: bool,
    value: &Value,
    keys: &KeyResolvers,
    validate: bool,
) -> Result<Value, ClientError> {
    let input: Cow<'_, Map<String, Value>> = match value {
        Value::Object(map) => Cow::Borrowed(map),
        // a bare value stands in for the single special key, e.g. a date string
        other => match properties.first() {
            Some((key, _)) if key.starts_with(SENTINEL) => {
                let mut wrapped = Map::new();
                wrapped.insert(key.clone(), other.clone());
                Cow::Owned(wrapped)
            }
            _ => return Err(ClientError::type_mismatch("object", other)),
        },
    };

    let names: Vec<&String> = if additional_properties {
        input.keys().collect()
    } else {
        properties.iter().map(|(name, _)| name).collect()
    };

    let mut out = Map::new();
    for key in names {
        let serialized = if key.starts_with(SENTINEL) {
            keys.serialize_key(key, &input)?
        } else {
            let raw = input.get(key.as_str()).unwrap_or(&Value::Null);
            match properties.iter().find(|(name, _)| name == key) {
                Some((_, attr)) => Some(attr.serialize_with(raw, keys, validate)?),
                None => Some(raw.clone()),
            }
        };
        if let Some(v) = serialized.filter(|v| !v.is_null()) {
            out.insert(key.clone(), v);
        }
    }
    Ok(Value::Object(out))
}

/// Coerce a value to the first declared type, losslessly.
fn coerce(types: &[JsonType], value: &Value) -> Result<Value, ClientError> {
    let Some(primary) = types.first() else {
        return Ok(value.clone());
    };
    if *primary == JsonType::Integer && value.is_f64() && primary.matches(value) {
        return match value.as_f64() {
            Some(f) if (i64::MIN as f64..i64::MAX as f64).contains(&f) => Ok(json!(f as i64)),
            _ => Err(ClientError::type_mismatch(type_names(types), value)),
        };
    }
    if types.iter().any(|t| t.matches(value)) {
        Ok(value.clone())
    } else {
        Err(ClientError::type_mismatch(type_names(types), value))
    }
}

fn type_names(types: &[JsonType]) -> String {
    types
        .iter()
        .map(JsonType::as_str)
        .collect::<Vec<_>>()
        .join("|")
}
