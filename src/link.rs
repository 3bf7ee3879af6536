//! Links: executable remote operations declared by a hypermedia schema.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::attribute::{AttributeKind, SchemaAttribute};
use crate::client::Client;
use crate::error::ClientError;
use crate::resource::{Resource, ResourceType};
use crate::route::Route;
use crate::transport::{Request, Response, TransportOptions};
use crate::types::{is_self_ref, types_for, JsonType, ReturnShape};

/// How positional call arguments become the request body.
#[derive(Debug, Clone)]
pub enum InputShape {
    /// No `schema`: the call takes no positional arguments.
    None,
    /// A sequence; each argument is one element.
    List(Option<SchemaAttribute>),
    /// One object argument.
    Object(SchemaAttribute),
    /// One argument shaped like the owning resource (`$ref: "#"`).
    SelfRef,
    /// One primitive argument.
    Scalar(SchemaAttribute),
}

/// What a link's response body is.
#[derive(Debug, Clone)]
pub enum Output {
    None,
    /// The owning resource's own schema (`$ref: "#"`).
    SelfRef,
    Schema(SchemaAttribute),
}

/// What a link is called on.
#[derive(Debug, Clone)]
pub enum Binding {
    Instance(Resource),
    Type {
        resource_type: Arc<ResourceType>,
        client: Client,
    },
}

impl Binding {
    pub fn client(&self) -> &Client {
        match self {
            Binding::Instance(resource) => resource.client(),
            Binding::Type { client, .. } => client,
        }
    }

    pub fn resource_type(&self) -> &Arc<ResourceType> {
        match self {
            Binding::Instance(resource) => resource.resource_type(),
            Binding::Type { resource_type, .. } => resource_type,
        }
    }

    pub fn instance(&self) -> Option<&Resource> {
        match self {
            Binding::Instance(resource) => Some(resource),
            Binding::Type { .. } => None,
        }
    }
}

/// A positional call argument.
#[derive(Debug, Clone)]
pub enum Arg {
    Value(Value),
    /// Sent as its writable projection.
    Resource(Resource),
}

impl Arg {
    fn to_value(&self) -> Result<Value, ClientError> {
        match self {
            Arg::Value(v) => Ok(v.clone()),
            Arg::Resource(r) => r.valid_instance().map(Value::Object),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<Resource> for Arg {
    fn from(resource: Resource) -> Self {
        Arg::Resource(resource)
    }
}

impl From<&Resource> for Arg {
    fn from(resource: &Resource) -> Self {
        Arg::Resource(resource.clone())
    }
}

/// One remote operation.
#[derive(Debug, Clone)]
pub struct Link {
    rel: String,
    route: Arc<Route>,
    method: String,
    input: InputShape,
    input_properties: Vec<(String, SchemaAttribute)>,
    output: Output,
    shape: ReturnShape,
    options: TransportOptions,
    doc: Option<String>,
}

impl Link {
    /// Build a link from one entry of a schema's `links` array.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidSchema` if `schema` or `targetSchema`
    /// cannot be classified.
    pub fn from_description(
        route: Arc<Route>,
        description: &Value,
        options: &TransportOptions,
    ) -> Result<Self, ClientError> {
        let rel = description
            .get("rel")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::InvalidSchema {
                message: format!("link to '{}' has no rel", route.path()),
            })?
            .to_string();
        let method = description
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_ascii_uppercase();

        let schema = description.get("schema").filter(|s| !is_empty_schema(s));
        let target = description.get("targetSchema").filter(|s| !is_empty_schema(s));

        let input = match schema {
            None => InputShape::None,
            Some(s) => input_shape(s)?,
        };
        let input_properties = match schema.map(SchemaAttribute::from_fragment).transpose()? {
            Some(attr) => match attr.kind() {
                AttributeKind::Object { properties, .. } => properties.clone(),
                _ => Vec::new(),
            },
            None => Vec::new(),
        };

        let output = match target {
            None => Output::None,
            Some(t) if is_self_ref(t) => Output::SelfRef,
            Some(t) => Output::Schema(SchemaAttribute::from_fragment(t)?),
        };

        Ok(Self {
            rel,
            route,
            method,
            input,
            input_properties,
            output,
            shape: ReturnShape::from_target_schema(target),
            options: options.clone(),
            doc: ["doc", "description", "title"]
                .iter()
                .find_map(|k| description.get(*k).and_then(Value::as_str))
                .map(String::from),
        })
    }

    pub fn rel(&self) -> &str {
        &self.rel
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn input(&self) -> &InputShape {
        &self.input
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    pub fn shape(&self) -> ReturnShape {
        self.shape
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Attribute of a declared input property, used for per-property arguments.
    pub fn input_property(&self, name: &str) -> Option<&SchemaAttribute> {
        self.input_properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, attr)| attr)
    }

    pub fn input_property_names(&self) -> impl Iterator<Item = &str> {
        self.input_properties.iter().map(|(name, _)| name.as_str())
    }

    /// Arguments encoded in a query string, e.g. from a pagination link.
    ///
    /// Values of string-typed input properties stay text; everything else is
    /// decoded as in [`params_from_query`].
    pub fn decode_query(&self, query: &str) -> Map<String, Value> {
        url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| {
                let text = self
                    .input_property(&k)
                    .is_some_and(|attr| attr.types().contains(&JsonType::String));
                let value = if text {
                    Value::String(v.to_string())
                } else {
                    decode_query_value(&v)
                };
                (k.to_string(), value)
            })
            .collect()
    }

    /// Absolute URL for a call on `binding`, without trailing slash.
    pub fn url(&self, binding: &Binding) -> Result<String, ClientError> {
        let path = match binding {
            Binding::Instance(resource) => self.route.expand_for(resource)?,
            Binding::Type { .. } if self.route.is_instance() => {
                return Err(ClientError::MalformedRoute {
                    path: self.route.path().to_string(),
                    message: format!(
                        "parameters {:?} need an instance binding",
                        self.route.keys()
                    ),
                });
            }
            Binding::Type { .. } => self.route.path().to_string(),
        };

        let mut url = format!("{}{}", binding.client().base_url(), path);
        if url.ends_with('/') {
            url.pop();
        }
        Ok(url)
    }

    /// Request body for the given positional arguments.
    pub fn body(&self, positional: &[Arg], binding: &Binding) -> Result<Option<Value>, ClientError> {
        let keys = binding.client().key_resolvers();
        let single = |n: usize| {
            if n > 1 {
                Err(ClientError::Arity {
                    expected: 1,
                    actual: n,
                })
            } else {
                Ok(())
            }
        };

        match &self.input {
            InputShape::None if positional.is_empty() => Ok(None),
            InputShape::None => Err(ClientError::Arity {
                expected: 0,
                actual: positional.len(),
            }),
            InputShape::List(element) => {
                let items = positional
                    .iter()
                    .map(|arg| {
                        let value = arg.to_value()?;
                        match element {
                            Some(attr) => attr.serialize(&value, keys),
                            None => Ok(value),
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(Value::Array(items)))
            }
            InputShape::Object(attr) | InputShape::Scalar(attr) => {
                single(positional.len())?;
                positional
                    .first()
                    .map(|arg| attr.serialize(&arg.to_value()?, keys))
                    .transpose()
            }
            InputShape::SelfRef => {
                single(positional.len())?;
                positional.first().map(Arg::to_value).transpose()
            }
        }
    }

    /// Perform the call and hand the response to `handler`.
    ///
    /// # Errors
    ///
    /// Propagates URL, body and transport errors; a non-2xx status is
    /// `ClientError::Transport`.
    pub fn execute<T>(
        &self,
        binding: &Binding,
        args: &Map<String, Value>,
        positional: &[Arg],
        handler: impl FnOnce(Response) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        let client = binding.client();
        let _entered = client.span().enter();

        let request = Request {
            method: self.method.clone(),
            url: self.url(binding)?,
            query: query_params(args),
            body: self.body(positional, binding)?,
            options: self.options.clone(),
        };
        tracing::debug!(
            rel = %self.rel,
            method = %request.method,
            url = %request.url,
            "executing link"
        );

        let response = client.transport().execute(&request)?;
        if !response.is_success() {
            tracing::debug!(status = response.status, url = %request.url, "request failed");
            return Err(ClientError::Transport {
                status: response.status,
                body: response.body,
            });
        }
        handler(response)
    }
}

/// Query pairs from accumulated arguments. Strings go verbatim, other values
/// as JSON text; nulls are dropped.
pub fn query_params(args: &Map<String, Value>) -> Vec<(String, String)> {
    args.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect()
}

/// Inverse of [`query_params`]: JSON where it parses, strings otherwise.
pub fn params_from_query(query: &str) -> Map<String, Value> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.to_string(), decode_query_value(&v)))
        .collect()
}

fn decode_query_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn is_empty_schema(schema: &Value) -> bool {
    schema.as_object().map_or(true, Map::is_empty)
}

fn input_shape(schema: &Value) -> Result<InputShape, ClientError> {
    if is_self_ref(schema) {
        return Ok(InputShape::SelfRef);
    }
    if schema.get("type").is_none() {
        return Ok(InputShape::Object(SchemaAttribute::from_fragment(schema)?));
    }
    let shape = match types_for(schema).first() {
        Some(JsonType::Array) => InputShape::List(
            schema
                .get("items")
                .map(SchemaAttribute::from_fragment)
                .transpose()?,
        ),
        Some(JsonType::Object) | None => InputShape::Object(SchemaAttribute::from_fragment(schema)?),
        Some(JsonType::Null) => InputShape::None,
        Some(_) => InputShape::Scalar(SchemaAttribute::from_fragment(schema)?),
    };
    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientOptions;
    use crate::transport::testing::ScriptedTransport;
    use serde_json::json;

    fn user_type() -> Arc<ResourceType> {
        Arc::new(
            ResourceType::from_schema(
                "user",
                &json!({
                    "properties": {
                        "$uri": { "type": "string", "readOnly": true },
                        "name": { "type": "string" }
                    },
                    "links": [
                        { "rel": "self", "href": "/user/{id}", "method": "GET", "targetSchema": { "$ref": "#" } }
                    ]
                }),
                &TransportOptions::default(),
            )
            .unwrap(),
        )
    }

    fn binding(transport: ScriptedTransport) -> Binding {
        Binding::Type {
            resource_type: user_type(),
            client: Client::with_transport(ClientOptions::new("http://api.test/"), transport),
        }
    }

    fn link(description: Value) -> Link {
        let href = description["href"].as_str().unwrap();
        let route = Arc::new(Route::parse(href).unwrap());
        Link::from_description(route, &description, &TransportOptions::default()).unwrap()
    }

    #[test]
    fn reads_description() {
        let l = link(json!({
            "rel": "instances",
            "href": "/user",
            "method": "get",
            "schema": { "type": "object", "properties": { "page": { "type": "integer" } } },
            "targetSchema": { "type": "array", "items": { "$ref": "#" } },
            "doc": "List users"
        }));
        assert_eq!(l.rel(), "instances");
        assert_eq!(l.method(), "GET");
        assert_eq!(l.shape(), ReturnShape::List);
        assert_eq!(l.doc(), Some("List users"));
        assert!(l.input_property("page").is_some());
        assert_eq!(l.input_property_names().collect::<Vec<_>>(), vec!["page"]);
        assert!(matches!(l.input(), InputShape::Object(_)));
    }

    #[test]
    fn missing_target_schema_is_void() {
        let l = link(json!({ "rel": "destroy", "href": "/user/{id}", "method": "DELETE" }));
        assert_eq!(l.shape(), ReturnShape::Void);
        assert!(matches!(l.input(), InputShape::None));
        assert!(matches!(l.output(), Output::None));
    }

    #[test]
    fn url_strips_trailing_slash() {
        let l = link(json!({ "rel": "root", "href": "/", "method": "GET" }));
        let b = binding(ScriptedTransport::new());
        // base "http://api.test/" is normalized, "/" path then stripped
        assert_eq!(l.url(&b).unwrap(), "http://api.test");
    }

    #[test]
    fn url_on_type_with_parameters_is_malformed() {
        let l = link(json!({ "rel": "self", "href": "/user/{id}", "method": "GET" }));
        let result = l.url(&binding(ScriptedTransport::new()));
        assert!(matches!(result, Err(ClientError::MalformedRoute { .. })));
    }

    #[test]
    fn object_input_takes_one_argument() {
        let l = link(json!({
            "rel": "create",
            "href": "/user",
            "method": "POST",
            "schema": { "type": "object", "properties": { "name": { "type": "string" } } },
            "targetSchema": { "$ref": "#" }
        }));
        let b = binding(ScriptedTransport::new());

        assert_eq!(l.body(&[], &b).unwrap(), None);
        assert_eq!(
            l.body(&[json!({ "name": "x", "junk": 1 }).into()], &b).unwrap(),
            Some(json!({ "name": "x" }))
        );
        assert!(matches!(
            l.body(&[json!({}).into(), json!({}).into()], &b),
            Err(ClientError::Arity { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn scalar_input_is_coerced() {
        let l = link(json!({
            "rel": "rate",
            "href": "/user/{id}/rate",
            "method": "POST",
            "schema": { "type": "integer" }
        }));
        let b = binding(ScriptedTransport::new());
        assert_eq!(l.body(&[json!(4.0).into()], &b).unwrap(), Some(json!(4)));
        assert!(matches!(
            l.body(&[json!("four").into()], &b),
            Err(ClientError::TypeMismatch { .. })
        ));
        assert!(matches!(
            l.body(&[json!(1).into(), json!(2).into()], &b),
            Err(ClientError::Arity { .. })
        ));
    }

    #[test]
    fn list_input_serializes_each_argument() {
        let l = link(json!({
            "rel": "tag",
            "href": "/user/{id}/tags",
            "method": "POST",
            "schema": { "type": "array", "items": { "type": "string" } }
        }));
        let b = binding(ScriptedTransport::new());
        assert_eq!(
            l.body(&[json!("a").into(), json!("b").into()], &b).unwrap(),
            Some(json!(["a", "b"]))
        );
    }

    #[test]
    fn no_input_rejects_arguments() {
        let l = link(json!({ "rel": "destroy", "href": "/user/{id}", "method": "DELETE" }));
        let b = binding(ScriptedTransport::new());
        assert!(matches!(
            l.body(&[json!(1).into()], &b),
            Err(ClientError::Arity { expected: 0, actual: 1 })
        ));
    }

    #[test]
    fn execute_sends_query_and_reports_status() {
        let transport = ScriptedTransport::new()
            .respond(crate::transport::Response::json_body(404, &json!({ "message": "nope" })));
        let b = binding(transport.clone());
        let l = link(json!({ "rel": "instances", "href": "/user", "method": "GET" }));

        let mut args = Map::new();
        args.insert("where".to_string(), json!({ "name": "x" }));
        args.insert("sort".to_string(), json!("name"));
        let result = l.execute(&b, &args, &[], |r| r.json());

        assert!(matches!(result, Err(ClientError::Transport { status: 404, .. })));
        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "http://api.test/user");
        assert_eq!(sent.query_param("where"), Some(r#"{"name":"x"}"#));
        assert_eq!(sent.query_param("sort"), Some("name"));
        assert_eq!(sent.body, None);
    }

    #[test]
    fn decode_query_keeps_string_properties_as_text() {
        let l = link(json!({
            "rel": "instances",
            "href": "/user",
            "method": "GET",
            "schema": {
                "type": "object",
                "properties": {
                    "q": { "type": "string" },
                    "page": { "type": "integer" },
                    "where": { "type": "object" }
                }
            },
            "targetSchema": { "type": "array", "items": { "$ref": "#" } }
        }));
        let params = l.decode_query("q=2024&page=2&where=%7B%22a%22%3A1%7D&extra=true");
        assert_eq!(params["q"], json!("2024"));
        assert_eq!(params["page"], json!(2));
        assert_eq!(params["where"], json!({ "a": 1 }));
        assert_eq!(params["extra"], json!(true));

        let sent = query_params(&params);
        assert!(sent.contains(&("q".to_string(), "2024".to_string())));
    }

    #[test]
    fn url_with_unset_parameter_is_malformed() {
        let transport = ScriptedTransport::new();
        let client = Client::with_transport(ClientOptions::new("http://api.test"), transport.clone());
        let member = Arc::new(
            ResourceType::from_schema(
                "member",
                &json!({
                    "properties": {
                        "$uri": { "type": "string", "readOnly": true },
                        "org": { "type": "string" },
                        "name": { "type": "string" }
                    },
                    "links": [
                        { "rel": "self", "href": "/org/{org}/user/{id}", "method": "GET", "targetSchema": { "$ref": "#" } }
                    ]
                }),
                &TransportOptions::default(),
            )
            .unwrap(),
        );
        let self_link = member.instance_link("self").unwrap();

        let lazy = Resource::with_id(&client, &member, "5");
        assert!(matches!(
            self_link.url(&Binding::Instance(lazy.clone())),
            Err(ClientError::MalformedRoute { .. })
        ));
        assert!(matches!(
            lazy.get("name"),
            Err(ClientError::MalformedRoute { .. })
        ));
        assert!(lazy.reference().is_none());
        assert!(transport.requests().is_empty());

        let mut data = Map::new();
        data.insert("$uri".to_string(), json!("/org/acme/user/5"));
        data.insert("org".to_string(), json!("acme"));
        let loaded = Resource::from_instance(&client, &member, data);
        assert_eq!(
            self_link.url(&Binding::Instance(loaded)).unwrap(),
            "http://api.test/org/acme/user/5"
        );
    }

    #[test]
    fn params_round_trip_through_query_text() {
        let params = params_from_query("page=2&per_page=10&sort=name&where=%7B%22a%22%3A1%7D");
        assert_eq!(params["page"], json!(2));
        assert_eq!(params["sort"], json!("name"));
        assert_eq!(params["where"], json!({ "a": 1 }));
    }
}
