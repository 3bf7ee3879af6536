//! Resource types built from hypermedia schemas, and their instances.
//!
//! [`ResourceType::from_schema`] reads a schema document once and produces a
//! type descriptor: one [`PropertyAccessor`] per declared property, and the
//! declared links split into instance links (routes with path parameters,
//! bound per instance) and type links (collection routes such as `instances`
//! or `create`).
//!
//! A [`Resource`] is a cheap, clonable handle. Its raw instance data is
//! fetched through the `self` link the first time a property is read and is
//! cached from then on.
//!
//! ```no_run
//! use potion_client::{Client, ClientOptions, Resource};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), potion_client::ClientError> {
//! let client = Client::new(ClientOptions::new("https://api.example.com"))?;
//! client.discover()?;
//! let user_type = client.resource_type("user").expect("server exposes users");
//!
//! let user = Resource::new(&client, &user_type);
//! user.set("name", "Ada")?;
//! user.save()?;
//! println!("created {:?}", user.id());
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{json, Map, Value};

use crate::attribute::SchemaAttribute;
use crate::client::Client;
use crate::error::ClientError;
use crate::link::{Arg, Binding, Link};
use crate::proxy::Proxy;
use crate::route::Route;
use crate::transport::TransportOptions;
use crate::types::{SENTINEL, URI_KEY};

/// Getter, setter and deleter for one declared property.
#[derive(Debug, Clone)]
pub struct PropertyAccessor {
    name: String,
    accessor: String,
    attribute: SchemaAttribute,
}

impl PropertyAccessor {
    fn new(name: &str, attribute: SchemaAttribute) -> Self {
        Self {
            name: name.to_string(),
            accessor: name.trim_start_matches(SENTINEL).to_string(),
            attribute,
        }
    }

    /// Name in the schema and on the wire, e.g. `$uri`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used by callers, with a leading `$` stripped, e.g. `uri`.
    pub fn accessor(&self) -> &str {
        &self.accessor
    }

    pub fn attribute(&self) -> &SchemaAttribute {
        &self.attribute
    }

    pub fn writable(&self) -> bool {
        !self.attribute.read_only()
    }

    /// Read the property, loading the instance first if needed.
    ///
    /// A missing raw value is replaced by the attribute's empty value, which
    /// is written back into the cache.
    pub fn get(&self, resource: &Resource) -> Result<Value, ClientError> {
        let raw = resource.with_instance(|instance| {
            let raw = instance
                .get(&self.name)
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| self.attribute.empty_value());
            instance.insert(self.name.clone(), raw.clone());
            raw
        })?;
        self.attribute.resolve(&raw, resource.client())
    }

    pub fn set(&self, resource: &Resource, value: &Value) -> Result<(), ClientError> {
        self.check_writable()?;
        let serialized = self
            .attribute
            .serialize(value, resource.client().key_resolvers())?;
        resource.with_instance(|instance| {
            instance.insert(self.name.clone(), serialized);
        })
    }

    pub fn delete(&self, resource: &Resource) -> Result<(), ClientError> {
        self.check_writable()?;
        resource.with_instance(|instance| {
            instance.remove(&self.name);
        })
    }

    fn check_writable(&self) -> Result<(), ClientError> {
        if self.writable() {
            Ok(())
        } else {
            Err(ClientError::ReadOnlyProperty {
                name: self.name.clone(),
            })
        }
    }
}

/// A resource type descriptor.
#[derive(Debug)]
pub struct ResourceType {
    name: String,
    doc: Option<String>,
    schema: Value,
    properties: BTreeMap<String, PropertyAccessor>,
    instance_links: BTreeMap<String, Arc<Link>>,
    type_links: BTreeMap<String, Arc<Link>>,
}

impl ResourceType {
    /// Build a resource type from a hypermedia schema document.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidSchema` or `ClientError::MalformedRoute`
    /// if a property or link cannot be interpreted.
    pub fn from_schema(
        name: &str,
        schema: &Value,
        options: &TransportOptions,
    ) -> Result<Self, ClientError> {
        let mut routes: HashMap<String, Arc<Route>> = HashMap::new();
        let mut instance_links = BTreeMap::new();
        let mut type_links = BTreeMap::new();

        let descriptions = match schema.get("links") {
            None => &[][..],
            Some(Value::Array(links)) => links.as_slice(),
            Some(_) => {
                return Err(ClientError::InvalidSchema {
                    message: format!("{}: links must be an array", name),
                })
            }
        };
        for description in descriptions {
            let href = description
                .get("href")
                .and_then(Value::as_str)
                .ok_or_else(|| ClientError::InvalidSchema {
                    message: format!("{}: link without href", name),
                })?;
            let route = match routes.get(href) {
                Some(route) => Arc::clone(route),
                None => {
                    let route = Arc::new(Route::parse(href)?);
                    routes.insert(href.to_string(), Arc::clone(&route));
                    route
                }
            };

            let link = Link::from_description(route, description, options)?;
            let rel = link.rel().to_string();
            if link.route().is_instance() {
                instance_links.insert(rel, Arc::new(link));
            } else {
                type_links.insert(rel, Arc::new(link));
            }
        }

        let mut properties = BTreeMap::new();
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (prop_name, fragment) in props {
                let accessor = PropertyAccessor::new(prop_name, SchemaAttribute::from_fragment(fragment)?);
                properties.insert(accessor.accessor().to_string(), accessor);
            }
        }

        tracing::debug!(
            resource = name,
            properties = properties.len(),
            instance_links = instance_links.len(),
            type_links = type_links.len(),
            "built resource type"
        );

        Ok(Self {
            name: name.to_string(),
            doc: schema
                .get("description")
                .or_else(|| schema.get("title"))
                .and_then(Value::as_str)
                .map(String::from),
            schema: schema.clone(),
            properties,
            instance_links,
            type_links,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Property by accessor name (`uri`) or schema name (`$uri`).
    pub fn property(&self, name: &str) -> Option<&PropertyAccessor> {
        self.properties
            .get(name)
            .or_else(|| self.properties.get(name.trim_start_matches(SENTINEL)))
            .filter(|p| p.accessor() == name || p.name() == name)
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyAccessor> {
        self.properties.values()
    }

    pub fn instance_link(&self, rel: &str) -> Option<&Arc<Link>> {
        self.instance_links.get(rel)
    }

    pub fn type_link(&self, rel: &str) -> Option<&Arc<Link>> {
        self.type_links.get(rel)
    }

    pub fn instance_links(&self) -> impl Iterator<Item = &Arc<Link>> {
        self.instance_links.values()
    }

    pub fn type_links(&self) -> impl Iterator<Item = &Arc<Link>> {
        self.type_links.values()
    }

    /// Bind a type-level link, e.g. `instances`.
    pub fn link(self: &Arc<Self>, rel: &str, client: &Client) -> Result<Proxy, ClientError> {
        let link = self.type_link(rel).ok_or_else(|| ClientError::UnknownLink {
            resource: self.name.clone(),
            rel: rel.to_string(),
        })?;
        Proxy::bind(
            Arc::clone(link),
            Binding::Type {
                resource_type: Arc::clone(self),
                client: client.clone(),
            },
        )
    }
}

/// An instance of a resource type.
#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

struct ResourceInner {
    client: Client,
    resource_type: Arc<ResourceType>,
    id: Mutex<Option<String>>,
    instance: Mutex<Option<Map<String, Value>>>,
    // held while the instance is fetched through `self`
    fetch: Mutex<()>,
}

impl Resource {
    /// A new, unsaved instance with empty data.
    pub fn new(client: &Client, resource_type: &Arc<ResourceType>) -> Self {
        Self::build(client, resource_type, None, Some(Map::new()))
    }

    /// A handle to an existing instance; data is fetched on first use.
    pub fn with_id(client: &Client, resource_type: &Arc<ResourceType>, id: impl Into<String>) -> Self {
        Self::build(client, resource_type, Some(id.into()), None)
    }

    /// A handle to an existing instance whose data is already known.
    pub fn from_instance(
        client: &Client,
        resource_type: &Arc<ResourceType>,
        instance: Map<String, Value>,
    ) -> Self {
        Self::build(client, resource_type, None, Some(instance))
    }

    fn build(
        client: &Client,
        resource_type: &Arc<ResourceType>,
        id: Option<String>,
        instance: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                client: client.clone(),
                resource_type: Arc::clone(resource_type),
                id: Mutex::new(id),
                instance: Mutex::new(instance),
                fetch: Mutex::new(()),
            }),
        }
    }

    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    pub fn resource_type(&self) -> &Arc<ResourceType> {
        &self.inner.resource_type
    }

    /// Identity, derived from `$uri` the first time it is known.
    pub fn id(&self) -> Option<String> {
        let mut id = lock(&self.inner.id);
        if id.is_none() {
            *id = self
                .raw(URI_KEY)
                .and_then(|uri| uri.as_str().and_then(id_from_uri));
        }
        id.clone()
    }

    /// Cached raw field. Never fetches.
    pub fn raw(&self, name: &str) -> Option<Value> {
        lock(&self.inner.instance)
            .as_ref()
            .and_then(|instance| instance.get(name).cloned())
    }

    /// Cached raw data, if loaded. Never fetches.
    pub fn cached_instance(&self) -> Option<Map<String, Value>> {
        lock(&self.inner.instance).clone()
    }

    /// Raw data, fetched through `self` if not yet loaded.
    pub fn instance(&self) -> Result<Map<String, Value>, ClientError> {
        self.with_instance(|instance| instance.clone())
    }

    /// Read a property through its attribute.
    ///
    /// Undeclared names starting with `$` read the raw field.
    pub fn get(&self, name: &str) -> Result<Value, ClientError> {
        match self.resource_type().property(name) {
            Some(property) => property.get(self),
            None if name.starts_with(SENTINEL) => {
                Ok(self.instance()?.get(name).cloned().unwrap_or(Value::Null))
            }
            None => Err(self.unknown_property(name)),
        }
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), ClientError> {
        self.property(name)?.set(self, &value.into())
    }

    pub fn delete(&self, name: &str) -> Result<(), ClientError> {
        self.property(name)?.delete(self)
    }

    /// Writable fields only, unset ones replaced by their empty value; nulls
    /// are left out. Used as the create/update body.
    pub fn valid_instance(&self) -> Result<Map<String, Value>, ClientError> {
        let properties: Vec<&PropertyAccessor> = self
            .resource_type()
            .properties()
            .filter(|p| p.writable())
            .collect();
        self.with_instance(|instance| {
            properties
                .iter()
                .filter_map(|p| {
                    let value = instance
                        .get(p.name())
                        .cloned()
                        .unwrap_or_else(|| p.attribute().empty_value());
                    (!value.is_null()).then(|| (p.name().to_string(), value))
                })
                .collect()
        })
    }

    /// Create the instance remotely when it has no identity, update it
    /// otherwise. The response replaces the cached data.
    pub fn save(&self) -> Result<(), ClientError> {
        let rel = if self.id().is_none() { "create" } else { "update" };
        tracing::debug!(resource = %self.resource_type().name(), rel, "saving");
        let saved = self
            .link(rel)?
            .into_object()?
            .call(&[Arg::Resource(self.clone())])?;
        *lock(&self.inner.instance) = Some(into_instance(saved)?);
        Ok(())
    }

    /// Re-fetch through `self`, replacing the cached data.
    pub fn refresh(&self) -> Result<(), ClientError> {
        let fresh = self.fetch_self()?;
        *lock(&self.inner.instance) = Some(fresh);
        Ok(())
    }

    /// Bind a link to this instance: instance links first, then type links.
    pub fn link(&self, rel: &str) -> Result<Proxy, ClientError> {
        let ty = self.resource_type();
        let link = ty
            .instance_link(rel)
            .or_else(|| ty.type_link(rel))
            .ok_or_else(|| ClientError::UnknownLink {
                resource: ty.name().to_string(),
                rel: rel.to_string(),
            })?;
        Proxy::bind(Arc::clone(link), Binding::Instance(self.clone()))
    }

    /// Identity reference: the cached `$uri`, else the `self` route filled
    /// in with the id. Never fetches.
    pub fn reference(&self) -> Option<String> {
        if let Some(Value::String(uri)) = self.raw(URI_KEY) {
            return Some(uri);
        }
        self.id()?;
        self.resource_type()
            .instance_link("self")?
            .route()
            .expand_for(self)
            .ok()
    }

    /// `{"$ref": uri}` pointing at this instance.
    pub fn to_reference(&self) -> Option<Value> {
        self.reference().map(|uri| json!({ "$ref": uri }))
    }

    fn property(&self, name: &str) -> Result<&PropertyAccessor, ClientError> {
        self.resource_type()
            .property(name)
            .ok_or_else(|| self.unknown_property(name))
    }

    fn unknown_property(&self, name: &str) -> ClientError {
        ClientError::UnknownProperty {
            resource: self.resource_type().name().to_string(),
            name: name.to_string(),
        }
    }

    fn is_loaded(&self) -> bool {
        lock(&self.inner.instance).is_some()
    }

    fn ensure_loaded(&self) -> Result<(), ClientError> {
        if self.is_loaded() {
            return Ok(());
        }
        let _fetching = lock(&self.inner.fetch);
        if self.is_loaded() {
            return Ok(());
        }
        let fetched = self.fetch_self()?;
        *lock(&self.inner.instance) = Some(fetched);
        Ok(())
    }

    fn fetch_self(&self) -> Result<Map<String, Value>, ClientError> {
        tracing::debug!(resource = %self.resource_type().name(), id = ?self.id(), "fetching instance");
        let value = self.link("self")?.into_object()?.call(&[])?;
        into_instance(value)
    }

    fn with_instance<T>(
        &self,
        f: impl FnOnce(&mut Map<String, Value>) -> T,
    ) -> Result<T, ClientError> {
        self.ensure_loaded()?;
        let mut guard = lock(&self.inner.instance);
        Ok(f(guard.get_or_insert_with(Map::new)))
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        match (self.reference(), other.reference()) {
            (Some(a), Some(b)) => a == b,
            _ => Arc::ptr_eq(&self.inner, &other.inner),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("type", &self.resource_type().name())
            .field("id", &self.id())
            .field("instance", &self.cached_instance())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn into_instance(value: Value) -> Result<Map<String, Value>, ClientError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ClientError::type_mismatch("object", &other)),
    }
}

/// Last path segment of an instance URI: `/user/12` → `12`.
pub(crate) fn id_from_uri(uri: &str) -> Option<String> {
    let path = uri.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientOptions;
    use crate::transport::testing::ScriptedTransport;
    use crate::transport::Response;

    fn user_schema() -> Value {
        json!({
            "title": "A user",
            "properties": {
                "$uri": { "type": "string", "readOnly": true },
                "name": { "type": "string" },
                "age": { "type": ["integer", "null"] },
                "tags": { "type": "array", "items": { "type": "string" } },
                "created": {
                    "type": "object",
                    "readOnly": true,
                    "properties": { "$date": { "type": "integer" } }
                }
            },
            "links": [
                { "rel": "self", "href": "/user/{id}", "method": "GET", "targetSchema": { "$ref": "#" } },
                { "rel": "update", "href": "/user/{id}", "method": "PATCH", "schema": { "$ref": "#" }, "targetSchema": { "$ref": "#" } },
                { "rel": "destroy", "href": "/user/{id}", "method": "DELETE" },
                { "rel": "create", "href": "/user", "method": "POST", "schema": { "$ref": "#" }, "targetSchema": { "$ref": "#" } },
                {
                    "rel": "instances",
                    "href": "/user",
                    "method": "GET",
                    "schema": {
                        "type": "object",
                        "properties": {
                            "page": { "type": "integer", "minimum": 1 },
                            "per_page": { "type": "integer" }
                        }
                    },
                    "targetSchema": { "type": "array", "items": { "$ref": "#" } }
                }
            ]
        })
    }

    fn setup(transport: &ScriptedTransport) -> (Client, Arc<ResourceType>) {
        let client = Client::with_transport(ClientOptions::new("http://api.test"), transport.clone());
        let ty = client.register_schema("user", &user_schema()).unwrap();
        (client, ty)
    }

    #[test]
    fn factory_splits_links_by_route() {
        let ty = ResourceType::from_schema("user", &user_schema(), &TransportOptions::default())
            .unwrap();
        let mut instance: Vec<&str> = ty.instance_links().map(|l| l.rel()).collect();
        instance.sort();
        assert_eq!(instance, vec!["destroy", "self", "update"]);
        let mut types: Vec<&str> = ty.type_links().map(|l| l.rel()).collect();
        types.sort();
        assert_eq!(types, vec!["create", "instances"]);
        assert_eq!(ty.doc(), Some("A user"));
    }

    #[test]
    fn factory_shares_routes_by_path() {
        let ty = ResourceType::from_schema("user", &user_schema(), &TransportOptions::default())
            .unwrap();
        let self_route = ty.instance_link("self").unwrap().route() as *const Route;
        let update_route = ty.instance_link("update").unwrap().route() as *const Route;
        assert_eq!(self_route, update_route);
    }

    #[test]
    fn property_lookup_by_either_name() {
        let ty = ResourceType::from_schema("user", &user_schema(), &TransportOptions::default())
            .unwrap();
        assert_eq!(ty.property("uri").unwrap().name(), "$uri");
        assert_eq!(ty.property("$uri").unwrap().accessor(), "uri");
        assert!(ty.property("$name").is_none());
        assert!(!ty.property("uri").unwrap().writable());
    }

    #[test]
    fn lazy_load_fetches_once() {
        let transport = ScriptedTransport::new()
            .respond_json(json!({ "$uri": "/user/7", "name": "Ada", "created": { "$date": 0 } }));
        let (client, ty) = setup(&transport);
        let user = Resource::with_id(&client, &ty, "7");

        assert_eq!(user.get("name").unwrap(), json!("Ada"));
        assert_eq!(user.get("created").unwrap(), json!("1970-01-01T00:00:00.000Z"));
        assert_eq!(user.get("uri").unwrap(), json!("/user/7"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://api.test/user/7");
    }

    #[test]
    fn missing_field_reads_empty_value_and_caches_it() {
        let transport = ScriptedTransport::new();
        let (client, ty) = setup(&transport);
        let user = Resource::new(&client, &ty);

        assert_eq!(user.get("tags").unwrap(), json!([]));
        assert_eq!(user.raw("tags"), Some(json!([])));
        assert_eq!(user.get("age").unwrap(), Value::Null);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn setters_serialize_and_respect_read_only() {
        let transport = ScriptedTransport::new();
        let (client, ty) = setup(&transport);
        let user = Resource::new(&client, &ty);

        user.set("name", "Ada").unwrap();
        assert_eq!(user.raw("name"), Some(json!("Ada")));
        assert!(matches!(
            user.set("name", 5),
            Err(ClientError::TypeMismatch { .. })
        ));
        assert!(matches!(
            user.set("uri", "/user/1"),
            Err(ClientError::ReadOnlyProperty { .. })
        ));
        assert!(matches!(
            user.set("nickname", "x"),
            Err(ClientError::UnknownProperty { .. })
        ));

        user.delete("name").unwrap();
        assert_eq!(user.raw("name"), None);
    }

    #[test]
    fn valid_instance_keeps_writable_fields() {
        let transport = ScriptedTransport::new();
        let (client, ty) = setup(&transport);
        let mut data = Map::new();
        data.insert("$uri".into(), json!("/user/1"));
        data.insert("name".into(), json!("Ada"));
        data.insert("created".into(), json!({ "$date": 0 }));
        let user = Resource::from_instance(&client, &ty, data);

        // age is nullable so its empty value is dropped; tags defaults to []
        assert_eq!(
            Value::Object(user.valid_instance().unwrap()),
            json!({ "name": "Ada", "tags": [] })
        );
    }

    #[test]
    fn save_without_id_creates() {
        let transport = ScriptedTransport::new()
            .respond_json(json!({ "$uri": "/user/9", "name": "Ada", "tags": [] }));
        let (client, ty) = setup(&transport);
        let user = Resource::new(&client, &ty);
        user.set("name", "Ada").unwrap();
        let expected = Value::Object(user.valid_instance().unwrap());

        user.save().unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, "POST");
        assert_eq!(sent.url, "http://api.test/user");
        assert_eq!(sent.body, Some(expected));
        assert_eq!(user.id(), Some("9".to_string()));
    }

    #[test]
    fn save_with_id_updates() {
        let transport = ScriptedTransport::new()
            .respond_json(json!({ "$uri": "/user/3", "name": "Old" }))
            .respond_json(json!({ "$uri": "/user/3", "name": "New" }));
        let (client, ty) = setup(&transport);
        let user = Resource::with_id(&client, &ty, "3");
        user.set("name", "New").unwrap();

        user.save().unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[1].method, "PATCH");
        assert_eq!(requests[1].url, "http://api.test/user/3");
        assert_eq!(requests[1].body, Some(json!({ "name": "New", "tags": [] })));
        assert_eq!(user.get("name").unwrap(), json!("New"));
    }

    #[test]
    fn refresh_replaces_cache() {
        let transport = ScriptedTransport::new()
            .respond_json(json!({ "$uri": "/user/3", "name": "Fresh" }));
        let (client, ty) = setup(&transport);
        let mut data = Map::new();
        data.insert("$uri".into(), json!("/user/3"));
        data.insert("name".into(), json!("Stale"));
        let user = Resource::from_instance(&client, &ty, data);

        user.refresh().unwrap();
        assert_eq!(user.get("name").unwrap(), json!("Fresh"));
    }

    #[test]
    fn save_propagates_transport_errors() {
        let transport = ScriptedTransport::new()
            .respond(Response::json_body(400, &json!({ "message": "bad" })));
        let (client, ty) = setup(&transport);
        let user = Resource::new(&client, &ty);
        assert!(matches!(
            user.save(),
            Err(ClientError::Transport { status: 400, .. })
        ));
    }

    #[test]
    fn equality_compares_references() {
        let transport = ScriptedTransport::new();
        let (client, ty) = setup(&transport);
        let by_id = Resource::with_id(&client, &ty, "5");
        let mut data = Map::new();
        data.insert("$uri".into(), json!("/user/5"));
        let by_data = Resource::from_instance(&client, &ty, data);
        let other = Resource::with_id(&client, &ty, "6");

        assert_eq!(by_id, by_data);
        assert_ne!(by_id, other);

        let fresh = Resource::new(&client, &ty);
        assert_eq!(fresh, fresh.clone());
        assert_ne!(fresh, Resource::new(&client, &ty));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn type_level_links_bind_to_type() {
        let transport = ScriptedTransport::new();
        let (client, ty) = setup(&transport);
        assert!(ty.link("instances", &client).unwrap().into_list().is_ok());
        assert!(matches!(
            ty.link("create", &client),
            Err(ClientError::UnboundObjectLink { .. })
        ));
        assert!(matches!(
            ty.link("self", &client),
            Err(ClientError::UnknownLink { .. })
        ));
    }

    #[test]
    fn id_from_uri_takes_last_segment() {
        assert_eq!(id_from_uri("/user/12"), Some("12".to_string()));
        assert_eq!(id_from_uri("http://x.test/user/12/?a=1"), Some("12".to_string()));
        assert_eq!(id_from_uri("/"), None);
    }
}
