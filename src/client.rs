//! Client context shared by every resource type, resource and proxy.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::Span;

use crate::error::ClientError;
use crate::keys::KeyResolvers;
use crate::proxy::Item;
use crate::resource::{id_from_uri, Resource, ResourceType};
use crate::transport::{Request, Transport, TransportOptions};
use crate::types::URI_KEY;

#[cfg(feature = "remote")]
use crate::transport::HttpTransport;

/// Options for building a [`Client`].
///
/// # Example
///
/// ```
/// use potion_client::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::new("https://api.example.com/v1/")
///     .timeout(Duration::from_secs(5))
///     .header("Authorization", "Bearer token");
/// assert_eq!(options.base_url(), "https://api.example.com/v1");
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
    base_url: String,
    transport: TransportOptions,
    key_resolvers: KeyResolvers,
    span: Option<Span>,
}

impl ClientOptions {
    /// Options for a server rooted at `base_url`. Trailing slashes are dropped.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport: TransportOptions::default(),
            key_resolvers: KeyResolvers::with_defaults(),
            span: None,
        }
    }

    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = Some(timeout);
        self
    }

    /// Header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.transport.headers.push((name.into(), value.into()));
        self
    }

    /// Span entered around every request. Defaults to a `potion` span
    /// carrying the base URL.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Replace the `$`-key resolver registry.
    pub fn key_resolvers(mut self, resolvers: KeyResolvers) -> Self {
        self.key_resolvers = resolvers;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.transport
    }
}

/// Connection to one hypermedia API.
///
/// Cheap to clone; clones share the transport and the type registry.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: String,
    transport: Box<dyn Transport>,
    options: TransportOptions,
    key_resolvers: KeyResolvers,
    span: Span,
    types: RwLock<BTreeMap<String, Arc<ResourceType>>>,
}

impl Client {
    /// A client over HTTP.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Network` if the HTTP client cannot be built.
    #[cfg(feature = "remote")]
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        Ok(Self::with_transport(options, HttpTransport::new()?))
    }

    /// A client over a custom transport.
    pub fn with_transport(options: ClientOptions, transport: impl Transport + 'static) -> Self {
        let span = options
            .span
            .unwrap_or_else(|| tracing::debug_span!("potion", base_url = %options.base_url));
        Self {
            inner: Arc::new(ClientInner {
                base_url: options.base_url,
                transport: Box::new(transport),
                options: options.transport,
                key_resolvers: options.key_resolvers,
                span,
                types: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.inner.options
    }

    pub fn key_resolvers(&self) -> &KeyResolvers {
        &self.inner.key_resolvers
    }

    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    /// Register a resource type under its name, replacing any previous one.
    pub fn register(&self, resource_type: ResourceType) -> Arc<ResourceType> {
        let resource_type = Arc::new(resource_type);
        self.inner
            .types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resource_type.name().to_string(), Arc::clone(&resource_type));
        resource_type
    }

    /// Build a resource type from `schema` with this client's transport
    /// options and register it.
    pub fn register_schema(&self, name: &str, schema: &Value) -> Result<Arc<ResourceType>, ClientError> {
        let resource_type = ResourceType::from_schema(name, schema, &self.inner.options)?;
        Ok(self.register(resource_type))
    }

    pub fn resource_type(&self, name: &str) -> Option<Arc<ResourceType>> {
        self.inner
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered types, ordered by name.
    pub fn resource_types(&self) -> Vec<Arc<ResourceType>> {
        self.inner
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Lazy handle for the instance at `uri`, e.g. `/user/1`.
    ///
    /// The type is picked by the first path segment after the base path.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::UnknownResource` if no registered type matches
    /// or the URI carries no id.
    pub fn instance(&self, uri: &str) -> Result<Resource, ClientError> {
        let unknown = || ClientError::UnknownResource {
            uri: uri.to_string(),
        };
        let path = self.relative_path(uri);
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let resource_type = segments
            .next()
            .and_then(|name| self.resource_type(name))
            .ok_or_else(unknown)?;
        if segments.next().is_none() {
            return Err(unknown());
        }
        let id = id_from_uri(&path).ok_or_else(unknown)?;
        Ok(Resource::with_id(self, &resource_type, id))
    }

    /// Turn a response element into an [`Item`].
    ///
    /// Objects carrying `$uri` become resources pre-filled with the element,
    /// typed by their URI or else by `fallback`. Bare `{"$ref": uri}` objects
    /// become lazy resources. Anything else is returned as is.
    pub fn dereference(
        &self,
        element: &Value,
        fallback: Option<&Arc<ResourceType>>,
    ) -> Result<Item, ClientError> {
        let Some(object) = element.as_object() else {
            return Ok(Item::Value(element.clone()));
        };

        if let Some(uri) = object.get(URI_KEY).and_then(Value::as_str) {
            let resource_type = self
                .type_for_uri(uri)
                .or_else(|| fallback.cloned())
                .ok_or_else(|| ClientError::UnknownResource {
                    uri: uri.to_string(),
                })?;
            return Ok(Item::Resource(Resource::from_instance(
                self,
                &resource_type,
                object.clone(),
            )));
        }

        match object.get("$ref").and_then(Value::as_str) {
            Some(reference) if object.len() == 1 && !reference.starts_with('#') => {
                self.instance(reference).map(Item::Resource)
            }
            _ => Ok(Item::Value(element.clone())),
        }
    }

    /// Register every resource type the server announces.
    ///
    /// Reads `{base}/schema`; each property whose `$ref` points at a type
    /// schema (e.g. `/user/schema#`) is fetched and registered under the
    /// property name.
    pub fn discover(&self) -> Result<Vec<Arc<ResourceType>>, ClientError> {
        let root = self.get_json("/schema")?;
        let properties = root
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new);

        let mut discovered = Vec::new();
        for (name, property) in &properties {
            let Some(reference) = property.get("$ref").and_then(Value::as_str) else {
                continue;
            };
            let path = reference.split('#').next().unwrap_or_default();
            if path.is_empty() {
                continue;
            }
            let schema = self.get_json(&self.relative_path(path))?;
            discovered.push(self.register_schema(name, &schema)?);
        }
        tracing::debug!(types = discovered.len(), "discovered resource types");
        Ok(discovered)
    }

    fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        let _entered = self.span().enter();
        let request = Request {
            method: "GET".to_string(),
            url: format!("{}{}", self.base_url(), path),
            query: Vec::new(),
            body: None,
            options: self.inner.options.clone(),
        };
        tracing::debug!(url = %request.url, "fetching schema");
        let response = self.transport().execute(&request)?;
        if !response.is_success() {
            return Err(ClientError::Transport {
                status: response.status,
                body: response.body,
            });
        }
        response.json()
    }

    fn type_for_uri(&self, uri: &str) -> Option<Arc<ResourceType>> {
        let path = self.relative_path(uri);
        let name = path.split('/').find(|s| !s.is_empty())?;
        self.resource_type(name)
    }

    /// Path of `uri` relative to the base URL's own path.
    fn relative_path(&self, uri: &str) -> String {
        let path = match url::Url::parse(uri) {
            Ok(absolute) => absolute.path().to_string(),
            Err(_) => uri
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        let base_path = url::Url::parse(self.base_url())
            .map(|base| base.path().trim_end_matches('/').to_string())
            .unwrap_or_default();
        match path.strip_prefix(base_path.as_str()) {
            Some(rest) if !base_path.is_empty() && rest.starts_with('/') => rest.to_string(),
            _ => path,
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<String> = self
            .resource_types()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .field("options", &self.inner.options)
            .field("key_resolvers", &self.inner.key_resolvers)
            .field("types", &types)
            .finish()
    }
}
