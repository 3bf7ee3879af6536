//! Bound link proxies.
//!
//! A [`Proxy`] is a link bound to a resource instance or type. Its kind is
//! picked once from the link's [`ReturnShape`]:
//!
//! | Shape | Proxy | `call` returns |
//! |-------|-------|----------------|
//! | void | [`VoidProxy`] | nothing |
//! | object | [`ObjectProxy`] | the response object |
//! | list | [`ListProxy`] | a [`Page`] |
//!
//! Proxies are values: [`Proxy::arg`] never changes the receiver, it returns
//! a new proxy with one more accumulated argument. Arguments go out as query
//! parameters; positional call arguments become the request body.
//!
//! # Pagination
//!
//! A [`ListProxy`] fetches its page lazily, at most once, and exposes the
//! `Link` relations of the response (`next`, `first`, ...) as further list
//! proxies. [`ListProxy::iter`] walks the pages forward through `next`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Map, Value};

use crate::error::ClientError;
use crate::link::{Arg, Binding, Link, Output};
use crate::resource::Resource;
use crate::transport::Response;
use crate::types::ReturnShape;

/// An element of a list response.
#[derive(Debug, Clone)]
pub enum Item {
    /// An element carrying `$uri`, dereferenced into a resource.
    Resource(Resource),
    Value(Value),
}

impl Item {
    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Item::Resource(r) => Some(r),
            Item::Value(_) => None,
        }
    }

    /// The element as JSON; resources give their cached instance data.
    pub fn to_value(&self) -> Value {
        match self {
            Item::Resource(r) => Value::Object(r.cached_instance().unwrap_or_default()),
            Item::Value(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct ProxyCore {
    link: Arc<Link>,
    binding: Binding,
    args: Map<String, Value>,
}

impl ProxyCore {
    fn serialize_arg(&self, name: &str, value: Value) -> Result<Value, ClientError> {
        match self.link.input_property(name) {
            Some(attr) => attr.serialize(&value, self.binding.client().key_resolvers()),
            None => Ok(value),
        }
    }

    fn with_arg(&self, name: &str, value: Value) -> Result<Self, ClientError> {
        let mut args = self.args.clone();
        args.insert(name.to_string(), self.serialize_arg(name, value)?);
        Ok(Self {
            link: Arc::clone(&self.link),
            binding: self.binding.clone(),
            args,
        })
    }

    fn execute<T>(
        &self,
        positional: &[Arg],
        handler: impl FnOnce(Response) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        self.link
            .execute(&self.binding, &self.args, positional, handler)
    }
}

/// A link bound to an instance or a type.
#[derive(Debug, Clone)]
pub enum Proxy {
    Void(VoidProxy),
    Object(ObjectProxy),
    List(ListProxy),
}

impl Proxy {
    /// Bind `link`, choosing the proxy kind from its return shape.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::UnboundObjectLink` for an object-shaped link
    /// bound to a type.
    pub fn bind(link: Arc<Link>, binding: Binding) -> Result<Self, ClientError> {
        let core = ProxyCore {
            link,
            binding,
            args: Map::new(),
        };
        Self::from_core(core)
    }

    fn from_core(core: ProxyCore) -> Result<Self, ClientError> {
        Ok(match core.link.shape() {
            ReturnShape::Void => Proxy::Void(VoidProxy { core }),
            ReturnShape::Object => Proxy::Object(ObjectProxy::new(core)?),
            ReturnShape::List => Proxy::List(ListProxy::new(core)),
        })
    }

    fn core(&self) -> &ProxyCore {
        match self {
            Proxy::Void(p) => &p.core,
            Proxy::Object(p) => &p.core,
            Proxy::List(p) => &p.core,
        }
    }

    pub fn shape(&self) -> ReturnShape {
        self.core().link.shape()
    }

    pub fn link(&self) -> &Link {
        &self.core().link
    }

    pub fn binding(&self) -> &Binding {
        &self.core().binding
    }

    /// Accumulated arguments.
    pub fn args(&self) -> &Map<String, Value> {
        &self.core().args
    }

    pub fn doc(&self) -> Option<&str> {
        self.link().doc()
    }

    /// A new proxy of the same kind with `name` set to `value`, serialized
    /// through the link's declared input property when there is one.
    pub fn arg(&self, name: &str, value: impl Into<Value>) -> Result<Self, ClientError> {
        Self::from_core(self.core().with_arg(name, value.into())?)
    }

    /// Execute the link. Void links return `null`, list links the page items.
    pub fn call(&self, positional: &[Arg]) -> Result<Value, ClientError> {
        match self {
            Proxy::Void(p) => p.call(positional).map(|()| Value::Null),
            Proxy::Object(p) => p.call(positional),
            Proxy::List(p) => p.call(positional).map(|page| Value::Array(page.items.clone())),
        }
    }

    pub fn into_void(self) -> Result<VoidProxy, ClientError> {
        match self {
            Proxy::Void(p) => Ok(p),
            other => Err(other.wrong_shape("void")),
        }
    }

    pub fn into_object(self) -> Result<ObjectProxy, ClientError> {
        match self {
            Proxy::Object(p) => Ok(p),
            other => Err(other.wrong_shape("object")),
        }
    }

    pub fn into_list(self) -> Result<ListProxy, ClientError> {
        match self {
            Proxy::List(p) => Ok(p),
            other => Err(other.wrong_shape("list")),
        }
    }

    fn wrong_shape(&self, expected: &'static str) -> ClientError {
        ClientError::WrongShape {
            expected,
            actual: self.shape().as_str(),
        }
    }
}

/// Proxy for links that return nothing.
#[derive(Debug, Clone)]
pub struct VoidProxy {
    core: ProxyCore,
}

impl VoidProxy {
    pub fn arg(&self, name: &str, value: impl Into<Value>) -> Result<Self, ClientError> {
        Ok(Self {
            core: self.core.with_arg(name, value.into())?,
        })
    }

    /// Execute the link, discarding the response body.
    pub fn call(&self, positional: &[Arg]) -> Result<(), ClientError> {
        self.core.execute(positional, |_| Ok(()))
    }
}

/// Proxy for links that return one object.
#[derive(Debug, Clone)]
pub struct ObjectProxy {
    core: ProxyCore,
}

impl ObjectProxy {
    fn new(core: ProxyCore) -> Result<Self, ClientError> {
        if core.binding.instance().is_none() {
            return Err(ClientError::UnboundObjectLink {
                method: core.link.method().to_string(),
                path: core.link.route().path().to_string(),
            });
        }
        Ok(Self { core })
    }

    pub fn arg(&self, name: &str, value: impl Into<Value>) -> Result<Self, ClientError> {
        Ok(Self {
            core: self.core.with_arg(name, value.into())?,
        })
    }

    /// Execute the link and return the response object.
    ///
    /// Self-referencing links return the raw instance data; links with a
    /// declared target schema return the resolved value.
    pub fn call(&self, positional: &[Arg]) -> Result<Value, ClientError> {
        let client = self.core.binding.client();
        self.core.execute(positional, |response| {
            let body = response.json()?;
            match self.core.link.output() {
                Output::Schema(attr) => attr.resolve(&body, client),
                Output::SelfRef | Output::None => Ok(body),
            }
        })
    }
}

/// One fetched page of a list link.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Value>,
    /// Total count across all pages.
    pub total: usize,
    /// Relations announced by the response, without `self`.
    pub relations: BTreeMap<String, ListProxy>,
}

/// Proxy for links that return a sequence.
#[derive(Debug, Clone)]
pub struct ListProxy {
    core: ProxyCore,
    page: Arc<Mutex<Option<Arc<Page>>>>,
}

impl ListProxy {
    fn new(core: ProxyCore) -> Self {
        Self {
            core,
            page: Arc::new(Mutex::new(None)),
        }
    }

    pub fn args(&self) -> &Map<String, Value> {
        &self.core.args
    }

    /// A new, unfetched proxy with `name` set to `value`.
    pub fn arg(&self, name: &str, value: impl Into<Value>) -> Result<Self, ClientError> {
        Ok(Self::new(self.core.with_arg(name, value.into())?))
    }

    /// Execute the link now, bypassing the page cache.
    pub fn call(&self, positional: &[Arg]) -> Result<Page, ClientError> {
        self.core.execute(positional, |response| self.read_page(response))
    }

    /// The page, fetched on first use.
    pub fn fetch(&self) -> Result<Arc<Page>, ClientError> {
        let mut cached = self.page.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(page) = cached.as_ref() {
            return Ok(Arc::clone(page));
        }
        let args = Value::Object(self.core.args.clone());
        tracing::trace!(
            path = %self.core.link.route().path(),
            args = %args,
            "fetching page"
        );
        let page = Arc::new(self.call(&[])?);
        *cached = Some(Arc::clone(&page));
        Ok(page)
    }

    pub fn is_fetched(&self) -> bool {
        self.page
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Total number of elements across all pages.
    pub fn len(&self) -> Result<usize, ClientError> {
        Ok(self.fetch()?.total)
    }

    pub fn is_empty(&self) -> Result<bool, ClientError> {
        Ok(self.len()? == 0)
    }

    /// Number of elements on this page.
    pub fn page_len(&self) -> Result<usize, ClientError> {
        Ok(self.fetch()?.items.len())
    }

    /// A relation announced by the response, e.g. `next`.
    pub fn relation(&self, name: &str) -> Result<Option<ListProxy>, ClientError> {
        Ok(self.fetch()?.relations.get(name).cloned())
    }

    /// Element at `index` counted across pages.
    ///
    /// A proxy carrying a `page` argument holds the elements starting at
    /// `page * per_page`. Indexes outside the fetched page jump straight to
    /// page `index / per_page` instead of walking the pages in between.
    pub fn get(&self, index: usize) -> Result<Option<Item>, ClientError> {
        let page = self.fetch()?;
        let per_page = self
            .core
            .args
            .get("per_page")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(page.items.len());
        let current = self.core.args.get("page").and_then(Value::as_u64);
        let start = current.map_or(0, |p| p as usize * per_page);

        if let Some(value) = index.checked_sub(start).and_then(|i| page.items.get(i)) {
            return self.item(value).map(Some);
        }
        if index >= page.total || per_page == 0 {
            return Ok(None);
        }

        let target = index / per_page;
        if current == Some(target as u64) {
            return Ok(None);
        }
        let other = self.arg("page", json!(target))?;
        other.local(index - target * per_page)
    }

    fn local(&self, index: usize) -> Result<Option<Item>, ClientError> {
        let page = self.fetch()?;
        page.items.get(index).map(|v| self.item(v)).transpose()
    }

    /// Iterate over every element, following `next` relations.
    pub fn iter(&self) -> ListIter {
        let start = self
            .page
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|page| page.relations.get("first").cloned())
            .unwrap_or_else(|| self.clone());
        ListIter {
            current: Some(start),
            cursor: 0,
            visited: Vec::new(),
        }
    }

    fn item(&self, value: &Value) -> Result<Item, ClientError> {
        let binding = &self.core.binding;
        binding
            .client()
            .dereference(value, Some(binding.resource_type()))
    }

    fn read_page(&self, response: Response) -> Result<Page, ClientError> {
        let items = match response.json()? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => return Err(ClientError::type_mismatch("array", &other)),
        };
        let total = response.total_count().unwrap_or(items.len());

        let mut relations = BTreeMap::new();
        for (rel, target) in &response.links {
            if rel == "self" {
                continue;
            }
            relations.insert(rel.clone(), self.relation_proxy(target)?);
        }

        Ok(Page {
            items,
            total,
            relations,
        })
    }

    /// A proxy for a relation URL: same link and binding, arguments overlaid
    /// with the URL's query parameters.
    fn relation_proxy(&self, target: &str) -> Result<ListProxy, ClientError> {
        let query = target
            .split_once('?')
            .map(|(_, q)| q.split('#').next().unwrap_or_default())
            .unwrap_or_default();

        let mut core = self.core.clone();
        for (key, value) in self.core.link.decode_query(query) {
            let value = self.core.serialize_arg(&key, value)?;
            core.args.insert(key, value);
        }
        Ok(ListProxy::new(core))
    }
}

/// Forward iterator over the elements of a paginated list.
#[derive(Debug)]
pub struct ListIter {
    current: Option<ListProxy>,
    cursor: usize,
    visited: Vec<Map<String, Value>>,
}

impl Iterator for ListIter {
    type Item = Result<Item, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let proxy = self.current.as_ref()?;
            let page = match proxy.fetch() {
                Ok(page) => page,
                Err(e) => {
                    self.current = None;
                    return Some(Err(e));
                }
            };

            if let Some(value) = page.items.get(self.cursor) {
                self.cursor += 1;
                return Some(proxy.item(value));
            }

            self.visited.push(proxy.core.args.clone());
            self.current = page
                .relations
                .get("next")
                .filter(|next| !self.visited.contains(&next.core.args))
                .cloned();
            self.cursor = 0;
        }
    }
}

impl IntoIterator for &ListProxy {
    type Item = Result<Item, ClientError>;
    type IntoIter = ListIter;

    fn into_iter(self) -> ListIter {
        self.iter()
    }
}
