//! Potion Client
//!
//! A dynamic client for hypermedia JSON APIs described by JSON-Schema
//! documents with `links`.
//!
//! Nothing is generated ahead of time: each schema document is read at
//! runtime into a [`ResourceType`] whose properties serialize and resolve
//! values according to their schema fragments, and whose links become
//! callable [`Proxy`] values bound to an instance or to the type.
//!
//! # Example
//!
//! ```
//! use potion_client::{ReturnShape, ResourceType, TransportOptions};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "properties": {
//!         "$uri": { "type": "string", "readOnly": true },
//!         "name": { "type": "string" }
//!     },
//!     "links": [
//!         { "rel": "self", "href": "/user/{id}", "method": "GET", "targetSchema": { "$ref": "#" } },
//!         {
//!             "rel": "instances",
//!             "href": "/user",
//!             "method": "GET",
//!             "targetSchema": { "type": "array", "items": { "$ref": "#" } }
//!         }
//!     ]
//! });
//!
//! let user = ResourceType::from_schema("user", &schema, &TransportOptions::default()).unwrap();
//!
//! // Routes with path parameters address one instance
//! assert!(user.instance_link("self").is_some());
//! assert_eq!(user.type_link("instances").unwrap().shape(), ReturnShape::List);
//! assert!(!user.property("uri").unwrap().writable());
//! ```
//!
//! # Return shapes
//!
//! | `targetSchema` | Shape | Proxy |
//! |----------------|-------|-------|
//! | absent | void | [`VoidProxy`] |
//! | `{"type": "array", ...}` | list | [`ListProxy`] |
//! | anything else | object | [`ObjectProxy`] |
//!
//! # Talking to a server
//!
//! ```no_run
//! use potion_client::{Client, ClientOptions};
//!
//! # fn main() -> Result<(), potion_client::ClientError> {
//! let client = Client::new(ClientOptions::new("https://api.example.com"))?;
//! client.discover()?;
//!
//! let users = client.resource_type("user").expect("server exposes users");
//! let active = users
//!     .link("instances", &client)?
//!     .into_list()?
//!     .arg("where", serde_json::json!({ "active": true }))?;
//!
//! println!("{} active users", active.len()?);
//! for user in &active {
//!     println!("{:?}", user?.to_value());
//! }
//! # Ok(())
//! # }
//! ```

mod attribute;
mod client;
mod error;
mod keys;
mod link;
mod loader;
mod proxy;
mod resource;
mod route;
mod transport;
mod types;
mod validator;

pub use attribute::{AttributeKind, SchemaAttribute};
pub use client::{Client, ClientOptions};
pub use error::{ClientError, SchemaError};
pub use keys::{DateResolver, KeyResolver, KeyResolvers, RefResolver};
pub use link::{params_from_query, query_params, Arg, Binding, InputShape, Link, Output};
pub use loader::{is_url, load_schema, load_schema_auto, load_schema_str};
pub use proxy::{Item, ListIter, ListProxy, ObjectProxy, Page, Proxy, VoidProxy};
pub use resource::{PropertyAccessor, Resource, ResourceType};
pub use route::Route;
pub use transport::{parse_link_header, Request, Response, Transport, TransportOptions};
pub use types::{JsonType, ReturnShape};
pub use validator::validate;

#[cfg(feature = "remote")]
pub use loader::load_schema_url;
#[cfg(feature = "remote")]
pub use transport::HttpTransport;
