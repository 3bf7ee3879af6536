//! HTTP transport boundary.
//!
//! The core only builds [`Request`]s and reads [`Response`]s; sending them is
//! the job of a [`Transport`]. [`HttpTransport`] (feature `remote`) is the
//! blocking `reqwest` implementation.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde_json::Value;

use crate::error::ClientError;
use crate::types::TOTAL_COUNT_HEADER;

/// Per-link transport settings, copied into every request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportOptions {
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
}

/// An outgoing call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub options: TransportOptions,
}

impl Request {
    /// Value of a query parameter, if sent.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A received response.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: String,
    /// Relation name to target URL, from the `Link` header.
    pub links: BTreeMap<String, String>,
}

impl Response {
    /// A response with a JSON body.
    pub fn json_body(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            ..Self::default()
        }
    }

    /// Add a header; a `Link` header also fills [`Response::links`].
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name == "link" {
            self.links.extend(parse_link_header(value));
        }
        self.headers.insert(name, value.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parse the body as JSON. An empty body is `null`.
    pub fn json(&self) -> Result<Value, ClientError> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|source| ClientError::InvalidJson { source })
    }

    /// Total result count announced by the server, if any.
    pub fn total_count(&self) -> Option<usize> {
        self.header(TOTAL_COUNT_HEADER)
            .and_then(|v| v.trim().parse().ok())
    }
}

/// Sends requests. Implementations own retries, auth and connection reuse.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &Request) -> Result<Response, ClientError>;
}

/// Parse an RFC 8288 `Link` header into relation name → target.
///
/// A link carrying several space-separated relations is registered under each.
pub fn parse_link_header(header: &str) -> BTreeMap<String, String> {
    let mut links = BTreeMap::new();
    let mut rest = header;

    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        let target = &rest[start + 1..start + len];
        let after = &rest[start + len + 1..];
        let params_end = after.find('<').unwrap_or(after.len());

        for param in after[..params_end].split(';') {
            let param = param.trim().trim_end_matches(',').trim();
            if let Some(value) = param.strip_prefix("rel=") {
                for rel in value.trim_matches('"').split_whitespace() {
                    links.insert(rel.to_string(), target.to_string());
                }
            }
        }
        rest = &after[params_end..];
    }

    links
}

/// Default timeout for HTTP requests (30 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking HTTP transport over `reqwest`.
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpTransport {
    pub fn new() -> Result<Self, ClientError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|source| ClientError::Network {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "remote")]
impl Transport for HttpTransport {
    fn execute(&self, request: &Request) -> Result<Response, ClientError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            ClientError::InvalidSchema {
                message: format!("unknown HTTP method '{}'", request.method),
            }
        })?;

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        for (name, value) in &request.options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.options.timeout {
            builder = builder.timeout(timeout);
        }

        let network = |source| ClientError::Network {
            url: request.url.clone(),
            source,
        };
        let response = builder.send().map_err(network)?;

        let mut out = Response {
            status: response.status().as_u16(),
            ..Response::default()
        };
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            // repeated Link headers are merged into one list
            let merged = match out.headers.get(name.as_str()) {
                Some(existing) => format!("{}, {}", existing, value),
                None => value.to_string(),
            };
            out = out.with_header(name.as_str(), &merged);
        }
        out.body = response.text().map_err(network)?;
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Replays queued responses and records every request.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedTransport {
        responses: Arc<Mutex<VecDeque<Response>>>,
        requests: Arc<Mutex<Vec<Request>>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn respond(self, response: Response) -> Self {
            self.responses.lock().unwrap().push_back(response);
            self
        }

        pub(crate) fn respond_json(self, body: Value) -> Self {
            self.respond(Response::json_body(200, &body))
        }

        pub(crate) fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn execute(&self, request: &Request) -> Result<Response, ClientError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ClientError::Transport {
                    status: 599,
                    body: format!("no scripted response for {}", request.url),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_link_header_relations() {
        let links = parse_link_header(
            r#"</user?page=2&per_page=10>; rel="next", </user?page=3&per_page=10>; rel="last""#,
        );
        assert_eq!(links["next"], "/user?page=2&per_page=10");
        assert_eq!(links["last"], "/user?page=3&per_page=10");
    }

    #[test]
    fn parse_link_header_multiple_rels_and_params() {
        let links = parse_link_header(r#"<https://x.test/a?page=1>; title="first"; rel="first self""#);
        assert_eq!(links.len(), 2);
        assert_eq!(links["first"], "https://x.test/a?page=1");
        assert_eq!(links["self"], "https://x.test/a?page=1");
    }

    #[test]
    fn parse_link_header_garbage() {
        assert!(parse_link_header("").is_empty());
        assert!(parse_link_header("<unterminated").is_empty());
    }

    #[test]
    fn response_headers_are_case_insensitive() {
        let response = Response::json_body(200, &json!([]))
            .with_header("X-Total-Count", "25")
            .with_header("Link", r#"</user?page=2>; rel="next""#);
        assert_eq!(response.total_count(), Some(25));
        assert_eq!(response.header("x-total-count"), Some("25"));
        assert_eq!(response.links["next"], "/user?page=2");
    }

    #[test]
    fn empty_body_is_null() {
        let response = Response {
            status: 204,
            ..Response::default()
        };
        assert!(response.is_success());
        assert_eq!(response.json().unwrap(), Value::Null);
    }
}
