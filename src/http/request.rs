//! Inbound HTTP requests.
//!
//! A [`Request`] is an immutable snapshot of everything the router and handlers
//! may read: method, path, query, headers, cookies, body, and peer address. It is
//! built once per request, either from raw bytes via [`httparse`] or through
//! [`RequestBuilder`] when the transport has already been decoded elsewhere.

use std::collections::HashMap;
use std::net::IpAddr;

use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

use super::cookie::parse_cookie_header;
use super::{Headers, Method};
use crate::error::RouterError;

/// Errors that can occur while parsing a raw HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// Headers consulted, in order, when looking for the client address.
const CLIENT_IP_HEADERS: [&str; 6] = [
    "Client-IP",
    "X-Forwarded-For",
    "X-Forwarded",
    "X-Cluster-Client-IP",
    "Forwarded-For",
    "Forwarded",
];

/// A fully decoded HTTP request.
///
/// # Examples
///
/// ```
/// use routekit::http::{Method, Request};
///
/// let request = Request::builder(Method::Get, "/search?q=rust+router&page=2")
///     .header("Accept", "text/html, application/json")
///     .header("Cookie", "theme=dark")
///     .build();
///
/// assert_eq!(request.path(), "/search");
/// assert_eq!(request.query_param("q"), Some("rust router"));
/// assert!(request.is_accepts("application/json"));
/// assert_eq!(request.cookie("theme"), Some("dark"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    query_params: Vec<(String, String)>,
    headers: Headers,
    cookies: HashMap<String, String>,
    body: Bytes,
    peer: Option<IpAddr>,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Starts building a request for `method` and `target` (path plus optional query).
    pub fn builder(method: Method, target: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder::new(method, target.as_ref())
    }

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Everything after the header terminator is taken as the body.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: the header block is not complete yet.
    /// - [`RequestError::Parse`]: the data is malformed.
    /// - [`RequestError::MissingField`]: method or path is absent.
    pub fn parse(buf: &[u8]) -> Result<Self, RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?;
        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let mut builder = RequestBuilder::new(method.parse().unwrap_or(Method::Get), target);
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                builder = builder.header(header.name, value);
            }
        }

        Ok(builder
            .body(Bytes::copy_from_slice(&buf[body_offset..]))
            .build())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path split into its non-empty segments.
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// First decoded value for a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All decoded query parameters, in the order they appeared.
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The full `Content-Type` header value, or `""` when absent.
    pub fn content_type(&self) -> &str {
        self.headers.get("content-type").unwrap_or("")
    }

    /// The media type of the body with any parameters (`; charset=...`) stripped.
    pub fn mime_type(&self) -> &str {
        self.content_type()
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
    }

    /// Media ranges listed in the `Accept` header.
    pub fn accepts(&self) -> Vec<&str> {
        self.headers.get_list("accept")
    }

    /// `true` if `mime` appears verbatim (parameters ignored) in the `Accept` header.
    pub fn is_accepts(&self, mime: &str) -> bool {
        self.accepts()
            .iter()
            .any(|range| range.split(';').next().map(str::trim) == Some(mime))
    }

    /// `true` when the client sent JSON and asked for JSON back.
    pub fn wants_json(&self) -> bool {
        self.mime_type() == "application/json" && self.is_accepts("application/json")
    }

    /// `scheme://host`, using `X-Forwarded-Proto` to detect TLS terminated upstream.
    pub fn host(&self) -> String {
        let scheme = match self.headers.get("x-forwarded-proto") {
            Some(proto) if proto.eq_ignore_ascii_case("https") => "https",
            _ => "http",
        };
        format!("{scheme}://{}", self.headers.get("host").unwrap_or("localhost"))
    }

    /// The absolute request URI.
    pub fn uri(&self) -> String {
        match &self.query {
            Some(query) => format!("{}{}?{}", self.host(), self.path, query),
            None => format!("{}{}", self.host(), self.path),
        }
    }

    /// The client address: the first valid IP in the forwarding headers, then the peer.
    pub fn ip(&self) -> Option<IpAddr> {
        CLIENT_IP_HEADERS
            .iter()
            .flat_map(|name| self.headers.get_list(name))
            .find_map(|candidate| candidate.parse().ok())
            .or(self.peer)
    }

    pub fn agent(&self) -> Option<&str> {
        self.headers.get("user-agent")
    }

    pub fn cookie(&self, key: &str) -> Option<&str> {
        self.cookies.get(key).map(String::as_str)
    }

    pub fn has_cookie(&self, key: &str) -> bool {
        self.cookies.contains_key(key)
    }

    /// Decodes the submitted fields according to the method and content type.
    ///
    /// | Request                                   | Result                         |
    /// |-------------------------------------------|--------------------------------|
    /// | `GET`                                     | query parameters as an object  |
    /// | `application/x-www-form-urlencoded` body  | form fields as an object       |
    /// | `application/json` body                   | the parsed document            |
    /// | anything else, or an empty JSON body      | `null`                         |
    ///
    /// # Errors
    ///
    /// [`RouterError::Validation`] when a JSON or form body cannot be decoded.
    pub fn fields(&self) -> Result<Value, RouterError> {
        if self.method == Method::Get {
            return Ok(pairs_to_object(self.query_params.iter().cloned()));
        }

        match self.mime_type() {
            "application/x-www-form-urlencoded" => {
                let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&self.body)?;
                Ok(pairs_to_object(pairs))
            }
            "application/json" if self.body.iter().all(u8::is_ascii_whitespace) => Ok(Value::Null),
            "application/json" => Ok(serde_json::from_slice(&self.body)?),
            _ => Ok(Value::Null),
        }
    }

    /// Deserializes the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// [`RouterError::Validation`] when the body is not valid JSON for `T`.
    pub fn json<T>(&self) -> Result<T, RouterError>
    where
        T: serde::de::DeserializeOwned,
    {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Builder for [`Request`], used by transports that decode HTTP themselves and by tests.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    target: String,
    headers: Headers,
    body: Bytes,
    peer: Option<IpAddr>,
}

impl RequestBuilder {
    fn new(method: Method, target: &str) -> Self {
        Self {
            method,
            target: target.to_owned(),
            headers: Headers::new(),
            body: Bytes::new(),
            peer: None,
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body along with matching `Content-Type` and `Accept` headers.
    #[must_use]
    pub fn json(self, value: &Value) -> Self {
        self.header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(value.to_string())
    }

    #[must_use]
    pub fn peer(mut self, addr: IpAddr) -> Self {
        self.peer = Some(addr);
        self
    }

    pub fn build(self) -> Request {
        let (path, query) = match self.target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (self.target, None),
        };
        let path = if path.is_empty() { "/".to_owned() } else { path };

        // An undecodable query string yields no parameters; the raw string is still kept.
        let query_params: Vec<(String, String)> = query
            .as_deref()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default();
        let cookies = parse_cookie_header(self.headers.get_all("cookie"));

        Request {
            method: self.method,
            path,
            query,
            query_params,
            headers: self.headers,
            cookies,
            body: self.body,
            peer: self.peer,
        }
    }
}

fn pairs_to_object(pairs: impl IntoIterator<Item = (String, String)>) -> Value {
    let mut object = Map::new();
    for (key, value) in pairs {
        object.insert(key, Value::String(value));
    }
    Value::Object(object)
}
