//! Outbound HTTP responses.
//!
//! A [`Response`] is created empty at the start of dispatch, handed to every
//! middleware and the terminal action, decorated fluently along the way, and
//! finally consumed once by [`Response::send`].
//!
//! By default the body is the JSON envelope
//! `{"code": .., "success": .., "messages": [..], "data": {..}}`. Calling
//! [`html`](Response::html) or [`body`](Response::body) switches to a raw body.

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use serde_json::{Map, Value};

use super::{Cookie, Headers, Method, StatusCode};

/// What [`Response::send`] writes after the headers.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// The JSON envelope built from status, success flag, messages, and data.
    Envelope,
    /// Raw bytes; the `Content-Type` header describes them.
    Raw(Vec<u8>),
}

#[derive(Serialize)]
struct Envelope<'a> {
    code: u16,
    success: bool,
    messages: &'a [String],
    data: &'a Value,
}

/// An HTTP/1.1 response under construction.
///
/// # Examples
///
/// ```
/// use routekit::http::{Method, Response, StatusCode};
/// use serde_json::json;
///
/// let response = Response::new()
///     .with_status(StatusCode::Created)
///     .message("user created")
///     .with_data(json!({"id": 7}));
///
/// let bytes = response.send(&Method::Post);
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
/// assert!(text.ends_with(r#"{"code":201,"success":true,"messages":["user created"],"data":{"id":7}}"#));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    success: bool,
    cache: bool,
    headers: Headers,
    messages: Vec<String>,
    data: Value,
    content: Content,
}

impl Response {
    /// A `200 OK` response carrying an empty envelope.
    pub fn new() -> Self {
        Self {
            status: StatusCode::Ok,
            success: true,
            cache: false,
            headers: Headers::new(),
            messages: Vec::new(),
            data: Value::Object(Map::new()),
            content: Content::Envelope,
        }
    }

    /// Sets the status. The success flag follows the status class (`2xx` → `true`).
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self.success = status.is_success();
        self
    }

    /// Overrides the success flag reported in the envelope.
    #[must_use]
    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Lets clients cache the response for 60 seconds instead of forbidding caching.
    #[must_use]
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place, for middleware decorating a downstream response.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Replaces a header in-place.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Sets a header in-place unless one with the same name is already present.
    pub fn set_default_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set_default(name, value);
    }

    /// Appends a message to the envelope.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    /// Replaces the envelope messages.
    #[must_use]
    pub fn with_messages<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.messages = messages.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the envelope `data` payload and switches back to envelope mode.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self.content = Content::Envelope;
        self
    }

    /// Serializes `value` into the envelope `data` payload.
    ///
    /// # Errors
    ///
    /// Propagates the serializer error when `value` cannot be represented as JSON.
    pub fn json<T: Serialize>(self, value: &T) -> Result<Self, serde_json::Error> {
        Ok(self.with_data(serde_json::to_value(value)?))
    }

    /// Sets an HTML body.
    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.headers.set("Content-Type", "text/html; charset=utf-8");
        self.content = Content::Raw(html.into().into_bytes());
        self
    }

    /// Sets a raw body. `text/plain` is assumed unless a `Content-Type` is set.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.content = Content::Raw(body.into());
        self
    }

    /// Adds a `Set-Cookie` header.
    #[must_use]
    pub fn set_cookie(mut self, cookie: Cookie) -> Self {
        self.headers.insert("Set-Cookie", cookie.to_string());
        self
    }

    /// Tells the client to drop the cookie `name`.
    #[must_use]
    pub fn remove_cookie(self, name: impl Into<String>) -> Self {
        self.set_cookie(Cookie::removal(name))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_cached(&self) -> bool {
        self.cache
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// The body bytes as they would be sent for a non-`HEAD` request.
    pub fn body_bytes(&self) -> Vec<u8> {
        match &self.content {
            Content::Envelope => {
                let envelope = Envelope {
                    code: self.status.as_u16(),
                    success: self.success,
                    messages: &self.messages,
                    data: &self.data,
                };
                // Only strings, bools, integers and an existing `Value` are serialized here.
                serde_json::to_vec(&envelope).unwrap_or_default()
            }
            Content::Raw(bytes) => bytes.clone(),
        }
    }

    /// Serializes the response into HTTP/1.1 wire format for a request made with `method`.
    ///
    /// Adds `Cache-Control`, a default `Content-Type`, and `Content-Length`.
    /// Responses to `HEAD` and `OPTIONS` carry no body; `HEAD` still
    /// advertises the length and type the `GET` body would have.
    pub fn send(mut self, method: &Method) -> BytesMut {
        let mut body = self.body_bytes();
        let content_length = if *method == Method::Options {
            0
        } else {
            body.len()
        };
        if method.is_bodiless() {
            body.clear();
        }

        let cache_control = if self.cache {
            "max-age=60"
        } else {
            "no-cache, no-store"
        };
        self.headers.set("Cache-Control", cache_control);

        if content_length > 0 {
            let default_type = match self.content {
                Content::Envelope => "application/json",
                Content::Raw(_) => "text/plain; charset=utf-8",
            };
            self.headers.set_default("Content-Type", default_type);
        }

        let estimated_size = 128 + self.headers.len() * 64 + body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);
        buf.put(body.as_slice());

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
