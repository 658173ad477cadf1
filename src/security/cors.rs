//! Cross-Origin Resource Sharing and baseline security headers.

use serde::{Deserialize, Deserializer};

use crate::{
    Response,
    context::Context,
    http::{Content, Method},
    middleware::{DispatchFuture, Middleware, Next},
};

/// CORS policy plus the `Content-Security-Policy` and `X-Frame-Options`
/// headers every response carries.
///
/// On `OPTIONS` requests [`apply`](Self::apply) sets the six
/// `Access-Control-*` headers. On every request it sets
/// `Content-Security-Policy` and `X-Frame-Options`, and gives raw bodies
/// without a `Content-Type` the configured one.
///
/// The defaults are:
///
/// | Setting            | Default                                                  |
/// |--------------------|----------------------------------------------------------|
/// | origins            | `*`                                                      |
/// | methods            | `OPTIONS, HEAD, GET, POST, PUT, PATCH, DELETE`           |
/// | headers            | `Authorization, Content-Type, Accept`                    |
/// | exposed headers    | *(none)*                                                 |
/// | max age            | `60`                                                     |
/// | credentials        | `false`                                                  |
/// | content type       | `text/html;charset=utf-8`                                |
/// | CSP                | `default-src 'self'; script-src 'self'; style-src 'self'; img-src https://*` |
/// | X-Frame-Options    | `sameorigin`                                             |
///
/// A policy can also be loaded from configuration; missing keys keep their
/// defaults:
///
/// ```rust
/// use routekit::security::Cors;
///
/// let cors = Cors::from_json(r#"{"origins": ["https://app.example.com"], "max_age": -5}"#).unwrap();
/// assert_eq!(cors.origins(), ["https://app.example.com"]);
/// assert_eq!(cors.max_age(), 0);
/// assert!(!cors.credentials());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Cors {
    origins: Vec<String>,
    methods: Vec<String>,
    headers: Vec<String>,
    exposed_headers: Vec<String>,
    #[serde(deserialize_with = "non_negative")]
    max_age: u64,
    credentials: bool,
    content_type: String,
    content_security_policy: String,
    x_frame_options: String,
}

impl Default for Cors {
    fn default() -> Self {
        Self::new()
    }
}

fn non_negative<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(u64::try_from(i64::deserialize(deserializer)?).unwrap_or(0))
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_owned()).collect()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn joined(list: &[String]) -> String {
    list.iter().map(|v| v.trim()).collect::<Vec<_>>().join(", ")
}

impl Cors {
    pub fn new() -> Self {
        Self {
            origins: strings(&["*"]),
            methods: strings(&["OPTIONS", "HEAD", "GET", "POST", "PUT", "PATCH", "DELETE"]),
            headers: strings(&["Authorization", "Content-Type", "Accept"]),
            exposed_headers: Vec::new(),
            max_age: 60,
            credentials: false,
            content_type: "text/html;charset=utf-8".to_owned(),
            content_security_policy:
                "default-src 'self'; script-src 'self'; style-src 'self'; img-src https://*"
                    .to_owned(),
            x_frame_options: "sameorigin".to_owned(),
        }
    }

    /// Parses a policy from a JSON document.
    ///
    /// # Errors
    ///
    /// Propagates the `serde_json` error for malformed documents or mistyped keys.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Replaces the allowed origins.
    #[must_use]
    pub fn with_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an allowed origin unless it is already present.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        push_unique(&mut self.origins, origin.into());
        self
    }

    #[must_use]
    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn allow_method(mut self, method: impl Into<String>) -> Self {
        push_unique(&mut self.methods, method.into());
        self
    }

    #[must_use]
    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        push_unique(&mut self.headers, header.into());
        self
    }

    #[must_use]
    pub fn with_exposed_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exposed_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn expose_header(mut self, header: impl Into<String>) -> Self {
        push_unique(&mut self.exposed_headers, header.into());
        self
    }

    /// Sets `Access-Control-Max-Age`. Negative values are clamped to zero.
    #[must_use]
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = u64::try_from(seconds).unwrap_or(0);
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, allow: bool) -> Self {
        self.credentials = allow;
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    #[must_use]
    pub fn with_content_security_policy(mut self, policy: impl Into<String>) -> Self {
        self.content_security_policy = policy.into();
        self
    }

    #[must_use]
    pub fn with_x_frame_options(mut self, value: impl Into<String>) -> Self {
        self.x_frame_options = value.into();
        self
    }

    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn exposed_headers(&self) -> &[String] {
        &self.exposed_headers
    }

    /// `Access-Control-Max-Age` in seconds.
    pub fn max_age(&self) -> u64 {
        self.max_age
    }

    pub fn credentials(&self) -> bool {
        self.credentials
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn content_security_policy(&self) -> &str {
        &self.content_security_policy
    }

    pub fn x_frame_options(&self) -> &str {
        &self.x_frame_options
    }

    /// Writes the policy's headers onto `response` for a request made with `method`.
    pub fn apply(&self, method: &Method, response: &mut Response) {
        if *method == Method::Options {
            response.set_header("Access-Control-Allow-Origin", joined(&self.origins));
            response.set_header("Access-Control-Allow-Methods", joined(&self.methods));
            response.set_header("Access-Control-Allow-Headers", joined(&self.headers));
            response.set_header(
                "Access-Control-Expose-Headers",
                joined(&self.exposed_headers),
            );
            response.set_header("Access-Control-Max-Age", self.max_age.to_string());
            response.set_header(
                "Access-Control-Allow-Credentials",
                if self.credentials { "true" } else { "false" },
            );
        }

        if matches!(response.content(), Content::Raw(_)) {
            response.set_default_header("Content-Type", self.content_type.as_str());
        }
        response.set_header(
            "Content-Security-Policy",
            self.content_security_policy.as_str(),
        );
        response.set_header("X-Frame-Options", self.x_frame_options.as_str());
    }
}

impl Middleware for Cors {
    fn handle(&self, ctx: Context, response: Response, next: Next) -> DispatchFuture {
        let cors = self.clone();
        Box::pin(async move {
            let method = ctx.request().method().clone();
            let mut response = next.run(ctx, response).await?;
            cors.apply(&method, &mut response);
            Ok(response)
        })
    }
}
