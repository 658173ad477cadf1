//! `Set-Cookie` builder and `Cookie` header parsing.

use std::collections::HashMap;
use std::fmt;

/// `SameSite` attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// A cookie to be sent with [`Response::set_cookie`](super::Response::set_cookie).
///
/// Defaults: path `/`, one hour lifetime, `HttpOnly`, `SameSite=Lax`, not `Secure`.
///
/// # Examples
///
/// ```
/// use routekit::http::Cookie;
///
/// let cookie = Cookie::new("session", "abc").secure(true);
/// assert_eq!(
///     cookie.to_string(),
///     "session=abc; Max-Age=3600; Path=/; Secure; HttpOnly; SameSite=Lax"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    max_age: i64,
    path: String,
    domain: Option<String>,
    secure: bool,
    http_only: bool,
    same_site: SameSite,
}

impl Cookie {
    /// Default lifetime in seconds.
    pub const DEFAULT_MAX_AGE: i64 = 3600;

    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: Self::DEFAULT_MAX_AGE,
            path: "/".to_owned(),
            domain: None,
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }

    /// A cookie that tells the client to drop `name` immediately.
    pub fn removal(name: impl Into<String>) -> Self {
        Self::new(name, "").max_age(0)
    }

    #[must_use]
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds.max(0);
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Max-Age={}; Path={}",
            self.name, self.value, self.max_age, self.path
        )?;
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        write!(f, "; SameSite={}", self.same_site.as_str())
    }
}

/// Parses `Cookie` request header values into a name → value map.
///
/// Later duplicates do not overwrite earlier ones, matching how browsers order
/// cookies from most to least specific path.
pub(crate) fn parse_cookie_header<'a>(values: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for pair in values.flat_map(|v| v.split(';')) {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        cookies
            .entry(name.to_owned())
            .or_insert_with(|| value.trim().trim_matches('"').to_owned());
    }
    cookies
}
