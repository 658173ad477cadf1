//! Per-request context threaded through middleware and actions.
//!
//! A [`Context`] bundles the immutable [`Request`], the path [`Parameters`]
//! captured by the matched route template, and a type-keyed [`Extensions`] map
//! middleware can use to hand values (an authenticated user, a request id) to
//! the layers below it.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    str::FromStr,
    sync::Arc,
};

use crate::Request;

/// Type-erased request extensions map.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value of the same type.
    pub fn insert<T>(&mut self, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Placeholder bindings captured from the matched route template.
///
/// # Examples
///
/// ```
/// use routekit::context::Parameters;
///
/// let mut params = Parameters::new();
/// params.insert("id", "42");
/// assert_eq!(params.get("id"), Some("42"));
/// assert_eq!(params.parse::<u32>("id"), Some(42));
/// ```
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Parse a binding into `T`; `None` when absent or unparsable.
    pub fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key)?.parse().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Per-request state handed to every middleware and to the terminal action.
pub struct Context {
    request: Arc<Request>,
    params: Parameters,
    extensions: Extensions,
}

impl Context {
    /// A context with no path bindings.
    pub fn new(request: Request) -> Self {
        Self::with_params(Arc::new(request), Parameters::new())
    }

    pub fn with_params(request: Arc<Request>, params: Parameters) -> Self {
        Self {
            request,
            params,
            extensions: Extensions::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// A shared handle to the request, for work that outlives the context.
    pub fn shared_request(&self) -> Arc<Request> {
        Arc::clone(&self.request)
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Shorthand for `ctx.params().get(key)`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
