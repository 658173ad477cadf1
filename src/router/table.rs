//! The route table: path templates bucketed in registration order.

use std::{collections::HashMap, fmt};

use super::{Handler, IntoHandler, pattern::Pattern};
use crate::{context::Parameters, error::RouterError, http::Method};

/// The verb a route answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMethod {
    Only(Method),
    /// Registered with [`RouteBuilder::any`](super::RouteBuilder::any); answers every verb.
    Any,
}

impl RouteMethod {
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Only(m) => m == method,
        }
    }
}

impl From<Method> for RouteMethod {
    fn from(method: Method) -> Self {
        Self::Only(method)
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("ANY"),
            Self::Only(m) => f.write_str(m.as_str()),
        }
    }
}

/// What runs once the middleware chain reaches the end.
#[derive(Clone)]
pub enum Action {
    /// An inline async function.
    Handler(Handler),
    /// A method name looked up on the route's controller.
    Method(String),
    /// A `(controller, method)` pair that overrides any scoped controller.
    Controller { controller: String, method: String },
}

impl Action {
    pub fn handler(handler: impl IntoHandler) -> Self {
        Self::Handler(super::erase(handler))
    }

    pub fn method(name: impl Into<String>) -> Self {
        Self::Method(name.into())
    }

    pub fn controller(controller: impl Into<String>, method: impl Into<String>) -> Self {
        Self::Controller {
            controller: controller.into(),
            method: method.into(),
        }
    }
}

impl From<&str> for Action {
    fn from(method: &str) -> Self {
        Self::method(method)
    }
}

impl From<String> for Action {
    fn from(method: String) -> Self {
        Self::Method(method)
    }
}

impl From<(&str, &str)> for Action {
    fn from((controller, method): (&str, &str)) -> Self {
        Self::controller(controller, method)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Method(name) => f.debug_tuple("Method").field(name).finish(),
            Self::Controller { controller, method } => f
                .debug_struct("Controller")
                .field("controller", controller)
                .field("method", method)
                .finish(),
        }
    }
}

/// A single registered route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub method: RouteMethod,
    /// The full template, prefix included.
    pub path: String,
    /// The controller in scope at registration, if any.
    pub controller: Option<String>,
    pub action: Action,
    /// Middleware identifiers, outermost first, without duplicates.
    pub middlewares: Vec<String>,
    pub name: Option<String>,
}

impl RouteEntry {
    /// The controller this route dispatches to, if its action is a method name.
    pub fn controller_name(&self) -> Option<&str> {
        match &self.action {
            Action::Controller { controller, .. } => Some(controller),
            Action::Method(_) => self.controller.as_deref(),
            Action::Handler(_) => None,
        }
    }
}

/// Outcome of looking a request up in the table.
#[derive(Debug)]
pub struct MatchResult<'a> {
    /// Some template matched the path.
    pub exists: bool,
    /// An entry in that template's bucket accepts the method.
    pub method_matches: bool,
    /// The matched entry, or the bucket's first entry when only the path matched.
    pub route: Option<&'a RouteEntry>,
    /// Placeholder bindings captured from the path.
    pub params: Parameters,
}

impl MatchResult<'_> {
    fn missing() -> Self {
        Self {
            exists: false,
            method_matches: false,
            route: None,
            params: Parameters::new(),
        }
    }
}

// Every entry registered under one template, in registration order.
#[derive(Debug, Clone)]
struct Bucket {
    template: String,
    entries: Vec<RouteEntry>,
}

/// Routes grouped by template.
///
/// Buckets keep the order in which their template was first registered, and
/// lookup scans them in that order. The first template whose pattern matches
/// the path decides the outcome even when a later template would also match.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    buckets: Vec<Bucket>,
    index: HashMap<String, usize>,
    names: HashMap<String, (usize, usize)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry` to its template's bucket, creating the bucket if needed.
    ///
    /// A named entry replaces any earlier holder of that name. Returns the
    /// entry's `(bucket, position)` coordinates.
    pub fn insert(&mut self, entry: RouteEntry) -> (usize, usize) {
        let bucket = match self.index.get(&entry.path) {
            Some(&i) => i,
            None => {
                self.buckets.push(Bucket {
                    template: entry.path.clone(),
                    entries: Vec::new(),
                });
                self.index.insert(entry.path.clone(), self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };

        let entries = &mut self.buckets[bucket].entries;
        if let Some(name) = &entry.name {
            self.names.insert(name.clone(), (bucket, entries.len()));
        }
        entries.push(entry);
        (bucket, entries.len() - 1)
    }

    /// Gives the entry at `at` a name, replacing any earlier holder of that name.
    pub(crate) fn rename(&mut self, at: (usize, usize), name: &str) {
        if let Some(entry) = self
            .buckets
            .get_mut(at.0)
            .and_then(|b| b.entries.get_mut(at.1))
        {
            entry.name = Some(name.to_owned());
            self.names.insert(name.to_owned(), at);
        }
    }

    /// Every entry registered under `template`, in registration order.
    pub fn get(&self, template: &str) -> Option<&[RouteEntry]> {
        self.index
            .get(template)
            .map(|&i| self.buckets[i].entries.as_slice())
    }

    /// Templates in first-registration order.
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.template.as_str())
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteEntry> {
        self.buckets.iter().flat_map(|b| b.entries.iter())
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn route(&self, name: &str) -> Option<&RouteEntry> {
        let &(bucket, pos) = self.names.get(name)?;
        self.buckets.get(bucket)?.entries.get(pos)
    }

    /// Builds the path for the route called `name`, substituting `params` into
    /// its placeholders. `None` if there is no such route or a placeholder has
    /// no value.
    pub fn url(&self, name: &str, params: &Parameters) -> Option<String> {
        let template = &self.route(name)?.path;
        let mut url = String::with_capacity(template.len());
        let mut rest = template.as_str();
        while let Some(open) = rest.find('{') {
            let Some(len) = rest[open..].find('}') else {
                break;
            };
            url.push_str(&rest[..open]);
            url.push_str(params.get(&rest[open + 1..open + len])?);
            rest = &rest[open + len + 1..];
        }
        url.push_str(rest);
        Some(url)
    }

    /// Finds the route for `path` and `method`.
    ///
    /// Templates are tried in first-registration order and the first whose
    /// pattern matches wins. Within its bucket an entry registered for exactly
    /// `method` is preferred, then the first `ANY` entry; if neither exists the
    /// bucket's first entry is reported with `method_matches == false`.
    ///
    /// # Errors
    ///
    /// [`RouterError::Pattern`] if a template tried along the way does not compile.
    pub fn find(&self, path: &str, method: &Method) -> Result<MatchResult<'_>, RouterError> {
        for bucket in &self.buckets {
            let pattern = Pattern::compile(&bucket.template)?;
            let Some(params) = pattern.captures(path) else {
                continue;
            };

            let accepted = bucket
                .entries
                .iter()
                .find(|e| matches!(&e.method, RouteMethod::Only(m) if m == method))
                .or_else(|| bucket.entries.iter().find(|e| e.method == RouteMethod::Any));
            return Ok(MatchResult {
                exists: true,
                method_matches: accepted.is_some(),
                route: accepted.or_else(|| bucket.entries.first()),
                params,
            });
        }

        Ok(MatchResult::missing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(method: RouteMethod, path: &str, action: &str) -> RouteEntry {
        RouteEntry {
            method,
            path: path.to_owned(),
            controller: Some("pages".to_owned()),
            action: Action::method(action),
            middlewares: Vec::new(),
            name: None,
        }
    }

    fn action_of(result: &MatchResult<'_>) -> String {
        match &result.route.unwrap().action {
            Action::Method(name) => name.clone(),
            other => panic!("unexpected action {other:?}"),
        }
    }

    // ── buckets ───────────────────────────────────────────────────────────────

    #[test]
    fn entries_share_a_bucket_per_template() {
        let mut table = RouteTable::new();
        table.insert(entry(Method::Get.into(), "/users", "index"));
        table.insert(entry(Method::Get.into(), "/about", "about"));
        table.insert(entry(Method::Post.into(), "/users", "store"));

        assert_eq!(table.len(), 3);
        assert_eq!(table.templates().collect::<Vec<_>>(), ["/users", "/about"]);
        assert_eq!(table.get("/users").unwrap().len(), 2);
        assert!(table.get("/missing").is_none());
    }

    // ── find ──────────────────────────────────────────────────────────────────

    #[test]
    fn method_selects_entry_within_bucket() {
        let mut table = RouteTable::new();
        table.insert(entry(Method::Get.into(), "/users", "index"));
        table.insert(entry(Method::Post.into(), "/users", "store"));

        let found = table.find("/users", &Method::Post).unwrap();
        assert!(found.exists && found.method_matches);
        assert_eq!(action_of(&found), "store");
    }

    #[test]
    fn wrong_method_reports_first_entry() {
        let mut table = RouteTable::new();
        table.insert(entry(Method::Get.into(), "/users", "index"));
        table.insert(entry(Method::Post.into(), "/users", "store"));

        let found = table.find("/users", &Method::Delete).unwrap();
        assert!(found.exists);
        assert!(!found.method_matches);
        assert_eq!(action_of(&found), "index");
    }

    #[test]
    fn any_accepts_every_method() {
        let mut table = RouteTable::new();
        table.insert(entry(RouteMethod::Any, "/hook", "hook"));
        for method in [Method::Get, Method::Patch, Method::Custom("PURGE".into())] {
            assert!(table.find("/hook", &method).unwrap().method_matches);
        }
    }

    #[test]
    fn exact_method_beats_earlier_any() {
        let mut table = RouteTable::new();
        table.insert(entry(RouteMethod::Any, "/hook", "catch_all"));
        table.insert(entry(Method::Get.into(), "/hook", "show"));

        let get = table.find("/hook", &Method::Get).unwrap();
        assert!(get.method_matches);
        assert_eq!(action_of(&get), "show");

        let post = table.find("/hook", &Method::Post).unwrap();
        assert!(post.method_matches);
        assert_eq!(action_of(&post), "catch_all");
    }

    #[test]
    fn unknown_path_does_not_exist() {
        let mut table = RouteTable::new();
        table.insert(entry(Method::Get.into(), "/users", "index"));
        let found = table.find("/nope", &Method::Get).unwrap();
        assert!(!found.exists && !found.method_matches);
        assert!(found.route.is_none());
    }

    #[test]
    fn placeholder_bindings_are_captured() {
        let mut table = RouteTable::new();
        table.insert(entry(Method::Get.into(), "/users/{id}", "show"));
        let found = table.find("/users/42/", &Method::Get).unwrap();
        assert_eq!(found.params.get("id"), Some("42"));
        assert!(!table.find("/users/42/edit", &Method::Get).unwrap().exists);
    }

    #[test]
    fn first_registered_template_wins_over_more_specific() {
        let mut table = RouteTable::new();
        table.insert(entry(Method::Get.into(), "/a/{x}", "param"));
        table.insert(entry(Method::Get.into(), "/a/fixed", "literal"));

        let found = table.find("/a/fixed", &Method::Get).unwrap();
        assert_eq!(action_of(&found), "param");
        assert_eq!(found.params.get("x"), Some("fixed"));
    }

    #[test]
    fn first_matching_template_decides_method_mismatch() {
        let mut table = RouteTable::new();
        table.insert(entry(Method::Post.into(), "/a/{x}", "param"));
        table.insert(entry(Method::Get.into(), "/a/fixed", "literal"));

        let found = table.find("/a/fixed", &Method::Get).unwrap();
        assert!(found.exists);
        assert!(!found.method_matches);
    }

    #[test]
    fn broken_template_surfaces_at_lookup() {
        let mut table = RouteTable::new();
        table.insert(entry(Method::Get.into(), "/x/{id}/{id}", "broken"));
        assert!(matches!(
            table.find("/x/1/2", &Method::Get),
            Err(RouterError::Pattern(_))
        ));
    }

    // ── names ─────────────────────────────────────────────────────────────────

    #[test]
    fn named_route_url() {
        let mut table = RouteTable::new();
        let mut show = entry(Method::Get.into(), "/users/{id}/posts/{post}", "show");
        show.name = Some("posts.show".into());
        table.insert(show);

        let params: Parameters = [("id", "3"), ("post", "intro")].into_iter().collect();
        assert_eq!(
            table.url("posts.show", &params).as_deref(),
            Some("/users/3/posts/intro")
        );
        assert!(table.url("posts.show", &Parameters::new()).is_none());
        assert!(table.url("nope", &params).is_none());
    }

    #[test]
    fn rename_moves_the_name() {
        let mut table = RouteTable::new();
        let at = table.insert(entry(Method::Get.into(), "/", "home"));
        table.rename(at, "home");
        assert_eq!(table.route("home").unwrap().path, "/");
        assert_eq!(table.url("home", &Parameters::new()).as_deref(), Some("/"));
    }
}
