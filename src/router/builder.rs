//! Fluent route registration with nestable scopes.

use super::{
    IntoHandler,
    table::{Action, RouteEntry, RouteMethod, RouteTable},
};
use crate::http::Method;

// Ambient state the scoping combinators extend and restore.
#[derive(Debug, Clone, Default)]
struct Scope {
    prefix: String,
    controller: Option<String>,
    middlewares: Vec<String>,
}

/// Collects routes into a [`RouteTable`].
///
/// Scoping combinators ([`prefix`](Self::prefix), [`controller`](Self::controller),
/// [`middleware`](Self::middleware), [`group`](Self::group)) extend the ambient
/// scope for the duration of a closure and restore it afterwards, so they nest:
/// prefixes concatenate, middleware lists append, and an inner controller
/// replaces an outer one.
///
/// Registration never fails. Problems such as an unknown middleware identifier
/// or a method-name action without a controller surface from
/// [`Router::validate`](super::Router::validate) or at dispatch.
///
/// # Examples
///
/// ```rust
/// use routekit::http::Method;
/// use routekit::router::RouteBuilder;
/// use routekit::{Context, Response, RouterError};
///
/// let mut routes = RouteBuilder::new();
/// routes.get("/", |_ctx: Context, response: Response| async move {
///     Ok::<_, RouterError>(response.message("home"))
/// });
/// routes.prefix("/api", |api| {
///     api.middleware(&["auth"], |api| {
///         api.controller("users", |users| {
///             users.route(Method::Get, "/users", "index").name("users.index");
///             users.route(Method::Get, "/users/{id}", "show");
///         });
///     });
/// });
///
/// let table = routes.build();
/// let index = table.route("users.index").unwrap();
/// assert_eq!(index.path, "/api/users");
/// assert_eq!(index.middlewares, ["auth"]);
/// assert_eq!(index.controller.as_deref(), Some("users"));
/// ```
#[derive(Debug, Default)]
pub struct RouteBuilder {
    table: RouteTable,
    scope: Scope,
    last: Option<(usize, usize)>,
}

impl RouteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a `GET` route.
    ///
    /// # Arguments
    ///
    /// - `path`: a template such as `/users/{id}`, appended to the current prefix.
    /// - `handler`: an async function or closure taking `(Context, Response)`
    ///   and returning `Result<Response, RouterError>`.
    ///
    /// # Returns
    ///
    /// The builder, so registrations and [`name`](Self::name) can be chained.
    /// The verb methods below behave the same for their own method.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Get, path, Action::handler(handler))
    }

    /// Registers a `POST` route.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Post, path, Action::handler(handler))
    }

    pub fn put(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Put, path, Action::handler(handler))
    }

    pub fn patch(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Patch, path, Action::handler(handler))
    }

    /// Registers a `DELETE` route.
    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Delete, path, Action::handler(handler))
    }

    pub fn options(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(Method::Options, path, Action::handler(handler))
    }

    /// Registers a route that answers every method.
    pub fn any(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.route(RouteMethod::Any, path, Action::handler(handler))
    }

    /// Registers `action` for `method` on `path`.
    ///
    /// `action` may be a handler ([`Action::handler`]), a method name on the
    /// scoped controller (`"index"`), or an explicit `("controller", "action")`
    /// pair.
    pub fn route(
        &mut self,
        method: impl Into<RouteMethod>,
        path: &str,
        action: impl Into<Action>,
    ) -> &mut Self {
        self.route_with(method, path, action, &[])
    }

    /// Like [`route`](Self::route), with extra middleware for this route only.
    ///
    /// # Arguments
    ///
    /// - `method`: a [`Method`] or [`RouteMethod::Any`].
    /// - `path`: the template, appended to the current prefix.
    /// - `action`: the handler, method name, or controller pair to run.
    /// - `middlewares`: identifiers appended after the scoped middleware.
    ///   Identifiers already in scope are not repeated.
    pub fn route_with(
        &mut self,
        method: impl Into<RouteMethod>,
        path: &str,
        action: impl Into<Action>,
        middlewares: &[&str],
    ) -> &mut Self {
        let mut stack = self.scope.middlewares.clone();
        for id in middlewares {
            if !stack.iter().any(|m| m == id) {
                stack.push((*id).to_owned());
            }
        }

        let entry = RouteEntry {
            method: method.into(),
            path: format!("{}{}", self.scope.prefix, path),
            controller: self.scope.controller.clone(),
            action: action.into(),
            middlewares: stack,
            name: None,
        };
        self.last = Some(self.table.insert(entry));
        self
    }

    /// Registers `controller::action` for `method` on `path`, regardless of scope.
    pub fn controller_action(
        &mut self,
        method: impl Into<RouteMethod>,
        path: &str,
        controller: &str,
        action: &str,
    ) -> &mut Self {
        self.route(method, path, Action::controller(controller, action))
    }

    /// Names the most recently registered route. Does nothing before the first route.
    pub fn name(&mut self, name: &str) -> &mut Self {
        if let Some(at) = self.last {
            self.table.rename(at, name);
        }
        self
    }

    /// Prepends `prefix` to every path registered inside `f`.
    pub fn prefix(&mut self, prefix: &str, f: impl FnOnce(&mut Self)) -> &mut Self {
        let mut scope = self.scope.clone();
        scope.prefix.push_str(prefix);
        self.scoped(scope, f)
    }

    /// Dispatches method-name actions registered inside `f` to `controller`.
    pub fn controller(&mut self, controller: &str, f: impl FnOnce(&mut Self)) -> &mut Self {
        let mut scope = self.scope.clone();
        scope.controller = Some(controller.to_owned());
        self.scoped(scope, f)
    }

    /// Wraps every route registered inside `f` in `middlewares`.
    pub fn middleware(&mut self, middlewares: &[&str], f: impl FnOnce(&mut Self)) -> &mut Self {
        let mut scope = self.scope.clone();
        for id in middlewares {
            if !scope.middlewares.iter().any(|m| m == id) {
                scope.middlewares.push((*id).to_owned());
            }
        }
        self.scoped(scope, f)
    }

    /// Runs `f` in a copy of the current scope.
    pub fn group(&mut self, f: impl FnOnce(&mut Self)) -> &mut Self {
        let scope = self.scope.clone();
        self.scoped(scope, f)
    }

    fn scoped(&mut self, scope: Scope, f: impl FnOnce(&mut Self)) -> &mut Self {
        let saved = std::mem::replace(&mut self.scope, scope);
        f(self);
        self.scope = saved;
        self
    }

    pub fn build(self) -> RouteTable {
        self.table
    }
}
