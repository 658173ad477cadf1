//! Request routing: map path templates and HTTP methods to actions.
//!
//! Routes are registered with a [`RouteBuilder`] and collected into a
//! [`RouteTable`]. A [`Router`] owns the table together with the middleware and
//! controller registries its routes refer to, and turns a [`Request`] into a
//! [`Response`].
//!
//! | Template             | Example match        | Captured params        |
//! |----------------------|----------------------|------------------------|
//! | `/users`             | `/users`, `/users/`  | *(none)*               |
//! | `/users/{id}`        | `/users/42`          | `id → "42"`            |
//! | `/files/{name}.{ext}`| `/files/a.pdf`       | `name → "a"`, `ext → "pdf"` |
//!
//! Templates are tried in the order they were first registered and the first
//! one whose pattern matches the path decides the outcome, even when a later
//! template is more specific.

pub mod builder;
pub mod pattern;
pub mod table;

use std::{future::Future, sync::Arc};

use tracing::debug;

pub use builder::RouteBuilder;
pub use pattern::{Pattern, PatternError};
pub use table::{Action, MatchResult, RouteEntry, RouteMethod, RouteTable};

use crate::{
    Request, Response,
    context::{Context, Parameters},
    controller::ControllerRegistry,
    error::{HttpError, RouterError},
    http::Method,
    middleware::{DispatchFuture, Endpoint, MiddlewareRegistry, Next},
};

/// Type-erased, heap-allocated async handler.
///
/// Handlers receive the per-request [`Context`] and the [`Response`] threaded
/// through the middleware chain, and return the final response or an error.
/// Construct one through [`RouteBuilder::get`] and friends or
/// [`Action::handler`].
pub type Handler = Arc<dyn Fn(Context, Response) -> DispatchFuture + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context, Response) -> impl Future<Output = Result<Response, RouterError>> + Send`
/// that is also `Send + Sync + 'static` implements this trait through the
/// blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context, response: Response) -> DispatchFuture;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context, Response) -> F + Send + Sync + 'static,
    F: Future<Output = Result<Response, RouterError>> + Send + 'static,
{
    fn call(&self, ctx: Context, response: Response) -> DispatchFuture {
        Box::pin((self)(ctx, response))
    }
}

// Erase the concrete handler type and store it as a `Handler` trait object.
pub(crate) fn erase(handler: impl IntoHandler) -> Handler {
    Arc::new(move |ctx: Context, response: Response| handler.call(ctx, response))
}

/// Dispatches requests against a [`RouteTable`].
///
/// The table and both registries are immutable once the router is built and
/// shared behind `Arc`, so a router can serve concurrent requests.
///
/// # Examples
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use routekit::{Context, Request, Response, Router, RouterError, http::Method, router::RouteBuilder};
///
/// let mut routes = RouteBuilder::new();
/// routes.get("/users/{id}", |ctx: Context, response: Response| async move {
///     let id = ctx.param("id").unwrap_or_default().to_owned();
///     Ok::<_, RouterError>(response.message(format!("user {id}")))
/// });
///
/// let router = Router::new(routes.build());
/// let response = router
///     .resolve(Request::builder(Method::Get, "/users/42").build())
///     .await
///     .unwrap();
/// assert_eq!(response.messages(), ["user 42"]);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Router {
    table: Arc<RouteTable>,
    middlewares: Arc<MiddlewareRegistry>,
    controllers: Arc<ControllerRegistry>,
}

impl Router {
    /// Creates a router over a built route table.
    ///
    /// # Arguments
    ///
    /// - `table`: the routes, usually from [`RouteBuilder::build`].
    ///
    /// # Returns
    ///
    /// A `Router` with empty middleware and controller registries. Routes that
    /// name middleware or controllers need [`with_middlewares`](Self::with_middlewares)
    /// and [`with_controllers`](Self::with_controllers) before they can dispatch.
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: Arc::new(table),
            ..Self::default()
        }
    }

    /// Replaces the middleware registry.
    ///
    /// # Arguments
    ///
    /// - `registry`: resolves the identifiers routes list in their middleware
    ///   stacks. It is shared, not copied, by clones of this router.
    #[must_use]
    pub fn with_middlewares(mut self, registry: MiddlewareRegistry) -> Self {
        self.middlewares = Arc::new(registry);
        self
    }

    /// Replaces the controller registry.
    ///
    /// # Arguments
    ///
    /// - `registry`: constructs the controllers named by method-name and
    ///   `(controller, action)` routes.
    #[must_use]
    pub fn with_controllers(mut self, registry: ControllerRegistry) -> Self {
        self.controllers = Arc::new(registry);
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn middlewares(&self) -> &MiddlewareRegistry {
        &self.middlewares
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    /// Path for the route called `name`; see [`RouteTable::url`].
    pub fn url(&self, name: &str, params: &Parameters) -> Option<String> {
        self.table.url(name, params)
    }

    /// Checks every registered route against the registries.
    ///
    /// # Errors
    ///
    /// The first problem found, in registration order:
    /// - [`RouterError::Pattern`]: a template does not compile.
    /// - [`RouterError::Configuration`]: an unknown middleware identifier, a
    ///   method-name action with no controller in scope, or an unregistered
    ///   controller.
    pub fn validate(&self) -> Result<(), RouterError> {
        for template in self.table.templates() {
            Pattern::compile(template)?;
        }

        for route in self.table.routes() {
            if let Some(missing) = route
                .middlewares
                .iter()
                .find(|id| !self.middlewares.contains(id))
            {
                return Err(RouterError::configuration(format!(
                    "route {} {} uses unregistered middleware `{missing}`",
                    route.method, route.path
                )));
            }

            if matches!(route.action, Action::Handler(_)) {
                continue;
            }
            match route.controller_name() {
                None => {
                    return Err(RouterError::configuration(format!(
                        "route {} {} names an action but no controller is in scope",
                        route.method, route.path
                    )));
                }
                Some(name) if !self.controllers.contains(name) => {
                    return Err(RouterError::configuration(format!(
                        "route {} {} uses unregistered controller `{name}`",
                        route.method, route.path
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Looks up the route for `path` and `method` without dispatching.
    ///
    /// # Errors
    ///
    /// [`RouterError::Pattern`] if a template tried along the way does not compile.
    pub fn find(&self, path: &str, method: &Method) -> Result<MatchResult<'_>, RouterError> {
        self.table.find(path, method)
    }

    /// Dispatches `request`, starting from an empty [`Response`].
    ///
    /// # Errors
    ///
    /// See [`resolve_with`](Self::resolve_with).
    pub async fn resolve(&self, request: Request) -> Result<Response, RouterError> {
        self.resolve_with(request, Response::new()).await
    }

    /// Dispatches `request`, threading `response` through the middleware chain.
    ///
    /// # Arguments
    ///
    /// - `request`: the incoming request; it ends up shared inside the [`Context`].
    /// - `response`: the starting response handed to the outermost middleware.
    ///
    /// # Returns
    ///
    /// The [`Response`] produced by the action, as decorated on the way out by
    /// each middleware.
    ///
    /// # Errors
    ///
    /// - [`RouterError::Http`] with `404` when no template matches the path, or
    ///   `405` when the matched template has no entry for the method.
    /// - [`RouterError::Configuration`] for an unknown middleware identifier
    ///   (before any middleware runs), an unknown controller or action, or an
    ///   action that produces no response.
    /// - [`RouterError::Pattern`] for a template that does not compile.
    /// - Any error returned by a middleware or the action.
    pub async fn resolve_with(
        &self,
        request: Request,
        response: Response,
    ) -> Result<Response, RouterError> {
        let found = self.table.find(request.path(), request.method())?;
        let route = match found.route {
            Some(route) if found.exists && found.method_matches => route,
            _ if found.exists => return Err(HttpError::method_not_allowed().into()),
            _ => return Err(HttpError::not_found().into()),
        };

        debug!(
            method = %request.method(),
            path = request.path(),
            route = route.path.as_str(),
            middlewares = route.middlewares.len(),
            "route resolved"
        );

        let chain = self.middlewares.chain(&route.middlewares)?;
        let endpoint = self.endpoint(route)?;
        let ctx = Context::with_params(Arc::new(request), found.params);

        Next::new(chain, endpoint).run(ctx, response).await
    }

    // Builds the innermost layer for `route`.
    fn endpoint(&self, route: &RouteEntry) -> Result<Endpoint, RouterError> {
        let (controller, action) = match &route.action {
            Action::Handler(handler) => {
                let handler = handler.clone();
                return Ok(Box::new(move |ctx: Context, response: Response| -> DispatchFuture {
                    handler(ctx, response)
                }));
            }
            Action::Method(action) => match &route.controller {
                Some(controller) => (controller.clone(), action.clone()),
                None => {
                    return Err(RouterError::configuration(format!(
                        "action `{action}` on {} has no controller",
                        route.path
                    )));
                }
            },
            Action::Controller { controller, method } => (controller.clone(), method.clone()),
        };

        if !self.controllers.contains(&controller) {
            return Err(RouterError::configuration(format!(
                "controller `{controller}` is not registered"
            )));
        }

        let controllers = Arc::clone(&self.controllers);
        Ok(Box::new(move |ctx: Context, response: Response| -> DispatchFuture {
            Box::pin(async move {
                let bodiless = ctx.request().method().is_bodiless();
                let fallback = bodiless.then(|| response.clone());

                let instance = controllers.instantiate(&controller, ctx, response).ok_or_else(|| {
                    RouterError::configuration(format!("controller `{controller}` is not registered"))
                })?;
                let Some(call) = instance.call(&action) else {
                    return Err(RouterError::configuration(format!(
                        "action `{action}` does not exist on controller `{controller}`"
                    )));
                };

                match (call.await?, fallback) {
                    (Some(response), _) => Ok(response),
                    (None, Some(fallback)) => Ok(fallback),
                    (None, None) => Err(RouterError::configuration(format!(
                        "action `{controller}::{action}` did not return a response"
                    ))),
                }
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        controller::{Controller, ControllerFuture, respond},
        http::StatusCode,
        middleware::{Middleware, from_fn},
    };
    use parking_lot::Mutex;

    type Trace = Arc<Mutex<Vec<String>>>;

    fn request(method: Method, path: &str) -> Request {
        Request::builder(method, path).build()
    }

    fn labelled(label: &'static str) -> impl IntoHandler {
        move |_ctx: Context, response: Response| async move {
            Ok::<_, RouterError>(response.message(label))
        }
    }

    struct Tracer {
        label: &'static str,
        trace: Trace,
    }

    impl Middleware for Tracer {
        fn handle(&self, ctx: Context, response: Response, next: Next) -> DispatchFuture {
            let label = self.label;
            let trace = self.trace.clone();
            Box::pin(async move {
                trace.lock().push(label.to_owned());
                let result = next.run(ctx, response).await;
                trace.lock().push(label.to_owned());
                result
            })
        }
    }

    struct Users {
        ctx: Context,
        response: Response,
    }

    impl Controller for Users {
        fn construct(ctx: Context, response: Response) -> Self {
            Self { ctx, response }
        }

        fn call(self: Box<Self>, action: &str) -> Option<ControllerFuture> {
            match action {
                "show" => {
                    let id = self.ctx.param("id").unwrap_or_default().to_owned();
                    respond(async move { Ok(self.response.message(format!("user {id}"))) })
                }
                "silent" => Some(Box::pin(async { Ok::<Option<Response>, RouterError>(None) })),
                _ => None,
            }
        }
    }

    fn controllers() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry.register::<Users>("users");
        registry
    }

    async fn messages(router: &Router, method: Method, path: &str) -> Vec<String> {
        router
            .resolve(request(method, path))
            .await
            .unwrap()
            .messages()
            .to_vec()
    }

    // ── matching ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_router_is_not_found() {
        let err = Router::default()
            .resolve(request(Method::Get, "/"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn literal_and_placeholder_routes() {
        let mut routes = RouteBuilder::new();
        routes.get("/about", labelled("about"));
        routes.get("/users/{id}", |ctx: Context, response: Response| async move {
            let id = ctx.param("id").unwrap_or_default().to_owned();
            Ok::<_, RouterError>(response.message(id))
        });
        let router = Router::new(routes.build());

        assert_eq!(messages(&router, Method::Get, "/about").await, ["about"]);
        assert_eq!(messages(&router, Method::Get, "/users/42").await, ["42"]);
        assert_eq!(messages(&router, Method::Get, "/users/42/").await, ["42"]);

        let err = router
            .resolve(request(Method::Get, "/users/42/extra"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn exact_verb_route_beats_earlier_any_route() {
        let mut routes = RouteBuilder::new();
        routes.any("/hook", labelled("any"));
        routes.get("/hook", labelled("get"));
        let router = Router::new(routes.build());

        assert_eq!(messages(&router, Method::Get, "/hook").await, ["get"]);
        assert_eq!(messages(&router, Method::Delete, "/hook").await, ["any"]);
    }

    #[tokio::test]
    async fn wrong_method_is_method_not_allowed() {
        let mut routes = RouteBuilder::new();
        routes.post("/submit", labelled("submitted"));
        let router = Router::new(routes.build());

        let err = router
            .resolve(request(Method::Get, "/submit"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::MethodNotAllowed);
    }

    #[tokio::test]
    async fn first_registered_template_wins() {
        let mut routes = RouteBuilder::new();
        routes.get("/a/{x}", labelled("placeholder"));
        routes.get("/a/fixed", labelled("literal"));
        let router = Router::new(routes.build());

        assert_eq!(messages(&router, Method::Get, "/a/fixed").await, ["placeholder"]);
    }

    #[tokio::test]
    async fn any_route_answers_every_method() {
        let mut routes = RouteBuilder::new();
        routes.any("/hook", labelled("hook"));
        let router = Router::new(routes.build());
        for method in [Method::Get, Method::Post, Method::Delete] {
            assert_eq!(messages(&router, method, "/hook").await, ["hook"]);
        }
    }

    // ── middleware ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn middleware_wraps_action_in_declaration_order() {
        let trace = Trace::default();
        let mut registry = MiddlewareRegistry::new();
        registry.register_shared("a", Arc::new(Tracer { label: "A", trace: trace.clone() }));
        registry.register_shared("b", Arc::new(Tracer { label: "B", trace: trace.clone() }));

        let action_trace = trace.clone();
        let mut routes = RouteBuilder::new();
        routes.route_with(
            Method::Get,
            "/",
            Action::handler(move |_ctx: Context, response: Response| {
                let trace = action_trace.clone();
                async move {
                    trace.lock().push("action".into());
                    Ok::<_, RouterError>(response)
                }
            }),
            &["a", "b"],
        );
        let router = Router::new(routes.build()).with_middlewares(registry);

        router.resolve(request(Method::Get, "/")).await.unwrap();
        assert_eq!(*trace.lock(), ["A", "B", "action", "B", "A"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_later_layers_and_action() {
        let trace = Trace::default();
        let mut registry = MiddlewareRegistry::new();
        registry.register("deny", || {
            from_fn(|_ctx, response: Response, _next| async move {
                Ok::<_, RouterError>(response.with_status(StatusCode::Forbidden))
            })
        });
        registry.register_shared("b", Arc::new(Tracer { label: "B", trace: trace.clone() }));

        let mut routes = RouteBuilder::new();
        routes.middleware(&["deny", "b"], |r| {
            r.get("/", labelled("action"));
        });
        let router = Router::new(routes.build()).with_middlewares(registry);

        let response = router.resolve(request(Method::Get, "/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::Forbidden);
        assert!(response.messages().is_empty());
        assert!(trace.lock().is_empty());
    }

    #[tokio::test]
    async fn unknown_middleware_fails_before_anything_runs() {
        let trace = Trace::default();
        let mut registry = MiddlewareRegistry::new();
        registry.register_shared("a", Arc::new(Tracer { label: "A", trace: trace.clone() }));

        let mut routes = RouteBuilder::new();
        routes.route_with(Method::Get, "/", Action::handler(labelled("x")), &["a", "ghost"]);
        let router = Router::new(routes.build()).with_middlewares(registry);

        let err = router.resolve(request(Method::Get, "/")).await.unwrap_err();
        assert!(matches!(err, RouterError::Configuration(ref m) if m.contains("ghost")));
        assert!(trace.lock().is_empty());
        assert!(router.validate().is_err());
    }

    // ── controllers ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn controller_action_receives_params() {
        let mut routes = RouteBuilder::new();
        routes.controller("users", |r| {
            r.route(Method::Get, "/users/{id}", "show");
        });
        let router = Router::new(routes.build()).with_controllers(controllers());

        router.validate().unwrap();
        assert_eq!(messages(&router, Method::Get, "/users/9").await, ["user 9"]);
    }

    #[tokio::test]
    async fn unknown_controller_is_configuration_error() {
        let mut routes = RouteBuilder::new();
        routes.controller_action(Method::Get, "/x", "ghosts", "index");
        let router = Router::new(routes.build()).with_controllers(controllers());

        assert!(matches!(router.validate(), Err(RouterError::Configuration(_))));
        let err = router.resolve(request(Method::Get, "/x")).await.unwrap_err();
        assert!(matches!(err, RouterError::Configuration(ref m) if m.contains("ghosts")));
    }

    #[tokio::test]
    async fn unknown_action_is_configuration_error() {
        let mut routes = RouteBuilder::new();
        routes.route(Method::Get, "/x", ("users", "destroy_everything"));
        let router = Router::new(routes.build()).with_controllers(controllers());

        let err = router.resolve(request(Method::Get, "/x")).await.unwrap_err();
        assert!(matches!(err, RouterError::Configuration(ref m) if m.contains("destroy_everything")));
    }

    #[tokio::test]
    async fn action_without_response_is_configuration_error() {
        let mut routes = RouteBuilder::new();
        routes.route(RouteMethod::Any, "/quiet", ("users", "silent"));
        let router = Router::new(routes.build()).with_controllers(controllers());

        let err = router.resolve(request(Method::Get, "/quiet")).await.unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));

        // Preflight and HEAD requests fall back to the response built so far.
        let response = router
            .resolve(request(Method::Options, "/quiet"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn method_name_without_controller_is_configuration_error() {
        let mut routes = RouteBuilder::new();
        routes.route(Method::Get, "/orphan", "index");
        let router = Router::new(routes.build());

        assert!(router.validate().is_err());
        let err = router.resolve(request(Method::Get, "/orphan")).await.unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));
    }

    // ── validation & names ────────────────────────────────────────────────────

    #[test]
    fn validate_reports_broken_templates() {
        let mut routes = RouteBuilder::new();
        routes.get("/p/{a}/{a}", labelled("dup"));
        let router = Router::new(routes.build());
        assert!(matches!(router.validate(), Err(RouterError::Pattern(_))));
    }

    #[test]
    fn url_for_named_route() {
        let mut routes = RouteBuilder::new();
        routes.prefix("/blog", |r| {
            r.get("/{slug}", labelled("post")).name("post");
        });
        let router = Router::new(routes.build());
        let params: Parameters = [("slug", "hello")].into_iter().collect();
        assert_eq!(router.url("post", &params).as_deref(), Some("/blog/hello"));
    }
}
