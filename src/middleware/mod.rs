//! Middleware pipeline: composable before/after logic around a route's action.
//!
//! Routes reference middleware by identifier. At dispatch time the router asks
//! the [`MiddlewareRegistry`] to turn each identifier into a fresh instance and
//! composes them so that the first identifier is the outermost layer and the
//! route's action is the innermost.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the rest of the chain; call [`Next::run`] to advance.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware function.
//! - [`MiddlewareRegistry`]: identifier → middleware factory map.
//! - [`from_fn`]: adapts an async closure into a [`Middleware`].
//! - [`LoggerMiddleware`]: built-in request/response logger.

use std::{collections::HashMap, fmt, future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Response, context::Context, error::RouterError};

/// The boxed future every layer of the pipeline returns.
pub type DispatchFuture = Pin<Box<dyn Future<Output = Result<Response, RouterError>> + Send>>;

/// The innermost layer: the route's action, invoked once the chain is exhausted.
pub type Endpoint = Box<dyn FnOnce(Context, Response) -> DispatchFuture + Send>;

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware can forward the
/// request at most once. Dropping it without calling `run` short-circuits the
/// chain: nothing further down, including the action, executes.
///
/// # Examples
///
/// ```rust
/// use routekit::{Response, context::Context, middleware::{DispatchFuture, Middleware, Next}};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(&self, ctx: Context, response: Response, next: Next) -> DispatchFuture {
///         Box::pin(async move { next.run(ctx, response).await })
///     }
/// }
/// ```
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Which middleware the next `run` call invokes.
    index: usize,
    endpoint: Endpoint,
}

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler =
    Arc<dyn Fn(Context, Response, Next) -> DispatchFuture + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use routekit::middleware::{LoggerMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(LoggerMiddleware));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + ?Sized + 'static,
{
    Arc::new(move |ctx: Context, response: Response, next: Next| {
        middleware.handle(ctx, response, next)
    })
}

impl Next {
    /// Creates a cursor at the start of `middlewares` that ends in `endpoint`.
    pub fn new(middlewares: Vec<MiddlewareHandler>, endpoint: Endpoint) -> Self {
        Self {
            middlewares,
            index: 0,
            endpoint,
        }
    }

    /// Invokes the next middleware, or the endpoint once every middleware has run.
    ///
    /// # Arguments
    ///
    /// - `ctx`: the per-request [`Context`] to hand downstream.
    /// - `response`: the response built so far.
    ///
    /// # Returns
    ///
    /// The [`Response`] produced by the rest of the chain.
    ///
    /// # Errors
    ///
    /// Whatever the downstream layer returns.
    pub async fn run(mut self, ctx: Context, response: Response) -> Result<Response, RouterError> {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, response, self).await
        } else {
            (self.endpoint)(ctx, response).await
        }
    }

    /// Number of middleware not yet entered.
    pub fn remaining(&self) -> usize {
        self.middlewares.len() - self.index
    }
}

/// The core trait for all middleware.
///
/// Implementors receive the [`Context`], the [`Response`] built so far, and a
/// [`Next`] cursor. They may:
///
/// - **Pass through**: `next.run(ctx, response).await`.
/// - **Short-circuit**: return a response (or an error) without calling `next`.
/// - **Decorate**: adjust the response before forwarding, or inspect and
///   modify what comes back.
///
/// Implementations must be `Send + Sync`; the registry hands them out across
/// tasks.
pub trait Middleware: Send + Sync {
    /// Runs this layer.
    ///
    /// # Arguments
    ///
    /// - `ctx`: the per-request [`Context`] with the request and path parameters.
    /// - `response`: the response built so far by outer layers.
    /// - `next`: cursor into the remainder of the chain; call [`Next::run`] to
    ///   forward the request.
    ///
    /// # Returns
    ///
    /// Either this layer's own result (short-circuit) or the downstream one,
    /// possibly modified.
    fn handle(&self, ctx: Context, response: Response, next: Next) -> DispatchFuture;
}

/// A [`Middleware`] backed by an async closure. Built with [`from_fn`].
pub struct FnMiddleware<F> {
    f: F,
}

/// Adapts an async closure into a [`Middleware`].
///
/// # Examples
///
/// ```rust
/// use routekit::{error::HttpError, http::StatusCode, middleware::from_fn};
///
/// let auth = from_fn(|ctx, response, next| async move {
///     if ctx.request().headers().contains("Authorization") {
///         next.run(ctx, response).await
///     } else {
///         Err(HttpError::new(StatusCode::Unauthorized).into())
///     }
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(Context, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, RouterError>> + Send + 'static,
{
    FnMiddleware { f }
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Context, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, RouterError>> + Send + 'static,
{
    fn handle(&self, ctx: Context, response: Response, next: Next) -> DispatchFuture {
        Box::pin((self.f)(ctx, response, next))
    }
}

type Factory = Arc<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

/// Maps middleware identifiers to factories.
///
/// Routes store identifiers only; the registry instantiates the middleware when
/// a request is dispatched. [`register`](Self::register) builds a fresh instance
/// per request, [`register_shared`](Self::register_shared) reuses one.
///
/// # Examples
///
/// ```rust
/// use routekit::middleware::{LoggerMiddleware, MiddlewareRegistry};
///
/// let mut registry = MiddlewareRegistry::new();
/// registry.register("log", || LoggerMiddleware);
/// assert!(registry.contains("log"));
/// assert!(registry.chain(&["log".to_string()]).is_ok());
/// assert!(registry.chain(&["auth".to_string()]).is_err());
/// ```
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    factories: HashMap<String, Factory>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory invoked once per dispatched request.
    pub fn register<M, F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        M: Middleware + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move || Arc::new(factory()) as Arc<dyn Middleware>);
        self.factories.insert(id.into(), factory);
        self
    }

    /// Registers a single instance shared by every request.
    pub fn register_shared<M>(&mut self, id: impl Into<String>, middleware: Arc<M>) -> &mut Self
    where
        M: Middleware + 'static,
    {
        let factory: Factory = Arc::new(move || middleware.clone() as Arc<dyn Middleware>);
        self.factories.insert(id.into(), factory);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiates the middleware registered as `id`.
    pub fn resolve(&self, id: &str) -> Option<Arc<dyn Middleware>> {
        self.factories.get(id).map(|factory| factory())
    }

    /// Instantiates every middleware in `ids`, outermost first.
    ///
    /// # Errors
    ///
    /// [`RouterError::Configuration`] naming the first unknown identifier. No
    /// middleware is instantiated in that case.
    pub fn chain(&self, ids: &[String]) -> Result<Vec<MiddlewareHandler>, RouterError> {
        if let Some(missing) = ids.iter().find(|id| !self.contains(id)) {
            return Err(RouterError::configuration(format!(
                "middleware `{missing}` is not registered"
            )));
        }

        Ok(ids
            .iter()
            .filter_map(|id| self.resolve(id))
            .map(from_middleware)
            .collect())
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

/// Logs each request's method, path, status, and duration.
///
/// Emits one `tracing::info!` line once the downstream layers finish, or a
/// `tracing::warn!` line when they fail:
///
/// ```text
/// METHOD /path - STATUS (duration)
/// ```
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, response: Response, next: Next) -> DispatchFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_string();
            let path = ctx.request().path().to_string();

            let result = next.run(ctx, response).await;
            let duration = start.elapsed();

            match &result {
                Ok(response) => {
                    tracing::info!(
                        "{} {} - {} ({:?})",
                        method,
                        path,
                        response.status().as_u16(),
                        duration
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        "{} {} - {} ({:?}): {}",
                        method,
                        path,
                        err.status().as_u16(),
                        duration,
                        err
                    );
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Request,
        error::HttpError,
        http::{Method, StatusCode},
    };
    use parking_lot::Mutex;

    type Trace = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        label: &'static str,
        trace: Trace,
    }

    impl Middleware for Recorder {
        fn handle(&self, ctx: Context, response: Response, next: Next) -> DispatchFuture {
            let label = self.label;
            let trace = self.trace.clone();
            Box::pin(async move {
                trace.lock().push(format!("{label}:before"));
                let result = next.run(ctx, response).await;
                trace.lock().push(format!("{label}:after"));
                result
            })
        }
    }

    fn ctx() -> Context {
        Context::new(Request::builder(Method::Get, "/").build())
    }

    fn endpoint(trace: Trace) -> Endpoint {
        Box::new(move |_ctx: Context, response: Response| -> DispatchFuture {
            Box::pin(async move {
                trace.lock().push("action".into());
                Ok(response.message("done"))
            })
        })
    }

    fn recorder(label: &'static str, trace: &Trace) -> MiddlewareHandler {
        from_middleware(Arc::new(Recorder {
            label,
            trace: trace.clone(),
        }))
    }

    // ── Next ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_chain_runs_endpoint() {
        let trace = Trace::default();
        let next = Next::new(Vec::new(), endpoint(trace.clone()));
        assert_eq!(next.remaining(), 0);

        let response = next.run(ctx(), Response::new()).await.unwrap();
        assert_eq!(response.messages(), ["done"]);
        assert_eq!(*trace.lock(), ["action"]);
    }

    #[tokio::test]
    async fn first_middleware_is_outermost() {
        let trace = Trace::default();
        let chain = vec![recorder("a", &trace), recorder("b", &trace)];
        Next::new(chain, endpoint(trace.clone()))
            .run(ctx(), Response::new())
            .await
            .unwrap();

        assert_eq!(
            *trace.lock(),
            ["a:before", "b:before", "action", "b:after", "a:after"]
        );
    }

    #[tokio::test]
    async fn short_circuit_skips_rest_of_chain() {
        let trace = Trace::default();
        let deny: MiddlewareHandler = from_middleware(Arc::new(from_fn(
            |_ctx, _response, _next| async {
                Err(RouterError::from(HttpError::new(StatusCode::Forbidden)))
            },
        )));
        let chain = vec![recorder("a", &trace), deny, recorder("b", &trace)];

        let err = Next::new(chain, endpoint(trace.clone()))
            .run(ctx(), Response::new())
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::Forbidden);
        assert_eq!(*trace.lock(), ["a:before", "a:after"]);
    }

    #[tokio::test]
    async fn middleware_can_decorate_response_on_the_way_in() {
        let tag = from_middleware(Arc::new(from_fn(|ctx, response: Response, next: Next| {
            next.run(ctx, response.header("X-Tag", "1"))
        })));
        let response = Next::new(vec![tag], endpoint(Trace::default()))
            .run(ctx(), Response::new())
            .await
            .unwrap();
        assert_eq!(response.headers().get("x-tag"), Some("1"));
    }

    // ── MiddlewareRegistry ────────────────────────────────────────────────────

    #[test]
    fn unknown_identifier_is_a_configuration_error() {
        let mut registry = MiddlewareRegistry::new();
        registry.register("log", || LoggerMiddleware);

        let err = registry
            .chain(&["log".into(), "auth".into()])
            .err()
            .unwrap();
        assert!(matches!(err, RouterError::Configuration(ref m) if m.contains("auth")));
    }

    #[test]
    fn factories_build_per_request_and_shared_instances_are_reused() {
        let trace = Trace::default();
        let shared = Arc::new(Recorder {
            label: "shared",
            trace: trace.clone(),
        });
        let mut registry = MiddlewareRegistry::new();
        registry
            .register("fresh", move || Recorder {
                label: "fresh",
                trace: trace.clone(),
            })
            .register_shared("shared", shared.clone());

        assert_eq!(registry.len(), 2);
        let first = registry.resolve("shared").unwrap();
        let second = registry.resolve("shared").unwrap();
        assert!(std::ptr::addr_eq(Arc::as_ptr(&first), Arc::as_ptr(&second)));
        assert!(std::ptr::addr_eq(Arc::as_ptr(&first), Arc::as_ptr(&shared)));

        let a = registry.resolve("fresh").unwrap();
        let b = registry.resolve("fresh").unwrap();
        assert!(!std::ptr::addr_eq(Arc::as_ptr(&a), Arc::as_ptr(&b)));
        assert!(registry.resolve("missing").is_none());
    }

    #[tokio::test]
    async fn logger_passes_results_through() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("routekit=debug")
            .with_test_writer()
            .try_init();

        let chain = vec![from_middleware(Arc::new(LoggerMiddleware))];
        let failing: Endpoint = Box::new(|_ctx: Context, _response: Response| -> DispatchFuture {
            Box::pin(async { Err(HttpError::not_found().into()) })
        });

        let err = Next::new(chain, failing)
            .run(ctx(), Response::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NotFound);
    }
}
