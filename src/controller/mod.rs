//! Controllers: named groups of actions constructed per request.
//!
//! A route whose action is a method name is dispatched by building the
//! controller registered under that route's controller name from the request
//! [`Context`] and the [`Response`] produced so far, then calling the action on
//! it by name. Controllers opt into verb-based dispatch by implementing
//! [`Resourceful`] and routing an action to [`Resourceful::any`].

use std::{collections::HashMap, fmt, future::Future, pin::Pin, sync::Arc};

use crate::{
    Response,
    context::Context,
    error::{HttpError, RouterError},
    http::Method,
};

/// What a controller action resolves to. `Ok(None)` means the action produced
/// no response.
pub type ControllerFuture =
    Pin<Box<dyn Future<Output = Result<Option<Response>, RouterError>> + Send>>;

/// A controller constructed fresh for every request it handles.
///
/// # Examples
///
/// ```rust
/// use routekit::{Context, Response, RouterError};
/// use routekit::controller::{Controller, ControllerFuture, respond};
///
/// struct Pages {
///     response: Response,
/// }
///
/// impl Controller for Pages {
///     fn construct(_ctx: Context, response: Response) -> Self {
///         Self { response }
///     }
///
///     fn call(self: Box<Self>, action: &str) -> Option<ControllerFuture> {
///         match action {
///             "about" => respond(async move { Ok(self.response.message("about us")) }),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Controller: Send + 'static {
    fn construct(ctx: Context, response: Response) -> Self
    where
        Self: Sized;

    /// Starts the action called `action`, or returns `None` if there is no such action.
    fn call(self: Box<Self>, action: &str) -> Option<ControllerFuture>;
}

/// Wraps an action body that always produces a response.
pub fn respond<F>(action: F) -> Option<ControllerFuture>
where
    F: Future<Output = Result<Response, RouterError>> + Send + 'static,
{
    Some(Box::pin(async move { action.await.map(Some) }))
}

// An action that completes without producing a response.
fn nothing() -> ControllerFuture {
    let done: Result<Option<Response>, RouterError> = Ok(None);
    Box::pin(std::future::ready(done))
}

/// Verb-based dispatch for resource controllers.
///
/// [`any`](Self::any) maps `GET` to [`get`](Self::get), `POST` to
/// [`create`](Self::create), `PUT` to [`update`](Self::update), and `DELETE`
/// to [`delete`](Self::delete). Each hook returns `None` by default, meaning
/// the controller does not provide it.
pub trait Resourceful: Sized + Send + 'static {
    /// The method of the request being handled.
    fn method(&self) -> &Method;

    fn get(self) -> Option<ControllerFuture> {
        None
    }

    fn create(self) -> Option<ControllerFuture> {
        None
    }

    fn update(self) -> Option<ControllerFuture> {
        None
    }

    fn delete(self) -> Option<ControllerFuture> {
        None
    }

    /// Dispatches to the hook for the request method.
    ///
    /// `OPTIONS` and `HEAD` complete with no response. A method with no
    /// corresponding hook, or a hook the controller does not provide, fails
    /// with `405 Method Not Allowed`.
    fn any(self) -> ControllerFuture {
        let hook = match self.method().clone() {
            Method::Options | Method::Head => return nothing(),
            Method::Get => self.get(),
            Method::Post => self.create(),
            Method::Put => self.update(),
            Method::Delete => self.delete(),
            _ => None,
        };

        hook.unwrap_or_else(|| {
            let err: Result<Option<Response>, RouterError> =
                Err(HttpError::method_not_allowed().into());
            Box::pin(std::future::ready(err))
        })
    }
}

type Factory = Arc<dyn Fn(Context, Response) -> Box<dyn Controller> + Send + Sync>;

/// Maps controller names to constructors.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    factories: HashMap<String, Factory>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `C` under `name`, replacing any earlier registration.
    ///
    /// # Arguments
    ///
    /// - `name`: the identifier routes use, either as the scoped controller
    ///   or as the first half of a `(controller, action)` pair.
    ///
    /// A fresh `C` is constructed for every request that reaches it.
    pub fn register<C: Controller>(&mut self, name: impl Into<String>) -> &mut Self {
        let factory: Factory = Arc::new(|ctx: Context, response: Response| -> Box<dyn Controller> {
            Box::new(C::construct(ctx, response))
        });
        self.factories.insert(name.into(), factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Constructs the controller registered as `name`.
    ///
    /// # Arguments
    ///
    /// - `name`: the registered identifier.
    /// - `ctx`, `response`: passed to [`Controller::construct`].
    ///
    /// # Returns
    ///
    /// The boxed controller, or `None` when nothing is registered as `name`.
    pub fn instantiate(
        &self,
        name: &str,
        ctx: Context,
        response: Response,
    ) -> Option<Box<dyn Controller>> {
        self.factories.get(name).map(|factory| factory(ctx, response))
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, http::StatusCode};

    struct Articles {
        ctx: Context,
        response: Response,
    }

    impl Controller for Articles {
        fn construct(ctx: Context, response: Response) -> Self {
            Self { ctx, response }
        }

        fn call(self: Box<Self>, action: &str) -> Option<ControllerFuture> {
            match action {
                "any" => Some((*self).any()),
                _ => None,
            }
        }
    }

    impl Resourceful for Articles {
        fn method(&self) -> &Method {
            self.ctx.request().method()
        }

        fn get(self) -> Option<ControllerFuture> {
            respond(async move { Ok(self.response.message("listing")) })
        }

        fn create(self) -> Option<ControllerFuture> {
            respond(async move { Ok(self.response.with_status(StatusCode::Created)) })
        }
    }

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry.register::<Articles>("articles");
        registry
    }

    async fn dispatch(method: Method) -> Result<Option<Response>, RouterError> {
        let ctx = Context::new(Request::builder(method, "/articles").build());
        let controller = registry()
            .instantiate("articles", ctx, Response::new())
            .unwrap();
        controller.call("any").unwrap().await
    }

    #[test]
    fn registry_lookup() {
        let registry = registry();
        assert!(registry.contains("articles"));
        assert!(!registry.contains("users"));
        assert_eq!(registry.len(), 1);

        let ctx = Context::new(Request::builder(Method::Get, "/").build());
        assert!(registry.instantiate("users", ctx, Response::new()).is_none());
    }

    #[test]
    fn unknown_action_is_none() {
        let ctx = Context::new(Request::builder(Method::Get, "/").build());
        let controller = registry()
            .instantiate("articles", ctx, Response::new())
            .unwrap();
        assert!(controller.call("archive").is_none());
    }

    #[tokio::test]
    async fn any_routes_provided_verbs() {
        let listing = dispatch(Method::Get).await.unwrap().unwrap();
        assert_eq!(listing.messages(), ["listing"]);

        let created = dispatch(Method::Post).await.unwrap().unwrap();
        assert_eq!(created.status(), StatusCode::Created);
    }

    #[tokio::test]
    async fn any_rejects_missing_and_unmapped_verbs() {
        for method in [Method::Put, Method::Delete, Method::Patch] {
            let err = dispatch(method).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::MethodNotAllowed);
        }
    }

    #[tokio::test]
    async fn any_is_silent_for_options_and_head() {
        for method in [Method::Options, Method::Head] {
            assert!(dispatch(method).await.unwrap().is_none());
        }
    }
}
