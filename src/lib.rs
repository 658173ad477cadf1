//! # routekit
//!
//! A small async HTTP routing framework: path templates with `{placeholders}`,
//! per-route middleware chains, named controllers, and an application boundary
//! that turns every outcome into a response.
//!
//! ## Quick Start
//!
//! ```rust
//! use routekit::{Application, Context, Request, Response, Router, RouterError};
//! use routekit::http::Method;
//! use routekit::middleware::{LoggerMiddleware, MiddlewareRegistry};
//! use routekit::router::RouteBuilder;
//! use routekit::security::Cors;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), RouterError> {
//! let mut routes = RouteBuilder::new();
//! routes.middleware(&["log"], |r| {
//!     r.get("/hello/{name}", |ctx: Context, response: Response| async move {
//!         let name = ctx.param("name").unwrap_or("world").to_owned();
//!         Ok::<_, RouterError>(response.message(format!("Hello, {name}!")))
//!     });
//! });
//!
//! let mut middlewares = MiddlewareRegistry::new();
//! middlewares.register("log", || LoggerMiddleware);
//!
//! let app = Application::new(Router::new(routes.build()).with_middlewares(middlewares))?
//!     .with_cors(Cors::new());
//!
//! let response = app.handle(Request::builder(Method::Get, "/hello/ferris").build()).await;
//! assert_eq!(response.messages(), ["Hello, ferris!"]);
//! # Ok(())
//! # }
//! ```

// ── Core ──────────────────────────────────────────────────────────────────────
pub mod context;
pub mod error;
pub mod http;
pub mod middleware;
pub mod router;

// ── Collaborators ─────────────────────────────────────────────────────────────
pub mod app;
pub mod controller;
pub mod security;
pub mod view;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::Application;
pub use context::Context;
pub use error::{HttpError, RouterError, RouterResult};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{RouteBuilder, Router};
