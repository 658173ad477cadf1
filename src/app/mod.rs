//! The application boundary: every request gets exactly one response.
//!
//! [`Application`] wraps a validated [`Router`] and converts whatever the
//! router returns into a [`Response`]. Routing and request errors become
//! client-facing error pages, negotiated between a JSON body and the
//! renderer's `_error` view. Configuration errors and anything else unexpected
//! are logged in full and answered with a generic `500`.

use std::sync::Arc;

use bytes::BytesMut;
use serde_json::{Map, Value, json};
use tracing::{error, warn};

use crate::{
    Request, Response, Router,
    error::RouterError,
    http::{Method, StatusCode},
    security::Cors,
    view::Renderer,
};

/// Name of the view rendered for error pages.
pub const ERROR_VIEW: &str = "_error";

/// A router plus the collaborators applied around every dispatch.
///
/// # Examples
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use routekit::{Application, Request, Router, http::{Method, StatusCode}, router::RouteBuilder};
/// use routekit::security::Cors;
///
/// let app = Application::new(Router::new(RouteBuilder::new().build()))
///     .unwrap()
///     .with_cors(Cors::new());
///
/// let response = app
///     .handle(
///         Request::builder(Method::Get, "/missing")
///             .header("Content-Type", "application/json")
///             .header("Accept", "application/json")
///             .build(),
///     )
///     .await;
/// assert_eq!(response.status(), StatusCode::NotFound);
/// assert_eq!(response.data()["code"], 404);
/// # }
/// ```
#[derive(Clone)]
pub struct Application {
    router: Router,
    cors: Option<Cors>,
    renderer: Option<Arc<dyn Renderer>>,
}

impl Application {
    /// Wraps `router` after checking its configuration.
    ///
    /// # Errors
    ///
    /// Whatever [`Router::validate`] reports.
    pub fn new(router: Router) -> Result<Self, RouterError> {
        router.validate()?;
        Ok(Self {
            router,
            cors: None,
            renderer: None,
        })
    }

    /// Applies `cors` to every response, including error responses.
    #[must_use]
    pub fn with_cors(mut self, cors: Cors) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Uses `renderer` for HTML error pages.
    #[must_use]
    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Dispatches `request` and never fails.
    pub async fn handle(&self, request: Request) -> Response {
        let method = request.method().clone();
        let wants_json = request.wants_json();

        let mut response = match self.router.resolve(request).await {
            Ok(response) => response,
            Err(err) => self.error_response(&err, wants_json),
        };

        if let Some(cors) = &self.cors {
            cors.apply(&method, &mut response);
        }
        response
    }

    /// Parses a raw HTTP/1.1 request, dispatches it, and serializes the response.
    ///
    /// Bytes that do not form a complete request are answered with `400 Bad Request`.
    pub async fn handle_bytes(&self, buf: &[u8]) -> BytesMut {
        match Request::parse(buf) {
            Ok(request) => {
                let method = request.method().clone();
                self.handle(request).await.send(&method)
            }
            Err(err) => {
                warn!(error = %err, "rejecting unparsable request");
                let status = StatusCode::BadRequest;
                Response::new()
                    .with_status(status)
                    .body(status.message())
                    .send(&Method::Get)
            }
        }
    }

    fn error_response(&self, err: &RouterError, wants_json: bool) -> Response {
        let (status, message) = match err {
            RouterError::Http(http) => {
                if http.status().is_server_error() {
                    error!(
                        status = http.status().as_u16(),
                        message = http.message(),
                        "handler raised a server error"
                    );
                }
                (http.status(), http.message().to_owned())
            }
            RouterError::Validation(reason) => (StatusCode::BadRequest, reason.clone()),
            other => {
                error!(error = %other, debug = ?other, "request failed with an internal error");
                let status = StatusCode::InternalServerError;
                (status, status.message().to_owned())
            }
        };

        let body = error_payload(status, &message);
        let response = Response::new().with_status(status);

        if wants_json {
            return response.with_data(body);
        }

        let mut params = Map::new();
        params.insert("error".to_owned(), body);
        let page = self.renderer.as_ref().and_then(|renderer| {
            renderer.render(ERROR_VIEW, &params, renderer.error_layout())
        });

        match page {
            Some(html) => response.html(html),
            None => response.body(format!("{} {}", status.as_u16(), message)),
        }
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("router", &self.router)
            .field("cors", &self.cors)
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

/// The `{code, message}` object sent to JSON clients and passed to the error view as `error`.
pub fn error_payload(status: StatusCode, message: &str) -> Value {
    json!({ "code": status.as_u16(), "message": message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Context,
        error::HttpError,
        http::Content,
        middleware::MiddlewareRegistry,
        router::RouteBuilder,
        view::View,
    };
    use std::fs;
    use tempfile::TempDir;

    fn router() -> Router {
        let mut routes = RouteBuilder::new();
        routes.get("/ok", |_ctx: Context, response: Response| async move {
            Ok::<_, RouterError>(response.message("fine"))
        });
        routes.post("/only-post", |_ctx: Context, response: Response| async move {
            Ok::<_, RouterError>(response)
        });
        routes.get("/teapot", |_ctx: Context, _response: Response| async move {
            Err::<Response, _>(RouterError::from(HttpError::with_message(
                StatusCode::ImATeapot,
                "short and stout",
            )))
        });
        routes.post("/echo", |ctx: Context, response: Response| async move {
            let fields = ctx.request().fields()?;
            Ok::<_, RouterError>(response.with_data(fields))
        });
        routes.get("/broken", |_ctx: Context, _response: Response| async move {
            Err::<Response, _>(RouterError::configuration("secret detail"))
        });
        Router::new(routes.build())
    }

    fn json_request(method: Method, path: &str) -> Request {
        Request::builder(method, path)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .build()
    }

    fn body_text(response: &Response) -> String {
        String::from_utf8(response.body_bytes()).unwrap()
    }

    #[test]
    fn invalid_router_is_rejected_up_front() {
        let mut routes = RouteBuilder::new();
        routes.route_with(Method::Get, "/", crate::router::Action::method("index"), &["auth"]);
        let router = Router::new(routes.build()).with_middlewares(MiddlewareRegistry::new());
        assert!(matches!(
            Application::new(router),
            Err(RouterError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn success_passes_through() {
        let app = Application::new(router()).unwrap();
        let response = app.handle(json_request(Method::Get, "/ok")).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.messages(), ["fine"]);
    }

    #[tokio::test]
    async fn json_clients_get_json_errors() {
        let app = Application::new(router()).unwrap();

        let missing = app.handle(json_request(Method::Get, "/nowhere")).await;
        assert_eq!(missing.status(), StatusCode::NotFound);
        assert_eq!(
            missing.data(),
            &json!({"code": 404, "message": "The requested resource could not be found"})
        );

        let wrong_method = app.handle(json_request(Method::Get, "/only-post")).await;
        assert_eq!(wrong_method.status(), StatusCode::MethodNotAllowed);

        let teapot = app.handle(json_request(Method::Get, "/teapot")).await;
        assert_eq!(teapot.data()["message"], "short and stout");
        assert!(!teapot.is_success());
    }

    #[tokio::test]
    async fn malformed_json_body_is_bad_request() {
        let app = Application::new(router()).unwrap();
        let request = Request::builder(Method::Post, "/echo")
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body("{ nope")
            .build();
        let response = app.handle(request).await;
        assert_eq!(response.status(), StatusCode::BadRequest);
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_detail() {
        let app = Application::new(router()).unwrap();
        let response = app.handle(json_request(Method::Get, "/broken")).await;
        assert_eq!(response.status(), StatusCode::InternalServerError);
        assert_eq!(
            response.data()["message"],
            StatusCode::InternalServerError.message()
        );
        assert!(!body_text(&response).contains("secret detail"));
    }

    #[tokio::test]
    async fn html_clients_get_error_view_in_layout() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("layouts")).unwrap();
        fs::write(dir.path().join("_error.html"), "{{error.code}}: {{error.message}}").unwrap();
        fs::write(dir.path().join("layouts/plain.html"), "<body>{{content}}</body>").unwrap();

        let app = Application::new(router())
            .unwrap()
            .with_renderer(View::new(dir.path()).with_error_layout("plain"));
        let response = app
            .handle(Request::builder(Method::Get, "/nowhere").build())
            .await;

        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(
            body_text(&response),
            "<body>404: The requested resource could not be found</body>"
        );
        assert_eq!(
            response.headers().get("Content-Type"),
            Some("text/html; charset=utf-8")
        );
    }

    #[tokio::test]
    async fn without_renderer_errors_fall_back_to_text() {
        let app = Application::new(router()).unwrap();
        let response = app
            .handle(Request::builder(Method::Get, "/nowhere").build())
            .await;
        assert!(matches!(response.content(), Content::Raw(_)));
        assert_eq!(
            body_text(&response),
            "404 The requested resource could not be found"
        );
    }

    #[tokio::test]
    async fn cors_is_applied_to_errors_too() {
        let app = Application::new(router()).unwrap().with_cors(Cors::new());
        let response = app.handle(json_request(Method::Options, "/ok")).await;
        assert_eq!(response.status(), StatusCode::MethodNotAllowed);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin"),
            Some("*")
        );
        assert_eq!(response.headers().get("X-Frame-Options"), Some("sameorigin"));
    }

    #[tokio::test]
    async fn raw_bytes_round_trip() {
        let app = Application::new(router()).unwrap();
        let wire = app
            .handle_bytes(b"GET /ok HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await;
        let text = String::from_utf8(wire.to_vec()).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with(r#"{"code":200,"success":true,"messages":["fine"],"data":{}}"#));

        let rejected = app.handle_bytes(b"GET /ok HTT").await;
        assert!(rejected.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
    }
}
