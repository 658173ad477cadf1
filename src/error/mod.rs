//! Error taxonomy shared by the router, middleware, controllers, and the
//! application boundary.
//!
//! | Variant                          | Cause                                         | Client sees |
//! |----------------------------------|-----------------------------------------------|-------------|
//! | [`RouterError::Http`]            | no route, wrong method, handler-raised status | that status |
//! | [`RouterError::Validation`]      | malformed request body                        | `400`       |
//! | [`RouterError::Configuration`]   | unknown middleware/controller/action, etc.    | `500`       |
//! | [`RouterError::Pattern`]         | route template that does not compile          | `500`       |

use thiserror::Error;

use crate::http::StatusCode;
use crate::router::PatternError;

/// An error that maps directly onto an HTTP status.
///
/// Routing failures (`404`, `405`) are expressed this way, and handlers may
/// return one to abort with any other status.
///
/// # Examples
///
/// ```
/// use routekit::error::HttpError;
/// use routekit::http::StatusCode;
///
/// let err = HttpError::new(StatusCode::Forbidden);
/// assert_eq!(err.message(), "You don't have permission to access this page");
///
/// let err = HttpError::with_message(StatusCode::Conflict, "email already taken");
/// assert_eq!(err.to_string(), "409 Conflict: email already taken");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    /// An error carrying the status's default description.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: status.message().to_owned(),
        }
    }

    /// An error with a custom message. An empty message falls back to the default.
    pub fn with_message(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.is_empty() {
            return Self::new(status);
        }
        Self { status, message }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NotFound)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::MethodNotAllowed)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Everything that can go wrong between matching a request and producing a response.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A programmer error in the route setup. Never recoverable at request time.
    #[error("router configuration error: {0}")]
    Configuration(String),

    /// The request body could not be decoded.
    #[error("validation error: {0}")]
    Validation(String),

    /// A route template that does not compile. A configuration error surfaced at match time.
    #[error("invalid route pattern: {0}")]
    Pattern(#[from] PatternError),
}

impl RouterError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// The status the client should see for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http(err) => err.status(),
            Self::Validation(_) => StatusCode::BadRequest,
            Self::Configuration(_) | Self::Pattern(_) => StatusCode::InternalServerError,
        }
    }

    /// `true` for errors that indicate a bug in the application rather than a bad request.
    pub fn is_internal(&self) -> bool {
        self.status().is_server_error()
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<serde_urlencoded::de::Error> for RouterError {
    fn from(err: serde_urlencoded::de::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_falls_back_to_default() {
        let err = HttpError::with_message(StatusCode::NotFound, "");
        assert_eq!(err.message(), StatusCode::NotFound.message());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            RouterError::from(HttpError::method_not_allowed()).status(),
            StatusCode::MethodNotAllowed
        );
        assert_eq!(
            RouterError::Validation("bad json".into()).status(),
            StatusCode::BadRequest
        );
        let config = RouterError::configuration("missing controller");
        assert_eq!(config.status(), StatusCode::InternalServerError);
        assert!(config.is_internal());
    }

    #[test]
    fn broken_templates_are_internal() {
        let err = crate::router::Pattern::compile("/users/{1d}").unwrap_err();
        let err = RouterError::from(err);
        assert!(matches!(err, RouterError::Pattern(_)));
        assert_eq!(err.status(), StatusCode::InternalServerError);
    }

    #[test]
    fn json_errors_become_validation_errors() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(RouterError::from(err), RouterError::Validation(_)));
    }

    #[test]
    fn http_error_is_a_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(HttpError::new(StatusCode::Conflict));
        assert!(err.to_string().starts_with("409 Conflict: "));
        assert!(err.source().is_none());
    }

    #[test]
    fn http_error_display_is_transparent() {
        let err = RouterError::from(HttpError::not_found());
        assert_eq!(
            err.to_string(),
            "404 Not Found: The requested resource could not be found"
        );
    }
}
