//! HTTP protocol types.
//!
//! This module provides the core HTTP primitives used by the router:
//! [`Method`], [`StatusCode`], [`Headers`], [`Request`], [`Response`], and [`Cookie`].

use std::fmt;

pub mod cookie;
pub mod headers;
pub mod request;
pub mod response;

pub use cookie::Cookie;
pub use headers::Headers;
pub use request::{Request, RequestBuilder};
pub use response::{Content, Response};

/// An HTTP response status code.
///
/// Covers the standard 2xx–5xx set. Each code carries both the canonical reason
/// phrase used on the status line and a longer [`message`](Self::message) used in
/// client-facing error bodies.
///
/// # Examples
///
/// ```
/// use routekit::http::StatusCode;
///
/// let status = StatusCode::Ok;
/// assert_eq!(status.as_u16(), 200);
/// assert_eq!(status.canonical_reason(), "OK");
/// assert!(status.is_success());
/// assert_eq!(StatusCode::from_u16(404), Some(StatusCode::NotFound));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    // 2xx Success
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NonAuthoritativeInformation = 203,
    NoContent = 204,
    ResetContent = 205,
    PartialContent = 206,
    MultiStatus = 207,
    AlreadyReported = 208,
    ImUsed = 226,

    // 3xx Redirection
    MultipleChoices = 300,
    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,
    UseProxy = 305,
    Unused = 306,
    TemporaryRedirect = 307,
    PermanentRedirect = 308,

    // 4xx Client Error
    BadRequest = 400,
    Unauthorized = 401,
    PaymentRequired = 402,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    NotAcceptable = 406,
    ProxyAuthenticationRequired = 407,
    RequestTimeout = 408,
    Conflict = 409,
    Gone = 410,
    LengthRequired = 411,
    PreconditionFailed = 412,
    PayloadTooLarge = 413,
    UriTooLong = 414,
    UnsupportedMediaType = 415,
    RangeNotSatisfiable = 416,
    ExpectationFailed = 417,
    ImATeapot = 418,
    MisdirectedRequest = 421,
    UnprocessableEntity = 422,
    Locked = 423,
    FailedDependency = 424,
    TooEarly = 425,
    UpgradeRequired = 426,
    PreconditionRequired = 428,
    TooManyRequests = 429,
    RequestHeaderFieldsTooLarge = 431,
    UnavailableForLegalReasons = 451,

    // 5xx Server Error
    InternalServerError = 500,
    NotImplemented = 501,
    BadGateway = 502,
    ServiceUnavailable = 503,
    GatewayTimeout = 504,
    HttpVersionNotSupported = 505,
    VariantAlsoNegotiates = 506,
    InsufficientStorage = 507,
    LoopDetected = 508,
    NotExtended = 510,
    NetworkAuthenticationRequired = 511,
    NetworkConnectTimeoutError = 599,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns `true` for 2xx codes.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    /// Returns `true` for 4xx codes.
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    /// Returns `true` for 5xx codes.
    pub fn is_server_error(self) -> bool {
        self.as_u16() >= 500
    }

    /// Every status code, in ascending numeric order.
    pub const ALL: [StatusCode; 60] = [
        Self::Ok,
        Self::Created,
        Self::Accepted,
        Self::NonAuthoritativeInformation,
        Self::NoContent,
        Self::ResetContent,
        Self::PartialContent,
        Self::MultiStatus,
        Self::AlreadyReported,
        Self::ImUsed,
        Self::MultipleChoices,
        Self::MovedPermanently,
        Self::Found,
        Self::SeeOther,
        Self::NotModified,
        Self::UseProxy,
        Self::Unused,
        Self::TemporaryRedirect,
        Self::PermanentRedirect,
        Self::BadRequest,
        Self::Unauthorized,
        Self::PaymentRequired,
        Self::Forbidden,
        Self::NotFound,
        Self::MethodNotAllowed,
        Self::NotAcceptable,
        Self::ProxyAuthenticationRequired,
        Self::RequestTimeout,
        Self::Conflict,
        Self::Gone,
        Self::LengthRequired,
        Self::PreconditionFailed,
        Self::PayloadTooLarge,
        Self::UriTooLong,
        Self::UnsupportedMediaType,
        Self::RangeNotSatisfiable,
        Self::ExpectationFailed,
        Self::ImATeapot,
        Self::MisdirectedRequest,
        Self::UnprocessableEntity,
        Self::Locked,
        Self::FailedDependency,
        Self::TooEarly,
        Self::UpgradeRequired,
        Self::PreconditionRequired,
        Self::TooManyRequests,
        Self::RequestHeaderFieldsTooLarge,
        Self::UnavailableForLegalReasons,
        Self::InternalServerError,
        Self::NotImplemented,
        Self::BadGateway,
        Self::ServiceUnavailable,
        Self::GatewayTimeout,
        Self::HttpVersionNotSupported,
        Self::VariantAlsoNegotiates,
        Self::InsufficientStorage,
        Self::LoopDetected,
        Self::NotExtended,
        Self::NetworkAuthenticationRequired,
        Self::NetworkConnectTimeoutError,
    ];

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Created => "Created",
            Self::Accepted => "Accepted",
            Self::NonAuthoritativeInformation => "Non-Authoritative Information",
            Self::NoContent => "No Content",
            Self::ResetContent => "Reset Content",
            Self::PartialContent => "Partial Content",
            Self::MultiStatus => "Multi-Status",
            Self::AlreadyReported => "Already Reported",
            Self::ImUsed => "IM Used",
            Self::MultipleChoices => "Multiple Choices",
            Self::MovedPermanently => "Moved Permanently",
            Self::Found => "Found",
            Self::SeeOther => "See Other",
            Self::NotModified => "Not Modified",
            Self::UseProxy => "Use Proxy",
            Self::Unused => "Unused",
            Self::TemporaryRedirect => "Temporary Redirect",
            Self::PermanentRedirect => "Permanent Redirect",
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::PaymentRequired => "Payment Required",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::NotAcceptable => "Not Acceptable",
            Self::ProxyAuthenticationRequired => "Proxy Authentication Required",
            Self::RequestTimeout => "Request Timeout",
            Self::Conflict => "Conflict",
            Self::Gone => "Gone",
            Self::LengthRequired => "Length Required",
            Self::PreconditionFailed => "Precondition Failed",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::UriTooLong => "URI Too Long",
            Self::UnsupportedMediaType => "Unsupported Media Type",
            Self::RangeNotSatisfiable => "Range Not Satisfiable",
            Self::ExpectationFailed => "Expectation Failed",
            Self::ImATeapot => "I'm a teapot",
            Self::MisdirectedRequest => "Misdirected Request",
            Self::UnprocessableEntity => "Unprocessable Entity",
            Self::Locked => "Locked",
            Self::FailedDependency => "Failed Dependency",
            Self::TooEarly => "Too Early",
            Self::UpgradeRequired => "Upgrade Required",
            Self::PreconditionRequired => "Precondition Required",
            Self::TooManyRequests => "Too Many Requests",
            Self::RequestHeaderFieldsTooLarge => "Request Header Fields Too Large",
            Self::UnavailableForLegalReasons => "Unavailable For Legal Reasons",
            Self::InternalServerError => "Internal Server Error",
            Self::NotImplemented => "Not Implemented",
            Self::BadGateway => "Bad Gateway",
            Self::ServiceUnavailable => "Service Unavailable",
            Self::GatewayTimeout => "Gateway Timeout",
            Self::HttpVersionNotSupported => "HTTP Version Not Supported",
            Self::VariantAlsoNegotiates => "Variant Also Negotiates",
            Self::InsufficientStorage => "Insufficient Storage",
            Self::LoopDetected => "Loop Detected",
            Self::NotExtended => "Not Extended",
            Self::NetworkAuthenticationRequired => "Network Authentication Required",
            Self::NetworkConnectTimeoutError => "Network Connect Timeout Error",
        }
    }

    /// Returns the long-form description sent to clients in error bodies.
    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "Success",
            Self::Created => "Successfully created resource",
            Self::Accepted => "The request has been accepted for processing",
            Self::NonAuthoritativeInformation => {
                "The returned meta information is from a cached copy"
            }
            Self::NoContent => {
                "The request has been successfully processed and the response is intentionally blank"
            }
            Self::ResetContent => {
                "The request has been successfully processed and the user agent should reset the document view which caused the request to be sent"
            }
            Self::PartialContent => {
                "The server is delivering only part of the resource due to a range header sent by the client"
            }
            Self::MultiStatus => {
                "The message body that follows is an XML message and can contain a number of separate response codes, depending on how many sub-requests were made"
            }
            Self::AlreadyReported => {
                "The members of a DAV binding have already been enumerated in a preceding part of the (multistatus) response, and are not being included again"
            }
            Self::ImUsed => {
                "The server has fulfilled a request for the resource, and the response is a representation of the result of one or more instance-manipulations applied to the current instance"
            }
            Self::MultipleChoices => {
                "The requested resource corresponds to any one of a set of representations, each with its own specific location"
            }
            Self::MovedPermanently => {
                "The requested resource has been assigned a new permanent URI"
            }
            Self::Found => "The requested resource resides temporarily under a different URI",
            Self::SeeOther => "The response to the request can be found under a different URI",
            Self::NotModified => {
                "Indicates that the resource has not been modified since the version specified by the request headers If-Modified-Since or If-Match"
            }
            Self::UseProxy => {
                "The requested resource is available only through a proxy, whose address is provided in the response"
            }
            Self::Unused => "This code was used in a previous version of the HTTP specification",
            Self::TemporaryRedirect => "The request should be repeated with another URI",
            Self::PermanentRedirect => {
                "The request and all future requests should be repeated using another URI"
            }
            Self::BadRequest => {
                "The server cannot or will not process the request due to something that is perceived to be a client error"
            }
            Self::Unauthorized => {
                "The request has not been applied because it lacks valid authentication credentials for the target resource"
            }
            Self::PaymentRequired => "Reserved for future use",
            Self::Forbidden => "You don't have permission to access this page",
            Self::NotFound => "The requested resource could not be found",
            Self::MethodNotAllowed => "The request method is not supported by the target resource",
            Self::NotAcceptable => {
                "The target resource does not have a current representation that would be acceptable to the user agent, according to the proactive negotiation header fields received in the request"
            }
            Self::ProxyAuthenticationRequired => {
                "The client must authenticate itself to get the requested response"
            }
            Self::RequestTimeout => {
                "The server did not receive a complete request message within the time that it was prepared to wait"
            }
            Self::Conflict => {
                "The request could not be completed due to a conflict with the current state of the target resource"
            }
            Self::Gone => {
                "The target resource is no longer available at the origin server and that this condition is likely to be permanent"
            }
            Self::LengthRequired => {
                "The server refuses to accept the request without a defined Content-Length"
            }
            Self::PreconditionFailed => {
                "One or more preconditions given in the request header fields evaluated to false when tested on the server"
            }
            Self::PayloadTooLarge => {
                "The server is refusing to process a request because the request payload is larger than the server is willing or able to process"
            }
            Self::UriTooLong => {
                "The server is refusing to service the request because the request-target is longer than the server is willing to interpret"
            }
            Self::UnsupportedMediaType => {
                "The server is refusing to service the request because the payload is in a format not supported by this method on the target resource"
            }
            Self::RangeNotSatisfiable => {
                "The server cannot produce a response matching the list of ranges given in the request's Range header field"
            }
            Self::ExpectationFailed => {
                "The server cannot meet the requirements of the Expect request-header field"
            }
            Self::ImATeapot => {
                "This code was defined in 1998 as one of the traditional IETF April Fools' jokes"
            }
            Self::MisdirectedRequest => {
                "The server is not able to produce a response for this request, though it understands the request"
            }
            Self::UnprocessableEntity => {
                "The server understands the content type of the request payload and the syntax of the payload is correct, but it was unable to process the contained instructions"
            }
            Self::Locked => "The resource that is being accessed is locked",
            Self::FailedDependency => {
                "The method could not be performed on the resource because the requested action depended on another action and that action failed"
            }
            Self::TooEarly => {
                "The server is unwilling to risk processing a request that might be replayed"
            }
            Self::UpgradeRequired => "The client should switch to a different protocol",
            Self::PreconditionRequired => "The server requires the request to be conditional",
            Self::TooManyRequests => {
                "The user has sent too many requests in a given amount of time"
            }
            Self::RequestHeaderFieldsTooLarge => {
                "The server is unwilling to process the request because its header fields are too large"
            }
            Self::UnavailableForLegalReasons => {
                "The server cannot serve the requested content because it is legally restricted"
            }
            Self::InternalServerError => {
                "The server encountered an internal error or misconfiguration and was unable to complete your request"
            }
            Self::NotImplemented => {
                "The server does not support the functionality required to fulfill the request"
            }
            Self::BadGateway => {
                "The server was acting as a gateway or proxy and received an invalid response from the upstream server"
            }
            Self::ServiceUnavailable => {
                "The server is currently unable to handle the request due to a temporary overloading or maintenance of the server"
            }
            Self::GatewayTimeout => {
                "The server was acting as a gateway or proxy and did not receive a timely response from the upstream server"
            }
            Self::HttpVersionNotSupported => {
                "The server does not support the HTTP protocol version used in the request"
            }
            Self::VariantAlsoNegotiates => {
                "Transparent content negotiation for the request results in a circular reference"
            }
            Self::InsufficientStorage => {
                "The server is unable to store the representation needed to complete the request"
            }
            Self::LoopDetected => {
                "The server detected an infinite loop while processing the request"
            }
            Self::NotExtended => {
                "Further extensions to the request are required for the server to fulfill it"
            }
            Self::NetworkAuthenticationRequired => {
                "The client needs to authenticate to gain network access"
            }
            Self::NetworkConnectTimeoutError => "The connection to the network has timed out",
        }
    }

    /// Looks up the status code for a numeric value.
    pub fn from_u16(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_u16() == code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

/// An HTTP request method.
///
/// Standard methods are represented as unit variants for zero-cost comparison.
/// Non-standard methods are captured in the `Custom` variant.
///
/// # Examples
///
/// ```
/// use routekit::http::Method;
///
/// let method: Method = "GET".parse().unwrap();
/// assert_eq!(method, Method::Get);
/// assert_eq!(method.as_str(), "GET");
/// assert!(method.is_safe());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET: retrieve a representation of the target resource.
    Get,
    /// POST: perform resource-specific processing on the request payload.
    Post,
    /// PUT: replace the target resource's current representation.
    Put,
    /// DELETE: remove the association between the target resource and its functionality.
    Delete,
    /// HEAD: identical to GET but without a response body.
    Head,
    /// OPTIONS: describe the communication options for the target resource.
    Options,
    /// PATCH: apply partial modifications to a resource.
    Patch,
    /// CONNECT: establish a tunnel to the server identified by the target resource.
    Connect,
    /// TRACE: perform a message loop-back test along the path to the target resource.
    Trace,
    /// A non-standard extension method.
    Custom(String),
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Returns `true` if this method is considered "safe" (no side effects per RFC 9110 §9.2.1).
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Options | Self::Trace)
    }

    /// Returns `true` for methods whose responses never carry a body here: `HEAD` and `OPTIONS`.
    pub fn is_bodiless(&self) -> bool {
        matches!(self, Self::Head | Self::Options)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH" => Self::Patch,
            "CONNECT" => Self::Connect,
            "TRACE" => Self::Trace,
            _ => Self::Custom(s.to_owned()),
        })
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_round_trips_through_from_u16() {
        for status in StatusCode::ALL {
            assert_eq!(StatusCode::from_u16(status.as_u16()), Some(status));
        }
        assert_eq!(StatusCode::from_u16(299), None);
    }

    #[test]
    fn codes_span_2xx_to_599() {
        assert_eq!(StatusCode::ALL.first().map(|s| s.as_u16()), Some(200));
        assert_eq!(StatusCode::ALL.last().map(|s| s.as_u16()), Some(599));
        assert!(StatusCode::ALL.windows(2).all(|w| w[0].as_u16() < w[1].as_u16()));
    }

    #[test]
    fn reason_and_message_differ() {
        assert_eq!(StatusCode::NotFound.canonical_reason(), "Not Found");
        assert_eq!(
            StatusCode::NotFound.message(),
            "The requested resource could not be found"
        );
        assert_eq!(StatusCode::Ok.message(), "Success");
    }

    #[test]
    fn display_uses_reason() {
        assert_eq!(
            StatusCode::MethodNotAllowed.to_string(),
            "405 Method Not Allowed"
        );
    }

    #[test]
    fn categories() {
        assert!(StatusCode::Created.is_success());
        assert!(StatusCode::Gone.is_client_error());
        assert!(StatusCode::BadGateway.is_server_error());
        assert!(!StatusCode::Found.is_success());
    }

    #[test]
    fn method_parse_is_case_insensitive_for_standard_verbs() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("Patch".parse::<Method>().unwrap(), Method::Patch);
        assert_eq!(
            "PURGE".parse::<Method>().unwrap(),
            Method::Custom("PURGE".into())
        );
    }

    #[test]
    fn bodiless_methods() {
        assert!(Method::Head.is_bodiless());
        assert!(Method::Options.is_bodiless());
        assert!(!Method::Get.is_bodiless());
    }
}
