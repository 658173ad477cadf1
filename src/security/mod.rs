//! Security policies applied to responses.
//!
//! - [`Cors`]: Cross-Origin Resource Sharing headers for preflight requests,
//!   plus `Content-Security-Policy` and `X-Frame-Options` on every response.

mod cors;

pub use cors::Cors;
