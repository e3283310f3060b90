//! Middleware components for HTTP request processing.
//!
//! Cross-cutting concerns layered around the router: authentication extractors, client IP
//! resolution, rate limiting, security headers and early request validation.

pub mod auth;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

pub use rate_limit::{EndpointRateLimiter, RateLimiter};
