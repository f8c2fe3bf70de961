//! HTTP surface for rate limit decisions.
//!
//! Denied checks are answered with `429 Too Many Requests` and a
//! `Retry-After` header so the site's form handlers can pass the hint on.

mod handlers;
mod server;

pub use handlers::{client_key, decision_response, AppState, CheckRequest};
pub use server::{router, HttpServer};
