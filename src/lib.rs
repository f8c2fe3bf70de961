//! folio-guard - Fixed-Window Rate Limiting
//!
//! This crate implements the abuse guard for a portfolio site's
//! form-adjacent endpoints: an in-memory, per-key fixed-window rate limiter
//! and a small HTTP service that answers allow/deny with `Retry-After`
//! hints.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
