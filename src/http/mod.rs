//! HTTP client module
//!
//! Provides the HTTP client used by both the session manager and the fetch
//! stage.
//!
//! # Features
//!
//! - **Automatic Retries**: timeouts, connection errors, 429 and 5xx
//! - **Rate Limiting**: token bucket shared by all clones of a client
//! - **Backoff Strategies**: constant, linear and exponential
//! - **Redirect Control**: login and validation inspect raw redirects

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
