//! HTTP transport for PulseOps
//!
//! Wraps `reqwest` behind a mockable trait so the session client and the
//! workflow crates never touch the raw HTTP stack directly.
//!
//! ## Features
//!
//! - **Trait-based design**: Mockable via `HttpClientTrait`
//! - **Configurable**: Timeouts, retries, proxy, user-agent
//! - **Retry middleware**: Exponential backoff for transient failures only
//! - **JSON bodies**: Request bodies are `serde_json::Value`, so a request
//!   can be rebuilt and re-sent on retry

pub mod client;
pub mod config;
pub mod error;
pub mod middleware;

pub use client::{HttpClient, HttpClientTrait};
pub use config::HttpConfig;
pub use error::{HttpError, Result};
pub use middleware::{RetryConfig, RetryMiddleware};

/// Re-export commonly used types
pub use reqwest::{header, Method, Response, StatusCode};
