#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport for Arcus service clients
//!
//! This crate provides a hyper-based HTTP client with:
//! - Automatic TLS via rustls (HTTPS only by default)
//! - Connection pooling
//! - Configurable timeouts
//! - Automatic retries with exponential backoff
//! - Correlation id injection (`x-client-request-id`)
//! - User-Agent header injection
//! - Concurrency limiting
//! - **Transparent response decompression** (gzip, brotli, deflate)
//!
//! # Correlation Ids
//!
//! Every outgoing request carries an `x-client-request-id` header. A
//! caller-supplied id is kept as-is; otherwise the client generates a
//! random UUID. The companion `x-return-client-request-id: true` header
//! asks the server to echo the id back so both sides of a slow
//! operation can be matched in logs. Retries of one logical request all
//! share a single id.
//!
//! # Transparent Decompression
//!
//! The client automatically:
//! - Sends `Accept-Encoding: gzip, br, deflate` header on all requests
//! - Decompresses response bodies based on `Content-Encoding` header
//! - Applies body size limits to **decompressed** bytes (protecting against zip bombs)
//!
//! No configuration is required; decompression is always enabled.
//!
//! # Example
//!
//! ```ignore
//! use arcus_http::{HttpClient, HttpClientBuilder};
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .user_agent("my-app/1.0")
//!     .build()?;
//!
//! // reqwest-like API: response has body-reading methods
//! let data: MyData = client
//!     .get("https://example.com/api")
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;
mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{
    DEFAULT_USER_AGENT, ExponentialBackoff, HttpClientConfig, RateLimitConfig, RedirectConfig,
    RetryConfig, RetryTrigger, TlsRootConfig, TransportSecurity, is_idempotent_method,
};
pub use error::{HttpError, InvalidUriKind};
pub use layers::{
    REQUEST_ID_HEADER, RETURN_REQUEST_ID_HEADER, RequestIdLayer, RequestIdService, RetryLayer,
    RetryService, SecureRedirectPolicy, UserAgentLayer, UserAgentService,
};
pub use request::RequestBuilder;
pub use response::{HttpResponse, LimitedBody, ResponseBody, parse_retry_after};
