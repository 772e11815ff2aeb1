//! Error types for the HTTP client

use std::time::Duration;

/// Classifies why a URL failed validation before any request was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidUriKind {
    /// The string is not a syntactically valid URI.
    ParseError,
    /// The URI has no host (e.g. a relative path).
    MissingAuthority,
    /// The URI has no scheme.
    MissingScheme,
}

/// Errors produced by the HTTP client and its middleware stack.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HttpError {
    /// Building the `http::Request` failed.
    #[error("failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// A header name supplied by the caller is not valid.
    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// A header value supplied by the caller is not valid.
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Connection-level failure (DNS, TCP, TLS handshake, broken stream).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS configuration could not be built.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// The response body exceeded the configured size limit.
    ///
    /// The limit applies to decompressed bytes, so a compressed response
    /// may trip it even when the wire size is small.
    #[error("response body too large: limit {limit} bytes, got at least {actual}")]
    BodyTooLarge { limit: usize, actual: usize },

    /// The server answered with a non-2xx status.
    ///
    /// Produced by [`HttpResponse::error_for_status`] and the `checked_*`
    /// body readers, never by `send()` itself.
    ///
    /// [`HttpResponse::error_for_status`]: crate::HttpResponse::error_for_status
    #[error("HTTP status {status}")]
    HttpStatus {
        status: http::StatusCode,
        /// A capped prefix of the response body, lossily decoded.
        body_preview: String,
        content_type: Option<String>,
        /// Parsed `Retry-After` header, when the server sent a usable one.
        retry_after: Option<Duration>,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The client is at its concurrency limit and load-shedding is active.
    #[error("client overloaded, try again later")]
    Overloaded,

    /// The shared client worker has shut down; the client handle is unusable.
    #[error("client service closed")]
    ServiceClosed,

    /// The request URL failed validation.
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// The URL scheme is not allowed by the transport security policy.
    #[error("scheme `{scheme}` not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}
