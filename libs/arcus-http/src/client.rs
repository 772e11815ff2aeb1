//! The client handle
//!
//! [`HttpClient`] is a cheap-to-clone handle over a buffered middleware
//! stack built by [`HttpClientBuilder`]. All clones feed one queue and
//! share the connection pool, the retry policy and the concurrency
//! limit, so a client can be stored once and handed out freely.

use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use std::task::Poll;
use tower::Service as _;
use tower::buffer::Buffer;

use crate::builder::HttpClientBuilder;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::request::RequestBuilder;
use crate::response::ResponseBody;

/// Boxed response future produced by the middleware stack.
pub type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

/// Handle to the shared, buffered middleware stack.
pub type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// An HTTP client with a reqwest-like request API.
///
/// Built via [`HttpClient::builder`]. Cloning shares the underlying
/// stack rather than duplicating it.
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: BufferedService,
    pub(crate) max_body_size: usize,
    pub(crate) transport_security: TransportSecurity,
}

impl HttpClient {
    /// Build a client with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when TLS setup fails; see
    /// [`HttpClientBuilder::build`].
    pub fn new() -> Result<Self, HttpError> {
        HttpClientBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Start a request with an arbitrary method.
    #[must_use]
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(
            self.service.clone(),
            self.max_body_size,
            method,
            url,
            self.transport_security,
        )
    }

    #[must_use]
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    #[must_use]
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    #[must_use]
    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    #[must_use]
    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    #[must_use]
    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }
}

/// Translate buffer-worker errors back into [`HttpError`].
///
/// The buffer boxes everything; anything that is not already an
/// [`HttpError`] means the shared worker died, which is unrecoverable
/// for this client instance.
pub fn map_buffer_error(err: tower::BoxError) -> HttpError {
    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => {
            tracing::error!(error = %other, "buffered client worker failed");
            HttpError::ServiceClosed
        }
    }
}

/// Reserve a queue slot without waiting.
///
/// The client fails fast under pressure: a full queue yields
/// [`HttpError::Overloaded`] immediately instead of parking the caller.
pub async fn try_acquire_buffer_slot(service: &mut BufferedService) -> Result<(), HttpError> {
    let slot = std::future::poll_fn(|cx| match service.poll_ready(cx) {
        Poll::Ready(result) => Poll::Ready(Some(result)),
        Poll::Pending => Poll::Ready(None),
    })
    .await;

    match slot {
        Some(Ok(())) => Ok(()),
        Some(Err(err)) => Err(map_buffer_error(err)),
        None => Err(HttpError::Overloaded),
    }
}
