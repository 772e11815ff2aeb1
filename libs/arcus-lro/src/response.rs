//! Materialized poll responses

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// A fully collected HTTP response, as the poller consumes it.
///
/// The poll state machine inspects status, headers, and (for the
/// status-monitor strategy) the body; the caller keeps the same value as
/// the operation's eventual result. Collecting the body up front keeps
/// [`Poller::update`](crate::Poller::update) synchronous and lets the
/// response be handed back verbatim.
#[derive(Debug, Clone)]
pub struct PollResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl PollResponse {
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Collect an [`arcus_http::HttpResponse`] into a poll response.
    ///
    /// # Errors
    ///
    /// Returns an error when body collection fails, including
    /// [`HttpError::BodyTooLarge`](arcus_http::HttpError::BodyTooLarge)
    /// when the body exceeds the client's configured limit.
    pub async fn read(response: arcus_http::HttpResponse) -> Result<Self, arcus_http::HttpError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

impl From<http::Response<Bytes>> for PollResponse {
    fn from(response: http::Response<Bytes>) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }
}
