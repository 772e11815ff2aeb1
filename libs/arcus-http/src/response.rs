//! Response wrapper and body reading
//!
//! [`HttpResponse`] is what `send()` resolves to. It borrows the reqwest
//! surface: inspect status and headers for free, then consume the body
//! through `bytes()`, `text()` or `json()`. All body readers enforce the
//! client's size limit on decompressed bytes.

use bytes::{Bytes, BytesMut};
use http::Response;
use http_body::{Body, Frame};
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::error::HttpError;

/// Body preview kept when turning a non-2xx response into an error.
const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// The type-erased body produced by the middleware stack.
pub type ResponseBody = BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

fn map_body_error(err: Box<dyn std::error::Error + Send + Sync>) -> HttpError {
    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(other) => HttpError::Transport(other),
    }
}

pin_project! {
    /// Streaming body that fails with [`HttpError::BodyTooLarge`] once
    /// more than `limit` bytes have been read.
    pub struct LimitedBody {
        #[pin]
        inner: ResponseBody,
        limit: usize,
        read: usize,
    }
}

impl LimitedBody {
    pub(crate) fn new(inner: ResponseBody, limit: usize) -> Self {
        Self {
            inner,
            limit,
            read: 0,
        }
    }
}

impl Body for LimitedBody {
    type Data = Bytes;
    type Error = HttpError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        match this.inner.poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    *this.read += data.len();
                    if *this.read > *this.limit {
                        return Poll::Ready(Some(Err(HttpError::BodyTooLarge {
                            limit: *this.limit,
                            actual: *this.read,
                        })));
                    }
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(map_body_error(err)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Parse a `Retry-After` header into a wait duration.
///
/// Both forms defined by RFC 9110 are handled: a non-negative integer
/// number of seconds, or an HTTP-date. Anything else, a negative count,
/// or a date in the past yields `None`. Callers fall back to their own
/// schedule in that case; a malformed hint never aborts anything.
#[must_use]
pub fn parse_retry_after(headers: &http::HeaderMap) -> Option<Duration> {
    let value = headers.get(http::header::RETRY_AFTER)?;
    let value = value.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<i64>() {
        if seconds < 0 {
            return None;
        }
        return Some(Duration::from_secs(seconds.cast_unsigned()));
    }

    let date = httpdate::parse_http_date(value).ok()?;
    date.duration_since(std::time::SystemTime::now()).ok()
}

/// A response with deferred body reading.
///
/// Dropping it without touching the body is fine; hyper cleans up the
/// connection in the background.
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> http::StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &http::HeaderMap {
        self.inner.headers()
    }

    /// The body size limit this response was configured with.
    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Turn a non-2xx response into an [`HttpError::HttpStatus`].
    ///
    /// On error the first few kilobytes of the body are captured as a
    /// preview, along with the content type and any `Retry-After` hint.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::HttpStatus`] when the status is not 2xx.
    pub async fn error_for_status(self) -> Result<Self, HttpError> {
        let max_body_size = self.max_body_size;
        let inner = check_status(self.inner, max_body_size).await?;
        Ok(Self {
            inner,
            max_body_size,
        })
    }

    /// Read the full body without checking the status code.
    ///
    /// # Errors
    ///
    /// Fails with [`HttpError::BodyTooLarge`] when the body exceeds the
    /// configured limit, or [`HttpError::Transport`] on stream errors.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        read_body_limited(self.inner.into_body(), self.max_body_size).await
    }

    /// Check the status, then read the full body.
    ///
    /// # Errors
    ///
    /// Everything [`Self::error_for_status`] and [`Self::bytes`] can
    /// return.
    pub async fn checked_bytes(self) -> Result<Bytes, HttpError> {
        self.error_for_status().await?.bytes().await
    }

    /// Check the status, then read the body as UTF-8 text.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// Everything [`Self::checked_bytes`] can return.
    pub async fn text(self) -> Result<String, HttpError> {
        let bytes = self.checked_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Check the status, then deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Everything [`Self::checked_bytes`] can return, plus
    /// [`HttpError::Json`] when deserialization fails.
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> Result<T, HttpError> {
        let bytes = self.checked_bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Give up the wrapper and take the raw `http::Response`.
    ///
    /// The returned body is unlimited; prefer [`Self::into_limited_body`]
    /// when streaming untrusted data.
    #[must_use]
    pub fn into_inner(self) -> Response<ResponseBody> {
        self.inner
    }

    /// Take the raw body stream.
    #[must_use]
    pub fn into_body(self) -> ResponseBody {
        self.inner.into_body()
    }

    /// Take the body as a stream that enforces the size limit.
    #[must_use]
    pub fn into_limited_body(self) -> LimitedBody {
        let limit = self.max_body_size;
        LimitedBody::new(self.inner.into_body(), limit)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.inner.status())
            .field("headers", self.inner.headers())
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}

async fn check_status(
    response: Response<ResponseBody>,
    max_body_size: usize,
) -> Result<Response<ResponseBody>, HttpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = parse_retry_after(response.headers());
    let content_type = response
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);

    let preview_limit = max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
    let body_preview = match read_body_limited(response.into_body(), preview_limit).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => "<body unavailable for preview>".to_owned(),
    };

    Err(HttpError::HttpStatus {
        status,
        body_preview,
        content_type,
        retry_after,
    })
}

async fn read_body_limited(mut body: ResponseBody, limit: usize) -> Result<Bytes, HttpError> {
    let mut collected = BytesMut::new();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(map_body_error)?;
        if let Ok(data) = frame.into_data() {
            if collected.len() + data.len() > limit {
                return Err(HttpError::BodyTooLarge {
                    limit,
                    actual: collected.len() + data.len(),
                });
            }
            collected.extend_from_slice(&data);
        }
    }
    Ok(collected.freeze())
}
