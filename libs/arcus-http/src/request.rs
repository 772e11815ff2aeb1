//! Request building
//!
//! [`RequestBuilder`] collects method, URL, headers and body, then
//! dispatches through the client's shared middleware stack. Header
//! parsing failures are deferred: the builder keeps chaining and
//! `send()` reports the first problem, which keeps call sites free of
//! intermediate `?`s.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http_body_util::Full;
use tower::Service as _;

use crate::client::{map_buffer_error, try_acquire_buffer_slot};
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::HttpResponse;

/// What will be sent as the request body.
pub enum BodyKind {
    Empty,
    Bytes(Bytes),
    Json(Bytes),
}

/// Builder for a single request.
///
/// Created by the verb methods on [`HttpClient`](crate::HttpClient).
#[must_use = "a request builder does nothing until send() is awaited"]
pub struct RequestBuilder {
    pub(crate) service: crate::client::BufferedService,
    pub(crate) max_body_size: usize,
    pub(crate) method: http::Method,
    pub(crate) url: String,
    pub(crate) headers: Vec<(HeaderName, HeaderValue)>,
    pub(crate) body: BodyKind,
    pub(crate) error: Option<HttpError>,
    pub(crate) transport_security: TransportSecurity,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: crate::client::BufferedService,
        max_body_size: usize,
        method: http::Method,
        url: impl Into<String>,
        transport_security: TransportSecurity,
    ) -> Self {
        Self {
            service,
            max_body_size,
            method,
            url: url.into(),
            headers: Vec::new(),
            body: BodyKind::Empty,
            error: None,
            transport_security,
        }
    }

    /// Add a header. Invalid names or values are reported by `send()`.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match (
            HeaderName::from_bytes(name.as_ref().as_bytes()),
            HeaderValue::from_str(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(err), _) => {
                if self.error.is_none() {
                    self.error = Some(err.into());
                }
            }
            (_, Err(err)) => {
                if self.error.is_none() {
                    self.error = Some(err.into());
                }
            }
        }
        self
    }

    /// Add several headers at once.
    pub fn headers<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in pairs {
            self = self.header(name, value);
        }
        self
    }

    /// Serialize `value` as the JSON request body.
    ///
    /// Sets `Content-Type: application/json` unless the caller supplied
    /// their own content type.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Json`] when serialization fails, or any
    /// header error recorded earlier on this builder.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Result<Self, HttpError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        let bytes = serde_json::to_vec(value)?;
        self.body = BodyKind::Json(Bytes::from(bytes));
        Ok(self)
    }

    /// Use raw bytes as the request body. No content type is implied.
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = BodyKind::Bytes(body.into());
        self
    }

    /// Use a string as the request body. No content type is implied.
    pub fn body_string(mut self, body: impl Into<String>) -> Self {
        self.body = BodyKind::Bytes(Bytes::from(body.into()));
        self
    }

    fn validate_url(&self) -> Result<http::Uri, HttpError> {
        let uri: http::Uri =
            self.url
                .parse()
                .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                    url: self.url.clone(),
                    kind: InvalidUriKind::ParseError,
                    reason: e.to_string(),
                })?;

        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "URL must be absolute and include a host".to_owned(),
            });
        }

        match uri.scheme_str() {
            Some("https") => {}
            Some("http") => {
                if !matches!(self.transport_security, TransportSecurity::AllowInsecureHttp) {
                    return Err(HttpError::InvalidScheme {
                        scheme: "http".to_owned(),
                        reason: "plain HTTP is disabled for this client".to_owned(),
                    });
                }
            }
            Some(other) => {
                return Err(HttpError::InvalidScheme {
                    scheme: other.to_owned(),
                    reason: "only http and https are supported".to_owned(),
                });
            }
            None => {
                return Err(HttpError::InvalidUri {
                    url: self.url.clone(),
                    kind: InvalidUriKind::MissingScheme,
                    reason: "URL must include a scheme".to_owned(),
                });
            }
        }

        Ok(uri)
    }

    /// Send the request through the client's middleware stack.
    ///
    /// # Errors
    ///
    /// Any header error recorded on this builder, URL validation
    /// failures, [`HttpError::Overloaded`] when the client's queue is
    /// full, and every transport-level error the stack can produce.
    /// Non-2xx statuses are not errors here; see
    /// [`HttpResponse::error_for_status`].
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        let uri = self.validate_url()?;

        let (body_bytes, default_content_type) = match self.body {
            BodyKind::Empty => (Bytes::new(), None),
            BodyKind::Bytes(bytes) => (bytes, None),
            BodyKind::Json(bytes) => (
                bytes,
                Some(HeaderValue::from_static("application/json")),
            ),
        };

        let mut request = http::Request::builder()
            .method(self.method)
            .uri(uri)
            .body(Full::new(body_bytes))?;

        for (name, value) in self.headers {
            request.headers_mut().append(name, value);
        }
        if let Some(content_type) = default_content_type
            && !request.headers().contains_key(http::header::CONTENT_TYPE)
        {
            request
                .headers_mut()
                .insert(http::header::CONTENT_TYPE, content_type);
        }

        let mut service = self.service;
        try_acquire_buffer_slot(&mut service).await?;
        let response = service.call(request).await.map_err(map_buffer_error)?;

        Ok(HttpResponse {
            inner: response,
            max_body_size: self.max_body_size,
        })
    }
}
