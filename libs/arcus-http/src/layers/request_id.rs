//! Request correlation ids
//!
//! Every outbound request is stamped with an `x-client-request-id`
//! header so that client and service logs can be joined on one id. The
//! companion `x-return-client-request-id` header asks the service to
//! echo the id back in its response.

use http::Request;
use http::header::{HeaderName, HeaderValue};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use uuid::Uuid;

/// Header carrying the client-chosen correlation id.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-client-request-id");

/// Header asking the service to echo the correlation id back.
pub const RETURN_REQUEST_ID_HEADER: HeaderName =
    HeaderName::from_static("x-return-client-request-id");

/// Stamps correlation headers onto outbound requests.
///
/// A caller-supplied `x-client-request-id` is left untouched; otherwise a
/// random UUID is generated per request. The echo request header is set
/// unconditionally. The layer keeps no state, so clones are free and a
/// single instance serves any number of concurrent requests.
///
/// In the builder's stack this sits outside the retry middleware, so all
/// attempts of one logical request share the same id.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl RequestIdLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

/// Service produced by [`RequestIdLayer`].
#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, ReqBody> Service<Request<ReqBody>> for RequestIdService<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let headers = req.headers_mut();

        // A hyphenated UUID is pure ASCII, so from_str cannot fail here.
        let mut buf = Uuid::encode_buffer();
        if !headers.contains_key(REQUEST_ID_HEADER)
            && let Ok(id) =
                HeaderValue::from_str(Uuid::new_v4().hyphenated().encode_lower(&mut buf))
        {
            headers.insert(REQUEST_ID_HEADER, id);
        }

        headers.insert(RETURN_REQUEST_ID_HEADER, HeaderValue::from_static("true"));

        self.inner.call(req)
    }
}
