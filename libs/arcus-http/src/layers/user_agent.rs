//! User-Agent header injection

use http::Request;
use http::header::{HeaderValue, USER_AGENT};
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::error::HttpError;

/// Sets `User-Agent` on requests that do not already carry one.
///
/// A caller-provided value always wins; the layer only fills the gap.
#[derive(Debug, Clone)]
pub struct UserAgentLayer {
    user_agent: HeaderValue,
}

impl UserAgentLayer {
    /// Build the layer from a string.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidHeaderValue`] when the string contains
    /// bytes that are not legal in a header value.
    pub fn try_new(user_agent: impl AsRef<str>) -> Result<Self, HttpError> {
        Ok(Self {
            user_agent: HeaderValue::from_str(user_agent.as_ref())?,
        })
    }
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = UserAgentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAgentService {
            inner,
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Service produced by [`UserAgentLayer`].
#[derive(Debug, Clone)]
pub struct UserAgentService<S> {
    inner: S,
    user_agent: HeaderValue,
}

impl<S, ReqBody> Service<Request<ReqBody>> for UserAgentService<S>
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
        if !req.headers().contains_key(USER_AGENT) {
            req.headers_mut()
                .insert(USER_AGENT, self.user_agent.clone());
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::future::{Ready, ready};

    #[derive(Clone)]
    struct AssertUserAgent {
        expected: &'static str,
    }

    impl Service<Request<()>> for AssertUserAgent {
        type Response = ();
        type Error = HttpError;
        type Future = Ready<Result<(), HttpError>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), HttpError>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<()>) -> Self::Future {
            let value = req.headers().get(USER_AGENT).expect("User-Agent missing");
            assert_eq!(value, self.expected);
            ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn fills_missing_user_agent() {
        let layer = UserAgentLayer::try_new("arcus-test/1.0").unwrap();
        let mut service = layer.layer(AssertUserAgent {
            expected: "arcus-test/1.0",
        });

        service.call(Request::new(())).await.unwrap();
    }

    #[tokio::test]
    async fn keeps_caller_user_agent() {
        let layer = UserAgentLayer::try_new("arcus-test/1.0").unwrap();
        let mut service = layer.layer(AssertUserAgent {
            expected: "custom-agent/2.0",
        });

        let mut req = Request::new(());
        req.headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static("custom-agent/2.0"));
        service.call(req).await.unwrap();
    }

    #[test]
    fn rejects_control_characters() {
        assert!(UserAgentLayer::try_new("bad\nagent").is_err());
    }
}
