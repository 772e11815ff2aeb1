//! Retry middleware
//!
//! Replays failed requests according to [`RetryConfig`]. The decision
//! matrix lives in [`RetryConfig::should_retry`]; this layer supplies the
//! mechanics: cloning the request per attempt, honoring `Retry-After`
//! hints, exponential backoff with jitter, and draining failed response
//! bodies so pooled connections stay reusable.
//!
//! The layer sits outside the timeout middleware, so every attempt gets
//! the full per-request timeout.

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use rand::Rng as _;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};

use crate::config::{ExponentialBackoff, RetryConfig, RetryTrigger};
use crate::error::HttpError;
use crate::response::{ResponseBody, parse_retry_after};

/// Hard ceiling on any computed backoff delay.
const MAX_BACKOFF_SECS: f64 = 86400.0;

/// Adds retry behavior to the client stack.
#[derive(Debug, Clone)]
pub struct RetryLayer {
    config: Arc<RetryConfig>,
}

impl RetryLayer {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Service produced by [`RetryLayer`].
#[derive(Debug, Clone)]
pub struct RetryService<S> {
    inner: S,
    config: Arc<RetryConfig>,
}

impl<S> Service<Request<Full<Bytes>>> for RetryService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResponseBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = Response<ResponseBody>;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        // Move the ready service into the future and leave a fresh clone
        // behind; the clone re-checks readiness on its next use.
        let clone = self.inner.clone();
        let mut service = std::mem::replace(&mut self.inner, clone);
        let config = self.config.clone();

        let (parts, body) = req.into_parts();
        let method = parts.method.clone();
        let parts = Arc::new(parts);

        Box::pin(async move {
            let mut attempt: u32 = 0;
            loop {
                let request = Request::from_parts((*parts).clone(), body.clone());

                service.ready().await?;
                match service.call(request).await {
                    Ok(response) => {
                        let status = response.status();
                        let trigger = RetryTrigger::Status(status.as_u16());
                        if attempt >= config.max_retries
                            || !config.should_retry(trigger, &method)
                        {
                            return Ok(response);
                        }

                        let retry_after = if config.ignore_retry_after {
                            None
                        } else {
                            parse_retry_after(response.headers())
                        };
                        let delay = retry_after
                            .unwrap_or_else(|| calculate_backoff(&config.backoff, attempt));

                        drain_response_body(response, config.retry_response_drain_limit).await;

                        tracing::debug!(
                            retry = attempt + 1,
                            max_retries = config.max_retries,
                            status = status.as_u16(),
                            method = %method,
                            request_id = request_id_of(&parts),
                            backoff_ms = millis(delay),
                            retry_after_used = retry_after.is_some(),
                            "retrying after error status"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(err) => {
                        let trigger = get_retry_trigger(&err);
                        if attempt >= config.max_retries
                            || !config.should_retry(trigger, &method)
                        {
                            return Err(err);
                        }

                        let delay = calculate_backoff(&config.backoff, attempt);
                        tracing::debug!(
                            retry = attempt + 1,
                            max_retries = config.max_retries,
                            trigger = ?trigger,
                            method = %method,
                            request_id = request_id_of(&parts),
                            backoff_ms = millis(delay),
                            "retrying after transport failure"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        })
    }
}

fn request_id_of(parts: &http::request::Parts) -> Option<&str> {
    parts
        .headers
        .get(crate::layers::REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Map a client error to the retry trigger it represents.
fn get_retry_trigger(err: &HttpError) -> RetryTrigger {
    match err {
        HttpError::Transport(_) => RetryTrigger::TransportError,
        HttpError::Timeout(_) => RetryTrigger::Timeout,
        _ => RetryTrigger::NonRetryable,
    }
}

/// Compute the delay before retry number `attempt + 1`.
///
/// Degenerate configurations (zero or non-finite multipliers, absurd
/// durations) are sanitized rather than rejected; the result is always
/// a finite delay capped by the configured maximum.
fn calculate_backoff(backoff: &ExponentialBackoff, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);

    let multiplier = if backoff.multiplier.is_finite() && backoff.multiplier >= 1.0 {
        backoff.multiplier
    } else {
        2.0
    };
    let initial = backoff.initial.as_secs_f64().clamp(0.0, MAX_BACKOFF_SECS);
    let max = backoff.max.as_secs_f64().clamp(0.0, MAX_BACKOFF_SECS);

    let mut delay = (initial * multiplier.powi(exponent)).clamp(0.0, MAX_BACKOFF_SECS);
    if backoff.jitter {
        let jitter: f64 = rand::rng().random_range(0.0..=0.25);
        delay *= 1.0 + jitter;
    }

    Duration::from_secs_f64(delay.min(max))
}

/// Read and discard a response body so the connection can go back to the
/// pool, giving up once `limit` bytes have been consumed.
async fn drain_response_body(response: Response<ResponseBody>, limit: usize) {
    let mut body = response.into_body();
    let mut drained = 0usize;
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Some(data) = frame.data_ref() {
                    drained += data.len();
                    if drained > limit {
                        break;
                    }
                }
            }
            Err(_) => break,
        }
    }
}
