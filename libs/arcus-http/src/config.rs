//! Client configuration types
//!
//! [`HttpClientConfig`] is the root of the configuration tree. Presets
//! cover the common cases; individual fields can always be overridden
//! through [`HttpClientBuilder`](crate::HttpClientBuilder).

use std::collections::HashSet;
use std::time::Duration;

/// User-Agent sent when the caller does not configure one.
pub const DEFAULT_USER_AGENT: &str = concat!("arcus-http/", env!("CARGO_PKG_VERSION"));

/// A condition that may trigger a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryTrigger {
    /// Connection-level failure before or during the exchange.
    TransportError,
    /// The per-request timeout elapsed.
    Timeout,
    /// The server answered with this status code.
    Status(u16),
    /// The outcome is never retried.
    NonRetryable,
}

impl RetryTrigger {
    pub const REQUEST_TIMEOUT: Self = Self::Status(408);
    pub const TOO_MANY_REQUESTS: Self = Self::Status(429);
    pub const INTERNAL_SERVER_ERROR: Self = Self::Status(500);
    pub const BAD_GATEWAY: Self = Self::Status(502);
    pub const SERVICE_UNAVAILABLE: Self = Self::Status(503);
    pub const GATEWAY_TIMEOUT: Self = Self::Status(504);
}

/// Whether a method is safe to replay without coordination.
#[must_use]
pub fn is_idempotent_method(method: &http::Method) -> bool {
    matches!(
        *method,
        http::Method::GET
            | http::Method::HEAD
            | http::Method::PUT
            | http::Method::DELETE
            | http::Method::OPTIONS
            | http::Method::TRACE
    )
}

/// Exponential backoff schedule for retries.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
    /// Factor applied per attempt.
    pub multiplier: f64,
    /// Add up to 25% random extra delay to spread out retry storms.
    pub jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Near-zero delays without jitter. Intended for tests.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(100),
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// Longer schedule for clients talking to flaky backends.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            initial: Duration::from_millis(50),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Retry behavior of the client.
///
/// Two trigger sets control the decision: `always_retry` applies to every
/// request, `idempotent_retry` only to methods that are safe to replay
/// (see [`is_idempotent_method`]). A `POST` that hits a 500 is therefore
/// not retried by default, while a `GET` is.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay schedule between attempts.
    pub backoff: ExponentialBackoff,
    /// Triggers retried regardless of the request method.
    pub always_retry: HashSet<RetryTrigger>,
    /// Triggers retried only for idempotent methods.
    pub idempotent_retry: HashSet<RetryTrigger>,
    /// Ignore the server's `Retry-After` header and always use the
    /// computed backoff delay.
    pub ignore_retry_after: bool,
    /// How many bytes of a failed response body to drain before retrying,
    /// so the pooled connection stays reusable. Bodies larger than this
    /// force a fresh connection.
    pub retry_response_drain_limit: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: ExponentialBackoff::default(),
            always_retry: HashSet::from([RetryTrigger::TOO_MANY_REQUESTS]),
            idempotent_retry: HashSet::from([
                RetryTrigger::TransportError,
                RetryTrigger::Timeout,
                RetryTrigger::REQUEST_TIMEOUT,
                RetryTrigger::INTERNAL_SERVER_ERROR,
                RetryTrigger::BAD_GATEWAY,
                RetryTrigger::SERVICE_UNAVAILABLE,
                RetryTrigger::GATEWAY_TIMEOUT,
            ]),
            ignore_retry_after: false,
            retry_response_drain_limit: 64 * 1024,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// More attempts with a longer backoff ceiling.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            max_retries: 5,
            backoff: ExponentialBackoff::aggressive(),
            ..Self::default()
        }
    }

    /// Decide whether `trigger` warrants another attempt of `method`.
    #[must_use]
    pub fn should_retry(&self, trigger: RetryTrigger, method: &http::Method) -> bool {
        if matches!(trigger, RetryTrigger::NonRetryable) {
            return false;
        }
        if self.always_retry.contains(&trigger) {
            return true;
        }
        is_idempotent_method(method) && self.idempotent_retry.contains(&trigger)
    }
}

/// Cap on the number of requests in flight at once.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_concurrent_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 100,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_concurrent_requests: usize::MAX,
        }
    }

    #[must_use]
    pub fn conservative() -> Self {
        Self {
            max_concurrent_requests: 10,
        }
    }
}

/// Redirect-following policy.
///
/// Defaults are restrictive: same-origin only, no HTTPS-to-HTTP
/// downgrades, and sensitive headers are stripped whenever a redirect
/// leaves the original origin.
#[derive(Debug, Clone)]
pub struct RedirectConfig {
    /// Maximum redirects to follow before giving up. Zero disables
    /// following entirely and surfaces 3xx responses to the caller.
    pub max_redirects: usize,
    /// Only follow redirects that stay on the original scheme/host/port.
    pub same_origin_only: bool,
    /// Cross-origin hosts that may be followed even when
    /// `same_origin_only` is set.
    pub allowed_redirect_hosts: Vec<String>,
    /// Remove `Authorization`, `Cookie` and `Proxy-Authorization` when
    /// following a redirect to another origin.
    pub strip_sensitive_headers: bool,
    /// Permit redirects from `https` to plain `http`.
    pub allow_https_downgrade: bool,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            same_origin_only: true,
            allowed_redirect_hosts: Vec::new(),
            strip_sensitive_headers: true,
            allow_https_downgrade: false,
        }
    }
}

impl RedirectConfig {
    /// Follow cross-origin redirects, still stripping sensitive headers.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            same_origin_only: false,
            ..Self::default()
        }
    }

    /// Never follow a redirect; 3xx responses are returned verbatim.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_redirects: 0,
            ..Self::default()
        }
    }

    /// Relaxed policy for mock servers on localhost.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            same_origin_only: false,
            allow_https_downgrade: true,
            ..Self::default()
        }
    }
}

/// Which root certificate store the TLS connector trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsRootConfig {
    /// Bundled webpki roots (Mozilla CA list).
    #[default]
    WebPki,
    /// Roots from the operating system trust store.
    Native,
}

/// Whether plain-text HTTP is ever allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportSecurity {
    /// `https` URLs only. Any `http` URL is rejected before connecting.
    #[default]
    TlsOnly,
    /// Also accept `http` URLs. Only for local development and tests.
    AllowInsecureHttp,
}

/// Complete configuration of an [`HttpClient`](crate::HttpClient).
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Timeout for a single request/response exchange.
    pub request_timeout: Duration,
    /// Limit on decompressed response body size.
    pub max_body_size: usize,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Retry policy; `None` disables the retry middleware entirely.
    pub retry: Option<RetryConfig>,
    /// Concurrency cap; `None` removes the limit.
    pub rate_limit: Option<RateLimitConfig>,
    /// Plain-HTTP policy.
    pub transport: TransportSecurity,
    /// Trusted TLS roots.
    pub tls_roots: TlsRootConfig,
    /// Depth of the request queue shared by client clones.
    pub buffer_capacity: usize,
    /// Redirect-following policy.
    pub redirect: RedirectConfig,
    /// How long an idle pooled connection is kept alive.
    pub pool_idle_timeout: Option<Duration>,
    /// Idle connections kept per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            retry: Some(RetryConfig::default()),
            rate_limit: Some(RateLimitConfig::default()),
            transport: TransportSecurity::default(),
            tls_roots: TlsRootConfig::default(),
            buffer_capacity: 1024,
            redirect: RedirectConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpClientConfig {
    /// Bare transport: no retries, no concurrency cap, no redirect
    /// following. The caller sees every response as the server sent it.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            retry: None,
            rate_limit: None,
            redirect: RedirectConfig::disabled(),
            ..Self::default()
        }
    }

    /// Tuned for polling long-running operations.
    ///
    /// Redirect following is off so a poller observes 3xx answers
    /// verbatim and can treat them as terminal. Retries stay enabled;
    /// polls are idempotent `GET`s, so transient transport faults and
    /// 5xx blips are absorbed without advancing the operation state.
    #[must_use]
    pub fn polling() -> Self {
        Self {
            redirect: RedirectConfig::disabled(),
            ..Self::default()
        }
    }

    /// Short timeouts and deterministic behavior for tests against mock
    /// servers.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            retry: None,
            rate_limit: None,
            redirect: RedirectConfig::for_testing(),
            ..Self::default()
        }
    }
}
