//! Security-hardened redirect policy
//!
//! tower-http's `FollowRedirect` middleware delegates the follow/stop
//! decision to a policy. This one enforces [`RedirectConfig`]: a hop
//! budget, an optional same-origin restriction with a host allow-list,
//! refusal of silent HTTPS-to-HTTP downgrades, and stripping of
//! credential-bearing headers once a redirect leaves the original
//! origin.

use http::header::{AUTHORIZATION, COOKIE, HeaderName, PROXY_AUTHORIZATION};
use http::{Request, Uri};
use tower_http::follow_redirect::policy::{Action, Attempt, Policy};

use crate::config::RedirectConfig;

/// Headers that must not leak to a foreign origin.
const SENSITIVE_HEADERS: [HeaderName; 3] = [AUTHORIZATION, COOKIE, PROXY_AUTHORIZATION];

/// Redirect policy driven by [`RedirectConfig`].
///
/// The policy is stateful per request chain: `FollowRedirect` clones a
/// fresh instance for every initial request, so the hop counter and the
/// cross-origin flag never bleed between requests.
#[derive(Debug, Clone)]
pub struct SecureRedirectPolicy {
    config: RedirectConfig,
    redirects_followed: usize,
    left_origin: bool,
}

impl SecureRedirectPolicy {
    #[must_use]
    pub fn new(config: RedirectConfig) -> Self {
        Self {
            config,
            redirects_followed: 0,
            left_origin: false,
        }
    }

    fn is_allowed_host(&self, target: &Uri) -> bool {
        let Some(host) = target.host() else {
            return false;
        };
        self.config
            .allowed_redirect_hosts
            .iter()
            .any(|allowed| allowed == host)
    }
}

fn default_port(scheme: &str) -> u16 {
    match scheme {
        "http" => 80,
        "https" => 443,
        _ => 0,
    }
}

fn effective_port(uri: &Uri) -> u16 {
    uri.port_u16()
        .unwrap_or_else(|| default_port(uri.scheme_str().unwrap_or("https")))
}

fn is_same_origin(original: &Uri, target: &Uri) -> bool {
    original.scheme_str().unwrap_or("https") == target.scheme_str().unwrap_or("https")
        && original.host() == target.host()
        && effective_port(original) == effective_port(target)
}

fn is_https_downgrade(original: &Uri, target: &Uri) -> bool {
    original.scheme_str() == Some("https") && target.scheme_str() == Some("http")
}

impl<B, E> Policy<B, E> for SecureRedirectPolicy
where
    B: Clone,
{
    fn redirect(&mut self, attempt: &Attempt<'_>) -> Result<Action, E> {
        self.redirects_followed += 1;
        if self.redirects_followed > self.config.max_redirects {
            tracing::debug!(
                max_redirects = self.config.max_redirects,
                "redirect limit reached, surfacing the 3xx response"
            );
            return Ok(Action::Stop);
        }

        let previous = attempt.previous();
        let location = attempt.location();

        if !self.config.allow_https_downgrade && is_https_downgrade(previous, location) {
            tracing::warn!(
                location = %location,
                "refusing redirect that downgrades HTTPS to plain HTTP"
            );
            return Ok(Action::Stop);
        }

        if is_same_origin(previous, location) {
            return Ok(Action::Follow);
        }

        if self.config.same_origin_only && !self.is_allowed_host(location) {
            tracing::warn!(location = %location, "refusing cross-origin redirect");
            return Ok(Action::Stop);
        }

        self.left_origin = true;
        Ok(Action::Follow)
    }

    fn on_request(&mut self, request: &mut Request<B>) {
        if self.left_origin && self.config.strip_sensitive_headers {
            for header in &SENSITIVE_HEADERS {
                request.headers_mut().remove(header);
            }
        }
    }

    fn clone_body(&self, body: &B) -> Option<B> {
        Some(body.clone())
    }
}
