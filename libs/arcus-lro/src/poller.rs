//! The poll-strategy state machine
//!
//! A [`Poller`] owns everything one long-running operation needs between
//! HTTP exchanges: the next poll target, the wait interval, and the
//! terminal flag. It issues no requests itself; callers (usually a
//! [`PollDriver`](crate::PollDriver)) dispatch the requests it builds
//! and feed the responses back through [`Poller::update`].

use std::time::Duration;

use arcus_http::parse_retry_after;
use http::header::{HeaderMap, HeaderName, LOCATION};
use http::{Method, Request, StatusCode, Uri};

use crate::error::LroError;
use crate::response::PollResponse;
use crate::state::{PollerState, STATE_VERSION, StrategyState};

/// Follow-up-location header recognized by the status-monitor strategy.
pub const OPERATION_LOCATION: HeaderName = HeaderName::from_static("operation-location");

/// How an operation signals progress and completion.
///
/// A closed set: adding a variant is a breaking change for this enum but
/// not for the serialized [`StrategyState`] form, which is
/// `#[non_exhaustive]`.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStrategy {
    /// Poll the `Location` target; any status other than `202` is
    /// terminal and the response body is never interpreted.
    Location {
        /// Absolute URL to poll next.
        target: Uri,
        /// Whether a terminal response has been observed.
        done: bool,
    },
    /// Poll the `Operation-Location` resource; the JSON body's `status`
    /// field decides between in-progress and terminal.
    StatusMonitor {
        /// Absolute URL of the operation resource.
        target: Uri,
        /// Last observed status.
        status: MonitorStatus,
    },
}

/// Progress classification of a status-monitor resource.
///
/// The three in-progress spellings the protocol allows (`notStarted`,
/// `running`, `inProgress`) collapse into [`MonitorStatus::InProgress`];
/// terminal values keep their identity so a resumed poller knows how the
/// operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    InProgress,
    Succeeded,
    Failed,
    Canceled,
}

impl MonitorStatus {
    /// Classify a `status` field value, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`LroError::InvalidStatus`] for values outside the
    /// protocol's vocabulary; guessing at an unknown status could leave
    /// a finished operation polling forever.
    pub fn parse(value: &str) -> Result<Self, LroError> {
        match value.to_ascii_lowercase().as_str() {
            "notstarted" | "running" | "inprogress" => Ok(Self::InProgress),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            _ => Err(LroError::InvalidStatus {
                reason: format!("unrecognized status {value}"),
                source: None,
            }),
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }

    /// Canonical rendering, as written into serialized poll state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "inProgress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

/// State machine driving one long-running operation to completion.
///
/// Created from the response to an operation-initiating request via
/// [`Poller::from_response`], or restored from a recorded snapshot via
/// [`Poller::resume`]. The owning loop alternates
/// [`Poller::poll_request`] → dispatch → [`Poller::update`] → sleep
/// [`Poller::poll_interval`] until [`Poller::is_done`].
///
/// A poller is plain owned data: one per operation, mutated only through
/// `update`, safe to move across tasks. It never dispatches requests,
/// never retries, and never times out; those concerns belong to the
/// transport stack and the caller respectively.
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    strategy: PollStrategy,
}

impl Poller {
    /// Decide whether an initiating response represents an asynchronous
    /// operation, and if so build the poller for it.
    ///
    /// The decision is made from the follow-up-location headers alone:
    /// `Operation-Location` selects the status-monitor strategy,
    /// otherwise `Location` selects the location strategy. A value is
    /// usable when it is an absolute `http`/`https` URL, or a
    /// root-relative path which then joins `initiating_uri`'s scheme and
    /// authority.
    ///
    /// Returns `None` when no usable follow-up location exists - absent
    /// header, empty value, or an unresolvable value all mean "not an
    /// asynchronous operation" here, never an error. Callers must handle
    /// the synchronous case explicitly.
    ///
    /// The poll interval starts at `base_delay` and is overwritten by
    /// server retry hints as polling proceeds.
    #[must_use]
    pub fn from_response(
        initiating_uri: &Uri,
        response: &PollResponse,
        base_delay: Duration,
    ) -> Option<Self> {
        let headers = response.headers();
        let strategy = monitor_strategy(initiating_uri, headers)
            .or_else(|| location_strategy(initiating_uri, headers))?;
        Some(Self {
            interval: base_delay,
            strategy,
        })
    }

    /// Build the next poll request: a bare `GET` to the current target.
    ///
    /// Pure with respect to the poller's state; calling it repeatedly
    /// without an intervening [`Poller::update`] yields identical
    /// requests. The transport pipeline adds its own headers.
    #[must_use]
    pub fn poll_request(&self) -> Request<()> {
        let mut request = Request::new(());
        *request.method_mut() = Method::GET;
        *request.uri_mut() = self.poll_target().clone();
        request
    }

    /// Absorb a poll response into the state machine.
    ///
    /// For the location strategy, `202` means "still running": the
    /// server's retry hint (when parseable) replaces the interval, and a
    /// fresh `Location` value (when present and non-empty) moves the
    /// poll target - servers relocate in-flight operations and that is
    /// expected. Every other status marks the operation done; the
    /// response is the caller's to interpret and this method reads
    /// nothing further from it.
    ///
    /// The status-monitor strategy instead reads the `status` field of
    /// the operation resource carried by `200`/`201`/`202` responses;
    /// other statuses are terminal and recorded as failed.
    ///
    /// # Errors
    ///
    /// Returns [`LroError::InvalidPollTarget`] when a relocation value
    /// cannot be resolved (the loop has lost its only way to continue)
    /// and [`LroError::InvalidStatus`] when a monitor body carries no
    /// readable status. Transport failures never reach this method.
    pub fn update(&mut self, response: &PollResponse) -> Result<(), LroError> {
        match &mut self.strategy {
            PollStrategy::Location { target, done } => {
                if response.status() != StatusCode::ACCEPTED {
                    *done = true;
                    return Ok(());
                }
                if let Some(hint) = parse_retry_after(response.headers()) {
                    self.interval = hint;
                }
                if let Some(value) = response.headers().get(LOCATION) {
                    let raw = value.to_str().map_err(|_| LroError::InvalidPollTarget {
                        value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                        reason: "value is not visible ASCII".to_owned(),
                    })?;
                    if !raw.is_empty() {
                        let origin = target.clone();
                        *target = resolve_target(&origin, raw).map_err(|reason| {
                            LroError::InvalidPollTarget {
                                value: raw.to_owned(),
                                reason,
                            }
                        })?;
                    }
                }
                Ok(())
            }
            PollStrategy::StatusMonitor { status, .. } => {
                match response.status() {
                    StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
                        let observed = read_monitor_status(response.body())?;
                        if !observed.is_terminal()
                            && let Some(hint) = parse_retry_after(response.headers())
                        {
                            self.interval = hint;
                        }
                        *status = observed;
                    }
                    // The monitor endpoint itself failed; the operation
                    // cannot be tracked further. The response still goes
                    // back to the caller verbatim.
                    _ => *status = MonitorStatus::Failed,
                }
                Ok(())
            }
        }
    }

    /// Whether a terminal response has been observed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        match &self.strategy {
            PollStrategy::Location { done, .. } => *done,
            PollStrategy::StatusMonitor { status, .. } => status.is_terminal(),
        }
    }

    /// The URL the next poll request will be sent to.
    #[must_use]
    pub fn poll_target(&self) -> &Uri {
        match &self.strategy {
            PollStrategy::Location { target, .. }
            | PollStrategy::StatusMonitor { target, .. } => target,
        }
    }

    /// How long to wait before the next poll.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn strategy(&self) -> &PollStrategy {
        &self.strategy
    }

    /// Snapshot the poller into its serializable state record.
    #[must_use]
    pub fn state(&self) -> PollerState {
        let strategy = match &self.strategy {
            PollStrategy::Location { target, done } => StrategyState::Location {
                target: target.to_string(),
                done: *done,
            },
            PollStrategy::StatusMonitor { target, status } => StrategyState::StatusMonitor {
                target: target.to_string(),
                status: status.as_str().to_owned(),
            },
        };
        PollerState {
            v: STATE_VERSION,
            strategy,
            poll_interval_ms: u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Reconstruct a poller from a recorded state.
    ///
    /// The record is validated, not trusted: the schema version must be
    /// the one this crate writes, the target must still parse as an
    /// absolute `http`/`https` URL, and a recorded monitor status must
    /// be in the protocol vocabulary.
    ///
    /// # Errors
    ///
    /// [`LroError::UnsupportedStateVersion`] for a foreign version,
    /// [`LroError::InvalidPollTarget`] / [`LroError::InvalidStatus`] for
    /// records whose contents no longer validate.
    pub fn resume(state: PollerState) -> Result<Self, LroError> {
        if state.v != STATE_VERSION {
            return Err(LroError::UnsupportedStateVersion { version: state.v });
        }
        let strategy = match state.strategy {
            StrategyState::Location { target, done } => PollStrategy::Location {
                target: parse_recorded_target(&target)?,
                done,
            },
            StrategyState::StatusMonitor { target, status } => PollStrategy::StatusMonitor {
                target: parse_recorded_target(&target)?,
                status: MonitorStatus::parse(&status)?,
            },
        };
        Ok(Self {
            interval: Duration::from_millis(state.poll_interval_ms),
            strategy,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn monitor_strategy(initiating: &Uri, headers: &HeaderMap) -> Option<PollStrategy> {
    let raw = header_str(headers, &OPERATION_LOCATION)?;
    let target = resolve_target(initiating, raw).ok()?;
    Some(PollStrategy::StatusMonitor {
        target,
        status: MonitorStatus::InProgress,
    })
}

fn location_strategy(initiating: &Uri, headers: &HeaderMap) -> Option<PollStrategy> {
    let raw = header_str(headers, &LOCATION)?;
    let target = resolve_target(initiating, raw).ok()?;
    Some(PollStrategy::Location {
        target,
        done: false,
    })
}

/// Resolve a follow-up-location value against the URL that produced it.
///
/// Accepts absolute `http`/`https` URLs as-is and joins root-relative
/// paths onto `origin`'s scheme and authority. Everything else is
/// unresolvable; the reason string feeds error messages.
fn resolve_target(origin: &Uri, raw: &str) -> Result<Uri, String> {
    if raw.is_empty() {
        return Err("empty value".to_owned());
    }
    if raw.starts_with('/') {
        let scheme = origin
            .scheme()
            .ok_or_else(|| "origin URL has no scheme".to_owned())?;
        let authority = origin
            .authority()
            .ok_or_else(|| "origin URL has no authority".to_owned())?;
        return Uri::builder()
            .scheme(scheme.clone())
            .authority(authority.clone())
            .path_and_query(raw)
            .build()
            .map_err(|e| e.to_string());
    }
    let uri: Uri = raw.parse().map_err(|e: http::uri::InvalidUri| e.to_string())?;
    match uri.scheme_str() {
        Some("http" | "https") => {
            if uri.authority().is_some() {
                Ok(uri)
            } else {
                Err("missing authority".to_owned())
            }
        }
        Some(other) => Err(format!("unsupported scheme {other}")),
        None => Err("neither an absolute http(s) URL nor a root-relative path".to_owned()),
    }
}

fn parse_recorded_target(raw: &str) -> Result<Uri, LroError> {
    let uri: Uri = raw.parse().map_err(|e: http::uri::InvalidUri| {
        LroError::InvalidPollTarget {
            value: raw.to_owned(),
            reason: e.to_string(),
        }
    })?;
    match (uri.scheme_str(), uri.authority()) {
        (Some("http" | "https"), Some(_)) => Ok(uri),
        _ => Err(LroError::InvalidPollTarget {
            value: raw.to_owned(),
            reason: "recorded target must be an absolute http(s) URL".to_owned(),
        }),
    }
}

#[derive(serde::Deserialize)]
struct MonitorBody {
    status: String,
}

fn read_monitor_status(body: &[u8]) -> Result<MonitorStatus, LroError> {
    let body: MonitorBody =
        serde_json::from_slice(body).map_err(|e| LroError::InvalidStatus {
            reason: "monitor body is not a valid operation resource".to_owned(),
            source: Some(e),
        })?;
    MonitorStatus::parse(&body.status)
}
