//! Serializable poll state
//!
//! A [`Poller`](crate::Poller) can be snapshotted into a [`PollerState`]
//! at any point between polls, carried across a process restart as a
//! JSON document or an opaque [token](PollerState::to_token), and turned
//! back into a live poller with [`Poller::resume`](crate::Poller::resume).
//!
//! The record is versioned. [`STATE_VERSION`] is bumped whenever the
//! schema changes shape; decoding rejects any other version instead of
//! guessing, so a rolled-back reader never misinterprets a newer record.

use serde::{Deserialize, Serialize};

use crate::error::LroError;

/// Schema version written into every [`PollerState`].
pub const STATE_VERSION: u8 = 1;

/// Snapshot of one in-flight operation's poll state.
///
/// The struct is its own wire form: serializing it with `serde_json`
/// yields the stable record other processes may store or inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerState {
    /// Schema version, always [`STATE_VERSION`] for records this crate
    /// writes.
    pub v: u8,
    /// Strategy-specific fields.
    pub strategy: StrategyState,
    /// Wait between polls, in milliseconds.
    pub poll_interval_ms: u64,
}

/// Wire form of a poll strategy.
///
/// Targets and monitor statuses are carried as strings and re-validated
/// on [`resume`](crate::Poller::resume); a record is data from the
/// outside world, not a trusted poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum StrategyState {
    Location { target: String, done: bool },
    StatusMonitor { target: String, status: String },
}

impl PollerState {
    /// Encode the record as an opaque URL-safe token.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if serialization fails.
    pub fn to_token(&self) -> serde_json::Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(base64_url::encode(&json))
    }

    /// Decode a token produced by [`PollerState::to_token`].
    ///
    /// Validates the envelope only; the contents are checked when the
    /// record is resumed.
    ///
    /// # Errors
    ///
    /// [`LroError::InvalidStateToken`] when the token is not base64url
    /// or does not decode to a state record, and
    /// [`LroError::UnsupportedStateVersion`] when the record was written
    /// under a different schema version.
    pub fn from_token(token: &str) -> Result<Self, LroError> {
        let json = base64_url::decode(token)
            .map_err(|_| LroError::InvalidStateToken("not valid base64url".to_owned()))?;
        let state: Self = serde_json::from_slice(&json)
            .map_err(|_| LroError::InvalidStateToken("not a valid state record".to_owned()))?;
        if state.v != STATE_VERSION {
            return Err(LroError::UnsupportedStateVersion { version: state.v });
        }
        Ok(state)
    }
}

mod base64_url {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    pub fn encode(bytes: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(s)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use http::Uri;

    use super::*;
    use crate::poller::{MonitorStatus, PollStrategy, Poller};
    use crate::response::PollResponse;

    fn location_state() -> PollerState {
        PollerState {
            v: STATE_VERSION,
            strategy: StrategyState::Location {
                target: "https://svc.example.com/status/abc123".to_owned(),
                done: false,
            },
            poll_interval_ms: 4000,
        }
    }

    fn monitor_state(status: &str) -> PollerState {
        PollerState {
            v: STATE_VERSION,
            strategy: StrategyState::StatusMonitor {
                target: "https://svc.example.com/operations/42".to_owned(),
                status: status.to_owned(),
            },
            poll_interval_ms: 1500,
        }
    }

    #[test]
    fn json_shape_is_stable() {
        let value = serde_json::to_value(location_state()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "v": 1,
                "strategy": {
                    "kind": "location",
                    "target": "https://svc.example.com/status/abc123",
                    "done": false,
                },
                "poll_interval_ms": 4000,
            })
        );

        let value = serde_json::to_value(monitor_state("inProgress")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "v": 1,
                "strategy": {
                    "kind": "status_monitor",
                    "target": "https://svc.example.com/operations/42",
                    "status": "inProgress",
                },
                "poll_interval_ms": 1500,
            })
        );
    }

    #[test]
    fn token_round_trips() {
        for state in [location_state(), monitor_state("succeeded")] {
            let token = state.to_token().unwrap();
            let decoded = PollerState::from_token(&token).unwrap();
            assert_eq!(decoded, state);
        }
    }

    #[test]
    fn token_is_url_safe() {
        let token = location_state().to_token().unwrap();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "token {token} contains characters that need URL escaping"
        );
    }

    #[test]
    fn foreign_version_is_rejected() {
        let mut json = serde_json::to_value(location_state()).unwrap();
        json["v"] = serde_json::json!(2);
        let token = base64_url::encode(json.to_string().as_bytes());

        let err = PollerState::from_token(&token).unwrap_err();
        assert!(matches!(
            err,
            LroError::UnsupportedStateVersion { version: 2 }
        ));
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let err = PollerState::from_token("!!! not base64 !!!").unwrap_err();
        assert!(matches!(err, LroError::InvalidStateToken(_)));

        let not_json = base64_url::encode(b"hello there");
        let err = PollerState::from_token(&not_json).unwrap_err();
        assert!(matches!(err, LroError::InvalidStateToken(_)));
    }

    #[test]
    fn snapshot_captures_the_live_poller() {
        let initiating: Uri = "https://svc.example.com/op/start".parse().unwrap();
        let response = PollResponse::from(
            http::Response::builder()
                .status(202)
                .header("location", "/status/abc123")
                .body(Bytes::new())
                .unwrap(),
        );
        let poller =
            Poller::from_response(&initiating, &response, Duration::from_secs(4)).unwrap();

        assert_eq!(poller.state(), location_state());
    }

    #[test]
    fn resume_reconstructs_a_location_poller() {
        let poller = Poller::resume(location_state()).unwrap();

        assert_eq!(
            poller.poll_target(),
            &"https://svc.example.com/status/abc123".parse::<Uri>().unwrap()
        );
        assert_eq!(poller.poll_interval(), Duration::from_millis(4000));
        assert!(!poller.is_done());
        // A round trip through the record changes nothing.
        assert_eq!(poller.state(), location_state());
    }

    #[test]
    fn resume_reconstructs_a_monitor_poller() {
        let poller = Poller::resume(monitor_state("canceled")).unwrap();

        assert!(matches!(
            poller.strategy(),
            PollStrategy::StatusMonitor {
                status: MonitorStatus::Canceled,
                ..
            }
        ));
        assert!(poller.is_done());
    }

    #[test]
    fn resume_rejects_a_foreign_version() {
        let mut state = location_state();
        state.v = 9;

        let err = Poller::resume(state).unwrap_err();
        assert!(matches!(
            err,
            LroError::UnsupportedStateVersion { version: 9 }
        ));
    }

    #[test]
    fn resume_rejects_an_unusable_target() {
        let mut state = location_state();
        state.strategy = StrategyState::Location {
            target: "/status/relative-only".to_owned(),
            done: false,
        };

        let err = Poller::resume(state).unwrap_err();
        assert!(matches!(err, LroError::InvalidPollTarget { .. }));
    }

    #[test]
    fn resume_rejects_an_unknown_status() {
        let err = Poller::resume(monitor_state("paused")).unwrap_err();
        assert!(matches!(err, LroError::InvalidStatus { .. }));
    }
}
