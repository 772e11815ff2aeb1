//! Error taxonomy for long-running-operation polling
//!
//! [`LroError`] covers the protocol-fatal conditions only: a poll loop
//! that has lost its target, a status monitor that stopped reporting a
//! readable status, and resume-path validation failures. Transport
//! failures are not represented here; they propagate unchanged as
//! [`arcus_http::HttpError`] through whatever dispatches the poll
//! requests. A terminal HTTP status is not an error at all.

/// Fatal polling failures.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LroError {
    /// A follow-up-location value observed mid-poll could not be
    /// resolved into an absolute URL. The loop has no way to continue.
    #[error("cannot resolve poll target {value}: {reason}")]
    InvalidPollTarget {
        /// The header value as received.
        value: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A status-monitor response carried no readable operation status.
    ///
    /// Covers both an undecodable monitor body and an unrecognized
    /// `status` value. The monitor protocol has no other completion
    /// signal, so this ends the operation.
    #[error("invalid operation status: {reason}")]
    InvalidStatus {
        /// Why the status could not be read.
        reason: String,
        /// Decode error, when the body itself was unreadable.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A recorded poll state declares a schema version this crate does
    /// not understand.
    #[error("unsupported poll state version {version}")]
    UnsupportedStateVersion {
        /// The version found in the record.
        version: u8,
    },

    /// A resume token could not be decoded into a poll state record.
    #[error("invalid poll state token: {0}")]
    InvalidStateToken(String),
}
