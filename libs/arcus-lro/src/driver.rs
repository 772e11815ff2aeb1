//! The polling loop
//!
//! [`PollDriver`] owns a [`Poller`] and a fetch function, and runs the
//! round trip the poller itself deliberately does not: build the poll
//! request, dispatch it, feed the response back, sleep the poll
//! interval, repeat until terminal.
//!
//! The fetch function is the only coupling to a transport. Production
//! code passes a closure over an [`arcus_http::HttpClient`]; tests pass
//! a scripted queue of responses.

use std::future::Future;

use http::Request;

use crate::error::LroError;
use crate::poller::Poller;
use crate::response::PollResponse;

/// Failure of a driven poll loop.
///
/// Transport errors surface through [`PollDriveError::Fetch`] with the
/// fetch function's own error type; protocol violations surface through
/// [`PollDriveError::Lro`]. A terminal HTTP response is success, not an
/// error, whatever its status code.
#[derive(Debug, thiserror::Error)]
pub enum PollDriveError<E> {
    /// The fetch function failed to produce a response.
    #[error("fetch error: {0}")]
    Fetch(#[source] E),
    /// A response was obtained but the poll state machine rejected it.
    #[error(transparent)]
    Lro(#[from] LroError),
}

/// Drives a [`Poller`] to completion through a caller-supplied fetch
/// function.
///
/// The driver adds nothing beyond the loop: no per-request retries, no
/// overall deadline, no result deserialization. Callers wanting a
/// deadline wrap [`PollDriver::run`] in `tokio::time::timeout`; callers
/// wanting checkpointing drive the [`Poller`] by hand instead and
/// snapshot [`Poller::state`] between rounds.
pub struct PollDriver<F> {
    poller: Poller,
    fetch: F,
}

impl<F> PollDriver<F> {
    pub fn new(poller: Poller, fetch: F) -> Self {
        Self { poller, fetch }
    }

    #[must_use]
    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Give the poller back, e.g. to snapshot its state after a failed
    /// run and resume later.
    #[must_use]
    pub fn into_poller(self) -> Poller {
        self.poller
    }
}

impl<F, Fut, E> PollDriver<F>
where
    F: FnMut(Request<()>) -> Fut,
    Fut: Future<Output = Result<PollResponse, E>>,
{
    /// Poll until a terminal response and return it.
    ///
    /// The first request goes out immediately; the configured interval
    /// is slept only between rounds, never after the terminal response.
    ///
    /// # Errors
    ///
    /// Returns [`PollDriveError::Fetch`] when the fetch function fails
    /// and [`PollDriveError::Lro`] when a response cannot be absorbed.
    /// Either way the loop stops at the failing round; the poller,
    /// still owned by the driver, reflects every response absorbed
    /// before it, so its state can be snapshotted and resumed.
    pub async fn run(&mut self) -> Result<PollResponse, PollDriveError<E>> {
        loop {
            let request = self.poller.poll_request();
            let response = (self.fetch)(request)
                .await
                .map_err(PollDriveError::Fetch)?;
            self.poller.update(&response)?;
            tracing::debug!(
                poll_target = %self.poller.poll_target(),
                status = response.status().as_u16(),
                interval_ms = u64::try_from(self.poller.poll_interval().as_millis())
                    .unwrap_or(u64::MAX),
                done = self.poller.is_done(),
                "poll round"
            );
            if self.poller.is_done() {
                return Ok(response);
            }
            tokio::time::sleep(self.poller.poll_interval()).await;
        }
    }
}
