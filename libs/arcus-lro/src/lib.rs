#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Long-running-operation polling for Arcus service clients
//!
//! Some service operations answer `202 Accepted` with a follow-up
//! location instead of a result: the work continues server-side and the
//! client is expected to poll. This crate provides the state machine
//! and loop for that pattern:
//! - [`Poller`]: decides from the initiating response whether an
//!   operation is asynchronous, tracks the (movable) poll target and
//!   the server-hinted interval, and recognizes the terminal response
//! - [`PollDriver`]: the poll loop itself, over any fetch function
//! - [`PollerState`]: a versioned snapshot, serializable as JSON or an
//!   opaque token, for resuming after a restart
//!
//! Two completion conventions are understood. With a `Location` header
//! the poll target answers `202` until the operation finishes, and the
//! first non-`202` response is the result, returned verbatim. With an
//! `Operation-Location` header the target is a status-monitor resource
//! whose JSON `status` field moves from `running` to
//! `succeeded`/`failed`/`canceled`.
//!
//! Deliberately out of scope here: transport retries, timeouts, and
//! redirect handling all belong to the HTTP client. Build that client
//! with redirects disabled ([`arcus_http::HttpClientBuilder::no_redirects`])
//! so terminal `3xx` responses reach the poller undisturbed.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//!
//! use arcus_http::HttpClient;
//! use arcus_lro::{PollDriver, PollResponse, Poller};
//!
//! async fn create_widget(
//!     client: &HttpClient,
//! ) -> Result<PollResponse, Box<dyn std::error::Error>> {
//!     let initiating: http::Uri = "https://svc.example.com/widgets".parse()?;
//!     let response = client.post(initiating.to_string()).send().await?;
//!     let initial = PollResponse::read(response).await?;
//!
//!     match Poller::from_response(&initiating, &initial, Duration::from_secs(1)) {
//!         // Synchronous: the service answered in place.
//!         None => Ok(initial),
//!         Some(poller) => {
//!             let client = client.clone();
//!             let fetch = move |request: http::Request<()>| {
//!                 let client = client.clone();
//!                 async move {
//!                     let response = client.get(request.uri().to_string()).send().await?;
//!                     PollResponse::read(response).await
//!                 }
//!             };
//!             Ok(PollDriver::new(poller, fetch).run().await?)
//!         }
//!     }
//! }
//! ```

mod driver;
mod error;
mod poller;
mod response;
mod state;

pub use driver::{PollDriveError, PollDriver};
pub use error::LroError;
pub use poller::{MonitorStatus, OPERATION_LOCATION, PollStrategy, Poller};
pub use response::PollResponse;
pub use state::{PollerState, STATE_VERSION, StrategyState};
