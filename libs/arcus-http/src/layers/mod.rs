//! Tower middleware for the client stack
//!
//! Each layer is independent; [`crate::HttpClientBuilder`] composes them
//! in a fixed order.
//!
//! ## Available Layers
//!
//! - [`UserAgentLayer`] - fills in the `User-Agent` header
//! - [`RequestIdLayer`] - stamps correlation ids onto outbound requests
//! - [`RetryLayer`] - retry with exponential backoff and jitter
//! - [`SecureRedirectPolicy`] - security-hardened redirect policy

mod redirect;
mod request_id;
mod retry;
mod user_agent;

pub use redirect::SecureRedirectPolicy;
pub use request_id::{
    REQUEST_ID_HEADER, RETURN_REQUEST_ID_HEADER, RequestIdLayer, RequestIdService,
};
pub use retry::{RetryLayer, RetryService};
pub use user_agent::{UserAgentLayer, UserAgentService};
