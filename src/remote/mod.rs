//! Cloud video-generation client.
//!
//! Submits generation requests to the remote HTTP API, normalizes the two
//! possible response shapes (inline synchronous result vs. deferred task id)
//! into a tagged [`SubmitOutcome`](api::SubmitOutcome), persists an
//! append-only local JSON record per submission, and supports independent
//! status polling. Blocking and synchronous throughout — polling cadence is
//! the caller's responsibility.

pub mod api;
pub mod client;
pub mod payload;
pub mod store;
