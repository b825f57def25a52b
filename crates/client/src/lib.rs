//! Async client for the KomaMRI simulation backend.
//!
//! [`api::KomaApi`] speaks HTTP; [`poller`] drives long-running jobs;
//! [`session::Session`] carries the persisted preferences and the panel
//! model every flow reports into.

pub mod account;
pub mod api;
pub mod error;
pub mod jobs;
pub mod panel;
pub mod plots;
pub mod poller;
pub mod results;
pub mod session;
pub mod store;

pub use api::KomaApi;
pub use error::ClientError;
pub use poller::{JobPoller, PollConfig};
pub use session::Session;
