//! Domain types for the KomaMRI simulation client.
//!
//! Pure logic shared by the HTTP client and the CLI: the progress
//! signal taxonomy, slice geometry, image volumes and their decoding,
//! reslicing, display modes and result summaries.

pub mod error;
pub mod geometry;
pub mod nifti;
pub mod progress;
pub mod reslice;
pub mod results;
pub mod types;
pub mod view_state;
pub mod viewer;
pub mod volume;
