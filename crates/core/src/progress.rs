//! Progress signal taxonomy reported by job status polls.
//!
//! The backend answers every in-flight status poll with a bare JSON
//! integer. Simulation and reconstruction jobs use different integer
//! codes; both are decoded into the single [`ProgressSignal`] enum that
//! the poll controller understands.

use serde::Serialize;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Simulation signal codes
// ---------------------------------------------------------------------------

/// The job reported an error.
pub const SIM_SIGNAL_ERROR: i64 = -2;
/// The job is queued or still starting up.
pub const SIM_SIGNAL_QUEUED: i64 = -1;
/// Compute finished; the server is post-processing (reconstructing).
pub const SIM_SIGNAL_COMPUTE_DONE: i64 = 100;

// ---------------------------------------------------------------------------
// Reconstruction signal codes
// ---------------------------------------------------------------------------

/// Reconstruction is still pending.
pub const RECON_SIGNAL_PENDING: i64 = 0;
/// Reconstruction finished; results are being rendered.
pub const RECON_SIGNAL_DONE: i64 = 1;

/// Phase of a job as observed through one status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "percent", rename_all = "snake_case")]
pub enum ProgressSignal {
    /// Accepted but not yet computing.
    Queued,
    /// Computing, with a completion percentage in `0..=99`.
    Running(u8),
    /// Compute done, server-side post-processing in progress.
    Finishing,
    /// The job failed on the server.
    Failed,
}

impl ProgressSignal {
    /// Decode a simulation status code (`-2`, `-1`, `0..=100`).
    pub fn from_simulation(raw: i64) -> Result<Self, CoreError> {
        match raw {
            SIM_SIGNAL_ERROR => Ok(Self::Failed),
            SIM_SIGNAL_QUEUED => Ok(Self::Queued),
            SIM_SIGNAL_COMPUTE_DONE => Ok(Self::Finishing),
            0..=99 => Ok(Self::Running(raw as u8)),
            other => Err(CoreError::InvalidSignal(other)),
        }
    }

    /// Decode a reconstruction status code (negative, `0`, `1`).
    pub fn from_reconstruction(raw: i64) -> Result<Self, CoreError> {
        match raw {
            r if r < 0 => Ok(Self::Failed),
            RECON_SIGNAL_PENDING => Ok(Self::Queued),
            RECON_SIGNAL_DONE => Ok(Self::Finishing),
            other => Err(CoreError::InvalidSignal(other)),
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Completion percentage, if the signal carries one.
    pub fn percent(self) -> Option<u8> {
        match self {
            Self::Running(p) => Some(p),
            _ => None,
        }
    }
}
