use serde::{Deserialize, Serialize};

/// Server-side job identifier, taken from the job's status location.
pub type JobId = String;

/// Primary key of a stored simulation result.
pub type ResultId = i64;

/// A point or direction in physical space, in millimetres unless noted.
pub type Vec3 = [f64; 3];

/// Size of the render surface the server should draw plots for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}
