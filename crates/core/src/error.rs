#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Invalid progress signal: {0}")]
    InvalidSignal(i64),

    #[error("Volume decode error: {0}")]
    VolumeDecode(String),
}
