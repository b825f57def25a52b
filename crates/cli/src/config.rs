use std::path::PathBuf;
use std::time::Duration;

use koma_client::PollConfig;
use koma_core::types::Viewport;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a valid {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a backend running locally.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL (default: `http://localhost:8000`).
    pub base_url: String,
    /// Bearer token overriding the stored one.
    pub token: Option<String>,
    /// JSON file holding the persisted session keys.
    pub state_file: PathBuf,
    /// Directory receiving rendered HTML and PNG slices.
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    pub viewport: Viewport,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `KOMA_BASE_URL`         | `http://localhost:8000` |
    /// | `KOMA_TOKEN`            | (stored token)          |
    /// | `KOMA_STATE_FILE`       | `.koma/state.json`      |
    /// | `KOMA_OUTPUT_DIR`       | `koma-output`           |
    /// | `KOMA_POLL_INTERVAL_MS` | `500`                   |
    /// | `KOMA_VIEWPORT_WIDTH`   | `800`                   |
    /// | `KOMA_VIEWPORT_HEIGHT`  | `600`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("KOMA_BASE_URL").unwrap_or_else(|| "http://localhost:8000".into());
        let token = lookup("KOMA_TOKEN").filter(|t| !t.trim().is_empty());
        let state_file = lookup("KOMA_STATE_FILE")
            .unwrap_or_else(|| ".koma/state.json".into())
            .into();
        let output_dir = lookup("KOMA_OUTPUT_DIR")
            .unwrap_or_else(|| "koma-output".into())
            .into();

        let poll_interval_ms: u64 = parse(&lookup, "KOMA_POLL_INTERVAL_MS", "500", "u64")?;
        let defaults = Viewport::default();
        let width: u32 = parse(&lookup, "KOMA_VIEWPORT_WIDTH", &defaults.width.to_string(), "u32")?;
        let height: u32 =
            parse(&lookup, "KOMA_VIEWPORT_HEIGHT", &defaults.height.to_string(), "u32")?;

        Ok(Self {
            base_url,
            token,
            state_file,
            output_dir,
            poll_interval: Duration::from_millis(poll_interval_ms),
            viewport: Viewport { width, height },
        })
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: self.poll_interval,
            viewport: self.viewport,
        }
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    let value = lookup(var).unwrap_or_else(|| default.to_string());
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        expected,
        value,
    })
}
