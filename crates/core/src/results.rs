//! Stored simulation results as listed by the results API.

use serde::{Deserialize, Serialize};

use crate::types::ResultId;

/// One row of `GET /api/results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub id: ResultId,
    pub sequence_id: serde_json::Value,
    pub created_at: String,
}

impl ResultSummary {
    /// Single-line description used by list views.
    pub fn describe(&self) -> String {
        let sequence = match &self.sequence_id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        format!(
            "ID: {}  Sequence: {}  {}",
            self.id, sequence, self.created_at
        )
    }
}

/// Placeholder shown when the user has no stored results.
pub const NO_RESULTS_TEXT: &str = "No saved results.";
