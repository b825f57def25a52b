//! Browsing, downloading and deleting stored results.

use std::path::{Path, PathBuf};

use koma_core::results::{ResultSummary, NO_RESULTS_TEXT};
use koma_core::types::ResultId;

use crate::api::KomaApi;
use crate::error::ClientError;

pub const LOAD_FAILED_TEXT: &str = "Could not load results";
pub const DELETED_TEXT: &str = "Result deleted";
pub const DELETE_FAILED_TEXT: &str = "Could not delete result";

/// The list of stored results plus the last status message.
#[derive(Debug, Clone, Default)]
pub struct ResultsBrowser {
    entries: Vec<ResultSummary>,
    status: Option<String>,
}

impl ResultsBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ResultSummary] {
        &self.entries
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// One line per entry, or the empty-list placeholder.
    pub fn lines(&self) -> Vec<String> {
        if self.entries.is_empty() {
            return vec![NO_RESULTS_TEXT.to_string()];
        }
        self.entries.iter().map(ResultSummary::describe).collect()
    }

    /// Refresh the list. On failure the list is emptied and the status
    /// says so.
    pub async fn load(&mut self, api: &KomaApi) -> Result<&[ResultSummary], ClientError> {
        match api.list_results().await {
            Ok(entries) => {
                tracing::debug!(count = entries.len(), "Results loaded");
                self.entries = entries;
                Ok(&self.entries)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load results");
                self.entries.clear();
                self.status = Some(LOAD_FAILED_TEXT.to_string());
                Err(e)
            }
        }
    }

    /// Delete one result, then reload the list. A failed reload after a
    /// successful delete is not an error: the deleted entry is dropped
    /// from the previous list instead.
    pub async fn delete(&mut self, api: &KomaApi, id: ResultId) -> Result<(), ClientError> {
        if let Err(e) = api.delete_result(id).await {
            tracing::error!(result_id = id, error = %e, "Failed to delete result");
            self.status = Some(match &e {
                ClientError::Api { msg, .. } => msg.clone(),
                _ => DELETE_FAILED_TEXT.to_string(),
            });
            return Err(e);
        }

        tracing::info!(result_id = id, "Result deleted");
        let previous = std::mem::take(&mut self.entries);
        if self.load(api).await.is_err() {
            tracing::warn!(result_id = id, "Keeping previous list after failed reload");
            self.entries = previous.into_iter().filter(|entry| entry.id != id).collect();
        }
        self.status = Some(DELETED_TEXT.to_string());
        Ok(())
    }

    /// Save the archive of one result to `dest`. A directory destination
    /// gets a `result_<id>.zip` file inside it.
    pub async fn download(
        &mut self,
        api: &KomaApi,
        id: ResultId,
        dest: &Path,
    ) -> Result<PathBuf, ClientError> {
        let bytes = api.download_result(id).await.inspect_err(|e| {
            tracing::error!(result_id = id, error = %e, "Failed to download result");
        })?;

        let path = if dest.is_dir() {
            dest.join(format!("result_{id}.zip"))
        } else {
            dest.to_path_buf()
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        tracing::info!(result_id = id, path = %path.display(), bytes = bytes.len(), "Result downloaded");
        Ok(path)
    }
}
