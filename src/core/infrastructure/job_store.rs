//! Persisted job set for completion detection across restarts.

use crate::core::domain::{error::WatchResult, model::JobSet};
use std::path::{Path, PathBuf};

pub const JOB_STATE_FILE: &str = "job_state.json";

#[derive(Debug, Clone)]
pub struct JobStore {
    path: PathBuf,
}

impl JobStore {
    /// A store backed by `<dir>/job_state.json`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(JOB_STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the last saved job set. A missing file is an empty set.
    ///
    /// # Errors
    /// Returns `WatchError::Persistence` if the file exists but cannot be read
    /// or does not hold a job set.
    pub async fn load(&self) -> WatchResult<JobSet> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(JobSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the saved job set. The new content is written to a sibling
    /// temp file and renamed over the old one, so readers never see a partial file.
    pub async fn save(&self, jobs: &JobSet) -> WatchResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(jobs)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), jobs = jobs.len(), "saved job state");
        Ok(())
    }
}
