//! Persisting the final report.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::ReportNode;

/// File name of the persisted report inside a run workspace.
pub const REPORT_FILE_NAME: &str = "results.json";

/// Persists a serialized report and returns where it went.
#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    async fn persist(&self, report: &ReportNode) -> AppResult<PathBuf>;
}

/// Writes the report as pretty-printed JSON into a directory.
#[derive(Debug, Clone)]
pub struct JsonArtifactWriter {
    dir: PathBuf,
}

impl JsonArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Location the report is written to.
    pub fn report_path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE_NAME)
    }
}

#[async_trait]
impl ArtifactWriter for JsonArtifactWriter {
    async fn persist(&self, report: &ReportNode) -> AppResult<PathBuf> {
        let path = self.report_path();
        let json = serde_json::to_vec_pretty(report)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::fs(&self.dir, e))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| AppError::fs(&path, e))?;
        info!("Report written to {}", path.display());
        Ok(path)
    }
}

/// Load a report previously written by [`JsonArtifactWriter`].
pub async fn load_report(path: &Path) -> AppResult<ReportNode> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::fs(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}
