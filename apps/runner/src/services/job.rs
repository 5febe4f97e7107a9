//! One fstests job: workspace, pipeline run, result submission, upload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Node, NodeState};
use crate::services::artifact::JsonArtifactWriter;
use crate::services::command::{CommandRunner, ProcessRunner};
use crate::services::kernelci::ResultsSink;
use crate::services::pipeline::{PipelineController, PipelineOutcome};
use crate::services::storage::StorageUploader;

/// Directory inside a workspace holding per-stage command logs.
pub const LOG_DIR_NAME: &str = "logs";

/// What a finished job produced.
#[derive(Debug)]
pub struct JobReport {
    pub workspace: PathBuf,
    /// Node the report was submitted to, when running against the API
    pub node_id: Option<String>,
    pub outcome: PipelineOutcome,
}

/// Runs the pipeline for a checkout node and reports back.
pub struct FstestsJob {
    output_dir: PathBuf,
    template: PipelineConfig,
    sink: Option<Arc<dyn ResultsSink>>,
    uploader: Option<StorageUploader>,
    runner: Option<Arc<dyn CommandRunner>>,
}

impl FstestsJob {
    /// `template` carries every per-run setting except the workspace.
    pub fn new(output_dir: impl Into<PathBuf>, template: PipelineConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            template,
            sink: None,
            uploader: None,
            runner: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_uploader(mut self, uploader: StorageUploader) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Use `runner` for pipeline commands instead of a logging [`ProcessRunner`].
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Create a fresh `<YYYYmmdd_HHMMSS>-<short uuid>` workspace.
    pub async fn create_workspace(&self) -> AppResult<PathBuf> {
        let workspace = self.output_dir.join(workspace_name());
        tokio::fs::create_dir_all(&workspace)
            .await
            .map_err(|e| AppError::fs(&workspace, e))?;
        info!("Workspace: {}", workspace.display());
        Ok(workspace)
    }

    /// Run for the checkout node `node_id` and submit the outcome below it.
    pub async fn run(&self, node_id: &str) -> AppResult<JobReport> {
        let sink = self.sink()?;
        self.template.validate()?;
        let checkout = sink.get_node(node_id).await?;
        self.run_for(&checkout).await
    }

    /// Run for an already fetched checkout node.
    ///
    /// Workspace files are uploaded even when the submission fails; the
    /// submission error is returned afterwards.
    pub async fn run_for(&self, checkout: &Node) -> AppResult<JobReport> {
        let sink = self.sink()?;
        self.template.validate()?;
        info!(
            "Checkout {} ({}), commit {}",
            checkout.id.as_deref().unwrap_or("?"),
            checkout.name,
            checkout.commit().unwrap_or("unknown")
        );

        let child = sink
            .create_node(&Node::child_of(checkout, &self.template.root_name))
            .await?;
        let child_id = child
            .id
            .ok_or_else(|| AppError::Api("created node has no id".to_string()))?;
        info!("Created {} node {}", self.template.root_name, child_id);

        let (workspace, outcome) = self.execute().await?;
        let submitted = sink.submit_results(&child_id, outcome.report()).await;
        self.upload(&workspace).await;

        if let Err(e) = submitted {
            warn!(
                "Results not submitted, node {} is left {}: {}",
                child_id,
                NodeState::Running,
                e
            );
            return Err(e);
        }
        info!("Results submitted to node {}", child_id);

        Ok(JobReport {
            workspace,
            node_id: Some(child_id),
            outcome,
        })
    }

    fn sink(&self) -> AppResult<&Arc<dyn ResultsSink>> {
        self.sink
            .as_ref()
            .ok_or_else(|| AppError::Api("no KernelCI API configured".to_string()))
    }

    /// Run without talking to the API; the report only lands in the workspace.
    pub async fn run_local(&self) -> AppResult<JobReport> {
        self.template.validate()?;
        let (workspace, outcome) = self.execute().await?;
        self.upload(&workspace).await;
        Ok(JobReport {
            workspace,
            node_id: None,
            outcome,
        })
    }

    async fn execute(&self) -> AppResult<(PathBuf, PipelineOutcome)> {
        let workspace = self.create_workspace().await?;
        let config = self.template.with_workspace(&workspace);

        let runner: Arc<dyn CommandRunner> = match &self.runner {
            Some(runner) => Arc::clone(runner),
            None => Arc::new(ProcessRunner::with_log_dir(workspace.join(LOG_DIR_NAME))),
        };
        let writer = Arc::new(JsonArtifactWriter::new(&workspace));

        let controller = PipelineController::new(config, runner, writer)?;
        let outcome = controller.run().await;
        match outcome.failed_stage() {
            None => info!("Job finished: {}", outcome.report().counts()),
            Some(stage) => warn!("Job failed at stage {}", stage),
        }
        Ok((workspace, outcome))
    }

    async fn upload(&self, workspace: &Path) {
        let Some(uploader) = &self.uploader else {
            return;
        };
        match workspace_files(workspace).await {
            Ok(files) => {
                for file in files {
                    uploader.upload(&file).await;
                }
            }
            Err(e) => warn!("Skipping upload: {}", e),
        }
    }
}

fn workspace_name() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    )
}

/// Regular files directly inside `workspace`, sorted by name.
async fn workspace_files(workspace: &Path) -> AppResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(workspace)
        .await
        .map_err(|e| AppError::fs(workspace, e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::fs(workspace, e))?
    {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if is_file {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
