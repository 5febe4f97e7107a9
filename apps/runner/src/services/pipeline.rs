//! Fail-fast fstests pipeline.
//!
//! Stages run strictly in order:
//! configure kernel → build kernel → run tests → retrieve results artifact
//! → parse and convert → persist.
//!
//! The first stage that fails ends the run with the canonical failure
//! report; later stages are not started. Every run ends in exactly one
//! [`PipelineOutcome`], and no error escapes [`PipelineController::run`].

use std::sync::Arc;

use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::AppResult;
use crate::models::{ReportNode, TestOutcome};
use crate::services::artifact::ArtifactWriter;
use crate::services::command::CommandRunner;
use crate::services::report_converter::to_report;
use crate::services::stage_plan::StagePlan;
use crate::services::tree_builder::ResultTreeBuilder;
use crate::services::xunit::parse_xunit_file;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ConfigureKernel,
    BuildKernel,
    RunTests,
    RetrieveResultsArtifact,
    ParseAndConvert,
    Persist,
}

impl Stage {
    /// Stages that are driven by external commands.
    pub const COMMAND_STAGES: [Stage; 4] = [
        Stage::ConfigureKernel,
        Stage::BuildKernel,
        Stage::RunTests,
        Stage::RetrieveResultsArtifact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigureKernel => "configure_kernel",
            Self::BuildKernel => "build_kernel",
            Self::RunTests => "run_tests",
            Self::RetrieveResultsArtifact => "retrieve_results",
            Self::ParseAndConvert => "parse_and_convert",
            Self::Persist => "persist",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a single stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    Passed,
    Failed(String),
}

/// Terminal result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every stage passed; the report carries per-test results.
    Completed(ReportNode),
    /// `stage` failed; `report` is the canonical failure shape.
    Failed { stage: Stage, report: ReportNode },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Completed(_) => None,
            Self::Failed { stage, .. } => Some(*stage),
        }
    }

    pub fn report(&self) -> &ReportNode {
        match self {
            Self::Completed(report) | Self::Failed { report, .. } => report,
        }
    }

    pub fn into_report(self) -> ReportNode {
        match self {
            Self::Completed(report) | Self::Failed { report, .. } => report,
        }
    }
}

/// Drives one pipeline run.
pub struct PipelineController {
    config: PipelineConfig,
    runner: Arc<dyn CommandRunner>,
    writer: Arc<dyn ArtifactWriter>,
}

impl PipelineController {
    /// Create a controller; the configuration is validated up front.
    pub fn new(
        config: PipelineConfig,
        runner: Arc<dyn CommandRunner>,
        writer: Arc<dyn ArtifactWriter>,
    ) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            runner,
            writer,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage and return the terminal outcome.
    pub async fn run(&self) -> PipelineOutcome {
        info!(
            "Starting {} pipeline in {}",
            self.config.root_name,
            self.config.workspace.display()
        );

        for stage in Stage::COMMAND_STAGES {
            if let StageResult::Failed(reason) = self.run_command_stage(stage).await {
                return self.fail(stage, &reason);
            }
        }

        let report = match self.parse_and_convert().await {
            Ok(report) => report.finish(TestOutcome::Pass),
            Err(e) => return self.fail(Stage::ParseAndConvert, &e.to_string()),
        };

        match self.writer.persist(&report).await {
            Ok(path) => info!("[{}] report persisted at {}", Stage::Persist, path.display()),
            Err(e) => return self.fail(Stage::Persist, &e.to_string()),
        }

        info!("Pipeline completed: {}", report.counts());
        PipelineOutcome::Completed(report)
    }

    async fn run_command_stage(&self, stage: Stage) -> StageResult {
        let invocations = StagePlan::new(&self.config).invocations(stage);
        if invocations.is_empty() {
            info!("[{}] skipped", stage);
            return StageResult::Passed;
        }

        for invocation in &invocations {
            match self.runner.run(invocation).await {
                Ok(status) if status.success => {}
                Ok(status) => {
                    return StageResult::Failed(format!(
                        "'{}' exited with status {}",
                        invocation.command_line(),
                        status
                            .code
                            .map_or_else(|| "signal".to_string(), |c| c.to_string())
                    ));
                }
                Err(e) => return StageResult::Failed(e.to_string()),
            }
        }

        info!("[{}] passed", stage);
        StageResult::Passed
    }

    async fn parse_and_convert(&self) -> AppResult<ReportNode> {
        let mut builder = ResultTreeBuilder::new(self.config.filesystem.as_str());
        for path in StagePlan::new(&self.config).artifact_files() {
            let records = parse_xunit_file(&path).await?;
            info!(
                "[{}] {} test results in {}",
                Stage::ParseAndConvert,
                records.len(),
                path.display()
            );
            builder.extend(&records)?;
        }
        Ok(to_report(&self.config.root_name, &builder.build()))
    }

    fn fail(&self, stage: Stage, reason: &str) -> PipelineOutcome {
        error!("[{}] failed: {}", stage, reason);
        PipelineOutcome::Failed {
            stage,
            report: ReportNode::failure(self.config.root_name.as_str()),
        }
    }
}
