//! Shared helpers for pipeline E2E tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fstests_lib::config::PipelineConfig;
use fstests_lib::error::{AppError, AppResult};
use fstests_lib::services::{
    ArtifactWriter, CommandRunner, CommandStatus, Invocation, JsonArtifactWriter,
    PipelineController, Stage,
};

/// xunit results as kvm-xfstests leaves them on the results disk.
pub const RESULTS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuite name="xfstests" failures="1" skipped="1" errors="0" tests="3">
  <testcase classname="xfstests.4k" name="generic/001" time="3"/>
  <testcase classname="xfstests.4k" name="generic/002" time="1">
    <failure message="- output mismatch" type="TestFail"/>
  </testcase>
  <testcase classname="xfstests.4k" name="generic/003" time="0">
    <skipped message="no swap support"/>
  </testcase>
</testsuite>
"#;

/// How a scripted stage misbehaves.
#[derive(Debug, Clone, Copy)]
pub enum Misbehavior {
    /// The command runs and exits with this code
    ExitCode(i32),
    /// The command cannot be run at all
    Fault,
}

/// Command runner that records invocations instead of running them.
///
/// Retrieval invocations write `artifact` to the file named in the debugfs
/// dump request (or the `gsutil cp` destination), inside the invocation's
/// working directory.
pub struct ScriptedRunner {
    misbehave: Option<(Stage, Misbehavior)>,
    artifact: Option<String>,
    seen: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    /// Every command succeeds and retrieval produces [`RESULTS_XML`].
    pub fn succeeding() -> Self {
        Self {
            misbehave: None,
            artifact: Some(RESULTS_XML.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Commands of `stage` misbehave, everything else succeeds.
    pub fn misbehaving_at(stage: Stage, how: Misbehavior) -> Self {
        Self {
            misbehave: Some((stage, how)),
            ..Self::succeeding()
        }
    }

    /// Retrieval "succeeds" but leaves no file behind.
    pub fn without_artifact() -> Self {
        Self {
            artifact: None,
            ..Self::succeeding()
        }
    }

    /// Retrieval writes `xml` instead of [`RESULTS_XML`].
    pub fn with_artifact(xml: &str) -> Self {
        Self {
            artifact: Some(xml.to_string()),
            ..Self::succeeding()
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.seen.lock().unwrap().clone()
    }

    /// Labels of the invocations seen so far, in order.
    pub fn labels(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.label).collect()
    }

    fn write_artifact(&self, invocation: &Invocation) {
        let Some(xml) = &self.artifact else {
            return;
        };
        let local_name = if invocation.program == "gsutil" {
            invocation.args.last().expect("gsutil cp without destination")
        } else {
            let request = invocation
                .args
                .iter()
                .find(|a| a.starts_with("dump "))
                .expect("retrieval without dump request");
            request.rsplit(' ').next().unwrap()
        };
        std::fs::write(invocation.cwd.join(local_name), xml).unwrap();
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> AppResult<CommandStatus> {
        self.seen.lock().unwrap().push(invocation.clone());

        if let Some((stage, how)) = self.misbehave
            && invocation.label == stage.as_str()
        {
            return match how {
                Misbehavior::ExitCode(code) => Ok(CommandStatus::failed(code)),
                Misbehavior::Fault => Err(AppError::CommandFault {
                    program: invocation.program.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                }),
            };
        }

        if invocation.label == Stage::RetrieveResultsArtifact.as_str() {
            self.write_artifact(invocation);
        }
        Ok(CommandStatus::success())
    }
}

/// Pipeline settings for a run inside `workspace` with a kernel tree to build.
pub fn pipeline_config(workspace: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::new("/opt/xfstests-bld", workspace);
    config.src_dir = Some(workspace.join("linux"));
    config.njobs = 4;
    config
}

/// Controller wired to `runner` and a JSON writer into the workspace.
pub fn controller(config: PipelineConfig, runner: Arc<ScriptedRunner>) -> PipelineController {
    let writer: Arc<dyn ArtifactWriter> = Arc::new(JsonArtifactWriter::new(&config.workspace));
    PipelineController::new(config, runner, writer).expect("valid pipeline config")
}
