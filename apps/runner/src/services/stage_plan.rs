//! Concrete commands for each pipeline stage.

use std::path::PathBuf;

use crate::config::{Execution, GceSettings, PipelineConfig};
use crate::services::command::Invocation;
use crate::services::pipeline::Stage;

/// Test selection used when neither a group nor test cases are given.
pub const DEFAULT_TEST_SELECTION: &str = "smoke";

/// Maps a [`PipelineConfig`] to the commands of every stage.
pub struct StagePlan<'a> {
    config: &'a PipelineConfig,
}

impl<'a> StagePlan<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Commands run by `stage`, in order. Empty for stages that run no
    /// external command or are skipped.
    pub fn invocations(&self, stage: Stage) -> Vec<Invocation> {
        match stage {
            Stage::ConfigureKernel => self.configure_kernel().into_iter().collect(),
            Stage::BuildKernel => self.build_kernel().into_iter().collect(),
            Stage::RunTests => vec![self.run_tests()],
            Stage::RetrieveResultsArtifact => self.retrieve_results(),
            Stage::ParseAndConvert | Stage::Persist => Vec::new(),
        }
    }

    /// Local files the retrieval stage produces, one per test config.
    pub fn artifact_files(&self) -> Vec<PathBuf> {
        self.config
            .test_configs
            .iter()
            .map(|cfg| self.config.workspace.join(artifact_file_name(cfg)))
            .collect()
    }

    fn kvm_xfstests(&self) -> String {
        self.bld_tool("kvm-xfstests")
    }

    fn bld_tool(&self, name: &str) -> String {
        self.config
            .xfstests_bld_path
            .join(name)
            .to_string_lossy()
            .into_owned()
    }

    /// `--testrunid` of a GCE run, derived from the workspace name so that
    /// results of concurrent runs do not mix in the bucket.
    pub fn test_run_id(&self) -> String {
        self.config
            .workspace
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase().replace('_', "-"))
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| "fstests".to_string())
    }

    fn source_dir(&self) -> Option<&PathBuf> {
        if self.config.skip_build {
            None
        } else {
            self.config.src_dir.as_ref()
        }
    }

    fn configure_kernel(&self) -> Option<Invocation> {
        let src_dir = self.source_dir()?;
        Some(
            Invocation::new(Stage::ConfigureKernel.as_str(), self.kvm_xfstests(), src_dir)
                .arg("install-kconfig"),
        )
    }

    fn build_kernel(&self) -> Option<Invocation> {
        let src_dir = self.source_dir()?;
        Some(
            Invocation::new(Stage::BuildKernel.as_str(), "make", src_dir)
                .arg(format!("-j{}", self.config.njobs)),
        )
    }

    fn run_tests(&self) -> Invocation {
        let config = self.config;
        let mut invocation = match &config.execution {
            Execution::Kvm => Invocation::new(
                Stage::RunTests.as_str(),
                self.kvm_xfstests(),
                &config.xfstests_bld_path,
            ),
            Execution::Gce(gce) => self.gce_xfstests(gce),
        };

        if let Some(kernel) = &config.kernel {
            invocation = invocation
                .arg("--kernel")
                .arg(kernel.to_string_lossy().into_owned());
        }

        let configs = config
            .test_configs
            .iter()
            .map(|cfg| format!("{}/{}", config.filesystem, cfg))
            .collect::<Vec<_>>()
            .join(",");
        invocation = invocation.arg("-c").arg(configs);

        if let Some(group) = &config.testgroup {
            invocation = invocation.args(["-g", group.as_str()]);
        }
        invocation = invocation.args(config.testcases.iter().cloned());

        if config.testgroup.is_none() && config.testcases.is_empty() {
            invocation = invocation.arg(DEFAULT_TEST_SELECTION);
        }

        invocation
    }

    fn gce_xfstests(&self, gce: &GceSettings) -> Invocation {
        let mut invocation = Invocation::new(
            Stage::RunTests.as_str(),
            self.bld_tool("gce-xfstests"),
            &self.config.xfstests_bld_path,
        );
        if let Some(shards) = gce.max_shards {
            invocation = invocation
                .arg("ltm")
                .arg("--max-shards")
                .arg(shards.to_string());
        }
        if let Some(project) = &gce.project {
            invocation = invocation.args(["--project", project.as_str()]);
        }
        if let Some(zone) = &gce.zone {
            invocation = invocation.args(["--gce-zone", zone.as_str()]);
        }
        invocation
            .args(["--gs-bucket", gce.gs_bucket.as_str()])
            .arg("--testrunid")
            .arg(self.test_run_id())
    }

    fn retrieve_results(&self) -> Vec<Invocation> {
        match &self.config.execution {
            Execution::Kvm => self.dump_results_disk(),
            Execution::Gce(gce) => self.copy_from_bucket(gce),
        }
    }

    /// `gs://<bucket>/results/<testrunid>/<fs>/results-<cfg>/result.xml`
    fn copy_from_bucket(&self, gce: &GceSettings) -> Vec<Invocation> {
        let config = self.config;
        let run_id = self.test_run_id();
        config
            .test_configs
            .iter()
            .map(|cfg| {
                Invocation::new(
                    Stage::RetrieveResultsArtifact.as_str(),
                    "gsutil",
                    &config.workspace,
                )
                .arg("cp")
                .arg(format!(
                    "gs://{}/results/{}/{}/results-{}/result.xml",
                    gce.gs_bucket, run_id, config.filesystem, cfg
                ))
                .arg(artifact_file_name(cfg))
            })
            .collect()
    }

    fn dump_results_disk(&self) -> Vec<Invocation> {
        let config = self.config;
        let image = config.results_image.to_string_lossy().into_owned();
        config
            .test_configs
            .iter()
            .map(|cfg| {
                let request = format!(
                    "dump /results/{}/results-{}/result.xml {}",
                    config.filesystem,
                    cfg,
                    artifact_file_name(cfg)
                );
                Invocation::new(
                    Stage::RetrieveResultsArtifact.as_str(),
                    "debugfs",
                    &config.workspace,
                )
                .arg("-R")
                .arg(request)
                .arg(image.clone())
            })
            .collect()
    }
}

/// Workspace-relative name of the retrieved xunit file for `cfg`.
pub fn artifact_file_name(cfg: &str) -> String {
    format!("result-{}.xml", cfg.replace('/', "_"))
}
