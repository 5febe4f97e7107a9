//! Command line interface of the runner binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    Config, ConfigError, Execution, GceSettings, PipelineConfig, SshSettings, defaults, split_list,
    strip_filesystem,
};

#[derive(Debug, Parser)]
#[command(name = "fstests-runner")]
#[command(about = "KVM fstests runner for KernelCI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a kernel, run fstests on it and report the results
    Run {
        /// Id of the checkout node; without it the run is local only
        #[arg(long)]
        node_id: Option<String>,

        #[command(flatten)]
        args: RunArgs,
    },

    /// Wait for available checkouts and run a job for each of them
    Listen {
        /// Stop after this many jobs
        #[arg(long)]
        max_jobs: Option<usize>,

        #[command(flatten)]
        args: RunArgs,
    },

    /// Submit a previously written results.json to a node
    Submit {
        /// Id of the node the results belong to
        #[arg(long)]
        node_id: String,

        /// Report file written by a previous run
        #[arg(long)]
        report: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// xfstests build directory
    #[arg(long)]
    pub xfstests_bld_path: PathBuf,

    /// Local directory containing the decompressed kernel code to use
    #[arg(long)]
    pub src_dir: Option<PathBuf>,

    /// Path of the pre-built kernel image to use for the tests
    #[arg(long)]
    pub kernel: Option<PathBuf>,

    /// Don't configure or build the kernel
    #[arg(long)]
    pub skip_build: bool,

    /// xfstests test configuration, single or comma separated
    #[arg(long, default_value = defaults::TEST_CONFIG)]
    pub testcfg: String,

    /// xfstests testcase to run, single or comma separated
    #[arg(long)]
    pub testcase: Option<String>,

    /// xfstests test group to run
    #[arg(long)]
    pub testgroup: Option<String>,

    /// Number of parallel build jobs (default: number of CPUs)
    #[arg(short = 'j', long = "jobs")]
    pub jobs: Option<usize>,

    /// Directory for run workspaces (overrides FSTESTS_OUTPUT_DIR)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Disk image holding the test results
    #[arg(long)]
    pub results_image: Option<PathBuf>,

    /// Storage SSH host
    #[arg(long)]
    pub ssh_host: Option<String>,

    /// Path to the ssh key for uploading to storage
    #[arg(long)]
    pub ssh_key: Option<PathBuf>,

    /// Storage SSH port number
    #[arg(long)]
    pub ssh_port: Option<u16>,

    /// Storage SSH user name
    #[arg(long)]
    pub ssh_user: Option<String>,

    /// Run the tests on Google Compute Engine with gce-xfstests
    #[arg(long)]
    pub gce: bool,

    /// GCE project
    #[arg(long)]
    pub gce_project: Option<String>,

    /// GCE zone
    #[arg(long)]
    pub gce_zone: Option<String>,

    /// Bucket gce-xfstests writes its results to
    #[arg(long)]
    pub gs_bucket: Option<String>,

    /// Shard the GCE run over at most this many VMs
    #[arg(long)]
    pub max_shards: Option<u32>,
}

impl RunArgs {
    /// Per-run settings; the workspace is filled in by the job.
    pub fn pipeline_config(&self, config: &Config) -> PipelineConfig {
        let mut pipeline = PipelineConfig::new(&self.xfstests_bld_path, PathBuf::new());
        pipeline.root_name = config.root_name.clone();
        pipeline.filesystem = config.filesystem.clone();
        pipeline.src_dir = self.src_dir.clone();
        pipeline.kernel = self.kernel.clone();
        pipeline.skip_build = self.skip_build;
        if let Some(jobs) = self.jobs {
            pipeline.njobs = jobs;
        }
        pipeline.test_configs = split_list(&self.testcfg)
            .iter()
            .map(|cfg| strip_filesystem(cfg, &config.filesystem).to_string())
            .collect();
        pipeline.testcases = self.testcase.as_deref().map(split_list).unwrap_or_default();
        pipeline.testgroup = self.testgroup.clone();
        if let Some(image) = &self.results_image {
            pipeline.results_image = image.clone();
        }
        if self.gce {
            pipeline.execution = Execution::Gce(GceSettings {
                project: self.gce_project.clone(),
                zone: self.gce_zone.clone(),
                gs_bucket: self.gs_bucket.clone().unwrap_or_default(),
                max_shards: self.max_shards,
            });
        }
        pipeline
    }

    pub fn output_dir(&self, config: &Config) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| config.output_dir.clone())
    }

    /// Storage target from the environment, with command line overrides.
    pub fn ssh_settings(
        &self,
        base: Option<&SshSettings>,
    ) -> Result<Option<SshSettings>, ConfigError> {
        let host = match (&self.ssh_host, base) {
            (Some(host), _) => host.clone(),
            (None, Some(base)) => base.host.clone(),
            (None, None) => return Ok(None),
        };
        let user = self
            .ssh_user
            .clone()
            .or_else(|| base.map(|b| b.user.clone()))
            .ok_or_else(|| {
                ConfigError::InvalidOption("--ssh-user is required with --ssh-host".to_string())
            })?;
        let key = self
            .ssh_key
            .clone()
            .or_else(|| base.map(|b| b.key.clone()))
            .ok_or_else(|| {
                ConfigError::InvalidOption("--ssh-key is required with --ssh-host".to_string())
            })?;
        Ok(Some(SshSettings {
            host,
            port: self
                .ssh_port
                .or(base.map(|b| b.port))
                .unwrap_or(defaults::SSH_PORT),
            user,
            key,
            remote_dir: base
                .map(|b| b.remote_dir.clone())
                .unwrap_or_else(|| defaults::SSH_REMOTE_DIR.to_string()),
        }))
    }
}
