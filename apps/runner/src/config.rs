//! Runner configuration.
//!
//! Process-level settings (API endpoint, token, output directory, storage
//! host) come from environment variables. Per-run settings (kernel tree,
//! test selection) form a [`PipelineConfig`] that is handed to the
//! pipeline explicitly.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Development default values - NEVER use in production.
pub mod defaults {
    pub const DEV_API_URL: &str = "http://localhost:8001";
    pub const DEV_API_TIMEOUT_SECS: u64 = 30;
    pub const DEV_OUTPUT_DIR: &str = "./output";
    pub const ROOT_NAME: &str = "fstests";
    pub const FILESYSTEM: &str = "ext4";
    pub const SSH_PORT: u16 = 22;
    pub const SSH_REMOTE_DIR: &str = ".";
    pub const TEST_CONFIG: &str = "4k";
    /// Results disk of the test appliance, relative to the xfstests-bld checkout.
    pub const RESULTS_IMAGE: &str = "run-fstests/disks/vdg";
}

/// Deployment mode. Production refuses development defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    pub fn is_development(self) -> bool {
        self == Self::Development
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    /// Accepts the long and short names in any case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::BadValue {
                name: "RUST_ENV",
                value: value.to_string(),
                expected: "development or production",
            }),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// KernelCI API settings.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Base URL of the API (without the `/latest` prefix)
    pub url: String,
    /// Bearer token for write operations
    pub token: Option<String>,
    /// Total request timeout in seconds
    pub timeout_secs: u64,
}

/// SSH storage host used to publish run artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Private key passed to `scp -i`
    pub key: PathBuf,
    /// Remote directory the run directory is copied into
    pub remote_dir: String,
}

/// Process-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment
    pub environment: Environment,
    /// KernelCI API settings
    pub api: ApiSettings,
    /// Directory where per-run workspaces are created
    pub output_dir: PathBuf,
    /// Name of the report root node
    pub root_name: String,
    /// Filesystem under test; every test path is rooted at this segment
    pub filesystem: String,
    /// Optional artifact upload target
    pub ssh: Option<SshSettings>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RUST_ENV`: Environment (development/production, default: development)
    /// - `KCI_API_URL`: KernelCI API base URL (required in production)
    /// - `API_TOKEN`: KernelCI API token (required in production)
    /// - `KCI_API_TIMEOUT_SECS`: API request timeout (default: 30)
    /// - `FSTESTS_OUTPUT_DIR`: Workspace root (default: ./output)
    /// - `FSTESTS_ROOT_NAME`: Report root node name (default: fstests)
    /// - `FSTESTS_FILESYSTEM`: Filesystem under test (default: ext4)
    /// - `FSTESTS_SSH_HOST`, `FSTESTS_SSH_PORT`, `FSTESTS_SSH_USER`,
    ///   `FSTESTS_SSH_KEY`, `FSTESTS_SSH_DIR`: storage upload target
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match var("RUST_ENV") {
            Some(value) => value.parse::<Environment>()?,
            None => Environment::default(),
        };

        let timeout_secs = match var("KCI_API_TIMEOUT_SECS") {
            Some(v) => v.parse::<u64>().map_err(|_| ConfigError::BadValue {
                name: "KCI_API_TIMEOUT_SECS",
                value: v,
                expected: "a number of seconds",
            })?,
            None => defaults::DEV_API_TIMEOUT_SECS,
        };

        let api = ApiSettings {
            url: var("KCI_API_URL").unwrap_or_else(|| defaults::DEV_API_URL.to_string()),
            token: var("API_TOKEN").filter(|t| !t.is_empty()),
            timeout_secs,
        };

        let ssh = match var("FSTESTS_SSH_HOST") {
            Some(host) => Some(SshSettings {
                host,
                port: match var("FSTESTS_SSH_PORT") {
                    Some(p) => p.parse::<u16>().map_err(|_| ConfigError::BadValue {
                        name: "FSTESTS_SSH_PORT",
                        value: p,
                        expected: "a port number",
                    })?,
                    None => defaults::SSH_PORT,
                },
                user: var("FSTESTS_SSH_USER").ok_or(ConfigError::Unset {
                    name: "FSTESTS_SSH_USER",
                    needed_by: "FSTESTS_SSH_HOST",
                })?,
                key: var("FSTESTS_SSH_KEY")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::Unset {
                        name: "FSTESTS_SSH_KEY",
                        needed_by: "FSTESTS_SSH_HOST",
                    })?,
                remote_dir: var("FSTESTS_SSH_DIR")
                    .unwrap_or_else(|| defaults::SSH_REMOTE_DIR.to_string()),
            }),
            None => None,
        };

        let config = Config {
            environment,
            api,
            output_dir: var("FSTESTS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(defaults::DEV_OUTPUT_DIR)),
            root_name: var("FSTESTS_ROOT_NAME").unwrap_or_else(|| defaults::ROOT_NAME.to_string()),
            filesystem: var("FSTESTS_FILESYSTEM")
                .unwrap_or_else(|| defaults::FILESYSTEM.to_string()),
            ssh,
        };

        if environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    /// Production must point at a real API and be able to write to it.
    fn validate_production(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        if self.api.url == defaults::DEV_API_URL {
            problems.push(format!("KCI_API_URL still points at {}", defaults::DEV_API_URL));
        }
        if self.api.token.is_none() {
            problems.push("API_TOKEN is empty; node creation and submission need it".to_string());
        }
        if problems.is_empty() {
            return Ok(());
        }
        Err(ConfigError::Production(problems))
    }

    /// Check if running in development mode.
    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }
}

/// Per-run pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Report root node name
    pub root_name: String,
    /// Filesystem under test, prepended to test paths that lack it
    pub filesystem: String,
    /// xfstests-bld checkout providing `kvm-xfstests`
    pub xfstests_bld_path: PathBuf,
    /// Decompressed kernel source tree (needed unless the build is skipped)
    pub src_dir: Option<PathBuf>,
    /// Pre-built kernel image handed to the test VM
    pub kernel: Option<PathBuf>,
    /// Skip kernel configuration and build
    pub skip_build: bool,
    /// Parallel make jobs
    pub njobs: usize,
    /// xfstests configurations, e.g. `4k`, `1k`
    pub test_configs: Vec<String>,
    /// Individual test cases, e.g. `generic/001`
    pub testcases: Vec<String>,
    /// Test group, e.g. `quick`
    pub testgroup: Option<String>,
    /// Disk image the test appliance writes its results to
    pub results_image: PathBuf,
    /// Where the test appliance runs
    pub execution: Execution,
    /// Per-run workspace directory
    pub workspace: PathBuf,
}

/// Test appliance backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Execution {
    /// Local VM through `kvm-xfstests`; results are read off the results disk.
    #[default]
    Kvm,
    /// Google Compute Engine through `gce-xfstests`; results land in a bucket.
    Gce(GceSettings),
}

/// `gce-xfstests` options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GceSettings {
    pub project: Option<String>,
    pub zone: Option<String>,
    /// Bucket the test VMs write `results/<testrunid>/...` into
    pub gs_bucket: String,
    /// Shard the run over the lightweight test manager
    pub max_shards: Option<u32>,
}

impl PipelineConfig {
    /// Create a configuration with defaults for everything but the paths.
    pub fn new(xfstests_bld_path: impl Into<PathBuf>, workspace: impl Into<PathBuf>) -> Self {
        let xfstests_bld_path = xfstests_bld_path.into();
        let results_image = xfstests_bld_path.join(defaults::RESULTS_IMAGE);
        Self {
            root_name: defaults::ROOT_NAME.to_string(),
            filesystem: defaults::FILESYSTEM.to_string(),
            xfstests_bld_path,
            src_dir: None,
            kernel: None,
            skip_build: false,
            njobs: num_cpus::get(),
            test_configs: vec![defaults::TEST_CONFIG.to_string()],
            testcases: Vec::new(),
            testgroup: None,
            results_image,
            execution: Execution::Kvm,
            workspace: workspace.into(),
        }
    }

    /// Return a copy bound to another workspace.
    pub fn with_workspace(&self, workspace: &Path) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            ..self.clone()
        }
    }

    /// Check the settings that the stage plan relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.skip_build && self.src_dir.is_none() {
            return Err(ConfigError::InvalidOption(
                "--src-dir is required unless --skip-build is given".to_string(),
            ));
        }
        if self.test_configs.is_empty() || self.test_configs.iter().any(|c| c.is_empty()) {
            return Err(ConfigError::InvalidOption(
                "at least one non-empty test configuration is required".to_string(),
            ));
        }
        if let Some(cfg) = self.test_configs.iter().find(|c| c.contains('/')) {
            return Err(ConfigError::InvalidOption(format!(
                "test configuration '{}' must not contain '/'; the filesystem is {}",
                cfg, self.filesystem
            )));
        }
        if self.njobs == 0 {
            return Err(ConfigError::InvalidOption(
                "-j must be greater than zero".to_string(),
            ));
        }
        if self.root_name.is_empty() || self.filesystem.is_empty() {
            return Err(ConfigError::InvalidOption(
                "root name and filesystem must not be empty".to_string(),
            ));
        }
        if let Execution::Gce(gce) = &self.execution {
            if gce.gs_bucket.is_empty() {
                return Err(ConfigError::InvalidOption(
                    "--gs-bucket is required with --gce".to_string(),
                ));
            }
            if gce.max_shards == Some(0) {
                return Err(ConfigError::InvalidOption(
                    "--max-shards must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Split a comma separated option value, dropping empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Drop a leading `<filesystem>/` from a test configuration name.
///
/// xfstests-bld also accepts `ext4/4k`; the filesystem is added back when
/// the test command is built.
pub fn strip_filesystem<'a>(cfg: &'a str, filesystem: &str) -> &'a str {
    cfg.strip_prefix(filesystem)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(cfg)
}

/// Why a configuration could not be loaded or used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be set when {needed_by} is set")]
    Unset {
        name: &'static str,
        needed_by: &'static str,
    },

    #[error("{name}={value:?} is not valid, expected {expected}")]
    BadValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A command line option is missing or inconsistent
    #[error("{0}")]
    InvalidOption(String),

    #[error("unsafe production configuration: {}", .0.join("; "))]
    Production(Vec<String>),
}
