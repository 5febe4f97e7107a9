//! Artifact upload to the SSH storage host.
//!
//! Uploads are best effort: a failed copy is logged and never changes the
//! outcome of a run.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::SshSettings;
use crate::services::command::{CommandRunner, Invocation};

/// Label of upload invocations in logs.
pub const UPLOAD_LABEL: &str = "upload";

/// Copies files to the storage host with `scp`.
#[derive(Clone)]
pub struct StorageUploader {
    settings: SshSettings,
    runner: Arc<dyn CommandRunner>,
}

impl StorageUploader {
    pub fn new(settings: SshSettings, runner: Arc<dyn CommandRunner>) -> Self {
        Self { settings, runner }
    }

    /// `user@host:dir/` destination passed to scp.
    pub fn destination(&self) -> String {
        format!(
            "{}@{}:{}/",
            self.settings.user,
            self.settings.host,
            self.settings.remote_dir.trim_end_matches('/')
        )
    }

    /// Command that copies `file` to the storage host.
    pub fn invocation(&self, file: &Path) -> Invocation {
        let cwd = file.parent().unwrap_or_else(|| Path::new("."));
        Invocation::new(UPLOAD_LABEL, "scp", cwd)
            .arg("-i")
            .arg(self.settings.key.to_string_lossy().into_owned())
            .arg("-P")
            .arg(self.settings.port.to_string())
            .arg(file.to_string_lossy().into_owned())
            .arg(self.destination())
    }

    /// Upload `file`; returns whether the copy succeeded.
    pub async fn upload(&self, file: &Path) -> bool {
        let invocation = self.invocation(file);
        match self.runner.run(&invocation).await {
            Ok(status) if status.success => {
                info!("Uploaded {} to {}", file.display(), self.destination());
                true
            }
            Ok(status) => {
                warn!(
                    "Upload of {} failed with status {:?}",
                    file.display(),
                    status.code
                );
                false
            }
            Err(e) => {
                warn!("Upload of {} failed: {}", file.display(), e);
                false
            }
        }
    }
}
