//! Submission driver: hands rendered scripts to `sbatch`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{LaunchError, LaunchResult};
use crate::slurm::parser;

/// Something that accepts batch scripts and returns job ids.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Fail fast if submissions cannot work at all.
    fn preflight(&self) -> LaunchResult<()>;

    /// Submit a script that is already on disk and return the job id.
    async fn submit(&self, script: &Path) -> LaunchResult<String>;
}

/// Submitter that runs the `sbatch` binary.
#[derive(Debug, Clone)]
pub struct SbatchSubmitter {
    binary: PathBuf,
}

impl SbatchSubmitter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn environment_error(&self, reason: impl std::fmt::Display) -> LaunchError {
        LaunchError::Environment(format!(
            "cannot run `{}`: {reason}",
            self.binary.display()
        ))
    }
}

impl Default for SbatchSubmitter {
    fn default() -> Self {
        Self::new("sbatch")
    }
}

#[async_trait]
impl Submitter for SbatchSubmitter {
    fn preflight(&self) -> LaunchResult<()> {
        let resolved = which::which(&self.binary).map_err(|e| self.environment_error(e))?;
        debug!(binary = %resolved.display(), "Found submission binary");
        Ok(())
    }

    async fn submit(&self, script: &Path) -> LaunchResult<String> {
        let output = Command::new(&self.binary)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => self.environment_error(e),
                _ => LaunchError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LaunchError::Submission {
                stderr: stderr.trim_end_matches(['\n', '\r']).to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = parser::parse_sbatch_output(&stdout)?;
        info!(script = %script.display(), job_id = %job_id, "Submitted batch script");
        Ok(job_id)
    }
}
