//! Sweep file loading.
//!
//! A sweep file is YAML with three sections: `launcher` (submission options),
//! `sweep` (what to run) and `submit` (how to talk to `sbatch`).
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables (`SBATCH_SWEEP_` prefix)
//! 2. Sweep file
//! 3. Default values

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::warn;

use sbatch_sweep::{LaunchSpec, SubmissionBatch};

pub const ENV_SBATCH: &str = "SBATCH_SWEEP_SBATCH";
pub const ENV_MAX_PARALLEL: &str = "SBATCH_SWEEP_MAX_PARALLEL";
pub const ENV_OUTPUT_DIR: &str = "SBATCH_SWEEP_OUTPUT_DIR";

/// Complete sweep file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepFile {
    /// Submission options
    #[serde(default)]
    pub launcher: LaunchSpec,

    /// Program and per-task arguments
    pub sweep: SweepConfig,

    /// Submission driver settings
    #[serde(default)]
    pub submit: SubmitConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    /// Command every task runs, arguments appended
    pub program: String,

    /// Sweep root; task `i` writes to `<output_dir>/<i>`
    pub output_dir: PathBuf,

    #[serde(default = "default_job_name")]
    pub job_name: String,

    /// One argument string per task
    #[serde(default)]
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitConfig {
    /// Concurrent `sbatch` calls for individual jobs
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    #[serde(default = "default_sbatch")]
    pub sbatch: PathBuf,
}

fn default_job_name() -> String {
    "job".to_string()
}

fn default_max_parallel() -> usize {
    1
}

fn default_sbatch() -> PathBuf {
    PathBuf::from("sbatch")
}

impl Default for SubmitConfig {
    fn default() -> Self {
        SubmitConfig {
            max_parallel: default_max_parallel(),
            sbatch: default_sbatch(),
        }
    }
}

impl SweepFile {
    /// Load a sweep file and apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sweep file: {}", path.display()))?;
        let mut file = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid sweep file: {}", path.display()))?;
        file.apply_overrides(|key| std::env::var(key).ok());
        file.validate()?;
        Ok(file)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(contents)?)
    }

    /// Override file values from a variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(sbatch) = lookup(ENV_SBATCH) {
            self.submit.sbatch = PathBuf::from(sbatch);
        }
        if let Some(max) = lookup(ENV_MAX_PARALLEL) {
            match max.parse() {
                Ok(val) => self.submit.max_parallel = val,
                Err(_) => warn!("Ignoring {ENV_MAX_PARALLEL}={max}: not a number"),
            }
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.sweep.output_dir = PathBuf::from(dir);
        }
    }

    /// Replace the task list with one argument string per non-empty line.
    pub fn replace_tasks(&mut self, contents: &str) {
        self.sweep.tasks = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
    }

    pub fn validate(&self) -> Result<()> {
        if self.sweep.program.trim().is_empty() {
            bail!("sweep.program must not be empty");
        }
        if self.sweep.output_dir.as_os_str().is_empty() {
            bail!("sweep.output_dir must not be empty");
        }
        if self.submit.max_parallel == 0 {
            bail!("submit.max_parallel must be at least 1");
        }
        Ok(())
    }

    /// Batch rooted at the absolute form of `sweep.output_dir`.
    pub fn batch(&self) -> Result<SubmissionBatch> {
        let root = std::path::absolute(&self.sweep.output_dir).with_context(|| {
            format!(
                "Failed to resolve output directory: {}",
                self.sweep.output_dir.display()
            )
        })?;
        Ok(SubmissionBatch::new(
            self.sweep.program.clone(),
            root,
            &self.sweep.job_name,
            self.sweep.tasks.iter().cloned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SWEEP: &str = r#"
launcher:
  partition: gpu
  job_array_name: lr_sweep
  gpus: 1
  additional:
    exclusive: true
sweep:
  program: python train.py
  output_dir: /scratch/multirun
  tasks: ["lr=0.1", "lr=0.01"]
submit:
  max_parallel: 4
"#;

    #[test]
    fn test_load_sweep_yaml() {
        let file = SweepFile::from_yaml(SWEEP).unwrap();
        assert_eq!(file.launcher.partition.as_deref(), Some("gpu"));
        assert_eq!(file.launcher.gpus, Some(1));
        assert_eq!(file.launcher.additional.0.len(), 1);
        assert_eq!(file.sweep.job_name, "job");
        assert_eq!(file.sweep.tasks, vec!["lr=0.1", "lr=0.01"]);
        assert_eq!(file.submit.max_parallel, 4);
        assert_eq!(file.submit.sbatch, PathBuf::from("sbatch"));
        file.validate().unwrap();
    }

    #[test]
    fn test_defaults_without_optional_sections() {
        let file =
            SweepFile::from_yaml("sweep:\n  program: ./run.sh\n  output_dir: out\n").unwrap();
        assert_eq!(file.launcher, LaunchSpec::default());
        assert!(file.sweep.tasks.is_empty());
        assert_eq!(file.submit.max_parallel, 1);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "sweep:\n  program: x\n  output_dir: out\n  bogus: 1\n";
        assert!(SweepFile::from_yaml(yaml).is_err());

        let yaml = "launcher:\n  partion: gpu\nsweep:\n  program: x\n  output_dir: out\n";
        assert!(SweepFile::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let mut file = SweepFile::from_yaml(SWEEP).unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_SBATCH, "/opt/slurm/bin/sbatch"),
            (ENV_MAX_PARALLEL, "8"),
            (ENV_OUTPUT_DIR, "/tmp/elsewhere"),
        ]
        .into_iter()
        .collect();

        file.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(file.submit.sbatch, PathBuf::from("/opt/slurm/bin/sbatch"));
        assert_eq!(file.submit.max_parallel, 8);
        assert_eq!(file.sweep.output_dir, PathBuf::from("/tmp/elsewhere"));
    }

    #[test]
    fn test_bad_max_parallel_override_is_ignored() {
        let mut file = SweepFile::from_yaml(SWEEP).unwrap();
        file.apply_overrides(|key| (key == ENV_MAX_PARALLEL).then(|| "many".to_string()));
        assert_eq!(file.submit.max_parallel, 4);
    }

    #[test]
    fn test_validate() {
        let mut file = SweepFile::from_yaml(SWEEP).unwrap();
        file.submit.max_parallel = 0;
        assert!(file.validate().is_err());

        let mut file = SweepFile::from_yaml(SWEEP).unwrap();
        file.sweep.program = "  ".to_string();
        assert!(file.validate().is_err());
    }

    #[test]
    fn test_replace_tasks_skips_blank_lines() {
        let mut file = SweepFile::from_yaml(SWEEP).unwrap();
        file.replace_tasks("seed=1\n\n  seed=2  \n\n");
        assert_eq!(file.sweep.tasks, vec!["seed=1", "seed=2"]);
    }

    #[test]
    fn test_batch_uses_task_subdirectories() {
        let file = SweepFile::from_yaml(SWEEP).unwrap();
        let batch = file.batch().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.tasks[1].output_dir, PathBuf::from("/scratch/multirun/1"));
        assert_eq!(batch.tasks[1].arguments, "lr=0.01");
    }
}
