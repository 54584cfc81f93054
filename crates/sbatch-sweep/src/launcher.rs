//! Launcher: resolve, render, write and submit a sweep.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use futures::stream;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::batch::SubmissionBatch;
use crate::error::{LaunchError, LaunchResult};
use crate::launch::{LaunchMode, LaunchSpec};
use crate::resolve::resolve;
use crate::site::SiteDefaults;
use crate::slurm::{RenderedScript, SbatchSubmitter, Submitter, render};

/// Knobs that do not change the rendered scripts.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Maximum number of concurrent `sbatch` calls in individual mode.
    pub max_parallel: usize,

    /// Write the artifacts but do not submit.
    pub dry_run: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            dry_run: false,
        }
    }
}

/// What happened to one individual job.
#[derive(Debug)]
pub enum TaskOutcome {
    Submitted { job_id: String },
    /// Written but not submitted (dry run).
    Rendered,
    /// Not attempted because an earlier submission hit a fatal error.
    Skipped,
    Failed(LaunchError),
}

/// Per-task entry of an individual-mode report.
#[derive(Debug)]
pub struct TaskReport {
    pub index: usize,
    pub script: PathBuf,
    pub stdout_log: String,
    pub outcome: TaskOutcome,
}

impl TaskReport {
    pub fn job_id(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Submitted { job_id } => Some(job_id),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LaunchError> {
        match &self.outcome {
            TaskOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Result of an array-mode launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySubmission {
    pub name: String,
    pub script: PathBuf,
    pub task_table: PathBuf,
    /// `None` for a dry run.
    pub array_job_id: Option<String>,
    pub task_count: usize,
}

impl ArraySubmission {
    /// `<array_job_id>_<task_id>` for every task, in task order.
    pub fn task_job_ids(&self) -> Vec<String> {
        match &self.array_job_id {
            Some(id) => (0..self.task_count).map(|i| format!("{id}_{i}")).collect(),
            None => Vec::new(),
        }
    }
}

/// Outcome of [`Launcher::launch`].
#[derive(Debug)]
pub enum LaunchReport {
    Individual(Vec<TaskReport>),
    Array(ArraySubmission),
}

impl LaunchReport {
    /// Job ids of everything that was accepted, in task order.
    pub fn job_ids(&self) -> Vec<String> {
        match self {
            LaunchReport::Individual(tasks) => tasks
                .iter()
                .filter_map(|t| t.job_id().map(str::to_string))
                .collect(),
            LaunchReport::Array(array) => array.array_job_id.iter().cloned().collect(),
        }
    }

    /// First failed task, individual mode only.
    pub fn first_failure(&self) -> Option<&TaskReport> {
        match self {
            LaunchReport::Individual(tasks) => tasks.iter().find(|t| t.error().is_some()),
            LaunchReport::Array(_) => None,
        }
    }

    pub fn failure_count(&self) -> usize {
        match self {
            LaunchReport::Individual(tasks) => {
                tasks.iter().filter(|t| t.error().is_some()).count()
            }
            LaunchReport::Array(_) => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            LaunchReport::Individual(tasks) => tasks
                .iter()
                .all(|t| matches!(t.outcome, TaskOutcome::Submitted { .. } | TaskOutcome::Rendered)),
            LaunchReport::Array(_) => true,
        }
    }
}

/// Turns a sweep into `sbatch` submissions.
pub struct Launcher {
    spec: LaunchSpec,
    site: SiteDefaults,
    submitter: Arc<dyn Submitter>,
    options: LaunchOptions,
}

impl Launcher {
    /// Launcher that submits with the site's `sbatch` binary.
    pub fn new(spec: LaunchSpec, site: SiteDefaults) -> Self {
        let submitter = Arc::new(SbatchSubmitter::new(site.submit_binary.clone()));
        Self::with_submitter(spec, site, submitter)
    }

    pub fn with_submitter(
        spec: LaunchSpec,
        site: SiteDefaults,
        submitter: Arc<dyn Submitter>,
    ) -> Self {
        Self {
            spec,
            site,
            submitter,
            options: LaunchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LaunchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    /// Launch a batch.
    ///
    /// Configuration, render and environment problems are reported before
    /// anything is written. In individual mode a failed submission does not
    /// stop the remaining ones and is recorded in the report; in array mode
    /// the single submission either succeeds or returns the error.
    pub async fn launch(&self, batch: &SubmissionBatch) -> LaunchResult<LaunchReport> {
        let resolved = resolve(&self.spec, &self.site)?;
        let scripts = render(&resolved, batch, &self.site)?;

        if !self.options.dry_run {
            self.submitter.preflight()?;
        }

        prepare_directories(batch).await?;
        for script in &scripts {
            write_script(script).await?;
        }

        match &resolved.mode {
            LaunchMode::Array { name } => {
                info!("Submitting {} jobs to SLURM as a job array", batch.len());
                let script = scripts
                    .into_iter()
                    .next()
                    .ok_or_else(|| LaunchError::Render("no array script rendered".to_string()))?;
                self.launch_array(name, script, batch.len()).await
            }
            LaunchMode::Individual { .. } => {
                info!("Submitting {} jobs to SLURM individually", batch.len());
                Ok(LaunchReport::Individual(
                    self.launch_individual(scripts).await,
                ))
            }
        }
    }

    async fn launch_array(
        &self,
        name: &str,
        script: RenderedScript,
        task_count: usize,
    ) -> LaunchResult<LaunchReport> {
        let task_table = script
            .task_table
            .as_ref()
            .map(|artifact| artifact.path.clone())
            .unwrap_or_default();

        let array_job_id = if self.options.dry_run {
            None
        } else {
            Some(self.submitter.submit(&script.path).await?)
        };

        Ok(LaunchReport::Array(ArraySubmission {
            name: name.to_string(),
            script: script.path,
            task_table,
            array_job_id,
            task_count,
        }))
    }

    async fn launch_individual(&self, scripts: Vec<RenderedScript>) -> Vec<TaskReport> {
        let dry_run = self.options.dry_run;
        let submitter = &self.submitter;
        // Set once sbatch cannot run at all; tasks not yet started are skipped.
        let halted = AtomicBool::new(false);
        let halted = &halted;

        let reports: Vec<TaskReport> = stream::iter(scripts)
            .map(move |script| async move {
                let outcome = if dry_run {
                    TaskOutcome::Rendered
                } else if halted.load(Ordering::SeqCst) {
                    TaskOutcome::Skipped
                } else {
                    match submitter.submit(&script.path).await {
                        Ok(job_id) => TaskOutcome::Submitted { job_id },
                        Err(e) => {
                            if matches!(e, LaunchError::Environment(_)) {
                                halted.store(true, Ordering::SeqCst);
                            }
                            error!(script = %script.path.display(), "Submission failed: {e}");
                            TaskOutcome::Failed(e)
                        }
                    }
                };
                task_report(&script, outcome)
            })
            .buffered(self.options.max_parallel.max(1))
            .collect()
            .await;

        let skipped = reports
            .iter()
            .filter(|r| matches!(r.outcome, TaskOutcome::Skipped))
            .count();
        if skipped > 0 {
            warn!(skipped, "Stopped submitting after a fatal environment error");
        }

        reports
    }
}

fn task_report(script: &RenderedScript, outcome: TaskOutcome) -> TaskReport {
    TaskReport {
        index: script.task.unwrap_or_default(),
        script: script.path.clone(),
        stdout_log: script.stdout_log.clone(),
        outcome,
    }
}

async fn prepare_directories(batch: &SubmissionBatch) -> LaunchResult<()> {
    fs::create_dir_all(&batch.output_root).await?;
    for task in &batch.tasks {
        fs::create_dir_all(&task.output_dir).await?;
    }
    debug!(
        root = %batch.output_root.display(),
        tasks = batch.len(),
        "Created task output directories"
    );
    Ok(())
}

async fn write_script(script: &RenderedScript) -> LaunchResult<()> {
    if let Some(artifact) = &script.task_table {
        write_synced(&artifact.path, &artifact.table.to_json()?).await?;
    }
    write_synced(&script.path, &script.text).await?;
    make_executable(&script.path).await?;
    debug!(path = %script.path.display(), "Wrote batch script");
    Ok(())
}

async fn write_synced(path: &Path, contents: &str) -> LaunchResult<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> LaunchResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> LaunchResult<()> {
    Ok(())
}
