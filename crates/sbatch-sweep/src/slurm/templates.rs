//! SLURM batch script templates.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::{SubmissionBatch, TaskInvocation};
use crate::error::{LaunchError, LaunchResult};
use crate::launch::{Directive, DirectiveValue, LaunchMode, ResolvedLaunch};
use crate::site::SiteDefaults;

/// Which log stream a file name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    pub fn extension(self) -> &'static str {
        match self {
            LogStream::Stdout => "out",
            LogStream::Stderr => "err",
        }
    }
}

/// Log file name of an individual job: `<job_name>_<job_id>.out`.
pub fn individual_log_name(job_name: &str, job_id: &str, stream: LogStream) -> String {
    format!("{job_name}_{job_id}.{}", stream.extension())
}

/// Log file name of an array task: `<job_name>_<array_job_id>_<task_id>.out`.
pub fn array_log_name(
    job_name: &str,
    array_job_id: &str,
    task_id: usize,
    stream: LogStream,
) -> String {
    format!("{job_name}_{array_job_id}_{task_id}.{}", stream.extension())
}

/// One row of the array task table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayTaskEntry {
    pub task_id: usize,
    pub job_name: String,
    pub output_dir: PathBuf,
    pub overrides: String,
}

impl ArrayTaskEntry {
    /// Shell assignments consumed by the array script via `eval`.
    pub fn shell_assignments(&self) -> String {
        format!(
            "TASK_ARGS={}\nJOB_NAME={}\nOUTPUT_DIR={}\n",
            shell_escape(&self.overrides),
            shell_escape(&self.job_name),
            shell_escape(&self.output_dir.to_string_lossy()),
        )
    }
}

/// Task index to invocation mapping, stored next to the array script.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArrayTaskTable(pub Vec<ArrayTaskEntry>);

impl ArrayTaskTable {
    /// Build the table in batch order.
    pub fn from_batch(batch: &SubmissionBatch) -> Self {
        Self(
            batch
                .tasks
                .iter()
                .enumerate()
                .map(|(task_id, task)| ArrayTaskEntry {
                    task_id,
                    job_name: task.job_name.clone(),
                    output_dir: task.output_dir.clone(),
                    overrides: task.arguments.clone(),
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, task_id: usize) -> Option<&ArrayTaskEntry> {
        self.0.get(task_id)
    }

    pub fn to_json(&self) -> LaunchResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> LaunchResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Auxiliary artifact written next to an array script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTableArtifact {
    pub path: PathBuf,
    pub table: ArrayTaskTable,
}

/// A script ready to be written and submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedScript {
    /// Where the script is written.
    pub path: PathBuf,

    /// Script text.
    pub text: String,

    /// Task this script runs, individual mode only.
    pub task: Option<usize>,

    /// Task table, array mode only.
    pub task_table: Option<TaskTableArtifact>,

    /// Stdout log path, with scheduler or shell placeholders.
    pub stdout_log: String,

    /// Stderr log path, with scheduler or shell placeholders.
    pub stderr_log: String,
}

/// Render the scripts for a batch.
///
/// Individual mode yields one script per task in task order, array mode a
/// single script with its task table.
pub fn render(
    resolved: &ResolvedLaunch,
    batch: &SubmissionBatch,
    site: &SiteDefaults,
) -> LaunchResult<Vec<RenderedScript>> {
    if batch.is_empty() {
        return Err(LaunchError::Render(
            "cannot render a sweep without tasks".to_string(),
        ));
    }
    // Both end up inside directive lines.
    for task in &batch.tasks {
        let output_dir = task.output_dir.to_string_lossy();
        if task.job_name.contains(['\n', '\r']) || output_dir.contains(['\n', '\r']) {
            return Err(LaunchError::Render(format!(
                "task {} has a line break in its job name or output directory",
                task.index
            )));
        }
    }

    match &resolved.mode {
        LaunchMode::Individual { job_name } => Ok(batch
            .tasks
            .iter()
            .map(|task| generate_job_script(resolved, batch, task, job_name.as_deref(), site))
            .collect()),
        LaunchMode::Array { name } => {
            Ok(vec![generate_array_script(resolved, batch, name, site)])
        }
    }
}

/// Generate the script of one individual job.
fn generate_job_script(
    resolved: &ResolvedLaunch,
    batch: &SubmissionBatch,
    task: &TaskInvocation,
    name_override: Option<&str>,
    site: &SiteDefaults,
) -> RenderedScript {
    let names = &site.names;
    let job_name = name_override.unwrap_or(&task.job_name);
    let out_dir = task.output_dir.display();
    let stdout_log = format!("{out_dir}/{job_name}_%j.out");
    let stderr_log = format!("{out_dir}/{job_name}_%j.err");

    let mut script = String::new();
    script.push_str("#!/bin/bash\n\n");
    script.push_str("# SLURM parameters\n");
    push_directive(&mut script, site, &Directive::value(&names.job_name, job_name));
    push_directive(&mut script, site, &Directive::value(&names.output, &stdout_log));
    push_directive(&mut script, site, &Directive::value(&names.error, &stderr_log));
    push_common_directives(&mut script, resolved, site);

    push_setup(&mut script, &resolved.setup);

    script.push_str("\n# Run the command\n");
    script.push_str(&batch.command_line(task));
    script.push('\n');

    RenderedScript {
        path: task.output_dir.join(format!("{}.sh", task.job_name)),
        text: script,
        task: Some(task.index),
        task_table: None,
        stdout_log,
        stderr_log,
    }
}

/// Generate the single script of a job array.
fn generate_array_script(
    resolved: &ResolvedLaunch,
    batch: &SubmissionBatch,
    array_name: &str,
    site: &SiteDefaults,
) -> RenderedScript {
    let names = &site.names;
    let table_path = array_table_path(&batch.output_root, array_name);
    let task_var = &site.array_task_id_var;
    let job_var = &site.array_job_id_var;
    let log_stem = format!("$OUTPUT_DIR/${{JOB_NAME}}_${{{job_var}}}_${{{task_var}}}");
    let stdout_log = format!("{log_stem}.out");
    let stderr_log = format!("{log_stem}.err");

    let mut script = String::new();
    script.push_str("#!/bin/bash\n\n");
    script.push_str("# SLURM parameters\n");
    push_directive(&mut script, site, &Directive::value(&names.job_name, array_name));
    // Tasks redirect their own output below.
    push_directive(&mut script, site, &Directive::value(&names.output, "/dev/null"));
    push_directive(&mut script, site, &Directive::value(&names.error, "/dev/null"));
    push_common_directives(&mut script, resolved, site);
    push_directive(
        &mut script,
        site,
        &Directive::value(&names.array, format!("0-{}", batch.len() - 1)),
    );

    script.push_str("\n# Get task-specific configuration\n");
    script.push_str(&format!(
        "if ! TASK_VARS=$({} {} \"${task_var}\"); then\n",
        site.task_lookup_command,
        shell_escape(&table_path.to_string_lossy()),
    ));
    script.push_str(&format!(
        "    echo \"Error: Could not retrieve configuration for task ${task_var}\" >&2\n"
    ));
    script.push_str("    exit 1\n");
    script.push_str("fi\n");
    script.push_str("eval \"$TASK_VARS\"\n");

    script.push_str("\n# Create output directory if it doesn't exist\n");
    script.push_str("mkdir -p \"$OUTPUT_DIR\"\n");

    script.push_str("\n# Redirect all output to the task-specific files\n");
    script.push_str(&format!("exec > \"{stdout_log}\"\n"));
    script.push_str(&format!("exec 2> \"{stderr_log}\"\n"));

    push_setup(&mut script, &resolved.setup);

    // Parse the arguments like the individual invocation line would be.
    script.push_str("\n# Run the command\n");
    script.push_str("eval \"set -- $TASK_ARGS\"\n");
    script.push_str(&crate::batch::join_command(&batch.program, "\"$@\""));
    script.push('\n');

    RenderedScript {
        path: array_script_path(&batch.output_root, array_name),
        text: script,
        task: None,
        task_table: Some(TaskTableArtifact {
            path: table_path,
            table: ArrayTaskTable::from_batch(batch),
        }),
        stdout_log,
        stderr_log,
    }
}

/// `<root>/<array_name>_array.sh`
pub fn array_script_path(root: &Path, array_name: &str) -> PathBuf {
    root.join(format!("{array_name}_array.sh"))
}

/// `<root>/<array_name>_array_config.json`
pub fn array_table_path(root: &Path, array_name: &str) -> PathBuf {
    root.join(format!("{array_name}_array_config.json"))
}

fn push_common_directives(script: &mut String, resolved: &ResolvedLaunch, site: &SiteDefaults) {
    push_directive(
        script,
        site,
        &Directive::value(&site.names.partition, &resolved.partition),
    );
    for directive in &resolved.directives {
        push_directive(script, site, directive);
    }
}

fn push_setup(script: &mut String, setup: &[String]) {
    if setup.is_empty() {
        return;
    }
    script.push_str("\n# Setup commands\n");
    for line in setup {
        script.push_str(line);
        script.push('\n');
    }
}

fn push_directive(script: &mut String, site: &SiteDefaults, directive: &Directive) {
    script.push_str(&format_directive(&site.directive_prefix, directive));
    script.push('\n');
}

/// Format a directive line, quoting the value if needed.
pub fn format_directive(prefix: &str, directive: &Directive) -> String {
    match &directive.value {
        DirectiveValue::Flag => format!("{prefix} --{}", directive.name),
        DirectiveValue::Value(value) => {
            format!("{prefix} --{}={}", directive.name, shell_escape(value))
        }
    }
}

/// Minimal POSIX shell escaping (single quotes).
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:@%+=,".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}
