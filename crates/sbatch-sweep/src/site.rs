//! Site-specific scheduler names.

use std::path::PathBuf;

/// Directive names for each typed [`crate::LaunchSpec`] field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveNames {
    pub partition: String,
    pub job_name: String,
    pub output: String,
    pub error: String,
    pub array: String,
    pub nodes: String,
    pub ntasks: String,
    pub ntasks_per_node: String,
    pub cpus_per_task: String,
    pub mem: String,
    pub time: String,
    pub gres: String,
    pub account: String,
    pub qos: String,
    pub begin: String,
    pub mail_type: String,
    pub mail_user: String,
}

impl Default for DirectiveNames {
    fn default() -> Self {
        Self {
            partition: "partition".to_string(),
            job_name: "job-name".to_string(),
            output: "output".to_string(),
            error: "error".to_string(),
            array: "array".to_string(),
            nodes: "nodes".to_string(),
            ntasks: "ntasks".to_string(),
            ntasks_per_node: "ntasks-per-node".to_string(),
            cpus_per_task: "cpus-per-task".to_string(),
            mem: "mem".to_string(),
            time: "time".to_string(),
            gres: "gres".to_string(),
            account: "account".to_string(),
            qos: "qos".to_string(),
            begin: "begin".to_string(),
            mail_type: "mail-type".to_string(),
            mail_user: "mail-user".to_string(),
        }
    }
}

impl DirectiveNames {
    /// Directives the launcher writes itself and users may not override.
    pub fn reserved(&self) -> [&str; 4] {
        [&self.job_name, &self.output, &self.error, &self.array]
    }
}

/// Immutable table of site defaults, passed to the resolver and renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDefaults {
    /// Comment prefix that marks a directive line.
    pub directive_prefix: String,

    pub names: DirectiveNames,

    /// Partition used when none is given.
    pub default_partition: String,

    /// Job name used for tasks when the sweep does not name them.
    pub default_job_name: String,

    /// Environment variable holding the array task index at run time.
    pub array_task_id_var: String,

    /// Environment variable holding the array job id at run time.
    pub array_job_id_var: String,

    /// Submission binary.
    pub submit_binary: PathBuf,

    /// Command array scripts run as `<cmd> <table> <index>` to obtain task
    /// variables. It must print `TASK_ARGS`, `JOB_NAME` and `OUTPUT_DIR`
    /// shell assignments.
    pub task_lookup_command: String,
}

impl Default for SiteDefaults {
    fn default() -> Self {
        Self {
            directive_prefix: "#SBATCH".to_string(),
            names: DirectiveNames::default(),
            default_partition: "default".to_string(),
            default_job_name: "job".to_string(),
            array_task_id_var: "SLURM_ARRAY_TASK_ID".to_string(),
            array_job_id_var: "SLURM_ARRAY_JOB_ID".to_string(),
            submit_binary: PathBuf::from("sbatch"),
            task_lookup_command: "sbatch-sweep task-env".to_string(),
        }
    }
}

impl SiteDefaults {
    pub fn with_submit_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.submit_binary = binary.into();
        self
    }

    pub fn with_task_lookup_command(mut self, command: impl Into<String>) -> Self {
        self.task_lookup_command = command.into();
        self
    }

    pub fn with_default_partition(mut self, partition: impl Into<String>) -> Self {
        self.default_partition = partition.into();
        self
    }
}
