//! SLURM launcher for parameter sweeps
//!
//! This crate turns an ordered list of argument strings, one per point of a
//! parameter sweep, into `sbatch` submissions. It is a thin adapter: SLURM
//! does the queuing, allocation and execution.
//!
//! # Overview
//!
//! 1. **Resolve**: a partially specified [`LaunchSpec`] is checked against the
//!    [`SiteDefaults`] table and becomes a [`ResolvedLaunch`]
//! 2. **Render**: scripts are generated from the resolved options and the
//!    [`SubmissionBatch`]
//! 3. **Submit**: scripts are written, flushed and handed to `sbatch`
//!
//! # Modes
//!
//! | Mode | Trigger | Scripts | Job ids |
//! |------|---------|---------|---------|
//! | Individual | no `job_array_name` | `<task_dir>/<job_name>.sh` per task | one per task |
//! | Array | `job_array_name` set | `<root>/<name>_array.sh` + `<name>_array_config.json` | one, `<id>_<task>` per task |
//!
//! # Example
//!
//! ```ignore
//! use sbatch_sweep::{LaunchSpec, Launcher, SiteDefaults, SubmissionBatch};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let spec = LaunchSpec::new()
//!         .with_partition("gpu")
//!         .with_job_array_name("lr_sweep")
//!         .with_gpus(1);
//!
//!     let batch = SubmissionBatch::new(
//!         "python train.py",
//!         "multirun/lr_sweep",
//!         "train",
//!         ["lr=0.1", "lr=0.01", "lr=0.001"],
//!     );
//!
//!     let report = Launcher::new(spec, SiteDefaults::default())
//!         .launch(&batch)
//!         .await?;
//!     println!("Submitted: {:?}", report.job_ids());
//!
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod error;
pub mod launch;
pub mod launcher;
pub mod resolve;
pub mod site;
pub mod slurm;

// Re-exports
pub use batch::{SubmissionBatch, TaskInvocation};
pub use error::{LaunchError, LaunchResult};
pub use launch::{
    AdditionalDirectives, Directive, DirectiveValue, GpuRequest, LaunchMode, LaunchSpec,
    ResolvedLaunch,
};
pub use launcher::{
    ArraySubmission, LaunchOptions, LaunchReport, Launcher, TaskOutcome, TaskReport,
};
pub use resolve::resolve;
pub use site::{DirectiveNames, SiteDefaults};
pub use slurm::{
    ArrayTaskEntry, ArrayTaskTable, LogStream, RenderedScript, SbatchSubmitter, Submitter,
    render,
};
