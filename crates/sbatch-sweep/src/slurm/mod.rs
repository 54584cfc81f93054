//! SLURM script rendering and submission.

mod adapter;
mod parser;
mod templates;

pub use adapter::{SbatchSubmitter, Submitter};
pub use parser::parse_sbatch_output;
pub use templates::{
    ArrayTaskEntry, ArrayTaskTable, LogStream, RenderedScript, TaskTableArtifact,
    array_log_name, array_script_path, array_table_path, format_directive, individual_log_name,
    render, shell_escape,
};
