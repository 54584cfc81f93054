//! Sweep tasks and the batch that groups them.

use std::path::{Path, PathBuf};

/// One point of the sweep: the arguments passed to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInvocation {
    /// Position in the sweep, 0-based.
    pub index: usize,

    /// Name used for the script file and, unless overridden, the job.
    pub job_name: String,

    /// Working/log directory of this task.
    pub output_dir: PathBuf,

    /// Parameter overrides, joined as they appear on the command line.
    pub arguments: String,
}

/// All tasks of one launcher activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionBatch {
    /// Application command every task runs, e.g. `python train.py`.
    pub program: String,

    /// Sweep output root. Array artifacts land here.
    pub output_root: PathBuf,

    pub tasks: Vec<TaskInvocation>,
}

impl SubmissionBatch {
    /// Build a batch from argument strings in sweep order.
    ///
    /// Task `i` gets `job_name` and the output directory `<output_root>/<i>`.
    pub fn new<I, S>(
        program: impl Into<String>,
        output_root: impl AsRef<Path>,
        job_name: &str,
        arguments: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let output_root = output_root.as_ref().to_path_buf();
        let tasks = arguments
            .into_iter()
            .enumerate()
            .map(|(index, arguments)| TaskInvocation {
                index,
                job_name: job_name.to_string(),
                output_dir: output_root.join(index.to_string()),
                arguments: arguments.into(),
            })
            .collect();

        Self {
            program: program.into(),
            output_root,
            tasks,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The command line a task runs.
    pub fn command_line(&self, task: &TaskInvocation) -> String {
        join_command(&self.program, &task.arguments)
    }
}

pub(crate) fn join_command(program: &str, arguments: &str) -> String {
    match (program.trim(), arguments.trim()) {
        ("", args) => args.to_string(),
        (program, "") => program.to_string(),
        (program, args) => format!("{program} {args}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_preserves_order_and_duplicates() {
        let batch = SubmissionBatch::new(
            "python train.py",
            "/scratch/sweep",
            "train",
            ["--lr=0.1", "--lr=0.01", "--lr=0.1"],
        );

        assert_eq!(batch.len(), 3);
        let args: Vec<&str> = batch.tasks.iter().map(|t| t.arguments.as_str()).collect();
        assert_eq!(args, vec!["--lr=0.1", "--lr=0.01", "--lr=0.1"]);
        assert_eq!(batch.tasks[2].index, 2);
        assert_eq!(batch.tasks[2].output_dir, PathBuf::from("/scratch/sweep/2"));
    }

    #[test]
    fn test_command_line() {
        let batch = SubmissionBatch::new("", "/tmp", "job", ["train.py --lr=0.1"]);
        assert_eq!(batch.command_line(&batch.tasks[0]), "train.py --lr=0.1");

        let batch = SubmissionBatch::new("python run.py", "/tmp", "job", [""]);
        assert_eq!(batch.command_line(&batch.tasks[0]), "python run.py");
    }
}
