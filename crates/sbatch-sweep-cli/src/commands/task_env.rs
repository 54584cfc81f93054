//! Task lookup used by array scripts at run time.
//!
//! Prints `TASK_ARGS`, `JOB_NAME` and `OUTPUT_DIR` assignments for one task of
//! an array task table. Nothing else may go to stdout: the array script
//! `eval`s it.

use anyhow::{Context, Result, anyhow};

use sbatch_sweep::ArrayTaskTable;

/// Execute the task-env command.
pub fn execute(table: &str, task_id: usize) -> Result<()> {
    print!("{}", lookup(table, task_id)?);
    Ok(())
}

fn lookup(table: &str, task_id: usize) -> Result<String> {
    let json = std::fs::read_to_string(table)
        .with_context(|| format!("Failed to read task table: {table}"))?;
    let table_data =
        ArrayTaskTable::from_json(&json).with_context(|| format!("Invalid task table: {table}"))?;

    let entry = table_data.get(task_id).ok_or_else(|| {
        anyhow!(
            "Task {task_id} not found in {table} ({} tasks)",
            table_data.len()
        )
    })?;
    Ok(entry.shell_assignments())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbatch_sweep::SubmissionBatch;

    fn write_table(dir: &std::path::Path) -> String {
        let batch = SubmissionBatch::new("run", dir, "job", ["a=1", "b='x y'"]);
        let path = dir.join("table.json");
        std::fs::write(&path, ArrayTaskTable::from_batch(&batch).to_json().unwrap()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_lookup_prints_assignments() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(dir.path());

        let out = lookup(&table, 0).unwrap();
        assert!(out.starts_with("TASK_ARGS=a=1\nJOB_NAME=job\nOUTPUT_DIR="));

        let out = lookup(&table, 1).unwrap();
        assert!(out.contains("TASK_ARGS='b='\\''x y'\\'''\n"));
    }

    #[test]
    fn test_lookup_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let table = write_table(dir.path());

        let err = lookup(&table, 2).unwrap_err();
        assert!(err.to_string().contains("Task 2 not found"));
    }

    #[test]
    fn test_lookup_missing_table() {
        assert!(lookup("/nonexistent/table.json", 0).is_err());
    }
}
