//! Shared helpers for CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use sbatch_sweep::slurm::shell_escape;
use sbatch_sweep::{LaunchOptions, LaunchReport, Launcher, SiteDefaults, TaskOutcome};

use crate::config::SweepFile;

/// Load a sweep file, optionally replacing its tasks with a tasks file.
pub fn load_sweep(config: &str, tasks_file: Option<&str>) -> Result<SweepFile> {
    let mut sweep = SweepFile::load(config)?;

    if let Some(path) = tasks_file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tasks file: {path}"))?;
        sweep.replace_tasks(&contents);
    }

    Ok(sweep)
}

/// Array scripts call back into this binary to look up their task.
fn task_lookup_command() -> Result<String> {
    let exe = std::env::current_exe().context("Failed to locate the sbatch-sweep binary")?;
    Ok(format!("{} task-env", shell_escape(&exe.to_string_lossy())))
}

/// Build a launcher for a loaded sweep file.
pub fn create_launcher(sweep: &SweepFile, dry_run: bool) -> Result<Launcher> {
    let site = SiteDefaults::default()
        .with_submit_binary(sweep.submit.sbatch.clone())
        .with_task_lookup_command(task_lookup_command()?);

    let options = LaunchOptions {
        max_parallel: sweep.submit.max_parallel,
        dry_run,
    };

    Ok(Launcher::new(sweep.launcher.clone(), site).with_options(options))
}

/// Print a launch report.
pub fn print_report(report: &LaunchReport) {
    match report {
        LaunchReport::Array(array) => {
            println!("  Script: {}", array.script.display());
            println!("  Task table: {}", array.task_table.display());
            match &array.array_job_id {
                Some(id) => println!(
                    "{} Array {} submitted as job {} ({} tasks)",
                    style("✓").green().bold(),
                    style(&array.name).cyan(),
                    style(id).yellow(),
                    array.task_count
                ),
                None => println!(
                    "{} Array {} rendered ({} tasks, not submitted)",
                    style("○").yellow().bold(),
                    style(&array.name).cyan(),
                    array.task_count
                ),
            }
        }
        LaunchReport::Individual(tasks) => {
            for task in tasks {
                let (marker, detail) = match &task.outcome {
                    TaskOutcome::Submitted { job_id } => {
                        (style("✓").green(), format!("job {job_id}"))
                    }
                    TaskOutcome::Rendered => (style("○").yellow(), "rendered".to_string()),
                    TaskOutcome::Skipped => (style("-").dim(), "skipped".to_string()),
                    TaskOutcome::Failed(e) => (style("✗").red(), e.to_string()),
                };
                println!(
                    "  {} [{}] {} {}",
                    marker,
                    task.index,
                    display_path(&task.script),
                    detail
                );
            }
        }
    }
}

fn display_path(path: &Path) -> String {
    style(path.display()).dim().to_string()
}
