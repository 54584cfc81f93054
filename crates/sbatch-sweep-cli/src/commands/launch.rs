//! Launch command implementation.
//!
//! Submits every task of a sweep file to SLURM, either as individual jobs or
//! as one job array.

use anyhow::{Result, bail};
use console::style;

use super::common::{create_launcher, load_sweep, print_report};

/// Execute the launch command.
pub async fn execute(config: &str, tasks_file: Option<&str>, dry_run: bool) -> Result<()> {
    let sweep = load_sweep(config, tasks_file)?;
    let batch = sweep.batch()?;

    println!(
        "{} Launching {} tasks of {} into {}",
        style("→").cyan().bold(),
        batch.len(),
        style(&sweep.sweep.program).green(),
        style(batch.output_root.display()).magenta()
    );

    let launcher = create_launcher(&sweep, dry_run)?;
    let report = launcher.launch(&batch).await?;
    print_report(&report);

    if !report.is_success() {
        let failed = report.failure_count();
        match report.first_failure() {
            Some(first) => bail!(
                "{failed} of {} submissions failed; first was task {} ({})",
                batch.len(),
                first.index,
                first.script.display()
            ),
            None => bail!("submission stopped before all tasks were submitted"),
        }
    }

    Ok(())
}
