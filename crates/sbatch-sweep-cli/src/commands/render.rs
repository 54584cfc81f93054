//! Render command implementation.

use anyhow::Result;
use console::style;

use super::common::{create_launcher, load_sweep, print_report};

/// Write scripts for a sweep file without submitting them.
pub async fn execute(config: &str, tasks_file: Option<&str>) -> Result<()> {
    let sweep = load_sweep(config, tasks_file)?;
    let batch = sweep.batch()?;

    println!(
        "{} Rendering {} tasks into {}",
        style("→").cyan().bold(),
        batch.len(),
        style(batch.output_root.display()).magenta()
    );

    let report = create_launcher(&sweep, true)?.launch(&batch).await?;
    print_report(&report);

    Ok(())
}
