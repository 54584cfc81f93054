//! sbatch-sweep Command-Line Interface
//!
//! Submits a parameter sweep described in a YAML file to SLURM, as
//! individual jobs or as a single job array.
//!
//! ```text
//! sbatch-sweep launch -c sweep.yaml
//! sbatch-sweep render -c sweep.yaml
//! sbatch-sweep task-env multirun/lr_array_config.json 3
//! ```

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{launch, render, task_env};

/// sbatch-sweep - submit parameter sweeps to SLURM
#[derive(Parser)]
#[command(name = "sbatch-sweep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit every task of a sweep file
    Launch {
        /// Sweep file (YAML)
        #[arg(short, long)]
        config: String,

        /// Replace the sweep's tasks with one argument string per line
        #[arg(long)]
        tasks_file: Option<String>,

        /// Write scripts but do not call sbatch
        #[arg(long)]
        dry_run: bool,
    },

    /// Write the scripts of a sweep file without submitting
    Render {
        /// Sweep file (YAML)
        #[arg(short, long)]
        config: String,

        /// Replace the sweep's tasks with one argument string per line
        #[arg(long)]
        tasks_file: Option<String>,
    },

    /// Print shell assignments for one task of an array task table
    TaskEnv {
        /// Task table written next to the array script
        table: String,

        /// Array task index
        task_id: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stdout of task-env is eval'd by array scripts
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    let result = match cli.command {
        Commands::Launch {
            config,
            tasks_file,
            dry_run,
        } => launch::execute(&config, tasks_file.as_deref(), dry_run).await,

        Commands::Render { config, tasks_file } => {
            render::execute(&config, tasks_file.as_deref()).await
        }

        Commands::TaskEnv { table, task_id } => task_env::execute(&table, task_id),
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_launch() {
        let cli = Cli::try_parse_from(["sbatch-sweep", "launch", "-c", "sweep.yaml"]).unwrap();
        assert_eq!(cli.verbose, 0);
        match cli.command {
            Commands::Launch {
                config,
                tasks_file,
                dry_run,
            } => {
                assert_eq!(config, "sweep.yaml");
                assert!(tasks_file.is_none());
                assert!(!dry_run);
            }
            _ => panic!("expected Launch"),
        }
    }

    #[test]
    fn test_parse_launch_all_flags() {
        let cli = Cli::try_parse_from([
            "sbatch-sweep",
            "-vv",
            "launch",
            "--config",
            "sweep.yaml",
            "--tasks-file",
            "tasks.txt",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Launch {
                tasks_file,
                dry_run,
                ..
            } => {
                assert_eq!(tasks_file.as_deref(), Some("tasks.txt"));
                assert!(dry_run);
            }
            _ => panic!("expected Launch"),
        }
    }

    #[test]
    fn test_parse_launch_requires_config() {
        assert!(Cli::try_parse_from(["sbatch-sweep", "launch"]).is_err());
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from(["sbatch-sweep", "render", "-c", "s.yaml", "-v"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Commands::Render { .. }));
    }

    #[test]
    fn test_parse_task_env() {
        let cli = Cli::try_parse_from(["sbatch-sweep", "task-env", "table.json", "3"]).unwrap();
        match cli.command {
            Commands::TaskEnv { table, task_id } => {
                assert_eq!(table, "table.json");
                assert_eq!(task_id, 3);
            }
            _ => panic!("expected TaskEnv"),
        }
    }

    #[test]
    fn test_parse_task_env_rejects_negative_index() {
        assert!(Cli::try_parse_from(["sbatch-sweep", "task-env", "table.json", "-1"]).is_err());
    }
}
