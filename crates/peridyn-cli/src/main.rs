//! Peridyn CLI — run, validate and inspect peridynamics jobs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "peridyn")]
#[command(version, about = "Peridyn — parallel bond-based peridynamics")]
struct Cli {
    /// Log solver progress at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job from a config file.
    Simulate {
        /// Path to job config (TOML).
        #[arg(short, long, default_value = "job.toml")]
        config: PathBuf,

        /// Output directory, overriding the one in the config.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a job config without running it.
    Validate {
        /// Path to job config (TOML).
        path: PathBuf,
    },

    /// Decompose the bodies of a job and print the chunk layout.
    Decompose {
        /// Path to job config (TOML).
        #[arg(short, long, default_value = "job.toml")]
        config: PathBuf,
    },

    /// Inspect a chunk snapshot file.
    Inspect {
        /// Path to snapshot file (JSON).
        path: PathBuf,
    },

    /// List the material presets.
    Materials,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let result = match cli.command {
        Commands::Simulate { config, output } => commands::simulate(&config, output),
        Commands::Validate { path } => commands::validate(&path),
        Commands::Decompose { config } => commands::decompose(&config),
        Commands::Inspect { path } => commands::inspect(&path),
        Commands::Materials => commands::materials(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
