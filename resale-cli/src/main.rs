//! resale CLI: prepares the model-ready resale dataset from raw extracts.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Unify, featurize, split and export resale transaction extracts.
#[derive(Parser, Debug)]
#[command(name = "resale", version, about, long_about = None)]
struct Cli {
    /// Workspace directory; relative input/output paths resolve against it
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline and publish the dataset
    Run {
        /// Output directory (overrides export.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seed for the random split (overrides split.seed)
        #[arg(long)]
        seed: Option<u64>,

        /// Compute everything but write nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// List the supported source eras and their expected columns
    Eras,
    /// Load and unify a single extract, reporting drops
    Inspect {
        /// CSV file to read
        path: PathBuf,

        /// Era tag of the file (see `resale eras`)
        #[arg(short, long)]
        era: String,

        /// Number of unified rows to print
        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,
    },
    /// Check a published dataset against its manifests
    Verify {
        /// Dataset directory (defaults to export.output_dir)
        dir: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the default configuration to .resale/config.toml
    Init,
    /// Show the effective configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Human-readable stderr plus JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "resale", "resale")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "resale.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref())
}
