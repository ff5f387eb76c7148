//! Bakery CLI.
//!
//! Command-line shell over the load pipeline and the selection engine:
//!
//! - `bakery load <root>` - run both load stages with a progress bar and
//!   print the closing summary
//! - `bakery tree <root>` - load, then print every project's selection tree
//! - `bakery toggle <root> <plugin> <on|off>` - load, flip one checkbox with
//!   full propagation, and report what changed
//!
//! Logging goes through `tracing` and is controlled with `RUST_LOG`.

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod formatters;

/// Staged loader and selection engine for declarative plugin scripts.
#[derive(Parser, Debug)]
#[command(name = "bakery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Output format for machine-readable consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text (default).
    Text,
    /// JSON on stdout.
    Json,
}

/// Options shared by every command that runs a load.
#[derive(Args, Debug)]
pub struct LoadOpts {
    /// Root directory containing one subdirectory per project
    pub root: PathBuf,

    /// Disable the parse cache for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Cache directory (defaults to the platform cache dir)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Worker pool size (defaults to available parallelism)
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load every project under a root and print the summary
    Load {
        #[command(flatten)]
        opts: LoadOpts,
    },

    /// Load, then print the selection tree of every project
    Tree {
        #[command(flatten)]
        opts: LoadOpts,
    },

    /// Load, toggle one plugin's checkbox, and report the propagation
    Toggle {
        #[command(flatten)]
        opts: LoadOpts,

        /// Plugin path, absolute or relative to the root
        plugin: PathBuf,

        /// New checkbox state
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Quiet by default; the progress bar carries the detail.
            EnvFilter::new("warn")
        }))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Load { opts } => commands::load(&opts).await,
        Commands::Tree { opts } => commands::tree(&opts).await,
        Commands::Toggle {
            opts,
            plugin,
            state,
        } => commands::toggle(&opts, &plugin, state == "on").await,
    }
}
