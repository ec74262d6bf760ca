//! Inkloom CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Initialize config directory and default config
//! - `import`   — Load a JSON project bundle into the SQLite store
//! - `assemble` — Build the bounded prompt context for a chapter cursor
//! - `analyze`  — Score a context file
//! - `detect`   — List unregistered character names in a text file
//! - `check`    — Check a text file against the project roster
//! - `status`   — Show the active configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "inkloom",
    about = "Inkloom — context assembly for long-form fiction writing",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Import a project bundle (JSON) into the SQLite store
    Import {
        /// Bundle file holding one project or an array of projects
        bundle: PathBuf,
    },

    /// Assemble the prompt context for a chapter
    Assemble {
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        chapter: String,

        /// Cursor as a character offset (defaults to the end of the chapter)
        #[arg(long)]
        cursor: Option<usize>,

        /// Override the configured token budget
        #[arg(short, long, env = "INKLOOM_MAX_CONTEXT_TOKENS")]
        max_tokens: Option<usize>,

        /// Attach a quality report
        #[arg(short, long)]
        quality: bool,

        /// Print a system/user prompt pair instead of the bare context
        #[arg(long)]
        split: bool,

        /// Print JSON (context + metadata) instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Score an assembled context read from a file
    Analyze {
        file: PathBuf,
    },

    /// List name-like tokens that are not on the roster
    Detect {
        #[arg(short, long)]
        project: String,

        file: PathBuf,
    },

    /// Check a passage for contradictions with the roster
    Check {
        #[arg(short, long)]
        project: String,

        file: PathBuf,
    },

    /// Show the active configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Import { bundle } => commands::import::run(&bundle).await?,
        Commands::Assemble {
            project,
            chapter,
            cursor,
            max_tokens,
            quality,
            split,
            json,
        } => {
            let options = commands::assemble::AssembleOptions {
                project,
                chapter,
                cursor,
                max_tokens,
                quality,
                split,
                json,
            };
            commands::assemble::run(options).await?
        }
        Commands::Analyze { file } => commands::analyze::run(&file).await?,
        Commands::Detect { project, file } => commands::detect::run(&project, &file).await?,
        Commands::Check { project, file } => commands::detect::check(&project, &file).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
