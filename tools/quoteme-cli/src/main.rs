//! QuoteMe CLI — compose captioned images from style files.
//!
//! Usage:
//!   quoteme init [PATH]              Write a starter style file
//!   quoteme export <STYLE>           Render a style file to quote-me.png
//!   quoteme replay <STYLE> <EVENTS>  Apply a recorded drag, then export
//!   quoteme check                    Show fonts and effective configuration

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use quoteme_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "quoteme",
    about = "Place a quote over a background and export it as a PNG",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/quoteme/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that export.
#[derive(Args, Debug, Clone, Default)]
pub struct RenderArgs {
    /// Background image file (overrides the style's image)
    #[arg(long)]
    background: Option<PathBuf>,

    /// Background color token or hex (overrides the style's color)
    #[arg(long)]
    color: Option<String>,

    /// Output pixels per logical pixel
    #[arg(long)]
    scale: Option<f64>,

    /// Output directory
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Fail instead of exporting without a resource that did not load
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter style file
    Init {
        /// Style file to create
        #[arg(default_value = "quote.json")]
        path: PathBuf,

        /// Quote text
        #[arg(short, long, default_value = "Be yourself; everyone else is already taken.")]
        quote: String,

        /// Author name
        #[arg(short, long, default_value = "Oscar Wilde")]
        author: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Render a style file and export it
    Export {
        /// Style file (JSON)
        style: PathBuf,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Apply a recorded pointer-event stream, then export
    Replay {
        /// Style file (JSON)
        style: PathBuf,

        /// Event recording (JSONL)
        events: PathBuf,

        /// Only print the final overlay position
        #[arg(long)]
        no_export: bool,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Show available fonts and the effective configuration
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    quoteme_common::logging::init_logging(&logging);
    tracing::debug!(config = ?cli.config, level = %logging.level, "Configuration loaded");

    match cli.command {
        Commands::Init {
            path,
            quote,
            author,
            force,
        } => commands::init::run(path, quote, author, force),
        Commands::Export { style, render } => commands::export::run(&config, style, render).await,
        Commands::Replay {
            style,
            events,
            no_export,
            render,
        } => commands::replay::run(&config, style, events, no_export, render).await,
        Commands::Check => commands::check::run(&config, cli.config.as_deref()).await,
    }
}
