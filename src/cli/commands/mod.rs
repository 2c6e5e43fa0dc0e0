//! CLI parser and dispatch to command-specific modules.

mod history;
mod import;
mod init;
mod platforms;
mod scrape;
mod stats;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "streamtally")]
#[command(about = "Collect and tally streaming watch history")]
#[command(version)]
pub struct Cli {
    /// Config file (default: discovered streamtally.{toml,yaml,json})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and seed known platforms
    Init,

    /// Harvest watch history from one or more platforms
    Scrape {
        /// Platforms to scrape (netflix, amazon, youtube_tv), or use --all
        platforms: Vec<String>,
        /// Scrape every platform with a driver
        #[arg(short, long)]
        all: bool,
        /// Cap items per platform (scraper.test_limit)
        #[arg(long)]
        test: bool,
        /// Show the browser window
        #[arg(long)]
        show_browser: bool,
    },

    /// Import a CSV watch-history export
    Import {
        /// CSV file with a header row and (title, date) rows
        file: PathBuf,
        /// Platform the rows belong to
        #[arg(short, long, default_value = "Netflix")]
        platform: String,
    },

    /// Show the latest run per platform
    Status,

    /// Show viewing totals per platform
    Stats {
        /// Window size in days
        #[arg(short, long, default_value = "30")]
        days: i64,
    },

    /// List recent history for a platform
    History {
        /// Platform name (e.g., "Netflix")
        platform: String,
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// List platforms, or enable/disable one
    Platforms {
        #[command(subcommand)]
        command: Option<PlatformCommands>,
    },
}

#[derive(Subcommand)]
enum PlatformCommands {
    /// Include a platform in stats
    Enable { name: String },
    /// Exclude a platform from stats
    Disable { name: String },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .await
            .map_err(anyhow::Error::msg)?,
        None => Config::load().await,
    };
    let settings = config.settings();

    match cli.command {
        Commands::Init => init::cmd_init(&settings, &config).await,
        Commands::Scrape {
            platforms,
            all,
            test,
            show_browser,
        } => {
            let mut config = config;
            config.scraper.test_mode |= test;
            config.scraper.headless &= !show_browser;
            scrape::cmd_scrape(&settings, &config, &platforms, all).await
        }
        Commands::Import { file, platform } => {
            import::cmd_import(&settings, &config, &file, &platform).await
        }
        Commands::Status => status::cmd_status(&settings).await,
        Commands::Stats { days } => stats::cmd_stats(&settings, days).await,
        Commands::History { platform, limit } => {
            history::cmd_history(&settings, &platform, limit).await
        }
        Commands::Platforms { command } => match command {
            None => platforms::cmd_platforms_list(&settings).await,
            Some(PlatformCommands::Enable { name }) => {
                platforms::cmd_platform_set_enabled(&settings, &name, true).await
            }
            Some(PlatformCommands::Disable { name }) => {
                platforms::cmd_platform_set_enabled(&settings, &name, false).await
            }
        },
    }
}
