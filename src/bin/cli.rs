//! Tweet Scraper CLI
//!
//! Refreshes tweets from the search API and prints listing pages as JSON.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tweet_scraper::{app::Scraper, error::Result, models::Config};

/// Tweet Scraper - hashtag and user listings
#[derive(Parser, Debug)]
#[command(
    name = "tweet-scraper",
    version,
    about = "Scrapes tweets by hashtag or username"
)]
struct Cli {
    /// Path to storage directory containing config.toml
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tweets tagged with a hashtag
    Hashtags {
        /// Hashtag without the leading '#'
        hashtag: String,

        /// Page size (default: listing.default_limit)
        #[arg(long)]
        limit: Option<usize>,

        /// Rows to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// List tweets posted by a user
    Users {
        username: String,

        /// Page size (default: listing.default_limit)
        #[arg(long)]
        limit: Option<usize>,

        /// Rows to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Check that the upstream search API answers
    Health,

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    log::debug!("Loaded configuration from {}", config_path.display());

    match cli.command {
        Command::Validate => {
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("Config OK");
        }

        Command::Health => {
            let status = Scraper::from_config(&config)?.health();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Command::Hashtags {
            hashtag,
            limit,
            offset,
        } => {
            let page = Scraper::from_config(&config)?.list_by_hashtag(&hashtag, limit, offset)?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }

        Command::Users {
            username,
            limit,
            offset,
        } => {
            let page = Scraper::from_config(&config)?.list_by_username(&username, limit, offset)?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
    }

    Ok(())
}
