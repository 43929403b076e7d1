//! harvest CLI entry point

use clap::{Parser, Subcommand};
use harvest::{
    commands::{
        cmd_check, cmd_init_db, cmd_run, cmd_status, print_check, print_init_db,
        print_run_summary, print_status, RunOptions,
    },
    config::{default_config_file, Config},
    error::Result,
    logging,
};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(version, about = "Scheduled scraper that persists records to CSV and SQLite", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scrape cycles on the configured schedule
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        /// Stop after this many cycles
        #[arg(long)]
        max_iterations: Option<u64>,

        /// Seconds between cycle starts
        #[arg(long, conflicts_with = "once")]
        interval: Option<u64>,

        /// Query substituted into source endpoints
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Check whether robots.txt allows fetching a URL
    Check {
        /// URL to check
        url: String,
    },

    /// Create the record table if it does not exist
    InitDb,

    /// Show configured sources and stored row counts
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_config_file()));
    let config = Config::load(&config_path)?;

    let _log_guard = logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Run {
            once,
            max_iterations,
            interval,
            query,
        } => {
            let options = RunOptions {
                once,
                interval_secs: interval,
                max_iterations,
                query,
            };
            let summary = cmd_run(&config, options).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_run_summary(&summary);
            }
        }

        Commands::Check { url } => {
            let result = cmd_check(&config, &url).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_check(&result);
            }
        }

        Commands::InitDb => {
            let info = cmd_init_db(&config).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_init_db(&info);
            }
        }

        Commands::Status => {
            let status = cmd_status(&config).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}
