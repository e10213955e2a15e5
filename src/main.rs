//! Telegram Scraper CLI - main entry point

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use telegram_scraper::commands::{self, ScrapeArgs};
use telegram_scraper::config::{
    Credentials, Paths, DEFAULT_CHANNELS_FILE, DEFAULT_DATA_DIR, MESSAGE_LIMIT,
};
use telegram_scraper::{logging, metrics};
use tracing::warn;

#[derive(Parser)]
#[command(name = "telegram_scraper")]
#[command(about = "Incremental Telegram channel scraper", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR", global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Where run artifacts live.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Base directory for output, media, progress, log and session files
    #[arg(long, env = "SCRAPER_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Session file (default: <data-dir>/scraping_session.session)
    #[arg(long)]
    session: Option<PathBuf>,

    /// Log file (default: <data-dir>/scraper.log)
    #[arg(long, env = "SCRAPER_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl DataArgs {
    fn paths(&self) -> Paths {
        let mut paths = Paths::in_dir(&self.data_dir);
        if let Some(session) = &self.session {
            paths.session_file = session.clone();
        }
        if let Some(log_file) = &self.log_file {
            paths.log_file = log_file.clone();
        }
        paths
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest all configured channels into the CSV table
    Scrape {
        #[command(flatten)]
        data: DataArgs,

        /// Channel list file (JSON with text_channels / image_channels)
        #[arg(short, long, default_value = DEFAULT_CHANNELS_FILE)]
        channels: PathBuf,

        /// Output CSV (default: <data-dir>/telegram_data.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Media directory (default: <data-dir>/photos)
        #[arg(long)]
        media_dir: Option<PathBuf>,

        /// Progress file (default: <data-dir>/last_message_ids.json)
        #[arg(long)]
        progress_file: Option<PathBuf>,

        /// Maximum number of messages fetched per channel
        #[arg(short, long, default_value_t = MESSAGE_LIMIT)]
        limit: usize,

        /// Stop at the last scraped message and advance progress afterwards
        #[arg(long, default_value_t = false)]
        resume: bool,
    },

    /// Initialize a new session (interactive login)
    InitSession {
        #[command(flatten)]
        data: DataArgs,

        /// Phone number in international format
        #[arg(long, env = "TELEGRAM_PHONE")]
        phone: Option<String>,
    },
}

impl Commands {
    fn data(&self) -> &DataArgs {
        match self {
            Commands::Scrape { data, .. } | Commands::InitSession { data, .. } => data,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let paths = cli.command.data().paths();

    // A scrape without credentials must leave the data dir untouched,
    // log file included.
    if matches!(cli.command, Commands::Scrape { .. }) {
        Credentials::from_env()?;
    }

    // Initialize logging
    logging::init(Some(&paths.log_file));

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let start = Instant::now();
    let result = execute_command(cli.command, paths).await;
    metrics::record_run_result(start.elapsed(), result.is_ok());

    result
}

async fn execute_command(command: Commands, mut paths: Paths) -> anyhow::Result<()> {
    match command {
        Commands::Scrape {
            channels,
            output,
            media_dir,
            progress_file,
            limit,
            resume,
            ..
        } => {
            if let Some(output) = output {
                paths.output_csv = output;
            }
            if let Some(media_dir) = media_dir {
                paths.media_dir = media_dir;
            }
            if let Some(progress_file) = progress_file {
                paths.progress_file = progress_file;
            }

            let summary = commands::scrape_run(ScrapeArgs {
                channels_file: channels,
                paths,
                limit,
                resume,
            })
            .await?;
            println!(
                "Scraped {} messages from {} channels ({} skipped)",
                summary.rows(),
                summary.channels.len(),
                summary.skipped()
            );
        }
        Commands::InitSession { phone, .. } => {
            commands::init_session::run(&paths.session_file, phone).await?;
        }
    }

    Ok(())
}
