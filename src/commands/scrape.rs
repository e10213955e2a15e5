//! Scrape command: harvest all configured channels into the CSV table.

use std::path::PathBuf;

use tracing::{info, info_span};

use crate::config::{Credentials, Paths, DEFAULT_CHANNELS_FILE, MESSAGE_LIMIT};
use crate::error::Result;
use crate::scraper::{RunSummary, ScrapeOptions, Scraper};
use crate::session::{get_client, SessionLock};
use crate::source::GrammersSource;

#[derive(Debug, Clone)]
pub struct ScrapeArgs {
    pub channels_file: PathBuf,
    pub paths: Paths,
    pub limit: usize,
    pub resume: bool,
}

impl Default for ScrapeArgs {
    fn default() -> Self {
        Self {
            channels_file: PathBuf::from(DEFAULT_CHANNELS_FILE),
            paths: Paths::default(),
            limit: MESSAGE_LIMIT,
            resume: false,
        }
    }
}

/// Run a full scrape against Telegram.
///
/// Credentials are validated before anything touches the network or disk.
pub async fn run(args: ScrapeArgs) -> Result<RunSummary> {
    let credentials = Credentials::from_env()?;

    let scraper = Scraper::new(
        args.paths.clone(),
        &args.channels_file,
        ScrapeOptions {
            limit: args.limit,
            resume: args.resume,
        },
        info_span!("scraper"),
    );
    let lists = scraper.load_channels();

    let _lock = SessionLock::acquire(args.paths.lock_file())?;
    let client = get_client(&args.paths.session_file, &credentials).await?;
    let source = GrammersSource::new(client.client.clone());

    let summary = scraper.run(&source, &lists).await?;
    info!(
        "Wrote {} rows to {}",
        summary.rows(),
        args.paths.output_csv.display()
    );
    Ok(summary)
}
