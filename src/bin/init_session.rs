//! Session initialization binary.
//!
//! Usage: init_session [session_file] [--phone <phone>]

use std::path::PathBuf;

use clap::Parser;
use telegram_scraper::commands::init_session;
use telegram_scraper::config::Paths;

#[derive(Parser)]
#[command(name = "init_session")]
#[command(about = "Log in to Telegram and store the scraper session")]
struct Args {
    /// Session file to create
    session_file: Option<PathBuf>,

    /// Phone number in international format
    #[arg(long, env = "TELEGRAM_PHONE")]
    phone: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let session_file = args
        .session_file
        .unwrap_or_else(|| Paths::default().session_file);

    init_session::run(&session_file, args.phone).await?;
    Ok(())
}
