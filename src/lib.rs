//! Telegram Channel Scraper Library
//!
//! This library provides tools to:
//! - Harvest recent messages from configured public channels into a CSV table
//! - Download photo and PNG/JPEG document attachments for image channels
//! - Track per-channel progress between runs
//! - Expose run metrics over a Prometheus endpoint

pub mod config;
pub mod error;
pub mod harvest;
pub mod logging;
pub mod media;
pub mod metrics;
pub mod output;
pub mod progress;
pub mod scraper;
pub mod session;
pub mod source;

// Re-export common types
pub use config::{ChannelLists, ChannelRef, Credentials, Paths, MESSAGE_LIMIT};
pub use error::{Error, Result};
pub use harvest::{ChannelHarvester, HarvestOptions, HarvestOutcome};
pub use media::{MediaDownloader, MediaKind, MediaOutcome, SkipReason};
pub use output::{MessageRecord, OutputTable};
pub use progress::{ProgressMap, ProgressStore};
pub use scraper::{RunSummary, ScrapeOptions, Scraper};
pub use session::{check_session_exists, get_client, SessionLock};
pub use source::{ChannelSource, GrammersSource, SourceMessage};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
