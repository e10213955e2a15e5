//! Single-channel harvest: resolve, walk recent history, write rows.

use std::io::Write;

use futures::StreamExt;
use tracing::{error, info, info_span, warn, Instrument, Span};

use crate::config::{ChannelRef, MESSAGE_LIMIT};
use crate::media::MediaDownloader;
use crate::metrics;
use crate::output::{MessageRecord, OutputTable};
use crate::source::ChannelSource;

/// Per-channel harvest settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestOptions {
    pub fetch_images: bool,
    pub limit: usize,
    /// Stop once a message id at or below this is reached.
    pub stop_at: Option<i64>,
}

impl HarvestOptions {
    pub fn text() -> Self {
        Self {
            fetch_images: false,
            limit: MESSAGE_LIMIT,
            stop_at: None,
        }
    }

    pub fn images() -> Self {
        Self {
            fetch_images: true,
            ..Self::text()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn stop_at(mut self, last_id: Option<i64>) -> Self {
        self.stop_at = last_id;
        self
    }
}

/// What happened to one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestOutcome {
    /// History walked to the end of the page (or the resume point)
    Harvested {
        title: String,
        rows: usize,
        newest_id: Option<i64>,
        /// Reached the resume point, or history ended before the cap.
        /// False means older unseen messages may remain below the page.
        caught_up: bool,
    },
    /// Iteration failed part way; rows already written stay
    Truncated {
        title: String,
        rows: usize,
        newest_id: Option<i64>,
        reason: String,
    },
    /// Channel could not be resolved; nothing written
    Skipped { reason: String },
}

impl HarvestOutcome {
    pub fn rows(&self) -> usize {
        match self {
            HarvestOutcome::Harvested { rows, .. } | HarvestOutcome::Truncated { rows, .. } => *rows,
            HarvestOutcome::Skipped { .. } => 0,
        }
    }

    /// Highest message id written, for progress tracking.
    pub fn newest_id(&self) -> Option<i64> {
        match self {
            HarvestOutcome::Harvested { newest_id, .. }
            | HarvestOutcome::Truncated { newest_id, .. } => *newest_id,
            HarvestOutcome::Skipped { .. } => None,
        }
    }

    fn status(&self) -> &'static str {
        match self {
            HarvestOutcome::Harvested { .. } => "harvested",
            HarvestOutcome::Truncated { .. } => "truncated",
            HarvestOutcome::Skipped { .. } => "skipped",
        }
    }
}

pub struct ChannelHarvester<'a, S: ChannelSource> {
    source: &'a S,
    downloader: MediaDownloader,
    span: Span,
}

impl<'a, S: ChannelSource> ChannelHarvester<'a, S> {
    pub fn new(source: &'a S, downloader: MediaDownloader, span: Span) -> Self {
        Self {
            source,
            downloader,
            span,
        }
    }

    /// Harvest one channel into `table`. Never fails; see [`HarvestOutcome`].
    pub async fn harvest<W: Write>(
        &self,
        channel: &ChannelRef,
        table: &mut OutputTable<W>,
        options: HarvestOptions,
    ) -> HarvestOutcome {
        let span = info_span!(parent: &self.span, "channel", channel = %channel);
        let outcome = self.harvest_inner(channel, table, options).instrument(span).await;
        metrics::record_channel(outcome.status());
        outcome
    }

    async fn harvest_inner<W: Write>(
        &self,
        channel: &ChannelRef,
        table: &mut OutputTable<W>,
        options: HarvestOptions,
    ) -> HarvestOutcome {
        let resolved = match self.source.resolve(channel.handle()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                error!("Could not get entity for {}: {}", channel, e);
                return HarvestOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        info!("Scraping all history from {}...", channel);

        let kind = if options.fetch_images { "image" } else { "text" };
        let mut rows = 0usize;
        let mut newest_id: Option<i64> = None;
        let mut reached_stop = false;
        let mut messages = self.source.iter_messages(&resolved.entity, options.limit);

        while let Some(item) = messages.next().await {
            let message = match item {
                Ok(message) => message,
                Err(e) => {
                    error!("Error while scraping {}: {}", channel, e);
                    return HarvestOutcome::Truncated {
                        title: resolved.title,
                        rows,
                        newest_id,
                        reason: e.to_string(),
                    };
                }
            };

            if options.stop_at.is_some_and(|last| message.id <= last) {
                info!("Reached previously scraped message {} in {}", message.id, channel);
                reached_stop = true;
                break;
            }

            let media_path = if options.fetch_images {
                self.downloader
                    .fetch(self.source, &message, channel, true)
                    .await
                    .into_path()
            } else {
                None
            };

            let record = MessageRecord {
                channel_title: resolved.title.clone(),
                channel_username: channel.as_str().to_string(),
                id: message.id,
                text: message.text,
                date: message.date,
                media_path,
            };
            if let Err(e) = table.write_row(&record) {
                error!("Error while scraping {}: {}", channel, e);
                return HarvestOutcome::Truncated {
                    title: resolved.title,
                    rows,
                    newest_id,
                    reason: e.to_string(),
                };
            }

            rows += 1;
            newest_id = Some(newest_id.map_or(message.id, |n| n.max(message.id)));
            metrics::record_message(kind);
        }

        let caught_up = reached_stop || rows < options.limit;
        if !caught_up && options.stop_at.is_some() {
            warn!(
                "Hit the {} message cap in {} before reaching the last scraped message",
                options.limit, channel
            );
        }
        info!("Successfully scraped all history from {} ({} messages)", channel, rows);
        HarvestOutcome::Harvested {
            title: resolved.title,
            rows,
            newest_id,
            caught_up,
        }
    }
}
