//! Run orchestration: channel lists in, CSV table and progress file out.
//!
//! A run moves through `Init → LoadingConfig → OpenOutput → HarvestChannel* →
//! SaveProgress → Done`. Each channel harvest is independently fallible and
//! never aborts the run; every other step is fatal on failure.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, info_span, warn, Span};

use crate::config::{ChannelLists, ChannelRef, Paths, MESSAGE_LIMIT};
use crate::error::Result;
use crate::harvest::{ChannelHarvester, HarvestOptions, HarvestOutcome};
use crate::media::MediaDownloader;
use crate::output::OutputTable;
use crate::progress::{ProgressMap, ProgressStore};
use crate::source::ChannelSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    LoadingConfig,
    OpenOutput,
    HarvestChannel,
    SaveProgress,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "INIT",
            RunState::LoadingConfig => "LOADING_CONFIG",
            RunState::OpenOutput => "OPEN_OUTPUT",
            RunState::HarvestChannel => "HARVEST_CHANNEL",
            RunState::SaveProgress => "SAVE_PROGRESS",
            RunState::Done => "DONE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeOptions {
    /// Per-channel message cap
    pub limit: usize,
    /// Stop at the stored last id and advance it after a full harvest
    pub resume: bool,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            limit: MESSAGE_LIMIT,
            resume: false,
        }
    }
}

/// Outcome of every channel, in processing order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub channels: Vec<(ChannelRef, HarvestOutcome)>,
    pub progress: ProgressMap,
}

impl RunSummary {
    pub fn rows(&self) -> usize {
        self.channels.iter().map(|(_, o)| o.rows()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.channels
            .iter()
            .filter(|(_, o)| matches!(o, HarvestOutcome::Skipped { .. }))
            .count()
    }

    pub fn outcome(&self, channel: &str) -> Option<&HarvestOutcome> {
        self.channels
            .iter()
            .find(|(c, _)| c.as_str() == channel)
            .map(|(_, o)| o)
    }
}

pub struct Scraper {
    paths: Paths,
    channels_file: PathBuf,
    options: ScrapeOptions,
    span: Span,
}

impl Scraper {
    pub fn new<P: AsRef<Path>>(
        paths: Paths,
        channels_file: P,
        options: ScrapeOptions,
        span: Span,
    ) -> Self {
        Self {
            paths,
            channels_file: channels_file.as_ref().to_path_buf(),
            options,
            span,
        }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    fn enter_state(&self, state: RunState) {
        debug!(parent: &self.span, %state, "Run state");
    }

    /// Read the channel lists; missing or invalid config yields empty lists.
    pub fn load_channels(&self) -> ChannelLists {
        let _enter = self.span.enter();
        self.enter_state(RunState::LoadingConfig);
        let lists = ChannelLists::load(&self.channels_file);
        info!(
            "Loaded {} text and {} image channels from {}",
            lists.text_channels.len(),
            lists.image_channels.len(),
            self.channels_file.display()
        );
        lists
    }

    /// Harvest every channel in order, then persist progress.
    pub async fn run<S: ChannelSource>(
        &self,
        source: &S,
        lists: &ChannelLists,
    ) -> Result<RunSummary> {
        self.enter_state(RunState::Init);
        info!(parent: &self.span, "Starting the full history scraping process...");

        let store = ProgressStore::new(
            &self.paths.progress_file,
            info_span!(parent: &self.span, "progress"),
        );
        let mut progress = store.load();

        self.enter_state(RunState::OpenOutput);
        fs::create_dir_all(&self.paths.media_dir)?;
        let mut table = OutputTable::create(&self.paths.output_csv)?;

        let downloader = MediaDownloader::new(
            &self.paths.media_dir,
            info_span!(parent: &self.span, "media"),
        );
        let harvester =
            ChannelHarvester::new(source, downloader, info_span!(parent: &self.span, "harvest"));

        let text = lists
            .text_channels
            .iter()
            .map(|c| (c, HarvestOptions::text()));
        let images = lists
            .image_channels
            .iter()
            .map(|c| (c, HarvestOptions::images()));

        let mut summary = RunSummary::default();
        for (channel, base) in text.chain(images) {
            self.enter_state(RunState::HarvestChannel);
            let stop_at = if self.options.resume {
                progress.get(channel)
            } else {
                None
            };
            let options = base.with_limit(self.options.limit).stop_at(stop_at);

            let outcome = harvester.harvest(channel, &mut table, options).await;
            if self.options.resume {
                if let HarvestOutcome::Harvested {
                    newest_id: Some(id),
                    caught_up,
                    ..
                } = &outcome
                {
                    // Jumping past an unread gap would lose it for good.
                    if *caught_up || stop_at.is_none() {
                        progress.advance(channel, *id);
                    }
                }
            }
            summary.channels.push((channel.clone(), outcome));
        }
        table.flush()?;

        self.enter_state(RunState::SaveProgress);
        store.save(&progress)?;

        self.enter_state(RunState::Done);
        let skipped = summary.skipped();
        if skipped > 0 {
            warn!(parent: &self.span, "{} channels skipped", skipped);
        }
        info!(
            parent: &self.span,
            "Scraping finished: {} rows from {} channels",
            table.rows(),
            summary.channels.len()
        );

        summary.progress = progress;
        Ok(summary)
    }
}
