//! Per-channel scraping position, persisted as pretty JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn, Span};

use crate::config::ChannelRef;
use crate::error::Result;

/// Last processed message id per channel reference.
///
/// A missing key means the channel was never scraped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressMap(BTreeMap<String, i64>);

impl ProgressMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: &ChannelRef) -> Option<i64> {
        self.0.get(channel.as_str()).copied()
    }

    /// Record `id` for `channel`, never moving an existing entry backwards.
    pub fn advance(&mut self, channel: &ChannelRef, id: i64) {
        let entry = self.0.entry(channel.as_str().to_string()).or_insert(id);
        if id > *entry {
            *entry = id;
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reads and writes the [`ProgressMap`] file.
pub struct ProgressStore {
    path: PathBuf,
    span: Span,
}

impl ProgressStore {
    pub fn new<P: AsRef<Path>>(path: P, span: Span) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            span,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the map; absent or corrupt files yield an empty map.
    pub fn load(&self) -> ProgressMap {
        let _enter = self.span.enter();

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => {
                debug!("No progress file at {}, starting fresh", self.path.display());
                return ProgressMap::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                warn!(
                    "Ignoring malformed progress file {}: {}",
                    self.path.display(),
                    e
                );
                ProgressMap::new()
            }
        }
    }

    /// Overwrite the progress file with `map`.
    pub fn save(&self, map: &ProgressMap) -> Result<()> {
        let _enter = self.span.enter();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(map)?;
        fs::write(&self.path, json)?;
        debug!("Saved progress for {} channels", map.len());
        Ok(())
    }
}
