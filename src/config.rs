//! Configuration for the scraper
//!
//! Channel lists come from a JSON file, credentials from the environment
//! (optionally populated from `.env`), and filesystem locations from CLI flags.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Error, Result};

/// Default constants
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_CHANNELS_FILE: &str = "channel.json";
pub const CSV_FILE: &str = "telegram_data.csv";
pub const MEDIA_DIR: &str = "photos";
pub const PROGRESS_FILE: &str = "last_message_ids.json";
pub const LOG_FILE: &str = "scraper.log";
pub const SESSION_NAME: &str = "scraping_session";

/// Maximum number of most-recent messages fetched per channel
pub const MESSAGE_LIMIT: usize = 500;

/// A channel reference exactly as it appears in the channel list.
///
/// Accepts `name`, `@name` and `https://t.me/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct ChannelRef(String);

impl ChannelRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The reference as configured; this goes into the output table.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bare handle: last `/` segment without a leading `@`.
    pub fn handle(&self) -> &str {
        let last = self
            .0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.0);
        last.strip_prefix('@').unwrap_or(last)
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelRef {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// The two channel lists driving a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelLists {
    /// Harvested without media download
    #[serde(default)]
    pub text_channels: Vec<ChannelRef>,
    /// Harvested with image download enabled
    #[serde(default)]
    pub image_channels: Vec<ChannelRef>,
}

impl ChannelLists {
    /// Load channel lists from a JSON file.
    ///
    /// Never fails: a missing or unparsable file yields empty lists.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Configuration file '{}' not found: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(lists) => lists,
            Err(e) => {
                warn!("Invalid JSON format in '{}': {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text_channels.is_empty() && self.image_channels.is_empty()
    }
}

/// Telegram API credentials
#[derive(Clone)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read `API_ID` and `API_HASH` from the environment, loading `.env` first.
    ///
    /// `TELEGRAM_API_ID` / `TELEGRAM_API_HASH` are accepted as fallbacks.
    pub fn from_env() -> Result<Self> {
        Self::load_dotenv();
        Self::from_vars(
            Self::lookup(&["API_ID", "TELEGRAM_API_ID"]),
            Self::lookup(&["API_HASH", "TELEGRAM_API_HASH"]),
        )
    }

    /// Validate raw credential values.
    pub fn from_vars(api_id: Option<String>, api_hash: Option<String>) -> Result<Self> {
        let api_id = api_id
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::MissingCredential("API_ID".to_string()))?;
        let api_hash = api_hash
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::MissingCredential("API_HASH".to_string()))?;

        let api_id = api_id
            .trim()
            .parse::<i32>()
            .map_err(|e| Error::InvalidCredential(format!("API_ID must be an integer: {}", e)))?;

        Ok(Self {
            api_id,
            api_hash: api_hash.trim().to_string(),
        })
    }

    fn lookup(keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|v| !v.trim().is_empty())
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        // Try to load from current directory first, then parent
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }
}

/// Filesystem locations used by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub output_csv: PathBuf,
    pub media_dir: PathBuf,
    pub progress_file: PathBuf,
    pub log_file: PathBuf,
    pub session_file: PathBuf,
}

impl Paths {
    /// Default layout rooted at `data_dir`.
    pub fn in_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        let dir = data_dir.as_ref();
        Self {
            output_csv: dir.join(CSV_FILE),
            media_dir: dir.join(MEDIA_DIR),
            progress_file: dir.join(PROGRESS_FILE),
            log_file: dir.join(LOG_FILE),
            session_file: dir.join(format!("{}.session", SESSION_NAME)),
        }
    }

    /// Lock file guarding the session, next to it.
    pub fn lock_file(&self) -> PathBuf {
        self.session_file.with_extension("lock")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::in_dir(DEFAULT_DATA_DIR)
    }
}
