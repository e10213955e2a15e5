//! Image attachment classification and download.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn, Instrument, Span};

use crate::config::ChannelRef;
use crate::metrics;
use crate::source::{ChannelSource, SourceMessage};

/// Attachment kind, tagged once at the platform boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind<M> {
    /// No attachment
    None,
    /// Photo attachment
    Photo(M),
    /// Generic document with its declared MIME type
    Document { mime_type: Option<String>, media: M },
    /// Any other attachment (poll, geo, web page, ...)
    Other,
}

impl<M> MediaKind<M> {
    pub fn is_none(&self) -> bool {
        matches!(self, MediaKind::None)
    }
}

/// Image formats the scraper keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

/// Why a message produced no media artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    NoMedia,
    UnsupportedKind,
    UnsupportedMime(Option<String>),
    DownloadFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => f.write_str("image download disabled"),
            SkipReason::NoMedia => f.write_str("no media"),
            SkipReason::UnsupportedKind => f.write_str("unsupported media kind"),
            SkipReason::UnsupportedMime(Some(mime)) => write!(f, "unsupported MIME type {}", mime),
            SkipReason::UnsupportedMime(None) => f.write_str("document without MIME type"),
            SkipReason::DownloadFailed(e) => write!(f, "download failed: {}", e),
        }
    }
}

/// Result of handling one message's attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOutcome {
    Saved(PathBuf),
    NoArtifact(SkipReason),
}

impl MediaOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            MediaOutcome::Saved(path) => Some(path),
            MediaOutcome::NoArtifact(_) => None,
        }
    }

    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            MediaOutcome::Saved(path) => Some(path),
            MediaOutcome::NoArtifact(_) => None,
        }
    }
}

/// Decide whether an attachment is a keepable image.
///
/// Photos are always stored as JPEG whatever their internal encoding.
pub fn classify<M>(kind: &MediaKind<M>) -> Result<(ImageFormat, &M), SkipReason> {
    match kind {
        MediaKind::None => Err(SkipReason::NoMedia),
        MediaKind::Photo(media) => Ok((ImageFormat::Jpeg, media)),
        MediaKind::Document { mime_type, media } => mime_type
            .as_deref()
            .and_then(ImageFormat::from_mime)
            .map(|format| (format, media))
            .ok_or_else(|| SkipReason::UnsupportedMime(mime_type.clone())),
        MediaKind::Other => Err(SkipReason::UnsupportedKind),
    }
}

/// `{handle}_{message_id}.{ext}`
pub fn media_filename(channel: &ChannelRef, message_id: i64, format: ImageFormat) -> String {
    format!("{}_{}.{}", channel.handle(), message_id, format.extension())
}

/// Saves image attachments into a media directory.
pub struct MediaDownloader {
    media_dir: PathBuf,
    span: Span,
}

impl MediaDownloader {
    pub fn new<P: AsRef<Path>>(media_dir: P, span: Span) -> Self {
        Self {
            media_dir: media_dir.as_ref().to_path_buf(),
            span,
        }
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Download the message's image, if it has one and downloads are enabled.
    ///
    /// Failures never propagate; they come back as [`SkipReason::DownloadFailed`].
    pub async fn fetch<S: ChannelSource>(
        &self,
        source: &S,
        message: &SourceMessage<S::Media>,
        channel: &ChannelRef,
        enabled: bool,
    ) -> MediaOutcome {
        if !enabled {
            return MediaOutcome::NoArtifact(SkipReason::Disabled);
        }

        let (format, media) = match classify(&message.media) {
            Ok(found) => found,
            Err(reason) => {
                if !matches!(reason, SkipReason::NoMedia) {
                    metrics::record_media("skipped");
                }
                return MediaOutcome::NoArtifact(reason);
            }
        };

        let path = self
            .media_dir
            .join(media_filename(channel, message.id, format));

        let outcome = async {
            match source.download(media, &path).await {
                Ok(()) => {
                    debug!(
                        "Downloaded {} from message ID {} to {}",
                        format.extension(),
                        message.id,
                        path.display()
                    );
                    metrics::record_media("saved");
                    MediaOutcome::Saved(path)
                }
                Err(e) => {
                    error!("Error downloading media from message ID {}: {}", message.id, e);
                    // Best effort: a partial file must not outlive a failed download.
                    if let Err(rm) = tokio::fs::remove_file(&path).await {
                        if rm.kind() != std::io::ErrorKind::NotFound {
                            warn!("Could not remove partial file {}: {}", path.display(), rm);
                        }
                    }
                    metrics::record_media("failed");
                    MediaOutcome::NoArtifact(SkipReason::DownloadFailed(e.to_string()))
                }
            }
        };
        outcome.instrument(self.span.clone()).await
    }
}
