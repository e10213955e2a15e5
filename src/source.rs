//! Messaging-platform capability surface.
//!
//! The harvester only needs three things from Telegram: resolve a handle,
//! iterate recent history, and download an attachment. [`ChannelSource`]
//! names exactly those, and [`GrammersSource`] implements them on top of a
//! connected grammers [`Client`].

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, LocalBoxStream, StreamExt};
use grammers_client::types::peer::Peer;
use grammers_client::types::{Media, Message};
use grammers_client::Client;

use crate::error::{Error, Result};
use crate::media::MediaKind;

/// A channel resolved by handle.
#[derive(Debug, Clone)]
pub struct ResolvedChannel<E> {
    pub title: String,
    pub entity: E,
}

/// One message as seen by the harvester.
#[derive(Debug, Clone)]
pub struct SourceMessage<M> {
    pub id: i64,
    pub text: Option<String>,
    pub date: DateTime<Utc>,
    pub media: MediaKind<M>,
}

/// Messages of a channel, newest first. An `Err` item ends the stream.
pub type MessageStream<M> = LocalBoxStream<'static, Result<SourceMessage<M>>>;

#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// Platform-side channel object
    type Entity: Send + Sync;
    /// Reference to a downloadable attachment
    type Media: Send + Sync;

    async fn resolve(&self, handle: &str) -> Result<ResolvedChannel<Self::Entity>>;

    fn iter_messages(&self, entity: &Self::Entity, limit: usize) -> MessageStream<Self::Media>;

    async fn download(&self, media: &Self::Media, path: &Path) -> Result<()>;
}

/// [`ChannelSource`] backed by a live grammers client.
#[derive(Clone)]
pub struct GrammersSource {
    client: Client,
}

impl GrammersSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Map a grammers message into the harvester's view, tagging its media once.
fn convert_message(msg: Message) -> SourceMessage<Media> {
    let media = match msg.media() {
        None => MediaKind::None,
        Some(Media::Photo(photo)) => MediaKind::Photo(Media::Photo(photo)),
        Some(Media::Document(document)) => MediaKind::Document {
            mime_type: document.mime_type().map(str::to_string),
            media: Media::Document(document),
        },
        Some(_) => MediaKind::Other,
    };
    let text = msg.text();

    SourceMessage {
        id: i64::from(msg.id()),
        text: if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        },
        date: msg.date(),
        media,
    }
}

#[async_trait]
impl ChannelSource for GrammersSource {
    type Entity = Peer;
    type Media = Media;

    async fn resolve(&self, handle: &str) -> Result<ResolvedChannel<Peer>> {
        let peer = self
            .client
            .resolve_username(handle)
            .await
            .map_err(|e| Error::TelegramError(e.to_string()))?
            .ok_or_else(|| Error::ChannelNotFound(format!("Username @{} not found", handle)))?;

        let title = peer.name().unwrap_or(handle).to_string();
        Ok(ResolvedChannel {
            title,
            entity: peer,
        })
    }

    fn iter_messages(&self, entity: &Peer, limit: usize) -> MessageStream<Media> {
        let iter = self.client.iter_messages(entity).limit(limit);

        stream::unfold(Some(iter), |state| async move {
            let mut iter = state?;
            match iter.next().await {
                Ok(Some(msg)) => Some((Ok(convert_message(msg)), Some(iter))),
                Ok(None) => None,
                Err(e) => Some((Err(Error::TelegramError(e.to_string())), None)),
            }
        })
        .boxed_local()
    }

    async fn download(&self, media: &Media, path: &Path) -> Result<()> {
        self.client
            .download_media(media, path)
            .await
            .map_err(|e| Error::DownloadError(e.to_string()))
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod memory {
    //! In-memory [`ChannelSource`] for tests and benches.

    use std::collections::HashMap;
    use std::path::Path;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use futures::stream::{self, StreamExt};

    use super::{ChannelSource, MessageStream, ResolvedChannel, SourceMessage};
    use crate::error::{Error, Result};
    use crate::media::MediaKind;

    /// Attachment payload held in memory.
    ///
    /// A failing payload still writes `bytes` before erroring, like a
    /// transfer cut off part way.
    #[derive(Debug, Clone)]
    pub struct MemoryMedia {
        pub bytes: Vec<u8>,
        pub fail: bool,
    }

    impl MemoryMedia {
        pub fn bytes(bytes: &[u8]) -> Self {
            Self {
                bytes: bytes.to_vec(),
                fail: false,
            }
        }

        /// Media whose download always fails.
        pub fn broken() -> Self {
            Self {
                bytes: Vec::new(),
                fail: true,
            }
        }

        /// Media whose download writes `bytes` and then fails.
        pub fn interrupted(bytes: &[u8]) -> Self {
            Self {
                bytes: bytes.to_vec(),
                fail: true,
            }
        }
    }

    #[derive(Debug, Clone, Default)]
    struct MemoryChannel {
        title: String,
        messages: Vec<SourceMessage<MemoryMedia>>,
        fail_after: Option<usize>,
    }

    /// Channels keyed by handle; messages are served in insertion order.
    #[derive(Debug, Clone, Default)]
    pub struct MemorySource {
        channels: HashMap<String, MemoryChannel>,
    }

    impl MemorySource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_channel(mut self, handle: &str, title: &str) -> Self {
            self.channels.insert(
                handle.to_string(),
                MemoryChannel {
                    title: title.to_string(),
                    ..Default::default()
                },
            );
            self
        }

        /// Append a message to `handle`; the channel must be registered first.
        pub fn with_message(mut self, handle: &str, message: SourceMessage<MemoryMedia>) -> Self {
            if let Some(channel) = self.channels.get_mut(handle) {
                channel.messages.push(message);
            }
            self
        }

        /// Make history iteration fail after `count` messages.
        pub fn failing_after(mut self, handle: &str, count: usize) -> Self {
            if let Some(channel) = self.channels.get_mut(handle) {
                channel.fail_after = Some(count);
            }
            self
        }
    }

    /// Fixed timestamp for message `id`, stable across runs.
    pub fn fixed_date(id: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
            + chrono::Duration::minutes(id)
    }

    pub fn text_message(id: i64, text: &str) -> SourceMessage<MemoryMedia> {
        SourceMessage {
            id,
            text: Some(text.to_string()),
            date: fixed_date(id),
            media: MediaKind::None,
        }
    }

    pub fn media_message(
        id: i64,
        text: Option<&str>,
        media: MediaKind<MemoryMedia>,
    ) -> SourceMessage<MemoryMedia> {
        SourceMessage {
            id,
            text: text.map(str::to_string),
            date: fixed_date(id),
            media,
        }
    }

    #[async_trait]
    impl ChannelSource for MemorySource {
        type Entity = String;
        type Media = MemoryMedia;

        async fn resolve(&self, handle: &str) -> Result<ResolvedChannel<String>> {
            self.channels
                .get(handle)
                .map(|channel| ResolvedChannel {
                    title: channel.title.clone(),
                    entity: handle.to_string(),
                })
                .ok_or_else(|| Error::ChannelNotFound(format!("Username @{} not found", handle)))
        }

        fn iter_messages(&self, entity: &String, limit: usize) -> MessageStream<MemoryMedia> {
            let Some(channel) = self.channels.get(entity) else {
                return stream::empty().boxed_local();
            };

            let mut items: Vec<Result<SourceMessage<MemoryMedia>>> = channel
                .messages
                .iter()
                .take(channel.fail_after.unwrap_or(usize::MAX).min(limit))
                .cloned()
                .map(Ok)
                .collect();
            if channel.fail_after.is_some_and(|n| n < limit) {
                items.push(Err(Error::TelegramError("connection reset".to_string())));
            }
            stream::iter(items).boxed_local()
        }

        async fn download(&self, media: &MemoryMedia, path: &Path) -> Result<()> {
            if !media.bytes.is_empty() || !media.fail {
                tokio::fs::write(path, &media.bytes).await?;
            }
            if media.fail {
                return Err(Error::DownloadError("file reference expired".to_string()));
            }
            Ok(())
        }
    }
}
