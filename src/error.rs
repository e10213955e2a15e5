//! Error types for the Telegram scraper

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Session file not found: {0}")]
    SessionNotFound(String),

    #[error("Session is locked by another process")]
    SessionLocked,

    #[error("Failed to acquire session lock: {0}")]
    LockError(String),

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Download error: {0}")]
    DownloadError(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Authorization required")]
    AuthorizationRequired,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<grammers_client::InvocationError> for Error {
    fn from(err: grammers_client::InvocationError) -> Self {
        Error::TelegramError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Csv(err.to_string())
    }
}
