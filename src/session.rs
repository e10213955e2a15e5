//! Session management for Telegram client
//!
//! Provides:
//! - File-based session locking to prevent parallel runs
//! - Session file validation
//! - Client creation from stored credentials

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use grammers_client::Client;
use grammers_mtsender::{SenderPool, SenderPoolHandle};
use grammers_session::storages::SqliteSession;

use crate::config::Credentials;
use crate::error::{Error, Result};

/// Session lock guard that ensures exclusive access to the Telegram session.
pub struct SessionLock {
    path: PathBuf,
    lock_file: Option<File>,
}

impl SessionLock {
    /// Acquire an exclusive lock at `path`.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                lock_file: Some(lock_file),
            }),
            Err(_) => {
                eprintln!(
                    r#"
The Telegram session is already in use by another scraper run.

Telegram sessions must be used sequentially; wait for the other run to
finish and try again.
"#
                );
                Err(Error::SessionLocked)
            }
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(ref file) = self.lock_file {
            let _ = file.unlock();
            let _ = fs::remove_file(&self.path);
        }
        self.lock_file = None;
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Check that the session file exists.
pub fn check_session_exists<P: AsRef<Path>>(session_file: P) -> Result<()> {
    let session_file = session_file.as_ref();

    if !session_file.exists() {
        eprintln!(
            r#"
Session file '{}' not found!

To create it:
1. Run: cargo run --bin init_session
2. Enter the code Telegram sends you
"#,
            session_file.display()
        );
        return Err(Error::SessionNotFound(session_file.display().to_string()));
    }

    Ok(())
}

/// Open (or create) the session database.
pub fn open_session<P: AsRef<Path>>(session_file: P) -> Result<Arc<SqliteSession>> {
    let session_file = session_file.as_ref();
    if let Some(parent) = session_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let session = SqliteSession::open(session_file)
        .map_err(|e| Error::SessionNotFound(format!("Failed to open session: {}", e)))?;
    Ok(Arc::new(session))
}

/// Holder for SenderPool components and Client
pub struct TelegramClient {
    pub client: Client,
    pub handle: SenderPoolHandle,
    _runner_handle: tokio::task::JoinHandle<()>,
}

impl TelegramClient {
    /// Create a new TelegramClient from session
    pub async fn connect(session: Arc<SqliteSession>, credentials: &Credentials) -> Result<Self> {
        let pool = SenderPool::new(session, credentials.api_id);

        // Create client from pool (need reference to whole pool)
        let client = Client::new(&pool);

        let SenderPool { runner, handle, .. } = pool;

        // Spawn the runner in background
        let runner_handle = tokio::spawn(async move {
            runner.run().await;
        });

        Ok(Self {
            client,
            handle,
            _runner_handle: runner_handle,
        })
    }
}

// Implement Deref to allow using TelegramClient as &Client
impl std::ops::Deref for TelegramClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Connect with an existing, authorized session.
pub async fn get_client<P: AsRef<Path>>(
    session_file: P,
    credentials: &Credentials,
) -> Result<TelegramClient> {
    check_session_exists(&session_file)?;
    let session = open_session(&session_file)?;
    let client = TelegramClient::connect(session, credentials).await?;

    if !client.is_authorized().await? {
        return Err(Error::AuthorizationRequired);
    }
    Ok(client)
}

/// Connect for initialization (no session check).
pub async fn get_client_for_init<P: AsRef<Path>>(
    session_file: P,
    credentials: &Credentials,
) -> Result<TelegramClient> {
    let session = open_session(session_file)?;
    TelegramClient::connect(session, credentials).await
}
