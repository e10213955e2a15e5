//! Tests for scrape command

use std::sync::{LazyLock, Mutex};

use telegram_scraper::commands::{scrape_run, ScrapeArgs};
use telegram_scraper::config::Paths;
use telegram_scraper::Error;

static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

struct EnvGuard {
    key: String,
    original: Option<String>,
}

impl EnvGuard {
    fn set(key: &str, value: &str) -> Self {
        let original = std::env::var(key).ok();
        std::env::set_var(key, value);
        Self {
            key: key.to_string(),
            original,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(value) => std::env::set_var(&self.key, value),
            None => std::env::remove_var(&self.key),
        }
    }
}

fn blank_credentials() -> Vec<EnvGuard> {
    ["API_ID", "API_HASH", "TELEGRAM_API_ID", "TELEGRAM_API_HASH"]
        .iter()
        .map(|k| EnvGuard::set(k, ""))
        .collect()
}

#[tokio::test]
async fn test_scrape_without_credentials_fails_before_any_output() {
    let _lock = ENV_LOCK.lock().unwrap();
    let _env = blank_credentials();

    let dir = tempfile::tempdir().unwrap();
    let channels = dir.path().join("channel.json");
    std::fs::write(&channels, r#"{"text_channels": ["newsfeed"]}"#).unwrap();

    let paths = Paths::in_dir(dir.path().join("data"));
    let result = scrape_run(ScrapeArgs {
        channels_file: channels,
        paths: paths.clone(),
        ..Default::default()
    })
    .await;

    assert!(matches!(result, Err(Error::MissingCredential(_))));
    assert!(!paths.output_csv.exists());
    assert!(!paths.media_dir.exists());
    assert!(!paths.lock_file().exists());
}

#[tokio::test]
async fn test_scrape_with_invalid_api_id_is_fatal() {
    let _lock = ENV_LOCK.lock().unwrap();
    let _env = blank_credentials();
    let _id = EnvGuard::set("API_ID", "not-a-number");
    let _hash = EnvGuard::set("API_HASH", "0123456789abcdef");

    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::in_dir(dir.path());
    let result = scrape_run(ScrapeArgs {
        channels_file: dir.path().join("channel.json"),
        paths: paths.clone(),
        ..Default::default()
    })
    .await;

    assert!(matches!(result, Err(Error::InvalidCredential(_))));
    assert!(!paths.output_csv.exists());
}

#[tokio::test]
async fn test_scrape_without_session_file_is_fatal() {
    let _lock = ENV_LOCK.lock().unwrap();
    let _env = blank_credentials();
    let _id = EnvGuard::set("API_ID", "12345");
    let _hash = EnvGuard::set("API_HASH", "0123456789abcdef");

    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::in_dir(dir.path());
    let result = scrape_run(ScrapeArgs {
        channels_file: dir.path().join("channel.json"),
        paths: paths.clone(),
        ..Default::default()
    })
    .await;

    assert!(matches!(result, Err(Error::SessionNotFound(_))));
    assert!(!paths.output_csv.exists());
}

#[test]
fn test_scrape_args_defaults() {
    let args = ScrapeArgs::default();
    assert_eq!(args.limit, 500);
    assert!(!args.resume);
    assert_eq!(args.channels_file, std::path::PathBuf::from("channel.json"));
}
