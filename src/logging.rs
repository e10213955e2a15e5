//! tracing subscriber setup shared by the binaries.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "telegram_scraper=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Log to stdout and, when given and writable, append to `log_file` as well.
pub fn init(log_file: Option<&Path>) {
    let file = log_file.and_then(|path| {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let _ = fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Cannot open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_ansi(false)
            .with_writer(std::io::stdout.and(Mutex::new(file)))
            .init(),
        None => tracing_subscriber::fmt().with_env_filter(env_filter()).init(),
    }
}
