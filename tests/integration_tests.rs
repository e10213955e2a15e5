//! Integration tests for telegram_scraper library
//!
//! These drive full runs through the orchestrator against an in-memory source.

mod commands;

use std::fs;
use std::path::Path;

use tracing::Span;

use telegram_scraper::config::{ChannelLists, ChannelRef, Paths};
use telegram_scraper::harvest::HarvestOutcome;
use telegram_scraper::media::MediaKind;
use telegram_scraper::scraper::{ScrapeOptions, Scraper};
use telegram_scraper::source::memory::{media_message, text_message, MemoryMedia, MemorySource};

fn scraper(dir: &Path, options: ScrapeOptions) -> Scraper {
    Scraper::new(
        Paths::in_dir(dir.join("data")),
        dir.join("channel.json"),
        options,
        Span::none(),
    )
}

fn write_channels(dir: &Path, json: &str) {
    fs::write(dir.join("channel.json"), json).unwrap();
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

fn newsfeed_and_photoblog() -> MemorySource {
    MemorySource::new()
        .with_channel("newsfeed", "News Feed")
        .with_message("newsfeed", text_message(3, "third"))
        .with_message("newsfeed", text_message(2, "second"))
        .with_message("newsfeed", text_message(1, "first"))
        .with_channel("photoblog", "Photo Blog")
        .with_message(
            "photoblog",
            media_message(
                10,
                Some("sunset"),
                MediaKind::Document {
                    mime_type: Some("image/png".to_string()),
                    media: MemoryMedia::bytes(b"\x89PNG\r\n"),
                },
            ),
        )
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn test_text_and_image_channels_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_channels(
        dir.path(),
        r#"{"text_channels": ["newsfeed"], "image_channels": ["photoblog"]}"#,
    );
    let scraper = scraper(dir.path(), ScrapeOptions::default());
    let source = newsfeed_and_photoblog();

    let lists = scraper.load_channels();
    let summary = scraper.run(&source, &lists).await.unwrap();
    assert_eq!(summary.rows(), 4);

    let paths = scraper.paths();
    let rows = read_rows(&paths.output_csv);
    assert_eq!(rows.len(), 4);

    for row in &rows[..3] {
        assert_eq!(row[0], "News Feed");
        assert_eq!(row[1], "newsfeed");
        assert_eq!(row[5], "");
    }
    assert_eq!(
        rows.iter().map(|r| r[2].as_str()).collect::<Vec<_>>(),
        vec!["3", "2", "1", "10"]
    );

    let photo_row = &rows[3];
    assert_eq!(photo_row[0], "Photo Blog");
    assert_eq!(photo_row[1], "photoblog");
    assert_eq!(photo_row[3], "sunset");
    assert!(photo_row[5].ends_with(".png"));
    assert!(photo_row[5].ends_with("photoblog_10.png"));
    assert_eq!(fs::read(&photo_row[5]).unwrap(), b"\x89PNG\r\n");
}

#[tokio::test]
async fn test_header_row_is_written() {
    let dir = tempfile::tempdir().unwrap();
    write_channels(dir.path(), r#"{"text_channels": ["newsfeed"]}"#);
    let scraper = scraper(dir.path(), ScrapeOptions::default());

    let lists = scraper.load_channels();
    scraper.run(&newsfeed_and_photoblog(), &lists).await.unwrap();

    let content = fs::read_to_string(&scraper.paths().output_csv).unwrap();
    assert_eq!(
        content.lines().next().unwrap(),
        "Channel Title,Channel Username,ID,Message,Date,Media Path"
    );
}

#[tokio::test]
async fn test_unresolvable_channel_is_skipped_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    write_channels(
        dir.path(),
        r#"{"text_channels": ["ghost", "newsfeed"], "image_channels": ["missing", "photoblog"]}"#,
    );
    let scraper = scraper(dir.path(), ScrapeOptions::default());

    let lists = scraper.load_channels();
    let summary = scraper.run(&newsfeed_and_photoblog(), &lists).await.unwrap();

    assert_eq!(summary.skipped(), 2);
    assert!(matches!(
        summary.outcome("ghost"),
        Some(HarvestOutcome::Skipped { .. })
    ));
    assert_eq!(summary.outcome("newsfeed").unwrap().rows(), 3);

    let rows = read_rows(&scraper.paths().output_csv);
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r[1] != "ghost" && r[1] != "missing"));
}

#[tokio::test]
async fn test_mid_iteration_failure_keeps_partial_rows() {
    let dir = tempfile::tempdir().unwrap();
    write_channels(
        dir.path(),
        r#"{"text_channels": ["newsfeed", "photoblog"]}"#,
    );
    let scraper = scraper(dir.path(), ScrapeOptions::default());
    let source = newsfeed_and_photoblog().failing_after("newsfeed", 1);

    let lists = scraper.load_channels();
    let summary = scraper.run(&source, &lists).await.unwrap();

    assert!(matches!(
        summary.outcome("newsfeed"),
        Some(HarvestOutcome::Truncated { rows: 1, .. })
    ));
    let rows = read_rows(&scraper.paths().output_csv);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][2], "3");
    // Text channel: attachment ignored.
    assert_eq!(rows[1][5], "");
}

#[tokio::test]
async fn test_repeated_runs_produce_identical_tables() {
    let dir = tempfile::tempdir().unwrap();
    write_channels(
        dir.path(),
        r#"{"text_channels": ["newsfeed"], "image_channels": ["photoblog"]}"#,
    );
    let scraper = scraper(dir.path(), ScrapeOptions::default());
    let source = newsfeed_and_photoblog();

    let lists = scraper.load_channels();
    scraper.run(&source, &lists).await.unwrap();
    let first = fs::read(&scraper.paths().output_csv).unwrap();

    scraper.run(&source, &lists).await.unwrap();
    let second = fs::read(&scraper.paths().output_csv).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_config_yields_header_only_table() {
    let dir = tempfile::tempdir().unwrap();
    let scraper = scraper(dir.path(), ScrapeOptions::default());

    let lists = scraper.load_channels();
    assert_eq!(lists, ChannelLists::default());

    let summary = scraper.run(&newsfeed_and_photoblog(), &lists).await.unwrap();
    assert!(summary.channels.is_empty());
    assert!(read_rows(&scraper.paths().output_csv).is_empty());
    assert!(scraper.paths().media_dir.is_dir());
}

// ============================================================================
// Progress tracking
// ============================================================================

#[tokio::test]
async fn test_progress_is_written_back_unchanged_by_default() {
    let dir = tempfile::tempdir().unwrap();
    write_channels(dir.path(), r#"{"text_channels": ["newsfeed"]}"#);
    let scraper = scraper(dir.path(), ScrapeOptions::default());
    let progress_file = &scraper.paths().progress_file;
    fs::create_dir_all(progress_file.parent().unwrap()).unwrap();
    fs::write(progress_file, r#"{"newsfeed": 2, "retired": 99}"#).unwrap();

    let lists = scraper.load_channels();
    let summary = scraper.run(&newsfeed_and_photoblog(), &lists).await.unwrap();

    // Every message re-fetched despite the stored position.
    assert_eq!(summary.rows(), 3);
    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(progress_file).unwrap()).unwrap();
    assert_eq!(saved, serde_json::json!({"newsfeed": 2, "retired": 99}));
}

#[tokio::test]
async fn test_resume_stops_at_last_id_and_advances() {
    let dir = tempfile::tempdir().unwrap();
    write_channels(
        dir.path(),
        r#"{"text_channels": ["newsfeed", "ghost"], "image_channels": ["photoblog"]}"#,
    );
    let options = ScrapeOptions {
        resume: true,
        ..Default::default()
    };
    let scraper = scraper(dir.path(), options);
    let progress_file = &scraper.paths().progress_file;
    fs::create_dir_all(progress_file.parent().unwrap()).unwrap();
    fs::write(progress_file, r#"{"newsfeed": 2, "ghost": 5}"#).unwrap();

    let lists = scraper.load_channels();
    let summary = scraper.run(&newsfeed_and_photoblog(), &lists).await.unwrap();

    assert_eq!(summary.outcome("newsfeed").unwrap().rows(), 1);
    assert_eq!(summary.progress.get(&ChannelRef::from("newsfeed")), Some(3));
    assert_eq!(summary.progress.get(&ChannelRef::from("photoblog")), Some(10));
    assert_eq!(summary.progress.get(&ChannelRef::from("ghost")), Some(5));

    // Second run finds nothing new.
    let summary = scraper.run(&newsfeed_and_photoblog(), &lists).await.unwrap();
    assert_eq!(summary.rows(), 0);
}

#[tokio::test]
async fn test_resume_keeps_progress_when_cap_hits_before_last_id() {
    let dir = tempfile::tempdir().unwrap();
    write_channels(dir.path(), r#"{"text_channels": ["newsfeed"]}"#);
    let options = ScrapeOptions {
        limit: 3,
        resume: true,
    };
    let scraper = scraper(dir.path(), options);
    let progress_file = &scraper.paths().progress_file;
    fs::create_dir_all(progress_file.parent().unwrap()).unwrap();
    fs::write(progress_file, r#"{"newsfeed": 2}"#).unwrap();

    let mut source = MemorySource::new().with_channel("newsfeed", "News Feed");
    for id in (1..=10).rev() {
        source = source.with_message("newsfeed", text_message(id, "post"));
    }

    let lists = scraper.load_channels();
    let summary = scraper.run(&source, &lists).await.unwrap();

    assert_eq!(summary.rows(), 3);
    assert!(matches!(
        summary.outcome("newsfeed"),
        Some(HarvestOutcome::Harvested { caught_up: false, .. })
    ));
    // Messages 3..=7 are still unread, so the stored position must hold.
    assert_eq!(summary.progress.get(&ChannelRef::from("newsfeed")), Some(2));
    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(progress_file).unwrap()).unwrap();
    assert_eq!(saved, serde_json::json!({"newsfeed": 2}));
}

#[tokio::test]
async fn test_resume_without_stored_id_advances_after_capped_page() {
    let dir = tempfile::tempdir().unwrap();
    write_channels(dir.path(), r#"{"text_channels": ["newsfeed"]}"#);
    let options = ScrapeOptions {
        limit: 3,
        resume: true,
    };
    let scraper = scraper(dir.path(), options);

    let mut source = MemorySource::new().with_channel("newsfeed", "News Feed");
    for id in (1..=10).rev() {
        source = source.with_message("newsfeed", text_message(id, "post"));
    }

    let lists = scraper.load_channels();
    let summary = scraper.run(&source, &lists).await.unwrap();

    assert_eq!(summary.rows(), 3);
    assert_eq!(summary.progress.get(&ChannelRef::from("newsfeed")), Some(10));
}

#[tokio::test]
async fn test_corrupt_progress_file_is_treated_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    write_channels(dir.path(), r#"{"text_channels": ["newsfeed"]}"#);
    let scraper = scraper(dir.path(), ScrapeOptions::default());
    let progress_file = &scraper.paths().progress_file;
    fs::create_dir_all(progress_file.parent().unwrap()).unwrap();
    fs::write(progress_file, "{ this is not json").unwrap();

    let lists = scraper.load_channels();
    let summary = scraper.run(&newsfeed_and_photoblog(), &lists).await.unwrap();

    assert_eq!(summary.rows(), 3);
    assert_eq!(fs::read_to_string(progress_file).unwrap(), "{}");
}

#[tokio::test]
async fn test_unwritable_progress_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_channels(dir.path(), r#"{"text_channels": ["newsfeed"]}"#);
    let scraper = scraper(dir.path(), ScrapeOptions::default());
    fs::create_dir_all(&scraper.paths().progress_file).unwrap();

    let lists = scraper.load_channels();
    let result = scraper.run(&newsfeed_and_photoblog(), &lists).await;

    assert!(result.is_err());
    // Rows were still flushed before the failure.
    assert_eq!(read_rows(&scraper.paths().output_csv).len(), 3);
}

// ============================================================================
// Media handling
// ============================================================================

#[tokio::test]
async fn test_image_channel_media_policy() {
    let dir = tempfile::tempdir().unwrap();
    write_channels(dir.path(), r#"{"image_channels": ["https://t.me/gallery"]}"#);
    let scraper = scraper(dir.path(), ScrapeOptions::default());
    let source = MemorySource::new()
        .with_channel("gallery", "Gallery")
        .with_message(
            "gallery",
            media_message(5, None, MediaKind::Photo(MemoryMedia::bytes(b"jpeg"))),
        )
        .with_message(
            "gallery",
            media_message(
                4,
                Some("gif"),
                MediaKind::Document {
                    mime_type: Some("image/gif".to_string()),
                    media: MemoryMedia::bytes(b"gif"),
                },
            ),
        )
        .with_message(
            "gallery",
            media_message(3, Some("broken"), MediaKind::Photo(MemoryMedia::broken())),
        )
        .with_message("gallery", media_message(2, Some("poll"), MediaKind::Other))
        .with_message("gallery", text_message(1, "plain"));

    let lists = scraper.load_channels();
    scraper.run(&source, &lists).await.unwrap();

    let rows = read_rows(&scraper.paths().output_csv);
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0][1], "https://t.me/gallery");
    assert!(rows[0][5].ends_with("gallery_5.jpg"));
    for row in &rows[1..] {
        assert_eq!(row[5], "");
    }

    let files: Vec<_> = fs::read_dir(&scraper.paths().media_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(files, vec!["gallery_5.jpg".to_string()]);
}
