//! CSV output table: one row per fetched message.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;

pub const HEADER: [&str; 6] = [
    "Channel Title",
    "Channel Username",
    "ID",
    "Message",
    "Date",
    "Media Path",
];

/// Timestamp layout used in the `Date` column, e.g. `2024-01-01 12:00:00+00:00`.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// One harvested message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub channel_title: String,
    pub channel_username: String,
    pub id: i64,
    pub text: Option<String>,
    pub date: DateTime<Utc>,
    pub media_path: Option<PathBuf>,
}

/// Append-only CSV writer with a fixed header.
pub struct OutputTable<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl OutputTable<File> {
    /// Create (or truncate) the table at `path` and write the header.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Self::from_writer(File::create(path)?)
    }
}

impl<W: Write> OutputTable<W> {
    pub fn from_writer(inner: W) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write_row(&mut self, record: &MessageRecord) -> Result<()> {
        let id = record.id.to_string();
        let date = record.date.format(DATE_FORMAT).to_string();
        let media_path = record
            .media_path
            .as_deref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.writer.write_record([
            record.channel_title.as_str(),
            record.channel_username.as_str(),
            id.as_str(),
            record.text.as_deref().unwrap_or(""),
            date.as_str(),
            media_path.as_str(),
        ])?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far (header excluded).
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::Error::Csv(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: i64, text: Option<&str>, media: Option<&str>) -> MessageRecord {
        MessageRecord {
            channel_title: "News Feed".to_string(),
            channel_username: "newsfeed".to_string(),
            id,
            text: text.map(str::to_string),
            date: Utc.with_ymd_and_hms(2024, 3, 5, 8, 30, 0).unwrap(),
            media_path: media.map(PathBuf::from),
        }
    }

    fn render(records: &[MessageRecord]) -> String {
        let mut table = OutputTable::from_writer(Vec::new()).unwrap();
        for r in records {
            table.write_row(r).unwrap();
        }
        String::from_utf8(table.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn header_only_when_empty() {
        assert_eq!(
            render(&[]),
            "Channel Title,Channel Username,ID,Message,Date,Media Path\n"
        );
    }

    #[test]
    fn writes_row_with_empty_media_path() {
        let out = render(&[record(3, Some("hello"), None)]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "News Feed,newsfeed,3,hello,2024-03-05 08:30:00+00:00,");
    }

    #[test]
    fn writes_media_path_and_null_text() {
        let out = render(&[record(9, None, Some("data/photos/newsfeed_9.png"))]);
        assert!(out.lines().nth(1).unwrap().ends_with(",data/photos/newsfeed_9.png"));
        assert!(out.contains(",9,,"));
    }

    #[test]
    fn quotes_multiline_and_comma_text() {
        let out = render(&[record(1, Some("line one\nline, two"), None)]);
        assert!(out.contains("\"line one\nline, two\""));
    }

    #[test]
    fn counts_rows() {
        let mut table = OutputTable::from_writer(Vec::new()).unwrap();
        table.write_row(&record(1, Some("a"), None)).unwrap();
        table.write_row(&record(2, Some("b"), None)).unwrap();
        assert_eq!(table.rows(), 2);
    }

    #[test]
    fn create_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("telegram_data.csv");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale content\nmore stale\n").unwrap();

        let mut table = OutputTable::create(&path).unwrap();
        table.flush().unwrap();
        drop(table);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Channel Title,"));
        assert!(!content.contains("stale"));
    }
}
