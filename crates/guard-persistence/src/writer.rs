//! JSON Lines file writer for audit records.
//!
//! One file per record kind per UTC day: `{prefix}_{YYYY-MM-DD}.jsonl`.
//! Files are opened in append mode, so a restart continues the day's file.
//! A failed flush truncates the file back to its last complete batch and
//! drops that batch, so the journal never holds a partial or repeated line.

use crate::error::PersistenceResult;
use guard_core::Clock;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Active writer state for the current day's file.
struct ActiveWriter {
    file: File,
    date: String,
    /// File length after the last complete batch.
    len: u64,
    records_written: usize,
}

/// Buffered, daily-rotating JSON Lines writer.
pub struct JsonLinesWriter<R: Serialize> {
    base_dir: PathBuf,
    prefix: String,
    clock: Arc<dyn Clock>,
    buffer: Vec<R>,
    /// Records held before an automatic flush. 1 flushes on every record.
    /// The buffer never grows past this.
    max_buffer_size: usize,
    active_writer: Option<ActiveWriter>,
}

impl<R: Serialize> JsonLinesWriter<R> {
    /// Create the writer, creating `base_dir` if needed.
    pub fn new(
        base_dir: impl AsRef<Path>,
        prefix: &str,
        max_buffer_size: usize,
        clock: Arc<dyn Clock>,
    ) -> PersistenceResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;

        let max_buffer_size = max_buffer_size.max(1);
        Ok(Self {
            base_dir,
            prefix: prefix.to_string(),
            clock,
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size,
            active_writer: None,
        })
    }

    /// Buffer a record, flushing once the buffer is full.
    ///
    /// If that flush fails, the buffered records (this one included) are
    /// dropped from the journal.
    pub fn add_record(&mut self, record: R) -> PersistenceResult<()> {
        self.buffer.push(record);

        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }

        Ok(())
    }

    /// Path of the file for `date` (`YYYY-MM-DD`).
    pub fn file_path(&self, date: &str) -> PathBuf {
        self.base_dir.join(format!("{}_{}.jsonl", self.prefix, date))
    }

    fn close_active_writer(&mut self) {
        if let Some(active) = self.active_writer.take() {
            info!(
                prefix = %self.prefix,
                date = %active.date,
                records = active.records_written,
                "Closed JSON Lines writer"
            );
        }
    }

    fn open_writer(&self, date: &str) -> PersistenceResult<ActiveWriter> {
        let path = self.file_path(date);
        info!(path = %path.display(), "Opening JSON Lines writer (append mode)");

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let len = file.metadata()?.len();

        Ok(ActiveWriter {
            file,
            date: date.to_string(),
            len,
            records_written: 0,
        })
    }

    /// Write buffered records to today's file.
    ///
    /// On error the batch is discarded and the file is left as it was
    /// before the call.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let today = self.clock.now().format("%Y-%m-%d").to_string();

        if self
            .active_writer
            .as_ref()
            .is_some_and(|w| w.date != today)
        {
            self.close_active_writer();
        }

        let record_count = self.buffer.len();
        let result = self.write_batch(&today);
        self.buffer.clear();

        if let Err(e) = result {
            warn!(
                error = %e,
                prefix = %self.prefix,
                records = record_count,
                "Dropped records after failed JSON Lines flush"
            );
            return Err(e);
        }

        debug!(
            prefix = %self.prefix,
            date = %today,
            records = record_count,
            "Flushed records to JSON Lines"
        );
        Ok(())
    }

    fn write_batch(&mut self, today: &str) -> PersistenceResult<()> {
        let mut batch = String::new();
        for record in &self.buffer {
            batch.push_str(&serde_json::to_string(record)?);
            batch.push('\n');
        }

        let mut active = match self.active_writer.take() {
            Some(active) => active,
            None => self.open_writer(today)?,
        };

        let written = active
            .file
            .write_all(batch.as_bytes())
            .and_then(|()| active.file.flush());
        match written {
            Ok(()) => {
                active.len += batch.len() as u64;
                active.records_written += self.buffer.len();
                self.active_writer = Some(active);
                Ok(())
            }
            Err(e) => {
                // Cut any partial batch; the handle is reopened next time.
                if let Err(trunc) = active.file.set_len(active.len) {
                    warn!(error = %trunc, prefix = %self.prefix, "Failed to truncate partial batch");
                }
                Err(e.into())
            }
        }
    }

    /// Flush pending records and close the file.
    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        self.close_active_writer();
        Ok(())
    }

    /// Records waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl<R: Serialize> Drop for JsonLinesWriter<R> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(?e, prefix = %self.prefix, "Failed to flush buffer on drop");
        }
        self.close_active_writer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use guard_core::ManualClock;
    use serde::Deserialize;
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: u32,
        code: String,
    }

    fn row(id: u32) -> Row {
        Row {
            id,
            code: format!("SI_{id}"),
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap(),
        ))
    }

    fn read_lines(path: &Path) -> Vec<String> {
        let file = File::open(path).unwrap();
        BufReader::new(file).lines().map_while(Result::ok).collect()
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(temp_dir.path(), "decisions", 100, clock()).unwrap();

        for i in 0..5 {
            writer.add_record(row(i)).unwrap();
        }
        assert_eq!(writer.pending(), 5);
        writer.close().unwrap();

        let lines = read_lines(&writer.file_path("2024-05-01"));
        assert_eq!(lines.len(), 5);
        let first: Row = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first, row(0));
    }

    #[test]
    fn test_append_mode() {
        let temp_dir = TempDir::new().unwrap();
        let clock = clock();

        for batch in 0..2 {
            let mut writer =
                JsonLinesWriter::new(temp_dir.path(), "alerts", 100, clock.clone()).unwrap();
            for i in 0..3 {
                writer.add_record(row(batch * 3 + i)).unwrap();
            }
            writer.close().unwrap();
        }

        let path = temp_dir.path().join("alerts_2024-05-01.jsonl");
        assert_eq!(read_lines(&path).len(), 6, "second writer must append");
    }

    #[test]
    fn test_buffer_size_one_flushes_every_record() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(temp_dir.path(), "decisions", 1, clock()).unwrap();
        writer.add_record(row(1)).unwrap();
        assert_eq!(writer.pending(), 0);
        assert_eq!(read_lines(&writer.file_path("2024-05-01")).len(), 1);
    }

    #[test]
    fn test_daily_rotation() {
        let temp_dir = TempDir::new().unwrap();
        let clock = clock();
        let mut writer =
            JsonLinesWriter::new(temp_dir.path(), "decisions", 1, clock.clone()).unwrap();

        writer.add_record(row(1)).unwrap();
        clock.advance(Duration::minutes(2));
        writer.add_record(row(2)).unwrap();
        writer.close().unwrap();

        assert_eq!(read_lines(&writer.file_path("2024-05-01")).len(), 1);
        assert_eq!(read_lines(&writer.file_path("2024-05-02")).len(), 1);
    }

    #[test]
    fn test_drop_flushes_pending() {
        let temp_dir = TempDir::new().unwrap();
        let path = {
            let mut writer =
                JsonLinesWriter::new(temp_dir.path(), "decisions", 100, clock()).unwrap();
            writer.add_record(row(7)).unwrap();
            writer.file_path("2024-05-01")
        };
        assert_eq!(read_lines(&path).len(), 1);
    }

    #[test]
    fn test_failed_flush_drops_the_batch() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("journal");
        let mut writer = JsonLinesWriter::new(&dir, "decisions", 2, clock()).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        writer.add_record(row(1)).unwrap();
        assert!(writer.add_record(row(2)).is_err());
        assert_eq!(writer.pending(), 0, "failed batch is not retained");

        std::fs::create_dir_all(&dir).unwrap();
        writer.add_record(row(3)).unwrap();
        writer.close().unwrap();

        let lines = read_lines(&writer.file_path("2024-05-01"));
        assert_eq!(lines.len(), 1);
        let only: Row = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(only, row(3));
    }

    #[test]
    fn test_buffer_is_bounded_while_flushes_fail() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("journal");
        let mut writer = JsonLinesWriter::new(&dir, "alerts", 3, clock()).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        for i in 0..10 {
            let _ = writer.add_record(row(i));
            assert!(writer.pending() < 3);
        }
    }

    #[test]
    fn test_empty_flush_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer: JsonLinesWriter<Row> =
            JsonLinesWriter::new(temp_dir.path(), "decisions", 100, clock()).unwrap();
        writer.flush().unwrap();

        let entries = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(entries, 0);
    }
}
