//! Incremental journal tracker.
//!
//! Follows the newest journal file in a directory, reads lines appended
//! since the last read, and publishes the parsed records to the broker.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::watch;

use super::discovery::{latest_journal, modified_time, scan_journals, JournalPattern};
use super::error::JournalError;
use super::record::{parse_line, JournalRecord};
use crate::broker::EventBroker;

/// The tracked file and how many of its bytes were already consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingCursor {
    /// Path of the tracked journal.
    pub path: PathBuf,
    /// Byte offset just past the last complete line read.
    pub offset: u64,
}

/// Tracks the current journal file and streams its new records.
#[derive(Debug)]
pub struct JournalTracker {
    /// Directory holding the journal files.
    dir: PathBuf,
    /// Journal file name pattern.
    pattern: JournalPattern,
    /// Current file and offset, if any journal exists yet.
    cursor: Option<TrackingCursor>,
    /// Offsets to resume from for files seen before they became current.
    baselines: HashMap<PathBuf, u64>,
    /// Where parsed records go.
    broker: EventBroker,
    /// Name of the current journal, for status queries.
    current_tx: watch::Sender<Option<String>>,
    /// Lines rejected by the parser so far.
    rejected: u64,
}

impl JournalTracker {
    /// Scan `dir` and start tracking its newest journal at end of file.
    ///
    /// Every other journal present is remembered at its current size, so
    /// adopting one later never replays its history.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn discover(
        dir: &Path,
        pattern: JournalPattern,
        broker: EventBroker,
    ) -> Result<Self, JournalError> {
        let files = scan_journals(dir, &pattern)?;
        let cursor = latest_journal(&files).map(|file| TrackingCursor {
            path: file.path.clone(),
            offset: file.len,
        });
        let baselines = files
            .iter()
            .filter(|file| !cursor.as_ref().is_some_and(|c| c.path == file.path))
            .map(|file| (file.path.clone(), file.len))
            .collect();

        match &cursor {
            Some(c) => tracing::info!(
                path = %c.path.display(),
                offset = c.offset,
                "Monitoring journal"
            ),
            None => tracing::info!(dir = %dir.display(), "No journal yet, waiting for one"),
        }

        let (current_tx, _) = watch::channel(cursor.as_ref().map(|c| file_name(&c.path)));

        Ok(Self {
            dir: dir.to_path_buf(),
            pattern,
            cursor,
            baselines,
            broker,
            current_tx,
            rejected: 0,
        })
    }

    /// The directory being tracked.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The current cursor, if a journal is tracked.
    #[must_use]
    pub fn cursor(&self) -> Option<&TrackingCursor> {
        self.cursor.as_ref()
    }

    /// Number of lines rejected as malformed.
    #[must_use]
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    /// Receiver that always holds the current journal file name.
    #[must_use]
    pub fn current_journal(&self) -> watch::Receiver<Option<String>> {
        self.current_tx.subscribe()
    }

    /// React to a filesystem change of `path`.
    ///
    /// Switches to `path` if it is a journal newer than the tracked one,
    /// then publishes every complete record appended since the last read.
    /// I/O errors are logged and leave the cursor untouched. Returns the
    /// number of records published.
    pub async fn handle_change(&mut self, path: &Path) -> usize {
        if !self.pattern.matches(path) {
            return 0;
        }

        let mut published = 0;
        if self.should_rotate(path) {
            // Drain what is left of the old file so its tail is not lost
            if self.current_exists() {
                published += self.publish_new_records().await;
            }
            self.rotate_to(path);
        }

        published + self.publish_new_records().await
    }

    fn should_rotate(&self, path: &Path) -> bool {
        let Some(cursor) = &self.cursor else {
            return true;
        };
        if cursor.path == path {
            return false;
        }
        let Some(candidate) = modified_time(path) else {
            return false;
        };
        match modified_time(&cursor.path) {
            Some(current) => candidate > current,
            None => true,
        }
    }

    fn current_exists(&self) -> bool {
        self.cursor.as_ref().is_some_and(|c| c.path.exists())
    }

    fn rotate_to(&mut self, path: &Path) {
        let offset = self.baselines.remove(path).unwrap_or(0);
        if let Some(old) = self.cursor.take() {
            self.baselines.insert(old.path, old.offset);
        }

        tracing::info!(path = %path.display(), offset, "New journal detected");
        self.current_tx.send_replace(Some(file_name(path)));
        self.cursor = Some(TrackingCursor {
            path: path.to_path_buf(),
            offset,
        });
    }

    async fn publish_new_records(&mut self) -> usize {
        match self.read_new_records().await {
            Ok(records) => {
                let count = records.len();
                for record in records {
                    tracing::info!(event = %record.event_name(), "Journal event");
                    self.broker.publish(record);
                }
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read journal, will retry on next change");
                0
            }
        }
    }

    /// Read complete records appended to the current file since the last read.
    ///
    /// Records come back augmented with the ingestion timestamp and source
    /// file name. Malformed lines are skipped with a warning; a trailing
    /// line without a newline is left for the next read. If the file shrank
    /// below the offset it is read again from the start.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read. The cursor is
    /// left untouched, so the same lines are read again on the next call.
    pub async fn read_new_records(&mut self) -> Result<Vec<JournalRecord>, JournalError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(Vec::new());
        };

        let mut file = match File::open(&cursor.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(JournalError::FileDeleted(cursor.path.clone()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(JournalError::PermissionDenied(cursor.path.clone()));
            }
            Err(e) => return Err(JournalError::Io(e)),
        };

        let file_len = file.metadata().await?.len();
        let mut start = cursor.offset;
        if file_len < start {
            tracing::warn!(
                path = %cursor.path.display(),
                old_offset = start,
                new_len = file_len,
                "Journal truncated, re-reading from the start"
            );
            start = 0;
        }

        if file_len == start {
            cursor.offset = start;
            return Ok(Vec::new());
        }

        file.seek(std::io::SeekFrom::Start(start)).await?;
        let (lines, consumed) = read_complete_lines(&mut BufReader::new(file)).await?;
        cursor.offset = start + consumed;

        let name = file_name(&cursor.path);
        let mut records = Vec::with_capacity(lines.len());
        for line in &lines {
            match parse_line(line) {
                Ok(mut record) => {
                    record.augment(&name);
                    records.push(record);
                }
                Err(e) => {
                    self.rejected += 1;
                    tracing::warn!(
                        path = %cursor.path.display(),
                        line = %String::from_utf8_lossy(line),
                        error = %e,
                        "Skipping malformed journal line"
                    );
                }
            }
        }

        Ok(records)
    }
}

/// Read every newline-terminated, non-blank line from `reader`.
///
/// Returns the trimmed lines and the number of bytes they span. A trailing
/// line without a newline is neither returned nor counted.
async fn read_complete_lines<R>(reader: &mut R) -> std::io::Result<(Vec<Vec<u8>>, u64)>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    let mut consumed = 0u64;
    let mut line = Vec::new();

    loop {
        line.clear();
        let bytes_read = reader.read_until(b'\n', &mut line).await?;

        // EOF, or a line the game has not finished writing
        if bytes_read == 0 || line.last() != Some(&b'\n') {
            break;
        }
        consumed += bytes_read as u64;

        let trimmed = line.trim_ascii();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_vec());
        }
    }

    Ok((lines, consumed))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerEvent, Subscriber};
    use crate::journal::{DEFAULT_JOURNAL_PATTERN, JOURNAL_FILE_FIELD};
    use std::io::Write;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const SHORT: Duration = Duration::from_millis(50);

    fn pattern() -> JournalPattern {
        JournalPattern::new(DEFAULT_JOURNAL_PATTERN).unwrap()
    }

    fn append(path: &Path, content: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    fn set_mtime(path: &Path, secs_ago: u64) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs_ago))
            .unwrap();
    }

    async fn drain(sub: &mut Subscriber) -> Vec<String> {
        let mut events = Vec::new();
        while let BrokerEvent::Record(r) = sub.next_event(SHORT).await {
            events.push(r.event_name().to_string());
        }
        events
    }

    #[tokio::test]
    async fn test_discovery_starts_at_end_of_newest() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("Journal.01.log");
        let new = dir.path().join("Journal.02.log");
        append(&old, "{\"event\":\"Fileheader\"}\n");
        append(&new, "{\"event\":\"Fileheader\"}\n{\"event\":\"LoadGame\"}\n");
        set_mtime(&old, 120);
        set_mtime(&new, 60);

        let tracker = JournalTracker::discover(dir.path(), pattern(), EventBroker::default()).unwrap();

        let cursor = tracker.cursor().unwrap();
        assert_eq!(cursor.path, new);
        assert_eq!(cursor.offset, std::fs::metadata(&new).unwrap().len());
        assert_eq!(
            tracker.current_journal().borrow().as_deref(),
            Some("Journal.02.log")
        );
    }

    #[tokio::test]
    async fn test_discovery_empty_dir() {
        let dir = TempDir::new().unwrap();
        let tracker = JournalTracker::discover(dir.path(), pattern(), EventBroker::default()).unwrap();
        assert!(tracker.cursor().is_none());
        assert!(tracker.current_journal().borrow().is_none());
    }

    #[tokio::test]
    async fn test_reads_only_appended_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Journal.01.log");
        append(&path, "{\"event\":\"Fileheader\"}\n");

        let broker = EventBroker::default();
        let mut sub = broker.subscribe();
        let mut tracker = JournalTracker::discover(dir.path(), pattern(), broker).unwrap();

        // Duplicate notification with nothing new is a no-op
        assert_eq!(tracker.handle_change(&path).await, 0);

        append(&path, "{\"event\":\"Location\"}\n{\"event\":\"FSDJump\"}\n");
        assert_eq!(tracker.handle_change(&path).await, 2);
        assert_eq!(tracker.handle_change(&path).await, 0);

        assert_eq!(drain(&mut sub).await, vec!["Location", "FSDJump"]);
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped_and_offset_advances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Journal.01.log");
        append(&path, "");

        let mut tracker = JournalTracker::discover(dir.path(), pattern(), EventBroker::default()).unwrap();

        append(
            &path,
            "{\"event\":\"Docked\"}\nnot json\n\n{\"NoEvent\":1}\n{\"event\":\"Undocked\"}\n",
        );
        let records = tracker.read_new_records().await.unwrap();

        let names: Vec<_> = records.iter().map(JournalRecord::event_name).collect();
        assert_eq!(names, vec!["Docked", "Undocked"]);
        assert_eq!(tracker.rejected_count(), 2);
        assert_eq!(
            tracker.cursor().unwrap().offset,
            std::fs::metadata(&path).unwrap().len()
        );
    }

    #[tokio::test]
    async fn test_partial_line_waits_for_terminator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Journal.01.log");
        append(&path, "");

        let mut tracker = JournalTracker::discover(dir.path(), pattern(), EventBroker::default()).unwrap();

        append(&path, "{\"event\":\"Docked\"}\n{\"event\":\"Und");
        let records = tracker.read_new_records().await.unwrap();
        assert_eq!(records.len(), 1);
        let offset = tracker.cursor().unwrap().offset;
        assert_eq!(offset, "{\"event\":\"Docked\"}\n".len() as u64);

        let records = tracker.read_new_records().await.unwrap();
        assert!(records.is_empty());
        assert_eq!(tracker.cursor().unwrap().offset, offset);

        append(&path, "ocked\"}\r\n");
        let records = tracker.read_new_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_name(), "Undocked");
    }

    #[tokio::test]
    async fn test_records_are_augmented() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Journal.01.log");
        append(&path, "");

        let mut tracker = JournalTracker::discover(dir.path(), pattern(), EventBroker::default()).unwrap();
        append(&path, "{\"event\":\"Docked\",\"StarSystem\":\"Sol\"}\n");

        let records = tracker.read_new_records().await.unwrap();
        assert_eq!(records[0].get("StarSystem").unwrap(), "Sol");
        assert_eq!(records[0].get(JOURNAL_FILE_FIELD).unwrap(), "Journal.01.log");
        assert!(records[0].get("_server_timestamp").is_some());
    }

    #[tokio::test]
    async fn test_rotation_to_new_file_starts_at_zero() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("Journal.01.log");
        append(&a, "{\"event\":\"Fileheader\"}\n");
        set_mtime(&a, 60);

        let broker = EventBroker::default();
        let mut sub = broker.subscribe();
        let mut tracker = JournalTracker::discover(dir.path(), pattern(), broker).unwrap();

        // Final bytes of A land just before B appears
        append(&a, "{\"event\":\"Shutdown\"}\n");
        set_mtime(&a, 60);

        let b = dir.path().join("Journal.02.log");
        append(&b, "{\"event\":\"Fileheader\"}\n{\"event\":\"LoadGame\"}\n");

        assert_eq!(tracker.handle_change(&b).await, 3);
        assert_eq!(tracker.cursor().unwrap().path, b);
        assert_eq!(
            drain(&mut sub).await,
            vec!["Shutdown", "Fileheader", "LoadGame"]
        );
        assert_eq!(
            tracker.current_journal().borrow().as_deref(),
            Some("Journal.02.log")
        );
    }

    #[tokio::test]
    async fn test_rotation_to_preexisting_file_skips_history() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("Journal.01.log");
        let b = dir.path().join("Journal.02.log");
        append(&a, "{\"event\":\"Fileheader\"}\n");
        append(&b, "{\"event\":\"Old1\"}\n{\"event\":\"Old2\"}\n");
        set_mtime(&a, 60);
        set_mtime(&b, 120);

        let broker = EventBroker::default();
        let mut sub = broker.subscribe();
        let mut tracker = JournalTracker::discover(dir.path(), pattern(), broker).unwrap();
        assert_eq!(tracker.cursor().unwrap().path, a);

        let pre_rotation_len = std::fs::metadata(&b).unwrap().len();
        append(&b, "{\"event\":\"New\"}\n");

        assert_eq!(tracker.handle_change(&b).await, 1);
        assert_eq!(drain(&mut sub).await, vec!["New"]);
        assert!(tracker.cursor().unwrap().offset > pre_rotation_len);
    }

    #[tokio::test]
    async fn test_older_file_does_not_rotate() {
        let dir = TempDir::new().unwrap();
        let current = dir.path().join("Journal.02.log");
        let older = dir.path().join("Journal.01.log");
        append(&current, "");
        append(&older, "");
        set_mtime(&older, 300);

        let mut tracker = JournalTracker::discover(dir.path(), pattern(), EventBroker::default()).unwrap();
        assert_eq!(tracker.cursor().unwrap().path, current);

        set_mtime(&older, 200);
        tracker.handle_change(&older).await;
        assert_eq!(tracker.cursor().unwrap().path, current);
    }

    #[tokio::test]
    async fn test_non_journal_changes_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Journal.01.log");
        append(&path, "");

        let mut tracker = JournalTracker::discover(dir.path(), pattern(), EventBroker::default()).unwrap();
        append(&path, "{\"event\":\"Docked\"}\n");

        let status = dir.path().join("Status.json");
        append(&status, "{\"event\":\"Status\"}\n");
        assert_eq!(tracker.handle_change(&status).await, 0);
        assert_eq!(tracker.cursor().unwrap().path, path);
    }

    #[tokio::test]
    async fn test_first_journal_adopted_from_zero() {
        let dir = TempDir::new().unwrap();
        let broker = EventBroker::default();
        let mut sub = broker.subscribe();
        let mut tracker = JournalTracker::discover(dir.path(), pattern(), broker).unwrap();

        let path = dir.path().join("Journal.01.log");
        append(&path, "{\"event\":\"Fileheader\"}\n");
        assert_eq!(tracker.handle_change(&path).await, 1);
        assert_eq!(drain(&mut sub).await, vec!["Fileheader"]);
    }

    #[tokio::test]
    async fn test_vanished_file_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Journal.01.log");
        append(&path, "{\"event\":\"Fileheader\"}\n");

        let mut tracker = JournalTracker::discover(dir.path(), pattern(), EventBroker::default()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            tracker.read_new_records().await,
            Err(JournalError::FileDeleted(_))
        ));
        assert_eq!(tracker.handle_change(&path).await, 0);

        // A replacement journal is picked up on its first change
        let next = dir.path().join("Journal.02.log");
        append(&next, "{\"event\":\"Fileheader\"}\n");
        assert_eq!(tracker.handle_change(&next).await, 1);
    }

    #[tokio::test]
    async fn test_truncation_resets_offset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Journal.01.log");
        append(&path, "{\"event\":\"A\"}\n{\"event\":\"B\"}\n");

        let mut tracker = JournalTracker::discover(dir.path(), pattern(), EventBroker::default()).unwrap();
        std::fs::write(&path, "{\"event\":\"C\"}\n").unwrap();

        let records = tracker.read_new_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_name(), "C");
    }

    #[tokio::test]
    async fn test_read_complete_lines_skips_blank_and_partial() {
        let mut input: &[u8] = b"{\"event\":\"A\"}\n\r\n{\"event\":\"B\"}\r\n{\"event\":\"C";

        let (lines, consumed) = read_complete_lines(&mut input).await.unwrap();

        assert_eq!(lines, vec![b"{\"event\":\"A\"}".to_vec(), b"{\"event\":\"B\"}".to_vec()]);
        assert_eq!(consumed, "{\"event\":\"A\"}\n\r\n{\"event\":\"B\"}\r\n".len() as u64);
    }

    struct BrokenDisk;

    impl tokio::io::AsyncRead for BrokenDisk {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "device error",
            )))
        }
    }

    #[tokio::test]
    async fn test_read_error_after_complete_lines_is_reported() {
        use tokio::io::AsyncReadExt;

        let good: &[u8] = b"{\"event\":\"A\"}\n{\"event\":\"B\"}\n";
        let mut reader = BufReader::new(good.chain(BrokenDisk));

        // Lines read before the failure must not count as consumed
        assert!(read_complete_lines(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_read_keeps_cursor_for_retry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Journal.01.log");
        let header = "{\"event\":\"Fileheader\"}\n";
        append(&path, header);

        let mut tracker = JournalTracker::discover(dir.path(), pattern(), EventBroker::default()).unwrap();
        let before = tracker.cursor().unwrap().clone();

        std::fs::remove_file(&path).unwrap();
        assert!(tracker.read_new_records().await.is_err());
        assert_eq!(tracker.cursor(), Some(&before));

        // Once readable again, reading resumes where it left off
        append(&path, header);
        append(&path, "{\"event\":\"Docked\"}\n{\"event\":\"Undocked\"}\n");
        let records = tracker.read_new_records().await.unwrap();
        let names: Vec<_> = records.iter().map(JournalRecord::event_name).collect();
        assert_eq!(names, vec!["Docked", "Undocked"]);
    }
}
