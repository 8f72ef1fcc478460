//! CSV-backed activity log with size-based rotation.
//!
//! - One mutex serialises all writes; rotation happens inside the critical
//!   section, so readers never observe a half-rotated file.
//! - Rows are append-only. The header is written when the file is created.
//! - When the primary file reaches `max_file_size_bytes` it is renamed with
//!   a `_YYYYMMDD_HHMMSS` suffix and a fresh file is started.

use super::types::{ActivityRecord, ActivityStatus};
use crate::error::{Error, Result};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Primary log filename; rotated files get a timestamp suffix.
pub const LOG_FILE_NAME: &str = "activity_log.csv";

/// Default rotation threshold (5 MB).
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 5_000_000;

/// Concurrency-safe, append-only activity log.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    inner: Arc<Mutex<LogInner>>,
}

#[derive(Debug)]
struct LogInner {
    dir: PathBuf,
    file: PathBuf,
    max_file_size_bytes: u64,
    /// Rows written by this process, newest last.
    history: Vec<ActivityRecord>,
}

impl ActivityLog {
    /// Open (or create) the log in `dir` with the default rotation size.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_max_size(dir, DEFAULT_MAX_FILE_SIZE_BYTES)
    }

    /// Open with an explicit rotation threshold.
    pub fn with_max_size(dir: impl Into<PathBuf>, max_file_size_bytes: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        let file = dir.join(LOG_FILE_NAME);
        Ok(Self {
            inner: Arc::new(Mutex::new(LogInner {
                dir,
                file,
                max_file_size_bytes,
                history: Vec::new(),
            })),
        })
    }

    /// Path of the active log file.
    pub fn file_path(&self) -> PathBuf {
        self.lock().file.clone()
    }

    /// Append one activity row.
    ///
    /// Mints a fresh `row_id` and timestamp, prints the row for real-time
    /// feedback, then persists it under the log mutex (rotating first if
    /// the file has reached the size threshold).
    pub fn log_activity(
        &self,
        activity_type: &str,
        details: &str,
        status: ActivityStatus,
        agent_name: &str,
        job_id: &str,
    ) -> Result<ActivityRecord> {
        let record = ActivityRecord::new(activity_type, details, status, agent_name, job_id);
        tracing::info!(target: "tracker", "{}", record.as_log_line());

        let mut inner = self.lock();
        inner.rotate_if_needed()?;
        inner.append(&record)?;
        inner.history.push(record.clone());
        Ok(record)
    }

    /// Read all rows of the active file, optionally filtered by type tag.
    pub fn get_activities(&self, type_filter: Option<&str>) -> Result<Vec<ActivityRecord>> {
        let inner = self.lock();
        let mut rows = read_rows(&inner.file)?;
        if let Some(wanted) = type_filter {
            rows.retain(|r| r.activity_type == wanted);
        }
        Ok(rows)
    }

    /// Rows within the last `window_minutes`, filtered by type tags and/or
    /// status. The result is the union of in-memory and on-disk records.
    pub fn get_recent(
        &self,
        window_minutes: i64,
        types: Option<&[&str]>,
        status: Option<ActivityStatus>,
    ) -> Result<Vec<ActivityRecord>> {
        let inner = self.lock();
        let mut rows = read_rows(&inner.file)?;
        let seen: HashSet<&str> = rows.iter().map(|r| r.row_id.as_str()).collect();
        let fresh: Vec<ActivityRecord> = inner
            .history
            .iter()
            .filter(|r| !seen.contains(r.row_id.as_str()))
            .cloned()
            .collect();
        rows.extend(fresh);

        let cutoff = Utc::now() - ChronoDuration::minutes(window_minutes);
        rows.retain(|r| {
            r.timestamp >= cutoff
                && types.map_or(true, |ts| ts.contains(&r.activity_type.as_str()))
                && status.map_or(true, |s| r.status == s)
        });
        Ok(rows)
    }

    /// Rotated log files in the log directory, in rotation order.
    pub fn rotated_files(&self) -> Result<Vec<PathBuf>> {
        let inner = self.lock();
        let pattern = inner.dir.join("activity_log_*.csv");
        let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
            .map_err(|e| Error::Storage(format!("bad rotation glob: {}", e)))?
            .filter_map(|entry| entry.ok())
            .collect();
        files.sort_by_key(|path| rotation_key(path));
        Ok(files)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogInner> {
        self.inner.lock().expect("activity log mutex poisoned")
    }
}

impl LogInner {
    fn rotate_if_needed(&mut self) -> Result<()> {
        let size = match std::fs::metadata(&self.file) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };
        if size < self.max_file_size_bytes {
            return Ok(());
        }

        let suffix = Utc::now().format("%Y%m%d_%H%M%S");
        // Rotations within the same second get a counter so an existing
        // rotated file is never overwritten.
        let mut rotated = self.dir.join(format!("activity_log_{}.csv", suffix));
        let mut counter = 1;
        while rotated.exists() {
            rotated = self
                .dir
                .join(format!("activity_log_{}_{}.csv", suffix, counter));
            counter += 1;
        }
        std::fs::rename(&self.file, &rotated).map_err(|e| Error::io(&self.file, e))?;
        tracing::info!(target: "tracker", "log file rotated to {}", rotated.display());
        Ok(())
    }

    fn append(&self, record: &ActivityRecord) -> Result<()> {
        let write_header = !self.file.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file)
            .map_err(|e| Error::io(&self.file, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush().map_err(|e| Error::io(&self.file, e))?;
        Ok(())
    }
}

/// Sort key for rotated filenames: the timestamp suffix plus the
/// same-second counter (`activity_log_20250101_120000_2.csv` → 2).
fn rotation_key(path: &Path) -> (String, u32) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let rest = stem.strip_prefix("activity_log_").unwrap_or(&stem);
    match rest.char_indices().filter(|(_, c)| *c == '_').nth(1) {
        Some((i, _)) => {
            let (timestamp, counter) = rest.split_at(i);
            (timestamp.to_string(), counter[1..].parse().unwrap_or(0))
        }
        None => (rest.to_string(), 0),
    }
}

fn read_rows(path: &Path) -> Result<Vec<ActivityRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn open_in(dir: &tempfile::TempDir, max: u64) -> ActivityLog {
        ActivityLog::with_max_size(dir.path(), max).unwrap()
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = open_in(&dir, DEFAULT_MAX_FILE_SIZE_BYTES);

        log.log_activity("session", "Session started", ActivityStatus::Success, "Controller", "")
            .unwrap();
        log.log_activity("task", "Created new task: t-1", ActivityStatus::Created, "TaskManager", "")
            .unwrap();

        let rows = log.get_activities(None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].activity_type, "session");
        assert_eq!(rows[1].status, ActivityStatus::Created);

        let filtered = log.get_activities(Some("task")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].agent_name, "TaskManager");
    }

    #[test]
    fn test_row_ids_unique_across_writes() {
        let dir = tempfile::tempdir().unwrap();
        let log = open_in(&dir, DEFAULT_MAX_FILE_SIZE_BYTES);
        for i in 0..50 {
            log.log_activity("click", &format!("click {}", i), ActivityStatus::Success, "Nav", "")
                .unwrap();
        }
        let rows = log.get_activities(None).unwrap();
        let ids: HashSet<_> = rows.iter().map(|r| r.row_id.clone()).collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_details_with_commas_and_quotes_survive() {
        let dir = tempfile::tempdir().unwrap();
        let log = open_in(&dir, DEFAULT_MAX_FILE_SIZE_BYTES);
        let details = "clicked \"Apply\", then waited, twice";
        log.log_activity("click", details, ActivityStatus::Success, "Nav", "job-1")
            .unwrap();

        let rows = log.get_activities(None).unwrap();
        assert_eq!(rows[0].details, details);
        assert_eq!(rows[0].job_id, "job-1");
    }

    #[test]
    fn test_rotation_at_threshold_before_next_write() {
        let dir = tempfile::tempdir().unwrap();
        // Tiny threshold so the second write must rotate first.
        let log = open_in(&dir, 64);

        log.log_activity("session", "first row, long enough to cross the threshold", ActivityStatus::Info, "Controller", "")
            .unwrap();
        assert!(std::fs::metadata(log.file_path()).unwrap().len() >= 64);

        log.log_activity("session", "second row", ActivityStatus::Info, "Controller", "")
            .unwrap();

        let rotated = log.rotated_files().unwrap();
        assert_eq!(rotated.len(), 1);

        // Fresh primary file holds only the post-rotation row (plus header).
        let rows = log.get_activities(None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].details, "second row");
    }

    #[test]
    fn test_rotation_preserves_all_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = open_in(&dir, 256);

        let total = 200;
        for i in 0..total {
            log.log_activity("scroll", &format!("step {:04}", i), ActivityStatus::Success, "Nav", "")
                .unwrap();
        }

        let mut all_rows = Vec::new();
        for file in log.rotated_files().unwrap() {
            all_rows.extend(read_rows(&file).unwrap());
        }
        all_rows.extend(log.get_activities(None).unwrap());

        assert!(log.rotated_files().unwrap().len() >= 1);
        assert_eq!(all_rows.len(), total);
        let ids: HashSet<_> = all_rows.iter().map(|r| r.row_id.clone()).collect();
        assert_eq!(ids.len(), total);
        for (i, row) in all_rows.iter().enumerate() {
            assert_eq!(row.details, format!("step {:04}", i));
        }
    }

    #[test]
    fn test_rotation_key_orders_same_second_files() {
        let names = [
            "activity_log_20250101_120000_10.csv",
            "activity_log_20250101_120000_2.csv",
            "activity_log_20250101_120000.csv",
            "activity_log_20250101_120001.csv",
            "activity_log_20250101_120000_1.csv",
        ];
        let mut files: Vec<PathBuf> = names.iter().map(PathBuf::from).collect();
        files.sort_by_key(|p| rotation_key(p));
        let sorted: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            sorted,
            vec![
                "activity_log_20250101_120000.csv",
                "activity_log_20250101_120000_1.csv",
                "activity_log_20250101_120000_2.csv",
                "activity_log_20250101_120000_10.csv",
                "activity_log_20250101_120001.csv",
            ]
        );
    }

    #[test]
    fn test_get_recent_filters_type_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let log = open_in(&dir, DEFAULT_MAX_FILE_SIZE_BYTES);

        log.log_activity("task", "ok", ActivityStatus::Success, "TaskManager", "").unwrap();
        log.log_activity("task", "boom", ActivityStatus::Error, "TaskManager", "").unwrap();
        log.log_activity("click", "ok", ActivityStatus::Success, "Nav", "").unwrap();

        let recent = log.get_recent(30, Some(&["task"]), None).unwrap();
        assert_eq!(recent.len(), 2);

        let errors = log
            .get_recent(30, Some(&["task"]), Some(ActivityStatus::Error))
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].details, "boom");

        let none = log.get_recent(0, None, None).unwrap();
        assert!(none.len() <= 3); // zero-minute window keeps at most this second's rows
    }

    #[test]
    fn test_empty_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = open_in(&dir, DEFAULT_MAX_FILE_SIZE_BYTES);
        assert!(log.get_activities(None).unwrap().is_empty());
        assert!(log.get_recent(60, None, None).unwrap().is_empty());
        assert!(log.rotated_files().unwrap().is_empty());
    }
}
