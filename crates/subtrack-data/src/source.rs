//! File-backed [`RecordSource`].

use std::collections::HashSet;
use std::path::PathBuf;

use subtrack_core::batch::{RecordSource, SkippedRecord, SourceEntry};
use subtrack_core::error::{RecordError, Result, TrackerError};
use subtrack_core::time_utils::TimezoneHandler;
use tracing::{debug, info, warn};

use crate::document::DocumentConverter;
use crate::reader::{find_data_files, read_documents};

/// Reads subscription documents from a file or directory on every fetch.
///
/// Entries keep file order (files sorted by path). A record id seen a second
/// time is dropped with a warning; the first occurrence wins.
#[derive(Debug, Clone)]
pub struct FileRecordSource {
    path: PathBuf,
    user: Option<String>,
    converter: DocumentConverter,
}

impl FileRecordSource {
    /// Offset-less date-times in the files are read in `timezone`.
    pub fn new(path: impl Into<PathBuf>, timezone: &str) -> Self {
        Self {
            path: path.into(),
            user: None,
            converter: DocumentConverter::new(TimezoneHandler::new(timezone)),
        }
    }

    /// Restrict the source to documents owned by `user`.
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    /// Load and convert every document under the configured path.
    pub fn load(&self) -> Result<Vec<SourceEntry>> {
        if !self.path.exists() {
            return Err(TrackerError::DataPathNotFound(self.path.clone()));
        }

        let files = find_data_files(&self.path);
        if files.is_empty() {
            return Err(TrackerError::NoDataFiles(self.path.clone()));
        }

        let mut entries = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut filtered_out = 0usize;
        let mut duplicates = 0usize;

        for file in &files {
            for raw in read_documents(file)? {
                let entry = match raw.value {
                    Ok(doc) => {
                        if let Some(user) = &self.user {
                            if DocumentConverter::owner_of(&doc).as_deref() != Some(user.as_str())
                            {
                                filtered_out += 1;
                                continue;
                            }
                        }
                        self.converter.convert(&doc, &raw.location)
                    }
                    // Unparseable lines have no owner to filter on.
                    Err(_) if self.user.is_some() => {
                        filtered_out += 1;
                        continue;
                    }
                    Err(reason) => Err(SkippedRecord {
                        record_id: raw.location.clone(),
                        name: String::new(),
                        reason: RecordError::invalid("document", reason),
                    }),
                };

                if let Ok(record) = &entry {
                    if !seen_ids.insert(record.id.clone()) {
                        warn!(record_id = %record.id, location = %raw.location, "duplicate record id ignored");
                        duplicates += 1;
                        continue;
                    }
                }
                entries.push(entry);
            }
        }

        debug!(
            path = %self.path.display(),
            files = files.len(),
            filtered_out,
            duplicates,
            "documents loaded"
        );
        info!(entries = entries.len(), path = %self.path.display(), "record source read");

        Ok(entries)
    }
}

impl RecordSource for FileRecordSource {
    fn fetch(&self) -> Result<Vec<SourceEntry>> {
        self.load()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use subtrack_core::batch::{BatchConfig, BatchRunner};
    use subtrack_core::formatting::round_to;
    use subtrack_core::sinks::CollectingNotifier;
    use chrono::{TimeZone, Utc};
    use std::path::Path;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    const EXPORT: &str = r#"{"_id":{"$oid":"a"},"userId":"u1","name":"Netflix","price":300,"dueDate":{"$date":"2024-01-31T00:00:00Z"},"usageHours":10,"lastUsed":{"$date":"2024-01-15T00:00:00Z"}}
{"_id":{"$oid":"b"},"userId":"u2","name":"Prime","price":100,"dueDate":{"$date":"2024-01-31T00:00:00Z"},"usageHours":0,"lastUsed":null}
{"_id":{"$oid":"c"},"userId":"u1","name":"Hulu","dueDate":{"$date":"2024-01-31T00:00:00Z"}}
"#;

    #[test]
    fn test_load_mongoexport_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "subscriptions.json", EXPORT);

        let entries = FileRecordSource::new(&path, "UTC").load().unwrap();
        assert_eq!(entries.len(), 3);
        let ids: Vec<&str> = entries
            .iter()
            .map(|e| e.as_ref().unwrap().id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_user_filter() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "subscriptions.json", EXPORT);

        let entries = FileRecordSource::new(&path, "UTC")
            .with_user(Some("u1".to_string()))
            .load()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|e| e.as_ref().unwrap().user_id.as_deref() == Some("u1")));
    }

    #[test]
    fn test_malformed_line_becomes_rejection() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.jsonl", "{\"_id\":\"x\",\"price\":1}\nnot json\n");

        let entries = FileRecordSource::new(dir.path(), "UTC").load().unwrap();
        assert_eq!(entries.len(), 2);
        let rejected = entries[1].as_ref().unwrap_err();
        assert_eq!(rejected.record_id, "a.jsonl:2");
        assert!(matches!(rejected.reason, RecordError::InvalidValue { .. }));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "1.json", r#"[{"_id":"dup","name":"first"}]"#);
        write(dir.path(), "2.json", r#"[{"_id":"dup","name":"second"}]"#);

        let entries = FileRecordSource::new(dir.path(), "UTC").load().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_ref().unwrap().name, "first");
    }

    #[test]
    fn test_missing_path_is_fatal() {
        let source = FileRecordSource::new("/tmp/does-not-exist-subtrack-source", "UTC");
        assert!(matches!(
            source.fetch(),
            Err(TrackerError::DataPathNotFound(_))
        ));
    }

    #[test]
    fn test_directory_without_data_files_is_fatal() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "readme.txt", "nothing here");
        assert!(matches!(
            FileRecordSource::new(dir.path(), "UTC").fetch(),
            Err(TrackerError::NoDataFiles(_))
        ));
    }

    #[test]
    fn test_date_only_due_date_is_utc_in_any_zone() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "subscriptions.json",
            r#"[{"_id":"A","price":300,"dueDate":"2024-03-31"}]"#,
        );
        let source = FileRecordSource::new(&path, "Asia/Kolkata");

        let runner = BatchRunner::new(Box::new(CollectingNotifier::new()), BatchConfig::default());
        let report = runner
            .run(&source, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
            .unwrap();

        let cost = &report.costs[0];
        assert_eq!(cost.cycle.end, Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap());
        assert_eq!(cost.cycle.length_days, 31);
        assert!((round_to(cost.daily_cost, 2) - 9.68).abs() < 1e-9);
    }

    #[test]
    fn test_end_to_end_batch_from_file() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "subscriptions.json", EXPORT);
        let source = FileRecordSource::new(&path, "UTC");

        let runner = BatchRunner::new(Box::new(CollectingNotifier::new()), BatchConfig::default());
        let now = Utc.with_ymd_and_hms(2024, 1, 25, 0, 0, 0).unwrap();
        let report = runner.run(&source, now).unwrap();

        assert_eq!(report.records_seen, 3);
        assert_eq!(report.costs.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].record_id, "c");
        assert!((round_to(report.total_daily_cost, 2) - 12.9).abs() < 1e-9);
        assert_eq!(report.stale.len(), 1);
        assert_eq!(report.stale[0].record_id, "a");
    }
}
