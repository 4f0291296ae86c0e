//! Subscription file discovery and loading.
//!
//! A data path is either a single file or a directory searched recursively
//! for `.json` / `.jsonl` files. Each file may hold a JSON array of
//! documents, a single document, or one document per line (the default
//! `mongoexport` layout).

use std::path::{Path, PathBuf};

use serde_json::Value;
use subtrack_core::error::{Result, TrackerError};
use tracing::{debug, warn};

/// One document read from disk, or the reason a line could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// `file:line` for JSONL input, `file[index]` for arrays.
    pub location: String,
    pub value: std::result::Result<Value, String>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Resolve the data path: `data_path` when given, otherwise
/// `~/.subtrack/subscriptions.json`.
pub fn resolve_data_path(data_path: Option<&Path>) -> PathBuf {
    if let Some(p) = data_path {
        return p.to_path_buf();
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(subtrack_core::settings::CONFIG_DIR_NAME)
        .join("subscriptions.json")
}

/// Find all `.json` / `.jsonl` files under `data_path`, sorted by path.
///
/// A file path is returned as-is regardless of its extension.
pub fn find_data_files(data_path: &Path) -> Vec<PathBuf> {
    if data_path.is_file() {
        return vec![data_path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == "json" || ext == "jsonl")
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Read every document from `file_path`.
///
/// An unreadable file or a malformed JSON array fails the whole file; a
/// malformed line in line-delimited input becomes a [`RawDocument`] carrying
/// the parse error so the rest of the file still loads.
pub fn read_documents(file_path: &Path) -> Result<Vec<RawDocument>> {
    let content = std::fs::read_to_string(file_path).map_err(|source| TrackerError::FileRead {
        path: file_path.to_path_buf(),
        source,
    })?;
    let label = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.display().to_string());

    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        debug!(file = %file_path.display(), "empty data file");
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        let docs: Vec<Value> = serde_json::from_str(trimmed)?;
        return Ok(docs
            .into_iter()
            .enumerate()
            .map(|(i, value)| RawDocument {
                location: format!("{label}[{i}]"),
                value: Ok(value),
            })
            .collect());
    }

    // A single pretty-printed document spans several lines.
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(vec![RawDocument {
            location: format!("{label}:1"),
            value: Ok(value),
        }]);
    }

    let mut docs = Vec::new();
    let mut malformed = 0usize;
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value = serde_json::from_str::<Value>(line).map_err(|e| {
            malformed += 1;
            format!("malformed JSON: {e}")
        });
        docs.push(RawDocument {
            location: format!("{label}:{}", idx + 1),
            value,
        });
    }

    if malformed > 0 {
        warn!(
            file = %file_path.display(),
            malformed,
            "some lines could not be parsed"
        );
    }
    debug!(file = %file_path.display(), documents = docs.len(), "file read");

    Ok(docs)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{content}").unwrap();
        path
    }

    // ── find_data_files ───────────────────────────────────────────────────────

    #[test]
    fn test_find_data_files_filters_extensions() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.json", "[]");
        write_file(dir.path(), "b.jsonl", "");
        write_file(dir.path(), "notes.txt", "ignored");

        let files = find_data_files(dir.path());
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_find_data_files_recursive_and_sorted() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("users");
        std::fs::create_dir_all(&sub).unwrap();
        write_file(dir.path(), "c.json", "[]");
        write_file(&sub, "a.jsonl", "");

        let files = find_data_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("c.json"));
        assert!(files[1].ends_with("users/a.jsonl"));
    }

    #[test]
    fn test_find_data_files_single_file_any_extension() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "export.dump", "{}");
        assert_eq!(find_data_files(&path), vec![path]);
    }

    #[test]
    fn test_find_data_files_nonexistent_path() {
        let files = find_data_files(Path::new("/tmp/does-not-exist-subtrack-test-xyz"));
        assert!(files.is_empty());
    }

    // ── resolve_data_path ─────────────────────────────────────────────────────

    #[test]
    fn test_resolve_data_path_explicit() {
        let p = Path::new("/srv/subs.json");
        assert_eq!(resolve_data_path(Some(p)), p.to_path_buf());
    }

    #[test]
    fn test_resolve_data_path_default() {
        assert!(resolve_data_path(None).ends_with(".subtrack/subscriptions.json"));
    }

    // ── read_documents ────────────────────────────────────────────────────────

    #[test]
    fn test_read_json_array() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "subs.json", r#"[{"_id":"a"},{"_id":"b"}]"#);

        let docs = read_documents(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].location, "subs.json[0]");
        assert_eq!(docs[1].location, "subs.json[1]");
        assert!(docs.iter().all(|d| d.value.is_ok()));
    }

    #[test]
    fn test_read_single_pretty_document() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "one.json", "{\n  \"_id\": \"a\",\n  \"price\": 5\n}\n");

        let docs = read_documents(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].value.as_ref().unwrap()["price"], 5);
    }

    #[test]
    fn test_read_jsonl_with_malformed_line() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "export.jsonl",
            "{\"_id\":\"a\"}\n\n{broken\n{\"_id\":\"c\"}\n",
        );

        let docs = read_documents(&path).unwrap();
        assert_eq!(docs.len(), 3);
        assert!(docs[0].value.is_ok());
        assert_eq!(docs[1].location, "export.jsonl:3");
        assert!(docs[1].value.is_err());
        assert_eq!(docs[2].location, "export.jsonl:4");
    }

    #[test]
    fn test_read_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "empty.json", "  \n");
        assert!(read_documents(&path).unwrap().is_empty());
    }

    #[test]
    fn test_read_malformed_array_fails_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "bad.json", "[{\"_id\": \"a\"},");
        assert!(matches!(
            read_documents(&path),
            Err(TrackerError::JsonParse(_))
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_documents(Path::new("/tmp/does-not-exist-subtrack-xyz.json")).unwrap_err();
        assert!(matches!(err, TrackerError::FileRead { .. }));
    }
}
