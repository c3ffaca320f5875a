//! CSV record store. One directory tree per platform with `posts/` and
//! `comments/` subdirectories; one canonical combined file per
//! (platform, handle, kind). Earlier releases wrote date-stamped snapshot
//! files, so history loading globs by handle prefix and concatenates
//! whatever it finds.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use threadline_common::{Dataset, Handle, HarvestError, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Posts,
    Comments,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Posts => "posts",
            RecordKind::Comments => "comments",
        }
    }
}

pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn kind_dir(&self, handle: &Handle, kind: RecordKind) -> PathBuf {
        self.root
            .join(handle.platform.as_str())
            .join(kind.as_str())
    }

    fn file_prefix(handle: &Handle) -> String {
        format!("{}_{}", handle.account, handle.platform)
    }

    fn canonical_path(&self, handle: &Handle, kind: RecordKind) -> PathBuf {
        self.kind_dir(handle, kind)
            .join(format!("{}_{}.csv", Self::file_prefix(handle), kind.as_str()))
    }

    /// Load everything previously persisted for (handle, kind). Multiple
    /// matching files (canonical + old snapshots) are concatenated in
    /// lexicographic filename order. Nothing on disk is an empty dataset;
    /// unreadable files and rows are logged and skipped, never fatal.
    pub fn load_history(&self, handle: &Handle, kind: RecordKind) -> Dataset {
        let dir = self.kind_dir(handle, kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Dataset::new(),
        };

        let prefix = Self::file_prefix(handle);
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension().and_then(|e| e.to_str()) == Some("csv")
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();
        paths.sort();

        let mut dataset = Dataset::new();
        for path in paths {
            dataset.append(read_csv(&path));
        }
        if !dataset.is_empty() {
            info!(
                handle = %handle,
                kind = kind.as_str(),
                rows = dataset.len(),
                "Loaded history"
            );
        }
        dataset
    }

    /// Write the canonical combined file for (handle, kind), fully
    /// replacing any previous content. The caller is responsible for having
    /// merged prior history into `dataset` first. Replacement goes through
    /// a temp file + rename so a crash mid-write leaves the old snapshot.
    pub fn persist(
        &self,
        handle: &Handle,
        kind: RecordKind,
        dataset: &Dataset,
    ) -> Result<PathBuf, HarvestError> {
        let dir = self.kind_dir(handle, kind);
        fs::create_dir_all(&dir)
            .map_err(|e| HarvestError::Persistence(format!("creating {}: {e}", dir.display())))?;

        let path = self.canonical_path(handle, kind);
        let tmp = path.with_extension("csv.tmp");
        write_csv(&tmp, dataset)
            .map_err(|e| HarvestError::Persistence(format!("writing {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path).map_err(|e| {
            HarvestError::Persistence(format!("replacing {}: {e}", path.display()))
        })?;

        info!(
            handle = %handle,
            kind = kind.as_str(),
            rows = dataset.len(),
            path = %path.display(),
            "Persisted dataset"
        );
        Ok(path)
    }
}

/// Read one CSV file into a dataset. A file that cannot be opened, or rows
/// that fail to parse, are skipped with a warning.
fn read_csv(path: &Path) -> Dataset {
    let mut reader = match csv::Reader::from_path(path) {
        Ok(r) => r,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable history file");
            return Dataset::new();
        }
    };

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(str::to_string).collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping history file with bad header");
            return Dataset::new();
        }
    };

    let mut dataset = Dataset::new();
    let mut bad_rows = 0usize;
    for result in reader.records() {
        match result {
            Ok(row) => {
                let record: Record = headers
                    .iter()
                    .zip(row.iter())
                    .map(|(k, v)| (k.clone(), Value::String(v.to_string())))
                    .collect();
                dataset.push(record);
            }
            Err(e) => {
                bad_rows += 1;
                warn!(path = %path.display(), error = %e, "Skipping unparseable row");
            }
        }
    }
    if bad_rows > 0 {
        warn!(path = %path.display(), skipped = bad_rows, "History file had unparseable rows");
    }
    dataset
}

fn write_csv(path: &Path, dataset: &Dataset) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(dataset.columns())?;
    for row in dataset.rows() {
        let cells: Vec<String> = dataset
            .columns()
            .iter()
            .map(|col| row.get(col).map(Dataset::cell_str).unwrap_or_default())
            .collect();
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use threadline_common::Platform;

    fn handle() -> Handle {
        Handle::new(Platform::Twitter, "acme")
    }

    fn dataset(rows: &[(&str, &str)]) -> Dataset {
        let mut ds = Dataset::new();
        for (id, text) in rows {
            let mut record = Record::new();
            record.insert("id".into(), json!(id));
            record.insert("text".into(), json!(text));
            ds.push(record);
        }
        ds
    }

    #[test]
    fn load_from_empty_store_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let ds = store.load_history(&handle(), RecordKind::Posts);
        assert!(ds.is_empty());
    }

    #[test]
    fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let h = handle();

        store
            .persist(&h, RecordKind::Posts, &dataset(&[("p1", "hello"), ("p2", "world")]))
            .unwrap();

        let loaded = store.load_history(&h, RecordKind::Posts);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(0, "id"), Some(&json!("p1")));
        assert_eq!(loaded.get(1, "text"), Some(&json!("world")));
    }

    #[test]
    fn persist_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let h = handle();

        store
            .persist(&h, RecordKind::Comments, &dataset(&[("c1", "a")]))
            .unwrap();
        store
            .persist(&h, RecordKind::Comments, &dataset(&[("c1", "a"), ("c2", "b")]))
            .unwrap();

        let loaded = store.load_history(&h, RecordKind::Comments);
        assert_eq!(loaded.len(), 2, "second write fully replaces the first");
    }

    #[test]
    fn history_concatenates_snapshot_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let h = handle();

        let posts_dir = dir.path().join("twitter").join("posts");
        fs::create_dir_all(&posts_dir).unwrap();
        fs::write(
            posts_dir.join("acme_twitter_2026-01-01.csv"),
            "id,text\np1,old\n",
        )
        .unwrap();
        fs::write(
            posts_dir.join("acme_twitter_2026-02-01.csv"),
            "id,text\np1,newer\np2,two\n",
        )
        .unwrap();

        let loaded = store.load_history(&h, RecordKind::Posts);
        assert_eq!(loaded.len(), 3);

        // Older snapshot loads first, so its row survives an id dedup.
        let outcome = loaded.dedupe_by("id");
        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.dataset.get(0, "text"), Some(&json!("old")));
    }

    #[test]
    fn other_handles_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());

        let posts_dir = dir.path().join("twitter").join("posts");
        fs::create_dir_all(&posts_dir).unwrap();
        fs::write(posts_dir.join("other_twitter_posts.csv"), "id\nx1\n").unwrap();

        let loaded = store.load_history(&handle(), RecordKind::Posts);
        assert!(loaded.is_empty());
    }

    #[test]
    fn corrupt_rows_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let h = handle();

        let comments_dir = dir.path().join("twitter").join("comments");
        fs::create_dir_all(&comments_dir).unwrap();
        // Middle row has the wrong field count.
        fs::write(
            comments_dir.join("acme_twitter_comments.csv"),
            "id,text\nc1,fine\nc2,broken,extra,fields\nc3,also fine\n",
        )
        .unwrap();

        let loaded = store.load_history(&h, RecordKind::Comments);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(1, "id"), Some(&json!("c3")));
    }

    #[test]
    fn nested_values_are_flattened_to_json_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let h = handle();

        let mut ds = Dataset::new();
        let mut record = Record::new();
        record.insert("id".into(), json!("p1"));
        record.insert("author".into(), json!({"userName": "acme"}));
        ds.push(record);

        store.persist(&h, RecordKind::Posts, &ds).unwrap();
        let loaded = store.load_history(&h, RecordKind::Posts);
        assert_eq!(
            loaded.get(0, "author"),
            Some(&json!(r#"{"userName":"acme"}"#))
        );
    }
}
