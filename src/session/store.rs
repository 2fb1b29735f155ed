use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::SessionRecord;

/// On-disk shape of the registry document
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    sessions: Vec<SessionRecord>,
}

/// Borrowing counterpart of [`StoreFile`] used for writes
#[derive(Serialize)]
struct StoreFileRef<'a> {
    sessions: &'a [SessionRecord],
}

/// Persisted session registry.
///
/// One read/write lock guards the in-memory records; every mutation rewrites
/// the full document while the write lock is held, so concurrent mutations
/// cannot interleave their disk writes. Reads hand out clones, never
/// references into the guarded vector.
///
/// If the disk write fails the in-memory mutation stands and the error is
/// returned to the caller; the next successful mutation reconciles the file.
pub struct Store {
    records: RwLock<Vec<SessionRecord>>,
    path: PathBuf,
}

impl Store {
    /// Open the registry at `path`, loading existing records if present
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(data) => {
                let file: StoreFile = serde_json::from_str(&data)
                    .with_context(|| format!("Failed to parse session registry: {:?}", path))?;
                file.sessions
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read session registry: {:?}", path))
            }
        };

        Ok(Self {
            records: RwLock::new(records),
            path,
        })
    }

    /// Path of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record
    pub fn add(&self, record: SessionRecord) -> Result<()> {
        let mut records = self.records.write();
        records.push(record);
        self.persist(&records)
    }

    /// Remove a record by identifier. No-op if not found.
    pub fn remove(&self, id: &str) -> Result<()> {
        let mut records = self.records.write();
        records.retain(|r| r.id != id);
        self.persist(&records)
    }

    /// Replace a record in place, matched by identifier. No-op if not found.
    pub fn update(&self, record: &SessionRecord) -> Result<()> {
        let mut records = self.records.write();
        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
        }
        self.persist(&records)
    }

    /// Find a record by branch name
    pub fn find_by_branch(&self, branch: &str) -> Option<SessionRecord> {
        self.records
            .read()
            .iter()
            .find(|r| r.branch == branch)
            .cloned()
    }

    /// Find a record by identifier
    pub fn find_by_id(&self, id: &str) -> Option<SessionRecord> {
        self.records.read().iter().find(|r| r.id == id).cloned()
    }

    /// Snapshot copy of all records
    pub fn get_all(&self) -> Vec<SessionRecord> {
        self.records.read().clone()
    }

    fn persist(&self, records: &[SessionRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create registry directory: {:?}", dir))?;
        }
        let doc = serde_json::to_string_pretty(&StoreFileRef { sessions: records })
            .context("Failed to serialize session registry")?;
        std::fs::write(&self.path, doc)
            .with_context(|| format!("Failed to write session registry: {:?}", self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionRecord, SessionStatus};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("sessions.json")).expect("open store");
        (dir, store)
    }

    #[test]
    fn test_add_then_find() {
        let (_dir, store) = temp_store();
        let record = SessionRecord::new("feature/x", "/repo", "/repo");
        store.add(record.clone()).expect("add");

        let found = store.find_by_branch("feature/x").expect("should find");
        assert_eq!(found, record);
        assert_eq!(store.find_by_id(&record.id), Some(record));
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = temp_store();
        let record = SessionRecord::new("feature/x", "/repo", "/repo");
        let id = record.id.clone();
        store.add(record).expect("add");
        store.remove(&id).expect("remove");

        assert!(store.find_by_branch("feature/x").is_none());
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn test_update_replaces_by_id() {
        let (_dir, store) = temp_store();
        let mut record = SessionRecord::new("main", "/repo", "/repo");
        store.add(record.clone()).expect("add");

        record.status = SessionStatus::WaitingInput;
        record.needs_input = true;
        store.update(&record).expect("update");

        let found = store.find_by_id(&record.id).expect("should find");
        assert_eq!(found.status, SessionStatus::WaitingInput);
        assert!(found.needs_input);
    }

    #[test]
    fn test_update_missing_is_noop() {
        let (_dir, store) = temp_store();
        let record = SessionRecord::new("main", "/repo", "/repo");
        store.update(&record).expect("update should not fail");
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let (_dir, store) = temp_store();
        store
            .add(SessionRecord::new("main", "/repo", "/repo"))
            .expect("add");

        let mut snapshot = store.get_all();
        snapshot[0].branch = "mutated".to_string();
        assert_eq!(store.get_all()[0].branch, "main");
    }

    #[test]
    fn test_reload_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");

        let store = Store::open(&path).expect("open");
        let record = SessionRecord::new("feature/y", "/repo", "/repo");
        store.add(record.clone()).expect("add");
        drop(store);

        let reopened = Store::open(&path).expect("reopen");
        assert_eq!(reopened.get_all(), vec![record]);
    }

    #[test]
    fn test_concurrent_mutations_keep_document_consistent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sessions.json");
        let store = Arc::new(Store::open(&path).expect("open"));

        let adds: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .add(SessionRecord::new(format!("branch-{}", i), "/repo", "/repo"))
                        .expect("add");
                })
            })
            .collect();
        for handle in adds {
            handle.join().expect("join");
        }

        // Remove two of them concurrently with an update
        let ids: Vec<String> = store.get_all().iter().map(|r| r.id.clone()).collect();
        let removes: Vec<_> = ids[..2]
            .iter()
            .cloned()
            .map(|id| {
                let store = store.clone();
                std::thread::spawn(move || store.remove(&id).expect("remove"))
            })
            .collect();
        for handle in removes {
            handle.join().expect("join");
        }

        // Net count survives in memory and on disk, and the document parses
        assert_eq!(store.get_all().len(), 6);
        let reopened = Store::open(&path).expect("reopen");
        assert_eq!(reopened.get_all().len(), 6);
    }
}
