//! Capped, newest-first log of completed uploads, persisted as
//! `history.json` inside the shared directory.

use std::{
    io,
    path::{Path, PathBuf},
};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

pub const HISTORY_FILE_NAME: &str = "history.json";
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub name: String,
    pub size: u64,
    pub uploaded_at: String,
}

impl UploadRecord {
    /// A record stamped with the current local time.
    pub fn now(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            uploaded_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history file io: {0}")]
    Io(#[from] io::Error),

    #[error("history serialization: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct HistoryStore {
    path: PathBuf,
    // Serializes the read-modify-write cycle of `append`.
    lock: Mutex<()>,
}

impl HistoryStore {
    pub fn open(root_dir: &Path) -> Self {
        Self {
            path: root_dir.join(HISTORY_FILE_NAME),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current history, newest first. A missing, unreadable or malformed file
    /// reads as empty.
    pub async fn read(&self) -> Vec<UploadRecord> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        match serde_json::from_slice(&data) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "Ignoring malformed history file {}: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Prepends `record`, keeps at most [`HISTORY_LIMIT`] entries and writes
    /// the result back.
    pub async fn append(&self, record: UploadRecord) -> Result<(), HistoryError> {
        let _guard = self.lock.lock().await;

        let mut records = self.read().await;
        records.insert(0, record);
        records.truncate(HISTORY_LIMIT);

        let data = serde_json::to_vec(&records)?;
        self.replace_file(&data).await?;
        debug!("History now holds {} entries", records.len());
        Ok(())
    }

    // Write to a sibling temp file and rename over the target so readers never
    // observe a half-written history.
    async fn replace_file(&self, data: &[u8]) -> io::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = dir.join(format!(".{}.{}.tmp", HISTORY_FILE_NAME, Uuid::new_v4()));
        fs::write(&tmp, data).await?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(name: &str) -> UploadRecord {
        UploadRecord {
            name: name.to_string(),
            size: 10,
            uploaded_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path());
        assert!(store.read().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_reads_as_empty_and_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HISTORY_FILE_NAME), b"{not json").unwrap();
        let store = HistoryStore::open(dir.path());
        assert!(store.read().await.is_empty());

        store.append(record("a.txt")).await.unwrap();
        assert_eq!(store.read().await, vec![record("a.txt")]);
    }

    #[tokio::test]
    async fn keeps_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path());
        for name in ["one", "two", "three"] {
            store.append(record(name)).await.unwrap();
        }
        let names: Vec<_> = store.read().await.into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["three", "two", "one"]);
    }

    #[tokio::test]
    async fn caps_at_limit_evicting_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path());

        for i in 0..HISTORY_LIMIT {
            store.append(record(&format!("f{i}"))).await.unwrap();
        }
        assert_eq!(store.read().await.len(), HISTORY_LIMIT);

        store.append(record("latest")).await.unwrap();
        let records = store.read().await;
        assert_eq!(records.len(), HISTORY_LIMIT);
        assert_eq!(records[0].name, "latest");
        assert_eq!(records[HISTORY_LIMIT - 1].name, "f1");
        assert!(records.iter().all(|r| r.name != "f0"));
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(HistoryStore::open(dir.path()));

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.append(record(&format!("c{i}"))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let records = store.read().await;
        assert_eq!(records.len(), 20);
        for i in 0..20 {
            assert!(records.iter().any(|r| r.name == format!("c{i}")));
        }
    }

    #[tokio::test]
    async fn persists_plain_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path());
        store.append(record("a.txt")).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["name"], "a.txt");
        assert_eq!(value[0]["size"], 10);
        assert_eq!(value[0]["uploaded_at"], "2024-01-01 00:00:00");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn timestamps_use_readable_format() {
        let record = UploadRecord::now("a", 1);
        let parsed =
            chrono::NaiveDateTime::parse_from_str(&record.uploaded_at, "%Y-%m-%d %H:%M:%S");
        assert!(parsed.is_ok(), "{}", record.uploaded_at);
    }
}
