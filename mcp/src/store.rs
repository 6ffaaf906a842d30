//! Durable project-info snapshot.
//!
//! A single JSON file holding `{schemaVersion, createdAt, projectInfoById}`.
//! Every read re-parses the file; nothing is cached here. Anything that fails
//! validation reads as "no snapshot", which callers treat as a cache miss.

use std::{
    collections::HashMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicI64, Ordering},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{backend::ProjectInfo, error::StorageError};

pub const SNAPSHOT_FILE: &str = "project-cache.json";
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub schema_version: u32,
    /// Epoch milliseconds
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub project_info_by_id: HashMap<String, ProjectInfo>,
}

impl CacheSnapshot {
    pub fn is_expired_at(&self, ttl_minutes: u64, now_ms: i64) -> bool {
        let ttl_ms = i64::try_from(ttl_minutes.saturating_mul(60_000)).unwrap_or(i64::MAX);
        now_ms > self.created_at.saturating_add(ttl_ms)
    }

    pub fn is_expired(&self, ttl_minutes: u64) -> bool {
        self.is_expired_at(ttl_minutes, now_millis())
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub struct PersistentCacheStore {
    path: PathBuf,
    last_created_at: AtomicI64,
}

impl PersistentCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_created_at: AtomicI64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot, folding every failure into `None`.
    pub fn load(&self) -> Option<CacheSnapshot> {
        match self.load_checked() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring unusable cache snapshot: {}", e);
                None
            }
        }
    }

    /// Like [`load`](Self::load) but reports why a present file was rejected.
    /// A missing file is `Ok(None)`.
    pub fn load_checked(&self) -> Result<Option<CacheSnapshot>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cache snapshot on disk");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        // Check the version before the body so a future layout is never half-parsed
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Header {
            schema_version: u32,
        }

        let header: Header = serde_json::from_str(&content)?;
        if header.schema_version != SCHEMA_VERSION {
            return Err(StorageError::SchemaMismatch {
                found: header.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        let snapshot: CacheSnapshot = serde_json::from_str(&content)?;
        if snapshot.created_at <= 0 {
            return Err(StorageError::MissingTimestamp);
        }
        Ok(Some(snapshot))
    }

    /// Absent snapshots count as expired.
    pub fn is_expired(&self, ttl_minutes: u64) -> bool {
        self.load()
            .map_or(true, |snapshot| snapshot.is_expired(ttl_minutes))
    }

    /// Write a new snapshot stamped with the current schema version and time.
    pub fn save(&self, projects: &HashMap<String, ProjectInfo>) -> Result<(), StorageError> {
        let snapshot = CacheSnapshot {
            schema_version: SCHEMA_VERSION,
            created_at: self.next_created_at(),
            project_info_by_id: projects.clone(),
        };
        let data = serde_json::to_vec_pretty(&snapshot)?;
        self.write_atomic(&data)?;

        info!(
            path = %self.path.display(),
            projects = projects.len(),
            "Saved cache snapshot"
        );
        Ok(())
    }

    /// Remove the snapshot. Clearing an absent snapshot succeeds.
    pub fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Cleared cache snapshot");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // createdAt never goes backwards for writes from this store, even if the
    // wall clock does.
    fn next_created_at(&self) -> i64 {
        let now = now_millis();
        let prev = self.last_created_at.fetch_max(now, Ordering::SeqCst);
        prev.max(now)
    }

    // Write to a uniquely named sibling, fsync, then rename over the target so
    // readers see either the old file or the new one.
    fn write_atomic(&self, data: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        let temp_path = self.path.with_file_name(
            self.path
                .file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        );

        let result = (|| {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: &str, name: &str) -> ProjectInfo {
        ProjectInfo {
            id: id.to_string(),
            name: name.to_string(),
            description: "desc".to_string(),
            base_path: format!("/{}", name.to_lowercase()),
            group_id: "1".to_string(),
            owner_id: "2".to_string(),
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> PersistentCacheStore {
        PersistentCacheStore::new(dir.path().join("nested").join(SNAPSHOT_FILE))
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut projects = HashMap::new();
        projects.insert("10".to_string(), project("10", "Payments"));
        projects.insert("20".to_string(), project("20", "Orders"));
        store.save(&projects).unwrap();

        let snapshot = store.load().expect("snapshot should load");
        assert_eq!(snapshot.schema_version, SCHEMA_VERSION);
        assert_eq!(snapshot.project_info_by_id, projects);
        assert!(snapshot.created_at > 0);
    }

    #[test]
    fn test_missing_file_is_absent_and_expired() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().is_none());
        assert!(store.load_checked().unwrap().is_none());
        assert!(store.is_expired(360));
    }

    #[test]
    fn test_corrupt_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);
        fs::write(&path, b"{\"schemaVersion\": 1, \"createdAt\": 17").unwrap();

        let store = PersistentCacheStore::new(&path);
        assert!(store.load().is_none());
        assert!(matches!(store.load_checked(), Err(StorageError::Json(_))));
    }

    #[test]
    fn test_schema_mismatch_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);
        fs::write(
            &path,
            br#"{"schemaVersion": 2, "createdAt": 1700000000000, "projectInfoById": {"10": 5}}"#,
        )
        .unwrap();

        let store = PersistentCacheStore::new(&path);
        assert!(store.load().is_none());
        assert!(matches!(
            store.load_checked(),
            Err(StorageError::SchemaMismatch {
                found: 2,
                expected: SCHEMA_VERSION
            })
        ));
    }

    #[test]
    fn test_missing_timestamp_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);
        fs::write(&path, br#"{"schemaVersion": 1, "projectInfoById": {}}"#).unwrap();

        let store = PersistentCacheStore::new(&path);
        assert!(matches!(
            store.load_checked(),
            Err(StorageError::MissingTimestamp)
        ));
        assert!(store.is_expired(360));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = now_millis();
        let stale = CacheSnapshot {
            schema_version: SCHEMA_VERSION,
            created_at: now - 361 * 60_000,
            project_info_by_id: HashMap::new(),
        };
        let fresh = CacheSnapshot {
            created_at: now - 359 * 60_000,
            ..stale.clone()
        };
        assert!(stale.is_expired_at(360, now));
        assert!(!fresh.is_expired_at(360, now));

        // Exactly at the boundary is not yet expired
        let edge = CacheSnapshot {
            created_at: now - 360 * 60_000,
            ..stale.clone()
        };
        assert!(!edge.is_expired_at(360, now));
        assert!(edge.is_expired_at(360, now + 1));
    }

    #[test]
    fn test_store_expiry_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);
        let stale = CacheSnapshot {
            schema_version: SCHEMA_VERSION,
            created_at: now_millis() - 361 * 60_000,
            project_info_by_id: HashMap::new(),
        };
        fs::write(&path, serde_json::to_vec(&stale).unwrap()).unwrap();

        let store = PersistentCacheStore::new(&path);
        assert!(store.is_expired(360));
        assert!(!store.is_expired(362));
    }

    #[test]
    fn test_created_at_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let projects = HashMap::from([("10".to_string(), project("10", "Payments"))]);

        store.save(&projects).unwrap();
        let first = store.load().unwrap().created_at;
        store.save(&projects).unwrap();
        let second = store.load().unwrap().created_at;
        assert!(second >= first);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let projects = HashMap::from([("10".to_string(), project("10", "Payments"))]);

        store.save(&projects).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentCacheStore::new(dir.path().join(SNAPSHOT_FILE));
        store
            .save(&HashMap::from([("10".to_string(), project("10", "Payments"))]))
            .unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![SNAPSHOT_FILE.to_string()]);
    }
}
