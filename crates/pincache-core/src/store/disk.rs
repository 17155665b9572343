//! On-disk tier of the local store.
//!
//! The store directory holds a JSON index of the entity graph and one blob
//! file per photo:
//!
//! ```text
//! <root>/.lock
//! <root>/pins.json
//! <root>/photos/<photo-id>.bin
//! ```
//!
//! `.lock` is held exclusively by one `DiskStore` at a time. Id allocation
//! lives in the in-memory graph, so two writers on one directory would hand
//! out the same ids and overwrite each other's commits.
//!
//! A commit writes new blobs first, then swaps the index in with a rename,
//! then removes blobs of deleted photos. A crash at any point leaves an
//! index whose blobs all exist.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::{Photo, PhotoId, Pin, PinId, DEFAULT_PAGE_NUMBER};

use super::{EntityGraph, StoreError};

/// Current on-disk schema.
/// v1: pins without pagination or sync time. v2: adds `page_number`, `synced_at`.
pub const SCHEMA_VERSION: u32 = 2;

const INDEX_FILE: &str = "pins.json";
const INDEX_TMP_FILE: &str = "pins.json.tmp";
const BLOB_DIR: &str = "photos";
const LOCK_FILE: &str = ".lock";

#[derive(Debug, Serialize, Deserialize)]
struct StoreIndex {
    schema_version: u32,
    #[serde(default)]
    saved_at: DateTime<Utc>,
    #[serde(default)]
    next_pin_id: u64,
    #[serde(default)]
    next_photo_id: u64,
    #[serde(default)]
    pins: Vec<Pin>,
    #[serde(default)]
    photos: Vec<PhotoEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PhotoEntry {
    id: PhotoId,
    pin_id: PinId,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    cached_at: DateTime<Utc>,
}

pub struct DiskStore {
    root: PathBuf,
    /// Exclusive lock on `<root>/.lock`; released when dropped.
    lock: Option<File>,
}

impl DiskStore {
    /// Open the store directory, creating it if needed, and lock it.
    /// Fails with `StoreError::Locked` if another handle holds the lock.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut store = Self {
            root: root.into(),
            lock: None,
        };
        store.ensure_dirs()?;
        store.lock = Some(store.acquire_lock()?);
        Ok(store)
    }

    fn acquire_lock(&self) -> Result<File, StoreError> {
        let path = self.root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(file),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(StoreError::Locked(self.root.clone()))
            }
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Give up the directory lock. Later opens of the same root succeed.
    pub fn unlock(&mut self) {
        if self.lock.take().is_some() {
            debug!(path = %self.root.display(), "Store lock released");
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_dirs(&self) -> Result<(), StoreError> {
        let blobs = self.root.join(BLOB_DIR);
        std::fs::create_dir_all(&blobs).map_err(|e| StoreError::io(&blobs, e))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn blob_path(&self, id: PhotoId) -> PathBuf {
        self.root.join(BLOB_DIR).join(format!("{}.bin", id))
    }

    /// Load the graph, migrating older schemas. A missing index is an empty store.
    ///
    /// Every photo blob is read into memory, so the cost of opening grows with
    /// the size of the image cache (at most one page of photos per pin).
    pub fn load(&self) -> Result<EntityGraph, StoreError> {
        let path = self.index_path();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(EntityGraph::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let index = migrate(serde_json::from_str(&contents)?)?;

        let mut photos = Vec::with_capacity(index.photos.len());
        for entry in index.photos {
            let blob = self.blob_path(entry.id);
            match std::fs::read(&blob) {
                Ok(bytes) => photos.push(Photo {
                    id: entry.id,
                    pin_id: entry.pin_id,
                    image_data: Arc::from(bytes),
                    source_url: entry.source_url,
                    cached_at: entry.cached_at,
                }),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(photo = %entry.id, "Photo blob missing, dropping entry");
                }
                Err(e) => return Err(StoreError::io(&blob, e)),
            }
        }

        Ok(EntityGraph::from_parts(
            index.pins,
            photos,
            index.next_pin_id,
            index.next_photo_id,
        ))
    }

    /// Persist `next`, given that `previous` is what is currently on disk.
    pub fn commit(&self, previous: &EntityGraph, next: &EntityGraph) -> Result<(), StoreError> {
        self.ensure_dirs()?;

        for photo in next.fetch_photos(|p| previous.photo(p.id).is_none()) {
            let blob = self.blob_path(photo.id);
            std::fs::write(&blob, &photo.image_data[..]).map_err(|e| StoreError::io(&blob, e))?;
        }

        let (next_pin_id, next_photo_id) = next.next_ids();
        let index = StoreIndex {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            next_pin_id,
            next_photo_id,
            pins: next.pins().into_iter().cloned().collect(),
            photos: next
                .fetch_photos(|_| true)
                .into_iter()
                .map(|p| PhotoEntry {
                    id: p.id,
                    pin_id: p.pin_id,
                    source_url: p.source_url.clone(),
                    cached_at: p.cached_at,
                })
                .collect(),
        };

        let tmp = self.root.join(INDEX_TMP_FILE);
        let contents = serde_json::to_string_pretty(&index)?;
        std::fs::write(&tmp, contents).map_err(|e| StoreError::io(&tmp, e))?;
        let path = self.index_path();
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;

        // Index no longer references these; a leftover blob is harmless.
        for photo in previous.fetch_photos(|p| next.photo(p.id).is_none()) {
            let blob = self.blob_path(photo.id);
            if let Err(e) = std::fs::remove_file(&blob) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %blob.display(), error = %e, "Failed to remove stale photo blob");
                }
            }
        }

        debug!(
            pins = index.pins.len(),
            photos = index.photos.len(),
            "Store committed to disk"
        );
        Ok(())
    }

    /// Remove the index and every photo blob. The lock stays held.
    pub fn destroy(&self) -> Result<(), StoreError> {
        let blobs = self.root.join(BLOB_DIR);
        match std::fs::remove_dir_all(&blobs) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&blobs, e)),
        }
        for name in [INDEX_FILE, INDEX_TMP_FILE] {
            let path = self.root.join(name);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
        self.ensure_dirs()?;
        info!(path = %self.root.display(), "Store dropped");
        Ok(())
    }
}

/// Bring a raw index up to `SCHEMA_VERSION`.
fn migrate(mut raw: Value) -> Result<StoreIndex, StoreError> {
    let version = raw
        .get("schema_version")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32;

    if version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema(version));
    }
    if version < SCHEMA_VERSION {
        info!(from = version, to = SCHEMA_VERSION, "Migrating store schema");
    }

    if version < 2 {
        migrate_v1_to_v2(&mut raw);
    }

    if let Some(obj) = raw.as_object_mut() {
        obj.insert("schema_version".to_string(), Value::from(SCHEMA_VERSION));
    }
    Ok(serde_json::from_value(raw)?)
}

fn migrate_v1_to_v2(raw: &mut Value) {
    let Some(pins) = raw.get_mut("pins").and_then(Value::as_array_mut) else {
        return;
    };
    for pin in pins.iter_mut().filter_map(Value::as_object_mut) {
        pin.entry("page_number")
            .or_insert_with(|| Value::from(DEFAULT_PAGE_NUMBER));
        pin.entry("synced_at").or_insert(Value::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, NewPhoto};

    fn photo(tag: &str) -> NewPhoto {
        NewPhoto::new(tag.as_bytes().to_vec(), None)
    }

    #[test]
    fn test_load_missing_index_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let disk = DiskStore::open(dir.path().join("store")).expect("open");
        let graph = disk.load().expect("load");
        assert!(graph.is_empty());
    }

    #[test]
    fn test_commit_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let disk = DiskStore::open(dir.path()).expect("open");

        let empty = EntityGraph::new();
        let mut graph = EntityGraph::new();
        let pin = graph.insert_pin(Coordinate::new(37.7749, -122.4194), 3);
        graph.insert_photo(pin, photo("first")).unwrap();
        graph.insert_photo(pin, photo("second")).unwrap();
        disk.commit(&empty, &graph).expect("commit");

        let loaded = disk.load().expect("load");
        assert_eq!(loaded.pin(pin).map(|p| p.page_number), Some(3));
        let bytes: Vec<Vec<u8>> = loaded
            .photos_for(pin)
            .iter()
            .map(|p| p.image_data.to_vec())
            .collect();
        assert_eq!(bytes, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn test_commit_removes_stale_blobs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let disk = DiskStore::open(dir.path()).expect("open");

        let empty = EntityGraph::new();
        let mut before = EntityGraph::new();
        let pin = before.insert_pin(Coordinate::new(1.0, 1.0), 1);
        let old = before.insert_photo(pin, photo("old")).unwrap();
        disk.commit(&empty, &before).unwrap();
        assert!(disk.blob_path(old).exists());

        let mut after = before.clone();
        after.delete_pin(pin).unwrap();
        disk.commit(&before, &after).unwrap();
        assert!(!disk.blob_path(old).exists());
        assert!(disk.load().unwrap().is_empty());
    }

    #[test]
    fn test_load_drops_photo_with_missing_blob() {
        let dir = tempfile::tempdir().expect("tempdir");
        let disk = DiskStore::open(dir.path()).expect("open");

        let mut graph = EntityGraph::new();
        let pin = graph.insert_pin(Coordinate::new(1.0, 1.0), 1);
        let lost = graph.insert_photo(pin, photo("lost")).unwrap();
        let kept = graph.insert_photo(pin, photo("kept")).unwrap();
        disk.commit(&EntityGraph::new(), &graph).unwrap();
        std::fs::remove_file(disk.blob_path(lost)).unwrap();

        let loaded = disk.load().unwrap();
        let ids: Vec<PhotoId> = loaded.photos_for(pin).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![kept]);
    }

    #[test]
    fn test_migrates_v1_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let disk = DiskStore::open(dir.path()).expect("open");
        let v1 = r#"{
            "schema_version": 1,
            "pins": [{"id": 0, "latitude": 40.7128, "longitude": -74.006}],
            "photos": [{"id": 0, "pin_id": 0}]
        }"#;
        std::fs::write(dir.path().join(INDEX_FILE), v1).unwrap();
        std::fs::write(disk.blob_path(PhotoId(0)), b"legacy").unwrap();

        let mut graph = disk.load().expect("v1 index should migrate");
        let pin = graph.pin(PinId(0)).expect("pin survives migration");
        assert_eq!(pin.page_number, DEFAULT_PAGE_NUMBER);
        assert!(pin.synced_at.is_none());
        assert_eq!(graph.photos_for(PinId(0)).len(), 1);
        assert_eq!(graph.insert_pin(Coordinate::new(0.0, 0.0), 1), PinId(1));
    }

    #[test]
    fn test_rejects_newer_schema() {
        let dir = tempfile::tempdir().expect("tempdir");
        let disk = DiskStore::open(dir.path()).expect("open");
        std::fs::write(dir.path().join(INDEX_FILE), r#"{"schema_version": 99}"#).unwrap();
        assert!(matches!(disk.load(), Err(StoreError::UnsupportedSchema(99))));
    }

    #[test]
    fn test_corrupt_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let disk = DiskStore::open(dir.path()).expect("open");
        std::fs::write(dir.path().join(INDEX_FILE), "{ truncated").unwrap();
        assert!(matches!(disk.load(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_destroy_recreates_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let disk = DiskStore::open(dir.path().join("store")).expect("open");
        let mut graph = EntityGraph::new();
        let pin = graph.insert_pin(Coordinate::new(1.0, 1.0), 1);
        graph.insert_photo(pin, photo("a")).unwrap();
        disk.commit(&EntityGraph::new(), &graph).unwrap();

        disk.destroy().expect("destroy");
        assert!(disk.root().join(BLOB_DIR).is_dir());
        assert!(disk.load().unwrap().is_empty());
        // Still locked after a reset.
        assert!(matches!(
            DiskStore::open(disk.root()),
            Err(StoreError::Locked(_))
        ));
    }

    #[test]
    fn test_second_open_is_locked_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut first = DiskStore::open(dir.path()).expect("open");

        let err = DiskStore::open(dir.path()).err().expect("second open must fail");
        assert!(matches!(err, StoreError::Locked(ref path) if path == dir.path()));

        first.unlock();
        DiskStore::open(dir.path()).expect("open after unlock");
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        drop(DiskStore::open(dir.path()).expect("open"));
        DiskStore::open(dir.path()).expect("reopen after drop");
    }

    #[test]
    fn test_stale_blob_removal_failure_keeps_commit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let disk = DiskStore::open(dir.path()).expect("open");

        let mut before = EntityGraph::new();
        let pin = before.insert_pin(Coordinate::new(1.0, 1.0), 1);
        let stuck = before.insert_photo(pin, photo("stuck")).unwrap();
        disk.commit(&EntityGraph::new(), &before).unwrap();

        // A directory in place of the blob makes remove_file fail.
        let blob = disk.blob_path(stuck);
        std::fs::remove_file(&blob).unwrap();
        std::fs::create_dir(&blob).unwrap();
        std::fs::write(blob.join("keep"), b"x").unwrap();

        let mut after = before.clone();
        after.delete_photos_for(pin).unwrap();
        disk.commit(&before, &after).expect("cleanup failure must not fail the commit");

        assert!(blob.is_dir());
        let loaded = disk.load().unwrap();
        assert!(loaded.pin(pin).is_some());
        assert!(loaded.photos_for(pin).is_empty());
    }
}
