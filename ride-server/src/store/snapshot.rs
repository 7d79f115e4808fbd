//! JSON snapshot persistence for the in-memory store.
//!
//! The whole state is serialized under the store lock and written to disk
//! after the lock is released. Writes go to a temporary file that is then
//! renamed over the snapshot, so a crash leaves either the old or the new
//! file. Snapshots older than the last one written are skipped.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::{Captain, RideId, Rider};
use crate::ride::{Ride, TrackingSample};

use super::Deadline;
use super::error::StoreError;

/// On-disk form of the store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub next_ride_id: u64,
    pub rides: Vec<Ride>,
    pub captains: Vec<Captain>,
    pub riders: Vec<Rider>,
    pub tracking: Vec<(RideId, Vec<TrackingSample>)>,
    pub deadlines: Vec<Deadline>,
}

/// A serialized snapshot waiting to be written.
#[derive(Debug)]
pub(crate) struct PendingSnapshot {
    pub generation: u64,
    pub json: String,
}

/// Snapshot file on disk.
#[derive(Debug)]
pub struct SnapshotFile {
    path: PathBuf,
    /// Generation of the last snapshot written.
    written: Mutex<u64>,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: Mutex::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. `Ok(None)` if no file exists yet.
    pub(crate) fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Snapshot(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StoreError::Snapshot(format!("failed to parse snapshot: {e}")))
    }

    /// Write `pending` unless a newer snapshot has already been written.
    pub(crate) async fn write(&self, pending: PendingSnapshot) -> Result<(), StoreError> {
        let mut written = self.written.lock().await;
        if pending.generation <= *written {
            return Ok(());
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Snapshot(format!("failed to create snapshot directory: {e}"))
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, pending.json)
            .await
            .map_err(|e| StoreError::Snapshot(format!("failed to write snapshot: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Snapshot(format!("failed to replace snapshot: {e}")))?;

        *written = pending.generation;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_empty() {
        let file = SnapshotFile::new("/nonexistent/path/rides.json");
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rides.json");
        std::fs::write(&path, "{not json").unwrap();
        let file = SnapshotFile::new(&path);
        assert!(matches!(file.load(), Err(StoreError::Snapshot(_))));
    }

    #[tokio::test]
    async fn stale_generations_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("rides.json");
        let file = SnapshotFile::new(&path);

        let newer = Snapshot {
            next_ride_id: 7,
            ..Snapshot::default()
        };
        let older = Snapshot {
            next_ride_id: 3,
            ..Snapshot::default()
        };
        file.write(PendingSnapshot {
            generation: 2,
            json: serde_json::to_string(&newer).unwrap(),
        })
        .await
        .unwrap();
        file.write(PendingSnapshot {
            generation: 1,
            json: serde_json::to_string(&older).unwrap(),
        })
        .await
        .unwrap();

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded.next_ride_id, 7);
    }
}
