//! Durable JSON snapshot of the conversation store.
//!
//! The snapshot is a JSON object mapping user id to an ordered list of
//! `{role, content, timestamp}` records. Writes go backup-then-atomic:
//! the current primary is copied to a fixed `.backup` path (best effort),
//! then the new snapshot is written to a temp file and renamed over the
//! primary so a crash never leaves a half-written file behind.
//!
//! A snapshot that fails to parse at load time is moved to a timestamped
//! quarantine path and the service starts with an empty store: availability
//! beats history durability here.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::PersistenceError;
use crate::history::store::Message;

/// On-disk shape of the conversation store.
pub type Snapshot = IndexMap<String, Vec<Message>>;

/// Reads and writes the snapshot file.
///
/// Holds no lock of its own; the session facade serializes every call,
/// so overlapping saves never interleave.
pub struct SnapshotStore {
    path: PathBuf,
    max_file_bytes: u64,
}

impl SnapshotStore {
    /// Create a store for the given snapshot path, creating parent
    /// directories if needed.
    pub fn new(path: PathBuf, max_file_bytes: u64) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            max_file_bytes,
        })
    }

    /// Path of the primary snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot, never failing startup.
    ///
    /// A missing or empty file yields an empty store. An unreadable or
    /// unparsable file is quarantined and also yields an empty store.
    pub fn load(&self) -> Snapshot {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "No snapshot found, starting with empty history");
            return Snapshot::new();
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Snapshot unreadable, quarantining");
                self.quarantine();
                return Snapshot::new();
            }
        };

        if content.trim().is_empty() {
            tracing::info!("Snapshot file is empty, starting with empty history");
            return Snapshot::new();
        }

        match serde_json::from_str::<Snapshot>(&content) {
            Ok(snapshot) => {
                tracing::info!(users = snapshot.len(), "Loaded conversation snapshot");
                snapshot
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Snapshot corrupted, quarantining");
                self.quarantine();
                Snapshot::new()
            }
        }
    }

    /// Persist the snapshot: best-effort backup of the current primary,
    /// then an atomic write-then-rename replace.
    pub fn save(&self, users: &Snapshot) -> Result<(), PersistenceError> {
        self.backup_if_present();
        self.write_atomic(users)?;
        tracing::debug!(users = users.len(), "Conversation snapshot saved");
        Ok(())
    }

    /// Log the snapshot size, warning above the configured threshold.
    /// Informational only; never blocks or fails writes.
    pub fn size_check(&self) {
        let Ok(meta) = std::fs::metadata(&self.path) else {
            return;
        };
        let size = meta.len();
        if size > self.max_file_bytes {
            tracing::warn!(
                bytes = size,
                limit = self.max_file_bytes,
                path = %self.path.display(),
                "Snapshot file exceeds size threshold"
            );
        } else {
            tracing::info!(bytes = size, "Snapshot file size");
        }
    }

    /// Copy the current primary to the fixed backup path. A backup failure
    /// is logged and never aborts the save.
    fn backup_if_present(&self) {
        if !self.path.exists() {
            return;
        }
        let backup = self.backup_path();
        if let Err(e) = std::fs::copy(&self.path, &backup) {
            tracing::warn!(path = %backup.display(), error = %e, "Could not create snapshot backup");
        }
    }

    fn write_atomic(&self, users: &Snapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(users)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Move a bad snapshot aside for forensic inspection, falling back to
    /// copy if the rename fails.
    fn quarantine(&self) {
        let target = self.quarantine_path();
        let moved = std::fs::rename(&self.path, &target)
            .or_else(|_| std::fs::copy(&self.path, &target).map(|_| ()));
        match moved {
            Ok(()) => {
                tracing::warn!(path = %target.display(), "Quarantined corrupted snapshot");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to quarantine corrupted snapshot");
            }
        }
    }

    /// Fixed backup path next to the primary: `<file>.backup`.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".backup");
        PathBuf::from(name)
    }

    fn quarantine_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".corrupt-{}", chrono::Utc::now().timestamp()));
        PathBuf::from(name)
    }
}
