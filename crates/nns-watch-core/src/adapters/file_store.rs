use crate::domain::{Snapshot, SnapshotError};
use crate::ports::SnapshotStore;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File-backed snapshot store.
///
/// Writes go to a sibling `<name>.tmp` file which is flushed to disk and then
/// renamed over the canonical path, so a reader (or a restart after a crash)
/// sees either the previous snapshot or the new one, never a partial file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomically(&self, bytes: &[u8]) -> Result<(), SnapshotError> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SnapshotError::io(parent, e))?;
        }

        let temp_path = self.temp_path();
        if let Err(e) = self.replace_with_temp(&temp_path, bytes) {
            // The canonical file is untouched; don't leave a partial temp behind.
            if fs::remove_file(&temp_path).is_ok() {
                debug!(path = %temp_path.display(), "Removed partial snapshot");
            }
            return Err(e);
        }

        // Persist the rename itself; not every platform can open a directory.
        #[cfg(unix)]
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Ok(dir) = fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }
}

impl FileSnapshotStore {
    fn replace_with_temp(&self, temp_path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
        let mut file = fs::File::create(temp_path).map_err(|e| SnapshotError::io(temp_path, e))?;
        file.write_all(bytes)
            .map_err(|e| SnapshotError::io(temp_path, e))?;
        file.sync_all()
            .map_err(|e| SnapshotError::io(temp_path, e))?;
        drop(file);

        fs::rename(temp_path, &self.path).map_err(|e| SnapshotError::io(&self.path, e))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let bytes = snapshot.to_bytes()?;
        self.write_atomically(&bytes)?;

        debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            subscribers = snapshot.subscriber_count(),
            "Snapshot written"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No snapshot found");
                return Ok(None);
            }
            Err(e) => return Err(SnapshotError::io(&self.path, e)),
        };

        let snapshot = Snapshot::from_bytes(&bytes)?;
        info!(
            path = %self.path.display(),
            last_seen_proposal = snapshot.last_seen_proposal,
            subscribers = snapshot.subscriber_count(),
            "Snapshot loaded"
        );
        Ok(Some(snapshot))
    }
}
