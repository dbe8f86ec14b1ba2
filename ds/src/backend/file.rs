//! File backend with stage-then-rename writes

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Backend;
use crate::error::{StoreError, StoreResponse};

/// Stores the document as a single file
///
/// Each persist writes a uniquely named temp file next to the canonical
/// path, syncs it, then renames it over the canonical path. A reader never
/// sees a half-written document. Writers take an exclusive advisory lock on
/// `<name>.lock` for the span of one transaction, so several stores (and
/// several processes) can share the file without losing updates.
pub struct FileBackend {
    path: PathBuf,
    lock: File,
}

impl FileBackend {
    /// Open (or prepare) the store file at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResponse<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "FileBackend::open: called");

        let dir = parent_dir(&path);
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Persistence(format!("failed to create {}: {}", dir.display(), e)))?;

        let lock_path = sibling(&path, "lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StoreError::Persistence(format!("failed to open {}: {}", lock_path.display(), e)))?;

        let mut backend = Self { path, lock };
        // Nobody is mid-write while we hold the lock, so any temp file is stale
        backend.lock()?;
        backend.sweep_temp_files();
        backend.unlock();
        info!(path = %backend.path.display(), "Opened file backend");
        Ok(backend)
    }

    /// Canonical document path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string())
    }

    fn temp_path(&self) -> PathBuf {
        parent_dir(&self.path).join(format!("{}.{}.tmp", self.file_name(), Uuid::now_v7().simple()))
    }

    /// Remove temp files left behind by a process that died mid-write
    fn sweep_temp_files(&self) {
        let prefix = format!("{}.", self.file_name());
        let Ok(entries) = fs::read_dir(parent_dir(&self.path)) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) && name.ends_with(".tmp") {
                debug!(%name, "FileBackend::sweep_temp_files: removing stale temp file");
                if let Err(e) = fs::remove_file(entry.path()) {
                    warn!(%name, error = %e, "Failed to remove stale temp file");
                }
            }
        }
    }

    fn write_staged(&self, temp: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = File::create(temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(temp, &self.path)?;
        sync_dir(&parent_dir(&self.path));
        Ok(())
    }
}

impl Backend for FileBackend {
    fn lock(&mut self) -> StoreResponse<()> {
        debug!(path = %self.path.display(), "FileBackend::lock: called");
        FileExt::lock_exclusive(&self.lock).map_err(|e| StoreError::Locked(format!("{}: {}", self.path.display(), e)))
    }

    fn unlock(&mut self) {
        if let Err(e) = FileExt::unlock(&self.lock) {
            warn!(path = %self.path.display(), error = %e, "Failed to release store lock");
        }
    }

    fn load(&mut self) -> StoreResponse<Option<Vec<u8>>> {
        debug!(path = %self.path.display(), "FileBackend::load: called");
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("FileBackend::load: no document yet");
                Ok(None)
            }
            Err(e) => Err(StoreError::Persistence(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn persist(&mut self, bytes: &[u8]) -> StoreResponse<()> {
        let temp = self.temp_path();
        debug!(temp = %temp.display(), len = bytes.len(), "FileBackend::persist: staging");
        if let Err(e) = self.write_staged(&temp, bytes) {
            let _ = fs::remove_file(&temp);
            return Err(StoreError::Persistence(format!(
                "failed to persist {}: {}",
                self.path.display(),
                e
            )));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(d) = File::open(dir) {
        let _ = d.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
