//! One scheduler per state document
//!
//! Recovery treats every `running` task as orphaned, which only holds when
//! no other scheduler is working the same document. Everything else (CLI
//! edits, queueing) may share the document freely.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use tracing::{debug, info};

/// Held for as long as a scheduler runs; released when dropped
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _file: File,
}

impl RunLock {
    /// Take `<state>.run.lock`, failing if another scheduler holds it
    pub fn acquire(state_path: &Path) -> Result<Self> {
        let mut name = state_path.as_os_str().to_os_string();
        name.push(".run.lock");
        let path = PathBuf::from(name);
        debug!(path = %path.display(), "RunLock::acquire: called");

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        FileExt::try_lock_exclusive(&file)
            .map_err(|_| eyre!("A scheduler is already running for {}", state_path.display()))?;

        info!(path = %path.display(), "Acquired scheduler lock");
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_scheduler_is_refused() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state.json");

        let first = RunLock::acquire(&state).unwrap();
        assert!(first.path().ends_with("state.json.run.lock"));

        let err = RunLock::acquire(&state).unwrap_err();
        assert!(err.to_string().contains("already running"));

        drop(first);
        assert!(RunLock::acquire(&state).is_ok());
    }
}
