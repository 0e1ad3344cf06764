//! Per-run scratch storage for intermediate frames.
//!
//! Every generation run gets its own subdirectory under the configured frames
//! root, so concurrent runs never see each other's files. The directory is
//! removed when the guard is dropped, whether the run succeeded or not.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

/// Derive a short run identifier from the prompt, the current time and the
/// process id.
///
/// Returns a 16-character hex string.
pub fn new_run_id(prompt: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Scratch directory owned by a single run.
#[derive(Debug)]
pub struct RunScratch {
    run_id: String,
    dir: PathBuf,
}

impl RunScratch {
    /// Create `<root>/<run_id>/`, including missing parents.
    pub fn create(root: &Path, run_id: impl Into<String>) -> std::io::Result<Self> {
        let run_id = run_id.into();
        let dir = root.join(&run_id);
        std::fs::create_dir_all(&dir)?;
        log::debug!("Created scratch directory {}", dir.display());
        Ok(Self { run_id, dir })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl Drop for RunScratch {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => log::debug!("Removed scratch directory {}", self.dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::error!(
                "Failed to remove scratch directory {}: {}",
                self.dir.display(),
                e
            ),
        }
    }
}

/// Remove everything inside `dir`, keeping `dir` itself.
///
/// A missing directory is treated as already clean. Entries that cannot be
/// removed are logged and skipped; the count of removed entries is returned.
pub fn cleanup_directory(dir: &Path) -> std::io::Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => log::error!("Failed to delete {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_is_short_hex() {
        let id = new_run_id("a sunset");
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_run_ids_differ_between_calls() {
        let a = new_run_id("same prompt");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_run_id("same prompt");
        assert_ne!(a, b);
    }

    #[test]
    fn test_scratch_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let dir = {
            let scratch = RunScratch::create(root.path(), "run1").unwrap();
            std::fs::write(scratch.path().join("frame_000.png"), b"x").unwrap();
            std::fs::create_dir(scratch.path().join("nested")).unwrap();
            assert_eq!(scratch.run_id(), "run1");
            scratch.path().to_path_buf()
        };
        assert!(!dir.exists());
        assert!(root.path().exists());
    }

    #[test]
    fn test_scratch_drop_tolerates_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let scratch = RunScratch::create(root.path(), "gone").unwrap();
        std::fs::remove_dir_all(scratch.path()).unwrap();
        drop(scratch);
    }

    #[test]
    fn test_cleanup_directory_keeps_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("a.png"), b"a").unwrap();
        std::fs::create_dir(root.path().join("stale-run")).unwrap();
        std::fs::write(root.path().join("stale-run").join("b.png"), b"b").unwrap();

        let removed = cleanup_directory(root.path()).unwrap();

        assert_eq!(removed, 2);
        assert!(root.path().exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cleanup_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_directory(&root.path().join("nope")).unwrap(), 0);
    }
}
