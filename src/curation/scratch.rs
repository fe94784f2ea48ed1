//! Scope guard for transient files.

use std::path::{Path, PathBuf};

/// Deletes its file when dropped, whatever happened in between.
///
/// A file that was moved away (or never created) is not an error.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "Removed scratch file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to remove scratch file: {}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_removes_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        std::fs::write(&path, b"data").unwrap();

        {
            let guard = ScratchFile::new(&path);
            assert!(guard.path().exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_is_fine() {
        let dir = tempdir().unwrap();
        drop(ScratchFile::new(dir.path().join("never-written.wav")));
    }

    #[test]
    fn test_removes_on_early_return() {
        fn fails(path: &Path) -> Result<(), &'static str> {
            let _guard = ScratchFile::new(path);
            std::fs::write(path, b"data").unwrap();
            Err("render failed")
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        assert!(fails(&path).is_err());
        assert!(!path.exists());
    }
}
