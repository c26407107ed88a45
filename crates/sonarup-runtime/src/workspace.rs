use crate::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Files this run generated and must remove on exit.
///
/// A path is claimed before it is written, so a crash mid-write still leaves
/// it on the cleanup list. A path that already exists is never claimed, so
/// only files this run created are ever deleted. Cleanup is idempotent:
/// files already gone are skipped silently.
#[derive(Debug, Default)]
pub struct Artifacts {
    paths: Mutex<Vec<PathBuf>>,
}

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` for a file this run is about to create. Fails without
    /// registering when something is already there.
    pub fn claim(&self, path: &Path) -> Result<()> {
        if path.symlink_metadata().is_ok() {
            return Err(Error::FileExists(path.to_path_buf()));
        }
        self.register(path);
        Ok(())
    }

    pub fn register(&self, path: &Path) {
        let mut paths = self.lock();
        if !paths.iter().any(|p| p == path) {
            paths.push(path.to_path_buf());
        }
    }

    pub fn registered(&self) -> Vec<PathBuf> {
        self.lock().clone()
    }

    /// Delete every registered file that still exists and return the ones
    /// removed by this call.
    pub fn cleanup(&self) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        for path in self.lock().iter() {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "removed generated file");
                    removed.push(path.clone());
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not remove generated file");
                }
            }
        }
        removed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PathBuf>> {
        self.paths.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cleanup_removes_registered_files_only() {
        let dir = TempDir::new().unwrap();
        let generated = dir.path().join("docker-compose.yml");
        let untouched = dir.path().join("pom.xml");
        std::fs::write(&generated, "services: {}").unwrap();
        std::fs::write(&untouched, "<project/>").unwrap();

        let artifacts = Artifacts::new();
        artifacts.register(&generated);

        let removed = artifacts.cleanup();
        assert_eq!(removed, vec![generated.clone()]);
        assert!(!generated.exists());
        assert!(untouched.exists());
    }

    #[test]
    fn test_cleanup_twice_is_harmless() {
        let dir = TempDir::new().unwrap();
        let generated = dir.path().join("sonar-project.properties");
        std::fs::write(&generated, "sonar.projectKey=k").unwrap();

        let artifacts = Artifacts::new();
        artifacts.register(&generated);
        artifacts.register(&generated);
        assert_eq!(artifacts.registered().len(), 1);

        assert_eq!(artifacts.cleanup().len(), 1);
        assert!(artifacts.cleanup().is_empty());
        assert!(!generated.exists());
    }

    #[test]
    fn test_claim_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("docker-compose.yml");
        std::fs::write(&existing, "services: {}").unwrap();

        let artifacts = Artifacts::new();
        let err = artifacts.claim(&existing).unwrap_err();
        assert!(matches!(err, Error::FileExists(ref p) if p == &existing));
        assert!(artifacts.registered().is_empty());

        assert!(artifacts.cleanup().is_empty());
        assert!(existing.exists());
    }

    #[test]
    fn test_claim_registers_new_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sonar-project.properties");
        let artifacts = Artifacts::new();
        artifacts.claim(&path).unwrap();
        assert_eq!(artifacts.registered(), vec![path]);
    }

    #[test]
    fn test_cleanup_of_unwritten_file() {
        let dir = TempDir::new().unwrap();
        let artifacts = Artifacts::new();
        artifacts.register(&dir.path().join("never-written"));
        assert!(artifacts.cleanup().is_empty());
    }
}
