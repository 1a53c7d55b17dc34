//! Local ephemeral copies in a temp directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::LocalStore;
use crate::constants::{DEFAULT_FILE_NAME, ICS_EXTENSION};
use crate::error::{CalShareError, CalShareResult};

pub struct TempDirStore {
    dir: PathBuf,
}

impl TempDirStore {
    pub fn new(dir: PathBuf) -> Self {
        TempDirStore { dir }
    }

    /// `<os temp dir>/calshare`
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join("calshare")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Keep user-chosen names when they are safe as a single path component,
/// otherwise fall back to a slug.
fn safe_file_name(file_name: &str) -> String {
    let is_safe = |c: char| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.');
    let stem = file_name
        .strip_suffix(&format!(".{}", ICS_EXTENSION))
        .unwrap_or(file_name);

    let stem = if !stem.is_empty() && !stem.starts_with('.') && stem.chars().all(is_safe) {
        stem.to_string()
    } else {
        slug::slugify(stem)
    };
    let stem = if stem.is_empty() { DEFAULT_FILE_NAME.to_string() } else { stem };

    format!("{}.{}", stem, ICS_EXTENSION)
}

#[async_trait]
impl LocalStore for TempDirStore {
    async fn write(&self, file_name: &str, bytes: &[u8]) -> CalShareResult<PathBuf> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CalShareError::StorageWrite(format!("{}: {}", self.dir.display(), e)))?;

        let path = self.dir.join(safe_file_name(file_name));
        fs::write(&path, bytes)
            .await
            .map_err(|e| CalShareError::StorageWrite(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), bytes = bytes.len(), "wrote local copy");
        Ok(path)
    }

    async fn delete(&self, path: &Path) -> CalShareResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("Holidays.ics"), "Holidays.ics");
        assert_eq!(safe_file_name("Team Offsite 2024.ics"), "Team Offsite 2024.ics");
        assert_eq!(safe_file_name("../../etc/passwd.ics"), "etc-passwd.ics");
        assert_eq!(safe_file_name(".hidden.ics"), "hidden.ics");
        assert_eq!(safe_file_name("///.ics"), "generated_events.ics");
    }

    #[tokio::test]
    async fn test_write_exists_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = TempDirStore::new(dir.path().join("calshare"));

        let path = store.write("plan.ics", b"BEGIN:VCALENDAR").await.unwrap();
        assert_eq!(path, dir.path().join("calshare").join("plan.ics"));
        assert!(store.exists(&path).await);
        assert_eq!(std::fs::read(&path).unwrap(), b"BEGIN:VCALENDAR");

        store.delete(&path).await.unwrap();
        assert!(!store.exists(&path).await);

        // Deleting twice is fine
        store.delete(&path).await.unwrap();
    }
}
