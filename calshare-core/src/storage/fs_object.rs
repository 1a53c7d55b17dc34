//! Directory-backed object store.
//!
//! Objects live under `<root>/events/<uuid>.ics` and are referenced by their
//! `file://` URL, which is what gets shared. A `.tmp` left behind by an
//! interrupted upload is listed as well, so it ages out like any object.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::{ObjectEntry, ObjectRef, ObjectStore};
use crate::constants::{ICS_EXTENSION, OBJECT_PREFIX};
use crate::error::{CalShareError, CalShareResult};

const TEMP_EXTENSION: &str = "tmp";

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: PathBuf) -> Self {
        FsObjectStore { root }
    }

    fn objects_dir(&self) -> CalShareResult<PathBuf> {
        Ok(std::path::absolute(&self.root)?.join(OBJECT_PREFIX))
    }

    fn reference_for(path: &Path) -> CalShareResult<ObjectRef> {
        Url::from_file_path(path)
            .map(|url| ObjectRef(url.to_string()))
            .map_err(|_| CalShareError::Upload(format!("Not an absolute path: {}", path.display())))
    }

    /// Resolve a reference back to a path, refusing anything outside the store.
    fn path_for(&self, reference: &ObjectRef) -> Result<PathBuf, String> {
        let path = Url::parse(reference.as_str())
            .map_err(|e| e.to_string())?
            .to_file_path()
            .map_err(|_| "not a file URL".to_string())?;

        let dir = self.objects_dir().map_err(|e| e.to_string())?;
        if path.parent() != Some(dir.as_path()) {
            return Err("outside of the object store".into());
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, bytes: Vec<u8>) -> CalShareResult<ObjectRef> {
        let dir = self.objects_dir()?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CalShareError::Upload(e.to_string()))?;

        let path = dir.join(format!("{}.{}", Uuid::new_v4(), ICS_EXTENSION));
        let temp = path.with_extension(TEMP_EXTENSION);

        let written = match fs::write(&temp, &bytes).await {
            Ok(()) => fs::rename(&temp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp).await
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                warn!(path = %temp.display(), error = %cleanup, "could not remove partial upload");
            }
            return Err(CalShareError::Upload(e.to_string()));
        }

        debug!(path = %path.display(), "stored object");
        Self::reference_for(&path)
    }

    async fn fetch(&self, reference: &ObjectRef) -> CalShareResult<Vec<u8>> {
        let fetch_error = |reason: String| CalShareError::Fetch {
            reference: reference.to_string(),
            reason,
        };
        let path = self.path_for(reference).map_err(fetch_error)?;
        fs::read(&path).await.map_err(|e| fetch_error(e.to_string()))
    }

    async fn delete(&self, reference: &ObjectRef) -> CalShareResult<()> {
        let path = self.path_for(reference).map_err(|reason| CalShareError::RemoteDelete {
            reference: reference.to_string(),
            reason,
        })?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CalShareError::RemoteDelete {
                reference: reference.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn list(&self) -> CalShareResult<Vec<ObjectEntry>> {
        let dir = self.objects_dir()?;
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&dir).await?;
        let mut objects = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path
                .extension()
                .is_none_or(|e| e != ICS_EXTENSION && e != TEMP_EXTENSION)
            {
                continue;
            }

            let last_modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => Some(DateTime::<Utc>::from(modified)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not read object metadata");
                    None
                }
            };

            objects.push(ObjectEntry {
                reference: Self::reference_for(&path)?,
                last_modified,
            });
        }

        Ok(objects)
    }
}
