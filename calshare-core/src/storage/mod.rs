//! Storage collaborators used by the artifact lifecycle.
//!
//! The lifecycle only talks to these traits. Filesystem-backed implementations
//! are used by the CLI; the in-memory ones back the tests and can be told to
//! fail on demand.

mod fs_object;
mod history_file;
mod memory;
mod temp;

pub use fs_object::FsObjectStore;
pub use history_file::JsonHistoryStore;
pub use memory::{MemoryHistoryStore, MemoryLocalStore, MemoryObjectStore};
pub use temp::TempDirStore;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::GeneratedArtifact;
use crate::error::CalShareResult;

/// Opaque handle to an object on the remote store. Doubles as the share link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectRef(pub String);

impl ObjectRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A listed remote object. `last_modified` is `None` when its metadata could
/// not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub reference: ObjectRef,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Durable blob storage that generated files are uploaded to.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>) -> CalShareResult<ObjectRef>;
    /// Download an object, as any holder of the link would.
    async fn fetch(&self, reference: &ObjectRef) -> CalShareResult<Vec<u8>>;
    /// Succeeds when the object is gone afterwards, including when it was
    /// already missing.
    async fn delete(&self, reference: &ObjectRef) -> CalShareResult<()>;
    async fn list(&self) -> CalShareResult<Vec<ObjectEntry>>;
}

/// Device-local scratch space holding the file that is shared directly.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn write(&self, file_name: &str, bytes: &[u8]) -> CalShareResult<PathBuf>;
    async fn delete(&self, path: &Path) -> CalShareResult<()>;
    async fn exists(&self, path: &Path) -> bool;
}

/// Persistent record of generated artifacts.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert(&self, artifact: &GeneratedArtifact) -> CalShareResult<()>;
    /// Returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> CalShareResult<bool>;
    async fn get(&self, id: Uuid) -> CalShareResult<Option<GeneratedArtifact>>;
    /// All records, newest first.
    async fn list(&self) -> CalShareResult<Vec<GeneratedArtifact>>;

    async fn count(&self) -> CalShareResult<usize> {
        Ok(self.list().await?.len())
    }
}

/// Whether the user may generate files at all.
pub trait Entitlement: Send + Sync {
    fn is_entitled(&self) -> bool;
}

/// Entitlement decided up front, e.g. from configuration.
#[derive(Debug, Clone, Copy)]
pub struct StaticEntitlement(pub bool);

impl Entitlement for StaticEntitlement {
    fn is_entitled(&self) -> bool {
        self.0
    }
}

/// Sort newest first, the order history is presented in.
pub(crate) fn sort_newest_first(artifacts: &mut [GeneratedArtifact]) {
    artifacts.sort_by(|a, b| b.created.cmp(&a.created));
}
