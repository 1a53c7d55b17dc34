//! JSON file-backed history with atomic writes.

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{HistoryStore, sort_newest_first};
use crate::artifact::GeneratedArtifact;
use crate::error::{CalShareError, CalShareResult};

/// Held while a writer owns the history file; dropping it releases the lock.
struct LockGuard {
    _file: File,
}

/// All records in a single JSON array. Writers are serialized by a lock on a
/// `.lock` file next to it, so several processes can share one history. The
/// file itself is only ever replaced by rename.
pub struct JsonHistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new(path: PathBuf) -> Self {
        JsonHistoryStore {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    /// Blocks (off the runtime) until no other writer holds the file.
    async fn lock_exclusive(&self) -> CalShareResult<LockGuard> {
        let path = self.lock_path();

        tokio::task::spawn_blocking(move || -> CalShareResult<LockGuard> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(&path)?;
            file.lock_exclusive().map_err(|e| {
                CalShareError::History(format!("Failed to lock {}: {}", path.display(), e))
            })?;
            Ok(LockGuard { _file: file })
        })
        .await
        .map_err(|e| CalShareError::History(format!("History lock task failed: {}", e)))?
    }

    async fn load(&self) -> CalShareResult<Vec<GeneratedArtifact>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path).await?;
        serde_json::from_str(&data).map_err(|e| {
            CalShareError::History(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, artifacts: &[GeneratedArtifact]) -> CalShareResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(artifacts)?;
        let temp = self.path.with_extension("json.tmp");

        fs::write(&temp, json.as_bytes()).await?;
        fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn insert(&self, artifact: &GeneratedArtifact) -> CalShareResult<()> {
        let _guard = self.lock.lock().await;
        let _file_guard = self.lock_exclusive().await?;
        let mut artifacts = self.load().await?;

        if let Some(pos) = artifacts.iter().position(|a| a.id == artifact.id) {
            artifacts[pos] = artifact.clone();
        } else {
            artifacts.push(artifact.clone());
        }
        self.save(&artifacts).await
    }

    async fn delete(&self, id: Uuid) -> CalShareResult<bool> {
        let _guard = self.lock.lock().await;
        let _file_guard = self.lock_exclusive().await?;
        let mut artifacts = self.load().await?;

        let before = artifacts.len();
        artifacts.retain(|a| a.id != id);
        if artifacts.len() == before {
            return Ok(false);
        }
        self.save(&artifacts).await?;
        Ok(true)
    }

    async fn get(&self, id: Uuid) -> CalShareResult<Option<GeneratedArtifact>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().find(|a| a.id == id))
    }

    async fn list(&self) -> CalShareResult<Vec<GeneratedArtifact>> {
        let _guard = self.lock.lock().await;
        let mut artifacts = self.load().await?;
        sort_newest_first(&mut artifacts);
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::{EventDraft, EventDraftSet};
    use crate::recurrence::RecurrenceRule;
    use crate::storage::ObjectRef;
    use chrono::{Duration, TimeZone, Utc};

    fn make_artifact(day: u32) -> GeneratedArtifact {
        let created = Utc.with_ymd_and_hms(2024, 6, day, 8, 0, 0).unwrap();
        let mut draft = EventDraft::starting_at(created);
        draft.title = format!("Day {}", day);
        draft.recurrence = RecurrenceRule::Monthly;
        GeneratedArtifact::new(
            EventDraftSet::from_drafts("june", vec![draft]),
            created,
            Duration::days(7),
            Some(ObjectRef(format!("file:///objects/{}.ics", day))),
            None,
        )
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let first = make_artifact(1);
        let second = make_artifact(2);
        {
            let store = JsonHistoryStore::new(path.clone());
            store.insert(&first).await.unwrap();
            store.insert(&second).await.unwrap();
        }

        let store = JsonHistoryStore::new(path);
        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![second.clone(), first.clone()]);
        assert_eq!(store.get(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("history.json"));
        let artifact = make_artifact(3);
        store.insert(&artifact).await.unwrap();

        assert!(store.delete(artifact.id).await.unwrap());
        assert!(!store.delete(artifact.id).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("nested").join("history.json"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_stores_on_one_file_keep_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let a = std::sync::Arc::new(JsonHistoryStore::new(path.clone()));
        let b = std::sync::Arc::new(JsonHistoryStore::new(path.clone()));

        let mut tasks = Vec::new();
        for day in 1..=10 {
            for store in [a.clone(), b.clone()] {
                tasks.push(tokio::spawn(async move {
                    store.insert(&make_artifact(day)).await.unwrap();
                }));
            }
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(a.count().await.unwrap(), 20);
        assert_eq!(JsonHistoryStore::new(path).count().await.unwrap(), 20);
    }
}
