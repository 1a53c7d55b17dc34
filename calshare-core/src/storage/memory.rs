//! In-memory stores for tests. Nothing is persisted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use super::{HistoryStore, LocalStore, ObjectEntry, ObjectRef, ObjectStore, sort_newest_first};
use crate::artifact::GeneratedArtifact;
use crate::error::{CalShareError, CalShareResult};

#[derive(Default)]
struct ObjectState {
    objects: HashMap<ObjectRef, (Vec<u8>, Option<DateTime<Utc>>)>,
    fail_puts: bool,
    fail_list: bool,
    failing_deletes: Option<Vec<ObjectRef>>,
    puts: usize,
}

/// Object store backed by a `HashMap`, with switches to make calls fail and a
/// gate that holds uploads until released.
pub struct MemoryObjectStore {
    state: Mutex<ObjectState>,
    hold: watch::Sender<bool>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        let (hold, _) = watch::channel(false);
        MemoryObjectStore {
            state: Mutex::new(ObjectState::default()),
            hold,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ObjectState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_puts(&self, fail: bool) {
        self.state().fail_puts = fail;
    }

    pub fn fail_list(&self, fail: bool) {
        self.state().fail_list = fail;
    }

    /// Make every delete fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.state().failing_deletes = fail.then(Vec::new);
    }

    /// Make deletes of one object fail while others succeed.
    pub fn fail_delete_of(&self, reference: &ObjectRef) {
        self.state()
            .failing_deletes
            .get_or_insert_with(Vec::new)
            .push(reference.clone());
    }

    /// Keep uploads pending until [`release_puts`](Self::release_puts).
    pub fn hold_puts(&self) {
        self.hold.send_replace(true);
    }

    pub fn release_puts(&self) {
        self.hold.send_replace(false);
    }

    /// Add an object directly, bypassing `put`.
    pub fn insert_object(&self, last_modified: Option<DateTime<Utc>>) -> ObjectRef {
        let reference = ObjectRef(format!("memory://events/{}", Uuid::new_v4()));
        self.state()
            .objects
            .insert(reference.clone(), (Vec::new(), last_modified));
        reference
    }

    pub fn contains(&self, reference: &ObjectRef) -> bool {
        self.state().objects.contains_key(reference)
    }

    pub fn get(&self, reference: &ObjectRef) -> Option<Vec<u8>> {
        self.state().objects.get(reference).map(|(bytes, _)| bytes.clone())
    }

    pub fn len(&self) -> usize {
        self.state().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `put` calls that reached the store, successful or not.
    pub fn put_count(&self) -> usize {
        self.state().puts
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bytes: Vec<u8>) -> CalShareResult<ObjectRef> {
        let mut rx = self.hold.subscribe();
        rx.wait_for(|held| !*held)
            .await
            .map_err(|e| CalShareError::Upload(e.to_string()))?;

        let mut state = self.state();
        state.puts += 1;
        if state.fail_puts {
            return Err(CalShareError::Upload("simulated upload failure".into()));
        }

        let reference = ObjectRef(format!("memory://events/{}", Uuid::new_v4()));
        state
            .objects
            .insert(reference.clone(), (bytes, Some(Utc::now())));
        Ok(reference)
    }

    async fn fetch(&self, reference: &ObjectRef) -> CalShareResult<Vec<u8>> {
        self.get(reference).ok_or_else(|| CalShareError::Fetch {
            reference: reference.to_string(),
            reason: "no such object".into(),
        })
    }

    async fn delete(&self, reference: &ObjectRef) -> CalShareResult<()> {
        let mut state = self.state();
        let fails = state
            .failing_deletes
            .as_ref()
            .is_some_and(|refs| refs.is_empty() || refs.contains(reference));
        if fails {
            return Err(CalShareError::RemoteDelete {
                reference: reference.to_string(),
                reason: "simulated delete failure".into(),
            });
        }
        state.objects.remove(reference);
        Ok(())
    }

    async fn list(&self) -> CalShareResult<Vec<ObjectEntry>> {
        let state = self.state();
        if state.fail_list {
            return Err(CalShareError::Upload("simulated list failure".into()));
        }
        Ok(state
            .objects
            .iter()
            .map(|(reference, (_, last_modified))| ObjectEntry {
                reference: reference.clone(),
                last_modified: *last_modified,
            })
            .collect())
    }
}

/// Local store keeping file contents in memory under synthetic paths.
pub struct MemoryLocalStore {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    fail_writes: Mutex<bool>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        MemoryLocalStore {
            files: Mutex::new(HashMap::new()),
            fail_writes: Mutex::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    pub fn read(&self, path: &Path) -> Option<Vec<u8>> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn write(&self, file_name: &str, bytes: &[u8]) -> CalShareResult<PathBuf> {
        if *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(CalShareError::StorageWrite("simulated write failure".into()));
        }
        let path = PathBuf::from("/memory").join(file_name);
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    async fn delete(&self, path: &Path) -> CalShareResult<()> {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.contains_key(path)
    }
}

/// History store backed by a `HashMap`.
pub struct MemoryHistoryStore {
    records: Mutex<HashMap<Uuid, GeneratedArtifact>>,
    fail_inserts: Mutex<bool>,
    fail_deletes: Mutex<bool>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        MemoryHistoryStore {
            records: Mutex::new(HashMap::new()),
            fail_inserts: Mutex::new(false),
            fail_deletes: Mutex::new(false),
        }
    }

    pub fn fail_inserts(&self, fail: bool) {
        *self.fail_inserts.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        *self.fail_deletes.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn insert(&self, artifact: &GeneratedArtifact) -> CalShareResult<()> {
        if *self.fail_inserts.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(CalShareError::History("simulated insert failure".into()));
        }
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(artifact.id, artifact.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> CalShareResult<bool> {
        if *self.fail_deletes.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(CalShareError::History("simulated delete failure".into()));
        }
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.remove(&id).is_some())
    }

    async fn get(&self, id: Uuid) -> CalShareResult<Option<GeneratedArtifact>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(&id).cloned())
    }

    async fn list(&self) -> CalShareResult<Vec<GeneratedArtifact>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut artifacts: Vec<_> = records.values().cloned().collect();
        sort_newest_first(&mut artifacts);
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::EventDraftSet;
    use chrono::{Duration, TimeZone};

    fn make_artifact(day: u32) -> GeneratedArtifact {
        let created = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        GeneratedArtifact::new(EventDraftSet::default(), created, Duration::days(7), None, None)
    }

    #[tokio::test]
    async fn test_history_list_is_newest_first() {
        let store = MemoryHistoryStore::new();
        for day in [3, 1, 2] {
            store.insert(&make_artifact(day)).await.unwrap();
        }

        let days: Vec<_> = store
            .list()
            .await
            .unwrap()
            .iter()
            .map(|a| a.created.format("%d").to_string())
            .collect();
        assert_eq!(days, vec!["03", "02", "01"]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_object_store_selective_delete_failure() {
        let store = MemoryObjectStore::new();
        let a = store.insert_object(None);
        let b = store.insert_object(None);
        store.fail_delete_of(&a);

        assert!(store.delete(&a).await.is_err());
        assert!(store.delete(&b).await.is_ok());
        assert!(store.contains(&a));
        assert!(!store.contains(&b));
    }
}
