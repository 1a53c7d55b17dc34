//! Generated-file lifecycle for one editing session.
//!
//! The manager owns the draft set being edited and walks it through
//! `Idle → Generating → LocalReady → Uploading → Published`. Any edit to the
//! drafts or the file name drops the session back to `Idle` and removes the
//! local copy; published history records and remote files are left alone.
//!
//! Uploads run as spawned tasks. Their result is only applied through
//! [`ArtifactLifecycleManager::wait_for_upload`] or
//! [`ArtifactLifecycleManager::poll_upload`], and an invalidated upload is
//! detached, so a late completion can never publish stale drafts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifact::GeneratedArtifact;
use crate::config::CalShareConfig;
use crate::draft::{EventDraft, EventDraftSet};
use crate::error::{CalShareError, CalShareResult, ValidationError};
use crate::ics::build_document;
use crate::storage::{
    Entitlement, FsObjectStore, HistoryStore, JsonHistoryStore, LocalStore, ObjectRef, ObjectStore,
    StaticEntitlement, TempDirStore,
};

/// The external collaborators a session works against. Shared between
/// sessions and sweepers.
#[derive(Clone)]
pub struct Stores {
    pub objects: Arc<dyn ObjectStore>,
    pub local: Arc<dyn LocalStore>,
    pub history: Arc<dyn HistoryStore>,
    pub entitlement: Arc<dyn Entitlement>,
}

impl Stores {
    /// Filesystem-backed stores at the configured locations.
    pub fn from_config(config: &CalShareConfig) -> Self {
        Stores {
            objects: Arc::new(FsObjectStore::new(config.objects_path())),
            local: Arc::new(TempDirStore::new(config.temp_path())),
            history: Arc::new(JsonHistoryStore::new(config.history_path())),
            entitlement: Arc::new(StaticEntitlement(config.entitled)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub max_drafts: usize,
    pub max_artifacts: usize,
    pub retention: Duration,
}

impl LifecycleSettings {
    pub fn from_config(config: &CalShareConfig) -> CalShareResult<Self> {
        Ok(LifecycleSettings {
            max_drafts: config.max_drafts,
            max_artifacts: config.max_artifacts,
            retention: config.retention()?,
        })
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        LifecycleSettings {
            max_drafts: crate::constants::DEFAULT_MAX_DRAFTS,
            max_artifacts: crate::constants::DEFAULT_MAX_ARTIFACTS,
            retention: Duration::days(crate::constants::DEFAULT_RETENTION_DAYS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Generating,
    /// The local copy is written. `upload_error` is set when the last upload
    /// failed; the file can still be shared directly.
    LocalReady {
        local_path: PathBuf,
        upload_error: Option<String>,
    },
    Uploading {
        local_path: PathBuf,
    },
    Published {
        local_path: PathBuf,
        artifact: GeneratedArtifact,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Generating => "generating",
            SessionState::LocalReady { .. } => "local-ready",
            SessionState::Uploading { .. } => "uploading",
            SessionState::Published { .. } => "published",
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            SessionState::Idle | SessionState::Generating => None,
            SessionState::LocalReady { local_path, .. }
            | SessionState::Uploading { local_path }
            | SessionState::Published { local_path, .. } => Some(local_path),
        }
    }
}

/// What to do when the remote file of an artifact cannot be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Keep the history record so the remote file is not lost track of.
    #[default]
    RetainRecord,
    /// Drop the record anyway and leave the remote file to the sweeper.
    AbandonRemote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The record is gone but this remote file is still out there.
    RemoteOrphaned(ObjectRef),
}

struct InFlightUpload {
    snapshot: EventDraftSet,
    local_path: PathBuf,
    handle: JoinHandle<CalShareResult<ObjectRef>>,
}

pub struct ArtifactLifecycleManager {
    stores: Stores,
    settings: LifecycleSettings,
    drafts: EventDraftSet,
    state: SessionState,
    in_flight: Option<InFlightUpload>,
}

impl ArtifactLifecycleManager {
    pub fn new(stores: Stores, settings: LifecycleSettings) -> Self {
        ArtifactLifecycleManager {
            stores,
            settings,
            drafts: EventDraftSet::default(),
            state: SessionState::Idle,
            in_flight: None,
        }
    }

    pub fn drafts(&self) -> &EventDraftSet {
        &self.drafts
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    /// Remote reference of the published artifact, i.e. the share link.
    pub fn share_link(&self) -> Option<&ObjectRef> {
        match &self.state {
            SessionState::Published { artifact, .. } => artifact.remote.as_ref(),
            _ => None,
        }
    }

    /// Path of the local copy, if one exists right now.
    pub async fn local_copy(&self) -> Option<PathBuf> {
        let path = self.state.local_path()?;
        if self.stores.local.exists(path).await {
            Some(path.to_path_buf())
        } else {
            None
        }
    }

    pub fn has_upload_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    // DRAFT EDITING:

    pub async fn add_draft(&mut self, draft: EventDraft) -> CalShareResult<Uuid> {
        let id = draft.id;
        self.drafts.push(draft, self.settings.max_drafts)?;
        self.invalidate().await;
        Ok(id)
    }

    pub async fn remove_draft(&mut self, id: Uuid) -> CalShareResult<EventDraft> {
        let removed = self
            .drafts
            .remove(id)
            .ok_or_else(|| ValidationError::DraftNotFound(id.to_string()))?;
        self.invalidate().await;
        Ok(removed)
    }

    /// Edit one draft in place. The draft's id cannot be changed.
    pub async fn update_draft<F>(&mut self, id: Uuid, edit: F) -> CalShareResult<()>
    where
        F: FnOnce(&mut EventDraft),
    {
        let draft = self
            .drafts
            .get_mut(id)
            .ok_or_else(|| ValidationError::DraftNotFound(id.to_string()))?;

        edit(draft);
        draft.id = id;

        self.invalidate().await;
        Ok(())
    }

    pub async fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.drafts.file_name = file_name.into();
        self.invalidate().await;
    }

    /// Replace the whole draft set, e.g. with one loaded from a file.
    pub async fn replace_drafts(&mut self, drafts: EventDraftSet) -> CalShareResult<()> {
        if drafts.len() > self.settings.max_drafts {
            return Err(ValidationError::DraftLimitReached {
                max: self.settings.max_drafts,
            }
            .into());
        }
        self.invalidate().await;
        self.drafts = drafts;
        Ok(())
    }

    /// Start over with no drafts and no file name.
    pub async fn reset(&mut self) {
        self.invalidate().await;
        self.drafts = EventDraftSet::default();
    }

    // GENERATION:

    /// Build the document from the current drafts, write the local copy and
    /// start uploading it. Returns the local path.
    ///
    /// An upload still in flight from an earlier call is settled first.
    pub async fn generate(&mut self) -> CalShareResult<PathBuf> {
        if !self.stores.entitlement.is_entitled() {
            return Err(ValidationError::NotEntitled.into());
        }
        if self.drafts.is_empty() {
            return Err(ValidationError::NothingToGenerate.into());
        }

        // A finished upload settles first so a failed one frees its slot
        if let Some(Err(e)) = self.poll_upload().await {
            debug!(error = %e, "previous upload did not publish");
        }

        // Still running: it may become a record, so it counts against the cap
        let pending = usize::from(self.in_flight.is_some());
        let retained = self.stores.history.count().await?;
        if retained + pending >= self.settings.max_artifacts {
            return Err(ValidationError::ArtifactLimitReached {
                max: self.settings.max_artifacts,
            }
            .into());
        }

        if let Some(upload) = self.in_flight.take() {
            debug!("waiting for previous upload before generating again");
            if let Err(e) = self.settle(upload).await {
                debug!(error = %e, "previous upload did not publish");
            }
        }

        self.state = SessionState::Generating;
        let bytes = build_document(&self.drafts);
        let file_name = self.drafts.resolved_file_name();

        let local_path = match self.stores.local.write(&file_name, &bytes).await {
            Ok(path) => path,
            Err(e) => {
                self.state = SessionState::Idle;
                let e = match e {
                    CalShareError::StorageWrite(_) => e,
                    other => CalShareError::StorageWrite(other.to_string()),
                };
                warn!(file = %file_name, error = %e, "could not write local copy");
                return Err(e);
            }
        };

        self.state = SessionState::LocalReady {
            local_path: local_path.clone(),
            upload_error: None,
        };

        let objects = Arc::clone(&self.stores.objects);
        let handle = tokio::spawn(async move { objects.put(bytes).await });

        self.in_flight = Some(InFlightUpload {
            snapshot: self.drafts.clone(),
            local_path: local_path.clone(),
            handle,
        });
        self.state = SessionState::Uploading {
            local_path: local_path.clone(),
        };

        info!(
            file = %file_name,
            events = self.drafts.len(),
            path = %local_path.display(),
            "generated calendar file, uploading"
        );
        Ok(local_path)
    }

    /// Wait for the in-flight upload and apply its result. `None` when no
    /// upload is in flight.
    pub async fn wait_for_upload(&mut self) -> Option<CalShareResult<GeneratedArtifact>> {
        let upload = self.in_flight.take()?;
        Some(self.settle(upload).await)
    }

    /// Apply the upload result if it is already available, without waiting.
    pub async fn poll_upload(&mut self) -> Option<CalShareResult<GeneratedArtifact>> {
        if !self.in_flight.as_ref()?.handle.is_finished() {
            return None;
        }
        let upload = self.in_flight.take()?;
        Some(self.settle(upload).await)
    }

    async fn settle(&mut self, upload: InFlightUpload) -> CalShareResult<GeneratedArtifact> {
        let InFlightUpload {
            snapshot,
            local_path,
            handle,
        } = upload;

        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(CalShareError::Upload(format!("Upload task failed: {}", e))),
        };

        let reference = match result {
            Ok(reference) => reference,
            Err(e) => {
                let e = match e {
                    CalShareError::Upload(_) => e,
                    other => CalShareError::Upload(other.to_string()),
                };
                warn!(path = %local_path.display(), error = %e, "upload failed, local copy kept");
                self.state = SessionState::LocalReady {
                    local_path,
                    upload_error: Some(e.to_string()),
                };
                return Err(e);
            }
        };

        let artifact = GeneratedArtifact::new(
            snapshot,
            Utc::now(),
            self.settings.retention,
            Some(reference.clone()),
            Some(local_path.clone()),
        );

        if let Err(e) = self.stores.history.insert(&artifact).await {
            warn!(error = %e, "could not record artifact, removing uploaded file");
            if let Err(delete_err) = self.stores.objects.delete(&reference).await {
                warn!(
                    reference = %reference,
                    error = %delete_err,
                    "uploaded file left orphaned, the sweeper will remove it"
                );
            }
            self.state = SessionState::LocalReady {
                local_path,
                upload_error: Some(e.to_string()),
            };
            return Err(e);
        }

        info!(
            id = %artifact.id,
            reference = %reference,
            expires = %artifact.expires,
            "published calendar file"
        );
        self.state = SessionState::Published {
            local_path,
            artifact: artifact.clone(),
        };
        Ok(artifact)
    }

    /// Retire the local working copy and return to `Idle`.
    ///
    /// A detached upload may still finish; its remote file then has no record
    /// and is removed by the sweeper once it ages out.
    pub async fn invalidate(&mut self) {
        if self.in_flight.take().is_some() {
            debug!("detached in-flight upload");
        }

        if let Some(path) = self.state.local_path() {
            if let Err(e) = self.stores.local.delete(path).await {
                warn!(path = %path.display(), error = %e, "could not delete local copy");
            }
        }

        if self.state != SessionState::Idle {
            debug!(from = self.state.name(), "session invalidated");
        }
        self.state = SessionState::Idle;
    }

    // HISTORY:

    /// Generated artifacts, newest first.
    pub async fn history(&self) -> CalShareResult<Vec<GeneratedArtifact>> {
        self.stores.history.list().await
    }

    /// Load a past artifact's drafts for editing. The copy gets fresh draft
    /// ids; the artifact's own files are not touched.
    pub async fn import_artifact(&mut self, artifact: &GeneratedArtifact) -> CalShareResult<()> {
        self.replace_drafts(artifact.drafts.duplicate()).await?;
        info!(id = %artifact.id, events = self.drafts.len(), "imported artifact for editing");
        Ok(())
    }

    /// Delete an artifact: remote file first, then its history record.
    pub async fn delete_artifact(
        &mut self,
        artifact: &GeneratedArtifact,
        policy: DeletePolicy,
    ) -> CalShareResult<DeleteOutcome> {
        let mut outcome = DeleteOutcome::Deleted;

        if let Some(reference) = &artifact.remote {
            if let Err(e) = self.stores.objects.delete(reference).await {
                let reason = match e {
                    CalShareError::RemoteDelete { reason, .. } => reason,
                    other => other.to_string(),
                };
                match policy {
                    DeletePolicy::RetainRecord => {
                        warn!(
                            id = %artifact.id,
                            reference = %reference,
                            error = %reason,
                            "remote delete failed, keeping history record"
                        );
                        return Err(CalShareError::RemoteDelete {
                            reference: reference.to_string(),
                            reason,
                        });
                    }
                    DeletePolicy::AbandonRemote => {
                        warn!(
                            id = %artifact.id,
                            reference = %reference,
                            error = %reason,
                            "remote delete failed, abandoning remote file to the sweeper"
                        );
                        outcome = DeleteOutcome::RemoteOrphaned(reference.clone());
                    }
                }
            }
        }

        let is_current = matches!(
            &self.state,
            SessionState::Published { artifact: current, .. } if current.id == artifact.id
        );

        let mut unshared_copy = None;
        if let Some(path) = &artifact.local_path
            && self.local_copy_is_unshared(artifact, path, is_current).await?
        {
            unshared_copy = Some(path);
        }

        // Record before local copy
        self.stores.history.delete(artifact.id).await?;

        if let Some(path) = unshared_copy
            && let Err(e) = self.stores.local.delete(path).await
        {
            warn!(path = %path.display(), error = %e, "could not delete local copy");
        }

        if is_current {
            self.state = SessionState::Idle;
        }

        info!(id = %artifact.id, "deleted artifact");
        Ok(outcome)
    }

    /// Regenerating under the same name reuses the local path, so a copy may
    /// belong to the working session or to a newer record as well.
    async fn local_copy_is_unshared(
        &self,
        artifact: &GeneratedArtifact,
        path: &Path,
        is_current: bool,
    ) -> CalShareResult<bool> {
        if !is_current && self.state.local_path() == Some(path) {
            return Ok(false);
        }
        let others = self.stores.history.list().await?;
        Ok(!others
            .iter()
            .any(|a| a.id != artifact.id && a.local_path.as_deref() == Some(path)))
    }
}
