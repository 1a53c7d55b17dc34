//! Generated artifacts: the history entity.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::draft::EventDraftSet;
use crate::storage::{LocalStore, ObjectRef};

/// A generated calendar file together with where it lives and when it expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub id: Uuid,
    /// Frozen copy of the drafts at generation time
    pub drafts: EventDraftSet,
    /// Resolved file name, including the extension
    pub file_name: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    /// Set once the upload completed; the artifact is shareable from then on
    pub remote: Option<ObjectRef>,
    /// Local ephemeral copy; only meaningful while the file still exists
    pub local_path: Option<PathBuf>,
}

impl GeneratedArtifact {
    pub fn new(
        drafts: EventDraftSet,
        created: DateTime<Utc>,
        retention: Duration,
        remote: Option<ObjectRef>,
        local_path: Option<PathBuf>,
    ) -> Self {
        GeneratedArtifact {
            id: Uuid::new_v4(),
            file_name: drafts.resolved_file_name(),
            drafts,
            created,
            expires: created + retention,
            remote,
            local_path,
        }
    }

    /// Shareable through its remote link.
    pub fn is_live(&self) -> bool {
        self.remote.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires - now).max(Duration::zero())
    }

    /// The local copy, if it has not been cleaned up yet.
    pub async fn local_copy(&self, local: &dyn LocalStore) -> Option<&Path> {
        let path = self.local_path.as_deref()?;
        if local.exists(path).await { Some(path) } else { None }
    }
}
