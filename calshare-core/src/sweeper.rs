//! Removes uploaded files once they outlive the retention window, and drops
//! history records that have expired.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CalShareResult;
use crate::lifecycle::Stores;
use crate::storage::{HistoryStore, LocalStore, ObjectRef, ObjectStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub reference: ObjectRef,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Remote objects looked at
    pub examined: usize,
    pub deleted: usize,
    /// Objects still inside the retention window
    pub retained: usize,
    pub failures: Vec<SweepFailure>,
    /// Expired history records removed (only set by `run`)
    pub records_removed: usize,
    /// The sweep stopped early because it was cancelled
    pub cancelled: bool,
}

impl SweepReport {
    /// True when every object was either confirmed inside the window or
    /// deleted.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

pub struct ExpirationSweeper {
    objects: Arc<dyn ObjectStore>,
    local: Arc<dyn LocalStore>,
    history: Arc<dyn HistoryStore>,
    retention: Duration,
}

impl ExpirationSweeper {
    pub fn new(stores: &Stores, retention: Duration) -> Self {
        ExpirationSweeper {
            objects: Arc::clone(&stores.objects),
            local: Arc::clone(&stores.local),
            history: Arc::clone(&stores.history),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Delete every remote object last modified before `now - retention`.
    pub async fn sweep(&self, retention: Duration) -> CalShareResult<SweepReport> {
        self.sweep_until(retention, &CancellationToken::new()).await
    }

    async fn sweep_until(
        &self,
        retention: Duration,
        token: &CancellationToken,
    ) -> CalShareResult<SweepReport> {
        let cutoff = Utc::now() - retention;
        let entries = self.objects.list().await?;
        let mut report = SweepReport::default();

        for entry in entries {
            if token.is_cancelled() {
                debug!(examined = report.examined, "sweep cancelled");
                report.cancelled = true;
                break;
            }
            report.examined += 1;

            let Some(last_modified) = entry.last_modified else {
                warn!(reference = %entry.reference, "no modification time, cannot judge age");
                report.failures.push(SweepFailure {
                    reference: entry.reference,
                    reason: "missing modification time".into(),
                });
                continue;
            };

            if last_modified >= cutoff {
                report.retained += 1;
                continue;
            }

            match self.objects.delete(&entry.reference).await {
                Ok(()) => {
                    debug!(reference = %entry.reference, "deleted expired object");
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!(reference = %entry.reference, error = %e, "could not delete expired object");
                    report.failures.push(SweepFailure {
                        reference: entry.reference,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            examined = report.examined,
            deleted = report.deleted,
            retained = report.retained,
            failed = report.failures.len(),
            "swept remote objects"
        );
        Ok(report)
    }

    /// Drop history records that expired at or before `now`, along with any
    /// local copy still around. A record whose uploaded file is still on the
    /// remote store is kept so the file stays traceable. Returns the number of
    /// records removed.
    pub async fn reconcile_history(&self, now: DateTime<Utc>) -> CalShareResult<usize> {
        self.reconcile_keeping(now, &HashSet::new()).await
    }

    async fn reconcile_keeping(
        &self,
        now: DateTime<Utc>,
        undeleted: &HashSet<ObjectRef>,
    ) -> CalShareResult<usize> {
        let mut still_remote: HashSet<ObjectRef> = self
            .objects
            .list()
            .await?
            .into_iter()
            .map(|entry| entry.reference)
            .collect();
        still_remote.extend(undeleted.iter().cloned());

        let mut removed = 0;

        for artifact in self.history.list().await? {
            if !artifact.is_expired(now) {
                continue;
            }

            if let Some(remote) = &artifact.remote
                && still_remote.contains(remote)
            {
                warn!(id = %artifact.id, reference = %remote, "expired record kept, uploaded file still present");
                continue;
            }

            if let Some(path) = &artifact.local_path
                && self.local.exists(path).await
                && let Err(e) = self.local.delete(path).await
            {
                warn!(path = %path.display(), error = %e, "could not delete local copy");
            }

            if self.history.delete(artifact.id).await? {
                debug!(id = %artifact.id, expired = %artifact.expires, "removed expired record");
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "removed expired history records");
        }
        Ok(removed)
    }

    /// One full pass: sweep remote objects, then expired records.
    pub async fn run(&self) -> CalShareResult<SweepReport> {
        self.run_until(&CancellationToken::new()).await
    }

    async fn run_until(&self, token: &CancellationToken) -> CalShareResult<SweepReport> {
        let mut report = self.sweep_until(self.retention, token).await?;
        if !report.cancelled {
            let undeleted: HashSet<ObjectRef> = report
                .failures
                .iter()
                .map(|failure| failure.reference.clone())
                .collect();
            report.records_removed = self.reconcile_keeping(Utc::now(), &undeleted).await?;
        }
        Ok(report)
    }

    /// Run one pass in the background. Cancelling the token stops the sweep
    /// before the next object.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<CalShareResult<SweepReport>> {
        tokio::spawn(async move { self.run_until(&token).await })
    }

    /// Run a pass every `period` until the token is cancelled.
    pub fn spawn_every(self: Arc<Self>, period: std::time::Duration, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.run_until(&token).await {
                    Ok(report) if !report.is_success() && !report.cancelled => {
                        warn!(failed = report.failures.len(), "sweep finished with failures");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "sweep failed"),
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(period) => {}
                }
            }
            debug!("periodic sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::GeneratedArtifact;
    use crate::draft::{EventDraft, EventDraftSet};
    use crate::storage::{MemoryHistoryStore, MemoryLocalStore, MemoryObjectStore, StaticEntitlement};

    struct Harness {
        objects: Arc<MemoryObjectStore>,
        local: Arc<MemoryLocalStore>,
        history: Arc<MemoryHistoryStore>,
    }

    fn make_sweeper() -> (ExpirationSweeper, Harness) {
        let harness = Harness {
            objects: Arc::new(MemoryObjectStore::new()),
            local: Arc::new(MemoryLocalStore::new()),
            history: Arc::new(MemoryHistoryStore::new()),
        };
        let stores = Stores {
            objects: harness.objects.clone(),
            local: harness.local.clone(),
            history: harness.history.clone(),
            entitlement: Arc::new(StaticEntitlement(true)),
        };
        (ExpirationSweeper::new(&stores, Duration::days(7)), harness)
    }

    fn days_ago(days: i64) -> Option<DateTime<Utc>> {
        Some(Utc::now() - Duration::days(days))
    }

    fn make_artifact(created: DateTime<Utc>, local_path: Option<std::path::PathBuf>) -> GeneratedArtifact {
        make_uploaded_artifact(created, None, local_path)
    }

    fn make_uploaded_artifact(
        created: DateTime<Utc>,
        remote: Option<ObjectRef>,
        local_path: Option<std::path::PathBuf>,
    ) -> GeneratedArtifact {
        GeneratedArtifact::new(
            EventDraftSet::from_drafts("", vec![EventDraft::starting_at(created)]),
            created,
            Duration::days(7),
            remote,
            local_path,
        )
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_objects_past_retention() {
        let (sweeper, harness) = make_sweeper();
        let old = harness.objects.insert_object(days_ago(8));
        let recent = harness.objects.insert_object(days_ago(6));

        let report = sweeper.sweep(Duration::days(7)).await.unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.retained, 1);
        assert!(report.is_success());
        assert!(!harness.objects.contains(&old));
        assert!(harness.objects.contains(&recent));
    }

    #[tokio::test]
    async fn test_sweep_continues_past_failures() {
        let (sweeper, harness) = make_sweeper();
        let stuck = harness.objects.insert_object(days_ago(10));
        let unknown_age = harness.objects.insert_object(None);
        let old = harness.objects.insert_object(days_ago(9));
        harness.objects.fail_delete_of(&stuck);

        let report = sweeper.sweep(Duration::days(7)).await.unwrap();

        assert!(!report.is_success());
        assert_eq!(report.examined, 3);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().any(|f| f.reference == stuck));
        assert!(report.failures.iter().any(|f| f.reference == unknown_age));
        assert!(!harness.objects.contains(&old));
        assert!(harness.objects.contains(&stuck));
    }

    #[tokio::test]
    async fn test_sweep_list_failure_is_error() {
        let (sweeper, harness) = make_sweeper();
        harness.objects.fail_list(true);

        assert!(sweeper.sweep(Duration::days(7)).await.is_err());
    }

    #[tokio::test]
    async fn test_sweep_empty_store() {
        let (sweeper, _harness) = make_sweeper();

        let report = sweeper.sweep(Duration::days(7)).await.unwrap();

        assert_eq!(report, SweepReport::default());
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_reconcile_history_removes_expired_records() {
        let (sweeper, harness) = make_sweeper();
        let path = harness.local.write("old.ics", b"BEGIN:VCALENDAR").await.unwrap();
        let expired = make_artifact(Utc::now() - Duration::days(8), Some(path.clone()));
        let live = make_artifact(Utc::now() - Duration::days(1), None);
        harness.history.insert(&expired).await.unwrap();
        harness.history.insert(&live).await.unwrap();

        let removed = sweeper.reconcile_history(Utc::now()).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(harness.history.list().await.unwrap(), vec![live]);
        assert!(!harness.local.exists(&path).await);
    }

    #[tokio::test]
    async fn test_run_sweeps_and_reconciles() {
        let (sweeper, harness) = make_sweeper();
        harness.objects.insert_object(days_ago(30));
        harness
            .history
            .insert(&make_artifact(Utc::now() - Duration::days(30), None))
            .await
            .unwrap();

        let report = sweeper.run().await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.records_removed, 1);
        assert!(harness.objects.is_empty());
        assert_eq!(harness.history.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_spawned_sweep_reports() {
        let (sweeper, harness) = make_sweeper();
        harness.objects.insert_object(days_ago(8));

        let report = Arc::new(sweeper)
            .spawn(CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.deleted, 1);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_cancelled_sweep_stops_before_deleting() {
        let (sweeper, harness) = make_sweeper();
        let old = harness.objects.insert_object(days_ago(8));
        let token = CancellationToken::new();
        token.cancel();

        let report = Arc::new(sweeper).spawn(token).await.unwrap().unwrap();

        assert!(report.cancelled);
        assert!(!report.is_success());
        assert_eq!(report.examined, 0);
        assert!(harness.objects.contains(&old));
    }

    #[tokio::test]
    async fn test_periodic_sweeper_stops_on_cancel() {
        let (sweeper, harness) = make_sweeper();
        harness.objects.insert_object(days_ago(8));
        let token = CancellationToken::new();

        let handle = Arc::new(sweeper).spawn_every(std::time::Duration::from_secs(3600), token.clone());
        for _ in 0..100 {
            if harness.objects.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        token.cancel();

        handle.await.unwrap();
        assert!(harness.objects.is_empty());
    }

    #[tokio::test]
    async fn test_run_keeps_record_when_remote_delete_fails() {
        let (sweeper, harness) = make_sweeper();
        let stuck = harness.objects.insert_object(days_ago(8));
        harness.objects.fail_delete_of(&stuck);
        let path = harness.local.write("stuck.ics", b"BEGIN:VCALENDAR").await.unwrap();
        let record = make_uploaded_artifact(Utc::now() - Duration::days(8), Some(stuck.clone()), Some(path.clone()));
        harness.history.insert(&record).await.unwrap();

        let report = sweeper.run().await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.records_removed, 0);
        assert!(harness.objects.contains(&stuck));
        assert_eq!(harness.history.get(record.id).await.unwrap(), Some(record));
        assert!(harness.local.exists(&path).await);
    }

    #[tokio::test]
    async fn test_reconcile_keeps_record_while_remote_is_listed() {
        let (sweeper, harness) = make_sweeper();
        let listed = harness.objects.insert_object(days_ago(1));
        let gone = ObjectRef("memory://events/gone".into());
        let kept = make_uploaded_artifact(Utc::now() - Duration::days(8), Some(listed), None);
        let dropped = make_uploaded_artifact(Utc::now() - Duration::days(8), Some(gone), None);
        harness.history.insert(&kept).await.unwrap();
        harness.history.insert(&dropped).await.unwrap();

        let removed = sweeper.reconcile_history(Utc::now()).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(harness.history.list().await.unwrap(), vec![kept]);
    }

    #[tokio::test]
    async fn test_reconcile_list_failure_removes_nothing() {
        let (sweeper, harness) = make_sweeper();
        harness
            .history
            .insert(&make_artifact(Utc::now() - Duration::days(8), None))
            .await
            .unwrap();
        harness.objects.fail_list(true);

        assert!(sweeper.reconcile_history(Utc::now()).await.is_err());
        assert_eq!(harness.history.count().await.unwrap(), 1);
    }
}
