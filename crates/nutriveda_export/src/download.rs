//! Artifact delivery and handle lifetime.
//!
//! A presented artifact is cached under a [`ResourceHandle`] until its
//! retention window runs out. Re-downloads from the history reuse the cached
//! bytes while the handle is live; afterwards they report
//! [`RedownloadOutcome::Stale`] and the caller regenerates.

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use nutriveda_core::Clock;
use nutriveda_docs::BinaryArtifact;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::history::ExportHistoryEntry;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceHandle {
    pub id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// The sink refused the file. The artifact stays cached under `handle`.
    #[error("Could not start download of {filename}: {reason}")]
    TriggerFailed {
        handle: ResourceHandle,
        filename: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedownloadOutcome {
    Started(ResourceHandle),
    /// The handle expired or was revoked; the export has to be regenerated.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revocation {
    Revoked,
    /// A delivery is in flight; the handle goes away when it finishes.
    Deferred,
    Missing,
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Hands a finished file to the user.
pub trait DownloadSink: Send + Sync {
    fn deliver(&self, artifact: &BinaryArtifact) -> anyhow::Result<()>;
}

/// Writes every delivered artifact into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&self, artifact: &BinaryArtifact) -> anyhow::Result<()> {
        let name = Path::new(&artifact.suggested_filename)
            .file_name()
            .with_context(|| format!("Invalid file name: {}", artifact.suggested_filename))?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory: {}", self.dir.display()))?;
        let path = self.dir.join(name);
        std::fs::write(&path, &artifact.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), size = artifact.size(), "Saved export");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Keeps deliveries in memory. Can be told to refuse them.
#[derive(Debug, Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.deliveries.lock().len()
    }
}

impl DownloadSink for RecordingSink {
    fn deliver(&self, artifact: &BinaryArtifact) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("download blocked by host");
        }
        self.deliveries.lock().push(Delivery {
            filename: artifact.suggested_filename.clone(),
            mime_type: artifact.mime_type.clone(),
            bytes: artifact.bytes.clone(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DownloadManager
// ---------------------------------------------------------------------------

struct CachedArtifact {
    artifact: Arc<BinaryArtifact>,
    expires_at: DateTime<Utc>,
    in_flight: usize,
    revoke_pending: bool,
}

type Resources = Arc<Mutex<HashMap<String, CachedArtifact>>>;

/// Marks one delivery as in flight; finishing it runs any revocation that
/// came due meanwhile.
struct InFlight {
    resources: Resources,
    id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut resources = self.resources.lock();
        let finished = match resources.get_mut(&self.id) {
            Some(cached) => {
                cached.in_flight = cached.in_flight.saturating_sub(1);
                cached.in_flight == 0 && cached.revoke_pending
            }
            None => false,
        };
        if finished {
            resources.remove(&self.id);
            info!(handle = %self.id, "Deferred revocation completed");
        }
    }
}

#[derive(Clone)]
pub struct DownloadManager {
    resources: Resources,
    sink: Arc<dyn DownloadSink>,
    clock: Arc<dyn Clock>,
    retention: TimeDelta,
}

impl DownloadManager {
    /// Retention below one second is raised to one second.
    pub fn new(sink: Arc<dyn DownloadSink>, clock: Arc<dyn Clock>, retention: Duration) -> Self {
        let retention = TimeDelta::from_std(retention)
            .unwrap_or(TimeDelta::MAX)
            .max(TimeDelta::seconds(1));
        Self {
            resources: Arc::new(Mutex::new(HashMap::new())),
            sink,
            clock,
            retention,
        }
    }

    pub fn retention(&self) -> TimeDelta {
        self.retention
    }

    /// Cache `artifact`, trigger one download and schedule its revocation.
    pub fn present(&self, artifact: BinaryArtifact) -> Result<ResourceHandle, DownloadError> {
        let now = self.clock.now();
        let handle = ResourceHandle {
            id: Uuid::new_v4().to_string(),
            expires_at: now
                .checked_add_signed(self.retention)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        let filename = artifact.suggested_filename.clone();
        self.resources.lock().insert(
            handle.id.clone(),
            CachedArtifact {
                artifact: Arc::new(artifact),
                expires_at: handle.expires_at,
                in_flight: 0,
                revoke_pending: false,
            },
        );
        debug!(handle = %handle.id, file = %filename, expires_at = %handle.expires_at, "Artifact cached");

        match self.deliver(&handle)? {
            RedownloadOutcome::Started(handle) => Ok(handle),
            RedownloadOutcome::Stale => Err(DownloadError::TriggerFailed {
                handle,
                filename,
                reason: "artifact was revoked before delivery".into(),
            }),
        }
    }

    /// Deliver the cached bytes of `entry` again if its handle is still live.
    pub fn redownload(
        &self,
        entry: &ExportHistoryEntry,
    ) -> Result<RedownloadOutcome, DownloadError> {
        match &entry.resource_handle {
            Some(handle) => self.deliver(handle),
            None => Ok(RedownloadOutcome::Stale),
        }
    }

    fn begin_delivery(&self, id: &str) -> Option<(InFlight, Arc<BinaryArtifact>)> {
        let now = self.clock.now();
        let mut resources = self.resources.lock();
        let cached = resources.get_mut(id)?;
        if cached.revoke_pending || cached.expires_at <= now {
            return None;
        }
        cached.in_flight += 1;
        let ticket = InFlight {
            resources: Arc::clone(&self.resources),
            id: id.to_string(),
        };
        Some((ticket, Arc::clone(&cached.artifact)))
    }

    fn deliver(&self, handle: &ResourceHandle) -> Result<RedownloadOutcome, DownloadError> {
        let Some((ticket, artifact)) = self.begin_delivery(&handle.id) else {
            debug!(handle = %handle.id, "Handle is stale");
            return Ok(RedownloadOutcome::Stale);
        };
        let result = self.sink.deliver(&artifact);
        drop(ticket);

        match result {
            Ok(()) => {
                info!(handle = %handle.id, file = %artifact.suggested_filename, "Download started");
                Ok(RedownloadOutcome::Started(handle.clone()))
            }
            Err(e) => {
                warn!(handle = %handle.id, "Download trigger failed: {e:#}");
                Err(DownloadError::TriggerFailed {
                    handle: handle.clone(),
                    filename: artifact.suggested_filename.clone(),
                    reason: format!("{e:#}"),
                })
            }
        }
    }

    /// Drop the cached artifact behind `id`. Idempotent.
    pub fn revoke(&self, id: &str) -> Revocation {
        let mut resources = self.resources.lock();
        let Some(cached) = resources.get_mut(id) else {
            return Revocation::Missing;
        };
        if cached.in_flight > 0 {
            cached.revoke_pending = true;
            warn!(handle = %id, "Revocation deferred until delivery finishes");
            return Revocation::Deferred;
        }
        resources.remove(id);
        debug!(handle = %id, "Handle revoked");
        Revocation::Revoked
    }

    /// Fire every scheduled revocation that is due. Returns how many fired.
    pub fn run_due_revocations(&self) -> usize {
        let now = self.clock.now();
        let mut fired = 0;
        self.resources.lock().retain(|id, cached| {
            if cached.revoke_pending || cached.expires_at > now {
                return true;
            }
            fired += 1;
            if cached.in_flight > 0 {
                cached.revoke_pending = true;
                warn!(handle = %id, "Revocation deferred until delivery finishes");
                true
            } else {
                debug!(handle = %id, "Handle expired");
                false
            }
        });
        fired
    }

    /// Whether `handle` can still be re-downloaded.
    pub fn is_live(&self, handle: &ResourceHandle) -> bool {
        let now = self.clock.now();
        self.resources
            .lock()
            .get(&handle.id)
            .is_some_and(|c| !c.revoke_pending && c.expires_at > now)
    }

    /// Number of cached artifacts, including ones waiting on a deferred
    /// revocation.
    pub fn cached_count(&self) -> usize {
        self.resources.lock().len()
    }

    /// Run [`Self::run_due_revocations`] every `period` until the returned
    /// task is aborted.
    pub fn spawn_revocation_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        let period = period.max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let fired = manager.run_due_revocations();
                if fired > 0 {
                    debug!(fired, "Swept expired downloads");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobScope;
    use nutriveda_core::ManualClock;
    use nutriveda_docs::{ExportFormat, ExportOptions};
    use std::sync::atomic::AtomicUsize;

    const RETENTION: Duration = Duration::from_secs(300);

    fn artifact(name: &str) -> BinaryArtifact {
        BinaryArtifact {
            bytes: b"%PDF-1.4 test".to_vec(),
            mime_type: "application/pdf".into(),
            suggested_filename: name.into(),
        }
    }

    fn entry_for(handle: Option<ResourceHandle>) -> ExportHistoryEntry {
        ExportHistoryEntry {
            id: "entry-1".into(),
            filename: "diet-plan-1.pdf".into(),
            format: ExportFormat::Pdf,
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            size: 13,
            resource_handle: handle,
            scope: JobScope::Single,
            plan_ids: vec!["plan-diabetes-001".into()],
            options: ExportOptions::all(),
        }
    }

    fn setup() -> (DownloadManager, Arc<RecordingSink>, Arc<ManualClock>) {
        let sink = Arc::new(RecordingSink::new());
        let clock = Arc::new(ManualClock::at_epoch_secs(1_710_000_000));
        let manager = DownloadManager::new(sink.clone(), clock.clone(), RETENTION);
        (manager, sink, clock)
    }

    #[test]
    fn present_delivers_exactly_once() {
        let (manager, sink, clock) = setup();
        let handle = manager.present(artifact("diet-plan-1.pdf")).unwrap();
        assert_eq!(sink.count(), 1);
        assert_eq!(sink.deliveries()[0].filename, "diet-plan-1.pdf");
        assert_eq!(handle.expires_at, clock.now() + TimeDelta::seconds(300));
        assert!(manager.is_live(&handle));
    }

    #[test]
    fn redownload_reuses_cached_bytes() {
        let (manager, sink, _clock) = setup();
        let handle = manager.present(artifact("a.pdf")).unwrap();
        let outcome = manager.redownload(&entry_for(Some(handle.clone()))).unwrap();
        assert_eq!(outcome, RedownloadOutcome::Started(handle));
        assert_eq!(sink.count(), 2);
        assert_eq!(sink.deliveries()[0], sink.deliveries()[1]);
    }

    #[test]
    fn expired_handle_is_stale_before_and_after_sweep() {
        let (manager, sink, clock) = setup();
        let handle = manager.present(artifact("a.pdf")).unwrap();
        clock.advance(TimeDelta::seconds(300));

        let entry = entry_for(Some(handle.clone()));
        assert_eq!(manager.redownload(&entry).unwrap(), RedownloadOutcome::Stale);
        assert_eq!(manager.run_due_revocations(), 1);
        assert_eq!(manager.run_due_revocations(), 0);
        assert_eq!(manager.revoke(&handle.id), Revocation::Missing);
        assert_eq!(manager.redownload(&entry).unwrap(), RedownloadOutcome::Stale);
        assert_eq!(sink.count(), 1);
    }

    #[test]
    fn entry_without_handle_is_stale() {
        let (manager, _sink, _clock) = setup();
        assert_eq!(
            manager.redownload(&entry_for(None)).unwrap(),
            RedownloadOutcome::Stale
        );
    }

    #[test]
    fn revoke_is_idempotent() {
        let (manager, _sink, _clock) = setup();
        let handle = manager.present(artifact("a.pdf")).unwrap();
        assert_eq!(manager.revoke(&handle.id), Revocation::Revoked);
        assert_eq!(manager.revoke(&handle.id), Revocation::Missing);
        assert!(!manager.is_live(&handle));
    }

    #[test]
    fn trigger_failure_carries_handle() {
        let (manager, sink, _clock) = setup();
        sink.set_failing(true);
        let err = manager.present(artifact("a.pdf")).unwrap_err();
        let DownloadError::TriggerFailed {
            handle,
            filename,
            reason,
        } = err;
        assert_eq!(filename, "a.pdf");
        assert!(reason.contains("blocked"));
        assert!(manager.is_live(&handle));

        sink.set_failing(false);
        let outcome = manager.redownload(&entry_for(Some(handle))).unwrap();
        assert!(matches!(outcome, RedownloadOutcome::Started(_)));
    }

    #[derive(Default)]
    struct HookSink {
        hook: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
        delivered: AtomicUsize,
    }

    impl DownloadSink for HookSink {
        fn deliver(&self, _artifact: &BinaryArtifact) -> anyhow::Result<()> {
            if let Some(hook) = self.hook.lock().as_ref() {
                hook();
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn revocation_due_during_delivery_is_deferred() {
        let sink = Arc::new(HookSink::default());
        let clock = Arc::new(ManualClock::at_epoch_secs(0));
        let manager = DownloadManager::new(sink.clone(), clock.clone(), RETENTION);
        let handle = manager.present(artifact("a.pdf")).unwrap();

        let fired = Arc::new(Mutex::new(None));
        let (m, c, f, id) = (manager.clone(), clock.clone(), fired.clone(), handle.id.clone());
        *sink.hook.lock() = Some(Box::new(move || {
            c.advance(TimeDelta::seconds(301));
            let count = m.run_due_revocations();
            // Still cached while the bytes are being handed over.
            *f.lock() = Some((count, m.cached_count(), m.revoke(&id)));
        }));

        let outcome = manager.redownload(&entry_for(Some(handle.clone()))).unwrap();
        assert_eq!(outcome, RedownloadOutcome::Started(handle.clone()));
        assert_eq!(*fired.lock(), Some((1, 1, Revocation::Deferred)));
        assert_eq!(manager.cached_count(), 0);
        assert_eq!(sink.delivered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn directory_sink_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(tmp.path().join("exports"));
        sink.deliver(&artifact("diet-plan-42.pdf")).unwrap();
        let written = std::fs::read(tmp.path().join("exports").join("diet-plan-42.pdf")).unwrap();
        assert_eq!(written, b"%PDF-1.4 test");
    }

    #[test]
    fn directory_sink_strips_directories_from_name() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(tmp.path());
        sink.deliver(&artifact("../escape.pdf")).unwrap();
        assert!(tmp.path().join("escape.pdf").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_revokes_expired_handles() {
        let (manager, _sink, clock) = setup();
        manager.present(artifact("a.pdf")).unwrap();
        let sweeper = manager.spawn_revocation_sweeper(Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(manager.cached_count(), 1);

        clock.advance(TimeDelta::seconds(301));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(manager.cached_count(), 0);
        sweeper.abort();
    }
}
