//! Capture scheduler: concurrent, time-bounded memory-capture jobs.
//!
//! Each job runs as an independent tokio task owning its own sampling loop.
//! Jobs for different pids run concurrently; a second job for a pid that is
//! already being captured is rejected, never queued. Cancellation is
//! cooperative: the sampling loop observes a watch channel between samples,
//! while an immediate capture in its copy phase always runs to completion.

use crate::models::{
    JobId, JobKind, JobState, MemoryCaptureJob, MemorySample,
};
use crate::services::{DumpStore, EvidenceRegistry, ProcessProbe};
use crate::{Error, Result, current_timestamp_millis};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

/// Minimum timed-analysis window in seconds.
pub const MIN_ANALYSIS_SECS: u64 = 5;
/// Maximum timed-analysis window in seconds.
pub const MAX_ANALYSIS_SECS: u64 = 300;

/// A live job plus its control surfaces.
struct JobEntry {
    job: MemoryCaptureJob,
    cancel: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    jobs: Mutex<HashMap<JobId, JobEntry>>,
    probe: Arc<dyn ProcessProbe>,
    dumps: Arc<DumpStore>,
    registry: Arc<EvidenceRegistry>,
}

/// Scheduler for memory-capture and timed-analysis jobs.
///
/// Cheap to clone; all clones share the same job table.
#[derive(Clone)]
pub struct CaptureScheduler {
    inner: Arc<Inner>,
}

impl CaptureScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(
        probe: Arc<dyn ProcessProbe>,
        dumps: Arc<DumpStore>,
        registry: Arc<EvidenceRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(HashMap::new()),
                probe,
                dumps,
                registry,
            }),
        }
    }

    /// Starts an immediate memory capture of `pid`.
    ///
    /// Returns as soon as the worker is spawned; poll [`status`](Self::status)
    /// for the result. Once the copy phase begins the capture runs to
    /// completion or failure; it is not preemptible.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::ProcessNotFound`] if the pid does not resolve at call time;
    /// [`Error::AlreadyCapturing`] if an active job holds the pid.
    #[instrument(skip(self, notes))]
    pub fn start_capture(
        &self,
        pid: u32,
        handler: &str,
        location: &str,
        notes: Option<String>,
    ) -> Result<JobId> {
        self.inner.probe.resolve(pid)?;

        let job = MemoryCaptureJob::pending(pid, JobKind::Snapshot, handler, location);
        let job_id = self.admit(job)?;

        let inner = Arc::clone(&self.inner);
        let id = job_id.clone();
        let handle = tokio::spawn(async move {
            run_snapshot(&inner, &id, notes).await;
        });
        self.attach_handle(&job_id, handle);

        tracing::info!(pid, job_id = %job_id, "Started memory capture");
        Ok(job_id)
    }

    /// Starts a timed analysis of `pid`, sampling every `interval_secs` until
    /// `duration_secs` elapse or the job is cancelled, whichever first.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidDuration`] unless `5 <= duration <= 300` and
    /// `1 <= interval <= duration`; [`Error::ProcessNotFound`] and
    /// [`Error::AlreadyCapturing`] as for [`start_capture`](Self::start_capture).
    #[instrument(skip(self))]
    pub fn start_timed_analysis(
        &self,
        pid: u32,
        duration_secs: u64,
        interval_secs: u64,
        handler: &str,
        location: &str,
    ) -> Result<JobId> {
        if !(MIN_ANALYSIS_SECS..=MAX_ANALYSIS_SECS).contains(&duration_secs) {
            return Err(Error::InvalidDuration {
                seconds: duration_secs,
                min: MIN_ANALYSIS_SECS,
                max: MAX_ANALYSIS_SECS,
            });
        }
        if interval_secs == 0 || interval_secs > duration_secs {
            return Err(Error::InvalidDuration {
                seconds: interval_secs,
                min: 1,
                max: duration_secs,
            });
        }

        self.inner.probe.resolve(pid)?;

        let kind = JobKind::TimedAnalysis {
            duration_secs,
            interval_secs,
        };
        let job = MemoryCaptureJob::pending(pid, kind, handler, location);
        let job_id = self.admit(job)?;

        let cancel_rx = self.cancel_receiver(&job_id);
        let inner = Arc::clone(&self.inner);
        let id = job_id.clone();
        let handle = tokio::spawn(async move {
            run_timed(&inner, &id, duration_secs, interval_secs, cancel_rx).await;
        });
        self.attach_handle(&job_id, handle);

        tracing::info!(pid, job_id = %job_id, duration_secs, interval_secs, "Started timed analysis");
        Ok(job_id)
    }

    /// Cancels a running timed analysis.
    ///
    /// Sampling stops at the next sample boundary. Cancelling a job that is
    /// not running (or an immediate capture already in its copy phase) is a
    /// no-op; returns whether a cancellation was actually signalled.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let jobs = match self.inner.jobs.lock() {
            Ok(jobs) => jobs,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(entry) = jobs.get(job_id) else {
            return false;
        };

        // Immediate captures are not preemptible.
        if !entry.job.state.is_active() || entry.job.kind == JobKind::Snapshot {
            return false;
        }

        let signalled = entry.cancel.send(true).is_ok();
        if signalled {
            tracing::info!(job_id = %job_id, "Cancellation requested");
            metrics::counter!("capture_jobs_cancel_requested_total").increment(1);
        }
        signalled
    }

    /// Returns a snapshot of a job. Non-blocking.
    #[must_use]
    pub fn status(&self, job_id: &JobId) -> Option<MemoryCaptureJob> {
        let jobs = match self.inner.jobs.lock() {
            Ok(jobs) => jobs,
            Err(poisoned) => poisoned.into_inner(),
        };
        jobs.get(job_id).map(|entry| entry.job.clone())
    }

    /// Lists all jobs, live and historical, newest first.
    #[must_use]
    pub fn jobs(&self) -> Vec<MemoryCaptureJob> {
        let jobs = match self.inner.jobs.lock() {
            Ok(jobs) => jobs,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut all: Vec<_> = jobs.values().map(|entry| entry.job.clone()).collect();
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all
    }

    /// Waits for a job's worker to finish and returns the final record.
    pub async fn wait(&self, job_id: &JobId) -> Option<MemoryCaptureJob> {
        let handle = {
            let mut jobs = match self.inner.jobs.lock() {
                Ok(jobs) => jobs,
                Err(poisoned) => poisoned.into_inner(),
            };
            jobs.get_mut(job_id).and_then(|entry| entry.handle.take())
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(job_id = %job_id, error = %e, "Capture worker panicked");
            }
        }
        self.status(job_id)
    }

    /// Admits a job, enforcing one active job per pid.
    ///
    /// The check and the insert happen under one lock acquisition; two
    /// concurrent starts for the same pid serialize here and exactly one
    /// wins.
    fn admit(&self, job: MemoryCaptureJob) -> Result<JobId> {
        let mut jobs = match self.inner.jobs.lock() {
            Ok(jobs) => jobs,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(active) = jobs
            .values()
            .find(|entry| entry.job.pid == job.pid && entry.job.state.is_active())
        {
            return Err(Error::AlreadyCapturing {
                pid: job.pid,
                job_id: active.job.id.as_str().to_string(),
            });
        }

        let job_id = job.id.clone();
        let (cancel, _) = watch::channel(false);
        jobs.insert(
            job_id.clone(),
            JobEntry {
                job,
                cancel,
                handle: None,
            },
        );
        metrics::counter!("capture_jobs_admitted_total").increment(1);
        Ok(job_id)
    }

    fn attach_handle(&self, job_id: &JobId, handle: JoinHandle<()>) {
        let mut jobs = match self.inner.jobs.lock() {
            Ok(jobs) => jobs,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(entry) = jobs.get_mut(job_id) {
            entry.handle = Some(handle);
        }
    }

    fn cancel_receiver(&self, job_id: &JobId) -> watch::Receiver<bool> {
        let jobs = match self.inner.jobs.lock() {
            Ok(jobs) => jobs,
            Err(poisoned) => poisoned.into_inner(),
        };
        jobs.get(job_id).map_or_else(
            || watch::channel(false).1,
            |entry| entry.cancel.subscribe(),
        )
    }
}

/// Mutates a job record under the jobs lock.
fn update_job(inner: &Inner, job_id: &JobId, f: impl FnOnce(&mut MemoryCaptureJob)) {
    let mut jobs = match inner.jobs.lock() {
        Ok(jobs) => jobs,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(entry) = jobs.get_mut(job_id) {
        f(&mut entry.job);
    }
}

/// Reads a job record under the jobs lock.
fn read_job(inner: &Inner, job_id: &JobId) -> Option<MemoryCaptureJob> {
    let jobs = match inner.jobs.lock() {
        Ok(jobs) => jobs,
        Err(poisoned) => poisoned.into_inner(),
    };
    jobs.get(job_id).map(|entry| entry.job.clone())
}

/// Worker for an immediate capture.
async fn run_snapshot(inner: &Inner, job_id: &JobId, notes: Option<String>) {
    let Some(job) = read_job(inner, job_id) else {
        return;
    };
    update_job(inner, job_id, |j| {
        j.state = JobState::Running;
        j.started_at = Some(current_timestamp_millis());
    });

    // Copy phase: runs to completion or failure, never preempted.
    let outcome = capture_once(inner, &job, notes.as_deref());

    match outcome {
        Ok(()) => {
            update_job(inner, job_id, |j| {
                j.state = JobState::Completed;
                j.ended_at = Some(current_timestamp_millis());
            });
            metrics::counter!("capture_jobs_completed_total").increment(1);
        },
        Err(e) => {
            let failure = e.to_string();
            record_failure(inner, &job, &failure);
            update_job(inner, job_id, |j| {
                j.state = JobState::Failed;
                j.ended_at = Some(current_timestamp_millis());
                j.failure = Some(failure);
            });
            metrics::counter!("capture_jobs_failed_total").increment(1);
        },
    }
}

/// Performs the snapshot, stores the artifact, and records the evidence.
fn capture_once(inner: &Inner, job: &MemoryCaptureJob, notes: Option<&str>) -> crate::Result<()> {
    let bytes = inner.probe.snapshot(job.pid)?;
    let artifact = inner.dumps.store(&bytes, &job.id)?;

    let mut note = format!("memory capture of pid {}", job.pid);
    if let Some(extra) = notes {
        note.push_str("; ");
        note.push_str(extra);
    }
    let evidence =
        inner
            .registry
            .register_capture(job.pid, &artifact, &job.handler, &job.location, &note)?;

    update_job(inner, &job.id, |j| {
        j.artifact_id = Some(artifact.id.clone());
        j.evidence_id = Some(evidence.id.clone());
    });
    Ok(())
}

/// How a sampling loop ended.
enum LoopEnd {
    Elapsed,
    Cancelled,
    Failed(String),
}

/// Worker for a timed analysis.
async fn run_timed(
    inner: &Inner,
    job_id: &JobId,
    duration_secs: u64,
    interval_secs: u64,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let Some(job) = read_job(inner, job_id) else {
        return;
    };
    update_job(inner, job_id, |j| {
        j.state = JobState::Running;
        j.started_at = Some(current_timestamp_millis());
    });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(duration_secs);
    let mut samples: Vec<MemorySample> = Vec::new();

    let end = loop {
        match inner.probe.sample(job.pid) {
            Ok(sample) => {
                samples.push(sample);
                let collected = samples.len();
                update_job(inner, job_id, |j| j.samples_collected = collected);
            },
            Err(e) => break LoopEnd::Failed(e.to_string()),
        }

        if tokio::time::Instant::now() >= deadline {
            break LoopEnd::Elapsed;
        }

        // Responsive to cancellation within one interval.
        tokio::select! {
            () = tokio::time::sleep(Duration::from_secs(interval_secs)) => {},
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    break LoopEnd::Cancelled;
                }
            },
        }

        if tokio::time::Instant::now() >= deadline {
            break LoopEnd::Elapsed;
        }
    };

    finish_timed(inner, &job, samples, &end);
}

/// Persists the timeline and settles the job record.
fn finish_timed(inner: &Inner, job: &MemoryCaptureJob, samples: Vec<MemorySample>, end: &LoopEnd) {
    let count = samples.len();
    let note = match end {
        LoopEnd::Elapsed => format!("timed analysis completed, {count} samples"),
        LoopEnd::Cancelled => format!("timed analysis cancelled after {count} samples"),
        LoopEnd::Failed(e) => format!("timed analysis failed after {count} samples: {e}"),
    };

    // A cancellation before the first sample leaves no evidentiary trace;
    // anything else is recorded, partial timelines included.
    let persisted: crate::Result<()> = if count == 0 {
        match end {
            LoopEnd::Failed(e) => inner
                .registry
                .register_capture_failure(job.pid, &job.handler, &job.location, e)
                .map(|_| ()),
            _ => Ok(()),
        }
    } else {
        persist_timeline(inner, job, &samples, &note)
    };

    let (state, failure) = match (end, &persisted) {
        (LoopEnd::Failed(e), _) => (JobState::Failed, Some(e.clone())),
        (_, Err(e)) => (JobState::Failed, Some(e.to_string())),
        (LoopEnd::Cancelled, Ok(())) => (JobState::Cancelled, None),
        (LoopEnd::Elapsed, Ok(())) => (JobState::Completed, None),
    };

    if let Err(e) = &persisted {
        tracing::error!(job_id = %job.id, error = %e, "Failed to persist capture timeline");
    }

    update_job(inner, &job.id, |j| {
        j.state = state;
        j.ended_at = Some(current_timestamp_millis());
        j.failure = failure.clone();
    });

    match state {
        JobState::Completed => metrics::counter!("capture_jobs_completed_total").increment(1),
        JobState::Cancelled => metrics::counter!("capture_jobs_cancelled_total").increment(1),
        _ => metrics::counter!("capture_jobs_failed_total").increment(1),
    }
}

/// Serializes the sample timeline, stores it, and registers the evidence.
fn persist_timeline(
    inner: &Inner,
    job: &MemoryCaptureJob,
    samples: &[MemorySample],
    note: &str,
) -> crate::Result<()> {
    let bytes =
        serde_json::to_vec_pretty(samples).map_err(|e| Error::storage("serialize_timeline", e))?;
    let artifact = inner.dumps.store(&bytes, &job.id)?;
    let evidence = inner.registry.register_capture(
        job.pid,
        &artifact,
        &job.handler,
        &job.location,
        note,
    )?;

    update_job(inner, &job.id, |j| {
        j.artifact_id = Some(artifact.id.clone());
        j.evidence_id = Some(evidence.id.clone());
    });
    Ok(())
}

/// Best-effort evidentiary record for a failed capture.
fn record_failure(inner: &Inner, job: &MemoryCaptureJob, failure: &str) {
    match inner
        .registry
        .register_capture_failure(job.pid, &job.handler, &job.location, failure)
    {
        Ok(evidence) => update_job(inner, &job.id, |j| j.evidence_id = Some(evidence.id.clone())),
        Err(e) => {
            // The failure itself could not be logged; nothing left but the trace.
            tracing::error!(job_id = %job.id, error = %e, "Failed to record capture failure");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{EvidenceRegistry, ScriptedProbe};
    use crate::storage::{CustodyStore, SqliteStore};
    use tempfile::TempDir;

    fn scheduler_fixture() -> (CaptureScheduler, Arc<ScriptedProbe>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn CustodyStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let dumps =
            Arc::new(DumpStore::new(dir.path().join("dumps"), Arc::clone(&store)).unwrap());
        let registry = Arc::new(EvidenceRegistry::new(store));
        let probe = Arc::new(ScriptedProbe::new());
        let probe_dyn: Arc<dyn ProcessProbe> = Arc::clone(&probe);
        let scheduler = CaptureScheduler::new(probe_dyn, dumps, registry);
        (scheduler, probe, dir)
    }

    #[test]
    fn test_duration_window_is_validated_before_anything_runs() {
        let (scheduler, probe, _dir) = scheduler_fixture();
        probe.add_process(7, "target");

        // Bounds are checked before the probe or job table are touched,
        // so no runtime is needed for the rejection paths.
        assert!(matches!(
            scheduler.start_timed_analysis(7, 4, 1, "h", "l"),
            Err(Error::InvalidDuration {
                seconds: 4,
                min: MIN_ANALYSIS_SECS,
                max: MAX_ANALYSIS_SECS,
            })
        ));
        assert!(matches!(
            scheduler.start_timed_analysis(7, 301, 1, "h", "l"),
            Err(Error::InvalidDuration { seconds: 301, .. })
        ));
        assert!(matches!(
            scheduler.start_timed_analysis(7, 60, 0, "h", "l"),
            Err(Error::InvalidDuration { .. })
        ));
        assert!(matches!(
            scheduler.start_timed_analysis(7, 60, 61, "h", "l"),
            Err(Error::InvalidDuration { .. })
        ));
        assert!(scheduler.jobs().is_empty());
    }

    #[test]
    fn test_snapshot_capture_completes() {
        let (scheduler, probe, _dir) = scheduler_fixture();
        probe.add_process(7, "target");

        tokio_test::block_on(async {
            let job_id = scheduler.start_capture(7, "h", "l", None).unwrap();
            let job = scheduler.wait(&job_id).await.unwrap();
            assert_eq!(job.state, JobState::Completed);
            assert!(job.artifact_id.is_some());
            assert!(job.evidence_id.is_some());
        });
    }

    #[test]
    fn test_unknown_pid_is_rejected_at_call_time() {
        let (scheduler, _probe, _dir) = scheduler_fixture();
        assert!(matches!(
            scheduler.start_capture(404, "h", "l", None),
            Err(Error::ProcessNotFound { pid: 404 })
        ));
    }
}
