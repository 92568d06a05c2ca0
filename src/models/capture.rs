//! Memory-capture job types.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ArtifactId, EvidenceId};

/// Unique identifier for a capture job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a new job ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh job ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("job_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What a capture job does against its target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// One immediate snapshot of the process state.
    Snapshot,
    /// Periodic sampling over a bounded window.
    TimedAnalysis {
        /// Total sampling window in seconds.
        duration_secs: u64,
        /// Seconds between samples.
        interval_secs: u64,
    },
}

impl JobKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::TimedAnalysis { .. } => "timed_analysis",
        }
    }
}

/// Lifecycle state of a capture job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, worker not yet started.
    Pending,
    /// Worker running.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Stopped by a cancel request.
    Cancelled,
}

impl JobState {
    /// Returns the state as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true while the job holds its target pid.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Returns true once the job can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One point-in-time reading of a sampled process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySample {
    /// Sample timestamp (unix millis).
    pub timestamp: u64,
    /// Resident set size in bytes.
    pub rss_bytes: u64,
    /// Virtual memory size in bytes.
    pub vsize_bytes: u64,
    /// Thread count.
    pub threads: u64,
    /// Kernel process state character (`R`, `S`, `Z`, ...).
    pub state: String,
}

/// A memory-capture or timed-analysis job.
///
/// Owned by the scheduler while active; demoted to an immutable historical
/// record once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCaptureJob {
    /// Unique identifier.
    pub id: JobId,
    /// Target process id.
    pub pid: u32,
    /// What the job does.
    pub kind: JobKind,
    /// Current state.
    pub state: JobState,
    /// Handler who requested the job.
    pub handler: String,
    /// Location string for the custody record.
    pub location: String,
    /// Start timestamp (unix millis); set when the worker begins.
    pub started_at: Option<u64>,
    /// End timestamp (unix millis); set on any terminal state.
    pub ended_at: Option<u64>,
    /// Number of samples collected so far (timed analysis only).
    pub samples_collected: usize,
    /// Artifact holding the capture payload, once stored.
    pub artifact_id: Option<ArtifactId>,
    /// Evidence item registered for the capture, once recorded.
    pub evidence_id: Option<EvidenceId>,
    /// Failure annotation for `Failed` jobs.
    pub failure: Option<String>,
}

impl MemoryCaptureJob {
    /// Creates a pending job.
    #[must_use]
    pub fn pending(
        pid: u32,
        kind: JobKind,
        handler: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id: JobId::generate(),
            pid,
            kind,
            state: JobState::Pending,
            handler: handler.into(),
            location: location.into(),
            started_at: None,
            ended_at: None,
            samples_collected: 0,
            artifact_id: None,
            evidence_id: None,
            failure: None,
        }
    }
}
