//! # Custodian
//!
//! Evidence custody ledger and memory-capture orchestration engine.
//!
//! Custodian is the core of a digital-forensics case-management system. It
//! maintains an append-only, tamper-evident chain of custody for every piece
//! of evidence, drives the evidence lifecycle state machine, and coordinates
//! concurrent, time-bounded memory-capture jobs against live OS processes.
//!
//! ## Architecture
//!
//! - Append-only custody ledger backed by `SQLite` (WAL, single-writer)
//! - Evidence lifecycle registry with atomic state + ledger commits
//! - Concurrent capture scheduler on tokio with per-pid mutual exclusion
//! - Content-addressed dump storage with per-job provenance records
//! - Stateless pagination/filter facade for the read side
//!
//! ## Example
//!
//! ```rust,ignore
//! use custodian::{EvidenceRegistry, RegisterRequest, EvidenceKind};
//!
//! let item = registry.register(RegisterRequest {
//!     kind: EvidenceKind::File,
//!     content: bytes,
//!     handler: "agent.diaz".into(),
//!     location: "intake-desk-2".into(),
//!     ..Default::default()
//! })?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{CustodianConfig, FeatureFlags};
pub use models::{
    ArtifactId, CustodyAction, CustodyEvent, DumpArtifact, EvidenceFilter, EvidenceId,
    EvidenceItem, EvidenceKind, EvidenceState, EventFilter, JobId, JobKind, JobState,
    MemoryCaptureJob, MemorySample, Page, PageRequest, RegisterRequest, SortDir, SortKey,
};
pub use services::{
    CaptureScheduler, CustodyLedger, DeleteOutcome, DumpStore, EvidenceRegistry, ProcProbe,
    ProcessProbe, QueryFacade, ScriptedProbe, ServiceContainer,
};
pub use storage::{CustodyStore, SqliteStore};

/// Error type for custodian operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
/// Every variant maps to one machine-readable kind (see [`Error::kind`]) that
/// the client-facing boundary surfaces alongside the human-readable message.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The evidence id is not registered.
    ///
    /// Raised when a ledger append, a history read, or a state transition
    /// targets an id the registry has never seen.
    #[error("unknown evidence: {id}")]
    UnknownEvidence {
        /// The unrecognized evidence id.
        id: String,
    },

    /// The requested lifecycle transition is not valid from the current state.
    ///
    /// The evidence state machine is `Registered -> Analyzing -> Analyzed ->
    /// Deleted`, with direct deletion allowed from any non-terminal state.
    /// No event is appended when a transition is rejected.
    #[error("invalid transition for {id}: {from} -> {attempted}")]
    InvalidTransition {
        /// The evidence id.
        id: String,
        /// The state the evidence is currently in.
        from: String,
        /// The state the caller attempted to reach.
        attempted: String,
    },

    /// The computed event timestamp precedes the last event for this id.
    ///
    /// Custody events for an evidence id are totally ordered by timestamp.
    /// The caller must retry once the clock catches up, or inject a logical
    /// timestamp via the event request.
    #[error("clock regression for {id}: {attempted} < last {last}")]
    ClockRegression {
        /// The evidence id.
        id: String,
        /// Timestamp of the last recorded event (unix millis).
        last: u64,
        /// The regressive timestamp that was rejected (unix millis).
        attempted: u64,
    },

    /// Identical content is already registered (opt-in deduplication only).
    ///
    /// Duplicate submissions are distinct evidence items by default; this is
    /// raised only when the caller requested dedup on ingest.
    #[error("duplicate content: {hash} already registered as {existing_id}")]
    DuplicateContent {
        /// The sha-256 hash shared with existing evidence.
        hash: String,
        /// The evidence id already holding this content.
        existing_id: String,
    },

    /// A capture job is already running against this process.
    ///
    /// Jobs for the same pid are rejected, never queued; the caller retries
    /// after the active job reaches a terminal state.
    #[error("already capturing pid {pid} (job {job_id})")]
    AlreadyCapturing {
        /// The contested process id.
        pid: u32,
        /// The job currently holding the pid.
        job_id: String,
    },

    /// The target process could not be resolved at call time.
    #[error("process not found: pid {pid}")]
    ProcessNotFound {
        /// The unresolvable process id.
        pid: u32,
    },

    /// The requested analysis duration is outside the permitted window.
    #[error("invalid duration: {seconds}s (must be {min}..={max}s)")]
    InvalidDuration {
        /// The rejected duration in seconds.
        seconds: u64,
        /// Minimum permitted duration.
        min: u64,
        /// Maximum permitted duration.
        max: u64,
    },

    /// The dump artifact does not exist (or its payload is gone).
    #[error("artifact not found: {id}")]
    ArtifactNotFound {
        /// The unrecognized artifact id.
        id: String,
    },

    /// A storage operation failed.
    ///
    /// On a state-mutating path this aborts the enclosing transition: the
    /// registry never advances state while the custody append is missing.
    #[error("storage operation '{operation}' failed: {cause}")]
    Storage {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns the machine-readable error kind for the boundary.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownEvidence { .. } => "unknown_evidence",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::ClockRegression { .. } => "clock_regression",
            Self::DuplicateContent { .. } => "duplicate_content",
            Self::AlreadyCapturing { .. } => "already_capturing",
            Self::ProcessNotFound { .. } => "process_not_found",
            Self::InvalidDuration { .. } => "invalid_duration",
            Self::ArtifactNotFound { .. } => "artifact_not_found",
            Self::Storage { .. } => "storage_failure",
        }
    }

    /// Builds an [`Error::Storage`] from an operation name and cause.
    pub fn storage(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for custodian operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Custody ordering works at millisecond granularity; a per-id sequence
/// number breaks ties for events landing in the same millisecond. Falls back
/// to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownEvidence {
            id: "ev_404".to_string(),
        };
        assert_eq!(err.to_string(), "unknown evidence: ev_404");

        let err = Error::InvalidTransition {
            id: "ev_1".to_string(),
            from: "analyzed".to_string(),
            attempted: "analyzing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid transition for ev_1: analyzed -> analyzing"
        );

        let err = Error::Storage {
            operation: "append_event".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "storage operation 'append_event' failed: disk full"
        );
    }

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(
            Error::ProcessNotFound { pid: 1 }.kind(),
            "process_not_found"
        );
        assert_eq!(
            Error::InvalidDuration {
                seconds: 301,
                min: 5,
                max: 300
            }
            .kind(),
            "invalid_duration"
        );
        assert_eq!(
            Error::storage("open", "no such file").kind(),
            "storage_failure"
        );
    }

    #[test]
    fn test_current_timestamp_millis_is_reasonable() {
        let ts = current_timestamp_millis();
        // After 2020-01-01 in millis.
        assert!(ts > 1_577_836_800_000);
    }
}
