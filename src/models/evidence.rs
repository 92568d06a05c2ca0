//! Evidence types and identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an evidence item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceId(String);

impl EvidenceId {
    /// Creates a new evidence ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh evidence ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ev_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EvidenceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EvidenceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of evidence under analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// An uploaded file (image, document, binary).
    #[default]
    File,
    /// A collected email message.
    Email,
    /// A memory dump produced by a capture job.
    MemoryDump,
}

impl EvidenceKind {
    /// Returns all evidence kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::File, Self::Email, Self::MemoryDump]
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Email => "email",
            Self::MemoryDump => "memory_dump",
        }
    }

    /// Parses a kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "file" => Some(Self::File),
            "email" => Some(Self::Email),
            "memory_dump" | "memory-dump" | "dump" => Some(Self::MemoryDump),
            _ => None,
        }
    }
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of an evidence item.
///
/// `Deleted` is terminal: the record is tombstoned, never physically erased,
/// so the custody ledger keeps its referential integrity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceState {
    /// Registered and awaiting analysis.
    #[default]
    Registered,
    /// Analysis in progress.
    Analyzing,
    /// Analysis completed; result stored.
    Analyzed,
    /// Tombstoned. No transition leaves this state.
    Deleted,
}

impl EvidenceState {
    /// Returns the state as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Analyzing => "analyzing",
            Self::Analyzed => "analyzed",
            Self::Deleted => "deleted",
        }
    }

    /// Parses a state from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "registered" => Some(Self::Registered),
            "analyzing" => Some(Self::Analyzing),
            "analyzed" => Some(Self::Analyzed),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Returns true if a transition from `self` to `next` is permitted.
    ///
    /// Valid paths: `Registered -> Analyzing -> Analyzed -> Deleted`, plus
    /// the cancel paths `Registered -> Deleted` and `Analyzing -> Deleted`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Registered, Self::Analyzing)
                | (Self::Analyzing, Self::Analyzed)
                | (Self::Registered | Self::Analyzing | Self::Analyzed, Self::Deleted)
        )
    }

    /// Returns true for the terminal tombstone state.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for EvidenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An evidence item under custody.
///
/// The displayed lifecycle state is authoritative in the store but every
/// mutation that produced it is recoverable from the custody ledger; the two
/// are committed in the same transaction and cannot desynchronize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Unique identifier.
    pub id: EvidenceId,
    /// Evidence kind.
    pub kind: EvidenceKind,
    /// Sha-256 hash of the content (hex).
    pub content_hash: String,
    /// Content size in bytes.
    pub size_bytes: u64,
    /// Upload timestamp (unix millis).
    pub uploaded_at: u64,
    /// Current lifecycle state.
    pub state: EvidenceState,
    /// Whether analysis flagged the item as forged/suspicious.
    ///
    /// `None` until analysis completes.
    pub flagged: Option<bool>,
    /// Opaque analysis result owned by the analysis engine.
    pub analysis: Option<serde_json::Value>,
    /// Optional source label (filename, mailbox, capture target).
    pub source: Option<String>,
}

/// Request to register new evidence.
#[derive(Debug, Clone, Default)]
pub struct RegisterRequest {
    /// Evidence kind.
    pub kind: EvidenceKind,
    /// Raw content to hash and measure.
    pub content: Vec<u8>,
    /// Handler performing the collection.
    pub handler: String,
    /// Location where the collection happened.
    pub location: String,
    /// Optional source label.
    pub source: Option<String>,
    /// Optional collection notes for the custody event.
    pub notes: Option<String>,
    /// Reject content already registered under a live item.
    ///
    /// Default is off: duplicate submissions become distinct evidence items.
    pub dedup: bool,
}
