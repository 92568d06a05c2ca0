//! Dump artifact types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::JobId;

/// Unique identifier for a dump artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Creates a new artifact ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh artifact ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("art_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A stored capture payload.
///
/// Payloads are content-addressed on disk, but every store call records a
/// fresh artifact tied to the requesting job: identical content captured by
/// two jobs yields two artifact records pointing at one payload file, keeping
/// provenance unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpArtifact {
    /// Unique identifier.
    pub id: ArtifactId,
    /// Sha-256 hash of the payload (hex). Doubles as the storage address.
    pub content_hash: String,
    /// Payload size in bytes.
    pub size_bytes: u64,
    /// Payload location on disk.
    pub path: PathBuf,
    /// The capture job that produced this artifact.
    pub job_id: JobId,
    /// Creation timestamp (unix millis).
    pub created_at: u64,
}
