//! Content-addressed storage for capture payloads.

use crate::models::{ArtifactId, DumpArtifact, JobId};
use crate::storage::CustodyStore;
use crate::{Error, Result, current_timestamp_millis};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::instrument;

/// Store for dump artifacts.
///
/// Payloads are written once per content hash under the dump directory;
/// artifact records are never deduplicated across jobs, so provenance stays
/// unambiguous even when two captures produce identical bytes.
pub struct DumpStore {
    dir: PathBuf,
    store: Arc<dyn CustodyStore>,
}

impl DumpStore {
    /// Creates a dump store rooted at `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>, store: Arc<dyn CustodyStore>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| Error::storage("create_dump_dir", e))?;
        Ok(Self { dir, store })
    }

    /// Returns the dump directory.
    #[must_use]
    pub const fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Stores a payload and records a fresh artifact for the requesting job.
    ///
    /// Identical content yields the same hash and payload file, but every
    /// call inserts a new artifact record tied to `job_id`.
    #[instrument(skip(self, bytes), fields(job_id = %job_id.as_str(), size = bytes.len()))]
    pub fn store(&self, bytes: &[u8], job_id: &JobId) -> Result<DumpArtifact> {
        let content_hash = hex::encode(Sha256::digest(bytes));
        let path = self.dir.join(format!("{content_hash}.bin"));

        if !path.exists() {
            std::fs::write(&path, bytes).map_err(|e| Error::storage("write_dump", e))?;
        }

        let artifact = DumpArtifact {
            id: ArtifactId::generate(),
            content_hash,
            size_bytes: bytes.len() as u64,
            path,
            job_id: job_id.clone(),
            created_at: current_timestamp_millis(),
        };
        self.store.insert_artifact(&artifact)?;

        tracing::info!(
            artifact_id = %artifact.id,
            hash = %artifact.content_hash,
            "Stored dump artifact"
        );
        metrics::counter!("dump_artifacts_stored_total").increment(1);
        Ok(artifact)
    }

    /// Retrieves an artifact payload.
    ///
    /// # Errors
    ///
    /// [`Error::ArtifactNotFound`] for unknown ids or missing payload files.
    pub fn retrieve(&self, id: &ArtifactId) -> Result<Vec<u8>> {
        let artifact = self
            .store
            .get_artifact(id)?
            .ok_or_else(|| Error::ArtifactNotFound {
                id: id.as_str().to_string(),
            })?;

        std::fs::read(&artifact.path).map_err(|_| Error::ArtifactNotFound {
            id: id.as_str().to_string(),
        })
    }

    /// Lists all artifact records, newest first.
    pub fn list(&self) -> Result<Vec<DumpArtifact>> {
        self.store.list_artifacts()
    }

    /// Deletes every artifact record and payload, returning the count.
    ///
    /// Destructive administrative operation. The store has no evidence id of
    /// its own to log against; the caller is responsible for recording the
    /// purge as a custody-relevant action.
    #[instrument(skip(self))]
    pub fn purge_all(&self) -> Result<usize> {
        let purged = self.store.purge_artifacts()?;

        for artifact in &purged {
            // Payload files can be shared between records; a missing file
            // just means an earlier iteration already removed it.
            let _ = std::fs::remove_file(&artifact.path);
        }

        tracing::warn!(count = purged.len(), "Purged all dump artifacts");
        metrics::counter!("dump_artifacts_purged_total").increment(purged.len() as u64);
        Ok(purged.len())
    }
}
