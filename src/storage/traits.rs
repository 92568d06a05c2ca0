//! Custody store trait.

use crate::Result;
use crate::models::{
    ArtifactId, CustodyEvent, DumpArtifact, EvidenceId, EvidenceItem, EvidenceState, EventRequest,
};

/// Durable store behind the ledger, registry, and dump store.
///
/// Implementations must guarantee that the compound operations
/// ([`insert_evidence`](Self::insert_evidence),
/// [`transition_evidence`](Self::transition_evidence)) are atomic: the
/// evidence mutation and its custody event both commit or neither does.
/// Appends for one evidence id must be serialized so events cannot interleave
/// out of timestamp order.
pub trait CustodyStore: Send + Sync {
    /// Inserts a new evidence item together with its first custody event.
    fn insert_evidence(&self, item: &EvidenceItem, event: &EventRequest) -> Result<CustodyEvent>;

    /// Transitions evidence to `to`, optionally storing an analysis result,
    /// and appends the custody event in the same transaction.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownEvidence`](crate::Error::UnknownEvidence) for
    /// unregistered ids, [`Error::InvalidTransition`](crate::Error::InvalidTransition)
    /// when the state machine forbids the move (no event is appended),
    /// [`Error::ClockRegression`](crate::Error::ClockRegression) when the
    /// event timestamp would run backwards.
    fn transition_evidence(
        &self,
        id: &EvidenceId,
        to: EvidenceState,
        analysis: Option<(&serde_json::Value, bool)>,
        event: &EventRequest,
    ) -> Result<(EvidenceItem, CustodyEvent)>;

    /// Appends a custody event without touching evidence state.
    fn append_event(&self, id: &EvidenceId, event: &EventRequest) -> Result<CustodyEvent>;

    /// Retrieves an evidence item by ID.
    fn get_evidence(&self, id: &EvidenceId) -> Result<Option<EvidenceItem>>;

    /// Lists all evidence items (tombstones included).
    fn list_evidence(&self) -> Result<Vec<EvidenceItem>>;

    /// Finds a non-deleted evidence item by content hash.
    fn find_live_by_hash(&self, hash: &str) -> Result<Option<EvidenceItem>>;

    /// Returns the ordered event history for an evidence id.
    fn events_for(&self, id: &EvidenceId) -> Result<Vec<CustodyEvent>>;

    /// Checks whether an evidence id is registered.
    fn evidence_exists(&self, id: &EvidenceId) -> Result<bool> {
        Ok(self.get_evidence(id)?.is_some())
    }

    /// Returns the total count of evidence items.
    fn count_evidence(&self) -> Result<usize> {
        Ok(self.list_evidence()?.len())
    }

    /// Records a dump artifact.
    fn insert_artifact(&self, artifact: &DumpArtifact) -> Result<()>;

    /// Retrieves an artifact record by ID.
    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<DumpArtifact>>;

    /// Lists all artifact records.
    fn list_artifacts(&self) -> Result<Vec<DumpArtifact>>;

    /// Deletes every artifact record, returning the removed records so the
    /// caller can unlink their payloads.
    fn purge_artifacts(&self) -> Result<Vec<DumpArtifact>>;
}
