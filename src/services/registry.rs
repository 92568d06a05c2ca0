//! Evidence registry service.
//!
//! Owns the evidence lifecycle state machine. Every mutation is atomic with
//! its custody event: the store commits both in one transaction, so a failed
//! append rolls the transition back and the system never holds an un-logged
//! state change.

use crate::models::{
    CustodyAction, CustodyEvent, DumpArtifact, EvidenceId, EvidenceItem, EvidenceKind,
    EvidenceState, EventRequest, RegisterRequest,
};
use crate::storage::CustodyStore;
use crate::{Error, Result, current_timestamp_millis};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::instrument;

/// Outcome of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The item was tombstoned and a `DELETE` event recorded.
    Deleted,
    /// The item was already tombstoned; nothing changed and no event was
    /// appended (double-submission from a confirm-delete UI is harmless).
    AlreadyDeleted,
}

/// Registry of evidence metadata and lifecycle state.
pub struct EvidenceRegistry {
    store: Arc<dyn CustodyStore>,
}

impl EvidenceRegistry {
    /// Creates a registry over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CustodyStore>) -> Self {
        Self { store }
    }

    /// Registers new evidence and records its `COLLECT` event.
    ///
    /// Duplicate submissions become distinct evidence items unless the
    /// request opts into dedup, in which case content already held by a live
    /// (non-deleted) item is rejected.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateContent`] when dedup is requested and the hash is
    /// already live; [`Error::Storage`] on I/O failure.
    #[instrument(skip(self, request), fields(kind = %request.kind, size = request.content.len()))]
    pub fn register(&self, request: RegisterRequest) -> Result<EvidenceItem> {
        let content_hash = hex::encode(Sha256::digest(&request.content));

        if request.dedup {
            if let Some(existing) = self.store.find_live_by_hash(&content_hash)? {
                return Err(Error::DuplicateContent {
                    hash: content_hash,
                    existing_id: existing.id.as_str().to_string(),
                });
            }
        }

        let item = EvidenceItem {
            id: EvidenceId::generate(),
            kind: request.kind,
            content_hash,
            size_bytes: request.content.len() as u64,
            uploaded_at: current_timestamp_millis(),
            state: EvidenceState::Registered,
            flagged: None,
            analysis: None,
            source: request.source,
        };

        let mut event = EventRequest::new(CustodyAction::Collect, request.handler, request.location);
        if let Some(notes) = request.notes {
            event = event.with_notes(notes);
        }
        self.store.insert_evidence(&item, &event)?;

        tracing::info!(
            evidence_id = %item.id,
            kind = %item.kind,
            hash = %item.content_hash,
            "Registered evidence"
        );
        metrics::counter!("evidence_register_total").increment(1);
        Ok(item)
    }

    /// Begins analysis: `Registered -> Analyzing`, recording an `ANALYZE` event.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] unless the item is in `Registered`;
    /// no event is appended on rejection.
    #[instrument(skip(self), fields(evidence_id = %id.as_str()))]
    pub fn begin_analysis(
        &self,
        id: &EvidenceId,
        handler: &str,
        location: &str,
    ) -> Result<EvidenceItem> {
        let event = EventRequest::new(CustodyAction::Analyze, handler, location)
            .with_notes("analysis started");
        let (item, _) = self
            .store
            .transition_evidence(id, EvidenceState::Analyzing, None, &event)?;
        Ok(item)
    }

    /// Completes analysis: `Analyzing -> Analyzed`, storing the opaque result.
    ///
    /// The result blob is owned by the analysis engine; the registry stores
    /// it verbatim along with the engine's forged/suspicious verdict. The
    /// completion records an `ANALYZE` event, same action as the start.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] unless the item is in `Analyzing`.
    #[instrument(skip(self, result), fields(evidence_id = %id.as_str()))]
    pub fn complete_analysis(
        &self,
        id: &EvidenceId,
        result: &serde_json::Value,
        flagged: bool,
        handler: &str,
        location: &str,
    ) -> Result<EvidenceItem> {
        let event = EventRequest::new(CustodyAction::Analyze, handler, location)
            .with_notes("analysis completed");
        let (item, _) = self.store.transition_evidence(
            id,
            EvidenceState::Analyzed,
            Some((result, flagged)),
            &event,
        )?;

        if flagged {
            metrics::counter!("evidence_flagged_total").increment(1);
        }
        Ok(item)
    }

    /// Deletes (tombstones) an evidence item, recording a `DELETE` event.
    ///
    /// Idempotent: deleting an already-deleted item is a no-op success that
    /// appends nothing. The record itself is retained to preserve the
    /// ledger's referential integrity.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownEvidence`] for unregistered ids.
    #[instrument(skip(self), fields(evidence_id = %id.as_str()))]
    pub fn delete(&self, id: &EvidenceId, handler: &str, location: &str) -> Result<DeleteOutcome> {
        let current = self
            .store
            .get_evidence(id)?
            .ok_or_else(|| Error::UnknownEvidence {
                id: id.as_str().to_string(),
            })?;

        if current.state.is_deleted() {
            return Ok(DeleteOutcome::AlreadyDeleted);
        }

        let event = EventRequest::new(CustodyAction::Delete, handler, location);
        self.store
            .transition_evidence(id, EvidenceState::Deleted, None, &event)?;

        tracing::info!(evidence_id = %id.as_str(), "Deleted evidence");
        metrics::counter!("evidence_delete_total").increment(1);
        Ok(DeleteOutcome::Deleted)
    }

    /// Deletes a batch of evidence ids, each processed independently.
    ///
    /// Partial success is valid: the result reports a per-id outcome rather
    /// than failing the whole batch.
    pub fn delete_batch(
        &self,
        ids: &[EvidenceId],
        handler: &str,
        location: &str,
    ) -> Vec<(EvidenceId, Result<DeleteOutcome>)> {
        ids.iter()
            .map(|id| (id.clone(), self.delete(id, handler, location)))
            .collect()
    }

    /// Records a `VIEW` event for an inspection reported by the boundary.
    pub fn record_view(
        &self,
        id: &EvidenceId,
        handler: &str,
        location: &str,
        notes: Option<String>,
    ) -> Result<CustodyEvent> {
        let mut event = EventRequest::new(CustodyAction::View, handler, location);
        if let Some(notes) = notes {
            event = event.with_notes(notes);
        }
        self.store.append_event(id, &event)
    }

    /// Attaches an investigator annotation, recording a `MODIFY` event.
    pub fn annotate(
        &self,
        id: &EvidenceId,
        handler: &str,
        location: &str,
        notes: &str,
    ) -> Result<CustodyEvent> {
        let event = EventRequest::new(CustodyAction::Modify, handler, location).with_notes(notes);
        self.store.append_event(id, &event)
    }

    /// Retrieves an evidence item. Read-only; records nothing.
    pub fn get(&self, id: &EvidenceId) -> Result<Option<EvidenceItem>> {
        self.store.get_evidence(id)
    }

    /// Registers the evidence item for a completed memory capture.
    ///
    /// The item is born referencing the stored artifact, and its first
    /// custody event is a `CAPTURE` rather than a `COLLECT`.
    #[instrument(skip(self, artifact), fields(artifact_id = %artifact.id))]
    pub fn register_capture(
        &self,
        pid: u32,
        artifact: &DumpArtifact,
        handler: &str,
        location: &str,
        notes: &str,
    ) -> Result<EvidenceItem> {
        let item = EvidenceItem {
            id: EvidenceId::generate(),
            kind: EvidenceKind::MemoryDump,
            content_hash: artifact.content_hash.clone(),
            size_bytes: artifact.size_bytes,
            uploaded_at: current_timestamp_millis(),
            state: EvidenceState::Registered,
            flagged: None,
            analysis: None,
            source: Some(format!("pid:{pid}")),
        };

        let event = EventRequest::new(CustodyAction::Capture, handler, location)
            .with_notes(format!("{notes}; artifact {}", artifact.id));
        self.store.insert_evidence(&item, &event)?;

        metrics::counter!("captures_recorded_total").increment(1);
        Ok(item)
    }

    /// Registers the evidentiary record of a failed capture.
    ///
    /// Failures are never silently dropped: an empty-payload item is created
    /// so the failure-annotated `CAPTURE` event has an id to attach to.
    #[instrument(skip(self))]
    pub fn register_capture_failure(
        &self,
        pid: u32,
        handler: &str,
        location: &str,
        failure: &str,
    ) -> Result<EvidenceItem> {
        let item = EvidenceItem {
            id: EvidenceId::generate(),
            kind: EvidenceKind::MemoryDump,
            content_hash: hex::encode(Sha256::digest([])),
            size_bytes: 0,
            uploaded_at: current_timestamp_millis(),
            state: EvidenceState::Registered,
            flagged: None,
            analysis: None,
            source: Some(format!("pid:{pid}")),
        };

        let event = EventRequest::new(CustodyAction::Capture, handler, location)
            .with_notes(format!("capture failed: {failure}"));
        self.store.insert_evidence(&item, &event)?;

        metrics::counter!("captures_failed_total").increment(1);
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;

    fn registry() -> EvidenceRegistry {
        EvidenceRegistry::new(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    fn file_request(content: &[u8]) -> RegisterRequest {
        RegisterRequest {
            kind: EvidenceKind::File,
            content: content.to_vec(),
            handler: "agent.voss".to_string(),
            location: "intake-desk-2".to_string(),
            source: Some("suspect.jpg".to_string()),
            notes: None,
            dedup: false,
        }
    }

    #[test]
    fn test_register_computes_hash_and_collect_event() {
        let registry = registry();
        let item = registry.register(file_request(b"image bytes")).unwrap();

        assert_eq!(item.state, EvidenceState::Registered);
        assert_eq!(item.size_bytes, 11);
        assert_eq!(item.content_hash.len(), 64);
    }

    #[test]
    fn test_duplicates_allowed_by_default() {
        let registry = registry();
        let a = registry.register(file_request(b"same bytes")).unwrap();
        let b = registry.register(file_request(b"same bytes")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_dedup_opt_in_rejects_live_duplicates() {
        let registry = registry();
        let first = registry.register(file_request(b"same bytes")).unwrap();

        let mut dup = file_request(b"same bytes");
        dup.dedup = true;
        let result = registry.register(dup);
        assert!(matches!(
            result,
            Err(Error::DuplicateContent { ref existing_id, .. }) if *existing_id == first.id.as_str()
        ));

        // Tombstoning the original frees the hash for re-registration.
        registry
            .delete(&first.id, "agent.voss", "intake-desk-2")
            .unwrap();
        let mut again = file_request(b"same bytes");
        again.dedup = true;
        assert!(registry.register(again).is_ok());
    }

    #[test]
    fn test_analysis_lifecycle() {
        let registry = registry();
        let item = registry.register(file_request(b"payload")).unwrap();

        let item = registry
            .begin_analysis(&item.id, "agent.okafor", "lab-3")
            .unwrap();
        assert_eq!(item.state, EvidenceState::Analyzing);

        let verdict = serde_json::json!({"model": "tamper-v2", "score": 0.87});
        let item = registry
            .complete_analysis(&item.id, &verdict, true, "agent.okafor", "lab-3")
            .unwrap();
        assert_eq!(item.state, EvidenceState::Analyzed);
        assert_eq!(item.flagged, Some(true));
        assert_eq!(item.analysis, Some(verdict));
    }

    #[test]
    fn test_begin_analysis_rejects_wrong_state() {
        let registry = registry();
        let item = registry.register(file_request(b"payload")).unwrap();
        registry
            .begin_analysis(&item.id, "agent.okafor", "lab-3")
            .unwrap();

        let result = registry.begin_analysis(&item.id, "agent.okafor", "lab-3");
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let registry = registry();
        let item = registry.register(file_request(b"payload")).unwrap();

        let first = registry
            .delete(&item.id, "agent.voss", "intake-desk-2")
            .unwrap();
        assert_eq!(first, DeleteOutcome::Deleted);

        let second = registry
            .delete(&item.id, "agent.voss", "intake-desk-2")
            .unwrap();
        assert_eq!(second, DeleteOutcome::AlreadyDeleted);

        let fetched = registry.get(&item.id).unwrap().unwrap();
        assert_eq!(fetched.state, EvidenceState::Deleted);
    }

    #[test]
    fn test_delete_batch_reports_per_id_outcomes() {
        let registry = registry();
        let known = registry.register(file_request(b"payload")).unwrap();
        let unknown = EvidenceId::new("ev_ghost");

        let outcomes =
            registry.delete_batch(&[known.id.clone(), unknown], "agent.voss", "intake-desk-2");
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].1, Ok(DeleteOutcome::Deleted)));
        assert!(matches!(outcomes[1].1, Err(Error::UnknownEvidence { .. })));
    }
}
