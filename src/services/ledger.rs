//! Custody ledger service.
//!
//! The trust anchor of the system: an append-only, per-evidence sequence of
//! custody events. Appends are durably committed before they return; history
//! reads are pure projections.

use crate::Result;
use crate::models::{CustodyAction, CustodyEvent, EvidenceId, EventRequest};
use crate::storage::CustodyStore;
use std::sync::Arc;
use tracing::instrument;

/// Append-only chain-of-custody ledger.
pub struct CustodyLedger {
    store: Arc<dyn CustodyStore>,
}

impl CustodyLedger {
    /// Creates a ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CustodyStore>) -> Self {
        Self { store }
    }

    /// Appends a custody event for a registered evidence id.
    ///
    /// The event is durably persisted before this returns; an append that
    /// reports success is never lost.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownEvidence`](crate::Error::UnknownEvidence) if the id is
    /// not registered; [`Error::ClockRegression`](crate::Error::ClockRegression)
    /// if the computed timestamp would run backwards for this id (retry, or
    /// inject a logical timestamp on the request);
    /// [`Error::Storage`](crate::Error::Storage) on I/O failure.
    #[instrument(skip(self, request), fields(evidence_id = %id.as_str(), action = %request.action))]
    pub fn append(&self, id: &EvidenceId, request: EventRequest) -> Result<CustodyEvent> {
        let event = self.store.append_event(id, &request)?;

        tracing::info!(
            evidence_id = %id.as_str(),
            action = %event.action,
            seq = event.seq,
            "Recorded custody event"
        );
        Ok(event)
    }

    /// Returns the full ordered history for an evidence id.
    ///
    /// Never fails for a known id; an item with no events yields an empty
    /// sequence (should not occur post-registration, since registration
    /// itself records a `COLLECT`).
    ///
    /// # Errors
    ///
    /// [`Error::UnknownEvidence`](crate::Error::UnknownEvidence) for
    /// unregistered ids.
    pub fn history(&self, id: &EvidenceId) -> Result<Vec<CustodyEvent>> {
        self.store.events_for(id)
    }

    /// Returns the history restricted to one action type.
    ///
    /// A pure projection over [`history`](Self::history); no side effects.
    pub fn history_filtered(
        &self,
        id: &EvidenceId,
        action: Option<CustodyAction>,
    ) -> Result<Vec<CustodyEvent>> {
        let events = self.history(id)?;
        Ok(match action {
            Some(action) => events.into_iter().filter(|e| e.action == action).collect(),
            None => events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::models::{EvidenceItem, EvidenceKind, EvidenceState};
    use crate::storage::SqliteStore;

    fn ledger_with_item(id: &str) -> (CustodyLedger, EvidenceId) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let item = EvidenceItem {
            id: EvidenceId::new(id),
            kind: EvidenceKind::File,
            content_hash: "cafe".to_string(),
            size_bytes: 4,
            uploaded_at: 100,
            state: EvidenceState::Registered,
            flagged: None,
            analysis: None,
            source: None,
        };
        store
            .insert_evidence(
                &item,
                &EventRequest::new(CustodyAction::Collect, "agent.voss", "intake-desk-2"),
            )
            .unwrap();
        (CustodyLedger::new(store), item.id)
    }

    #[test]
    fn test_append_and_history() {
        let (ledger, id) = ledger_with_item("ev_1");

        ledger
            .append(
                &id,
                EventRequest::new(CustodyAction::View, "agent.okafor", "lab-3"),
            )
            .unwrap();

        let history = ledger.history(&id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, CustodyAction::Collect);
        assert_eq!(history[1].action, CustodyAction::View);
    }

    #[test]
    fn test_append_unknown_evidence() {
        let (ledger, _) = ledger_with_item("ev_1");
        let result = ledger.append(
            &EvidenceId::new("ev_ghost"),
            EventRequest::new(CustodyAction::View, "agent.okafor", "lab-3"),
        );
        assert!(matches!(result, Err(Error::UnknownEvidence { .. })));
    }

    #[test]
    fn test_history_filtered_is_a_projection() {
        let (ledger, id) = ledger_with_item("ev_1");
        for _ in 0..3 {
            ledger
                .append(
                    &id,
                    EventRequest::new(CustodyAction::View, "agent.okafor", "lab-3"),
                )
                .unwrap();
        }

        let views = ledger
            .history_filtered(&id, Some(CustodyAction::View))
            .unwrap();
        assert_eq!(views.len(), 3);
        assert!(views.iter().all(|e| e.action == CustodyAction::View));

        let unfiltered = ledger.history_filtered(&id, None).unwrap();
        assert_eq!(unfiltered.len(), 4);

        // Filtering did not mutate the underlying history.
        assert_eq!(ledger.history(&id).unwrap().len(), 4);
    }
}
