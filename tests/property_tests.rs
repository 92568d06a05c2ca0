//! Property-based tests for ledger ordering and pagination.

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use custodian::models::{
    CustodyAction, EvidenceKind, EventRequest, PageRequest, RegisterRequest,
};
use custodian::services::{CustodyLedger, EvidenceRegistry, QueryFacade};
use custodian::storage::SqliteStore;
use proptest::prelude::*;
use std::sync::Arc;

fn action_from_index(i: u8) -> CustodyAction {
    let actions = CustodyAction::all();
    actions[i as usize % actions.len()]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Pagination partitions any collection: pages are disjoint, in order,
    /// cover everything, and every page reports the true total.
    #[test]
    fn prop_paginate_partitions(len in 0usize..200, page_size in 1usize..25) {
        let items: Vec<usize> = (0..len).collect();

        let mut reassembled = Vec::new();
        let mut page_no = 1;
        loop {
            let page = QueryFacade::paginate(items.clone(), &PageRequest::new(page_no, page_size));
            prop_assert_eq!(page.total_count, len);
            if page.items.is_empty() {
                break;
            }
            prop_assert!(page.items.len() <= page_size);
            reassembled.extend(page.items);
            page_no += 1;
        }

        prop_assert_eq!(reassembled, items);
    }

    /// Any append sequence is replayed by `history` in order, with
    /// non-decreasing timestamps and sequence numbers 1..=n.
    #[test]
    fn prop_history_preserves_append_order(action_indices in proptest::collection::vec(0u8..6, 0..32)) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let registry = EvidenceRegistry::new(Arc::clone(&store));
        let ledger = CustodyLedger::new(store);

        let item = registry
            .register(RegisterRequest {
                kind: EvidenceKind::File,
                content: b"property bytes".to_vec(),
                handler: "agent.voss".to_string(),
                location: "intake-desk-2".to_string(),
                source: None,
                notes: None,
                dedup: false,
            })
            .unwrap();

        let appended: Vec<CustodyAction> = action_indices
            .iter()
            .map(|&i| action_from_index(i))
            .collect();
        for action in &appended {
            ledger
                .append(&item.id, EventRequest::new(*action, "agent.okafor", "lab-3"))
                .unwrap();
        }

        let history = ledger.history(&item.id).unwrap();
        prop_assert_eq!(history.len(), appended.len() + 1);

        // Replay: the COLLECT from registration, then our appends verbatim.
        prop_assert_eq!(history[0].action, CustodyAction::Collect);
        let replayed: Vec<CustodyAction> = history[1..].iter().map(|e| e.action).collect();
        prop_assert_eq!(replayed, appended);

        let seqs: Vec<u64> = history.iter().map(|e| e.seq).collect();
        prop_assert_eq!(seqs, (1..=history.len() as u64).collect::<Vec<_>>());

        let timestamps: Vec<u64> = history.iter().map(|e| e.timestamp).collect();
        prop_assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    }
}
