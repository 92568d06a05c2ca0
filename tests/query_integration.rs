//! Query facade integration tests: pagination, filtering, sorting.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use custodian::models::{
    CustodyAction, EvidenceFilter, EvidenceKind, EvidenceState, EventFilter, PageRequest,
    RegisterRequest, SortDir, SortKey,
};
use custodian::services::{EvidenceRegistry, QueryFacade};
use custodian::storage::SqliteStore;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn create_services() -> (EvidenceRegistry, QueryFacade) {
    let store = Arc::new(SqliteStore::in_memory().expect("Failed to create store"));
    let registry = EvidenceRegistry::new(Arc::clone(&store));
    let query = QueryFacade::new(store);
    (registry, query)
}

fn register_n(registry: &EvidenceRegistry, n: usize, kind: EvidenceKind) {
    for i in 0..n {
        registry
            .register(RegisterRequest {
                kind,
                content: format!("item {i} of kind {kind}").into_bytes(),
                handler: "agent.voss".to_string(),
                location: "intake-desk-2".to_string(),
                source: None,
                notes: None,
                dedup: false,
            })
            .expect("register should succeed");
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Test: 23 items, page 3 of size 10 has 3 items and total_count 23
#[test]
fn test_pagination_last_partial_page() {
    let (registry, query) = create_services();
    register_n(&registry, 23, EvidenceKind::File);

    let page = query
        .evidence_page(
            &EvidenceFilter::new(),
            &PageRequest::new(3, 10),
            SortKey::Timestamp,
            SortDir::Desc,
        )
        .unwrap();

    assert_eq!(page.items.len(), 3);
    assert_eq!(page.total_count, 23);
    assert_eq!(page.page_count(), 3);
}

/// Test: a page beyond range is empty with the correct total, not an error
#[test]
fn test_pagination_beyond_range() {
    let (registry, query) = create_services();
    register_n(&registry, 23, EvidenceKind::File);

    let page = query
        .evidence_page(
            &EvidenceFilter::new(),
            &PageRequest::new(10, 10),
            SortKey::Timestamp,
            SortDir::Desc,
        )
        .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 23);
}

/// Test: pages are disjoint and cover the whole collection
#[test]
fn test_pagination_pages_are_disjoint_and_covering() {
    let (registry, query) = create_services();
    register_n(&registry, 23, EvidenceKind::File);

    let mut seen = std::collections::HashSet::new();
    for page_no in 1..=3 {
        let page = query
            .evidence_page(
                &EvidenceFilter::new(),
                &PageRequest::new(page_no, 10),
                SortKey::Timestamp,
                SortDir::Desc,
            )
            .unwrap();
        for item in page.items {
            assert!(seen.insert(item.id), "item listed on two pages");
        }
    }
    assert_eq!(seen.len(), 23);
}

/// Test: default ordering is newest-first
#[test]
fn test_default_order_newest_first() {
    let (registry, query) = create_services();
    register_n(&registry, 10, EvidenceKind::File);

    let page = query
        .evidence_page(
            &EvidenceFilter::new(),
            &PageRequest::new(1, 10),
            SortKey::Timestamp,
            SortDir::Desc,
        )
        .unwrap();

    let stamps: Vec<u64> = page.items.iter().map(|i| i.uploaded_at).collect();
    assert!(
        stamps.windows(2).all(|w| w[0] >= w[1]),
        "expected non-increasing timestamps: {stamps:?}"
    );
}

/// Test: size sorting ascending
#[test]
fn test_sort_by_size() {
    let (registry, query) = create_services();
    for size in [100usize, 5, 50] {
        registry
            .register(RegisterRequest {
                kind: EvidenceKind::File,
                content: vec![0u8; size],
                handler: "agent.voss".to_string(),
                location: "intake-desk-2".to_string(),
                source: None,
                notes: None,
                dedup: false,
            })
            .unwrap();
    }

    let page = query
        .evidence_page(
            &EvidenceFilter::new(),
            &PageRequest::new(1, 10),
            SortKey::Size,
            SortDir::Asc,
        )
        .unwrap();

    let sizes: Vec<u64> = page.items.iter().map(|i| i.size_bytes).collect();
    assert_eq!(sizes, vec![5, 50, 100]);
}

// ============================================================================
// Filtering
// ============================================================================

/// Test: kind and state filters compose before pagination
#[test]
fn test_filters_compose_before_pagination() {
    let (registry, query) = create_services();
    register_n(&registry, 8, EvidenceKind::File);
    register_n(&registry, 5, EvidenceKind::Email);

    let emails = query
        .evidence_page(
            &EvidenceFilter::new().with_kind(EvidenceKind::Email),
            &PageRequest::new(1, 3),
            SortKey::Timestamp,
            SortDir::Desc,
        )
        .unwrap();
    assert_eq!(emails.items.len(), 3);
    assert_eq!(emails.total_count, 5, "total counts the filtered set");

    let registered = query
        .evidence_page(
            &EvidenceFilter::new().with_state(EvidenceState::Registered),
            &PageRequest::new(1, 50),
            SortKey::Timestamp,
            SortDir::Desc,
        )
        .unwrap();
    assert_eq!(registered.total_count, 13);
}

/// Test: flagged filter matches only analyzed-and-flagged items
#[test]
fn test_flagged_filter() {
    let (registry, query) = create_services();
    register_n(&registry, 3, EvidenceKind::File);

    // Flag one item through the analysis lifecycle.
    let all = query
        .evidence_page(
            &EvidenceFilter::new(),
            &PageRequest::new(1, 10),
            SortKey::Timestamp,
            SortDir::Desc,
        )
        .unwrap();
    let target = &all.items[0].id;
    registry
        .begin_analysis(target, "agent.okafor", "lab-3")
        .unwrap();
    registry
        .complete_analysis(
            target,
            &serde_json::json!({"verdict": "forged"}),
            true,
            "agent.okafor",
            "lab-3",
        )
        .unwrap();

    let flagged = query
        .evidence_page(
            &EvidenceFilter::new().with_flagged(true),
            &PageRequest::new(1, 10),
            SortKey::Timestamp,
            SortDir::Desc,
        )
        .unwrap();
    assert_eq!(flagged.total_count, 1);
    assert_eq!(&flagged.items[0].id, target);
}

// ============================================================================
// Custody History Pages
// ============================================================================

/// Test: custody pages keep ledger order and support the action filter
#[test]
fn test_custody_page_with_action_filter() {
    let (registry, query) = create_services();
    register_n(&registry, 1, EvidenceKind::File);

    let id = query
        .evidence_page(
            &EvidenceFilter::new(),
            &PageRequest::new(1, 1),
            SortKey::Timestamp,
            SortDir::Desc,
        )
        .unwrap()
        .items[0]
        .id
        .clone();

    for _ in 0..4 {
        registry
            .record_view(&id, "agent.okafor", "lab-3", None)
            .unwrap();
    }

    let all = query
        .custody_page(&id, &EventFilter::new(), &PageRequest::new(1, 3))
        .unwrap();
    assert_eq!(all.items.len(), 3);
    assert_eq!(all.total_count, 5);
    assert_eq!(all.items[0].seq, 1, "ledger order, oldest first");

    let views = query
        .custody_page(
            &id,
            &EventFilter::new().with_action(CustodyAction::View),
            &PageRequest::new(1, 10),
        )
        .unwrap();
    assert_eq!(views.total_count, 4);
}
