//! Read-side query facade: pagination, filtering, sorting.
//!
//! Stateless. Pagination is the sole list read contract; filters are pure
//! predicates composed before paginating, and reads never fail on missing
//! optional data.

use crate::Result;
use crate::models::{
    CustodyEvent, EvidenceFilter, EvidenceId, EvidenceItem, EventFilter, Page, PageRequest,
    SortDir, SortKey,
};
use crate::storage::CustodyStore;
use std::sync::Arc;

/// Stateless read facade over the custody store.
pub struct QueryFacade {
    store: Arc<dyn CustodyStore>,
}

impl QueryFacade {
    /// Creates a facade over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CustodyStore>) -> Self {
        Self { store }
    }

    /// Paginates an already-ordered collection.
    ///
    /// Pages are 1-indexed. A page beyond range returns empty items with the
    /// correct `total_count`; it is not an error.
    #[must_use]
    pub fn paginate<T>(items: Vec<T>, request: &PageRequest) -> Page<T> {
        let total_count = items.len();
        let page = request.page.max(1);
        let start = (page - 1).saturating_mul(request.page_size);

        let page_items: Vec<T> = if start >= total_count {
            Vec::new()
        } else {
            items
                .into_iter()
                .skip(start)
                .take(request.page_size)
                .collect()
        };

        Page {
            items: page_items,
            total_count,
            page,
            page_size: request.page_size,
        }
    }

    /// Returns one page of evidence matching `filter`.
    ///
    /// Default ordering is newest-first by upload timestamp.
    pub fn evidence_page(
        &self,
        filter: &EvidenceFilter,
        request: &PageRequest,
        key: SortKey,
        dir: SortDir,
    ) -> Result<Page<EvidenceItem>> {
        let mut items: Vec<EvidenceItem> = self
            .store
            .list_evidence()?
            .into_iter()
            .filter(|item| filter.matches(item))
            .collect();

        items.sort_by(|a, b| {
            let ordering = match key {
                SortKey::Timestamp => a.uploaded_at.cmp(&b.uploaded_at),
                SortKey::Size => a.size_bytes.cmp(&b.size_bytes),
            };
            // Stable tie-break so pages never shuffle between requests.
            let ordering = ordering.then_with(|| a.id.as_str().cmp(b.id.as_str()));
            match dir {
                SortDir::Asc => ordering,
                SortDir::Desc => ordering.reverse(),
            }
        });

        Ok(Self::paginate(items, request))
    }

    /// Returns one page of custody history for an evidence id.
    ///
    /// Events keep their ledger order (oldest first).
    pub fn custody_page(
        &self,
        id: &EvidenceId,
        filter: &EventFilter,
        request: &PageRequest,
    ) -> Result<Page<CustodyEvent>> {
        let events: Vec<CustodyEvent> = self
            .store
            .events_for(id)?
            .into_iter()
            .filter(|event| filter.action.is_none_or(|a| event.action == a))
            .collect();

        Ok(Self::paginate(events, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_middle_page() {
        let items: Vec<u32> = (0..23).collect();
        let page = QueryFacade::paginate(items, &PageRequest::new(2, 10));
        assert_eq!(page.items, (10..20).collect::<Vec<u32>>());
        assert_eq!(page.total_count, 23);
    }

    #[test]
    fn test_paginate_last_partial_page() {
        let items: Vec<u32> = (0..23).collect();
        let page = QueryFacade::paginate(items, &PageRequest::new(3, 10));
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total_count, 23);
    }

    #[test]
    fn test_paginate_past_range_is_empty_not_error() {
        let items: Vec<u32> = (0..23).collect();
        let page = QueryFacade::paginate(items, &PageRequest::new(10, 10));
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 23);
    }

    #[test]
    fn test_paginate_empty_collection() {
        let page = QueryFacade::paginate(Vec::<u32>::new(), &PageRequest::new(1, 10));
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 0);
        assert_eq!(page.page_count(), 0);
    }
}
