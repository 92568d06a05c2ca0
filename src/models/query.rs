//! Read-side query types: pagination, sorting, filters.

use serde::{Deserialize, Serialize};

use super::{CustodyAction, EvidenceItem, EvidenceKind, EvidenceState};

/// A pagination request. Pages are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-indexed page number.
    pub page: usize,
    /// Items per page.
    pub page_size: usize,
}

impl PageRequest {
    /// Creates a page request. A `page` of 0 is clamped to 1.
    #[must_use]
    pub const fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: if page == 0 { 1 } else { page },
            page_size,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

/// One page of results plus the total count across all pages.
///
/// Requesting a page beyond range yields empty `items` with the correct
/// `total_count`; it is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total matching items across all pages.
    pub total_count: usize,
    /// The 1-indexed page that was returned.
    pub page: usize,
    /// The page size that was applied.
    pub page_size: usize,
}

impl<T> Page<T> {
    /// Total number of pages for this result set.
    #[must_use]
    pub const fn page_count(&self) -> usize {
        if self.page_size == 0 {
            0
        } else {
            self.total_count.div_ceil(self.page_size)
        }
    }
}

/// Sort key for evidence listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Upload/capture timestamp.
    #[default]
    Timestamp,
    /// Content size in bytes.
    Size,
}

/// Sort direction. Default is newest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    /// Ascending.
    Asc,
    /// Descending (newest-first for timestamps).
    #[default]
    Desc,
}

/// Pure predicate over evidence items, composed before pagination.
#[derive(Debug, Clone, Default)]
pub struct EvidenceFilter {
    /// Match a specific kind.
    pub kind: Option<EvidenceKind>,
    /// Match a specific lifecycle state.
    pub state: Option<EvidenceState>,
    /// Match the forged/suspicious flag.
    pub flagged: Option<bool>,
}

impl EvidenceFilter {
    /// Creates an empty filter (matches all).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            kind: None,
            state: None,
            flagged: None,
        }
    }

    /// Restricts to one evidence kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: EvidenceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restricts to one lifecycle state.
    #[must_use]
    pub const fn with_state(mut self, state: EvidenceState) -> Self {
        self.state = Some(state);
        self
    }

    /// Restricts by the forged/suspicious flag.
    #[must_use]
    pub const fn with_flagged(mut self, flagged: bool) -> Self {
        self.flagged = Some(flagged);
        self
    }

    /// Returns true if `item` passes the filter.
    #[must_use]
    pub fn matches(&self, item: &EvidenceItem) -> bool {
        self.kind.is_none_or(|k| item.kind == k)
            && self.state.is_none_or(|s| item.state == s)
            && self.flagged.is_none_or(|f| item.flagged == Some(f))
    }
}

/// Pure predicate over custody events.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter {
    /// Match a single action type.
    pub action: Option<CustodyAction>,
}

impl EventFilter {
    /// Creates an empty filter (matches all).
    #[must_use]
    pub const fn new() -> Self {
        Self { action: None }
    }

    /// Restricts to one action.
    #[must_use]
    pub const fn with_action(mut self, action: CustodyAction) -> Self {
        self.action = Some(action);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EvidenceId;

    fn item(kind: EvidenceKind, state: EvidenceState, flagged: Option<bool>) -> EvidenceItem {
        EvidenceItem {
            id: EvidenceId::generate(),
            kind,
            content_hash: "00".to_string(),
            size_bytes: 1,
            uploaded_at: 0,
            state,
            flagged,
            analysis: None,
            source: None,
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = EvidenceFilter::new();
        assert!(filter.matches(&item(EvidenceKind::File, EvidenceState::Registered, None)));
        assert!(filter.matches(&item(
            EvidenceKind::Email,
            EvidenceState::Deleted,
            Some(true)
        )));
    }

    #[test]
    fn test_filter_composition() {
        let filter = EvidenceFilter::new()
            .with_kind(EvidenceKind::File)
            .with_flagged(true);
        assert!(filter.matches(&item(
            EvidenceKind::File,
            EvidenceState::Analyzed,
            Some(true)
        )));
        assert!(!filter.matches(&item(
            EvidenceKind::File,
            EvidenceState::Analyzed,
            Some(false)
        )));
        // Unanalyzed items never match a flagged filter.
        assert!(!filter.matches(&item(EvidenceKind::File, EvidenceState::Registered, None)));
        assert!(!filter.matches(&item(
            EvidenceKind::Email,
            EvidenceState::Analyzed,
            Some(true)
        )));
    }

    #[test]
    fn test_page_count() {
        let page = Page::<u8> {
            items: vec![],
            total_count: 23,
            page: 1,
            page_size: 10,
        };
        assert_eq!(page.page_count(), 3);
    }

    #[test]
    fn test_page_request_clamps_zero() {
        assert_eq!(PageRequest::new(0, 10).page, 1);
    }
}
