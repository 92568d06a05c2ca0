//! Custody event types: the chain-of-custody record.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::EvidenceId;

/// Action recorded against a piece of evidence.
///
/// A closed enum, exhaustively matched everywhere it is rendered or
/// dispatched; adding a new action is a compile-time-checked change, not a
/// silently-defaulted lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustodyAction {
    /// Evidence was collected/registered.
    Collect,
    /// Analysis began or completed.
    Analyze,
    /// Evidence was inspected without modification.
    View,
    /// Evidence metadata was modified (e.g. investigator annotation).
    Modify,
    /// Evidence was deleted (tombstoned).
    Delete,
    /// Process memory was captured.
    Capture,
}

impl CustodyAction {
    /// Returns all actions.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Collect,
            Self::Analyze,
            Self::View,
            Self::Modify,
            Self::Delete,
            Self::Capture,
        ]
    }

    /// Returns the action as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Collect => "COLLECT",
            Self::Analyze => "ANALYZE",
            Self::View => "VIEW",
            Self::Modify => "MODIFY",
            Self::Delete => "DELETE",
            Self::Capture => "CAPTURE",
        }
    }

    /// Parses an action from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "COLLECT" => Some(Self::Collect),
            "ANALYZE" => Some(Self::Analyze),
            "VIEW" => Some(Self::View),
            "MODIFY" => Some(Self::Modify),
            "DELETE" => Some(Self::Delete),
            "CAPTURE" => Some(Self::Capture),
            _ => None,
        }
    }
}

impl fmt::Display for CustodyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable entry in the chain of custody.
///
/// Events for a given evidence id are totally ordered by `(timestamp, seq)`
/// and never mutated or removed after append; the ledger is write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyEvent {
    /// The evidence this event belongs to.
    pub evidence_id: EvidenceId,
    /// Per-evidence sequence number, starting at 1.
    ///
    /// Breaks ties between events recorded in the same millisecond.
    pub seq: u64,
    /// The recorded action.
    pub action: CustodyAction,
    /// Identity of the handler who performed the action.
    pub handler: String,
    /// Where the action took place.
    pub location: String,
    /// Timestamp (unix millis), monotonically non-decreasing per evidence id.
    pub timestamp: u64,
    /// Optional free-form notes.
    pub notes: Option<String>,
}

/// Request to append a custody event.
#[derive(Debug, Clone)]
pub struct EventRequest {
    /// The action to record.
    pub action: CustodyAction,
    /// Handler identity.
    pub handler: String,
    /// Location string.
    pub location: String,
    /// Optional notes.
    pub notes: Option<String>,
    /// Logical timestamp override (unix millis).
    ///
    /// `None` uses the wall clock. Callers hit by a clock regression can
    /// inject a logical timestamp here instead of waiting out the clock.
    pub timestamp: Option<u64>,
}

impl EventRequest {
    /// Creates an event request with the wall clock.
    #[must_use]
    pub fn new(action: CustodyAction, handler: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            action,
            handler: handler.into(),
            location: location.into(),
            notes: None,
            timestamp: None,
        }
    }

    /// Attaches notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Injects a logical timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trip() {
        for action in CustodyAction::all() {
            assert_eq!(CustodyAction::parse(action.as_str()), Some(*action));
        }
        assert_eq!(CustodyAction::parse("collect"), Some(CustodyAction::Collect));
        assert_eq!(CustodyAction::parse("SHRED"), None);
    }

    #[test]
    fn test_event_request_builder() {
        let req = EventRequest::new(CustodyAction::View, "agent.okafor", "lab-3")
            .with_notes("routine inspection")
            .with_timestamp(42);
        assert_eq!(req.action, CustodyAction::View);
        assert_eq!(req.notes.as_deref(), Some("routine inspection"));
        assert_eq!(req.timestamp, Some(42));
    }
}
