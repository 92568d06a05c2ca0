//! CLI command implementations.
//!
//! Each submodule implements one group of subcommands. Command functions
//! take the [`ServiceContainer`](crate::services::ServiceContainer) plus
//! parsed arguments and print their own output.
//!
//! # Example Usage
//!
//! ```bash
//! # Register a file as evidence
//! custodian ingest suspect.jpg --handler agent.voss --location intake-desk-2
//!
//! # Walk the chain of custody
//! custodian history ev_1f3a... --action CAPTURE
//!
//! # Capture a process and watch one over time
//! custodian capture 4242
//! custodian watch 4242 --duration 60 --interval 5
//! ```

mod capture;
mod dumps;
mod evidence;
mod status;

pub use capture::{cmd_cancel, cmd_capture, cmd_jobs, cmd_processes, cmd_watch};
pub use dumps::{cmd_dump_get, cmd_dumps, cmd_purge};
pub use evidence::{
    cmd_analyze, cmd_annotate, cmd_complete, cmd_delete, cmd_history, cmd_ingest, cmd_list,
    cmd_view,
};
pub use status::{cmd_config, cmd_status};

use crate::models::EvidenceId;

/// Renders a unix-millis timestamp for human output.
#[must_use]
pub fn format_timestamp(millis: u64) -> String {
    chrono::DateTime::from_timestamp_millis(i64::try_from(millis).unwrap_or(0)).map_or_else(
        || millis.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string(),
    )
}

/// Parses raw id arguments into evidence ids.
#[must_use]
pub fn parse_evidence_ids(raw: &[String]) -> Vec<EvidenceId> {
    raw.iter().map(|s| EvidenceId::new(s.as_str())).collect()
}
