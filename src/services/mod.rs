//! Service layer for custodian.
//!
//! Services own the domain semantics; the storage layer owns atomicity.
//! `CustodyLedger` and `EvidenceRegistry` share one [`CustodyStore`](crate::storage::CustodyStore)
//! so a lifecycle transition and its custody event commit together.

mod container;
mod dump_store;
mod ledger;
mod probe;
mod query;
mod registry;
mod scheduler;

pub use container::ServiceContainer;
pub use dump_store::DumpStore;
pub use ledger::CustodyLedger;
pub use probe::{ProcProbe, ProcessInfo, ProcessProbe, ProcessSnapshot, ScriptedProbe};
pub use query::QueryFacade;
pub use registry::{DeleteOutcome, EvidenceRegistry};
pub use scheduler::{CaptureScheduler, MAX_ANALYSIS_SECS, MIN_ANALYSIS_SECS};
