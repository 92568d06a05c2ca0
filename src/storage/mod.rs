//! Storage layer: the durable custody store.
//!
//! The core requires only a durable, ordered append log and a keyed store.
//! [`CustodyStore`] is that seam; [`SqliteStore`] is the shipped backend.
//! Services own semantics, the store owns atomicity: every state-mutating
//! operation commits the evidence mutation and its custody event in a single
//! transaction, so a failed append can never leave an orphaned transition.

mod sqlite;
mod traits;

pub use sqlite::{SqliteStore, acquire_lock, configure_connection};
pub use traits::CustodyStore;
