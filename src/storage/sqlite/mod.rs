//! `SQLite` custody store.
//!
//! One mutex-guarded connection in WAL mode backs the ledger, the evidence
//! registry, and the artifact records. Serializing writes through the single
//! connection is what gives the ledger its per-id single-writer discipline;
//! WAL and `busy_timeout` keep concurrent readers cheap.

mod connection;
mod store;

pub use connection::{acquire_lock, configure_connection};
pub use store::SqliteStore;
