//! Service container: wires the store and services together.

use crate::Result;
use crate::config::CustodianConfig;
use crate::services::{
    CaptureScheduler, CustodyLedger, DumpStore, EvidenceRegistry, ProcProbe, ProcessProbe,
    QueryFacade,
};
use crate::storage::{CustodyStore, SqliteStore};
use std::sync::Arc;

/// Shared wiring for the custody services.
///
/// All services share one [`SqliteStore`], which is what makes registry
/// transitions atomic with their ledger appends.
pub struct ServiceContainer {
    store: Arc<dyn CustodyStore>,
    ledger: Arc<CustodyLedger>,
    registry: Arc<EvidenceRegistry>,
    dumps: Arc<DumpStore>,
    scheduler: CaptureScheduler,
    query: QueryFacade,
    probe: Arc<dyn ProcessProbe>,
}

impl ServiceContainer {
    /// Builds the container from configuration with the production probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory or store cannot be created.
    pub fn from_config(config: &CustodianConfig) -> Result<Self> {
        Self::with_probe(config, Arc::new(ProcProbe::new()))
    }

    /// Builds the container with a custom process probe.
    ///
    /// Primarily useful for tests and local development with a
    /// [`ScriptedProbe`](crate::services::ScriptedProbe).
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory or store cannot be created.
    pub fn with_probe(config: &CustodianConfig, probe: Arc<dyn ProcessProbe>) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| crate::Error::storage("create_data_dir", e))?;

        let store: Arc<dyn CustodyStore> = Arc::new(SqliteStore::new(config.db_path())?);
        Self::assemble(store, config, probe)
    }

    /// Builds a container over an in-memory store (tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the store or dump directory cannot be created.
    pub fn in_memory(config: &CustodianConfig, probe: Arc<dyn ProcessProbe>) -> Result<Self> {
        let store: Arc<dyn CustodyStore> = Arc::new(SqliteStore::in_memory()?);
        Self::assemble(store, config, probe)
    }

    fn assemble(
        store: Arc<dyn CustodyStore>,
        config: &CustodianConfig,
        probe: Arc<dyn ProcessProbe>,
    ) -> Result<Self> {
        let ledger = Arc::new(CustodyLedger::new(Arc::clone(&store)));
        let registry = Arc::new(EvidenceRegistry::new(Arc::clone(&store)));
        let dumps = Arc::new(DumpStore::new(&config.dump_dir, Arc::clone(&store))?);
        let scheduler =
            CaptureScheduler::new(Arc::clone(&probe), Arc::clone(&dumps), Arc::clone(&registry));
        let query = QueryFacade::new(Arc::clone(&store));

        Ok(Self {
            store,
            ledger,
            registry,
            dumps,
            scheduler,
            query,
            probe,
        })
    }

    /// The shared custody store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn CustodyStore> {
        Arc::clone(&self.store)
    }

    /// The custody ledger.
    #[must_use]
    pub fn ledger(&self) -> &CustodyLedger {
        &self.ledger
    }

    /// The evidence registry.
    #[must_use]
    pub fn registry(&self) -> &EvidenceRegistry {
        &self.registry
    }

    /// The dump store.
    #[must_use]
    pub fn dumps(&self) -> &DumpStore {
        &self.dumps
    }

    /// The capture scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &CaptureScheduler {
        &self.scheduler
    }

    /// The read facade.
    #[must_use]
    pub const fn query(&self) -> &QueryFacade {
        &self.query
    }

    /// The process probe.
    #[must_use]
    pub fn probe(&self) -> &dyn ProcessProbe {
        self.probe.as_ref()
    }
}
