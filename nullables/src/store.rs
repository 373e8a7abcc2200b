//! Nullable store — thread-safe in-memory storage for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tally_store::{CatalogStore, CheckpointStore, ProposalStore, StoreError};
use tally_types::{Address, DaoCatalog, Proposal, ScanCheckpoint};

/// An in-memory implementation of every storage trait.
///
/// Thread-safe for use with tokio's multi-threaded runtime. Tracks write
/// counts so tests can assert on dirty-flag-gated persistence.
pub struct NullStore {
    catalog: Mutex<Option<DaoCatalog>>,
    proposals: Mutex<HashMap<Address, Proposal>>,
    checkpoints: Mutex<HashMap<String, ScanCheckpoint>>,
    catalog_saves: AtomicU64,
    proposal_saves: AtomicU64,
    checkpoint_saves: AtomicU64,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            catalog: Mutex::new(None),
            proposals: Mutex::new(HashMap::new()),
            checkpoints: Mutex::new(HashMap::new()),
            catalog_saves: AtomicU64::new(0),
            proposal_saves: AtomicU64::new(0),
            checkpoint_saves: AtomicU64::new(0),
        }
    }

    /// How many times the catalog has been written.
    pub fn catalog_saves(&self) -> u64 {
        self.catalog_saves.load(Ordering::SeqCst)
    }

    /// How many proposal records have been written (including overwrites).
    pub fn proposal_saves(&self) -> u64 {
        self.proposal_saves.load(Ordering::SeqCst)
    }

    /// How many checkpoint writes have happened.
    pub fn checkpoint_saves(&self) -> u64 {
        self.checkpoint_saves.load(Ordering::SeqCst)
    }

    /// Seed a checkpoint as if a previous scan had been interrupted.
    pub fn seed_checkpoint(&self, key: &str, checkpoint: ScanCheckpoint) {
        self.checkpoints
            .lock()
            .unwrap()
            .insert(key.to_string(), checkpoint);
    }

    /// Seed durable state as if written by a previous process run.
    pub fn seed_catalog(&self, catalog: DaoCatalog) {
        *self.catalog.lock().unwrap() = Some(catalog);
    }

    pub fn seed_proposal(&self, proposal: Proposal) {
        self.proposals
            .lock()
            .unwrap()
            .insert(proposal.address.clone(), proposal);
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore for NullStore {
    fn save_catalog(&self, catalog: &DaoCatalog) -> Result<(), StoreError> {
        self.catalog_saves.fetch_add(1, Ordering::SeqCst);
        *self.catalog.lock().unwrap() = Some(catalog.clone());
        Ok(())
    }

    fn load_catalog(&self) -> Result<Option<DaoCatalog>, StoreError> {
        Ok(self.catalog.lock().unwrap().clone())
    }
}

impl ProposalStore for NullStore {
    fn save_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        self.proposal_saves.fetch_add(1, Ordering::SeqCst);
        self.proposals
            .lock()
            .unwrap()
            .insert(proposal.address.clone(), proposal.clone());
        Ok(())
    }

    fn load_proposal(&self, address: &Address) -> Result<Option<Proposal>, StoreError> {
        Ok(self.proposals.lock().unwrap().get(address).cloned())
    }

    fn load_all_proposals(&self) -> Result<Vec<Proposal>, StoreError> {
        Ok(self.proposals.lock().unwrap().values().cloned().collect())
    }
}

impl CheckpointStore for NullStore {
    fn save_checkpoint(&self, key: &str, checkpoint: &ScanCheckpoint) -> Result<(), StoreError> {
        self.checkpoint_saves.fetch_add(1, Ordering::SeqCst);
        self.checkpoints
            .lock()
            .unwrap()
            .insert(key.to_string(), checkpoint.clone());
        Ok(())
    }

    fn load_checkpoint(&self, key: &str) -> Result<Option<ScanCheckpoint>, StoreError> {
        Ok(self.checkpoints.lock().unwrap().get(key).cloned())
    }

    fn delete_checkpoint(&self, key: &str) -> Result<(), StoreError> {
        self.checkpoints.lock().unwrap().remove(key);
        Ok(())
    }
}
