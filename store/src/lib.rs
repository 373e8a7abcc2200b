//! Abstract durable-storage traits for the tally cache.
//!
//! Every backend (filesystem JSON, embedded database, in-memory for
//! testing) implements these traits; the sync engine depends only on the
//! traits. Durable storage holds exactly what must survive a restart:
//! the DAO catalog, finalized (ended) proposals, and scan checkpoints.

pub mod catalog;
pub mod checkpoint;
pub mod error;
pub mod proposal;

pub use catalog::CatalogStore;
pub use checkpoint::CheckpointStore;
pub use error::StoreError;
pub use proposal::ProposalStore;

/// Convenience supertrait for code that needs the whole storage surface.
pub trait SyncStore: CatalogStore + ProposalStore + CheckpointStore {}

impl<T: CatalogStore + ProposalStore + CheckpointStore> SyncStore for T {}
