//! Ended-proposal storage trait.

use crate::StoreError;
use tally_types::{Address, Proposal};

/// Persistence for finalized proposals, one record per proposal address.
///
/// A proposal is written exactly once: immediately after its first
/// successful tally refresh post-ending. Loaded in bulk at startup so
/// frozen results survive restarts without re-fetching.
pub trait ProposalStore {
    /// Write (or overwrite) a proposal record atomically.
    fn save_proposal(&self, proposal: &Proposal) -> Result<(), StoreError>;

    /// Load one proposal record.
    fn load_proposal(&self, address: &Address) -> Result<Option<Proposal>, StoreError>;

    /// Load every stored proposal record.
    fn load_all_proposals(&self) -> Result<Vec<Proposal>, StoreError>;
}
