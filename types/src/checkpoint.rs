//! Persisted progress of a resumable collection scan.

use crate::proposal::NftHolderMap;
use serde::{Deserialize, Serialize};

/// Checkpoint written after every completed batch of a collection scan.
///
/// On restart the scan resumes at `next_batch` with `holders` already
/// populated, so at most one batch of work is ever re-done. Deleted when
/// the scan completes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCheckpoint {
    /// Index of the first batch that has not fully completed.
    pub next_batch: u64,
    /// Holder map accumulated over all completed batches.
    pub holders: NftHolderMap,
}
