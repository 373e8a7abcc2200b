//! Scan checkpoint storage trait.

use crate::StoreError;
use tally_types::ScanCheckpoint;

/// Key-value persistence for resumable-scan progress.
///
/// Keys are caller-chosen (the scanner uses the proposal address). The
/// backend only needs atomic whole-record replacement; the scanner's
/// algorithm is identical over a file, an embedded database, or an
/// object store.
pub trait CheckpointStore {
    /// Persist the checkpoint for `key`, replacing any previous one.
    fn save_checkpoint(&self, key: &str, checkpoint: &ScanCheckpoint) -> Result<(), StoreError>;

    /// Load the checkpoint for `key`; `None` when no scan is in flight.
    fn load_checkpoint(&self, key: &str) -> Result<Option<ScanCheckpoint>, StoreError>;

    /// Remove the checkpoint for `key`. Removing a missing key is not an
    /// error.
    fn delete_checkpoint(&self, key: &str) -> Result<(), StoreError>;
}
