use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("chain error: {0}")]
    Chain(#[from] tally_chain::ChainError),

    #[error("store error: {0}")]
    Store(#[from] tally_store::StoreError),

    #[error("collection scan aborted at batch {batch}: {reason}")]
    ScanAborted { batch: u64, reason: String },
}
