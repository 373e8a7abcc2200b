//! Checkpointed NFT collection enumeration.
//!
//! Resolving the holder of every item in a large collection can take
//! thousands of flaky upstream lookups. The scanner works in fixed-size
//! batches, persists a [`ScanCheckpoint`] after every completed batch,
//! and aborts (rather than silently skipping) when an item keeps failing
//! — the checkpoint already reflects the last fully successful batch, so
//! the next invocation re-does at most one batch instead of the whole
//! scan.

use std::collections::BTreeMap;

use tally_chain::ChainClient;
use tally_store::CheckpointStore;
use tally_types::{Address, NftHolderMap, ScanCheckpoint};

use crate::batch::{BatchExecutor, RetryPolicy};
use crate::error::SyncError;
use crate::metrics::CacheMetrics;

/// Enumerates collection holders with crash-resumable progress.
pub struct NftScanner<'a, C, S> {
    chain: &'a C,
    checkpoints: &'a S,
    batch_size: usize,
    /// Collections needing more than this many batches are not scanned.
    max_batches: u64,
    retry: RetryPolicy,
    metrics: Option<&'a CacheMetrics>,
}

impl<'a, C: ChainClient, S: CheckpointStore> NftScanner<'a, C, S> {
    pub fn new(
        chain: &'a C,
        checkpoints: &'a S,
        batch_size: usize,
        max_batches: u64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            chain,
            checkpoints,
            batch_size: batch_size.max(1),
            max_batches,
            retry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a CacheMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enumerate all holders of `collection`, resuming from the
    /// checkpoint stored under `key` if one exists.
    ///
    /// Returns an empty map without scanning when the collection exceeds
    /// the batch ceiling (cost-bound safety valve). Any item that still
    /// fails after retries aborts the scan with
    /// [`SyncError::ScanAborted`]; the on-disk checkpoint from the prior
    /// batch stays valid for the next attempt.
    pub async fn scan(&self, key: &str, collection: &Address) -> Result<NftHolderMap, SyncError> {
        let size = self.chain.collection_size(collection).await?;
        let total_batches = size.div_ceil(self.batch_size as u64);

        if total_batches > self.max_batches {
            tracing::warn!(
                %collection,
                items = size,
                batches = total_batches,
                ceiling = self.max_batches,
                "collection exceeds scan ceiling, skipping enumeration"
            );
            return Ok(BTreeMap::new());
        }

        let (start_batch, mut holders) = match self.checkpoints.load_checkpoint(key)? {
            Some(checkpoint) => {
                tracing::info!(
                    %collection,
                    resume_batch = checkpoint.next_batch,
                    holders = checkpoint.holders.len(),
                    "resuming collection scan from checkpoint"
                );
                (checkpoint.next_batch, checkpoint.holders)
            }
            None => (0, BTreeMap::new()),
        };

        let executor = BatchExecutor::new(self.batch_size, self.retry);

        for batch in start_batch..total_batches {
            let first = batch * self.batch_size as u64;
            let last = (first + self.batch_size as u64).min(size);
            let indices: Vec<u64> = (first..last).collect();

            let outcome = executor
                .run(indices, |index| async move {
                    let item = self.chain.nft_item_owner(collection, index).await?;
                    Ok::<_, SyncError>((index, item.owner))
                })
                .await;

            if let Some(failure) = outcome.failures.first() {
                return Err(SyncError::ScanAborted {
                    batch,
                    reason: format!("item {}: {}", failure.item, failure.reason),
                });
            }

            // Fan-out completion order is arbitrary; keep item lists
            // sorted so two scans of the same collection are identical.
            for (index, owner) in outcome.succeeded {
                let items = holders.entry(owner).or_default();
                items.push(index);
                items.sort_unstable();
            }

            self.checkpoints.save_checkpoint(
                key,
                &ScanCheckpoint {
                    next_batch: batch + 1,
                    holders: holders.clone(),
                },
            )?;
            if let Some(metrics) = self.metrics {
                metrics.scan_batches.inc();
            }
        }

        self.checkpoints.delete_checkpoint(key)?;
        tracing::info!(%collection, holders = holders.len(), items = size, "collection scan complete");
        Ok(holders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_nullables::{NullChain, NullStore};

    fn owners(n: u64) -> Vec<Address> {
        // Items alternate between two holders.
        (0..n)
            .map(|i| Address::new(if i % 2 == 0 { "holder-even" } else { "holder-odd" }))
            .collect()
    }

    fn scanner<'a>(chain: &'a NullChain, store: &'a NullStore) -> NftScanner<'a, NullChain, NullStore> {
        NftScanner::new(chain, store, 4, 500, RetryPolicy::no_retry())
    }

    #[tokio::test]
    async fn full_scan_groups_items_by_holder() {
        let chain = NullChain::new();
        let store = NullStore::new();
        let collection = Address::new("coll");
        chain.set_collection(collection.clone(), owners(10));

        let holders = scanner(&chain, &store).scan("p1", &collection).await.unwrap();
        assert_eq!(holders[&Address::new("holder-even")], vec![0, 2, 4, 6, 8]);
        assert_eq!(holders[&Address::new("holder-odd")], vec![1, 3, 5, 7, 9]);
        // Checkpoint removed on completion.
        assert!(store.load_checkpoint("p1").unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_collection_is_skipped_entirely() {
        let chain = NullChain::new();
        let store = NullStore::new();
        let collection = Address::new("coll");
        chain.set_collection(collection.clone(), owners(100));

        let scanner = NftScanner::new(&chain, &store, 4, 2, RetryPolicy::no_retry());
        let holders = scanner.scan("p1", &collection).await.unwrap();
        assert!(holders.is_empty());
        assert_eq!(chain.item_owner_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_item_failures_are_retried_within_the_batch() {
        let chain = NullChain::new();
        let store = NullStore::new();
        let collection = Address::new("coll");
        chain.set_collection(collection.clone(), owners(4));
        chain.fail_item(collection.clone(), 2, 1);

        let scanner = NftScanner::new(
            &chain,
            &store,
            4,
            500,
            RetryPolicy {
                max_attempts: 3,
                base_delay: std::time::Duration::from_millis(1),
                max_delay: std::time::Duration::from_millis(1),
            },
        );
        let holders = scanner.scan("p1", &collection).await.unwrap();
        assert_eq!(holders[&Address::new("holder-even")], vec![0, 2]);
        // 4 items + 1 retry.
        assert_eq!(chain.item_owner_calls(), 5);
    }

    #[tokio::test]
    async fn persistent_failure_aborts_and_preserves_checkpoint() {
        let chain = NullChain::new();
        let store = NullStore::new();
        let collection = Address::new("coll");
        chain.set_collection(collection.clone(), owners(8));
        // Item 5 (second batch) fails forever.
        chain.fail_item(collection.clone(), 5, u32::MAX);

        let err = scanner(&chain, &store)
            .scan("p1", &collection)
            .await
            .unwrap_err();
        match err {
            SyncError::ScanAborted { batch, .. } => assert_eq!(batch, 1),
            other => panic!("unexpected error: {other}"),
        }

        // The checkpoint reflects the last fully successful batch.
        let checkpoint = store.load_checkpoint("p1").unwrap().unwrap();
        assert_eq!(checkpoint.next_batch, 1);
        assert_eq!(checkpoint.holders[&Address::new("holder-even")], vec![0, 2]);
    }

    #[tokio::test]
    async fn resumed_scan_matches_an_uninterrupted_one() {
        let collection = Address::new("coll");

        // Reference: uninterrupted scan.
        let chain = NullChain::new();
        let store = NullStore::new();
        chain.set_collection(collection.clone(), owners(10));
        let reference = scanner(&chain, &store).scan("p1", &collection).await.unwrap();

        // Interrupted: batch 1 fails once, then the scan is re-run.
        let chain = NullChain::new();
        let store = NullStore::new();
        chain.set_collection(collection.clone(), owners(10));
        chain.fail_item(collection.clone(), 6, 1);
        let err = scanner(&chain, &store).scan("p1", &collection).await;
        assert!(err.is_err());
        let calls_after_abort = chain.item_owner_calls();

        let resumed = scanner(&chain, &store).scan("p1", &collection).await.unwrap();
        assert_eq!(resumed, reference);
        // The resume re-did batch 1 (4 items) and batch 2 (2 items), not batch 0.
        assert_eq!(chain.item_owner_calls() - calls_after_abort, 6);
    }
}
