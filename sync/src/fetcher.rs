//! The fetch-cycle orchestrator.
//!
//! One cycle runs the full pipeline over a private working copy of the
//! cache snapshot: DAO discovery → DAO drift re-check → proposal
//! discovery → pending metadata re-check → lifecycle reclassification →
//! auxiliary data backfill → tally refresh → publish. Every fan-out is
//! bounded and failure-isolated; cursors only advance after their batch
//! fully succeeded, so a failed stage is simply re-attempted from stored
//! cursors on the next cycle and no discovered entity is ever lost or
//! duplicated.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use tally_chain::{tally, ChainClient};
use tally_store::SyncStore;
use tally_types::time::Clock;
use tally_types::{
    Address, Dao, DaoMetadata, DaoRoles, FetchError, LifecycleStage, Proposal, ProposalMetadata,
    RoundState, StrategyKind, TxHistory, VotingData, stage_at,
};

use crate::batch::BatchExecutor;
use crate::cache::{Cache, ServiceStatus, Snapshot};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::metrics::CacheMetrics;
use crate::notify::Notifier;
use crate::priority;
use crate::rounds::RoundTracker;
use crate::scanner::NftScanner;

/// Strategy argument naming the NFT collection to enumerate.
const NFT_COLLECTION_ARG: &str = "nft-address";
/// Strategy argument carrying the external voting process hash.
const PHASH_ARG: &str = "validators-proposal-hash";

/// The sync orchestrator. One instance per process, driven by the task
/// loop; all collaborators are injected so tests can run it against
/// nullable doubles.
pub struct Fetcher<C, S> {
    chain: Arc<C>,
    store: Arc<S>,
    cache: Arc<Cache>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    notifier: Arc<Notifier>,
    metrics: Arc<CacheMetrics>,
    http: reqwest::Client,
}

impl<C: ChainClient, S: SyncStore> Fetcher<C, S> {
    pub fn new(
        chain: Arc<C>,
        store: Arc<S>,
        cache: Arc<Cache>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
        notifier: Arc<Notifier>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            chain,
            store,
            cache,
            clock,
            config,
            notifier,
            metrics,
            http: reqwest::Client::new(),
        }
    }

    /// Startup: resolve the registry (fatal when missing) and pre-warm
    /// the cache from durable storage.
    pub async fn init(&self) -> Result<(), SyncError> {
        self.notifier.send("tally cache server started").await;

        let registry = self.chain.get_registry().await?;
        tracing::info!(%registry, "resolved upstream registry");
        self.cache.set_registry(registry).await;

        self.warm_from_store().await
    }

    /// Load the catalog and all persisted ended proposals, rebuild their
    /// lifecycle membership, and seed the fetch ledger so stored results
    /// stay frozen.
    async fn warm_from_store(&self) -> Result<(), SyncError> {
        let mut snap = self.cache.snapshot().await;

        if let Some(catalog) = self.store.load_catalog()? {
            tracing::info!(
                daos = catalog.len(),
                next_dao_id = catalog.next_dao_id,
                "dao catalog loaded from durable storage"
            );
            snap.catalog = catalog;
        }

        let stored = self.store.load_all_proposals()?;
        let now = self.clock.now();
        let count = stored.len();
        for proposal in stored {
            let stage = stage_at(now, proposal.metadata.start_time, proposal.metadata.end_time);
            snap.lifecycle.insert(proposal.address.clone(), stage);
            if stage == LifecycleStage::Ended && proposal.voting_data.is_some() {
                snap.fetch_update.insert(proposal.address.clone(), now);
            }
            snap.proposals.insert(proposal.address.clone(), proposal);
        }
        if count > 0 {
            tracing::info!(proposals = count, "ended proposals loaded from durable storage");
        }

        self.cache.publish(snap).await;
        Ok(())
    }

    /// Run one full cycle. Errors abort the remaining stages, flip the
    /// service status, and alert — but the previous snapshot keeps
    /// serving and the next cycle starts fresh from stored cursors.
    pub async fn run(&self) -> Result<(), SyncError> {
        let started = Instant::now();
        match self.run_cycle().await {
            Ok((daos, proposals)) => {
                self.metrics.cycles_completed.inc();
                tracing::info!(
                    daos,
                    proposals,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "sync cycle complete"
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.cycles_failed.inc();
                self.cache.set_status(ServiceStatus::Degraded).await;
                self.notifier.send(&format!("sync cycle aborted: {e}")).await;
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> Result<(usize, usize), SyncError> {
        let mut snap = self.cache.snapshot().await;
        let mut catalog_dirty = false;

        let result = self.run_stages(&mut snap, &mut catalog_dirty).await;
        if let Err(e) = result {
            // Flush whatever discovery committed before the abort so the
            // next process start resumes from the advanced cursors.
            if catalog_dirty {
                if let Err(persist) = self.store.save_catalog(&snap.catalog) {
                    tracing::error!(error = %persist, "failed to flush catalog after aborted cycle");
                }
            }
            return Err(e);
        }

        let counts = (snap.catalog.len(), snap.proposals.len());
        self.publish(snap).await;
        Ok(counts)
    }

    async fn run_stages(
        &self,
        snap: &mut Snapshot,
        catalog_dirty: &mut bool,
    ) -> Result<(), SyncError> {
        self.discover_daos(snap, catalog_dirty).await?;
        if *catalog_dirty {
            self.store.save_catalog(&snap.catalog)?;
            *catalog_dirty = false;
        }
        self.recheck_dao_state(snap).await;
        self.discover_proposals(snap).await?;
        self.recheck_pending_metadata(snap).await;
        self.reclassify(snap);
        self.backfill_auxiliary(snap).await;
        self.refresh_tallies(snap).await?;
        Ok(())
    }

    async fn publish(&self, mut snap: Snapshot) {
        snap.update_time = Some(self.clock.now());
        snap.status = ServiceStatus::Ok;

        self.metrics.dao_count.set(snap.catalog.len() as i64);
        self.metrics.proposal_count.set(snap.proposals.len() as i64);
        self.metrics.active_count.set(snap.lifecycle.active.len() as i64);
        self.metrics.ended_count.set(snap.lifecycle.ended.len() as i64);

        self.cache.publish(snap).await;
    }

    // ── Stage 1: DAO discovery ──────────────────────────────────────────

    async fn discover_daos(
        &self,
        snap: &mut Snapshot,
        catalog_dirty: &mut bool,
    ) -> Result<(), SyncError> {
        let cursor = snap.catalog.next_dao_id;
        let page = self
            .chain
            .list_daos(cursor, self.config.dao_page_size)
            .await?;
        if page.addresses.is_empty() {
            return Ok(());
        }
        tracing::info!(count = page.addresses.len(), cursor, "new daos discovered");

        let executor = BatchExecutor::new(
            self.config.dao_detail_batch_size,
            self.config.retry_policy(),
        );
        let outcome = executor
            .run(page.addresses.clone(), |address| async move {
                let state = self.chain.get_dao_state(&address).await?;
                let args = self.chain.get_dao_metadata(&state.metadata_address).await?;
                Ok::<_, SyncError>(Dao {
                    address,
                    dao_id: state.dao_id,
                    metadata: DaoMetadata {
                        metadata_address: state.metadata_address,
                        args,
                    },
                    roles: DaoRoles {
                        owner: state.owner,
                        proposal_owner: state.proposal_owner,
                    },
                    next_proposal_cursor: 0,
                    proposals: Vec::new(),
                })
            })
            .await;

        let discovered = outcome.succeeded.len();
        let failed = outcome.failures.len();
        for dao in outcome.succeeded {
            snap.catalog.insert(dao);
        }
        if discovered > 0 {
            snap.catalog.sort_by_dao_id();
            let priority = self.load_priority_list().await;
            snap.catalog.apply_priority(&priority);
            self.metrics.daos_discovered.inc_by(discovered as u64);
            *catalog_dirty = true;
        }

        if failed == 0 {
            snap.catalog.advance_cursor(page.end_cursor);
        } else {
            tracing::warn!(failed, "dao discovery batch incomplete, cursor not advanced");
        }
        Ok(())
    }

    async fn load_priority_list(&self) -> Vec<Address> {
        match &self.config.priority_list_url {
            Some(url) => priority::fetch_priority_list(&self.http, url).await,
            None => Vec::new(),
        }
    }

    // ── Stage 2: DAO drift re-check ─────────────────────────────────────

    /// Re-fetch every known DAO's on-chain state and overwrite metadata
    /// and roles in place when the chain drifted. Per-item failures are
    /// logged and never fatal; drift does not dirty the stored catalog.
    async fn recheck_dao_state(&self, snap: &mut Snapshot) {
        if snap.catalog.is_empty() {
            return;
        }
        let current: HashMap<Address, (Address, DaoRoles)> = snap
            .catalog
            .daos()
            .iter()
            .map(|d| {
                (
                    d.address.clone(),
                    (d.metadata.metadata_address.clone(), d.roles.clone()),
                )
            })
            .collect();

        let executor = BatchExecutor::new(
            self.config.dao_detail_batch_size,
            self.config.retry_policy(),
        );
        let current_ref = &current;
        let outcome = executor
            .run(snap.catalog.addresses(), |address| async move {
                let state = self.chain.get_dao_state(&address).await?;
                let unchanged = current_ref.get(&address).is_some_and(|(meta_addr, roles)| {
                    *meta_addr == state.metadata_address
                        && roles.owner == state.owner
                        && roles.proposal_owner == state.proposal_owner
                });
                if unchanged {
                    return Ok::<_, SyncError>(None);
                }
                tracing::info!(%address, "dao state drifted on chain, refreshing metadata");
                let args = self.chain.get_dao_metadata(&state.metadata_address).await?;
                Ok(Some((address, state, args)))
            })
            .await;

        for (address, state, args) in outcome.succeeded.into_iter().flatten() {
            if let Some(dao) = snap.catalog.get_mut(&address) {
                dao.metadata = DaoMetadata {
                    metadata_address: state.metadata_address,
                    args,
                };
                dao.roles = DaoRoles {
                    owner: state.owner,
                    proposal_owner: state.proposal_owner,
                };
            }
        }
    }

    // ── Stage 3: proposal discovery ─────────────────────────────────────

    async fn discover_proposals(&self, snap: &mut Snapshot) -> Result<(), SyncError> {
        struct DaoDiscovery {
            dao: Address,
            end_cursor: u64,
            fresh: Vec<Proposal>,
            known: Vec<Address>,
            complete: bool,
        }

        if snap.catalog.is_empty() {
            return Ok(());
        }

        let cursors: HashMap<Address, u64> = snap
            .catalog
            .daos()
            .iter()
            .map(|d| (d.address.clone(), d.next_proposal_cursor))
            .collect();
        let known_addresses: BTreeSet<Address> = snap.proposals.keys().cloned().collect();
        let listed: HashMap<Address, Vec<Address>> = snap
            .catalog
            .daos()
            .iter()
            .map(|d| (d.address.clone(), d.proposals.clone()))
            .collect();
        let cursors_ref = &cursors;
        let known_ref = &known_addresses;
        let listed_ref = &listed;

        let executor = BatchExecutor::new(
            self.config.dao_page_size as usize,
            self.config.retry_policy(),
        );
        let metadata_executor = BatchExecutor::new(
            self.config.proposal_metadata_batch_size,
            self.config.retry_policy(),
        );
        let metadata_executor_ref = &metadata_executor;

        let outcome = executor
            .run(snap.catalog.addresses(), |dao| async move {
                let cursor = cursors_ref.get(&dao).copied().unwrap_or(0);
                let page = self
                    .chain
                    .list_proposals(&dao, cursor, self.config.proposal_page_size)
                    .await?;
                if !page.addresses.is_empty() {
                    tracing::info!(%dao, count = page.addresses.len(), "new proposals discovered");
                }

                let (known, mut to_fetch): (Vec<Address>, Vec<Address>) = page
                    .addresses
                    .into_iter()
                    .partition(|addr| known_ref.contains(addr));

                // Proposals the catalog lists behind an already-advanced
                // cursor but which the cache has no record of (lost to a
                // restart before they ended) are re-fetched here.
                if let Some(list) = listed_ref.get(&dao) {
                    for address in list {
                        if !known_ref.contains(address) && !to_fetch.contains(address) {
                            tracing::info!(%dao, %address, "re-fetching proposal missing from the cache");
                            to_fetch.push(address.clone());
                        }
                    }
                }
                if known.is_empty() && to_fetch.is_empty() {
                    return Ok::<_, SyncError>(DaoDiscovery {
                        dao,
                        end_cursor: page.end_cursor,
                        fresh: Vec::new(),
                        known: Vec::new(),
                        complete: true,
                    });
                }

                let dao_for_fetch = dao.clone();
                let dao_ref = &dao_for_fetch;
                let fetched = metadata_executor_ref
                    .run(to_fetch, |address| async move {
                        let metadata = self.chain.get_proposal_metadata(&address).await?;
                        Ok::<_, SyncError>(Proposal {
                            dao_address: dao_ref.clone(),
                            address,
                            metadata,
                            voting_data: None,
                            fetch_error: None,
                        })
                    })
                    .await;

                Ok(DaoDiscovery {
                    dao,
                    end_cursor: page.end_cursor,
                    complete: fetched.all_succeeded(),
                    fresh: fetched.succeeded,
                    known,
                })
            })
            .await;

        let now = self.clock.now();
        for discovery in outcome.succeeded {
            // Addresses already known to the cache (warm-loaded from
            // durable storage) are only reclassified, never re-fetched.
            for address in &discovery.known {
                if let Some(proposal) = snap.proposals.get(address) {
                    let stage = stage_at(
                        now,
                        proposal.metadata.start_time,
                        proposal.metadata.end_time,
                    );
                    snap.lifecycle.relocate(address, stage);
                }
            }

            let mut fresh = discovery.fresh;
            fresh.sort_by(|a, b| b.metadata.id.cmp(&a.metadata.id));

            if let Some(dao) = snap.catalog.get_mut(&discovery.dao) {
                for proposal in &fresh {
                    if !dao.proposals.contains(&proposal.address) {
                        dao.proposals.push(proposal.address.clone());
                    }
                }
                for address in &discovery.known {
                    if !dao.proposals.contains(address) {
                        dao.proposals.push(address.clone());
                    }
                }
                // The cursor only advances once the whole batch made it.
                if discovery.complete {
                    dao.next_proposal_cursor =
                        dao.next_proposal_cursor.max(discovery.end_cursor);
                }
            }

            for proposal in fresh {
                snap.lifecycle
                    .insert(proposal.address.clone(), LifecycleStage::Pending);
                let needs_aux = proposal.metadata.primary_strategy().is_some_and(|s| {
                    s.kind.requires_nft_holders() || s.kind.requires_validator_info()
                });
                if needs_aux {
                    tracing::info!(address = %proposal.address, "proposal needs auxiliary data backfill");
                    snap.missing_aux.insert(proposal.address.clone());
                }
                self.metrics.proposals_discovered.inc();
                snap.proposals.insert(proposal.address.clone(), proposal);
            }
        }
        Ok(())
    }

    // ── Stage 4: pending metadata drift re-check ────────────────────────

    /// Pending proposals can still be edited on chain; re-fetch their
    /// descriptors and overwrite on drift. Active/ended metadata is
    /// settled and never re-read.
    async fn recheck_pending_metadata(&self, snap: &mut Snapshot) {
        if snap.lifecycle.pending.is_empty() {
            return;
        }
        let current: HashMap<Address, ProposalMetadata> = snap
            .lifecycle
            .pending
            .iter()
            .filter_map(|addr| {
                snap.proposals
                    .get(addr)
                    .map(|p| (addr.clone(), p.metadata.clone()))
            })
            .collect();
        let current_ref = &current;

        let executor = BatchExecutor::new(
            self.config.proposal_metadata_batch_size,
            self.config.retry_policy(),
        );
        let targets: Vec<Address> = snap.lifecycle.pending.iter().cloned().collect();
        let outcome = executor
            .run(targets, |address| async move {
                let metadata = self.chain.get_proposal_metadata(&address).await?;
                if current_ref.get(&address) == Some(&metadata) {
                    return Ok::<_, SyncError>(None);
                }
                tracing::info!(%address, "proposal metadata drifted on chain");
                Ok(Some((address, metadata)))
            })
            .await;

        for (address, metadata) in outcome.succeeded.into_iter().flatten() {
            if let Some(proposal) = snap.proposals.get_mut(&address) {
                proposal.metadata = metadata;
            }
        }
    }

    // ── Stage 5: lifecycle reclassification ─────────────────────────────

    fn reclassify(&self, snap: &mut Snapshot) {
        let now = self.clock.now();
        let candidates: Vec<Address> = snap
            .lifecycle
            .pending
            .iter()
            .chain(snap.lifecycle.active.iter())
            .cloned()
            .collect();

        for address in candidates {
            let Some(proposal) = snap.proposals.get(&address) else {
                tracing::warn!(%address, "lifecycle entry without proposal record");
                continue;
            };
            let before = snap.lifecycle.stage_of(&address);
            let stage = stage_at(
                now,
                proposal.metadata.start_time,
                proposal.metadata.end_time,
            );
            snap.lifecycle.relocate(&address, stage);
            if before != Some(stage) {
                tracing::info!(%address, from = ?before, to = %stage, "proposal lifecycle transition");
            }
            // A proposal that just ended gets exactly one more tally
            // refresh (the finalizing one); clearing its ledger entry is
            // what allows it.
            if stage == LifecycleStage::Ended && before != Some(LifecycleStage::Ended) {
                snap.fetch_update.remove(&address);
            }
        }
    }

    // ── Stage 6: auxiliary data backfill ────────────────────────────────

    /// Fetch NFT holder sets and validator snapshots for proposals
    /// flagged at discovery. Collection-wide scan failures keep the
    /// proposal flagged and resume from the checkpoint next cycle;
    /// anything else marks the proposal broken and stops retrying.
    async fn backfill_auxiliary(&self, snap: &mut Snapshot) {
        for address in snap.missing_aux.clone() {
            let Some(proposal) = snap.proposals.get(&address) else {
                snap.missing_aux.remove(&address);
                continue;
            };
            let Some(strategy) = proposal.metadata.primary_strategy().cloned() else {
                snap.missing_aux.remove(&address);
                continue;
            };

            if strategy.kind.requires_nft_holders() {
                if snap.nft_holders.contains_key(&address) {
                    snap.missing_aux.remove(&address);
                    continue;
                }
                let Some(collection) = strategy.argument(NFT_COLLECTION_ARG) else {
                    tracing::warn!(%address, "nft strategy without collection argument");
                    mark_fetch_error(snap, &address, FetchError::NftHolders);
                    continue;
                };
                let collection = Address::new(collection);
                tracing::info!(%address, %collection, "fetching nft holders");

                let scanner = NftScanner::new(
                    self.chain.as_ref(),
                    self.store.as_ref(),
                    self.config.nft_item_batch_size,
                    self.config.max_scan_batches,
                    self.config.retry_policy(),
                )
                .with_metrics(&self.metrics);

                match scanner.scan(address.as_str(), &collection).await {
                    Ok(holders) => {
                        snap.nft_holders.insert(address.clone(), holders);
                        snap.missing_aux.remove(&address);
                    }
                    Err(e @ SyncError::ScanAborted { .. }) => {
                        tracing::warn!(%address, error = %e, "collection scan aborted, resuming next cycle");
                    }
                    Err(e) => {
                        tracing::warn!(%address, error = %e, "nft holder fetch failed");
                        mark_fetch_error(snap, &address, FetchError::NftHolders);
                    }
                }
            } else if strategy.kind.requires_validator_info() {
                if snap.validator_info.contains_key(&address) {
                    snap.missing_aux.remove(&address);
                    continue;
                }
                match self.chain.operating_validators().await {
                    Ok(info) => {
                        snap.validator_info.insert(address.clone(), info);
                        snap.missing_aux.remove(&address);
                    }
                    Err(e) => {
                        tracing::warn!(%address, error = %e, "validator snapshot fetch failed");
                        mark_fetch_error(snap, &address, FetchError::ValidatorInfo);
                    }
                }
            } else {
                snap.missing_aux.remove(&address);
            }
        }
    }

    // ── Stage 7: tally refresh ──────────────────────────────────────────

    async fn refresh_tallies(&self, snap: &mut Snapshot) -> Result<(), SyncError> {
        enum TallyOutcome {
            Refreshed(VotingData),
            Round(RoundState),
            CursorUnchanged,
            Skipped,
        }
        struct TallyUpdate {
            address: Address,
            outcome: TallyOutcome,
        }

        let mut targets = Vec::new();
        for address in snap.lifecycle.active.iter().chain(snap.lifecycle.ended.iter()) {
            // Finalized results are frozen: ended + already stamped.
            if snap.lifecycle.ended.contains(address) && snap.fetch_update.contains_key(address) {
                continue;
            }
            let Some(proposal) = snap.proposals.get(address) else {
                continue;
            };
            if let Some(reason) = proposal.fetch_error {
                tracing::debug!(%address, %reason, "skipping tally for broken proposal");
                continue;
            }
            targets.push(address.clone());
        }
        if targets.is_empty() {
            return Ok(());
        }

        let proposals = snap.proposals.clone();
        let nft_holders = snap.nft_holders.clone();
        let validator_info = snap.validator_info.clone();
        let rounds = snap.rounds.clone();
        let proposals_ref = &proposals;
        let nft_ref = &nft_holders;
        let validators_ref = &validator_info;
        let rounds_ref = &rounds;

        let executor =
            BatchExecutor::new(self.config.tally_batch_size, self.config.retry_policy());
        let outcome = executor
            .run(targets, |address| async move {
                let Some(proposal) = proposals_ref.get(&address) else {
                    return Ok::<_, SyncError>(TallyUpdate {
                        address,
                        outcome: TallyOutcome::Skipped,
                    });
                };
                let strategy = proposal.metadata.primary_strategy();
                let kind = strategy.map(|s| s.kind).unwrap_or(StrategyKind::TokenBalance);

                if kind.is_validator_vote() {
                    let Some(phash) = strategy.and_then(|s| s.argument(PHASH_ARG)) else {
                        tracing::warn!(%address, "validator vote proposal without phash argument");
                        return Ok(TallyUpdate {
                            address,
                            outcome: TallyOutcome::Skipped,
                        });
                    };
                    let state = RoundTracker::poll(
                        self.chain.as_ref(),
                        rounds_ref.get(&address).cloned(),
                        phash,
                    )
                    .await?;
                    return Ok(TallyUpdate {
                        address,
                        outcome: TallyOutcome::Round(state),
                    });
                }

                let previous = proposal.voting_data.clone().unwrap_or_default();
                let page = self
                    .chain
                    .transactions_since(&address, previous.tx_data.cursor)
                    .await?;
                if page.cursor == previous.tx_data.cursor {
                    tracing::debug!(%address, "no new transactions");
                    return Ok(TallyUpdate {
                        address,
                        outcome: TallyOutcome::CursorUnchanged,
                    });
                }

                // Prepend the new transactions and recompute from the
                // full accumulated history.
                let mut transactions = page.transactions;
                transactions.extend(previous.tx_data.transactions.iter().cloned());

                let votes = tally::compute_votes(&transactions, &proposal.metadata);
                let voting_power = self
                    .chain
                    .get_voting_power(
                        &proposal.metadata,
                        &transactions,
                        &previous.voting_power,
                        kind,
                        nft_ref.get(&address),
                        validators_ref.get(&address),
                    )
                    .await?;
                let result = tally::compute_result(&votes, &voting_power);

                Ok(TallyUpdate {
                    address,
                    outcome: TallyOutcome::Refreshed(VotingData {
                        tx_data: TxHistory {
                            transactions,
                            cursor: page.cursor,
                        },
                        voting_power,
                        votes,
                        result,
                    }),
                })
            })
            .await;

        let now = self.clock.now();
        for update in outcome.succeeded {
            let stamped = !matches!(update.outcome, TallyOutcome::Skipped);
            match update.outcome {
                TallyOutcome::Refreshed(data) => {
                    if let Some(proposal) = snap.proposals.get_mut(&update.address) {
                        proposal.voting_data = Some(data);
                        self.metrics.tallies_refreshed.inc();
                    }
                }
                TallyOutcome::Round(state) => {
                    snap.rounds.insert(update.address.clone(), state);
                }
                TallyOutcome::CursorUnchanged | TallyOutcome::Skipped => {}
            }

            if stamped {
                let first_stamp = !snap.fetch_update.contains_key(&update.address);
                snap.fetch_update.insert(update.address.clone(), now);

                // An ended proposal's first post-end refresh finalizes
                // it; persist the full record right away.
                if first_stamp && snap.lifecycle.ended.contains(&update.address) {
                    if let Some(proposal) = snap.proposals.get(&update.address) {
                        self.store.save_proposal(proposal)?;
                        tracing::info!(address = %update.address, "ended proposal persisted");
                    }
                }
            }
        }
        Ok(())
    }
}

fn mark_fetch_error(snap: &mut Snapshot, address: &Address, reason: FetchError) {
    snap.missing_aux.remove(address);
    if let Some(proposal) = snap.proposals.get_mut(address) {
        proposal.fetch_error = Some(reason);
    }
}
