//! The canonical in-memory snapshot shared between the sync engine and
//! the query API.
//!
//! Isolation model: the orchestrator is the only writer. It pulls a deep
//! copy of the snapshot at the start of a cycle (copy-on-read), mutates
//! the copy through every stage, and publishes it back in one swap
//! (copy-on-write). API readers clone whatever section they need, so no
//! reader ever observes a half-updated cycle and no locking beyond the
//! single `RwLock` is required.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

use tally_types::{
    Address, Ballot, DaoCatalog, FetchError, LifecycleSet, NftHolderMap, Proposal,
    ProposalMetadata, RoundState, TallyResult, Timestamp, ValidatorInfoMap, Weight,
};

/// Externally visible health of the service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Warm-up: no cycle has published yet.
    #[default]
    Starting,
    /// The last cycle completed and published.
    Ok,
    /// The last cycle aborted; the snapshot is the previous good one.
    Degraded,
}

/// Everything a sync cycle reads and republishes.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub catalog: DaoCatalog,
    pub proposals: HashMap<Address, Proposal>,
    pub lifecycle: LifecycleSet,
    /// Per-proposal NFT holder maps (lazily fetched, cached forever).
    pub nft_holders: HashMap<Address, NftHolderMap>,
    /// Per-proposal operating-validator balance snapshots.
    pub validator_info: HashMap<Address, ValidatorInfoMap>,
    /// Per-proposal validator round accumulation.
    pub rounds: HashMap<Address, RoundState>,
    /// Last tally-fetch stamp per proposal; gates the ended freeze.
    pub fetch_update: BTreeMap<Address, Timestamp>,
    /// Proposals still waiting for auxiliary data backfill.
    pub missing_aux: BTreeSet<Address>,
    /// Upstream registry address, resolved at startup.
    pub registry: Option<Address>,
    /// Last successful full-cycle commit time.
    pub update_time: Option<Timestamp>,
    pub status: ServiceStatus,
}

/// Assembled read model for one proposal, served by the query API.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ProposalView {
    pub dao_address: Option<Address>,
    pub metadata: Option<ProposalMetadata>,
    pub voting_power: BTreeMap<Address, Weight>,
    pub votes: BTreeMap<Address, Ballot>,
    pub result: TallyResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds: Option<RoundState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<FetchError>,
}

/// Shared cache handle. Cheap to clone behind an `Arc`.
#[derive(Default)]
pub struct Cache {
    inner: RwLock<Snapshot>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep copy of the whole snapshot (the orchestrator's working copy).
    pub async fn snapshot(&self) -> Snapshot {
        self.inner.read().await.clone()
    }

    /// Atomically replace the published snapshot.
    pub async fn publish(&self, snapshot: Snapshot) {
        *self.inner.write().await = snapshot;
    }

    pub async fn set_registry(&self, registry: Address) {
        self.inner.write().await.registry = Some(registry);
    }

    pub async fn set_status(&self, status: ServiceStatus) {
        self.inner.write().await.status = status;
    }

    // ── Read side (query API) ───────────────────────────────────────────

    pub async fn catalog(&self) -> DaoCatalog {
        self.inner.read().await.catalog.clone()
    }

    pub async fn dao(&self, address: &Address) -> Option<tally_types::Dao> {
        self.inner.read().await.catalog.get(address).cloned()
    }

    pub async fn dao_count(&self) -> usize {
        self.inner.read().await.catalog.len()
    }

    /// Assembled view for one proposal; `None` for unknown addresses
    /// (the API turns that into an empty object, never an error).
    pub async fn proposal_view(&self, address: &Address) -> Option<ProposalView> {
        let snap = self.inner.read().await;
        let proposal = snap.proposals.get(address)?;
        let mut view = ProposalView {
            dao_address: Some(proposal.dao_address.clone()),
            metadata: Some(proposal.metadata.clone()),
            rounds: snap.rounds.get(address).cloned(),
            fetch_error: proposal.fetch_error,
            ..ProposalView::default()
        };
        if let Some(data) = &proposal.voting_data {
            view.voting_power = data.voting_power.clone();
            view.votes = data.votes.clone();
            view.result = data.result.clone();
        }
        Some(view)
    }

    pub async fn nft_holders_for(&self, address: &Address) -> NftHolderMap {
        self.inner
            .read()
            .await
            .nft_holders
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn lifecycle(&self) -> LifecycleSet {
        self.inner.read().await.lifecycle.clone()
    }

    pub async fn registry(&self) -> Option<Address> {
        self.inner.read().await.registry.clone()
    }

    pub async fn update_time(&self) -> Option<Timestamp> {
        self.inner.read().await.update_time
    }

    pub async fn status(&self) -> ServiceStatus {
        self.inner.read().await.status
    }

    pub async fn fetch_update_time(&self, address: &Address) -> Option<Timestamp> {
        self.inner.read().await.fetch_update.get(address).copied()
    }

    /// Stored transaction cursor for a proposal (`None` when no tally
    /// has ever been fetched).
    pub async fn max_lt(&self, address: &Address) -> Option<u64> {
        self.inner
            .read()
            .await
            .proposals
            .get(address)
            .and_then(|p| p.voting_data.as_ref())
            .and_then(|d| d.tx_data.cursor)
    }
}
