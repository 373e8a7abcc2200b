//! Blockchain query boundary for the tally cache.
//!
//! All chain access goes through the [`ChainClient`] trait: the sync
//! engine never talks to the chain directly, which keeps chain-specific
//! decoding out of the core and lets tests substitute a scripted client.
//! The production implementation is [`HttpChainClient`], a thin typed
//! wrapper over a JSON indexing gateway.
//!
//! The vote-decoding and result primitives (`tally` module) are
//! deterministic functions of their inputs and are consumed by the sync
//! engine as black boxes.

pub mod error;
pub mod http;
pub mod tally;

pub use error::ChainError;
pub use http::HttpChainClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use tally_types::{
    Address, MetadataArgs, NftHolderMap, ProposalMetadata, StrategyKind, Timestamp, TxRecord,
    ValidatorInfoMap, Weight,
};

/// One page of a registry DAO enumeration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaoPage {
    pub addresses: Vec<Address>,
    /// Registry id one past the last DAO in this page.
    pub end_cursor: u64,
}

/// Current on-chain state of a DAO contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoState {
    pub dao_id: u64,
    pub owner: Address,
    pub proposal_owner: Address,
    /// Address of the cell holding the DAO's descriptive metadata.
    pub metadata_address: Address,
}

/// One page of a DAO's proposal enumeration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProposalPage {
    pub addresses: Vec<Address>,
    pub end_cursor: u64,
}

/// New transactions since a logical-time cursor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxPage {
    /// Newest first, matching the stored history layout.
    pub transactions: Vec<TxRecord>,
    /// Logical time of the newest transaction ever seen for the entity;
    /// equal to the request cursor when nothing new exists.
    pub cursor: Option<u64>,
}

/// Resolved owner of one NFT collection item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftItem {
    pub item_address: Address,
    pub owner: Address,
}

/// Snapshot of the external validator voting process for one proposal
/// hash. Carries both the per-round fields that change continuously and
/// the static voting parameters the tracker needs when it first sees the
/// proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub critical: bool,
    pub param_id: u32,
    pub param_value: String,
    pub rounds_remaining: u32,
    pub total_rounds: u32,
    pub min_wins: u32,
    pub max_losses: u32,
    pub wins: u32,
    pub losses: u32,
    pub voting_set_id: String,
    pub voter_list: Vec<String>,
    pub total_weight: Weight,
    pub weight_remaining: Weight,
    pub cycle_start: Timestamp,
    pub cycle_end: Timestamp,
    pub total_validators: u32,
    pub main_validators: u32,
}

/// The opaque capability set the sync engine consumes.
///
/// Every method is a single upstream query; batching, retry, and
/// concurrency limits are the caller's concern.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the DAO registry contract. The cache cannot run
    /// without one.
    async fn get_registry(&self) -> Result<Address, ChainError>;

    /// Enumerate DAOs registered at or after `cursor`.
    async fn list_daos(&self, cursor: u64, limit: u32) -> Result<DaoPage, ChainError>;

    async fn get_dao_state(&self, address: &Address) -> Result<DaoState, ChainError>;

    async fn get_dao_metadata(
        &self,
        metadata_address: &Address,
    ) -> Result<MetadataArgs, ChainError>;

    /// Enumerate a DAO's proposals at or after `cursor`.
    async fn list_proposals(
        &self,
        dao: &Address,
        cursor: u64,
        limit: u32,
    ) -> Result<ProposalPage, ChainError>;

    async fn get_proposal_metadata(
        &self,
        address: &Address,
    ) -> Result<ProposalMetadata, ChainError>;

    /// Fetch voting transactions newer than `cursor` (all of them when
    /// `cursor` is `None`).
    async fn transactions_since(
        &self,
        address: &Address,
        cursor: Option<u64>,
    ) -> Result<TxPage, ChainError>;

    /// Compute per-voter power for a strategy. Needs chain access for
    /// balance lookups at the proposal's snapshot block, so it lives on
    /// the client rather than with the pure tally functions.
    #[allow(clippy::too_many_arguments)]
    async fn get_voting_power(
        &self,
        metadata: &ProposalMetadata,
        transactions: &[TxRecord],
        prior: &BTreeMap<Address, Weight>,
        kind: StrategyKind,
        nft_holders: Option<&NftHolderMap>,
        validator_info: Option<&ValidatorInfoMap>,
    ) -> Result<BTreeMap<Address, Weight>, ChainError>;

    /// Number of items in an NFT collection.
    async fn collection_size(&self, collection: &Address) -> Result<u64, ChainError>;

    /// Resolve the current owner of collection item `index`.
    async fn nft_item_owner(
        &self,
        collection: &Address,
        index: u64,
    ) -> Result<NftItem, ChainError>;

    /// Current snapshot of the external validator voting round for `phash`.
    async fn round_snapshot(&self, phash: &str) -> Result<RoundSnapshot, ChainError>;

    /// Balance snapshot of all currently operating validators.
    async fn operating_validators(&self) -> Result<ValidatorInfoMap, ChainError>;
}
