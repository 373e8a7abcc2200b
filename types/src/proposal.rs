//! Proposal records, voting data, and voting-power strategies.

use crate::address::Address;
use crate::time::Timestamp;
use crate::weight::Weight;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a proposal weights its voters' ballots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Weight equals the voter's token balance at the snapshot block.
    TokenBalance,
    /// Weight equals the number of collection items the voter holds.
    NftCollection,
    /// Holding any item of the collection grants exactly one vote.
    NftCollectionSingleVote,
    /// Weight equals the voter's staked validator balance.
    ValidatorBalance,
    /// Outcome decided by an external validator-committee round process.
    ValidatorVote,
}

impl StrategyKind {
    /// Whether tallying needs the NFT holder map for the strategy's collection.
    pub fn requires_nft_holders(&self) -> bool {
        matches!(self, Self::NftCollection | Self::NftCollectionSingleVote)
    }

    /// Whether tallying needs the operating-validator balance snapshot.
    pub fn requires_validator_info(&self) -> bool {
        matches!(self, Self::ValidatorBalance)
    }

    /// Whether the proposal is decided by the external round process
    /// instead of the standard tally path.
    pub fn is_validator_vote(&self) -> bool {
        matches!(self, Self::ValidatorVote)
    }
}

/// A named strategy argument (collection address, proposal hash, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyArg {
    pub name: String,
    pub value: String,
}

/// One voting-power strategy with its on-chain arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPowerStrategy {
    pub kind: StrategyKind,
    #[serde(default)]
    pub arguments: Vec<StrategyArg>,
}

impl VotingPowerStrategy {
    /// Look up an argument value by name.
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// Immutable on-chain descriptor of a proposal.
///
/// Fetched once at discovery; only the explicit drift re-check pass may
/// overwrite it afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    /// On-chain proposal id within its DAO.
    pub id: u64,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// Block at which balances are snapshotted for voting power.
    pub snapshot_block: u64,
    pub voting_power_strategies: Vec<VotingPowerStrategy>,
}

impl ProposalMetadata {
    /// The leading strategy decides the tally path and auxiliary data needs.
    pub fn primary_strategy(&self) -> Option<&VotingPowerStrategy> {
        self.voting_power_strategies.first()
    }
}

/// One raw voting transaction as reported by the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub voter: Address,
    /// Opaque logical-time marker; strictly increasing per proposal.
    pub logical_time: u64,
    pub timestamp: Timestamp,
    /// Raw vote payload; interpreted only by the tally functions.
    pub body: String,
}

/// Accumulated transaction history for a proposal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHistory {
    /// Newest transactions first; refreshes prepend.
    pub transactions: Vec<TxRecord>,
    /// Logical time of the newest known transaction. Non-decreasing; a
    /// refresh yielding the same cursor means nothing new exists.
    pub cursor: Option<u64>,
}

/// A voter's decoded ballot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Abstain => "abstain",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub choice: VoteChoice,
    pub timestamp: Timestamp,
}

/// Running tally of a proposal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyResult {
    pub yes: Weight,
    pub no: Weight,
    pub abstain: Weight,
    pub total_weight: Weight,
}

/// Everything derived from a proposal's transaction history.
///
/// Maps are `BTreeMap` so serialization is deterministic — the ended-
/// proposal freeze property is checked byte-for-byte.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingData {
    pub tx_data: TxHistory,
    pub voting_power: BTreeMap<Address, Weight>,
    pub votes: BTreeMap<Address, Ballot>,
    pub result: TallyResult,
}

/// Why a proposal's auxiliary data could not be fetched.
///
/// A recorded error permanently excludes the proposal from tally
/// computation; it stays visibly broken instead of silently stuck.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchError {
    NftHolders,
    ValidatorInfo,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NftHolders => "nft holder enumeration failed",
            Self::ValidatorInfo => "validator snapshot fetch failed",
        };
        write!(f, "{s}")
    }
}

/// A discovered proposal. Created on first discovery; never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub dao_address: Address,
    pub address: Address,
    pub metadata: ProposalMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voting_data: Option<VotingData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<FetchError>,
}

/// Holder address → indices of the collection items they own.
pub type NftHolderMap = BTreeMap<Address, Vec<u64>>;

/// Validator address → staked balance snapshot.
pub type ValidatorInfoMap = BTreeMap<Address, Weight>;
