//! Fundamental types for the tally DAO-vote cache.
//!
//! Everything the sync engine, the durable store, and the query API agree
//! on lives here: addresses and timestamps, the big-number `Weight` used
//! for voting power, the DAO catalog, proposals and their voting data,
//! the proposal lifecycle partition, validator round tracking, and the
//! scan checkpoint used by resumable collection enumeration.

pub mod address;
pub mod checkpoint;
pub mod dao;
pub mod lifecycle;
pub mod proposal;
pub mod rounds;
pub mod time;
pub mod weight;

pub use address::Address;
pub use checkpoint::ScanCheckpoint;
pub use dao::{Dao, DaoCatalog, DaoMetadata, DaoRoles, MetadataArgs};
pub use lifecycle::{stage_at, LifecycleSet, LifecycleStage};
pub use proposal::{
    Ballot, FetchError, NftHolderMap, Proposal, ProposalMetadata, StrategyArg, StrategyKind,
    TallyResult, TxHistory, TxRecord, ValidatorInfoMap, VoteChoice, VotingData,
    VotingPowerStrategy,
};
pub use rounds::{RoundDetail, RoundState, RoundStatus};
pub use time::Timestamp;
pub use weight::Weight;
