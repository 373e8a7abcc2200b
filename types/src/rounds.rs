//! Validator-committee round tracking state.
//!
//! Proposals with the [`StrategyKind::ValidatorVote`] strategy are decided
//! by an external round-based process: each round a validator set votes,
//! and the proposal passes or fails once enough rounds have gone one way.
//! The cache accumulates this state across polling cycles; round
//! boundaries are inferred from the most recently fetched snapshot only.
//!
//! [`StrategyKind::ValidatorVote`]: crate::proposal::StrategyKind::ValidatorVote

use crate::time::Timestamp;
use crate::weight::Weight;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a round, or of the whole proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Ongoing,
    Passed,
    Failed,
}

impl RoundStatus {
    /// Terminal statuses stop all further polling.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Ongoing)
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ongoing => "ongoing",
            Self::Passed => "passed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Detail of a single voting round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundDetail {
    /// Identifier of the validator set voting in this round.
    pub voting_set_id: String,
    /// Indices of validators that have voted so far.
    pub voter_list: Vec<String>,
    pub total_weight: Weight,
    /// Weight still needed for the round to pass; negative once reached.
    pub weight_remaining: Weight,
    pub cycle_start: Timestamp,
    pub cycle_end: Timestamp,
    pub total_validators: u32,
    pub main_validators: u32,
    pub status: RoundStatus,
}

/// Accumulated round state for one validator-vote proposal.
///
/// `rounds` grows only by appending a new round or overwriting the most
/// recent one; a closed round is never reopened. A terminal `status` is
/// final and suppresses all further polling for this proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundState {
    /// Hash identifying the proposal in the external voting process.
    pub phash: String,
    /// Whether the voted parameter is marked critical on chain.
    pub critical: bool,
    pub param_id: u32,
    pub param_value: String,
    pub rounds_remaining: u32,
    pub total_rounds: u32,
    pub wins: u32,
    pub min_wins: u32,
    pub losses: u32,
    pub max_losses: u32,
    pub status: RoundStatus,
    pub rounds: Vec<RoundDetail>,
}

impl RoundState {
    /// The most recent (current) round, if any round has been observed.
    pub fn current_round(&self) -> Option<&RoundDetail> {
        self.rounds.last()
    }

    /// Index of the round the external process is currently in.
    pub fn current_round_index(&self) -> i64 {
        i64::from(self.total_rounds) - i64::from(self.rounds_remaining)
    }
}
