//! Deterministic tally primitives.
//!
//! These are pure functions of their inputs: the same transaction history
//! and power map always produce the same votes and result. The sync
//! engine treats them as black boxes; chain-specific payload decoding
//! stays behind this boundary.

use std::collections::BTreeMap;

use tally_types::{Address, Ballot, ProposalMetadata, TallyResult, TxRecord, VoteChoice, Weight};

/// Decode a raw vote payload. Unknown payloads are not votes.
fn decode_choice(body: &str) -> Option<VoteChoice> {
    match body.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "1" => Some(VoteChoice::Yes),
        "no" | "n" | "0" => Some(VoteChoice::No),
        "abstain" => Some(VoteChoice::Abstain),
        _ => None,
    }
}

/// Derive the per-voter ballot map from a full transaction history.
///
/// `transactions` is newest-first (the stored layout); a voter's latest
/// in-window vote wins. Transactions outside the proposal's voting window
/// are ignored.
pub fn compute_votes(
    transactions: &[TxRecord],
    metadata: &ProposalMetadata,
) -> BTreeMap<Address, Ballot> {
    let mut votes = BTreeMap::new();
    // Walk oldest → newest so a later vote overwrites an earlier one.
    for tx in transactions.iter().rev() {
        if tx.timestamp < metadata.start_time || tx.timestamp >= metadata.end_time {
            continue;
        }
        let Some(choice) = decode_choice(&tx.body) else {
            continue;
        };
        votes.insert(
            tx.voter.clone(),
            Ballot {
                choice,
                timestamp: tx.timestamp,
            },
        );
    }
    votes
}

/// Sum ballots into a result using the per-voter power map.
///
/// Voters missing from the power map contribute zero weight.
pub fn compute_result(
    votes: &BTreeMap<Address, Ballot>,
    power: &BTreeMap<Address, Weight>,
) -> TallyResult {
    let mut result = TallyResult::default();
    for (voter, ballot) in votes {
        let weight = power.get(voter).copied().unwrap_or(Weight::ZERO);
        match ballot.choice {
            VoteChoice::Yes => result.yes += weight,
            VoteChoice::No => result.no += weight,
            VoteChoice::Abstain => result.abstain += weight,
        }
        result.total_weight += weight;
    }
    result
}
