//! Validator-committee round accumulation.
//!
//! Validator-vote proposals are decided by an external round-based
//! process the cache can only poll. Round boundaries are never pushed to
//! us: they are inferred by comparing the freshly fetched snapshot
//! against the rounds recorded so far, using the most recent data only.

use tally_chain::{ChainClient, RoundSnapshot};
use tally_types::{RoundDetail, RoundState, RoundStatus};

use crate::error::SyncError;

/// Stateless merge logic for round snapshots. All state lives in the
/// caller's [`RoundState`]; the tracker only folds new observations in.
pub struct RoundTracker;

impl RoundTracker {
    /// Poll the external process for `phash` and fold the result into
    /// `existing`. Terminal state short-circuits without a network call.
    pub async fn poll<C: ChainClient>(
        chain: &C,
        existing: Option<RoundState>,
        phash: &str,
    ) -> Result<RoundState, SyncError> {
        if let Some(state) = existing.as_ref().filter(|s| s.status.is_terminal()) {
            tracing::debug!(phash, status = %state.status, "round tracking already final");
            return Ok(state.clone());
        }
        let snapshot = chain.round_snapshot(phash).await?;
        Ok(Self::observe(existing, phash, &snapshot))
    }

    /// Merge one freshly fetched snapshot into the accumulated state.
    ///
    /// - First observation initializes the state from the snapshot's
    ///   static voting parameters, status `Ongoing`.
    /// - A round index beyond the recorded rounds closes the previous
    ///   round (`Passed` iff its remaining weight went negative) and
    ///   appends the new round as `Ongoing`.
    /// - Otherwise the current round's detail is overwritten in place.
    /// - `wins`/`losses` are always refreshed, and the proposal-level
    ///   status becomes terminal once either threshold is reached.
    pub fn observe(
        existing: Option<RoundState>,
        phash: &str,
        snapshot: &RoundSnapshot,
    ) -> RoundState {
        let mut state = existing.unwrap_or_else(|| RoundState {
            phash: phash.to_string(),
            critical: snapshot.critical,
            param_id: snapshot.param_id,
            param_value: snapshot.param_value.clone(),
            rounds_remaining: snapshot.rounds_remaining,
            total_rounds: snapshot.total_rounds,
            wins: snapshot.wins,
            min_wins: snapshot.min_wins,
            losses: snapshot.losses,
            max_losses: snapshot.max_losses,
            status: RoundStatus::Ongoing,
            rounds: Vec::new(),
        });

        if state.status.is_terminal() {
            return state;
        }

        let current_round =
            i64::from(state.total_rounds) - i64::from(snapshot.rounds_remaining);
        if current_round < 0 {
            tracing::error!(
                phash,
                current_round,
                rounds_remaining = snapshot.rounds_remaining,
                total_rounds = state.total_rounds,
                "unexpected negative round index, ignoring snapshot"
            );
            return state;
        }

        let detail = RoundDetail {
            voting_set_id: snapshot.voting_set_id.clone(),
            voter_list: snapshot.voter_list.clone(),
            total_weight: snapshot.total_weight,
            weight_remaining: snapshot.weight_remaining,
            cycle_start: snapshot.cycle_start,
            cycle_end: snapshot.cycle_end,
            total_validators: snapshot.total_validators,
            main_validators: snapshot.main_validators,
            status: RoundStatus::Ongoing,
        };

        if current_round as usize >= state.rounds.len() {
            // A new round started: close the previous one before
            // appending. The pass/fail of a finished round is read off
            // its last observed remaining weight.
            if let Some(previous) = state.rounds.last_mut() {
                previous.status = if previous.weight_remaining.is_negative() {
                    RoundStatus::Passed
                } else {
                    RoundStatus::Failed
                };
                tracing::info!(
                    phash,
                    round = state.rounds.len() - 1,
                    status = %previous.status,
                    "validator round closed"
                );
            }
            state.rounds.push(detail);
            state.rounds_remaining = snapshot.rounds_remaining;
        } else {
            // Still inside the current round: the remaining weight and
            // voter list change continuously.
            let index = state.rounds.len() - 1;
            state.rounds[index] = detail;
        }

        state.wins = snapshot.wins;
        state.losses = snapshot.losses;

        if state.wins >= state.min_wins {
            state.status = RoundStatus::Passed;
        } else if state.losses >= state.max_losses {
            state.status = RoundStatus::Failed;
        }
        if state.status.is_terminal() {
            tracing::info!(phash, status = %state.status, "validator voting reached final outcome");
        }

        state
    }
}
