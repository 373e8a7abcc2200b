//! Proposal lifecycle classification and the lifecycle partition.

use crate::address::Address;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Where a proposal currently sits in its voting window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStage {
    Pending,
    Active,
    Ended,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Ended => "ended",
        };
        write!(f, "{s}")
    }
}

/// Pure classifier: where does a voting window put a proposal at `now`?
pub fn stage_at(now: Timestamp, start: Timestamp, end: Timestamp) -> LifecycleStage {
    if now < start {
        LifecycleStage::Pending
    } else if now < end {
        LifecycleStage::Active
    } else {
        LifecycleStage::Ended
    }
}

/// A strict partition of known proposal addresses into lifecycle stages.
///
/// Transitions only move forward (`Pending → Active → Ended` or
/// `Pending → Ended`); `relocate` enforces this and `Ended` is terminal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSet {
    pub pending: BTreeSet<Address>,
    pub active: BTreeSet<Address>,
    pub ended: BTreeSet<Address>,
}

impl LifecycleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stage of an address, if known.
    pub fn stage_of(&self, address: &Address) -> Option<LifecycleStage> {
        if self.pending.contains(address) {
            Some(LifecycleStage::Pending)
        } else if self.active.contains(address) {
            Some(LifecycleStage::Active)
        } else if self.ended.contains(address) {
            Some(LifecycleStage::Ended)
        } else {
            None
        }
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.stage_of(address).is_some()
    }

    /// Insert a newly discovered address at a stage. Removes it from any
    /// other set first so the partition stays strict.
    pub fn insert(&mut self, address: Address, stage: LifecycleStage) {
        self.remove(&address);
        self.set_for_mut(stage).insert(address);
    }

    /// Move an address forward to `stage`. Backward moves are ignored
    /// (the partition never regresses) and `Ended` is terminal.
    pub fn relocate(&mut self, address: &Address, stage: LifecycleStage) {
        match self.stage_of(address) {
            None => {
                self.set_for_mut(stage).insert(address.clone());
            }
            Some(current) if stage > current => {
                self.remove(address);
                self.set_for_mut(stage).insert(address.clone());
            }
            Some(_) => {}
        }
    }

    fn remove(&mut self, address: &Address) {
        self.pending.remove(address);
        self.active.remove(address);
        self.ended.remove(address);
    }

    fn set_for_mut(&mut self, stage: LifecycleStage) -> &mut BTreeSet<Address> {
        match stage {
            LifecycleStage::Pending => &mut self.pending,
            LifecycleStage::Active => &mut self.active,
            LifecycleStage::Ended => &mut self.ended,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.active.len() + self.ended.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    #[test]
    fn classifier_boundaries() {
        // Window is [start, end): active at start, ended exactly at end.
        assert_eq!(stage_at(ts(5), ts(10), ts(20)), LifecycleStage::Pending);
        assert_eq!(stage_at(ts(10), ts(10), ts(20)), LifecycleStage::Active);
        assert_eq!(stage_at(ts(19), ts(10), ts(20)), LifecycleStage::Active);
        assert_eq!(stage_at(ts(20), ts(10), ts(20)), LifecycleStage::Ended);
        assert_eq!(stage_at(ts(99), ts(10), ts(20)), LifecycleStage::Ended);
    }

    #[test]
    fn partition_is_strict() {
        let mut set = LifecycleSet::new();
        let addr = Address::new("p1");
        set.insert(addr.clone(), LifecycleStage::Pending);
        set.insert(addr.clone(), LifecycleStage::Active);
        assert_eq!(set.len(), 1);
        assert_eq!(set.stage_of(&addr), Some(LifecycleStage::Active));
    }

    #[test]
    fn relocate_moves_only_forward() {
        let mut set = LifecycleSet::new();
        let addr = Address::new("p1");
        set.insert(addr.clone(), LifecycleStage::Active);

        set.relocate(&addr, LifecycleStage::Pending);
        assert_eq!(set.stage_of(&addr), Some(LifecycleStage::Active));

        set.relocate(&addr, LifecycleStage::Ended);
        assert_eq!(set.stage_of(&addr), Some(LifecycleStage::Ended));

        set.relocate(&addr, LifecycleStage::Active);
        assert_eq!(set.stage_of(&addr), Some(LifecycleStage::Ended));
    }

    #[test]
    fn pending_can_skip_straight_to_ended() {
        let mut set = LifecycleSet::new();
        let addr = Address::new("p1");
        set.insert(addr.clone(), LifecycleStage::Pending);
        set.relocate(&addr, LifecycleStage::Ended);
        assert_eq!(set.stage_of(&addr), Some(LifecycleStage::Ended));
        assert!(set.pending.is_empty() && set.active.is_empty());
    }

    #[test]
    fn relocate_unknown_address_inserts() {
        let mut set = LifecycleSet::new();
        let addr = Address::new("p1");
        set.relocate(&addr, LifecycleStage::Active);
        assert_eq!(set.stage_of(&addr), Some(LifecycleStage::Active));
    }
}
