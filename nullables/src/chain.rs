//! Nullable chain gateway — a fully scripted [`ChainClient`].
//!
//! Tests register DAOs, proposals, transactions, collections, and round
//! snapshots up front (or between cycles), and can inject per-item
//! failures to exercise retry and abort paths. All answers are
//! deterministic functions of the scripted state.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tally_chain::{
    ChainClient, ChainError, DaoPage, DaoState, NftItem, ProposalPage, RoundSnapshot, TxPage,
};
use tally_types::{
    Address, MetadataArgs, NftHolderMap, ProposalMetadata, StrategyKind, TxRecord,
    ValidatorInfoMap, Weight,
};

#[derive(Default)]
struct ChainState {
    registry: Option<Address>,
    /// (dao_id, address), kept sorted by id.
    daos: Vec<(u64, Address)>,
    dao_states: HashMap<Address, DaoState>,
    /// Keyed by metadata address.
    dao_metadata: HashMap<Address, MetadataArgs>,
    /// DAO address → (proposal id, proposal address), sorted by id.
    proposals: HashMap<Address, Vec<(u64, Address)>>,
    proposal_metadata: HashMap<Address, ProposalMetadata>,
    /// Full history per proposal, newest first.
    transactions: HashMap<Address, Vec<TxRecord>>,
    /// Scripted token-balance voting power per voter.
    token_power: HashMap<Address, Weight>,
    /// Collection address → owner of each item index.
    collections: HashMap<Address, Vec<Address>>,
    /// Remaining injected failures per (collection, item index).
    item_failures: HashMap<(Address, u64), u32>,
    /// Remaining injected failures per DAO state lookup.
    dao_state_failures: HashMap<Address, u32>,
    /// Remaining injected failures for registry enumeration.
    list_daos_failures: u32,
    /// Snapshot queue per proposal hash; the last entry repeats.
    round_snapshots: HashMap<String, VecDeque<RoundSnapshot>>,
    round_calls: HashMap<String, u64>,
    validators: ValidatorInfoMap,
}

/// A scripted in-memory chain gateway for tests.
pub struct NullChain {
    state: Mutex<ChainState>,
    item_owner_calls: AtomicU64,
}

impl NullChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState::default()),
            item_owner_calls: AtomicU64::new(0),
        }
    }

    pub fn set_registry(&self, address: Address) {
        self.state.lock().unwrap().registry = Some(address);
    }

    /// Register a DAO with its on-chain state and metadata.
    pub fn add_dao(&self, dao_id: u64, address: Address, args: MetadataArgs) {
        let metadata_address = Address::new(format!("meta-{address}"));
        let mut state = self.state.lock().unwrap();
        state.daos.push((dao_id, address.clone()));
        state.daos.sort_by_key(|(id, _)| *id);
        state.dao_states.insert(
            address.clone(),
            DaoState {
                dao_id,
                owner: Address::new(format!("owner-{address}")),
                proposal_owner: Address::new(format!("powner-{address}")),
                metadata_address: metadata_address.clone(),
            },
        );
        state.dao_metadata.insert(metadata_address, args);
    }

    /// Overwrite a DAO's on-chain state (drift simulation).
    pub fn set_dao_state(&self, address: Address, dao_state: DaoState, args: MetadataArgs) {
        let mut state = self.state.lock().unwrap();
        state
            .dao_metadata
            .insert(dao_state.metadata_address.clone(), args);
        state.dao_states.insert(address, dao_state);
    }

    pub fn add_proposal(&self, dao: &Address, id: u64, address: Address, meta: ProposalMetadata) {
        let mut state = self.state.lock().unwrap();
        let list = state.proposals.entry(dao.clone()).or_default();
        list.push((id, address.clone()));
        list.sort_by_key(|(id, _)| *id);
        state.proposal_metadata.insert(address, meta);
    }

    pub fn set_proposal_metadata(&self, address: Address, meta: ProposalMetadata) {
        self.state
            .lock()
            .unwrap()
            .proposal_metadata
            .insert(address, meta);
    }

    /// Append a transaction to a proposal's history.
    pub fn push_tx(&self, proposal: &Address, tx: TxRecord) {
        let mut state = self.state.lock().unwrap();
        let txs = state.transactions.entry(proposal.clone()).or_default();
        txs.insert(0, tx);
        txs.sort_by(|a, b| b.logical_time.cmp(&a.logical_time));
    }

    pub fn set_token_power(&self, voter: Address, power: Weight) {
        self.state.lock().unwrap().token_power.insert(voter, power);
    }

    /// Define a collection: `owners[i]` owns item `i`.
    pub fn set_collection(&self, collection: Address, owners: Vec<Address>) {
        self.state
            .lock()
            .unwrap()
            .collections
            .insert(collection, owners);
    }

    /// Make the next `times` owner lookups for one item fail.
    pub fn fail_item(&self, collection: Address, index: u64, times: u32) {
        self.state
            .lock()
            .unwrap()
            .item_failures
            .insert((collection, index), times);
    }

    /// Make the next `times` registry enumerations fail.
    pub fn fail_list_daos(&self, times: u32) {
        self.state.lock().unwrap().list_daos_failures = times;
    }

    /// Make the next `times` DAO state lookups for one address fail.
    pub fn fail_dao_state(&self, address: Address, times: u32) {
        self.state
            .lock()
            .unwrap()
            .dao_state_failures
            .insert(address, times);
    }

    pub fn push_round_snapshot(&self, phash: &str, snapshot: RoundSnapshot) {
        self.state
            .lock()
            .unwrap()
            .round_snapshots
            .entry(phash.to_string())
            .or_default()
            .push_back(snapshot);
    }

    pub fn set_validators(&self, validators: ValidatorInfoMap) {
        self.state.lock().unwrap().validators = validators;
    }

    /// Total `nft_item_owner` calls, including failed attempts.
    pub fn item_owner_calls(&self) -> u64 {
        self.item_owner_calls.load(Ordering::SeqCst)
    }

    /// How many round snapshots have been served for `phash`.
    pub fn round_calls(&self, phash: &str) -> u64 {
        self.state
            .lock()
            .unwrap()
            .round_calls
            .get(phash)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for NullChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for NullChain {
    async fn get_registry(&self) -> Result<Address, ChainError> {
        self.state
            .lock()
            .unwrap()
            .registry
            .clone()
            .ok_or(ChainError::RegistryMissing)
    }

    async fn list_daos(&self, cursor: u64, limit: u32) -> Result<DaoPage, ChainError> {
        let mut state = self.state.lock().unwrap();
        if state.list_daos_failures > 0 {
            state.list_daos_failures -= 1;
            return Err(ChainError::Http("injected registry failure".into()));
        }
        let state = &*state;
        let page: Vec<(u64, Address)> = state
            .daos
            .iter()
            .filter(|(id, _)| *id >= cursor)
            .take(limit as usize)
            .cloned()
            .collect();
        let end_cursor = page.last().map(|(id, _)| id + 1).unwrap_or(cursor);
        Ok(DaoPage {
            addresses: page.into_iter().map(|(_, addr)| addr).collect(),
            end_cursor,
        })
    }

    async fn get_dao_state(&self, address: &Address) -> Result<DaoState, ChainError> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.dao_state_failures.get_mut(address) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ChainError::Http("injected dao state failure".into()));
            }
        }
        state
            .dao_states
            .get(address)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(address.to_string()))
    }

    async fn get_dao_metadata(
        &self,
        metadata_address: &Address,
    ) -> Result<MetadataArgs, ChainError> {
        self.state
            .lock()
            .unwrap()
            .dao_metadata
            .get(metadata_address)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(metadata_address.to_string()))
    }

    async fn list_proposals(
        &self,
        dao: &Address,
        cursor: u64,
        limit: u32,
    ) -> Result<ProposalPage, ChainError> {
        let state = self.state.lock().unwrap();
        let page: Vec<(u64, Address)> = state
            .proposals
            .get(dao)
            .map(|list| {
                list.iter()
                    .filter(|(id, _)| *id >= cursor)
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let end_cursor = page.last().map(|(id, _)| id + 1).unwrap_or(cursor);
        Ok(ProposalPage {
            addresses: page.into_iter().map(|(_, addr)| addr).collect(),
            end_cursor,
        })
    }

    async fn get_proposal_metadata(
        &self,
        address: &Address,
    ) -> Result<ProposalMetadata, ChainError> {
        self.state
            .lock()
            .unwrap()
            .proposal_metadata
            .get(address)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(address.to_string()))
    }

    async fn transactions_since(
        &self,
        address: &Address,
        cursor: Option<u64>,
    ) -> Result<TxPage, ChainError> {
        let state = self.state.lock().unwrap();
        let all = state.transactions.get(address);
        let newest = all.and_then(|txs| txs.first().map(|tx| tx.logical_time));
        let fresh: Vec<TxRecord> = all
            .map(|txs| {
                txs.iter()
                    .filter(|tx| cursor.map_or(true, |c| tx.logical_time > c))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(TxPage {
            transactions: fresh,
            cursor: newest.or(cursor),
        })
    }

    async fn get_voting_power(
        &self,
        _metadata: &ProposalMetadata,
        transactions: &[TxRecord],
        prior: &std::collections::BTreeMap<Address, Weight>,
        kind: StrategyKind,
        nft_holders: Option<&NftHolderMap>,
        validator_info: Option<&ValidatorInfoMap>,
    ) -> Result<std::collections::BTreeMap<Address, Weight>, ChainError> {
        let state = self.state.lock().unwrap();
        let mut power = prior.clone();
        for tx in transactions {
            let weight = match kind {
                StrategyKind::TokenBalance => state
                    .token_power
                    .get(&tx.voter)
                    .copied()
                    .unwrap_or(Weight::new(1)),
                StrategyKind::NftCollection => nft_holders
                    .and_then(|h| h.get(&tx.voter))
                    .map(|items| Weight::new(items.len() as i128))
                    .unwrap_or(Weight::ZERO),
                StrategyKind::NftCollectionSingleVote => {
                    if nft_holders.is_some_and(|h| h.contains_key(&tx.voter)) {
                        Weight::new(1)
                    } else {
                        Weight::ZERO
                    }
                }
                StrategyKind::ValidatorBalance => validator_info
                    .and_then(|v| v.get(&tx.voter))
                    .copied()
                    .unwrap_or(Weight::ZERO),
                StrategyKind::ValidatorVote => Weight::ZERO,
            };
            power.insert(tx.voter.clone(), weight);
        }
        Ok(power)
    }

    async fn collection_size(&self, collection: &Address) -> Result<u64, ChainError> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .map(|owners| owners.len() as u64)
            .ok_or_else(|| ChainError::NotFound(collection.to_string()))
    }

    async fn nft_item_owner(
        &self,
        collection: &Address,
        index: u64,
    ) -> Result<NftItem, ChainError> {
        self.item_owner_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.item_failures.get_mut(&(collection.clone(), index)) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ChainError::Http("injected item lookup failure".into()));
            }
        }
        state
            .collections
            .get(collection)
            .and_then(|owners| owners.get(index as usize))
            .map(|owner| NftItem {
                item_address: Address::new(format!("{collection}-item-{index}")),
                owner: owner.clone(),
            })
            .ok_or_else(|| ChainError::NotFound(format!("{collection}#{index}")))
    }

    async fn round_snapshot(&self, phash: &str) -> Result<RoundSnapshot, ChainError> {
        let mut state = self.state.lock().unwrap();
        *state.round_calls.entry(phash.to_string()).or_default() += 1;
        let queue = state
            .round_snapshots
            .get_mut(phash)
            .ok_or_else(|| ChainError::NotFound(phash.to_string()))?;
        if queue.len() > 1 {
            Ok(queue.pop_front().expect("non-empty queue"))
        } else {
            queue
                .front()
                .cloned()
                .ok_or_else(|| ChainError::NotFound(phash.to_string()))
        }
    }

    async fn operating_validators(&self) -> Result<ValidatorInfoMap, ChainError> {
        Ok(self.state.lock().unwrap().validators.clone())
    }
}
