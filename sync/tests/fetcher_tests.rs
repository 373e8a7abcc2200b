//! End-to-end cycle tests for the sync orchestrator, driven entirely
//! against nullable collaborators.

use std::sync::Arc;

use tally_chain::RoundSnapshot;
use tally_nullables::{NullChain, NullClock, NullStore};
use tally_sync::{Cache, CacheMetrics, Fetcher, Notifier, ServiceStatus, SyncConfig};
use tally_types::time::Clock;
use tally_types::{
    Address, LifecycleStage, MetadataArgs, ProposalMetadata, RoundStatus, StrategyArg,
    StrategyKind, Timestamp, TxRecord, VotingPowerStrategy, Weight,
};

struct Harness {
    chain: Arc<NullChain>,
    store: Arc<NullStore>,
    cache: Arc<Cache>,
    clock: Arc<NullClock>,
    fetcher: Fetcher<NullChain, NullStore>,
}

fn harness(now_secs: u64) -> Harness {
    let chain = Arc::new(NullChain::new());
    chain.set_registry(Address::new("EQRegistry"));
    let store = Arc::new(NullStore::new());
    let cache = Arc::new(Cache::new());
    let clock = Arc::new(NullClock::new(now_secs));

    let mut config = SyncConfig::default();
    config.retry_max_attempts = 2;
    config.retry_base_delay_ms = 0;
    config.retry_max_delay_ms = 0;

    let fetcher = Fetcher::new(
        Arc::clone(&chain),
        Arc::clone(&store),
        Arc::clone(&cache),
        clock.clone() as Arc<dyn Clock>,
        config,
        Arc::new(Notifier::disabled()),
        Arc::new(CacheMetrics::new()),
    );

    Harness {
        chain,
        store,
        cache,
        clock,
        fetcher,
    }
}

fn strategy(kind: StrategyKind, args: &[(&str, &str)]) -> VotingPowerStrategy {
    VotingPowerStrategy {
        kind,
        arguments: args
            .iter()
            .map(|(name, value)| StrategyArg {
                name: (*name).into(),
                value: (*value).into(),
            })
            .collect(),
    }
}

fn token_meta(id: u64, start: u64, end: u64) -> ProposalMetadata {
    ProposalMetadata {
        id,
        start_time: Timestamp::new(start),
        end_time: Timestamp::new(end),
        snapshot_block: 100,
        voting_power_strategies: vec![strategy(StrategyKind::TokenBalance, &[])],
    }
}

fn tx(voter: &str, lt: u64, at: u64, body: &str) -> TxRecord {
    TxRecord {
        voter: Address::new(voter),
        logical_time: lt,
        timestamp: Timestamp::new(at),
        body: body.into(),
    }
}

#[tokio::test]
async fn fresh_start_discovers_a_single_dao() {
    let h = harness(1_000);
    h.chain
        .add_dao(0, Address::new("EQDao0"), MetadataArgs::default());

    h.fetcher.init().await.unwrap();
    h.fetcher.run().await.unwrap();

    let catalog = h.cache.catalog().await;
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.next_dao_id, 1);
    assert!(catalog.get(&Address::new("EQDao0")).is_some());

    // The catalog was persisted because a DAO was actually added.
    assert_eq!(h.store.catalog_saves(), 1);

    // A cycle with nothing new must not rewrite the catalog.
    h.fetcher.run().await.unwrap();
    assert_eq!(h.store.catalog_saves(), 1);
    assert_eq!(h.cache.catalog().await.next_dao_id, 1);
}

#[tokio::test]
async fn dao_cursor_is_monotonic_across_cycles() {
    let h = harness(1_000);
    h.chain
        .add_dao(0, Address::new("EQDao0"), MetadataArgs::default());
    h.fetcher.init().await.unwrap();
    h.fetcher.run().await.unwrap();
    let after_first = h.cache.catalog().await.next_dao_id;

    h.chain
        .add_dao(5, Address::new("EQDao5"), MetadataArgs::default());
    h.fetcher.run().await.unwrap();
    let after_second = h.cache.catalog().await.next_dao_id;

    assert!(after_first <= after_second);
    assert_eq!(after_second, 6);
    assert_eq!(h.cache.dao_count().await, 2);
}

#[tokio::test]
async fn failed_dao_fetch_leaves_cursor_for_retry() {
    let h = harness(1_000);
    let good = Address::new("EQGood");
    let bad = Address::new("EQBad");
    h.chain.add_dao(0, good.clone(), MetadataArgs::default());
    h.chain.add_dao(1, bad.clone(), MetadataArgs::default());
    // Both attempts of the first cycle fail for the second DAO.
    h.chain.fail_dao_state(bad.clone(), 2);

    h.fetcher.init().await.unwrap();
    h.fetcher.run().await.unwrap();

    let catalog = h.cache.catalog().await;
    assert!(catalog.get(&good).is_some());
    assert!(catalog.get(&bad).is_none());
    // Cursor held back: the whole page is retried next cycle.
    assert_eq!(catalog.next_dao_id, 0);

    h.fetcher.run().await.unwrap();
    let catalog = h.cache.catalog().await;
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.next_dao_id, 2);
}

#[tokio::test]
async fn new_proposal_starts_pending_without_voting_data() {
    let h = harness(1_000);
    let dao = Address::new("EQDao0");
    let prop = Address::new("EQProp0");
    h.chain.add_dao(0, dao.clone(), MetadataArgs::default());
    // Voting opens in the future.
    h.chain
        .add_proposal(&dao, 0, prop.clone(), token_meta(0, 2_000, 3_000));

    h.fetcher.init().await.unwrap();
    h.fetcher.run().await.unwrap();

    let view = h.cache.proposal_view(&prop).await.unwrap();
    assert!(view.votes.is_empty());
    assert!(view.voting_power.is_empty());

    let lifecycle = h.cache.lifecycle().await;
    assert_eq!(lifecycle.stage_of(&prop), Some(LifecycleStage::Pending));

    let catalog = h.cache.catalog().await;
    assert_eq!(catalog.get(&dao).unwrap().next_proposal_cursor, 1);
    assert_eq!(catalog.get(&dao).unwrap().proposals, vec![prop]);
}

#[tokio::test]
async fn tally_refresh_is_idempotent_when_cursor_is_unchanged() {
    let h = harness(1_000);
    let dao = Address::new("EQDao0");
    let prop = Address::new("EQProp0");
    h.chain.add_dao(0, dao.clone(), MetadataArgs::default());
    h.chain
        .add_proposal(&dao, 0, prop.clone(), token_meta(0, 500, 5_000));
    h.chain.push_tx(&prop, tx("alice", 42, 600, "yes"));
    h.chain.set_token_power(Address::new("alice"), Weight::new(7));

    h.fetcher.init().await.unwrap();
    h.fetcher.run().await.unwrap();

    let first = h.cache.proposal_view(&prop).await.unwrap();
    assert_eq!(first.result.yes, Weight::new(7));
    assert_eq!(h.cache.max_lt(&prop).await, Some(42));
    let first_json = serde_json::to_string(&first).unwrap();

    // Nothing new on chain: the refresh must be a no-op apart from the
    // ledger stamp.
    h.fetcher.run().await.unwrap();
    let second = h.cache.proposal_view(&prop).await.unwrap();
    assert_eq!(serde_json::to_string(&second).unwrap(), first_json);
    assert!(h.cache.fetch_update_time(&prop).await.is_some());
}

#[tokio::test]
async fn ended_proposal_is_finalized_once_then_frozen() {
    let h = harness(1_000);
    let dao = Address::new("EQDao0");
    let prop = Address::new("EQProp0");
    h.chain.add_dao(0, dao.clone(), MetadataArgs::default());
    h.chain
        .add_proposal(&dao, 0, prop.clone(), token_meta(0, 500, 5_000));
    h.chain.push_tx(&prop, tx("alice", 42, 600, "yes"));

    h.fetcher.init().await.unwrap();
    h.fetcher.run().await.unwrap();
    assert_eq!(h.store.proposal_saves(), 0);

    // The voting window closes.
    h.clock.set(6_000);
    h.fetcher.run().await.unwrap();

    let lifecycle = h.cache.lifecycle().await;
    assert_eq!(lifecycle.stage_of(&prop), Some(LifecycleStage::Ended));

    // Finalization persisted the full record exactly once.
    assert_eq!(h.store.proposal_saves(), 1);
    let stored = h.store.load_proposal(&prop).unwrap().unwrap();
    assert!(stored.voting_data.is_some());
    let frozen = serde_json::to_string(&stored.voting_data).unwrap();

    // Late transactions must never thaw a finalized result.
    h.chain.push_tx(&prop, tx("mallory", 99, 6_500, "no"));
    h.fetcher.run().await.unwrap();
    h.fetcher.run().await.unwrap();

    let view = h.cache.proposal_view(&prop).await.unwrap();
    assert_eq!(view.result.yes, Weight::new(1));
    assert_eq!(view.result.no, Weight::ZERO);
    assert_eq!(h.store.proposal_saves(), 1);
    let still = h.store.load_proposal(&prop).unwrap().unwrap();
    assert_eq!(serde_json::to_string(&still.voting_data).unwrap(), frozen);
}

#[tokio::test]
async fn nft_strategy_backfills_holders_and_weights_votes() {
    let h = harness(1_000);
    let dao = Address::new("EQDao0");
    let prop = Address::new("EQProp0");
    let coll = Address::new("EQColl");
    h.chain.add_dao(0, dao.clone(), MetadataArgs::default());
    let meta = ProposalMetadata {
        id: 0,
        start_time: Timestamp::new(500),
        end_time: Timestamp::new(5_000),
        snapshot_block: 100,
        voting_power_strategies: vec![strategy(
            StrategyKind::NftCollection,
            &[("nft-address", "EQColl")],
        )],
    };
    h.chain.add_proposal(&dao, 0, prop.clone(), meta);
    // holder-1 owns items 0 and 2.
    h.chain.set_collection(
        coll.clone(),
        vec![
            Address::new("holder-1"),
            Address::new("holder-2"),
            Address::new("holder-1"),
        ],
    );
    h.chain.push_tx(&prop, tx("holder-1", 7, 600, "yes"));

    h.fetcher.init().await.unwrap();
    h.fetcher.run().await.unwrap();

    let holders = h.cache.nft_holders_for(&prop).await;
    assert_eq!(holders[&Address::new("holder-1")], vec![0, 2]);

    let view = h.cache.proposal_view(&prop).await.unwrap();
    assert_eq!(view.result.yes, Weight::new(2));
    assert!(view.fetch_error.is_none());
}

#[tokio::test]
async fn broken_collection_marks_proposal_and_skips_tally_forever() {
    let h = harness(1_000);
    let dao = Address::new("EQDao0");
    let prop = Address::new("EQProp0");
    h.chain.add_dao(0, dao.clone(), MetadataArgs::default());
    let meta = ProposalMetadata {
        id: 0,
        start_time: Timestamp::new(500),
        end_time: Timestamp::new(5_000),
        snapshot_block: 100,
        voting_power_strategies: vec![strategy(
            StrategyKind::NftCollection,
            &[("nft-address", "EQMissingColl")],
        )],
    };
    h.chain.add_proposal(&dao, 0, prop.clone(), meta);
    h.chain.push_tx(&prop, tx("voter", 7, 600, "yes"));

    h.fetcher.init().await.unwrap();
    h.fetcher.run().await.unwrap();
    h.fetcher.run().await.unwrap();

    let view = h.cache.proposal_view(&prop).await.unwrap();
    assert!(view.fetch_error.is_some());
    // Tally computation is permanently skipped for broken proposals.
    assert!(view.votes.is_empty());
    assert!(h.cache.max_lt(&prop).await.is_none());
}

#[tokio::test]
async fn validator_vote_rounds_accumulate_and_reach_a_terminal_outcome() {
    fn snapshot(rounds_remaining: u32, weight_remaining: i128, wins: u32) -> RoundSnapshot {
        RoundSnapshot {
            critical: false,
            param_id: 5,
            param_value: "0".into(),
            rounds_remaining,
            total_rounds: 6,
            min_wins: 2,
            max_losses: 3,
            wins,
            losses: 0,
            voting_set_id: "vset".into(),
            voter_list: Vec::new(),
            total_weight: Weight::new(1_000),
            weight_remaining: Weight::new(weight_remaining),
            cycle_start: Timestamp::new(900),
            cycle_end: Timestamp::new(1_900),
            total_validators: 320,
            main_validators: 100,
        }
    }

    let h = harness(1_000);
    let dao = Address::new("EQDao0");
    let prop = Address::new("EQProp0");
    h.chain.add_dao(0, dao.clone(), MetadataArgs::default());
    let meta = ProposalMetadata {
        id: 0,
        start_time: Timestamp::new(500),
        end_time: Timestamp::new(1_000_000),
        snapshot_block: 100,
        voting_power_strategies: vec![strategy(
            StrategyKind::ValidatorVote,
            &[("validators-proposal-hash", "ph-1")],
        )],
    };
    h.chain.add_proposal(&dao, 0, prop.clone(), meta);
    h.chain.push_round_snapshot("ph-1", snapshot(4, 500, 0));
    h.chain.push_round_snapshot("ph-1", snapshot(3, -20, 1));
    h.chain.push_round_snapshot("ph-1", snapshot(3, -5, 2));

    h.fetcher.init().await.unwrap();

    h.fetcher.run().await.unwrap();
    let rounds = h.cache.proposal_view(&prop).await.unwrap().rounds.unwrap();
    assert_eq!(rounds.rounds.len(), 1);
    assert_eq!(rounds.status, RoundStatus::Ongoing);

    // Remaining 4 → 3: round 0 closes, round 1 appended as ongoing.
    h.fetcher.run().await.unwrap();
    let rounds = h.cache.proposal_view(&prop).await.unwrap().rounds.unwrap();
    assert_eq!(rounds.rounds.len(), 2);
    assert_eq!(rounds.rounds[0].status, RoundStatus::Failed);
    assert_eq!(rounds.rounds[1].status, RoundStatus::Ongoing);

    // Second win reaches min_wins: terminal.
    h.fetcher.run().await.unwrap();
    let rounds = h.cache.proposal_view(&prop).await.unwrap().rounds.unwrap();
    assert_eq!(rounds.status, RoundStatus::Passed);
    let calls = h.chain.round_calls("ph-1");

    // Terminal proposals are never polled again.
    h.fetcher.run().await.unwrap();
    assert_eq!(h.chain.round_calls("ph-1"), calls);
}

#[tokio::test]
async fn warm_start_restores_catalog_and_keeps_stored_results_frozen() {
    let h = harness(10_000);
    let dao_addr = Address::new("EQDao0");
    let prop = Address::new("EQProp0");

    // Simulate state written by a previous process run.
    let mut catalog = tally_types::DaoCatalog::new();
    catalog.insert(tally_types::Dao {
        address: dao_addr.clone(),
        dao_id: 0,
        metadata: tally_types::DaoMetadata {
            metadata_address: Address::new("meta-EQDao0"),
            args: MetadataArgs::default(),
        },
        roles: tally_types::DaoRoles {
            owner: Address::new("owner"),
            proposal_owner: Address::new("powner"),
        },
        next_proposal_cursor: 1,
        proposals: vec![prop.clone()],
    });
    catalog.advance_cursor(1);
    h.store.seed_catalog(catalog);

    let mut ended = tally_types::Proposal {
        dao_address: dao_addr.clone(),
        address: prop.clone(),
        metadata: token_meta(0, 500, 5_000),
        voting_data: Some(tally_types::VotingData::default()),
        fetch_error: None,
    };
    ended.voting_data.as_mut().unwrap().tx_data.cursor = Some(42);
    h.store.seed_proposal(ended);

    h.fetcher.init().await.unwrap();

    // Warm cache before any cycle ran.
    assert_eq!(h.cache.dao_count().await, 1);
    assert!(h.cache.proposal_view(&prop).await.is_some());
    assert_eq!(
        h.cache.lifecycle().await.stage_of(&prop),
        Some(LifecycleStage::Ended)
    );

    h.fetcher.run().await.unwrap();

    // The stored result was never re-fetched or re-persisted.
    assert_eq!(h.store.proposal_saves(), 0);
    assert_eq!(h.cache.max_lt(&prop).await, Some(42));
    assert_eq!(h.cache.status().await, ServiceStatus::Ok);
}

#[tokio::test]
async fn cycle_fatal_error_degrades_status_but_keeps_serving_the_snapshot() {
    let h = harness(1_000);
    h.chain
        .add_dao(0, Address::new("EQDao0"), MetadataArgs::default());

    h.fetcher.init().await.unwrap();
    h.fetcher.run().await.unwrap();
    assert_eq!(h.cache.status().await, ServiceStatus::Ok);
    let update_time = h.cache.update_time().await;

    h.chain.fail_list_daos(1);
    assert!(h.fetcher.run().await.is_err());

    // Degraded, but the previous snapshot is still served untouched.
    assert_eq!(h.cache.status().await, ServiceStatus::Degraded);
    assert_eq!(h.cache.dao_count().await, 1);
    assert_eq!(h.cache.update_time().await, update_time);

    // The next cycle recovers on schedule.
    h.fetcher.run().await.unwrap();
    assert_eq!(h.cache.status().await, ServiceStatus::Ok);
}

#[tokio::test]
async fn restart_resumes_from_durable_state() {
    use tally_store_fs::FsStore;

    let dir = tempfile::tempdir().unwrap();
    let dao = Address::new("EQDao0");
    let prop = Address::new("EQProp0");

    let build = |chain: Arc<NullChain>, store: Arc<FsStore>, now: u64| {
        let cache = Arc::new(Cache::new());
        let clock = Arc::new(NullClock::new(now));
        let mut config = SyncConfig::default();
        config.retry_base_delay_ms = 0;
        config.retry_max_delay_ms = 0;
        let fetcher = Fetcher::new(
            chain,
            store,
            Arc::clone(&cache),
            clock as Arc<dyn Clock>,
            config,
            Arc::new(Notifier::disabled()),
            Arc::new(CacheMetrics::new()),
        );
        (cache, fetcher)
    };

    // First process run: discover, tally, finalize, persist.
    let frozen_result = {
        let chain = Arc::new(NullChain::new());
        chain.set_registry(Address::new("EQRegistry"));
        chain.add_dao(0, dao.clone(), MetadataArgs::default());
        chain.add_proposal(&dao, 0, prop.clone(), token_meta(0, 500, 5_000));
        chain.push_tx(&prop, tx("alice", 42, 600, "yes"));
        chain.set_token_power(Address::new("alice"), Weight::new(9));

        let store = Arc::new(FsStore::open(dir.path()).unwrap());
        let (cache, fetcher) = build(Arc::clone(&chain), store, 1_000);
        fetcher.init().await.unwrap();
        fetcher.run().await.unwrap();

        // End the window and finalize.
        let (cache, fetcher) = {
            let store = Arc::new(FsStore::open(dir.path()).unwrap());
            drop(cache);
            let (cache, fetcher) = build(Arc::clone(&chain), store, 6_000);
            fetcher.init().await.unwrap();
            (cache, fetcher)
        };
        fetcher.run().await.unwrap();
        cache.proposal_view(&prop).await.unwrap().result
    };
    assert_eq!(frozen_result.yes, Weight::new(9));

    // Second process run: an empty chain, state comes from disk alone.
    let chain = Arc::new(NullChain::new());
    chain.set_registry(Address::new("EQRegistry"));
    let store = Arc::new(FsStore::open(dir.path()).unwrap());
    let (cache, fetcher) = build(chain, store, 7_000);
    fetcher.init().await.unwrap();

    assert_eq!(cache.dao_count().await, 1);
    let view = cache.proposal_view(&prop).await.unwrap();
    assert_eq!(view.result, frozen_result);
    assert_eq!(
        cache.lifecycle().await.stage_of(&prop),
        Some(LifecycleStage::Ended)
    );

    fetcher.run().await.unwrap();
    assert_eq!(cache.status().await, ServiceStatus::Ok);
    assert_eq!(cache.proposal_view(&prop).await.unwrap().result, frozen_result);
}

#[tokio::test]
async fn missing_registry_fails_init() {
    let chain = Arc::new(NullChain::new());
    let store = Arc::new(NullStore::new());
    let cache = Arc::new(Cache::new());
    let clock = Arc::new(NullClock::new(0));
    let fetcher = Fetcher::new(
        chain,
        store,
        cache,
        clock as Arc<dyn Clock>,
        SyncConfig::default(),
        Arc::new(Notifier::disabled()),
        Arc::new(CacheMetrics::new()),
    );
    assert!(fetcher.init().await.is_err());
}
