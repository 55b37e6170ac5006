//! Property and scenario tests for the pooled ledger.
//!
//! Run with: cargo test --package coffer_ledger --test pool_properties

use std::collections::BTreeMap;

use coffer_ledger::{
    decode, encode, tier_limit, AccountId, AccountPool, ActionSource, Amount, ConversionGateway,
    DistributionEngine, ExtractScope, HostContext, ItemId, ItemPrice, ItemRequest, LedgerConfig,
    MemoryKnowledge, Mode, NullObserver, PoolService, PowerSource, PriceTable, StorageKey,
    MAX_OPERATIONS,
};
use num_bigint::BigUint;
use proptest::prelude::*;

const COBBLE: ItemId = 4;

/// Power source with a fixed budget.
struct Budget(u64);

impl PowerSource for Budget {
    fn probe(&self, max: u64) -> u64 {
        self.0.min(max)
    }

    fn commit(&mut self, amount: u64) {
        self.0 -= amount;
    }
}

fn pool_with(balances: &[u64]) -> AccountPool {
    let mut pool = AccountPool::new();
    for (i, &balance) in balances.iter().enumerate() {
        let id = AccountId(i as u64);
        pool.add(id);
        pool.set_balance(id, Amount::from(balance)).unwrap();
    }
    pool
}

fn balances(pool: &AccountPool) -> Vec<Amount> {
    pool.snapshot().iter().map(|a| a.balance().clone()).collect()
}

fn service(accounts: u64) -> PoolService {
    let config = LedgerConfig {
        shuffle_seed: Some(17),
        prices: vec![ItemPrice {
            item: COBBLE,
            sell: 1,
            buy: 1,
        }],
        ..LedgerConfig::default()
    };
    let mut service =
        PoolService::from_config(&config, Box::new(MemoryKnowledge::new()), Box::new(NullObserver));
    for id in 0..accounts {
        service.add_account(AccountId(id));
    }
    service
}

fn player(id: u64) -> ActionSource {
    ActionSource::Player {
        account: AccountId(id),
        at_terminal: true,
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_single_holder_covers_request() {
    let mut engine = DistributionEngine::seeded(1);
    let mut pool = pool_with(&[0, 5, 0]);

    let taken = engine
        .extract(&mut pool, 3, StorageKey::BASE, Mode::Modulate, ExtractScope::Pool)
        .unwrap();

    assert_eq!(taken, 3);
    let mut left = balances(&pool);
    left.sort();
    assert_eq!(left, vec![Amount::from(0u32), Amount::from(0u32), Amount::from(2u32)]);
}

#[test]
fn test_exhausted_share_is_redistributed() {
    for seed in 0..32 {
        let mut engine = DistributionEngine::seeded(seed);
        let mut pool = pool_with(&[2, 2, 2]);

        let taken = engine
            .extract(&mut pool, 5, StorageKey::BASE, Mode::Modulate, ExtractScope::Pool)
            .unwrap();

        assert_eq!(taken, 5, "seed {seed}");
        assert_eq!(pool.total(), Amount::from(1u32), "seed {seed}");
    }
}

#[test]
fn test_conversion_cap_ignores_power_surplus() {
    let mut service = service(3);
    let mut power = Budget(u64::MAX);

    let request = ItemRequest {
        item: COBBLE,
        amount: 1000,
        mode: Mode::Modulate,
        source: player(0),
    };

    let first = service.insert_item(request, true, &mut power);
    let second = service.insert_item(request, true, &mut power);

    assert_eq!(first, u64::from(MAX_OPERATIONS));
    assert_eq!(second, u64::from(MAX_OPERATIONS));
    assert_eq!(service.pool().total(), Amount::from(2 * MAX_OPERATIONS));
}

#[test]
fn test_insufficient_power_converts_nothing() {
    let prices: PriceTable = [ItemPrice {
        item: COBBLE,
        sell: 50,
        buy: 50,
    }]
    .into_iter()
    .collect();
    let gateway = ConversionGateway::new(Box::new(prices), Box::new(MemoryKnowledge::new()));
    let mut service =
        PoolService::new(DistributionEngine::seeded(2), gateway, Box::new(NullObserver));
    service.add_account(AccountId(0));

    let mut plenty = Budget(u64::MAX);
    let learn = ItemRequest {
        item: COBBLE,
        amount: 4,
        mode: Mode::Modulate,
        source: player(0),
    };
    assert_eq!(service.insert_item(learn, true, &mut plenty), 4);

    let dry_run = ItemRequest {
        mode: Mode::Simulate,
        ..learn
    };
    let mut weak = Budget(49);
    assert_eq!(service.insert_item(dry_run, false, &mut weak), 0);
    assert_eq!(service.insert_item(learn, false, &mut weak), 0);

    let stored: BTreeMap<ItemId, u64> = BTreeMap::new();
    let mut host = HostContext {
        power: &mut weak,
        stored: &stored,
    };
    assert_eq!(service.extract_item(dry_run, false, &mut host), 0);
    assert_eq!(service.extract_item(learn, false, &mut host), 0);
    assert_eq!(service.pool().total(), Amount::from(200u32));
}

#[test]
fn test_dry_run_conversion_predicts_commit() {
    let mut service = service(2);
    let mut seed_power = Budget(u64::MAX);
    let fill = ItemRequest {
        item: COBBLE,
        amount: 40,
        mode: Mode::Modulate,
        source: player(0),
    };
    assert_eq!(service.insert_item(fill, true, &mut seed_power), 40);

    let stored: BTreeMap<ItemId, u64> = BTreeMap::new();
    for budget in [0, 1, 7, 25, 60] {
        let commit = ItemRequest { amount: 30, ..fill };
        let dry_run = ItemRequest {
            mode: Mode::Simulate,
            ..commit
        };

        let mut power = Budget(budget);
        let predicted = service.insert_item(dry_run, false, &mut power);
        let inserted = service.insert_item(commit, false, &mut power);
        assert_eq!(predicted, inserted, "insert budget {budget}");

        let mut power = Budget(budget);
        let mut host = HostContext {
            power: &mut power,
            stored: &stored,
        };
        let predicted = service.extract_item(dry_run, false, &mut host);
        let extracted = service.extract_item(commit, false, &mut host);
        assert_eq!(predicted, extracted, "extract budget {budget}");
    }
}

#[test]
fn test_unpriced_item_is_rejected() {
    let mut service = service(1);
    let mut power = Budget(u64::MAX);
    let request = ItemRequest {
        item: 999,
        amount: 1,
        mode: Mode::Modulate,
        source: player(0),
    };
    assert_eq!(service.insert_item(request, true, &mut power), 0);
    assert!(service.known_items().is_empty());
}

#[test]
fn test_empty_pool_transfers_nothing() {
    let mut service = service(0);
    let mut power = Budget(u64::MAX);
    let stored: BTreeMap<ItemId, u64> = BTreeMap::new();
    let mut host = HostContext {
        power: &mut power,
        stored: &stored,
    };

    assert_eq!(service.insert(StorageKey::BASE, 10, Mode::Modulate), 0);
    assert_eq!(
        service.extract(StorageKey::BASE, 10, Mode::Modulate, ActionSource::Anonymous, &mut host),
        0
    );
}

#[test]
fn test_tier_two_insert_then_extract() {
    let mut service = service(4);
    let mut power = Budget(0);
    let stored: BTreeMap<ItemId, u64> = BTreeMap::new();
    let mut host = HostContext {
        power: &mut power,
        stored: &stored,
    };

    assert_eq!(service.insert(StorageKey::Tier(2), 3, Mode::Modulate), 3);
    assert_eq!(service.available_tiers().len(), 2);

    let taken = service.extract(
        StorageKey::Tier(2),
        2,
        Mode::Modulate,
        ActionSource::Anonymous,
        &mut host,
    );
    assert_eq!(taken, 2);
    assert_eq!(service.pool().total(), tier_limit());

    let base = service.extract(
        StorageKey::BASE,
        10,
        Mode::Modulate,
        ActionSource::Anonymous,
        &mut host,
    );
    assert_eq!(base, 10);
    assert_eq!(service.available_tiers().len(), 1);
}

// ============================================================================
// Properties
// ============================================================================

fn amount_strategy() -> impl Strategy<Value = BigUint> {
    prop::collection::vec(any::<u32>(), 0..12).prop_map(BigUint::new)
}

proptest! {
    #[test]
    fn prop_tier_round_trip(value in amount_strategy()) {
        let digits = encode(&value);
        prop_assert!(digits.iter().all(|d| d.magnitude < coffer_ledger::TIER_LIMIT));
        prop_assert_eq!(decode(&digits), value);
    }

    #[test]
    fn prop_conservation(
        start in prop::collection::vec(0u64..10_000, 1..12),
        ops in prop::collection::vec((any::<bool>(), 1u64..5_000), 1..24),
        seed in any::<u64>(),
    ) {
        let mut engine = DistributionEngine::seeded(seed);
        let mut pool = pool_with(&start);
        let mut expected = pool.total();

        for (is_insert, amount) in ops {
            if is_insert {
                engine.insert(&mut pool, amount, StorageKey::BASE, Mode::Modulate).unwrap();
                expected += amount;
            } else {
                let taken = engine
                    .extract(
                        &mut pool,
                        amount,
                        StorageKey::BASE,
                        Mode::Modulate,
                        ExtractScope::Pool,
                    )
                    .unwrap();
                prop_assert!(taken <= amount);
                expected -= taken;
            }
            prop_assert_eq!(pool.total(), expected.clone());
        }
    }

    #[test]
    fn prop_simulate_is_pure_and_predictive(
        start in prop::collection::vec(0u64..1_000, 1..10),
        amount in 1u64..5_000,
        seed in any::<u64>(),
    ) {
        let mut engine = DistributionEngine::seeded(seed);
        let mut pool = pool_with(&start);
        let before = balances(&pool);

        let simulated = engine
            .extract(&mut pool, amount, StorageKey::BASE, Mode::Simulate, ExtractScope::Pool)
            .unwrap();
        prop_assert_eq!(balances(&pool), before);
        prop_assert_eq!(pool.len(), start.len());

        let committed = engine
            .extract(&mut pool, amount, StorageKey::BASE, Mode::Modulate, ExtractScope::Pool)
            .unwrap();
        prop_assert_eq!(simulated, committed);

        let held: u64 = start.iter().sum();
        prop_assert_eq!(committed, amount.min(held));
    }

    #[test]
    fn prop_insert_splits_evenly(
        accounts in 1usize..16,
        amount in 1u64..1_000_000,
        seed in any::<u64>(),
    ) {
        let mut engine = DistributionEngine::seeded(seed);
        let mut pool = pool_with(&vec![0; accounts]);

        engine.insert(&mut pool, amount, StorageKey::BASE, Mode::Modulate).unwrap();

        let shares = balances(&pool);
        let low = shares.iter().min().cloned().unwrap_or_default();
        let high = shares.iter().max().cloned().unwrap_or_default();
        prop_assert!(high - low <= Amount::from(1u32));
        prop_assert_eq!(pool.total(), Amount::from(amount));
    }
}

#[test]
fn test_shipped_config_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("data/ledger.toml");
    let config = LedgerConfig::load(&path).unwrap();

    assert_eq!(config.max_operations, MAX_OPERATIONS);
    assert_eq!(config.prices.len(), 4);
    assert!(config.shuffle_seed.is_none());
}
