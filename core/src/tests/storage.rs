use std::sync::Arc;

use tempfile::TempDir;
use zalift_account::Address;
use zalift_config::{DatabaseConfig, StoreBackend, ZaliftConfig};
use zalift_fhe::{Decryptor, Grant, Handle, MockFhe};
use zalift_keypair::Keypair;

use super::{DAY, GENESIS_TIME, init_logger};
use crate::campaign::CampaignState;
use crate::chain::Chain;
use crate::clock::ManualClock;
use crate::execution::StateDiff;
use crate::storage::{AnyStore, MemStore, RocksDbStore, StateStore};

fn create_test_db() -> (TempDir, RocksDbStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = RocksDbStore::open(temp_dir.path()).unwrap();
    (temp_dir, store)
}

fn addr(b: u8) -> Address {
    Address([b; 20])
}

fn sample_diff() -> StateDiff {
    let handle = Handle([7u8; 32]);
    let mut diff = StateDiff::default();
    diff.balances.insert(addr(1), handle);
    diff.campaigns.insert(
        addr(2),
        CampaignState::new(addr(2), addr(1), "Demo".into(), 10, GENESIS_TIME + DAY, GENESIS_TIME),
    );
    diff.registry.push((0, addr(2)));
    diff.grants.insert(Grant::account(handle, addr(1)));
    diff.grants.insert(Grant::public(handle));
    diff
}

fn check_sample(store: &dyn StateStore) {
    let handle = Handle([7u8; 32]);
    assert_eq!(store.balance(&addr(1)).unwrap(), handle);
    assert_eq!(store.balance(&addr(9)).unwrap(), Handle::ZERO);

    let campaign = store.campaign(&addr(2)).unwrap().unwrap();
    assert_eq!(campaign.creator, addr(1));
    assert_eq!(campaign.name, "Demo");
    assert!(store.campaign(&addr(3)).unwrap().is_none());

    assert_eq!(store.registry_len().unwrap(), 1);
    assert_eq!(store.registry_at(0).unwrap(), Some(addr(2)));
    assert_eq!(store.registry_at(1).unwrap(), None);

    assert!(store.is_granted(&Grant::account(handle, addr(1))).unwrap());
    assert!(store.is_granted(&Grant::public(handle)).unwrap());
    assert!(!store.is_granted(&Grant::account(handle, addr(9))).unwrap());
}

#[test]
fn rocksdb_applies_and_reads_back_a_diff() {
    let (_dir, store) = create_test_db();
    assert!(store.chain_meta().unwrap().is_none());
    assert_eq!(store.registry_len().unwrap(), 0);

    store.apply(sample_diff()).unwrap();
    check_sample(&store);
}

#[test]
fn memory_store_matches_rocksdb() {
    let store = MemStore::new();
    store.apply(sample_diff()).unwrap();
    check_sample(&store);
}

#[test]
fn stale_registry_append_writes_nothing() {
    let (_dir, rocks) = create_test_db();
    let mem = MemStore::new();

    for store in [&rocks as &dyn StateStore, &mem as &dyn StateStore] {
        store.apply(sample_diff()).unwrap();

        // Index 0 is taken; a diff computed against the old length must fail
        let mut stale = StateDiff::default();
        stale.balances.insert(addr(5), Handle([5u8; 32]));
        stale.registry.push((0, addr(6)));
        assert!(store.apply(stale).is_err());

        assert_eq!(store.balance(&addr(5)).unwrap(), Handle::ZERO);
        assert_eq!(store.registry_len().unwrap(), 1);
        assert_eq!(store.registry_at(0).unwrap(), Some(addr(2)));

        let mut next = StateDiff::default();
        next.registry.push((1, addr(6)));
        store.apply(next).unwrap();
        assert_eq!(store.registry_len().unwrap(), 2);
    }
}

#[test]
fn chain_reopens_from_rocksdb() {
    init_logger();
    let temp_dir = TempDir::new().unwrap();
    let config = ZaliftConfig::default();
    let fhe = Arc::new(MockFhe::new(config.chain.chain_id));
    let clock = ManualClock::new(GENESIS_TIME);
    let deployer = Keypair::from_seed(&[1u8; 32]).address();
    let alice = addr(30);

    let (campaign, meta) = {
        let store = Arc::new(RocksDbStore::open(temp_dir.path()).unwrap());
        let mut chain =
            Chain::genesis(store, fhe.clone(), Arc::new(clock.clone()), deployer, &config)
                .unwrap();
        chain.mint(deployer, alice, 1_234).unwrap();
        let (campaign, _) = chain
            .create_campaign(deployer, "Persisted", 99, GENESIS_TIME + DAY)
            .unwrap();
        (campaign, chain.meta().clone())
    };
    assert_eq!(meta.height, 2);

    let store = Arc::new(RocksDbStore::open(temp_dir.path()).unwrap());
    let chain = Chain::open(store, fhe.clone(), Arc::new(clock)).unwrap();
    assert_eq!(chain.meta(), &meta);
    assert_eq!(chain.campaign_count().unwrap(), 1);
    assert_eq!(chain.campaign_at(0).unwrap(), campaign);
    assert_eq!(chain.campaign(&campaign).unwrap().target_amount(), 99);

    let balance = chain.confidential_balance_of(&alice).unwrap();
    assert_eq!(fhe.decrypt(&balance).unwrap(), 1_234);
    assert!(chain
        .store()
        .is_granted(&Grant::account(balance, alice))
        .unwrap());
}

#[test]
fn genesis_refuses_a_deployed_store() {
    init_logger();
    let config = ZaliftConfig::default();
    let store = Arc::new(MemStore::new());
    let fhe = Arc::new(MockFhe::new(config.chain.chain_id));
    let clock = Arc::new(ManualClock::new(GENESIS_TIME));
    let deployer = addr(1);

    Chain::genesis(store.clone(), fhe.clone(), clock.clone(), deployer, &config).unwrap();
    assert!(Chain::genesis(store, fhe, clock, deployer, &config).is_err());
}

#[test]
fn open_requires_genesis() {
    let store = Arc::new(MemStore::new());
    let fhe = Arc::new(MockFhe::new(1));
    let clock = Arc::new(ManualClock::new(GENESIS_TIME));
    assert!(Chain::open(store, fhe, clock).is_err());
}

#[test]
fn any_store_follows_configured_backend() {
    let temp_dir = TempDir::new().unwrap();

    let memory = AnyStore::from_config(&DatabaseConfig {
        path: String::new(),
        backend: StoreBackend::Memory,
    })
    .unwrap();
    assert!(matches!(memory, AnyStore::Memory(_)));

    let rocks = AnyStore::from_config(&DatabaseConfig {
        path: temp_dir.path().join("state").to_string_lossy().into_owned(),
        backend: StoreBackend::Rocksdb,
    })
    .unwrap();
    assert!(matches!(rocks, AnyStore::RocksDb(_)));

    rocks.apply(sample_diff()).unwrap();
    check_sample(&rocks);
}
