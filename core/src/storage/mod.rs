pub mod db;
pub mod memory;
pub mod state;

pub use db::RocksDbStore;
pub use memory::MemStore;
pub use state::StateStore;

use anyhow::Result;
use log::info;
use zalift_account::Address;
use zalift_config::{DatabaseConfig, StoreBackend};
use zalift_fhe::{Grant, Handle};

use crate::campaign::CampaignState;
use crate::chain::ChainMeta;
use crate::execution::StateDiff;

/// Store picked by `[database] backend`.
pub enum AnyStore {
    Memory(MemStore),
    RocksDb(RocksDbStore),
}

impl AnyStore {
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        match config.backend {
            StoreBackend::Memory => {
                info!("Using in-memory state store");
                Ok(Self::Memory(MemStore::new()))
            }
            StoreBackend::Rocksdb => {
                info!("Opening RocksDB state store at {}", config.path);
                Ok(Self::RocksDb(RocksDbStore::open(&config.path)?))
            }
        }
    }

    fn inner(&self) -> &dyn StateStore {
        match self {
            Self::Memory(store) => store,
            Self::RocksDb(store) => store,
        }
    }
}

impl StateStore for AnyStore {
    fn balance(&self, account: &Address) -> Result<Handle> {
        self.inner().balance(account)
    }

    fn campaign(&self, address: &Address) -> Result<Option<CampaignState>> {
        self.inner().campaign(address)
    }

    fn registry_len(&self) -> Result<u64> {
        self.inner().registry_len()
    }

    fn registry_at(&self, index: u64) -> Result<Option<Address>> {
        self.inner().registry_at(index)
    }

    fn is_granted(&self, grant: &Grant) -> Result<bool> {
        self.inner().is_granted(grant)
    }

    fn chain_meta(&self) -> Result<Option<ChainMeta>> {
        self.inner().chain_meta()
    }

    fn apply(&self, diff: StateDiff) -> Result<()> {
        self.inner().apply(diff)
    }
}
