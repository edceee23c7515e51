use anyhow::{Context, Result, anyhow};
use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use zalift_account::{ADDRESS_LEN, Address};
use zalift_fhe::{Grant, Handle};

use crate::campaign::CampaignState;
use crate::chain::ChainMeta;
use crate::execution::StateDiff;
use crate::storage::StateStore;

const CF_BALANCES: &str = "balances";
const CF_CAMPAIGNS: &str = "campaigns";
const CF_REGISTRY: &str = "registry";
const CF_ACL: &str = "acl";
const CF_META: &str = "meta";

const META_CHAIN_KEY: &[u8] = b"chain";
const META_REGISTRY_LEN_KEY: &[u8] = b"registry_len";

/// A thread-safe wrapper around RocksDB.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    /// Opens the database at the specified path, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = vec![
            ColumnFamilyDescriptor::new(CF_BALANCES, Options::default()),
            ColumnFamilyDescriptor::new(CF_CAMPAIGNS, Options::default()),
            ColumnFamilyDescriptor::new(CF_REGISTRY, Options::default()),
            ColumnFamilyDescriptor::new(CF_ACL, Options::default()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, families)
            .map_err(|e| anyhow!("Failed to open RocksDB: {}", e))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .with_context(|| format!("{} CF missing", name))
    }
}

impl StateStore for RocksDbStore {
    fn balance(&self, account: &Address) -> Result<Handle> {
        let cf = self.cf(CF_BALANCES)?;
        match self.db.get_cf(cf, account.0)? {
            Some(bytes) => {
                let handle: [u8; 32] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| anyhow!("corrupt balance entry for {}", account))?;
                Ok(Handle(handle))
            }
            // Accounts never written hold the uninitialized handle
            None => Ok(Handle::ZERO),
        }
    }

    fn campaign(&self, address: &Address) -> Result<Option<CampaignState>> {
        let cf = self.cf(CF_CAMPAIGNS)?;
        match self.db.get_cf(cf, address.0)? {
            Some(bytes) => {
                let state = serde_json::from_slice(&bytes)
                    .with_context(|| format!("corrupt campaign record {}", address))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    fn registry_len(&self) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        match self.db.get_cf(cf, META_REGISTRY_LEN_KEY)? {
            Some(bytes) => {
                let len: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| anyhow!("corrupt registry length"))?;
                Ok(u64::from_be_bytes(len))
            }
            None => Ok(0),
        }
    }

    fn registry_at(&self, index: u64) -> Result<Option<Address>> {
        let cf = self.cf(CF_REGISTRY)?;
        match self.db.get_cf(cf, index.to_be_bytes())? {
            Some(bytes) => {
                let addr: [u8; ADDRESS_LEN] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| anyhow!("corrupt registry entry {}", index))?;
                Ok(Some(Address(addr)))
            }
            None => Ok(None),
        }
    }

    fn is_granted(&self, grant: &Grant) -> Result<bool> {
        let cf = self.cf(CF_ACL)?;
        Ok(self.db.get_cf(cf, grant.key())?.is_some())
    }

    fn chain_meta(&self) -> Result<Option<ChainMeta>> {
        let cf = self.cf(CF_META)?;
        match self.db.get_cf(cf, META_CHAIN_KEY)? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).context("corrupt chain metadata")?,
            )),
            None => Ok(None),
        }
    }

    /// Atomically apply a unit's writes as one WriteBatch
    fn apply(&self, diff: StateDiff) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_balances = self.cf(CF_BALANCES)?;
        let cf_campaigns = self.cf(CF_CAMPAIGNS)?;
        let cf_registry = self.cf(CF_REGISTRY)?;
        let cf_acl = self.cf(CF_ACL)?;
        let cf_meta = self.cf(CF_META)?;

        for (account, handle) in &diff.balances {
            batch.put_cf(cf_balances, account.0, handle.0);
        }

        for (address, state) in &diff.campaigns {
            let bytes = serde_json::to_vec(state)?;
            batch.put_cf(cf_campaigns, address.0, bytes);
        }

        if !diff.registry.is_empty() {
            let mut len = self.registry_len()?;
            for (index, address) in &diff.registry {
                if *index != len {
                    return Err(anyhow!(
                        "registry append at {} but length is {}",
                        index,
                        len
                    ));
                }
                batch.put_cf(cf_registry, index.to_be_bytes(), address.0);
                len += 1;
            }
            batch.put_cf(cf_meta, META_REGISTRY_LEN_KEY, len.to_be_bytes());
        }

        for grant in &diff.grants {
            batch.put_cf(cf_acl, grant.key(), b"");
        }

        if let Some(meta) = &diff.meta {
            batch.put_cf(cf_meta, META_CHAIN_KEY, serde_json::to_vec(meta)?);
        }

        self.db.write(batch)?;
        Ok(())
    }
}
