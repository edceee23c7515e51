use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard};

use anyhow::{Result, anyhow};
use zalift_account::Address;
use zalift_fhe::{Grant, Handle};

use crate::campaign::CampaignState;
use crate::chain::ChainMeta;
use crate::execution::StateDiff;
use crate::storage::StateStore;

#[derive(Default)]
struct Tables {
    balances: HashMap<Address, Handle>,
    campaigns: HashMap<Address, CampaignState>,
    registry: Vec<Address>,
    acl: HashSet<Grant>,
    meta: Option<ChainMeta>,
}

/// In-process state store.
/// A single lock around all tables makes a committed diff visible at once.
#[derive(Default)]
pub struct MemStore {
    tables: RwLock<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| anyhow!("state lock poisoned"))
    }
}

impl StateStore for MemStore {
    fn balance(&self, account: &Address) -> Result<Handle> {
        Ok(self
            .read()?
            .balances
            .get(account)
            .copied()
            .unwrap_or_default())
    }

    fn campaign(&self, address: &Address) -> Result<Option<CampaignState>> {
        Ok(self.read()?.campaigns.get(address).cloned())
    }

    fn registry_len(&self) -> Result<u64> {
        Ok(self.read()?.registry.len() as u64)
    }

    fn registry_at(&self, index: u64) -> Result<Option<Address>> {
        let tables = self.read()?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| tables.registry.get(i).copied()))
    }

    fn is_granted(&self, grant: &Grant) -> Result<bool> {
        Ok(self.read()?.acl.contains(grant))
    }

    fn chain_meta(&self) -> Result<Option<ChainMeta>> {
        Ok(self.read()?.meta.clone())
    }

    fn apply(&self, diff: StateDiff) -> Result<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| anyhow!("state lock poisoned"))?;

        // Registry is append-only; refuse a diff built on a stale length
        // before touching anything.
        let mut expected = tables.registry.len() as u64;
        for (index, _) in &diff.registry {
            if *index != expected {
                return Err(anyhow!(
                    "registry append at {} but length is {}",
                    index,
                    expected
                ));
            }
            expected += 1;
        }

        tables.balances.extend(diff.balances);
        tables.campaigns.extend(diff.campaigns);
        tables
            .registry
            .extend(diff.registry.into_iter().map(|(_, addr)| addr));
        tables.acl.extend(diff.grants);
        if let Some(meta) = diff.meta {
            tables.meta = Some(meta);
        }
        Ok(())
    }
}
