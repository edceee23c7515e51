use zalift_account::Address;
use zalift_fhe::{FheBackend, Grant, Grantee, Handle};

use crate::campaign::CampaignState;
use crate::chain::ChainMeta;
use crate::error::ExecutionError;
use crate::execution::diff::StateDiff;
use crate::execution::receipt::Event;
use crate::storage::StateStore;

/// Overlay on the committed state for the duration of one unit.
///
/// Reads hit the pending diff first, then the store. Writes only ever touch
/// the diff, so dropping the context is a full rollback.
pub struct ExecutionContext<'a> {
    store: &'a dyn StateStore,
    fhe: &'a dyn FheBackend,
    diff: StateDiff,
    events: Vec<Event>,
    block: u64,
    timestamp: u64,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        store: &'a dyn StateStore,
        fhe: &'a dyn FheBackend,
        block: u64,
        timestamp: u64,
    ) -> Self {
        Self {
            store,
            fhe,
            diff: StateDiff::default(),
            events: Vec::new(),
            block,
            timestamp,
        }
    }

    pub fn fhe(&self) -> &'a dyn FheBackend {
        self.fhe
    }

    pub fn block(&self) -> u64 {
        self.block
    }

    /// Block timestamp, fixed for the whole unit.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    // ------------------------------------------------------------------
    // Balances
    // ------------------------------------------------------------------

    pub fn balance(&self, account: &Address) -> Result<Handle, ExecutionError> {
        if let Some(handle) = self.diff.balances.get(account) {
            return Ok(*handle);
        }
        Ok(self.store.balance(account)?)
    }

    pub fn set_balance(&mut self, account: Address, handle: Handle) {
        self.diff.balances.insert(account, handle);
    }

    // ------------------------------------------------------------------
    // Campaigns and registry
    // ------------------------------------------------------------------

    pub fn campaign(&self, address: &Address) -> Result<Option<CampaignState>, ExecutionError> {
        if let Some(state) = self.diff.campaigns.get(address) {
            return Ok(Some(state.clone()));
        }
        Ok(self.store.campaign(address)?)
    }

    pub fn put_campaign(&mut self, state: CampaignState) {
        self.diff.campaigns.insert(state.address, state);
    }

    pub fn registry_len(&self) -> Result<u64, ExecutionError> {
        Ok(self.store.registry_len()? + self.diff.registry.len() as u64)
    }

    /// Appends to the registry and returns the new entry's index.
    pub fn push_registry(&mut self, campaign: Address) -> Result<u64, ExecutionError> {
        let index = self.registry_len()?;
        self.diff.registry.push((index, campaign));
        Ok(index)
    }

    // ------------------------------------------------------------------
    // ACL
    // ------------------------------------------------------------------

    /// Records a decryption grant. The zero handle needs none.
    pub fn allow(&mut self, handle: Handle, grantee: Grantee) {
        if handle.is_zero() {
            return;
        }
        self.diff.grants.insert(Grant { handle, grantee });
    }

    pub fn allow_accounts(&mut self, handle: Handle, accounts: &[Address]) {
        for account in accounts {
            self.allow(handle, Grantee::Account(*account));
        }
    }

    pub fn is_allowed(&self, grant: &Grant) -> Result<bool, ExecutionError> {
        if self.diff.grants.contains(grant) {
            return Ok(true);
        }
        Ok(self.store.is_granted(grant)?)
    }

    // ------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn set_meta(&mut self, meta: ChainMeta) {
        self.diff.meta = Some(meta);
    }

    /// Hands back the pending writes and the events, consuming the overlay.
    pub fn finish(self) -> (StateDiff, Vec<Event>) {
        (self.diff, self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStore;
    use zalift_fhe::MockFhe;

    #[test]
    fn reads_see_pending_writes_but_store_does_not() {
        let store = MemStore::new();
        let fhe = MockFhe::with_key(1, [1u8; 32]);
        let account = Address([9u8; 20]);
        let five = fhe.trivial_encrypt(5);

        let mut ctx = ExecutionContext::new(&store, &fhe, 1, 10);
        assert_eq!(ctx.balance(&account).unwrap(), Handle::ZERO);
        ctx.set_balance(account, five);
        ctx.allow(five, Grantee::Account(account));

        assert_eq!(ctx.balance(&account).unwrap(), five);
        assert!(ctx.is_allowed(&Grant::account(five, account)).unwrap());
        assert_eq!(store.balance(&account).unwrap(), Handle::ZERO);

        drop(ctx);
        assert!(!store.is_granted(&Grant::account(five, account)).unwrap());
    }

    #[test]
    fn registry_indices_continue_from_store() {
        let store = MemStore::new();
        let fhe = MockFhe::with_key(1, [1u8; 32]);

        let mut ctx = ExecutionContext::new(&store, &fhe, 1, 10);
        assert_eq!(ctx.push_registry(Address([1u8; 20])).unwrap(), 0);
        assert_eq!(ctx.push_registry(Address([2u8; 20])).unwrap(), 1);
        let (diff, _) = ctx.finish();
        store.apply(diff).unwrap();

        let mut ctx = ExecutionContext::new(&store, &fhe, 2, 11);
        assert_eq!(ctx.push_registry(Address([3u8; 20])).unwrap(), 2);
    }

    #[test]
    fn zero_handle_is_never_granted() {
        let store = MemStore::new();
        let fhe = MockFhe::with_key(1, [1u8; 32]);
        let mut ctx = ExecutionContext::new(&store, &fhe, 1, 10);
        ctx.allow(Handle::ZERO, Grantee::Public);
        let (diff, _) = ctx.finish();
        assert!(diff.grants.is_empty());
    }
}
