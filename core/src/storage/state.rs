use anyhow::Result;
use zalift_account::Address;
use zalift_fhe::{Grant, Handle};

use crate::campaign::CampaignState;
use crate::chain::ChainMeta;
use crate::execution::StateDiff;

/// Decoupling the ledger logic from the db.
///
/// Implementations must make `apply` atomic: either every write of the diff
/// becomes visible or none does.
pub trait StateStore: Send + Sync {
    /// Balance handle of `account`; `Handle::ZERO` if never written.
    fn balance(&self, account: &Address) -> Result<Handle>;

    fn campaign(&self, address: &Address) -> Result<Option<CampaignState>>;

    fn registry_len(&self) -> Result<u64>;

    fn registry_at(&self, index: u64) -> Result<Option<Address>>;

    fn is_granted(&self, grant: &Grant) -> Result<bool>;

    fn chain_meta(&self) -> Result<Option<ChainMeta>>;

    /// Commit a unit's writes.
    fn apply(&self, diff: StateDiff) -> Result<()>;
}
