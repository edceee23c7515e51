use std::collections::{HashMap, HashSet};

use zalift_account::Address;
use zalift_fhe::{Grant, Handle};

use crate::campaign::CampaignState;
use crate::chain::ChainMeta;

/// Everything one unit of execution wants to write.
///
/// Built in memory while the unit runs and handed to
/// [`StateStore::apply`](crate::storage::StateStore::apply) in one piece.
#[derive(Debug, Default, Clone)]
pub struct StateDiff {
    /// New balance handle per account
    pub balances: HashMap<Address, Handle>,
    /// Full campaign records that were created or changed
    pub campaigns: HashMap<Address, CampaignState>,
    /// Registry appends as (index, campaign address), in index order
    pub registry: Vec<(u64, Address)>,
    /// Decryption grants issued by the unit
    pub grants: HashSet<Grant>,
    pub meta: Option<ChainMeta>,
}
