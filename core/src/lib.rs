//! ZaLift Core
//!
//! Confidential crowdfunding: a token with encrypted balances, a campaign
//! factory, campaigns that fold encrypted contributions into encrypted
//! aggregates, and an asynchronous decryption oracle.
//!
//! ```text
//!  contributor ──transfer_and_call──▶ Ledger ──hook──▶ Campaign
//!                                       │  ▲              │
//!                                       │  └── Rejected ──┘  (refund)
//!                                       ▼
//!                              ExecutionContext ──apply──▶ StateStore
//!                                                              │ ACL
//!  requester ──signed request──▶ DecryptionOracle ◀────────────┘
//! ```

pub mod campaign;
pub mod chain;
pub mod clock;
pub mod decryption;
pub mod error;
pub mod execution;
pub mod ledger;
pub mod receiver;
pub mod registry;
pub mod storage;

#[cfg(test)]
mod tests;

pub use campaign::{Campaign, CampaignState, CampaignStatus};
pub use chain::{Chain, ChainMeta};
pub use clock::{Clock, ManualClock, SystemClock};
pub use decryption::{
    DecryptionOracle, DecryptionResult, DecryptionStatus, OracleClient, OracleConfig, RequestId,
    UserDecryptRequest, UserDecryptResponse,
};
pub use error::{DecryptionError, ExecutionError};
pub use execution::{Event, ExecutionContext, StateDiff, TransferOutcome, TxReceipt};
pub use ledger::Ledger;
pub use receiver::{ConfidentialReceiver, HookOutcome};
pub use registry::{CampaignSummary, Registry};
pub use storage::{AnyStore, MemStore, RocksDbStore, StateStore};
