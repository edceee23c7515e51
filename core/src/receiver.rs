use serde::{Deserialize, Serialize};
use zalift_account::Address;
use zalift_fhe::Handle;

use crate::error::ExecutionError;
use crate::execution::ExecutionContext;

/// Verdict of a receiver hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookOutcome {
    Accepted,
    /// The ledger undoes the transfer in the same unit.
    Rejected,
}

/// Implemented by contracts that want to be notified of incoming
/// confidential transfers.
///
/// Called after the funds have already been credited. Returning `Rejected`
/// is a normal outcome; returning an error aborts the whole unit.
pub trait ConfidentialReceiver {
    fn on_confidential_transfer_received(
        &self,
        ctx: &mut ExecutionContext<'_>,
        from: Address,
        amount: Handle,
        data: &[u8],
    ) -> Result<HookOutcome, ExecutionError>;
}
