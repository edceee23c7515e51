//! Confidential Ledger
//!
//! Encrypted balance map with a privileged mint, a faucet mint and the
//! transfer-and-call primitive. Balances are handles; the ledger never
//! learns an amount.
//!
//! ```text
//! transfer_and_call(from → to, amount):
//!
//!   debit from, credit to ──▶ hook(to)? ──┬─ none      ─▶ Delivered
//!                                         ├─ Accepted  ─▶ Accepted
//!                                         └─ Rejected  ─▶ debit to, credit from ─▶ Refunded
//! ```

use log::{debug, info};
use serde::{Deserialize, Serialize};
use zalift_account::Address;
use zalift_fhe::{FheError, Handle, InputProof};

use crate::error::ExecutionError;
use crate::execution::{Event, ExecutionContext, TransferOutcome};
use crate::receiver::{ConfidentialReceiver, HookOutcome};

/// Deployed token: metadata plus the operations over its balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub address: Address,
    /// Deployer; the only account allowed to mint plaintext amounts.
    pub owner: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub open_faucet: bool,
}

impl Ledger {
    /// Plaintext mint, owner only.
    pub fn mint(
        &self,
        ctx: &mut ExecutionContext<'_>,
        caller: Address,
        to: Address,
        amount: u64,
    ) -> Result<Handle, ExecutionError> {
        if caller != self.owner {
            return Err(ExecutionError::Unauthorized);
        }
        if to.is_zero() {
            return Err(ExecutionError::InvalidRecipient);
        }

        let encrypted = ctx.fhe().trivial_encrypt(amount);
        self.credit_minted(ctx, to, encrypted)?;
        Ok(encrypted)
    }

    /// Faucet mint of an encrypted amount to the caller.
    pub fn mint_encrypted(
        &self,
        ctx: &mut ExecutionContext<'_>,
        caller: Address,
        handle: &Handle,
        proof: &InputProof,
    ) -> Result<Handle, ExecutionError> {
        if !self.open_faucet {
            return Err(ExecutionError::Unauthorized);
        }
        let amount = self.verify_amount(ctx, caller, handle, proof)?;
        self.credit_minted(ctx, caller, amount)?;
        Ok(amount)
    }

    fn credit_minted(
        &self,
        ctx: &mut ExecutionContext<'_>,
        to: Address,
        amount: Handle,
    ) -> Result<(), ExecutionError> {
        let balance = ctx.balance(&to)?;
        let updated = ctx.fhe().add(&balance, &amount)?;
        ctx.set_balance(to, updated);
        ctx.allow_accounts(updated, &[self.address, to]);
        ctx.emit(Event::Minted { to, amount });
        debug!("minted to {}", to);
        Ok(())
    }

    /// Plain confidential transfer. No hook runs, even if `to` has one.
    pub fn confidential_transfer(
        &self,
        ctx: &mut ExecutionContext<'_>,
        caller: Address,
        to: Address,
        handle: &Handle,
        proof: &InputProof,
    ) -> Result<Handle, ExecutionError> {
        let amount = self.verify_amount(ctx, caller, handle, proof)?;
        self.transfer(ctx, caller, to, &amount)?;
        Ok(amount)
    }

    /// Transfer followed by the recipient's hook.
    ///
    /// A rejecting hook is answered with a compensating transfer of the same
    /// amount handle, so the sender ends up with an unchanged balance value.
    pub fn confidential_transfer_and_call(
        &self,
        ctx: &mut ExecutionContext<'_>,
        caller: Address,
        to: Address,
        handle: &Handle,
        proof: &InputProof,
        data: &[u8],
        receiver: Option<&dyn ConfidentialReceiver>,
    ) -> Result<TransferOutcome, ExecutionError> {
        let amount = self.verify_amount(ctx, caller, handle, proof)?;
        self.transfer(ctx, caller, to, &amount)?;

        let Some(receiver) = receiver else {
            return Ok(TransferOutcome::Delivered);
        };

        match receiver.on_confidential_transfer_received(ctx, caller, amount, data)? {
            HookOutcome::Accepted => Ok(TransferOutcome::Accepted),
            HookOutcome::Rejected => {
                self.transfer(ctx, to, caller, &amount)?;
                ctx.emit(Event::TransferRefunded {
                    sender: caller,
                    receiver: to,
                    amount,
                });
                info!("transfer {} -> {} rejected by receiver, refunded", caller, to);
                Ok(TransferOutcome::Refunded)
            }
        }
    }

    /// Moves `amount` between two accounts.
    ///
    /// Used directly by contracts holding funds on the ledger (campaign
    /// withdrawal) and by both transfer entry points.
    pub fn transfer(
        &self,
        ctx: &mut ExecutionContext<'_>,
        from: Address,
        to: Address,
        amount: &Handle,
    ) -> Result<(), ExecutionError> {
        if to.is_zero() {
            return Err(ExecutionError::InvalidRecipient);
        }

        let from_balance = ctx.balance(&from)?;
        let debited = ctx
            .fhe()
            .checked_sub(&from_balance, amount)
            .map_err(|e| match e {
                FheError::Underflow => ExecutionError::InsufficientBalance,
                other => other.into(),
            })?;
        ctx.set_balance(from, debited);

        let to_balance = ctx.balance(&to)?;
        let credited = ctx.fhe().add(&to_balance, amount)?;
        ctx.set_balance(to, credited);

        ctx.allow_accounts(debited, &[self.address, from]);
        ctx.allow_accounts(credited, &[self.address, to]);
        ctx.allow_accounts(*amount, &[self.address, from, to]);

        ctx.emit(Event::ConfidentialTransfer {
            from,
            to,
            amount: *amount,
        });
        Ok(())
    }

    fn verify_amount(
        &self,
        ctx: &ExecutionContext<'_>,
        caller: Address,
        handle: &Handle,
        proof: &InputProof,
    ) -> Result<Handle, ExecutionError> {
        Ok(ctx
            .fhe()
            .verify_input(handle, proof, &self.address, &caller)?)
    }
}
