//! Execution substrate
//!
//! Owns the committed state and runs every mutating operation as one
//! serially ordered, all-or-nothing unit. `&mut self` on the entry points is
//! what gives the total order; the store only ever sees complete diffs.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zalift_account::Address;
use zalift_config::ZaliftConfig;
use zalift_fhe::{FheBackend, Handle, InputProof};

use crate::campaign::{Campaign, CampaignState, CampaignStatus};
use crate::clock::Clock;
use crate::error::ExecutionError;
use crate::execution::{ExecutionContext, StateDiff, TransferOutcome, TxReceipt};
use crate::ledger::Ledger;
use crate::receiver::ConfidentialReceiver;
use crate::registry::{CampaignSummary, Registry};
use crate::storage::StateStore;

/// Deployer nonces for the two genesis contracts.
const LEDGER_NONCE: u64 = 0;
const REGISTRY_NONCE: u64 = 1;

/// Genesis metadata plus the current block height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMeta {
    pub chain_id: u64,
    pub ledger: Ledger,
    pub registry: Registry,
    pub height: u64,
}

pub struct Chain<S: StateStore, F: FheBackend> {
    store: Arc<S>,
    fhe: Arc<F>,
    clock: Arc<dyn Clock>,
    meta: ChainMeta,
}

impl<S: StateStore, F: FheBackend> Chain<S, F> {
    /// Deploys the ledger and the registry on an empty store.
    pub fn genesis(
        store: Arc<S>,
        fhe: Arc<F>,
        clock: Arc<dyn Clock>,
        deployer: Address,
        config: &ZaliftConfig,
    ) -> Result<Self, ExecutionError> {
        if store.chain_meta()?.is_some() {
            return Err(anyhow!("store already holds a deployed chain").into());
        }

        let meta = ChainMeta {
            chain_id: config.chain.chain_id,
            ledger: Ledger {
                address: Address::derive_contract(&deployer, LEDGER_NONCE),
                owner: deployer,
                name: config.ledger.name.clone(),
                symbol: config.ledger.symbol.clone(),
                decimals: config.ledger.decimals,
                open_faucet: config.ledger.open_faucet,
            },
            registry: Registry {
                address: Address::derive_contract(&deployer, REGISTRY_NONCE),
            },
            height: 0,
        };

        store
            .apply(StateDiff {
                meta: Some(meta.clone()),
                ..StateDiff::default()
            })
            .context("Failed to write genesis metadata")?;

        info!(
            "genesis on chain {}: ledger {} ({}), registry {}",
            meta.chain_id, meta.ledger.address, meta.ledger.symbol, meta.registry.address
        );

        Ok(Self {
            store,
            fhe,
            clock,
            meta,
        })
    }

    /// Reattaches to a store that already went through genesis.
    pub fn open(store: Arc<S>, fhe: Arc<F>, clock: Arc<dyn Clock>) -> Result<Self, ExecutionError> {
        let meta = store
            .chain_meta()?
            .context("store holds no chain metadata")?;
        info!("opened chain {} at height {}", meta.chain_id, meta.height);
        Ok(Self {
            store,
            fhe,
            clock,
            meta,
        })
    }

    /// Runs `op` as one unit: commit on success, drop everything on error.
    fn execute<T>(
        &mut self,
        op: &str,
        caller: Address,
        f: impl FnOnce(&mut ExecutionContext<'_>, &ChainMeta) -> Result<T, ExecutionError>,
    ) -> Result<(T, TxReceipt), ExecutionError> {
        let block = self.meta.height + 1;
        let timestamp = self.clock.now();

        let mut ctx = ExecutionContext::new(self.store.as_ref(), self.fhe.as_ref(), block, timestamp);
        let value = match f(&mut ctx, &self.meta) {
            Ok(value) => value,
            Err(e) => {
                warn!("{} by {} aborted: {}", op, caller, e);
                return Err(e);
            }
        };

        let mut meta = self.meta.clone();
        meta.height = block;
        ctx.set_meta(meta.clone());

        let (diff, events) = ctx.finish();
        self.store
            .apply(diff)
            .with_context(|| format!("Failed to commit block {}", block))?;
        self.meta = meta;

        let receipt = TxReceipt {
            tx_hash: tx_hash(self.meta.chain_id, block, op, &caller),
            block,
            timestamp,
            events,
            outcome: None,
        };
        info!(
            "block {} committed: {} by {} ({} events, tx {})",
            block,
            op,
            caller,
            receipt.events.len(),
            receipt.tx_hash_hex()
        );
        Ok((value, receipt))
    }

    // ========================================================================
    // Ledger
    // ========================================================================

    pub fn mint(&mut self, caller: Address, to: Address, amount: u64) -> Result<TxReceipt, ExecutionError> {
        let (_, receipt) = self.execute("mint", caller, |ctx, meta| {
            meta.ledger.mint(ctx, caller, to, amount)
        })?;
        Ok(receipt)
    }

    pub fn mint_encrypted(
        &mut self,
        caller: Address,
        handle: &Handle,
        proof: &InputProof,
    ) -> Result<TxReceipt, ExecutionError> {
        let (_, receipt) = self.execute("mintEncrypted", caller, |ctx, meta| {
            meta.ledger.mint_encrypted(ctx, caller, handle, proof)
        })?;
        Ok(receipt)
    }

    /// Plain transfer; a receiver hook at `to` is not invoked.
    pub fn confidential_transfer(
        &mut self,
        caller: Address,
        to: Address,
        handle: &Handle,
        proof: &InputProof,
    ) -> Result<TxReceipt, ExecutionError> {
        let (_, mut receipt) = self.execute("confidentialTransfer", caller, |ctx, meta| {
            meta.ledger.confidential_transfer(ctx, caller, to, handle, proof)
        })?;
        receipt.outcome = Some(TransferOutcome::Delivered);
        Ok(receipt)
    }

    /// Transfer with callback. Campaign addresses carry a receiver hook.
    pub fn confidential_transfer_and_call(
        &mut self,
        caller: Address,
        to: Address,
        handle: &Handle,
        proof: &InputProof,
        data: &[u8],
    ) -> Result<TxReceipt, ExecutionError> {
        let (outcome, mut receipt) =
            self.execute("confidentialTransferAndCall", caller, |ctx, meta| {
                let campaign = ctx.campaign(&to)?.map(|_| Campaign::at(to));
                let receiver = campaign.as_ref().map(|c| c as &dyn ConfidentialReceiver);
                meta.ledger
                    .confidential_transfer_and_call(ctx, caller, to, handle, proof, data, receiver)
            })?;
        receipt.outcome = Some(outcome);
        Ok(receipt)
    }

    /// `Handle::ZERO` for accounts never written.
    pub fn confidential_balance_of(&self, account: &Address) -> Result<Handle, ExecutionError> {
        Ok(self.store.balance(account)?)
    }

    // ========================================================================
    // Registry
    // ========================================================================

    pub fn create_campaign(
        &mut self,
        caller: Address,
        name: &str,
        target_amount: u64,
        end_time: u64,
    ) -> Result<(Address, TxReceipt), ExecutionError> {
        self.execute("createCampaign", caller, |ctx, meta| {
            meta.registry
                .create_campaign(ctx, caller, name.to_string(), target_amount, end_time)
        })
    }

    pub fn campaign_count(&self) -> Result<u64, ExecutionError> {
        self.meta.registry.campaign_count(self.store.as_ref())
    }

    pub fn campaign_at(&self, index: u64) -> Result<Address, ExecutionError> {
        self.meta.registry.campaign_at(self.store.as_ref(), index)
    }

    pub fn campaigns(&self, offset: u64, limit: u64) -> Result<Vec<CampaignSummary>, ExecutionError> {
        self.meta
            .registry
            .campaigns(self.store.as_ref(), offset, limit)
    }

    // ========================================================================
    // Campaigns
    // ========================================================================

    /// Snapshot of a campaign for the read accessors.
    pub fn campaign(&self, address: &Address) -> Result<CampaignState, ExecutionError> {
        self.store
            .campaign(address)?
            .ok_or(ExecutionError::UnknownCampaign(*address))
    }

    pub fn campaign_status(&self, address: &Address) -> Result<CampaignStatus, ExecutionError> {
        Ok(self.campaign(address)?.status(self.clock.now()))
    }

    pub fn end_and_withdraw(
        &mut self,
        caller: Address,
        campaign: Address,
    ) -> Result<TxReceipt, ExecutionError> {
        let (_, receipt) = self.execute("endAndWithdraw", caller, |ctx, meta| {
            Campaign::at(campaign).end_and_withdraw(ctx, &meta.ledger, caller)
        })?;
        Ok(receipt)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn meta(&self) -> &ChainMeta {
        &self.meta
    }

    pub fn chain_id(&self) -> u64 {
        self.meta.chain_id
    }

    pub fn height(&self) -> u64 {
        self.meta.height
    }

    pub fn ledger(&self) -> &Ledger {
        &self.meta.ledger
    }

    pub fn registry(&self) -> &Registry {
        &self.meta.registry
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn fhe(&self) -> &Arc<F> {
        &self.fhe
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

fn tx_hash(chain_id: u64, block: u64, op: &str, caller: &Address) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(chain_id.to_be_bytes());
    hasher.update(block.to_be_bytes());
    hasher.update(op.as_bytes());
    hasher.update(caller.as_ref());
    hasher.finalize().into()
}
