//! Campaign state machine
//!
//! `Open` → `Ended`, nothing else. While open, every confidential transfer
//! routed to the campaign is accepted and folded into the encrypted
//! aggregates. Once ended, the hook rejects and the ledger sends the funds
//! back. `end_time` never gates anything; it only lets observers label an
//! open campaign as closed.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use zalift_account::Address;
use zalift_fhe::{Grantee, Handle};

use crate::error::ExecutionError;
use crate::execution::{Event, ExecutionContext};
use crate::ledger::Ledger;
use crate::receiver::{ConfidentialReceiver, HookOutcome};

/// Display-level lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    Open,
    /// Still accepting, but at or past its advertised end time.
    Closed,
    Ended,
}

/// Persisted campaign record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignState {
    pub address: Address,
    pub creator: Address,
    pub name: String,
    /// Informational only; never compared against the raised total.
    pub target_amount: u64,
    pub end_time: u64,
    pub created_at: u64,
    pub ended: bool,
    pub total_raised: Handle,
    /// First-contribution order, no duplicates.
    pub participants: Vec<Address>,
    pub contributions: BTreeMap<Address, Handle>,
    pub points: BTreeMap<Address, Handle>,
}

impl CampaignState {
    pub fn new(
        address: Address,
        creator: Address,
        name: String,
        target_amount: u64,
        end_time: u64,
        created_at: u64,
    ) -> Self {
        Self {
            address,
            creator,
            name,
            target_amount,
            end_time,
            created_at,
            ended: false,
            total_raised: Handle::ZERO,
            participants: Vec::new(),
            contributions: BTreeMap::new(),
            points: BTreeMap::new(),
        }
    }

    pub fn campaign_name(&self) -> &str {
        &self.name
    }

    pub fn creator(&self) -> Address {
        self.creator
    }

    pub fn end_time(&self) -> u64 {
        self.end_time
    }

    pub fn target_amount(&self) -> u64 {
        self.target_amount
    }

    pub fn ended(&self) -> bool {
        self.ended
    }

    pub fn total_raised(&self) -> Handle {
        self.total_raised
    }

    /// `Handle::ZERO` for accounts that never contributed.
    pub fn contribution_of(&self, account: &Address) -> Handle {
        self.contributions.get(account).copied().unwrap_or_default()
    }

    pub fn points_of(&self, account: &Address) -> Handle {
        self.points.get(account).copied().unwrap_or_default()
    }

    pub fn participant_count(&self) -> u64 {
        self.participants.len() as u64
    }

    pub fn participant_at(&self, index: u64) -> Result<Address, ExecutionError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.participants.get(i).copied())
            .ok_or(ExecutionError::IndexOutOfRange {
                index,
                len: self.participant_count(),
            })
    }

    pub fn status(&self, now: u64) -> CampaignStatus {
        if self.ended {
            CampaignStatus::Ended
        } else if now >= self.end_time {
            CampaignStatus::Closed
        } else {
            CampaignStatus::Open
        }
    }
}

/// A deployed campaign contract. State lives in the execution context; this
/// is just the address it is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Campaign {
    pub address: Address,
}

impl Campaign {
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    pub fn load(&self, ctx: &ExecutionContext<'_>) -> Result<CampaignState, ExecutionError> {
        ctx.campaign(&self.address)?
            .ok_or(ExecutionError::UnknownCampaign(self.address))
    }

    /// Creator-only, single-use. Moves the campaign's whole ledger balance to
    /// the creator; callable at any time, regardless of `end_time`.
    pub fn end_and_withdraw(
        &self,
        ctx: &mut ExecutionContext<'_>,
        ledger: &Ledger,
        caller: Address,
    ) -> Result<Handle, ExecutionError> {
        let mut state = self.load(ctx)?;
        if caller != state.creator {
            return Err(ExecutionError::Unauthorized);
        }
        if state.ended {
            return Err(ExecutionError::AlreadyEnded);
        }

        state.ended = true;
        let creator = state.creator;
        ctx.put_campaign(state);

        let balance = ctx.balance(&self.address)?;
        ledger.transfer(ctx, self.address, creator, &balance)?;

        ctx.emit(Event::CampaignEnded {
            campaign: self.address,
            creator,
            withdrawn: balance,
        });
        info!("campaign {} ended by {}", self.address, creator);
        Ok(balance)
    }
}

impl ConfidentialReceiver for Campaign {
    fn on_confidential_transfer_received(
        &self,
        ctx: &mut ExecutionContext<'_>,
        from: Address,
        amount: Handle,
        _data: &[u8],
    ) -> Result<HookOutcome, ExecutionError> {
        let mut state = self.load(ctx)?;

        if state.ended {
            ctx.emit(Event::ContributionRejected {
                campaign: self.address,
                contributor: from,
            });
            debug!("campaign {} ended, rejecting transfer from {}", self.address, from);
            return Ok(HookOutcome::Rejected);
        }

        let fhe = ctx.fhe();
        let previous = state.contribution_of(&from);
        let first_contribution = !fhe.is_initialized(&previous);

        let total = fhe.add(&state.total_raised, &amount)?;
        let contribution = fhe.add(&previous, &amount)?;
        // Points track contributions 1:1
        let points = fhe.add(&state.points_of(&from), &amount)?;

        state.total_raised = total;
        state.contributions.insert(from, contribution);
        state.points.insert(from, points);
        if first_contribution {
            state.participants.push(from);
        }

        let creator = state.creator;
        ctx.put_campaign(state);

        ctx.allow_accounts(contribution, &[self.address, from]);
        ctx.allow_accounts(points, &[self.address, from]);
        ctx.allow_accounts(total, &[self.address, creator]);
        ctx.allow(total, Grantee::Public);

        ctx.emit(Event::ContributionAccepted {
            campaign: self.address,
            contributor: from,
            amount,
        });
        debug!("campaign {} accepted contribution from {}", self.address, from);
        Ok(HookOutcome::Accepted)
    }
}
