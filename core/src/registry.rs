use log::info;
use serde::{Deserialize, Serialize};
use zalift_account::Address;

use crate::campaign::CampaignState;
use crate::error::ExecutionError;
use crate::execution::{Event, ExecutionContext};
use crate::storage::StateStore;

/// Front-page row for a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub index: u64,
    pub address: Address,
    pub name: String,
    pub creator: Address,
    pub end_time: u64,
    pub target_amount: u64,
    pub ended: bool,
}

/// Campaign factory. Owns only the append-only list of addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub address: Address,
}

impl Registry {
    pub fn create_campaign(
        &self,
        ctx: &mut ExecutionContext<'_>,
        creator: Address,
        name: String,
        target_amount: u64,
        end_time: u64,
    ) -> Result<Address, ExecutionError> {
        if creator.is_zero() {
            return Err(ExecutionError::InvalidRecipient);
        }
        let now = ctx.timestamp();
        if end_time <= now {
            return Err(ExecutionError::InvalidEndTime { end_time, now });
        }

        let index = ctx.registry_len()?;
        let address = Address::derive_contract(&self.address, index);
        ctx.put_campaign(CampaignState::new(
            address,
            creator,
            name.clone(),
            target_amount,
            end_time,
            now,
        ));
        ctx.push_registry(address)?;

        info!("campaign #{} \"{}\" created at {} by {}", index, name, address, creator);
        ctx.emit(Event::CampaignCreated {
            index,
            campaign: address,
            creator,
            name,
            target_amount,
            end_time,
        });
        Ok(address)
    }

    pub fn campaign_count(&self, store: &dyn StateStore) -> Result<u64, ExecutionError> {
        Ok(store.registry_len()?)
    }

    pub fn campaign_at(&self, store: &dyn StateStore, index: u64) -> Result<Address, ExecutionError> {
        let len = store.registry_len()?;
        if index >= len {
            return Err(ExecutionError::IndexOutOfRange { index, len });
        }
        store
            .registry_at(index)?
            .ok_or(ExecutionError::IndexOutOfRange { index, len })
    }

    /// Up to `limit` summaries starting at `offset`, in creation order.
    pub fn campaigns(
        &self,
        store: &dyn StateStore,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<CampaignSummary>, ExecutionError> {
        let len = store.registry_len()?;
        let end = offset.saturating_add(limit).min(len);

        let mut out = Vec::new();
        for index in offset..end {
            let address = self.campaign_at(store, index)?;
            let state = store
                .campaign(&address)?
                .ok_or(ExecutionError::UnknownCampaign(address))?;
            out.push(CampaignSummary {
                index,
                address,
                name: state.name,
                creator: state.creator,
                end_time: state.end_time,
                target_amount: state.target_amount,
                ended: state.ended,
            });
        }
        Ok(out)
    }
}
