use serde::{Deserialize, Serialize};
use zalift_account::Address;
use zalift_fhe::Handle;

/// What happened to a confidential transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOutcome {
    /// Recipient has no hook; plain transfer.
    Delivered,
    /// Recipient hook accepted the funds.
    Accepted,
    /// Recipient hook rejected the funds and the ledger sent them back.
    Refunded,
}

/// Events recorded by a committed unit. Amounts only ever appear as handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Minted {
        to: Address,
        amount: Handle,
    },
    ConfidentialTransfer {
        from: Address,
        to: Address,
        amount: Handle,
    },
    /// `receiver` rejected `amount` and it went back to `sender`.
    TransferRefunded {
        sender: Address,
        receiver: Address,
        amount: Handle,
    },
    CampaignCreated {
        index: u64,
        campaign: Address,
        creator: Address,
        name: String,
        target_amount: u64,
        end_time: u64,
    },
    ContributionAccepted {
        campaign: Address,
        contributor: Address,
        amount: Handle,
    },
    ContributionRejected {
        campaign: Address,
        contributor: Address,
    },
    CampaignEnded {
        campaign: Address,
        creator: Address,
        withdrawn: Handle,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: [u8; 32],
    pub block: u64,
    pub timestamp: u64,
    pub events: Vec<Event>,
    /// Set for confidential transfers only.
    pub outcome: Option<TransferOutcome>,
}

impl TxReceipt {
    pub fn tx_hash_hex(&self) -> String {
        hex::encode(self.tx_hash)
    }

    /// Address of the campaign created in this unit, if any.
    pub fn created_campaign(&self) -> Option<Address> {
        self.events.iter().find_map(|e| match e {
            Event::CampaignCreated { campaign, .. } => Some(*campaign),
            _ => None,
        })
    }
}
