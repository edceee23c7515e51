use serde::{Deserialize, Serialize};
use zalift_account::Address;

use crate::Handle;

/// Who a decryption grant is issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grantee {
    Account(Address),
    /// Anyone may request a public decryption.
    Public,
}

/// A (ciphertext, grantee) authorization record. Never revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub handle: Handle,
    pub grantee: Grantee,
}

impl Grant {
    pub fn account(handle: Handle, address: Address) -> Self {
        Self {
            handle,
            grantee: Grantee::Account(address),
        }
    }

    pub fn public(handle: Handle) -> Self {
        Self {
            handle,
            grantee: Grantee::Public,
        }
    }

    /// Storage key: handle bytes followed by a grantee tag.
    pub fn key(&self) -> Vec<u8> {
        let mut key = self.handle.0.to_vec();
        match self.grantee {
            Grantee::Account(addr) => {
                key.push(0x01);
                key.extend_from_slice(&addr.0);
            }
            Grantee::Public => key.push(0x02),
        }
        key
    }
}
