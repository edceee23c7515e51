use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zalift_account::Address;
use zalift_fhe::Handle;
use zalift_keypair::{DecryptionKeypair, SealedValue, SignedAuthorization};

use crate::error::DecryptionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Private decryption of handles, each paired with the contract that holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDecryptRequest {
    pub pairs: Vec<(Handle, Address)>,
    /// Ephemeral X25519 key the cleartexts get sealed to.
    pub public_key: [u8; 32],
    pub authorization: SignedAuthorization,
    pub requester: Address,
}

impl UserDecryptRequest {
    pub fn new(
        pairs: Vec<(Handle, Address)>,
        keypair: &DecryptionKeypair,
        authorization: SignedAuthorization,
        requester: Address,
    ) -> Self {
        Self {
            pairs,
            public_key: keypair.public_key(),
            authorization,
            requester,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicDecryptRequest {
    pub handles: Vec<Handle>,
}

/// Sealed cleartexts, one per authorized handle. Unauthorized handles are
/// simply absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDecryptResponse {
    pub values: HashMap<Handle, SealedValue>,
}

impl UserDecryptResponse {
    pub fn contains(&self, handle: &Handle) -> bool {
        self.values.contains_key(handle)
    }

    /// Opens every sealed value with the request's ephemeral keypair.
    pub fn open(&self, keypair: &DecryptionKeypair) -> Result<HashMap<Handle, u64>, DecryptionError> {
        self.values
            .iter()
            .map(|(handle, sealed)| {
                let value = keypair.open(sealed, &handle.0)?;
                Ok::<_, DecryptionError>((*handle, value))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicDecryptResponse {
    pub values: HashMap<Handle, u64>,
}

impl PublicDecryptResponse {
    pub fn get(&self, handle: &Handle) -> Option<u64> {
        self.values.get(handle).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptionResult {
    User(UserDecryptResponse),
    Public(PublicDecryptResponse),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptionStatus {
    Pending,
    Ready(DecryptionResult),
    Failed(DecryptionError),
    /// Never submitted to this oracle.
    Unknown,
}
