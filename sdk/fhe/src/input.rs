//! Encrypted Input Envelope
//!
//! Every encrypted amount a user submits travels with a proof that binds
//! the ciphertext handles to the submitting user and the target contract.
//!
//! ```text
//! proof = n (1 byte) || handle_1 .. handle_n || mac
//! mac   = BLAKE3-keyed(input_key, chain_id || contract || user || n || handles)
//! ```

use serde::{Deserialize, Serialize};
use zalift_account::Address;

use crate::{FheError, Handle, MockFhe};

const MAC_LEN: usize = 32;

/// Proof blob accompanying an encrypted input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputProof(pub Vec<u8>);

impl InputProof {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn build(count: u8, handles: &[Handle], mac: [u8; MAC_LEN]) -> Self {
        let mut bytes = Vec::with_capacity(1 + handles.len() * 32 + MAC_LEN);
        bytes.push(count);
        for h in handles {
            bytes.extend_from_slice(&h.0);
        }
        bytes.extend_from_slice(&mac);
        InputProof(bytes)
    }

    /// Splits the blob into the committed handles and the MAC.
    pub(crate) fn parse(&self) -> Result<(Vec<Handle>, [u8; MAC_LEN]), FheError> {
        let (&count, rest) = self.0.split_first().ok_or(FheError::ProofInvalid)?;
        let count = count as usize;
        if rest.len() != count * 32 + MAC_LEN {
            return Err(FheError::ProofInvalid);
        }

        let handles = rest[..count * 32]
            .chunks_exact(32)
            .map(|chunk| {
                let mut h = [0u8; 32];
                h.copy_from_slice(chunk);
                Handle(h)
            })
            .collect();

        let mut mac = [0u8; MAC_LEN];
        mac.copy_from_slice(&rest[count * 32..]);
        Ok((handles, mac))
    }
}

/// Handles plus the proof binding them to (contract, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handles: Vec<Handle>,
    pub proof: InputProof,
}

/// Client-side builder for encrypted inputs.
///
/// ```ignore
/// let input = fhe.create_encrypted_input(ledger, contributor).add64(1_500_000).encrypt()?;
/// ```
pub struct InputBuilder<'a> {
    fhe: &'a MockFhe,
    contract: Address,
    user: Address,
    values: Vec<u64>,
}

impl<'a> InputBuilder<'a> {
    pub(crate) fn new(fhe: &'a MockFhe, contract: Address, user: Address) -> Self {
        Self {
            fhe,
            contract,
            user,
            values: Vec::new(),
        }
    }

    pub fn add64(mut self, value: u64) -> Self {
        self.values.push(value);
        self
    }

    /// Fails with `TooManyInputs` past 255 values; the proof counts them in one byte.
    pub fn encrypt(self) -> Result<EncryptedInput, FheError> {
        let count = u8::try_from(self.values.len())
            .map_err(|_| FheError::TooManyInputs(self.values.len()))?;
        let handles: Vec<Handle> = self
            .values
            .iter()
            .map(|v| self.fhe.store_input_ciphertext(*v))
            .collect();
        let mac = self.fhe.input_mac(&self.contract, &self.user, count, &handles);

        Ok(EncryptedInput {
            proof: InputProof::build(count, &handles, mac),
            handles,
        })
    }
}
