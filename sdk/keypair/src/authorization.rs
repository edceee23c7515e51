//! User-decrypt authorization
//!
//! Typed message a user signs to let the decryption oracle re-encrypt
//! ciphertexts under an ephemeral public key. Fields are hashed in a fixed
//! order under a domain tag, so a signature for one chain, key, contract set
//! or validity window never verifies for another.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use zalift_account::Address;

use crate::KeypairError;

const AUTH_DOMAIN: &str = "ZaLift UserDecryptRequestVerification v1";
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDecryptAuthorization {
    /// Ephemeral X25519 public key the results are sealed to.
    pub public_key: [u8; 32],
    /// Contracts whose ciphertexts this request may cover.
    pub contract_addresses: Vec<Address>,
    /// Unix seconds.
    pub start_timestamp: u64,
    pub duration_days: u64,
    pub chain_id: u64,
}

impl UserDecryptAuthorization {
    pub fn new(
        public_key: [u8; 32],
        contract_addresses: Vec<Address>,
        start_timestamp: u64,
        duration_days: u64,
        chain_id: u64,
    ) -> Self {
        Self {
            public_key,
            contract_addresses,
            start_timestamp,
            duration_days,
            chain_id,
        }
    }

    /// First second at which the authorization is no longer valid.
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    /// `start <= now < start + duration`
    pub fn is_valid_at(&self, now: u64) -> bool {
        now >= self.start_timestamp && now < self.expires_at()
    }

    pub fn covers(&self, contract: &Address) -> bool {
        self.contract_addresses.contains(contract)
    }

    /// The bytes that get signed.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_derive_key(AUTH_DOMAIN);
        hasher.update(&self.chain_id.to_be_bytes());
        hasher.update(&self.public_key);
        hasher.update(&(self.contract_addresses.len() as u64).to_be_bytes());
        for addr in &self.contract_addresses {
            hasher.update(&addr.0);
        }
        hasher.update(&self.start_timestamp.to_be_bytes());
        hasher.update(&self.duration_days.to_be_bytes());
        *hasher.finalize().as_bytes()
    }
}

/// The authenticated wrapper around UserDecryptAuthorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedAuthorization {
    pub message: UserDecryptAuthorization,
    /// The Ed25519 signature of `message.digest()`.
    pub signature: Vec<u8>,
    /// The raw public key of the signer.
    pub signer_pubkey: [u8; 32],
}

impl SignedAuthorization {
    /// Verifies the signature and returns the signer's address.
    pub fn verify(&self) -> Result<Address, KeypairError> {
        let vk = VerifyingKey::from_bytes(&self.signer_pubkey)
            .map_err(|_| KeypairError::InvalidPublicKey)?;
        let sig =
            Signature::from_slice(&self.signature).map_err(|_| KeypairError::InvalidSignature)?;
        vk.verify(&self.message.digest(), &sig)
            .map_err(|_| KeypairError::InvalidSignature)?;
        Ok(Address::from_public_key(&self.signer_pubkey))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DecryptionKeypair, Keypair};

    fn sample(start: u64) -> UserDecryptAuthorization {
        UserDecryptAuthorization::new(
            DecryptionKeypair::generate().public_key(),
            vec![Address([1u8; 20])],
            start,
            10,
            11155111,
        )
    }

    #[test]
    fn signed_authorization_verifies_to_signer_address() {
        let user = Keypair::from_seed(&[3u8; 32]);
        let signed = user.sign_authorization(sample(1_000));
        assert_eq!(signed.verify().unwrap(), user.address());
    }

    #[test]
    fn tampered_message_fails() {
        let user = Keypair::from_seed(&[3u8; 32]);
        let mut signed = user.sign_authorization(sample(1_000));
        signed.message.duration_days = 10_000;
        assert_eq!(signed.verify(), Err(KeypairError::InvalidSignature));
    }

    #[test]
    fn substituted_signer_key_fails() {
        let user = Keypair::from_seed(&[3u8; 32]);
        let other = Keypair::from_seed(&[4u8; 32]);
        let mut signed = user.sign_authorization(sample(1_000));
        signed.signer_pubkey = other.public_key();
        assert_eq!(signed.verify(), Err(KeypairError::InvalidSignature));
    }

    #[test]
    fn validity_window_is_half_open() {
        let auth = sample(1_000);
        assert!(!auth.is_valid_at(999));
        assert!(auth.is_valid_at(1_000));
        assert!(auth.is_valid_at(auth.expires_at() - 1));
        assert!(!auth.is_valid_at(auth.expires_at()));
    }
}
