use chacha20poly1305::aead::OsRng;
use ed25519_dalek::{Signer, SigningKey};
use thiserror::Error;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zalift_account::Address;

pub mod authorization;
pub mod sealed;

pub use authorization::{SignedAuthorization, UserDecryptAuthorization};
pub use sealed::{SealedValue, open_value, seal_value};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeypairError {
    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("failed to seal value")]
    SealFailed,

    #[error("failed to open sealed value")]
    OpenFailed,
}

/// A user's on-ledger identity key.
/// NEVER expose this struct's internals.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generates a fresh random identity.
    pub fn new_random() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Reconstructs an identity from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Returns the Ed25519 public key.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Returns the account address (the public "identity").
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key())
    }

    pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
        self.signing_key.sign(msg).to_bytes()
    }

    /// Signs a user-decrypt authorization.
    /// The signer's public key is attached so the oracle can check it.
    pub fn sign_authorization(&self, message: UserDecryptAuthorization) -> SignedAuthorization {
        let signature = self.sign(&message.digest()).to_vec();
        SignedAuthorization {
            message,
            signature,
            signer_pubkey: self.public_key(),
        }
    }
}

/// Ephemeral X25519 keypair the oracle re-encrypts cleartexts to.
pub struct DecryptionKeypair {
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl DecryptionKeypair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::thread_rng());
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    /// Opens a value the oracle sealed for this keypair.
    pub fn open(&self, sealed: &SealedValue, handle: &[u8; 32]) -> Result<u64, KeypairError> {
        open_value(sealed, handle, &self.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_keypairs_are_deterministic() {
        let a = Keypair::from_seed(&[5u8; 32]);
        let b = Keypair::from_seed(&[5u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.address(), b.address());
        assert_eq!(a.address(), Address::from_public_key(&a.public_key()));
    }

    #[test]
    fn random_keypairs_differ() {
        assert_ne!(Keypair::new_random().address(), Keypair::new_random().address());
    }
}
