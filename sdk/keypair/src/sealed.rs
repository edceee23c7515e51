//! Re-encryption of decrypted values
//!
//! The oracle never returns a cleartext in the open for a user decryption.
//! It seals each value to the requester's ephemeral key.
//!
//! ```text
//! Flow:
//! 1. Oracle generates ephemeral keypair (epk, esk)
//! 2. Shared secret = ECDH(esk, requester_pk)
//! 3. Key = HKDF-SHA256(salt = epk, shared_secret, "zalift-reencrypt-v1")
//! 4. Ciphertext = ChaCha20-Poly1305(key, nonce, value_le, aad = handle)
//! 5. Output = (epk, nonce, ciphertext)
//! ```

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::KeypairError;

const REENCRYPT_INFO: &[u8] = b"zalift-reencrypt-v1";

/// A cleartext sealed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    /// Ephemeral public key for ECDH
    pub ephemeral_pk: [u8; 32],
    /// Nonce for ChaCha20-Poly1305
    pub nonce: [u8; 12],
    /// Encrypted value with authentication tag
    pub ciphertext: Vec<u8>,
}

fn derive_key(shared_secret: &[u8; 32], ephemeral_pk: &[u8; 32]) -> Option<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(ephemeral_pk), shared_secret);
    let mut key = [0u8; 32];
    hk.expand(REENCRYPT_INFO, &mut key).ok()?;
    Some(key)
}

/// Seals `value` for `recipient_pk`, binding it to `handle`.
pub fn seal_value(
    value: u64,
    handle: &[u8; 32],
    recipient_pk: &[u8; 32],
) -> Result<SealedValue, KeypairError> {
    let mut rng = rand::thread_rng();
    let ephemeral_secret = EphemeralSecret::random_from_rng(&mut rng);
    let ephemeral_pk = PublicKey::from(&ephemeral_secret);

    let shared = ephemeral_secret.diffie_hellman(&PublicKey::from(*recipient_pk));
    let key = derive_key(shared.as_bytes(), ephemeral_pk.as_bytes()).ok_or(KeypairError::SealFailed)?;

    let mut nonce_bytes = [0u8; 12];
    rng.fill_bytes(&mut nonce_bytes);

    let cipher = ChaCha20Poly1305::new_from_slice(&key).map_err(|_| KeypairError::SealFailed)?;
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &value.to_le_bytes(),
                aad: handle,
            },
        )
        .map_err(|_| KeypairError::SealFailed)?;

    Ok(SealedValue {
        ephemeral_pk: *ephemeral_pk.as_bytes(),
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Opens a sealed value with the recipient's secret.
pub fn open_value(
    sealed: &SealedValue,
    handle: &[u8; 32],
    recipient_sk: &StaticSecret,
) -> Result<u64, KeypairError> {
    let shared = recipient_sk.diffie_hellman(&PublicKey::from(sealed.ephemeral_pk));
    let key = derive_key(shared.as_bytes(), &sealed.ephemeral_pk).ok_or(KeypairError::OpenFailed)?;

    let cipher = ChaCha20Poly1305::new_from_slice(&key).map_err(|_| KeypairError::OpenFailed)?;
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: handle,
            },
        )
        .map_err(|_| KeypairError::OpenFailed)?;

    let bytes: [u8; 8] = plaintext
        .as_slice()
        .try_into()
        .map_err(|_| KeypairError::OpenFailed)?;
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DecryptionKeypair;

    #[test]
    fn recipient_opens_sealed_value() {
        let kp = DecryptionKeypair::generate();
        let handle = [4u8; 32];
        let sealed = seal_value(8_500_000, &handle, &kp.public_key()).unwrap();
        assert_eq!(kp.open(&sealed, &handle).unwrap(), 8_500_000);
    }

    #[test]
    fn other_keys_cannot_open() {
        let kp = DecryptionKeypair::generate();
        let eve = DecryptionKeypair::generate();
        let handle = [4u8; 32];
        let sealed = seal_value(1, &handle, &kp.public_key()).unwrap();
        assert_eq!(eve.open(&sealed, &handle), Err(KeypairError::OpenFailed));
    }

    #[test]
    fn sealed_value_is_bound_to_handle() {
        let kp = DecryptionKeypair::generate();
        let sealed = seal_value(1, &[4u8; 32], &kp.public_key()).unwrap();
        assert_eq!(kp.open(&sealed, &[5u8; 32]), Err(KeypairError::OpenFailed));
    }

    #[test]
    fn derived_key_depends_on_ephemeral_key() {
        let shared = [9u8; 32];
        let a = derive_key(&shared, &[1u8; 32]).unwrap();
        assert_eq!(derive_key(&shared, &[1u8; 32]).unwrap(), a);
        assert_ne!(derive_key(&shared, &[2u8; 32]).unwrap(), a);
    }
}
