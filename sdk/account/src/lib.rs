use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of an address in bytes.
pub const ADDRESS_LEN: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must be {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

/// Identifier of an account or a deployed contract.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// The zero address. Never a valid transfer recipient.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    /// Derives the address owned by an Ed25519 public key.
    /// Formula: SHA256( "zalift-account" || signer_pk )[12..32]
    pub fn from_public_key(signer_pk: &[u8; 32]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"zalift-account");
        hasher.update(signer_pk);
        Self::from_digest(hasher.finalize().into())
    }

    /// Deterministic address of the `nonce`-th contract deployed by `deployer`.
    pub fn derive_contract(deployer: &Address, nonce: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"zalift-contract");
        hasher.update(deployer.0);
        hasher.update(nonce.to_be_bytes());
        Self::from_digest(hasher.finalize().into())
    }

    fn from_digest(digest: [u8; 32]) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[32 - ADDRESS_LEN..]);
        Address(bytes)
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        let arr: [u8; ADDRESS_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| AddressError::InvalidLength {
                    expected: ADDRESS_LEN,
                    got: bytes.len(),
                })?;
        Ok(Address(arr))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form keeps logs readable
        write!(f, "Address(0x{})", hex::encode(&self.0[..6]))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Serialized as a hex string so addresses can key JSON maps.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip_with_and_without_prefix() {
        let addr = Address([0xab; ADDRESS_LEN]);
        let s = addr.to_hex();
        assert!(s.starts_with("0x"));
        assert_eq!(Address::from_hex(&s).unwrap(), addr);
        assert_eq!(Address::from_hex(&s[2..]).unwrap(), addr);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Address::from_hex("0x1234").unwrap_err();
        assert_eq!(
            err,
            AddressError::InvalidLength {
                expected: ADDRESS_LEN,
                got: 2
            }
        );
    }

    #[test]
    fn contract_addresses_depend_on_nonce() {
        let deployer = Address([1u8; ADDRESS_LEN]);
        let a = Address::derive_contract(&deployer, 0);
        let b = Address::derive_contract(&deployer, 1);
        assert_ne!(a, b);
        assert_eq!(a, Address::derive_contract(&deployer, 0));
        assert!(!a.is_zero());
    }

    #[test]
    fn public_key_derivation_is_stable() {
        let pk = [9u8; 32];
        assert_eq!(Address::from_public_key(&pk), Address::from_public_key(&pk));
        assert_ne!(
            Address::from_public_key(&pk),
            Address::from_public_key(&[8u8; 32])
        );
    }
}
