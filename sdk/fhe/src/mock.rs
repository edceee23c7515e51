//! Mock FHE backend
//!
//! Stores the cleartext behind every handle in a concurrent table. Handles
//! are still derived like real ciphertext identifiers, so nothing above this
//! layer can tell the difference except through [`Decryptor`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use rand::RngCore;
use zalift_account::Address;

use crate::input::InputBuilder;
use crate::{Decryptor, FheBackend, FheError, Handle, InputProof};

const HANDLE_DOMAIN: &[u8] = b"zalift-fhe-handle-v1";
const INPUT_DOMAIN: &[u8] = b"zalift-fhe-input-v1";

#[derive(Clone, Copy)]
#[repr(u8)]
enum Op {
    Trivial = 1,
    Input = 2,
    Add = 3,
    Sub = 4,
}

struct Inner {
    chain_id: u64,
    input_key: [u8; 32],
    ciphertexts: DashMap<Handle, u64>,
    counter: AtomicU64,
}

/// Plaintext-backed ciphertext capability. Cheap to clone; clones share
/// the same ciphertext table.
#[derive(Clone)]
pub struct MockFhe {
    inner: Arc<Inner>,
}

impl MockFhe {
    /// Creates a backend with a random input-verification key.
    pub fn new(chain_id: u64) -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self::with_key(chain_id, key)
    }

    pub fn with_key(chain_id: u64, input_key: [u8; 32]) -> Self {
        Self {
            inner: Arc::new(Inner {
                chain_id,
                input_key,
                ciphertexts: DashMap::new(),
                counter: AtomicU64::new(0),
            }),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.inner.chain_id
    }

    /// Starts an encrypted input bound to `contract` and `user`.
    pub fn create_encrypted_input(&self, contract: Address, user: Address) -> InputBuilder<'_> {
        InputBuilder::new(self, contract, user)
    }

    /// Number of ciphertexts ever produced (including orphaned ones).
    pub fn ciphertext_count(&self) -> usize {
        self.inner.ciphertexts.len()
    }

    fn next_handle(&self, op: Op, operands: &[&Handle]) -> Handle {
        let seq = self.inner.counter.fetch_add(1, Ordering::SeqCst);
        let mut hasher = blake3::Hasher::new();
        hasher.update(HANDLE_DOMAIN);
        hasher.update(&self.inner.chain_id.to_be_bytes());
        hasher.update(&[op as u8]);
        for h in operands {
            hasher.update(&h.0);
        }
        hasher.update(&seq.to_be_bytes());
        Handle(*hasher.finalize().as_bytes())
    }

    fn store(&self, op: Op, operands: &[&Handle], value: u64) -> Handle {
        let handle = self.next_handle(op, operands);
        self.inner.ciphertexts.insert(handle, value);
        handle
    }

    fn value(&self, handle: &Handle) -> Result<u64, FheError> {
        if handle.is_zero() {
            return Ok(0);
        }
        self.inner
            .ciphertexts
            .get(handle)
            .map(|v| *v)
            .ok_or(FheError::UnknownHandle(*handle))
    }

    pub(crate) fn store_input_ciphertext(&self, value: u64) -> Handle {
        self.store(Op::Input, &[], value)
    }

    pub(crate) fn input_mac(
        &self,
        contract: &Address,
        user: &Address,
        count: u8,
        handles: &[Handle],
    ) -> [u8; 32] {
        let mut data = Vec::with_capacity(INPUT_DOMAIN.len() + 8 + 40 + 1 + handles.len() * 32);
        data.extend_from_slice(INPUT_DOMAIN);
        data.extend_from_slice(&self.inner.chain_id.to_be_bytes());
        data.extend_from_slice(&contract.0);
        data.extend_from_slice(&user.0);
        data.push(count);
        for h in handles {
            data.extend_from_slice(&h.0);
        }
        *blake3::keyed_hash(&self.inner.input_key, &data).as_bytes()
    }
}

impl FheBackend for MockFhe {
    fn trivial_encrypt(&self, value: u64) -> Handle {
        self.store(Op::Trivial, &[], value)
    }

    fn verify_input(
        &self,
        handle: &Handle,
        proof: &InputProof,
        contract: &Address,
        user: &Address,
    ) -> Result<Handle, FheError> {
        let (handles, mac) = proof.parse()?;
        if !handles.contains(handle) {
            return Err(FheError::ProofInvalid);
        }
        let count = u8::try_from(handles.len()).map_err(|_| FheError::ProofInvalid)?;

        // blake3::Hash equality is constant time
        let expected = blake3::Hash::from(self.input_mac(contract, user, count, &handles));
        if expected != blake3::Hash::from(mac) {
            return Err(FheError::ProofInvalid);
        }

        if !self.inner.ciphertexts.contains_key(handle) {
            return Err(FheError::ProofInvalid);
        }
        Ok(*handle)
    }

    fn add(&self, lhs: &Handle, rhs: &Handle) -> Result<Handle, FheError> {
        let sum = self
            .value(lhs)?
            .checked_add(self.value(rhs)?)
            .ok_or(FheError::Overflow)?;
        Ok(self.store(Op::Add, &[lhs, rhs], sum))
    }

    fn checked_sub(&self, lhs: &Handle, rhs: &Handle) -> Result<Handle, FheError> {
        let diff = self
            .value(lhs)?
            .checked_sub(self.value(rhs)?)
            .ok_or(FheError::Underflow)?;
        Ok(self.store(Op::Sub, &[lhs, rhs], diff))
    }
}

impl Decryptor for MockFhe {
    fn decrypt(&self, handle: &Handle) -> Result<u64, FheError> {
        self.value(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    #[test]
    fn add_and_sub_produce_fresh_handles() {
        let fhe = MockFhe::with_key(1, [7u8; 32]);
        let a = fhe.trivial_encrypt(40);
        let b = fhe.trivial_encrypt(2);

        let sum = fhe.add(&a, &b).unwrap();
        assert_ne!(sum, a);
        assert_eq!(fhe.decrypt(&sum).unwrap(), 42);

        let diff = fhe.checked_sub(&sum, &a).unwrap();
        assert_eq!(fhe.decrypt(&diff).unwrap(), 2);
        assert_eq!(fhe.ciphertext_count(), 4);
    }

    #[test]
    fn zero_handle_reads_as_zero() {
        let fhe = MockFhe::with_key(1, [7u8; 32]);
        let five = fhe.trivial_encrypt(5);
        let sum = fhe.add(&Handle::ZERO, &five).unwrap();
        assert_eq!(fhe.decrypt(&sum).unwrap(), 5);
        assert_eq!(fhe.decrypt(&Handle::ZERO).unwrap(), 0);
        assert!(!fhe.is_initialized(&Handle::ZERO));
    }

    #[test]
    fn underflow_and_overflow_are_errors() {
        let fhe = MockFhe::with_key(1, [7u8; 32]);
        let small = fhe.trivial_encrypt(1);
        let big = fhe.trivial_encrypt(u64::MAX);
        assert_eq!(fhe.checked_sub(&small, &big), Err(FheError::Underflow));
        assert_eq!(fhe.add(&small, &big), Err(FheError::Overflow));
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let fhe = MockFhe::with_key(1, [7u8; 32]);
        let bogus = Handle([3u8; 32]);
        assert_eq!(fhe.decrypt(&bogus), Err(FheError::UnknownHandle(bogus)));
    }

    #[test]
    fn input_proof_binds_contract_and_user() {
        let fhe = MockFhe::with_key(1, [7u8; 32]);
        let (token, alice, bob) = (addr(1), addr(2), addr(3));

        let input = fhe.create_encrypted_input(token, alice).add64(1_500_000).encrypt().unwrap();
        let handle = input.handles[0];

        assert_eq!(
            fhe.verify_input(&handle, &input.proof, &token, &alice),
            Ok(handle)
        );
        assert_eq!(fhe.decrypt(&handle).unwrap(), 1_500_000);

        // wrong submitter
        assert_eq!(
            fhe.verify_input(&handle, &input.proof, &token, &bob),
            Err(FheError::ProofInvalid)
        );
        // wrong contract
        assert_eq!(
            fhe.verify_input(&handle, &input.proof, &bob, &alice),
            Err(FheError::ProofInvalid)
        );
    }

    #[test]
    fn proof_does_not_cover_foreign_handles() {
        let fhe = MockFhe::with_key(1, [7u8; 32]);
        let (token, alice) = (addr(1), addr(2));

        let first = fhe.create_encrypted_input(token, alice).add64(10).encrypt().unwrap();
        let second = fhe.create_encrypted_input(token, alice).add64(20).encrypt().unwrap();

        assert_eq!(
            fhe.verify_input(&second.handles[0], &first.proof, &token, &alice),
            Err(FheError::ProofInvalid)
        );
    }

    #[test]
    fn proofs_from_another_key_fail() {
        let honest = MockFhe::with_key(1, [7u8; 32]);
        let forger = MockFhe::with_key(1, [8u8; 32]);
        let (token, alice) = (addr(1), addr(2));

        let forged = forger.create_encrypted_input(token, alice).add64(10).encrypt().unwrap();
        assert_eq!(
            honest.verify_input(&forged.handles[0], &forged.proof, &token, &alice),
            Err(FheError::ProofInvalid)
        );
    }
}
