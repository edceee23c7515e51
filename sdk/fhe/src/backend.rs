use thiserror::Error;
use zalift_account::Address;

use crate::{Handle, InputProof};

/// Ciphertext capability errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FheError {
    #[error("unknown ciphertext handle {0}")]
    UnknownHandle(Handle),

    #[error("input proof does not match the ciphertext, contract or user")]
    ProofInvalid,

    #[error("encrypted subtraction underflow")]
    Underflow,

    #[error("encrypted addition overflow")]
    Overflow,

    #[error("encrypted input holds {0} values, at most {max} fit in one proof", max = u8::MAX)]
    TooManyInputs(usize),
}

/// Homomorphic evaluation over opaque handles.
///
/// Every operation returns a fresh handle; existing handles are immutable.
/// `Handle::ZERO` is accepted wherever a handle is expected and stands for
/// an encryption of zero.
pub trait FheBackend: Send + Sync {
    /// Encrypts a public value (mints, encrypted zero).
    fn trivial_encrypt(&self, value: u64) -> Handle;

    /// Checks that `handle` was submitted by `user` for `contract` and
    /// returns the handle the contract may use from now on.
    fn verify_input(
        &self,
        handle: &Handle,
        proof: &InputProof,
        contract: &Address,
        user: &Address,
    ) -> Result<Handle, FheError>;

    fn add(&self, lhs: &Handle, rhs: &Handle) -> Result<Handle, FheError>;

    /// `lhs - rhs`, failing instead of wrapping when `rhs > lhs`.
    fn checked_sub(&self, lhs: &Handle, rhs: &Handle) -> Result<Handle, FheError>;

    /// Zero-handle comparison: false for a value that was never written.
    fn is_initialized(&self, handle: &Handle) -> bool {
        !handle.is_zero()
    }
}

/// Holder of the decryption key. Only the decryption oracle gets one.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, handle: &Handle) -> Result<u64, FheError>;
}
