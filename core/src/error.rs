use thiserror::Error;
use zalift_fhe::FheError;
use zalift_keypair::KeypairError;

/// Errors that abort a unit of execution. Nothing a failed unit wrote is
/// ever committed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("encrypted input proof is malformed or bound to another contract or user")]
    ProofInvalid,

    #[error("insufficient encrypted balance")]
    InsufficientBalance,

    #[error("recipient is the zero address")]
    InvalidRecipient,

    #[error("campaign end time {end_time} is not after {now}")]
    InvalidEndTime { end_time: u64, now: u64 },

    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: u64, len: u64 },

    #[error("campaign already ended")]
    AlreadyEnded,

    #[error("caller is not authorized")]
    Unauthorized,

    #[error("no campaign at {0}")]
    UnknownCampaign(zalift_account::Address),

    #[error("ciphertext operation failed: {0}")]
    Fhe(FheError),

    #[error("state storage: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl From<FheError> for ExecutionError {
    fn from(e: FheError) -> Self {
        match e {
            FheError::ProofInvalid => ExecutionError::ProofInvalid,
            other => ExecutionError::Fhe(other),
        }
    }
}

/// Decryption failures. All of them are reported to the caller as values,
/// and `NotYetAvailable` is always worth retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("decryption authorization is outside its validity window")]
    AuthorizationExpired,

    #[error("decryption authorization signature is invalid")]
    InvalidSignature,

    #[error("contract {0} is not covered by the authorization")]
    ContractNotAuthorized(zalift_account::Address),

    #[error("value not yet available")]
    NotYetAvailable,

    #[error("decryption oracle unavailable")]
    OracleUnavailable,

    #[error("sealed value could not be opened")]
    OpenFailed,
}

impl From<KeypairError> for DecryptionError {
    fn from(e: KeypairError) -> Self {
        match e {
            KeypairError::InvalidSignature | KeypairError::InvalidPublicKey => {
                DecryptionError::InvalidSignature
            }
            KeypairError::SealFailed => DecryptionError::OracleUnavailable,
            KeypairError::OpenFailed => DecryptionError::OpenFailed,
        }
    }
}
