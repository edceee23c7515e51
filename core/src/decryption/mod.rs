//! Asynchronous decryption
//!
//! Decryption never happens inside a unit of execution. Callers submit a
//! request to the oracle task and poll for the answer, which reflects the
//! ciphertexts as they were when the oracle processed the request.
//!
//! ```text
//! ┌────────────┐ request ┌──────────────┐  ACL  ┌────────────┐
//! │OracleClient│────────▶│ oracle task  │──────▶│ StateStore │
//! │  (poll)    │◀────────│ (Decryptor)  │       └────────────┘
//! └────────────┘ status  └──────────────┘
//! ```
//!
//! User decryptions are authorized by a signed [`UserDecryptAuthorization`]
//! and answered with values sealed to the requester's ephemeral key.
//! Public decryptions cover handles carrying a public grant.
//!
//! [`UserDecryptAuthorization`]: zalift_keypair::UserDecryptAuthorization

pub mod oracle;
pub mod request;

pub use oracle::{DecryptionOracle, OracleClient, OracleConfig};
pub use request::{
    DecryptionResult, DecryptionStatus, PublicDecryptRequest, PublicDecryptResponse, RequestId,
    UserDecryptRequest, UserDecryptResponse,
};
