//! ZaLift Ciphertext Capability
//!
//! The ledger and campaign never see plaintext amounts. They work on
//! opaque [`Handle`]s and ask an [`FheBackend`] to combine them.
//!
//! ```text
//! ┌──────────────┐  encrypt + proof   ┌──────────────┐  add / sub   ┌──────────────┐
//! │ Contributor  │───────────────────▶│    Ledger    │─────────────▶│  FheBackend  │
//! │ InputBuilder │   EncryptedInput   │  (verifies)  │   handles    │ (ciphertexts)│
//! └──────────────┘                    └──────────────┘              └──────┬───────┘
//!                                                                          │
//!                                               decrypt (key holder only)  ▼
//!                                                                   ┌──────────────┐
//!                                                                   │  Decryptor   │
//!                                                                   └──────────────┘
//! ```
//!
//! [`MockFhe`] keeps cleartexts in a table behind the handles so that the
//! state machine above it can be exercised without a real FHE library.

pub mod acl;
pub mod backend;
pub mod handle;
pub mod input;
pub mod mock;

pub use acl::{Grant, Grantee};
pub use backend::{Decryptor, FheBackend, FheError};
pub use handle::Handle;
pub use input::{EncryptedInput, InputBuilder, InputProof};
pub use mock::MockFhe;
