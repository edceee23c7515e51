//! Unit-of-work execution
//!
//! ```text
//! ┌────────────┐  ops   ┌──────────────────┐  diff   ┌──────────────┐
//! │   Chain    │───────▶│ ExecutionContext │────────▶│  StateStore  │
//! │ (&mut self)│        │  overlay + events│  apply  │ (one commit) │
//! └────────────┘        └──────────────────┘         └──────────────┘
//!        ▲                        │ error
//!        └──── TxReceipt ◀────────┴──── diff dropped, store untouched
//! ```

pub mod context;
pub mod diff;
pub mod receipt;

pub use context::ExecutionContext;
pub use diff::StateDiff;
pub use receipt::{Event, TransferOutcome, TxReceipt};
