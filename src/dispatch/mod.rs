//! Bounded signing dispatch
//!
//! ```text
//!   FileCollection ──► launcher ──acquire slot──► signer-0 ─┐
//!   (collection order)    │                      signer-1 ─┼─► release slot
//!                         │   blocks while all   ...       │   on completion
//!                         │   slots are taken    signer-k ─┘   (ok, error or panic)
//!                         ▼
//!                  join every signer, report first error
//! ```

pub mod pool;
pub mod slots;

pub use pool::{DispatchPool, DispatchReport, DispatchStats};
pub use slots::{DispatchSlots, SlotGuard};
