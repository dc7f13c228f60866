//! evmsign - Parallel IMA/EVM Batch Signer
//!
//! Signs every regular file under a list of directory trees using an
//! external signer (evmctl by default), bounding how many signer processes
//! run at once. The signer may be slow, serialized on a TPM, or rate
//! limited, so the bound is chosen by the caller.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Phase 1: Discovery                           │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐     ┌───────────┐  │
//! │  │ root 0    │  │ root 1    │  │ root 2    │ ... │ root N    │  │
//! │  │ walkdir   │  │ walkdir   │  │ walkdir   │     │ walkdir   │  │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘     └─────┬─────┘  │
//! │        └──────────────┴───────┬──────┴─────────────────┘        │
//! │                               ▼                                 │
//! │                 crossbeam channel → collector                   │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │  barrier: all roots finished
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Phase 2: Dispatch                            │
//! │        launcher ── acquire slot (capacity = --pdgree) ──┐       │
//! │                                                         ▼       │
//! │  ┌──────────┐  ┌──────────┐         ┌──────────┐                │
//! │  │ signer-0 │  │ signer-1 │   ...   │ signer-k │  evmctl ima_sign│
//! │  └──────────┘  └──────────┘         └──────────┘                │
//! │          slot released when each signer exits                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first discovery or signing error stops the run: nothing new is
//! started, running signers are joined, and the error is returned.
//!
//! # Example
//!
//! ```bash
//! # One signer at a time
//! evmsign --key ~/keys/privkey_evm.pem --in ./dirs.txt
//!
//! # Eight concurrent signers
//! evmsign --key /etc/keys/ima.pem --in dirs.txt --pdgree 8
//! ```

pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod progress;
pub mod signer;

pub use config::{CliArgs, SignConfig, SignerCommand};
pub use coordinator::{RunMonitor, RunResult, SignCoordinator};
pub use discovery::{DiscoveryFanOut, FileCollection, FileEnumerator};
pub use dispatch::{DispatchPool, DispatchReport};
pub use error::{Result, SignError};
pub use signer::{ProcessSigner, Signer};
