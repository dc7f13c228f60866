//! Sign coordinator - orchestrates a two-phase signing run
//!
//! The coordinator is responsible for:
//! - Running discovery over every root (phase 1)
//! - Holding the barrier: nothing is signed until phase 1 has fully ended
//! - Running the bounded dispatch pool over the collection (phase 2)
//! - Exposing live progress and the shared shutdown flag
//! - Final statistics

use crate::config::SignConfig;
use crate::discovery::{DiscoveryFanOut, DiscoveryStats, RootSummary};
use crate::dispatch::{DispatchPool, DispatchStats};
use crate::error::Result;
use crate::signer::{ProcessSigner, Signer};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Result of a completed run
#[derive(Debug)]
pub struct RunResult {
    /// Roots walked
    pub roots: usize,

    /// Files found across all roots
    pub files_discovered: u64,

    /// Files signed successfully
    pub files_signed: u64,

    /// Highest number of concurrent signers
    pub peak_signers: usize,

    /// Per-root discovery summaries
    pub root_summaries: Vec<RootSummary>,

    /// Time spent in discovery
    pub discovery_duration: Duration,

    /// Time spent signing
    pub signing_duration: Duration,

    /// Total wall-clock time
    pub duration: Duration,
}

/// Which phase a run is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Discovering,
    Signing,
    Finished,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Phase::Discovering,
            2 => Phase::Signing,
            3 => Phase::Finished,
            _ => Phase::Starting,
        }
    }
}

/// Progress information for display
#[derive(Debug, Clone)]
pub struct SignProgress {
    pub phase: Phase,
    pub roots_done: usize,
    pub roots_total: usize,
    pub discovered: u64,
    pub signed: u64,
    pub failed: u64,
    pub in_flight: usize,
    pub concurrency: usize,
    pub elapsed: Duration,
}

impl SignProgress {
    /// Signed files per second
    pub fn signed_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.signed as f64 / secs
        } else {
            0.0
        }
    }
}

/// Cloneable read-only view of a run's live counters
#[derive(Clone)]
pub struct RunMonitor {
    phase: Arc<AtomicU8>,
    discovery: Arc<DiscoveryStats>,
    dispatch: Arc<DispatchStats>,
    concurrency: usize,
}

impl RunMonitor {
    /// Snapshot the counters
    pub fn snapshot(&self, elapsed: Duration) -> SignProgress {
        SignProgress {
            phase: Phase::from_u8(self.phase.load(Ordering::Relaxed)),
            roots_done: self.discovery.roots_done.load(Ordering::Relaxed),
            roots_total: self.discovery.roots_total.load(Ordering::Relaxed),
            discovered: self.discovery.files_found.load(Ordering::Relaxed),
            signed: self.dispatch.signed.load(Ordering::Relaxed),
            failed: self.dispatch.failed.load(Ordering::Relaxed),
            in_flight: self.dispatch.in_flight.load(Ordering::Relaxed),
            concurrency: self.concurrency,
            elapsed,
        }
    }
}

/// Coordinates discovery and signing
pub struct SignCoordinator {
    /// Configuration
    config: Arc<SignConfig>,

    discovery: DiscoveryFanOut,

    dispatch: DispatchPool,

    /// Shutdown signal shared by both phases
    shutdown: Arc<AtomicBool>,

    phase: Arc<AtomicU8>,
}

impl SignCoordinator {
    /// Create a coordinator that signs with the configured external program
    pub fn new(config: SignConfig) -> Self {
        let signer = Arc::new(ProcessSigner::from_config(&config));
        Self::with_signer(config, signer)
    }

    /// Create a coordinator with a custom signer
    pub fn with_signer(config: SignConfig, signer: Arc<dyn Signer>) -> Self {
        let config = Arc::new(config);
        let shutdown = Arc::new(AtomicBool::new(false));
        let discovery = DiscoveryFanOut::new(Arc::clone(&shutdown));
        let dispatch = DispatchPool::new(signer, config.concurrency, Arc::clone(&shutdown));

        Self {
            config,
            discovery,
            dispatch,
            shutdown,
            phase: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Get a monitor for progress display
    pub fn monitor(&self) -> RunMonitor {
        RunMonitor {
            phase: Arc::clone(&self.phase),
            discovery: self.discovery.stats(),
            dispatch: self.dispatch.stats(),
            concurrency: self.dispatch.concurrency(),
        }
    }

    /// Run discovery over `roots`, then sign everything found
    pub fn run(&self, roots: &[PathBuf]) -> Result<RunResult> {
        let start = Instant::now();
        let start_datetime: DateTime<Utc> = Utc::now();
        debug!(start_time = %start_datetime.to_rfc3339(), "Run started");

        info!(
            key = %self.config.key_path.display(),
            roots = roots.len(),
            signers = self.config.concurrency,
            "Starting signing run"
        );

        self.set_phase(Phase::Discovering);
        let collection = self.discovery.discover(roots)?;
        let discovery_duration = start.elapsed();

        let files_discovered = collection.len() as u64;
        let root_summaries = collection.roots().to_vec();

        self.set_phase(Phase::Signing);
        let report = self.dispatch.run(collection)?;
        self.set_phase(Phase::Finished);

        let duration = start.elapsed();
        info!(
            files = files_discovered,
            signed = report.signed,
            duration_ms = duration.as_millis() as u64,
            "Run completed"
        );

        Ok(RunResult {
            roots: roots.len(),
            files_discovered,
            files_signed: report.signed,
            peak_signers: report.peak_in_flight,
            root_summaries,
            discovery_duration,
            signing_duration: report.duration,
            duration,
        })
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }
}
