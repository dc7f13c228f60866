//! Bounded dispatch pool - signs every discovered file exactly once
//!
//! The launcher walks the file list in order. For each file it first
//! acquires a slot (blocking only the launcher), then spawns a signer
//! thread that owns the slot until it exits. At most `concurrency` signers
//! are ever in flight.
//!
//! Failure handling:
//! - The first signing error is kept and sets the shared shutdown flag.
//! - Once the flag is set the launcher starts nothing more.
//! - Signers already running are left to finish and are always joined
//!   before `run()` returns. Their errors are logged and counted.
//! - A panicking signer sets the flag while unwinding, before its slot is
//!   released, so the launcher never reuses that slot.

use crate::dispatch::slots::{DispatchSlots, SlotGuard};
use crate::error::{Result, SignError, SigningError, WorkerError};
use crate::signer::Signer;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How often a launcher waiting for a slot rechecks the shutdown flag
const SLOT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Live counters for the dispatch phase
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Files signed successfully
    pub signed: AtomicU64,

    /// Signer invocations that failed
    pub failed: AtomicU64,

    /// Signers currently running
    pub in_flight: AtomicUsize,

    /// Highest in-flight count observed
    pub peak_in_flight: AtomicUsize,
}

impl DispatchStats {
    fn begin_sign<'a>(&'a self, shutdown: &'a AtomicBool) -> InFlightGuard<'a> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard {
            stats: self,
            shutdown,
        }
    }

    fn record_signed(&self) {
        self.signed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counts one running signer; dropping it (also on unwind) ends the count
struct InFlightGuard<'a> {
    stats: &'a DispatchStats,
    shutdown: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
        if thread::panicking() {
            self.shutdown.store(true, Ordering::SeqCst);
        }
    }
}

/// Summary of a completed dispatch
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Files handed to the pool
    pub total: u64,

    /// Files signed successfully
    pub signed: u64,

    /// Signer invocations that failed
    pub failed: u64,

    /// Files never launched because the run was stopped
    pub not_started: u64,

    /// Highest number of concurrent signers
    pub peak_in_flight: usize,

    /// Wall-clock time of the dispatch phase
    pub duration: Duration,
}

/// Runs a `Signer` over a file list with bounded concurrency
pub struct DispatchPool {
    signer: Arc<dyn Signer>,
    concurrency: usize,
    shutdown: Arc<AtomicBool>,
    stats: Arc<DispatchStats>,
}

impl DispatchPool {
    /// Create a pool running at most `concurrency` signers at once
    pub fn new(signer: Arc<dyn Signer>, concurrency: usize, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            signer,
            concurrency: concurrency.max(1),
            shutdown,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    /// Maximum concurrent signers
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Get the live dispatch counters
    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Sign every file, blocking until all launched signers have exited
    pub fn run<I>(&self, files: I) -> Result<DispatchReport>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let start = Instant::now();
        let files: Vec<PathBuf> = files.into_iter().collect();
        let total = files.len() as u64;

        info!(
            files = total,
            signers = self.concurrency,
            "Signing with {} signer(s)",
            self.concurrency
        );

        let slots = DispatchSlots::new(self.concurrency);
        let first_error: Arc<Mutex<Option<SigningError>>> = Arc::new(Mutex::new(None));
        let mut handles: Vec<(String, JoinHandle<()>)> = Vec::new();
        let mut worker_error: Option<WorkerError> = None;
        let mut launched = 0u64;

        for (id, path) in files.into_iter().enumerate() {
            let Some(slot) = self.wait_for_slot(&slots) else {
                break;
            };

            let name = format!("signer-{}", id);
            let signer = Arc::clone(&self.signer);
            let shutdown = Arc::clone(&self.shutdown);
            let stats = Arc::clone(&self.stats);
            let first_error = Arc::clone(&first_error);

            let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
                let _slot = slot;
                sign_one(id, path, signer.as_ref(), &shutdown, &stats, &first_error);
            });

            match spawned {
                Ok(handle) => {
                    launched += 1;
                    handles.push((name, handle));
                }
                Err(e) => {
                    error!(task = id, error = %e, "Failed to spawn signer");
                    self.shutdown.store(true, Ordering::SeqCst);
                    worker_error = Some(WorkerError::SpawnFailed {
                        name,
                        reason: e.to_string(),
                    });
                    break;
                }
            }

            self.reap_finished(&mut handles, &mut worker_error);
        }

        for (name, handle) in handles.drain(..) {
            join_signer(name, handle, &self.shutdown, &mut worker_error);
        }

        let not_started = total - launched;
        let report = DispatchReport {
            total,
            signed: self.stats.signed.load(Ordering::SeqCst),
            failed: self.stats.failed.load(Ordering::SeqCst),
            not_started,
            peak_in_flight: self.stats.peak_in_flight.load(Ordering::SeqCst),
            duration: start.elapsed(),
        };

        if let Some(err) = first_error.lock().take() {
            warn!(
                signed = report.signed,
                failed = report.failed,
                not_started,
                "Signing aborted"
            );
            return Err(err.into());
        }
        if let Some(err) = worker_error {
            return Err(err.into());
        }
        if not_started > 0 {
            info!(not_started, "Signing interrupted");
            return Err(SignError::Interrupted);
        }

        info!(
            signed = report.signed,
            duration_ms = report.duration.as_millis() as u64,
            "Signing complete"
        );
        Ok(report)
    }

    /// Block the launcher until a slot is free or the run is stopped
    fn wait_for_slot(&self, slots: &DispatchSlots) -> Option<SlotGuard> {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(slot) = slots.acquire_timeout(SLOT_POLL_INTERVAL) {
                // A failure may have landed while we were waiting.
                if self.shutdown.load(Ordering::SeqCst) {
                    return None;
                }
                return Some(slot);
            }
        }
    }

    /// Join signer threads that have already exited
    fn reap_finished(
        &self,
        handles: &mut Vec<(String, JoinHandle<()>)>,
        worker_error: &mut Option<WorkerError>,
    ) {
        let mut i = 0;
        while i < handles.len() {
            if handles[i].1.is_finished() {
                let (name, handle) = handles.swap_remove(i);
                join_signer(name, handle, &self.shutdown, worker_error);
            } else {
                i += 1;
            }
        }
    }
}

fn join_signer(
    name: String,
    handle: JoinHandle<()>,
    shutdown: &AtomicBool,
    worker_error: &mut Option<WorkerError>,
) {
    if handle.join().is_err() {
        error!(thread = %name, "Signer panicked");
        shutdown.store(true, Ordering::SeqCst);
        worker_error.get_or_insert(WorkerError::Panicked { name });
    }
}

/// Body of one signer thread; the caller holds the slot
fn sign_one(
    id: usize,
    path: PathBuf,
    signer: &dyn Signer,
    shutdown: &AtomicBool,
    stats: &DispatchStats,
    first_error: &Mutex<Option<SigningError>>,
) {
    info!(task = id, path = %path.display(), "Sign on");

    let outcome = {
        let _in_flight = stats.begin_sign(shutdown);
        signer.sign(&path)
    };

    match outcome {
        Ok(()) => {
            stats.record_signed();
            debug!(task = id, path = %path.display(), "Signed");
        }
        Err(e) => {
            stats.record_failure();
            shutdown.store(true, Ordering::SeqCst);
            let mut slot = first_error.lock();
            if slot.is_none() {
                error!(task = id, error = %e, "Signing failed");
                *slot = Some(e);
            } else {
                warn!(task = id, error = %e, "Additional signing failure");
            }
        }
    }
}
