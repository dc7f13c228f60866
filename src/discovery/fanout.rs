//! Discovery fan-out - one enumerator thread per root
//!
//! Every enumerator sends the paths it finds through a single unbounded
//! crossbeam channel; the calling thread is the only collector, so the
//! `FileCollection` has exactly one writer. `discover()` returns only after
//! the channel is drained and every enumerator thread has been joined.
//!
//! The first walk error wins. It sets the shared shutdown flag so the other
//! enumerators stop early, and is returned once they have all exited.

use crate::discovery::enumerate::FileEnumerator;
use crate::error::{DiscoveryError, Result, SignError, WorkerError};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Live counters for the discovery phase
#[derive(Debug, Default)]
pub struct DiscoveryStats {
    /// Roots handed to the fan-out
    pub roots_total: AtomicUsize,

    /// Roots whose enumerator has finished
    pub roots_done: AtomicUsize,

    /// Regular files found so far
    pub files_found: AtomicU64,
}

impl DiscoveryStats {
    fn record_file(&self) {
        self.files_found.fetch_add(1, Ordering::Relaxed);
    }

    fn record_root_done(&self) {
        self.roots_done.fetch_add(1, Ordering::Relaxed);
    }
}

/// Outcome of walking one root
#[derive(Debug, Clone)]
pub struct RootSummary {
    /// The root that was walked
    pub root: PathBuf,

    /// Regular files found under it
    pub files: u64,

    /// How long the walk took
    pub elapsed: Duration,

    /// When the enumerator finished
    pub finished_at: Instant,
}

/// All files discovered across every root
///
/// Duplicates are kept: a file reachable from two roots appears twice.
#[derive(Debug, Clone, Default)]
pub struct FileCollection {
    files: Vec<PathBuf>,
    roots: Vec<RootSummary>,
}

impl FileCollection {
    /// Number of discovered files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True if nothing was discovered
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Discovered files in collection order
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Per-root summaries, in completion order
    pub fn roots(&self) -> &[RootSummary] {
        &self.roots
    }

    /// When the last enumerator finished
    pub fn completed_at(&self) -> Option<Instant> {
        self.roots.iter().map(|r| r.finished_at).max()
    }

    fn push(&mut self, path: PathBuf) -> bool {
        // Zero-length paths never reach the signer.
        if path.as_os_str().is_empty() {
            return false;
        }
        self.files.push(path);
        true
    }
}

impl From<Vec<PathBuf>> for FileCollection {
    fn from(files: Vec<PathBuf>) -> Self {
        let mut collection = FileCollection::default();
        for path in files {
            collection.push(path);
        }
        collection
    }
}

impl IntoIterator for FileCollection {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// Messages from enumerator threads to the collector
enum Found {
    File(PathBuf),
    RootDone(RootSummary),
}

/// Runs one `FileEnumerator` per root concurrently
pub struct DiscoveryFanOut {
    shutdown: Arc<AtomicBool>,
    stats: Arc<DiscoveryStats>,
}

impl DiscoveryFanOut {
    /// Create a fan-out sharing the run's shutdown flag
    pub fn new(shutdown: Arc<AtomicBool>) -> Self {
        Self {
            shutdown,
            stats: Arc::new(DiscoveryStats::default()),
        }
    }

    /// Get the live discovery counters
    pub fn stats(&self) -> Arc<DiscoveryStats> {
        Arc::clone(&self.stats)
    }

    /// Walk every root and return the merged collection
    ///
    /// Blocks until every enumerator has finished.
    pub fn discover(&self, roots: &[PathBuf]) -> Result<FileCollection> {
        self.stats.roots_total.store(roots.len(), Ordering::Relaxed);
        info!(roots = roots.len(), "Starting discovery");

        let (tx, rx) = unbounded::<Found>();
        let first_error: Arc<Mutex<Option<DiscoveryError>>> = Arc::new(Mutex::new(None));
        let mut handles: Vec<(String, JoinHandle<()>)> = Vec::with_capacity(roots.len());
        let mut spawn_error = None;

        for (id, root) in roots.iter().enumerate() {
            let name = format!("discover-{}", id);
            let root = root.clone();
            let tx = tx.clone();
            let shutdown = Arc::clone(&self.shutdown);
            let first_error = Arc::clone(&first_error);

            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || enumerate_root(id, root, tx, shutdown, first_error));

            match spawned {
                Ok(handle) => handles.push((name, handle)),
                Err(e) => {
                    error!(root = id, error = %e, "Failed to spawn enumerator");
                    self.shutdown.store(true, Ordering::SeqCst);
                    spawn_error = Some(WorkerError::SpawnFailed {
                        name,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        // Only enumerator threads hold senders now; the loop below ends
        // when the last of them exits.
        drop(tx);

        let mut collection = FileCollection::default();
        let mut discarded = 0u64;
        for found in rx.iter() {
            match found {
                Found::File(path) => {
                    if collection.push(path) {
                        self.stats.record_file();
                    } else {
                        discarded += 1;
                    }
                }
                Found::RootDone(summary) => {
                    self.stats.record_root_done();
                    collection.roots.push(summary);
                }
            }
        }

        let mut panicked = None;
        for (name, handle) in handles {
            if handle.join().is_err() {
                warn!(thread = %name, "Enumerator panicked");
                panicked.get_or_insert(WorkerError::Panicked { name });
            }
        }

        if discarded > 0 {
            debug!(discarded, "Discarded empty paths");
        }

        if let Some(err) = first_error.lock().take() {
            return Err(err.into());
        }
        if let Some(err) = spawn_error.or(panicked) {
            return Err(err.into());
        }
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(SignError::Interrupted);
        }

        info!(
            roots = collection.roots.len(),
            files = collection.len(),
            "Discovery complete"
        );
        Ok(collection)
    }
}

/// Body of one enumerator thread
fn enumerate_root(
    id: usize,
    root: PathBuf,
    tx: Sender<Found>,
    shutdown: Arc<AtomicBool>,
    first_error: Arc<Mutex<Option<DiscoveryError>>>,
) {
    let start = Instant::now();
    let mut files = 0u64;
    debug!(root_id = id, root = %root.display(), "Enumerator starting");

    for item in FileEnumerator::new(&root) {
        if shutdown.load(Ordering::Relaxed) {
            debug!(root_id = id, "Enumerator stopping on shutdown");
            return;
        }

        match item {
            Ok(path) => {
                files += 1;
                if tx.send(Found::File(path)).is_err() {
                    return;
                }
            }
            Err(e) => {
                shutdown.store(true, Ordering::SeqCst);
                let mut slot = first_error.lock();
                if slot.is_none() {
                    error!(root = %root.display(), error = %e, "Discovery failed");
                    *slot = Some(e);
                } else {
                    warn!(root = %root.display(), error = %e, "Additional discovery failure");
                }
                return;
            }
        }
    }

    let elapsed = start.elapsed();
    debug!(
        root_id = id,
        root = %root.display(),
        files,
        elapsed_ms = elapsed.as_millis() as u64,
        "Enumerator finished"
    );

    let _ = tx.send(Found::RootDone(RootSummary {
        root,
        files,
        elapsed,
        finished_at: Instant::now(),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn fan_out() -> DiscoveryFanOut {
        DiscoveryFanOut::new(Arc::new(AtomicBool::new(false)))
    }

    fn populate(base: &Path, files: &[&str]) {
        for f in files {
            let path = base.join(f);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, f).unwrap();
        }
    }

    #[test]
    fn test_union_of_roots() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        populate(a.path(), &["x.txt", "y.bin", "sub/z.so"]);
        populate(b.path(), &["w.conf"]);

        let fan = fan_out();
        let collection = fan
            .discover(&[a.path().to_path_buf(), b.path().to_path_buf()])
            .unwrap();

        let got: BTreeSet<PathBuf> = collection.files().iter().cloned().collect();
        let want: BTreeSet<PathBuf> = [
            a.path().join("x.txt"),
            a.path().join("y.bin"),
            a.path().join("sub/z.so"),
            b.path().join("w.conf"),
        ]
        .into_iter()
        .collect();
        assert_eq!(got, want);
        assert_eq!(collection.roots().len(), 2);
        for summary in collection.roots() {
            let expected = if summary.root == a.path() { 3 } else { 1 };
            assert_eq!(summary.files, expected);
        }

        let stats = fan.stats();
        assert_eq!(stats.roots_done.load(Ordering::Relaxed), 2);
        assert_eq!(stats.files_found.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let a = tempdir().unwrap();
        populate(a.path(), &["one", "two"]);

        let root = a.path().to_path_buf();
        let collection = fan_out().discover(&[root.clone(), root]).unwrap();
        assert_eq!(collection.len(), 4);
    }

    #[test]
    fn test_no_roots() {
        let collection = fan_out().discover(&[]).unwrap();
        assert!(collection.is_empty());
        assert_eq!(collection.completed_at(), None);
    }

    #[test]
    fn test_one_bad_root_fails_discovery() {
        let a = tempdir().unwrap();
        populate(a.path(), &["ok.txt"]);
        let missing = a.path().join("missing");

        let shutdown = Arc::new(AtomicBool::new(false));
        let fan = DiscoveryFanOut::new(Arc::clone(&shutdown));
        let err = fan
            .discover(&[a.path().to_path_buf(), missing.clone()])
            .unwrap_err();

        match err {
            SignError::Discovery(DiscoveryError::RootMissing { root }) => assert_eq!(root, missing),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(shutdown.load(Ordering::SeqCst));
    }

    #[test]
    fn test_rediscovery_is_stable() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        populate(a.path(), &["1", "d/2", "d/e/3"]);
        populate(b.path(), &["4", "f/5"]);
        let roots = vec![a.path().to_path_buf(), b.path().to_path_buf()];

        let first: BTreeSet<PathBuf> = fan_out().discover(&roots).unwrap().into_iter().collect();
        let second: BTreeSet<PathBuf> = fan_out().discover(&roots).unwrap().into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_shutdown_before_start_is_interrupted() {
        let a = tempdir().unwrap();
        populate(a.path(), &["f"]);

        let fan = DiscoveryFanOut::new(Arc::new(AtomicBool::new(true)));
        assert!(matches!(
            fan.discover(&[a.path().to_path_buf()]),
            Err(SignError::Interrupted)
        ));
    }

    #[test]
    fn test_empty_paths_discarded() {
        let collection = FileCollection::from(vec![
            PathBuf::from("/a"),
            PathBuf::new(),
            PathBuf::from("/b"),
        ]);
        assert_eq!(collection.files(), &[PathBuf::from("/a"), PathBuf::from("/b")]);
    }
}
