//! Recursive regular-file enumeration for one root
//!
//! Directories are descended into but never yielded. Symlinks (including a
//! symlinked root), named pipes, sockets and device nodes are skipped
//! without being followed or reported. Any walk error is returned to the
//! caller, which treats it as fatal.

use crate::error::{DiscoveryError, DiscoveryResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

/// Lazily yields every regular file below a root
pub struct FileEnumerator {
    root: PathBuf,
    inner: walkdir::IntoIter,
}

impl FileEnumerator {
    /// Create an enumerator for `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let inner = WalkDir::new(&root)
            .follow_links(false)
            .follow_root_links(false)
            .into_iter();

        Self { root, inner }
    }

    /// The root being walked
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk_error(&self, err: walkdir::Error) -> DiscoveryError {
        if err.depth() == 0 {
            if let Some(io) = err.io_error() {
                if io.kind() == ErrorKind::NotFound {
                    return DiscoveryError::RootMissing {
                        root: self.root.clone(),
                    };
                }
            }
        }

        let path = err
            .path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let reason = match err.io_error() {
            Some(io) => io.to_string(),
            None => err.to_string(),
        };

        DiscoveryError::Walk {
            root: self.root.clone(),
            path,
            reason,
        }
    }
}

impl Iterator for FileEnumerator {
    type Item = DiscoveryResult<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(self.walk_error(e))),
            };

            let file_type = entry.file_type();
            if file_type.is_file() {
                return Some(Ok(entry.into_path()));
            }

            if !file_type.is_dir() {
                trace!(path = %entry.path().display(), "Skipping non-regular entry");
            }
        }
    }
}

/// Walk `root` to completion and return every regular file, stopping at
/// the first error
pub fn collect_files(root: impl Into<PathBuf>) -> DiscoveryResult<Vec<PathBuf>> {
    FileEnumerator::new(root).collect()
}
