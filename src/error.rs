//! Error types for evmsign
//!
//! This module defines the error hierarchy for a signing run:
//! - Discovery errors (filesystem walk failures)
//! - Signing errors (external signer failed or could not be launched)
//! - Configuration and CLI errors
//! - Worker thread errors
//!
//! Discovery and signing errors are both fatal to the run. The first one
//! observed is the one reported; later ones are only logged.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level error type for the evmsign application
#[derive(Error, Debug)]
pub enum SignError {
    /// Filesystem discovery errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// External signer errors
    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Interrupted by signal
    #[error("Operation interrupted by signal")]
    Interrupted,
}

/// Errors raised while walking a root directory
#[derive(Error, Debug, Clone)]
pub enum DiscoveryError {
    /// Root directory does not exist
    #[error("Root not found: '{}'", root.display())]
    RootMissing { root: PathBuf },

    /// The walk hit an error (permission denied, I/O, broken path)
    #[error("Failed to walk '{}' under root '{}': {reason}", path.display(), root.display())]
    Walk {
        root: PathBuf,
        path: PathBuf,
        reason: String,
    },
}

impl DiscoveryError {
    /// The root whose walk failed
    pub fn root(&self) -> &Path {
        match self {
            DiscoveryError::RootMissing { root } => root,
            DiscoveryError::Walk { root, .. } => root,
        }
    }
}

/// Errors raised by a single signer invocation
#[derive(Error, Debug, Clone)]
pub enum SigningError {
    /// The signer process could not be started
    #[error("Failed to launch '{program}' for '{}': {reason}", path.display())]
    Launch {
        path: PathBuf,
        program: String,
        reason: String,
    },

    /// The signer exited unsuccessfully
    #[error("Signer failed on '{}' ({}){}", path.display(), describe_status(*status), describe_stderr(stderr))]
    Failed {
        path: PathBuf,
        /// Exit code, `None` if terminated by a signal
        status: Option<i32>,
        stderr: String,
    },
}

impl SigningError {
    /// Path of the file that failed to sign
    pub fn path(&self) -> &Path {
        match self {
            SigningError::Launch { path, .. } => path,
            SigningError::Failed { path, .. } => path,
        }
    }
}

fn describe_status(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid concurrency degree
    #[error("Invalid parallelization degree {count}: must be between 1 and {max}")]
    InvalidConcurrency { count: usize, max: usize },

    /// Signing key not found
    #[error("Signing key '{}' does not exist", path.display())]
    KeyNotFound { path: PathBuf },

    /// Roots file could not be read
    #[error("Cannot read root list '{}': {reason}", path.display())]
    UnreadableRoots { path: PathBuf, reason: String },

    /// Roots file had no usable entries
    #[error("Root list '{}' contains no directories", path.display())]
    NoRoots { path: PathBuf },

    /// Home directory needed for `~/` expansion is unknown
    #[error("Cannot expand '{path}': home directory is unknown")]
    NoHomeDir { path: String },

    /// Signer program name is empty
    #[error("Signer program must not be empty")]
    EmptySigner,
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Thread could not be spawned
    #[error("Failed to spawn {name}: {reason}")]
    SpawnFailed { name: String, reason: String },

    /// Thread panicked
    #[error("{name} panicked")]
    Panicked { name: String },
}

/// Result type alias for SignError
pub type Result<T> = std::result::Result<T, SignError>;

/// Result type alias for DiscoveryError
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

/// Result type alias for SigningError
pub type SigningResult<T> = std::result::Result<T, SigningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_error_reports_path() {
        let err = SigningError::Failed {
            path: PathBuf::from("/data/bin/tool"),
            status: Some(1),
            stderr: "  errno: No such key\n".into(),
        };
        assert_eq!(err.path(), Path::new("/data/bin/tool"));

        let msg = err.to_string();
        assert!(msg.contains("/data/bin/tool"));
        assert!(msg.contains("exit status 1"));
        assert!(msg.ends_with(": errno: No such key"));
    }

    #[test]
    fn test_signal_termination_message() {
        let err = SigningError::Failed {
            path: PathBuf::from("/x"),
            status: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "Signer failed on '/x' (terminated by signal)");
    }

    #[test]
    fn test_error_conversion() {
        let err = DiscoveryError::RootMissing {
            root: PathBuf::from("/missing"),
        };
        assert_eq!(err.root(), Path::new("/missing"));

        let top: SignError = err.into();
        assert!(matches!(top, SignError::Discovery(_)));
        assert!(top.to_string().contains("/missing"));
    }
}
