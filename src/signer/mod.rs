//! Signer invocation
//!
//! A `Signer` signs exactly one file and blocks until it is done. The
//! production implementation, `ProcessSigner`, runs an external program
//! (evmctl by default) as:
//!
//! ```text
//! <program> <operation> <key-flag> <key-path> <file>
//! ```
//!
//! Arguments are passed as separate argv entries, never through a shell.
//! Only the exit status is inspected; stderr is kept for the error report.
//! There is no retry.

use crate::config::{SignConfig, SignerCommand};
use crate::error::{SigningError, SigningResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::trace;

/// Signs a single file
pub trait Signer: Send + Sync {
    /// Sign `path`, returning once the signature is written or has failed
    fn sign(&self, path: &Path) -> SigningResult<()>;
}

impl<F> Signer for F
where
    F: Fn(&Path) -> SigningResult<()> + Send + Sync,
{
    fn sign(&self, path: &Path) -> SigningResult<()> {
        self(path)
    }
}

/// Signs files by running an external signer process
#[derive(Debug, Clone)]
pub struct ProcessSigner {
    command: SignerCommand,
    key_path: PathBuf,
}

impl ProcessSigner {
    /// Create a signer for the given command and key
    pub fn new(command: SignerCommand, key_path: impl Into<PathBuf>) -> Self {
        Self {
            command,
            key_path: key_path.into(),
        }
    }

    /// Create a signer from the run configuration
    pub fn from_config(config: &SignConfig) -> Self {
        Self::new(config.signer.clone(), config.key_path.clone())
    }

    /// Argument vector for signing `path`
    pub fn args_for(&self, path: &Path) -> Vec<OsString> {
        vec![
            OsString::from(&self.command.operation),
            OsString::from(&self.command.key_flag),
            self.key_path.clone().into_os_string(),
            path.as_os_str().to_os_string(),
        ]
    }
}

impl Signer for ProcessSigner {
    fn sign(&self, path: &Path) -> SigningResult<()> {
        trace!(program = %self.command.program, path = %path.display(), "Running signer");

        let output = Command::new(&self.command.program)
            .args(self.args_for(path))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| SigningError::Launch {
                path: path.to_path_buf(),
                program: self.command.program.clone(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            return Ok(());
        }

        Err(SigningError::Failed {
            path: path.to_path_buf(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
