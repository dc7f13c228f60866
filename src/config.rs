//! Configuration types for evmsign
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - `~/` and `./` path expansion
//! - Reading the list of root directories

use crate::error::ConfigError;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum reasonable number of concurrent signers
pub const MAX_SIGNERS: usize = 1024;

/// Default signer executable (from ima-evm-utils)
pub const DEFAULT_SIGNER: &str = "/usr/bin/evmctl";

/// Default signer operation
pub const DEFAULT_OPERATION: &str = "ima_sign";

/// Default flag that introduces the key path
pub const DEFAULT_KEY_FLAG: &str = "--key";

/// Sign every file under a list of directories with evmctl
#[derive(Parser, Debug, Clone)]
#[command(
    name = "evmsign",
    version,
    about = "Sign files under many directories in parallel using evmctl",
    long_about = "Walks every directory listed in the input file, collects all regular files \
                  (symlinks, sockets, pipes and devices are skipped) and signs each one with \
                  an external signer, running at most --pdgree signers at a time.\n\n\
                  Requires ima-evm-utils (evmctl); signing usually needs root privileges.",
    after_help = "EXAMPLES:\n    \
        evmsign --key ~/keys/privkey_evm.pem --in ./dirs.txt\n    \
        evmsign --key /etc/keys/ima.pem --in dirs.txt -j 8 -v\n    \
        evmsign --key k.pem --in dirs.txt --signer /usr/local/bin/evmctl --operation ima_sign"
)]
pub struct CliArgs {
    /// Signing key passed to the signer
    #[arg(long, value_name = "FILE")]
    pub key: String,

    /// Text file listing one root directory per line
    #[arg(long = "in", value_name = "FILE")]
    pub input: String,

    /// Number of signers running in parallel
    #[arg(short = 'j', long = "pdgree", default_value = "1", value_name = "NUM")]
    pub parallelism: usize,

    /// Signer executable
    #[arg(long, default_value = DEFAULT_SIGNER, value_name = "PROGRAM")]
    pub signer: String,

    /// Operation name passed as the signer's first argument
    #[arg(long, default_value = DEFAULT_OPERATION, value_name = "NAME")]
    pub operation: String,

    /// Flag that precedes the key path
    #[arg(long, default_value = DEFAULT_KEY_FLAG, value_name = "FLAG", allow_hyphen_values = true)]
    pub key_flag: String,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// How the external signer is invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerCommand {
    /// Program to execute
    pub program: String,

    /// Operation name (first argument)
    pub operation: String,

    /// Flag introducing the key path
    pub key_flag: String,
}

impl Default for SignerCommand {
    fn default() -> Self {
        Self {
            program: DEFAULT_SIGNER.to_string(),
            operation: DEFAULT_OPERATION.to_string(),
            key_flag: DEFAULT_KEY_FLAG.to_string(),
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct SignConfig {
    /// Signing key (normalized)
    pub key_path: PathBuf,

    /// Roots file (normalized)
    pub roots_file: PathBuf,

    /// Maximum number of in-flight signer invocations
    pub concurrency: usize,

    /// Signer invocation
    pub signer: SignerCommand,

    /// Show progress indicator
    pub show_progress: bool,
}

impl SignConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.parallelism == 0 || args.parallelism > MAX_SIGNERS {
            return Err(ConfigError::InvalidConcurrency {
                count: args.parallelism,
                max: MAX_SIGNERS,
            });
        }

        if args.signer.trim().is_empty() {
            return Err(ConfigError::EmptySigner);
        }

        let key_path = normalize_path(&args.key)?;
        if !key_path.exists() {
            return Err(ConfigError::KeyNotFound { path: key_path });
        }

        let roots_file = normalize_path(&args.input)?;

        Ok(Self {
            key_path,
            roots_file,
            concurrency: args.parallelism,
            signer: SignerCommand {
                program: args.signer,
                operation: args.operation,
                key_flag: args.key_flag,
            },
            show_progress: !args.quiet,
        })
    }

    /// Build a configuration directly, without CLI parsing or validation
    pub fn new(key_path: impl Into<PathBuf>, concurrency: usize) -> Self {
        Self {
            key_path: key_path.into(),
            roots_file: PathBuf::new(),
            concurrency: concurrency.max(1),
            signer: SignerCommand::default(),
            show_progress: false,
        }
    }

    /// Read and normalize the root directories listed in `roots_file`
    pub fn load_roots(&self) -> Result<Vec<PathBuf>, ConfigError> {
        read_roots(&self.roots_file)?
            .iter()
            .map(|root| normalize_path(root))
            .collect()
    }
}

/// Expand a leading `~/` into `home` and a leading `./` into `cwd`
///
/// Anything else is returned unchanged.
pub fn expand_path(src: &str, home: Option<&Path>, cwd: Option<&Path>) -> Option<PathBuf> {
    if let Some(rest) = src.strip_prefix("~/") {
        return home.map(|h| h.join(rest));
    }
    if let Some(rest) = src.strip_prefix("./") {
        if let Some(cwd) = cwd {
            return Some(cwd.join(rest));
        }
    }
    Some(PathBuf::from(src))
}

/// Expand `~/` and `./` using the current user's home and working directory
pub fn normalize_path(src: &str) -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir();
    let cwd = std::env::current_dir().ok();
    expand_path(src, home.as_deref(), cwd.as_deref()).ok_or_else(|| ConfigError::NoHomeDir {
        path: src.to_string(),
    })
}

/// Read root directories, one per line
///
/// Trailing carriage returns are stripped and blank lines skipped.
/// Order and duplicates are preserved.
pub fn read_roots(path: &Path) -> Result<Vec<String>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::UnreadableRoots {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let roots = parse_roots(&contents);
    if roots.is_empty() {
        return Err(ConfigError::NoRoots {
            path: path.to_path_buf(),
        });
    }
    Ok(roots)
}

fn parse_roots(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(key: &str, input: &str, parallelism: usize) -> CliArgs {
        CliArgs {
            key: key.to_string(),
            input: input.to_string(),
            parallelism,
            signer: DEFAULT_SIGNER.to_string(),
            operation: DEFAULT_OPERATION.to_string(),
            key_flag: DEFAULT_KEY_FLAG.to_string(),
            quiet: false,
            verbose: false,
        }
    }

    #[test]
    fn test_expand_home_prefix() {
        let home = Path::new("/home/alice");
        let expanded = expand_path("~/keys/evm.pem", Some(home), None).unwrap();
        assert_eq!(expanded, PathBuf::from("/home/alice/keys/evm.pem"));

        assert_eq!(expand_path("~/x", None, None), None);
    }

    #[test]
    fn test_expand_cwd_prefix() {
        let cwd = Path::new("/srv/work");
        let expanded = expand_path("./dirs.txt", None, Some(cwd)).unwrap();
        assert_eq!(expanded, PathBuf::from("/srv/work/dirs.txt"));
    }

    #[test]
    fn test_expand_leaves_other_paths_alone() {
        let home = Path::new("/home/alice");
        let cwd = Path::new("/srv");
        for p in ["/usr/lib", "relative/dir", "~user/x", "../up"] {
            assert_eq!(expand_path(p, Some(home), Some(cwd)).unwrap(), PathBuf::from(p));
        }
    }

    #[test]
    fn test_parse_roots_skips_blank_lines() {
        let roots = parse_roots("/usr/bin\r\n\n   \n/opt/app\n/usr/bin\n");
        assert_eq!(roots, vec!["/usr/bin", "/opt/app", "/usr/bin"]);
    }

    #[test]
    fn test_read_roots_errors() {
        let dir = tempdir().unwrap();

        let missing = dir.path().join("nope.txt");
        assert!(matches!(
            read_roots(&missing),
            Err(ConfigError::UnreadableRoots { .. })
        ));

        let empty = dir.path().join("empty.txt");
        fs::write(&empty, "\n\n").unwrap();
        assert!(matches!(read_roots(&empty), Err(ConfigError::NoRoots { .. })));
    }

    #[test]
    fn test_from_args_validation() {
        let dir = tempdir().unwrap();
        let key = dir.path().join("key.pem");
        fs::write(&key, "key").unwrap();
        let key = key.to_str().unwrap();

        assert!(matches!(
            SignConfig::from_args(args(key, "dirs.txt", 0)),
            Err(ConfigError::InvalidConcurrency { count: 0, .. })
        ));
        assert!(matches!(
            SignConfig::from_args(args(key, "dirs.txt", MAX_SIGNERS + 1)),
            Err(ConfigError::InvalidConcurrency { .. })
        ));
        assert!(matches!(
            SignConfig::from_args(args("/definitely/not/here.pem", "dirs.txt", 1)),
            Err(ConfigError::KeyNotFound { .. })
        ));

        let mut blank_signer = args(key, "dirs.txt", 1);
        blank_signer.signer = "  ".into();
        assert!(matches!(
            SignConfig::from_args(blank_signer),
            Err(ConfigError::EmptySigner)
        ));

        let config = SignConfig::from_args(args(key, "/tmp/dirs.txt", 4)).unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.roots_file, PathBuf::from("/tmp/dirs.txt"));
        assert_eq!(config.signer, SignerCommand::default());
        assert!(config.show_progress);
    }

    #[test]
    fn test_load_roots() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("dirs.txt");
        fs::write(&list, "/a\n/b/c\n").unwrap();

        let mut config = SignConfig::new("/k.pem", 2);
        config.roots_file = list;

        let roots = config.load_roots().unwrap();
        assert_eq!(roots, vec![PathBuf::from("/a"), PathBuf::from("/b/c")]);
    }

    #[test]
    fn test_cli_parsing() {
        let parsed = CliArgs::try_parse_from([
            "evmsign", "--key", "k.pem", "--in", "dirs.txt", "--pdgree", "3", "--key-flag", "-k",
        ])
        .unwrap();
        assert_eq!(parsed.parallelism, 3);
        assert_eq!(parsed.input, "dirs.txt");
        assert_eq!(parsed.key_flag, "-k");
        assert_eq!(parsed.signer, DEFAULT_SIGNER);

        assert!(CliArgs::try_parse_from(["evmsign", "--key", "k.pem"]).is_err());
    }
}
