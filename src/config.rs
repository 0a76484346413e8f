// config.rs
//! Process configuration (spec §6, §10.4): CLI flags parsed with `clap`'s
//! derive API plus the relevant environment variables. This is the
//! ambient configuration layer the CLI binary builds once at startup and
//! threads down into the path kernel and sensitive-path policy.

use std::path::PathBuf;

use clap::Parser;

use crate::diagnostics;
use crate::path_kernel::SensitivePolicy;

/// `fs-context-cli` — a single-shot smoke-test CLI over the operations
/// table in spec §6. The request-transport layer itself (line-delimited
/// JSON-RPC, HTTP with session IDs) stays out of scope (spec §1); this
/// only wires argument parsing, logging initialization, and a thin
/// subcommand dispatch so the core can be exercised from a shell.
#[derive(Parser, Debug)]
#[command(name = "fs-context-cli", version, about = "Sandboxed filesystem access for autonomous agents")]
pub struct Cli {
    /// Directories to allow access to. At least one is required unless
    /// `--allow-cwd` is passed.
    #[arg(value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// Permit the current working directory as an implicit allowed root.
    #[arg(long)]
    pub allow_cwd: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// List the currently allowed roots.
    ListRoots,
    /// List a directory's immediate (or recursive) entries.
    List {
        path: String,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        include_hidden: bool,
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Glob-search for file paths matching a pattern.
    Search {
        path: String,
        pattern: String,
        #[arg(long)]
        max_results: Option<usize>,
    },
    /// Search file contents for a pattern.
    Grep {
        path: String,
        pattern: String,
        #[arg(long)]
        is_literal: bool,
        #[arg(long)]
        whole_word: bool,
    },
    /// Read a file (full content by default).
    Read {
        path: String,
        #[arg(long)]
        head: Option<usize>,
        #[arg(long)]
        tail: Option<usize>,
    },
    /// Print file or directory metadata.
    Stat { path: String },
    /// Print a directory tree.
    Tree {
        path: String,
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Print the content hash of a file or directory.
    Hash { path: String },
    /// Print a unified diff between two files.
    Diff { original: String, modified: String },
}

/// Validates CLI-level constraints (spec §6 CLI surface): null bytes,
/// Windows reserved device names, and
/// drive-relative paths are rejected before any path-kernel validation
/// runs, since those are parse-time shape problems, not containment
/// problems.
pub fn validate_cli_path(input: &str) -> Result<(), String> {
    if input.as_bytes().contains(&0) {
        return Err("path contains a NUL byte".to_string());
    }
    let upper = input.to_ascii_uppercase();
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    let stem = upper.split('.').next().unwrap_or(&upper);
    if RESERVED.contains(&stem) {
        return Err(format!("'{input}' is a reserved device name"));
    }
    if is_drive_relative(input) {
        return Err(format!("'{input}' is a drive-relative path; use an absolute path"));
    }
    Ok(())
}

/// `C:foo` (drive letter, no following separator) is drive-relative and
/// resolves against a per-drive working directory Rust's `Path` APIs
/// don't model — rejected outright rather than guessed at (spec §6).
fn is_drive_relative(input: &str) -> bool {
    let bytes = input.as_bytes();
    if bytes.len() < 2 || !bytes[0].is_ascii_alphabetic() || bytes[1] != b':' {
        return false;
    }
    !matches!(bytes.get(2), Some(b'/') | Some(b'\\'))
}

/// Process-wide configuration assembled from CLI flags and environment
/// variables (spec §10.4). `FS_CONTEXT_*` is the single resolved prefix
/// (spec §9 open question) — `FILESYSTEM_CONTEXT_*` seen in one source
/// path is intentionally not honored.
pub struct Config {
    pub diagnostics_enabled: bool,
    pub diagnostics_detail: diagnostics::PathDetail,
    pub sensitive_policy: SensitivePolicy,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            diagnostics_enabled: diagnostics::enabled(),
            diagnostics_detail: diagnostics::PathDetail::from_env(),
            sensitive_policy: SensitivePolicy::from_env(),
        }
    }

    /// Initializes the `tracing` subscriber the CLI binary uses, honoring
    /// `RUST_LOG` via `EnvFilter` (spec §10.2).
    pub fn init_logging() {
        use tracing_subscriber::{fmt, EnvFilter};
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nul_byte() {
        assert!(validate_cli_path("bad\0path").is_err());
    }

    #[test]
    fn rejects_reserved_device_names() {
        assert!(validate_cli_path("CON").is_err());
        assert!(validate_cli_path("com1.txt").is_err());
    }

    #[test]
    fn rejects_drive_relative_paths() {
        assert!(validate_cli_path("C:foo").is_err());
    }

    #[test]
    fn accepts_absolute_drive_paths() {
        assert!(validate_cli_path("C:\\foo").is_ok());
        assert!(validate_cli_path("C:/foo").is_ok());
    }

    #[test]
    fn accepts_ordinary_paths() {
        assert!(validate_cli_path("/home/user/docs").is_ok());
    }
}
