// error.rs
use std::io;
use thiserror::Error;

/// Pattern-compilation error, as raised by `patterns::brace` and
/// `patterns::micromatch` while turning a caller's glob string into a
/// compiled `GlobSet`/`Regex`. Kept narrow and separate from
/// [`FsContextError`]: this is an internal compile-time failure, not one
/// of the closed outward-facing kinds in spec §3 — it gets folded into
/// `ErrorKind::InvalidPattern` at the operation boundary (see `From` below).
#[derive(Error, Debug, Clone)]
pub enum GlobError {
    /// I/O error from filesystem operations
    #[error("IO error: {0}")]
    Io(String),

    /// Regex compilation error
    #[error("Regex error: {0}")]
    Regex(String),

    /// Invalid pattern syntax
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Walkdir traversal error
    #[error("Walkdir error: {0}")]
    Walkdir(String),

    /// Other unspecified errors
    #[error("Other error: {0}")]
    Other(String),

    /// Brace expansion exceeded maximum depth
    #[error("Brace expansion exceeded maximum depth")]
    BraceExpansionDepth,

    /// Brace expansion exceeded maximum number of expansions
    #[error("Brace expansion exceeded maximum expansions")]
    BraceExpansionCount,

    /// Regex pattern too complex, too long, or flagged as a ReDoS risk
    #[error("Regex pattern too complex or unsafe (possible ReDoS): {0}")]
    RegexTooComplex(String),

    /// Path traversal attempt detected and blocked
    #[error("Path traversal not allowed")]
    PathTraversal,
}

impl From<io::Error> for GlobError {
    fn from(e: io::Error) -> Self {
        GlobError::Io(e.to_string())
    }
}

impl From<regex::Error> for GlobError {
    fn from(e: regex::Error) -> Self {
        GlobError::Regex(e.to_string())
    }
}

impl From<walkdir::Error> for GlobError {
    fn from(e: walkdir::Error) -> Self {
        GlobError::Walkdir(e.to_string())
    }
}

/// Closed set of error categories surfaced to callers (spec §3, §7).
///
/// Every failure path in this crate maps to exactly one of these kinds.
/// The set is closed deliberately: adding a new failure mode means picking
/// the existing kind it most resembles, not growing the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    AccessDenied,
    NotFound,
    NotFile,
    NotDirectory,
    TooLarge,
    BinaryFile,
    Timeout,
    Cancelled,
    InvalidPattern,
    InvalidInput,
    PermissionDenied,
    SymlinkNotAllowed,
    PathTraversal,
    Unknown,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::AccessDenied => "E_ACCESS_DENIED",
            ErrorKind::NotFound => "E_NOT_FOUND",
            ErrorKind::NotFile => "E_NOT_FILE",
            ErrorKind::NotDirectory => "E_NOT_DIRECTORY",
            ErrorKind::TooLarge => "E_TOO_LARGE",
            ErrorKind::BinaryFile => "E_BINARY_FILE",
            ErrorKind::Timeout => "E_TIMEOUT",
            ErrorKind::Cancelled => "E_CANCELLED",
            ErrorKind::InvalidPattern => "E_INVALID_PATTERN",
            ErrorKind::InvalidInput => "E_INVALID_INPUT",
            ErrorKind::PermissionDenied => "E_PERMISSION_DENIED",
            ErrorKind::SymlinkNotAllowed => "E_SYMLINK_NOT_ALLOWED",
            ErrorKind::PathTraversal => "E_PATH_TRAVERSAL",
            ErrorKind::Unknown => "E_UNKNOWN",
        }
    }
}

/// A user-facing error, carrying the kind plus the original (never
/// resolved) user-supplied path and an optional remediation hint.
///
/// §4.1's failure model requires that the *original* path appear in
/// errors, never the symlink-resolved real path — surfacing the real path
/// would leak canonical locations outside the allowed roots.
#[derive(Debug, Error, Clone, serde::Serialize)]
#[error("{kind:?}: {message}")]
pub struct FsContextError {
    pub kind: ErrorKind,
    pub message: String,
    pub path: Option<String>,
    pub suggestion: Option<String>,
}

impl FsContextError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: None,
            suggestion: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn access_denied(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, "path is outside the allowed roots").with_path(path)
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, "no such file or directory").with_path(path)
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotDirectory, "not a directory").with_path(path)
    }

    pub fn not_a_file(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFile, "not a regular file").with_path(path)
    }

    pub fn symlink_not_allowed(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::SymlinkNotAllowed, "symlink target escapes allowed roots")
            .with_path(path)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation was cancelled")
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, "operation exceeded its deadline")
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPattern, message)
    }

    pub fn too_large(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooLarge, "file exceeds the configured size limit").with_path(path)
    }

    pub fn binary_file(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::BinaryFile, "file appears to be binary").with_path(path)
    }

    /// Maps an OS error by kind/errno per the table in spec §7.
    pub fn from_io(err: &io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        let kind = match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::TimedOut => ErrorKind::Timeout,
            _ => match err.raw_os_error() {
                #[cfg(unix)]
                Some(20) => ErrorKind::NotDirectory, // ENOTDIR
                #[cfg(unix)]
                Some(21) => ErrorKind::NotFile, // EISDIR
                #[cfg(unix)]
                Some(40) => ErrorKind::SymlinkNotAllowed, // ELOOP
                _ => ErrorKind::Unknown,
            },
        };
        Self::new(kind, err.to_string()).with_path(path)
    }
}

impl From<io::Error> for FsContextError {
    fn from(err: io::Error) -> Self {
        FsContextError::from_io(&err, "")
    }
}

impl From<walkdir::Error> for FsContextError {
    fn from(err: walkdir::Error) -> Self {
        let path = err
            .path()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        match err.io_error() {
            Some(io_err) => FsContextError::from_io(io_err, path),
            None => FsContextError::new(ErrorKind::Unknown, err.to_string()).with_path(path),
        }
    }
}

impl From<regex::Error> for FsContextError {
    fn from(err: regex::Error) -> Self {
        FsContextError::invalid_pattern(err.to_string())
    }
}

impl From<GlobError> for FsContextError {
    fn from(err: GlobError) -> Self {
        match err {
            GlobError::PathTraversal => FsContextError::new(ErrorKind::PathTraversal, err.to_string()),
            GlobError::RegexTooComplex(msg) => {
                FsContextError::invalid_pattern(format!("{} (possible ReDoS)", msg))
            }
            other => FsContextError::invalid_pattern(other.to_string()),
        }
    }
}

pub type FsResult<T> = Result<T, FsContextError>;
