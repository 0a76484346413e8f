// path_kernel/mod.rs
//! Path-safety kernel (spec §4.1, C1).
//!
//! The one component every other component goes through before it ever
//! touches a caller-supplied path. `normalize` does no I/O; everything
//! else resolves symlinks and re-checks containment afterward, because a
//! path that starts inside an allowed root can still point outside it via
//! a symlink.

pub mod roots;
pub mod sensitive;

use std::path::{Path, PathBuf};

use crate::cancellation::CancelToken;
use crate::error::{ErrorKind, FsContextError, FsResult};
use crate::windows::ensure_long_path_prefix;
pub use roots::{within, AllowedRoots};
pub use sensitive::SensitivePolicy;

/// Expands `~` to the home directory and resolves the input to an absolute
/// path against the current working directory. Does **no** filesystem I/O
/// (spec §4.1 `normalize`) — existence and containment are separate steps.
pub fn normalize(input: &str) -> FsResult<PathBuf> {
    if input.as_bytes().contains(&0) {
        return Err(FsContextError::invalid_input("path contains a NUL byte"));
    }

    let expanded = expand_home(input);
    let path = Path::new(&expanded);

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(FsContextError::from)?
            .join(path)
    };

    Ok(lowercase_windows_drive(lexically_clean(&absolute)))
}

fn expand_home(input: &str) -> String {
    if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    } else if input == "~" {
        if let Some(home) = home_dir() {
            return home.to_string_lossy().into_owned();
        }
    }
    input.to_string()
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Collapses `.` and lexical `..` components without touching the
/// filesystem (a `..` that would escape the root through a symlink is
/// caught later, by [`validate_existing_path`]'s real-path re-check, not
/// here).
fn lexically_clean(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(comp);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(windows)]
fn lowercase_windows_drive(path: PathBuf) -> PathBuf {
    let s = path.to_string_lossy();
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(d), Some(':')) if d.is_ascii_alphabetic() => {
            let rest = &s[2..];
            PathBuf::from(format!("{}:{}", d.to_ascii_lowercase(), rest))
        }
        _ => path,
    }
}

#[cfg(not(windows))]
fn lowercase_windows_drive(path: PathBuf) -> PathBuf {
    path
}

/// Result of [`validate_existing_path_detailed`]: the resolved real path
/// plus whether the original input was itself a symlink, so callers like
/// the tree builder and glob engine can render "not followed" correctly
/// without re-doing the lstat.
pub struct ValidatedPath {
    pub real_path: PathBuf,
    pub was_symlink: bool,
}

/// `normalize` -> check-against-roots -> real-path resolution ->
/// re-check-against-roots (spec §4.1 `validateExistingPath`).
///
/// Fails `E_ACCESS_DENIED` if either containment check fails,
/// `E_SYMLINK_NOT_ALLOWED` when a symlink target escapes, `E_NOT_FOUND` if
/// the path does not exist. Errors always carry the *original* input
/// string, never the resolved real path (spec §4.1 failure model).
pub async fn validate_existing_path(
    input: &str,
    roots: &AllowedRoots,
    cancel: &CancelToken,
) -> FsResult<PathBuf> {
    Ok(validate_existing_path_detailed(input, roots, cancel)
        .await?
        .real_path)
}

pub async fn validate_existing_path_detailed(
    input: &str,
    roots: &AllowedRoots,
    cancel: &CancelToken,
) -> FsResult<ValidatedPath> {
    cancel.check()?;
    let normalized = normalize(input)?;

    if roots.is_empty() || !roots.contains(&normalized) {
        return Err(FsContextError::access_denied(input));
    }

    let prefixed = ensure_long_path_prefix(&normalized);
    let meta = tokio::fs::symlink_metadata(&prefixed)
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FsContextError::not_found(input)
            } else {
                FsContextError::from_io(&e, input)
            }
        })?;
    let was_symlink = meta.file_type().is_symlink();

    cancel.check()?;
    let real_path = tokio::fs::canonicalize(&normalized).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FsContextError::not_found(input)
        } else {
            FsContextError::from_io(&e, input)
        }
    })?;

    if !roots.contains(&real_path) {
        return if was_symlink {
            Err(FsContextError::symlink_not_allowed(input))
        } else {
            Err(FsContextError::access_denied(input))
        };
    }

    Ok(ValidatedPath { real_path, was_symlink })
}

/// Validates the *parent* directory against roots and forbids writing
/// through a symlink whose target escapes; the final path component need
/// not exist yet (spec §4.1 `validatePathForWrite`).
pub async fn validate_path_for_write(
    input: &str,
    roots: &AllowedRoots,
    cancel: &CancelToken,
) -> FsResult<PathBuf> {
    cancel.check()?;
    let normalized = normalize(input)?;

    let parent = normalized
        .parent()
        .ok_or_else(|| FsContextError::invalid_input("path has no parent directory"))?;

    if roots.is_empty() || !roots.contains(&normalized) {
        return Err(FsContextError::access_denied(input));
    }

    let real_parent = tokio::fs::canonicalize(parent).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FsContextError::not_found(input)
        } else {
            FsContextError::from_io(&e, input)
        }
    })?;

    if !roots.contains(&real_parent) {
        return Err(FsContextError::access_denied(input));
    }

    let file_name = normalized
        .file_name()
        .ok_or_else(|| FsContextError::invalid_input("path has no file name"))?;
    Ok(real_parent.join(file_name))
}

/// Checks whether `path` or its resolved form matches the sensitive-path
/// policy (spec §4.1). Listings filter these silently; `stat` on one
/// fails `E_ACCESS_DENIED` (see `operations::stat`).
pub fn is_sensitive(path: &Path, policy: &SensitivePolicy) -> bool {
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    policy.is_sensitive(&basename, path)
}

/// Maps the outward `E_ACCESS_DENIED` used when a sensitive `stat` target
/// is hit, matching the error-kind chosen in spec §4.1.
pub fn sensitive_stat_error(input: &str) -> FsContextError {
    FsContextError::new(ErrorKind::AccessDenied, "path matches the sensitive-path policy")
        .with_path(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rejects_nul_bytes() {
        assert!(normalize("bad\0path").is_err());
    }

    #[test]
    fn normalize_collapses_dot_components() {
        let p = normalize("/a/./b/../c").unwrap();
        assert_eq!(p, PathBuf::from("/a/c"));
    }

    #[test]
    fn normalize_expands_home_shorthand() {
        std::env::set_var("HOME", "/home/tester");
        let p = normalize("~/docs").unwrap();
        assert_eq!(p, PathBuf::from("/home/tester/docs"));
    }

    #[tokio::test]
    async fn validate_rejects_paths_outside_roots() {
        let roots = AllowedRoots::new();
        let dir = tempfile::tempdir().unwrap();
        roots
            .set(&[dir.path().to_path_buf()], &CancelToken::none())
            .await
            .unwrap();

        let err = validate_existing_path("/etc/passwd", &roots, &CancelToken::none())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AccessDenied);
        assert_eq!(err.path.as_deref(), Some("/etc/passwd"));
    }

    #[tokio::test]
    async fn validate_rejects_symlink_escaping_roots() {
        let outside = tempfile::tempdir().unwrap();
        let inside = tempfile::tempdir().unwrap();
        let link = inside.path().join("escape");
        #[cfg(unix)]
        std::os::unix::fs::symlink(outside.path(), &link).unwrap();

        let roots = AllowedRoots::new();
        roots
            .set(&[inside.path().to_path_buf()], &CancelToken::none())
            .await
            .unwrap();

        #[cfg(unix)]
        {
            let err = validate_existing_path(
                link.to_str().unwrap(),
                &roots,
                &CancelToken::none(),
            )
            .await
            .unwrap_err();
            assert_eq!(err.kind, ErrorKind::SymlinkNotAllowed);
        }
    }

    #[tokio::test]
    async fn validate_existing_path_fails_not_found_inside_roots() {
        let dir = tempfile::tempdir().unwrap();
        let roots = AllowedRoots::new();
        roots
            .set(&[dir.path().to_path_buf()], &CancelToken::none())
            .await
            .unwrap();

        let missing = dir.path().join("nope.txt");
        let err = validate_existing_path(missing.to_str().unwrap(), &roots, &CancelToken::none())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
