// mutations.rs
//! `write` / `mkdir` / `mv` / `rm` (spec §6).
//!
//! Every mutation target is validated through the path kernel first —
//! `write`/`mkdir` validate the *parent* (the final component need not
//! exist yet), `mv`'s destination likewise, `rm` validates the existing
//! path directly. File writes go through a temp-file-plus-rename so a
//! single file write is atomic at the filesystem-rename level (spec §1:
//! "best-effort atomic at the single-file level... no cross-file
//! transactions").

use std::path::Path;

use crate::cancellation::CancelToken;
use crate::error::{FsContextError, FsResult};
use crate::path_kernel::{self, AllowedRoots};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MutationStatus {
    pub ok: bool,
}

const STATUS_OK: MutationStatus = MutationStatus { ok: true };

/// Writes `content` to `path` via a temp file in the same directory,
/// renamed into place — `rename` is atomic on the same filesystem, which
/// is what "best-effort atomic at the single-file level" (spec §1) means
/// in practice.
pub async fn write(
    path: &str,
    content: &[u8],
    roots: &AllowedRoots,
    cancel: &CancelToken,
) -> FsResult<MutationStatus> {
    let target = path_kernel::validate_path_for_write(path, roots, cancel).await?;
    let parent = target.parent().ok_or_else(|| {
        FsContextError::invalid_input("path has no parent directory")
    })?;

    let tmp_name = format!(".{}.tmp-{}", file_name_or(&target, "file"), std::process::id());
    let tmp_path = parent.join(tmp_name);

    tokio::fs::write(&tmp_path, content)
        .await
        .map_err(|e| FsContextError::from_io(&e, path))?;

    if let Err(e) = tokio::fs::rename(&tmp_path, &target).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(FsContextError::from_io(&e, path));
    }

    Ok(STATUS_OK)
}

/// Creates a directory (and any missing parents), validated against roots
/// the same way `write` validates its parent.
pub async fn mkdir(path: &str, roots: &AllowedRoots, cancel: &CancelToken) -> FsResult<MutationStatus> {
    let target = path_kernel::validate_path_for_write(path, roots, cancel).await?;
    tokio::fs::create_dir_all(&target)
        .await
        .map_err(|e| FsContextError::from_io(&e, path))?;
    Ok(STATUS_OK)
}

/// Moves/renames `from` to `to`. Both endpoints are independently
/// validated: `from` must exist inside the roots, `to`'s parent must be
/// inside the roots (the destination file itself need not exist yet).
pub async fn mv(
    from: &str,
    to: &str,
    roots: &AllowedRoots,
    cancel: &CancelToken,
) -> FsResult<MutationStatus> {
    let source = path_kernel::validate_existing_path(from, roots, cancel).await?;
    let destination = path_kernel::validate_path_for_write(to, roots, cancel).await?;

    tokio::fs::rename(&source, &destination)
        .await
        .map_err(|e| FsContextError::from_io(&e, from))?;
    Ok(STATUS_OK)
}

/// Removes a file or directory. Non-recursive deletes on a non-empty
/// directory fail `E_INVALID_INPUT` pointing callers at `recursive: true`
/// (spec §7) rather than surfacing the raw `ENOTEMPTY`.
pub async fn rm(
    path: &str,
    recursive: bool,
    roots: &AllowedRoots,
    cancel: &CancelToken,
) -> FsResult<MutationStatus> {
    let target = path_kernel::validate_existing_path(path, roots, cancel).await?;
    let meta = tokio::fs::symlink_metadata(&target)
        .await
        .map_err(|e| FsContextError::from_io(&e, path))?;

    if meta.is_dir() {
        if recursive {
            tokio::fs::remove_dir_all(&target)
                .await
                .map_err(|e| FsContextError::from_io(&e, path))?;
        } else {
            let mut entries = tokio::fs::read_dir(&target)
                .await
                .map_err(|e| FsContextError::from_io(&e, path))?;
            if entries
                .next_entry()
                .await
                .map_err(|e| FsContextError::from_io(&e, path))?
                .is_some()
            {
                return Err(FsContextError::invalid_input(
                    "directory is not empty; pass recursive=true to delete it anyway",
                )
                .with_path(path));
            }
            tokio::fs::remove_dir(&target)
                .await
                .map_err(|e| FsContextError::from_io(&e, path))?;
        }
    } else {
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| FsContextError::from_io(&e, path))?;
    }

    Ok(STATUS_OK)
}

fn file_name_or<'a>(path: &'a Path, default: &'a str) -> std::borrow::Cow<'a, str> {
    path.file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or(std::borrow::Cow::Borrowed(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn roots_for(dir: &Path) -> AllowedRoots {
        let roots = AllowedRoots::new();
        roots.set(&[dir.to_path_buf()], &CancelToken::none()).await.unwrap();
        roots
    }

    #[tokio::test]
    async fn write_creates_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let roots = roots_for(dir.path()).await;
        let target = dir.path().join("out.txt");

        write(target.to_str().unwrap(), b"hello", &roots, &CancelToken::none())
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"hello");
        // no leftover temp file
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(e) = entries.next_entry().await.unwrap() {
            names.push(e.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["out.txt".to_string()]);
    }

    #[tokio::test]
    async fn mkdir_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let roots = roots_for(dir.path()).await;
        let target = dir.path().join("a/b/c");

        mkdir(target.to_str().unwrap(), &roots, &CancelToken::none()).await.unwrap();
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn mv_renames_file() {
        let dir = tempfile::tempdir().unwrap();
        let roots = roots_for(dir.path()).await;
        let src = dir.path().join("a.txt");
        tokio::fs::write(&src, b"content").await.unwrap();
        let dst = dir.path().join("b.txt");

        mv(src.to_str().unwrap(), dst.to_str().unwrap(), &roots, &CancelToken::none())
            .await
            .unwrap();

        assert!(!src.exists());
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn rm_non_recursive_on_nonempty_dir_fails_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let roots = roots_for(dir.path()).await;
        let sub = dir.path().join("sub");
        tokio::fs::create_dir(&sub).await.unwrap();
        tokio::fs::write(sub.join("f.txt"), b"x").await.unwrap();

        let err = rm(sub.to_str().unwrap(), false, &roots, &CancelToken::none())
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidInput);
        assert!(err.message.contains("recursive"));
    }

    #[tokio::test]
    async fn rm_recursive_deletes_nonempty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let roots = roots_for(dir.path()).await;
        let sub = dir.path().join("sub");
        tokio::fs::create_dir(&sub).await.unwrap();
        tokio::fs::write(sub.join("f.txt"), b"x").await.unwrap();

        rm(sub.to_str().unwrap(), true, &roots, &CancelToken::none()).await.unwrap();
        assert!(!sub.exists());
    }

    #[tokio::test]
    async fn write_outside_roots_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let roots = roots_for(dir.path()).await;

        let err = write(
            other.path().join("x.txt").to_str().unwrap(),
            b"nope",
            &roots,
            &CancelToken::none(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::AccessDenied);
    }
}
