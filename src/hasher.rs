// hasher.rs
//! Streaming SHA-256 hasher (spec §4.10, C10).
//!
//! File hashing streams through `sha2`; directory hashing enumerates via
//! the glob engine (C5), hashes files with bounded concurrency (`rayon`,
//! since SHA-256 is CPU-bound, not I/O-bound — a better fit than another
//! tokio task per file), then feeds a length-delimited composite digest.
//! The framing is load-bearing (spec §9): `uint32_be(pathLen) || pathBytes
//! || digest` per file, over byte-wise-sorted relative paths, makes the
//! result unambiguous and stable across path separators (spec §3
//! invariant 5, §8 P4).

use std::path::{Path, PathBuf};

use futures::StreamExt;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::cancellation::CancelToken;
use crate::error::{FsContextError, FsResult};
use crate::gitignore::IgnoreFilter;
use crate::glob_engine::{self, GlobRequest};
use crate::model::EntryKind;

const STREAM_CHUNK: usize = 64 * 1024;

/// Streams a single file through SHA-256 and returns its hex digest.
pub async fn hash_file(path: &Path, cancel: &CancelToken) -> FsResult<String> {
    let path_str = path.to_string_lossy().into_owned();
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| FsContextError::from_io(&e, &path_str))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; STREAM_CHUNK];
    loop {
        cancel.check()?;
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| FsContextError::from_io(&e, &path_str))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex(&hasher.finalize()))
}

pub struct DirectoryHash {
    pub hash: String,
    pub file_count: usize,
}

/// Enumerates `root` via the glob engine (optionally honoring
/// `.gitignore`), hashes each file with bounded CPU-bound concurrency,
/// sorts byte-wise by `/`-normalized relative path, then folds into one
/// composite digest (spec §4.10).
pub async fn hash_directory(
    root: &Path,
    include_ignored: bool,
    cancel: &CancelToken,
) -> FsResult<DirectoryHash> {
    let ignore = IgnoreFilter::load(root, include_ignored);

    let mut glob_req = GlobRequest::new(root.to_path_buf(), "**/*");
    glob_req.only_files = true;
    glob_req.suppress_errors = true;

    let mut relative_paths: Vec<(String, PathBuf)> = Vec::new();
    let entries = glob_engine::stream(glob_req, cancel.child())?;
    futures::pin_mut!(entries);

    while let Some(entry) = entries.next().await {
        cancel.check()?;
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if entry.kind != EntryKind::File {
            continue;
        }
        if ignore.is_ignored(&entry.absolute_path, false) {
            continue;
        }
        let relative = entry
            .absolute_path
            .strip_prefix(root)
            .unwrap_or(&entry.absolute_path)
            .to_string_lossy()
            .replace('\\', "/");
        relative_paths.push((relative, entry.absolute_path));
    }

    relative_paths.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    // Hashing itself is CPU-bound (sha2 over bytes already on disk cache
    // or paged in by a prior read); fan it out with rayon's bounded pool
    // rather than spawning one tokio task per file (spec §10.8).
    let paths_for_hash = relative_paths.clone();
    let hashes: Vec<FsResult<Vec<u8>>> = tokio::task::spawn_blocking(move || {
        paths_for_hash
            .par_iter()
            .map(|(_, abs_path)| {
                let bytes = std::fs::read(abs_path)
                    .map_err(|e| FsContextError::from_io(&e, abs_path.to_string_lossy().as_ref()))?;
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                Ok(hasher.finalize().to_vec())
            })
            .collect()
    })
    .await
    .map_err(|_| FsContextError::cancelled())?;

    let mut composite = Sha256::new();
    for ((relative, _), digest) in relative_paths.iter().zip(hashes.into_iter()) {
        let digest = digest?;
        let path_bytes = relative.as_bytes();
        composite.update((path_bytes.len() as u32).to_be_bytes());
        composite.update(path_bytes);
        composite.update(&digest);
    }

    Ok(DirectoryHash {
        hash: hex(&composite.finalize()),
        file_count: relative_paths.len(),
    })
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn file_hash_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"hello world").unwrap();

        let h1 = hash_file(&path, &CancelToken::none()).await.unwrap();
        let h2 = hash_file(&path, &CancelToken::none()).await.unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[tokio::test]
    async fn directory_hash_stable_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"1").unwrap();
        fs::write(dir.path().join("b.txt"), b"2").unwrap();

        let r1 = hash_directory(dir.path(), false, &CancelToken::none()).await.unwrap();
        let r2 = hash_directory(dir.path(), false, &CancelToken::none()).await.unwrap();
        assert_eq!(r1.hash, r2.hash);
        assert_eq!(r1.file_count, 2);
    }

    #[tokio::test]
    async fn directory_hash_independent_of_path_separator_style() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/a.txt"), b"x").unwrap();

        let result = hash_directory(dir.path(), false, &CancelToken::none()).await.unwrap();
        // A relative path built with a platform separator, then normalized,
        // must fold into the same framing regardless of platform.
        let mut composite = Sha256::new();
        let mut hasher = Sha256::new();
        hasher.update(b"x");
        let digest = hasher.finalize();
        let rel = "sub/a.txt";
        composite.update((rel.len() as u32).to_be_bytes());
        composite.update(rel.as_bytes());
        composite.update(&digest);
        assert_eq!(result.hash, hex(&composite.finalize()));
    }

    #[tokio::test]
    async fn directory_hash_changes_when_content_changes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"1").unwrap();
        let r1 = hash_directory(dir.path(), false, &CancelToken::none()).await.unwrap();

        fs::write(dir.path().join("a.txt"), b"2").unwrap();
        let r2 = hash_directory(dir.path(), false, &CancelToken::none()).await.unwrap();

        assert_ne!(r1.hash, r2.hash);
    }
}
