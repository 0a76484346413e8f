// path_kernel/roots.rs
//! Process-wide `AllowedRoots` holder (spec §3, §4.1, §9).
//!
//! Modeled as a single holder with an explicit initialization lifecycle:
//! created empty at boot, replaced wholesale on the host handshake, never
//! mutated in place. Concurrent readers always observe one complete,
//! internally-consistent snapshot — there is no window where half the
//! roots are the old set and half the new one, which an in-place mutation
//! of a shared `Vec` could allow under a coarse lock (spec §9: "avoid
//! singletons that mutate mid-request").

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::cancellation::CancelToken;
use crate::error::FsResult;

/// Holder for the process-wide allowed roots. An empty holder is legal —
/// it makes every path-consuming operation deny by construction (spec §3).
///
/// Guarded by a `std::sync::RwLock`, the same strategy `BatchIO` uses to
/// guard its metadata cache with a `Mutex` — readers take a shared lock,
/// the rare writer (boot, host handshake) takes an exclusive one and
/// swaps in a whole new `Arc<Vec<_>>`, so a reader never observes a
/// half-updated root list.
pub struct AllowedRoots {
    snapshot: RwLock<Arc<Vec<PathBuf>>>,
}

impl Default for AllowedRoots {
    fn default() -> Self {
        Self::new()
    }
}

impl AllowedRoots {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// An immutable snapshot of the current roots. Cheap to clone (`Arc`),
    /// safe to hold across a whole request without re-reading the holder.
    pub fn snapshot(&self) -> Arc<Vec<PathBuf>> {
        self.snapshot.read().unwrap().clone()
    }

    /// Canonicalizes each input path, discards entries that don't exist,
    /// aren't readable, or aren't directories, and atomically swaps in the
    /// survivors as the new root set (spec §4.1 `setAllowedRoots`).
    ///
    /// `cancel` is checked between candidates so a pathological number of
    /// roots (e.g. a misbehaving host handshake) can still be aborted.
    pub async fn set(&self, paths: &[impl AsRef<Path>], cancel: &CancelToken) -> FsResult<usize> {
        let mut survivors = Vec::with_capacity(paths.len());
        for p in paths {
            cancel.check()?;
            let candidate = p.as_ref();
            match tokio::fs::canonicalize(candidate).await {
                Ok(real) => {
                    if tokio::fs::metadata(&real)
                        .await
                        .map(|m| m.is_dir())
                        .unwrap_or(false)
                    {
                        survivors.push(real);
                    }
                }
                Err(_) => continue,
            }
        }
        let count = survivors.len();
        *self.snapshot.write().unwrap() = Arc::new(survivors);
        Ok(count)
    }

    /// True when `real` lies under at least one allowed root (spec §3
    /// invariant 1, §4.1 containment predicate).
    pub fn contains(&self, real: &Path) -> bool {
        let snap = self.snapshot();
        snap.iter().any(|root| within(real, root))
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Stringified roots for the `listRoots` operation (spec §6).
    pub fn list(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }
}

/// Containment predicate (spec §4.1): `child` lies inside `root` iff,
/// after normalization, they're equal or `child` starts with
/// `root + separator`. A bare string-prefix comparison is insufficient:
/// `/home/user-work` must not be considered inside `/home/user` just
/// because the string starts with it.
pub fn within(child: &Path, root: &Path) -> bool {
    if child == root {
        return true;
    }
    child.strip_prefix(root).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn containment_respects_path_component_boundary() {
        let root = Path::new("/home/user");
        assert!(within(Path::new("/home/user"), root));
        assert!(within(Path::new("/home/user/docs/a.txt"), root));
        assert!(!within(Path::new("/home/user-work/a.txt"), root));
        assert!(!within(Path::new("/home/userx"), root));
        assert!(!within(Path::new("/home"), root));
    }

    #[tokio::test]
    async fn set_discards_nonexistent_and_non_directory_entries() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        tokio::fs::write(&file_path, b"x").await.unwrap();

        let roots = AllowedRoots::new();
        let count = roots
            .set(
                &[
                    dir.path().to_path_buf(),
                    file_path,
                    dir.path().join("does-not-exist"),
                ],
                &CancelToken::none(),
            )
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(roots.contains(&tokio::fs::canonicalize(dir.path()).await.unwrap()));
    }

    #[tokio::test]
    async fn empty_holder_denies_everything() {
        let roots = AllowedRoots::new();
        assert!(roots.is_empty());
        assert!(!roots.contains(Path::new("/")));
    }
}
