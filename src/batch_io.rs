// batch_io.rs
//! Lazy, cached metadata lookups for the glob engine (spec §4.5: "stats
//! lazily and only if the caller requested stats or the kind probe is
//! needed"). A short TTL keeps a single traversal from re-`stat`ing the
//! same path twice (common when a pattern and its hidden-file variant
//! both resolve to the same entry) without risking stale results across
//! requests.

use crate::error::GlobError;
use lru::LruCache;
use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};

const METADATA_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CachedMetadata {
    metadata: fs::Metadata,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct BatchIO {
    metadata_cache: Mutex<LruCache<PathBuf, CachedMetadata>>,
    follow_symlinks: bool,
}

impl BatchIO {
    pub fn new(cache_size: usize, follow_symlinks: bool) -> Self {
        Self {
            metadata_cache: Mutex::new(LruCache::new(NonZeroUsize::new(cache_size).unwrap())),
            follow_symlinks,
        }
    }

    /// `stat` (follows symlinks) or `lstat` depending on `follow_symlinks`,
    /// cached with a short TTL.
    pub fn stat(&self, path: &Path) -> Result<fs::Metadata, GlobError> {
        let mut cache = self.metadata_cache.lock().unwrap();

        if let Some(cached) = cache.get(path) {
            if cached.expires_at > Instant::now() {
                return Ok(cached.metadata.clone());
            }
            cache.pop(path);
        }

        let meta = if self.follow_symlinks {
            fs::metadata(path)
        } else {
            fs::symlink_metadata(path)
        }
        .map_err(GlobError::from)?;

        cache.put(
            path.to_path_buf(),
            CachedMetadata {
                metadata: meta.clone(),
                expires_at: Instant::now() + METADATA_CACHE_TTL,
            },
        );

        Ok(meta)
    }

    /// Metadata for a symlink itself, never following it; not cached since
    /// it's called rarely (kind-probe fallback only).
    pub fn stat_symlink(&self, path: &Path) -> Result<fs::Metadata, GlobError> {
        fs::symlink_metadata(path).map_err(GlobError::from)
    }

    pub fn clear_cache(&self) {
        self.metadata_cache.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_caches_across_calls_for_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, b"hi").unwrap();

        let io = BatchIO::new(10, true);
        let m1 = io.stat(&file).unwrap();
        let m2 = io.stat(&file).unwrap();
        assert_eq!(m1.len(), m2.len());
    }

    #[test]
    fn stat_reports_not_found_for_missing_path() {
        let io = BatchIO::new(10, true);
        let err = io.stat(Path::new("/does/not/exist/at/all")).unwrap_err();
        assert!(matches!(err, GlobError::Io(_)));
    }
}
