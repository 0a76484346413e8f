// operations.rs
//! The agent-facing operation surface (spec §6), binding every lower
//! component (C1–C11) together behind the table of operations a
//! transport layer would dispatch to. The transport itself (line-
//! delimited JSON-RPC, HTTP with session IDs) stays out of scope (spec
//! §1) — this module is what such a transport would call.

use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;

use crate::batch_orchestrator::{self, BatchItem};
use crate::cancellation::CancelToken;
use crate::content_scanner::{self, ScanRequest, ScanResult};
use crate::diagnostics::RequestTrace;
use crate::diff;
use crate::error::{FsContextError, FsResult};
use crate::glob_engine::{self, GlobRequest};
use crate::hasher;
use crate::model::{
    to_forward_slash, EntryKind, FileEntry, FileInfo, SearchSummary, StoppedReason,
};
use crate::mutations::{self, MutationStatus};
use crate::path_kernel::{self, AllowedRoots, SensitivePolicy};
use crate::reader::{self, ReadConfig, ReadSpec};
use crate::tree::{self, TreeRequest};

/// Ties the path kernel's allowed-roots holder and sensitive-path policy
/// to every other component; one instance per process (spec §3
/// `AllowedRoots` lifecycle: "created at boot, updated via host
/// handshake, destroyed at process exit").
pub struct Engine {
    pub roots: AllowedRoots,
    pub sensitive: SensitivePolicy,
}

impl Engine {
    pub fn new(sensitive: SensitivePolicy) -> Self {
        Self {
            roots: AllowedRoots::new(),
            sensitive,
        }
    }

    pub async fn set_allowed_roots(&self, paths: &[PathBuf], cancel: &CancelToken) -> FsResult<usize> {
        self.roots.set(paths, cancel).await
    }

    pub fn list_roots(&self) -> Vec<String> {
        self.roots.list()
    }

    // ---- stat / statMany --------------------------------------------

    pub async fn stat(&self, path: &str, cancel: &CancelToken) -> FsResult<FileInfo> {
        let trace = RequestTrace::start("stat", Some(path));
        let result = self.stat_inner(path, cancel).await;
        match &result {
            Ok(_) => {
                trace.finish(true);
            }
            Err(e) => trace.error(&e.message),
        }
        result
    }

    async fn stat_inner(&self, path: &str, cancel: &CancelToken) -> FsResult<FileInfo> {
        let validated = path_kernel::validate_existing_path_detailed(path, &self.roots, cancel).await?;
        let basename = validated
            .real_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.sensitive.is_sensitive(&basename, &validated.real_path) {
            return Err(path_kernel::sensitive_stat_error(path));
        }

        let meta = tokio::fs::symlink_metadata(&validated.real_path)
            .await
            .map_err(|e| FsContextError::from_io(&e, path))?;

        let kind = if validated.was_symlink {
            EntryKind::Symlink
        } else if meta.is_dir() {
            EntryKind::Directory
        } else if meta.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };

        Ok(FileInfo {
            path: path.to_string(),
            kind,
            size: if meta.is_file() { Some(meta.len()) } else { None },
            mtime: mtime_secs(&meta),
            is_symlink: validated.was_symlink,
        })
    }

    pub async fn stat_many(
        &self,
        paths: Vec<String>,
        concurrency: usize,
        cancel: CancelToken,
    ) -> FsResult<Vec<BatchItem<FileInfo>>> {
        let roots = self.roots.snapshot();
        let roots_for_closure = roots.clone();
        let sensitive_patterns = self.sensitive_snapshot_for_tasks();

        batch_orchestrator::run(paths, concurrency, cancel, move |path, cancel| {
            let roots_list = roots_for_closure.clone();
            let sensitive = sensitive_patterns.clone();
            async move {
                let ad_hoc_roots = AllowedRoots::new();
                ad_hoc_roots.set(&roots_list, &CancelToken::none()).await.ok();
                let engine = Engine { roots: ad_hoc_roots, sensitive };
                engine.stat_inner(&path, &cancel).await
            }
        })
        .await
    }

    fn sensitive_snapshot_for_tasks(&self) -> SensitivePolicy {
        // `SensitivePolicy` has no Clone today and is cheap to rebuild from
        // the environment; batch tasks rebuild it rather than sharing a
        // reference across spawned futures with unrelated lifetimes.
        SensitivePolicy::from_env()
    }

    // ---- listDirectory -------------------------------------------------

    pub async fn list_directory(
        &self,
        path: &str,
        recursive: bool,
        include_hidden: bool,
        max_depth: Option<usize>,
        max_entries: usize,
        cancel: CancelToken,
    ) -> FsResult<(Vec<FileEntry>, SearchSummary)> {
        let base = path_kernel::validate_existing_path(path, &self.roots, &cancel).await?;
        let pattern = if recursive { "**/*" } else { "*" };
        let mut req = GlobRequest::new(base.clone(), pattern);
        req.include_hidden = include_hidden;
        req.max_depth = if recursive { max_depth } else { Some(1) };
        req.stats = true;
        req.suppress_errors = true;

        self.collect_entries(base, req, max_entries, usize::MAX, &cancel).await
    }

    // ---- search (glob) --------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn search(
        &self,
        path: &str,
        pattern: &str,
        exclude_patterns: Vec<String>,
        max_results: usize,
        max_depth: Option<usize>,
        max_files_scanned: usize,
        timeout_ms: Option<u64>,
        base_name_match: bool,
        skip_symlinks: bool,
        cancel_parent: &CancelToken,
    ) -> FsResult<(Vec<FileEntry>, SearchSummary)> {
        let (cancel, _guard) = CancelToken::new(
            Some(cancel_parent),
            timeout_ms.map(Duration::from_millis),
        );
        let base = path_kernel::validate_existing_path(path, &self.roots, &cancel).await?;

        let mut req = GlobRequest::new(base.clone(), pattern);
        req.exclude_patterns = exclude_patterns;
        req.base_name_match = base_name_match;
        req.max_depth = max_depth;
        req.follow_symbolic_links = !skip_symlinks;
        req.stats = true;
        req.suppress_errors = true;

        self.collect_entries(base, req, max_results, max_files_scanned, &cancel).await
    }

    /// Shared glob-consumption loop for `listDirectory` and `search`:
    /// streams entries, drops sensitive ones silently, and tracks the
    /// entriesScanned/entriesEmitted counters spec §3 invariant 3 requires
    /// (`entriesScanned >= entriesVisible >= entriesEmitted`).
    async fn collect_entries(
        &self,
        base: PathBuf,
        req: GlobRequest,
        max_results: usize,
        max_files_scanned: usize,
        cancel: &CancelToken,
    ) -> FsResult<(Vec<FileEntry>, SearchSummary)> {
        let mut entries_scanned = 0usize;
        let mut results = Vec::new();
        let mut truncated = false;
        let mut stopped_reason = None;

        let stream = glob_engine::stream(req, cancel.child())?;
        futures::pin_mut!(stream);

        while let Some(item) = stream.next().await {
            if cancel.check().is_err() {
                truncated = true;
                stopped_reason = Some(StoppedReason::Timeout);
                break;
            }
            if entries_scanned >= max_files_scanned {
                truncated = true;
                stopped_reason = Some(StoppedReason::MaxFiles);
                break;
            }
            if results.len() >= max_results {
                truncated = true;
                stopped_reason = Some(StoppedReason::MaxResults);
                break;
            }

            let entry = match item {
                Ok(e) => e,
                Err(_) => continue,
            };
            entries_scanned += 1;

            let basename = entry
                .absolute_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.sensitive.is_sensitive(&basename, &entry.absolute_path) {
                continue;
            }

            // A symlink's resolved target must be re-checked against the
            // allowed roots (spec §2: "C1 re-validates each entry (symlink
            // case)") — the glob stream only reports the link itself, not
            // where it points.
            let mut symlink_target = None;
            if entry.kind == EntryKind::Symlink {
                match path_kernel::validate_existing_path_detailed(
                    &entry.absolute_path.to_string_lossy(),
                    &self.roots,
                    cancel,
                )
                .await
                {
                    Ok(validated) => {
                        symlink_target = Some(validated.real_path.to_string_lossy().into_owned());
                    }
                    Err(_) => continue,
                }
            }

            let relative = entry.absolute_path.strip_prefix(&base).unwrap_or(&entry.absolute_path);
            results.push(FileEntry {
                name: basename,
                absolute_path: entry.absolute_path.to_string_lossy().into_owned(),
                relative_to_base: to_forward_slash(relative),
                kind: entry.kind,
                size: entry.stats.map(|s| s.size),
                mtime: entry.stats.and_then(|s| s.mtime),
                symlink_target,
            });
        }

        Ok((
            results.clone(),
            SearchSummary {
                matched: results.len(),
                truncated,
                files_scanned: entries_scanned,
                stopped_reason,
            },
        ))
    }

    // ---- searchContent ---------------------------------------------------

    pub async fn search_content(
        &self,
        req: ScanRequest,
        timeout_ms: Option<u64>,
        cancel_parent: &CancelToken,
    ) -> FsResult<ScanResult> {
        let (cancel, _guard) = CancelToken::new(
            Some(cancel_parent),
            timeout_ms.map(Duration::from_millis),
        );
        path_kernel::validate_existing_path(
            req.base.to_string_lossy().as_ref(),
            &self.roots,
            &cancel,
        )
        .await?;
        content_scanner::scan(req, cancel).await
    }

    // ---- read / readMany ---------------------------------------------------

    pub async fn read(
        &self,
        path: &str,
        spec: ReadSpec,
        cfg: &ReadConfig,
        cancel: &CancelToken,
    ) -> FsResult<crate::model::ReadResult> {
        let real = path_kernel::validate_existing_path(path, &self.roots, cancel).await?;
        reader::read(&real, spec, cfg, cancel).await
    }

    pub async fn read_many(
        &self,
        paths: Vec<String>,
        spec: ReadSpec,
        cfg: ReadConfig,
        max_total_size: Option<u64>,
        concurrency: usize,
        cancel: CancelToken,
    ) -> FsResult<Vec<BatchItem<crate::model::ReadResult>>> {
        let mut sizes = Vec::with_capacity(paths.len());
        let mut resolved = Vec::with_capacity(paths.len());
        for (idx, p) in paths.iter().enumerate() {
            match path_kernel::validate_existing_path(p, &self.roots, &cancel).await {
                Ok(real) => {
                    let size = tokio::fs::metadata(&real).await.map(|m| m.len()).unwrap_or(0);
                    sizes.push((idx, size));
                    resolved.push(Some(real));
                }
                Err(_) => resolved.push(None),
            }
        }

        let skipped: std::collections::HashSet<usize> = match max_total_size {
            Some(budget) => {
                let (_, skipped) = batch_orchestrator::partition_by_budget(&sizes, cfg.max_size_hint(&spec), budget);
                skipped.into_iter().collect()
            }
            None => Default::default(),
        };

        let items: Vec<(usize, String)> = paths.into_iter().enumerate().collect();
        let cfg = std::sync::Arc::new(cfg);
        let resolved = std::sync::Arc::new(resolved);
        let skipped = std::sync::Arc::new(skipped);

        batch_orchestrator::run(items, concurrency, cancel, move |(idx, path), cancel| {
            let cfg = cfg.clone();
            let resolved = resolved.clone();
            let skipped = skipped.clone();
            async move {
                if skipped.contains(&idx) {
                    return Err(FsContextError::invalid_input(
                        "skipped: cumulative read size would exceed maxTotalSize",
                    )
                    .with_path(path));
                }
                match resolved.get(idx).cloned().flatten() {
                    Some(real) => reader::read(&real, spec, &cfg, &cancel).await,
                    None => Err(FsContextError::access_denied(path)),
                }
            }
        })
        .await
    }

    // ---- tree ---------------------------------------------------------

    pub async fn tree(
        &self,
        path: &str,
        max_depth: Option<usize>,
        max_entries: usize,
        include_hidden: bool,
        include_ignored: bool,
        timeout_ms: Option<u64>,
        cancel_parent: &CancelToken,
    ) -> FsResult<(crate::model::TreeNode, bool, usize, String)> {
        let (cancel, _guard) = CancelToken::new(
            Some(cancel_parent),
            timeout_ms.map(Duration::from_millis),
        );
        let base = path_kernel::validate_existing_path(path, &self.roots, &cancel).await?;

        let mut req = TreeRequest::new(base);
        req.max_depth = max_depth;
        req.max_entries = max_entries;
        req.include_hidden = include_hidden;
        req.include_ignored = include_ignored;

        let result = tree::build(req, &self.sensitive, cancel).await?;
        let ascii = tree::render_ascii(&result.root);
        Ok((result.root, result.truncated, result.total_entries, ascii))
    }

    // ---- hash ---------------------------------------------------------

    pub async fn hash(
        &self,
        path: &str,
        include_ignored: bool,
        cancel: &CancelToken,
    ) -> FsResult<(String, bool, Option<usize>)> {
        let real = path_kernel::validate_existing_path(path, &self.roots, cancel).await?;
        let meta = tokio::fs::metadata(&real)
            .await
            .map_err(|e| FsContextError::from_io(&e, path))?;

        if meta.is_dir() {
            let result = hasher::hash_directory(&real, include_ignored, cancel).await?;
            Ok((result.hash, true, Some(result.file_count)))
        } else {
            let hash = hasher::hash_file(&real, cancel).await?;
            Ok((hash, false, None))
        }
    }

    // ---- diff ---------------------------------------------------------

    /// Reads `original` and `modified` (both must resolve inside the
    /// allowed roots) and returns a unified diff between them (spec §6:
    /// "a thin wrapper over a standard unified-diff routine").
    pub async fn diff(&self, original: &str, modified: &str, cancel: &CancelToken) -> FsResult<String> {
        let original_real = path_kernel::validate_existing_path(original, &self.roots, cancel).await?;
        let modified_real = path_kernel::validate_existing_path(modified, &self.roots, cancel).await?;

        let original_content = tokio::fs::read_to_string(&original_real)
            .await
            .map_err(|e| FsContextError::from_io(&e, original))?;
        let modified_content = tokio::fs::read_to_string(&modified_real)
            .await
            .map_err(|e| FsContextError::from_io(&e, modified))?;

        Ok(diff::unified_diff(&original_content, &modified_content, original, modified))
    }

    // ---- write / mkdir / mv / rm ---------------------------------------

    pub async fn write(&self, path: &str, content: &[u8], cancel: &CancelToken) -> FsResult<MutationStatus> {
        mutations::write(path, content, &self.roots, cancel).await
    }

    pub async fn mkdir(&self, path: &str, cancel: &CancelToken) -> FsResult<MutationStatus> {
        mutations::mkdir(path, &self.roots, cancel).await
    }

    pub async fn mv(&self, from: &str, to: &str, cancel: &CancelToken) -> FsResult<MutationStatus> {
        mutations::mv(from, to, &self.roots, cancel).await
    }

    pub async fn rm(&self, path: &str, recursive: bool, cancel: &CancelToken) -> FsResult<MutationStatus> {
        mutations::rm(path, recursive, &self.roots, cancel).await
    }
}

fn mtime_secs(meta: &std::fs::Metadata) -> Option<i64> {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
}

impl ReadConfig {
    /// The per-item byte estimate the read-many budget pass uses (spec
    /// §4.9): `Some(max_size)` for head/tail/range (partial reads),
    /// `None` for full (the whole file would be read).
    fn max_size_hint(&self, spec: &ReadSpec) -> Option<u64> {
        match spec {
            ReadSpec::Full => None,
            _ => Some(self.max_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn policy() -> SensitivePolicy {
        SensitivePolicy::build(
            ["**/.env*"].iter().map(|s| s.to_string()),
            std::iter::empty(),
            std::iter::empty(),
        )
    }

    async fn engine_with_root(dir: &Path) -> Engine {
        let engine = Engine::new(policy());
        engine.set_allowed_roots(&[dir.to_path_buf()], &CancelToken::none()).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn list_roots_reflects_configured_roots() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with_root(dir.path()).await;
        assert_eq!(engine.list_roots().len(), 1);
    }

    #[tokio::test]
    async fn stat_denies_sensitive_paths() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(".env"), b"SECRET=1").await.unwrap();
        let engine = engine_with_root(dir.path()).await;

        let err = engine
            .stat(dir.path().join(".env").to_str().unwrap(), &CancelToken::none())
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn list_directory_filters_sensitive_entries() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(".env"), b"SECRET=1").await.unwrap();
        tokio::fs::write(dir.path().join("main.rs"), b"").await.unwrap();
        let engine = engine_with_root(dir.path()).await;

        let (entries, summary) = engine
            .list_directory(dir.path().to_str().unwrap(), false, true, None, 1000, CancelToken::none())
            .await
            .unwrap();

        assert!(!entries.iter().any(|e| e.name == ".env"));
        assert!(entries.iter().any(|e| e.name == "main.rs"));
        assert!(!summary.truncated);
    }

    #[tokio::test]
    async fn search_respects_max_results_truncation() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            tokio::fs::write(dir.path().join(format!("f{i}.txt")), b"x").await.unwrap();
        }
        let engine = engine_with_root(dir.path()).await;

        let (entries, summary) = engine
            .search(
                dir.path().to_str().unwrap(),
                "*.txt",
                vec![],
                2,
                None,
                10_000,
                None,
                false,
                false,
                &CancelToken::none(),
            )
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert!(summary.truncated);
        assert_eq!(summary.stopped_reason, Some(StoppedReason::MaxResults));
    }

    #[tokio::test]
    async fn diff_reads_both_paths_and_diffs_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        tokio::fs::write(&a, "one\ntwo\n").await.unwrap();
        tokio::fs::write(&b, "one\nTHREE\n").await.unwrap();
        let engine = engine_with_root(dir.path()).await;

        let out = engine
            .diff(a.to_str().unwrap(), b.to_str().unwrap(), &CancelToken::none())
            .await
            .unwrap();
        assert!(out.contains("-two"));
        assert!(out.contains("+THREE"));
    }

    #[tokio::test]
    async fn hash_distinguishes_file_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"content").await.unwrap();
        let engine = engine_with_root(dir.path()).await;

        let (_, is_dir, file_count) = engine
            .hash(dir.path().to_str().unwrap(), false, &CancelToken::none())
            .await
            .unwrap();
        assert!(is_dir);
        assert_eq!(file_count, Some(1));

        let (_, is_dir_file, file_count_file) = engine
            .hash(dir.path().join("a.txt").to_str().unwrap(), false, &CancelToken::none())
            .await
            .unwrap();
        assert!(!is_dir_file);
        assert_eq!(file_count_file, None);
    }
}
