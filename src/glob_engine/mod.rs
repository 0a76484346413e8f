// glob_engine/mod.rs
//! Lazy, de-duplicated, depth-bounded glob traversal (spec §4.5, C5).
//!
//! An explicit directory stack walked with
//! `tokio::fs::read_dir`, wrapped in `async_stream::stream!` so a consumer
//! (tree builder, content scanner, `search`) can pull entries one at a
//! time instead of collecting a whole traversal into memory.

pub mod hidden;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_stream::stream;
use camino::Utf8PathBuf;
use futures::Stream;

use crate::batch_io::BatchIO;
use crate::cancellation::CancelToken;
use crate::error::{FsContextError, FsResult};
use crate::model::EntryKind;
use crate::patterns::Patterns;

/// One matched entry (spec §4.5: `{absolutePath, kindProbe, stats?}`).
#[derive(Debug, Clone)]
pub struct GlobEntry {
    pub absolute_path: PathBuf,
    pub kind: EntryKind,
    pub stats: Option<EntryStats>,
}

#[derive(Debug, Clone, Copy)]
pub struct EntryStats {
    pub size: u64,
    pub mtime: Option<i64>,
}

/// Request shape from spec §4.5.
pub struct GlobRequest {
    pub cwd: PathBuf,
    pub pattern: String,
    pub exclude_patterns: Vec<String>,
    pub include_hidden: bool,
    pub base_name_match: bool,
    pub case_sensitive_match: bool,
    pub max_depth: Option<usize>,
    pub follow_symbolic_links: bool,
    pub only_files: bool,
    pub stats: bool,
    pub suppress_errors: bool,
}

impl GlobRequest {
    pub fn new(cwd: PathBuf, pattern: impl Into<String>) -> Self {
        Self {
            cwd,
            pattern: pattern.into(),
            exclude_patterns: Vec::new(),
            include_hidden: false,
            base_name_match: false,
            case_sensitive_match: cfg!(not(windows)),
            max_depth: None,
            follow_symbolic_links: false,
            only_files: false,
            stats: false,
            suppress_errors: false,
        }
    }
}

/// Normalizes a pattern to forward slashes and, when `base_name_match` is
/// set and the pattern has no `/`, rewrites it as `**/<pattern>` (spec
/// §4.5 design choices).
fn effective_pattern(req: &GlobRequest) -> String {
    let normalized = req.pattern.replace('\\', "/");
    if req.base_name_match && !normalized.contains('/') {
        format!("**/{normalized}")
    } else {
        normalized
    }
}

/// Builds the compiled match set: the effective pattern plus, when hidden
/// files are requested, its dot-aware variants (spec §4.5).
fn build_patterns(req: &GlobRequest) -> FsResult<(Patterns, Option<Patterns>)> {
    let pattern = effective_pattern(req);
    let include = if req.include_hidden {
        let variants = hidden::synthesize_patterns(&pattern, req.max_depth);
        Patterns::compile_many(&variants, req.case_sensitive_match)?
    } else {
        Patterns::compile_many([&pattern], req.case_sensitive_match)?
    };

    let exclude = if req.exclude_patterns.is_empty() {
        None
    } else {
        Some(Patterns::compile_many(
            &req.exclude_patterns,
            req.case_sensitive_match,
        )?)
    };

    Ok((include, exclude))
}

/// Depth of `relative` counted in path components; `cwd` itself is depth 0
/// (spec §4.5: "depth 0 is cwd itself").
fn depth_of(relative: &Path) -> usize {
    relative.components().count()
}

fn is_hidden_component(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Streams matching entries under `req.cwd`. Errors from individual
/// directory reads are dropped when `suppress_errors` is set, otherwise
/// yielded in-band so the caller can decide whether to abort.
pub fn stream(
    req: GlobRequest,
    cancel: CancelToken,
) -> FsResult<impl Stream<Item = FsResult<GlobEntry>>> {
    let (include, exclude) = build_patterns(&req)?;
    let include = Arc::new(include);
    let exclude = exclude.map(Arc::new);
    let batch_io = Arc::new(BatchIO::new(1000, req.follow_symbolic_links));
    let cwd = req.cwd.clone();
    let only_files = req.only_files;
    let want_stats = req.stats;
    let include_hidden = req.include_hidden;
    let follow_links = req.follow_symbolic_links;
    let max_depth = req.max_depth;
    let suppress_errors = req.suppress_errors;

    Ok(stream! {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut stack: Vec<PathBuf> = vec![cwd.clone()];
        let mut visited_dirs: HashSet<PathBuf> = HashSet::new();

        while let Some(dir) = stack.pop() {
            if cancel.check().is_err() {
                yield Err(FsContextError::cancelled());
                return;
            }

            if follow_links {
                if let Ok(real) = tokio::fs::canonicalize(&dir).await {
                    if !visited_dirs.insert(real) {
                        continue;
                    }
                }
            }

            let mut rd = match tokio::fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) => {
                    if suppress_errors {
                        continue;
                    }
                    yield Err(FsContextError::from_io(&e, dir.to_string_lossy().as_ref()));
                    continue;
                }
            };

            loop {
                if cancel.check().is_err() {
                    yield Err(FsContextError::cancelled());
                    return;
                }

                let entry = match rd.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        if suppress_errors {
                            break;
                        }
                        yield Err(FsContextError::from_io(&e, dir.to_string_lossy().as_ref()));
                        break;
                    }
                };

                let path = entry.path();
                let name = entry.file_name();

                if !include_hidden && is_hidden_component(&name) {
                    continue;
                }

                let file_type = match entry.file_type().await {
                    Ok(ft) => ft,
                    Err(e) => {
                        if suppress_errors {
                            continue;
                        }
                        yield Err(FsContextError::from_io(&e, path.to_string_lossy().as_ref()));
                        continue;
                    }
                };

                let relative = path.strip_prefix(&cwd).unwrap_or(&path).to_path_buf();
                let depth = depth_of(&relative);

                if file_type.is_dir() {
                    if max_depth.map(|m| depth > m).unwrap_or(false) {
                        continue;
                    }
                    if file_type.is_symlink() && !follow_links {
                        continue;
                    }
                    stack.push(path.clone());
                    if only_files {
                        continue;
                    }
                }

                if let Some(md) = max_depth {
                    if depth > md {
                        continue;
                    }
                }

                let rel_utf8 = match Utf8PathBuf::from_path_buf(relative.clone()) {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                if !include.is_match(&rel_utf8) {
                    continue;
                }
                if let Some(ex) = &exclude {
                    if ex.is_match(&rel_utf8) {
                        continue;
                    }
                }

                if file_type.is_dir() && only_files {
                    continue;
                }

                if !seen.insert(path.clone()) {
                    continue;
                }

                let kind = if file_type.is_symlink() {
                    EntryKind::Symlink
                } else if file_type.is_dir() {
                    EntryKind::Directory
                } else if file_type.is_file() {
                    EntryKind::File
                } else {
                    EntryKind::Other
                };

                let stats = if want_stats {
                    let io = batch_io.clone();
                    let p = path.clone();
                    match tokio::task::spawn_blocking(move || io.stat(&p)).await {
                        Ok(Ok(meta)) => Some(EntryStats {
                            size: meta.len(),
                            mtime: meta
                                .modified()
                                .ok()
                                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                                .map(|d| d.as_secs() as i64),
                        }),
                        _ => None,
                    }
                } else {
                    None
                };

                yield Ok(GlobEntry {
                    absolute_path: path,
                    kind,
                    stats,
                });
            }
        }
    })
}
