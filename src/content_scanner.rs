// content_scanner.rs
//! Per-file line-streaming content matcher (spec §4.7, C7).
//!
//! File selection is delegated entirely to the glob engine (C5) — the
//! content regex never touches file *names*, which keeps ReDoS concerns
//! confined to one compiled pattern per request (spec §4.7: "this
//! isolates ReDoS concerns").

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;
use regex::{Regex, RegexBuilder};

use crate::binary_sniff;
use crate::cancellation::CancelToken;
use crate::error::{ErrorKind, FsContextError, FsResult};
use crate::glob_engine::{self, GlobRequest};
use crate::model::{MatchRecord, StoppedReason};
use crate::regex_gate;
use crate::scan_worker::{ScanJob, ScanOutcome, WorkerPool};

const DEFAULT_LINE_CAP: usize = 4096;
const PER_LINE_TIMEOUT: Duration = Duration::from_millis(50);

pub struct ScanRequest {
    pub base: PathBuf,
    pub pattern: String,
    pub file_pattern: Option<String>,
    pub exclude_patterns: Vec<String>,
    pub case_sensitive: bool,
    pub is_literal: bool,
    pub whole_word: bool,
    pub context_lines: usize,
    pub max_results: usize,
    pub max_file_size: u64,
    pub max_files_scanned: usize,
    pub skip_binary: bool,
    pub include_hidden: bool,
    pub worker_pool_size: usize,
}

impl ScanRequest {
    pub fn new(base: PathBuf, pattern: impl Into<String>) -> Self {
        Self {
            base,
            pattern: pattern.into(),
            file_pattern: None,
            exclude_patterns: Vec::new(),
            case_sensitive: true,
            is_literal: false,
            whole_word: false,
            context_lines: 0,
            max_results: 1000,
            max_file_size: 10 * 1024 * 1024,
            max_files_scanned: 10_000,
            skip_binary: true,
            include_hidden: false,
            worker_pool_size: 0,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScanSummary {
    pub files_scanned: usize,
    pub files_matched: usize,
    pub skipped_too_large: usize,
    pub skipped_binary: usize,
    pub skipped_inaccessible: usize,
    pub lines_skipped_due_to_regex_timeout: usize,
    pub truncated: bool,
    pub stopped_reason: Option<StoppedReason>,
}

impl ScanSummary {
    /// First-reason-wins truncation (spec §4 state machine: "once
    /// truncated-by-X, subsequent reasons are ignored").
    fn mark_stopped(&mut self, reason: StoppedReason) {
        if !self.truncated {
            self.truncated = true;
            self.stopped_reason = Some(reason);
        }
    }
}

pub struct ScanResult {
    pub matches: Vec<MatchRecord>,
    pub summary: ScanSummary,
    pub pattern_type: &'static str,
}

/// Compiles the content-search regex per spec §4.6's scan-specific rules:
/// literal search escapes metacharacters, `wholeWord` wraps in `\b…\b`,
/// case sensitivity is a compile flag.
fn compile_content_regex(req: &ScanRequest) -> FsResult<Regex> {
    let body = if req.is_literal {
        regex::escape(&req.pattern)
    } else {
        regex_gate::check_safe(&req.pattern)?;
        req.pattern.clone()
    };
    let wrapped = if req.whole_word {
        format!(r"\b(?:{body})\b")
    } else {
        body
    };
    RegexBuilder::new(&wrapped)
        .case_insensitive(!req.case_sensitive)
        .build()
        .map_err(FsContextError::from)
}

pub async fn scan(req: ScanRequest, cancel: CancelToken) -> FsResult<ScanResult> {
    let pattern_type = if req.is_literal { "literal" } else { "regex" };
    let regex = compile_content_regex(&req)?;
    let pool = WorkerPool::new(req.worker_pool_size);

    let mut glob_req = GlobRequest::new(
        req.base.clone(),
        req.file_pattern.clone().unwrap_or_else(|| "**/*".to_string()),
    );
    glob_req.exclude_patterns = req.exclude_patterns.clone();
    glob_req.include_hidden = req.include_hidden;
    glob_req.only_files = true;
    glob_req.stats = true;
    glob_req.suppress_errors = true;

    let mut summary = ScanSummary::default();
    let mut matches = Vec::new();

    let entries = glob_engine::stream(glob_req, cancel.child())?;
    futures::pin_mut!(entries);

    'outer: while let Some(entry) = entries.next().await {
        if cancel.check().is_err() {
            summary.mark_stopped(StoppedReason::Timeout);
            break;
        }
        if summary.files_scanned >= req.max_files_scanned {
            summary.mark_stopped(StoppedReason::MaxFiles);
            break;
        }
        if matches.len() >= req.max_results {
            summary.mark_stopped(StoppedReason::MaxResults);
            break;
        }

        let entry = match entry {
            Ok(e) => e,
            Err(_) => {
                summary.skipped_inaccessible += 1;
                continue;
            }
        };

        let size = entry.stats.map(|s| s.size).unwrap_or(0);
        if size > req.max_file_size {
            summary.skipped_too_large += 1;
            continue;
        }

        summary.files_scanned += 1;

        let relative_file = entry
            .absolute_path
            .strip_prefix(&req.base)
            .unwrap_or(&entry.absolute_path)
            .to_string_lossy()
            .replace('\\', "/");

        if req.skip_binary && sniff_binary_async(&entry.absolute_path).await {
            summary.skipped_binary += 1;
            continue;
        }

        let job = ScanJob {
            path: entry.absolute_path.clone(),
            relative_file,
            regex: regex.clone(),
            context_lines: req.context_lines,
            max_line_len: DEFAULT_LINE_CAP,
            per_line_timeout: PER_LINE_TIMEOUT,
            max_matches: req.max_results - matches.len(),
        };

        let cancel_for_poll = cancel.clone();
        let outcome = {
            let pool = &pool;
            tokio::task::block_in_place(|| {
                pool.submit(job, || cancel_for_poll.is_cancelled())
            })
        };

        match outcome {
            Ok(outcome) => {
                summary.lines_skipped_due_to_regex_timeout += outcome.lines_skipped_due_to_regex_timeout;
                if !outcome.matches.is_empty() {
                    summary.files_matched += 1;
                }
                for m in outcome.matches {
                    matches.push(m);
                    if matches.len() >= req.max_results {
                        summary.mark_stopped(StoppedReason::MaxResults);
                        break 'outer;
                    }
                }
            }
            Err(e) if e.kind == ErrorKind::Cancelled => {
                summary.mark_stopped(StoppedReason::Timeout);
                break;
            }
            Err(_) => {
                summary.skipped_inaccessible += 1;
            }
        }
    }

    Ok(ScanResult { matches, summary, pattern_type })
}

async fn sniff_binary_async(path: &Path) -> bool {
    let ext = binary_sniff::extension_of(path);
    match tokio::fs::File::open(path).await {
        Ok(mut f) => binary_sniff::is_binary(&mut f, ext.as_deref()).await.unwrap_or(false),
        Err(_) => false,
    }
}

/// Runs one file's scan synchronously — the function shared by the
/// in-process path and every worker thread (spec §4.7: the worker "returns
/// `{matches, skippedTooLarge, skippedBinary}` or an error").
pub(crate) fn run_job_sync(job: ScanJob) -> Result<ScanOutcome, FsContextError> {
    let content = std::fs::read_to_string(&job.path)
        .map_err(|e| FsContextError::from_io(&e, job.path.to_string_lossy().as_ref()))?;
    let lines: Vec<&str> = content.lines().collect();

    let mut matches = Vec::new();
    let mut lines_skipped = 0usize;

    for (idx, line) in lines.iter().enumerate() {
        if matches.len() >= job.max_matches {
            break;
        }

        let started = Instant::now();
        let count = job.regex.find_iter(line).count();
        if started.elapsed() > job.per_line_timeout {
            lines_skipped += 1;
            continue;
        }
        if count == 0 {
            continue;
        }

        let context_before = if job.context_lines > 0 {
            let start = idx.saturating_sub(job.context_lines);
            Some(lines[start..idx].iter().map(|s| truncate(s, job.max_line_len)).collect())
        } else {
            None
        };
        let context_after = if job.context_lines > 0 {
            let end = (idx + 1 + job.context_lines).min(lines.len());
            Some(lines[idx + 1..end].iter().map(|s| truncate(s, job.max_line_len)).collect())
        } else {
            None
        };

        matches.push(MatchRecord {
            relative_file: job.relative_file.clone(),
            line_number: idx + 1,
            content: truncate(line, job.max_line_len),
            context_before,
            context_after,
            match_count: count,
        });
    }

    Ok(ScanOutcome { matches, lines_skipped_due_to_regex_timeout: lines_skipped })
}

fn truncate(s: &str, cap: usize) -> String {
    if s.len() <= cap {
        s.to_string()
    } else {
        s.chars().take(cap).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let p = dir.path().join(name);
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(p, content).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn reports_pattern_type_for_regex_and_literal_requests() {
        let dir = setup(&[("index.ts", "export const hello = \"world\";\n")]);
        let req = ScanRequest::new(dir.path().to_path_buf(), r#"hello\s*=\s*"world""#);
        let result = scan(req, CancelToken::none()).await.unwrap();
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.pattern_type, "regex");

        let mut req2 = ScanRequest::new(dir.path().to_path_buf(), "hello = \"world\"");
        req2.is_literal = true;
        let result2 = scan(req2, CancelToken::none()).await.unwrap();
        assert_eq!(result2.matches.len(), 1);
        assert_eq!(result2.pattern_type, "literal");
    }

    #[tokio::test]
    async fn regex_mode_matches_the_escaped_pattern_literally_when_marked_regex() {
        let dir = setup(&[("index.ts", "export const hello = \"world\";\n")]);
        let mut req = ScanRequest::new(dir.path().to_path_buf(), r#"hello\s*=\s*"world""#);
        req.is_literal = false;
        let result = scan(req, CancelToken::none()).await.unwrap();
        assert_eq!(result.matches.len(), 1);
    }

    #[tokio::test]
    async fn rejects_redos_pattern() {
        let dir = setup(&[("a.txt", "aaaaaaaa\n")]);
        let req = ScanRequest::new(dir.path().to_path_buf(), "(a+)+");
        let err = scan(req, CancelToken::none()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPattern);
    }

    #[tokio::test]
    async fn skips_binary_files_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.bin"), b"hello\0world").unwrap();
        let req = ScanRequest::new(dir.path().to_path_buf(), "hello");
        let result = scan(req, CancelToken::none()).await.unwrap();
        assert_eq!(result.summary.skipped_binary, 1);
        assert!(result.matches.is_empty());
    }

    #[tokio::test]
    async fn collects_context_lines_around_match() {
        let dir = setup(&[("f.txt", "a\nb\nMATCH\nc\nd\n")]);
        let mut req = ScanRequest::new(dir.path().to_path_buf(), "MATCH");
        req.context_lines = 1;
        let result = scan(req, CancelToken::none()).await.unwrap();
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].context_before.as_deref(), Some(&["b".to_string()][..]));
        assert_eq!(result.matches[0].context_after.as_deref(), Some(&["c".to_string()][..]));
    }

    #[tokio::test]
    async fn stops_at_max_results() {
        let dir = setup(&[
            ("a.txt", "x\nx\nx\n"),
            ("b.txt", "x\nx\nx\n"),
        ]);
        let mut req = ScanRequest::new(dir.path().to_path_buf(), "x");
        req.max_results = 2;
        let result = scan(req, CancelToken::none()).await.unwrap();
        assert_eq!(result.matches.len(), 2);
        assert!(result.summary.truncated);
        assert_eq!(result.summary.stopped_reason, Some(StoppedReason::MaxResults));
    }

    #[test]
    fn worker_pool_inline_path_matches_threaded_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "alpha\nbeta\nalpha\n").unwrap();
        let regex = Regex::new("alpha").unwrap();

        let job = |pool_reply: bool| ScanJob {
            path: path.clone(),
            relative_file: "f.txt".to_string(),
            regex: regex.clone(),
            context_lines: 0,
            max_line_len: DEFAULT_LINE_CAP,
            per_line_timeout: PER_LINE_TIMEOUT,
            max_matches: if pool_reply { 10 } else { 10 },
        };

        let inline = WorkerPool::new(0);
        let r1 = inline.submit(job(true), || false).unwrap();

        let threaded = WorkerPool::new(1);
        let r2 = threaded.submit(job(false), || false).unwrap();

        assert_eq!(r1.matches.len(), r2.matches.len());
        assert_eq!(r1.matches.len(), 2);
    }
}
