// model.rs
//! The data model from spec §3, shared by every operation in
//! `operations.rs`. Kept serde-serializable so any transport layer a
//! caller bolts on can hand these straight to a wire format, even though
//! the transport itself is out of scope (spec §1).

use serde::{Deserialize, Serialize};

/// Kind of a filesystem entry as surfaced to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// A single filesystem entry (spec §3 `FileEntry`).
///
/// `relative_to_base` always uses forward slashes regardless of platform —
/// this is enforced at construction, not left to callers to normalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub absolute_path: String,
    pub relative_to_base: String,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
}

/// Forces forward slashes in a relative path, independent of platform
/// separator — `FileEntry.relativeToBase` is always `/`-joined (spec §3).
pub fn to_forward_slash(path: &std::path::Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// A node in the directory tree builder's output (spec §3 `TreeNode`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub kind: TreeNodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeNodeKind {
    File,
    Directory,
}

/// One content-scanner match (spec §3 `MatchRecord`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub relative_file: String,
    pub line_number: usize,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_before: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_after: Option<Vec<String>>,
    pub match_count: usize,
}

/// Which bounded-read mode produced a [`ReadResult`] (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    Full,
    Head,
    Tail,
    Range,
}

/// Result of a bounded file read (spec §3 `ReadResult`).
///
/// `truncated` is true whenever `content` omits any part of the underlying
/// file — set once, never cleared, per spec §3 invariant 4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResult {
    pub path: String,
    pub content: String,
    pub truncated: bool,
    pub read_mode: ReadMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_read: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_more_lines: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
}

/// Enumerated cause of truncation (spec Glossary: "Stopped reason").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoppedReason {
    MaxResults,
    MaxFiles,
    Timeout,
    MaxEntries,
    Aborted,
}

/// Metadata for the `stat`/`statMany` operations (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
    pub is_symlink: bool,
}

/// Summary envelope for `listDirectory`/`search` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSummary {
    pub matched: usize,
    pub truncated: bool,
    pub files_scanned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_reason: Option<StoppedReason>,
}

/// User-visible error envelope (spec §7: `{ok:false, error:{code,
/// message, path?, suggestion?}}`).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<&crate::error::FsContextError> for ErrorEnvelope {
    fn from(err: &crate::error::FsContextError) -> Self {
        Self {
            code: err.kind.code(),
            message: err.message.clone(),
            path: err.path.clone(),
            suggestion: err.suggestion.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn relative_path_uses_forward_slashes() {
        let p = Path::new("a").join("b").join("c.txt");
        assert_eq!(to_forward_slash(&p), "a/b/c.txt");
    }
}
