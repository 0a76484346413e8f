// tree.rs
//! Directory Tree Builder (spec §4.8, C8).
//!
//! Streams entries from the glob engine with `pattern = "**/*"`,
//! `only_files = false`, inserting each into a path-indexed map so
//! intermediate directory nodes can be created on demand when a deeper
//! entry is visited before its parent (the glob stream has no ordering
//! guarantee across directories, spec §5).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::StreamExt;

use crate::cancellation::CancelToken;
use crate::error::FsResult;
use crate::gitignore::IgnoreFilter;
use crate::glob_engine::{self, GlobRequest};
use crate::model::{EntryKind, StoppedReason, TreeNode, TreeNodeKind};
use crate::path_kernel::sensitive::SensitivePolicy;

pub struct TreeRequest {
    pub root: PathBuf,
    pub max_depth: Option<usize>,
    pub max_entries: usize,
    pub include_hidden: bool,
    pub include_ignored: bool,
}

impl TreeRequest {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            max_depth: None,
            max_entries: 100_000,
            include_hidden: false,
            include_ignored: false,
        }
    }
}

pub struct TreeResult {
    pub root: TreeNode,
    pub total_entries: usize,
    pub truncated: bool,
    pub stopped_reason: Option<StoppedReason>,
    pub symlinks_not_followed: usize,
}

/// Internal builder node: a `TreeNode` under construction, with children
/// kept in a map (not a `Vec`) until the final sort pass so out-of-order
/// inserts from the glob stream are cheap.
struct BuildNode {
    kind: TreeNodeKind,
    size: Option<u64>,
    children: HashMap<String, BuildNode>,
}

impl BuildNode {
    fn directory() -> Self {
        Self {
            kind: TreeNodeKind::Directory,
            size: None,
            children: HashMap::new(),
        }
    }
}

pub async fn build(
    req: TreeRequest,
    roots_policy: &SensitivePolicy,
    cancel: CancelToken,
) -> FsResult<TreeResult> {
    let ignore = IgnoreFilter::load(&req.root, req.include_ignored);

    let mut glob_req = GlobRequest::new(req.root.clone(), "**/*");
    glob_req.include_hidden = req.include_hidden;
    glob_req.only_files = false;
    glob_req.max_depth = req.max_depth;
    glob_req.follow_symbolic_links = false;
    glob_req.stats = true;
    glob_req.suppress_errors = true;

    let mut root_node = BuildNode::directory();
    let mut total_entries = 0usize;
    let mut truncated = false;
    let mut stopped_reason = None;
    let mut symlinks_not_followed = 0usize;

    let entries = glob_engine::stream(glob_req, cancel.child())?;
    futures::pin_mut!(entries);

    while let Some(entry) = entries.next().await {
        if cancel.check().is_err() {
            truncated = true;
            stopped_reason = Some(StoppedReason::Aborted);
            break;
        }

        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        if entry.kind == EntryKind::Symlink {
            symlinks_not_followed += 1;
            continue;
        }

        let relative = entry
            .absolute_path
            .strip_prefix(&req.root)
            .unwrap_or(&entry.absolute_path);
        if relative.as_os_str().is_empty() {
            continue;
        }

        let basename = entry
            .absolute_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if roots_policy.is_sensitive(&basename, &entry.absolute_path) {
            continue;
        }

        let is_dir = entry.kind == EntryKind::Directory;
        if ignore.is_ignored(&entry.absolute_path, is_dir) {
            continue;
        }

        if total_entries >= req.max_entries {
            truncated = true;
            stopped_reason = Some(StoppedReason::MaxEntries);
            break;
        }

        insert_node(&mut root_node, relative, is_dir, entry.stats.map(|s| s.size));
        total_entries += 1;
    }

    let root_name = req
        .root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| req.root.to_string_lossy().into_owned());

    let root_tree = finalize(root_name, root_node);

    Ok(TreeResult {
        root: root_tree,
        total_entries,
        truncated,
        stopped_reason,
        symlinks_not_followed,
    })
}

/// Inserts `relative` into `root`, creating intermediate directory nodes
/// as needed — entries may arrive in any order (spec §4.8).
fn insert_node(root: &mut BuildNode, relative: &Path, is_dir: bool, size: Option<u64>) {
    let components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if components.is_empty() {
        return;
    }

    let mut current = root;
    for (idx, name) in components.iter().enumerate() {
        let is_last = idx == components.len() - 1;
        let entry = current
            .children
            .entry(name.clone())
            .or_insert_with(BuildNode::directory);
        if is_last {
            entry.kind = if is_dir {
                TreeNodeKind::Directory
            } else {
                TreeNodeKind::File
            };
            if !is_dir {
                entry.size = size;
            }
        }
        current = entry;
    }
}

/// Converts a `BuildNode` into the public `TreeNode`, sorting children
/// directories-first then byte-wise by name (spec §3 `TreeNode`).
fn finalize(name: String, node: BuildNode) -> TreeNode {
    match node.kind {
        TreeNodeKind::File => TreeNode {
            name,
            kind: TreeNodeKind::File,
            size: node.size,
            children: None,
        },
        TreeNodeKind::Directory => {
            let mut children: Vec<TreeNode> = node
                .children
                .into_iter()
                .map(|(child_name, child)| finalize(child_name, child))
                .collect();
            children.sort_by(|a, b| {
                let a_is_dir = a.kind == TreeNodeKind::Directory;
                let b_is_dir = b.kind == TreeNodeKind::Directory;
                match (a_is_dir, b_is_dir) {
                    (true, false) => std::cmp::Ordering::Less,
                    (false, true) => std::cmp::Ordering::Greater,
                    _ => a.name.as_bytes().cmp(b.name.as_bytes()),
                }
            });
            TreeNode {
                name,
                kind: TreeNodeKind::Directory,
                size: None,
                children: Some(children),
            }
        }
    }
}

/// ASCII rendering for human display (spec §4.8: "`├── / └── / │`").
pub fn render_ascii(root: &TreeNode) -> String {
    let mut out = String::new();
    out.push_str(&root.name);
    out.push('\n');
    if let Some(children) = &root.children {
        render_children(children, "", &mut out);
    }
    out
}

fn render_children(children: &[TreeNode], prefix: &str, out: &mut String) {
    let len = children.len();
    for (idx, child) in children.iter().enumerate() {
        let last = idx == len - 1;
        let branch = if last { "└── " } else { "├── " };
        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(&child.name);
        out.push('\n');
        if let Some(grandchildren) = &child.children {
            let next_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
            render_children(grandchildren, &next_prefix, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn policy() -> SensitivePolicy {
        SensitivePolicy::build(
            ["**/.env*", "**/*secret*"].iter().map(|s| s.to_string()),
            std::iter::empty(),
            std::iter::empty(),
        )
    }

    #[tokio::test]
    async fn builds_tree_with_directories_first_sorting() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), b"hi").unwrap();
        fs::create_dir(dir.path().join("a_dir")).unwrap();
        fs::write(dir.path().join("a_dir/nested.txt"), b"x").unwrap();
        fs::write(dir.path().join("a.txt"), b"y").unwrap();

        let req = TreeRequest::new(dir.path().to_path_buf());
        let result = build(req, &policy(), CancelToken::none()).await.unwrap();

        let children = result.root.children.unwrap();
        assert_eq!(children[0].name, "a_dir");
        assert_eq!(children[0].kind, TreeNodeKind::Directory);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn max_depth_zero_yields_no_descendants() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/a.txt"), b"").unwrap();

        let mut req = TreeRequest::new(dir.path().to_path_buf());
        req.max_depth = Some(0);
        let result = build(req, &policy(), CancelToken::none()).await.unwrap();

        assert!(result.root.children.unwrap().is_empty());
    }

    #[tokio::test]
    async fn max_entries_truncates_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("f{i}.txt")), b"x").unwrap();
        }
        let mut req = TreeRequest::new(dir.path().to_path_buf());
        req.max_entries = 2;
        let result = build(req, &policy(), CancelToken::none()).await.unwrap();
        assert!(result.truncated);
        assert_eq!(result.stopped_reason, Some(StoppedReason::MaxEntries));
    }

    #[tokio::test]
    async fn sensitive_entries_are_filtered_silently() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), b"SECRET=1").unwrap();
        fs::write(dir.path().join("main.rs"), b"").unwrap();

        let req = TreeRequest::new(dir.path().to_path_buf());
        let result = build(req, &policy(), CancelToken::none()).await.unwrap();
        let names: Vec<_> = result.root.children.unwrap().into_iter().map(|n| n.name).collect();
        assert!(!names.contains(&".env".to_string()));
        assert!(names.contains(&"main.rs".to_string()));
    }

    #[test]
    fn ascii_rendering_uses_tree_glyphs() {
        let tree = TreeNode {
            name: "root".into(),
            kind: TreeNodeKind::Directory,
            size: None,
            children: Some(vec![
                TreeNode { name: "a".into(), kind: TreeNodeKind::File, size: Some(1), children: None },
                TreeNode { name: "b".into(), kind: TreeNodeKind::File, size: Some(2), children: None },
            ]),
        };
        let ascii = render_ascii(&tree);
        assert!(ascii.contains("├── a"));
        assert!(ascii.contains("└── b"));
    }
}
