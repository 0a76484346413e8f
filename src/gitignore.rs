// gitignore.rs
//! `.gitignore` loading, shared by the tree builder (C8) and the hasher
//! (C10), and optionally the search pipeline, behind one `includeIgnored`
//! flag (spec §9 open question, resolved in DESIGN.md: a single flag
//! threaded through `tree`/`search`/`searchContent`/`hash` rather than
//! letting the behavior vary inconsistently by operation).
//!
//! Loaded once per root via the `ignore` crate's `Gitignore`.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// A compiled `.gitignore` matcher rooted at a single directory, or
/// `None` when `includeIgnored` is true (the filter is skipped entirely,
/// not just rendered permissive) or no `.gitignore` file exists.
pub struct IgnoreFilter {
    matcher: Option<Gitignore>,
}

impl IgnoreFilter {
    /// Loads `<root>/.gitignore` once. `include_ignored = true` skips
    /// loading entirely — every path is treated as not ignored.
    pub fn load(root: &Path, include_ignored: bool) -> Self {
        if include_ignored {
            return Self { matcher: None };
        }

        let mut builder = GitignoreBuilder::new(root);
        let gitignore_path = root.join(".gitignore");
        if gitignore_path.is_file() {
            let _ = builder.add(gitignore_path);
        }
        let matcher = builder.build().ok().filter(|m| !m.is_empty());
        Self { matcher }
    }

    /// True when `path` should be excluded. `is_dir` matters: a
    /// `.gitignore` pattern like `build/` only matches directories.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        match &self.matcher {
            None => false,
            Some(m) => m.matched(path, is_dir).is_ignore(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn filters_paths_matching_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "target/\n*.log\n").unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("app.log"), "").unwrap();
        fs::write(dir.path().join("main.rs"), "").unwrap();

        let filter = IgnoreFilter::load(dir.path(), false);
        assert!(filter.is_ignored(&dir.path().join("target"), true));
        assert!(filter.is_ignored(&dir.path().join("app.log"), false));
        assert!(!filter.is_ignored(&dir.path().join("main.rs"), false));
    }

    #[test]
    fn include_ignored_skips_filtering_entirely() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        let filter = IgnoreFilter::load(dir.path(), true);
        assert!(!filter.is_ignored(&dir.path().join("app.log"), false));
    }

    #[test]
    fn missing_gitignore_ignores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let filter = IgnoreFilter::load(dir.path(), false);
        assert!(!filter.is_ignored(&dir.path().join("anything"), false));
    }
}
