// path_kernel/sensitive.rs
//! Sensitive-path denylist (spec §4.1, §6).
//!
//! A fixed set of globs plus an operator-supplied allow/deny list from the
//! environment (`FS_CONTEXT_ALLOWLIST` / `FS_CONTEXT_DENYLIST`,
//! comma-separated). A path is sensitive if either its basename or its
//! resolved path matches a deny glob and no allow glob overrides it.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

const DEFAULT_DENY_PATTERNS: &[&str] = &[
    "**/.env*",
    "**/.ssh/**",
    "**/id_rsa*",
    "**/id_ed25519*",
    "**/.aws/credentials",
    "**/.aws/config",
    "**/*.pem",
    "**/*secret*",
    "**/*.key",
    "**/.npmrc",
    "**/.netrc",
    "**/*.pfx",
    "**/*.p12",
];

/// Compiled allow/deny policy for sensitive-path filtering.
pub struct SensitivePolicy {
    deny: GlobSet,
    allow: GlobSet,
}

impl SensitivePolicy {
    /// Builds the policy from the fixed denylist plus the operator-supplied
    /// `FS_CONTEXT_ALLOWLIST` / `FS_CONTEXT_DENYLIST` environment variables
    /// and the explicit `FS_CONTEXT_ALLOW_SENSITIVE` list (spec §6).
    pub fn from_env() -> Self {
        let extra_deny = std::env::var("FS_CONTEXT_DENYLIST").unwrap_or_default();
        let extra_allow = std::env::var("FS_CONTEXT_ALLOWLIST").unwrap_or_default();
        let allow_sensitive = std::env::var("FS_CONTEXT_ALLOW_SENSITIVE").unwrap_or_default();
        Self::build(
            DEFAULT_DENY_PATTERNS.iter().map(|s| s.to_string()),
            split_csv(&extra_deny),
            split_csv(&extra_allow).chain(split_csv(&allow_sensitive)),
        )
    }

    pub fn build(
        default_deny: impl Iterator<Item = String>,
        extra_deny: impl Iterator<Item = String>,
        allow: impl Iterator<Item = String>,
    ) -> Self {
        let mut deny_builder = GlobSetBuilder::new();
        for pat in default_deny.chain(extra_deny) {
            if let Ok(g) = Glob::new(&pat) {
                deny_builder.add(g);
            }
        }
        let mut allow_builder = GlobSetBuilder::new();
        for pat in allow {
            if let Ok(g) = Glob::new(&pat) {
                allow_builder.add(g);
            }
        }
        Self {
            deny: deny_builder.build().unwrap_or_else(|_| GlobSet::empty()),
            allow: allow_builder.build().unwrap_or_else(|_| GlobSet::empty()),
        }
    }

    /// A path is sensitive if the basename or the resolved path matches a
    /// deny glob and no allow glob overrides it (spec §4.1).
    pub fn is_sensitive(&self, basename: &str, resolved_path: &Path) -> bool {
        let resolved_str = resolved_path.to_string_lossy();
        let denied = self.deny.is_match(basename) || self.deny.is_match(resolved_str.as_ref());
        if !denied {
            return false;
        }
        !(self.allow.is_match(basename) || self.allow.is_match(resolved_str.as_ref()))
    }
}

fn split_csv(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn policy() -> SensitivePolicy {
        SensitivePolicy::build(
            DEFAULT_DENY_PATTERNS.iter().map(|s| s.to_string()),
            std::iter::empty(),
            std::iter::empty(),
        )
    }

    #[test]
    fn flags_dotenv_and_ssh_keys() {
        let p = policy();
        assert!(p.is_sensitive(".env", &PathBuf::from("/repo/.env")));
        assert!(p.is_sensitive("id_rsa", &PathBuf::from("/home/u/.ssh/id_rsa")));
        assert!(p.is_sensitive("whatever", &PathBuf::from("/home/u/.ssh/config")));
        assert!(!p.is_sensitive("main.rs", &PathBuf::from("/repo/src/main.rs")));
    }

    #[test]
    fn allowlist_overrides_denylist() {
        let p = SensitivePolicy::build(
            DEFAULT_DENY_PATTERNS.iter().map(|s| s.to_string()),
            std::iter::empty(),
            vec![".env.example".to_string()].into_iter(),
        );
        assert!(p.is_sensitive(".env", &PathBuf::from("/repo/.env")));
        assert!(!p.is_sensitive(".env.example", &PathBuf::from("/repo/.env.example")));
    }
}
