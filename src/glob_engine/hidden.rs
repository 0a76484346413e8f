// glob_engine/hidden.rs
//! Hidden-file pattern synthesis (spec §4.5).
//!
//! A glob matcher that treats `*` as matching any character, dot included,
//! has no native concept of "hidden file" — `globset` is exactly such a
//! matcher. We reproduce the conventional dotfile-exclusion behavior at the
//! traversal level (the engine skips dot-prefixed entries outright unless
//! `includeHidden` is set) and, when hidden files are wanted, additionally
//! synthesize dot-aware pattern variants so a caller-supplied pattern like
//! `*.ts` also matches `.hidden.ts` through an explicit rewrite rather than
//! by accident of engine semantics.

const DEFAULT_MAX_DEPTH: usize = 10;

/// Splits `pattern` into `(literal_prefix_segments, first_globby_segment,
/// remainder_segments)`. The literal prefix is every leading segment with
/// no glob metacharacter; the first globby segment is the one where a
/// metacharacter first appears (or the last segment if none do).
fn split_pattern(pattern: &str) -> (Vec<&str>, &str, Vec<&str>) {
    let segments: Vec<&str> = pattern.split('/').collect();
    let idx = segments
        .iter()
        .position(|s| is_globby(s))
        .unwrap_or(segments.len().saturating_sub(1));

    let prefix = segments[..idx].to_vec();
    let globby = segments.get(idx).copied().unwrap_or("");
    let remainder = if idx + 1 < segments.len() {
        segments[idx + 1..].to_vec()
    } else {
        Vec::new()
    };
    (prefix, globby, remainder)
}

fn is_globby(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{', '@', '!', '+', '(']) || segment == "**"
}

fn join(segments: &[&str]) -> String {
    segments.join("/")
}

/// Builds the additional dot-aware pattern variants for `pattern` (spec
/// §4.5). Always includes the original pattern unchanged; the caller OR-s
/// these into its match set.
pub fn synthesize_patterns(pattern: &str, max_depth: Option<usize>) -> Vec<String> {
    let mut out = vec![pattern.to_string()];
    let (prefix, globby, remainder) = split_pattern(pattern);

    if globby.is_empty() || globby.starts_with('.') {
        return out;
    }

    let dot_variant = format!(".{globby}");
    let mut variant_segments = prefix.clone();
    variant_segments.push(&dot_variant);
    variant_segments.extend(remainder.iter().copied());
    out.push(join(&variant_segments));

    if globby == "**" && remainder.first() == Some(&"") {
        // pattern was "prefix/**/..." i.e. remainder's first logical
        // segment follows "**/"; bounded-depth expansion through dot dirs.
        let rest: Vec<&str> = remainder[1..].to_vec();
        let depth = max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        for d in 1..=depth {
            let mut segs = prefix.clone();
            let dot_dirs = vec![".*"; d];
            segs.extend(dot_dirs.iter().copied());
            segs.extend(rest.iter().copied());
            out.push(join(&segs));
        }
    } else if let Some(rem_str) = matches_double_star_prefix(&remainder) {
        let depth = max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        for d in 1..=depth {
            let mut segs = prefix.clone();
            segs.push(&dot_variant);
            let dot_dirs = vec![".*"; d];
            segs.extend(dot_dirs.iter().copied());
            segs.extend(rem_str.iter().copied());
            out.push(join(&segs));
        }
    }

    out
}

/// If `remainder` starts with a literal `**` segment, returns the segments
/// after it; used when the globby segment itself wasn't `**` but the tail
/// of the pattern still opens with one (e.g. `src/*/​**/​foo.ts`).
fn matches_double_star_prefix(remainder: &[&str]) -> Option<Vec<&str>> {
    if remainder.first() == Some(&"**") {
        Some(remainder[1..].to_vec())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_dot_prefixed_patterns_alone() {
        let out = synthesize_patterns(".config/*.json", None);
        assert_eq!(out, vec![".config/*.json".to_string()]);
    }

    #[test]
    fn adds_dot_variant_for_simple_pattern() {
        let out = synthesize_patterns("*.ts", None);
        assert!(out.contains(&"*.ts".to_string()));
        assert!(out.contains(&".*.ts".to_string()));
    }

    #[test]
    fn adds_bounded_depth_expansions_for_doublestar_prefix() {
        let out = synthesize_patterns("**/foo.ts", Some(3));
        assert!(out.contains(&"**/foo.ts".to_string()));
        assert!(out.contains(&".*/foo.ts".to_string()));
        assert!(out.contains(&".*/.*/foo.ts".to_string()));
        assert!(out.contains(&".*/.*/.*/foo.ts".to_string()));
        assert!(!out.iter().any(|p| p.matches(".*/").count() == 4));
    }

    #[test]
    fn prefix_is_preserved_in_variants() {
        let out = synthesize_patterns("src/*.ts", None);
        assert!(out.contains(&"src/.*.ts".to_string()));
    }
}
