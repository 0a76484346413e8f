// diff.rs
//! Unified-diff generation (spec §1, §6: "a thin wrapper over a standard
//! unified-diff routine"). Deliberately has no dependency on any other
//! component here beyond producing a string — diff/patch generation and
//! its progress plumbing are explicitly out of scope for the core (spec
//! §1); this is just enough to satisfy the `diff` operation's contract.

use similar::TextDiff;

/// Produces a unified diff of `original` -> `modified`, with `context`
/// lines of surrounding context (conventionally 3) and the given file
/// labels in the `---`/`+++` header.
pub fn unified_diff(original: &str, modified: &str, original_label: &str, modified_label: &str) -> String {
    TextDiff::from_lines(original, modified)
        .unified_diff()
        .context_radius(3)
        .header(original_label, modified_label)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_unified_diff_header_and_hunk() {
        let out = unified_diff("a\nb\nc\n", "a\nx\nc\n", "original", "modified");
        assert!(out.contains("--- original"));
        assert!(out.contains("+++ modified"));
        assert!(out.contains("-b"));
        assert!(out.contains("+x"));
    }

    #[test]
    fn identical_inputs_produce_empty_diff() {
        let out = unified_diff("same\n", "same\n", "a", "b");
        assert!(out.is_empty());
    }
}
