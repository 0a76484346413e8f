// regex_gate.rs
//! ReDoS guard (spec §4.6, C6).
//!
//! Before any caller-supplied regex reaches the matcher, it is parsed with
//! `regex-syntax` and walked for the two catastrophic-backtracking shapes
//! that matter in practice: a quantified group that itself contains a
//! quantifier (`(a+)+`), and bounded repetition with a very high upper
//! bound (`a{1,100000}`). Patterns that pass this walk but still fail to
//! compile surface the compiler's own message (spec §4.6).

use regex_syntax::hir::{Hir, HirKind, Repetition};
use regex_syntax::Parser;

use crate::error::{ErrorKind, FsContextError};

/// Repetition bounds above this are treated as unsafe regardless of nesting;
/// a single unnested `a{100000}` is cheap to match but still cheap to reject,
/// and rejecting it early keeps the gate's behavior easy to reason about.
const MAX_BOUNDED_REPETITION: u32 = 10_000;

/// Checks `pattern` for ReDoS-prone structure. Returns the parsed `Hir` on
/// success so callers that already need to inspect it (none currently do,
/// but this mirrors how a safe-regex analyzer is normally consumed) don't
/// have to re-parse.
pub fn check_safe(pattern: &str) -> Result<Hir, FsContextError> {
    let hir = Parser::new().parse(pattern).map_err(|e| {
        FsContextError::new(
            ErrorKind::InvalidPattern,
            format!("regex parse error: {e}"),
        )
    })?;

    if has_nested_quantifier(&hir, false) {
        return Err(FsContextError::new(
            ErrorKind::InvalidPattern,
            "pattern rejected: nested quantifiers can cause catastrophic \
             backtracking (ReDoS/unsafe)",
        ));
    }

    Ok(hir)
}

/// Walks the HIR looking for a repetition node nested inside another
/// repetition node (directly, or through concatenation/group/alternation
/// wrappers that don't themselves bound the match length).
///
/// `inside_repetition` tracks whether an ancestor was itself a repetition
/// whose bounds permit unbounded or large repeat counts.
fn has_nested_quantifier(hir: &Hir, inside_repetition: bool) -> bool {
    match hir.kind() {
        HirKind::Repetition(rep) => {
            if is_huge_bound(rep) {
                return true;
            }
            if inside_repetition && is_quantifying(rep) {
                return true;
            }
            has_nested_quantifier(&rep.sub, inside_repetition || is_quantifying(rep))
        }
        HirKind::Capture(cap) => has_nested_quantifier(&cap.sub, inside_repetition),
        HirKind::Concat(subs) | HirKind::Alternation(subs) => subs
            .iter()
            .any(|s| has_nested_quantifier(s, inside_repetition)),
        _ => false,
    }
}

/// True for any repetition that can actually repeat more than once —
/// `a?` (max 1) is not a quantifier-nesting risk, `a*`/`a+`/`a{2,}` are.
fn is_quantifying(rep: &Repetition) -> bool {
    rep.max.map(|max| max > 1).unwrap_or(true)
}

/// True when the repetition's own bound is large enough to be a resource
/// risk by itself, independent of nesting (spec §4.6: "very high bounded
/// repetition").
fn is_huge_bound(rep: &Repetition) -> bool {
    rep.min > MAX_BOUNDED_REPETITION || rep.max.is_some_and(|max| max > MAX_BOUNDED_REPETITION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_patterns() {
        assert!(check_safe(r#"hello\s*=\s*"world""#).is_ok());
        assert!(check_safe(r"^[a-z]+@[a-z]+\.[a-z]{2,3}$").is_ok());
    }

    #[test]
    fn rejects_nested_quantifier() {
        assert!(check_safe(r"(a+)+").is_err());
        assert!(check_safe(r"(a*)*").is_err());
        assert!(check_safe(r"([a-zA-Z]+)*$").is_err());
    }

    #[test]
    fn rejects_huge_bounded_repetition() {
        assert!(check_safe(r"a{1,100000}").is_err());
    }

    #[test]
    fn surfaces_compiler_message_for_syntactically_invalid_pattern() {
        let err = check_safe(r"(unclosed").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPattern);
    }
}
