// cancellation.rs
//! Cooperative-cancellation fabric (spec §4.2, C2).
//!
//! The fabric composes a caller-provided cancel signal with an optional
//! timeout into a single token that every suspension point checks. This
//! replaces a callback-attach/detach style with a value that is cloned by
//! ownership down the call graph instead of a listener that must be
//! remembered and detached later (spec §9 redesign note).

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::FsContextError;

/// A cooperative cancel token, composing a caller cancel with an optional
/// deadline. Clone is cheap (`Arc` internally) — pass by value down the
/// call graph rather than threading `&dyn Signal` references.
#[derive(Clone)]
pub struct CancelToken {
    inner: CancellationToken,
    /// Set when this token's own timer (not a parent's) fired, so callers
    /// can tell `E_TIMEOUT` apart from a user-initiated `E_CANCELLED`.
    timed_out: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

/// Owns the composed token's timer task; dropping it aborts the timer on
/// every exit path (success, error, early return) so no timer outlives
/// the request that created it.
pub struct CancelGuard {
    timer_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(h) = self.timer_handle.take() {
            h.abort();
        }
    }
}

impl CancelToken {
    /// Builds a fresh token that fires when either `parent` (the caller's
    /// own cancel, if any) or `timeout` elapses — whichever comes first.
    /// The returned guard must be kept alive for the duration of the
    /// operation.
    pub fn new(parent: Option<&CancelToken>, timeout: Option<Duration>) -> (Self, CancelGuard) {
        let inner = match parent {
            Some(p) => p.inner.child_token(),
            None => CancellationToken::new(),
        };
        let timed_out = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));

        let timer_handle = timeout.map(|d| {
            let inner = inner.clone();
            let timed_out = timed_out.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(d) => {
                        timed_out.store(true, std::sync::atomic::Ordering::SeqCst);
                        inner.cancel();
                    }
                    _ = inner.cancelled() => {}
                }
            })
        });

        (
            CancelToken { inner, timed_out },
            CancelGuard { timer_handle },
        )
    }

    /// A token that never cancels — for call sites exercised without a
    /// real request boundary (unit tests, internal helpers).
    pub fn none() -> Self {
        CancelToken {
            inner: CancellationToken::new(),
            timed_out: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Checked at every natural suspension point per spec §4.2/§5: a
    /// directory entry, a stream chunk, a scanned line after a regex
    /// match, a chunk read, a semaphore acquisition.
    pub fn check(&self) -> Result<(), FsContextError> {
        if !self.inner.is_cancelled() {
            return Ok(());
        }
        if self.timed_out() {
            Err(FsContextError::timeout())
        } else {
            Err(FsContextError::cancelled())
        }
    }

    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }

    /// A child token observes this token's cancellation automatically
    /// (via `tokio_util`'s tree) and can additionally be cancelled on its
    /// own without affecting siblings — used by the batch orchestrator to
    /// hand each in-flight item a token that it alone controls.
    pub fn child(&self) -> CancelToken {
        CancelToken {
            inner: self.inner.child_token(),
            timed_out: self.timed_out.clone(),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn uncancelled_token_checks_ok() {
        let token = CancelToken::none();
        assert!(token.check().is_ok());
    }

    #[tokio::test]
    async fn timeout_fires_as_timeout_not_cancelled() {
        let (token, _guard) = CancelToken::new(None, Some(Duration::from_millis(10)));
        assert!(token.check().is_ok());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = token.check().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn explicit_cancel_fires_as_cancelled() {
        let (token, _guard) = CancelToken::new(None, None);
        token.cancel();
        let err = token.check().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn dropping_guard_stops_timer_from_firing() {
        let (token, guard) = CancelToken::new(None, Some(Duration::from_millis(20)));
        drop(guard);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(token.check().is_ok());
    }

    #[tokio::test]
    async fn child_observes_parent_cancellation() {
        let (parent, _guard) = CancelToken::new(None, None);
        let child = parent.child();
        assert!(child.check().is_ok());
        parent.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(child.check().is_err());
    }
}
