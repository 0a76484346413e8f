// scan_worker.rs
//! Optional side-thread worker pool for content scanning (spec §4.7, §5).
//!
//! Isolates per-line regex evaluation on dedicated OS threads so a
//! pathological (if gate-approved) pattern cannot stall the async runtime.
//! Workers communicate with the scanner purely through
//! `std::sync::mpsc` — no state is shared except the counters the caller
//! accumulates from each response, matching the "no shared mutable state
//! between threads" rule in spec §5.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use regex::Regex;

use crate::error::FsContextError;
use crate::model::MatchRecord;

pub struct ScanJob {
    pub path: PathBuf,
    pub relative_file: String,
    pub regex: Regex,
    pub context_lines: usize,
    pub max_line_len: usize,
    pub per_line_timeout: Duration,
    pub max_matches: usize,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub matches: Vec<MatchRecord>,
    pub lines_skipped_due_to_regex_timeout: usize,
}

enum Request {
    Scan {
        job: ScanJob,
        reply: mpsc::Sender<Result<ScanOutcome, FsContextError>>,
    },
}

/// A pool of worker threads, or an empty pool meaning "run in-process"
/// (spec §4.7: "when the pool size is zero, scanning runs in-process").
pub struct WorkerPool {
    sender: Option<mpsc::Sender<Request>>,
    handles: Vec<std::thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        if size == 0 {
            return Self { sender: None, handles: Vec::new() };
        }

        let (tx, rx) = mpsc::channel::<Request>();
        let rx = Arc::new(Mutex::new(rx));
        let mut handles = Vec::with_capacity(size);

        for _ in 0..size {
            let rx = rx.clone();
            handles.push(std::thread::spawn(move || loop {
                let request = {
                    let guard = rx.lock().unwrap();
                    guard.recv()
                };
                match request {
                    Ok(Request::Scan { job, reply }) => {
                        let outcome = super::content_scanner::run_job_sync(job);
                        let _ = reply.send(outcome);
                    }
                    Err(_) => break,
                }
            }));
        }

        Self { sender: Some(tx), handles }
    }

    pub fn is_inline(&self) -> bool {
        self.sender.is_none()
    }

    /// Submits a job and blocks until the worker replies or `is_cancelled`
    /// starts returning true, in which case the caller gets `E_CANCELLED`
    /// and the worker's eventual result (if any) is discarded (spec §5:
    /// "workers that raced past the cancel boundary may produce one extra
    /// result that is discarded").
    pub fn submit(
        &self,
        job: ScanJob,
        is_cancelled: impl Fn() -> bool,
    ) -> Result<ScanOutcome, FsContextError> {
        let sender = match &self.sender {
            Some(s) => s,
            None => return super::content_scanner::run_job_sync(job),
        };

        let (reply_tx, reply_rx) = mpsc::channel();
        sender
            .send(Request::Scan { job, reply: reply_tx })
            .map_err(|_| FsContextError::new(
                crate::error::ErrorKind::Unknown,
                "scan worker pool is shut down",
            ))?;

        loop {
            match reply_rx.recv_timeout(Duration::from_millis(25)) {
                Ok(result) => return result,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if is_cancelled() {
                        return Err(FsContextError::cancelled());
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(FsContextError::new(
                        crate::error::ErrorKind::Unknown,
                        "scan worker disconnected before replying",
                    ));
                }
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_pool_reports_zero_size() {
        let pool = WorkerPool::new(0);
        assert!(pool.is_inline());
    }

    #[test]
    fn threaded_pool_is_not_inline() {
        let pool = WorkerPool::new(2);
        assert!(!pool.is_inline());
    }
}
