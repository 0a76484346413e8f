// lib.rs
//! `fs-context-core`: the sandboxed filesystem-access engine for
//! autonomous agents described in the crate's design notes (path-safety
//! kernel, traversal/search pipeline, bounded reads, cancellation and
//! diagnostics). The wire transport (JSON-RPC, HTTP) and tool-schema
//! validation are deliberately out of scope — this crate is what such a
//! transport calls into.
//!
//! [`operations::Engine`] is the single entry point: it owns the
//! process-wide allowed-root set and sensitive-path policy, and exposes
//! one method per operation in the agent-facing surface (`stat`,
//! `listDirectory`, `search`, `searchContent`, `read`, `readMany`,
//! `tree`, `hash`, `diff`, `write`/`mkdir`/`mv`/`rm`).

#![forbid(unsafe_code)]

pub mod batch_io;
pub mod batch_orchestrator;
pub mod binary_sniff;
pub mod cancellation;
pub mod config;
pub mod content_scanner;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod gitignore;
pub mod glob_engine;
pub mod hasher;
pub mod model;
pub mod mutations;
pub mod operations;
pub mod path_kernel;
pub mod patterns;
pub mod reader;
pub mod regex_gate;
pub mod scan_worker;
pub mod tree;
pub mod windows;

pub use crate::cancellation::{CancelGuard, CancelToken};
pub use crate::error::{ErrorKind, FsContextError, FsResult, GlobError};
pub use crate::operations::Engine;
pub use crate::path_kernel::{AllowedRoots, SensitivePolicy};
