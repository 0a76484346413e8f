// bin/fs_context_cli.rs
//! `fs-context-cli` — a single-shot CLI over the operation table.
//!
//! This only wires argument parsing, logging initialization, and a thin
//! subcommand dispatch down to [`fs_context_core::operations::Engine`] so
//! the core can be exercised from a shell; the host-facing request
//! transport (line-delimited JSON-RPC, HTTP with session IDs) is a
//! separate concern this binary does not implement.

use std::process::ExitCode;

use clap::Parser;

use fs_context_core::cancellation::CancelToken;
use fs_context_core::config::{validate_cli_path, Cli, Command, Config};
use fs_context_core::content_scanner::ScanRequest;
use fs_context_core::model::ErrorEnvelope;
use fs_context_core::operations::Engine;
use fs_context_core::reader::{ReadConfig, ReadSpec};
use fs_context_core::FsContextError;

#[tokio::main]
async fn main() -> ExitCode {
    Config::init_logging();
    let cli = Cli::parse();

    if let Err(msg) = validate_roots(&cli) {
        eprintln!("fs-context-cli: {msg}");
        return ExitCode::FAILURE;
    }

    let config = Config::from_env();
    let engine = Engine::new(config.sensitive_policy);

    let mut roots = cli.roots.clone();
    if cli.allow_cwd {
        if let Ok(cwd) = std::env::current_dir() {
            roots.push(cwd);
        }
    }
    if roots.is_empty() {
        eprintln!("fs-context-cli: at least one root directory is required (or pass --allow-cwd)");
        return ExitCode::FAILURE;
    }

    let cancel = CancelToken::none();
    if let Err(e) = engine.set_allowed_roots(&roots, &cancel).await {
        eprintln!("fs-context-cli: {}", e.message);
        return ExitCode::FAILURE;
    }

    match run_command(&engine, cli.command, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let envelope = ErrorEnvelope::from(&e);
            eprintln!("{}", serde_json::to_string(&envelope).unwrap_or(e.message));
            ExitCode::FAILURE
        }
    }
}

/// Rejects null bytes, reserved device names, and drive-relative paths
/// before any path-kernel validation runs (host-facing CLI surface).
fn validate_roots(cli: &Cli) -> Result<(), String> {
    for root in &cli.roots {
        validate_cli_path(&root.to_string_lossy())?;
    }
    Ok(())
}

async fn run_command(engine: &Engine, command: Command, cancel: &CancelToken) -> Result<(), FsContextError> {
    match command {
        Command::ListRoots => {
            print_json(&serde_json::json!({ "roots": engine.list_roots() }));
        }
        Command::List { path, recursive, include_hidden, max_depth } => {
            let (entries, summary) = engine
                .list_directory(&path, recursive, include_hidden, max_depth, 100_000, cancel.child())
                .await?;
            print_json(&serde_json::json!({ "entries": entries, "summary": summary }));
        }
        Command::Search { path, pattern, max_results } => {
            let (entries, summary) = engine
                .search(
                    &path,
                    &pattern,
                    vec![],
                    max_results.unwrap_or(1000),
                    None,
                    10_000,
                    None,
                    false,
                    false,
                    cancel,
                )
                .await?;
            print_json(&serde_json::json!({ "results": entries, "summary": summary }));
        }
        Command::Grep { path, pattern, is_literal, whole_word } => {
            let mut req = ScanRequest::new(std::path::PathBuf::from(&path), pattern);
            req.is_literal = is_literal;
            req.whole_word = whole_word;
            let result = engine.search_content(req, None, cancel).await?;
            print_json(&serde_json::json!({
                "matches": result.matches,
                "patternType": result.pattern_type,
                "summary": {
                    "filesScanned": result.summary.files_scanned,
                    "filesMatched": result.summary.files_matched,
                    "truncated": result.summary.truncated,
                    "stoppedReason": result.summary.stopped_reason,
                },
            }));
        }
        Command::Read { path, head, tail } => {
            let spec = match (head, tail) {
                (Some(n), None) => ReadSpec::Head(n),
                (None, Some(n)) => ReadSpec::Tail(n),
                (None, None) => ReadSpec::Full,
                (Some(_), Some(_)) => {
                    return Err(FsContextError::invalid_input(
                        "specify at most one of --head/--tail",
                    ))
                }
            };
            let result = engine.read(&path, spec, &ReadConfig::default(), cancel).await?;
            print_json(&result);
        }
        Command::Stat { path } => {
            let info = engine.stat(&path, cancel).await?;
            print_json(&info);
        }
        Command::Tree { path, max_depth } => {
            let (root, truncated, total_entries, ascii) = engine
                .tree(&path, max_depth, 100_000, false, false, None, cancel)
                .await?;
            println!("{ascii}");
            print_json(&serde_json::json!({
                "root": root,
                "truncated": truncated,
                "totalEntries": total_entries,
            }));
        }
        Command::Hash { path } => {
            let (hash, is_directory, file_count) = engine.hash(&path, false, cancel).await?;
            print_json(&serde_json::json!({
                "hash": hash,
                "isDirectory": is_directory,
                "fileCount": file_count,
            }));
        }
        Command::Diff { original, modified } => {
            let diff = engine.diff(&original, &modified, cancel).await?;
            print!("{diff}");
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("fs-context-cli: failed to serialize result: {e}"),
    }
}
