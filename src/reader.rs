// reader.rs
//! Bounded-read layer (spec §4.4, C4).
//!
//! Opens the file once, dispatches by mode. Exactly one of
//! {full, head, tail, range} applies — [`ReadMode`] makes that a type-level
//! enum instead of a bag of optional fields validated post hoc (spec §9
//! redesign note: "enumerate valid combinations rather than validating
//! post hoc").

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::cancellation::CancelToken;
use crate::error::{ErrorKind, FsContextError, FsResult};
use crate::model::{ReadMode, ReadResult};

const TAIL_CHUNK: usize = 256 * 1024;
const MAX_RANGE_SPAN: usize = 100_000;

/// The single read mode a request may specify (spec §4.4: "specifying
/// more than one fails `E_INVALID_INPUT`" — modeled here as a variant
/// selection instead of four optional fields).
#[derive(Debug, Clone, Copy)]
pub enum ReadSpec {
    Full,
    Head(usize),
    Tail(usize),
    Range(usize, usize),
}

pub struct ReadConfig {
    pub max_size: u64,
    pub max_line_len: usize,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            max_size: 10 * 1024 * 1024,
            max_line_len: 4096,
        }
    }
}

pub async fn read(
    path: &Path,
    spec: ReadSpec,
    cfg: &ReadConfig,
    cancel: &CancelToken,
) -> FsResult<ReadResult> {
    if let ReadSpec::Range(start, end) = spec {
        if start < 1 || end < start {
            return Err(FsContextError::invalid_input(
                "line range must satisfy 1 <= start <= end",
            ));
        }
        if end - start + 1 > MAX_RANGE_SPAN {
            return Err(FsContextError::invalid_input(format!(
                "line range too large: maximum span is {MAX_RANGE_SPAN} lines"
            )));
        }
    }

    let path_str = path.to_string_lossy().into_owned();
    let mut file = File::open(path).await.map_err(|e| FsContextError::from_io(&e, &path_str))?;
    let meta = file.metadata().await.map_err(|e| FsContextError::from_io(&e, &path_str))?;
    if !meta.is_file() {
        return Err(FsContextError::not_a_file(&path_str));
    }

    match spec {
        ReadSpec::Full => read_full(&mut file, meta.len(), cfg, &path_str, cancel).await,
        ReadSpec::Head(n) => read_head(&mut file, n, cfg, &path_str, cancel).await,
        ReadSpec::Tail(n) => read_tail(&mut file, meta.len(), n, cfg, &path_str, cancel).await,
        ReadSpec::Range(start, end) => {
            read_range(&mut file, start, end, cfg, &path_str, cancel).await
        }
    }
}

async fn read_full(
    file: &mut File,
    size: u64,
    cfg: &ReadConfig,
    path_str: &str,
    cancel: &CancelToken,
) -> FsResult<ReadResult> {
    if size > cfg.max_size {
        return Err(FsContextError::too_large(path_str));
    }
    cancel.check()?;
    let mut buf = Vec::with_capacity(size as usize);
    file.read_to_end(&mut buf)
        .await
        .map_err(|e| FsContextError::from_io(&e, path_str))?;
    let content = String::from_utf8_lossy(&buf).into_owned();
    let total_lines = count_lines(&content);

    Ok(ReadResult {
        path: path_str.to_string(),
        content,
        truncated: false,
        read_mode: ReadMode::Full,
        total_lines: Some(total_lines),
        lines_read: Some(total_lines),
        has_more_lines: Some(false),
        head: None,
        tail: None,
        start_line: None,
        end_line: None,
    })
}

async fn read_head(
    file: &mut File,
    n: usize,
    cfg: &ReadConfig,
    path_str: &str,
    cancel: &CancelToken,
) -> FsResult<ReadResult> {
    let mut out = String::new();
    let mut lines_read = 0usize;
    let mut bytes_read: u64 = 0;
    let mut truncated = false;
    let mut reader = LineReader::new(file);

    while lines_read < n {
        cancel.check()?;
        match reader.next_line(cfg.max_line_len).await? {
            Some(line) => {
                bytes_read += line.len() as u64 + 1;
                out.push_str(&line);
                out.push('\n');
                lines_read += 1;
                if bytes_read >= cfg.max_size {
                    truncated = reader.has_more().await?;
                    break;
                }
            }
            None => break,
        }
    }
    if lines_read >= n {
        truncated = reader.has_more().await?;
    }

    Ok(ReadResult {
        path: path_str.to_string(),
        content: out,
        truncated,
        read_mode: ReadMode::Head,
        total_lines: None,
        lines_read: Some(lines_read),
        has_more_lines: Some(truncated),
        head: Some(n),
        tail: None,
        start_line: None,
        end_line: None,
    })
}

async fn read_range(
    file: &mut File,
    start: usize,
    end: usize,
    cfg: &ReadConfig,
    path_str: &str,
    cancel: &CancelToken,
) -> FsResult<ReadResult> {
    let mut reader = LineReader::new(file);
    let mut current = 1usize;
    let mut out = String::new();
    let mut lines_read = 0usize;
    let mut bytes_read: u64 = 0;
    let mut budget_tripped = false;

    while current < start {
        cancel.check()?;
        if reader.next_line(cfg.max_line_len).await?.is_none() {
            return Ok(ReadResult {
                path: path_str.to_string(),
                content: String::new(),
                truncated: false,
                read_mode: ReadMode::Range,
                total_lines: None,
                lines_read: Some(0),
                has_more_lines: Some(false),
                head: None,
                tail: None,
                start_line: Some(start),
                end_line: Some(end),
            });
        }
        current += 1;
    }

    while current <= end {
        cancel.check()?;
        match reader.next_line(cfg.max_line_len).await? {
            Some(line) => {
                bytes_read += line.len() as u64 + 1;
                out.push_str(&line);
                out.push('\n');
                lines_read += 1;
                current += 1;
                if bytes_read >= cfg.max_size {
                    budget_tripped = true;
                    break;
                }
            }
            None => break,
        }
    }

    let has_more_lines = budget_tripped || reader.has_more().await?;

    Ok(ReadResult {
        path: path_str.to_string(),
        content: out,
        truncated: budget_tripped,
        read_mode: ReadMode::Range,
        total_lines: None,
        lines_read: Some(lines_read),
        has_more_lines: Some(has_more_lines),
        head: None,
        tail: None,
        start_line: Some(start),
        end_line: Some(end),
    })
}

/// Reads from EOF backwards in [`TAIL_CHUNK`]-sized chunks, realigning to
/// a UTF-8 code-point boundary at the start of each chunk so a multi-byte
/// character never gets split across a chunk seam (spec §4.4).
async fn read_tail(
    file: &mut File,
    size: u64,
    n: usize,
    cfg: &ReadConfig,
    path_str: &str,
    cancel: &CancelToken,
) -> FsResult<ReadResult> {
    if size == 0 {
        return Ok(ReadResult {
            path: path_str.to_string(),
            content: String::new(),
            truncated: false,
            read_mode: ReadMode::Tail,
            total_lines: None,
            lines_read: Some(0),
            has_more_lines: Some(false),
            head: None,
            tail: Some(n),
            start_line: None,
            end_line: None,
        });
    }

    let mut collected: Vec<u8> = Vec::new();
    let mut cursor = size;
    let mut newline_count = 0usize;
    let mut truncated = false;

    while cursor > 0 {
        cancel.check()?;
        let chunk_len = TAIL_CHUNK.min(cursor as usize);
        let chunk_start = cursor - chunk_len as u64;
        file.seek(SeekFrom::Start(chunk_start))
            .await
            .map_err(|e| FsContextError::from_io(&e, path_str))?;
        let mut buf = vec![0u8; chunk_len];
        file.read_exact(&mut buf)
            .await
            .map_err(|e| FsContextError::from_io(&e, path_str))?;

        let aligned_start = if chunk_start > 0 {
            utf8_boundary(&buf)
        } else {
            0
        };

        newline_count += buf[aligned_start..].iter().filter(|&&b| b == b'\n').count();

        let mut prefixed = buf[aligned_start..].to_vec();
        prefixed.extend_from_slice(&collected);
        collected = prefixed;
        cursor = chunk_start + aligned_start as u64;

        if newline_count >= n || collected.len() as u64 >= cfg.max_size {
            truncated = cursor > 0;
            break;
        }
    }

    let text = String::from_utf8_lossy(&collected);
    let mut lines: Vec<&str> = text.lines().collect();
    if lines.len() > n {
        let drop = lines.len() - n;
        lines.drain(0..drop);
        truncated = true;
    }
    let content = lines.join("\n") + if lines.is_empty() { "" } else { "\n" };
    let lines_read = lines.len();

    Ok(ReadResult {
        path: path_str.to_string(),
        content,
        truncated,
        read_mode: ReadMode::Tail,
        total_lines: None,
        lines_read: Some(lines_read),
        has_more_lines: Some(truncated),
        head: None,
        tail: Some(n),
        start_line: None,
        end_line: None,
    })
}

/// Finds the first index in `buf` that starts a complete UTF-8 sequence —
/// i.e. is not a continuation byte (`0b10xxxxxx`). Scanning at most 3
/// bytes in is enough since UTF-8 code points span at most 4 bytes.
fn utf8_boundary(buf: &[u8]) -> usize {
    for i in 0..buf.len().min(4) {
        if buf[i] & 0b1100_0000 != 0b1000_0000 {
            return i;
        }
    }
    0
}

fn count_lines(content: &str) -> usize {
    if content.is_empty() {
        return 0;
    }
    let n = content.lines().count();
    n
}

/// Minimal forward line reader over an already-open file handle, used by
/// head/range. Strips a trailing `\r` on emit (spec §4.4: line separators
/// are `\n` and `\r\n`).
struct LineReader<'a> {
    file: &'a mut File,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<'a> LineReader<'a> {
    fn new(file: &'a mut File) -> Self {
        Self {
            file,
            buf: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    async fn fill(&mut self) -> std::io::Result<bool> {
        if self.eof {
            return Ok(false);
        }
        let mut chunk = vec![0u8; 64 * 1024];
        let n = self.file.read(&mut chunk).await?;
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }
        chunk.truncate(n);
        if self.pos > 0 {
            self.buf.drain(0..self.pos);
            self.pos = 0;
        }
        self.buf.extend_from_slice(&chunk);
        Ok(true)
    }

    async fn next_line(&mut self, max_line_len: usize) -> FsResult<Option<String>> {
        loop {
            if let Some(nl_pos) = self.buf[self.pos..].iter().position(|&b| b == b'\n') {
                let abs = self.pos + nl_pos;
                let mut line = self.buf[self.pos..abs].to_vec();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                self.pos = abs + 1;
                truncate_to_cap(&mut line, max_line_len);
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
            if !self.fill().await.map_err(FsContextError::from)? {
                if self.pos < self.buf.len() {
                    let mut line = self.buf[self.pos..].to_vec();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    self.pos = self.buf.len();
                    truncate_to_cap(&mut line, max_line_len);
                    return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
                }
                return Ok(None);
            }
        }
    }

    async fn has_more(&mut self) -> FsResult<bool> {
        if self.pos < self.buf.len() {
            return Ok(true);
        }
        Ok(self.fill().await.map_err(FsContextError::from)? && self.pos < self.buf.len())
    }
}

fn truncate_to_cap(line: &mut Vec<u8>, cap: usize) {
    if line.len() > cap {
        line.truncate(cap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn write_temp(content: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        let mut f = File::create(&path).await.unwrap();
        f.write_all(content).await.unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn full_read_reports_total_lines() {
        let (_d, p) = write_temp(b"a\nb\nc\n").await;
        let r = read(&p, ReadSpec::Full, &ReadConfig::default(), &CancelToken::none())
            .await
            .unwrap();
        assert_eq!(r.total_lines, Some(3));
        assert!(!r.truncated);
    }

    #[tokio::test]
    async fn full_read_rejects_oversized_file() {
        let (_d, p) = write_temp(&vec![b'x'; 100]).await;
        let cfg = ReadConfig { max_size: 10, max_line_len: 4096 };
        let err = read(&p, ReadSpec::Full, &cfg, &CancelToken::none()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TooLarge);
    }

    #[tokio::test]
    async fn head_stops_at_requested_lines() {
        let (_d, p) = write_temp(b"1\n2\n3\n4\n5\n").await;
        let r = read(&p, ReadSpec::Head(2), &ReadConfig::default(), &CancelToken::none())
            .await
            .unwrap();
        assert_eq!(r.content, "1\n2\n");
        assert!(r.truncated);
        assert_eq!(r.has_more_lines, Some(true));
    }

    #[tokio::test]
    async fn tail_returns_last_lines() {
        let (_d, p) = write_temp(b"1\n2\n3\n4\n5\n").await;
        let r = read(&p, ReadSpec::Tail(2), &ReadConfig::default(), &CancelToken::none())
            .await
            .unwrap();
        assert_eq!(r.content, "4\n5\n");
    }

    #[tokio::test]
    async fn tail_of_empty_file_is_empty_and_not_truncated() {
        let (_d, p) = write_temp(b"").await;
        let r = read(&p, ReadSpec::Tail(10), &ReadConfig::default(), &CancelToken::none())
            .await
            .unwrap();
        assert_eq!(r.content, "");
        assert!(!r.truncated);
    }

    #[tokio::test]
    async fn range_starting_beyond_eof_has_zero_lines() {
        let (_d, p) = write_temp(b"1\n2\n3\n").await;
        let r = read(&p, ReadSpec::Range(100, 110), &ReadConfig::default(), &CancelToken::none())
            .await
            .unwrap();
        assert_eq!(r.lines_read, Some(0));
        assert_eq!(r.has_more_lines, Some(false));
    }

    #[tokio::test]
    async fn range_rejects_inverted_bounds() {
        let (_d, p) = write_temp(b"1\n2\n").await;
        let err = read(&p, ReadSpec::Range(5, 2), &ReadConfig::default(), &CancelToken::none())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn range_rejects_span_too_large() {
        let (_d, p) = write_temp(b"1\n").await;
        let err = read(&p, ReadSpec::Range(1, 200_000), &ReadConfig::default(), &CancelToken::none())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn range_is_idempotent() {
        let (_d, p) = write_temp(b"1\n2\n3\n4\n5\n").await;
        let r1 = read(&p, ReadSpec::Range(2, 4), &ReadConfig::default(), &CancelToken::none())
            .await
            .unwrap();
        let r2 = read(&p, ReadSpec::Range(2, 4), &ReadConfig::default(), &CancelToken::none())
            .await
            .unwrap();
        assert_eq!(r1.content, r2.content);
        assert_eq!(r1.lines_read, r2.lines_read);
        assert_eq!(r1.has_more_lines, r2.has_more_lines);
    }

    #[tokio::test]
    async fn tail_realigns_across_multibyte_boundary() {
        // A multi-byte UTF-8 character straddling a chunk boundary must not
        // be split; force a tiny effective boundary by using content well
        // under TAIL_CHUNK but containing multi-byte chars near the start.
        let content = "héllo\nwörld\n".as_bytes().to_vec();
        let (_d, p) = write_temp(&content).await;
        let r = read(&p, ReadSpec::Tail(2), &ReadConfig::default(), &CancelToken::none())
            .await
            .unwrap();
        assert!(r.content.contains('ö'));
    }
}
