// binary_sniff.rs
//! Binary/text classification (spec §4.3, C3).
//!
//! Decision order: known-binary extension -> leading-byte sniff (BOM, NUL
//! byte) -> text. Accepts an already-open handle so the content scanner
//! doesn't pay for a second `open()` during search (spec §4.3).

use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const SNIFF_WINDOW: usize = 8 * 1024;

const KNOWN_BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff",
    "mp3", "mp4", "mov", "avi", "mkv", "wav", "flac", "ogg",
    "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "zst",
    "exe", "dll", "so", "dylib", "bin", "obj", "o", "a", "lib",
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    "woff", "woff2", "ttf", "otf", "eot",
    "class", "jar", "wasm", "pyc", "db", "sqlite", "sqlite3",
];

/// Classifies a file as text or binary. `ext` is the lowercased extension
/// (without the dot) if any; `handle` must be positioned wherever the
/// caller wants — this function seeks to the start and restores nothing,
/// since callers sniff once right after opening.
pub async fn is_binary(handle: &mut File, ext: Option<&str>) -> std::io::Result<bool> {
    if let Some(ext) = ext {
        if KNOWN_BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            return Ok(true);
        }
    }

    handle.seek(SeekFrom::Start(0)).await?;
    let mut buf = vec![0u8; SNIFF_WINDOW];
    let mut total = 0;
    loop {
        let n = handle.read(&mut buf[total..]).await?;
        if n == 0 {
            break;
        }
        total += n;
        if total == buf.len() {
            break;
        }
    }
    let window = &buf[..total];

    if window.is_empty() {
        return Ok(false);
    }
    if has_text_bom(window) {
        return Ok(false);
    }
    Ok(window.contains(&0))
}

fn has_text_bom(window: &[u8]) -> bool {
    window.starts_with(&[0xEF, 0xBB, 0xBF]) // UTF-8
        || window.starts_with(&[0xFF, 0xFE]) // UTF-16 LE
        || window.starts_with(&[0xFE, 0xFF]) // UTF-16 BE
}

pub fn extension_of(path: &std::path::Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn write_temp(bytes: &[u8]) -> (tempfile::TempDir, File) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample");
        let mut f = File::create(&path).await.unwrap();
        f.write_all(bytes).await.unwrap();
        f.flush().await.unwrap();
        drop(f);
        let f = File::open(&path).await.unwrap();
        (dir, f)
    }

    #[tokio::test]
    async fn empty_file_is_text() {
        let (_dir, mut f) = write_temp(b"").await;
        assert!(!is_binary(&mut f, None).await.unwrap());
    }

    #[tokio::test]
    async fn nul_byte_marks_binary() {
        let (_dir, mut f) = write_temp(b"hello\0world").await;
        assert!(is_binary(&mut f, None).await.unwrap());
    }

    #[tokio::test]
    async fn utf8_bom_is_text() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"hello");
        let (_dir, mut f) = write_temp(&bytes).await;
        assert!(!is_binary(&mut f, None).await.unwrap());
    }

    #[tokio::test]
    async fn known_extension_short_circuits_without_reading() {
        let (_dir, mut f) = write_temp(b"not actually binary content").await;
        assert!(is_binary(&mut f, Some("png")).await.unwrap());
    }

    #[tokio::test]
    async fn plain_text_is_text() {
        let (_dir, mut f) = write_temp(b"fn main() {}\n").await;
        assert!(!is_binary(&mut f, None).await.unwrap());
    }
}
