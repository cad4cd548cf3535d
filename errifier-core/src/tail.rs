//! Trailing-line reader.
//!
//! Reads a file backwards in fixed-size chunks until enough line breaks have
//! been seen, so the cost tracks the size of the tail rather than the file.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::TailError;

const CHUNK_SIZE: u64 = 8 * 1024;

/// Return up to the last `n` lines of `path`, oldest first.
///
/// A final line terminator does not produce an empty trailing line, `\r\n`
/// endings are trimmed, and invalid UTF-8 is replaced.
pub fn tail(path: &Path, n: usize) -> Result<Vec<String>, TailError> {
    let mut file = File::open(path).map_err(|e| tail_err(path, e))?;
    if n == 0 {
        return Ok(Vec::new());
    }

    let len = file.metadata().map_err(|e| tail_err(path, e))?.len();
    let bytes = read_tail_bytes(&mut file, len, n).map_err(|e| tail_err(path, e))?;
    Ok(split_last_lines(&bytes, n))
}

/// [`tail`] on the blocking pool.
pub async fn tail_async(path: PathBuf, n: usize) -> Result<Vec<String>, TailError> {
    let for_err = path.clone();
    tokio::task::spawn_blocking(move || tail(&path, n))
        .await
        .map_err(|join| TailError::Io {
            path: for_err,
            source: std::io::Error::other(join.to_string()),
        })?
}

/// Read just enough bytes from the end of `file` to hold `n` lines.
fn read_tail_bytes(file: &mut File, len: u64, n: usize) -> std::io::Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    let mut pos = len;
    // n lines need n separators before them, plus one possible trailing newline.
    let wanted = n.saturating_add(1);

    while pos > 0 {
        let step = CHUNK_SIZE.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos))?;

        let mut chunk = vec![0u8; step as usize];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&buf);
        buf = chunk;

        if buf.iter().filter(|b| **b == b'\n').count() >= wanted {
            break;
        }
    }
    Ok(buf)
}

fn split_last_lines(bytes: &[u8], n: usize) -> Vec<String> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);

    let mut lines: Vec<String> = body
        .rsplit(|b| *b == b'\n')
        .take(n)
        .map(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            String::from_utf8_lossy(line).into_owned()
        })
        .collect();
    lines.reverse();
    lines
}

fn tail_err(path: &Path, source: std::io::Error) -> TailError {
    if source.kind() == ErrorKind::NotFound {
        TailError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        TailError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
