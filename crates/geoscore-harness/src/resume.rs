//! Resumable JSONL output.
//!
//! Every record gets a stable, content-derived key: the record's own
//! `unique_key` when present, otherwise a sha256 over `id | round | model`.
//! Keys already present in an existing output file are skipped on re-runs,
//! giving at-most-once semantics per key across interrupted batches.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use geoscore_error::Result;

/// Stable resume key of one record.
#[must_use]
pub fn record_key(record: &serde_json::Value) -> String {
    if let Some(key) = record.get("unique_key").and_then(|v| v.as_str()) {
        if !key.is_empty() {
            return key.to_owned();
        }
    }
    let base = format!(
        "{}|{}|{}",
        plain_field(record, "id"),
        plain_field(record, "round"),
        plain_field(record, "model")
    );
    use std::fmt::Write as _;
    let digest = Sha256::digest(base.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn plain_field(record: &serde_json::Value, field: &str) -> String {
    match record.get(field) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Keys of every parseable record in an existing output file. A missing
/// file means a fresh run.
pub fn load_completed_keys(path: &Path) -> Result<HashSet<String>> {
    let mut done = HashSet::new();
    if !path.exists() {
        return Ok(done);
    }
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(value) => {
                done.insert(record_key(&value));
            }
            Err(err) => {
                tracing::warn!(%err, "skipping unparseable line in existing output");
            }
        }
    }
    Ok(done)
}

/// Append-only JSONL sink shared across worker threads.
///
/// Writes buffer in memory under a single lock and flush to disk every
/// `flush_every` records, bounding both lock hold time and partial-write
/// exposure on interruption.
pub struct JsonlSink {
    inner: Mutex<SinkInner>,
    flush_every: usize,
}

struct SinkInner {
    writer: BufWriter<File>,
    pending: usize,
}

impl JsonlSink {
    /// Open `path` for appending, creating it if absent.
    pub fn append(path: &Path, flush_every: usize) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            inner: Mutex::new(SinkInner {
                writer: BufWriter::new(file),
                pending: 0,
            }),
            flush_every: flush_every.max(1),
        })
    }

    /// Append one record as a JSON line.
    pub fn write(&self, record: &serde_json::Value) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut inner = self.inner.lock();
        inner.writer.write_all(line.as_bytes())?;
        inner.writer.write_all(b"\n")?;
        inner.pending += 1;
        if inner.pending >= self.flush_every {
            inner.writer.flush()?;
            inner.pending = 0;
        }
        Ok(())
    }

    /// Flush any buffered lines to disk.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.writer.flush()?;
        inner.pending = 0;
        Ok(())
    }
}
