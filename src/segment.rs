//! Segment Store (spec.md §4.2): an append-only directory of WAL files.
//!
//! Grounded on the teacher's `UBSCoreWalWriter` (`ubscore_wal/wal.rs`), which
//! wraps a single `BufWriter<File>` and tracks the next sequence number, and
//! on `wal_v2`'s epoch-based file naming. Generalized here to multiple
//! rotated segment files, named so that an on-disk listing sorts in
//! sequence order without reading any file contents.

use crate::config::WalConfig;
use crate::error::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Encode the first sequence number a segment file holds into its name:
/// `<prefix>_<seq as 16 hex digits>.wal`. Lexicographic sort on the
/// filename then matches sequence order.
pub fn segment_file_name(prefix: &str, first_seq: u64) -> String {
    format!("{prefix}_{first_seq:016x}.wal")
}

/// Parse a segment's first sequence number back out of its file name.
/// Returns `None` for files that don't match the naming convention (e.g. the
/// lock file, or a checkpoint file under a different extension).
pub fn parse_segment_file_name(prefix: &str, name: &str) -> Option<u64> {
    let stem = name.strip_prefix(prefix)?.strip_prefix('_')?;
    let hex = stem.strip_suffix(".wal")?;
    u64::from_str_radix(hex, 16).ok()
}

/// List all segment files under `config.dir`, sorted by their first
/// sequence number.
pub fn list_segments(config: &WalConfig) -> Result<Vec<(u64, PathBuf)>> {
    let mut out = Vec::new();
    if !config.dir.exists() {
        return Ok(out);
    }
    for entry in fs::read_dir(&config.dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(first_seq) = parse_segment_file_name(&config.file_prefix, name) {
            out.push((first_seq, entry.path()));
        }
    }
    out.sort_by_key(|(seq, _)| *seq);
    Ok(out)
}

/// The currently open, append-only segment file.
pub struct ActiveSegment {
    path: PathBuf,
    first_seq: u64,
    writer: BufWriter<File>,
    bytes_written: u64,
    records_written: u64,
}

impl ActiveSegment {
    /// Create a brand-new segment file starting at `first_seq`. Fails if a
    /// segment with that name already exists (sequence numbers are
    /// monotonic, so this would indicate a bug in the caller).
    pub fn create(config: &WalConfig, first_seq: u64) -> Result<Self> {
        let path = config.dir.join(segment_file_name(&config.file_prefix, first_seq));
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        Ok(Self {
            path,
            first_seq,
            writer: BufWriter::new(file),
            bytes_written: 0,
            records_written: 0,
        })
    }

    /// Re-open an existing segment for appending (used on startup to resume
    /// the last partial segment after a clean shutdown, or after replay has
    /// truncated a torn tail off it). The record-count threshold starts
    /// counting fresh from this point — only the byte size, which is read
    /// straight off the file, carries over exactly.
    pub fn open_append(path: PathBuf, first_seq: u64) -> Result<Self> {
        let file = OpenOptions::new().append(true).open(&path)?;
        let bytes_written = file.metadata()?.len();
        Ok(Self {
            path,
            first_seq,
            writer: BufWriter::new(file),
            bytes_written,
            records_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn first_seq(&self) -> u64 {
        self.first_seq
    }

    pub fn size(&self) -> u64 {
        self.bytes_written
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        self.records_written += 1;
        Ok(())
    }

    /// Flush the internal buffer and `fsync` the file descriptor.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    pub fn records(&self) -> u64 {
        self.records_written
    }

    /// Rotation policy (spec.md §4.2): byte threshold OR record-count
    /// threshold, whichever fires first.
    pub fn should_rotate(&self, max_bytes: u64, max_records: u64) -> bool {
        self.bytes_written >= max_bytes || self.records_written >= max_records
    }
}

/// Truncate a segment file to `len` bytes, used by the Replay Engine to
/// drop a torn tail record so future appends start from a known-good
/// position (spec.md §4.5).
pub fn truncate_to(path: &Path, len: u64) -> Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    Ok(())
}
