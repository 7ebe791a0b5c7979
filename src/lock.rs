//! Directory lock (spec.md §5: "at most one writer process may hold the WAL
//! directory open at a time").
//!
//! Grounded on the teacher's atomic-rename-then-marker pattern in
//! `ubscore_wal/snapshot.rs` (write to a temp path, then rename into place),
//! adapted here to a lock file instead of a snapshot directory: the lock is
//! acquired by creating `<prefix>.lock` exclusively (`OpenOptions::create_new`,
//! the same all-or-nothing primitive the teacher leans on for atomicity) and
//! released by removing it on drop.

use crate::config::WalConfig;
use crate::error::{Result, WalError};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Holds exclusive ownership of a WAL directory for the lifetime of the
/// value. The lock file is removed when this is dropped.
pub struct DirLock {
    path: PathBuf,
}

impl DirLock {
    /// Acquire the lock, reclaiming a stale one if its pid is recorded and
    /// its age exceeds `config.lock_stale_seconds`.
    ///
    /// Liveness of the owning pid is not probed (no process-inspection
    /// dependency is part of the teacher's stack) - staleness is judged
    /// purely by file age, per spec.md §5's "a lock older than
    /// `lock_stale_seconds` may be reclaimed".
    pub fn acquire(config: &WalConfig) -> Result<Self> {
        fs::create_dir_all(&config.dir)?;
        let path = config.dir.join(format!("{}.lock", config.file_prefix));

        match try_create_exclusive(&path, std::process::id()) {
            Ok(()) => return Ok(Self { path }),
            Err(WalError::WalIo(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(other) => return Err(other),
        }

        if is_stale(&path, config.lock_stale_seconds)? {
            fs::remove_file(&path)?;
            try_create_exclusive(&path, std::process::id())?;
            return Ok(Self { path });
        }

        let pid = read_pid(&path).unwrap_or(0);
        Err(WalError::WalLocked(pid))
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn try_create_exclusive(path: &Path, pid: u32) -> Result<()> {
    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    f.write_all(pid.to_string().as_bytes())?;
    f.sync_all()?;
    Ok(())
}

fn read_pid(path: &Path) -> Option<u32> {
    let mut s = String::new();
    File::open(path).ok()?.read_to_string(&mut s).ok()?;
    s.trim().parse().ok()
}

fn is_stale(path: &Path, stale_seconds: u64) -> Result<bool> {
    let metadata = fs::metadata(path)?;
    let modified = metadata.modified()?;
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default();
    Ok(age.as_secs() >= stale_seconds)
}
