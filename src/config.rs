//! Configuration (spec.md §6), styled after the teacher's `UBSCoreConfig` /
//! `AppConfig`: a plain struct with a `new`/`default`-style constructor and
//! documented defaults, no config-file parser (the spec names no format).

use std::path::PathBuf;

/// Tunables for the WAL, segment store and replay engine.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Directory the WAL owns. Segment files, the lock file and checkpoints
    /// all live here.
    pub dir: PathBuf,

    /// Prefix used for segment file names and the lock file
    /// (`<prefix>_<seq>.wal`, `<prefix>.lock`).
    pub file_prefix: String,

    /// Call `fsync` after every append. Default `true`; spec.md §6 allows
    /// disabling this for throughput at the cost of the durability window.
    pub sync_on_write: bool,

    /// Roll to a new segment once the active segment exceeds this size.
    pub segment_max_bytes: u64,

    /// Roll to a new segment once the active segment holds this many
    /// records, whichever of this and `segment_max_bytes` fires first
    /// (spec.md §4.2). Spec.md names no specific default, so this is set
    /// generously high enough that `segment_max_bytes` is the threshold
    /// that actually fires under the sizes §8's scenarios exercise.
    pub segment_max_records: u64,

    /// Write a checkpoint after this many records since the last one.
    pub checkpoint_records: u64,

    /// Write a checkpoint after this many seconds since the last one.
    pub checkpoint_seconds: u64,

    /// Maximum number of missing sequence numbers replay will tolerate
    /// before raising [`crate::error::WalError::ReplayGap`]. Default `0`
    /// (any gap is fatal), per spec.md §4.5.
    pub replay_max_gap_tolerance: u64,

    /// A lock file older than this many seconds, whose owning pid is no
    /// longer alive, is reclaimed rather than treated as a live lock.
    pub lock_stale_seconds: u64,
}

impl WalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file_prefix: "vzwl".to_string(),
            sync_on_write: true,
            segment_max_bytes: 64 * 1024 * 1024,
            segment_max_records: 1_000_000,
            checkpoint_records: 100_000,
            checkpoint_seconds: 60,
            replay_max_gap_tolerance: 0,
            lock_stale_seconds: 30,
        }
    }
}

/// Logging setup, analogous to the teacher's `AppConfig` used by
/// `logging::init_logging`.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub log_file: String,
    /// One of `"never"`, `"hourly"`, `"daily"`.
    pub rotation: String,
    pub log_level: String,
    pub use_json: bool,
}

impl LogConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            log_file: "vzwl.log".to_string(),
            rotation: "daily".to_string(),
            log_level: "info".to_string(),
            use_json: false,
        }
    }
}
