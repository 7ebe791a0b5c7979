//! Typed errors for the WAL and order store.
//!
//! One enum covers both caller-visible failures (`WalIo`, `WalSealed`,
//! `WalLocked`, `InvalidArgument`) and the codec/replay failures that are
//! recovered from internally (`CorruptHeader`, `CorruptPayload`,
//! `Truncated`) but are still given a typed name so tests and logging can
//! refer to them precisely.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("I/O error: {0}")]
    WalIo(#[from] std::io::Error),

    #[error("WAL is sealed and rejects further writes")]
    WalSealed,

    #[error("WAL directory is locked by another live process (pid {0})")]
    WalLocked(u32),

    #[error("record header is corrupt")]
    CorruptHeader,

    #[error("record payload is corrupt")]
    CorruptPayload,

    #[error("record is truncated")]
    Truncated,

    #[error("replay gap: missing segment covering sequence {0}")]
    ReplayGap(u64),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, WalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let wal_err: WalError = io_err.into();
        assert!(matches!(wal_err, WalError::WalIo(_)));
    }
}
