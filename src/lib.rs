//! Durable order-management core for a trading engine.
//!
//! `vzwl` ("V Z W L", the on-disk magic every record carries — spec.md §6)
//! is a write-ahead log and in-memory order store: every order-state
//! transition is appended to disk before it is applied to the live table,
//! and a crashed process can always rebuild that table by replaying the
//! log from its last checkpoint.
//!
//! The typical lifecycle of an embedding process:
//!
//! ```no_run
//! use vzwl::{Wal, WalConfig};
//! use vzwl::model::{Side, OrderType, TimeInForce};
//! use vzwl::core_types::ClientOrderId;
//!
//! # fn main() -> vzwl::error::Result<()> {
//! let config = WalConfig::new("/var/lib/myengine/wal");
//! let wal = Wal::open(config)?;
//!
//! wal.writer().log_order_new(
//!     ClientOrderId::new(b"strategy-42-order-1".to_vec())?,
//!     b"BTCUSDT".to_vec().into_boxed_slice(),
//!     Side::Buy,
//!     OrderType::Limit,
//!     TimeInForce::Gtc,
//!     1.0,
//!     Some(50_000.0),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod core_types;
pub mod error;
pub mod lock;
pub mod logging;
pub mod model;
pub mod order_store;
pub mod replay;
pub mod segment;
pub mod writer;

use error::Result;
use lock::DirLock;
use order_store::OrderStore;
use std::sync::Arc;
use writer::WalWriter;

pub use config::WalConfig;
pub use replay::ReplayStats;

/// The crate's entry point: owns the directory lock, runs recovery once at
/// startup, and hands out the writer and order store it reconstructed.
pub struct Wal {
    writer: WalWriter,
    replay_stats: ReplayStats,
}

impl Wal {
    /// Acquire the directory lock, replay every segment file under
    /// `config.dir` to reconstruct the Order Store, and open the writer at
    /// the resulting next sequence number.
    ///
    /// This is the only supported way to start using a WAL directory — it
    /// is not valid to construct a [`writer::WalWriter`] directly without
    /// having replayed first (spec.md §4.5: "the order store must never be
    /// observed in a partially-recovered state").
    pub fn open(config: WalConfig) -> Result<Self> {
        let lock = DirLock::acquire(&config)?;
        let order_store = Arc::new(OrderStore::new());
        let (next_seq, replay_stats) = replay::replay(&config, &order_store)?;
        tracing::info!(
            next_seq,
            entries_replayed = replay_stats.entries_replayed,
            corrupted_entries = replay_stats.corrupted_entries,
            "WAL recovery complete"
        );
        let writer = WalWriter::with_replay_stats(
            config,
            lock,
            order_store,
            next_seq,
            replay_stats.entries_replayed,
            replay_stats.corrupted_entries,
        )?;
        Ok(Self { writer, replay_stats })
    }

    pub fn writer(&self) -> &WalWriter {
        &self.writer
    }

    pub fn order_store(&self) -> &Arc<OrderStore> {
        self.writer.order_store()
    }

    /// Stats from the recovery pass performed by [`Wal::open`].
    pub fn replay_stats(&self) -> ReplayStats {
        self.replay_stats
    }
}
