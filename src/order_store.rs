//! Order Store (spec.md §4.3): the in-memory, replay-reconstructible view
//! of every order.
//!
//! Grounded on the teacher's `FxHashMap<u64, UserAccount>` account table
//! (`user_account.rs` / `ubscore_wal/snapshot.rs`), keyed here by
//! [`ClientOrderId`] instead of a numeric user id, and guarded with
//! `std::sync::RwLock` rather than `dashmap` — the teacher uses `dashmap`
//! for its matching engine's order book but a single coarse lock for the
//! account table it snapshots, which is the closer analogue to a store that
//! must present one atomic view to the Replay Engine and to checkpointing.

use crate::core_types::{ClientOrderId, TimestampNs};
use crate::model::{OrderRecord, OrderStatus, OrderType, Side, TimeInForce};
use rustc_hash::FxHashMap;
use std::sync::RwLock;

/// The live order table. Cheap to clone the lock guard's contents for a
/// checkpoint; all mutation goes through `&self` methods so the store can
/// be shared behind an `Arc` without an outer mutex.
#[derive(Default)]
pub struct OrderStore {
    inner: RwLock<FxHashMap<ClientOrderId, OrderRecord>>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register a new order (spec.md §4.3's `ORDER_NEW` application). If the
    /// id already exists, this overwrites it — replay may see an id it
    /// first observed as a fill-created shell record.
    #[allow(clippy::too_many_arguments)]
    pub fn note_order_params(
        &self,
        client_order_id: ClientOrderId,
        symbol: Box<[u8]>,
        side: Side,
        order_type: OrderType,
        time_in_force: TimeInForce,
        original_qty: f64,
        limit_price: Option<f64>,
        ts_ns: TimestampNs,
    ) {
        let record = OrderRecord::new(
            client_order_id.clone(),
            symbol,
            side,
            order_type,
            time_in_force,
            original_qty,
            limit_price,
            ts_ns,
        );
        self.inner.write().unwrap().insert(client_order_id, record);
    }

    /// Apply an `ORDER_UPDATE` event. Creates a shell record if the id is
    /// unknown, per spec.md §4.3 ("tolerant of out-of-order replay"). `reason`
    /// is part of the audit log record, not of the Order State entity
    /// (spec.md §3 does not list it as an attribute), so it is observed here
    /// only for logging.
    pub fn apply_update(
        &self,
        client_order_id: &ClientOrderId,
        exchange_id: Option<Box<[u8]>>,
        status: OrderStatus,
        reason: &[u8],
        ts_ns: TimestampNs,
    ) {
        let _ = reason;
        let mut guard = self.inner.write().unwrap();
        let record = guard
            .entry(client_order_id.clone())
            .or_insert_with(|| OrderRecord::shell(client_order_id.clone(), Box::from(&b""[..]), ts_ns));
        record.apply_update(exchange_id, status, ts_ns);
    }

    /// Apply an `ORDER_FILL` event. Creates a shell record if the id is
    /// unknown.
    pub fn apply_fill(
        &self,
        client_order_id: &ClientOrderId,
        symbol: Box<[u8]>,
        qty: f64,
        price: f64,
        ts_ns: TimestampNs,
    ) -> bool {
        let mut guard = self.inner.write().unwrap();
        let record = guard
            .entry(client_order_id.clone())
            .or_insert_with(|| OrderRecord::shell(client_order_id.clone(), symbol, ts_ns));
        record.apply_fill(qty, price, ts_ns);
        record.is_overfilled()
    }

    pub fn get(&self, client_order_id: &ClientOrderId) -> Option<OrderRecord> {
        self.inner.read().unwrap().get(client_order_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A consistent point-in-time copy of every order, for checkpoint
    /// encoding.
    pub fn snapshot(&self) -> Vec<OrderRecord> {
        self.inner.read().unwrap().values().cloned().collect()
    }

    /// Replace the entire table, used by the Replay Engine after loading a
    /// checkpoint record.
    pub fn load_snapshot(&self, records: Vec<OrderRecord>) {
        let mut guard = self.inner.write().unwrap();
        guard.clear();
        for record in records {
            guard.insert(record.client_order_id.clone(), record);
        }
    }
}
