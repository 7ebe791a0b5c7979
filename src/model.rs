//! Order-state entity model (spec.md §3).

use crate::core_types::{ClientOrderId, TimestampNs};
use crate::error::{Result, WalError};

/// Floating point comparisons throughout this crate use this tolerance,
/// per spec.md §3's `executed_qty <= original_qty (floating tolerance 1e-8)`.
pub const QTY_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Self::Buy),
            1 => Ok(Self::Sell),
            other => Err(WalError::InvalidArgument(format!("unknown side byte {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OrderType {
    Limit = 0,
    Market = 1,
}

impl OrderType {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Self::Limit),
            1 => Ok(Self::Market),
            other => Err(WalError::InvalidArgument(format!(
                "unknown order type byte {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimeInForce {
    Gtc = 0,
    Ioc = 1,
    Fok = 2,
}

impl TimeInForce {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Self::Gtc),
            1 => Ok(Self::Ioc),
            2 => Ok(Self::Fok),
            other => Err(WalError::InvalidArgument(format!("unknown TIF byte {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OrderStatus {
    PendingNew = 0,
    Acknowledged = 1,
    PartiallyFilled = 2,
    Filled = 3,
    Canceled = 4,
    Rejected = 5,
}

impl OrderStatus {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Self::PendingNew),
            1 => Ok(Self::Acknowledged),
            2 => Ok(Self::PartiallyFilled),
            3 => Ok(Self::Filled),
            4 => Ok(Self::Canceled),
            5 => Ok(Self::Rejected),
            other => Err(WalError::InvalidArgument(format!(
                "unknown order status byte {other}"
            ))),
        }
    }

    /// Terminal states never change, per spec.md §3's status transition table.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Canceled | Self::Rejected)
    }
}

/// One entry per active or historical order, keyed by [`ClientOrderId`].
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub client_order_id: ClientOrderId,
    pub exchange_id: Option<Box<[u8]>>,
    pub symbol: Box<[u8]>,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub original_qty: f64,
    pub limit_price: Option<f64>,
    pub executed_qty: f64,
    pub avg_fill_price: f64,
    pub status: OrderStatus,
    pub last_update_ts_ns: TimestampNs,

    /// Running sum of `fill.qty * fill.price`, kept so `avg_fill_price` can be
    /// recomputed in O(1) as new fills arrive (spec.md §4.3).
    notional_sum: f64,
}

impl OrderRecord {
    pub fn new(
        client_order_id: ClientOrderId,
        symbol: Box<[u8]>,
        side: Side,
        order_type: OrderType,
        time_in_force: TimeInForce,
        original_qty: f64,
        limit_price: Option<f64>,
        ts_ns: TimestampNs,
    ) -> Self {
        Self {
            client_order_id,
            exchange_id: None,
            symbol,
            side,
            order_type,
            time_in_force,
            original_qty,
            limit_price,
            executed_qty: 0.0,
            avg_fill_price: 0.0,
            status: OrderStatus::PendingNew,
            last_update_ts_ns: ts_ns,
            notional_sum: 0.0,
        }
    }

    /// Rebuild a record from a checkpoint row (spec.md §4.5). `notional_sum`
    /// is not itself persisted — only `avg_fill_price` is — so it is
    /// recovered as `avg_fill_price * executed_qty`, matching how
    /// [`OrderRecord::apply_fill`] derives `avg_fill_price` from it.
    #[allow(clippy::too_many_arguments)]
    pub fn from_checkpoint(
        client_order_id: ClientOrderId,
        exchange_id: Option<Box<[u8]>>,
        symbol: Box<[u8]>,
        side: Side,
        order_type: OrderType,
        time_in_force: TimeInForce,
        original_qty: f64,
        limit_price: Option<f64>,
        executed_qty: f64,
        avg_fill_price: f64,
        status: OrderStatus,
        last_update_ts_ns: TimestampNs,
    ) -> Self {
        Self {
            client_order_id,
            exchange_id,
            symbol,
            side,
            order_type,
            time_in_force,
            original_qty,
            limit_price,
            executed_qty,
            avg_fill_price,
            status,
            last_update_ts_ns,
            notional_sum: avg_fill_price * executed_qty,
        }
    }

    /// A synthetic shell record created when a fill or update arrives for an
    /// unknown id, per spec.md §4.3: "applying a fill to an unknown id is
    /// tolerated ... to preserve fill information during out-of-order replay."
    pub fn shell(client_order_id: ClientOrderId, symbol: Box<[u8]>, ts_ns: TimestampNs) -> Self {
        Self {
            client_order_id,
            exchange_id: None,
            symbol,
            side: Side::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            original_qty: 0.0,
            limit_price: None,
            executed_qty: 0.0,
            avg_fill_price: 0.0,
            status: OrderStatus::PendingNew,
            last_update_ts_ns: ts_ns,
            notional_sum: 0.0,
        }
    }

    /// Apply a status/exchange-id update. No-op on an already-terminal record,
    /// per spec.md §4.3 ("replay can encounter duplicated semantic events").
    pub fn apply_update(
        &mut self,
        exchange_id: Option<Box<[u8]>>,
        status: OrderStatus,
        ts_ns: TimestampNs,
    ) {
        if self.status.is_terminal() {
            return;
        }
        if exchange_id.is_some() {
            self.exchange_id = exchange_id;
        }
        self.status = status;
        self.last_update_ts_ns = ts_ns;
    }

    /// Apply a fill: accumulate quantity, recompute the quantity-weighted
    /// average price, and advance status. Fills are never rejected for
    /// exceeding `original_qty` (spec.md §9 Open Question: "fills from the
    /// exchange are ground truth") — callers should alert on overflow using
    /// [`OrderRecord::is_overfilled`], not reject the event.
    pub fn apply_fill(&mut self, qty: f64, price: f64, ts_ns: TimestampNs) {
        if self.status.is_terminal() {
            return;
        }
        self.executed_qty += qty;
        self.notional_sum += qty * price;
        if self.executed_qty > QTY_TOLERANCE {
            self.avg_fill_price = self.notional_sum / self.executed_qty;
        }
        self.status = if self.executed_qty + QTY_TOLERANCE >= self.original_qty
            && self.original_qty > 0.0
        {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.last_update_ts_ns = ts_ns;
    }

    /// True if `executed_qty` has drifted past `original_qty` by more than
    /// the floating tolerance — reported as an alert, never as a rejection.
    pub fn is_overfilled(&self) -> bool {
        self.executed_qty > self.original_qty + QTY_TOLERANCE
    }
}
