//! Core types used throughout the WAL and order store.
//!
//! These are fundamental type aliases and newtypes shared by every module.

use std::fmt;

/// Monotonic sequence number assigned to every WAL record, starting at 1.
pub type SeqNum = u64;

/// Nanosecond timestamp, Unix epoch.
pub type TimestampNs = i64;

/// Maximum length, in bytes, of a [`ClientOrderId`].
pub const CLIENT_ORDER_ID_MAX_LEN: usize = 64;

/// Maximum length, in bytes, of a symbol.
pub const SYMBOL_MAX_LEN: usize = 32;

/// Maximum length, in bytes, of an update reason string.
pub const REASON_MAX_LEN: usize = 256;

/// Opaque, non-empty identifier chosen by the strategy that submitted an
/// order. Primary key of the Order Store.
///
/// Stored as a boxed byte slice rather than `String` because the spec only
/// requires UTF-8 *encoding* of the producer API strings, not that the bytes
/// form valid UTF-8 once inside the store (a corrupted or adversarial record
/// must still round-trip through the codec without panicking).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ClientOrderId(Box<[u8]>);

impl ClientOrderId {
    /// Construct a client order id, validating non-empty and max-length.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, crate::error::WalError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(crate::error::WalError::InvalidArgument(
                "client_order_id must not be empty".into(),
            ));
        }
        if bytes.len() > CLIENT_ORDER_ID_MAX_LEN {
            return Err(crate::error::WalError::InvalidArgument(format!(
                "client_order_id exceeds {CLIENT_ORDER_ID_MAX_LEN} bytes"
            )));
        }
        Ok(Self(bytes.into_boxed_slice()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lossy string view, for logging only.
    pub fn display(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl fmt::Debug for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientOrderId({:?})", self.display())
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}
