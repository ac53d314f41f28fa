//! Message envelope: header metadata plus a by-value payload.
//!
//! Envelopes live directly inside ring slots; nothing in them points at
//! externally owned data, which keeps the hot path free of allocation and
//! pointer chasing.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================================================
// Message Priority
// ============================================================================

/// Priority levels for admission control.
///
/// Higher priorities keep publishing deeper into a congested ring; the
/// thresholds are documented on
/// [`AsyncBus`](crate::bus::AsyncBus#associated-constants).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessagePriority {
    /// Rejected once the ring reaches 60% occupancy
    Low = 0,
    /// Rejected once the ring reaches 80% occupancy
    Medium = 1,
    /// Rejected only above 99% occupancy
    High = 2,
}

// ============================================================================
// Message Header
// ============================================================================

/// Per-message metadata for tracing and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Bus-global incremental id, strictly increasing as assigned
    pub msg_id: u64,
    /// Microsecond timestamp supplied at publish time
    pub timestamp_us: u64,
    /// Opaque sender identifier
    pub sender_id: u32,
    /// Priority the message was admitted at
    pub priority: MessagePriority,
}

// ============================================================================
// Envelope
// ============================================================================

/// A header bundled with its payload, stored by value in a ring slot and
/// exclusively owned by that slot until consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<P> {
    pub header: MessageHeader,
    pub payload: P,
}

/// Current wall-clock time in microseconds since the UNIX epoch.
///
/// The publish family samples this internally; hot paths that cannot afford
/// the clock read use `publish_fast` and supply their own value.
#[inline]
pub fn current_timestamp_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}
