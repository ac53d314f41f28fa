//! Bus error taxonomy.
//!
//! Producer-side failures are returned as `false` from the publish family;
//! the kinds below are what the optional error callback receives so hosts
//! can count, escalate, or shed load. The bus itself never aborts.

use thiserror::Error;

/// Error kinds surfaced through the bus error callback.
#[repr(u8)]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusError {
    /// The ring (or the admission threshold for the message's priority)
    /// refused the publish.
    #[error("queue full")]
    QueueFull = 0,

    /// Reserved for hosts that validate payloads before publishing.
    #[error("invalid message")]
    InvalidMessage = 1,

    /// Reserved for hosts that report consumer-side handler failures.
    #[error("processing error")]
    ProcessingError = 2,

    /// The message-id counter is about to wrap; the bus instance must be
    /// recycled before it can accept further publishes.
    #[error("message id overflow detected")]
    OverflowDetected = 3,
}

/// Error callback invoked from the failing producer thread.
///
/// Receives the error kind and the candidate message id. Must not block or
/// panic. A callback installed while producers are in flight takes effect
/// eventually, not immediately: a producer mid-publish may still invoke the
/// previously installed callback.
pub type ErrorCallback = fn(BusError, u64);
