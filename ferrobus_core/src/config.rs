//! Compile-time configuration knobs.
//!
//! Structural parameters are constants or const generics; behavioral
//! switches are Cargo features:
//!
//! | Knob                              | Where                         | Default |
//! |-----------------------------------|-------------------------------|---------|
//! | Queue depth                       | `CAP` parameter on `AsyncBus` | 131072  |
//! | Cache-line size                   | [`CACHELINE_SIZE`]            | 64      |
//! | Single-producer fast path         | feature `single-producer`     | off     |
//! | Compiler-only fences              | feature `single-core`         | off     |
//! | Single-core acknowledgement       | feature `i-know-single-core-is-unsafe` | off |
//! | Max payload variants              | [`MAX_PAYLOAD_VARIANTS`]      | 8       |
//! | Max callbacks per variant         | [`MAX_CALLBACKS_PER_VARIANT`] | 16      |
//! | Max subscriptions per guard       | [`MAX_SUBSCRIPTIONS_PER_COMPONENT`] | 16 |

/// Default ring capacity when the `CAP` parameter is left at its default.
/// Must be a power of two; memory footprint is roughly `CAP * slot size`.
pub const DEFAULT_QUEUE_DEPTH: u32 = 131_072;

/// Alignment applied to hot atomics, the statistics block, and ring slots
/// to avoid false sharing. Alignment is disabled entirely under the
/// `single-core` feature (no cache coherency traffic to avoid).
pub const CACHELINE_SIZE: usize = 64;

/// Hard cap on the number of payload variants a bus can dispatch on.
/// The `payload!` macro rejects larger enums at compile time.
pub const MAX_PAYLOAD_VARIANTS: usize = 8;

/// Maximum concurrently registered callbacks per payload variant.
pub const MAX_CALLBACKS_PER_VARIANT: usize = 16;

/// Maximum handles a single `SubscriptionGuard` tracks across all variants.
/// Independent of [`MAX_CALLBACKS_PER_VARIANT`]: a guard may spread its
/// subscriptions over many variants.
pub const MAX_SUBSCRIPTIONS_PER_COMPONENT: usize = 16;

/// Upper bound on envelopes drained per `process_batch` call.
pub const BATCH_PROCESS_SIZE: u32 = 1024;

/// Message ids at or above this value refuse to publish with
/// `BusError::OverflowDetected`. The margin below `u64::MAX` leaves room
/// for in-flight increments from racing producers.
pub const MSG_ID_WRAP_THRESHOLD: u64 = u64::MAX - 10_000;
