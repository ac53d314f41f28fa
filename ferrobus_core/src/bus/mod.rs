//! # AsyncBus: lock-free MPSC message bus
//!
//! Producers publish typed payloads from any thread; one consumer drains
//! them in FIFO position order and dispatches to subscribers. Admission
//! control sheds load by priority before a ring slot is ever claimed:
//!
//! | Priority | Rejected when depth reaches |
//! |----------|-----------------------------|
//! | Low      | 60% of capacity             |
//! | Medium   | 80% of capacity             |
//! | High     | 99% of capacity             |
//!
//! The admission fast path compares against a producer-side cached copy of
//! the consumer position. The cache is only ever biased high (the cached
//! depth >= the real depth), so it can never cause a wrongful acceptance;
//! before actually refusing, admission reloads the authoritative position.
//!
//! ## Hot-path guarantees
//!
//! - No heap allocation: envelopes live by value inside pre-allocated slots
//! - No locks on publish; the subscription reader lock is the only lock the
//!   consumer takes, and bare-metal mode removes it
//! - No blocking: a publish either claims a slot or returns `false`
//!
//! ## Threading contract
//!
//! Any number of producer threads (one, under the `single-producer`
//! feature). One consumer at a time: a second thread calling
//! `process_batch` concurrently drains nothing and returns 0.

pub mod envelope;
pub mod payload;
pub mod stats;
pub mod subscription;
pub mod types;

pub(crate) mod primitives;
pub(crate) mod ring;


use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};

use crossbeam::atomic::AtomicCell;
use parking_lot::RwLock;

use crate::config::{BATCH_PROCESS_SIZE, MAX_PAYLOAD_VARIANTS, MSG_ID_WRAP_THRESHOLD};
use crate::error::{BusError, ErrorCallback};
use crate::utils::unlikely;

use envelope::{current_timestamp_us, Envelope, MessageHeader, MessagePriority};
use payload::{Payload, VariantOf};
use primitives::CachePadded;
use ring::RingTransport;
use stats::{BusStatistics, BusStatisticsSnapshot};
use subscription::{CallbackTable, SubscriptionHandle};
use types::{BackpressureLevel, PerformanceMode};

// ============================================================================
// Singleton registry
// ============================================================================

/// Process-wide bus instances, one per (payload type, capacity) pair.
/// Entries are leaked so their lifetime extends to process exit.
static INSTANCES: OnceLock<Mutex<HashMap<TypeId, &'static (dyn Any + Send + Sync)>>> =
    OnceLock::new();

// ============================================================================
// AsyncBus
// ============================================================================

/// Lock-free MPSC message bus with priority admission control.
///
/// `P` is the closed payload sum type (see [`payload!`](crate::payload));
/// `CAP` is the ring capacity, a power of two.
pub struct AsyncBus<P: Payload, const CAP: u32 = 131_072> {
    ring: RingTransport<P, CAP>,
    next_msg_id: CachePadded<AtomicU64>,
    consumer_claim: AtomicBool,
    stats: BusStatistics,
    callbacks: RwLock<CallbackTable<P>>,
    error_callback: AtomicCell<Option<ErrorCallback>>,
    performance_mode: AtomicU8,
}

impl<P: Payload, const CAP: u32> AsyncBus<P, CAP> {
    /// Ring capacity in slots.
    pub const MAX_QUEUE_DEPTH: u32 = CAP;

    /// Low-priority publishes are refused at this depth.
    pub const LOW_PRIORITY_THRESHOLD: u32 = (CAP as u64 * 60 / 100) as u32;
    /// Medium-priority publishes are refused at this depth.
    pub const MEDIUM_PRIORITY_THRESHOLD: u32 = (CAP as u64 * 80 / 100) as u32;
    /// High-priority publishes are refused at this depth.
    pub const HIGH_PRIORITY_THRESHOLD: u32 = (CAP as u64 * 99 / 100) as u32;

    /// Create a standalone bus. Most hosts use [`Self::instance`] instead;
    /// standalone buses suit tests and one-bus-per-consumer layouts.
    pub fn new() -> Self {
        Self::with_start(0)
    }

    fn with_start(start: u32) -> Self {
        Self {
            ring: RingTransport::with_start(start),
            next_msg_id: CachePadded(AtomicU64::new(1)),
            consumer_claim: AtomicBool::new(false),
            stats: BusStatistics::default(),
            callbacks: RwLock::new(CallbackTable::new()),
            error_callback: AtomicCell::new(None),
            performance_mode: AtomicU8::new(PerformanceMode::FullFeatured as u8),
        }
    }

    /// Process-wide lazily-initialized instance for this payload type and
    /// capacity. Concurrent first access is safe; the instance lives until
    /// process exit.
    pub fn instance() -> &'static Self {
        let registry = INSTANCES.get_or_init(|| Mutex::new(HashMap::new()));
        let mut map = registry.lock().unwrap_or_else(|e| e.into_inner());
        let erased: &'static (dyn Any + Send + Sync) =
            *map.entry(TypeId::of::<Self>()).or_insert_with(|| {
                log::debug!("initializing process-wide bus instance (capacity {})", CAP);
                let leaked: &'static Self = Box::leak(Box::new(Self::new()));
                leaked
            });
        drop(map);
        erased
            .downcast_ref::<Self>()
            .expect("bus registry entry keyed by TypeId holds a different type")
    }

    // ======================== Publish API ========================

    /// Publish at medium priority with a freshly sampled timestamp.
    /// Returns `false` when the message was refused.
    #[inline]
    pub fn publish(&self, payload: impl Into<P>, sender_id: u32) -> bool {
        self.publish_internal(
            payload.into(),
            sender_id,
            current_timestamp_us(),
            MessagePriority::Medium,
        )
    }

    /// Publish at an explicit priority with a freshly sampled timestamp.
    #[inline]
    pub fn publish_with_priority(
        &self,
        payload: impl Into<P>,
        sender_id: u32,
        priority: MessagePriority,
    ) -> bool {
        self.publish_internal(payload.into(), sender_id, current_timestamp_us(), priority)
    }

    /// Publish at medium priority with a caller-supplied timestamp,
    /// avoiding the clock read on hot paths.
    #[inline]
    pub fn publish_fast(&self, payload: impl Into<P>, sender_id: u32, timestamp_us: u64) -> bool {
        self.publish_internal(payload.into(), sender_id, timestamp_us, MessagePriority::Medium)
    }

    fn publish_internal(
        &self,
        payload: P,
        sender_id: u32,
        timestamp_us: u64,
        priority: MessagePriority,
    ) -> bool {
        let mode = PerformanceMode::from(self.performance_mode.load(Ordering::Relaxed));
        let bare_metal = mode.is_bare_metal();
        let no_stats = mode.stats_disabled();

        let msg_id = self.next_msg_id.0.load(Ordering::Relaxed);
        if unlikely(msg_id >= MSG_ID_WRAP_THRESHOLD) {
            if !no_stats {
                self.report_error(BusError::OverflowDetected, msg_id);
            }
            return false;
        }

        if !bare_metal {
            let threshold = Self::threshold_for(priority);
            let prod = self.ring.producer_pos();
            let estimated_depth = prod.wrapping_sub(self.ring.cached_consumer_pos());
            if unlikely(estimated_depth >= threshold) {
                // The cache said "too deep"; reload the authoritative
                // position before refusing. Acceptance is never based on
                // the cache alone.
                let real_cons = self.ring.refresh_cached_consumer();
                let real_depth = prod.wrapping_sub(real_cons);
                if !no_stats {
                    self.stats.admission_recheck_count.fetch_add(1, Ordering::Relaxed);
                    if estimated_depth > real_depth {
                        self.stats
                            .stale_cache_depth_delta
                            .fetch_add((estimated_depth - real_depth) as u64, Ordering::Relaxed);
                    }
                }
                if real_depth >= threshold {
                    if !no_stats {
                        self.stats.record_dropped(priority);
                        self.report_error(BusError::QueueFull, msg_id);
                    }
                    return false;
                }
            }
        }

        let Some(pos) = self.ring.try_claim() else {
            // Slot not released at this position: the ring is full
            // regardless of priority.
            if !no_stats {
                self.stats.record_dropped(priority);
                self.report_error(BusError::QueueFull, msg_id);
            }
            return false;
        };

        let assigned_id = self.next_msg_id.0.fetch_add(1, Ordering::Relaxed);
        self.ring.publish_at(
            pos,
            Envelope {
                header: MessageHeader {
                    msg_id: assigned_id,
                    timestamp_us,
                    sender_id,
                    priority,
                },
                payload,
            },
        );

        if !no_stats {
            self.stats.record_published(priority);
        }
        true
    }

    // ======================== Subscribe API ========================

    /// Register a callback for the payload variant `T`. The returned
    /// handle's [`is_valid`](SubscriptionHandle::is_valid) is `false` when
    /// the variant's callback slots are exhausted.
    pub fn subscribe<T, F>(&self, callback: F) -> SubscriptionHandle
    where
        T: VariantOf<P>,
        F: Fn(&Envelope<P>) + Send + Sync + 'static,
    {
        self.callbacks.write().insert(T::INDEX, Box::new(callback))
    }

    /// Like [`Self::subscribe`], but the callback receives the extracted
    /// variant and the header instead of the whole envelope.
    pub fn subscribe_to<T, F>(&self, callback: F) -> SubscriptionHandle
    where
        T: VariantOf<P>,
        F: Fn(&T, &MessageHeader) + Send + Sync + 'static,
    {
        self.subscribe::<T, _>(move |envelope| {
            if let Some(data) = T::from_payload(&envelope.payload) {
                callback(data, &envelope.header);
            }
        })
    }

    /// Remove a previously registered callback. Returns whether a matching
    /// registration existed.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        if handle.variant_index >= MAX_PAYLOAD_VARIANTS {
            return false;
        }
        self.callbacks.write().remove(handle.variant_index, handle.callback_id)
    }

    // ======================== Processing API ========================

    /// Drain up to [`BATCH_PROCESS_SIZE`] envelopes through the
    /// subscription table. Returns the number drained. Single consumer: a
    /// concurrent call from another thread returns 0.
    pub fn process_batch(&self) -> u32 {
        let mode = PerformanceMode::from(self.performance_mode.load(Ordering::Relaxed));
        let bare_metal = mode.is_bare_metal();
        let Some(mut cursor) = ConsumerCursor::claim(self) else {
            return 0;
        };

        let mut processed: u32 = 0;
        while processed < BATCH_PROCESS_SIZE {
            let Some(envelope) = self.ring.try_consume(cursor.pos) else {
                break;
            };
            // Position advances before dispatch so a panicking callback
            // cannot cause the released slot to be re-read.
            cursor.pos = cursor.pos.wrapping_add(1);
            processed += 1;
            if bare_metal {
                self.dispatch_unlocked(&envelope);
            } else {
                self.dispatch_locked(&envelope);
            }
        }
        drop(cursor);

        if processed > 0 && !mode.stats_disabled() {
            self.stats
                .messages_processed
                .fetch_add(processed as u64, Ordering::Relaxed);
        }
        processed
    }

    /// Drain up to [`BATCH_PROCESS_SIZE`] envelopes through a caller
    /// visitor instead of the subscription table: no lock, no table lookup.
    /// Match on the payload enum inside the visitor for zero-overhead
    /// static dispatch.
    pub fn process_batch_with<F>(&self, mut visitor: F) -> u32
    where
        F: FnMut(&Envelope<P>),
    {
        let mode = PerformanceMode::from(self.performance_mode.load(Ordering::Relaxed));
        let Some(mut cursor) = ConsumerCursor::claim(self) else {
            return 0;
        };

        let mut processed: u32 = 0;
        while processed < BATCH_PROCESS_SIZE {
            let Some(envelope) = self.ring.try_consume(cursor.pos) else {
                break;
            };
            cursor.pos = cursor.pos.wrapping_add(1);
            processed += 1;
            visitor(&envelope);
        }
        drop(cursor);

        if processed > 0 && !mode.stats_disabled() {
            self.stats
                .messages_processed
                .fetch_add(processed as u64, Ordering::Relaxed);
        }
        processed
    }

    /// Drain at most one envelope through the subscription table. Returns
    /// whether a message was processed.
    pub fn process_one(&self) -> bool {
        let mode = PerformanceMode::from(self.performance_mode.load(Ordering::Relaxed));
        let Some(mut cursor) = ConsumerCursor::claim(self) else {
            return false;
        };
        let Some(envelope) = self.ring.try_consume(cursor.pos) else {
            return false;
        };
        cursor.pos = cursor.pos.wrapping_add(1);
        if mode.is_bare_metal() {
            self.dispatch_unlocked(&envelope);
        } else {
            self.dispatch_locked(&envelope);
        }
        drop(cursor);

        if !mode.stats_disabled() {
            self.stats.messages_processed.fetch_add(1, Ordering::Relaxed);
        }
        true
    }

    fn dispatch_locked(&self, envelope: &Envelope<P>) {
        let variant_index = envelope.payload.discriminant();
        if variant_index >= MAX_PAYLOAD_VARIANTS {
            return;
        }
        self.callbacks.read().dispatch(variant_index, envelope);
    }

    fn dispatch_unlocked(&self, envelope: &Envelope<P>) {
        let variant_index = envelope.payload.discriminant();
        if variant_index >= MAX_PAYLOAD_VARIANTS {
            return;
        }
        // SAFETY: bare-metal mode's contract forbids subscribe/unsubscribe
        // concurrent with dispatch, so no writer can hold or take the lock
        // while this shared read runs.
        let table = unsafe { &*self.callbacks.data_ptr() };
        table.dispatch(variant_index, envelope);
    }

    // ======================== Queue Status API ========================

    /// Current occupancy, `0..=CAP`.
    pub fn queue_depth(&self) -> u32 {
        self.ring.depth()
    }

    /// Occupancy as an integer percentage of capacity.
    pub fn queue_utilization_percent(&self) -> u32 {
        (self.ring.depth() as u64 * 100 / CAP as u64) as u32
    }

    /// Coarse health indicator derived from the current depth.
    pub fn backpressure_level(&self) -> BackpressureLevel {
        BackpressureLevel::from_depth(self.ring.depth(), CAP)
    }

    // ======================== Statistics & Configuration ========================

    /// Snapshot of all counters.
    pub fn statistics(&self) -> BusStatisticsSnapshot {
        self.stats.snapshot()
    }

    /// Zero all counters.
    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    /// Switch the feature/throughput trade-off. Takes effect on the next
    /// publish or batch. Leaving bare-metal mode while registrations ran
    /// concurrently with dispatch is the caller's responsibility to avoid.
    pub fn set_performance_mode(&self, mode: PerformanceMode) {
        log::debug!("performance mode set to {:?}", mode);
        self.performance_mode.store(mode as u8, Ordering::Relaxed);
    }

    /// Currently selected performance mode.
    pub fn performance_mode(&self) -> PerformanceMode {
        PerformanceMode::from(self.performance_mode.load(Ordering::Relaxed))
    }

    /// Install the producer-side error callback. Replacement takes effect
    /// eventually: a producer already mid-publish may still invoke the
    /// previous callback.
    pub fn set_error_callback(&self, callback: ErrorCallback) {
        self.error_callback.store(Some(callback));
    }

    /// Ring capacity in slots.
    pub const fn capacity(&self) -> u32 {
        CAP
    }

    /// Admission threshold for a priority.
    pub const fn threshold_for(priority: MessagePriority) -> u32 {
        match priority {
            MessagePriority::High => Self::HIGH_PRIORITY_THRESHOLD,
            MessagePriority::Medium => Self::MEDIUM_PRIORITY_THRESHOLD,
            MessagePriority::Low => Self::LOW_PRIORITY_THRESHOLD,
        }
    }

    fn report_error(&self, error: BusError, msg_id: u64) {
        if let Some(callback) = self.error_callback.load() {
            callback(error, msg_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn set_next_msg_id(&self, id: u64) {
        self.next_msg_id.0.store(id, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn live_callbacks(&self, variant_index: usize) -> u32 {
        self.callbacks.read().live_count(variant_index)
    }
}

impl<P: Payload, const CAP: u32> Default for AsyncBus<P, CAP> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Consumer cursor
// ============================================================================

/// Batch-scoped consumer claim.
///
/// Claiming makes this thread the bus's consumer for the duration of the
/// batch; a losing thread gets `None` and drains nothing. The drop
/// implementation publishes the final consumer position and releases the
/// claim, so the position store happens exactly once per batch and also
/// runs when a subscriber callback panics out of the batch loop.
struct ConsumerCursor<'bus, P: Payload, const CAP: u32> {
    bus: &'bus AsyncBus<P, CAP>,
    pos: u32,
}

impl<'bus, P: Payload, const CAP: u32> ConsumerCursor<'bus, P, CAP> {
    fn claim(bus: &'bus AsyncBus<P, CAP>) -> Option<Self> {
        if bus
            .consumer_claim
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }
        Some(Self {
            bus,
            pos: bus.ring.consumer_pos(),
        })
    }
}

impl<P: Payload, const CAP: u32> Drop for ConsumerCursor<'_, P, CAP> {
    fn drop(&mut self) {
        self.bus.ring.store_consumer_pos(self.pos);
        self.bus.consumer_claim.store(false, Ordering::Release);
    }
}
