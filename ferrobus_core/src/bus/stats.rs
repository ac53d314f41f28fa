//! Bus statistics: relaxed monotonic counters plus a plain snapshot type.
//!
//! Counters use relaxed ordering throughout; they may lag the operations
//! they count but never run ahead by more than the number of in-flight
//! calls. `reset` zeroes each field individually with no cross-field
//! transaction.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::envelope::MessagePriority;

/// Live counters, updated from producer and consumer threads.
#[cfg_attr(not(feature = "single-core"), repr(align(64)))]
#[derive(Debug, Default)]
pub struct BusStatistics {
    /// Envelopes accepted into the ring
    pub messages_published: AtomicU64,
    /// Publish attempts rejected by admission or a full ring
    pub messages_dropped: AtomicU64,
    /// Envelopes drained by the consumer
    pub messages_processed: AtomicU64,
    /// Host-reported processing failures
    pub processing_errors: AtomicU64,

    pub high_priority_published: AtomicU64,
    pub medium_priority_published: AtomicU64,
    pub low_priority_published: AtomicU64,

    pub high_priority_dropped: AtomicU64,
    pub medium_priority_dropped: AtomicU64,
    pub low_priority_dropped: AtomicU64,

    /// Times admission had to reload the authoritative consumer position
    pub admission_recheck_count: AtomicU64,
    /// Accumulated difference between the stale cached depth and the real
    /// depth at recheck time
    pub stale_cache_depth_delta: AtomicU64,
}

impl BusStatistics {
    #[inline]
    pub(crate) fn record_published(&self, priority: MessagePriority) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        let counter = match priority {
            MessagePriority::High => &self.high_priority_published,
            MessagePriority::Medium => &self.medium_priority_published,
            MessagePriority::Low => &self.low_priority_published,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped(&self, priority: MessagePriority) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
        let counter = match priority {
            MessagePriority::High => &self.high_priority_dropped,
            MessagePriority::Medium => &self.medium_priority_dropped,
            MessagePriority::Low => &self.low_priority_dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy every counter into a plain snapshot.
    pub fn snapshot(&self) -> BusStatisticsSnapshot {
        BusStatisticsSnapshot {
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            processing_errors: self.processing_errors.load(Ordering::Relaxed),
            high_priority_published: self.high_priority_published.load(Ordering::Relaxed),
            medium_priority_published: self.medium_priority_published.load(Ordering::Relaxed),
            low_priority_published: self.low_priority_published.load(Ordering::Relaxed),
            high_priority_dropped: self.high_priority_dropped.load(Ordering::Relaxed),
            medium_priority_dropped: self.medium_priority_dropped.load(Ordering::Relaxed),
            low_priority_dropped: self.low_priority_dropped.load(Ordering::Relaxed),
            admission_recheck_count: self.admission_recheck_count.load(Ordering::Relaxed),
            stale_cache_depth_delta: self.stale_cache_depth_delta.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter. Field-by-field; a concurrent publisher may land
    /// increments between individual stores.
    pub fn reset(&self) {
        self.messages_published.store(0, Ordering::Relaxed);
        self.messages_dropped.store(0, Ordering::Relaxed);
        self.messages_processed.store(0, Ordering::Relaxed);
        self.processing_errors.store(0, Ordering::Relaxed);
        self.high_priority_published.store(0, Ordering::Relaxed);
        self.medium_priority_published.store(0, Ordering::Relaxed);
        self.low_priority_published.store(0, Ordering::Relaxed);
        self.high_priority_dropped.store(0, Ordering::Relaxed);
        self.medium_priority_dropped.store(0, Ordering::Relaxed);
        self.low_priority_dropped.store(0, Ordering::Relaxed);
        self.admission_recheck_count.store(0, Ordering::Relaxed);
        self.stale_cache_depth_delta.store(0, Ordering::Relaxed);
    }
}

/// Non-atomic snapshot of bus statistics (for external consumers).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStatisticsSnapshot {
    pub messages_published: u64,
    pub messages_dropped: u64,
    pub messages_processed: u64,
    pub processing_errors: u64,
    pub high_priority_published: u64,
    pub medium_priority_published: u64,
    pub low_priority_published: u64,
    pub high_priority_dropped: u64,
    pub medium_priority_dropped: u64,
    pub low_priority_dropped: u64,
    pub admission_recheck_count: u64,
    pub stale_cache_depth_delta: u64,
}
