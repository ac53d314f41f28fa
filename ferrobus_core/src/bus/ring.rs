//! MPSC ring transport.
//!
//! Fixed-capacity slot array coordinated by per-slot sequence counters.
//! Multiple producers claim positions through a CAS on the shared producer
//! position (or a plain store under the `single-producer` feature); the
//! single consumer reads in FIFO position order and releases each slot for
//! the next round.
//!
//! Positions are `u32` and wrap exactly: the capacity is a power of two, so
//! it divides 2^32 and `pos & (CAP - 1)` stays congruent across wraparound.
//! Depth is the wrapping difference `producer - consumer`, well defined as
//! long as it never exceeds the capacity, which the sequence handshake
//! enforces.

use std::sync::atomic::{AtomicU32, Ordering};

use super::envelope::Envelope;
use super::primitives::{
    acquire_fence, alloc_slots, release_fence, CachePadded, Slot, ORD_ACQUIRE, ORD_ACQ_REL,
    ORD_RELEASE,
};

/// Producer-side hot fields, kept on one cache line: the shared claim
/// position and the advisory copy of the consumer position used by
/// admission control. Neither is ever written by the consumer.
pub(crate) struct ProducerLine {
    pub pos: AtomicU32,
    pub cached_consumer: AtomicU32,
}

/// Bounded MPSC ring of `CAP` sequence-tracked slots.
pub(crate) struct RingTransport<P, const CAP: u32> {
    producer: CachePadded<ProducerLine>,
    consumer: CachePadded<AtomicU32>,
    slots: Box<[Slot<P>]>,
}

// SAFETY: slots are plain data guarded by the sequence handshake; the ring
// is shared across producer threads and one consumer thread.
unsafe impl<P: Send, const CAP: u32> Send for RingTransport<P, CAP> {}
unsafe impl<P: Send, const CAP: u32> Sync for RingTransport<P, CAP> {}

impl<P, const CAP: u32> RingTransport<P, CAP> {
    pub(crate) const MASK: u32 = CAP.wrapping_sub(1);

    // Structural requirement, checked at monomorphization time
    const CAP_IS_POW2: () = assert!(CAP.is_power_of_two(), "ring capacity must be a power of two");

    /// Build a ring whose position space begins at `start` instead of zero.
    /// `start` must be a multiple of the capacity so slot indices stay
    /// congruent with positions.
    pub fn with_start(start: u32) -> Self {
        // Trigger the compile-time assertion
        let _ = Self::CAP_IS_POW2;
        assert_eq!(start & Self::MASK, 0, "ring start position must be a multiple of capacity");
        Self {
            producer: CachePadded(ProducerLine {
                pos: AtomicU32::new(start),
                cached_consumer: AtomicU32::new(start),
            }),
            consumer: CachePadded(AtomicU32::new(start)),
            slots: alloc_slots(CAP, start),
        }
    }

    /// Claim the next producer position, or `None` when the slot at that
    /// position has not been released yet (ring full, or a wrapped producer
    /// is still mid-write).
    #[inline]
    pub fn try_claim(&self) -> Option<u32> {
        if cfg!(feature = "single-producer") {
            // Wait-free fast path: no other producer exists, so the claim
            // is a plain store. The sequence check still guards against
            // overtaking the consumer.
            let pos = self.producer.0.pos.load(Ordering::Relaxed);
            // SAFETY: masked index is within bounds
            let slot = unsafe { self.slots.get_unchecked((pos & Self::MASK) as usize) };
            let seq = slot.sequence.load(ORD_ACQUIRE);
            acquire_fence();
            if seq != pos {
                return None;
            }
            self.producer.0.pos.store(pos.wrapping_add(1), Ordering::Relaxed);
            Some(pos)
        } else {
            loop {
                let pos = self.producer.0.pos.load(Ordering::Relaxed);
                // SAFETY: masked index is within bounds
                let slot = unsafe { self.slots.get_unchecked((pos & Self::MASK) as usize) };
                let seq = slot.sequence.load(ORD_ACQUIRE);
                acquire_fence();
                if seq != pos {
                    return None;
                }
                // Each retry observes strict progress in the shared
                // position, so the loop cannot livelock.
                if self
                    .producer
                    .0
                    .pos
                    .compare_exchange_weak(
                        pos,
                        pos.wrapping_add(1),
                        ORD_ACQ_REL,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    return Some(pos);
                }
            }
        }
    }

    /// Write the envelope into the claimed slot and publish it to the
    /// consumer. Must be called exactly once per successful `try_claim`,
    /// with the position it returned.
    #[inline]
    pub fn publish_at(&self, pos: u32, envelope: Envelope<P>) {
        // SAFETY: masked index is within bounds
        let slot = unsafe { self.slots.get_unchecked((pos & Self::MASK) as usize) };
        // SAFETY: the claim on `pos` grants exclusive write access to this
        // slot until the sequence store below hands it to the consumer
        unsafe {
            (*slot.envelope.get()).write(envelope);
        }
        release_fence();
        slot.sequence.store(pos.wrapping_add(1), ORD_RELEASE);
    }

    /// Read and release the envelope at `pos`, or `None` when no message is
    /// ready there. Single consumer only.
    #[inline]
    pub fn try_consume(&self, pos: u32) -> Option<Envelope<P>> {
        // SAFETY: masked index is within bounds
        let slot = unsafe { self.slots.get_unchecked((pos & Self::MASK) as usize) };
        let seq = slot.sequence.load(ORD_ACQUIRE);
        acquire_fence();
        if seq != pos.wrapping_add(1) {
            return None;
        }
        // SAFETY: the sequence confirms the producer's write completed, and
        // the single-consumer contract makes this the only reader
        let envelope = unsafe { (*slot.envelope.get()).assume_init_read() };
        release_fence();
        slot.sequence.store(pos.wrapping_add(CAP), ORD_RELEASE);
        Some(envelope)
    }

    /// Current occupancy.
    #[inline]
    pub fn depth(&self) -> u32 {
        let prod = self.producer.0.pos.load(ORD_ACQUIRE);
        let cons = self.consumer.0.load(ORD_ACQUIRE);
        prod.wrapping_sub(cons)
    }

    // ---- admission-control accessors (producer side) ----

    #[inline]
    pub fn producer_pos(&self) -> u32 {
        self.producer.0.pos.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn cached_consumer_pos(&self) -> u32 {
        self.producer.0.cached_consumer.load(Ordering::Relaxed)
    }

    /// Authoritative consumer position; refreshes the advisory cache as a
    /// side effect.
    #[inline]
    pub fn refresh_cached_consumer(&self) -> u32 {
        let real = self.consumer.0.load(ORD_ACQUIRE);
        self.producer.0.cached_consumer.store(real, Ordering::Relaxed);
        real
    }

    // ---- consumer-position accessors (consumer side) ----

    #[inline]
    pub fn consumer_pos(&self) -> u32 {
        self.consumer.0.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn store_consumer_pos(&self, pos: u32) {
        self.consumer.0.store(pos, Ordering::Relaxed);
    }
}

impl<P, const CAP: u32> Drop for RingTransport<P, CAP> {
    fn drop(&mut self) {
        let head = *self.producer.0.pos.get_mut();
        let tail = *self.consumer.0.get_mut();
        // Drop all published but unconsumed envelopes in [tail, head).
        // The sequence check skips slots a producer claimed but never
        // finished writing.
        let mut pos = tail;
        while pos != head {
            let slot = &mut self.slots[(pos & Self::MASK) as usize];
            let seq = *slot.sequence.get_mut();
            if seq == pos.wrapping_add(1) {
                // SAFETY: exclusive access through &mut self, and the
                // sequence confirms the write completed
                unsafe {
                    slot.envelope.get_mut().assume_init_drop();
                }
            }
            pos = pos.wrapping_add(1);
        }
    }
}
