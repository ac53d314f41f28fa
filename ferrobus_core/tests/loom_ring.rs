//! Loom-based exhaustive concurrency tests for the ring transport.
//!
//! These tests use Tokio's `loom` crate to explore all possible thread
//! interleavings, verifying that the claim/publish/consume protocol of the
//! MPSC ring in `ferrobus_core::bus::ring` is correct under every execution
//! order.
//!
//! The ring here is a simplified version of the production
//! `RingTransport`, using loom's atomic primitives instead of
//! `std::sync::atomic`. It keeps the production code's exact shape: u32
//! positions, a separate claim step (slot-sequence check then CAS on the
//! producer position) with a window before the publish store, and a
//! consumer that releases each slot to `pos + capacity` before advancing
//! its own position.
//!
//! Run with: `cargo test --test loom_ring -- --nocapture`
//!
//! Note: loom tests explore exponentially many interleavings. Keep ring
//! capacities small (2-4) and message counts low (2-4).

use loom::cell::UnsafeCell;
use loom::sync::atomic::{AtomicU32, Ordering};
use loom::sync::Arc;
use std::mem::MaybeUninit;

// ============================================================================
// Simplified MPSC ring (mirrors bus/ring.rs algorithm)
// ============================================================================

/// Per-slot metadata, sequence-coordinated exactly like the production slot.
struct LoomSlot<T> {
    sequence: AtomicU32,
    data: UnsafeCell<MaybeUninit<T>>,
}

/// Allocate sequence-tracked loom slots starting at position `start`.
fn alloc_loom_slots<T>(capacity: u32, start: u32) -> Vec<LoomSlot<T>> {
    let mut slots = Vec::with_capacity(capacity as usize);
    for i in 0..capacity {
        slots.push(LoomSlot {
            sequence: AtomicU32::new(start.wrapping_add(i)),
            data: UnsafeCell::new(MaybeUninit::uninit()),
        });
    }
    slots
}

/// Minimal MPSC ring for loom testing. No cache padding or the admission
/// layer's cached consumer position; focuses on the claim CAS and the
/// sequence-counter handshake.
struct LoomRing<T> {
    producer: AtomicU32,
    consumer: AtomicU32,
    mask: u32,
    capacity: u32,
    slots: Vec<LoomSlot<T>>,
}

unsafe impl<T: Send> Send for LoomRing<T> {}
unsafe impl<T: Send> Sync for LoomRing<T> {}

impl<T> LoomRing<T> {
    fn with_start(capacity: u32, start: u32) -> Self {
        assert!(capacity.is_power_of_two());
        assert_eq!(start & (capacity - 1), 0);
        Self {
            producer: AtomicU32::new(start),
            consumer: AtomicU32::new(start),
            mask: capacity - 1,
            capacity,
            slots: alloc_loom_slots(capacity, start),
        }
    }

    fn new(capacity: u32) -> Self {
        Self::with_start(capacity, 0)
    }

    /// Claim the next producer position, or `None` when the slot at that
    /// position has not been released yet. Mirrors `RingTransport::try_claim`
    /// with a strong CAS so loom's exploration stays bounded (the production
    /// weak CAS differs only in spurious failures, which re-run the same
    /// loop body).
    fn try_claim(&self) -> Option<u32> {
        loop {
            let pos = self.producer.load(Ordering::Relaxed);
            let index = (pos & self.mask) as usize;
            let seq = self.slots[index].sequence.load(Ordering::Acquire);
            if seq != pos {
                return None;
            }
            if self
                .producer
                .compare_exchange(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                return Some(pos);
            }
            loom::thread::yield_now();
        }
    }

    /// Write the value into the claimed slot and publish it to the consumer.
    fn publish_at(&self, pos: u32, msg: T) {
        let index = (pos & self.mask) as usize;
        self.slots[index].data.with_mut(|ptr| unsafe {
            ptr.write(MaybeUninit::new(msg));
        });
        self.slots[index]
            .sequence
            .store(pos.wrapping_add(1), Ordering::Release);
    }

    fn try_send(&self, msg: T) -> Result<(), T> {
        match self.try_claim() {
            Some(pos) => {
                self.publish_at(pos, msg);
                Ok(())
            }
            None => Err(msg),
        }
    }

    /// Read and release the slot at `pos`, mirroring
    /// `RingTransport::try_consume`: the slot is handed back to producers
    /// before the consumer position advances.
    fn try_consume(&self, pos: u32) -> Option<T> {
        let index = (pos & self.mask) as usize;
        let seq = self.slots[index].sequence.load(Ordering::Acquire);
        if seq != pos.wrapping_add(1) {
            return None;
        }
        let msg = self.slots[index]
            .data
            .with(|ptr| unsafe { (*ptr).assume_init_read() });
        self.slots[index]
            .sequence
            .store(pos.wrapping_add(self.capacity), Ordering::Release);
        Some(msg)
    }

    /// One consumer step: consume at the current position, then advance it.
    fn try_recv(&self) -> Option<T> {
        let pos = self.consumer.load(Ordering::Relaxed);
        let msg = self.try_consume(pos)?;
        self.consumer.store(pos.wrapping_add(1), Ordering::Relaxed);
        Some(msg)
    }
}

impl<T> Drop for LoomRing<T> {
    fn drop(&mut self) {
        let head = self.producer.load(Ordering::Relaxed);
        let tail = self.consumer.load(Ordering::Relaxed);
        // Sequence check skips slots claimed but never published.
        let mut pos = tail;
        while pos != head {
            let index = (pos & self.mask) as usize;
            let seq = self.slots[index].sequence.load(Ordering::Relaxed);
            if seq == pos.wrapping_add(1) {
                self.slots[index].data.with_mut(|ptr| unsafe {
                    (*ptr).assume_init_drop();
                });
            }
            pos = pos.wrapping_add(1);
        }
    }
}

// ============================================================================
// LOOM TESTS — producer/consumer handshake
// ============================================================================

#[test]
fn loom_producer_consumer_concurrent() {
    // A value published concurrently with a consume attempt is either seen
    // whole or not yet seen; never torn, never lost.
    loom::model(|| {
        let ring = Arc::new(LoomRing::<u32>::new(2));
        let r = ring.clone();

        let producer = loom::thread::spawn(move || {
            assert!(r.try_send(99).is_ok());
        });

        let val = ring.try_recv();
        producer.join().unwrap();

        if val.is_none() {
            assert_eq!(ring.try_recv(), Some(99));
        } else {
            assert_eq!(val, Some(99));
        }
    });
}

#[test]
fn loom_claim_window_is_invisible_to_consumer() {
    // The window between the claim CAS and the publish store must read as
    // "no message ready", never as data.
    loom::model(|| {
        let ring = Arc::new(LoomRing::<u32>::new(2));
        let r = ring.clone();

        let producer = loom::thread::spawn(move || {
            let pos = r.try_claim().expect("empty ring must grant a claim");
            loom::thread::yield_now();
            r.publish_at(pos, 7);
        });

        // Whatever the schedule, a successful consume carries the full value
        if let Some(v) = ring.try_recv() {
            assert_eq!(v, 7);
        }
        producer.join().unwrap();

        let mut total = 0;
        while let Some(v) = ring.try_recv() {
            assert_eq!(v, 7);
            total += 1;
        }
        assert!(total <= 1);
    });
}

#[test]
fn loom_two_producers_one_consumer() {
    // Two producers race for slots; the consumer sees each accepted value
    // exactly once.
    loom::model(|| {
        let ring = Arc::new(LoomRing::<u32>::new(4));

        let r1 = ring.clone();
        let r2 = ring.clone();

        let p1 = loom::thread::spawn(move || {
            assert!(r1.try_send(1).is_ok());
        });
        let p2 = loom::thread::spawn(move || {
            assert!(r2.try_send(2).is_ok());
        });

        p1.join().unwrap();
        p2.join().unwrap();

        let mut received = Vec::new();
        while let Some(v) = ring.try_recv() {
            received.push(v);
        }
        received.sort();
        assert_eq!(received, vec![1, 2], "Expected [1, 2], got {:?}", received);
    });
}

#[test]
fn loom_two_producers_concurrent_consumer() {
    // Producers and the consumer all run concurrently. A producer that
    // claimed an earlier position but has not yet published stalls the
    // consumer (FIFO gap); nothing is duplicated or dropped.
    loom::model(|| {
        let ring = Arc::new(LoomRing::<u32>::new(2));

        let r1 = ring.clone();
        let r2 = ring.clone();

        let p1 = loom::thread::spawn(move || {
            assert!(r1.try_send(1).is_ok());
        });
        let p2 = loom::thread::spawn(move || {
            assert!(r2.try_send(2).is_ok());
        });

        let mut received = Vec::new();
        for _ in 0..2 {
            if let Some(v) = ring.try_recv() {
                received.push(v);
            }
        }

        p1.join().unwrap();
        p2.join().unwrap();

        while let Some(v) = ring.try_recv() {
            received.push(v);
        }
        received.sort();
        assert_eq!(received, vec![1, 2], "Expected [1, 2], got {:?}", received);
    });
}

// ============================================================================
// LOOM TESTS — full ring and slot reuse
// ============================================================================

#[test]
fn loom_full_ring_refuses_claims() {
    // A full ring refuses new claims until the consumer releases a slot;
    // every accepted value is accounted for.
    loom::model(|| {
        let ring = Arc::new(LoomRing::<u32>::new(2));
        let r = ring.clone();

        assert!(ring.try_send(1).is_ok());
        assert!(ring.try_send(2).is_ok());
        // Both slots published: a third claim must fail right now
        assert!(ring.try_claim().is_none());

        let consumer = loom::thread::spawn(move || r.try_recv());

        // Races the drain: succeeds only if the consumer released slot 0
        let third = ring.try_send(3);
        let consumed = consumer.join().unwrap();
        assert_eq!(consumed, Some(1));

        let mut remaining = Vec::new();
        while let Some(v) = ring.try_recv() {
            remaining.push(v);
        }

        let total_sent = 2 + usize::from(third.is_ok());
        assert_eq!(1 + remaining.len(), total_sent);
        assert_eq!(remaining[0], 2);
    });
}

#[test]
fn loom_slot_reuse_across_position_wraparound() {
    // Position space starts 2 slots below the u32 wrap point; slot reuse
    // (sequence advancing by the capacity each round) must behave the same
    // across the wrap as anywhere else.
    loom::model(|| {
        let start = u32::MAX - 1;
        let plain = LoomRing::<u32>::new(2);
        let wrapped = Arc::new(LoomRing::<u32>::with_start(2, start));

        for ring in [&plain, &*wrapped] {
            assert!(ring.try_send(10).is_ok());
            assert!(ring.try_send(20).is_ok());
            assert_eq!(ring.try_recv(), Some(10));
            assert_eq!(ring.try_recv(), Some(20));
        }

        // Second round lands on reused slots; for `wrapped` the positions
        // have crossed zero
        let w = wrapped.clone();
        let producer = loom::thread::spawn(move || {
            assert!(w.try_send(30).is_ok());
        });

        let val = wrapped.try_recv();
        producer.join().unwrap();

        if val.is_none() {
            assert_eq!(wrapped.try_recv(), Some(30));
        } else {
            assert_eq!(val, Some(30));
        }
    });
}

#[test]
fn loom_drop_with_pending() {
    // Published-but-unconsumed values are released by Drop; a slot that was
    // claimed but never published is skipped by the sequence check.
    loom::model(|| {
        let ring = LoomRing::<Box<u32>>::new(4);
        assert!(ring.try_send(Box::new(1)).is_ok());
        assert!(ring.try_send(Box::new(2)).is_ok());
        assert_eq!(ring.try_recv().as_deref(), Some(&1));

        // Claim without publishing, then drop with one value still pending
        let _pos = ring.try_claim().expect("ring has free slots");
        drop(ring);
    });
}
