//! Shared primitives for the ring transport.
//!
//! Contains `CachePadded<T>` for false-sharing avoidance, `Slot<P>` for
//! sequence-coordinated ring slots, and the memory-ordering configuration
//! that the `single-core` build downgrades to compiler-only fences.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU32, Ordering};

use super::envelope::Envelope;

// ============================================================================
// Memory-ordering configuration
// ============================================================================

// Under `single-core` the hot-path atomics drop to Relaxed: a single core
// observes its own program order, so hardware barriers buy nothing and the
// compiler fences below are sufficient. The opt-in interlock lives in
// lib.rs.
pub(crate) const ORD_ACQUIRE: Ordering = if cfg!(feature = "single-core") {
    Ordering::Relaxed
} else {
    Ordering::Acquire
};

pub(crate) const ORD_RELEASE: Ordering = if cfg!(feature = "single-core") {
    Ordering::Relaxed
} else {
    Ordering::Release
};

pub(crate) const ORD_ACQ_REL: Ordering = if cfg!(feature = "single-core") {
    Ordering::Relaxed
} else {
    Ordering::AcqRel
};

/// Compiler-only acquire fence; no-op unless `single-core` is active.
#[inline(always)]
pub(crate) fn acquire_fence() {
    #[cfg(feature = "single-core")]
    std::sync::atomic::compiler_fence(Ordering::Acquire);
}

/// Compiler-only release fence; no-op unless `single-core` is active.
#[inline(always)]
pub(crate) fn release_fence() {
    #[cfg(feature = "single-core")]
    std::sync::atomic::compiler_fence(Ordering::Release);
}

// ============================================================================
// CachePadded
// ============================================================================

/// Cache-line aligned wrapper to prevent false sharing between producer and
/// consumer hot fields. Alignment is dropped under `single-core` where the
/// wasted memory buys nothing.
#[cfg_attr(not(feature = "single-core"), repr(C, align(64)))]
#[cfg_attr(feature = "single-core", repr(C))]
pub(crate) struct CachePadded<T>(pub T);

// ============================================================================
// Ring slot
// ============================================================================

/// One ring slot: an envelope cell plus the sequence counter coordinating
/// its ownership handshake.
///
/// For a slot at index `i` and a position `p` with `p & mask == i`:
/// - `sequence == p`        → empty, available to the producer claiming `p`
/// - `sequence == p + 1`    → envelope written, awaiting the consumer
/// - `sequence == p + CAP`  → released, available for the next round
#[cfg_attr(not(feature = "single-core"), repr(align(64)))]
pub(crate) struct Slot<P> {
    pub sequence: AtomicU32,
    pub envelope: UnsafeCell<MaybeUninit<Envelope<P>>>,
}

/// Allocate sequence-tracked slots for the ring.
///
/// Each slot's sequence starts at `start + i`, meaning "slot i is available
/// for position start + i" on the first producer round. `start` must be a
/// multiple of the capacity so slot indices and positions stay congruent.
pub(crate) fn alloc_slots<P>(capacity: u32, start: u32) -> Box<[Slot<P>]> {
    debug_assert!(capacity.is_power_of_two());
    debug_assert_eq!(start & (capacity - 1), 0);
    let mut slots = Vec::with_capacity(capacity as usize);
    for i in 0..capacity {
        slots.push(Slot {
            sequence: AtomicU32::new(start.wrapping_add(i)),
            envelope: UnsafeCell::new(MaybeUninit::uninit()),
        });
    }
    slots.into_boxed_slice()
}
