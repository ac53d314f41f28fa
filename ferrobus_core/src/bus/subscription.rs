//! Subscription table and handles.
//!
//! One callback slot per payload variant, each holding up to
//! `MAX_CALLBACKS_PER_VARIANT` boxed callbacks. Registration runs under the
//! bus's writer lock; dispatch enumerates active entries in slot order under
//! the reader lock (or, in bare-metal mode, with no lock at all under the
//! no-concurrent-registration contract).
//!
//! Registration failure is a reported condition, not an error: a full slot
//! yields a handle with the sentinel id and a log warning.

use std::array;

use crate::config::{
    MAX_CALLBACKS_PER_VARIANT, MAX_PAYLOAD_VARIANTS, MAX_SUBSCRIPTIONS_PER_COMPONENT,
};
use crate::types::FixedVec;

use super::envelope::{Envelope, MessageHeader};
use super::payload::{Payload, VariantOf};
use super::AsyncBus;

/// Sentinel callback id marking a failed registration.
pub const INVALID_CALLBACK_ID: u64 = u64::MAX;

/// Proof of registration, consumed by `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    /// Payload variant the callback was registered under
    pub variant_index: usize,
    /// Bus-global monotonic callback id, or [`INVALID_CALLBACK_ID`]
    pub callback_id: u64,
}

impl SubscriptionHandle {
    /// False when the registration was refused (callback slot exhausted).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.callback_id != INVALID_CALLBACK_ID
    }

    pub(crate) fn invalid(variant_index: usize) -> Self {
        Self {
            variant_index,
            callback_id: INVALID_CALLBACK_ID,
        }
    }
}

pub(crate) type BoxedCallback<P> = Box<dyn Fn(&Envelope<P>) + Send + Sync>;

struct CallbackEntry<P> {
    id: u64,
    callback: Option<BoxedCallback<P>>,
}

struct CallbackSlot<P> {
    entries: [CallbackEntry<P>; MAX_CALLBACKS_PER_VARIANT],
    live: u32,
}

/// The full table: one slot per payload variant plus the id counter.
/// Guarded by the bus's reader-writer lock.
pub(crate) struct CallbackTable<P> {
    slots: [CallbackSlot<P>; MAX_PAYLOAD_VARIANTS],
    next_callback_id: u64,
}

impl<P> CallbackTable<P> {
    pub fn new() -> Self {
        Self {
            slots: array::from_fn(|_| CallbackSlot {
                entries: array::from_fn(|_| CallbackEntry {
                    id: 0,
                    callback: None,
                }),
                live: 0,
            }),
            next_callback_id: 1,
        }
    }

    /// Register a callback under `variant_index`, returning the sentinel
    /// handle when all entries for that variant are taken.
    pub fn insert(&mut self, variant_index: usize, callback: BoxedCallback<P>) -> SubscriptionHandle {
        let callback_id = self.next_callback_id;
        self.next_callback_id += 1;

        let slot = &mut self.slots[variant_index];
        for entry in slot.entries.iter_mut() {
            if entry.callback.is_none() {
                entry.id = callback_id;
                entry.callback = Some(callback);
                slot.live += 1;
                return SubscriptionHandle {
                    variant_index,
                    callback_id,
                };
            }
        }

        log::warn!(
            "subscription refused: variant {} already holds {} callbacks",
            variant_index,
            MAX_CALLBACKS_PER_VARIANT
        );
        SubscriptionHandle::invalid(variant_index)
    }

    /// Deactivate the entry matching the handle; false when no entry
    /// matches.
    pub fn remove(&mut self, variant_index: usize, callback_id: u64) -> bool {
        let slot = &mut self.slots[variant_index];
        for entry in slot.entries.iter_mut() {
            if entry.callback.is_some() && entry.id == callback_id {
                entry.callback = None;
                slot.live -= 1;
                return true;
            }
        }
        false
    }

    /// Invoke every active callback registered for `variant_index`, in
    /// entry order.
    pub fn dispatch(&self, variant_index: usize, envelope: &Envelope<P>) {
        let slot = &self.slots[variant_index];
        if slot.live == 0 {
            return;
        }
        for entry in slot.entries.iter() {
            if let Some(callback) = &entry.callback {
                callback(envelope);
            }
        }
    }

    /// Active callback count for one variant.
    #[cfg(test)]
    pub fn live_count(&self, variant_index: usize) -> u32 {
        self.slots[variant_index].live
    }
}

// ============================================================================
// SubscriptionGuard
// ============================================================================

/// RAII bundle of subscriptions: every handle registered through the guard
/// is unsubscribed when the guard drops.
///
/// ```rust
/// use ferrobus_core::{payload, AsyncBus, SubscriptionGuard};
///
/// #[derive(Debug, Clone)]
/// pub struct Tick { pub n: u32 }
/// payload! { pub enum ClockPayload { Tick(Tick) } }
///
/// let bus: AsyncBus<ClockPayload, 256> = AsyncBus::new();
/// {
///     let mut guard = SubscriptionGuard::new(&bus);
///     guard.subscribe::<Tick, _>(|_envelope| {});
///     // dropped here: the callback is unregistered
/// }
/// ```
pub struct SubscriptionGuard<'bus, P: Payload, const CAP: u32> {
    bus: &'bus AsyncBus<P, CAP>,
    handles: FixedVec<SubscriptionHandle, MAX_SUBSCRIPTIONS_PER_COMPONENT>,
}

impl<'bus, P: Payload, const CAP: u32> SubscriptionGuard<'bus, P, CAP> {
    pub fn new(bus: &'bus AsyncBus<P, CAP>) -> Self {
        Self {
            bus,
            handles: FixedVec::new(),
        }
    }

    /// Subscribe and track the handle for drop-time cleanup. Invalid
    /// handles (table exhausted) and handles beyond the guard's capacity
    /// are returned but not tracked.
    pub fn subscribe<T, F>(&mut self, callback: F) -> SubscriptionHandle
    where
        T: VariantOf<P>,
        F: Fn(&Envelope<P>) + Send + Sync + 'static,
    {
        let handle = self.bus.subscribe::<T, F>(callback);
        if handle.is_valid() {
            let _ = self.handles.push(handle);
        }
        handle
    }

    /// Typed variant of [`Self::subscribe`]: the callback receives the
    /// concrete variant and the header instead of the whole envelope.
    pub fn subscribe_to<T, F>(&mut self, callback: F) -> SubscriptionHandle
    where
        T: VariantOf<P>,
        F: Fn(&T, &MessageHeader) + Send + Sync + 'static,
    {
        let handle = self.bus.subscribe_to::<T, F>(callback);
        if handle.is_valid() {
            let _ = self.handles.push(handle);
        }
        handle
    }

    /// Number of tracked handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True when no handles are tracked.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<P: Payload, const CAP: u32> Drop for SubscriptionGuard<'_, P, CAP> {
    fn drop(&mut self) {
        for handle in self.handles.iter() {
            self.bus.unsubscribe(handle);
        }
    }
}
