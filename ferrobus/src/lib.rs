//! # Ferrobus
//!
//! A message-centric communication bus for real-time and safety-critical
//! Rust: lock-free MPSC transport, priority-based admission control,
//! bounded backpressure, and type-safe typed-payload dispatch.
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrobus::prelude::*;
//!
//! #[derive(Debug, Clone)]
//! pub struct WheelOdometry { pub ticks: u64 }
//!
//! ferrobus::payload! {
//!     pub enum DrivePayload {
//!         Odometry(WheelOdometry),
//!     }
//! }
//!
//! let bus: AsyncBus<DrivePayload, 4096> = AsyncBus::new();
//! bus.subscribe_to::<WheelOdometry, _>(|odo, header| {
//!     let _ = (odo.ticks, header.timestamp_us);
//! });
//! bus.publish(WheelOdometry { ticks: 128 }, 1);
//! assert_eq!(bus.process_batch(), 1);
//! ```

// Re-export the core crate wholesale
pub use ferrobus_core::{self, *};

// Re-export the payload macro for `ferrobus::payload!` invocations
pub use ferrobus_core::payload;

// Re-export serde at crate root for downstream message-type derives
pub use serde;

/// Everything needed to publish, subscribe, and drain a bus.
pub mod prelude {
    // ============================================
    // Bus and payload machinery
    // ============================================
    pub use ferrobus_core::bus::AsyncBus;
    pub use ferrobus_core::{Payload, VariantOf};

    // ============================================
    // Message types
    // ============================================
    pub use ferrobus_core::{Envelope, MessageHeader, MessagePriority};

    // ============================================
    // Subscriptions
    // ============================================
    pub use ferrobus_core::{SubscriptionGuard, SubscriptionHandle};

    // ============================================
    // Health, statistics, and tuning
    // ============================================
    pub use ferrobus_core::{
        BackpressureLevel, BusError, BusStatisticsSnapshot, PerformanceMode,
    };

    // ============================================
    // Fixed containers
    // ============================================
    pub use ferrobus_core::{FixedString, FixedVec};
}
