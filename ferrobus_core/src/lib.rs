//! # Ferrobus Core
//!
//! A lock-free, multi-producer/single-consumer message bus with
//! priority-based admission control, bounded backpressure, and type-safe
//! typed-payload dispatch. Built for real-time and safety-critical systems:
//! zero hot-path heap allocation, deterministic latency, graceful
//! degradation under overload.
//!
//! The building blocks:
//!
//! - **Ring transport**: a fixed-capacity slot array with per-slot sequence
//!   counters coordinating producers and the consumer without locks
//! - **Admission control**: priority-derived depth thresholds decide whether
//!   a publish is accepted before a slot is ever claimed
//! - **Typed dispatch**: subscriptions keyed by a compile-time variant index
//!   into a closed payload enum, or zero-overhead visitor draining
//! - **Performance modes**: runtime switch trading features for throughput
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrobus_core::{payload, AsyncBus, MessagePriority};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! pub struct SensorReading { pub temperature: f32 }
//! #[derive(Debug, Clone, PartialEq)]
//! pub struct MotorCommand { pub speed: i32 }
//!
//! payload! {
//!     pub enum RobotPayload {
//!         Sensor(SensorReading),
//!         Motor(MotorCommand),
//!     }
//! }
//!
//! let bus: AsyncBus<RobotPayload, 1024> = AsyncBus::new();
//! let handle = bus.subscribe::<SensorReading, _>(|envelope| {
//!     assert!(envelope.header.msg_id > 0);
//! });
//!
//! bus.publish(SensorReading { temperature: 25.0 }, 1);
//! bus.publish_with_priority(MotorCommand { speed: 90 }, 1, MessagePriority::High);
//! let drained = bus.process_batch();
//! assert_eq!(drained, 2);
//! bus.unsubscribe(&handle);
//! ```

// The `single-core` build replaces hardware memory barriers with
// compiler-only fences. That is ONLY safe on single-core targets
// (Cortex-M class MCUs, single-core RISC-V, bare-metal or single-core
// RTOS). On any SMP system it produces silent data corruption. The
// explicit acknowledgement feature is mandatory.
#[cfg(all(feature = "single-core", not(feature = "i-know-single-core-is-unsafe")))]
compile_error!(
    "feature \"single-core\" disables hardware memory barriers, which is only \
     safe on single-core targets. Enable feature \
     \"i-know-single-core-is-unsafe\" to confirm you understand the implications."
);

pub mod bus;
pub mod config;
pub mod error;
pub mod types;
pub(crate) mod utils;

// Re-export commonly used types for easy access
pub use bus::envelope::{current_timestamp_us, Envelope, MessageHeader, MessagePriority};
pub use bus::payload::{Payload, VariantOf};
pub use bus::stats::{BusStatistics, BusStatisticsSnapshot};
pub use bus::subscription::{SubscriptionGuard, SubscriptionHandle};
pub use bus::types::{BackpressureLevel, PerformanceMode};
pub use bus::AsyncBus;
pub use error::{BusError, ErrorCallback};
pub use types::{FixedString, FixedVec};

// Re-export serde for consistent derive usage in downstream message types
pub use serde;

// Re-export bytemuck for consistent Pod/Zeroable trait usage
pub use bytemuck;
