//! Type definitions for the bus system.
//!
//! Contains the performance-mode selector and the backpressure level
//! indicator shared across the bus implementation.

use serde::{Deserialize, Serialize};

// ============================================================================
// Performance Mode
// ============================================================================

/// Runtime feature/throughput trade-off, stored in an atomic and read once
/// per publish and once per batch.
///
/// | Mode          | Admission | Statistics | Dispatch lock |
/// |---------------|-----------|------------|---------------|
/// | FullFeatured  | on        | on         | shared lock   |
/// | NoStats       | on        | off        | shared lock   |
/// | BareMetal     | off       | off        | no lock       |
///
/// In `BareMetal` mode the subscription table is read without locking, so
/// subscribe/unsubscribe must not run concurrently with dispatch; that
/// coordination is the caller's responsibility.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceMode {
    /// Admission control, statistics, and locked dispatch all active
    FullFeatured = 0,
    /// Statistics disabled; admission and locked dispatch remain
    NoStats = 1,
    /// Admission, statistics, and dispatch locking all bypassed
    BareMetal = 2,
}

impl From<u8> for PerformanceMode {
    fn from(v: u8) -> Self {
        match v {
            1 => PerformanceMode::NoStats,
            2 => PerformanceMode::BareMetal,
            _ => PerformanceMode::FullFeatured,
        }
    }
}

impl PerformanceMode {
    /// True when statistics updates are suppressed
    #[inline]
    pub fn stats_disabled(&self) -> bool {
        matches!(self, PerformanceMode::NoStats | PerformanceMode::BareMetal)
    }

    /// True when admission control and dispatch locking are bypassed
    #[inline]
    pub fn is_bare_metal(&self) -> bool {
        matches!(self, PerformanceMode::BareMetal)
    }
}

// ============================================================================
// Backpressure Level
// ============================================================================

/// Coarse queue-health indicator derived from the current depth.
///
/// Exposed as a single read so hosts can adapt (coalesce, pause
/// non-critical producers) without the bus imposing policy.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackpressureLevel {
    /// Depth below 75% of capacity
    Normal = 0,
    /// Depth in [75%, 90%)
    Warning = 1,
    /// Depth in [90%, 100%)
    Critical = 2,
    /// Ring completely full
    Full = 3,
}

impl BackpressureLevel {
    /// Derive the level for `depth` messages in a ring of `capacity` slots.
    pub fn from_depth(depth: u32, capacity: u32) -> Self {
        let warning = (capacity as u64 * 75 / 100) as u32;
        let critical = (capacity as u64 * 90 / 100) as u32;
        if depth >= capacity {
            BackpressureLevel::Full
        } else if depth >= critical {
            BackpressureLevel::Critical
        } else if depth >= warning {
            BackpressureLevel::Warning
        } else {
            BackpressureLevel::Normal
        }
    }
}
