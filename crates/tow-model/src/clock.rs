//! Time source abstraction
//!
//! The engine never reads wall-clock time directly. Components take a
//! `Clock` so scoring and alert evaluation stay deterministic under
//! test, and so the SLA collaborator can own "time since X" policy.

use chrono::{DateTime, Utc};

/// Monotonic read-only time source
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
