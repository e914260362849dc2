//! Injected dependencies shared by every layer.

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability
///
/// Booking timestamps (`booked_at` drives waitlist order) and the late-cancel
/// cutoff both come from the injected clock, never from `Utc::now()` directly.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
