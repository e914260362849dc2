//! Dependencies injected into the booking service.

use crate::config::BookingConfig;
use gymbook_core::{BookingRules, BookingStore, Clock, LateCancelPolicy, SystemClock};
use gymbook_runtime::RetryPolicy;
use std::sync::Arc;

/// Rule values used when neither the class nor the gym sets them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookingDefaults {
    /// Minutes before start after which a cancellation is late
    pub cancellation_window_minutes: u32,
    /// Late cancellation credit handling
    pub late_cancel_policy: LateCancelPolicy,
}

impl BookingDefaults {
    /// Resolve the rules for one class: class rules over gym rules over these
    /// defaults.
    #[must_use]
    pub fn resolve(
        self,
        gym: &BookingRules,
        class: Option<&BookingRules>,
    ) -> ResolvedRules {
        let merged = gym.overridden_by(class);
        ResolvedRules {
            cancellation_window_minutes: merged
                .cancellation_window_minutes
                .unwrap_or(self.cancellation_window_minutes),
            late_cancel_policy: merged.late_cancel_policy.unwrap_or(self.late_cancel_policy),
        }
    }
}

impl Default for BookingDefaults {
    fn default() -> Self {
        Self::from(&BookingConfig::default())
    }
}

impl From<&BookingConfig> for BookingDefaults {
    fn from(config: &BookingConfig) -> Self {
        Self {
            cancellation_window_minutes: config.cancellation_window_minutes,
            late_cancel_policy: config.late_cancel_policy,
        }
    }
}

/// Booking rules with every field decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedRules {
    /// Minutes before start after which a cancellation is late
    pub cancellation_window_minutes: u32,
    /// Late cancellation credit handling
    pub late_cancel_policy: LateCancelPolicy,
}

/// Everything the booking service reaches outside itself for.
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Source of "now"
    pub clock: Arc<dyn Clock>,
    /// Document storage
    pub store: Arc<dyn BookingStore>,
    /// Conflict retry tuning
    pub retry: RetryPolicy,
    /// Fallback booking rules
    pub defaults: BookingDefaults,
}

impl BookingEnvironment {
    /// Production environment over `store` using the system clock.
    #[must_use]
    pub fn new(store: Arc<dyn BookingStore>, config: &BookingConfig) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            store,
            retry: config.retry_policy(),
            defaults: BookingDefaults::from(config),
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl std::fmt::Debug for BookingEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingEnvironment")
            .field("retry", &self.retry)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
