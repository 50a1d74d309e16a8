//! Shared "rate limited until T" gate for all outbound listing requests.
//!
//! One limiter is shared by every fetch and every session. A fetch that
//! exhausts its HTTP 429 retry budget trips it; every later request fails
//! fast with [`ScanError::RateLimited`] until the window passes, at which
//! point the first check clears it.

use crate::error::{Result, ScanError};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct RateLimitState {
    is_limited: bool,
    reset_at: Option<Instant>,
}

/// Point-in-time view of the limiter, for countdown displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    /// Whether the window is still open
    pub is_limited: bool,
    /// Time left in the window (zero when not limited)
    pub retry_after: Duration,
}

/// Process-wide cooldown tracker.
#[derive(Debug, Default)]
pub struct RateLimiter {
    state: Mutex<RateLimitState>,
}

impl RateLimiter {
    /// Create an independent limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The limiter shared by everything in this process.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<RateLimiter>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(RateLimiter::new())).clone()
    }

    fn lock(&self) -> MutexGuard<'_, RateLimitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail if the window is open; clear it if it has expired.
    pub fn check(&self) -> Result<()> {
        let mut state = self.lock();
        if !state.is_limited {
            return Ok(());
        }

        let now = Instant::now();
        match state.reset_at {
            Some(reset_at) if now < reset_at => Err(ScanError::RateLimited {
                retry_after: reset_at - now,
            }),
            _ => {
                tracing::debug!("Rate limit window expired, clearing");
                state.is_limited = false;
                state.reset_at = None;
                Ok(())
            }
        }
    }

    /// Open (or extend) the window for `duration` from now.
    ///
    /// An active window is never shortened.
    pub fn trip(&self, duration: Duration) {
        let mut state = self.lock();
        let candidate = Instant::now() + duration;
        let reset_at = match state.reset_at {
            Some(existing) if state.is_limited && existing > candidate => existing,
            _ => candidate,
        };
        state.is_limited = true;
        state.reset_at = Some(reset_at);
        tracing::warn!("Rate limit active for {:?}", duration);
    }

    /// Read the state without clearing an expired window.
    #[must_use]
    pub fn snapshot(&self) -> RateLimitSnapshot {
        let state = self.lock();
        let remaining = state
            .reset_at
            .map(|reset_at| reset_at.saturating_duration_since(Instant::now()))
            .unwrap_or_default();

        RateLimitSnapshot {
            is_limited: state.is_limited && !remaining.is_zero(),
            retry_after: if state.is_limited { remaining } else { Duration::ZERO },
        }
    }

    /// Clear the window immediately.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.is_limited = false;
        state.reset_at = None;
    }
}
