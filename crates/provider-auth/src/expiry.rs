//! Token expiry bookkeeping
//!
//! Expirations are absolute unix timestamps in milliseconds, computed at
//! storage time from the token endpoint's `expires_in` delta.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::constants::DEFAULT_REFRESH_MARGIN;

/// Whether a token expiring at `expires_at` must be refreshed at `now`.
///
/// True when `now + margin >= expires_at`; the boundary itself counts as
/// expired so we never race the provider's own cutoff.
pub fn is_expired(expires_at: u64, now: u64, margin: Duration) -> bool {
    let margin_millis = u64::try_from(margin.as_millis()).unwrap_or(u64::MAX);
    now.saturating_add(margin_millis) >= expires_at
}

/// Source of "now" in unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(now_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A clock paired with the refresh safety margin.
#[derive(Clone)]
pub struct ExpiryClock {
    margin: Duration,
    clock: Arc<dyn Clock>,
}

impl ExpiryClock {
    pub fn new(margin: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { margin, clock }
    }

    /// Wall clock with the default 30 second margin.
    pub fn system() -> Self {
        Self::new(DEFAULT_REFRESH_MARGIN, Arc::new(SystemClock))
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// A missing expiry record is treated as already expired.
    pub fn needs_refresh(&self, expires_at: Option<u64>) -> bool {
        match expires_at {
            Some(expires_at) => is_expired(expires_at, self.now_millis(), self.margin),
            None => true,
        }
    }

    /// Absolute expiry for a token issued now with the given lifetime.
    /// Saturates at `u64::MAX` for lifetimes beyond the representable range.
    pub fn expires_at(&self, expires_in: Duration) -> u64 {
        let lifetime_millis = u64::try_from(expires_in.as_millis()).unwrap_or(u64::MAX);
        self.now_millis().saturating_add(lifetime_millis)
    }
}

impl Default for ExpiryClock {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for ExpiryClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryClock")
            .field("margin", &self.margin)
            .finish_non_exhaustive()
    }
}
