use dashmap::DashMap;
use governor::{ clock::DefaultClock, state::{ InMemoryState, NotKeyed }, Quota, RateLimiter };
use log::debug;
use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::time::{ Duration, Instant };

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(60_000);
pub const DEFAULT_MAX_REQUESTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

impl RateLimitConfig {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self { window, max_requests }
    }
}

/// Returned when an identity already has `max_requests` calls in the trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    /// Time until the oldest counted request leaves the window.
    pub retry_after: Duration,
}

/// Per-identity sliding-window limiter.
///
/// Each identity owns a queue of admission timestamps. Expired timestamps are
/// pruned on every check; there is no background pruning of the queues
/// themselves. Identities whose queue has gone empty are only dropped by
/// [`SlidingWindowLimiter::evict_idle`].
///
/// The whole prune/count/append runs while holding the identity's map entry,
/// so concurrent checks for one identity never both see the same stale count.
/// State is process-local and is lost on restart.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    pub fn check(&self, identity: &str) -> Result<(), Rejected> {
        self.check_at(identity, Instant::now())
    }

    pub fn check_at(&self, identity: &str, now: Instant) -> Result<(), Rejected> {
        let window = self.config.window;
        let mut timestamps = self.windows.entry(identity.to_string()).or_default();

        timestamps.retain(|&t| now.saturating_duration_since(t) < window);

        if timestamps.len() >= self.config.max_requests {
            let retry_after = timestamps
                .iter()
                .min()
                .map(|&oldest| window.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(window);
            debug!(
                "Rate limit hit for {}: {} requests in the last {:?}",
                identity,
                timestamps.len(),
                window
            );
            return Err(Rejected { retry_after });
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// Drops identities with no request left inside the window. Returns how many were removed.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let window = self.config.window;
        let before = self.windows.len();
        self.windows.retain(|_, timestamps| {
            timestamps.retain(|&t| now.saturating_duration_since(t) < window);
            !timestamps.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    /// Number of identities currently held in memory.
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

/// Process-wide ceiling on `/api/chat`, independent of who is calling.
pub struct BurstGuard {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl BurstGuard {
    pub fn per_second(requests: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(requests)),
        }
    }

    pub fn admit(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
