//! Sliding-window admission control keyed by (identity, limit type).
//!
//! Each key owns an ordered queue of admission timestamps. Timestamps older
//! than the key's window are evicted lazily on every check, and a background
//! sweep drops keys whose queues have emptied out.

mod tiers;

pub use tiers::{longest_window, LimitType, RateLimitConfig, TierLimits, DEFAULT_TIER};

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Denial returned when a key is at its ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{} limit of {} reached, retry in {}s",
    .limit_type,
    .ceiling,
    .retry_after.as_secs().max(1)
)]
pub struct RateLimitExceeded {
    pub limit_type: LimitType,
    pub ceiling: u32,
    pub remaining: u32,
    /// Time until the oldest recorded admission leaves the window
    pub retry_after: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    identity: String,
    limit_type: LimitType,
}

impl WindowKey {
    fn new(identity: &str, limit_type: LimitType) -> Self {
        Self {
            identity: identity.to_string(),
            limit_type,
        }
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<WindowKey, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Ceilings that apply to `tier`.
    pub fn limits_for(&self, tier: &str) -> TierLimits {
        self.config.limits_for(tier)
    }

    /// Admits and records the request, or denies it without recording.
    pub fn is_allowed(&self, identity: &str, limit_type: LimitType, tier: &str) -> bool {
        self.check(identity, limit_type, tier).is_ok()
    }

    /// Same as [`is_allowed`](Self::is_allowed) but a denial says how long to
    /// wait.
    ///
    /// Evict, compare and append run under the key's map entry lock, so
    /// concurrent callers on one key can never be admitted past the ceiling.
    pub fn check(
        &self,
        identity: &str,
        limit_type: LimitType,
        tier: &str,
    ) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        let ceiling = self.limits_for(tier).ceiling(limit_type);
        let window = limit_type.window();

        let mut entry = self
            .windows
            .entry(WindowKey::new(identity, limit_type))
            .or_default();
        let timestamps = entry.value_mut();
        evict_expired(timestamps, now, window);

        if timestamps.len() >= ceiling as usize {
            let retry_after = timestamps
                .front()
                .map(|oldest| (*oldest + window).saturating_duration_since(now))
                .unwrap_or(window);
            debug!(
                identity,
                %limit_type,
                ceiling,
                "Rate limit reached"
            );
            return Err(RateLimitExceeded {
                limit_type,
                ceiling,
                remaining: 0,
                retry_after,
            });
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// Admissions left in the current window. Does not modify any window.
    pub fn get_remaining(&self, identity: &str, limit_type: LimitType, tier: &str) -> u32 {
        let now = Instant::now();
        let ceiling = self.limits_for(tier).ceiling(limit_type);
        let recent = self
            .windows
            .get(&WindowKey::new(identity, limit_type))
            .map(|timestamps| count_recent(&timestamps, now, limit_type.window()))
            .unwrap_or(0);
        ceiling.saturating_sub(u32::try_from(recent).unwrap_or(u32::MAX))
    }

    /// Evicts expired timestamps from every key and deletes keys left empty.
    /// Returns the number of keys deleted.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let horizon = longest_window();
        let mut removed = 0;
        self.windows.retain(|key, timestamps| {
            evict_expired(timestamps, now, key.limit_type.window().min(horizon));
            if timestamps.is_empty() {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Number of (identity, limit type) keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Runs [`sweep`](Self::sweep) every `sweep_interval` until the limiter is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::downgrade(self);
        let period = self.config.sweep_interval.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let removed = limiter.sweep();
                info!(
                    removed,
                    remaining = limiter.tracked_keys(),
                    "Cleaned up empty rate limit records"
                );
            }
        })
    }
}

fn evict_expired(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    let Some(cutoff) = now.checked_sub(window) else {
        return;
    };
    while timestamps.front().is_some_and(|oldest| *oldest < cutoff) {
        timestamps.pop_front();
    }
}

fn count_recent(timestamps: &VecDeque<Instant>, now: Instant, window: Duration) -> usize {
    match now.checked_sub(window) {
        Some(cutoff) => timestamps.iter().filter(|ts| **ts >= cutoff).count(),
        None => timestamps.len(),
    }
}
