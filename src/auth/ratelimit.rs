//! Rate limiter for failed logins
//!
//! Failed Basic-Auth attempts are counted per client IP inside a sliding
//! window. Once the count reaches the limit the IP is blocked for a while.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::config::AuthRateLimitConfig;

/// Configuration for the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum number of failed attempts before blocking
    pub max_failures: u32,

    /// Duration to block an IP after max failures
    pub block_duration: Duration,

    /// Duration after which failure count resets
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_failures: 10,
            block_duration: Duration::from_secs(300),
            window_duration: Duration::from_secs(600),
        }
    }
}

impl From<&AuthRateLimitConfig> for RateLimitConfig {
    fn from(config: &AuthRateLimitConfig) -> Self {
        Self {
            max_failures: config.max_failures,
            block_duration: Duration::from_secs(config.block_duration_secs),
            window_duration: Duration::from_secs(config.window_duration_secs),
        }
    }
}

#[derive(Debug, Clone)]
struct FailureEntry {
    count: u32,
    window_start: Instant,
    blocked_at: Option<Instant>,
}

impl FailureEntry {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            blocked_at: None,
        }
    }
}

/// Per-IP failed login tracker
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: RwLock<HashMap<IpAddr, FailureEntry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    // A panic while holding the lock leaves the map consistent, so poisoning is ignored
    fn read(&self) -> RwLockReadGuard<'_, HashMap<IpAddr, FailureEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<IpAddr, FailureEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a failed login for an IP
    ///
    /// Returns `true` if the IP is now blocked
    pub fn record_failure(&self, ip: IpAddr) -> bool {
        let mut entries = self.write();
        let now = Instant::now();

        let entry = entries.entry(ip).or_insert_with(|| FailureEntry::new(now));

        if let Some(blocked_at) = entry.blocked_at {
            if now.duration_since(blocked_at) < self.config.block_duration {
                return true;
            }
            *entry = FailureEntry::new(now);
        }

        if now.duration_since(entry.window_start) >= self.config.window_duration {
            *entry = FailureEntry::new(now);
        }

        entry.count += 1;

        if entry.count >= self.config.max_failures {
            entry.blocked_at = Some(now);
            tracing::warn!(client_ip = %ip, failures = entry.count, "Blocking client after failed logins");
            true
        } else {
            false
        }
    }

    /// Check if an IP is currently blocked
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        self.remaining_block_time(ip).is_some()
    }

    /// Forget an IP, e.g. after a successful login
    pub fn reset(&self, ip: IpAddr) {
        self.write().remove(&ip);
    }

    /// Failures recorded for an IP in the current window
    pub fn get_failure_count(&self, ip: IpAddr) -> u32 {
        let entries = self.read();
        let now = Instant::now();

        match entries.get(&ip) {
            Some(entry) if now.duration_since(entry.window_start) < self.config.window_duration => {
                entry.count
            }
            _ => 0,
        }
    }

    /// Remaining block time for an IP, `None` when not blocked
    pub fn remaining_block_time(&self, ip: IpAddr) -> Option<Duration> {
        let entries = self.read();
        let blocked_at = entries.get(&ip)?.blocked_at?;

        self.config
            .block_duration
            .checked_sub(Instant::now().duration_since(blocked_at))
            .filter(|remaining| !remaining.is_zero())
    }

    /// Drop entries whose window and block have both expired
    pub fn cleanup(&self) {
        let mut entries = self.write();
        let now = Instant::now();

        entries.retain(|_, entry| {
            let still_blocked = entry
                .blocked_at
                .is_some_and(|at| now.duration_since(at) < self.config.block_duration);
            still_blocked || now.duration_since(entry.window_start) < self.config.window_duration
        });
    }

    /// Number of IPs currently tracked
    pub fn tracked_ips_count(&self) -> usize {
        self.read().len()
    }
}
