//! Per-client rate limiting.
//!
//! Each client key (remote IP) owns a sliding log of admission instants.
//! A request is admitted when fewer than `count` admissions fall inside the
//! trailing window, which bounds every window of the configured length to at
//! most `count` admissions. Logs live in a sharded `DashMap`, so clients on
//! different shards never contend and updates for one key are atomic.

use std::collections::VecDeque;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;

/// A `<count> per <window>` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub count: u32,
    pub window: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("expected '<count> per <window>', got '{0}'")]
    Syntax(String),
    #[error("count must be a positive integer, got '{0}'")]
    Count(String),
    #[error("window multiplier must be a positive integer, got '{0}'")]
    Multiplier(String),
    #[error("unknown time unit '{0}'")]
    Unit(String),
}

impl FromStr for RateLimitRule {
    type Err = RuleParseError;

    /// Accepts `10 per minute`, `10/minute`, `100 per 30 seconds`, `5/2 hours`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let (count_part, window_part) = normalized
            .split_once(" per ")
            .or_else(|| normalized.split_once('/'))
            .ok_or_else(|| RuleParseError::Syntax(s.to_string()))?;

        let count: u32 = count_part
            .trim()
            .parse()
            .ok()
            .filter(|c| *c > 0)
            .ok_or_else(|| RuleParseError::Count(count_part.trim().to_string()))?;

        let mut tokens = window_part.split_whitespace();
        let (multiplier, unit) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(unit), None, None) => (1, unit),
            (Some(n), Some(unit), None) => {
                let n: u64 = n
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| RuleParseError::Multiplier(n.to_string()))?;
                (n, unit)
            }
            _ => return Err(RuleParseError::Syntax(s.to_string())),
        };

        let unit_secs = match unit.trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 3600,
            "day" => 86_400,
            _ => return Err(RuleParseError::Unit(unit.to_string())),
        };

        Ok(Self {
            count,
            window: Duration::from_secs(multiplier * unit_secs),
        })
    }
}

impl fmt::Display for RateLimitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per {} second", self.count, self.window.as_secs())?;
        if self.window.as_secs() != 1 {
            write!(f, "s")?;
        }
        Ok(())
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Shared limiter state for all client keys.
#[derive(Debug)]
pub struct RateLimiter {
    rule: RateLimitRule,
    logs: DashMap<IpAddr, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(rule: RateLimitRule) -> Self {
        Self {
            rule,
            logs: DashMap::new(),
        }
    }

    pub fn rule(&self) -> RateLimitRule {
        self.rule
    }

    /// Check and record one request for `client`.
    pub fn check(&self, client: IpAddr) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    pub(crate) fn check_at(&self, client: IpAddr, now: Instant) -> RateDecision {
        let window = self.rule.window;
        let limit = self.rule.count as usize;

        let mut log = self.logs.entry(client).or_default();
        while log
            .front()
            .is_some_and(|first| now.saturating_duration_since(*first) >= window)
        {
            log.pop_front();
        }

        if log.len() < limit {
            log.push_back(now);
            RateDecision::Allowed {
                remaining: (limit - log.len()) as u32,
            }
        } else {
            let oldest = log.front().copied().unwrap_or(now);
            RateDecision::Limited {
                retry_after: window.saturating_sub(now.saturating_duration_since(oldest)),
            }
        }
    }

    /// Drop clients whose whole log has aged out of the window.
    pub fn purge_idle(&self) -> usize {
        self.purge_idle_at(Instant::now())
    }

    pub(crate) fn purge_idle_at(&self, now: Instant) -> usize {
        let window = self.rule.window;
        let before = self.logs.len();
        self.logs.retain(|_, log| {
            log.back()
                .is_some_and(|last| now.saturating_duration_since(*last) < window)
        });
        before - self.logs.len()
    }

    /// Number of client keys currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.logs.len()
    }

    /// Periodically evict idle clients until shutdown.
    pub async fn run_janitor(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.rule.window);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.purge_idle();
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining = self.tracked_clients(), "Evicted idle rate limit entries");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit janitor stopping");
                    break;
                }
            }
        }
    }
}
