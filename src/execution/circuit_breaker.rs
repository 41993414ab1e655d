//! Sliding-window circuit breaker for the execution pipeline.
//!
//! Trips after `max_failures` failures inside `window`; stays open for
//! `cooldown` and then self-resets on the next query. A success wipes the
//! failure history. All transitions take an explicit unix-seconds `now`
//! so the logic is testable without sleeping; the `*_now` wrappers feed
//! in wall-clock time for production use.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
}

#[derive(Debug, Clone)]
pub struct BreakerStatus {
    pub state: BreakerState,
    pub recent_failures: usize,
    pub cooldown_remaining_secs: u64,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    max_failures: usize,
    window_secs: u64,
    cooldown_secs: u64,
    failures: Vec<u64>,
    tripped_at: Option<u64>,
}

impl CircuitBreaker {
    pub fn new(max_failures: usize, window_secs: u64, cooldown_secs: u64) -> Self {
        Self {
            max_failures,
            window_secs,
            cooldown_secs,
            failures: Vec::new(),
            tripped_at: None,
        }
    }

    fn now_unix() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn prune(&mut self, now: u64) {
        let cutoff = now.saturating_sub(self.window_secs);
        self.failures.retain(|&t| t > cutoff);
    }

    /// Record a failure at `now`. Trips the breaker when the in-window
    /// count reaches the threshold.
    pub fn record_failure_at(&mut self, now: u64, reason: &str) {
        self.failures.push(now);
        self.prune(now);
        warn!(
            "execution failure ({}): {}/{} in window",
            reason,
            self.failures.len(),
            self.max_failures
        );
        if self.failures.len() >= self.max_failures && self.tripped_at.is_none() {
            self.tripped_at = Some(now);
            error!(
                "🚨 circuit breaker TRIPPED after {} failures, cooling down {}s",
                self.failures.len(),
                self.cooldown_secs
            );
        }
    }

    pub fn record_failure(&mut self, reason: &str) {
        self.record_failure_at(Self::now_unix(), reason);
    }

    /// A successful execution clears the failure history.
    pub fn record_success(&mut self) {
        if !self.failures.is_empty() {
            info!("execution succeeded, clearing {} recorded failures", self.failures.len());
        }
        self.failures.clear();
    }

    /// Whether the breaker is open at `now`. Self-resets once the
    /// cooldown has fully elapsed.
    pub fn is_tripped_at(&mut self, now: u64) -> bool {
        match self.tripped_at {
            None => false,
            Some(tripped) => {
                if now.saturating_sub(tripped) >= self.cooldown_secs {
                    info!("✅ circuit breaker reset after cooldown");
                    self.tripped_at = None;
                    self.failures.clear();
                    false
                } else {
                    true
                }
            }
        }
    }

    pub fn is_tripped(&mut self) -> bool {
        self.is_tripped_at(Self::now_unix())
    }

    pub fn cooldown_remaining_at(&self, now: u64) -> u64 {
        match self.tripped_at {
            Some(tripped) => self
                .cooldown_secs
                .saturating_sub(now.saturating_sub(tripped)),
            None => 0,
        }
    }

    pub fn cooldown_remaining(&self) -> u64 {
        self.cooldown_remaining_at(Self::now_unix())
    }

    pub fn status_at(&self, now: u64) -> BreakerStatus {
        let open = matches!(self.tripped_at, Some(t) if now.saturating_sub(t) < self.cooldown_secs);
        BreakerStatus {
            state: if open {
                BreakerState::Open
            } else {
                BreakerState::Closed
            },
            recent_failures: self.failures.len(),
            cooldown_remaining_secs: self.cooldown_remaining_at(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(5, 300, 600)
    }

    #[test]
    fn test_trips_after_max_failures_in_window() {
        let mut cb = breaker();
        for i in 0..4 {
            cb.record_failure_at(1000 + i, "sim");
            assert!(!cb.is_tripped_at(1000 + i));
        }
        cb.record_failure_at(1004, "sim");
        assert!(cb.is_tripped_at(1004));
    }

    #[test]
    fn test_old_failures_age_out() {
        let mut cb = breaker();
        for i in 0..4 {
            cb.record_failure_at(1000 + i, "sim");
        }
        // 5th failure lands after the first four left the 300s window
        cb.record_failure_at(1400, "sim");
        assert!(!cb.is_tripped_at(1400));
    }

    #[test]
    fn test_cooldown_then_self_reset() {
        let mut cb = breaker();
        for i in 0..5 {
            cb.record_failure_at(1000 + i, "sim");
        }
        assert!(cb.is_tripped_at(1004));
        assert!(cb.is_tripped_at(1004 + 599));
        assert_eq!(cb.cooldown_remaining_at(1104), 500);
        // cooldown elapsed: breaker resets and history is gone
        assert!(!cb.is_tripped_at(1004 + 600));
        assert_eq!(cb.status_at(1004 + 600).recent_failures, 0);
        cb.record_failure_at(1700, "sim");
        assert!(!cb.is_tripped_at(1700));
    }

    #[test]
    fn test_success_clears_history() {
        let mut cb = breaker();
        for i in 0..4 {
            cb.record_failure_at(1000 + i, "sim");
        }
        cb.record_success();
        cb.record_failure_at(1010, "sim");
        assert!(!cb.is_tripped_at(1010));
        assert_eq!(cb.status_at(1010).recent_failures, 1);
    }

    #[test]
    fn test_status_reporting() {
        let mut cb = breaker();
        assert_eq!(cb.status_at(0).state, BreakerState::Closed);
        for i in 0..5 {
            cb.record_failure_at(100 + i, "sub");
        }
        let status = cb.status_at(110);
        assert_eq!(status.state, BreakerState::Open);
        assert_eq!(status.cooldown_remaining_secs, 594);
    }
}
