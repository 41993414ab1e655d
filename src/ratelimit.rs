//! Sliding-window RPC rate limiter.
//!
//! Bounds how many RPC calls may start inside a rolling window; callers
//! await `acquire` before each call and are delayed until the oldest
//! in-window call ages out. The window math is a pure function over
//! explicit instants (like the circuit breaker's explicit timestamps)
//! so it is testable without sleeping.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    pub fn per_second(max_calls: u32) -> Self {
        Self::new(max_calls as usize, Duration::from_secs(1))
    }

    /// Wait until a call slot is free, then claim it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                match reserve_at(&mut calls, Instant::now(), self.max_calls, self.window) {
                    None => return,
                    Some(delay) => delay,
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}

/// Prune expired calls, then either claim a slot (None) or report how
/// long until the oldest in-window call expires.
fn reserve_at(
    calls: &mut VecDeque<Instant>,
    now: Instant,
    max_calls: usize,
    window: Duration,
) -> Option<Duration> {
    while calls
        .front()
        .map_or(false, |&t| now.duration_since(t) >= window)
    {
        calls.pop_front();
    }
    if calls.len() < max_calls {
        calls.push_back(now);
        return None;
    }
    let oldest = *calls.front()?;
    Some(window - now.duration_since(oldest))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(1);

    #[test]
    fn test_under_the_limit_is_immediate() {
        let mut calls = VecDeque::new();
        let base = Instant::now();
        for _ in 0..3 {
            assert!(reserve_at(&mut calls, base, 3, WINDOW).is_none());
        }
        // fourth call in the same instant must wait a full window
        assert_eq!(reserve_at(&mut calls, base, 3, WINDOW), Some(WINDOW));
    }

    #[test]
    fn test_delay_shrinks_as_the_window_slides() {
        let mut calls = VecDeque::new();
        let base = Instant::now();
        assert!(reserve_at(&mut calls, base, 1, WINDOW).is_none());
        let delay = reserve_at(&mut calls, base + Duration::from_millis(300), 1, WINDOW);
        assert_eq!(delay, Some(Duration::from_millis(700)));
    }

    #[test]
    fn test_expired_calls_free_their_slots() {
        let mut calls = VecDeque::new();
        let base = Instant::now();
        for _ in 0..2 {
            assert!(reserve_at(&mut calls, base, 2, WINDOW).is_none());
        }
        assert!(reserve_at(&mut calls, base, 2, WINDOW).is_some());
        // a full window later both slots are free again
        assert!(reserve_at(&mut calls, base + WINDOW, 2, WINDOW).is_none());
        assert_eq!(calls.len(), 1);
    }

    #[tokio::test]
    async fn test_acquire_allows_burst_up_to_limit() {
        let limiter = RateLimiter::per_second(5);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // a burst within the limit never sleeps
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
