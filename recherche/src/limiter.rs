//! Per-partner fixed-window rate limiting.
//!
//! Counters live in process memory and reset lazily at the next check, not
//! via a timer. This is soft state by design: a multi-worker deployment
//! swaps the map for a shared key-value store; everything else stays.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;

use recherche_core::{RateLimits, RechercheError};

/// The three fixed windows, with their durations in seconds.
const WINDOWS: [(&str, i64); 3] = [("minute", 60), ("hour", 3600), ("day", 86_400)];

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u32,
    window_start: i64,
}

/// Snapshot of one window after a successful check; the HTTP layer renders
/// these as `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStatus {
    /// Window name ("minute", "hour", "day").
    pub window: &'static str,
    /// Configured limit for the window.
    pub limit: u32,
    /// Calls left in the current window.
    pub remaining: u32,
    /// Epoch second at which the window resets.
    pub reset_epoch: i64,
}

/// Fixed-window limiter keyed by `(partner_id, window)`.
#[derive(Default)]
pub struct RateLimiter {
    counters: Mutex<HashMap<(String, &'static str), Counter>>,
}

impl RateLimiter {
    /// Empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every configured window and, if all allow the call, count it
    /// against each of them. A limit of 0 means unlimited for that window.
    ///
    /// The whole check-and-increment runs under one lock, so two
    /// concurrent calls can never both pass on the last remaining slot,
    /// and a rejected call increments nothing.
    ///
    /// # Errors
    /// `RateLimited` for the first exhausted window, carrying a positive
    /// `retry_after_seconds`.
    pub fn check_and_increment(
        &self,
        partner_id: &str,
        limits: &RateLimits,
    ) -> Result<Vec<WindowStatus>, RechercheError> {
        self.check_at(partner_id, limits, Utc::now().timestamp())
    }

    /// Same as [`check_and_increment`](Self::check_and_increment) with an
    /// explicit clock, so tests never sleep.
    ///
    /// # Errors
    /// `RateLimited` for the first exhausted window.
    pub fn check_at(
        &self,
        partner_id: &str,
        limits: &RateLimits,
        now: i64,
    ) -> Result<Vec<WindowStatus>, RechercheError> {
        let mut counters = self.counters.lock();

        // Phase 1: lazily reset expired windows, reject on the first
        // exhausted one. Nothing is incremented yet, so a rejected call
        // leaves every counter untouched.
        for (window, duration) in WINDOWS {
            let limit = limit_for(limits, window);
            if limit == 0 {
                continue;
            }
            let key = (partner_id.to_string(), window);
            if let Some(counter) = counters.get_mut(&key) {
                if now - counter.window_start >= duration {
                    counter.count = 0;
                    counter.window_start = now;
                } else if counter.count >= limit {
                    let reset_epoch = counter.window_start + duration;
                    let retry_after_seconds = (reset_epoch - now).max(1).unsigned_abs();
                    tracing::warn!(
                        partner_id,
                        window,
                        limit,
                        retry_after_seconds,
                        "rate limit exceeded"
                    );
                    return Err(RechercheError::RateLimited {
                        limit,
                        window,
                        retry_after_seconds,
                        reset_epoch,
                    });
                }
            }
        }

        // Phase 2: count the call against every configured window.
        let mut statuses = Vec::new();
        for (window, duration) in WINDOWS {
            let limit = limit_for(limits, window);
            if limit == 0 {
                continue;
            }
            let counter = counters
                .entry((partner_id.to_string(), window))
                .or_insert(Counter {
                    count: 0,
                    window_start: now,
                });
            counter.count += 1;
            statuses.push(WindowStatus {
                window,
                limit,
                remaining: limit - counter.count,
                reset_epoch: counter.window_start + duration,
            });
        }
        Ok(statuses)
    }
}

fn limit_for(limits: &RateLimits, window: &str) -> u32 {
    match window {
        "minute" => limits.per_minute,
        "hour" => limits.per_hour,
        _ => limits.per_day,
    }
}
