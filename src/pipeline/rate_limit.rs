// src/pipeline/rate_limit.rs

//! Rate limiter for upstream calls.
//!
//! Wraps an operation; when it fails with a rate-limit signal, further calls
//! are short-circuited to a fallback value until the wait period has elapsed.
//!
//! ```text
//! OPEN ──(rate-limit error)──▶ SUPPRESSED ──(clock - trigger >= wait)──▶ OPEN
//! ```
//!
//! The lock guards only the trigger timestamp. It is never held while the
//! wrapped operation runs.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::GatewayError;

/// Monotonic time source, measured from an arbitrary origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall-independent clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Clock type the search gateway is built with.
pub type SharedClock = Arc<dyn Clock>;

/// Errors that can tell whether they mean "back off".
pub trait RateLimitSignal {
    fn is_rate_limited(&self) -> bool;
}

impl RateLimitSignal for GatewayError {
    fn is_rate_limited(&self) -> bool {
        GatewayError::is_rate_limited(self)
    }
}

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Suppression window after a trigger. Default: 15 minutes
    pub wait_period: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            wait_period: Duration::from_secs(15 * 60),
        }
    }
}

/// Current limiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitState {
    /// Calls pass through
    Open,
    /// Calls return the fallback for `remaining` more time
    Suppressed { remaining: Duration },
}

/// Suppresses calls for a fixed window after a rate-limit signal.
#[derive(Debug)]
pub struct RateLimiter<C = MonotonicClock> {
    config: RateLimiterConfig,
    clock: C,
    last_trigger: Mutex<Option<Duration>>,
}

impl RateLimiter<MonotonicClock> {
    /// Create a limiter with default configuration.
    pub fn new() -> Self {
        Self::with_config(RateLimiterConfig::default())
    }

    pub fn with_config(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl Default for RateLimiter<MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a limiter reading time from `clock`.
    pub fn with_clock(config: RateLimiterConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            last_trigger: Mutex::new(None),
        }
    }

    pub fn wait_period(&self) -> Duration {
        self.config.wait_period
    }

    /// Check whether calls currently pass through.
    pub fn state(&self) -> RateLimitState {
        let last = self.last_trigger.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(triggered_at) = *last else {
            return RateLimitState::Open;
        };

        let elapsed = self.clock.now().saturating_sub(triggered_at);
        if elapsed >= self.config.wait_period {
            RateLimitState::Open
        } else {
            RateLimitState::Suppressed {
                remaining: self.config.wait_period - elapsed,
            }
        }
    }

    /// Start a suppression window now.
    pub fn trigger(&self) {
        let mut last = self.last_trigger.lock().unwrap_or_else(PoisonError::into_inner);
        *last = Some(self.clock.now());
    }

    /// Run `op` unless suppressed.
    ///
    /// A rate-limit error from `op` starts the suppression window and is
    /// replaced by `fallback()`. Any other error is returned unchanged.
    pub fn call<T, E>(
        &self,
        op: impl FnOnce() -> Result<T, E>,
        fallback: impl FnOnce() -> T,
    ) -> Result<T, E>
    where
        E: RateLimitSignal + std::fmt::Display,
    {
        if let RateLimitState::Suppressed { remaining } = self.state() {
            log::debug!(
                "Rate limit in progress, returning fallback for {}s",
                remaining.as_secs()
            );
            return Ok(fallback());
        }

        match op() {
            Err(e) if e.is_rate_limited() => {
                self.trigger();
                log::warn!(
                    "Rate limited upstream ({}); suppressing calls for {}s",
                    e,
                    self.config.wait_period.as_secs()
                );
                Ok(fallback())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Clone, Default)]
    struct ManualClock(Arc<AtomicU64>);

    impl ManualClock {
        fn set(&self, secs: u64) {
            self.0.store(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Duration {
            Duration::from_secs(self.0.load(Ordering::SeqCst))
        }
    }

    fn limiter(clock: &ManualClock) -> RateLimiter<ManualClock> {
        RateLimiter::with_clock(
            RateLimiterConfig {
                wait_period: Duration::from_secs(10),
            },
            clock.clone(),
        )
    }

    fn rate_limited() -> Result<Vec<u32>, GatewayError> {
        Err(GatewayError::upstream(429))
    }

    #[test]
    fn test_first_call_passes_regardless_of_clock() {
        let clock = ManualClock::default();
        let limiter = limiter(&clock);

        let result = limiter.call(|| Ok::<_, GatewayError>(vec![1]), Vec::new);
        assert_eq!(result.unwrap(), vec![1]);
        assert_eq!(limiter.state(), RateLimitState::Open);
    }

    #[test]
    fn test_trigger_suppresses_until_boundary() {
        let clock = ManualClock::default();
        clock.set(100);
        let limiter = limiter(&clock);
        let calls = Cell::new(0);

        let result = limiter.call(rate_limited, Vec::new);
        assert_eq!(result.unwrap(), Vec::<u32>::new());

        clock.set(109);
        let result = limiter.call(
            || {
                calls.set(calls.get() + 1);
                Ok::<_, GatewayError>(vec![1])
            },
            Vec::new,
        );
        assert!(result.unwrap().is_empty());
        assert_eq!(calls.get(), 0);
        assert_eq!(
            limiter.state(),
            RateLimitState::Suppressed {
                remaining: Duration::from_secs(1)
            }
        );

        clock.set(110);
        let result = limiter.call(
            || {
                calls.set(calls.get() + 1);
                Ok::<_, GatewayError>(vec![2])
            },
            Vec::new,
        );
        assert_eq!(result.unwrap(), vec![2]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_other_errors_propagate() {
        let clock = ManualClock::default();
        let limiter = limiter(&clock);

        let result: Result<Vec<u32>, _> =
            limiter.call(|| Err(GatewayError::upstream(500)), Vec::new);
        assert!(matches!(result, Err(GatewayError::Upstream { status: 500, .. })));
        assert_eq!(limiter.state(), RateLimitState::Open);
    }

    #[test]
    fn test_retrigger_extends_window() {
        let clock = ManualClock::default();
        let limiter = limiter(&clock);

        let _ = limiter.call(rate_limited, Vec::new);
        clock.set(10);
        let _ = limiter.call(rate_limited, Vec::new);
        clock.set(15);
        assert!(matches!(limiter.state(), RateLimitState::Suppressed { .. }));
        clock.set(20);
        assert_eq!(limiter.state(), RateLimitState::Open);
    }

    #[test]
    fn test_shared_across_threads() {
        let clock = ManualClock::default();
        let limiter = Arc::new(limiter(&clock));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    let _ = limiter.call(rate_limited, Vec::new);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(matches!(limiter.state(), RateLimitState::Suppressed { .. }));
    }

    #[test]
    fn test_default_wait_period() {
        assert_eq!(RateLimiter::new().wait_period(), Duration::from_secs(900));
    }
}
