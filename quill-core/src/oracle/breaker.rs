//! Circuit breaker state owned by one oracle client
//!
//! Each client carries its own breaker, so concurrent pipelines only share
//! breaker state when they share the client.

use std::time::Duration;

use tokio::time::Instant;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow normally
    Closed,
    /// Calls are rejected until the cooldown elapses
    Open,
    /// One trial call is allowed through per cooldown
    HalfOpen,
}

/// Consecutive-failure circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_count: u32,
    last_failure_at: Option<Instant>,
    trial_started_at: Option<Instant>,
    state: BreakerState,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_count: 0,
            last_failure_at: None,
            trial_started_at: None,
            state: BreakerState::Closed,
            threshold: threshold.max(1),
            cooldown,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Gate a call about to be made at `now`
    pub fn check(&mut self, now: Instant) -> Result<()> {
        match self.state {
            BreakerState::Closed => Ok(()),
            // A trial call dropped before reporting back expires after one cooldown
            BreakerState::HalfOpen => {
                if self.cooled(self.trial_started_at, now) {
                    self.trial_started_at = Some(now);
                    Ok(())
                } else {
                    Err(Error::TransientUpstream(
                        "circuit half-open, trial call in flight".to_string(),
                    ))
                }
            }
            BreakerState::Open => {
                if self.cooled(self.last_failure_at, now) {
                    self.state = BreakerState::HalfOpen;
                    self.trial_started_at = Some(now);
                    Ok(())
                } else {
                    Err(Error::TransientUpstream("circuit open".to_string()))
                }
            }
        }
    }

    fn cooled(&self, since: Option<Instant>, now: Instant) -> bool {
        since
            .map(|at| now.duration_since(at) >= self.cooldown)
            .unwrap_or(true)
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.last_failure_at = None;
        self.trial_started_at = None;
        self.state = BreakerState::Closed;
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.failure_count += 1;
        self.last_failure_at = Some(now);
        if self.state == BreakerState::HalfOpen || self.failure_count >= self.threshold {
            self.state = BreakerState::Open;
            self.trial_started_at = None;
        }
    }

    /// A non-transient answer proves the upstream is reachable
    pub fn record_reachable(&mut self) {
        if self.state == BreakerState::HalfOpen {
            self.state = BreakerState::Closed;
            self.trial_started_at = None;
        }
        self.failure_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_threshold() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        breaker.record_failure(now);
        breaker.record_failure(now);
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.check(now).is_ok());

        breaker.record_failure(now);
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.check(now + Duration::from_secs(10)).is_err());
    }

    #[test]
    fn test_half_open_trial_closes_on_success() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        breaker.record_failure(now);

        let later = now + Duration::from_secs(61);
        assert!(breaker.check(later).is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        // only one trial call
        assert!(breaker.check(later).is_err());

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_half_open_trial_failure_reopens() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(5, Duration::from_secs(60));
        for _ in 0..5 {
            breaker.record_failure(now);
        }

        let later = now + Duration::from_secs(60);
        assert!(breaker.check(later).is_ok());
        breaker.record_failure(later);
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.check(later + Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_abandoned_trial_call_expires_after_cooldown() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        breaker.record_failure(now);

        let trial_at = now + Duration::from_secs(60);
        assert!(breaker.check(trial_at).is_ok());
        // the trial call is dropped and never records an outcome
        assert!(breaker.check(trial_at + Duration::from_secs(59)).is_err());

        let retry_at = trial_at + Duration::from_secs(60);
        assert!(breaker.check(retry_at).is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(breaker.check(retry_at).is_err());

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_success_resets_count() {
        let now = Instant::now();
        let mut breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        breaker.record_failure(now);
        breaker.record_success();
        breaker.record_failure(now);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
