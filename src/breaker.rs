//! Per-tool circuit breaker state machine.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Breaker {
    state: State,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

impl Breaker {
    fn new() -> Self {
        Self {
            state: State::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
        }
    }
}

/// Tracks one state machine per tool name. Transitions are atomic under
/// a per-key lock (`DashMap` shards plus a `Mutex` per entry).
pub struct CircuitBreaker {
    failure_threshold: u32,
    success_threshold: u32,
    timeout: Duration,
    breakers: DashMap<String, Mutex<Breaker>>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, success_threshold: u32, timeout: Duration) -> Self {
        Self {
            failure_threshold,
            success_threshold,
            timeout,
            breakers: DashMap::new(),
        }
    }

    fn entry(&self, tool: &str) -> dashmap::mapref::one::RefMut<'_, String, Mutex<Breaker>> {
        self.breakers
            .entry(tool.to_string())
            .or_insert_with(|| Mutex::new(Breaker::new()))
    }

    /// Whether the breaker currently blocks calls to `tool`.
    ///
    /// If OPEN and the timeout has elapsed, this call itself performs
    /// the OPEN → HALF_OPEN transition and returns `false`, admitting
    /// exactly one probe.
    pub fn is_open(&self, tool: &str) -> bool {
        let entry = self.entry(tool);
        let mut breaker = entry.lock();
        match breaker.state {
            State::Closed | State::HalfOpen => false,
            State::Open => {
                let elapsed = breaker.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.timeout {
                    info!(tool, "circuit breaker cooldown elapsed, admitting probe");
                    breaker.state = State::HalfOpen;
                    breaker.success_count = 0;
                    false
                } else {
                    true
                }
            }
        }
    }

    pub fn record_failure(&self, tool: &str) {
        let entry = self.entry(tool);
        let mut breaker = entry.lock();
        match breaker.state {
            State::Closed => {
                breaker.failure_count += 1;
                if breaker.failure_count >= self.failure_threshold {
                    warn!(tool, "circuit breaker opening after failure threshold");
                    breaker.state = State::Open;
                    breaker.opened_at = Some(Instant::now());
                }
            }
            State::HalfOpen => {
                warn!(tool, "probe failed, circuit breaker re-opening");
                breaker.state = State::Open;
                breaker.opened_at = Some(Instant::now());
                breaker.failure_count = self.failure_threshold;
            }
            State::Open => {}
        }
    }

    pub fn record_success(&self, tool: &str) {
        let entry = self.entry(tool);
        let mut breaker = entry.lock();
        match breaker.state {
            State::Closed => {
                breaker.failure_count = 0;
            }
            State::HalfOpen => {
                breaker.success_count += 1;
                if breaker.success_count >= self.success_threshold {
                    info!(tool, "circuit breaker closing after success threshold");
                    breaker.state = State::Closed;
                    breaker.failure_count = 0;
                    breaker.success_count = 0;
                    breaker.opened_at = None;
                }
            }
            State::Open => {}
        }
    }

    pub fn reset(&self, tool: &str) {
        self.breakers.remove(tool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(2, 1, Duration::from_secs(60));
        assert!(!breaker.is_open("t"));
        breaker.record_failure("t");
        assert!(!breaker.is_open("t"));
        breaker.record_failure("t");
        assert!(breaker.is_open("t"));
    }

    #[test]
    fn full_cycle_closed_open_half_open_closed() {
        let breaker = CircuitBreaker::new(2, 1, Duration::from_millis(50));
        breaker.record_failure("t");
        breaker.record_failure("t");
        assert!(breaker.is_open("t"));

        sleep(Duration::from_millis(60));
        assert!(!breaker.is_open("t"), "cooldown elapsed, probe admitted");

        breaker.record_success("t");
        assert!(!breaker.is_open("t"));

        // Closed state should now tolerate a single failure without opening.
        breaker.record_failure("t");
        assert!(!breaker.is_open("t"));
    }

    #[test]
    fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(1, 2, Duration::from_millis(20));
        breaker.record_failure("t");
        assert!(breaker.is_open("t"));

        sleep(Duration::from_millis(30));
        assert!(!breaker.is_open("t"));

        breaker.record_failure("t");
        assert!(breaker.is_open("t"));
    }

    #[test]
    fn reset_clears_state() {
        let breaker = CircuitBreaker::new(1, 1, Duration::from_secs(60));
        breaker.record_failure("t");
        assert!(breaker.is_open("t"));
        breaker.reset("t");
        assert!(!breaker.is_open("t"));
    }

    #[test]
    fn tools_are_independent() {
        let breaker = CircuitBreaker::new(1, 1, Duration::from_secs(60));
        breaker.record_failure("a");
        assert!(breaker.is_open("a"));
        assert!(!breaker.is_open("b"));
    }
}
