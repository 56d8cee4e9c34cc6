//! Per-(agent, tool) token bucket rate limiter.

use std::time::Instant;

use dashmap::DashMap;

/// A token bucket keyed by `(agent_id, tool_name)`. Refill happens
/// lazily on each check rather than via a background task.
pub struct RateLimiter {
    max_per_minute: f64,
    burst_size: f64,
    buckets: DashMap<(String, String), Bucket>,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(max_per_minute: f64, burst_size: f64) -> Self {
        Self {
            max_per_minute,
            burst_size,
            buckets: DashMap::new(),
        }
    }

    fn refill_rate_per_sec(&self) -> f64 {
        self.max_per_minute / 60.0
    }

    /// Refill the bucket for `(agent, tool)`, then consume one token if
    /// available. Returns `true` and decrements by one token on
    /// success; returns `false` without decrementing when empty.
    pub fn check_limit(&self, agent: &str, tool: &str) -> bool {
        let key = (agent.to_string(), tool.to_string());
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry(key)
            .or_insert_with(|| Bucket { tokens: self.burst_size, last_refill: now });

        self.refill(&mut bucket, now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        let refilled = elapsed * self.refill_rate_per_sec();
        if refilled > 0.0 {
            bucket.tokens = (bucket.tokens + refilled).min(self.burst_size);
            bucket.last_refill = now;
        }
    }

    /// Current token count for `(agent, tool)`, floored, without
    /// consuming a token. Does not create a bucket as a side effect if
    /// one does not already exist — returns full burst capacity in
    /// that case, matching an unthrottled key's true state.
    pub fn get_remaining(&self, agent: &str, tool: &str) -> u64 {
        let key = (agent.to_string(), tool.to_string());
        match self.buckets.get_mut(&key) {
            Some(mut bucket) => {
                self.refill(&mut bucket, Instant::now());
                bucket.tokens.floor() as u64
            }
            None => self.burst_size.floor() as u64,
        }
    }

    pub fn reset(&self, agent: &str, tool: &str) {
        self.buckets.remove(&(agent.to_string(), tool.to_string()));
    }
}
