//! Per-agent rolling-window action counter.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Quota configuration for one agent (or the manager's default).
#[derive(Debug, Clone, Copy)]
pub struct QuotaConfig {
    pub max_actions: usize,
    pub window: Duration,
}

impl QuotaConfig {
    pub fn new(max_actions: usize, window_hours: f64) -> Self {
        Self {
            max_actions,
            window: Duration::from_secs_f64(window_hours * 3600.0),
        }
    }
}

/// Tracks a rolling window of consumption timestamps per agent.
/// Memory is bounded by `max_actions` per active agent since entries
/// older than the window are pruned on every `consume` call.
pub struct QuotaManager {
    default_config: QuotaConfig,
    overrides: DashMap<String, QuotaConfig>,
    windows: DashMap<String, Vec<Instant>>,
}

impl QuotaManager {
    pub fn new(default_config: QuotaConfig) -> Self {
        Self {
            default_config,
            overrides: DashMap::new(),
            windows: DashMap::new(),
        }
    }

    pub fn set_quota(&self, agent: impl Into<String>, config: QuotaConfig) {
        self.overrides.insert(agent.into(), config);
    }

    fn config_for(&self, agent: &str) -> QuotaConfig {
        self.overrides.get(agent).map(|c| *c).unwrap_or(self.default_config)
    }

    /// Prune timestamps outside the window, then record and allow this
    /// action if under the limit; otherwise deny without recording.
    pub fn consume(&self, agent: &str) -> bool {
        let config = self.config_for(agent);
        let now = Instant::now();
        let mut entry = self.windows.entry(agent.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < config.window);

        if entry.len() < config.max_actions {
            entry.push(now);
            true
        } else {
            false
        }
    }

    pub fn remaining(&self, agent: &str) -> usize {
        let config = self.config_for(agent);
        let now = Instant::now();
        match self.windows.get(agent) {
            Some(entry) => {
                let used = entry.iter().filter(|t| now.duration_since(**t) < config.window).count();
                config.max_actions.saturating_sub(used)
            }
            None => config.max_actions,
        }
    }

    pub fn reset(&self, agent: &str) {
        self.windows.remove(agent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_then_denies() {
        let manager = QuotaManager::new(QuotaConfig::new(2, 1.0));
        assert!(manager.consume("a"));
        assert!(manager.consume("a"));
        assert!(!manager.consume("a"));
    }

    #[test]
    fn per_agent_override_applies() {
        let manager = QuotaManager::new(QuotaConfig::new(1, 1.0));
        manager.set_quota("vip", QuotaConfig::new(5, 1.0));

        assert!(manager.consume("plain"));
        assert!(!manager.consume("plain"));

        for _ in 0..5 {
            assert!(manager.consume("vip"));
        }
        assert!(!manager.consume("vip"));
    }

    #[test]
    fn agents_are_independent() {
        let manager = QuotaManager::new(QuotaConfig::new(1, 1.0));
        assert!(manager.consume("a"));
        assert!(manager.consume("b"));
    }

    #[test]
    fn reset_clears_window() {
        let manager = QuotaManager::new(QuotaConfig::new(1, 1.0));
        assert!(manager.consume("a"));
        assert!(!manager.consume("a"));
        manager.reset("a");
        assert!(manager.consume("a"));
    }
}
