//! Confidence-based escalation: downgrades an otherwise-allow decision
//! when the caller's self-reported confidence is low.

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationLevel {
    None,
    Notify,
    Review,
    Approval,
}

impl EscalationLevel {
    pub fn requires_human(self) -> bool {
        matches!(self, EscalationLevel::Review | EscalationLevel::Approval)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceThresholds {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self { high: 0.9, medium: 0.7, low: 0.5 }
    }
}

type LevelCallback = dyn Fn(EscalationLevel, f64) + Send + Sync;

pub struct ConfidenceEscalation {
    thresholds: ConfidenceThresholds,
    on_escalate: Option<Arc<LevelCallback>>,
}

impl ConfidenceEscalation {
    pub fn new(thresholds: ConfidenceThresholds) -> Self {
        Self { thresholds, on_escalate: None }
    }

    pub fn with_callback(thresholds: ConfidenceThresholds, callback: impl Fn(EscalationLevel, f64) + Send + Sync + 'static) -> Self {
        Self { thresholds, on_escalate: Some(Arc::new(callback)) }
    }

    pub fn classify(&self, confidence: f64) -> EscalationLevel {
        let level = if confidence >= self.thresholds.high {
            EscalationLevel::None
        } else if confidence >= self.thresholds.medium {
            EscalationLevel::Notify
        } else if confidence >= self.thresholds.low {
            EscalationLevel::Review
        } else {
            EscalationLevel::Approval
        };

        if level != EscalationLevel::None {
            if let Some(callback) = &self.on_escalate {
                callback(level, confidence);
            }
        }
        level
    }
}

impl Default for ConfidenceEscalation {
    fn default() -> Self {
        Self::new(ConfidenceThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_map_to_levels() {
        let escalation = ConfidenceEscalation::default();
        assert_eq!(escalation.classify(0.95), EscalationLevel::None);
        assert_eq!(escalation.classify(0.8), EscalationLevel::Notify);
        assert_eq!(escalation.classify(0.6), EscalationLevel::Review);
        assert_eq!(escalation.classify(0.4), EscalationLevel::Approval);
    }

    #[test]
    fn review_and_approval_require_human() {
        assert!(EscalationLevel::Review.requires_human());
        assert!(EscalationLevel::Approval.requires_human());
        assert!(!EscalationLevel::Notify.requires_human());
        assert!(!EscalationLevel::None.requires_human());
    }

    #[test]
    fn callback_fires_only_on_escalation() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let escalation = ConfidenceEscalation::with_callback(ConfidenceThresholds::default(), move |_level, _confidence| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        escalation.classify(0.99);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        escalation.classify(0.3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
