//! Governance Engine: composes the registry, safety primitives, and
//! oversight side-channels into the single `evaluate` entry point.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::instrument;

use crate::audit::AuditFanout;
use crate::breaker::CircuitBreaker;
use crate::limiter::RateLimiter;
use crate::oversight::{ApprovalWorkflow, ConfidenceEscalation, EscalationLevel, KillSwitch, RiskLevel};
use crate::quota::QuotaManager;
use crate::registry::ToolRegistry;
use crate::types::{AuditRecord, DecisionSource, GovernanceDecision, GovernanceRequest, Value};
use crate::validators::{run_validators, Validator};

/// Tunables that do not already live inside one of the composed
/// subsystems (those are configured by constructing them directly and
/// passing them to [`DefaultGovernanceEngine::new`]).
pub struct GovernanceEngineConfig {
    pub high_risk_tools: Vec<String>,
    pub high_risk_functions: Vec<regex::Regex>,
}

impl Default for GovernanceEngineConfig {
    fn default() -> Self {
        Self { high_risk_tools: Vec::new(), high_risk_functions: Vec::new() }
    }
}

#[async_trait]
pub trait GovernanceEngine: Send + Sync {
    async fn evaluate(&self, request: GovernanceRequest) -> GovernanceDecision;

    /// Report a tool invocation's outcome back to the breaker. Callers
    /// MUST call this after executing a tool the engine allowed.
    fn record_outcome(&self, tool: &str, ok: bool);
}

/// The reference implementation: one instance per governance domain,
/// sharing its registry and safety primitives across every `evaluate`
/// call. Re-entrant and safe under concurrent invocation.
pub struct DefaultGovernanceEngine {
    registry: Arc<ToolRegistry>,
    rate_limiter: RateLimiter,
    quota: QuotaManager,
    breaker: CircuitBreaker,
    validators: Vec<Box<dyn Validator>>,
    kill_switch: KillSwitch,
    approval: ApprovalWorkflow,
    confidence: ConfidenceEscalation,
    audit: AuditFanout,
}

impl DefaultGovernanceEngine {
    pub fn new(
        registry: Arc<ToolRegistry>,
        rate_limiter: RateLimiter,
        quota: QuotaManager,
        breaker: CircuitBreaker,
        validators: Vec<Box<dyn Validator>>,
        kill_switch: KillSwitch,
        confidence: ConfidenceEscalation,
        audit: AuditFanout,
        config: GovernanceEngineConfig,
    ) -> Self {
        Self {
            registry,
            rate_limiter,
            quota,
            breaker,
            validators,
            kill_switch,
            approval: ApprovalWorkflow::new(config.high_risk_tools, config.high_risk_functions),
            confidence,
            audit,
        }
    }

    async fn audit_and_return(&self, request: &GovernanceRequest, decision: GovernanceDecision, started: Instant, source: DecisionSource) -> GovernanceDecision {
        let duration_ms = started.elapsed().as_millis() as u64;
        let record = AuditRecord {
            timestamp: chrono::Utc::now(),
            agent_id: request.agent_id.clone(),
            tool: request.tool_name.clone(),
            function: request.function_name.clone(),
            arguments: request.arguments.clone(),
            allow: decision.allow,
            reason: decision.reason.clone(),
            duration_ms,
            correlation_id: request.correlation_id,
            decision_source: source,
        };
        self.audit.log_all(&record).await;
        decision
    }
}

#[async_trait]
impl GovernanceEngine for DefaultGovernanceEngine {
    #[instrument(skip(self, request), fields(agent = %request.agent_id, tool = %request.tool_name, function = %request.function_name))]
    async fn evaluate(&self, request: GovernanceRequest) -> GovernanceDecision {
        let started = Instant::now();

        if let Some(reason) = self.kill_switch.denial_reason() {
            let decision = GovernanceDecision::deny(reason);
            return self.audit_and_return(&request, decision, started, DecisionSource::KillSwitch).await;
        }

        if let Err(err) = run_validators(&self.validators, &request).await {
            let reason = match &err {
                crate::error::GovernanceError::ValidationFailed { reason, .. } => format!("validation: {reason}"),
                other => format!("internal: {}", other.kind()),
            };
            let decision = GovernanceDecision::deny(reason);
            return self.audit_and_return(&request, decision, started, DecisionSource::Validator).await;
        }

        if self.registry.is_expired(&request.tool_name) {
            let decision = GovernanceDecision::deny("tool expired");
            return self.audit_and_return(&request, decision, started, DecisionSource::Internal).await;
        }

        if !self.rate_limiter.check_limit(&request.agent_id, &request.tool_name) {
            let decision = GovernanceDecision::deny("rate limit exceeded");
            return self.audit_and_return(&request, decision, started, DecisionSource::RateLimit).await;
        }

        // Quota is consumed unconditionally once a request clears rate
        // limiting, regardless of the eventual policy outcome — it
        // protects the decision cost itself, not just allowed calls.
        if !self.quota.consume(&request.agent_id) {
            let decision = GovernanceDecision::deny("quota exceeded");
            return self.audit_and_return(&request, decision, started, DecisionSource::Quota).await;
        }

        if self.breaker.is_open(&request.tool_name) {
            let decision = GovernanceDecision::deny("circuit open");
            return self.audit_and_return(&request, decision, started, DecisionSource::CircuitBreaker).await;
        }

        let policy = self.registry.get_policy_for_tool(&request.tool_name, &request.agent_id);
        let mut decision = match policy {
            Some(policy) => policy.evaluate(&request).await,
            None => GovernanceDecision::deny("no policy resolved for tool"),
        };

        if decision.allow && self.approval.requires_approval(&request.tool_name, &request.function_name) {
            let ticket = self.approval.request_approval(
                request.agent_id.clone(),
                request.tool_name.clone(),
                request.function_name.clone(),
                request.arguments.clone(),
                request.justification().map(str::to_string),
                RiskLevel::High,
            );
            let escalated = GovernanceDecision::deny("awaiting approval")
                .with_metadata("approval_id", Value::String(ticket.id.to_string()));
            return self.audit_and_return(&request, escalated, started, DecisionSource::Approval).await;
        }

        if decision.allow {
            if let Some(confidence) = request.confidence() {
                let level = self.confidence.classify(confidence);
                if level.requires_human() {
                    let risk = if level == EscalationLevel::Approval { RiskLevel::High } else { RiskLevel::Medium };
                    let ticket = self.approval.request_approval(
                        request.agent_id.clone(),
                        request.tool_name.clone(),
                        request.function_name.clone(),
                        request.arguments.clone(),
                        request.justification().map(str::to_string),
                        risk,
                    );
                    decision = GovernanceDecision::deny("awaiting approval")
                        .with_metadata("approval_id", Value::String(ticket.id.to_string()))
                        .with_metadata("escalation", Value::String(format!("{level:?}")));
                    return self.audit_and_return(&request, decision, started, DecisionSource::ConfidenceEscalation).await;
                }
            }
        }

        self.audit_and_return(&request, decision, started, DecisionSource::Policy).await
    }

    fn record_outcome(&self, tool: &str, ok: bool) {
        if ok {
            self.breaker.record_success(tool);
        } else {
            self.breaker.record_failure(tool);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AllowAllPolicy, DenyAllPolicy, RuleBasedPolicy};
    use crate::types::{RuleActionKind, ValueMap};
    use std::collections::HashSet;
    use std::sync::Arc as StdArc;

    fn build_engine(registry: ToolRegistry) -> DefaultGovernanceEngine {
        DefaultGovernanceEngine::new(
            StdArc::new(registry),
            RateLimiter::new(6000.0, 1000.0),
            QuotaManager::new(crate::quota::QuotaConfig::new(1000, 1.0)),
            CircuitBreaker::new(3, 1, std::time::Duration::from_secs(30)),
            Vec::new(),
            KillSwitch::new(),
            ConfidenceEscalation::default(),
            AuditFanout::new(),
            GovernanceEngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn kill_switch_dominates_everything() {
        let registry = ToolRegistry::new();
        registry
            .register_tool("db", StdArc::new(()), Some(StdArc::new(AllowAllPolicy)), HashSet::new(), HashSet::new(), None)
            .unwrap();
        let engine = build_engine(registry);
        engine.kill_switch.activate("ops", "drill");

        let decision = engine.evaluate(GovernanceRequest::new("a1", "db", "select")).await;
        assert!(!decision.allow);
        assert!(decision.reason.starts_with("kill-switch active:"));
    }

    #[tokio::test]
    async fn s1_default_deny_policy() {
        let registry = ToolRegistry::new();
        let rule = RuleBasedPolicy::build_rule("database", "select_.*", None, RuleActionKind::Allow, "Read-only", None).unwrap();
        let policy = RuleBasedPolicy::new(vec![rule], false);
        registry
            .register_tool("database", StdArc::new(()), Some(StdArc::new(policy)), HashSet::new(), HashSet::new(), None)
            .unwrap();
        let engine = build_engine(registry);

        let allowed = engine.evaluate(GovernanceRequest::new("a1", "database", "select_users")).await;
        assert!(allowed.allow);
        assert_eq!(allowed.reason, "Read-only");

        let denied = engine.evaluate(GovernanceRequest::new("a1", "database", "drop_table")).await;
        assert!(!denied.allow);
        assert_eq!(denied.reason, "no rule matched");
    }

    #[tokio::test]
    async fn s6_policy_precedence_tool_wins() {
        let registry = ToolRegistry::new();
        registry.create_group("ops", Some(StdArc::new(AllowAllPolicy))).unwrap();
        registry.add_agent_to_group("alice", "ops").unwrap();
        registry.set_agent_policy("alice", StdArc::new(AllowAllPolicy));
        registry
            .register_tool("db", StdArc::new(()), Some(StdArc::new(DenyAllPolicy)), HashSet::new(), HashSet::new(), None)
            .unwrap();
        let engine = build_engine(registry);

        let decision = engine.evaluate(GovernanceRequest::new("alice", "db", "anything")).await;
        assert!(!decision.allow);
    }

    #[tokio::test]
    async fn expired_tool_is_denied_with_standard_reason() {
        let registry = ToolRegistry::new();
        let expired = std::time::SystemTime::now() - std::time::Duration::from_secs(60);
        registry
            .register_tool("db", StdArc::new(()), Some(StdArc::new(AllowAllPolicy)), HashSet::new(), HashSet::new(), Some(expired))
            .unwrap();
        let engine = build_engine(registry);

        let decision = engine.evaluate(GovernanceRequest::new("a1", "db", "select")).await;
        assert!(!decision.allow);
        assert_eq!(decision.reason, "tool expired");
    }

    #[tokio::test]
    async fn rate_limit_denies_after_burst() {
        let registry = ToolRegistry::new();
        registry
            .register_tool("db", StdArc::new(()), Some(StdArc::new(AllowAllPolicy)), HashSet::new(), HashSet::new(), None)
            .unwrap();
        let engine = DefaultGovernanceEngine::new(
            StdArc::new(registry),
            RateLimiter::new(60.0, 1.0),
            QuotaManager::new(crate::quota::QuotaConfig::new(1000, 1.0)),
            CircuitBreaker::new(3, 1, std::time::Duration::from_secs(30)),
            Vec::new(),
            KillSwitch::new(),
            ConfidenceEscalation::default(),
            AuditFanout::new(),
            GovernanceEngineConfig::default(),
        );

        let first = engine.evaluate(GovernanceRequest::new("a1", "db", "select")).await;
        assert!(first.allow);
        let second = engine.evaluate(GovernanceRequest::new("a1", "db", "select")).await;
        assert!(!second.allow);
        assert_eq!(second.reason, "rate limit exceeded");
    }

    #[tokio::test]
    async fn s5_low_confidence_escalates_to_approval() {
        let registry = ToolRegistry::new();
        registry
            .register_tool("db", StdArc::new(()), Some(StdArc::new(AllowAllPolicy)), HashSet::new(), HashSet::new(), None)
            .unwrap();
        let engine = build_engine(registry);

        let mut context = ValueMap::new();
        context.insert("confidence".to_string(), Value::Number(0.4));
        let request = GovernanceRequest::new("a1", "db", "select").with_context(context);

        let decision = engine.evaluate(request).await;
        assert!(!decision.allow);
        assert_eq!(decision.reason, "awaiting approval");
        assert!(decision.metadata.contains_key("approval_id"));
    }

    #[tokio::test]
    async fn record_outcome_feeds_the_breaker() {
        let registry = ToolRegistry::new();
        let engine = build_engine(registry);
        engine.record_outcome("db", false);
        engine.record_outcome("db", false);
        engine.record_outcome("db", false);
        assert!(engine.breaker.is_open("db"));
    }
}
