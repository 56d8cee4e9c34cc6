//! Policy kinds: pure functions from a request to a decision.
//!
//! A policy is evaluated once per request and holds no per-request state.
//! Built-ins are `RuleBased`, `Temporal`, `Delegating`, `AllowAll`, and
//! `DenyAll`; any other type implementing [`Policy`] counts as `Custom`.

mod delegating;
mod rule_based;
mod temporal;

pub use delegating::DelegatingPolicy;
pub use rule_based::RuleBasedPolicy;
pub use temporal::TemporalPolicy;

use async_trait::async_trait;

use crate::types::GovernanceDecision;
use crate::types::GovernanceRequest;

/// Capability implemented by every policy kind, built-in or custom.
#[async_trait]
pub trait Policy: Send + Sync + 'static {
    async fn evaluate(&self, request: &GovernanceRequest) -> GovernanceDecision;

    /// A short tag used in logging and diagnostics; built-ins override
    /// this with their kind name.
    fn kind(&self) -> &'static str {
        "custom"
    }

    /// Downcasting support used by the registry to detect `RuleBased`
    /// group policies for concatenation.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// A policy that allows every request.
pub struct AllowAllPolicy;

#[async_trait]
impl Policy for AllowAllPolicy {
    async fn evaluate(&self, _request: &GovernanceRequest) -> GovernanceDecision {
        GovernanceDecision::allow("allow-all policy")
    }

    fn kind(&self) -> &'static str {
        "allow_all"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A policy that denies every request.
pub struct DenyAllPolicy;

#[async_trait]
impl Policy for DenyAllPolicy {
    async fn evaluate(&self, _request: &GovernanceRequest) -> GovernanceDecision {
        GovernanceDecision::deny("deny-all policy")
    }

    fn kind(&self) -> &'static str {
        "deny_all"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
