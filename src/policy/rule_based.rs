//! First-match rule-list policy.

use async_trait::async_trait;
use regex::Regex;
use tracing::trace;

use crate::error::PolicyError;
use crate::types::{GovernanceDecision, GovernanceRequest, Rule, RuleActionKind};

use super::Policy;

/// Scan `rules` in order; the first rule whose three regexes all match
/// the request wins. If none matches, fall back to `default_allow`.
#[derive(Debug)]
pub struct RuleBasedPolicy {
    rules: Vec<Rule>,
    default_allow: bool,
}

impl RuleBasedPolicy {
    pub fn new(rules: Vec<Rule>, default_allow: bool) -> Self {
        Self { rules, default_allow }
    }

    /// Compile a regex pattern, accepting the bare `"*"` shorthand for
    /// `".*"`, and anchoring it to the full value.
    pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
        let pattern = if pattern == "*" { ".*" } else { pattern };
        Regex::new(&format!("^(?:{pattern})$"))
    }

    /// Build a single rule from its string fields, compiling and
    /// anchoring each regex. `agent_id` defaults to `".*"` when absent.
    pub fn build_rule(
        tool: &str,
        function: &str,
        agent_id: Option<&str>,
        action: RuleActionKind,
        reason: impl Into<String>,
        id: Option<String>,
    ) -> Result<Rule, PolicyError> {
        let agent_id = agent_id.unwrap_or("*");
        let compile = |p: &str| {
            Self::compile_pattern(p).map_err(|source| PolicyError::InvalidRegex {
                rule_id: id.clone(),
                source,
            })
        };
        Ok(Rule {
            tool: compile(tool)?,
            function: compile(function)?,
            agent_id: compile(agent_id)?,
            action,
            reason: reason.into(),
            id,
        })
    }

    /// Concatenate several `RuleBased` policies' rule lists, preserving
    /// relative order. `default_allow` is taken from the last policy
    /// in the list.
    pub fn concat(policies: &[&RuleBasedPolicy]) -> Self {
        let mut rules = Vec::new();
        let mut default_allow = false;
        for policy in policies {
            rules.extend(policy.rules.iter().cloned());
            default_allow = policy.default_allow;
        }
        Self { rules, default_allow }
    }
}

#[async_trait]
impl Policy for RuleBasedPolicy {
    async fn evaluate(&self, request: &GovernanceRequest) -> GovernanceDecision {
        for rule in &self.rules {
            if rule.matches(request) {
                trace!(rule_id = ?rule.id, "rule matched");
                let mut decision = match rule.action {
                    RuleActionKind::Allow => GovernanceDecision::allow(rule.reason.clone()),
                    RuleActionKind::Deny => GovernanceDecision::deny(rule.reason.clone()),
                };
                if let Some(id) = &rule.id {
                    decision = decision.with_rule_id(id.clone());
                }
                return decision;
            }
        }
        if self.default_allow {
            GovernanceDecision::allow("no rule matched")
        } else {
            GovernanceDecision::deny("no rule matched")
        }
    }

    fn kind(&self) -> &'static str {
        "rule_based"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
