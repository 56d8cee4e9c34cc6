//! Tool registry: tools, groups, access lists, and three-tier policy
//! resolution (tool → agent → group).

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::RegistryError;
use crate::policy::{Policy, RuleBasedPolicy};
use crate::types::{AgentGroup, ToolEntry};

/// Holds tools, groups, and per-agent policy overrides for one
/// governance domain. Lookups are lock-free per key via `DashMap`.
/// `group_order` records creation order separately since `DashMap`
/// iteration order is unspecified, and group-policy fallback must
/// honor insertion order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, ToolEntry>,
    groups: DashMap<String, AgentGroup>,
    group_order: Mutex<Vec<String>>,
    agent_policies: DashMap<String, Arc<dyn Policy>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_tool(
        &self,
        name: impl Into<String>,
        handle: Arc<dyn Any + Send + Sync>,
        policy: Option<Arc<dyn Policy>>,
        allowed_agents: HashSet<String>,
        allowed_groups: HashSet<String>,
        expires_at: Option<SystemTime>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.tools.insert(
            name.clone(),
            ToolEntry {
                name,
                handle,
                policy,
                allowed_agents,
                allowed_groups,
                expires_at,
            },
        );
        Ok(())
    }

    pub fn create_group(&self, name: impl Into<String>, policy: Option<Arc<dyn Policy>>) -> Result<(), RegistryError> {
        let name = name.into();
        if self.groups.contains_key(&name) {
            return Err(RegistryError::DuplicateGroup(name));
        }
        self.groups.insert(
            name.clone(),
            AgentGroup {
                name: name.clone(),
                policy,
                members: HashSet::new(),
            },
        );
        self.group_order.lock().push(name);
        Ok(())
    }

    pub fn add_agent_to_group(&self, agent_id: impl Into<String>, group: &str) -> Result<(), RegistryError> {
        let mut entry = self
            .groups
            .get_mut(group)
            .ok_or_else(|| RegistryError::UnknownGroup(group.to_string()))?;
        entry.members.insert(agent_id.into());
        Ok(())
    }

    pub fn set_agent_policy(&self, agent_id: impl Into<String>, policy: Arc<dyn Policy>) {
        self.agent_policies.insert(agent_id.into(), policy);
    }

    /// Look up a tool's handle for `agent_id`, honoring expiry and the
    /// allow-list access check. Returns `None` if the tool does not
    /// exist, is expired, or the agent is not authorized — callers that
    /// need to distinguish "expired" from "never existed" should check
    /// [`ToolRegistry::is_expired`] separately, since the engine audits
    /// the expired case with a dedicated reason.
    pub fn get_tool(&self, name: &str, agent_id: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        let entry = self.tools.get(name)?;
        let now = SystemTime::now();
        if entry.is_expired_at(now) {
            return None;
        }
        if self.agent_can_access(&entry, agent_id) {
            Some(entry.handle.clone())
        } else {
            None
        }
    }

    /// Whether `name` refers to a registered tool whose `expires_at` has
    /// passed, independent of access-list checks.
    pub fn is_expired(&self, name: &str) -> bool {
        self.tools
            .get(name)
            .map(|e| e.is_expired_at(SystemTime::now()))
            .unwrap_or(false)
    }

    pub fn tool_exists(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    fn agent_can_access(&self, entry: &ToolEntry, agent_id: &str) -> bool {
        if entry.is_public() {
            return true;
        }
        if entry.allowed_agents.contains(agent_id) {
            return true;
        }
        entry.allowed_groups.iter().any(|group| self.agent_in_group(agent_id, group))
    }

    fn agent_in_group(&self, agent_id: &str, group: &str) -> bool {
        self.groups
            .get(group)
            .map(|g| g.members.contains(agent_id))
            .unwrap_or(false)
    }

    pub fn list_tools_for_agent(&self, agent_id: &str) -> Vec<String> {
        let now = SystemTime::now();
        self.tools
            .iter()
            .filter(|entry| !entry.is_expired_at(now) && self.agent_can_access(&entry, agent_id))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Resolve the effective policy for `(tool, agent)` by precedence:
    ///
    /// 1. the tool's own policy, if set;
    /// 2. the agent's individual policy override, if set;
    /// 3. the union of the agent's groups' policies, by insertion
    ///    order — concatenated if all are `RuleBased`, otherwise the
    ///    first non-null;
    /// 4. `None`.
    pub fn get_policy_for_tool(&self, tool: &str, agent_id: &str) -> Option<Arc<dyn Policy>> {
        if let Some(entry) = self.tools.get(tool) {
            if let Some(policy) = &entry.policy {
                return Some(policy.clone());
            }
        }

        if let Some(policy) = self.agent_policies.get(agent_id) {
            return Some(policy.clone());
        }

        self.resolve_group_policy(agent_id)
    }

    fn resolve_group_policy(&self, agent_id: &str) -> Option<Arc<dyn Policy>> {
        let mut group_policies: Vec<Arc<dyn Policy>> = Vec::new();
        for name in self.group_order.lock().iter() {
            if let Some(group) = self.groups.get(name) {
                if group.members.contains(agent_id) {
                    if let Some(policy) = &group.policy {
                        group_policies.push(policy.clone());
                    }
                }
            }
        }

        if group_policies.is_empty() {
            return None;
        }

        let all_rule_based: Option<Vec<&RuleBasedPolicy>> = group_policies
            .iter()
            .map(|p| p.as_any().downcast_ref::<RuleBasedPolicy>())
            .collect();

        match all_rule_based {
            Some(rule_based) if !rule_based.is_empty() => {
                Some(Arc::new(RuleBasedPolicy::concat(&rule_based)))
            }
            _ => group_policies.into_iter().next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AllowAllPolicy, DenyAllPolicy};
    use std::time::Duration;

    fn handle() -> Arc<dyn Any + Send + Sync> {
        Arc::new(())
    }

    #[test]
    fn public_tool_is_accessible_to_anyone() {
        let registry = ToolRegistry::new();
        registry
            .register_tool("db", handle(), None, HashSet::new(), HashSet::new(), None)
            .unwrap();

        assert!(registry.get_tool("db", "anyone").is_some());
    }

    #[test]
    fn allow_listed_tool_denies_unlisted_agent() {
        let registry = ToolRegistry::new();
        let mut allowed = HashSet::new();
        allowed.insert("alice".to_string());
        registry
            .register_tool("db", handle(), None, allowed, HashSet::new(), None)
            .unwrap();

        assert!(registry.get_tool("db", "alice").is_some());
        assert!(registry.get_tool("db", "mallory").is_none());
    }

    #[test]
    fn group_membership_grants_access() {
        let registry = ToolRegistry::new();
        registry.create_group("ops", None).unwrap();
        registry.add_agent_to_group("alice", "ops").unwrap();

        let mut allowed_groups = HashSet::new();
        allowed_groups.insert("ops".to_string());
        registry
            .register_tool("db", handle(), None, HashSet::new(), allowed_groups, None)
            .unwrap();

        assert!(registry.get_tool("db", "alice").is_some());
        assert!(registry.get_tool("db", "mallory").is_none());
    }

    #[test]
    fn expired_tool_is_treated_as_absent() {
        let registry = ToolRegistry::new();
        let expired = SystemTime::now() - Duration::from_secs(60);
        registry
            .register_tool("db", handle(), None, HashSet::new(), HashSet::new(), Some(expired))
            .unwrap();

        assert!(registry.get_tool("db", "anyone").is_none());
        assert!(registry.is_expired("db"));
    }

    #[test]
    fn duplicate_tool_registration_fails() {
        let registry = ToolRegistry::new();
        registry
            .register_tool("db", handle(), None, HashSet::new(), HashSet::new(), None)
            .unwrap();
        let err = registry
            .register_tool("db", handle(), None, HashSet::new(), HashSet::new(), None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool(_)));
    }

    #[test]
    fn policy_precedence_tool_beats_agent_and_group() {
        let registry = ToolRegistry::new();
        registry.create_group("ops", Some(Arc::new(AllowAllPolicy))).unwrap();
        registry.add_agent_to_group("alice", "ops").unwrap();
        registry.set_agent_policy("alice", Arc::new(AllowAllPolicy));
        registry
            .register_tool(
                "db",
                handle(),
                Some(Arc::new(DenyAllPolicy)),
                HashSet::new(),
                HashSet::new(),
                None,
            )
            .unwrap();

        let policy = registry.get_policy_for_tool("db", "alice").unwrap();
        assert_eq!(policy.kind(), "deny_all");
    }

    #[test]
    fn policy_precedence_agent_beats_group_when_no_tool_policy() {
        let registry = ToolRegistry::new();
        registry.create_group("ops", Some(Arc::new(AllowAllPolicy))).unwrap();
        registry.add_agent_to_group("alice", "ops").unwrap();
        registry.set_agent_policy("alice", Arc::new(DenyAllPolicy));
        registry
            .register_tool("db", handle(), None, HashSet::new(), HashSet::new(), None)
            .unwrap();

        let policy = registry.get_policy_for_tool("db", "alice").unwrap();
        assert_eq!(policy.kind(), "deny_all");
    }

    #[test]
    fn group_rule_based_policies_concatenate() {
        use crate::policy::RuleBasedPolicy;
        use crate::types::RuleActionKind;

        let registry = ToolRegistry::new();
        let p1 = RuleBasedPolicy::new(
            vec![RuleBasedPolicy::build_rule("db", "read", None, RuleActionKind::Allow, "r1", None).unwrap()],
            false,
        );
        let p2 = RuleBasedPolicy::new(
            vec![RuleBasedPolicy::build_rule("db", "write", None, RuleActionKind::Deny, "r2", None).unwrap()],
            false,
        );
        registry.create_group("readers", Some(Arc::new(p1))).unwrap();
        registry.create_group("writers", Some(Arc::new(p2))).unwrap();
        registry.add_agent_to_group("alice", "readers").unwrap();
        registry.add_agent_to_group("alice", "writers").unwrap();
        registry
            .register_tool("db", handle(), None, HashSet::new(), HashSet::new(), None)
            .unwrap();

        let policy = registry.get_policy_for_tool("db", "alice").unwrap();
        assert_eq!(policy.kind(), "rule_based");
    }
}
