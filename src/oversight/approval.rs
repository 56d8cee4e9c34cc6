//! Approval ticket workflow: gates a would-be-allowed request behind
//! human sign-off. No built-in timeout — callers poll or are notified.

use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use regex::Regex;
use tracing::info;

use crate::types::{ApprovalId, ValueMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct ApprovalTicket {
    pub id: ApprovalId,
    pub agent_id: String,
    pub tool: String,
    pub function: String,
    pub arguments: ValueMap,
    pub justification: Option<String>,
    pub risk_level: RiskLevel,
    pub status: ApprovalStatus,
    pub approver: Option<String>,
    pub decided_at: Option<SystemTime>,
}

#[derive(Debug)]
pub struct AlreadyDecided;

type NotifyCallback = dyn Fn(&ApprovalTicket) + Send + Sync;

/// Tracks which tools/functions require human sign-off and holds the
/// pending/decided ticket table.
pub struct ApprovalWorkflow {
    high_risk_tools: Vec<String>,
    high_risk_functions: Vec<Regex>,
    tickets: DashMap<ApprovalId, ApprovalTicket>,
    notify: Option<Arc<NotifyCallback>>,
}

impl ApprovalWorkflow {
    pub fn new(high_risk_tools: Vec<String>, high_risk_functions: Vec<Regex>) -> Self {
        Self { high_risk_tools, high_risk_functions, tickets: DashMap::new(), notify: None }
    }

    pub fn with_notify(
        high_risk_tools: Vec<String>,
        high_risk_functions: Vec<Regex>,
        notify: impl Fn(&ApprovalTicket) + Send + Sync + 'static,
    ) -> Self {
        Self {
            high_risk_tools,
            high_risk_functions,
            tickets: DashMap::new(),
            notify: Some(Arc::new(notify)),
        }
    }

    /// Whether `tool`/`function_name` falls in the high-risk set that
    /// must be routed through approval even after an allow decision.
    pub fn requires_approval(&self, tool: &str, function_name: &str) -> bool {
        self.high_risk_tools.iter().any(|t| t == tool)
            || self.high_risk_functions.iter().any(|re| re.is_match(function_name))
    }

    pub fn request_approval(
        &self,
        agent_id: impl Into<String>,
        tool: impl Into<String>,
        function: impl Into<String>,
        arguments: ValueMap,
        justification: Option<String>,
        risk_level: RiskLevel,
    ) -> ApprovalTicket {
        let ticket = ApprovalTicket {
            id: ApprovalId::new(),
            agent_id: agent_id.into(),
            tool: tool.into(),
            function: function.into(),
            arguments,
            justification,
            risk_level,
            status: ApprovalStatus::Pending,
            approver: None,
            decided_at: None,
        };
        self.tickets.insert(ticket.id, ticket.clone());
        info!(id = %ticket.id, agent = %ticket.agent_id, "approval ticket created");
        if let Some(notify) = &self.notify {
            notify(&ticket);
        }
        ticket
    }

    pub fn get(&self, id: ApprovalId) -> Option<ApprovalTicket> {
        self.tickets.get(&id).map(|t| t.clone())
    }

    pub fn approve(&self, id: ApprovalId, approver: impl Into<String>) -> Result<ApprovalTicket, AlreadyDecided> {
        self.decide(id, ApprovalStatus::Approved, approver)
    }

    pub fn reject(&self, id: ApprovalId, approver: impl Into<String>) -> Result<ApprovalTicket, AlreadyDecided> {
        self.decide(id, ApprovalStatus::Rejected, approver)
    }

    fn decide(&self, id: ApprovalId, status: ApprovalStatus, approver: impl Into<String>) -> Result<ApprovalTicket, AlreadyDecided> {
        let mut ticket = self.tickets.get_mut(&id).ok_or(AlreadyDecided)?;
        if ticket.status != ApprovalStatus::Pending {
            return Err(AlreadyDecided);
        }
        ticket.status = status;
        ticket.approver = Some(approver.into());
        ticket.decided_at = Some(SystemTime::now());
        Ok(ticket.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_high_risk_tool_or_function_pattern() {
        let workflow = ApprovalWorkflow::new(
            vec!["payments".to_string()],
            vec![Regex::new("^delete_.*$").unwrap()],
        );
        assert!(workflow.requires_approval("payments", "anything"));
        assert!(workflow.requires_approval("db", "delete_all"));
        assert!(!workflow.requires_approval("db", "select_all"));
    }

    #[test]
    fn request_and_approve_roundtrip() {
        let workflow = ApprovalWorkflow::new(vec![], vec![]);
        let ticket = workflow.request_approval("a1", "db", "delete_all", ValueMap::new(), None, RiskLevel::High);
        assert_eq!(ticket.status, ApprovalStatus::Pending);

        let decided = workflow.approve(ticket.id, "alice").unwrap();
        assert_eq!(decided.status, ApprovalStatus::Approved);
        assert_eq!(decided.approver.as_deref(), Some("alice"));
    }

    #[test]
    fn deciding_twice_fails() {
        let workflow = ApprovalWorkflow::new(vec![], vec![]);
        let ticket = workflow.request_approval("a1", "db", "delete_all", ValueMap::new(), None, RiskLevel::High);
        workflow.approve(ticket.id, "alice").unwrap();
        assert!(workflow.reject(ticket.id, "bob").is_err());
    }

    #[test]
    fn notify_callback_fires_on_request() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let workflow = ApprovalWorkflow::with_notify(vec![], vec![], move |_t| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        workflow.request_approval("a1", "db", "delete_all", ValueMap::new(), None, RiskLevel::High);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
