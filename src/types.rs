//! Core data model: requests, decisions, rules, and registry value types.

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a policy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub Uuid);

impl PolicyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PolicyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trace identifier carried through a single request's evaluation and
/// into its audit record. Generated if the caller does not supply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a pending or decided approval ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub Uuid);

impl ApprovalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ApprovalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A heterogeneous value used for `arguments` and `context` maps.
///
/// Arguments and context come from the calling agent and are not known
/// ahead of time, so they are modeled as a small sum type over scalars,
/// lists, and nested maps rather than a fixed struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A map of argument or context names to dynamic values.
pub type ValueMap = HashMap<String, Value>;

/// An attempted tool invocation submitted to the governance engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceRequest {
    pub agent_id: String,
    pub tool_name: String,
    pub function_name: String,
    pub arguments: ValueMap,
    pub context: ValueMap,
    pub correlation_id: CorrelationId,
    pub timestamp: SystemTime,
}

impl GovernanceRequest {
    /// Construct a request, generating a correlation id and capturing
    /// `SystemTime::now()` if the caller does not supply them.
    pub fn new(agent_id: impl Into<String>, tool_name: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            tool_name: tool_name.into(),
            function_name: function_name.into(),
            arguments: ValueMap::new(),
            context: ValueMap::new(),
            correlation_id: CorrelationId::new(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_arguments(mut self, arguments: ValueMap) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_context(mut self, context: ValueMap) -> Self {
        self.context = context;
        self
    }

    /// `context.justification`, if present and a string.
    pub fn justification(&self) -> Option<&str> {
        self.context.get("justification").and_then(Value::as_str)
    }

    /// `context.confidence`, if present and numeric, clamped to `[0, 1]`.
    pub fn confidence(&self) -> Option<f64> {
        self.context
            .get("confidence")
            .and_then(Value::as_f64)
            .map(|c| c.clamp(0.0, 1.0))
    }
}

/// Where a terminal decision was produced, recorded on the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionSource {
    KillSwitch,
    Validator,
    RateLimit,
    Quota,
    CircuitBreaker,
    Policy,
    Approval,
    ConfidenceEscalation,
    Internal,
}

impl std::fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DecisionSource::KillSwitch => "kill_switch",
            DecisionSource::Validator => "validator",
            DecisionSource::RateLimit => "rate_limit",
            DecisionSource::Quota => "quota",
            DecisionSource::CircuitBreaker => "circuit_breaker",
            DecisionSource::Policy => "policy",
            DecisionSource::Approval => "approval",
            DecisionSource::ConfidenceEscalation => "confidence_escalation",
            DecisionSource::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

/// The engine's output for a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceDecision {
    pub allow: bool,
    pub reason: String,
    pub rule_id: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl GovernanceDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allow: true,
            reason: reason.into(),
            rule_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
            rule_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A single rule in a `RuleBased` policy's ordered rule list.
///
/// Regexes are anchored to the full value (`^...$`) at construction
/// time. A bare `"*"` pattern is accepted as shorthand for `".*"`.
#[derive(Debug, Clone)]
pub struct Rule {
    pub tool: regex::Regex,
    pub function: regex::Regex,
    pub agent_id: regex::Regex,
    pub action: RuleActionKind,
    pub reason: String,
    pub id: Option<String>,
}

/// The action a matching rule takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleActionKind {
    Allow,
    Deny,
}

impl Rule {
    pub fn matches(&self, req: &GovernanceRequest) -> bool {
        self.tool.is_match(&req.tool_name)
            && self.function.is_match(&req.function_name)
            && self.agent_id.is_match(&req.agent_id)
    }
}

/// A day of the week, used by `TimeWindow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<chrono::Weekday> for Weekday {
    fn from(w: chrono::Weekday) -> Self {
        match w {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

/// A recurring allow window used by the `Temporal` policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Local time-of-day the window opens, inclusive.
    pub start: chrono::NaiveTime,
    /// Local time-of-day the window closes, exclusive.
    pub end: chrono::NaiveTime,
    pub days_of_week: Vec<Weekday>,
}

/// An entry in the tool registry.
#[derive(Clone)]
pub struct ToolEntry {
    pub name: String,
    pub handle: std::sync::Arc<dyn std::any::Any + Send + Sync>,
    pub policy: Option<std::sync::Arc<dyn crate::policy::Policy>>,
    pub allowed_agents: std::collections::HashSet<String>,
    pub allowed_groups: std::collections::HashSet<String>,
    pub expires_at: Option<SystemTime>,
}

impl ToolEntry {
    /// Whether this entry should be treated as present at `now`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        matches!(self.expires_at, Some(t) if t <= now)
    }

    /// Whether access is public (no allow-lists configured).
    pub fn is_public(&self) -> bool {
        self.allowed_agents.is_empty() && self.allowed_groups.is_empty()
    }
}

/// A named collection of agents sharing a policy.
#[derive(Clone)]
pub struct AgentGroup {
    pub name: String,
    pub policy: Option<std::sync::Arc<dyn crate::policy::Policy>>,
    pub members: std::collections::HashSet<String>,
}

/// A durable record of one governance decision, submitted to every
/// configured audit sink exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub agent_id: String,
    pub tool: String,
    pub function: String,
    pub arguments: ValueMap,
    pub allow: bool,
    pub reason: String,
    pub duration_ms: u64,
    pub correlation_id: CorrelationId,
    pub decision_source: DecisionSource,
}
