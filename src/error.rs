//! Error taxonomy for the governance engine.
//!
//! The engine's public `evaluate` call never returns an `Err` for an
//! ordinary governance outcome (allow/deny/escalate) — those are always a
//! `GovernanceDecision`. These error types are for setup-time failures
//! (registry/config/policy construction) and for internal plumbing that
//! the engine converts into a denial decision rather than propagating.

use thiserror::Error;

use crate::types::PolicyId;

/// Errors raised while registering tools, groups, or policies.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("group '{0}' is already registered")]
    DuplicateGroup(String),

    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),
}

/// Errors raised while constructing or evaluating a policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid regex in rule {rule_id:?}: {source}")]
    InvalidRegex {
        rule_id: Option<String>,
        #[source]
        source: regex::Error,
    },

    #[error("policy {0} not found")]
    NotFound(PolicyId),

    #[error("decision service request failed: {0}")]
    DelegateTransport(String),

    #[error("decision service returned an unrecognized response shape")]
    DelegateResponseShape,
}

/// Errors raised while parsing a policy configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse policy configuration as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse policy configuration as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid rule at index {index}: {reason}")]
    InvalidRule { index: usize, reason: String },
}

/// Errors raised by an individual audit sink. The engine logs these
/// out-of-band; they never affect the decision returned to the caller.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to write audit record to file: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit HTTP sink returned status {0}")]
    HttpStatus(u16),

    #[error("audit HTTP sink request failed: {0}")]
    HttpTransport(String),

    #[error("audit syslog sink failed: {0}")]
    Syslog(String),

    #[error("audit cloud sink failed: {0}")]
    Cloud(String),

    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Internal error kinds surfaced to the caller as `"internal: <kind>"`
/// denial reasons. Never propagated as an exception from `evaluate`.
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("validator '{validator}' rejected the request: {reason}")]
    ValidationFailed { validator: &'static str, reason: String },

    #[error("policy evaluation failed: {0}")]
    Policy(#[from] PolicyError),

    #[error("audit sink failed: {0}")]
    Audit(String),
}

impl GovernanceError {
    /// The `<kind>` token used in `"internal: <kind>"` denial reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            GovernanceError::ValidationFailed { .. } => "validator",
            GovernanceError::Policy(_) => "policy",
            GovernanceError::Audit(_) => "audit",
        }
    }
}
