//! Enact governance engine
//!
//! The decision pipeline that sits between an autonomous agent and the
//! tools it invokes: every attempted tool call is validated, checked
//! against rate/quota/circuit safeguards, evaluated against a resolved
//! policy, optionally gated behind human approval, and audited.

pub mod audit;
pub mod breaker;
pub mod config;
pub mod engine;
pub mod error;
pub mod limiter;
pub mod oversight;
pub mod policy;
pub mod quota;
pub mod registry;
pub mod reliability;
pub mod types;
pub mod validators;

pub use engine::{DefaultGovernanceEngine, GovernanceEngine, GovernanceEngineConfig};
pub use error::{AuditError, ConfigError, GovernanceError, PolicyError, RegistryError};
pub use oversight::{ApprovalWorkflow, ConfidenceEscalation, EscalationLevel, KillSwitch};
pub use registry::ToolRegistry;
pub use types::{
    AgentGroup, AuditRecord, CorrelationId, GovernanceDecision, GovernanceRequest, Rule, ToolEntry,
    Value,
};
