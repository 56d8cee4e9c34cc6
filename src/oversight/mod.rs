//! Human oversight side-channels: an emergency kill-switch, an approval
//! ticket workflow, and confidence-based escalation. These gate or
//! bypass the engine pipeline rather than participating in it.

mod approval;
mod confidence;
mod kill_switch;

pub use approval::{ApprovalStatus, ApprovalTicket, ApprovalWorkflow, RiskLevel};
pub use confidence::{ConfidenceEscalation, ConfidenceThresholds, EscalationLevel};
pub use kill_switch::{KillSwitch, KillSwitchState};
