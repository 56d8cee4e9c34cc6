//! Emergency kill-switch: a process-scoped state object supplied by the
//! composition root, not a true global singleton — tests and
//! multi-tenant embedders each construct their own instance.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct KillSwitchState {
    pub active: bool,
    pub activated_by: Option<String>,
    pub activated_at: Option<SystemTime>,
    pub reason: Option<String>,
}

impl Default for KillSwitchState {
    fn default() -> Self {
        Self { active: false, activated_by: None, activated_at: None, reason: None }
    }
}

type Callback = dyn Fn(&KillSwitchState) + Send + Sync;

pub struct KillSwitch {
    state: RwLock<KillSwitchState>,
    on_change: Option<Arc<Callback>>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self { state: RwLock::new(KillSwitchState::default()), on_change: None }
    }

    pub fn with_callback(callback: impl Fn(&KillSwitchState) + Send + Sync + 'static) -> Self {
        Self { state: RwLock::new(KillSwitchState::default()), on_change: Some(Arc::new(callback)) }
    }

    /// Activate the switch. Idempotent: re-activating while already
    /// active updates `reason`/`activated_by` but does not error.
    pub fn activate(&self, activated_by: impl Into<String>, reason: impl Into<String>) {
        {
            let mut state = self.state.write();
            state.active = true;
            state.activated_by = Some(activated_by.into());
            state.activated_at = Some(SystemTime::now());
            state.reason = Some(reason.into());
            warn!(by = ?state.activated_by, reason = ?state.reason, "kill-switch activated");
        }
        self.fire_callback();
    }

    /// Deactivate the switch. Idempotent: deactivating while already
    /// inactive is a no-op but still fires the callback.
    pub fn deactivate(&self) {
        {
            let mut state = self.state.write();
            state.active = false;
            state.activated_by = None;
            state.activated_at = None;
            state.reason = None;
        }
        self.fire_callback();
    }

    pub fn is_active(&self) -> bool {
        self.state.read().active
    }

    pub fn snapshot(&self) -> KillSwitchState {
        self.state.read().clone()
    }

    /// The denial reason the engine should surface while active:
    /// `"kill-switch active: <reason>"`.
    pub fn denial_reason(&self) -> Option<String> {
        let state = self.state.read();
        if state.active {
            Some(format!("kill-switch active: {}", state.reason.as_deref().unwrap_or("no reason given")))
        } else {
            None
        }
    }

    fn fire_callback(&self) {
        if let Some(callback) = &self.on_change {
            let snapshot = self.snapshot();
            callback(&snapshot);
        }
    }
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self::new()
    }
}
