//! Per-action "in progress" flags.
//!
//! Each action type has its own flag per owner, so a second analyze request
//! is refused while one is running but a save can still go through. The flag
//! lives in an RAII guard: it is cleared when the guard drops, whether the
//! action finished, failed, timed out or its future was cancelled.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Analyze,
    Save,
    FetchRecords,
    UpdateRecord,
    Auth,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Analyze => "analyze",
            Action::Save => "save",
            Action::FetchRecords => "fetch-records",
            Action::UpdateRecord => "update-record",
            Action::Auth => "auth",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type ActiveSet = Arc<Mutex<HashSet<(String, Action)>>>;

#[derive(Debug, Clone, Default)]
pub struct InFlight {
    active: ActiveSet,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `action` as running for `owner`. Returns `None` when the same
    /// action is already in progress for that owner.
    pub fn try_begin(&self, owner: &str, action: Action) -> Option<InFlightGuard> {
        let key = (owner.to_string(), action);
        if !lock(&self.active).insert(key.clone()) {
            debug!("{} already in progress for {}", action, owner);
            return None;
        }

        Some(InFlightGuard {
            active: Arc::clone(&self.active),
            key,
        })
    }

    pub fn is_active(&self, owner: &str, action: Action) -> bool {
        lock(&self.active).contains(&(owner.to_string(), action))
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    active: ActiveSet,
    key: (String, Action),
}

impl InFlightGuard {
    pub fn action(&self) -> Action {
        self.key.1
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.key);
    }
}

// The set stays consistent even if a holder panicked, so poisoning is ignored.
fn lock(active: &ActiveSet) -> MutexGuard<'_, HashSet<(String, Action)>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
