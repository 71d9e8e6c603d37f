use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User decision against an inbox item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Dismiss,
    AcceptMerge,
    RejectMerge,
}

impl ActionKind {
    /// Wire name used in the `POST /inbox/{id}/action` body
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Dismiss => "dismiss",
            ActionKind::AcceptMerge => "accept_merge",
            ActionKind::RejectMerge => "reject_merge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Inflight,
    Confirmed,
    Failed,
}

/// One in-flight user action; exists only for the duration of a round trip.
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub item_id: String,
    pub kind: ActionKind,
    pub payload: Option<Value>,
    pub submitted_at: Instant,
    pub state: ActionState,
}

impl PendingAction {
    pub fn new(item_id: impl Into<String>, kind: ActionKind, payload: Option<Value>) -> Self {
        Self {
            item_id: item_id.into(),
            kind,
            payload,
            submitted_at: Instant::now(),
            state: ActionState::Inflight,
        }
    }
}

/// Final result of a submission, fed to the store's reconcile step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Server confirmed; the optimistic state becomes final
    Confirmed,
    /// Server confirmed the item no longer exists; drop it locally
    ItemGone,
    /// Submission failed; the optimistic state must be rolled back
    Failed,
}
