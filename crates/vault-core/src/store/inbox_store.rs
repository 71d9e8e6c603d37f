//! Single source of truth for inbox items and merge-suggestion clusters.
//!
//! Server push events, snapshot loads, and local optimistic mutations all
//! funnel through this store, which is what keeps a stale full refresh from
//! racing a fresh local action: an item with an inflight action keeps its
//! local (optimistic) state until the action resolves, no matter what a
//! snapshot says about it in the meantime.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::error::ActionError;
use crate::models::{
    ActionKind, ActionOutcome, ActionState, Cluster, InboxItem, ItemStatus, PendingAction,
};

/// Rollback state held while an action is in flight.
#[derive(Debug, Clone)]
struct InflightEntry {
    action: PendingAction,
    /// Last known server-side copy of the item, restored on failure
    saved: InboxItem,
}

pub struct InboxStore {
    items: Vec<InboxItem>,
    clusters: Vec<Cluster>,
    inflight: HashMap<String, InflightEntry>,
}

impl InboxStore {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            clusters: Vec::new(),
            inflight: HashMap::new(),
        }
    }

    // ===== Views =====

    /// Items awaiting triage, most recent first.
    pub fn pending_items(&self) -> Vec<&InboxItem> {
        self.items.iter().filter(|i| i.is_pending()).collect()
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Badge count; always equals the number of pending items.
    pub fn count(&self) -> usize {
        self.items.iter().filter(|i| i.is_pending()).count()
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.items.iter().any(|i| i.id == item_id)
    }

    pub fn has_inflight(&self, item_id: &str) -> bool {
        self.inflight.contains_key(item_id)
    }

    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }

    // ===== Mutations =====

    /// Replace state wholesale from an authoritative server snapshot.
    ///
    /// Items with an inflight action are the exception: the incoming copy
    /// refreshes the stashed rollback state but is not resurfaced in the
    /// pending view until the action resolves.
    pub fn load_snapshot(&mut self, items: Vec<InboxItem>, clusters: Vec<Cluster>) {
        self.clusters = clusters;

        let mut next = Vec::with_capacity(items.len());
        for item in items {
            if let Some(entry) = self.inflight.get_mut(&item.id) {
                entry.saved = item;
                continue;
            }
            next.push(item);
        }
        next.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.items = next;

        self.repair_cluster_refs();
    }

    /// Immediately apply the local effect of a user action, before the server
    /// has seen it. Dismiss, accept-merge, and reject-merge all remove the
    /// item from the pending view.
    pub fn apply_optimistic(
        &mut self,
        item_id: &str,
        kind: ActionKind,
        payload: Option<Value>,
    ) -> Result<(), ActionError> {
        if self.inflight.contains_key(item_id) {
            return Err(ActionError::AlreadyPending {
                item_id: item_id.to_string(),
            });
        }

        let pos = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| ActionError::ItemGone {
                item_id: item_id.to_string(),
            })?;

        let mut saved = self.items.remove(pos);
        saved.status = ItemStatus::Pending;
        self.inflight.insert(
            item_id.to_string(),
            InflightEntry {
                action: PendingAction::new(item_id, kind, payload),
                saved,
            },
        );
        Ok(())
    }

    /// Resolve an inflight action with its final outcome. Called exactly once
    /// per submission by the dispatcher.
    pub fn reconcile(&mut self, item_id: &str, outcome: &ActionOutcome) {
        let Some(mut entry) = self.inflight.remove(item_id) else {
            warn!(item_id, "reconcile for an action that is not inflight");
            return;
        };

        match outcome {
            ActionOutcome::Confirmed => {
                entry.action.state = ActionState::Confirmed;
            }
            ActionOutcome::ItemGone => {
                // Server state is authoritative once confirmed absent
                warn!(item_id, "item vanished server-side; dropping locally");
            }
            ActionOutcome::Failed => {
                entry.action.state = ActionState::Failed;
                let mut item = entry.saved;
                item.status = ItemStatus::Pending;
                self.insert_sorted(item);
                self.repair_cluster_refs();
            }
        }
    }

    fn insert_sorted(&mut self, item: InboxItem) {
        let pos = self
            .items
            .partition_point(|i| i.created_at > item.created_at);
        self.items.insert(pos, item);
    }

    /// Drop `cluster_id`s that no longer reference a cluster listing the
    /// item, keeping the membership invariant intact.
    fn repair_cluster_refs(&mut self) {
        for item in &mut self.items {
            let valid = item.cluster_id.as_deref().is_some_and(|cid| {
                self.clusters
                    .iter()
                    .any(|c| c.id == cid && c.contains(&item.id))
            });
            if !valid {
                item.cluster_id = None;
            }
        }
    }
}

impl Default for InboxStore {
    fn default() -> Self {
        Self::new()
    }
}
