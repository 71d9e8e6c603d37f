use serde::{Deserialize, Serialize};

/// Action the dedupe job suggests for a cluster. Currently only merge; the
/// enum keeps the wire format open for other suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestedAction {
    Merge,
}

/// Server-computed group of near-duplicate items.
///
/// Created and disbanded entirely server-side; the client treats it as
/// read-only except for relaying the user's accept/reject decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    /// Item ids in the cluster; the server guarantees at least two
    pub member_ids: Vec<String>,
    #[serde(default = "default_suggested_action")]
    pub suggested_action: SuggestedAction,
}

fn default_suggested_action() -> SuggestedAction {
    SuggestedAction::Merge
}

impl Cluster {
    pub fn contains(&self, item_id: &str) -> bool {
        self.member_ids.iter().any(|id| id == item_id)
    }
}
