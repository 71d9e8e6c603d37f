mod action;
mod cluster;
mod connection;
mod item;

pub use action::{ActionKind, ActionOutcome, ActionState, PendingAction};
pub use cluster::{Cluster, SuggestedAction};
pub use connection::{ConnectionState, ConnectionStatus};
pub use item::{InboxItem, ItemStatus, Snapshot};
