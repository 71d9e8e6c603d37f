//! Inbox synchronization core for the vault client.
//!
//! Keeps a client-side view of pending inbox items consistent with
//! server-side state that changes asynchronously (new captures, dedupe
//! clustering) while the user concurrently issues dismiss / accept-merge /
//! reject-merge actions against that same state. The push channel carries
//! notification-only frames; state always comes from snapshot fetches,
//! reconciled through a single serialized store.

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod models;
pub mod runtime;
pub mod store;
pub mod transport;

pub use config::CoreConfig;
pub use error::{ActionError, DecodeError, FetchError, TransportError};
pub use events::{decode, CoreEvent, DomainEvent};
pub use models::{
    ActionKind, ActionOutcome, Cluster, ConnectionState, ConnectionStatus, InboxItem, ItemStatus,
    Snapshot,
};
pub use runtime::{CoreHandle, CoreRuntime};
pub use store::{InboxStore, SharedStore};
