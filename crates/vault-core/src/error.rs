//! Error taxonomy for the inbox subsystem.
//!
//! Transport and decode errors are recovered internally (reconnect / drop and
//! keep listening) and never reach the consumer as hard failures. Fetch errors
//! are retried at the caller's discretion. Action errors always reach the
//! consumer after the optimistic state has been rolled back.

/// Connection-level failure on the push channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid push URL: {0}")]
    InvalidUrl(String),
    /// Server refused the handshake with an auth status; terminal until a
    /// fresh connect with new credentials.
    #[error("push connection unauthorized (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("push connection closed: {0}")]
    Closed(String),
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Malformed or unrecognized push payload. Logged and dropped.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed push payload: {0}")]
    Malformed(String),
    #[error("unknown push event kind: {0}")]
    UnknownKind(String),
}

/// Snapshot refresh failure. Single attempt; callers decide whether to retry.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("unauthorized; credential missing or rejected")]
    Unauthorized,
    #[error("snapshot request failed with HTTP {status}")]
    Status { status: u16 },
    #[error("snapshot request failed: {0}")]
    Network(String),
}

/// User-action failure, surfaced after rollback.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// A submission for this item is already in flight; fail fast rather
    /// than race the server.
    #[error("an action for item {item_id} is already pending")]
    AlreadyPending { item_id: String },
    #[error("unauthorized; credential missing or rejected")]
    Unauthorized,
    #[error("network failure after retries: {0}")]
    NetworkFailure(String),
    #[error("server rejected the action (HTTP {status})")]
    ServerRejected { status: u16 },
    /// The item no longer exists server-side; it is dropped locally since
    /// confirmed-absent server state is authoritative.
    #[error("item {item_id} no longer exists server-side")]
    ItemGone { item_id: String },
}
