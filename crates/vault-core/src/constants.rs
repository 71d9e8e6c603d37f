//! Application-wide constants
//!
//! Centralized location for magic strings and tuning values
//! that are used across multiple modules.

use std::time::Duration;

/// Default REST API base URL
pub const API_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Default push (WebSocket) base URL
pub const PUSH_BASE_URL: &str = "ws://localhost:8000";

/// Reconnect backoff base delay (doubles per consecutive failure)
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Reconnect backoff ceiling
pub const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Window within which push notifications are collapsed into one refetch
pub const REFRESH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Per-request timeout for any network operation (fetch, action submit)
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Hard cap on one action submission including retries
pub const SUBMIT_DEADLINE: Duration = Duration::from_secs(60);

/// Linear backoff schedule for action resubmission after a network failure
pub const SUBMIT_RETRY_DELAYS: [Duration; 2] =
    [Duration::from_millis(500), Duration::from_millis(1500)];

// Push event kinds used by the vault backend
pub mod kinds {
    /// A new capture landed in the inbox
    pub const NEW_MEMORY: &str = "new_memory";
    /// An existing inbox item changed server-side
    pub const INBOX_UPDATE: &str = "inbox_update";
    /// The dedupe job produced a merge-suggestion cluster
    pub const NEW_CLUSTER: &str = "new_cluster";
}
