//! Push-message decoding.
//!
//! The push channel carries notification-only semantics: one small JSON frame
//! per server-side change, keyed by a `type` field. Decoding is pure and
//! synchronous; a frame that fails to decode is logged by the caller and
//! dropped without disturbing the connection.

use serde_json::Value;

use crate::constants::kinds;
use crate::error::{ActionError, DecodeError, FetchError};
use crate::models::ConnectionStatus;

/// Consumer-facing notification. The UI layer subscribes to this stream and
/// reads state through the store; it never mutates store state directly.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// Items, clusters, or the badge count changed
    InboxChanged { count: usize },
    /// A user action failed after rollback; must be visibly retried or
    /// abandoned (an `Unauthorized` error means re-login, not retry)
    ActionFailed { item_id: String, error: ActionError },
    /// A debounced snapshot refresh failed; `Unauthorized` means re-login
    FetchFailed { error: FetchError },
    /// Push-channel lifecycle transition
    ConnectionChanged(ConnectionStatus),
}

/// Typed domain event parsed from a raw push frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// A new capture landed in the inbox
    NewItem { id: Option<String> },
    /// An existing item changed server-side (another session actioned it,
    /// content was edited, ...)
    InboxUpdate {
        id: Option<String>,
        action: Option<String>,
    },
    /// The dedupe job produced a merge-suggestion cluster
    NewCluster {
        cluster_id: Option<String>,
        member_count: Option<u64>,
    },
}

impl DomainEvent {
    /// Whether this event should trigger a snapshot refetch. Every current
    /// kind does; the notification frames do not carry enough payload to
    /// apply incrementally.
    pub fn triggers_refresh(&self) -> bool {
        true
    }
}

/// Decode one raw push frame into a [`DomainEvent`].
pub fn decode(raw: &str) -> Result<DomainEvent, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::Malformed("missing string `type` field".into()))?;

    match kind {
        kinds::NEW_MEMORY => Ok(DomainEvent::NewItem {
            id: string_field(&value, "id"),
        }),
        kinds::INBOX_UPDATE => Ok(DomainEvent::InboxUpdate {
            id: string_field(&value, "id"),
            action: string_field(&value, "action"),
        }),
        kinds::NEW_CLUSTER => Ok(DomainEvent::NewCluster {
            cluster_id: value
                .get("cluster_id")
                .map(|v| match v {
                    // The dedupe job sends numeric ids; normalize to strings
                    Value::Number(n) => n.to_string(),
                    other => other.as_str().map(String::from).unwrap_or_default(),
                })
                .filter(|s| !s.is_empty()),
            member_count: value.get("count").and_then(Value::as_u64),
        }),
        other => Err(DecodeError::UnknownKind(other.to_string())),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_new_memory() {
        let event = decode(r#"{"type": "new_memory", "id": "mem_7"}"#).unwrap();
        assert_eq!(
            event,
            DomainEvent::NewItem {
                id: Some("mem_7".to_string())
            }
        );
        assert!(event.triggers_refresh());
    }

    #[test]
    fn test_decode_inbox_update() {
        let event = decode(r#"{"type": "inbox_update", "id": "mem_3", "action": "approve"}"#)
            .unwrap();
        assert_eq!(
            event,
            DomainEvent::InboxUpdate {
                id: Some("mem_3".to_string()),
                action: Some("approve".to_string()),
            }
        );
    }

    #[test]
    fn test_decode_new_cluster_numeric_id() {
        let event = decode(r#"{"type": "new_cluster", "cluster_id": 12, "count": 3}"#).unwrap();
        assert_eq!(
            event,
            DomainEvent::NewCluster {
                cluster_id: Some("12".to_string()),
                member_count: Some(3),
            }
        );
    }

    #[test]
    fn test_unknown_kind() {
        let err = decode(r#"{"type": "usage_report"}"#).unwrap_err();
        assert_eq!(err, DecodeError::UnknownKind("usage_report".to_string()));
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(decode("not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(
            decode(r#"{"id": "mem_1"}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode(r#"{"type": 42}"#),
            Err(DecodeError::Malformed(_))
        ));
    }
}
