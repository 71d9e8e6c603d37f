use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use super::Cluster;

/// Triage state of an inbox item.
///
/// `Pending` items make up the inbox view and the badge count. `Actioned` and
/// `Removed` are terminal from the client's perspective; the server stops
/// listing such items once the action is confirmed. The server also reports
/// post-triage statuses of its own (`approved`, `discarded`, ...); anything
/// we do not recognize folds into `Actioned` so one odd row cannot poison a
/// whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Removed,
    #[serde(other)]
    Actioned,
}

/// A captured vault entry awaiting user triage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxItem {
    /// Opaque stable identifier (server format `mem_<n>`)
    pub id: String,
    pub content: String,
    pub source: String,
    /// Server calls this `details`
    #[serde(rename = "details", default)]
    pub title: Option<String>,
    /// Unix timestamp in seconds. The server emits an ISO-8601 datetime
    /// string here; older payloads carry a bare epoch number.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: u64,
    pub status: ItemStatus,
    /// Set when the dedupe job grouped this item into a merge suggestion
    #[serde(default)]
    pub cluster_id: Option<String>,
}

impl InboxItem {
    pub fn is_pending(&self) -> bool {
        self.status == ItemStatus::Pending
    }
}

/// Accept either an epoch number or an ISO-8601 datetime, normalized to
/// epoch seconds so items stay ordering-comparable. FastAPI-style backends
/// serialize `datetime` columns as naive ISO strings without a zone suffix;
/// those are read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Epoch(u64),
        Iso(String),
    }

    match Timestamp::deserialize(deserializer)? {
        Timestamp::Epoch(secs) => Ok(secs),
        Timestamp::Iso(raw) => {
            let secs = DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.timestamp())
                .or_else(|_| raw.parse::<NaiveDateTime>().map(|dt| dt.and_utc().timestamp()))
                .map_err(|e| serde::de::Error::custom(format!("bad timestamp {raw:?}: {e}")))?;
            Ok(secs.max(0) as u64)
        }
    }
}

/// Authoritative server-side view of the inbox, as returned by the Fetch
/// Client.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub items: Vec<InboxItem>,
    pub clusters: Vec<Cluster>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_wire_format() {
        let json = r#"{
            "id": "mem_42",
            "content": "clipped text",
            "source": "chrome-extension",
            "details": "A title",
            "created_at": 1756500000,
            "status": "pending"
        }"#;
        let item: InboxItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, "mem_42");
        assert_eq!(item.title.as_deref(), Some("A title"));
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(item.cluster_id.is_none());
        assert!(item.is_pending());
    }

    #[test]
    fn test_missing_optional_fields() {
        let json = r#"{
            "id": "mem_1",
            "content": "x",
            "source": "web",
            "created_at": 0,
            "status": "actioned"
        }"#;
        let item: InboxItem = serde_json::from_str(json).unwrap();
        assert!(item.title.is_none());
        assert!(!item.is_pending());
    }

    #[test]
    fn test_created_at_accepts_iso_datetime() {
        // The server serializes datetime columns as naive ISO strings
        let json = r#"{
            "id": "mem_2",
            "content": "x",
            "source": "web",
            "created_at": "2026-08-30T10:00:00",
            "status": "pending"
        }"#;
        let item: InboxItem = serde_json::from_str(json).unwrap();
        assert!(item.created_at > 0);

        // Epoch sanity: one second past the epoch, naive and zoned forms agree
        let naive: InboxItem = serde_json::from_str(
            r#"{"id": "a", "content": "x", "source": "w",
                "created_at": "1970-01-01T00:00:01", "status": "pending"}"#,
        )
        .unwrap();
        let zoned: InboxItem = serde_json::from_str(
            r#"{"id": "b", "content": "x", "source": "w",
                "created_at": "1970-01-01T00:00:01Z", "status": "pending"}"#,
        )
        .unwrap();
        assert_eq!(naive.created_at, 1);
        assert_eq!(zoned.created_at, 1);
    }

    #[test]
    fn test_created_at_iso_ordering_matches_time() {
        let earlier: InboxItem = serde_json::from_str(
            r#"{"id": "a", "content": "x", "source": "w",
                "created_at": "2026-08-30T10:00:00.500000", "status": "pending"}"#,
        )
        .unwrap();
        let later: InboxItem = serde_json::from_str(
            r#"{"id": "b", "content": "x", "source": "w",
                "created_at": "2026-08-30T10:00:01", "status": "pending"}"#,
        )
        .unwrap();
        assert!(later.created_at > earlier.created_at);
    }

    #[test]
    fn test_unknown_status_is_not_pending() {
        // Post-triage statuses the server invents ("approved", "discarded")
        // must not fail the whole snapshot; they fold into Actioned
        for status in ["approved", "discarded", "archived"] {
            let json = format!(
                r#"{{"id": "mem_3", "content": "x", "source": "w",
                    "created_at": 1, "status": "{status}"}}"#
            );
            let item: InboxItem = serde_json::from_str(&json).unwrap();
            assert_eq!(item.status, ItemStatus::Actioned);
            assert!(!item.is_pending());
        }
    }
}
