//! HTTP access to the inbox REST endpoints.
//!
//! The fetch side is deliberately plain: one attempt, no retries. Snapshot
//! fetches are idempotent and cheap to re-issue, so retry policy belongs to
//! the caller (the runtime's debounced refresh loop).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::CoreConfig;
use crate::error::{ActionError, FetchError};
use crate::models::{ActionKind, Cluster, InboxItem, Snapshot};

/// Seam between the subsystem and the REST backend. Implemented by
/// [`HttpInboxApi`] in production and by mocks in tests.
#[async_trait]
pub trait InboxApi: Send + Sync {
    /// Pull an authoritative inbox snapshot. Single attempt.
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError>;

    /// Submit one user action. Single attempt; the dispatcher owns retries.
    async fn submit_action(
        &self,
        item_id: &str,
        kind: ActionKind,
        payload: Option<&Value>,
    ) -> Result<(), ActionError>;
}

pub struct HttpInboxApi {
    client: reqwest::Client,
    api_base: String,
    bearer_token: Option<String>,
}

impl HttpInboxApi {
    pub fn new(config: &CoreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.get(format!("{}{path}", self.api_base));
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, FetchError> {
        let response = self
            .get(path)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::Unauthorized),
            status if !status.is_success() => Err(FetchError::Status {
                status: status.as_u16(),
            }),
            _ => response
                .json()
                .await
                .map_err(|e| FetchError::Network(e.to_string())),
        }
    }
}

#[async_trait]
impl InboxApi for HttpInboxApi {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        let (items, clusters): (Vec<InboxItem>, Vec<Cluster>) = tokio::try_join!(
            self.fetch_json("/inbox/"),
            self.fetch_json("/inbox/clusters"),
        )?;
        debug!(
            items = items.len(),
            clusters = clusters.len(),
            "fetched inbox snapshot"
        );
        Ok(Snapshot { items, clusters })
    }

    async fn submit_action(
        &self,
        item_id: &str,
        kind: ActionKind,
        payload: Option<&Value>,
    ) -> Result<(), ActionError> {
        let mut req = self.client.post(format!(
            "{}/inbox/{}/action",
            self.api_base, item_id
        ));
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }

        let body = json!({
            "action": kind.as_str(),
            "payload": payload,
        });

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(|e| ActionError::NetworkFailure(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ActionError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ActionError::ItemGone {
                item_id: item_id.to_string(),
            }),
            status => Err(ActionError::ServerRejected {
                status: status.as_u16(),
            }),
        }
    }
}
