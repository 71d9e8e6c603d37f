use std::time::Duration;

use crate::constants::{
    API_BASE_URL, PUSH_BASE_URL, REFRESH_DEBOUNCE, REQUEST_TIMEOUT, SUBMIT_DEADLINE,
};

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// REST API base, e.g. `http://localhost:8000/api/v1`
    pub api_base: String,
    /// Push endpoint base, e.g. `ws://localhost:8000`
    pub push_base: String,
    /// User/session identifier scoping the push connection
    pub endpoint_id: String,
    /// Bearer credential supplied by the auth provider
    pub bearer_token: Option<String>,
    pub request_timeout: Duration,
    pub refresh_debounce: Duration,
    pub submit_deadline: Duration,
}

impl CoreConfig {
    pub fn new(endpoint_id: impl Into<String>) -> Self {
        Self {
            api_base: API_BASE_URL.to_string(),
            push_base: PUSH_BASE_URL.to_string(),
            endpoint_id: endpoint_id.into(),
            bearer_token: None,
            request_timeout: REQUEST_TIMEOUT,
            refresh_debounce: REFRESH_DEBOUNCE,
            submit_deadline: SUBMIT_DEADLINE,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_push_base(mut self, base: impl Into<String>) -> Self {
        self.push_base = base.into();
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Full WebSocket URL for this session's push connection
    pub fn push_url(&self) -> String {
        format!("{}/ws/{}", self.push_base.trim_end_matches('/'), self.endpoint_id)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new("1")
    }
}
