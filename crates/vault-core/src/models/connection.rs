/// Push-channel lifecycle. `Failed` is terminal (bad URL or rejected
/// credentials) and requires an explicit re-connect; every other transition
/// is driven by the reconnect loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Process-wide connection state, owned by the push channel and published
/// through a watch channel. Reset on every successful reconnect.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl ConnectionState {
    pub fn disconnected() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            retry_count: 0,
            last_error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::disconnected()
    }
}
