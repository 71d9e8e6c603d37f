//! Persistent push connection to the vault backend.
//!
//! One WebSocket per user/session identifier, with an explicit lifecycle:
//! `disconnected -> connecting -> connected -> (closed) -> connecting ...`
//! Unexpected closes reconnect forever with jittered exponential backoff;
//! the shutdown watch is checked before every scheduled retry so teardown is
//! deterministic. A bad URL or a rejected credential is terminal (`Failed`)
//! and never loops.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CoreConfig;
use crate::constants::{RECONNECT_BASE_DELAY, RECONNECT_MAX_DELAY};
use crate::error::TransportError;
use crate::models::{ConnectionState, ConnectionStatus};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a connected session ended.
enum SessionEnd {
    /// Server closed or the stream errored; reconnect
    Closed(String),
    /// Shutdown requested; do not reconnect
    Shutdown,
}

pub struct PushChannel {
    url: String,
    state_tx: watch::Sender<ConnectionState>,
}

impl PushChannel {
    /// Build a channel for this session's push URL. The returned receiver
    /// observes every connection-state transition.
    pub fn new(config: &CoreConfig) -> (Self, watch::Receiver<ConnectionState>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::disconnected());
        (
            Self {
                url: config.push_url(),
                state_tx,
            },
            state_rx,
        )
    }

    /// Run the connection loop until shutdown. Text frames are forwarded raw
    /// to `raw_tx`; decoding happens downstream so a malformed frame can
    /// never take the connection down.
    pub async fn run(self, raw_tx: mpsc::UnboundedSender<String>, mut shutdown: watch::Receiver<bool>) {
        // Validate up front: an unparseable URL must not enter the retry loop
        if let Err(e) = Url::parse(&self.url) {
            let err = TransportError::InvalidUrl(e.to_string());
            warn!(url = %self.url, %err, "push channel failed");
            self.set_state(ConnectionStatus::Failed, 0, Some(err.to_string()));
            return;
        }

        let mut retry_count: u32 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(ConnectionStatus::Connecting, retry_count, None);
            match connect_async(self.url.as_str()).await {
                Ok((stream, _response)) => {
                    info!(url = %self.url, "push channel connected");
                    retry_count = 0;
                    self.set_state(ConnectionStatus::Connected, 0, None);

                    match Self::read_frames(stream, &raw_tx, &mut shutdown).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Closed(reason) => {
                            debug!(%reason, "push connection closed; will reconnect");
                            self.set_state(ConnectionStatus::Disconnected, 0, Some(reason));
                        }
                    }
                }
                Err(WsError::Http(response)) if is_auth_status(response.status().as_u16()) => {
                    // Rejected credentials will not fix themselves; surface a
                    // terminal failure and require an explicit re-connect.
                    let err = TransportError::Unauthorized {
                        status: response.status().as_u16(),
                    };
                    warn!(%err, "push channel failed");
                    self.set_state(ConnectionStatus::Failed, retry_count, Some(err.to_string()));
                    return;
                }
                Err(e) => {
                    let err = TransportError::from(e);
                    debug!(%err, retry_count, "push connect failed");
                    self.set_state(
                        ConnectionStatus::Disconnected,
                        retry_count,
                        Some(err.to_string()),
                    );
                }
            }

            retry_count += 1;
            let delay = jittered(backoff_ceiling(retry_count));
            debug!(retry_count, ?delay, "scheduling push reconnect");
            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("push channel torn down");
        self.set_state(ConnectionStatus::Disconnected, 0, None);
    }

    async fn read_frames(
        mut stream: WsStream,
        raw_tx: &mpsc::UnboundedSender<String>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = stream.close(None).await;
                        return SessionEnd::Shutdown;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if raw_tx.send(text).is_err() {
                            // Receiver dropped: the runtime is gone
                            return SessionEnd::Shutdown;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = stream.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "server close".to_string());
                        return SessionEnd::Closed(reason);
                    }
                    Some(Ok(_)) => {} // pongs, binary: ignored
                    Some(Err(e)) => return SessionEnd::Closed(e.to_string()),
                    None => return SessionEnd::Closed("stream ended".to_string()),
                }
            }
        }
    }

    fn set_state(&self, status: ConnectionStatus, retry_count: u32, last_error: Option<String>) {
        let _ = self.state_tx.send(ConnectionState {
            status,
            retry_count,
            last_error,
        });
    }
}

fn is_auth_status(status: u16) -> bool {
    status == 401 || status == 403
}

/// Backoff ceiling for the nth consecutive failed attempt (1-based):
/// 1s, 2s, 4s, ... capped at 30s.
fn backoff_ceiling(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let candidate = RECONNECT_BASE_DELAY.saturating_mul(1 << exp);
    candidate.min(RECONNECT_MAX_DELAY)
}

/// Uniform jitter in `[ceiling/2, ceiling]`, keeping consecutive delays
/// non-decreasing up to jitter while still spreading reconnect storms.
fn jittered(ceiling: Duration) -> Duration {
    let ceiling_ms = ceiling.as_millis() as u64;
    let floor_ms = ceiling_ms / 2;
    Duration::from_millis(rand::thread_rng().gen_range(floor_ms..=ceiling_ms))
}
