//! Subsystem wiring and lifecycle.
//!
//! `CoreRuntime` owns the store and the background tasks: the push channel,
//! the decode loop, and the debounced refresh loop. Consumers interact
//! through a [`CoreHandle`] (submit actions, read state) and the
//! [`CoreEvent`] receiver; all store writes stay serialized behind the
//! shared lock.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::api::{ActionDispatcher, HttpInboxApi, InboxApi};
use crate::config::CoreConfig;
use crate::error::{ActionError, FetchError};
use crate::events::{self, CoreEvent};
use crate::models::{ActionKind, ActionOutcome, ConnectionState};
use crate::store::{shared_store, SharedStore};
use crate::transport::PushChannel;

/// Cloneable consumer-side handle to the running subsystem.
#[derive(Clone)]
pub struct CoreHandle {
    store: SharedStore,
    dispatcher: Arc<ActionDispatcher>,
}

impl CoreHandle {
    /// Submit a user action. Optimistic update applies before the network
    /// round trip; rollback and error surfacing happen automatically.
    pub async fn submit(
        &self,
        item_id: &str,
        kind: ActionKind,
        payload: Option<serde_json::Value>,
    ) -> Result<ActionOutcome, ActionError> {
        self.dispatcher.submit(item_id, kind, payload).await
    }

    /// Read-only access point to inbox state. Lock briefly; never across an
    /// await.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn count(&self) -> usize {
        self.store.lock().count()
    }
}

pub struct CoreRuntime {
    config: CoreConfig,
    api: Arc<dyn InboxApi>,
    store: SharedStore,
    dispatcher: Arc<ActionDispatcher>,
    events_tx: UnboundedSender<CoreEvent>,
    events_rx: Option<UnboundedReceiver<CoreEvent>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    /// Raw push frames flow in here from the channel task (and from tests)
    push_tx: UnboundedSender<String>,
    push_rx: Option<UnboundedReceiver<String>>,
    tasks: Vec<JoinHandle<()>>,
}

impl CoreRuntime {
    pub fn new(config: CoreConfig) -> Self {
        let api: Arc<dyn InboxApi> = Arc::new(HttpInboxApi::new(&config));
        Self::with_api(config, api)
    }

    /// Build against an explicit API implementation (the seam tests use).
    pub fn with_api(config: CoreConfig, api: Arc<dyn InboxApi>) -> Self {
        let store = shared_store();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let dispatcher = Arc::new(ActionDispatcher::new(
            api.clone(),
            store.clone(),
            events_tx.clone(),
            &config,
        ));
        Self {
            config,
            api,
            store,
            dispatcher,
            events_tx,
            events_rx: Some(events_rx),
            shutdown_tx,
            shutdown_rx,
            push_tx,
            push_rx: Some(push_rx),
            tasks: Vec::new(),
        }
    }

    /// Load the initial snapshot, spawn the background tasks, and hand back
    /// the consumer handle. An `Unauthorized` fetch error here must surface
    /// as a re-login prompt, not a silent retry.
    pub async fn start(&mut self) -> Result<CoreHandle, FetchError> {
        let snapshot = self.api.fetch_snapshot().await?;
        {
            let mut store = self.store.lock();
            store.load_snapshot(snapshot.items, snapshot.clusters);
        }
        self.notify_changed();

        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        self.spawn_channel();
        self.spawn_decode_loop(refresh_tx);
        self.spawn_refresh_loop(refresh_rx);

        Ok(self.handle())
    }

    pub fn handle(&self) -> CoreHandle {
        CoreHandle {
            store: self.store.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }

    /// Take the consumer-facing event stream. Can only be taken once.
    pub fn take_events(&mut self) -> Option<UnboundedReceiver<CoreEvent>> {
        self.events_rx.take()
    }

    /// Inject a raw push frame as if it arrived on the channel.
    pub fn push_sender(&self) -> UnboundedSender<String> {
        self.push_tx.clone()
    }

    /// Tear down: suppress reconnects, stop the loops, and join the tasks.
    /// In-flight action submissions are awaited by their callers and capped
    /// by the dispatcher's 60s deadline, never aborted mid-flight.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }

    fn spawn_channel(&mut self) {
        let (channel, mut state_rx) = PushChannel::new(&self.config);
        let raw_tx = self.push_tx.clone();
        let shutdown_rx = self.shutdown_rx.clone();
        self.tasks.push(tokio::spawn(channel.run(raw_tx, shutdown_rx)));

        // Forward connection transitions to the consumer
        let events_tx = self.events_tx.clone();
        self.tasks.push(tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                let state: ConnectionState = state_rx.borrow_and_update().clone();
                let _ = events_tx.send(CoreEvent::ConnectionChanged(state.status));
            }
        }));
    }

    fn spawn_decode_loop(&mut self, refresh_tx: UnboundedSender<()>) {
        let Some(mut push_rx) = self.push_rx.take() else {
            return;
        };
        let mut shutdown_rx = self.shutdown_rx.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    raw = push_rx.recv() => {
                        let Some(raw) = raw else { break };
                        match events::decode(&raw) {
                            Ok(event) => {
                                debug!(?event, "push event");
                                if event.triggers_refresh() {
                                    let _ = refresh_tx.send(());
                                }
                            }
                            // Recovered internally: log and keep listening
                            Err(e) => warn!(%e, %raw, "dropping undecodable push frame"),
                        }
                    }
                }
            }
        }));
    }

    fn spawn_refresh_loop(&mut self, mut refresh_rx: UnboundedReceiver<()>) {
        let api = self.api.clone();
        let store = self.store.clone();
        let events_tx = self.events_tx.clone();
        let debounce = self.config.refresh_debounce;
        let mut shutdown_rx = self.shutdown_rx.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    signal = refresh_rx.recv() => {
                        if signal.is_none() {
                            break;
                        }
                        // Collapse the burst: wait out the window, then drain
                        // whatever piled up so one fetch covers it all.
                        tokio::select! {
                            _ = sleep(debounce) => {}
                            _ = shutdown_rx.changed() => {
                                if *shutdown_rx.borrow() {
                                    break;
                                }
                            }
                        }
                        while refresh_rx.try_recv().is_ok() {}

                        match api.fetch_snapshot().await {
                            Ok(snapshot) => {
                                {
                                    let mut store = store.lock();
                                    store.load_snapshot(snapshot.items, snapshot.clusters);
                                }
                                let count = store.lock().count();
                                let _ = events_tx.send(CoreEvent::InboxChanged { count });
                            }
                            Err(e) => {
                                warn!(%e, "inbox refresh failed");
                                let _ = events_tx.send(CoreEvent::FetchFailed { error: e });
                            }
                        }
                    }
                }
            }
        }));
    }

    fn notify_changed(&self) {
        let count = self.store.lock().count();
        let _ = self.events_tx.send(CoreEvent::InboxChanged { count });
    }
}
