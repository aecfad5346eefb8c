//! Common test helpers and utilities for QuizWire tests
//!
//! This crate provides:
//! - A scripted quiz server speaking the Bayeux handshake over WebSocket
//! - Condition-based waiting (no hardcoded sleeps)
//! - Tracing setup for test output

use parking_lot::Mutex;
use quizwire_core::{
    codec, time::now_millis, Envelope, Ext, Payload, TimeSync, CONNECT_CHANNEL,
    CONTROLLER_CHANNEL, HANDSHAKE_CHANNEL, LOGIN_RESPONSE, LOGIN_TYPE, MESSAGE_TYPE,
    PLAYER_CHANNEL, SUBSCRIBE_CHANNEL,
};
use quizwire_transport::{
    TransportEvent, TransportReceiver, TransportSender, TransportServer, WebSocketServer,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tracing::debug;

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Tracing
// ============================================================================

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check() {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    check()
}

// ============================================================================
// Mock Quiz Server
// ============================================================================

/// How the mock server answers the client
#[derive(Debug, Clone)]
pub struct ServerScript {
    /// Client id handed out in the handshake reply
    pub client_id: String,
    /// Error value returned for login instead of a login response
    pub login_error: Option<Value>,
    /// Confirm each answer submission with a kind 7 payload
    pub confirm_answers: bool,
    /// Reply to the controller subscription at all
    pub answer_subscribe: bool,
}

impl Default for ServerScript {
    fn default() -> Self {
        Self {
            client_id: uuid::Uuid::new_v4().simple().to_string(),
            login_error: None,
            confirm_answers: true,
            answer_subscribe: true,
        }
    }
}

enum Outbound {
    Frame(String),
    Close,
}

#[derive(Default)]
struct ServerState {
    received: Mutex<Vec<Envelope>>,
    clients: Mutex<Vec<mpsc::UnboundedSender<Outbound>>>,
    connections: AtomicU32,
    notify: Notify,
}

/// A scripted server that automatically shuts down on drop
pub struct MockQuizServer {
    port: u16,
    handle: Option<tokio::task::JoinHandle<()>>,
    state: Arc<ServerState>,
}

impl MockQuizServer {
    /// Start a server with the default script
    pub async fn start() -> Self {
        Self::start_with(ServerScript::default()).await
    }

    /// Start a server with a custom script
    pub async fn start_with(script: ServerScript) -> Self {
        let mut server = WebSocketServer::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let port = server.local_addr().expect("mock server address").port();
        let state = Arc::new(ServerState::default());
        let accept_state = state.clone();

        let handle = tokio::spawn(async move {
            while let Ok((sender, receiver, addr)) = server.accept().await {
                debug!("Mock server accepted {}", addr);
                accept_state.connections.fetch_add(1, Ordering::SeqCst);
                let (tx, rx) = mpsc::unbounded_channel();
                accept_state.clients.lock().push(tx);
                tokio::spawn(serve(sender, receiver, rx, script.clone(), accept_state.clone()));
            }
        });

        Self {
            port,
            handle: Some(handle),
            state,
        }
    }

    /// Endpoint URL; the client appends session and token to it
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/cometd", self.port)
    }

    /// Number of sockets accepted so far
    pub fn connections(&self) -> u32 {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Every envelope received from clients, in arrival order
    pub fn received(&self) -> Vec<Envelope> {
        self.state.received.lock().clone()
    }

    /// Envelopes received on one channel
    pub fn received_on(&self, channel: &str) -> Vec<Envelope> {
        self.received()
            .into_iter()
            .filter(|e| e.channel == channel)
            .collect()
    }

    /// Wait until at least `count` envelopes matching `filter` have arrived
    pub async fn wait_for_received<F>(&self, count: usize, filter: F) -> bool
    where
        F: Fn(&Envelope) -> bool,
    {
        let deadline = Instant::now() + DEFAULT_TIMEOUT;
        loop {
            let notified = self.state.notify.notified();
            if self.state.received.lock().iter().filter(|e| filter(*e)).count() >= count {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || tokio::time::timeout(remaining, notified).await.is_err() {
                return false;
            }
        }
    }

    /// Push a raw frame to every connected client
    pub fn push_raw(&self, frame: impl Into<String>) {
        let frame = frame.into();
        for client in self.state.clients.lock().iter() {
            let _ = client.send(Outbound::Frame(frame.clone()));
        }
    }

    /// Push a content payload of `kind` on the player channel
    pub fn push_content(&self, kind: u32, content: Value) {
        self.push_raw(content_frame(kind, &content, true));
    }

    /// Push a payload carrying a server error
    pub fn push_error(&self, error: Value) {
        let frame = json!([{
            "channel": PLAYER_CHANNEL,
            "data": {"error": error},
        }]);
        self.push_raw(frame.to_string());
    }

    /// Close every client socket from the server side
    pub fn disconnect_clients(&self) {
        for client in self.state.clients.lock().drain(..) {
            let _ = client.send(Outbound::Close);
        }
    }

    /// Stop the server explicitly (also happens on drop)
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for MockQuizServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Frame carrying a content payload, optionally with timesync metadata
pub fn content_frame(kind: u32, content: &Value, timesync: bool) -> String {
    let mut envelope = json!({
        "channel": PLAYER_CHANNEL,
        "data": {"id": kind, "content": content.to_string()},
    });
    if timesync {
        let now = now_millis();
        envelope["ext"] = json!({"timesync": {"tc": now, "ts": now, "p": 0}});
    }
    json!([envelope]).to_string()
}

async fn serve<S: TransportSender, R: TransportReceiver>(
    sender: S,
    mut receiver: R,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    script: ServerScript,
    state: Arc<ServerState>,
) {
    loop {
        tokio::select! {
            event = receiver.recv() => match event {
                Some(TransportEvent::Data(frame)) => {
                    let Ok(envelope) = codec::decode(&frame) else {
                        continue;
                    };
                    state.received.lock().push(envelope.clone());
                    state.notify.notify_waiters();
                    for reply in respond(&script, &envelope) {
                        if let Ok(frame) = codec::encode(&reply) {
                            let _ = sender.send(frame).await;
                        }
                    }
                }
                Some(TransportEvent::Disconnected { .. }) | None => break,
                Some(_) => {}
            },
            command = outbound.recv() => match command {
                Some(Outbound::Frame(frame)) => {
                    let _ = sender.send(frame).await;
                }
                Some(Outbound::Close) | None => {
                    let _ = sender.close().await;
                    break;
                }
            },
        }
    }
}

fn respond(script: &ServerScript, inbound: &Envelope) -> Vec<Envelope> {
    let client_tc = inbound.timesync().and_then(|t| t.tc);
    let server_ext = || Ext {
        ack: None,
        timesync: Some(TimeSync {
            tc: client_tc,
            ts: Some(now_millis()),
            p: Some(0),
            ..Default::default()
        }),
    };

    match inbound.channel.as_str() {
        HANDSHAKE_CHANNEL => {
            let mut reply = Envelope::new(HANDSHAKE_CHANNEL)
                .with_client_id(script.client_id.clone())
                .with_ext(server_ext());
            reply.successful = Some(true);
            reply.id = inbound.id.clone();
            vec![reply]
        }
        SUBSCRIBE_CHANNEL => {
            let subscription = inbound.subscription.clone().unwrap_or_default();
            if subscription == CONTROLLER_CHANNEL && !script.answer_subscribe {
                return Vec::new();
            }
            let mut reply = Envelope::new(SUBSCRIBE_CHANNEL).with_subscription(&subscription);
            reply.successful = Some(true);
            reply.id = inbound.id.clone();
            vec![reply]
        }
        // Connect is held open by real servers; never answer it here
        CONNECT_CHANNEL => Vec::new(),
        CONTROLLER_CHANNEL => {
            let Some(data) = &inbound.data else {
                return Vec::new();
            };
            if data.is_type(LOGIN_TYPE) {
                let payload = match &script.login_error {
                    Some(error) => Payload {
                        error: Some(error.clone()),
                        ..Default::default()
                    },
                    None => Payload {
                        kind: Some(LOGIN_RESPONSE.to_string()),
                        ..Default::default()
                    },
                };
                vec![Envelope::new(CONTROLLER_CHANNEL).with_data(payload)]
            } else if data.is_type(MESSAGE_TYPE) && script.confirm_answers {
                let content = json!({"primaryMessage": "Answer received"}).to_string();
                let payload = Payload {
                    content: Some(content),
                    id: Some(json!(7)),
                    ..Default::default()
                };
                vec![Envelope::new(PLAYER_CHANNEL).with_data(payload)]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}
