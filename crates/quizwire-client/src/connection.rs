//! Async driver for the protocol engine
//!
//! One task owns the [`Engine`] and the socket. Raw transport events and
//! commands from [`EngineHandle`]s are both funneled into that task, so
//! engine state is only ever touched from a single place. Typed events leave
//! on their own channel.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use quizwire_core::{codec, time::now_millis, Envelope};
use quizwire_transport::{Transport, TransportEvent, TransportReceiver, TransportSender};

use crate::engine::{Action, Engine, EngineEvent, EngineState};
use crate::error::{ClientError, Result};

/// Receiver for typed engine events
pub type EngineEvents = mpsc::UnboundedReceiver<EngineEvent>;

#[derive(Debug)]
enum Command {
    Login(String),
    SubmitAnswer(u32),
    Close,
}

/// State mirrored out of the driver task for handles to read
#[derive(Debug)]
struct Shared {
    state: RwLock<EngineState>,
    client_id: RwLock<Option<String>>,
    send_failures: AtomicU64,
}

/// Cloneable handle for issuing commands to a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
}

impl EngineHandle {
    /// Send a login request. The `Joined` event confirms it.
    pub fn login(&self, name: &str) -> Result<()> {
        self.ensure_ready()?;
        self.command(Command::Login(name.to_string()))
    }

    /// Submit an answer. The `AnswerAcknowledged` event confirms it.
    pub fn submit_answer(&self, choice: u32) -> Result<()> {
        self.ensure_ready()?;
        self.command(Command::SubmitAnswer(choice))
    }

    /// Close the socket. Closing twice is a no-op.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    pub fn state(&self) -> EngineState {
        *self.shared.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Connected
    }

    pub fn client_id(&self) -> Option<String> {
        self.shared.client_id.read().clone()
    }

    /// Outbound envelopes that could not be encoded or written
    pub fn send_failures(&self) -> u64 {
        self.shared.send_failures.load(Ordering::Relaxed)
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            EngineState::Connected => Ok(()),
            EngineState::Closed => Err(ClientError::NotConnected),
            _ => Err(ClientError::NotReady),
        }
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::NotConnected)
    }
}

/// Entry point for running an engine over a transport
pub struct Connection;

impl Connection {
    /// Open the socket at `url` and start driving `engine` over it
    pub async fn open<T: Transport>(
        transport: &T,
        url: &str,
        mut engine: Engine,
    ) -> Result<(EngineHandle, EngineEvents)> {
        engine.begin_connect();

        let (sender, receiver) = transport
            .connect(url)
            .await
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            state: RwLock::new(engine.state()),
            client_id: RwLock::new(None),
            send_failures: AtomicU64::new(0),
        });

        let driver = Driver {
            engine,
            sender,
            events: event_tx,
            shared: shared.clone(),
        };
        tokio::spawn(driver.run(receiver, command_rx));

        let handle = EngineHandle {
            commands: command_tx,
            shared,
        };
        Ok((handle, event_rx))
    }
}

struct Driver<S> {
    engine: Engine,
    sender: S,
    events: mpsc::UnboundedSender<EngineEvent>,
    shared: Arc<Shared>,
}

impl<S: TransportSender> Driver<S> {
    async fn run<R: TransportReceiver>(
        mut self,
        mut receiver: R,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        loop {
            let actions = tokio::select! {
                event = receiver.recv() => match event {
                    Some(TransportEvent::Connected) => self.engine.on_open(now_millis()),
                    Some(TransportEvent::Data(frame)) => self.engine.on_frame(&frame, now_millis()),
                    Some(TransportEvent::Error(e)) => {
                        warn!("Transport error: {}", e);
                        continue;
                    }
                    Some(TransportEvent::Disconnected { reason }) => {
                        info!("Transport disconnected: {:?}", reason);
                        self.engine.on_close()
                    }
                    None => self.engine.on_close(),
                },
                command = commands.recv() => match command {
                    Some(Command::Login(name)) => self.command(|engine| engine.login(&name)),
                    Some(Command::SubmitAnswer(choice)) => {
                        self.command(|engine| engine.submit_answer(choice))
                    }
                    Some(Command::Close) | None => self.engine.close(),
                },
            };

            self.sync_shared();
            self.apply(actions).await;

            if self.engine.state() == EngineState::Closed {
                break;
            }
        }

        debug!("Engine driver stopped after {} messages", self.engine.last_message_id());
    }

    fn command<F>(&mut self, f: F) -> Vec<Action>
    where
        F: FnOnce(&mut Engine) -> Result<Vec<Action>>,
    {
        match f(&mut self.engine) {
            Ok(actions) => actions,
            Err(e) => {
                debug!("Command rejected: {}", e);
                Vec::new()
            }
        }
    }

    async fn apply(&mut self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();

        while let Some(action) = queue.pop_front() {
            match action {
                Action::Send(envelope) => {
                    if let Err(e) = self.send(&envelope).await {
                        warn!("Dropped outbound envelope on {}: {}", envelope.channel, e);
                        self.shared.send_failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Action::Emit(event) => {
                    // Consumer may have gone away; the engine keeps running
                    let _ = self.events.send(event);
                }
                Action::Close => {
                    if let Err(e) = self.sender.close().await {
                        debug!("Close failed: {}", e);
                    }
                    queue.extend(self.engine.on_close());
                    self.sync_shared();
                }
            }
        }
    }

    /// Write one envelope. Sends while the socket is closed are dropped.
    async fn send(&self, envelope: &Envelope) -> Result<()> {
        if !self.engine.state().is_open() || !self.sender.is_connected() {
            debug!("Not connected, dropping envelope on {}", envelope.channel);
            return Ok(());
        }
        let frame = codec::encode(envelope)?;
        self.sender.send(frame).await?;
        Ok(())
    }

    fn sync_shared(&self) {
        *self.shared.state.write() = self.engine.state();
        let client_id = self.engine.client_id();
        if self.shared.client_id.read().as_deref() != client_id {
            *self.shared.client_id.write() = client_id.map(str::to_string);
        }
    }
}
