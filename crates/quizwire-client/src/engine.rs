//! Protocol engine state machine
//!
//! The engine performs no I/O. Every input (socket open, inbound frame,
//! socket close, command) returns the [`Action`]s the driver must carry out,
//! in order. This keeps the handshake sequence, the message counter and the
//! content dispatch testable without a socket.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, trace};

use quizwire_core::content::{
    AnswerReceipt, AnswerSubmission, DeviceInfo, FinishText, QuestionEnd, QuestionUpdate,
    QuizFinish, QuizMetadata, SubmissionMeta,
};
use quizwire_core::{
    codec, Advice, ClockSync, ContentKind, Envelope, Ext, Payload, TimeSync, BAYEUX_VERSION,
    CONNECTION_TYPE, CONNECT_CHANNEL, CONTROLLER_CHANNEL, DEFAULT_HOST, HANDSHAKE_CHANNEL,
    LOGIN_RESPONSE, LOGIN_TYPE, MESSAGE_TYPE, PLAYER_CHANNEL, STATUS_CHANNEL, SUBMIT_PAYLOAD_ID,
    SUBSCRIBE_CHANNEL, SUPPORTED_CONNECTION_TYPES,
};

use crate::error::{ClientError, Result};

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Disconnected,
    Connecting,
    Handshaking,
    Subscribing,
    Connected,
    Closed,
}

impl EngineState {
    /// Socket is open and outbound envelopes are accepted
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            EngineState::Handshaking | EngineState::Subscribing | EngineState::Connected
        )
    }
}

/// Typed events produced by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Open,
    Ready,
    Joined,
    QuizMetadata(QuizMetadata),
    QuestionUpdate(QuestionUpdate),
    QuestionStarted,
    QuestionEnded(QuestionEnd),
    AnswerAcknowledged(AnswerReceipt),
    QuizFinished(QuizFinish),
    FinishText(FinishText),
    QuizEnded,
    Close,
    /// Server-reported error value, verbatim
    Error(Value),
}

/// Work the driver performs on behalf of the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send(Envelope),
    Emit(EngineEvent),
    Close,
}

/// Immutable connection parameters
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// Externally issued session identifier
    pub session: String,
    /// Join token resolved for the session
    pub token: String,
}

impl ConnectionParams {
    pub fn new(session: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            token: token.into(),
        }
    }

    /// Socket URL for these parameters under `endpoint`
    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}/{}",
            endpoint.trim_end_matches('/'),
            self.session,
            self.token
        )
    }
}

/// Values reported in login and submission payloads
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub host: String,
    pub lag: u32,
    pub device: DeviceInfo,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            lag: 30,
            device: DeviceInfo::default(),
        }
    }
}

/// The protocol engine
#[derive(Debug)]
pub struct Engine {
    params: ConnectionParams,
    config: EngineConfig,
    state: EngineState,
    client_id: Option<String>,
    msg_id: u64,
    clock: ClockSync,
    seen_metadata: bool,
    /// Index of the last announced question
    current_question: Option<i64>,
}

impl Engine {
    pub fn new(params: ConnectionParams, config: EngineConfig) -> Self {
        Self {
            params,
            config,
            state: EngineState::Disconnected,
            client_id: None,
            msg_id: 0,
            clock: ClockSync::new(),
            seen_metadata: false,
            current_question: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Identifier of the most recently built outbound envelope
    pub fn last_message_id(&self) -> u64 {
        self.msg_id
    }

    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Connected
    }

    /// The driver is opening the socket
    pub fn begin_connect(&mut self) {
        if self.state == EngineState::Disconnected {
            self.state = EngineState::Connecting;
        }
    }

    /// Socket opened: announce and start the handshake
    pub fn on_open(&mut self, now: i64) -> Vec<Action> {
        if self.state != EngineState::Connecting {
            debug!("Ignoring open signal in state {:?}", self.state);
            return Vec::new();
        }
        self.state = EngineState::Handshaking;

        let mut handshake = Envelope::new(HANDSHAKE_CHANNEL)
            .with_advice(Advice::handshake())
            .with_ext(Ext {
                ack: Some(Value::Bool(true)),
                timesync: Some(TimeSync::request(now)),
            })
            .with_id(self.next_id());
        handshake.version = Some(BAYEUX_VERSION.to_string());
        handshake.minimum_version = Some(BAYEUX_VERSION.to_string());
        handshake.supported_connection_types = Some(
            SUPPORTED_CONNECTION_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        );

        vec![
            Action::Emit(EngineEvent::Open),
            Action::Send(handshake),
        ]
    }

    /// Socket closed, by the transport or by the engine itself
    pub fn on_close(&mut self) -> Vec<Action> {
        if self.state == EngineState::Closed {
            return Vec::new();
        }
        info!("Connection closed in state {:?}", self.state);
        self.state = EngineState::Closed;
        vec![Action::Emit(EngineEvent::Close)]
    }

    /// Request a close of the socket
    pub fn close(&mut self) -> Vec<Action> {
        if self.state == EngineState::Closed {
            return Vec::new();
        }
        vec![Action::Close]
    }

    /// Handle one inbound frame
    pub fn on_frame(&mut self, frame: &str, now: i64) -> Vec<Action> {
        if !self.state.is_open() {
            trace!("Dropping frame in state {:?}", self.state);
            return Vec::new();
        }

        let envelope = match codec::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("Ignoring malformed frame: {}", e);
                return Vec::new();
            }
        };

        self.on_envelope(&envelope, now)
    }

    /// Handle one decoded inbound envelope
    pub fn on_envelope(&mut self, envelope: &Envelope, now: i64) -> Vec<Action> {
        if !self.state.is_open() {
            trace!("Dropping envelope on {} in state {:?}", envelope.channel, self.state);
            return Vec::new();
        }

        let mut actions = Vec::new();

        if envelope.channel == HANDSHAKE_CHANNEL && envelope.client_id.is_some() {
            self.on_handshake(envelope, now, &mut actions);
        } else if envelope.channel == SUBSCRIBE_CHANNEL {
            self.on_subscribe(envelope, now, &mut actions);
        } else if let Some(payload) = &envelope.data {
            if let Some(error) = payload.error() {
                actions.push(Action::Emit(EngineEvent::Error(error.clone())));
                return actions;
            }
            self.on_payload(payload, &mut actions);
        }

        let closing = actions.contains(&Action::Close);
        if !closing
            && envelope.timesync().is_some()
            && envelope.channel != HANDSHAKE_CHANNEL
            && envelope.channel != SUBSCRIBE_CHANNEL
        {
            let ack = self.respond(envelope, now);
            actions.push(Action::Send(ack));
        }

        actions
    }

    /// Send a login request. Valid once the engine is ready.
    pub fn login(&mut self, name: &str) -> Result<Vec<Action>> {
        self.ensure_ready()?;

        let payload = Payload {
            gameid: Some(self.params.session.clone()),
            host: Some(self.config.host.clone()),
            name: Some(name.to_string()),
            kind: Some(LOGIN_TYPE.to_string()),
            ..Default::default()
        };
        let envelope = self.controller_envelope(payload);

        Ok(vec![Action::Send(envelope)])
    }

    /// Submit an answer choice. Valid once the engine is ready.
    pub fn submit_answer(&mut self, choice: u32) -> Result<Vec<Action>> {
        self.ensure_ready()?;

        let submission = AnswerSubmission {
            choice,
            meta: SubmissionMeta {
                lag: self.config.lag,
                device: self.config.device.clone(),
            },
        };
        let payload = Payload {
            content: Some(codec::encode_content(&submission)?),
            gameid: Some(self.params.session.clone()),
            host: Some(self.config.host.clone()),
            id: Some(Value::from(SUBMIT_PAYLOAD_ID)),
            kind: Some(MESSAGE_TYPE.to_string()),
            ..Default::default()
        };
        let envelope = self.controller_envelope(payload);

        Ok(vec![Action::Send(envelope)])
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state {
            EngineState::Connected => Ok(()),
            EngineState::Closed | EngineState::Disconnected => Err(ClientError::NotConnected),
            _ => Err(ClientError::NotReady),
        }
    }

    fn on_handshake(&mut self, envelope: &Envelope, now: i64, actions: &mut Vec<Action>) {
        if self.state != EngineState::Handshaking {
            debug!("Ignoring handshake reply in state {:?}", self.state);
            return;
        }

        self.client_id = envelope.client_id.clone();
        info!("Handshake complete, client id: {:?}", self.client_id);

        let mut subscribe = self.respond(envelope, now);
        if let Some(ext) = subscribe.ext.as_mut() {
            ext.ack = None;
        }
        subscribe.channel = SUBSCRIBE_CHANNEL.to_string();
        subscribe.subscription = Some(CONTROLLER_CHANNEL.to_string());

        actions.push(Action::Send(subscribe));
        self.state = EngineState::Subscribing;
    }

    fn on_subscribe(&mut self, envelope: &Envelope, now: i64, actions: &mut Vec<Action>) {
        if envelope.subscription.as_deref() != Some(CONTROLLER_CHANNEL) || !envelope.is_successful() {
            return;
        }
        if self.state != EngineState::Subscribing {
            debug!("Ignoring repeated controller subscription in state {:?}", self.state);
            return;
        }

        let mut player = self.respond(envelope, now);
        player.channel = SUBSCRIBE_CHANNEL.to_string();
        player.subscription = Some(PLAYER_CHANNEL.to_string());

        let mut connect = self.respond(envelope, now);
        connect.channel = CONNECT_CHANNEL.to_string();
        connect.connection_type = Some(CONNECTION_TYPE.to_string());
        connect.advice = Some(Advice::connect());

        let mut status = self.respond(envelope, now);
        status.channel = SUBSCRIBE_CHANNEL.to_string();
        status.subscription = Some(STATUS_CHANNEL.to_string());

        actions.push(Action::Send(player));
        actions.push(Action::Send(connect));
        actions.push(Action::Send(status));
        actions.push(Action::Emit(EngineEvent::Ready));

        self.state = EngineState::Connected;
        info!("Subscriptions complete, engine ready");
    }

    fn on_payload(&mut self, payload: &Payload, actions: &mut Vec<Action>) {
        if payload.is_type(LOGIN_RESPONSE) {
            actions.push(Action::Emit(EngineEvent::Joined));
            return;
        }

        let Some(content) = payload.content() else {
            return;
        };
        let Some(code) = payload.content_id() else {
            trace!("Content without a kind");
            return;
        };

        match ContentKind::from_code(code) {
            ContentKind::QuestionUpdate => {
                if let Some(update) = parse::<QuestionUpdate>(content) {
                    let announce = match (self.current_question, update.question_index) {
                        (None, _) => true,
                        (Some(current), Some(index)) => index > current,
                        (Some(_), None) => false,
                    };
                    if announce {
                        self.current_question = update.question_index.or(self.current_question);
                        actions.push(Action::Emit(EngineEvent::QuestionUpdate(update)));
                    } else {
                        debug!("Skipping stale question update {:?}", update.question_index);
                    }
                }
            }
            ContentKind::QuestionStarted => {
                if parse::<Value>(content).is_some() {
                    actions.push(Action::Emit(EngineEvent::QuestionStarted));
                }
            }
            ContentKind::QuizFinished => {
                if let Some(finish) = parse::<QuizFinish>(content) {
                    actions.push(Action::Emit(EngineEvent::QuizFinished(finish)));
                }
            }
            ContentKind::AnswerAcknowledged => {
                if let Some(receipt) = parse::<AnswerReceipt>(content) {
                    actions.push(Action::Emit(EngineEvent::AnswerAcknowledged(receipt)));
                }
            }
            ContentKind::QuestionEnded => {
                if let Some(end) = parse::<QuestionEnd>(content) {
                    actions.push(Action::Emit(EngineEvent::QuestionEnded(end)));
                }
            }
            ContentKind::QuizMetadata => {
                if self.seen_metadata {
                    return;
                }
                if let Some(metadata) = parse::<QuizMetadata>(content) {
                    self.seen_metadata = true;
                    actions.push(Action::Emit(EngineEvent::QuizMetadata(metadata)));
                }
            }
            ContentKind::QuizEnded => {
                if parse::<Value>(content).is_some() {
                    actions.push(Action::Emit(EngineEvent::QuizEnded));
                    actions.push(Action::Close);
                }
            }
            ContentKind::FinishText => {
                if let Some(text) = parse::<FinishText>(content) {
                    actions.push(Action::Emit(EngineEvent::FinishText(text)));
                }
            }
            ContentKind::Unknown(code) => {
                trace!("Ignoring content kind {}", code);
            }
        }
    }

    /// Build a reply to an inbound envelope on the same channel, carrying
    /// fresh timesync fields and the next message id
    fn respond(&mut self, inbound: &Envelope, now: i64) -> Envelope {
        let timesync = match inbound.timesync() {
            Some(timesync) => self.clock.sample(timesync, now),
            None => TimeSync::request(now),
        };
        let ack = inbound.ext.as_ref().and_then(|ext| ext.ack.clone());

        let mut reply = Envelope::new(&inbound.channel)
            .with_ext(Ext {
                ack,
                timesync: Some(timesync),
            })
            .with_id(self.next_id());
        reply.client_id = self.client_id.clone();
        reply
    }

    fn controller_envelope(&mut self, payload: Payload) -> Envelope {
        let mut envelope = Envelope::new(CONTROLLER_CHANNEL)
            .with_data(payload)
            .with_id(self.next_id());
        envelope.client_id = self.client_id.clone();
        envelope
    }

    fn next_id(&mut self) -> u64 {
        self.msg_id += 1;
        self.msg_id
    }
}

fn parse<T: DeserializeOwned>(content: &str) -> Option<T> {
    match codec::decode_content(content) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Ignoring malformed content: {}", e);
            None
        }
    }
}
