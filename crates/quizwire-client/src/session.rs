//! Session orchestration
//!
//! A [`Session`] drives one engine connection: it logs in once the engine
//! is ready, turns engine events into quiz snapshots, and exposes answer
//! submission as a request that completes on the server's confirmation.

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use quizwire_transport::{WebSocketConfig, WebSocketTransport};

use crate::builder::{ClientConfig, SessionBuilder};
use crate::connection::{Connection, EngineEvents, EngineHandle};
use crate::engine::{ConnectionParams, Engine, EngineEvent};
use crate::error::{ClientError, Result};
use crate::quiz::{AnswerConfirmation, PodiumText, Question, QuestionResult, Quiz, QuizResult};

/// Events re-exposed to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Ready,
    Joined,
    QuizStart(Quiz),
    Question(Question),
    QuestionStart(Option<Question>),
    QuestionEnd(QuestionResult),
    QuestionSubmit(AnswerConfirmation),
    FinishText(PodiumText),
    Finish(QuizResult),
    QuizEnd,
    Disconnect,
    Error(Value),
}

#[derive(Debug, Default)]
struct SessionState {
    quiz: Option<Quiz>,
    current_question: Option<Question>,
    last_result: Option<QuestionResult>,
    nemesis: Option<Value>,
}

type PendingAnswer = Arc<Mutex<Option<oneshot::Sender<AnswerConfirmation>>>>;

/// A joined quiz session
pub struct Session {
    session_id: String,
    name: String,
    handle: EngineHandle,
    state: Arc<RwLock<SessionState>>,
    pending: PendingAnswer,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl Session {
    /// Create a builder
    pub fn builder(session: &str, name: &str) -> SessionBuilder {
        SessionBuilder::new(session, name)
    }

    /// Join with an already resolved token and default settings
    pub async fn join(session: &str, name: &str, token: &str) -> Result<Self> {
        SessionBuilder::new(session, name).token(token).join().await
    }

    pub(crate) async fn connect(
        config: ClientConfig,
        session: &str,
        token: &str,
        name: &str,
    ) -> Result<Self> {
        let params = ConnectionParams::new(session, token);
        let url = params.url(&config.endpoint);

        let transport = WebSocketTransport::with_config(WebSocketConfig {
            origin: Some(config.origin.clone()),
            max_message_size: config.max_message_size,
            ..Default::default()
        });
        let engine = Engine::new(params, config.engine.clone());

        info!("Joining session {} as {}", session, name);
        let (handle, mut engine_events) = Connection::open(&transport, &url, engine).await?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let router = EventRouter {
            state: Arc::new(RwLock::new(SessionState::default())),
            pending: Arc::new(Mutex::new(None)),
            events: config.queue_events.then_some(event_tx),
        };

        let login = wait_for_join(&handle, &router, &mut engine_events, name);
        let joined = match config.join_timeout {
            Some(limit) => tokio::time::timeout(limit, login)
                .await
                .unwrap_or(Err(ClientError::Timeout)),
            None => login.await,
        };
        if let Err(e) = joined {
            warn!("Join failed: {}", e);
            handle.close();
            return Err(e);
        }

        info!("Joined session {}", session);
        router.emit(SessionEvent::Ready);
        router.emit(SessionEvent::Joined);

        let state = router.state.clone();
        let pending = router.pending.clone();
        tokio::spawn(router.run(engine_events));

        Ok(Self {
            session_id: session.to_string(),
            name: name.to_string(),
            handle,
            state,
            pending,
            events: tokio::sync::Mutex::new(event_rx),
        })
    }

    /// Submit an answer and wait for the server to confirm it
    ///
    /// Only one answer may await confirmation at a time; overlapping calls
    /// fail with [`ClientError::AnswerPending`].
    pub async fn answer(&self, choice: u32) -> Result<AnswerConfirmation> {
        let confirmation = {
            let mut pending = self.pending.lock();
            if pending.as_ref().is_some_and(|tx| !tx.is_closed()) {
                return Err(ClientError::AnswerPending);
            }
            let (tx, rx) = oneshot::channel();
            *pending = Some(tx);
            rx
        };

        if let Err(e) = self.handle.submit_answer(choice) {
            self.pending.lock().take();
            return Err(e);
        }
        debug!("Submitted choice {}", choice);

        confirmation.await.map_err(|_| ClientError::NotConnected)
    }

    /// Next event from the session, or `None` once the connection is gone
    ///
    /// Events queue without bound until read. With event queueing disabled
    /// this returns `None` immediately.
    pub async fn next_event(&self) -> Option<SessionEvent> {
        self.events.lock().await.recv().await
    }

    /// Leave the session by closing the socket
    pub fn leave(&self) {
        self.handle.close();
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client_id(&self) -> Option<String> {
        self.handle.client_id()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    pub fn quiz(&self) -> Option<Quiz> {
        self.state.read().quiz.clone()
    }

    pub fn current_question(&self) -> Option<Question> {
        self.state.read().current_question.clone()
    }

    /// Outcome of the most recently ended question
    pub fn last_result(&self) -> Option<QuestionResult> {
        self.state.read().last_result.clone()
    }

    /// Player ranked just ahead, as of the last question
    pub fn nemesis(&self) -> Option<Value> {
        self.state.read().nemesis.clone()
    }

    /// Outbound envelopes dropped by the transport so far
    pub fn send_failures(&self) -> u64 {
        self.handle.send_failures()
    }
}

async fn wait_for_join(
    handle: &EngineHandle,
    router: &EventRouter,
    events: &mut EngineEvents,
    name: &str,
) -> Result<()> {
    loop {
        match events.recv().await {
            Some(EngineEvent::Ready) => handle.login(name)?,
            Some(EngineEvent::Joined) => return Ok(()),
            Some(EngineEvent::Error(value)) => return Err(ClientError::JoinFailed(value)),
            Some(EngineEvent::Close) | None => {
                return Err(ClientError::ConnectionFailed(
                    "connection closed before join".to_string(),
                ))
            }
            Some(other) => router.dispatch(other),
        }
    }
}

/// Turns engine events into snapshots and session events
struct EventRouter {
    state: Arc<RwLock<SessionState>>,
    pending: PendingAnswer,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventRouter {
    async fn run(self, mut events: EngineEvents) {
        while let Some(event) = events.recv().await {
            self.dispatch(event);
        }
        // Fail any waiter still holding on
        self.pending.lock().take();
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn dispatch(&self, event: EngineEvent) {
        match event {
            EngineEvent::Open | EngineEvent::Ready | EngineEvent::Joined => {
                debug!("Ignoring {:?} outside join", event);
            }
            EngineEvent::QuizMetadata(metadata) => {
                let quiz = Quiz::from(metadata);
                self.state.write().quiz = Some(quiz.clone());
                self.emit(SessionEvent::QuizStart(quiz));
            }
            EngineEvent::QuestionUpdate(update) => {
                let question = Question::from(update);
                {
                    let mut state = self.state.write();
                    if let Some(quiz) = state.quiz.as_mut() {
                        quiz.current_question = Some(question.clone());
                    }
                    state.current_question = Some(question.clone());
                }
                self.emit(SessionEvent::Question(question));
            }
            EngineEvent::QuestionStarted => {
                let question = self.state.read().current_question.clone();
                self.emit(SessionEvent::QuestionStart(question));
            }
            EngineEvent::QuestionEnded(end) => {
                let result = {
                    let mut state = self.state.write();
                    let result = QuestionResult::new(end, state.current_question.clone());
                    state.nemesis = result.nemesis.clone();
                    state.last_result = Some(result.clone());
                    result
                };
                self.emit(SessionEvent::QuestionEnd(result));
            }
            EngineEvent::AnswerAcknowledged(receipt) => {
                let question = self.state.read().current_question.clone();
                let confirmation = AnswerConfirmation::new(receipt, question);
                if let Some(tx) = self.pending.lock().take() {
                    let _ = tx.send(confirmation.clone());
                }
                self.emit(SessionEvent::QuestionSubmit(confirmation));
            }
            EngineEvent::QuizFinished(finish) => {
                self.emit(SessionEvent::Finish(QuizResult::from(finish)));
            }
            EngineEvent::FinishText(text) => {
                self.emit(SessionEvent::FinishText(PodiumText::from(text)));
            }
            EngineEvent::QuizEnded => {
                self.emit(SessionEvent::QuizEnd);
            }
            EngineEvent::Close => {
                self.pending.lock().take();
                self.emit(SessionEvent::Disconnect);
            }
            EngineEvent::Error(value) => {
                self.emit(SessionEvent::Error(value));
            }
        }
    }
}
