//! Session Tests (quizwire-client)
//!
//! End-to-end tests against the scripted quiz server:
//! - Join flow (handshake, subscriptions, login)
//! - Quiz snapshots built from pushed content
//! - Answer submission and confirmation
//! - Server errors and disconnects

use quizwire_client::{ClientError, Session, SessionEvent};
use quizwire_core::{CONNECT_CHANNEL, CONTROLLER_CHANNEL, PLAYER_CHANNEL, SUBSCRIBE_CHANNEL};
use quizwire_test_utils::{
    content_frame, init_tracing, wait_for, MockQuizServer, ServerScript, DEFAULT_CHECK_INTERVAL,
    DEFAULT_TIMEOUT,
};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

async fn join(server: &MockQuizServer, name: &str) -> Session {
    init_tracing();
    Session::builder("123456", name)
        .endpoint(&server.url())
        .origin("http://127.0.0.1/")
        .token("test-token")
        .join()
        .await
        .expect("join failed")
}

async fn next(session: &Session) -> SessionEvent {
    timeout(DEFAULT_TIMEOUT, session.next_event())
        .await
        .expect("timed out waiting for event")
        .expect("event stream ended")
}

/// Skip events until one matches
async fn next_matching<F>(session: &Session, mut accept: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    loop {
        let event = next(session).await;
        if accept(&event) {
            return event;
        }
    }
}

// ============================================================================
// Join
// ============================================================================

#[tokio::test]
async fn test_join_completes_bootstrap_sequence() {
    let server = MockQuizServer::start().await;
    let session = join(&server, "alice").await;

    assert!(session.is_connected());
    assert!(session.client_id().is_some());
    assert_eq!(next(&session).await, SessionEvent::Ready);
    assert_eq!(next(&session).await, SessionEvent::Joined);

    let channels: Vec<String> = server.received().into_iter().map(|e| e.channel).collect();
    assert_eq!(
        &channels[..6],
        &[
            "/meta/handshake",
            SUBSCRIBE_CHANNEL,
            SUBSCRIBE_CHANNEL,
            CONNECT_CHANNEL,
            SUBSCRIBE_CHANNEL,
            CONTROLLER_CHANNEL,
        ]
    );

    let login = &server.received_on(CONTROLLER_CHANNEL)[0];
    let data = login.data.as_ref().unwrap();
    assert_eq!(data.name.as_deref(), Some("alice"));
    assert_eq!(data.gameid.as_deref(), Some("123456"));
    assert_eq!(login.client_id, session.client_id());
}

#[tokio::test]
async fn test_join_uses_a_single_socket() {
    let server = MockQuizServer::start().await;
    let session = join(&server, "alice").await;

    assert!(wait_for(|| server.connections() == 1, DEFAULT_CHECK_INTERVAL, DEFAULT_TIMEOUT).await);
    session.leave();
    next_matching(&session, |e| *e == SessionEvent::Disconnect).await;
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn test_message_ids_are_sequential_on_the_wire() {
    let server = MockQuizServer::start().await;
    let _session = join(&server, "alice").await;

    let ids: Vec<u64> = server
        .received()
        .iter()
        .map(|e| e.id.as_deref().unwrap().parse().unwrap())
        .collect();
    let expected: Vec<u64> = (1..=ids.len() as u64).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_join_rejected_by_server() {
    init_tracing();
    let server = MockQuizServer::start_with(ServerScript {
        login_error: Some(json!("NONEXISTING_SESSION")),
        ..Default::default()
    })
    .await;

    let result = Session::builder("123456", "alice")
        .endpoint(&server.url())
        .token("t")
        .join()
        .await;

    match result {
        Err(ClientError::JoinFailed(value)) => assert_eq!(value, json!("NONEXISTING_SESSION")),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("join should fail"),
    }
}

#[tokio::test]
async fn test_join_times_out_without_subscription_reply() {
    init_tracing();
    let server = MockQuizServer::start_with(ServerScript {
        answer_subscribe: false,
        ..Default::default()
    })
    .await;

    let result = Session::builder("123456", "alice")
        .endpoint(&server.url())
        .token("t")
        .join_timeout(Some(Duration::from_millis(300)))
        .join()
        .await;

    assert!(matches!(result, Err(ClientError::Timeout)));
}

#[tokio::test]
async fn test_join_unreachable_endpoint() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let result = Session::builder("123456", "alice")
        .endpoint(&format!("ws://127.0.0.1:{}/cometd", port))
        .token("t")
        .join()
        .await;

    assert!(matches!(result, Err(ClientError::ConnectionFailed(_))));
}

// ============================================================================
// Quiz flow
// ============================================================================

#[tokio::test]
async fn test_quiz_flow_builds_snapshots() {
    let server = MockQuizServer::start().await;
    let session = join(&server, "alice").await;

    server.push_content(
        9,
        json!({"quizName": "Capitals", "quizType": "quiz", "quizQuestionAnswers": [2, 4]}),
    );
    let event = next_matching(&session, |e| matches!(e, SessionEvent::QuizStart(_))).await;
    let SessionEvent::QuizStart(quiz) = event else {
        unreachable!()
    };
    assert_eq!(quiz.name.as_deref(), Some("Capitals"));
    assert_eq!(quiz.question_count, Some(2));

    server.push_content(1, json!({"questionIndex": 0, "timeLeft": 3000, "gameBlockType": "quiz"}));
    let event = next_matching(&session, |e| matches!(e, SessionEvent::Question(_))).await;
    let SessionEvent::Question(question) = event else {
        unreachable!()
    };
    assert_eq!(question.index, Some(0));
    assert_eq!(session.current_question(), Some(question.clone()));
    assert_eq!(
        session.quiz().and_then(|q| q.current_question),
        Some(question.clone())
    );

    server.push_content(2, json!({}));
    let event = next_matching(&session, |e| matches!(e, SessionEvent::QuestionStart(_))).await;
    assert_eq!(event, SessionEvent::QuestionStart(Some(question.clone())));

    server.push_content(8, json!({"isCorrect": true, "points": 1000, "rank": 1, "nemesis": null}));
    let event = next_matching(&session, |e| matches!(e, SessionEvent::QuestionEnd(_))).await;
    let SessionEvent::QuestionEnd(result) = event else {
        unreachable!()
    };
    assert!(result.correct);
    assert_eq!(result.points, 1000);
    assert_eq!(result.question, Some(question));
    assert_eq!(session.last_result(), Some(result));

    // Every pushed frame carried timesync, so each one was acknowledged
    assert!(server.wait_for_received(4, |e| e.channel == PLAYER_CHANNEL).await);
}

#[tokio::test]
async fn test_only_timesync_frames_are_acknowledged() {
    let server = MockQuizServer::start().await;
    let session = join(&server, "alice").await;

    server.push_raw(content_frame(2, &json!({}), false));
    next_matching(&session, |e| matches!(e, SessionEvent::QuestionStart(_))).await;
    server.push_content(2, json!({}));
    next_matching(&session, |e| matches!(e, SessionEvent::QuestionStart(_))).await;

    assert!(server.wait_for_received(1, |e| e.channel == PLAYER_CHANNEL).await);
    assert_eq!(server.received_on(PLAYER_CHANNEL).len(), 1);
}

#[tokio::test]
async fn test_repeated_metadata_starts_quiz_once() {
    let server = MockQuizServer::start().await;
    let session = join(&server, "alice").await;

    let meta = json!({"quizName": "Once", "quizQuestionAnswers": [1]});
    server.push_content(9, meta.clone());
    server.push_content(9, meta);
    server.push_content(2, json!({}));

    let mut quiz_starts = 0;
    loop {
        match next(&session).await {
            SessionEvent::QuizStart(_) => quiz_starts += 1,
            SessionEvent::QuestionStart(_) => break,
            _ => {}
        }
    }
    assert_eq!(quiz_starts, 1);
}

#[tokio::test]
async fn test_quiz_end_disconnects() {
    let server = MockQuizServer::start().await;
    let session = join(&server, "alice").await;

    server.push_content(3, json!({"playerCount": 4, "rank": 2, "correctCount": 1, "incorrectCount": 1}));
    server.push_content(13, json!({"podiumMedalType": "silver", "primaryMessage": "2nd place"}));
    server.push_content(10, json!({}));

    let event = next_matching(&session, |e| matches!(e, SessionEvent::Finish(_))).await;
    let SessionEvent::Finish(result) = event else {
        unreachable!()
    };
    assert_eq!(result.rank, Some(2));

    let event = next_matching(&session, |e| matches!(e, SessionEvent::FinishText(_))).await;
    let SessionEvent::FinishText(text) = event else {
        unreachable!()
    };
    assert_eq!(text.medal.as_deref(), Some("silver"));

    assert_eq!(next(&session).await, SessionEvent::QuizEnd);
    assert_eq!(next(&session).await, SessionEvent::Disconnect);
    assert!(!session.is_connected());

    // Leaving an already closed session is harmless
    session.leave();
    session.leave();
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let server = MockQuizServer::start().await;
    let session = join(&server, "alice").await;

    server.push_error(json!({"code": 42, "description": "duplicate name"}));
    let event = next_matching(&session, |e| matches!(e, SessionEvent::Error(_))).await;
    assert_eq!(
        event,
        SessionEvent::Error(json!({"code": 42, "description": "duplicate name"}))
    );
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_snapshots_without_event_queue() {
    init_tracing();
    let server = MockQuizServer::start().await;
    let session = Session::builder("123456", "alice")
        .endpoint(&server.url())
        .token("t")
        .queue_events(false)
        .join()
        .await
        .expect("join failed");

    server.push_content(9, json!({"quizName": "Quiet", "quizQuestionAnswers": [1, 1, 1]}));
    assert!(wait_for(|| session.quiz().is_some(), DEFAULT_CHECK_INTERVAL, DEFAULT_TIMEOUT).await);
    assert_eq!(session.quiz().and_then(|q| q.question_count), Some(3));

    let confirmation = timeout(DEFAULT_TIMEOUT, session.answer(1)).await.unwrap().unwrap();
    assert_eq!(confirmation.message.as_deref(), Some("Answer received"));

    assert_eq!(timeout(DEFAULT_TIMEOUT, session.next_event()).await.unwrap(), None);
}

// ============================================================================
// Answers
// ============================================================================

#[tokio::test]
async fn test_answer_is_confirmed() {
    let server = MockQuizServer::start().await;
    let session = join(&server, "alice").await;

    let confirmation = timeout(DEFAULT_TIMEOUT, session.answer(2))
        .await
        .expect("answer timed out")
        .expect("answer failed");
    assert_eq!(confirmation.message.as_deref(), Some("Answer received"));

    let submissions: Vec<_> = server
        .received_on(CONTROLLER_CHANNEL)
        .into_iter()
        .filter(|e| e.data.as_ref().is_some_and(|d| d.is_type("message")))
        .collect();
    assert_eq!(submissions.len(), 1);
    let content: serde_json::Value =
        serde_json::from_str(submissions[0].data.as_ref().unwrap().content.as_deref().unwrap()).unwrap();
    assert_eq!(content["choice"], 2);

    let event = next_matching(&session, |e| matches!(e, SessionEvent::QuestionSubmit(_))).await;
    assert_eq!(event, SessionEvent::QuestionSubmit(confirmation));
}

#[tokio::test]
async fn test_overlapping_answer_is_rejected() {
    let server = MockQuizServer::start_with(ServerScript {
        confirm_answers: false,
        ..Default::default()
    })
    .await;
    let session = join(&server, "alice").await;

    let first = session.answer(0);
    tokio::pin!(first);

    // Let the first submission register before racing a second one
    assert!(timeout(Duration::from_millis(200), &mut first).await.is_err());
    assert!(matches!(session.answer(1).await, Err(ClientError::AnswerPending)));

    server.push_content(7, json!({"primaryMessage": "late"}));
    let confirmation = timeout(DEFAULT_TIMEOUT, first).await.unwrap().unwrap();
    assert_eq!(confirmation.message.as_deref(), Some("late"));
}

#[tokio::test]
async fn test_pending_answer_fails_on_disconnect() {
    let server = MockQuizServer::start_with(ServerScript {
        confirm_answers: false,
        ..Default::default()
    })
    .await;
    let session = join(&server, "alice").await;

    let answer = session.answer(3);
    tokio::pin!(answer);
    assert!(timeout(Duration::from_millis(100), &mut answer).await.is_err());

    server.disconnect_clients();
    let result = timeout(DEFAULT_TIMEOUT, answer).await.expect("answer hung");
    assert!(matches!(result, Err(ClientError::NotConnected)));
}

#[tokio::test]
async fn test_answer_after_leave_is_rejected() {
    let server = MockQuizServer::start().await;
    let session = join(&server, "alice").await;

    session.leave();
    next_matching(&session, |e| *e == SessionEvent::Disconnect).await;

    assert!(matches!(session.answer(1).await, Err(ClientError::NotConnected)));
}

#[tokio::test]
async fn test_server_disconnect_closes_engine() {
    let server = MockQuizServer::start().await;
    let session = join(&server, "alice").await;

    server.disconnect_clients();
    next_matching(&session, |e| *e == SessionEvent::Disconnect).await;
    assert!(!session.is_connected());
    assert_eq!(session.send_failures(), 0);
}
