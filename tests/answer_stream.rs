//! Streaming answer submission against a mock backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use interview_client::auth::AuthStore;
use interview_client::client::{ClientError, InterviewClient};
use interview_client::model::User;
use interview_client::options::TransportOptions;
use interview_client::stream::{AnswerEvent, Callbacks, StreamOutcome};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SCENARIO: &str = concat!(
    "event: evaluation\ndata: {\"rating\":\"GOOD\",\"notes\":{}}\n\n",
    "event: question_start\n\n",
    "event: question_chunk\ndata: {\"content\":\"Tell me\"}\n\n",
    "event: question_chunk\ndata: {\"content\":\" more.\"}\n\n",
    "event: question_end\ndata: {\"question_id\":42,\"question_type\":\"follow_up\",\"round_index\":2}\n\n",
    "event: done\ndata: {}\n\n",
);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn jane() -> User {
    User {
        id: 1,
        email: "jane@example.com".to_string(),
        name: None,
    }
}

fn logged_in_client(server: &MockServer, store: AuthStore) -> InterviewClient {
    let auth = store.into_context();
    InterviewClient::new(TransportOptions::new(server.uri()), auth).unwrap()
}

fn recording_callbacks(log: Arc<Mutex<Vec<String>>>) -> Callbacks {
    let (a, b, c, d) = (log.clone(), log.clone(), log.clone(), log);
    Callbacks::new()
        .on_evaluation(move |e| a.lock().unwrap().push(format!("evaluation:{}:{}", e.rating, e.notes)))
        .on_chunk(move |t| b.lock().unwrap().push(format!("chunk:{t}")))
        .on_end(move |end| {
            c.lock()
                .unwrap()
                .push(format!("end:{}:{}:{}", end.question_id, end.question_type, end.round_index))
        })
        .on_error(move |e| d.lock().unwrap().push(format!("error:{e}")))
}

#[tokio::test]
async fn test_streams_evaluation_chunks_and_end_in_order() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/interviews/3/answer/41/stream"))
        .and(header("authorization", "Bearer tok-1"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"answer": "I shipped it."})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SCENARIO, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut store = AuthStore::in_memory();
    store.set_auth(jane(), "tok-1".into()).unwrap();
    let client = logged_in_client(&server, store);

    let log = Arc::new(Mutex::new(Vec::new()));
    let handle = client
        .submit_answer_stream(3, 41, "I shipped it.", recording_callbacks(log.clone()))
        .await;

    assert_eq!(handle.join().await, StreamOutcome::Completed);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "evaluation:GOOD:{}".to_string(),
            "chunk:Tell me".to_string(),
            "chunk: more.".to_string(),
            "end:42:follow_up:2".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_unauthorized_stream_expires_session() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/interviews/3/answer/41/stream"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Could not validate credentials"})))
        .mount(&server)
        .await;

    let mut store = AuthStore::with_path(dir.path().join("auth.json"));
    store.set_auth(jane(), "stale".into()).unwrap();
    let client = logged_in_client(&server, store);

    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = errors.clone();
    let handle = client
        .submit_answer_stream(
            3,
            41,
            "answer",
            Callbacks::new().on_error(move |e| seen.lock().unwrap().push(e)),
        )
        .await;

    assert_eq!(handle.join().await, StreamOutcome::Failed);
    {
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ClientError::SessionExpired));
    }

    let auth = client.auth().read().await;
    assert!(!auth.is_authenticated());
    assert!(!dir.path().join("auth.json").exists());
}

#[tokio::test]
async fn test_not_found_is_reported_with_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/interviews/9/answer/1/stream"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Invalid session or question"})))
        .mount(&server)
        .await;

    let client = logged_in_client(&server, AuthStore::in_memory());
    let log = Arc::new(Mutex::new(Vec::new()));
    let handle = client
        .submit_answer_stream(9, 1, "answer", recording_callbacks(log.clone()))
        .await;

    assert_eq!(handle.join().await, StreamOutcome::Failed);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["error:HTTP 404 Not Found: Invalid session or question".to_string()]
    );
}

#[tokio::test]
async fn test_empty_body_is_missing_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/interviews/3/answer/41/stream"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = logged_in_client(&server, AuthStore::in_memory());
    let log = Arc::new(Mutex::new(Vec::new()));
    let handle = client
        .submit_answer_stream(3, 41, "answer", recording_callbacks(log.clone()))
        .await;

    assert_eq!(handle.join().await, StreamOutcome::Failed);
    assert_eq!(
        *log.lock().unwrap(),
        vec![format!("error:{}", ClientError::MissingBody)]
    );
}

#[tokio::test]
async fn test_cancel_before_response_is_silent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/interviews/3/answer/41/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(SCENARIO, "text/event-stream")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = logged_in_client(&server, AuthStore::in_memory());
    let log = Arc::new(Mutex::new(Vec::new()));
    let handle = client
        .submit_answer_stream(3, 41, "answer", recording_callbacks(log.clone()))
        .await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(2), handle.join())
        .await
        .expect("cancellation should end the stream promptly");
    assert_eq!(outcome, StreamOutcome::Cancelled);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_queue_consumer_receives_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/interviews/3/answer/41/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SCENARIO, "text/event-stream"))
        .mount(&server)
        .await;

    let client = logged_in_client(&server, AuthStore::in_memory());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Result<AnswerEvent, ClientError>>();
    let handle = client.submit_answer_stream(3, 41, "answer", tx).await;

    let mut session = interview_client::session::InterviewSession::default();
    session.record_answer("answer");
    while let Some(event) = rx.recv().await {
        session.apply(&event.unwrap());
    }

    assert_eq!(handle.join().await, StreamOutcome::Completed);
    assert_eq!(session.current_question_id, Some(42));
    assert_eq!(session.messages.last().unwrap().content, "Tell me more.");
    assert_eq!(session.messages[0].rating.as_deref(), Some("GOOD"));
}
