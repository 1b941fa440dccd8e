use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hybridbot::api::{BackendClient, BackendError, SessionBackend, TurnMetadata};
use hybridbot::capture::{Frame, TurnBuffer};
use hybridbot::emotion::RiskLevel;

fn client(server: &MockServer) -> BackendClient {
    BackendClient::new(&server.uri(), Duration::from_secs(5))
        .unwrap()
        .with_token(Some("tok-123".to_string()))
}

fn turn() -> TurnBuffer {
    TurnBuffer {
        audio: b"RIFF-fake-wav".to_vec(),
        mime_type: "audio/wav".to_string(),
        file_name: "input.wav".to_string(),
        frames: vec![Frame {
            seq: 0,
            jpeg: vec![0xff, 0xd8, 0xff],
        }],
        captured_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_submit_turn_sends_multipart_with_session_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/multimodal_input"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Thanks for sharing.",
            "state": "Stress",
            "risk_level": "high",
            "transcription": "work is a lot"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let metadata = TurnMetadata::continuous(Utc::now());
    let reply = client(&server)
        .submit_turn(&turn(), Some("sess-9"), &metadata)
        .await
        .unwrap();

    assert_eq!(reply.response, "Thanks for sharing.");
    assert_eq!(reply.state.as_deref(), Some("Stress"));
    assert_eq!(reply.risk_level, Some(RiskLevel::High));
    assert_eq!(reply.transcription.as_deref(), Some("work is a lot"));

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"audio\"; filename=\"input.wav\""));
    assert!(body.contains("RIFF-fake-wav"));
    assert!(body.contains("name=\"frames\"; filename=\"frame_0.jpg\""));
    assert!(body.contains("name=\"session_id\""));
    assert!(body.contains("sess-9"));
    assert!(body.contains("name=\"metadata\""));
    assert!(body.contains("\"session_mode\":\"continuous\""));
}

#[tokio::test]
async fn test_submit_turn_without_session_omits_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/multimodal_input"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "Hi"})))
        .mount(&server)
        .await;

    let reply = client(&server)
        .submit_turn(&turn(), None, &TurnMetadata::continuous(Utc::now()))
        .await
        .unwrap();

    assert_eq!(reply.state, None);
    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(!body.contains("name=\"session_id\""));
}

#[tokio::test]
async fn test_session_start_and_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/multimodal_session/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "abc"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/multimodal_session/end"))
        .and(body_json(json!({"session_id": "abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ended",
            "summary": "Talked about work stress."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let id = client.start_session().await.unwrap();
    assert_eq!(id, "abc");

    let ack = client.end_session(&id).await.unwrap();
    assert_eq!(ack.status.as_deref(), Some("ended"));
    assert_eq!(ack.summary.as_deref(), Some("Talked about work stress."));
}

#[tokio::test]
async fn test_session_end_tolerates_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/multimodal_session/end"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let ack = client(&server).end_session("abc").await.unwrap();
    assert_eq!(ack.summary, None);
}

#[tokio::test]
async fn test_login_failure_surfaces_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"username": "alice", "password": "wrong"})))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"msg": "Invalid credentials"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).login("alice", "wrong").await.unwrap_err();

    match err {
        BackendError::Unauthorized(message) => assert_eq!(message, "Invalid credentials"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_login_returns_token_and_role() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt",
            "is_admin": true
        })))
        .mount(&server)
        .await;

    let login = client(&server).login("root", "pw").await.unwrap();
    assert_eq!(login.access_token, "jwt");
    assert!(login.is_admin);
}

#[tokio::test]
async fn test_register_conflict_is_rejected_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"msg": "User exists"})))
        .mount(&server)
        .await;

    let err = client(&server).register("bob", "pw").await.unwrap_err();
    assert!(matches!(err, BackendError::Rejected { status: 409, .. }));
    assert_eq!(err.user_message(), "User exists");
}

#[tokio::test]
async fn test_admin_endpoint_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/stats"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client(&server).admin_stats().await.unwrap_err();
    assert!(matches!(err, BackendError::Forbidden));
    assert_eq!(err.user_message(), "Access Denied: Admins Only");
}

#[tokio::test]
async fn test_chat_history_parses_messages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat_history"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [
                {"text": "hello", "sender": "You", "timestamp": "2026-01-02T10:00:00Z"},
                {"text": "Hi there", "sender": "HybridBot", "state": "Normal", "risk_level": "Low"}
            ]
        })))
        .mount(&server)
        .await;

    let messages = client(&server).chat_history().await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, "You");
    assert_eq!(messages[0].state, None);
    assert_eq!(messages[1].risk_level, Some(RiskLevel::Low));
}

#[tokio::test]
async fn test_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = client(&server).chat("hi", None).await.unwrap_err();
    assert!(matches!(err, BackendError::Unavailable(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_unavailable() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = BackendClient::new(&uri, Duration::from_secs(2)).unwrap();
    let err = client.start_session().await.unwrap_err();
    assert!(matches!(err, BackendError::Unavailable(_)));
}
