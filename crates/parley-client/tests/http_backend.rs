//! Integration tests for `HttpBackend` against a local axum stand-in of the
//! chat service.
//!
//! Each test starts its own server on an ephemeral port and inspects the
//! request log it records.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use parley_client::{ChatBackend, ClientError, HttpBackend, Operation};
use parley_core::{AgentTask, BackendConfig, NewChat, NewMessage, Sender};

// =============================================================================
// Helpers
// =============================================================================

type RequestLog = Arc<Mutex<Vec<String>>>;

struct TestServer {
    base_url: String,
    log: RequestLog,
}

impl TestServer {
    async fn start() -> Self {
        let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new()
            .route("/users/{email}", get(get_user))
            .route("/users/{email}/chats", get(get_chats))
            .route("/users/{user_id}/chats/search", get(search_chats))
            .route("/chats/", post(create_chat))
            .route("/chats/{chat_id}", get(get_chat))
            .route("/chats/{chat_id}/messages", post(post_message))
            .route("/run-agent/", post(run_agent))
            .layer(middleware::from_fn_with_state(Arc::clone(&log), record));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            log,
        }
    }

    fn backend(&self) -> HttpBackend {
        HttpBackend::new(&BackendConfig::default().with_base_url(&self.base_url)).unwrap()
    }

    fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

async fn record(State(log): State<RequestLog>, request: Request, next: Next) -> Response {
    let line = format!("{} {}", request.method(), request.uri());
    log.lock().unwrap().push(line);
    next.run(request).await
}

async fn get_user(Path(email): Path<String>) -> Response {
    if email == "broken@x.com" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "couchbase unavailable").into_response();
    }
    Json(json!({ "user_id": email, "name": email, "chat_ids": ["c1"] })).into_response()
}

async fn get_chats(Path(email): Path<String>) -> Json<Value> {
    Json(json!([
        { "chat_id": "c1", "user_id": email, "name": "Trip", "messages": [] },
        { "chat_id": "c2", "user_id": email, "name": null }
    ]))
}

async fn search_chats(
    Path(user_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let query = params.get("query").cloned().unwrap_or_default();
    if query == "nothing" {
        return Json(json!([]));
    }
    Json(json!([{ "chat_id": "c1", "user_id": user_id, "name": query }]))
}

async fn create_chat(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "chat_id": "new-chat",
        "user_id": body["user_id"],
        "name": body["name"],
        "messages": []
    }))
}

async fn get_chat(Path(chat_id): Path<String>) -> Response {
    if chat_id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Chat not found" }))).into_response();
    }
    if chat_id == "legacy" {
        return Json(json!({
            "chat_id": chat_id,
            "messages": [
                { "content": "imported", "timestamp": null, "sender": null }
            ]
        }))
        .into_response();
    }
    Json(json!({
        "chat_id": chat_id,
        "user_id": "a@x.com",
        "name": "Trip",
        "messages": [
            { "content": "hi", "timestamp": "2024-05-01T12:00:00.000Z", "sender": "user" },
            { "content": "hello", "timestamp": "2024-05-01T12:00:05.000Z", "sender": "agent" }
        ]
    }))
    .into_response()
}

async fn post_message(Path(chat_id): Path<String>, Json(body): Json<Value>) -> Response {
    if chat_id == "missing" {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(body).into_response()
}

async fn run_agent(Json(body): Json<Value>) -> Response {
    match body["task"].as_str() {
        Some("explode") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some("nothing") => Json(json!({ "success": false, "results": null })).into_response(),
        Some("garbage") => "not json".into_response(),
        Some("unfinished") => Json(json!({
            "success": true,
            "results": [
                { "is_done": null, "extracted_content": "x" },
                { "is_done": true, "extracted_content": "Paris" },
                { "is_done": null, "extracted_content": null, "error": null }
            ]
        }))
        .into_response(),
        _ => Json(json!({
            "success": true,
            "results": [
                { "is_done": false, "extracted_content": "searching" },
                { "is_done": true, "extracted_content": "Paris", "include_in_memory": true }
            ]
        }))
        .into_response(),
    }
}

// =============================================================================
// Users and chats
// =============================================================================

#[tokio::test]
async fn test_resolve_user_hits_users_path() {
    let server = TestServer::start().await;
    let user = server.backend().resolve_user("ada@x.com").await.unwrap();
    assert_eq!(user.user_id, "ada@x.com");
    assert_eq!(user.chat_ids, vec!["c1".to_string()]);
    assert_eq!(server.requests(), vec!["GET /users/ada@x.com"]);
}

#[tokio::test]
async fn test_resolve_user_percent_encodes_email() {
    let server = TestServer::start().await;
    let user = server.backend().resolve_user("a b@x.com").await.unwrap();
    assert_eq!(user.user_id, "a b@x.com");
    assert_eq!(server.requests(), vec!["GET /users/a%20b@x.com"]);
}

#[tokio::test]
async fn test_non_2xx_is_fixed_message_failure() {
    let server = TestServer::start().await;
    let err = server.backend().resolve_user("broken@x.com").await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Status {
            operation: Operation::ResolveUser,
            status: 500
        }
    ));
    assert_eq!(err.to_string(), "Failed to fetch or create user.");
}

#[tokio::test]
async fn test_list_chats_decodes_optional_fields() {
    let server = TestServer::start().await;
    let chats = server.backend().list_chats("ada@x.com").await.unwrap();
    assert_eq!(chats.len(), 2);
    assert_eq!(chats[0].display_name(), "Trip");
    assert_eq!(chats[1].display_name(), "Unlabeled Chat");
    assert!(chats[1].messages.is_none());
    assert!(!chats[0].is_online);
    assert_eq!(server.requests(), vec!["GET /users/ada@x.com/chats"]);
}

#[tokio::test]
async fn test_search_sends_encoded_query() {
    let server = TestServer::start().await;
    let chats = server
        .backend()
        .search_chats("ada@x.com", "paris & rome")
        .await
        .unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].name.as_deref(), Some("paris & rome"));
    assert_eq!(
        server.requests(),
        vec!["GET /users/ada@x.com/chats/search?query=paris+%26+rome"]
    );
}

#[tokio::test]
async fn test_search_empty_result_is_success() {
    let server = TestServer::start().await;
    let chats = server
        .backend()
        .search_chats("ada@x.com", "nothing")
        .await
        .unwrap();
    assert!(chats.is_empty());
}

#[tokio::test]
async fn test_create_chat_posts_to_trailing_slash() {
    let server = TestServer::start().await;
    let chat = server
        .backend()
        .create_chat(&NewChat {
            user_id: "ada@x.com".to_string(),
            name: "Trip".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(chat.chat_id, "new-chat");
    assert_eq!(chat.name.as_deref(), Some("Trip"));
    assert_eq!(server.requests(), vec!["POST /chats/"]);
}

// =============================================================================
// Messages and agent
// =============================================================================

#[tokio::test]
async fn test_fetch_messages_unwraps_history() {
    let server = TestServer::start().await;
    let messages = server.backend().fetch_messages("c1").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, Some(Sender::User));
    assert_eq!(messages[1].content, "hello");
}

#[tokio::test]
async fn test_fetch_messages_tolerates_null_fields() {
    let server = TestServer::start().await;
    let messages = server.backend().fetch_messages("legacy").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "imported");
    assert_eq!(messages[0].sender, None);
    assert!(messages[0].timestamp.is_empty());
}

#[tokio::test]
async fn test_fetch_messages_404_names_chat() {
    let server = TestServer::start().await;
    let err = server.backend().fetch_messages("missing").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Failed to fetch messages for chat ID: missing");
}

#[tokio::test]
async fn test_post_message_sends_wire_body() {
    let server = TestServer::start().await;
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let stored = server
        .backend()
        .post_message("c1", &NewMessage::from_user("hi", at))
        .await
        .unwrap();
    assert_eq!(stored.content, "hi");
    assert_eq!(stored.sender, Some(Sender::User));
    assert_eq!(stored.timestamp, "2024-05-01T12:00:00.000Z");
    assert_eq!(server.requests(), vec!["POST /chats/c1/messages"]);
}

#[tokio::test]
async fn test_post_agent_message_failure_message() {
    let server = TestServer::start().await;
    let err = server
        .backend()
        .post_message("missing", &NewMessage::from_agent("x", Utc::now()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to post agent message.");
}

#[tokio::test]
async fn test_run_agent_decodes_results() {
    let server = TestServer::start().await;
    let run = server
        .backend()
        .run_agent(&AgentTask {
            task: "capital of France".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(run.results().len(), 2);
    assert_eq!(run.reply(), "Paris");
    assert_eq!(server.requests(), vec!["POST /run-agent/"]);
}

#[tokio::test]
async fn test_run_agent_null_is_done_counts_as_unfinished() {
    let server = TestServer::start().await;
    let run = server
        .backend()
        .run_agent(&AgentTask {
            task: "unfinished".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(run.results().len(), 3);
    assert_eq!(run.reply(), "Paris");
}

#[tokio::test]
async fn test_run_agent_null_results_fall_back() {
    let server = TestServer::start().await;
    let run = server
        .backend()
        .run_agent(&AgentTask {
            task: "nothing".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(run.reply(), "Agent response not available.");
}

#[tokio::test]
async fn test_run_agent_error_status() {
    let server = TestServer::start().await;
    let err = server
        .backend()
        .run_agent(&AgentTask {
            task: "explode".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to call the agent.");
}

#[tokio::test]
async fn test_undecodable_body_is_decode_failure() {
    let server = TestServer::start().await;
    let err = server
        .backend()
        .run_agent(&AgentTask {
            task: "garbage".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode { .. }));
    assert_eq!(err.to_string(), "Failed to call the agent.");
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend =
        HttpBackend::new(&BackendConfig::default().with_base_url(format!("http://{addr}")))
            .unwrap();
    let err = backend.list_chats("ada@x.com").await.unwrap_err();
    assert!(matches!(err, ClientError::Transport { .. }));
    assert_eq!(err.to_string(), "Failed to fetch chats.");
}
