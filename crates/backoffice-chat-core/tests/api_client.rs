use backoffice_chat_core::api::{ChatApiClient, ChatBackend, QueryRequest, SessionApiClient};
use backoffice_chat_core::session::SessionStore;
use backoffice_chat_core::{ChatError, ConversationStore, Role};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn query_posts_prompt_with_session_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/query"))
        .and(header("X-Session-ID", "session_abc"))
        .and(body_json(json!({
            "prompt": "How many customers?",
            "sessionId": "session_abc",
            "maxHistoryMessages": 10
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": "There are 42 customers.",
            "executionTime": 12.5,
            "tablesUsed": ["customers"],
            "hasContext": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatApiClient::new(&format!("{}/", server.uri())).unwrap();
    let request = QueryRequest::new("How many customers?", "session_abc", true);
    let response = client.query(&request, "session_abc").await.unwrap();

    assert!(response.success);
    assert_eq!(response.result.as_deref(), Some("There are 42 customers."));
    let metadata = response.message_metadata();
    assert_eq!(metadata.execution_time, Some(12.5));
    assert_eq!(metadata.tables_used, Some(vec!["customers".to_string()]));
}

#[tokio::test]
async fn query_without_context_still_sends_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/query"))
        .and(header("X-Session-ID", "session_abc"))
        .and(body_json(json!({ "prompt": "hi", "maxHistoryMessages": 10 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": "hello"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatApiClient::new(&server.uri()).unwrap();
    let request = QueryRequest::new("hi", "session_abc", false);
    client.query(&request, "session_abc").await.unwrap();
}

#[tokio::test]
async fn server_error_text_is_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/query"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "error": "Database is offline" })),
        )
        .mount(&server)
        .await;

    let client = ChatApiClient::new(&server.uri()).unwrap();
    let err = client
        .query(&QueryRequest::new("x", "s", true), "s")
        .await
        .unwrap_err();

    match &err {
        ChatError::Server { status, message } => {
            assert_eq!(*status, 503);
            assert_eq!(message.as_deref(), Some("Database is offline"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.user_message(), "Database is offline");
}

#[tokio::test]
async fn server_error_without_body_uses_default_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/query"))
        .respond_with(ResponseTemplate::new(500).set_body_string("gateway exploded"))
        .mount(&server)
        .await;

    let client = ChatApiClient::new(&server.uri()).unwrap();
    let err = client
        .query(&QueryRequest::new("x", "s", true), "s")
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "An error occurred. Please try again.");
}

#[tokio::test]
async fn stalled_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/sessions/s/context"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = ChatApiClient::with_timeout(&server.uri(), Duration::from_millis(200)).unwrap();
    let err = client.session_context("s").await.unwrap_err();
    match err {
        ChatError::Http(e) => assert!(e.is_timeout()),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn clear_and_context_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/sessions/session_abc/clear"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/chat/sessions/session_abc/context"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "context": { "messageCount": 4 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatApiClient::new(&server.uri()).unwrap();
    client.clear_session("session_abc").await.unwrap();
    let context = client.session_context("session_abc").await.unwrap();
    assert_eq!(context["context"]["messageCount"], 4);
}

#[tokio::test]
async fn session_admin_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chat/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "sessions": [{
                "sessionId": "session_abc",
                "messageCount": 6,
                "lastActivity": "2024-05-01T10:15:00Z",
                "createdAt": "2024-05-01T10:00:00Z",
                "topic": "orders"
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/chat/sessions/session_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/analytics/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "analytics": {
                "totalSessions": 3,
                "averageMessageCount": 4.5,
                "averageSessionDuration": 120.0,
                "mostQueriedTables": [{ "table": "orders", "count": 9 }]
            }
        })))
        .mount(&server)
        .await;

    let client = SessionApiClient::new(&server.uri()).unwrap();

    let list = client.list_sessions().await.unwrap();
    assert_eq!(list.sessions.len(), 1);
    assert_eq!(list.sessions[0].message_count, 6);
    assert_eq!(list.sessions[0].topic.as_deref(), Some("orders"));

    let deleted = client.delete_session("session_abc").await.unwrap();
    assert_eq!(deleted["success"], true);

    let analytics = client.session_analytics().await.unwrap();
    assert_eq!(analytics.analytics.total_sessions, 3);
    assert_eq!(analytics.analytics.most_queried_tables[0].table, "orders");
}

#[tokio::test]
async fn conversation_round_trip_against_http_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": "Inventory looks healthy."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = Arc::new(ChatApiClient::new(&server.uri()).unwrap());
    let store = Arc::new(ConversationStore::new(
        backend,
        Arc::new(SessionStore::in_memory()),
    ));

    store.send("Check inventory", true).await.unwrap();

    let messages = store.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Inventory looks healthy.");
    assert!(!store.is_loading());
}
