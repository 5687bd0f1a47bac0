use std::time::Duration;

use serde_json::json;
use taskdash_core::api::{ApiClient, ApiError};
use taskdash_core::task::{Priority, Status, TaskInput};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, token: Option<&str>) -> ApiClient {
    let mut client =
        ApiClient::new(&format!("{}/api/", server.uri()), Duration::from_secs(5)).expect("client");
    client.set_token(token.map(str::to_string));
    client
}

#[tokio::test]
async fn list_tasks_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a", "title": "Monthly Report", "priority": "high", "status": "active", "due_date": null},
            {"id": "b", "title": "Budget", "description": "no reports due", "priority": "low", "status": "completed"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let tasks = client_for(&server, Some("tok-1"))
        .list_tasks()
        .await
        .expect("list tasks");

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].priority, Priority::High);
    assert_eq!(tasks[1].status, Status::Completed);
    assert_eq!(tasks[1].description_or_empty(), "no reports due");
}

#[tokio::test]
async fn authenticated_call_without_token_never_hits_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server, None).me().await.unwrap_err();
    assert!(matches!(err, ApiError::MissingToken));
}

#[tokio::test]
async fn unauthorized_maps_to_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid token"})))
        .mount(&server)
        .await;

    let err = client_for(&server, Some("stale")).me().await.unwrap_err();
    assert!(err.is_auth_failure());
    assert_eq!(err.to_string(), "unauthorized: invalid token");
}

#[tokio::test]
async fn create_posts_task_body_and_surfaces_validation_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tasks"))
        .and(body_json(json!({
            "title": "",
            "description": "",
            "priority": "medium",
            "due_date": null
        })))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "title cannot be empty"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let input = TaskInput {
        title: String::new(),
        description: String::new(),
        priority: Priority::Medium,
        due_date: None,
    };
    let err = client_for(&server, Some("tok"))
        .create_task(&input)
        .await
        .unwrap_err();

    match err {
        ApiError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "title cannot be empty");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn toggle_update_and_delete_use_task_paths() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/tasks/a/toggle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "a", "title": "Report", "priority": "low", "status": "completed"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/tasks/a"))
        .and(body_json(json!({
            "title": "Report v2",
            "description": "draft",
            "priority": "high",
            "due_date": "2026-10-20"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "a", "title": "Report v2", "priority": "high", "status": "completed",
            "due_date": "2026-10-20"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/tasks/a"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok"));
    let toggled = client.toggle_task("a").await.expect("toggle");
    assert_eq!(toggled.status, Status::Completed);

    let input = TaskInput {
        title: "Report v2".to_string(),
        description: "draft".to_string(),
        priority: Priority::High,
        due_date: Some("2026-10-20".to_string()),
    };
    let updated = client.update_task("a", &input).await.expect("update");
    assert_eq!(updated.title, "Report v2");

    client.delete_task("a").await.expect("delete");
}

#[tokio::test]
async fn login_and_health_are_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(json!({"login": "alice", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-new", "login": "alice", "id": "u-1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let login = client.login("alice", "secret").await.expect("login");
    assert_eq!(login.token, "tok-new");
    assert_eq!(login.id.as_deref(), Some("u-1"));

    let health = client.health().await.expect("health");
    assert_eq!(health.status, "OK");
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let server = MockServer::start().await;
    let base = format!("{}/api", server.uri());
    drop(server);

    let client = ApiClient::new(&base, Duration::from_secs(2)).expect("client");
    let err = client.health().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert!(!err.is_auth_failure());
}
