use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use taskboard_api::app::services::AppServices;
use taskboard_core::{Project, Tag, User, UserId};
use taskboard_store::MemoryStore;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    project: Project,
    actor: User,
    assignee: User,
    tags: Vec<Tag>,
}

impl TestServer {
    /// Real router, seeded in-memory backend, ephemeral port.
    async fn spawn() -> Self {
        let store = MemoryStore::new();
        let project = store.insert_project("Backend API").unwrap();
        let actor = store.insert_user("John Doe", "john@example.com").unwrap();
        let assignee = store.insert_user("Jane Smith", "jane@example.com").unwrap();
        let tags = vec![
            store.insert_tag("bug").unwrap(),
            store.insert_tag("feature").unwrap(),
        ];

        let services = Arc::new(AppServices::in_memory(store));
        let app = taskboard_api::app::build_router(services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            handle,
            project,
            actor,
            assignee,
            tags,
        }
    }

    async fn create_task(&self, client: &reqwest::Client, body: serde_json::Value) -> reqwest::Response {
        client
            .post(format!("{}/tasks", self.base_url))
            .header("x-user-id", self.actor.id.to_string())
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn mutations_require_a_valid_user_header() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let payload = json!({ "title": "T", "projectId": srv.project.id });

    let res = client
        .post(format!("{}/tasks", srv.base_url))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_user_id");

    let res = client
        .post(format!("{}/tasks", srv.base_url))
        .header("x-user-id", "not-a-uuid")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_user_id");

    // Neither attempt created anything, and reads never need the header.
    let res = client
        .get(format!("{}/tasks", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["meta"]["total"], 0);
}

#[tokio::test]
async fn task_lifecycle_is_traced_in_activities() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = srv
        .create_task(
            &client,
            json!({
                "title": "Fix login flow",
                "description": "Session drops on refresh",
                "status": "IN_PROGRESS",
                "priority": "HIGH",
                "dueDate": "2024-06-01",
                "projectId": srv.project.id,
                "assigneeId": srv.assignee.id,
                "tagIds": [srv.tags[0].id],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let task: serde_json::Value = res.json().await.unwrap();
    let task_id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["status"], "IN_PROGRESS");
    assert_eq!(task["priority"], "HIGH");
    assert_eq!(task["project"]["name"], "Backend API");
    assert_eq!(task["assignee"]["email"], "jane@example.com");
    assert_eq!(task["tags"][0]["name"], "bug");
    assert!(task["dueDate"]
        .as_str()
        .unwrap()
        .starts_with("2024-06-01T00:00:00"));

    // Update: status change plus an explicit description clear.
    let res = client
        .put(format!("{}/tasks/{task_id}", srv.base_url))
        .header("x-user-id", srv.actor.id.to_string())
        .json(&json!({ "status": "COMPLETED", "description": null }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: serde_json::Value = res.json().await.unwrap();
    assert_eq!(updated["status"], "COMPLETED");
    assert!(updated["description"].is_null());
    assert_eq!(updated["assignee"]["email"], "jane@example.com");

    // History: newest first, diffs only for what changed.
    let res = client
        .get(format!("{}/tasks/{task_id}/activities", srv.base_url))
        .send()
        .await
        .unwrap();
    let history: serde_json::Value = res.json().await.unwrap();
    assert_eq!(history["meta"]["total"], 2);
    let latest = &history["data"][0];
    assert_eq!(latest["action"], "updated");
    assert_eq!(latest["changes"]["status"]["old"], "IN_PROGRESS");
    assert_eq!(latest["changes"]["status"]["new"], "COMPLETED");
    assert_eq!(latest["changes"]["description"]["old"], "Session drops on refresh");
    assert!(latest["changes"]["description"]["new"].is_null());
    assert!(latest["changes"].get("priority").is_none());
    assert_eq!(latest["user"]["name"], "John Doe");
    let created = &history["data"][1];
    assert_eq!(created["action"], "created");
    assert_eq!(created["changes"]["title"]["old"], serde_json::Value::Null);
    assert_eq!(created["changes"]["title"]["new"], "Fix login flow");

    // Delete: confirmation body, then the task is gone but the trail survives.
    let res = client
        .delete(format!("{}/tasks/{task_id}", srv.base_url))
        .header("x-user-id", srv.actor.id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Task deleted successfully");

    let res = client
        .get(format!("{}/tasks/{task_id}", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // The per-task history is just the feed narrowed to one task reference,
    // so after the delete nullifies those references it is empty, not a 404.
    let res = client
        .get(format!("{}/tasks/{task_id}/activities", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let history: serde_json::Value = res.json().await.unwrap();
    assert_eq!(history["meta"]["total"], 0);

    let res = client
        .get(format!("{}/activities", srv.base_url))
        .send()
        .await
        .unwrap();
    let all: serde_json::Value = res.json().await.unwrap();
    assert_eq!(all["meta"]["total"], 3);
    for activity in all["data"].as_array().unwrap() {
        assert!(activity["taskId"].is_null());
        assert_eq!(activity["taskTitle"], "Fix login flow");
    }
    assert_eq!(all["data"][0]["action"], "deleted");
}

#[tokio::test]
async fn unknown_actor_rolls_back_the_whole_mutation() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/tasks", srv.base_url))
        .header("x-user-id", UserId::new().to_string())
        .json(&json!({ "title": "T", "projectId": srv.project.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .get(format!("{}/tasks", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["meta"]["total"], 0);
}

#[tokio::test]
async fn create_validates_payload() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = srv
        .create_task(&client, json!({ "title": "  ", "projectId": srv.project.id }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = srv
        .create_task(
            &client,
            json!({ "title": "T", "projectId": srv.project.id, "status": "DONE" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .create_task(
            &client,
            json!({ "title": "T", "projectId": taskboard_core::ProjectId::new() }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_paginates_and_coerces_page_params() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for i in 0..5 {
        let res = srv
            .create_task(&client, json!({ "title": format!("task-{i}"), "projectId": srv.project.id }))
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client
        .get(format!("{}/tasks?page=2&limit=2", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    // Insertion order: page 2 holds the third and fourth task.
    assert_eq!(body["data"][0]["title"], "task-2");
    assert_eq!(body["meta"], json!({ "total": 5, "page": 2, "perPage": 2, "totalPages": 3 }));

    // Garbage paging values fall back to defaults instead of failing.
    let res = client
        .get(format!("{}/tasks?page=invalid&limit=nope", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["meta"]["page"], 1);
    assert_eq!(body["meta"]["perPage"], 20);
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn task_list_filters_by_status_and_assignee() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    srv.create_task(
        &client,
        json!({ "title": "open", "projectId": srv.project.id }),
    )
    .await;
    srv.create_task(
        &client,
        json!({
            "title": "active",
            "projectId": srv.project.id,
            "status": "IN_PROGRESS",
            "assigneeId": srv.assignee.id,
        }),
    )
    .await;

    let res = client
        .get(format!("{}/tasks?status=IN_PROGRESS", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["title"], "active");

    let res = client
        .get(format!("{}/tasks?assigneeId={}", srv.base_url, srv.assignee.id))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["meta"]["total"], 1);

    // Filter values are strict even though paging is lenient.
    let res = client
        .get(format!("{}/tasks?status=BOGUS", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn noop_update_adds_no_history() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = srv
        .create_task(&client, json!({ "title": "T", "projectId": srv.project.id }))
        .await;
    let task: serde_json::Value = res.json().await.unwrap();
    let task_id = task["id"].as_str().unwrap();

    let res = client
        .put(format!("{}/tasks/{task_id}", srv.base_url))
        .header("x-user-id", srv.actor.id.to_string())
        .json(&json!({ "title": "T" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/tasks/{task_id}/activities", srv.base_url))
        .send()
        .await
        .unwrap();
    let history: serde_json::Value = res.json().await.unwrap();
    assert_eq!(history["meta"]["total"], 1);
    assert_eq!(history["data"][0]["action"], "created");
}

#[tokio::test]
async fn activity_listing_filters_by_action() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = srv
        .create_task(&client, json!({ "title": "T", "projectId": srv.project.id }))
        .await;
    let task: serde_json::Value = res.json().await.unwrap();
    let task_id = task["id"].as_str().unwrap();

    client
        .put(format!("{}/tasks/{task_id}", srv.base_url))
        .header("x-user-id", srv.actor.id.to_string())
        .json(&json!({ "priority": "URGENT" }))
        .send()
        .await
        .unwrap();

    let res = client
        .get(format!("{}/activities?action=updated", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["action"], "updated");
    assert_eq!(body["data"][0]["userId"], srv.actor.id.to_string());

    let res = client
        .get(format!("{}/activities?userId={}", srv.base_url, UserId::new()))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["meta"]["total"], 0);
}
