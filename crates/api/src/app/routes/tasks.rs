use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use taskboard_core::TaskId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
        .route("/:id/activities", get(task_activities))
}

pub async fn create_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<dto::CreateTaskRequest>,
) -> axum::response::Response {
    let draft = match body.into_draft() {
        Ok(d) => d,
        Err(response) => return response,
    };

    match services.create_task(Some(caller.user_id()), draft).await {
        Ok(task) => (StatusCode::CREATED, Json(dto::task_to_json(&task))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_tasks(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::TaskListQuery>,
) -> axum::response::Response {
    let (filter, page) = match query.into_parts() {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    match services.list_tasks(&filter, page).await {
        Ok(page) => Json(dto::page_to_json(&page, dto::task_to_json)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_task(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TaskId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid task id"),
    };

    match services.get_task(id).await {
        Ok(task) => Json(dto::task_to_json(&task)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateTaskRequest>,
) -> axum::response::Response {
    let id: TaskId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid task id"),
    };
    let patch = match body.into_patch() {
        Ok(p) => p,
        Err(response) => return response,
    };

    match services.update_task(Some(caller.user_id()), id, patch).await {
        Ok(task) => Json(dto::task_to_json(&task)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TaskId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid task id"),
    };

    match services.delete_task(Some(caller.user_id()), id).await {
        Ok(()) => Json(serde_json::json!({ "message": "Task deleted successfully" })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn task_activities(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::PageQuery>,
) -> axum::response::Response {
    let id: TaskId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid task id"),
    };

    match services.task_activities(id, query.request()).await {
        Ok(page) => Json(dto::page_to_json(&page, dto::activity_to_json)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
